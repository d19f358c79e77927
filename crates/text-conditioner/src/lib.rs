//! # text-conditioner
//!
//! Text normalization and the default conditioning encoder for Echo TTS.
//!
//! Normalization is a rules pipeline for English text:
//! - Typographic Unicode cleanup
//! - Symbol verbalization
//! - Numbers (cardinal, ordinal, decimal)
//! - Whitespace collapse
//!
//! # Example
//!
//! ```ignore
//! use text_conditioner::Normalizer;
//! use echo_core::TextNormalizer;
//!
//! let normalizer = Normalizer::new();
//! assert_eq!(normalizer.normalize("42 apples")?, "forty-two apples");
//! ```

mod encoder;
pub mod numbers;
mod rules;

use tracing::instrument;

use echo_core::{EchoError, EchoResult, TextNormalizer};

pub use encoder::{ByteEncoder, DEFAULT_DIM, DEFAULT_TABLE_SEED};
pub use rules::{
    NumberRule, Rule, SymbolRule, UnicodeNormalizationRule, WhitespaceRule, default_rules,
};

/// Text normalizer with a configurable rule pipeline.
#[derive(Debug)]
pub struct Normalizer {
    rules: Vec<Box<dyn Rule>>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// Create a new normalizer with default rules.
    pub fn new() -> Self {
        Self {
            rules: default_rules(),
        }
    }

    /// Create a normalizer with custom rules.
    pub fn with_rules(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    /// Add a rule to the end of the pipeline.
    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    /// Names of the rules, in application order.
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }
}

impl TextNormalizer for Normalizer {
    #[instrument(skip(self, input), fields(input_len = input.len()))]
    fn normalize(&self, input: &str) -> EchoResult<String> {
        if input.is_empty() {
            return Err(EchoError::invalid_request("empty input text"));
        }

        let mut text = input.to_string();
        for rule in &self.rules {
            text = rule.apply(&text)?;
        }

        Ok(text)
    }
}
