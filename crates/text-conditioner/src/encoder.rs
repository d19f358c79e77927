//! Byte-level conditioning encoder.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use tracing::{debug, instrument};

use echo_core::{Conditioning, ConditioningEncoder, EchoError, EchoResult, TextNormalizer};

use crate::Normalizer;

/// Default embedding width.
pub const DEFAULT_DIM: usize = 128;

/// Default seed for the embedding table.
pub const DEFAULT_TABLE_SEED: u64 = 0x7e57_c0de;

const BOS: usize = 256;
const EOS: usize = 257;
const VOCAB: usize = 258;
const POSITION_SCALE: f32 = 0.1;

/// Encodes normalized UTF-8 bytes through a fixed embedding table.
///
/// Each byte, bracketed by BOS/EOS markers, selects a row of a table drawn
/// once from a seeded normal distribution. A sinusoidal position term is
/// added so repeated bytes at different offsets stay distinguishable.
pub struct ByteEncoder {
    normalizer: Box<dyn TextNormalizer>,
    table: Vec<f32>,
    dim: usize,
}

impl std::fmt::Debug for ByteEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteEncoder")
            .field("dim", &self.dim)
            .field("vocab", &VOCAB)
            .finish()
    }
}

impl Default for ByteEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_DIM, DEFAULT_TABLE_SEED)
    }
}

impl ByteEncoder {
    /// Build an encoder with an embedding table drawn from `seed`.
    ///
    /// `dim` is clamped to at least 2 so the position term has a sin/cos pair.
    pub fn new(dim: usize, seed: u64) -> Self {
        let dim = dim.max(2);
        let mut rng = StdRng::seed_from_u64(seed);
        let scale = 1.0 / (dim as f32).sqrt();
        let table = (0..VOCAB * dim)
            .map(|_| {
                let v: f32 = StandardNormal.sample(&mut rng);
                v * scale
            })
            .collect();

        Self {
            normalizer: Box::new(Normalizer::new()),
            table,
            dim,
        }
    }

    /// Replace the text normalizer.
    pub fn with_normalizer(mut self, normalizer: Box<dyn TextNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    fn push_row(&self, token: usize, position: usize, out: &mut Vec<f32>) {
        let row = &self.table[token * self.dim..(token + 1) * self.dim];
        let half = self.dim / 2;
        for (i, &v) in row.iter().enumerate() {
            let pair = (i % half) as f32;
            let freq = (-(10_000f32.ln()) * pair / half as f32).exp();
            let angle = position as f32 * freq;
            let pe = if i < half { angle.sin() } else { angle.cos() };
            out.push(v + POSITION_SCALE * pe);
        }
    }
}

impl ConditioningEncoder for ByteEncoder {
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    fn encode(&self, text: &str) -> EchoResult<Conditioning> {
        let normalized = self.normalizer.normalize(text)?;
        if normalized.is_empty() {
            return Err(EchoError::invalid_request("text is empty after normalization"));
        }

        let tokens = std::iter::once(BOS)
            .chain(normalized.bytes().map(usize::from))
            .chain(std::iter::once(EOS));

        let mut values = Vec::with_capacity((normalized.len() + 2) * self.dim);
        let mut count = 0;
        for (position, token) in tokens.enumerate() {
            self.push_row(token, position, &mut values);
            count += 1;
        }

        debug!(tokens = count, dim = self.dim, "encoded text");
        Conditioning::new(values, count, self.dim)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_shape() {
        let encoder = ByteEncoder::default();
        let cond = encoder.encode("Hi").unwrap();
        assert_eq!(cond.dim, DEFAULT_DIM);
        assert_eq!(cond.tokens, 4);
        assert_eq!(cond.values.len(), 4 * DEFAULT_DIM);
        assert!(cond.values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_encode_is_deterministic() {
        let a = ByteEncoder::new(64, 9).encode("Hello there").unwrap();
        let b = ByteEncoder::new(64, 9).encode("Hello there").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_encode_normalizes_first() {
        let encoder = ByteEncoder::default();
        let spaced = encoder.encode("  two   words ").unwrap();
        let plain = encoder.encode("two words").unwrap();
        assert_eq!(spaced, plain);

        let digits = encoder.encode("2 cats").unwrap();
        let words = encoder.encode("two cats").unwrap();
        assert_eq!(digits, words);
    }

    #[test]
    fn test_different_text_differs() {
        let encoder = ByteEncoder::default();
        let a = encoder.encode("yes").unwrap();
        let b = encoder.encode("no!").unwrap();
        assert_ne!(a.values, b.values);
    }

    #[test]
    fn test_position_distinguishes_repeats() {
        let encoder = ByteEncoder::default();
        let cond = encoder.encode("aa").unwrap();
        assert_ne!(cond.row(1), cond.row(2));
    }

    #[test]
    fn test_empty_after_normalization_rejected() {
        let encoder = ByteEncoder::default();
        let err = encoder.encode("~~~").unwrap_err();
        assert!(matches!(err, EchoError::InvalidRequest(_)));
    }
}
