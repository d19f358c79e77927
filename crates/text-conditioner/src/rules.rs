//! Normalization rules.

use echo_core::EchoResult;

use crate::numbers;

/// A text normalization rule.
pub trait Rule: Send + Sync + std::fmt::Debug {
    /// Get the rule name.
    fn name(&self) -> &str;

    /// Apply the rule to the input text.
    fn apply(&self, input: &str) -> EchoResult<String>;
}

/// The default rule pipeline, in application order.
pub fn default_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(UnicodeNormalizationRule),
        Box::new(SymbolRule),
        Box::new(NumberRule),
        Box::new(WhitespaceRule),
    ]
}

/// Collapse whitespace runs and trim.
#[derive(Debug)]
pub struct WhitespaceRule;

impl Rule for WhitespaceRule {
    fn name(&self) -> &str {
        "whitespace"
    }

    fn apply(&self, input: &str) -> EchoResult<String> {
        Ok(input.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

/// Flatten typographic characters to their ASCII counterparts.
#[derive(Debug)]
pub struct UnicodeNormalizationRule;

impl Rule for UnicodeNormalizationRule {
    fn name(&self) -> &str {
        "unicode_normalization"
    }

    fn apply(&self, input: &str) -> EchoResult<String> {
        let mut out = String::with_capacity(input.len());
        for c in input.chars() {
            match c {
                '\u{00A0}' | '\u{2009}' | '\u{202F}' => out.push(' '),
                '\u{2018}' | '\u{2019}' | '\u{02BC}' => out.push('\''),
                '\u{201C}' | '\u{201D}' | '\u{00AB}' | '\u{00BB}' => out.push('"'),
                '\u{2014}' => out.push_str(" - "),
                '\u{2013}' | '\u{2212}' => out.push('-'),
                '\u{2026}' => out.push_str("..."),
                _ => out.push(c),
            }
        }
        Ok(out)
    }
}

/// Spell out or drop symbols the encoder has no reading for.
#[derive(Debug)]
pub struct SymbolRule;

impl Rule for SymbolRule {
    fn name(&self) -> &str {
        "symbol"
    }

    fn apply(&self, input: &str) -> EchoResult<String> {
        let mut out = String::with_capacity(input.len());

        for c in input.chars() {
            match c {
                _ if c.is_alphanumeric() || c.is_whitespace() => out.push(c),
                '.' | ',' | '!' | '?' | ':' | ';' | '-' | '\'' | '"' | '(' | ')' => out.push(c),
                '@' => out.push_str(" at "),
                '&' => out.push_str(" and "),
                '%' => out.push_str(" percent "),
                '+' => out.push_str(" plus "),
                '=' => out.push_str(" equals "),
                '#' => out.push_str(" number "),
                '/' => out.push_str(" slash "),
                _ => {}
            }
        }

        Ok(out)
    }
}

/// Verbalize digit runs: cardinals, ordinals ("21st"), decimals and
/// grouped thousands ("1,500").
#[derive(Debug)]
pub struct NumberRule;

const ORDINAL_SUFFIXES: [&str; 4] = ["st", "nd", "rd", "th"];

impl NumberRule {
    /// Consume `,ddd` groups following an integer part.
    fn take_groups(chars: &[char], mut i: usize, int_part: &mut String) -> usize {
        while chars.get(i) == Some(&',')
            && i + 4 <= chars.len()
            && chars[i + 1..i + 4].iter().all(|c| c.is_ascii_digit())
            && !chars.get(i + 4).is_some_and(|c| c.is_ascii_digit())
        {
            int_part.extend(&chars[i + 1..i + 4]);
            i += 4;
        }
        i
    }

    fn ordinal_suffix_at(chars: &[char], i: usize) -> bool {
        if i + 2 > chars.len() {
            return false;
        }
        let suffix: String = chars[i..i + 2].iter().collect::<String>().to_lowercase();
        ORDINAL_SUFFIXES.contains(&suffix.as_str())
            && !chars.get(i + 2).is_some_and(|c| c.is_alphanumeric())
    }

    fn integer_words(int_part: &str) -> String {
        if int_part.len() > 1 && int_part.starts_with('0') {
            return numbers::digits(int_part);
        }
        match int_part.parse::<u64>() {
            Ok(n) => numbers::cardinal(n),
            Err(_) => numbers::digits(int_part),
        }
    }
}

impl Rule for NumberRule {
    fn name(&self) -> &str {
        "number"
    }

    fn apply(&self, input: &str) -> EchoResult<String> {
        let chars: Vec<char> = input.chars().collect();
        let mut out = String::with_capacity(input.len() * 2);
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];

            if c == '-'
                && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())
                && (i == 0 || chars[i - 1].is_whitespace())
            {
                out.push_str("minus ");
                i += 1;
                continue;
            }

            if !c.is_ascii_digit() {
                out.push(c);
                i += 1;
                continue;
            }

            if out.chars().last().is_some_and(|p| p.is_alphabetic()) {
                out.push(' ');
            }

            let mut int_part = String::new();
            while i < chars.len() && chars[i].is_ascii_digit() {
                int_part.push(chars[i]);
                i += 1;
            }
            i = Self::take_groups(&chars, i, &mut int_part);

            if Self::ordinal_suffix_at(&chars, i) {
                match int_part.parse::<u64>() {
                    Ok(n) if n <= numbers::MAX_CARDINAL => out.push_str(&numbers::ordinal(n)),
                    _ => out.push_str(&numbers::digits(&int_part)),
                }
                i += 2;
                continue;
            }

            out.push_str(&Self::integer_words(&int_part));

            if chars.get(i) == Some(&'.') && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())
            {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end].is_ascii_digit() {
                    end += 1;
                }
                let frac: String = chars[start..end].iter().collect();
                out.push_str(" point ");
                out.push_str(&numbers::digits(&frac));
                i = end;
            }

            if chars.get(i).is_some_and(|n| n.is_alphabetic()) {
                out.push(' ');
            }
        }

        Ok(out)
    }
}
