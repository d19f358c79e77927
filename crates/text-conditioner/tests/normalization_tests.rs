//! Corpus tests for English text normalization.

use echo_core::{ConditioningEncoder, EchoError, TextNormalizer};
use text_conditioner::{ByteEncoder, Normalizer};

struct Case {
    input: &'static str,
    expected: &'static str,
    description: &'static str,
}

const CORPUS: &[Case] = &[
    Case {
        input: "I counted 42 birds",
        expected: "I counted forty-two birds",
        description: "Cardinal in context",
    },
    Case {
        input: "Founded in 1999",
        expected: "Founded in one thousand nine hundred ninety-nine",
        description: "Four-digit cardinal",
    },
    Case {
        input: "Over 2,500,000 views",
        expected: "Over two million five hundred thousand views",
        description: "Grouped thousands",
    },
    Case {
        input: "She finished 3rd",
        expected: "She finished third",
        description: "Ordinal suffix",
    },
    Case {
        input: "The 100th visitor",
        expected: "The one hundredth visitor",
        description: "Round ordinal",
    },
    Case {
        input: "It costs 9.99",
        expected: "It costs nine point nine nine",
        description: "Decimal",
    },
    Case {
        input: "Down 20% today",
        expected: "Down twenty percent today",
        description: "Percent sign after number",
    },
    Case {
        input: "Tom & Jerry",
        expected: "Tom and Jerry",
        description: "Ampersand",
    },
    Case {
        input: "It\u{2019}s \u{201C}fine\u{201D}\u{2026}",
        expected: "It's \"fine\"...",
        description: "Typographic quotes and ellipsis",
    },
    Case {
        input: "  lots\tof \n  space  ",
        expected: "lots of space",
        description: "Whitespace collapse",
    },
    Case {
        input: "It was -4 outside",
        expected: "It was minus four outside",
        description: "Negative number",
    },
];

#[test]
fn test_english_corpus() {
    let normalizer = Normalizer::new();

    for (i, case) in CORPUS.iter().enumerate() {
        let got = normalizer
            .normalize(case.input)
            .expect("normalization should not fail");

        assert_eq!(
            got,
            case.expected,
            "\nCase #{} FAILED: {}\nInput:    '{}'\nExpected: '{}'\nGot:      '{}'",
            i + 1,
            case.description,
            case.input,
            case.expected,
            got
        );
    }
}

#[test]
fn test_edge_cases() {
    let normalizer = Normalizer::new();

    assert!(normalizer.normalize("").is_err());
    assert_eq!(normalizer.normalize("   ").unwrap(), "");
    assert_eq!(normalizer.normalize("no digits here").unwrap(), "no digits here");

    let huge = normalizer.normalize("12345678901234567890").unwrap();
    assert!(huge.starts_with("one two three"));
}

#[test]
fn test_encoder_rejects_unspeakable_text() {
    let encoder = ByteEncoder::default();
    for input in ["", "   ", "***"] {
        let err = encoder.encode(input).unwrap_err();
        assert!(
            matches!(err, EchoError::InvalidRequest(_)),
            "expected InvalidRequest for {input:?}, got {err:?}"
        );
    }
}

#[test]
fn test_encoder_matches_normalized_text() {
    let encoder = ByteEncoder::default();
    let a = encoder.encode("Room 7").unwrap();
    let b = encoder.encode("Room seven").unwrap();
    assert_eq!(a, b);
    assert_eq!(a.tokens, "Room seven".len() + 2);
}
