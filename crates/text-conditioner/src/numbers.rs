//! English number verbalization.

const ONES: [&str; 20] = [
    "zero",
    "one",
    "two",
    "three",
    "four",
    "five",
    "six",
    "seven",
    "eight",
    "nine",
    "ten",
    "eleven",
    "twelve",
    "thirteen",
    "fourteen",
    "fifteen",
    "sixteen",
    "seventeen",
    "eighteen",
    "nineteen",
];

const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

const SCALES: [(u64, &str); 4] = [
    (1_000_000_000_000, "trillion"),
    (1_000_000_000, "billion"),
    (1_000_000, "million"),
    (1_000, "thousand"),
];

/// Largest value spelled as a cardinal; longer digit runs are read digit by digit.
pub const MAX_CARDINAL: u64 = 999_999_999_999_999;

/// Words for 1..=999.
fn below_thousand(n: u64, parts: &mut Vec<String>) {
    let hundreds = n / 100;
    if hundreds > 0 {
        parts.push(format!("{} hundred", ONES[hundreds as usize]));
    }

    let rest = (n % 100) as usize;
    if rest == 0 {
        return;
    }
    if rest < 20 {
        parts.push(ONES[rest].to_string());
    } else if rest % 10 == 0 {
        parts.push(TENS[rest / 10].to_string());
    } else {
        parts.push(format!("{}-{}", TENS[rest / 10], ONES[rest % 10]));
    }
}

/// Convert a number to English cardinal words.
pub fn cardinal(num: u64) -> String {
    if num == 0 {
        return ONES[0].to_string();
    }
    if num > MAX_CARDINAL {
        return digits(&num.to_string());
    }

    let mut parts = Vec::new();
    let mut n = num;
    for (scale, name) in SCALES {
        let count = n / scale;
        if count > 0 {
            below_thousand(count, &mut parts);
            parts.push(name.to_string());
        }
        n %= scale;
    }
    if n > 0 {
        below_thousand(n, &mut parts);
    }

    parts.join(" ")
}

/// Convert a number to English ordinal words ("twenty-first").
pub fn ordinal(num: u64) -> String {
    let words = cardinal(num);
    let split = words.rfind([' ', '-']).map(|i| i + 1).unwrap_or(0);
    let (head, last) = words.split_at(split);

    let last = match last {
        "one" => "first".to_string(),
        "two" => "second".to_string(),
        "three" => "third".to_string(),
        "five" => "fifth".to_string(),
        "eight" => "eighth".to_string(),
        "nine" => "ninth".to_string(),
        "twelve" => "twelfth".to_string(),
        w if w.ends_with('y') => format!("{}ieth", &w[..w.len() - 1]),
        w => format!("{w}th"),
    };

    format!("{head}{last}")
}

/// Read a digit string one digit at a time.
pub fn digits(s: &str) -> String {
    s.chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| ONES[d as usize])
        .collect::<Vec<_>>()
        .join(" ")
}
