use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    // Leading decimal number, the way a lenient float parse reads "15.6-inch OLED".
    static ref LEADING_NUMBER: Regex =
        Regex::new(r"^\s*([+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?)").expect("valid regex");
}

/// NFKC-normalize and lowercase, for case-insensitive comparisons.
pub fn fold(text: &str) -> String {
    text.nfkc().collect::<String>().to_lowercase()
}

/// Case-insensitive substring test. `needle` must already be folded.
pub fn contains_folded(haystack: &str, folded_needle: &str) -> bool {
    fold(haystack).contains(folded_needle)
}

/// Parse the number at the start of `text`, ignoring whatever follows it.
pub fn leading_number(text: &str) -> Option<f64> {
    let caps = LEADING_NUMBER.captures(text)?;
    caps.get(1)?.as_str().parse::<f64>().ok().filter(|n| n.is_finite())
}
