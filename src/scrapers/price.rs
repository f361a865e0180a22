//! Numeric parsing of the free-form text shown on listing cards.
//!
//! Every parser returns `None` for text it cannot make sense of; a missing
//! number is an absent field, never an error.

use regex::Regex;
use std::sync::LazyLock;

static AMOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d[\d,]*)").expect("valid amount regex"));

static TOTAL_AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$\s*(\d[\d,]*)[^$]*total").expect("valid total amount regex")
});

static DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)").expect("valid decimal regex"));

static LABELLED_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d[\d,.]*)\s*(?:reseñas?|comentarios?|evaluaciones|reviews?)")
        .expect("valid labelled count regex")
});

static PAREN_COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d[\d,.]*)\)").expect("valid parenthesised count regex"));

/// Extract the first currency amount from price text such as `"$1,234 MXN"`.
pub fn parse_amount(text: &str) -> Option<u64> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = AMOUNT_RE.captures(&compact)?.get(1)?.as_str().replace(',', "");
    digits.parse().ok()
}

/// Amount attached to the word "total" in text that may also carry the
/// nightly price, e.g. `"$1,250 MXN noche · $5,000 MXN total"`.
///
/// Falls back to the first amount when no amount precedes "total".
pub fn parse_total_amount(text: &str) -> Option<u64> {
    TOTAL_AMOUNT_RE
        .captures_iter(text)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().replace(',', "").parse().ok())
        .or_else(|| parse_amount(text))
}

/// Parse a star rating, accepting `.` or `,` as decimal separator.
///
/// Values outside `[0, 5]` are rejected.
pub fn parse_rating(text: &str) -> Option<f64> {
    let normalized = text.replace(',', ".");
    let value: f64 = DECIMAL_RE.captures(&normalized)?.get(1)?.as_str().parse().ok()?;
    (0.0..=5.0).contains(&value).then_some(value)
}

/// Parse a review count. Zero and unparsable text are rejected.
///
/// Prefers the number directly labelled as reviews, then a parenthesised
/// count as in `"4.92 (128)"`, then the first number in the text.
pub fn parse_review_count(text: &str) -> Option<u32> {
    let raw = LABELLED_COUNT_RE
        .captures(text)
        .or_else(|| PAREN_COUNT_RE.captures(text))
        .or_else(|| AMOUNT_RE.captures(text))
        .and_then(|caps| caps.get(1))?
        .as_str();
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let count: u32 = digits.parse().ok()?;
    (count > 0).then_some(count)
}
