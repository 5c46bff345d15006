//! Per-carrier tracking number format validation, shared between each
//! `CarrierClient::validate` and the extractor's candidate filter (base spec
//! §4.2, §4.6).

use regex::Regex;
use std::sync::LazyLock;

static UPS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^1Z[0-9A-Z]{16}$").unwrap());
static USPS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{20,22}|[A-Z]{2}\d{9}US)$").unwrap());
static FEDEX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{12}$|^\d{15}$|^\d{20}$").unwrap());
static DHL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{10,11}$").unwrap());
static AMAZON_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^TBA\d{12}$").unwrap());

/// UPS check-digit algorithm: over the 15-character body between the `1Z`
/// prefix and the trailing check digit, letters map to `(c - 'A' + 2) % 10`
/// (A=2 ... Z=7) and digits pass through; odd positions (1-indexed from the
/// left) weight ×1, even positions weight ×2; the check digit must equal
/// `(10 - sum % 10) % 10`.
fn ups_checksum_ok(tracking_number: &str) -> bool {
    let Some(check_digit) = tracking_number.chars().last().and_then(|c| c.to_digit(10)) else {
        return false;
    };
    let body = &tracking_number[2..tracking_number.len() - 1];

    let mut sum = 0u32;
    for (i, c) in body.chars().enumerate() {
        let value = if c.is_ascii_digit() {
            c.to_digit(10).unwrap()
        } else {
            (c as u32 - 'A' as u32 + 2) % 10
        };
        let weight = if (i + 1) % 2 == 1 { 1 } else { 2 };
        sum += value * weight;
    }

    check_digit == (10 - sum % 10) % 10
}

pub fn validate(carrier: &str, tracking_number: &str) -> bool {
    let tn = tracking_number.trim().to_uppercase();
    match carrier {
        "ups" => UPS_RE.is_match(&tn) && ups_checksum_ok(&tn),
        "usps" => USPS_RE.is_match(&tn),
        "fedex" => FEDEX_RE.is_match(&tn),
        "dhl" => DHL_RE.is_match(&tn),
        "amazon" => AMAZON_RE.is_match(&tn),
        _ => false,
    }
}

/// Regexes used by the extractor to find tracking-number *candidates* in
/// free text, independent of the stricter per-carrier format validators
/// above (base spec §4.6): a candidate that matches the pattern but fails
/// `validate` is dropped before scoring.
pub fn candidate_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
        vec![
            ("ups", Regex::new(r"\b1Z[0-9A-Z]{16}\b").unwrap()),
            ("usps", Regex::new(r"\b(\d{20,22}|[A-Z]{2}\d{9}US)\b").unwrap()),
            ("fedex", Regex::new(r"\b(\d{12}|\d{15}|\d{20})\b").unwrap()),
            ("dhl", Regex::new(r"\b\d{10,11}\b").unwrap()),
            ("amazon", Regex::new(r"\bTBA\d{12}\b").unwrap()),
        ]
    });
    &PATTERNS
}
