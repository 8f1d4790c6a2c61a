use once_cell::sync::Lazy;
use regex::Regex;

static ZIP_EXACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{5}(-[0-9]{4})?$").expect("zip pattern compiles"));
static ZIP_EMBEDDED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([0-9]{5})(?:-[0-9]{4})?\b").expect("zip pattern compiles"));
static STREET_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+\s+[a-zA-Z\s]+").expect("street pattern compiles"));

/// `NNNNN` or `NNNNN-NNNN`, nothing else.
pub fn is_zip(value: &str) -> bool {
    ZIP_EXACT.is_match(value)
}

/// Leading house number followed by a street name.
pub fn is_street_address(value: &str) -> bool {
    STREET_ADDRESS.is_match(value)
}

/// First five-digit ZIP found anywhere in free text.
pub fn extract_zip(text: &str) -> Option<&str> {
    ZIP_EMBEDDED
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

/// Five-digit prefix of a ZIP or ZIP+4.
pub fn zip5(zip: &str) -> Option<&str> {
    is_zip(zip).then(|| &zip[..5])
}
