use regex::Regex;
use std::sync::OnceLock;

/// `local@domain.tld`, no whitespace or extra `@`, TLD of 2+ chars.
/// Not an RFC 5322 validator; exotic addresses may be rejected.
pub fn is_email(s: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL
        .get_or_init(|| {
            Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]{2,}$").expect("email pattern compiles")
        })
        .is_match(s)
}

/// Optional `+` and 1-3 digit country code, then 10-14 digits.
/// Whitespace, hyphens and parentheses are ignored.
pub fn is_phone(s: &str) -> bool {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    let clean: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')'))
        .collect();
    PHONE
        .get_or_init(|| Regex::new(r"^(\+\d{1,3})?\d{10,14}$").expect("phone pattern compiles"))
        .is_match(&clean)
}

/// Escape text for interpolation into element content or quoted attributes.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Percent-encode like `encodeURIComponent`: spaces as %20, UTF-8 bytes escaped.
pub fn encode_uri_component(s: &str) -> String {
    let mut result = String::with_capacity(s.len() * 2);
    for b in s.bytes() {
        match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => result.push(b as char),
            _ => result.push_str(&format!("%{:02X}", b)),
        }
    }
    result
}

/// Length in characters, which is what users count when told "at least N".
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Fill `{key}` placeholders in a message template.
pub fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{}}}", key), value);
    }
    out
}
