//! Contact-detail validation shared by the scoring engine.
//!
//! Format checks and placeholder detection are kept apart: a malformed
//! address costs the lead some quality, a placeholder one feeds the
//! fake-lead check.

use once_cell::sync::Lazy;
use phonenumber::country::Id as CountryId;
use phonenumber::Mode;
use regex::Regex;

// RFC 5322 simplified: local@domain.tld
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
    )
    .unwrap()
});

/// Repeated / sequential digit runs typed into forms to get past validation.
const FAKE_EMAIL_PATTERNS: &[&str] = &["999999", "111111", "000000", "123456789"];

const DISPOSABLE_EMAIL_DOMAINS: &[&str] = &[
    "mailinator.com",
    "tempmail.com",
    "10minutemail.com",
    "guerrillamail.com",
    "yopmail.com",
    "trashmail.com",
    "example.com",
    "test.com",
    "fake.com",
];

/// Validate email address format.
///
/// Checks for:
/// - Minimum length and presence of `@` and `.`
/// - RFC 5322 simplified structure with a dotted domain
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    if !EMAIL_REGEX.is_match(email) {
        tracing::debug!("Invalid email format: {}", email);
        return false;
    }

    true
}

/// Detect placeholder or throwaway addresses (repeated digits, disposable domains).
pub fn is_placeholder_email(email: &str) -> bool {
    let email = email.trim().to_lowercase();

    if let Some(pattern) = FAKE_EMAIL_PATTERNS.iter().find(|p| email.contains(*p)) {
        tracing::warn!("Placeholder email detected (pattern '{}'): {}", pattern, email);
        return true;
    }

    let domain = email.rsplit('@').next().unwrap_or_default();
    if DISPOSABLE_EMAIL_DOMAINS.contains(&domain) {
        tracing::warn!("Disposable email domain detected: {}", email);
        return true;
    }

    false
}

/// Validate and normalize a phone number, defaulting to the UK region.
///
/// Numbers carrying an international prefix are validated against their own
/// country, so overseas buyers are accepted.
///
/// Returns: (is_valid, normalized_phone_or_error_msg)
pub fn validate_uk_phone(raw: &str) -> (bool, String) {
    if raw.trim().is_empty() || raw.len() < 7 {
        return (false, "Phone too short".to_string());
    }

    match phonenumber::parse(Some(CountryId::GB), raw) {
        Ok(number) => {
            if phonenumber::is_valid(&number) {
                let formatted = number.format().mode(Mode::E164).to_string();
                tracing::debug!("Valid phone: {} -> {}", raw, formatted);
                (true, formatted)
            } else {
                tracing::debug!("Invalid phone number: {}", raw);
                (false, "Invalid phone number".to_string())
            }
        }
        Err(e) => {
            tracing::debug!("Failed to parse phone '{}': {:?}", raw, e);
            (false, format!("Parse error: {:?}", e))
        }
    }
}

/// Detect placeholder numbers: one digit repeated, or the whole number ascending.
pub fn is_placeholder_phone(raw: &str) -> bool {
    let digits: Vec<u8> = raw
        .chars()
        .filter_map(|c| c.to_digit(10).map(|d| d as u8))
        .collect();

    // Drop a UK trunk prefix / country code before looking for runs
    let national: &[u8] = match digits.as_slice() {
        [4, 4, rest @ ..] => rest,
        [0, rest @ ..] => rest,
        other => other,
    };

    if national.len() < 6 {
        return false;
    }

    let repeated = national.windows(2).filter(|w| w[0] == w[1]).count();
    if repeated + 1 >= national.len() - 1 {
        return true;
    }

    national.windows(2).all(|w| w[1] == (w[0] + 1) % 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("sarah.mitchell@gmail.com"));
        assert!(is_valid_email("buyer+dev@naybourhood.co.uk"));
        assert!(is_valid_email("  padded@domain.io  "));
    }

    #[test]
    fn test_invalid_emails() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("userexample.com"));
        assert!(!is_valid_email("user@examplecom"));
        assert!(!is_valid_email("user @example.com"));
    }

    #[test]
    fn test_placeholder_emails() {
        assert!(is_placeholder_email("07999999999@gmail.com"));
        assert!(is_placeholder_email("someone@mailinator.com"));
        assert!(is_placeholder_email("TEST@EXAMPLE.COM"));
        assert!(!is_placeholder_email("sarah.mitchell@gmail.com"));
    }

    #[test]
    fn test_uk_phones() {
        let (valid, normalized) = validate_uk_phone("07400 123456");
        assert!(valid);
        assert_eq!(normalized, "+447400123456");

        let (valid, normalized) = validate_uk_phone("+44 7400 123456");
        assert!(valid);
        assert_eq!(normalized, "+447400123456");

        let (valid, _) = validate_uk_phone("12345");
        assert!(!valid);

        let (valid, _) = validate_uk_phone("");
        assert!(!valid);
    }

    #[test]
    fn test_placeholder_phones() {
        assert!(is_placeholder_phone("07777777777"));
        assert!(is_placeholder_phone("01234567890"));
        assert!(is_placeholder_phone("+44 1111 111111"));
        assert!(!is_placeholder_phone("07400 123456"));
        assert!(!is_placeholder_phone("123"));
    }
}
