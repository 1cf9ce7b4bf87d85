use regex::Regex;
use std::sync::OnceLock;

fn indian_phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\+91)?[6-9]\d{9}$").unwrap())
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap())
}

/// Normalize a raw phone entry to `+91XXXXXXXXXX` where possible: strip
/// whitespace and leading zeros, prefix the country code for bare 10-digit
/// numbers. Anything else is returned as-is for validation to reject.
pub fn normalize_phone(raw: &str) -> String {
    let mut phone: String = raw.split_whitespace().collect();
    if !phone.starts_with("+91") {
        phone = phone.trim_start_matches('0').to_string();
        if phone.len() == 10 {
            phone = format!("+91{}", phone);
        }
    }
    phone
}

pub fn is_valid_indian_phone(phone: &str) -> bool {
    indian_phone_regex().is_match(phone)
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_ten_digit_numbers_gain_country_code() {
        assert_eq!(normalize_phone("9876543210"), "+919876543210");
        assert_eq!(normalize_phone("09876543210"), "+919876543210");
        assert_eq!(normalize_phone("98765 43210"), "+919876543210");
    }

    #[test]
    fn prefixed_numbers_pass_through() {
        assert_eq!(normalize_phone("+919876543210"), "+919876543210");
    }

    #[test]
    fn validates_indian_mobile_ranges() {
        assert!(is_valid_indian_phone("+919876543210"));
        assert!(is_valid_indian_phone("9876543210"));
        // Mobile numbers start at 6
        assert!(!is_valid_indian_phone("+911234567890"));
        assert!(!is_valid_indian_phone("+9198765"));
    }

    #[test]
    fn validates_email_shape() {
        assert!(is_valid_email("asha@example.com"));
        assert!(!is_valid_email("asha@"));
        assert!(!is_valid_email("not an email"));
    }
}
