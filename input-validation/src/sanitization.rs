//! Normalization of accepted submissions
//!
//! Runs strictly after validation. Every function here is pure and total:
//! it never rejects input, it only brings it into the stored shape.

use crate::validation::ValidSubmission;
use common::CaseSubmission;

/// Trim, collapse internal whitespace, and capitalize each word.
///
/// Only the first character of a space-separated word is upper-cased; the
/// rest is lower-cased, so `"o'NEIL"` becomes `"O'neil"`.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Render a 10-digit number as `(XXX) XXX-XXXX`.
///
/// Anything else (international, extensions, short codes) is returned as
/// given apart from surrounding whitespace.
pub fn format_phone_number(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 10 {
        format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..])
    } else {
        phone.trim().to_string()
    }
}

/// Trimmed text, or `None` when nothing is left
fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Turn a validated submission into the record that will be stored
pub fn normalize_submission(valid: ValidSubmission) -> CaseSubmission {
    CaseSubmission {
        full_name: normalize_name(&valid.full_name),
        email: normalize_email(&valid.email),
        phone_number: trimmed(valid.phone_number).map(|p| format_phone_number(&p)),
        date_of_birth: valid.date_of_birth,
        job_title: trimmed(valid.job_title),
        date_of_diagnosis: valid.date_of_diagnosis,
        type_of_diagnosis: valid.type_of_diagnosis,
        message: trimmed(valid.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  jANE   van  DOE "), "Jane Van Doe");
        assert_eq!(normalize_name("o'NEIL"), "O'neil");
        assert_eq!(normalize_name("mary-jane\tsmith"), "Mary-jane Smith");
        assert_eq!(normalize_name("dr. who"), "Dr. Who");
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  Jane.Doe@Example.COM "),
            "jane.doe@example.com"
        );
    }

    #[test]
    fn test_format_phone_number() {
        assert_eq!(format_phone_number("5551234567"), "(555) 123-4567");
        assert_eq!(format_phone_number("555.123.4567"), "(555) 123-4567");
        assert_eq!(format_phone_number("15551234567"), "15551234567");
        assert_eq!(format_phone_number("+442071234567"), "+442071234567");
    }

    #[test]
    fn test_normalize_submission() {
        let valid = ValidSubmission {
            full_name: " john   SMITH ".to_string(),
            email: "John.Smith@Example.com".to_string(),
            phone_number: Some("5551234567".to_string()),
            date_of_birth: None,
            job_title: Some("  Pipe fitter  ".to_string()),
            date_of_diagnosis: None,
            type_of_diagnosis: None,
            message: Some("   ".to_string()),
        };
        let normalized = normalize_submission(valid);
        assert_eq!(normalized.full_name, "John Smith");
        assert_eq!(normalized.email, "john.smith@example.com");
        assert_eq!(normalized.phone_number.as_deref(), Some("(555) 123-4567"));
        assert_eq!(normalized.job_title.as_deref(), Some("Pipe fitter"));
        assert_eq!(normalized.message, None);
    }

    proptest! {
        #[test]
        fn prop_ten_digits_always_formatted(digits in "[0-9]{10}") {
            let formatted = format_phone_number(&digits);
            prop_assert_eq!(formatted.len(), 14);
            let round_trip: String = formatted.chars().filter(char::is_ascii_digit).collect();
            prop_assert_eq!(round_trip, digits);
        }

        #[test]
        fn prop_other_lengths_pass_through(digits in "[1-9][0-9]{10,15}") {
            prop_assert_eq!(format_phone_number(&digits), digits);
        }

        #[test]
        fn prop_name_normalization_is_idempotent(name in "[a-zA-Z '.-]{0,40}") {
            let once = normalize_name(&name);
            prop_assert_eq!(normalize_name(&once), once.clone());
            prop_assert!(!once.starts_with(' ') && !once.ends_with(' '));
            prop_assert!(!once.contains("  "));
        }
    }
}
