//! Form validation helpers
//!
//! Checks used by registration and the CLI before anything is sent to the
//! auth backend.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

const SPECIAL_CHARS: &str = "!@#$%^&*()_+-=[]{};':\"\\|,.<>/?";

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| {
            Regex::new(
                r#"^(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))@((\[[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\])|(([a-zA-Z\-0-9]+\.)+[a-zA-Z]{2,}))$"#,
            )
            .ok()
        })
        .as_ref()
}

/// Whether `email` is a well-formed address
pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_some_and(|re| re.is_match(email))
}

/// Requirements checked by [`validate_password`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_numbers: bool,
    pub require_special_chars: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: true,
            require_lowercase: true,
            require_numbers: true,
            require_special_chars: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordStrength {
    Weak,
    Medium,
    Strong,
}

/// Outcome of a password check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordReport {
    pub errors: Vec<String>,
    pub strength: PasswordStrength,
}

impl PasswordReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

fn has_special(password: &str) -> bool {
    password.chars().any(|c| SPECIAL_CHARS.contains(c))
}

/// Check `password` against `policy` and grade its strength.
///
/// Strength only rises above weak once the minimum length is met. The score
/// is a length bonus of one point per four characters (at most two) plus one
/// point per character class present; five or more is strong, three or more
/// medium.
pub fn validate_password(password: &str, policy: &PasswordPolicy) -> PasswordReport {
    let length = password.chars().count();
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = has_special(password);

    let mut errors = Vec::new();
    if length < policy.min_length {
        errors.push(format!(
            "Password must be at least {} characters long",
            policy.min_length
        ));
    }
    if policy.require_uppercase && !has_upper {
        errors.push("Password must contain at least one uppercase letter".to_string());
    }
    if policy.require_lowercase && !has_lower {
        errors.push("Password must contain at least one lowercase letter".to_string());
    }
    if policy.require_numbers && !has_digit {
        errors.push("Password must contain at least one number".to_string());
    }
    if policy.require_special_chars && !has_special {
        errors.push("Password must contain at least one special character".to_string());
    }

    let strength = if length >= policy.min_length {
        let score = (length / 4).min(2)
            + [has_upper, has_lower, has_digit, has_special]
                .iter()
                .filter(|present| **present)
                .count();
        match score {
            5.. => PasswordStrength::Strong,
            3..=4 => PasswordStrength::Medium,
            _ => PasswordStrength::Weak,
        }
    } else {
        PasswordStrength::Weak
    };

    PasswordReport { errors, strength }
}

/// Whether `url` parses as an absolute URL
pub fn is_valid_url(url: &str) -> bool {
    reqwest::Url::parse(url).is_ok()
}

/// Phone number check. For `US`, the digits must be ten long, optionally
/// preceded by a country code of 1. Other countries only need a digit.
pub fn is_valid_phone(phone: &str, country_code: &str) -> bool {
    if country_code.eq_ignore_ascii_case("US") {
        let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
        return digits.len() == 10 || (digits.len() == 11 && digits.starts_with('1'));
    }
    phone.chars().any(|c| c.is_ascii_digit())
}

/// Luhn check over a card number; spaces and dashes are ignored
pub fn is_valid_credit_card(card_number: &str) -> bool {
    let digits: Vec<u32> = match card_number
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_digit(10))
        .collect::<Option<Vec<_>>>()
    {
        Some(d) if !d.is_empty() => d,
        _ => return false,
    };

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}

/// Inclusive range check
pub fn is_within_range<T: PartialOrd>(value: T, min: T, max: T) -> bool {
    value >= min && value <= max
}
