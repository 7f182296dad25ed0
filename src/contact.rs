//! Contact classification and normalization.
//!
//! Anything containing `@` is treated as an email and lowercased. Everything
//! else must parse as a phone number and is rewritten to E.164.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactType {
    Phone,
    Email,
}

impl fmt::Display for ContactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactType::Phone => write!(f, "phone"),
            ContactType::Email => write!(f, "email"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contact {
    pub kind: ContactType,
    /// E.164 phone number or lowercased email.
    pub value: String,
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
}

fn phone_separators() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[\s\-.()]").unwrap())
}

fn e164_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\+[1-9][0-9]{6,14}$").unwrap())
}

#[derive(Clone, Debug)]
pub struct ContactNormalizer {
    default_country_code: String,
}

impl ContactNormalizer {
    pub fn new(default_country_code: impl Into<String>) -> Self {
        let default_country_code = default_country_code.into();
        Self {
            default_country_code: default_country_code.trim_start_matches('+').to_string(),
        }
    }

    pub fn normalize(&self, raw: &str) -> Result<Contact, AppError> {
        let raw = raw.trim();
        if raw.contains('@') {
            let email = raw.to_lowercase();
            if !email_pattern().is_match(&email) {
                return Err(AppError::InvalidContact(raw.to_string()));
            }
            return Ok(Contact {
                kind: ContactType::Email,
                value: email,
            });
        }
        let phone = self
            .to_e164(raw)
            .ok_or_else(|| AppError::InvalidContact(raw.to_string()))?;
        Ok(Contact {
            kind: ContactType::Phone,
            value: phone,
        })
    }

    fn to_e164(&self, raw: &str) -> Option<String> {
        let compact = phone_separators().replace_all(raw, "");
        let candidate = if compact.starts_with('+') {
            compact.to_string()
        } else {
            if compact.is_empty() || !compact.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            let with_country = compact.len() == 10 + self.default_country_code.len()
                && compact.starts_with(&self.default_country_code);
            match compact.len() {
                10 => format!("+{}{}", self.default_country_code, compact),
                _ if with_country => format!("+{compact}"),
                _ => return None,
            }
        };
        e164_pattern().is_match(&candidate).then_some(candidate)
    }
}

impl Default for ContactNormalizer {
    fn default() -> Self {
        Self::new("1")
    }
}
