// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Contact submission validator.
//!
//! Implements the payload checks, each a fast-fail in this order:
//! - Honeypot decoy field
//! - Required fields (name, email, message)
//! - Length bounds
//! - Email shape
//! - Link-count spam heuristic

use crate::config::{HoneypotResponse, ValidationConfig};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

/// Validation error types. The display text is what the client sees.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid input")]
    MissingFields,

    #[error("Name too short")]
    NameTooShort,

    #[error("Name too long")]
    NameTooLong,

    #[error("Email too long")]
    EmailTooLong,

    #[error("Message too long")]
    MessageTooLong,

    #[error("Invalid email")]
    InvalidEmail,

    #[error("Too many links")]
    TooManyLinks,

    #[error("Rejected")]
    HoneypotRejected,
}

/// Raw submission body as posted by the contact form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "challengeToken", alias = "turnstileToken")]
    pub challenge_token: Option<String>,
    /// Remaining fields; the honeypot is looked up here by its configured name.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl Submission {
    /// Value of the decoy field, stringified, if present.
    pub fn honeypot_value(&self, field: &str) -> Option<String> {
        match self.extra.get(field)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Submission that passed every check, with fields trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSubmission {
    pub name: String,
    pub email: String,
    pub message: String,
    pub challenge_token: Option<String>,
}

/// Result of validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Submission may continue to challenge verification
    Valid(ValidSubmission),
    /// Decoy field was filled; answer success and send nothing
    Honeypot,
    /// Submission is invalid
    Invalid(ValidationError),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid(_))
    }

    pub fn error(&self) -> Option<&ValidationError> {
        match self {
            ValidationResult::Invalid(e) => Some(e),
            _ => None,
        }
    }
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // One '@', non-empty local part, dotted domain, no whitespace.
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("email pattern is valid")
    })
}

/// Case-insensitive count of `http://` and `https://` occurrences.
pub fn count_links(text: &str) -> usize {
    let lower = text.to_lowercase();
    lower.matches("http://").count() + lower.matches("https://").count()
}

/// Contact submission validator.
pub struct SubmissionValidator {
    config: ValidationConfig,
}

impl SubmissionValidator {
    /// Create a new validator with the given configuration.
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Whether the decoy field carries anything but whitespace.
    pub fn honeypot_triggered(&self, submission: &Submission) -> bool {
        submission
            .honeypot_value(&self.config.honeypot_field)
            .is_some_and(|v| !v.trim().is_empty())
    }

    /// Validate a complete submission.
    pub fn validate(&self, submission: &Submission) -> ValidationResult {
        if self.honeypot_triggered(submission) {
            debug!(field = %self.config.honeypot_field, "Honeypot field filled");
            return match self.config.honeypot_response {
                HoneypotResponse::Deceive => ValidationResult::Honeypot,
                HoneypotResponse::Reject => {
                    ValidationResult::Invalid(ValidationError::HoneypotRejected)
                }
            };
        }

        let (name, email, message) = match (
            non_blank(&submission.name),
            non_blank(&submission.email),
            non_blank(&submission.message),
        ) {
            (Some(name), Some(email), Some(message)) => (name, email, message),
            _ => {
                debug!("Missing required field");
                return ValidationResult::Invalid(ValidationError::MissingFields);
            }
        };

        if let Err(err) = self.check_lengths(name, email, message) {
            debug!(error = %err, "Length bound violated");
            return ValidationResult::Invalid(err);
        }

        if !email_pattern().is_match(email) {
            debug!("Email failed shape check");
            return ValidationResult::Invalid(ValidationError::InvalidEmail);
        }

        let links = count_links(message);
        if links >= self.config.max_links {
            debug!(links, max_links = self.config.max_links, "Too many links");
            return ValidationResult::Invalid(ValidationError::TooManyLinks);
        }

        ValidationResult::Valid(ValidSubmission {
            name: name.to_string(),
            email: email.to_string(),
            message: message.to_string(),
            challenge_token: non_blank(&submission.challenge_token).map(str::to_string),
        })
    }

    fn check_lengths(&self, name: &str, email: &str, message: &str) -> Result<(), ValidationError> {
        let name_len = name.chars().count();
        if name_len < self.config.name_min {
            return Err(ValidationError::NameTooShort);
        }
        if name_len > self.config.name_max {
            return Err(ValidationError::NameTooLong);
        }
        if email.chars().count() > self.config.email_max {
            return Err(ValidationError::EmailTooLong);
        }
        if message.chars().count() > self.config.message_max {
            return Err(ValidationError::MessageTooLong);
        }
        Ok(())
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
