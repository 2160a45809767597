// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error taxonomy for the submission pipeline.
//!
//! Every variant is terminal for the request. Client-facing text is short and
//! never includes provider detail.

use crate::admission::AdmissionError;
use crate::challenge::ChallengeError;
use crate::mailer::DispatchError;
use crate::validator::ValidationError;
use axum::http::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum GuardError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error("Rate limit exceeded")]
    RateLimited { retry_after: Duration },

    #[error("Malformed body: {0}")]
    MalformedBody(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Challenge(#[from] ChallengeError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl GuardError {
    /// HTTP status reported to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            GuardError::Admission(AdmissionError::MethodNotAllowed(_)) => {
                StatusCode::METHOD_NOT_ALLOWED
            }
            GuardError::Admission(AdmissionError::OriginNotAllowed(_)) => StatusCode::FORBIDDEN,
            GuardError::Admission(AdmissionError::UnsupportedContentType(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            GuardError::Admission(
                AdmissionError::PayloadTooLarge { .. } | AdmissionError::BodyLimitExceeded { .. },
            ) => StatusCode::PAYLOAD_TOO_LARGE,
            GuardError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GuardError::MalformedBody(_) | GuardError::Validation(_) => StatusCode::BAD_REQUEST,
            GuardError::Challenge(ChallengeError::MissingToken) => StatusCode::BAD_REQUEST,
            GuardError::Challenge(ChallengeError::Failed) => StatusCode::FORBIDDEN,
            GuardError::Dispatch(e) if e.is_upstream() => StatusCode::BAD_GATEWAY,
            GuardError::Dispatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain-text body reported to the client.
    pub fn client_message(&self) -> String {
        match self {
            GuardError::Admission(AdmissionError::MethodNotAllowed(_)) => {
                "Method Not Allowed".into()
            }
            GuardError::Admission(AdmissionError::OriginNotAllowed(_)) => "Forbidden".into(),
            GuardError::Admission(AdmissionError::UnsupportedContentType(_)) => {
                "Expected JSON".into()
            }
            GuardError::Admission(
                AdmissionError::PayloadTooLarge { .. } | AdmissionError::BodyLimitExceeded { .. },
            ) => "Payload too large".into(),
            GuardError::RateLimited { .. } => "Too many requests".into(),
            GuardError::MalformedBody(_) => "Invalid JSON".into(),
            GuardError::Validation(e) => e.to_string(),
            GuardError::Challenge(e) => e.to_string(),
            GuardError::Dispatch(e) if e.is_upstream() => "Email error".into(),
            GuardError::Dispatch(_) => "Error".into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, GuardError>;
