// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact Guard
//!
//! This crate guards a contact-form endpoint before anything is mailed out.
//! Each submission passes, in order:
//!
//! - Request admission (method, origin allow-list, Content-Type, body size)
//! - Per-IP fixed-window rate limiting over a best-effort TTL cache
//! - Payload validation (honeypot, required fields, lengths, email shape,
//!   link count)
//! - Bot challenge verification (Turnstile compatible)
//! - HTML sanitization and dispatch to an email API or SMTP relay

pub mod admission;
pub mod challenge;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod mailer;
pub mod sanitize;
pub mod store;
pub mod validator;

pub use config::Config;
pub use error::GuardError;
pub use handlers::{router, AppState};
pub use limiter::{RateLimitResult, RateLimiter};
pub use validator::{SubmissionValidator, ValidationResult};
