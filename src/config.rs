// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the contact guard.
//!
//! Every threshold the pipeline applies lives here as a named option.
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `CONTACT_GUARD__*` environment variables (`__` separates nesting levels,
//! e.g. `CONTACT_GUARD__RATE_LIMIT__MAX_REQUESTS=20`).

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "CONTACT_GUARD";

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "CONTACT_GUARD_CONFIG";

/// Default config file, looked up relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "contact-guard.toml";

/// Errors raised while loading or checking configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for the contact guard service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Request admission and CORS configuration
    #[serde(default)]
    pub admission: AdmissionConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Payload validation configuration
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Bot challenge configuration
    #[serde(default)]
    pub challenge: ChallengeConfig,

    /// Outbound mail configuration
    #[serde(default)]
    pub mail: MailConfig,
}

/// Origin allow-list, content checks, and CORS defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Exact-match origins, plus `scheme://*.suffix` wildcard rules for
    /// preview deployments.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Origin echoed in CORS headers when the request carries none.
    #[serde(default = "default_canonical_origin")]
    pub canonical_origin: String,

    /// Maximum accepted body size in bytes (default: 16 KiB)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Fixed-window rate limiting per client IP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per window per client (default: 5)
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in seconds (default: 600)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Upper bound on tracked clients in the in-memory store (default: 10000)
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Interval between expired-entry sweeps in seconds (default: 60)
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

/// What the guard answers when the honeypot field is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoneypotResponse {
    /// Pretend the message was accepted.
    Deceive,
    /// Reject with 400.
    Reject,
}

/// Payload validation bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Minimum name length in characters (default: 1)
    #[serde(default = "default_name_min")]
    pub name_min: usize,

    /// Maximum name length in characters (default: 80)
    #[serde(default = "default_name_max")]
    pub name_max: usize,

    /// Maximum email length in characters (default: 120)
    #[serde(default = "default_email_max")]
    pub email_max: usize,

    /// Maximum message length in characters (default: 1000)
    #[serde(default = "default_message_max")]
    pub message_max: usize,

    /// Link count at which a message is rejected (default: 3)
    #[serde(default = "default_max_links")]
    pub max_links: usize,

    /// Name of the hidden decoy field (default: "website")
    #[serde(default = "default_honeypot_field")]
    pub honeypot_field: String,

    /// Response policy for a filled honeypot (default: deceive)
    #[serde(default = "default_honeypot_response")]
    pub honeypot_response: HoneypotResponse,
}

/// Challenge-response verification (Turnstile compatible).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeConfig {
    /// Require and verify a challenge token (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Verification endpoint
    #[serde(default = "default_verify_url")]
    pub verify_url: String,

    /// Shared secret; verification fails closed when unset
    #[serde(default)]
    pub secret: Option<String>,

    /// Per-call timeout in seconds (default: 5)
    #[serde(default = "default_challenge_timeout_secs")]
    pub timeout_secs: u64,
}

/// Outbound provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailProvider {
    /// JSON HTTP API with bearer auth (Resend compatible)
    HttpApi,
    /// SMTP relay with username/password auth
    Smtp,
}

/// Outbound mail configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Which transport delivers messages (default: http_api)
    #[serde(default = "default_provider")]
    pub provider: MailProvider,

    /// Sender mailbox
    #[serde(default = "default_from")]
    pub from: String,

    /// Recipient mailbox
    #[serde(default = "default_to")]
    pub to: String,

    /// Subject prefix, followed by the sender's name
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,

    /// HTTP API endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// HTTP API bearer credential
    #[serde(default)]
    pub api_key: Option<String>,

    /// SMTP relay URL, e.g. `smtps://smtp.example.com`
    #[serde(default = "default_smtp_url")]
    pub smtp_url: String,

    /// SMTP username
    #[serde(default)]
    pub smtp_username: Option<String>,

    /// SMTP password
    #[serde(default)]
    pub smtp_password: Option<String>,

    /// Per-call timeout in seconds (default: 10)
    #[serde(default = "default_mail_timeout_secs")]
    pub timeout_secs: u64,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "https://cestfacileti.com".to_string(),
        "https://www.cestfacileti.com".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

fn default_canonical_origin() -> String {
    "https://cestfacileti.com".to_string()
}

fn default_max_body_bytes() -> usize {
    16 * 1024
}

fn default_max_requests() -> u32 {
    5
}

fn default_window_secs() -> u64 {
    600
}

fn default_max_entries() -> usize {
    10_000
}

fn default_cleanup_interval_secs() -> u64 {
    60
}

fn default_name_min() -> usize {
    1
}

fn default_name_max() -> usize {
    80
}

fn default_email_max() -> usize {
    120
}

fn default_message_max() -> usize {
    1000
}

fn default_max_links() -> usize {
    3
}

fn default_honeypot_field() -> String {
    "website".to_string()
}

fn default_honeypot_response() -> HoneypotResponse {
    HoneypotResponse::Deceive
}

fn default_true() -> bool {
    true
}

fn default_verify_url() -> String {
    "https://challenges.cloudflare.com/turnstile/v0/siteverify".to_string()
}

fn default_challenge_timeout_secs() -> u64 {
    5
}

fn default_provider() -> MailProvider {
    MailProvider::HttpApi
}

fn default_from() -> String {
    "Contact Form <noreply@mail.cestfacileti.com>".to_string()
}

fn default_to() -> String {
    "contact@cestfacileti.com".to_string()
}

fn default_subject_prefix() -> String {
    "New message from".to_string()
}

fn default_api_url() -> String {
    "https://api.resend.com/emails".to_string()
}

fn default_smtp_url() -> String {
    "smtps://localhost".to_string()
}

fn default_mail_timeout_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            admission: AdmissionConfig::default(),
            rate_limit: RateLimitConfig::default(),
            validation: ValidationConfig::default(),
            challenge: ChallengeConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
            canonical_origin: default_canonical_origin(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            max_entries: default_max_entries(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            name_min: default_name_min(),
            name_max: default_name_max(),
            email_max: default_email_max(),
            message_max: default_message_max(),
            max_links: default_max_links(),
            honeypot_field: default_honeypot_field(),
            honeypot_response: default_honeypot_response(),
        }
    }
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            verify_url: default_verify_url(),
            secret: None,
            timeout_secs: default_challenge_timeout_secs(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            from: default_from(),
            to: default_to(),
            subject_prefix: default_subject_prefix(),
            api_url: default_api_url(),
            api_key: None,
            smtp_url: default_smtp_url(),
            smtp_username: None,
            smtp_password: None,
            timeout_secs: default_mail_timeout_secs(),
        }
    }
}

impl RateLimitConfig {
    /// Get the rate window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Get the cleanup sweep interval
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

impl ChallengeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl MailConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from defaults, the optional config file, and the
    /// environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("admission.allowed_origins")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.max_requests == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit.max_requests must be at least 1".into(),
            ));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit.window_secs must be at least 1".into(),
            ));
        }
        if self.validation.name_min > self.validation.name_max {
            return Err(ConfigError::Invalid(
                "validation.name_min exceeds validation.name_max".into(),
            ));
        }
        if self.validation.max_links == 0 {
            return Err(ConfigError::Invalid(
                "validation.max_links must be at least 1".into(),
            ));
        }
        if self.validation.honeypot_field.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "validation.honeypot_field must not be empty".into(),
            ));
        }
        if self.mail.to.trim().is_empty() || self.mail.from.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "mail.from and mail.to must be set".into(),
            ));
        }
        if self.admission.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "admission.max_body_bytes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
