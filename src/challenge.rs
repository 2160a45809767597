// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Bot challenge verification.
//!
//! Integrates with a Turnstile-compatible `siteverify` endpoint. A single
//! attempt is made per submission and every failure mode fails closed.

use crate::config::ChallengeConfig;
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Challenge failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("Missing captcha")]
    MissingToken,

    #[error("Captcha failed")]
    Failed,
}

/// Server-side check of a challenge token.
#[async_trait]
pub trait ChallengeVerifier: Send + Sync {
    /// `true` only when the remote service positively confirms the token.
    async fn verify(&self, token: &str, client_ip: &str) -> bool;
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    #[serde(default)]
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// Turnstile `siteverify` client.
pub struct TurnstileVerifier {
    verify_url: String,
    secret: Option<String>,
    client: reqwest::Client,
}

impl TurnstileVerifier {
    /// Create a verifier; the configured timeout bounds each call.
    pub fn new(config: &ChallengeConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            verify_url: config.verify_url.clone(),
            secret: config.secret.clone().filter(|s| !s.trim().is_empty()),
            client,
        })
    }

    async fn siteverify(&self, secret: &str, token: &str, client_ip: &str) -> Result<bool, reqwest::Error> {
        let response = self
            .client
            .post(&self.verify_url)
            .form(&[("secret", secret), ("response", token), ("remoteip", client_ip)])
            .send()
            .await?
            .error_for_status()?;

        let body: SiteVerifyResponse = response.json().await?;
        if !body.success {
            debug!(error_codes = ?body.error_codes, "Challenge rejected by verifier");
        }
        Ok(body.success)
    }
}

#[async_trait]
impl ChallengeVerifier for TurnstileVerifier {
    async fn verify(&self, token: &str, client_ip: &str) -> bool {
        let Some(secret) = self.secret.as_deref() else {
            warn!("Challenge secret not configured, failing verification");
            return false;
        };

        match self.siteverify(secret, token, client_ip).await {
            Ok(success) => success,
            Err(e) => {
                warn!(error = %e, "Challenge verification call failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn verifier(server: &MockServer, secret: Option<&str>) -> TurnstileVerifier {
        TurnstileVerifier::new(&ChallengeConfig {
            enabled: true,
            verify_url: server.url("/siteverify"),
            secret: secret.map(str::to_string),
            timeout_secs: 2,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_success_flag_accepted() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/siteverify")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body_contains("secret=s3cret")
                    .body_contains("response=tok")
                    .body_contains("remoteip=203.0.113.5");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"success":true}"#);
            })
            .await;

        assert!(verifier(&server, Some("s3cret")).verify("tok", "203.0.113.5").await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_failure_flag_rejected() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/siteverify");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"success":false,"error-codes":["invalid-input-response"]}"#);
            })
            .await;

        assert!(!verifier(&server, Some("s3cret")).verify("bad", "0.0.0.0").await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_malformed_and_error_responses_fail_closed() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/siteverify");
                then.status(200).body("not json");
            })
            .await;
        assert!(!verifier(&server, Some("s3cret")).verify("tok", "0.0.0.0").await);
        mock.assert_async().await;

        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/siteverify");
                then.status(500).body(r#"{"success":true}"#);
            })
            .await;
        assert!(!verifier(&server, Some("s3cret")).verify("tok", "0.0.0.0").await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_timeout_fails_closed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/siteverify");
                then.status(200)
                    .delay(Duration::from_secs(5))
                    .body(r#"{"success":true}"#);
            })
            .await;

        let verifier = TurnstileVerifier::new(&ChallengeConfig {
            enabled: true,
            verify_url: server.url("/siteverify"),
            secret: Some("s3cret".into()),
            timeout_secs: 1,
        })
        .unwrap();
        assert!(!verifier.verify("tok", "0.0.0.0").await);
    }

    #[tokio::test]
    async fn test_missing_secret_makes_no_call() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/siteverify");
                then.status(200).body(r#"{"success":true}"#);
            })
            .await;

        assert!(!verifier(&server, None).verify("tok", "0.0.0.0").await);
        mock.assert_hits_async(0).await;
    }
}
