// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for driving the contact guard router in-process.
//!
//! Provides recording doubles for the challenge verifier and the mailer, a
//! mock clock for the rate-limit store, and request builders.

#![allow(dead_code)]

pub mod fakes;
pub mod generators;

use axum::{
    body::{to_bytes, Body},
    http::{Request, Response},
    Router,
};
use contact_guard::{clock::MockClock, config::Config, router, store::MemoryStore, AppState};
use fakes::{FakeVerifier, RecordingMailer};
use std::sync::Arc;
use tower::ServiceExt;

/// Router plus handles on every injected collaborator.
pub struct TestApp {
    pub router: Router,
    pub verifier: Arc<FakeVerifier>,
    pub mailer: Arc<RecordingMailer>,
    pub clock: MockClock,
}

impl TestApp {
    pub fn new(config: Config) -> Self {
        Self::with_doubles(config, FakeVerifier::accepting(), RecordingMailer::new())
    }

    pub fn with_doubles(config: Config, verifier: FakeVerifier, mailer: RecordingMailer) -> Self {
        let clock = MockClock::default();
        let store = Arc::new(MemoryStore::with_clock(
            config.rate_limit.max_entries,
            Arc::new(clock.clone()),
        ));
        let verifier = Arc::new(verifier);
        let mailer = Arc::new(mailer);
        let state = AppState::new(config, store, verifier.clone(), mailer.clone());

        Self {
            router: router(Arc::new(state)),
            verifier,
            mailer,
            clock,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (Response<Body>, String) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let (parts, body) = response.into_parts();
        let bytes = to_bytes(body, usize::MAX).await.unwrap();
        (
            Response::from_parts(parts, Body::empty()),
            String::from_utf8_lossy(&bytes).into_owned(),
        )
    }
}

/// Configuration with the allow-list used across tests.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.admission.allowed_origins = vec![
        "https://example.com".to_string(),
        "https://*.preview.example.dev".to_string(),
    ];
    config.admission.canonical_origin = "https://example.com".to_string();
    config
}

/// JSON POST to the contact endpoint from `ip`.
pub fn post_json(body: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/contact")
        .header("content-type", "application/json")
        .header("origin", "https://example.com")
        .header("cf-connecting-ip", ip)
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// The canonical valid submission.
pub fn alice_body() -> String {
    serde_json::json!({
        "name": "Alice",
        "email": "a@b.com",
        "message": "Hello",
        "challengeToken": "valid-token",
    })
    .to_string()
}
