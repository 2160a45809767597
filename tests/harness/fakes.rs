// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Recording test doubles for outbound collaborators.

use async_trait::async_trait;
use contact_guard::challenge::ChallengeVerifier;
use contact_guard::mailer::{DispatchError, Mailer, OutboundMessage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Verifier that answers a fixed verdict and counts calls.
pub struct FakeVerifier {
    accept: bool,
    calls: AtomicUsize,
    seen: Mutex<Vec<(String, String)>>,
}

impl FakeVerifier {
    pub fn accepting() -> Self {
        Self::new(true)
    }

    pub fn rejecting() -> Self {
        Self::new(false)
    }

    fn new(accept: bool) -> Self {
        Self {
            accept,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(token, client_ip)` pairs received.
    pub fn seen(&self) -> Vec<(String, String)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChallengeVerifier for FakeVerifier {
    async fn verify(&self, token: &str, client_ip: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((token.to_string(), client_ip.to_string()));
        self.accept
    }
}

/// Mailer that records every message instead of sending it.
pub struct RecordingMailer {
    sent: Mutex<Vec<OutboundMessage>>,
    failure: Option<fn() -> DispatchError>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: None,
        }
    }

    /// Record the message, then fail with the error built by `failure`.
    pub fn failing(failure: fn() -> DispatchError) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: Some(failure),
        }
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DispatchError> {
        self.sent.lock().unwrap().push(message.clone());
        match self.failure {
            Some(failure) => Err(failure()),
            None => Ok(()),
        }
    }
}
