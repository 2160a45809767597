// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the contact guard.
//!
//! A submission moves through admission, rate limiting, validation, challenge
//! verification, and dispatch in that order. The first failing stage decides
//! the response and nothing after it runs. Every response carries the CORS
//! headers computed from the request origin.

use crate::admission::{client_ip, Admission, AdmissionError, AdmissionGuard};
use crate::challenge::{ChallengeError, ChallengeVerifier};
use crate::config::Config;
use crate::error::{GuardError, Result};
use crate::limiter::{RateLimitResult, RateLimiter};
use crate::mailer::{Mailer, OutboundMessage};
use crate::store::RateLimitStore;
use crate::validator::{Submission, SubmissionValidator, ValidationResult};
use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, FailedToBufferBody},
        ConnectInfo, DefaultBodyLimit, FromRequest, Request, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::Serialize;
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

/// Path of the submission endpoint.
pub const CONTACT_PATH: &str = "/api/contact";

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub admission: AdmissionGuard,
    pub limiter: RateLimiter,
    pub validator: SubmissionValidator,
    pub verifier: Arc<dyn ChallengeVerifier>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    /// Assemble the pipeline around injected collaborators.
    pub fn new(
        config: Config,
        store: Arc<dyn RateLimitStore>,
        verifier: Arc<dyn ChallengeVerifier>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            admission: AdmissionGuard::new(config.admission.clone()),
            limiter: RateLimiter::new(config.rate_limit.clone(), store),
            validator: SubmissionValidator::new(config.validation.clone()),
            verifier,
            mailer,
            config,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// How a request that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Preflight,
    Sent,
    Honeypot,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.admission.max_body_bytes();
    // Panic responses fall back to the canonical origin.
    let panic_cors = state.admission.cors_headers(&HeaderMap::new());

    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route(CONTACT_PATH, any(contact))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(
            move |_: Box<dyn Any + Send + 'static>| {
                error!("Handler panicked");
                (StatusCode::INTERNAL_SERVER_ERROR, panic_cors.clone(), "Error").into_response()
            },
        ))
        .with_state(state)
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "contact-guard",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Contact form endpoint; accepts every method so rejections carry CORS
/// headers.
pub async fn contact(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
) -> Response {
    let mut cors = state.admission.cors_headers(request.headers());
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    let client = client_ip(request.headers(), peer);

    match process(&state, &client, request).await {
        Ok(Outcome::Preflight) => (StatusCode::NO_CONTENT, cors).into_response(),
        Ok(Outcome::Sent) => {
            info!(client = %client, "Contact message dispatched");
            (StatusCode::OK, cors, "OK").into_response()
        }
        Ok(Outcome::Honeypot) => {
            info!(client = %client, "Honeypot triggered, message dropped");
            (StatusCode::OK, cors, "OK").into_response()
        }
        Err(err) => {
            let status = err.status();
            match &err {
                GuardError::Dispatch(e) => {
                    error!(client = %client, error = %e, "Contact message dispatch failed")
                }
                GuardError::RateLimited { retry_after } => {
                    let secs = retry_after.as_secs().max(1);
                    if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                        cors.insert(header::RETRY_AFTER, value);
                    }
                    info!(client = %client, retry_after_secs = secs, "Request rate limited");
                }
                _ => info!(client = %client, status = status.as_u16(), error = %err, "Request rejected"),
            }
            (status, cors, err.client_message()).into_response()
        }
    }
}

async fn process(state: &AppState, client: &str, request: Request) -> Result<Outcome> {
    if state.admission.admit(request.method(), request.headers())? == Admission::Preflight {
        return Ok(Outcome::Preflight);
    }

    if let RateLimitResult::Limited { retry_after } =
        state.limiter.check_and_increment(client).await
    {
        return Err(GuardError::RateLimited { retry_after });
    }

    let body = read_body(request, state.admission.max_body_bytes()).await?;
    let submission: Submission = serde_json::from_slice(&body)
        .map_err(|e| GuardError::MalformedBody(e.to_string()))?;

    let valid = match state.validator.validate(&submission) {
        ValidationResult::Valid(valid) => valid,
        ValidationResult::Honeypot => return Ok(Outcome::Honeypot),
        ValidationResult::Invalid(e) => return Err(e.into()),
    };

    if state.config.challenge.enabled {
        let token = valid
            .challenge_token
            .as_deref()
            .ok_or(ChallengeError::MissingToken)?;
        if !state.verifier.verify(token, client).await {
            warn!(client = %client, "Challenge verification failed");
            return Err(ChallengeError::Failed.into());
        }
        debug!(client = %client, "Challenge verified");
    }

    let message = OutboundMessage::compose(&valid, &state.config.mail);
    state.mailer.send(&message).await?;

    Ok(Outcome::Sent)
}

async fn read_body(request: Request, limit: usize) -> Result<Bytes> {
    match Bytes::from_request(request, &()).await {
        Ok(bytes) => Ok(bytes),
        Err(BytesRejection::FailedToBufferBody(FailedToBufferBody::LengthLimitError(_))) => {
            Err(AdmissionError::BodyLimitExceeded { limit }.into())
        }
        Err(e) => Err(GuardError::MalformedBody(e.to_string())),
    }
}
