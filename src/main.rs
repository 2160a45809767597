// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact Guard Service
//!
//! Serves `POST /api/contact` for a static site's contact form, forwarding
//! accepted submissions to an email provider.
//!
//! ## Configuration
//!
//! Configuration is loaded from `contact-guard.toml` (or the file named by
//! `CONTACT_GUARD_CONFIG`), then overridden by environment variables:
//!
//! - `CONTACT_GUARD__BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `CONTACT_GUARD__ADMISSION__ALLOWED_ORIGINS`: Comma-separated origins
//! - `CONTACT_GUARD__RATE_LIMIT__MAX_REQUESTS`: Hits per window (default: 5)
//! - `CONTACT_GUARD__RATE_LIMIT__WINDOW_SECS`: Window length (default: 600)
//! - `CONTACT_GUARD__CHALLENGE__SECRET`: Turnstile secret key
//! - `CONTACT_GUARD__MAIL__PROVIDER`: `http_api` or `smtp`
//! - `CONTACT_GUARD__MAIL__API_KEY`: Email API bearer credential
//! - `CONTACT_GUARD__MAIL__SMTP_URL`, `..._SMTP_USERNAME`, `..._SMTP_PASSWORD`
//!
//! A `.env` file in the working directory is read first.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use contact_guard::{
    challenge::TurnstileVerifier, config::Config, handlers::AppState, mailer::build_mailer,
    router, store::MemoryStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::load()?;
    info!(
        bind_addr = %config.bind_addr,
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        challenge_enabled = config.challenge.enabled,
        provider = ?config.mail.provider,
        "Starting contact guard"
    );

    let store = Arc::new(MemoryStore::new(config.rate_limit.max_entries));
    let verifier = Arc::new(TurnstileVerifier::new(&config.challenge)?);
    let mailer = build_mailer(&config.mail)?;

    // Spawn cleanup task
    let cleanup_store = store.clone();
    let cleanup_interval = config.rate_limit.cleanup_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_interval);
        loop {
            interval.tick().await;
            cleanup_store.cleanup().await;
        }
    });

    let addr: SocketAddr = config.bind_addr.parse()?;
    let state = Arc::new(AppState::new(config, store, verifier, mailer));
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
