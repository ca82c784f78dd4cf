//! formsmith_server — standalone REST server for Formsmith.
//!
//! Reads config from env vars (a .env file is honoured):
//!   FORMSMITH_DATABASE_URL            — Postgres connection string (required)
//!   FORMSMITH_JWT_SECRET              — JWT HMAC secret (required)
//!   FORMSMITH_BIND_ADDR               — listen address (default: 0.0.0.0:4200)
//!   FORMSMITH_PUBLIC_BASE_URL         — base URL for share links (default: http://localhost:4200)
//!   FORMSMITH_MAIL_WEBHOOK_URL        — outbound mail webhook (optional; log-only when unset)
//!   FORMSMITH_OTP_SWEEP_INTERVAL_SECS — OTP sweep interval (default: 60)

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

use formsmith_core::events::EventBus;
use formsmith_core::otp::OtpStore;
use formsmith_core::ports::Mailer;
use formsmith_core::service::{FormService, FormServiceImpl};
use formsmith_postgres::PgStores;
use formsmith_server::mailer::{TracingMailer, WebhookMailer};
use formsmith_server::middleware::jwt::JwtConfig;
use formsmith_server::router::build_router;
use formsmith_server::share::ShareConfig;
use formsmith_server::sweeper::OtpSweeper;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,formsmith_server=debug".into()),
        )
        .init();

    // Read config from environment
    let database_url =
        std::env::var("FORMSMITH_DATABASE_URL").expect("FORMSMITH_DATABASE_URL must be set");
    let jwt_secret =
        std::env::var("FORMSMITH_JWT_SECRET").expect("FORMSMITH_JWT_SECRET must be set");
    let bind_addr =
        std::env::var("FORMSMITH_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:4200".into());
    let public_base_url = std::env::var("FORMSMITH_PUBLIC_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:4200".into());

    // Create PgPool
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("failed to connect to database");

    tracing::info!("Connected to database");

    // Build port implementations
    let stores = PgStores::new(pool.clone());
    let mailer: Arc<dyn Mailer> = match std::env::var("FORMSMITH_MAIL_WEBHOOK_URL") {
        Ok(url) => {
            tracing::info!(%url, "mail delivery via webhook");
            Arc::new(WebhookMailer::new(url))
        }
        Err(_) => {
            tracing::warn!("FORMSMITH_MAIL_WEBHOOK_URL not set — mail is log-only");
            Arc::new(TracingMailer)
        }
    };

    let otp = Arc::new(OtpStore::new());
    let events = EventBus::new();

    let service: Arc<dyn FormService> = Arc::new(FormServiceImpl::new(
        Arc::new(stores.users),
        Arc::new(stores.forms),
        Arc::new(stores.responses),
        mailer,
        Arc::clone(&otp),
        Arc::clone(&events),
    ));

    // Start the OTP sweeper as a background task
    let sweep_interval_secs: u64 = std::env::var("FORMSMITH_OTP_SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(60);
    let sweeper = OtpSweeper::new(
        Arc::clone(&otp),
        Arc::clone(&events),
        Duration::from_secs(sweep_interval_secs),
    );
    tokio::spawn(async move {
        sweeper.run().await;
    });

    // Build JWT + share config
    let jwt_config = JwtConfig::from_secret(jwt_secret.as_bytes());
    let share_config = ShareConfig { public_base_url };

    // Build router
    let app = build_router(service, pool, jwt_config, share_config);

    // Bind and serve
    let listener = TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind to {bind_addr}: {e}"));
    tracing::info!("formsmith_server listening on {bind_addr}");

    axum::serve(listener, app).await.expect("server error");
}
