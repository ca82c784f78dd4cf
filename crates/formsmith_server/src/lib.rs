//! Formsmith REST server — axum with JWT auth and an SSE response feed.

pub mod error;
pub mod handlers;
pub mod mailer;
pub mod middleware;
pub mod router;
pub mod share;
pub mod sweeper;
