//! Router construction for the Formsmith server.

use std::sync::Arc;

use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Extension, Router,
};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use formsmith_core::service::FormService;

use crate::handlers;
use crate::middleware::jwt::{jwt_auth, JwtConfig};
use crate::share::ShareConfig;

/// Build the full axum router with all routes and middleware.
pub fn build_router(
    service: Arc<dyn FormService>,
    pool: PgPool,
    jwt_config: JwtConfig,
    share_config: ShareConfig,
) -> Router {
    // Routes that require JWT authentication
    let protected = Router::new()
        .route("/auth/me", get(handlers::auth::me))
        .route("/auth/change-password", post(handlers::auth::change_password))
        .route(
            "/auth/request-email-change",
            post(handlers::auth::request_email_change),
        )
        .route(
            "/auth/confirm-email-change",
            post(handlers::auth::confirm_email_change),
        )
        // User administration
        .route("/users", get(handlers::users::list))
        .route(
            "/users/:id",
            get(handlers::users::get)
                .patch(handlers::users::update)
                .delete(handlers::users::delete),
        )
        // Form builder
        .route("/forms", post(handlers::forms::create).get(handlers::forms::list))
        .route(
            "/forms/:id",
            get(handlers::forms::get)
                .put(handlers::forms::replace)
                .delete(handlers::forms::delete),
        )
        .route("/forms/:id/publish", post(handlers::forms::publish))
        .route("/forms/:id/unpublish", post(handlers::forms::unpublish))
        .route("/forms/:id/share", get(handlers::forms::share))
        // Responses & analysis
        .route("/forms/:id/responses", get(handlers::responses::list))
        .route(
            "/forms/:id/responses/:response_id",
            get(handlers::responses::get).delete(handlers::responses::delete),
        )
        .route("/forms/:id/stats", get(handlers::responses::stats))
        .route("/forms/:id/events", get(handlers::responses::events))
        .layer(axum_mw::from_fn(jwt_auth));

    // Public routes (no auth)
    let public = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/forgot-password", post(handlers::auth::forgot_password))
        .route("/auth/reset-password", post(handlers::auth::reset_password))
        .route("/public/forms/:share_code", get(handlers::public::get_form))
        .route(
            "/public/forms/:share_code/responses",
            post(handlers::public::submit),
        )
        .route(
            "/public/forms/:share_code/uploads",
            post(handlers::public::upload),
        );

    // Combine and add shared state
    public
        .merge(protected)
        .layer(Extension(service))
        .layer(Extension(pool))
        .layer(Extension(jwt_config))
        .layer(Extension(share_config))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
