//! Auth handlers.
//!
//! POST /auth/register             — create account
//! POST /auth/login                — password check, returns JWT
//! GET  /auth/me                   — current profile
//! POST /auth/change-password      — verify current, set new
//! POST /auth/forgot-password      — issue reset OTP (always 200)
//! POST /auth/reset-password       — OTP + new password
//! POST /auth/request-email-change — issue OTP to the new address
//! POST /auth/confirm-email-change — OTP, swaps the address

use std::sync::Arc;

use axum::{Extension, Json};

use formsmith_core::principal::Principal;
use formsmith_core::proto::*;
use formsmith_core::service::FormService;

use crate::error::AppError;
use crate::middleware::jwt::JwtConfig;

pub async fn register(
    Extension(service): Extension<Arc<dyn FormService>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let user = service.register(req).await?;
    Ok(Json(UserProfile::from(&user)))
}

pub async fn login(
    Extension(service): Extension<Arc<dyn FormService>>,
    Extension(jwt): Extension<JwtConfig>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = service.authenticate(&req.email, &req.password).await?;
    let token = jwt.sign(&user)?;
    Ok(Json(LoginResponse {
        token,
        user: UserProfile::from(&user),
    }))
}

pub async fn me(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn FormService>>,
) -> Result<Json<UserProfile>, AppError> {
    let user = service.get_profile(&principal).await?;
    Ok(Json(UserProfile::from(&user)))
}

pub async fn change_password(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn FormService>>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<AckResponse>, AppError> {
    service.change_password(&principal, req).await?;
    Ok(Json(AckResponse::ok()))
}

pub async fn forgot_password(
    Extension(service): Extension<Arc<dyn FormService>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<AckResponse>, AppError> {
    service.forgot_password(&req.email).await?;
    Ok(Json(AckResponse::ok()))
}

pub async fn reset_password(
    Extension(service): Extension<Arc<dyn FormService>>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<AckResponse>, AppError> {
    service.reset_password(req).await?;
    Ok(Json(AckResponse::ok()))
}

pub async fn request_email_change(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn FormService>>,
    Json(req): Json<RequestEmailChangeRequest>,
) -> Result<Json<AckResponse>, AppError> {
    service
        .request_email_change(&principal, &req.new_email)
        .await?;
    Ok(Json(AckResponse::ok()))
}

pub async fn confirm_email_change(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn FormService>>,
    Json(req): Json<ConfirmEmailChangeRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let user = service.confirm_email_change(&principal, &req.code).await?;
    Ok(Json(UserProfile::from(&user)))
}
