//! User administration handlers.

use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use uuid::Uuid;

use formsmith_core::principal::Principal;
use formsmith_core::proto::*;
use formsmith_core::service::FormService;

use crate::error::AppError;

pub async fn list(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn FormService>>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListUsersResponse>, AppError> {
    let (limit, offset) = page.clamped();
    let users = service.list_users(&principal, limit, offset).await?;
    Ok(Json(ListUsersResponse {
        users: users.iter().map(UserProfile::from).collect(),
    }))
}

pub async fn get(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn FormService>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserProfile>, AppError> {
    let user = service.get_user(&principal, user_id).await?;
    Ok(Json(UserProfile::from(&user)))
}

pub async fn update(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn FormService>>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let user = service.update_user(&principal, user_id, req).await?;
    Ok(Json(UserProfile::from(&user)))
}

pub async fn delete(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn FormService>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<AckResponse>, AppError> {
    service.delete_user(&principal, user_id).await?;
    Ok(Json(AckResponse::ok()))
}
