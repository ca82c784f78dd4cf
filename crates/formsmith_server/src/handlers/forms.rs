//! Form builder handlers — CRUD, publish toggle, share link.

use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use uuid::Uuid;

use formsmith_core::principal::Principal;
use formsmith_core::proto::*;
use formsmith_core::service::FormService;
use formsmith_core::types::Form;

use crate::error::AppError;
use crate::share::{share_response, ShareConfig};

fn summary(form: &Form, response_count: i64) -> FormSummary {
    FormSummary {
        form_id: form.form_id,
        title: form.title.clone(),
        description: form.description.clone(),
        is_published: form.is_published,
        share_code: form.share_code.clone(),
        response_count,
        created_at: form.created_at,
        updated_at: form.updated_at,
    }
}

pub async fn create(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn FormService>>,
    Json(req): Json<CreateFormRequest>,
) -> Result<Json<FormDetail>, AppError> {
    let form = service.create_form(&principal, req).await?;
    Ok(Json(FormDetail::from(&form)))
}

pub async fn list(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn FormService>>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListFormsResponse>, AppError> {
    let (limit, offset) = page.clamped();
    let forms = service.list_forms(&principal, limit, offset).await?;
    Ok(Json(ListFormsResponse {
        forms: forms.iter().map(|(f, n)| summary(f, *n)).collect(),
    }))
}

pub async fn get(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn FormService>>,
    Path(form_id): Path<Uuid>,
) -> Result<Json<FormDetail>, AppError> {
    let form = service.get_form(&principal, form_id).await?;
    Ok(Json(FormDetail::from(&form)))
}

pub async fn replace(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn FormService>>,
    Path(form_id): Path<Uuid>,
    Json(req): Json<ReplaceFormRequest>,
) -> Result<Json<FormDetail>, AppError> {
    let form = service.replace_form(&principal, form_id, req).await?;
    Ok(Json(FormDetail::from(&form)))
}

pub async fn delete(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn FormService>>,
    Path(form_id): Path<Uuid>,
) -> Result<Json<AckResponse>, AppError> {
    service.delete_form(&principal, form_id).await?;
    Ok(Json(AckResponse::ok()))
}

pub async fn publish(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn FormService>>,
    Path(form_id): Path<Uuid>,
) -> Result<Json<FormDetail>, AppError> {
    let form = service.set_published(&principal, form_id, true).await?;
    Ok(Json(FormDetail::from(&form)))
}

pub async fn unpublish(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn FormService>>,
    Path(form_id): Path<Uuid>,
) -> Result<Json<FormDetail>, AppError> {
    let form = service.set_published(&principal, form_id, false).await?;
    Ok(Json(FormDetail::from(&form)))
}

pub async fn share(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn FormService>>,
    Extension(config): Extension<ShareConfig>,
    Path(form_id): Path<Uuid>,
) -> Result<Json<ShareResponse>, AppError> {
    let form = service.get_form(&principal, form_id).await?;
    Ok(Json(share_response(&config, &form)?))
}
