//! Public handlers — the respondent side. No auth; forms are addressed
//! by share code, and unknown/unpublished are the same 404.

use std::sync::Arc;

use axum::extract::Path;
use axum::{Extension, Json};
use base64::Engine;

use formsmith_core::error::FormsmithError;
use formsmith_core::proto::*;
use formsmith_core::service::FormService;

use crate::error::AppError;

pub async fn get_form(
    Extension(service): Extension<Arc<dyn FormService>>,
    Path(share_code): Path<String>,
) -> Result<Json<PublicForm>, AppError> {
    let form = service.public_form(&share_code).await?;
    Ok(Json(PublicForm::from(&form)))
}

pub async fn submit(
    Extension(service): Extension<Arc<dyn FormService>>,
    Path(share_code): Path<String>,
    Json(req): Json<SubmitResponseRequest>,
) -> Result<Json<SubmitResponseResponse>, AppError> {
    let response = service.submit_response(&share_code, req.answers).await?;
    Ok(Json(SubmitResponseResponse {
        response_id: response.response_id,
        submitted_at: response.submitted_at,
    }))
}

pub async fn upload(
    Extension(service): Extension<Arc<dyn FormService>>,
    Path(share_code): Path<String>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, AppError> {
    let content = base64::engine::general_purpose::STANDARD
        .decode(&req.content_base64)
        .map_err(|_| FormsmithError::InvalidInput("content_base64 is not valid base64".into()))?;
    let upload = service
        .store_upload(&share_code, &req.file_name, content)
        .await?;
    Ok(Json(UploadResponse {
        upload_id: upload.upload_id,
        sha256: upload.sha256,
    }))
}
