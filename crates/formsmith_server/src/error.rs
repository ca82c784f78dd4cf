//! AppError — bridges core errors into JSON HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use formsmith_core::error::FormsmithError;

pub struct AppError(pub FormsmithError);

impl From<FormsmithError> for AppError {
    fn from(e: FormsmithError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!("request failed: {}", self.0);
        }
        let body = match &self.0 {
            FormsmithError::ValidationFailed(violations) => json!({
                "error": self.0.to_string(),
                "violations": violations,
            }),
            // Internal details stay out of responses.
            FormsmithError::Internal(_) => json!({ "error": "internal error" }),
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_survives_conversion() {
        let resp = AppError(FormsmithError::NotFound("x".into())).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = AppError(FormsmithError::ValidationFailed(vec![])).into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn internal_errors_are_opaque() {
        let resp =
            AppError(FormsmithError::Internal(anyhow::anyhow!("db password leaked")))
                .into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
