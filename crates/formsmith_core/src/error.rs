use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormsmithError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("validation failed: {} violation(s)", .0.len())]
    ValidationFailed(Vec<FieldViolation>),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl FormsmithError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::Conflict(_) => 409,
            Self::InvalidInput(_) => 400,
            Self::ValidationFailed(_) => 422,
            Self::Internal(_) => 500,
        }
    }
}

/// A single field-level submission problem. Collected so a respondent
/// sees every broken field at once, not just the first.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FieldViolation {
    pub field_id: String,
    pub label: String,
    pub message: String,
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.field_id, self.label, self.message)
    }
}
