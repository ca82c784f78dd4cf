//! API request/response types for the Formsmith service boundary.
//!
//! Plain serde structs shared by the HTTP handlers and the core
//! service. Entities never cross the boundary directly — in particular
//! `password_hash` stays inside the core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{FieldType, Form, FormField, FormResponse, Role, User};

// ── Auth ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub display_name: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestEmailChangeRequest {
    pub new_email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmEmailChangeRequest {
    pub code: String,
}

/// Generic acknowledgement for operations with no payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub ok: bool,
}

impl AckResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

// ── Users ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(u: &User) -> Self {
        Self {
            user_id: u.user_id,
            email: u.email.clone(),
            display_name: u.display_name.clone(),
            role: u.role,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageQuery {
    /// Clamp to sane bounds (default 50, max 500).
    pub fn clamped(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(50).clamp(1, 500);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListUsersResponse {
    pub users: Vec<UserProfile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub display_name: Option<String>,
    pub role: Option<Role>,
}

// ── Forms ─────────────────────────────────────────────────────

/// Field definition as submitted by the builder UI. Ordinals are
/// assigned from vector order, so they are dense by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub label: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFormRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceFormRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSummary {
    pub form_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub is_published: bool,
    pub share_code: String,
    pub response_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormDetail {
    pub form_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub is_published: bool,
    pub share_code: String,
    pub fields: Vec<FormField>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Form> for FormDetail {
    fn from(f: &Form) -> Self {
        Self {
            form_id: f.form_id,
            owner_id: f.owner_id,
            title: f.title.clone(),
            description: f.description.clone(),
            is_published: f.is_published,
            share_code: f.share_code.clone(),
            fields: f.fields.clone(),
            created_at: f.created_at,
            updated_at: f.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListFormsResponse {
    pub forms: Vec<FormSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareResponse {
    pub share_url: String,
    pub qr_svg: String,
}

// ── Responses & stats ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub response_id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub answers: serde_json::Value,
}

impl From<&FormResponse> for ResponseRecord {
    fn from(r: &FormResponse) -> Self {
        Self {
            response_id: r.response_id,
            submitted_at: r.submitted_at,
            answers: r.answers.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponsesResponse {
    pub responses: Vec<ResponseRecord>,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormStatsResponse {
    pub form_id: Uuid,
    pub response_count: i64,
    pub fields: Vec<FieldStats>,
}

/// Per-field aggregation for the analysis view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldStats {
    pub field_id: Uuid,
    pub label: String,
    pub field_type: FieldType,
    /// Responses that answered this field.
    pub answered: i64,
    /// Choice fields: submitted-value counts, in option order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub option_counts: Vec<OptionCount>,
    /// Number fields: min/max/mean over numeric answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<NumberStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionCount {
    pub option: String,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NumberStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

// ── Public submission ─────────────────────────────────────────

/// Respondent view of a published form — no owner data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicForm {
    pub title: String,
    pub description: Option<String>,
    pub fields: Vec<FormField>,
}

impl From<&Form> for PublicForm {
    fn from(f: &Form) -> Self {
        Self {
            title: f.title.clone(),
            description: f.description.clone(),
            fields: f.fields.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponseRequest {
    pub answers: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponseResponse {
    pub response_id: Uuid,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadRequest {
    pub file_name: String,
    pub content_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub upload_id: Uuid,
    pub sha256: String,
}
