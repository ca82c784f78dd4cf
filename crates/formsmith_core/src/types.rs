//! Core domain types for Formsmith.
//! These are pure value types — no sqlx, no DB dependencies.

// Enums use `from_str() -> Option<Self>` instead of `FromStr` because
// they return None for unknown values rather than an error.
#![allow(clippy::should_implement_trait)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Enums ─────────────────────────────────────────────────────

/// Coarse authorization tag attached to a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

/// Field type discriminator for form fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Paragraph,
    Number,
    Select,
    Checkbox,
    Date,
    File,
}

impl FieldType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "paragraph" => Some(Self::Paragraph),
            "number" => Some(Self::Number),
            "select" => Some(Self::Select),
            "checkbox" => Some(Self::Checkbox),
            "date" => Some(Self::Date),
            "file" => Some(Self::File),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Paragraph => "paragraph",
            Self::Number => "number",
            Self::Select => "select",
            Self::Checkbox => "checkbox",
            Self::Date => "date",
            Self::File => "file",
        }
    }

    /// Choice fields carry an options list; everything else must not.
    pub fn is_choice(&self) -> bool {
        matches!(self, Self::Select | Self::Checkbox)
    }
}

/// Purpose discriminator for one-time codes. An OTP issued for one
/// purpose never verifies against another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OtpPurpose {
    PasswordReset,
    EmailChange,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PasswordReset => "password_reset",
            Self::EmailChange => "email_change",
        }
    }
}

// ── Entities ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user-owned form template. Fields are ordered by `ordinal`.
#[derive(Debug, Clone)]
pub struct Form {
    pub form_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub is_published: bool,
    /// URL-safe random token; the public identity of the form.
    /// Never changes for the life of the form.
    pub share_code: String,
    pub fields: Vec<FormField>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    pub field_id: Uuid,
    /// Dense, 0-based, unique per form.
    pub ordinal: i32,
    pub label: String,
    pub field_type: FieldType,
    pub required: bool,
    /// Only meaningful for choice fields (`select`, `checkbox`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

/// An anonymous submission against a form. `answers` maps field id
/// (stringified UUID) to the submitted value.
#[derive(Debug, Clone)]
pub struct FormResponse {
    pub response_id: Uuid,
    pub form_id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub answers: serde_json::Value,
}

/// Stored file content submitted against a `file` field.
#[derive(Debug, Clone)]
pub struct Upload {
    pub upload_id: Uuid,
    pub form_id: Uuid,
    pub file_name: String,
    pub sha256: String,
    pub content: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// Event broadcast when a response is saved. Fire-and-forget; lagged
/// subscribers skip missed events.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEvent {
    pub form_id: Uuid,
    pub response_id: Uuid,
    pub submitted_at: DateTime<Utc>,
}
