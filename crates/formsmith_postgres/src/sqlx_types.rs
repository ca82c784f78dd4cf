//! Row structs bridging Postgres rows to pure domain types.
//!
//! Enum columns are stored as text and converted via `TryInto`, so the
//! core types stay free of sqlx derives.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use formsmith_core::types::{FieldType, Form, FormField, FormResponse, Role, Upload, User};

#[derive(Debug, FromRow)]
pub struct PgUserRow {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PgUserRow> for User {
    type Error = String;

    fn try_from(r: PgUserRow) -> Result<Self, Self::Error> {
        let role = Role::from_str(&r.role).ok_or_else(|| format!("unknown role: {}", r.role))?;
        Ok(User {
            user_id: r.user_id,
            email: r.email,
            display_name: r.display_name,
            password_hash: r.password_hash,
            role,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct PgFormRow {
    pub form_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub is_published: bool,
    pub share_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PgFormRow {
    /// Assemble the domain form from its row plus pre-fetched fields.
    pub fn into_form(self, fields: Vec<FormField>) -> Form {
        Form {
            form_id: self.form_id,
            owner_id: self.owner_id,
            title: self.title,
            description: self.description,
            is_published: self.is_published,
            share_code: self.share_code,
            fields,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Form row joined with its response count for the list view.
#[derive(Debug, FromRow)]
pub struct PgFormCountRow {
    #[sqlx(flatten)]
    pub form: PgFormRow,
    pub response_count: i64,
}

#[derive(Debug, FromRow)]
pub struct PgFieldRow {
    pub field_id: Uuid,
    pub ordinal: i32,
    pub label: String,
    pub field_type: String,
    pub required: bool,
    pub options: serde_json::Value,
}

impl TryFrom<PgFieldRow> for FormField {
    type Error = String;

    fn try_from(r: PgFieldRow) -> Result<Self, Self::Error> {
        let field_type = FieldType::from_str(&r.field_type)
            .ok_or_else(|| format!("unknown field type: {}", r.field_type))?;
        let options: Vec<String> = serde_json::from_value(r.options)
            .map_err(|e| format!("bad options for field {}: {e}", r.field_id))?;
        Ok(FormField {
            field_id: r.field_id,
            ordinal: r.ordinal,
            label: r.label,
            field_type,
            required: r.required,
            options,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct PgResponseRow {
    pub response_id: Uuid,
    pub form_id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub answers: serde_json::Value,
}

impl From<PgResponseRow> for FormResponse {
    fn from(r: PgResponseRow) -> Self {
        FormResponse {
            response_id: r.response_id,
            form_id: r.form_id,
            submitted_at: r.submitted_at,
            answers: r.answers,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct PgUploadRow {
    pub upload_id: Uuid,
    pub form_id: Uuid,
    pub file_name: String,
    pub sha256: String,
    pub content: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl From<PgUploadRow> for Upload {
    fn from(r: PgUploadRow) -> Self {
        Upload {
            upload_id: r.upload_id,
            form_id: r.form_id,
            file_name: r.file_name,
            sha256: r.sha256,
            content: r.content,
            created_at: r.created_at,
        }
    }
}
