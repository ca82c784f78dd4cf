//! Storage and delivery port traits.
//! Implemented by formsmith_postgres (and the server's mailer adapters) —
//! core logic depends only on these traits.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::FormsmithError;
use crate::types::{Form, FormField, FormResponse, Role, Upload, User};

pub type Result<T> = std::result::Result<T, FormsmithError>;

/// Account storage. Emails are unique case-insensitively; adapters
/// surface duplicate-key failures as `Conflict`.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(
        &self,
        email: &str,
        display_name: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User>;

    /// Total accounts — used for first-admin bootstrap.
    async fn count_users(&self) -> Result<i64>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>>;

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>>;

    /// Update display name and/or role; `None` leaves a field untouched.
    async fn update_user(
        &self,
        user_id: Uuid,
        display_name: Option<&str>,
        role: Option<Role>,
    ) -> Result<User>;

    async fn set_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<()>;

    async fn set_email(&self, user_id: Uuid, email: &str) -> Result<()>;

    /// Returns false when the user did not exist.
    async fn delete_user(&self, user_id: Uuid) -> Result<bool>;
}

/// Form definition storage. `get_form`/`find_by_share_code` return the
/// form with its fields in ordinal order.
#[async_trait]
pub trait FormStore: Send + Sync {
    async fn create_form(
        &self,
        owner_id: Uuid,
        title: &str,
        description: Option<&str>,
        share_code: &str,
        fields: &[FormField],
    ) -> Result<Form>;

    async fn get_form(&self, form_id: Uuid) -> Result<Option<Form>>;

    async fn find_by_share_code(&self, share_code: &str) -> Result<Option<Form>>;

    /// List forms with response counts, newest first. `owner` of None
    /// lists all forms (admin view). Returned forms carry empty field
    /// vectors.
    async fn list_forms(
        &self,
        owner: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<(Form, i64)>>;

    /// Replace title/description/fields atomically. Old fields are
    /// dropped; answers referencing them become orphans.
    async fn replace_form(
        &self,
        form_id: Uuid,
        title: &str,
        description: Option<&str>,
        fields: &[FormField],
    ) -> Result<Form>;

    async fn set_published(&self, form_id: Uuid, published: bool) -> Result<()>;

    async fn delete_form(&self, form_id: Uuid) -> Result<bool>;
}

/// Response and upload storage.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    async fn insert_response(
        &self,
        form_id: Uuid,
        answers: &serde_json::Value,
    ) -> Result<FormResponse>;

    /// Newest first, with total count for the pager.
    async fn list_responses(
        &self,
        form_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<FormResponse>, i64)>;

    async fn get_response(&self, form_id: Uuid, response_id: Uuid)
        -> Result<Option<FormResponse>>;

    async fn delete_response(&self, form_id: Uuid, response_id: Uuid) -> Result<bool>;

    /// All answer blobs for a form — feeds the stats aggregation.
    async fn list_all_answers(&self, form_id: Uuid) -> Result<Vec<serde_json::Value>>;

    async fn insert_upload(
        &self,
        form_id: Uuid,
        file_name: &str,
        sha256: &str,
        content: &[u8],
    ) -> Result<Upload>;

    /// Whether an upload exists for this form — gates `file` answers.
    async fn upload_exists(&self, form_id: Uuid, upload_id: Uuid) -> Result<bool>;
}

/// Outbound mail. The server wires a webhook adapter; tests and
/// unconfigured deployments use a tracing-only implementation.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}
