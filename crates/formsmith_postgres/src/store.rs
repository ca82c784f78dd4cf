//! Postgres implementations of the Formsmith port traits.

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use formsmith_core::error::FormsmithError;
use formsmith_core::ports::{FormStore, ResponseStore, Result, UserStore};
use formsmith_core::types::{Form, FormField, FormResponse, Role, Upload, User};

use crate::sqlx_types::{
    PgFieldRow, PgFormCountRow, PgFormRow, PgResponseRow, PgUploadRow, PgUserRow,
};

/// Map a sqlx error, surfacing unique-key violations as Conflict.
fn map_db_err(e: sqlx::Error) -> FormsmithError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some("23505") {
            return FormsmithError::Conflict("already exists".into());
        }
    }
    tracing::error!(error = %e, "database error");
    FormsmithError::Internal(anyhow!(e))
}

fn bad_row(e: String) -> FormsmithError {
    FormsmithError::Internal(anyhow!(e))
}

/// Bundle of all Postgres-backed stores over one pool.
pub struct PgStores {
    pub users: PgUserStore,
    pub forms: PgFormStore,
    pub responses: PgResponseStore,
}

impl PgStores {
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: PgUserStore::new(pool.clone()),
            forms: PgFormStore::new(pool.clone()),
            responses: PgResponseStore::new(pool),
        }
    }
}

// ── PgUserStore ───────────────────────────────────────────────

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str =
    "user_id, email, display_name, password_hash, role, created_at, updated_at";

#[async_trait]
impl UserStore for PgUserStore {
    async fn create_user(
        &self,
        email: &str,
        display_name: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User> {
        let row = sqlx::query_as::<_, PgUserRow>(&format!(
            r#"
            INSERT INTO formsmith.users (user_id, email, display_name, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(display_name)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;
        row.try_into().map_err(bad_row)
    }

    async fn count_users(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT count(*) FROM formsmith.users")
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(count)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, PgUserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM formsmith.users WHERE lower(email) = lower($1)",
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;
        row.map(|r| r.try_into().map_err(bad_row)).transpose()
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, PgUserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM formsmith.users WHERE user_id = $1",
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;
        row.map(|r| r.try_into().map_err(bad_row)).transpose()
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, PgUserRow>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM formsmith.users
            ORDER BY created_at ASC
            LIMIT $1 OFFSET $2
            "#,
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        rows.into_iter()
            .map(|r| r.try_into().map_err(bad_row))
            .collect()
    }

    async fn update_user(
        &self,
        user_id: Uuid,
        display_name: Option<&str>,
        role: Option<Role>,
    ) -> Result<User> {
        let row = sqlx::query_as::<_, PgUserRow>(&format!(
            r#"
            UPDATE formsmith.users
            SET display_name = COALESCE($2, display_name),
                role = COALESCE($3, role),
                updated_at = now()
            WHERE user_id = $1
            RETURNING {USER_COLUMNS}
            "#,
        ))
        .bind(user_id)
        .bind(display_name)
        .bind(role.map(|r| r.as_str()))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?
        .ok_or_else(|| FormsmithError::NotFound(format!("user {user_id}")))?;
        row.try_into().map_err(bad_row)
    }

    async fn set_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE formsmith.users SET password_hash = $2, updated_at = now() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        if result.rows_affected() == 0 {
            return Err(FormsmithError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    async fn set_email(&self, user_id: Uuid, email: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE formsmith.users SET email = $2, updated_at = now() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(email)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        if result.rows_affected() == 0 {
            return Err(FormsmithError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
        // Forms, fields, responses and uploads cascade via FK.
        let result = sqlx::query("DELETE FROM formsmith.users WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

// ── PgFormStore ───────────────────────────────────────────────

pub struct PgFormStore {
    pool: PgPool,
}

impl PgFormStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fields_for(&self, form_id: Uuid) -> Result<Vec<FormField>> {
        let rows = sqlx::query_as::<_, PgFieldRow>(
            r#"
            SELECT field_id, ordinal, label, field_type, required, options
            FROM formsmith.form_fields
            WHERE form_id = $1
            ORDER BY ordinal ASC
            "#,
        )
        .bind(form_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        rows.into_iter()
            .map(|r| r.try_into().map_err(bad_row))
            .collect()
    }

    async fn assemble(&self, row: Option<PgFormRow>) -> Result<Option<Form>> {
        match row {
            Some(row) => {
                let fields = self.fields_for(row.form_id).await?;
                Ok(Some(row.into_form(fields)))
            }
            None => Ok(None),
        }
    }
}

const FORM_COLUMNS: &str =
    "form_id, owner_id, title, description, is_published, share_code, created_at, updated_at";

async fn insert_fields(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    form_id: Uuid,
    fields: &[FormField],
) -> Result<()> {
    for field in fields {
        sqlx::query(
            r#"
            INSERT INTO formsmith.form_fields
                (field_id, form_id, ordinal, label, field_type, required, options)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(field.field_id)
        .bind(form_id)
        .bind(field.ordinal)
        .bind(&field.label)
        .bind(field.field_type.as_str())
        .bind(field.required)
        .bind(serde_json::json!(field.options))
        .execute(&mut **tx)
        .await
        .map_err(map_db_err)?;
    }
    Ok(())
}

#[async_trait]
impl FormStore for PgFormStore {
    async fn create_form(
        &self,
        owner_id: Uuid,
        title: &str,
        description: Option<&str>,
        share_code: &str,
        fields: &[FormField],
    ) -> Result<Form> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;
        let row = sqlx::query_as::<_, PgFormRow>(&format!(
            r#"
            INSERT INTO formsmith.forms (form_id, owner_id, title, description, share_code)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {FORM_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(title)
        .bind(description)
        .bind(share_code)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_err)?;
        insert_fields(&mut tx, row.form_id, fields).await?;
        tx.commit().await.map_err(map_db_err)?;
        Ok(row.into_form(fields.to_vec()))
    }

    async fn get_form(&self, form_id: Uuid) -> Result<Option<Form>> {
        let row = sqlx::query_as::<_, PgFormRow>(&format!(
            "SELECT {FORM_COLUMNS} FROM formsmith.forms WHERE form_id = $1",
        ))
        .bind(form_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;
        self.assemble(row).await
    }

    async fn find_by_share_code(&self, share_code: &str) -> Result<Option<Form>> {
        let row = sqlx::query_as::<_, PgFormRow>(&format!(
            "SELECT {FORM_COLUMNS} FROM formsmith.forms WHERE share_code = $1",
        ))
        .bind(share_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;
        self.assemble(row).await
    }

    async fn list_forms(
        &self,
        owner: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<(Form, i64)>> {
        let rows = sqlx::query_as::<_, PgFormCountRow>(&format!(
            r#"
            SELECT {FORM_COLUMNS},
                   (SELECT count(*) FROM formsmith.form_responses r
                    WHERE r.form_id = forms.form_id) AS response_count
            FROM formsmith.forms forms
            WHERE ($1::uuid IS NULL OR owner_id = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        ))
        .bind(owner)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(rows
            .into_iter()
            .map(|r| (r.form.into_form(Vec::new()), r.response_count))
            .collect())
    }

    async fn replace_form(
        &self,
        form_id: Uuid,
        title: &str,
        description: Option<&str>,
        fields: &[FormField],
    ) -> Result<Form> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;
        let row = sqlx::query_as::<_, PgFormRow>(&format!(
            r#"
            UPDATE formsmith.forms
            SET title = $2, description = $3, updated_at = now()
            WHERE form_id = $1
            RETURNING {FORM_COLUMNS}
            "#,
        ))
        .bind(form_id)
        .bind(title)
        .bind(description)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_err)?
        .ok_or_else(|| FormsmithError::NotFound(format!("form {form_id}")))?;

        sqlx::query("DELETE FROM formsmith.form_fields WHERE form_id = $1")
            .bind(form_id)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;
        insert_fields(&mut tx, form_id, fields).await?;
        tx.commit().await.map_err(map_db_err)?;
        Ok(row.into_form(fields.to_vec()))
    }

    async fn set_published(&self, form_id: Uuid, published: bool) -> Result<()> {
        let result = sqlx::query(
            "UPDATE formsmith.forms SET is_published = $2, updated_at = now() WHERE form_id = $1",
        )
        .bind(form_id)
        .bind(published)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        if result.rows_affected() == 0 {
            return Err(FormsmithError::NotFound(format!("form {form_id}")));
        }
        Ok(())
    }

    async fn delete_form(&self, form_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM formsmith.forms WHERE form_id = $1")
            .bind(form_id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

// ── PgResponseStore ───────────────────────────────────────────

pub struct PgResponseStore {
    pool: PgPool,
}

impl PgResponseStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResponseStore for PgResponseStore {
    async fn insert_response(
        &self,
        form_id: Uuid,
        answers: &serde_json::Value,
    ) -> Result<FormResponse> {
        let row = sqlx::query_as::<_, PgResponseRow>(
            r#"
            INSERT INTO formsmith.form_responses (response_id, form_id, answers)
            VALUES ($1, $2, $3)
            RETURNING response_id, form_id, submitted_at, answers
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(form_id)
        .bind(answers)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(row.into())
    }

    async fn list_responses(
        &self,
        form_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<FormResponse>, i64)> {
        let (total,): (i64,) =
            sqlx::query_as("SELECT count(*) FROM formsmith.form_responses WHERE form_id = $1")
                .bind(form_id)
                .fetch_one(&self.pool)
                .await
                .map_err(map_db_err)?;
        let rows = sqlx::query_as::<_, PgResponseRow>(
            r#"
            SELECT response_id, form_id, submitted_at, answers
            FROM formsmith.form_responses
            WHERE form_id = $1
            ORDER BY submitted_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(form_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    async fn get_response(
        &self,
        form_id: Uuid,
        response_id: Uuid,
    ) -> Result<Option<FormResponse>> {
        let row = sqlx::query_as::<_, PgResponseRow>(
            r#"
            SELECT response_id, form_id, submitted_at, answers
            FROM formsmith.form_responses
            WHERE form_id = $1 AND response_id = $2
            "#,
        )
        .bind(form_id)
        .bind(response_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(row.map(Into::into))
    }

    async fn delete_response(&self, form_id: Uuid, response_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM formsmith.form_responses WHERE form_id = $1 AND response_id = $2",
        )
        .bind(form_id)
        .bind(response_id)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_all_answers(&self, form_id: Uuid) -> Result<Vec<serde_json::Value>> {
        let rows: Vec<(serde_json::Value,)> = sqlx::query_as(
            "SELECT answers FROM formsmith.form_responses WHERE form_id = $1",
        )
        .bind(form_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(rows.into_iter().map(|(a,)| a).collect())
    }

    async fn insert_upload(
        &self,
        form_id: Uuid,
        file_name: &str,
        sha256: &str,
        content: &[u8],
    ) -> Result<Upload> {
        let row = sqlx::query_as::<_, PgUploadRow>(
            r#"
            INSERT INTO formsmith.uploads (upload_id, form_id, file_name, sha256, content)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING upload_id, form_id, file_name, sha256, content, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(form_id)
        .bind(file_name)
        .bind(sha256)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(row.into())
    }

    async fn upload_exists(&self, form_id: Uuid, upload_id: Uuid) -> Result<bool> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM formsmith.uploads WHERE form_id = $1 AND upload_id = $2",
        )
        .bind(form_id)
        .bind(upload_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(row.is_some())
    }
}
