//! FormService — the central domain service for Formsmith.
//!
//! Takes port traits via `Arc<dyn PortTrait>` so the same logic works
//! against Postgres or test doubles. All methods that act on behalf of
//! a caller take `&Principal` explicitly — no implicit identity.

use std::sync::Arc;

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::{FieldViolation, FormsmithError};
use crate::events::EventBus;
use crate::otp::OtpStore;
use crate::password;
use crate::ports::{FormStore, Mailer, ResponseStore, Result, UserStore};
use crate::principal::Principal;
use crate::proto::*;
use crate::types::*;
use crate::validate;

const SHARE_CODE_LEN: usize = 12;
const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

// ── FormService trait ─────────────────────────────────────────

/// The single service interface the HTTP handlers delegate to.
#[async_trait]
pub trait FormService: Send + Sync {
    // Auth
    async fn register(&self, req: RegisterRequest) -> Result<User>;
    async fn authenticate(&self, email: &str, plain_password: &str) -> Result<User>;
    async fn get_profile(&self, principal: &Principal) -> Result<User>;
    async fn change_password(&self, principal: &Principal, req: ChangePasswordRequest)
        -> Result<()>;
    async fn forgot_password(&self, email: &str) -> Result<()>;
    async fn reset_password(&self, req: ResetPasswordRequest) -> Result<()>;
    async fn request_email_change(&self, principal: &Principal, new_email: &str) -> Result<()>;
    async fn confirm_email_change(&self, principal: &Principal, code: &str) -> Result<User>;

    // Users
    async fn list_users(&self, principal: &Principal, limit: i64, offset: i64)
        -> Result<Vec<User>>;
    async fn get_user(&self, principal: &Principal, user_id: Uuid) -> Result<User>;
    async fn update_user(
        &self,
        principal: &Principal,
        user_id: Uuid,
        req: UpdateUserRequest,
    ) -> Result<User>;
    async fn delete_user(&self, principal: &Principal, user_id: Uuid) -> Result<()>;

    // Forms
    async fn create_form(&self, principal: &Principal, req: CreateFormRequest) -> Result<Form>;
    async fn list_forms(
        &self,
        principal: &Principal,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<(Form, i64)>>;
    async fn get_form(&self, principal: &Principal, form_id: Uuid) -> Result<Form>;
    async fn replace_form(
        &self,
        principal: &Principal,
        form_id: Uuid,
        req: ReplaceFormRequest,
    ) -> Result<Form>;
    async fn delete_form(&self, principal: &Principal, form_id: Uuid) -> Result<()>;
    async fn set_published(
        &self,
        principal: &Principal,
        form_id: Uuid,
        published: bool,
    ) -> Result<Form>;

    // Responses
    async fn list_responses(
        &self,
        principal: &Principal,
        form_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<FormResponse>, i64)>;
    async fn get_response(
        &self,
        principal: &Principal,
        form_id: Uuid,
        response_id: Uuid,
    ) -> Result<FormResponse>;
    async fn delete_response(
        &self,
        principal: &Principal,
        form_id: Uuid,
        response_id: Uuid,
    ) -> Result<()>;
    async fn form_stats(&self, principal: &Principal, form_id: Uuid) -> Result<FormStatsResponse>;
    async fn subscribe_responses(
        &self,
        principal: &Principal,
        form_id: Uuid,
    ) -> Result<broadcast::Receiver<ResponseEvent>>;

    // Public (no principal — anonymous respondents)
    async fn public_form(&self, share_code: &str) -> Result<Form>;
    async fn submit_response(
        &self,
        share_code: &str,
        answers: serde_json::Value,
    ) -> Result<FormResponse>;
    async fn store_upload(
        &self,
        share_code: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<Upload>;
}

// ── Implementation ────────────────────────────────────────────

pub struct FormServiceImpl {
    users: Arc<dyn UserStore>,
    forms: Arc<dyn FormStore>,
    responses: Arc<dyn ResponseStore>,
    mailer: Arc<dyn Mailer>,
    otp: Arc<OtpStore>,
    events: Arc<EventBus>,
}

impl FormServiceImpl {
    pub fn new(
        users: Arc<dyn UserStore>,
        forms: Arc<dyn FormStore>,
        responses: Arc<dyn ResponseStore>,
        mailer: Arc<dyn Mailer>,
        otp: Arc<OtpStore>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            users,
            forms,
            responses,
            mailer,
            otp,
            events,
        }
    }

    /// Load a form the principal may act on. Non-owner non-admin gets
    /// NotFound rather than Forbidden so form ids do not leak.
    async fn owned_form(&self, principal: &Principal, form_id: Uuid) -> Result<Form> {
        let form = self
            .forms
            .get_form(form_id)
            .await?
            .ok_or_else(|| FormsmithError::NotFound(format!("form {form_id}")))?;
        if form.owner_id != principal.user_id && !principal.is_admin() {
            return Err(FormsmithError::NotFound(format!("form {form_id}")));
        }
        Ok(form)
    }

    /// Published form by share code. Unknown and unpublished are the
    /// same 404 — the code must not reveal form existence.
    async fn published_form(&self, share_code: &str) -> Result<Form> {
        match self.forms.find_by_share_code(share_code).await? {
            Some(form) if form.is_published => Ok(form),
            _ => Err(FormsmithError::NotFound("form".into())),
        }
    }
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_ascii_lowercase();
    if email.len() < 3 || !email.contains('@') {
        return Err(FormsmithError::InvalidInput("invalid email address".into()));
    }
    Ok(email)
}

fn generate_share_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHARE_CODE_LEN)
        .map(char::from)
        .collect()
}

fn invalid_credentials() -> FormsmithError {
    // Uniform message for unknown email and bad password.
    FormsmithError::Forbidden("invalid credentials".into())
}

#[async_trait]
impl FormService for FormServiceImpl {
    // ── Auth ──────────────────────────────────────────────────

    async fn register(&self, req: RegisterRequest) -> Result<User> {
        let email = normalize_email(&req.email)?;
        if req.display_name.trim().is_empty() {
            return Err(FormsmithError::InvalidInput(
                "display_name must not be empty".into(),
            ));
        }
        password::check_strength(&req.password)?;
        let hash = password::hash(&req.password)?;

        // First account ever becomes the admin.
        let role = if self.users.count_users().await? == 0 {
            Role::Admin
        } else {
            Role::User
        };

        let user = self
            .users
            .create_user(&email, req.display_name.trim(), &hash, role)
            .await?;
        tracing::info!(user_id = %user.user_id, role = role.as_str(), "account registered");
        Ok(user)
    }

    async fn authenticate(&self, email: &str, plain_password: &str) -> Result<User> {
        let email = normalize_email(email).map_err(|_| invalid_credentials())?;
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(invalid_credentials)?;
        if !password::verify(plain_password, &user.password_hash) {
            return Err(invalid_credentials());
        }
        Ok(user)
    }

    async fn get_profile(&self, principal: &Principal) -> Result<User> {
        self.users
            .get_user(principal.user_id)
            .await?
            .ok_or_else(|| FormsmithError::NotFound(format!("user {}", principal.user_id)))
    }

    async fn change_password(
        &self,
        principal: &Principal,
        req: ChangePasswordRequest,
    ) -> Result<()> {
        let user = self.get_profile(principal).await?;
        if !password::verify(&req.current_password, &user.password_hash) {
            return Err(FormsmithError::Forbidden("current password is wrong".into()));
        }
        password::check_strength(&req.new_password)?;
        let hash = password::hash(&req.new_password)?;
        self.users.set_password_hash(user.user_id, &hash).await
    }

    async fn forgot_password(&self, email: &str) -> Result<()> {
        // Always succeeds from the caller's point of view — no account
        // enumeration through this endpoint.
        let Ok(email) = normalize_email(email) else {
            return Ok(());
        };
        let Some(user) = self.users.find_by_email(&email).await? else {
            tracing::debug!(%email, "password reset requested for unknown address");
            return Ok(());
        };
        let code = self
            .otp
            .issue(OtpPurpose::PasswordReset, user.user_id, None)
            .await;
        self.mailer
            .send(
                &user.email,
                "Your password reset code",
                &format!("Your password reset code is {code}. It expires in 10 minutes."),
            )
            .await?;
        tracing::info!(user_id = %user.user_id, "password reset code issued");
        Ok(())
    }

    async fn reset_password(&self, req: ResetPasswordRequest) -> Result<()> {
        let email = normalize_email(&req.email)
            .map_err(|_| FormsmithError::Forbidden("invalid or expired code".into()))?;
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| FormsmithError::Forbidden("invalid or expired code".into()))?;
        self.otp
            .verify_and_consume(OtpPurpose::PasswordReset, user.user_id, &req.code)
            .await?;
        password::check_strength(&req.new_password)?;
        let hash = password::hash(&req.new_password)?;
        self.users.set_password_hash(user.user_id, &hash).await?;
        tracing::info!(user_id = %user.user_id, "password reset completed");
        Ok(())
    }

    async fn request_email_change(&self, principal: &Principal, new_email: &str) -> Result<()> {
        let new_email = normalize_email(new_email)?;
        if self.users.find_by_email(&new_email).await?.is_some() {
            return Err(FormsmithError::Conflict("email already in use".into()));
        }
        let code = self
            .otp
            .issue(
                OtpPurpose::EmailChange,
                principal.user_id,
                Some(new_email.clone()),
            )
            .await;
        // Delivered to the NEW address — proves the user controls it.
        self.mailer
            .send(
                &new_email,
                "Confirm your new email address",
                &format!("Your email change code is {code}. It expires in 10 minutes."),
            )
            .await?;
        tracing::info!(user_id = %principal.user_id, "email change code issued");
        Ok(())
    }

    async fn confirm_email_change(&self, principal: &Principal, code: &str) -> Result<User> {
        let new_email = self
            .otp
            .verify_and_consume(OtpPurpose::EmailChange, principal.user_id, code)
            .await?
            .ok_or_else(|| FormsmithError::Forbidden("invalid or expired code".into()))?;
        self.users.set_email(principal.user_id, &new_email).await?;
        self.get_profile(principal).await
    }

    // ── Users ─────────────────────────────────────────────────

    async fn list_users(
        &self,
        principal: &Principal,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<User>> {
        principal.require_admin()?;
        self.users.list_users(limit, offset).await
    }

    async fn get_user(&self, principal: &Principal, user_id: Uuid) -> Result<User> {
        principal.require_self_or_admin(user_id)?;
        self.users
            .get_user(user_id)
            .await?
            .ok_or_else(|| FormsmithError::NotFound(format!("user {user_id}")))
    }

    async fn update_user(
        &self,
        principal: &Principal,
        user_id: Uuid,
        req: UpdateUserRequest,
    ) -> Result<User> {
        principal.require_self_or_admin(user_id)?;
        if let Some(role) = req.role {
            principal.require_admin()?;
            if principal.user_id == user_id && role != Role::Admin {
                return Err(FormsmithError::Forbidden(
                    "admins cannot demote themselves".into(),
                ));
            }
        }
        if let Some(name) = req.display_name.as_deref() {
            if name.trim().is_empty() {
                return Err(FormsmithError::InvalidInput(
                    "display_name must not be empty".into(),
                ));
            }
        }
        self.users
            .update_user(user_id, req.display_name.as_deref().map(str::trim), req.role)
            .await
    }

    async fn delete_user(&self, principal: &Principal, user_id: Uuid) -> Result<()> {
        principal.require_self_or_admin(user_id)?;
        if principal.is_admin() && principal.user_id == user_id {
            return Err(FormsmithError::Forbidden(
                "admins cannot delete themselves".into(),
            ));
        }
        if self.users.delete_user(user_id).await? {
            tracing::info!(%user_id, "account deleted");
            Ok(())
        } else {
            Err(FormsmithError::NotFound(format!("user {user_id}")))
        }
    }

    // ── Forms ─────────────────────────────────────────────────

    async fn create_form(&self, principal: &Principal, req: CreateFormRequest) -> Result<Form> {
        let fields = validate::build_fields(&req.title, &req.fields)?;
        let share_code = generate_share_code();
        let form = self
            .forms
            .create_form(
                principal.user_id,
                req.title.trim(),
                req.description.as_deref(),
                &share_code,
                &fields,
            )
            .await?;
        tracing::info!(form_id = %form.form_id, owner = %principal.user_id, "form created");
        Ok(form)
    }

    async fn list_forms(
        &self,
        principal: &Principal,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<(Form, i64)>> {
        let owner = if principal.is_admin() {
            None
        } else {
            Some(principal.user_id)
        };
        self.forms.list_forms(owner, limit, offset).await
    }

    async fn get_form(&self, principal: &Principal, form_id: Uuid) -> Result<Form> {
        self.owned_form(principal, form_id).await
    }

    async fn replace_form(
        &self,
        principal: &Principal,
        form_id: Uuid,
        req: ReplaceFormRequest,
    ) -> Result<Form> {
        self.owned_form(principal, form_id).await?;
        let fields = validate::build_fields(&req.title, &req.fields)?;
        self.forms
            .replace_form(form_id, req.title.trim(), req.description.as_deref(), &fields)
            .await
    }

    async fn delete_form(&self, principal: &Principal, form_id: Uuid) -> Result<()> {
        self.owned_form(principal, form_id).await?;
        self.forms.delete_form(form_id).await?;
        tracing::info!(%form_id, "form deleted");
        Ok(())
    }

    async fn set_published(
        &self,
        principal: &Principal,
        form_id: Uuid,
        published: bool,
    ) -> Result<Form> {
        self.owned_form(principal, form_id).await?;
        self.forms.set_published(form_id, published).await?;
        self.owned_form(principal, form_id).await
    }

    // ── Responses ─────────────────────────────────────────────

    async fn list_responses(
        &self,
        principal: &Principal,
        form_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<FormResponse>, i64)> {
        self.owned_form(principal, form_id).await?;
        self.responses.list_responses(form_id, limit, offset).await
    }

    async fn get_response(
        &self,
        principal: &Principal,
        form_id: Uuid,
        response_id: Uuid,
    ) -> Result<FormResponse> {
        self.owned_form(principal, form_id).await?;
        self.responses
            .get_response(form_id, response_id)
            .await?
            .ok_or_else(|| FormsmithError::NotFound(format!("response {response_id}")))
    }

    async fn delete_response(
        &self,
        principal: &Principal,
        form_id: Uuid,
        response_id: Uuid,
    ) -> Result<()> {
        self.owned_form(principal, form_id).await?;
        if self.responses.delete_response(form_id, response_id).await? {
            Ok(())
        } else {
            Err(FormsmithError::NotFound(format!("response {response_id}")))
        }
    }

    async fn form_stats(&self, principal: &Principal, form_id: Uuid) -> Result<FormStatsResponse> {
        let form = self.owned_form(principal, form_id).await?;
        let answers = self.responses.list_all_answers(form_id).await?;
        Ok(aggregate_stats(&form, &answers))
    }

    async fn subscribe_responses(
        &self,
        principal: &Principal,
        form_id: Uuid,
    ) -> Result<broadcast::Receiver<ResponseEvent>> {
        self.owned_form(principal, form_id).await?;
        Ok(self.events.subscribe(form_id).await)
    }

    // ── Public ────────────────────────────────────────────────

    async fn public_form(&self, share_code: &str) -> Result<Form> {
        self.published_form(share_code).await
    }

    async fn submit_response(
        &self,
        share_code: &str,
        answers: serde_json::Value,
    ) -> Result<FormResponse> {
        let form = self.published_form(share_code).await?;
        let file_refs = validate::check_answers(&form.fields, &answers)?;

        for (field_id, upload_id) in &file_refs {
            if !self.responses.upload_exists(form.form_id, *upload_id).await? {
                let field = form
                    .fields
                    .iter()
                    .find(|f| f.field_id == *field_id)
                    .expect("field id came from the field list");
                return Err(FormsmithError::ValidationFailed(vec![FieldViolation {
                    field_id: field_id.to_string(),
                    label: field.label.clone(),
                    message: "referenced upload does not exist".into(),
                }]));
            }
        }

        let response = self.responses.insert_response(form.form_id, &answers).await?;
        let delivered = self
            .events
            .publish(ResponseEvent {
                form_id: form.form_id,
                response_id: response.response_id,
                submitted_at: response.submitted_at,
            })
            .await;
        tracing::debug!(
            form_id = %form.form_id,
            response_id = %response.response_id,
            subscribers = delivered,
            "response saved and broadcast"
        );
        Ok(response)
    }

    async fn store_upload(
        &self,
        share_code: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<Upload> {
        let form = self.published_form(share_code).await?;
        if file_name.trim().is_empty() {
            return Err(FormsmithError::InvalidInput("file_name must not be empty".into()));
        }
        if content.is_empty() {
            return Err(FormsmithError::InvalidInput("upload is empty".into()));
        }
        if content.len() > MAX_UPLOAD_BYTES {
            return Err(FormsmithError::InvalidInput(format!(
                "upload exceeds {MAX_UPLOAD_BYTES} bytes"
            )));
        }
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(&content);
        let sha256 = hex::encode(hasher.finalize());

        self.responses
            .insert_upload(form.form_id, file_name.trim(), &sha256, &content)
            .await
    }
}

/// Pure aggregation over stored answer blobs. Answers whose field id no
/// longer exists (fields were replaced) are skipped.
fn aggregate_stats(form: &Form, answers: &[serde_json::Value]) -> FormStatsResponse {
    let fields = form
        .fields
        .iter()
        .map(|field| {
            let key = field.field_id.to_string();
            let values: Vec<&serde_json::Value> = answers
                .iter()
                .filter_map(|a| a.get(&key))
                .filter(|v| !v.is_null())
                .collect();

            let option_counts = if field.field_type.is_choice() {
                field
                    .options
                    .iter()
                    .map(|opt| OptionCount {
                        option: opt.clone(),
                        count: values
                            .iter()
                            .filter(|v| match v {
                                serde_json::Value::String(s) => s == opt,
                                serde_json::Value::Array(items) => {
                                    items.iter().any(|i| i.as_str() == Some(opt))
                                }
                                _ => false,
                            })
                            .count() as i64,
                    })
                    .collect()
            } else {
                Vec::new()
            };

            let number = if field.field_type == FieldType::Number {
                let nums: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
                if nums.is_empty() {
                    None
                } else {
                    let sum: f64 = nums.iter().sum();
                    Some(NumberStats {
                        min: nums.iter().cloned().fold(f64::INFINITY, f64::min),
                        max: nums.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                        mean: sum / nums.len() as f64,
                    })
                }
            } else {
                None
            };

            FieldStats {
                field_id: field.field_id,
                label: field.label.clone(),
                field_type: field.field_type,
                answered: values.len() as i64,
                option_counts,
                number,
            }
        })
        .collect();

    FormStatsResponse {
        form_id: form.form_id,
        response_count: answers.len() as i64,
        fields,
    }
}

#[cfg(test)]
mod stats_tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn form_with(fields: Vec<FormField>) -> Form {
        Form {
            form_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: "t".into(),
            description: None,
            is_published: true,
            share_code: "abc".into(),
            fields,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn field(field_type: FieldType, options: &[&str]) -> FormField {
        FormField {
            field_id: Uuid::new_v4(),
            ordinal: 0,
            label: "f".into(),
            field_type,
            required: false,
            options: options.iter().map(|o| o.to_string()).collect(),
        }
    }

    #[test]
    fn select_counts_per_option() {
        let f = field(FieldType::Select, &["red", "blue"]);
        let key = f.field_id.to_string();
        let form = form_with(vec![f]);
        let answers = vec![
            json!({ &key: "red" }),
            json!({ &key: "red" }),
            json!({ &key: "blue" }),
            json!({}),
        ];
        let stats = aggregate_stats(&form, &answers);
        assert_eq!(stats.response_count, 4);
        assert_eq!(stats.fields[0].answered, 3);
        assert_eq!(stats.fields[0].option_counts[0].count, 2);
        assert_eq!(stats.fields[0].option_counts[1].count, 1);
    }

    #[test]
    fn checkbox_counts_array_entries() {
        let f = field(FieldType::Checkbox, &["ham", "egg"]);
        let key = f.field_id.to_string();
        let form = form_with(vec![f]);
        let answers = vec![json!({ &key: ["ham", "egg"] }), json!({ &key: ["ham"] })];
        let stats = aggregate_stats(&form, &answers);
        assert_eq!(stats.fields[0].option_counts[0].count, 2);
        assert_eq!(stats.fields[0].option_counts[1].count, 1);
    }

    #[test]
    fn number_stats_min_max_mean() {
        let f = field(FieldType::Number, &[]);
        let key = f.field_id.to_string();
        let form = form_with(vec![f]);
        let answers = vec![json!({ &key: 2 }), json!({ &key: 4 }), json!({ &key: 9 })];
        let stats = aggregate_stats(&form, &answers);
        let n = stats.fields[0].number.unwrap();
        assert_eq!(n.min, 2.0);
        assert_eq!(n.max, 9.0);
        assert_eq!(n.mean, 5.0);
    }

    #[test]
    fn orphaned_answers_are_skipped() {
        let f = field(FieldType::Text, &[]);
        let form = form_with(vec![f]);
        // Answer keyed by a field that no longer exists.
        let answers = vec![json!({ Uuid::new_v4().to_string(): "ghost" })];
        let stats = aggregate_stats(&form, &answers);
        assert_eq!(stats.response_count, 1);
        assert_eq!(stats.fields[0].answered, 0);
    }

    #[test]
    fn number_stats_absent_without_numeric_answers() {
        let f = field(FieldType::Number, &[]);
        let form = form_with(vec![f]);
        let stats = aggregate_stats(&form, &[]);
        assert!(stats.fields[0].number.is_none());
    }
}
