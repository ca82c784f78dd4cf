//! Service-level flow tests over in-memory port doubles.
//!
//! These exercise the full wiring — registration, login, OTP reset,
//! form lifecycle, public submission, realtime broadcast — without a
//! database.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use formsmith_core::error::FormsmithError;
use formsmith_core::events::EventBus;
use formsmith_core::otp::OtpStore;
use formsmith_core::ports::{FormStore, Mailer, ResponseStore, Result, UserStore};
use formsmith_core::principal::Principal;
use formsmith_core::proto::*;
use formsmith_core::service::{FormService, FormServiceImpl};
use formsmith_core::types::*;

// ── In-memory port doubles ─────────────────────────────────────

#[derive(Default)]
struct MemUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

#[async_trait]
impl UserStore for MemUserStore {
    async fn create_user(
        &self,
        email: &str,
        display_name: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == email) {
            return Err(FormsmithError::Conflict("already exists".into()));
        }
        let now = Utc::now();
        let user = User {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.user_id, user.clone());
        Ok(user)
    }

    async fn count_users(&self) -> Result<i64> {
        Ok(self.users.read().await.len() as i64)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn update_user(
        &self,
        user_id: Uuid,
        display_name: Option<&str>,
        role: Option<Role>,
    ) -> Result<User> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| FormsmithError::NotFound(format!("user {user_id}")))?;
        if let Some(name) = display_name {
            user.display_name = name.to_string();
        }
        if let Some(role) = role {
            user.role = role;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| FormsmithError::NotFound(format!("user {user_id}")))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn set_email(&self, user_id: Uuid, email: &str) -> Result<()> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == email) {
            return Err(FormsmithError::Conflict("already exists".into()));
        }
        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| FormsmithError::NotFound(format!("user {user_id}")))?;
        user.email = email.to_string();
        Ok(())
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
        Ok(self.users.write().await.remove(&user_id).is_some())
    }
}

#[derive(Default)]
struct MemFormStore {
    forms: RwLock<HashMap<Uuid, Form>>,
    response_counts: RwLock<HashMap<Uuid, i64>>,
}

#[async_trait]
impl FormStore for MemFormStore {
    async fn create_form(
        &self,
        owner_id: Uuid,
        title: &str,
        description: Option<&str>,
        share_code: &str,
        fields: &[FormField],
    ) -> Result<Form> {
        let now = Utc::now();
        let form = Form {
            form_id: Uuid::new_v4(),
            owner_id,
            title: title.to_string(),
            description: description.map(String::from),
            is_published: false,
            share_code: share_code.to_string(),
            fields: fields.to_vec(),
            created_at: now,
            updated_at: now,
        };
        self.forms.write().await.insert(form.form_id, form.clone());
        Ok(form)
    }

    async fn get_form(&self, form_id: Uuid) -> Result<Option<Form>> {
        Ok(self.forms.read().await.get(&form_id).cloned())
    }

    async fn find_by_share_code(&self, share_code: &str) -> Result<Option<Form>> {
        Ok(self
            .forms
            .read()
            .await
            .values()
            .find(|f| f.share_code == share_code)
            .cloned())
    }

    async fn list_forms(
        &self,
        owner: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<(Form, i64)>> {
        let counts = self.response_counts.read().await;
        let mut forms: Vec<Form> = self
            .forms
            .read()
            .await
            .values()
            .filter(|f| owner.is_none_or(|o| f.owner_id == o))
            .cloned()
            .collect();
        forms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(forms
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|f| {
                let count = counts.get(&f.form_id).copied().unwrap_or(0);
                (f, count)
            })
            .collect())
    }

    async fn replace_form(
        &self,
        form_id: Uuid,
        title: &str,
        description: Option<&str>,
        fields: &[FormField],
    ) -> Result<Form> {
        let mut forms = self.forms.write().await;
        let form = forms
            .get_mut(&form_id)
            .ok_or_else(|| FormsmithError::NotFound(format!("form {form_id}")))?;
        form.title = title.to_string();
        form.description = description.map(String::from);
        form.fields = fields.to_vec();
        form.updated_at = Utc::now();
        Ok(form.clone())
    }

    async fn set_published(&self, form_id: Uuid, published: bool) -> Result<()> {
        let mut forms = self.forms.write().await;
        let form = forms
            .get_mut(&form_id)
            .ok_or_else(|| FormsmithError::NotFound(format!("form {form_id}")))?;
        form.is_published = published;
        Ok(())
    }

    async fn delete_form(&self, form_id: Uuid) -> Result<bool> {
        Ok(self.forms.write().await.remove(&form_id).is_some())
    }
}

#[derive(Default)]
struct MemResponseStore {
    responses: RwLock<Vec<FormResponse>>,
    uploads: RwLock<Vec<Upload>>,
}

#[async_trait]
impl ResponseStore for MemResponseStore {
    async fn insert_response(
        &self,
        form_id: Uuid,
        answers: &serde_json::Value,
    ) -> Result<FormResponse> {
        let response = FormResponse {
            response_id: Uuid::new_v4(),
            form_id,
            submitted_at: Utc::now(),
            answers: answers.clone(),
        };
        self.responses.write().await.push(response.clone());
        Ok(response)
    }

    async fn list_responses(
        &self,
        form_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<FormResponse>, i64)> {
        let responses = self.responses.read().await;
        let mut matching: Vec<FormResponse> = responses
            .iter()
            .filter(|r| r.form_id == form_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        let total = matching.len() as i64;
        Ok((
            matching
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect(),
            total,
        ))
    }

    async fn get_response(
        &self,
        form_id: Uuid,
        response_id: Uuid,
    ) -> Result<Option<FormResponse>> {
        Ok(self
            .responses
            .read()
            .await
            .iter()
            .find(|r| r.form_id == form_id && r.response_id == response_id)
            .cloned())
    }

    async fn delete_response(&self, form_id: Uuid, response_id: Uuid) -> Result<bool> {
        let mut responses = self.responses.write().await;
        let before = responses.len();
        responses.retain(|r| !(r.form_id == form_id && r.response_id == response_id));
        Ok(responses.len() < before)
    }

    async fn list_all_answers(&self, form_id: Uuid) -> Result<Vec<serde_json::Value>> {
        Ok(self
            .responses
            .read()
            .await
            .iter()
            .filter(|r| r.form_id == form_id)
            .map(|r| r.answers.clone())
            .collect())
    }

    async fn insert_upload(
        &self,
        form_id: Uuid,
        file_name: &str,
        sha256: &str,
        content: &[u8],
    ) -> Result<Upload> {
        let upload = Upload {
            upload_id: Uuid::new_v4(),
            form_id,
            file_name: file_name.to_string(),
            sha256: sha256.to_string(),
            content: content.to_vec(),
            created_at: Utc::now(),
        };
        self.uploads.write().await.push(upload.clone());
        Ok(upload)
    }

    async fn upload_exists(&self, form_id: Uuid, upload_id: Uuid) -> Result<bool> {
        Ok(self
            .uploads
            .read()
            .await
            .iter()
            .any(|u| u.form_id == form_id && u.upload_id == upload_id))
    }
}

/// Captures outbound mail so tests can fish the OTP out of the body.
#[derive(Default)]
struct CapturingMailer {
    sent: Mutex<Vec<(String, String, String)>>,
}

impl CapturingMailer {
    async fn last_code(&self) -> String {
        let sent = self.sent.lock().await;
        let (_, _, body) = sent.last().expect("no mail sent");
        body.chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take(6)
            .collect()
    }
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        self.sent
            .lock()
            .await
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

// ── Harness ────────────────────────────────────────────────────

struct Harness {
    service: FormServiceImpl,
    mailer: Arc<CapturingMailer>,
}

fn harness() -> Harness {
    let mailer = Arc::new(CapturingMailer::default());
    let service = FormServiceImpl::new(
        Arc::new(MemUserStore::default()),
        Arc::new(MemFormStore::default()),
        Arc::new(MemResponseStore::default()),
        mailer.clone(),
        Arc::new(OtpStore::new()),
        EventBus::new(),
    );
    Harness { service, mailer }
}

fn register_req(email: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.into(),
        display_name: "Test User".into(),
        password: "hunter2hunter2".into(),
    }
}

async fn registered_principal(h: &Harness, email: &str) -> Principal {
    let user = h.service.register(register_req(email)).await.unwrap();
    Principal::in_process(user.user_id, vec![user.role.as_str().to_string()])
}

fn simple_form() -> CreateFormRequest {
    CreateFormRequest {
        title: "Party RSVP".into(),
        description: Some("Who's coming".into()),
        fields: vec![
            FieldSpec {
                label: "Name".into(),
                field_type: FieldType::Text,
                required: true,
                options: vec![],
            },
            FieldSpec {
                label: "Dish".into(),
                field_type: FieldType::Select,
                required: false,
                options: vec!["sweet".into(), "savoury".into()],
            },
        ],
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[tokio::test]
async fn first_registered_user_is_admin() {
    let h = harness();
    let first = h.service.register(register_req("a@example.com")).await.unwrap();
    let second = h.service.register(register_req("b@example.com")).await.unwrap();
    assert_eq!(first.role, Role::Admin);
    assert_eq!(second.role, Role::User);
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let h = harness();
    h.service.register(register_req("a@example.com")).await.unwrap();
    let err = h
        .service
        .register(register_req("A@Example.Com"))
        .await
        .unwrap_err();
    assert!(matches!(err, FormsmithError::Conflict(_)));
}

#[tokio::test]
async fn login_rejects_bad_password_uniformly() {
    let h = harness();
    h.service.register(register_req("a@example.com")).await.unwrap();

    let wrong_pw = h
        .service
        .authenticate("a@example.com", "wrong-password")
        .await
        .unwrap_err();
    let unknown = h
        .service
        .authenticate("ghost@example.com", "whatever")
        .await
        .unwrap_err();
    assert_eq!(wrong_pw.to_string(), unknown.to_string());
}

#[tokio::test]
async fn password_reset_flow_end_to_end() {
    let h = harness();
    h.service.register(register_req("a@example.com")).await.unwrap();

    h.service.forgot_password("a@example.com").await.unwrap();
    let code = h.mailer.last_code().await;

    h.service
        .reset_password(ResetPasswordRequest {
            email: "a@example.com".into(),
            code,
            new_password: "completely-new-pw".into(),
        })
        .await
        .unwrap();

    // Old password dead, new one works.
    assert!(h
        .service
        .authenticate("a@example.com", "hunter2hunter2")
        .await
        .is_err());
    assert!(h
        .service
        .authenticate("a@example.com", "completely-new-pw")
        .await
        .is_ok());
}

#[tokio::test]
async fn forgot_password_for_unknown_email_is_silent() {
    let h = harness();
    h.service.forgot_password("ghost@example.com").await.unwrap();
    assert!(h.mailer.sent.lock().await.is_empty());
}

#[tokio::test]
async fn email_change_flow_end_to_end() {
    let h = harness();
    let p = registered_principal(&h, "old@example.com").await;

    h.service
        .request_email_change(&p, "new@example.com")
        .await
        .unwrap();
    // Code goes to the NEW address.
    assert_eq!(h.mailer.sent.lock().await.last().unwrap().0, "new@example.com");

    let code = h.mailer.last_code().await;
    let user = h.service.confirm_email_change(&p, &code).await.unwrap();
    assert_eq!(user.email, "new@example.com");

    assert!(h
        .service
        .authenticate("new@example.com", "hunter2hunter2")
        .await
        .is_ok());
}

#[tokio::test]
async fn email_change_to_taken_address_conflicts() {
    let h = harness();
    registered_principal(&h, "a@example.com").await;
    let p = registered_principal(&h, "b@example.com").await;
    let err = h
        .service
        .request_email_change(&p, "a@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, FormsmithError::Conflict(_)));
}

#[tokio::test]
async fn form_lifecycle_and_public_submission() {
    let h = harness();
    let owner = registered_principal(&h, "owner@example.com").await;

    let form = h.service.create_form(&owner, simple_form()).await.unwrap();
    assert!(!form.is_published);
    assert_eq!(form.fields.len(), 2);

    // Unpublished form is invisible to respondents.
    assert!(matches!(
        h.service.public_form(&form.share_code).await,
        Err(FormsmithError::NotFound(_))
    ));

    let form = h
        .service
        .set_published(&owner, form.form_id, true)
        .await
        .unwrap();
    assert!(form.is_published);

    // Subscribe before submitting — the broadcast should arrive.
    let mut rx = h
        .service
        .subscribe_responses(&owner, form.form_id)
        .await
        .unwrap();

    let name_field = form.fields[0].field_id.to_string();
    let answers = serde_json::json!({ name_field: "Ada" });
    let response = h
        .service
        .submit_response(&form.share_code, answers)
        .await
        .unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.response_id, response.response_id);
    assert_eq!(event.form_id, form.form_id);

    let (responses, total) = h
        .service
        .list_responses(&owner, form.form_id, 50, 0)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(responses[0].response_id, response.response_id);
}

#[tokio::test]
async fn submission_with_missing_required_field_fails() {
    let h = harness();
    let owner = registered_principal(&h, "owner@example.com").await;
    let form = h.service.create_form(&owner, simple_form()).await.unwrap();
    h.service
        .set_published(&owner, form.form_id, true)
        .await
        .unwrap();

    let err = h
        .service
        .submit_response(&form.share_code, serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, FormsmithError::ValidationFailed(_)));
}

#[tokio::test]
async fn foreign_form_reads_are_not_found() {
    let h = harness();
    // First registrant is the admin; ownership tests need two plain users.
    registered_principal(&h, "admin@example.com").await;
    let owner = registered_principal(&h, "owner@example.com").await;
    let stranger = registered_principal(&h, "stranger@example.com").await;

    let form = h.service.create_form(&owner, simple_form()).await.unwrap();

    // 404, not 403 — existence must not leak.
    assert!(matches!(
        h.service.get_form(&stranger, form.form_id).await,
        Err(FormsmithError::NotFound(_))
    ));
    assert!(matches!(
        h.service.list_responses(&stranger, form.form_id, 50, 0).await,
        Err(FormsmithError::NotFound(_))
    ));
}

#[tokio::test]
async fn admin_sees_all_forms() {
    let h = harness();
    let admin = registered_principal(&h, "admin@example.com").await;
    let owner = registered_principal(&h, "owner@example.com").await;
    h.service.create_form(&owner, simple_form()).await.unwrap();

    let own = h.service.list_forms(&owner, 50, 0).await.unwrap();
    assert_eq!(own.len(), 1);
    let all = h.service.list_forms(&admin, 50, 0).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn file_answer_must_reference_real_upload() {
    let h = harness();
    let owner = registered_principal(&h, "owner@example.com").await;
    let form = h
        .service
        .create_form(
            &owner,
            CreateFormRequest {
                title: "CV drop".into(),
                description: None,
                fields: vec![FieldSpec {
                    label: "CV".into(),
                    field_type: FieldType::File,
                    required: true,
                    options: vec![],
                }],
            },
        )
        .await
        .unwrap();
    h.service
        .set_published(&owner, form.form_id, true)
        .await
        .unwrap();
    let field = form.fields[0].field_id.to_string();

    // Dangling upload id fails.
    let err = h
        .service
        .submit_response(
            &form.share_code,
            serde_json::json!({ &field: Uuid::new_v4().to_string() }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FormsmithError::ValidationFailed(_)));

    // Real upload passes.
    let upload = h
        .service
        .store_upload(&form.share_code, "cv.pdf", b"pdf bytes".to_vec())
        .await
        .unwrap();
    assert_eq!(upload.sha256.len(), 64);
    h.service
        .submit_response(
            &form.share_code,
            serde_json::json!({ &field: upload.upload_id.to_string() }),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn replace_form_orphans_old_answers_in_stats() {
    let h = harness();
    let owner = registered_principal(&h, "owner@example.com").await;
    let form = h.service.create_form(&owner, simple_form()).await.unwrap();
    h.service
        .set_published(&owner, form.form_id, true)
        .await
        .unwrap();

    let name_field = form.fields[0].field_id.to_string();
    h.service
        .submit_response(&form.share_code, serde_json::json!({ name_field: "Ada" }))
        .await
        .unwrap();

    // Replace fields — the old answer keys no longer exist.
    h.service
        .replace_form(
            &owner,
            form.form_id,
            ReplaceFormRequest {
                title: "Party RSVP v2".into(),
                description: None,
                fields: vec![FieldSpec {
                    label: "Full name".into(),
                    field_type: FieldType::Text,
                    required: true,
                    options: vec![],
                }],
            },
        )
        .await
        .unwrap();

    let stats = h.service.form_stats(&owner, form.form_id).await.unwrap();
    assert_eq!(stats.response_count, 1);
    assert_eq!(stats.fields.len(), 1);
    assert_eq!(stats.fields[0].answered, 0);
}

#[tokio::test]
async fn admin_cannot_demote_or_delete_self() {
    let h = harness();
    let admin = registered_principal(&h, "admin@example.com").await;

    let demote = h
        .service
        .update_user(
            &admin,
            admin.user_id,
            UpdateUserRequest {
                display_name: None,
                role: Some(Role::User),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(demote, FormsmithError::Forbidden(_)));

    let delete = h.service.delete_user(&admin, admin.user_id).await.unwrap_err();
    assert!(matches!(delete, FormsmithError::Forbidden(_)));
}

#[tokio::test]
async fn role_change_requires_admin() {
    let h = harness();
    registered_principal(&h, "admin@example.com").await;
    let user = registered_principal(&h, "user@example.com").await;

    let err = h
        .service
        .update_user(
            &user,
            user.user_id,
            UpdateUserRequest {
                display_name: None,
                role: Some(Role::Admin),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FormsmithError::Forbidden(_)));

    // Plain display-name edit on self is fine.
    let updated = h
        .service
        .update_user(
            &user,
            user.user_id,
            UpdateUserRequest {
                display_name: Some("New Name".into()),
                role: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.display_name, "New Name");
}
