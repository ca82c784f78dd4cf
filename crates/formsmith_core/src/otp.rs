//! One-time codes for password reset and email change.
//!
//! Codes are six digits, SHA-256-hashed at rest, held in a
//! process-local map with a ten-minute expiry. Non-durable and
//! single-instance: a restart invalidates pending codes and the user
//! re-requests one.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::FormsmithError;
use crate::types::OtpPurpose;

const OTP_TTL_MINUTES: i64 = 10;
const MAX_ATTEMPTS: u8 = 5;

struct OtpEntry {
    code_hash: String,
    /// Pending address for `EmailChange`; None for password reset.
    new_email: Option<String>,
    expires_at: DateTime<Utc>,
    attempts: u8,
}

/// Process-local OTP map keyed by (purpose, user). Re-issuing for the
/// same key supersedes the previous code.
#[derive(Default)]
pub struct OtpStore {
    entries: RwLock<HashMap<(OtpPurpose, Uuid), OtpEntry>>,
}

fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

fn random_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32))
}

impl OtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh code, superseding any pending one for this
    /// (purpose, user). Returns the plain code for delivery; only the
    /// hash is retained.
    pub async fn issue(
        &self,
        purpose: OtpPurpose,
        user_id: Uuid,
        new_email: Option<String>,
    ) -> String {
        let code = random_code();
        let entry = OtpEntry {
            code_hash: hash_code(&code),
            new_email,
            expires_at: Utc::now() + Duration::minutes(OTP_TTL_MINUTES),
            attempts: 0,
        };
        self.entries.write().await.insert((purpose, user_id), entry);
        code
    }

    /// Verify and consume. On success the entry is removed and any
    /// pending email is returned. Expired entries and entries that
    /// exhaust `MAX_ATTEMPTS` are dropped. Every failure path returns
    /// the same error so callers cannot distinguish "no code pending"
    /// from "wrong code".
    pub async fn verify_and_consume(
        &self,
        purpose: OtpPurpose,
        user_id: Uuid,
        code: &str,
    ) -> Result<Option<String>, FormsmithError> {
        let mut entries = self.entries.write().await;
        let key = (purpose, user_id);
        let Some(entry) = entries.get_mut(&key) else {
            return Err(invalid_code());
        };

        if entry.expires_at < Utc::now() {
            entries.remove(&key);
            return Err(invalid_code());
        }

        if entry.code_hash != hash_code(code) {
            entry.attempts += 1;
            if entry.attempts >= MAX_ATTEMPTS {
                entries.remove(&key);
            }
            return Err(invalid_code());
        }

        let entry = entries.remove(&key).expect("entry present under write lock");
        Ok(entry.new_email)
    }

    /// Drop expired entries. Called by the background sweeper.
    /// Returns the number of entries removed.
    pub async fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at >= now);
        before - entries.len()
    }

    #[cfg(test)]
    async fn force_expire(&self, purpose: OtpPurpose, user_id: Uuid) {
        if let Some(e) = self.entries.write().await.get_mut(&(purpose, user_id)) {
            e.expires_at = Utc::now() - Duration::seconds(1);
        }
    }
}

fn invalid_code() -> FormsmithError {
    FormsmithError::Forbidden("invalid or expired code".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issue_then_verify_consumes() {
        let store = OtpStore::new();
        let user = Uuid::new_v4();
        let code = store.issue(OtpPurpose::PasswordReset, user, None).await;
        assert_eq!(code.len(), 6);

        let out = store
            .verify_and_consume(OtpPurpose::PasswordReset, user, &code)
            .await
            .unwrap();
        assert_eq!(out, None);

        // Second use fails — single use.
        assert!(store
            .verify_and_consume(OtpPurpose::PasswordReset, user, &code)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn wrong_purpose_does_not_verify() {
        let store = OtpStore::new();
        let user = Uuid::new_v4();
        let code = store.issue(OtpPurpose::PasswordReset, user, None).await;
        assert!(store
            .verify_and_consume(OtpPurpose::EmailChange, user, &code)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn reissue_supersedes() {
        let store = OtpStore::new();
        let user = Uuid::new_v4();
        let old = store.issue(OtpPurpose::PasswordReset, user, None).await;
        let new = store.issue(OtpPurpose::PasswordReset, user, None).await;
        assert!(store
            .verify_and_consume(OtpPurpose::PasswordReset, user, &old)
            .await
            .is_err()
            // Six random digits can collide; only assert supersession
            // when the codes actually differ.
            || old == new);
        if old != new {
            assert!(store
                .verify_and_consume(OtpPurpose::PasswordReset, user, &new)
                .await
                .is_ok());
        }
    }

    #[tokio::test]
    async fn expired_entry_rejected_and_swept() {
        let store = OtpStore::new();
        let user = Uuid::new_v4();
        let code = store.issue(OtpPurpose::PasswordReset, user, None).await;
        store.force_expire(OtpPurpose::PasswordReset, user).await;

        assert!(store
            .verify_and_consume(OtpPurpose::PasswordReset, user, &code)
            .await
            .is_err());

        // Entry was already dropped by the failed verify.
        assert_eq!(store.sweep().await, 0);
    }

    #[tokio::test]
    async fn attempt_cap_drops_entry() {
        let store = OtpStore::new();
        let user = Uuid::new_v4();
        let code = store.issue(OtpPurpose::PasswordReset, user, None).await;
        let wrong = if code == "000000" { "000001" } else { "000000" };

        for _ in 0..5 {
            assert!(store
                .verify_and_consume(OtpPurpose::PasswordReset, user, wrong)
                .await
                .is_err());
        }
        // Even the right code fails now.
        assert!(store
            .verify_and_consume(OtpPurpose::PasswordReset, user, &code)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn email_change_carries_pending_address() {
        let store = OtpStore::new();
        let user = Uuid::new_v4();
        let code = store
            .issue(OtpPurpose::EmailChange, user, Some("new@example.com".into()))
            .await;
        let out = store
            .verify_and_consume(OtpPurpose::EmailChange, user, &code)
            .await
            .unwrap();
        assert_eq!(out.as_deref(), Some("new@example.com"));
    }

    #[tokio::test]
    async fn sweep_removes_only_expired() {
        let store = OtpStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.issue(OtpPurpose::PasswordReset, a, None).await;
        store.issue(OtpPurpose::PasswordReset, b, None).await;
        store.force_expire(OtpPurpose::PasswordReset, a).await;

        assert_eq!(store.sweep().await, 1);
        assert_eq!(store.sweep().await, 0);
    }
}
