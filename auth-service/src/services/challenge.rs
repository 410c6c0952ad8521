//! Ephemeral MFA challenge lifecycle.
//!
//! Three key namespaces, each with its own TTL:
//! - `mfa:challenge:{id}` - login verification challenge (user already has
//!   MFA set up); short-lived.
//! - `mfa:setup:temp:{id}` - login-originated setup challenge (organization
//!   mandates MFA, user not yet set up); longer-lived.
//! - `mfa:setup:{id}` - staged setup state from an explicit
//!   initialize-setup call, holding the not-yet-persisted secret.
//!
//! Payloads embed `expires_at` (epoch millis) and are re-checked on read so
//! an expired challenge yields a precise "expired" error even if the store
//! has not evicted it yet. Consumption goes through the store's atomic
//! `take`, so one challenge completes at most one login.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ServiceError;
use super::store::EphemeralStore;

pub const VERIFICATION_PREFIX: &str = "mfa:challenge:";
pub const LOGIN_SETUP_PREFIX: &str = "mfa:setup:temp:";
pub const SETUP_STAGE_PREFIX: &str = "mfa:setup:";

/// Challenge minted during login, referencing who is mid-flow and where.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginChallenge {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub email: String,
    pub role_id: Uuid,
    /// Epoch milliseconds.
    pub expires_at: i64,
}

/// Staged MFA setup state; the secret lives here until confirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupStage {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub user_email: String,
    pub secret: String,
    pub backup_codes: Vec<String>,
    pub otp_label: String,
    /// Epoch milliseconds.
    pub expires_at: i64,
}

pub fn expiry_millis(ttl_seconds: i64) -> i64 {
    Utc::now().timestamp_millis() + ttl_seconds * 1000
}

fn is_past(expires_at: i64) -> bool {
    Utc::now().timestamp_millis() > expires_at
}

fn encode<T: Serialize>(payload: &T) -> Result<String, ServiceError> {
    serde_json::to_string(payload)
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Challenge encode error: {}", e)))
}

fn decode<T: for<'de> Deserialize<'de>>(raw: &str) -> Result<T, ServiceError> {
    serde_json::from_str(raw).map_err(|_| ServiceError::MfaChallengeInvalid)
}

/// Mint a login verification challenge; returns the opaque id.
pub async fn mint_verification_challenge(
    store: &dyn EphemeralStore,
    challenge: &LoginChallenge,
    ttl_seconds: i64,
) -> Result<String, ServiceError> {
    let id = Uuid::new_v4().to_string();
    store
        .set_ex(
            &format!("{}{}", VERIFICATION_PREFIX, id),
            &encode(challenge)?,
            ttl_seconds,
        )
        .await
        .map_err(ServiceError::Store)?;
    Ok(id)
}

/// Mint a login-originated setup challenge; returns the opaque id.
pub async fn mint_login_setup_challenge(
    store: &dyn EphemeralStore,
    challenge: &LoginChallenge,
    ttl_seconds: i64,
) -> Result<String, ServiceError> {
    let id = Uuid::new_v4().to_string();
    store
        .set_ex(
            &format!("{}{}", LOGIN_SETUP_PREFIX, id),
            &encode(challenge)?,
            ttl_seconds,
        )
        .await
        .map_err(ServiceError::Store)?;
    Ok(id)
}

/// Stage a not-yet-confirmed MFA setup; returns the opaque id.
pub async fn stage_setup(
    store: &dyn EphemeralStore,
    stage: &SetupStage,
    ttl_seconds: i64,
) -> Result<String, ServiceError> {
    let id = Uuid::new_v4().to_string();
    store
        .set_ex(
            &format!("{}{}", SETUP_STAGE_PREFIX, id),
            &encode(stage)?,
            ttl_seconds,
        )
        .await
        .map_err(ServiceError::Store)?;
    Ok(id)
}

/// Peek at a verification challenge without consuming it, distinguishing
/// "expired" from "never existed".
pub async fn peek_verification_challenge(
    store: &dyn EphemeralStore,
    id: &str,
) -> Result<LoginChallenge, ServiceError> {
    let key = format!("{}{}", VERIFICATION_PREFIX, id);
    let raw = store
        .get(&key)
        .await
        .map_err(ServiceError::Store)?
        .ok_or(ServiceError::MfaChallengeInvalid)?;

    let challenge: LoginChallenge = decode(&raw)?;
    if is_past(challenge.expires_at) {
        let _ = store.delete(&key).await;
        return Err(ServiceError::MfaChallengeExpired);
    }
    Ok(challenge)
}

/// Consume a verification challenge. Called after the MFA code has been
/// validated; of two racing consumers only one gets the challenge back.
pub async fn consume_verification_challenge(
    store: &dyn EphemeralStore,
    id: &str,
) -> Result<LoginChallenge, ServiceError> {
    let key = format!("{}{}", VERIFICATION_PREFIX, id);
    let raw = store
        .take(&key)
        .await
        .map_err(ServiceError::Store)?
        .ok_or(ServiceError::MfaChallengeInvalid)?;

    let challenge: LoginChallenge = decode(&raw)?;
    if is_past(challenge.expires_at) {
        return Err(ServiceError::MfaChallengeExpired);
    }
    Ok(challenge)
}

/// Look up a setup token in either setup namespace (login-originated
/// tokens and explicit initialize-setup tokens are interchangeable at the
/// guard). Returns the matched key alongside the raw payload.
pub async fn find_setup_token(
    store: &dyn EphemeralStore,
    id: &str,
) -> Result<Option<(String, String)>, ServiceError> {
    let staged_key = format!("{}{}", SETUP_STAGE_PREFIX, id);
    if let Some(raw) = store.get(&staged_key).await.map_err(ServiceError::Store)? {
        return Ok(Some((staged_key, raw)));
    }
    let login_key = format!("{}{}", LOGIN_SETUP_PREFIX, id);
    if let Some(raw) = store.get(&login_key).await.map_err(ServiceError::Store)? {
        return Ok(Some((login_key, raw)));
    }
    Ok(None)
}

/// Peek at staged setup state (from initialize-setup), checking expiry.
pub async fn peek_setup_stage(
    store: &dyn EphemeralStore,
    id: &str,
) -> Result<SetupStage, ServiceError> {
    let key = format!("{}{}", SETUP_STAGE_PREFIX, id);
    let raw = store
        .get(&key)
        .await
        .map_err(ServiceError::Store)?
        .ok_or(ServiceError::MfaChallengeInvalid)?;

    let stage: SetupStage = decode(&raw)?;
    if is_past(stage.expires_at) {
        let _ = store.delete(&key).await;
        return Err(ServiceError::MfaChallengeExpired);
    }
    Ok(stage)
}

/// Consume staged setup state once the code has been verified.
pub async fn consume_setup_stage(
    store: &dyn EphemeralStore,
    id: &str,
) -> Result<SetupStage, ServiceError> {
    let key = format!("{}{}", SETUP_STAGE_PREFIX, id);
    let raw = store
        .take(&key)
        .await
        .map_err(ServiceError::Store)?
        .ok_or(ServiceError::MfaChallengeInvalid)?;

    let stage: SetupStage = decode(&raw)?;
    if is_past(stage.expires_at) {
        return Err(ServiceError::MfaChallengeExpired);
    }
    Ok(stage)
}

/// Resolve a login-originated setup token (no staged secret yet),
/// checking expiry.
pub async fn peek_login_setup_challenge(
    store: &dyn EphemeralStore,
    id: &str,
) -> Result<LoginChallenge, ServiceError> {
    let key = format!("{}{}", LOGIN_SETUP_PREFIX, id);
    let raw = store
        .get(&key)
        .await
        .map_err(ServiceError::Store)?
        .ok_or(ServiceError::MfaChallengeInvalid)?;

    let challenge: LoginChallenge = decode(&raw)?;
    if is_past(challenge.expires_at) {
        let _ = store.delete(&key).await;
        return Err(ServiceError::MfaChallengeExpired);
    }
    Ok(challenge)
}

/// Drop a login-originated setup token once setup has completed.
pub async fn discard_login_setup_challenge(
    store: &dyn EphemeralStore,
    id: &str,
) -> Result<(), ServiceError> {
    store
        .delete(&format!("{}{}", LOGIN_SETUP_PREFIX, id))
        .await
        .map_err(ServiceError::Store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::MockEphemeralStore;

    fn sample_challenge(ttl_seconds: i64) -> LoginChallenge {
        LoginChallenge {
            user_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            role_id: Uuid::new_v4(),
            expires_at: expiry_millis(ttl_seconds),
        }
    }

    #[tokio::test]
    async fn verification_challenge_round_trip() {
        let store = MockEphemeralStore::new();
        let challenge = sample_challenge(300);

        let id = mint_verification_challenge(&store, &challenge, 300)
            .await
            .unwrap();
        let peeked = peek_verification_challenge(&store, &id).await.unwrap();
        assert_eq!(peeked.user_id, challenge.user_id);

        let consumed = consume_verification_challenge(&store, &id).await.unwrap();
        assert_eq!(consumed.organization_id, challenge.organization_id);
    }

    #[tokio::test]
    async fn verification_challenge_consumes_exactly_once() {
        let store = MockEphemeralStore::new();
        let id = mint_verification_challenge(&store, &sample_challenge(300), 300)
            .await
            .unwrap();

        assert!(consume_verification_challenge(&store, &id).await.is_ok());
        assert!(matches!(
            consume_verification_challenge(&store, &id).await,
            Err(ServiceError::MfaChallengeInvalid)
        ));
    }

    #[tokio::test]
    async fn expired_challenge_reports_expired_not_missing() {
        let store = MockEphemeralStore::new();
        let id = mint_verification_challenge(&store, &sample_challenge(-60), 300)
            .await
            .unwrap();

        assert!(matches!(
            peek_verification_challenge(&store, &id).await,
            Err(ServiceError::MfaChallengeExpired)
        ));
        // expiry check deleted the entry; a second look reports invalid
        assert!(matches!(
            peek_verification_challenge(&store, &id).await,
            Err(ServiceError::MfaChallengeInvalid)
        ));
    }

    #[tokio::test]
    async fn challenge_namespaces_are_not_interchangeable() {
        let store = MockEphemeralStore::new();
        let challenge = sample_challenge(300);

        let verification_id = mint_verification_challenge(&store, &challenge, 300)
            .await
            .unwrap();
        let setup_id = mint_login_setup_challenge(&store, &challenge, 1800)
            .await
            .unwrap();

        // A verification challenge is invisible to the setup lookup
        assert!(find_setup_token(&store, &verification_id)
            .await
            .unwrap()
            .is_none());
        // And a setup challenge cannot be consumed as a verification one
        assert!(matches!(
            consume_verification_challenge(&store, &setup_id).await,
            Err(ServiceError::MfaChallengeInvalid)
        ));
    }

    #[tokio::test]
    async fn setup_token_lookup_checks_both_namespaces() {
        let store = MockEphemeralStore::new();
        let challenge = sample_challenge(1800);

        let login_id = mint_login_setup_challenge(&store, &challenge, 1800)
            .await
            .unwrap();
        assert!(find_setup_token(&store, &login_id).await.unwrap().is_some());

        let stage = SetupStage {
            user_id: challenge.user_id,
            organization_id: challenge.organization_id,
            user_email: challenge.email.clone(),
            secret: "JBSWY3DPEHPK3PXP".to_string(),
            backup_codes: vec!["AAAA1111".to_string()],
            otp_label: "Acme:user@example.com".to_string(),
            expires_at: expiry_millis(600),
        };
        let staged_id = stage_setup(&store, &stage, 600).await.unwrap();
        assert!(find_setup_token(&store, &staged_id)
            .await
            .unwrap()
            .is_some());
    }
}
