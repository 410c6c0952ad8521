//! MFA engine - TOTP secrets, backup codes, setup and verification.
//!
//! Setup is two-phase: `initialize_setup` stages a fresh secret in the
//! ephemeral store and nothing touches the user record until
//! `confirm_setup` validates a live code. Backup codes are generated at
//! confirmation, shown once, and consumed one at a time.

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use totp_rs::{Algorithm, Secret, TOTP};
use uuid::Uuid;

use crate::config::MfaConfig;
use crate::db::Database;
use crate::models::User;

use super::audit::AuditRecorder;
use super::challenge::{self, SetupStage};
use super::error::ServiceError;
use super::store::EphemeralStore;

/// Time steps of clock-skew tolerance on either side of now.
const TOTP_SKEW_STEPS: u8 = 2;
const TOTP_DIGITS: usize = 6;
const TOTP_STEP_SECONDS: u64 = 30;

const BACKUP_CODE_LENGTH: usize = 8;

/// Everything the client needs to render the enrollment screen.
#[derive(Debug)]
pub struct MfaSetupInitiation {
    pub secret: String,
    pub otp_url: String,
    pub qr_code_base64: String,
    pub temp_setup_token: String,
    pub user_email: String,
}

#[derive(Clone)]
pub struct MfaService {
    db: Database,
    store: Arc<dyn EphemeralStore>,
    audit: Arc<dyn AuditRecorder>,
    config: MfaConfig,
}

impl MfaService {
    pub fn new(
        db: Database,
        store: Arc<dyn EphemeralStore>,
        audit: Arc<dyn AuditRecorder>,
        config: MfaConfig,
    ) -> Self {
        Self {
            db,
            store,
            audit,
            config,
        }
    }

    /// Begin MFA enrollment: generate a secret and stage it, returning the
    /// provisioning URI and QR for the authenticator app. The user record
    /// is not touched until the setup is confirmed.
    pub async fn initialize_setup(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<MfaSetupInitiation, ServiceError> {
        let membership = self
            .db
            .find_active_membership_detail(user_id, organization_id)
            .await?
            .ok_or(ServiceError::MembershipNotFound)?;

        if !membership.org_mfa_required {
            return Err(ServiceError::MfaNotRequiredByOrganization);
        }

        let user = self
            .db
            .find_active_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        if user.mfa_setup_complete() {
            return Err(ServiceError::MfaAlreadySetUp);
        }

        let label = otp_label(&membership.org_name, &user.email);
        let secret = Secret::generate_secret();
        let secret_base32 = secret.to_encoded().to_string();

        let totp = build_totp(&secret_base32, &self.config.issuer, &label)?;
        let otp_url = totp.get_url();
        let qr_code_base64 = totp
            .get_qr_base64()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("QR generation failed: {}", e)))?;

        let stage = SetupStage {
            user_id,
            organization_id,
            user_email: user.email.to_lowercase(),
            secret: secret_base32.clone(),
            backup_codes: generate_backup_codes(self.config.backup_code_count),
            otp_label: label,
            expires_at: challenge::expiry_millis(self.config.setup_stage_ttl_seconds),
        };

        let temp_setup_token =
            challenge::stage_setup(self.store.as_ref(), &stage, self.config.setup_stage_ttl_seconds)
                .await?;

        Ok(MfaSetupInitiation {
            secret: secret_base32,
            otp_url,
            qr_code_base64,
            temp_setup_token,
            user_email: user.email,
        })
    }

    /// Confirm enrollment with a live code. On success the secret, backup
    /// codes and completion timestamp are persisted and the staged state is
    /// consumed; a wrong code leaves the stage intact for another attempt.
    pub async fn confirm_setup(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        setup_token: &str,
        code: &str,
    ) -> Result<Vec<String>, ServiceError> {
        let stage = match challenge::find_setup_token(self.store.as_ref(), setup_token).await? {
            Some((key, _)) if key.starts_with(challenge::LOGIN_SETUP_PREFIX) => {
                // A login-issued token proves who the user is but carries no
                // staged secret; enrollment must start at initialize.
                return Err(ServiceError::Validation(
                    "MFA setup has not been initialized; request a QR code first".to_string(),
                ));
            }
            Some(_) => challenge::peek_setup_stage(self.store.as_ref(), setup_token).await?,
            None => return Err(ServiceError::MfaChallengeInvalid),
        };

        if stage.user_id != user_id || stage.organization_id != organization_id {
            return Err(ServiceError::MfaChallengeInvalid);
        }

        let membership = self
            .db
            .find_active_membership_detail(user_id, organization_id)
            .await?
            .ok_or(ServiceError::MembershipNotFound)?;

        let user = self
            .db
            .find_active_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        // The staged secret is bound to the email it was generated for
        if user.email.to_lowercase() != stage.user_email {
            return Err(ServiceError::Validation(
                "setup token was issued for a different account".to_string(),
            ));
        }

        let clean_code = normalize_code(code);
        if clean_code.len() != TOTP_DIGITS || !clean_code.chars().all(|c| c.is_ascii_digit()) {
            return Err(ServiceError::Validation(format!(
                "verification code must be exactly {} digits",
                TOTP_DIGITS
            )));
        }

        let label = otp_label(&membership.org_name, &user.email);
        if !verify_totp(&stage.secret, &self.config.issuer, &label, &clean_code)? {
            return Err(ServiceError::InvalidMfaCode);
        }

        // Winning the atomic take is what completes the setup exactly once
        let stage = challenge::consume_setup_stage(self.store.as_ref(), setup_token).await?;

        self.db
            .complete_mfa_setup(user_id, &stage.secret, &stage.backup_codes)
            .await?;

        tracing::info!(user_id = %user_id, "MFA setup completed");

        self.audit.record(
            Some(organization_id),
            Some(user_id),
            "mfa_setup_completed",
            "user",
            &user_id.to_string(),
            None,
            None,
        );

        Ok(stage.backup_codes)
    }

    /// Verify a code for an already-enrolled user: a single-use backup code
    /// or a TOTP code within the skew window. Used at login and for
    /// sensitive-action re-authentication.
    pub async fn verify_code(&self, user: &User, code: &str) -> Result<(), ServiceError> {
        let secret = match (&user.mfa_secret, user.mfa_enabled) {
            (Some(secret), true) => secret.clone(),
            _ => return Err(ServiceError::MfaNotEnabled),
        };

        let clean_code = normalize_code(code);

        // Backup codes are 8 alphanumerics, TOTP codes 6 digits; check the
        // backup set first so a used code is removed before any TOTP math
        if let Some(remaining) = consume_backup_code(&user.mfa_backup_codes, &clean_code) {
            self.db.update_backup_codes(user.user_id, &remaining).await?;
            tracing::info!(user_id = %user.user_id, "Backup code consumed");
            return Ok(());
        }

        if verify_totp(&secret, &self.config.issuer, &user.email, &clean_code)? {
            Ok(())
        } else {
            Err(ServiceError::InvalidMfaCode)
        }
    }

    /// Replace the backup-code set, gated on a valid code.
    pub async fn regenerate_backup_codes(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        code: &str,
    ) -> Result<Vec<String>, ServiceError> {
        self.db
            .find_active_membership_detail(user_id, organization_id)
            .await?
            .ok_or(ServiceError::MembershipNotFound)?;

        let user = self
            .db
            .find_active_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        self.verify_code(&user, code).await?;

        let codes = generate_backup_codes(self.config.backup_code_count);
        self.db.update_backup_codes(user_id, &codes).await?;

        tracing::info!(user_id = %user_id, "Backup codes regenerated");

        Ok(codes)
    }

    /// Disable MFA entirely, gated on a valid code.
    pub async fn disable(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        code: &str,
    ) -> Result<(), ServiceError> {
        self.db
            .find_active_membership_detail(user_id, organization_id)
            .await?
            .ok_or(ServiceError::MembershipNotFound)?;

        let user = self
            .db
            .find_active_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        if !user.mfa_enabled {
            return Err(ServiceError::MfaNotEnabled);
        }

        self.verify_code(&user, code).await?;
        self.db.disable_mfa(user_id).await?;

        tracing::info!(user_id = %user_id, "MFA disabled");

        self.audit.record(
            Some(organization_id),
            Some(user_id),
            "mfa_disabled",
            "user",
            &user_id.to_string(),
            None,
            None,
        );

        Ok(())
    }

    /// Whether the organization mandates MFA for this user and whether
    /// their setup is complete.
    pub async fn status(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<(bool, bool), ServiceError> {
        let membership = match self
            .db
            .find_active_membership_detail(user_id, organization_id)
            .await?
        {
            Some(m) => m,
            None => return Ok((false, false)),
        };

        if !membership.org_mfa_required {
            return Ok((false, false));
        }

        let user = self
            .db
            .find_active_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        Ok((true, user.mfa_setup_complete()))
    }
}

/// Label embedded in the provisioning URI, truncated so the QR payload
/// stays scannable.
fn otp_label(org_name: &str, user_email: &str) -> String {
    let org: String = org_name.chars().take(20).collect();
    let email: String = user_email.chars().take(30).collect();
    format!("{}:{}", org, email)
}

fn normalize_code(code: &str) -> String {
    code.replace([' ', '-'], "")
}

fn build_totp(secret_base32: &str, issuer: &str, account_name: &str) -> Result<TOTP, ServiceError> {
    TOTP::new(
        Algorithm::SHA1,
        TOTP_DIGITS,
        TOTP_SKEW_STEPS,
        TOTP_STEP_SECONDS,
        Secret::Encoded(secret_base32.to_string())
            .to_bytes()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Invalid TOTP secret: {:?}", e)))?,
        Some(issuer.to_string()),
        account_name.to_string(),
    )
    .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to create TOTP: {}", e)))
}

/// Check a TOTP code against the current time. A system-time failure is
/// reported as "no match" rather than leaking why verification failed.
fn verify_totp(
    secret_base32: &str,
    issuer: &str,
    account_name: &str,
    code: &str,
) -> Result<bool, ServiceError> {
    let totp = build_totp(secret_base32, issuer, account_name)?;
    match totp.check_current(code) {
        Ok(valid) => Ok(valid),
        Err(e) => {
            tracing::warn!(error = %e, "TOTP verification error (system time issue?)");
            Ok(false)
        }
    }
}

/// Consume a backup code: returns the remaining set if the code was
/// present, None if it was not (including a second use of the same code).
fn consume_backup_code(codes: &[String], code: &str) -> Option<Vec<String>> {
    if !codes.iter().any(|c| c == code) {
        return None;
    }
    Some(codes.iter().filter(|c| *c != code).cloned().collect())
}

/// Generate single-use backup codes: uppercase alphanumerics, fixed length.
pub fn generate_backup_codes(count: usize) -> Vec<String> {
    (0..count)
        .map(|_| {
            rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(BACKUP_CODE_LENGTH)
                .map(|b| (b as char).to_ascii_uppercase())
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET_INPUT: &str = "test-secret-material-012345";

    fn encoded_secret() -> String {
        Secret::Raw(TEST_SECRET_INPUT.as_bytes().to_vec())
            .to_encoded()
            .to_string()
    }

    #[test]
    fn generated_code_verifies_within_window() {
        let secret = encoded_secret();
        let totp = build_totp(&secret, "auth-service", "Acme:user@example.com").unwrap();

        let now = 1_700_000_000u64;
        let code = totp.generate(now);
        assert!(totp.check(&code, now));
        // skew window covers +/- 2 steps
        assert!(totp.check(&code, now + TOTP_STEP_SECONDS * 2));
        assert!(totp.check(&code, now - TOTP_STEP_SECONDS * 2));
        assert!(!totp.check(&code, now + TOTP_STEP_SECONDS * 5));
    }

    #[test]
    fn wrong_code_does_not_verify() {
        let secret = encoded_secret();
        let totp = build_totp(&secret, "auth-service", "Acme:user@example.com").unwrap();
        assert!(!totp.check("000000", 1_700_000_000));
    }

    #[test]
    fn provisioning_url_carries_label_and_issuer() {
        let secret = encoded_secret();
        let totp = build_totp(&secret, "auth-service", "Acme:user@example.com").unwrap();
        let url = totp.get_url();
        assert!(url.starts_with("otpauth://totp/"));
        assert!(url.contains("issuer=auth-service"));
    }

    #[test]
    fn backup_codes_are_fixed_length_uppercase_alphanumerics() {
        let codes = generate_backup_codes(10);
        assert_eq!(codes.len(), 10);
        for code in &codes {
            assert_eq!(code.len(), BACKUP_CODE_LENGTH);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn otp_label_truncates_long_parts() {
        let label = otp_label(
            "An Organization Name That Goes On Forever",
            "a.very.long.address@an-extremely-long-domain.example.com",
        );
        let (org, email) = label.split_once(':').unwrap();
        assert_eq!(org.chars().count(), 20);
        assert_eq!(email.chars().count(), 30);
    }

    #[test]
    fn normalize_strips_spaces_and_dashes() {
        assert_eq!(normalize_code("123 456"), "123456");
        assert_eq!(normalize_code("123-456"), "123456");
    }

    #[test]
    fn backup_code_cannot_be_consumed_twice() {
        let codes = vec!["AAAA1111".to_string(), "BBBB2222".to_string()];

        let remaining = consume_backup_code(&codes, "AAAA1111").expect("first use succeeds");
        assert_eq!(remaining, vec!["BBBB2222".to_string()]);

        // Second use of the same code against the updated set must fail
        assert!(consume_backup_code(&remaining, "AAAA1111").is_none());
    }

    #[test]
    fn unknown_backup_code_is_rejected() {
        let codes = vec!["AAAA1111".to_string()];
        assert!(consume_backup_code(&codes, "ZZZZ9999").is_none());
    }
}
