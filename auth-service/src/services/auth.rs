//! Session manager and login state machine.
//!
//! Login proceeds through explicit gates: credentials, user email
//! verification, membership resolution, organization email verification,
//! then the organization's MFA mandate. Every non-terminal outcome is a
//! `LoginFlow` variant rather than an error, so callers handle each branch
//! exhaustively. Tokens are only ever minted by `complete_login`.

use std::sync::Arc;

use rand::Rng;
use uuid::Uuid;

use crate::config::MfaConfig;
use crate::db::Database;
use crate::dtos::auth::{
    LoginRequest, LoginSuccessResponse, RefreshResponse, RegisterOrganizationRequest,
    RegisterOrganizationResponse,
};
use crate::models::{
    generate_slug, MembershipDetail, Organization, OrganizationCandidate, OrganizationResponse,
    OrgMembership, Session, User, VerificationKind, VerificationToken, OWNER_ROLE_SLUG,
};
use crate::utils::{hash_secret, secret_matches, verify_secret, Secret, SecretHash};

use super::audit::AuditRecorder;
use super::challenge::{self, LoginChallenge};
use super::email::EmailProvider;
use super::error::ServiceError;
use super::hierarchy;
use super::jwt::JwtService;
use super::mfa::MfaService;
use super::store::EphemeralStore;

/// Outcome of a login attempt. `Complete` is the only state that carries
/// tokens; the pending states reference server-side ephemeral state by an
/// opaque id.
#[derive(Debug)]
pub enum LoginFlow {
    Complete(Box<LoginSuccessResponse>),
    OrgSelectionPending { organizations: Vec<OrganizationCandidate> },
    MfaSetupRequired { temp_setup_token: String },
    MfaVerificationRequired { temp_token: String },
}

#[derive(Clone)]
pub struct AuthService {
    db: Database,
    email: Arc<dyn EmailProvider>,
    jwt: JwtService,
    store: Arc<dyn EphemeralStore>,
    audit: Arc<dyn AuditRecorder>,
    mfa: MfaService,
    mfa_config: MfaConfig,
    base_url: String,
}

impl AuthService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Database,
        email: Arc<dyn EmailProvider>,
        jwt: JwtService,
        store: Arc<dyn EphemeralStore>,
        audit: Arc<dyn AuditRecorder>,
        mfa: MfaService,
        mfa_config: MfaConfig,
        base_url: String,
    ) -> Self {
        Self {
            db,
            email,
            jwt,
            store,
            audit,
            mfa,
            mfa_config,
            base_url,
        }
    }

    /// Check credentials against the store. Unknown email and wrong
    /// password produce the same error.
    async fn validate_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<User, ServiceError> {
        let user = self
            .db
            .find_active_user_by_email(email)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        verify_secret(
            &Secret::new(password.to_string()),
            &SecretHash::new(user.password_hash.clone()),
        )
        .map_err(|_| ServiceError::InvalidCredentials)?;

        Ok(user)
    }

    /// Lightweight password check for re-auth flows; never reveals why it
    /// failed.
    pub async fn verify_password(&self, email: &str, password: &str) -> Result<User, ServiceError> {
        self.validate_credentials(email, password).await
    }

    /// Run the login state machine.
    pub async fn login(&self, req: LoginRequest) -> Result<LoginFlow, ServiceError> {
        let user = self.validate_credentials(&req.email, &req.password).await?;

        // Distinct from a credential failure: registration already implied
        // the account exists, so the message can say what to do.
        if !user.email_verified {
            return Err(ServiceError::EmailNotVerified);
        }

        let memberships = self.db.list_active_membership_details(user.user_id).await?;

        let membership = match req.organization_id {
            Some(org_id) => memberships
                .iter()
                .find(|m| m.organization_id == org_id)
                .ok_or(ServiceError::MembershipNotFound)?,
            None => match memberships.len() {
                0 => return Err(ServiceError::MembershipNotFound),
                1 => &memberships[0],
                _ => {
                    return Ok(LoginFlow::OrgSelectionPending {
                        organizations: memberships.iter().map(OrganizationCandidate::from).collect(),
                    })
                }
            },
        };

        // Organization-level gate, independent of the user-level one
        if !membership.org_email_verified {
            return Err(ServiceError::OrganizationEmailNotVerified);
        }

        if membership.org_mfa_required {
            let needs_setup = !user.mfa_setup_complete();
            let ttl = if needs_setup {
                self.mfa_config.login_setup_ttl_seconds
            } else {
                self.mfa_config.challenge_ttl_seconds
            };
            let challenge = LoginChallenge {
                user_id: user.user_id,
                organization_id: membership.organization_id,
                email: user.email.to_lowercase(),
                role_id: membership.role_id,
                expires_at: challenge::expiry_millis(ttl),
            };

            if needs_setup {
                let temp_setup_token =
                    challenge::mint_login_setup_challenge(self.store.as_ref(), &challenge, ttl)
                        .await?;
                return Ok(LoginFlow::MfaSetupRequired { temp_setup_token });
            }

            let temp_token =
                challenge::mint_verification_challenge(self.store.as_ref(), &challenge, ttl)
                    .await?;
            return Ok(LoginFlow::MfaVerificationRequired { temp_token });
        }

        let success = self.complete_login(&user, membership).await?;
        Ok(LoginFlow::Complete(Box::new(success)))
    }

    /// Terminal state: stamp last login, mint the token pair, persist the
    /// session with the refresh token hashed at rest.
    async fn complete_login(
        &self,
        user: &User,
        membership: &MembershipDetail,
    ) -> Result<LoginSuccessResponse, ServiceError> {
        self.db.update_last_login(user.user_id).await?;

        let access_token = self
            .jwt
            .generate_access_token(
                user.user_id,
                &user.email,
                Some(membership.organization_id),
                Some(membership.role_id),
                false,
            )
            .map_err(ServiceError::Internal)?;

        let refresh_token = self
            .jwt
            .generate_refresh_token(user.user_id)
            .map_err(ServiceError::Internal)?;

        let token_hash = hash_secret(&Secret::new(refresh_token.clone()))
            .map_err(ServiceError::Internal)?;

        let session = Session::new(
            user.user_id,
            Some(membership.organization_id),
            token_hash.into_string(),
            self.jwt.refresh_token_expiry_days(),
        );
        self.db.insert_session(&session).await?;

        tracing::info!(user_id = %user.user_id, organization_id = %membership.organization_id, "Login complete");

        self.audit.record(
            Some(membership.organization_id),
            Some(user.user_id),
            "user_login",
            "session",
            &session.session_id.to_string(),
            None,
            None,
        );

        Ok(LoginSuccessResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.access_token_expiry_seconds(),
            user: user.sanitized(),
            organization: Some(OrganizationResponse {
                org_id: membership.organization_id,
                org_name: membership.org_name.clone(),
                org_slug: membership.org_slug.clone(),
            }),
        })
    }

    /// System-admin login: no organization context, session has no
    /// organization id.
    pub async fn system_admin_login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<LoginSuccessResponse, ServiceError> {
        let user = self.validate_credentials(email, password).await?;

        if !user.is_system_admin {
            return Err(ServiceError::SystemAdminRequired);
        }
        if !user.email_verified {
            return Err(ServiceError::EmailNotVerified);
        }

        self.db.update_last_login(user.user_id).await?;

        let access_token = self
            .jwt
            .generate_access_token(user.user_id, &user.email, None, None, true)
            .map_err(ServiceError::Internal)?;
        let refresh_token = self
            .jwt
            .generate_refresh_token(user.user_id)
            .map_err(ServiceError::Internal)?;

        let token_hash =
            hash_secret(&Secret::new(refresh_token.clone())).map_err(ServiceError::Internal)?;

        let session = Session::new(
            user.user_id,
            None,
            token_hash.into_string(),
            self.jwt.refresh_token_expiry_days(),
        );
        self.db.insert_session(&session).await?;

        tracing::info!(user_id = %user.user_id, "System admin login complete");

        self.audit.record(
            None,
            Some(user.user_id),
            "system_admin_login",
            "session",
            &session.session_id.to_string(),
            None,
            None,
        );

        Ok(LoginSuccessResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.access_token_expiry_seconds(),
            user: user.sanitized(),
            organization: None,
        })
    }

    /// Second factor for a pending login. The challenge is re-checked for
    /// expiry to produce a precise error, and consumed atomically only
    /// after the code verifies - a wrong code leaves it usable, two racing
    /// correct codes complete at most one login.
    pub async fn verify_mfa_and_login(
        &self,
        temp_token: &str,
        code: &str,
    ) -> Result<LoginSuccessResponse, ServiceError> {
        let pending =
            challenge::peek_verification_challenge(self.store.as_ref(), temp_token).await?;

        let user = self
            .db
            .find_active_user_by_id(pending.user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        if !user.mfa_setup_complete() {
            return Err(ServiceError::MfaNotEnabled);
        }

        self.mfa.verify_code(&user, code).await?;

        let pending =
            challenge::consume_verification_challenge(self.store.as_ref(), temp_token).await?;

        let membership = self
            .db
            .find_active_membership_detail(pending.user_id, pending.organization_id)
            .await?
            .ok_or(ServiceError::MembershipNotFound)?;

        if !membership.org_email_verified {
            return Err(ServiceError::OrganizationEmailNotVerified);
        }

        self.complete_login(&user, &membership).await
    }

    /// Exchange a refresh token for a new access token. The stored session
    /// is authoritative: its hash must match and its expiry/revocation
    /// status decides validity, regardless of the JWT's own expiry.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ServiceError> {
        let claims = self
            .jwt
            .validate_refresh_token(refresh_token)
            .map_err(|_| ServiceError::AuthTokenInvalid)?;

        let raw = Secret::new(refresh_token.to_string());
        let sessions = self.db.find_unrevoked_sessions_by_user(claims.sub).await?;

        let session = sessions
            .iter()
            .find(|s| secret_matches(&raw, &SecretHash::new(s.refresh_token_hash.clone())))
            .ok_or(ServiceError::SessionNotFound)?;

        if !session.is_valid() {
            return Err(ServiceError::AuthTokenInvalid);
        }

        let user = self
            .db
            .find_active_user_by_id(claims.sub)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        if !user.email_verified {
            return Err(ServiceError::EmailNotVerified);
        }

        let access_token = match session.organization_id {
            Some(org_id) => {
                let membership = self
                    .db
                    .find_active_membership_detail(user.user_id, org_id)
                    .await?
                    .ok_or(ServiceError::MembershipNotFound)?;
                self.jwt
                    .generate_access_token(
                        user.user_id,
                        &user.email,
                        Some(org_id),
                        Some(membership.role_id),
                        false,
                    )
                    .map_err(ServiceError::Internal)?
            }
            None => {
                if !user.is_system_admin {
                    return Err(ServiceError::SystemAdminRequired);
                }
                self.jwt
                    .generate_access_token(user.user_id, &user.email, None, None, true)
                    .map_err(ServiceError::Internal)?
            }
        };

        Ok(RefreshResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.access_token_expiry_seconds(),
        })
    }

    /// Revoke the session backing a refresh token.
    pub async fn logout(&self, user_id: Uuid, refresh_token: &str) -> Result<(), ServiceError> {
        let claims = self
            .jwt
            .validate_refresh_token(refresh_token)
            .map_err(|_| ServiceError::AuthTokenInvalid)?;

        if claims.sub != user_id {
            return Err(ServiceError::AuthTokenInvalid);
        }

        let raw = Secret::new(refresh_token.to_string());
        let sessions = self.db.find_unrevoked_sessions_by_user(user_id).await?;
        let session = sessions
            .iter()
            .find(|s| secret_matches(&raw, &SecretHash::new(s.refresh_token_hash.clone())))
            .ok_or(ServiceError::SessionNotFound)?;

        self.db.revoke_session(session.session_id).await?;

        tracing::info!(user_id = %user_id, "User logged out");

        self.audit.record(
            session.organization_id,
            Some(user_id),
            "user_logout",
            "session",
            &session.session_id.to_string(),
            None,
            None,
        );

        Ok(())
    }

    /// Register an organization with its owner. User, organization, owner
    /// membership, and verification tokens commit in one transaction;
    /// verification emails go out after commit, best-effort.
    pub async fn register_organization(
        &self,
        req: RegisterOrganizationRequest,
    ) -> Result<RegisterOrganizationResponse, ServiceError> {
        if self
            .db
            .find_organization_by_name(&req.organization_name)
            .await?
            .is_some()
        {
            return Err(ServiceError::OrganizationNameTaken);
        }

        // One address backs at most one organization, even when it equals
        // the owner's personal email.
        if self
            .db
            .find_organization_by_email(&req.organization_email)
            .await?
            .is_some()
        {
            return Err(ServiceError::OrganizationEmailTaken);
        }

        let slug = generate_slug(&req.organization_name);
        if self.db.find_organization_by_slug(&slug).await?.is_some() {
            return Err(ServiceError::OrganizationNameTaken);
        }

        let owner_role = self
            .db
            .find_system_role_by_slug(OWNER_ROLE_SLUG)
            .await?
            .ok_or_else(|| {
                ServiceError::Internal(anyhow::anyhow!("Organization owner role is not seeded"))
            })?;

        let (owner, is_new_owner) = if req.is_existing_user {
            let user = self
                .db
                .find_active_user_by_email(&req.owner_email)
                .await?
                .ok_or(ServiceError::UserNotFound)?;
            (user, false)
        } else {
            if self.db.find_user_by_email(&req.owner_email).await?.is_some() {
                return Err(ServiceError::EmailAlreadyRegistered);
            }
            let password = req.owner_password.as_deref().ok_or_else(|| {
                ServiceError::Validation("password is required for new users".to_string())
            })?;
            let password_hash =
                hash_secret(&Secret::new(password.to_string())).map_err(ServiceError::Internal)?;
            (
                User::new(
                    req.owner_email.clone(),
                    password_hash.into_string(),
                    req.owner_display_name.clone(),
                ),
                true,
            )
        };

        let organization = Organization::new(
            req.organization_name.clone(),
            slug,
            req.organization_email.clone(),
        );
        let membership = OrgMembership::new(owner.user_id, organization.org_id, owner_role.role_id);

        let user_token = (!owner.email_verified).then(|| {
            VerificationToken::new_registration(
                owner.user_id,
                owner.email.clone(),
                generate_random_token(),
            )
        });
        let org_token = VerificationToken::new_organization_email(
            owner.user_id,
            organization.email.clone(),
            generate_random_token(),
        );

        // All-or-nothing: a failure in any row rolls back the registration
        let mut tx = self.db.begin().await?;
        if is_new_owner {
            self.db.insert_user_tx(&mut tx, &owner).await?;
        }
        self.db.insert_organization_tx(&mut tx, &organization).await?;
        self.db.insert_membership_tx(&mut tx, &membership).await?;
        if let Some(token) = &user_token {
            self.db.insert_verification_token_tx(&mut tx, token).await?;
        }
        self.db
            .insert_verification_token_tx(&mut tx, &org_token)
            .await?;
        tx.commit().await?;

        tracing::info!(
            organization_id = %organization.org_id,
            user_id = %owner.user_id,
            "Organization registered"
        );

        self.audit.record(
            Some(organization.org_id),
            Some(owner.user_id),
            "organization_registration",
            "organization",
            &organization.org_id.to_string(),
            None,
            Some(serde_json::json!({ "name": organization.org_name })),
        );

        // Notification failures must never fail the registration
        let email = self.email.clone();
        let base_url = self.base_url.clone();
        let owner_email = owner.email.clone();
        let org_email = organization.email.clone();
        let org_name = organization.org_name.clone();
        let org_token_value = org_token.token.clone();
        let user_token_value = user_token.as_ref().map(|t| t.token.clone());
        tokio::spawn(async move {
            if let Some(token) = user_token_value {
                if let Err(e) = email
                    .send_verification_email(&owner_email, &token, &base_url)
                    .await
                {
                    tracing::error!(error = %e, "Failed to send owner verification email");
                }
            }
            if let Err(e) = email
                .send_organization_welcome_email(
                    &org_email,
                    &org_name,
                    &owner_email,
                    &org_token_value,
                    &base_url,
                )
                .await
            {
                tracing::error!(error = %e, "Failed to send organization verification email");
            }
        });

        Ok(RegisterOrganizationResponse {
            organization_id: organization.org_id,
            user_id: owner.user_id,
            message:
                "Organization registered. Please verify both your personal and organization email addresses."
                    .to_string(),
        })
    }

    /// Verify a user or organization email. Not-found and expired tokens
    /// are distinguishable; re-presenting a used token for an
    /// already-verified address reports success.
    pub async fn verify_email(&self, token: &str) -> Result<String, ServiceError> {
        let verification = self
            .db
            .find_verification_token(token)
            .await?
            .ok_or(ServiceError::TokenInvalid)?;

        if verification.is_expired() {
            return Err(ServiceError::TokenExpired);
        }

        let kind = verification.kind().ok_or(ServiceError::TokenInvalid)?;

        if verification.is_used() {
            let already_verified = match kind {
                VerificationKind::OrganizationEmail => self
                    .db
                    .find_organization_by_email(&verification.email)
                    .await?
                    .map(|o| o.email_verified)
                    .unwrap_or(false),
                VerificationKind::Registration => self
                    .db
                    .find_user_by_id(verification.user_id)
                    .await?
                    .map(|u| u.email_verified)
                    .unwrap_or(false),
                VerificationKind::PasswordReset => false,
            };
            if already_verified {
                return Ok("Email is already verified".to_string());
            }
            return Err(ServiceError::TokenAlreadyUsed);
        }

        match kind {
            VerificationKind::OrganizationEmail => {
                let org = self
                    .db
                    .find_organization_by_email(&verification.email)
                    .await?
                    .ok_or(ServiceError::OrganizationNotFound)?;
                self.db
                    .mark_verification_used(verification.verification_id)
                    .await?;
                self.db.mark_organization_email_verified(org.org_id).await?;
                tracing::info!(organization_id = %org.org_id, "Organization email verified");
                Ok("Organization email verified successfully".to_string())
            }
            VerificationKind::Registration => {
                self.db
                    .mark_verification_used(verification.verification_id)
                    .await?;
                let updated = self
                    .db
                    .mark_user_email_verified(verification.user_id)
                    .await?;
                if updated == 0 {
                    return Err(ServiceError::UserNotFound);
                }
                tracing::info!(user_id = %verification.user_id, "Email verified for user");
                Ok("Email verified successfully".to_string())
            }
            // Reset tokens are consumed by the reset endpoint only
            VerificationKind::PasswordReset => Err(ServiceError::TokenInvalid),
        }
    }

    /// Start a password reset. The response never reveals whether the
    /// address is registered.
    pub async fn forgot_password(&self, email_address: &str) -> Result<(), ServiceError> {
        let user = match self.db.find_active_user_by_email(email_address).await? {
            Some(user) => user,
            None => return Ok(()),
        };

        let token_value = generate_random_token();
        let token = VerificationToken::new_password_reset(
            user.user_id,
            user.email.clone(),
            token_value.clone(),
        );
        self.db.insert_verification_token(&token).await?;

        tracing::info!(user_id = %user.user_id, "Password reset requested");

        self.audit.record(
            None,
            Some(user.user_id),
            "password_reset_request",
            "user",
            &user.user_id.to_string(),
            None,
            None,
        );

        let email = self.email.clone();
        let base_url = self.base_url.clone();
        let to = user.email.clone();
        tokio::spawn(async move {
            if let Err(e) = email
                .send_password_reset_email(&to, &token_value, &base_url)
                .await
            {
                tracing::error!(error = %e, "Failed to send password reset email");
            }
        });

        Ok(())
    }

    /// Complete a password reset and revoke every open session for the
    /// user. Expired and already-used tokens get specific messages; an
    /// unknown token gets the generic one.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        let verification = self
            .db
            .find_verification_token(token)
            .await?
            .ok_or(ServiceError::TokenInvalid)?;

        if verification.kind() != Some(VerificationKind::PasswordReset) {
            return Err(ServiceError::TokenInvalid);
        }
        if verification.is_expired() {
            return Err(ServiceError::TokenExpired);
        }
        if verification.is_used() {
            return Err(ServiceError::TokenAlreadyUsed);
        }

        let password_hash = hash_secret(&Secret::new(new_password.to_string()))
            .map_err(ServiceError::Internal)?;

        self.db
            .mark_verification_used(verification.verification_id)
            .await?;
        self.db
            .update_password(verification.user_id, password_hash.as_str())
            .await?;
        self.db
            .revoke_all_sessions_for_user(verification.user_id)
            .await?;

        tracing::info!(user_id = %verification.user_id, "Password reset successful");

        self.audit.record(
            None,
            Some(verification.user_id),
            "password_reset_confirm",
            "user",
            &verification.user_id.to_string(),
            None,
            None,
        );

        Ok(())
    }

    /// Prove recent re-authentication with a password or an MFA code and
    /// mint a step-up token scoped to the app-session audience.
    pub async fn issue_step_up_token(
        &self,
        user_id: Uuid,
        password: Option<&str>,
        mfa_code: Option<&str>,
    ) -> Result<String, ServiceError> {
        let user = self
            .db
            .find_active_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        match (mfa_code, password) {
            (Some(code), _) => self.mfa.verify_code(&user, code).await?,
            (None, Some(password)) => {
                let verified = self.validate_credentials(&user.email, password).await?;
                if verified.user_id != user_id {
                    return Err(ServiceError::InvalidCredentials);
                }
            }
            (None, None) => {
                return Err(ServiceError::Validation(
                    "password or MFA code is required".to_string(),
                ))
            }
        }

        self.jwt
            .generate_step_up_token(user_id)
            .map_err(ServiceError::Internal)
    }

    /// Check a previously issued step-up token. Fails closed on any
    /// signature, expiry, audience, or subject mismatch.
    pub fn verify_step_up_token(&self, user_id: Uuid, token: &str) -> Result<(), ServiceError> {
        let claims = self
            .jwt
            .validate_step_up_token(token)
            .map_err(|_| ServiceError::AuthTokenInvalid)?;
        if claims.sub != user_id {
            return Err(ServiceError::AuthTokenInvalid);
        }
        Ok(())
    }

    /// List roles visible to a member (requires `roles.view` for
    /// non-owners).
    pub async fn list_roles(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Vec<crate::models::Role>, ServiceError> {
        let membership = self
            .db
            .find_active_membership_detail(user_id, organization_id)
            .await?
            .ok_or(ServiceError::MembershipNotFound)?;

        if !membership.is_organization_owner
            && !self
                .db
                .role_has_permission(membership.role_id, "roles.view")
                .await?
        {
            return Err(ServiceError::MissingPermission("view roles".to_string()));
        }

        Ok(self.db.list_roles_for_org(organization_id).await?)
    }

    /// List the roles the caller is allowed to hand out.
    pub async fn list_assignable_roles(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Vec<crate::models::Role>, ServiceError> {
        let membership = self
            .db
            .find_active_membership_detail(user_id, organization_id)
            .await?
            .ok_or(ServiceError::MembershipNotFound)?;

        if !membership.is_organization_owner
            && !self
                .db
                .role_has_permission(membership.role_id, "roles.assign")
                .await?
        {
            return Err(ServiceError::MissingPermission("assign roles".to_string()));
        }

        let actor_role = membership.role();
        let roles = self.db.list_roles_for_org(organization_id).await?;
        Ok(roles
            .into_iter()
            .filter(|r| hierarchy::is_assignable(&actor_role, r))
            .collect())
    }

    /// Reassign a member's role, enforcing the full hierarchy rules.
    pub async fn assign_role(
        &self,
        actor_user_id: Uuid,
        organization_id: Uuid,
        target_user_id: Uuid,
        new_role_id: Uuid,
    ) -> Result<(), ServiceError> {
        let actor_membership = self
            .db
            .find_active_membership_detail(actor_user_id, organization_id)
            .await?
            .ok_or(ServiceError::MembershipNotFound)?;

        if !actor_membership.is_organization_owner
            && !self
                .db
                .role_has_permission(actor_membership.role_id, "roles.assign")
                .await?
        {
            return Err(ServiceError::MissingPermission("assign roles".to_string()));
        }

        let target_membership = self
            .db
            .find_active_membership_detail(target_user_id, organization_id)
            .await?
            .ok_or(ServiceError::MembershipNotFound)?;

        let current_role = self
            .db
            .find_role_by_id(target_membership.role_id)
            .await?
            .ok_or(ServiceError::RoleNotFound)?;
        let new_role = self
            .db
            .find_role_for_org(new_role_id, organization_id)
            .await?
            .ok_or(ServiceError::RoleNotFound)?;

        let actor_role = actor_membership.role();
        hierarchy::can_assign(&actor_role, &current_role, &new_role)?;

        self.db
            .update_membership_role(target_membership.membership_id, new_role_id)
            .await?;

        tracing::info!(
            target_user_id = %target_user_id,
            organization_id = %organization_id,
            role = %new_role.role_slug,
            "Role assigned"
        );

        self.audit.record(
            Some(organization_id),
            Some(actor_user_id),
            "role_assigned",
            "org_membership",
            &target_membership.membership_id.to_string(),
            Some(serde_json::json!({ "role_id": current_role.role_id })),
            Some(serde_json::json!({ "role_id": new_role.role_id })),
        );

        Ok(())
    }

    /// Set a custom role's hierarchy level (owner/admin only, >= 3).
    pub async fn set_role_hierarchy_level(
        &self,
        actor_user_id: Uuid,
        organization_id: Uuid,
        role_id: Uuid,
        level: i32,
    ) -> Result<(), ServiceError> {
        let actor_membership = self
            .db
            .find_active_membership_detail(actor_user_id, organization_id)
            .await?
            .ok_or(ServiceError::MembershipNotFound)?;

        let target = self
            .db
            .find_role_for_org(role_id, organization_id)
            .await?
            .ok_or(ServiceError::RoleNotFound)?;

        let actor_role = actor_membership.role();
        hierarchy::can_set_hierarchy_level(&actor_role, &target, level)?;

        let before = target.hierarchy_level;
        self.db.update_role_hierarchy_level(role_id, level).await?;

        self.audit.record(
            Some(organization_id),
            Some(actor_user_id),
            "role_hierarchy_updated",
            "role",
            &role_id.to_string(),
            Some(serde_json::json!({ "hierarchy_level": before })),
            Some(serde_json::json!({ "hierarchy_level": level })),
        );

        Ok(())
    }

    /// Toggle the organization-wide MFA mandate (owner or admin).
    pub async fn set_organization_mfa_required(
        &self,
        actor_user_id: Uuid,
        organization_id: Uuid,
        mfa_required: bool,
    ) -> Result<(), ServiceError> {
        let actor_membership = self
            .db
            .find_active_membership_detail(actor_user_id, organization_id)
            .await?
            .ok_or(ServiceError::MembershipNotFound)?;

        let actor_role = actor_membership.role();
        if hierarchy::authority_level(&actor_role) > hierarchy::ADMIN_LEVEL {
            return Err(ServiceError::InsufficientAuthority(
                "only organization owners and admins can change the MFA requirement".to_string(),
            ));
        }

        self.db
            .set_organization_mfa_required(organization_id, mfa_required)
            .await?;

        tracing::info!(
            organization_id = %organization_id,
            mfa_required,
            "Organization MFA requirement updated"
        );

        self.audit.record(
            Some(organization_id),
            Some(actor_user_id),
            "organization_mfa_updated",
            "organization",
            &organization_id.to_string(),
            Some(serde_json::json!({ "mfa_required": !mfa_required })),
            Some(serde_json::json!({ "mfa_required": mfa_required })),
        );

        Ok(())
    }
}

fn generate_random_token() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 32] = rng.gen();
    hex::encode(token_bytes)
}
