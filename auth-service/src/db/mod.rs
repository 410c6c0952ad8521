//! PostgreSQL database service.
//!
//! Wraps the connection pool with typed query methods. Multi-row
//! invariants (organization registration) run through the `*_tx` variants
//! inside a single transaction owned by the caller.

use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::models::{
    AuditLog, MembershipDetail, Organization, OrgMembership, Role, Session, User,
    VerificationToken,
};

const MEMBERSHIP_DETAIL_SELECT: &str = r#"
    SELECT m.membership_id, m.user_id, m.organization_id, m.role_id, m.member_state_code,
           o.org_name, o.org_slug, o.email_verified AS org_email_verified,
           o.mfa_required AS org_mfa_required, o.org_state_code,
           r.role_slug, r.role_name, r.is_organization_owner, r.is_system_role,
           r.is_default, r.hierarchy_level
    FROM org_memberships m
    JOIN organizations o ON o.org_id = m.organization_id
    JOIN roles r ON r.role_id = m.role_id
"#;

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Begin a transaction.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ==================== User Operations ====================

    /// Find user by ID.
    pub async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Find an active user by ID.
    pub async fn find_active_user_by_id(
        &self,
        user_id: Uuid,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE user_id = $1 AND user_state_code = 'active'",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Find user by email regardless of state (for conflict checks).
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    /// Find an active user by email.
    pub async fn find_active_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE LOWER(email) = LOWER($1) AND user_state_code = 'active'",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    /// Insert a new user inside a transaction.
    pub async fn insert_user_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: &User,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, email, password_hash, display_name, email_verified,
                               email_verified_utc, mfa_enabled, mfa_secret, mfa_backup_codes,
                               mfa_setup_completed_utc, is_system_admin, system_admin_role,
                               last_login_utc, user_state_code, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(user.user_id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.display_name)
        .bind(user.email_verified)
        .bind(user.email_verified_utc)
        .bind(user.mfa_enabled)
        .bind(&user.mfa_secret)
        .bind(&user.mfa_backup_codes)
        .bind(user.mfa_setup_completed_utc)
        .bind(user.is_system_admin)
        .bind(&user.system_admin_role)
        .bind(user.last_login_utc)
        .bind(&user.user_state_code)
        .bind(user.created_utc)
        .bind(user.updated_utc)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Mark a user's email verified.
    pub async fn mark_user_email_verified(&self, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email_verified = TRUE, email_verified_utc = NOW(), updated_utc = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Stamp last login.
    pub async fn update_last_login(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_utc = NOW(), updated_utc = NOW() WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Replace a user's password hash.
    pub async fn update_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET password_hash = $1, updated_utc = NOW() WHERE user_id = $2")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Persist a confirmed MFA setup: secret, enablement, completion stamp
    /// and the freshly generated backup codes, in one write.
    pub async fn complete_mfa_setup(
        &self,
        user_id: Uuid,
        secret: &str,
        backup_codes: &[String],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET mfa_enabled = TRUE, mfa_secret = $1, mfa_backup_codes = $2,
                mfa_setup_completed_utc = NOW(), updated_utc = NOW()
            WHERE user_id = $3
            "#,
        )
        .bind(secret)
        .bind(backup_codes)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replace the backup-code set (consume-on-use or regeneration).
    pub async fn update_backup_codes(
        &self,
        user_id: Uuid,
        backup_codes: &[String],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET mfa_backup_codes = $1, updated_utc = NOW() WHERE user_id = $2",
        )
        .bind(backup_codes)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Clear all MFA state for a user.
    pub async fn disable_mfa(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET mfa_enabled = FALSE, mfa_secret = NULL, mfa_backup_codes = '{}',
                mfa_setup_completed_utc = NULL, updated_utc = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ==================== Organization Operations ====================

    /// Find organization by ID.
    pub async fn find_organization_by_id(
        &self,
        org_id: Uuid,
    ) -> Result<Option<Organization>, sqlx::Error> {
        sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE org_id = $1")
            .bind(org_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Find organization by name.
    pub async fn find_organization_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Organization>, sqlx::Error> {
        sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE org_name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
    }

    /// Find organization by its (globally unique) organization email.
    pub async fn find_organization_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Organization>, sqlx::Error> {
        sqlx::query_as::<_, Organization>(
            "SELECT * FROM organizations WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    /// Find organization by slug.
    pub async fn find_organization_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Organization>, sqlx::Error> {
        sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE org_slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
    }

    /// Insert a new organization inside a transaction.
    pub async fn insert_organization_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        org: &Organization,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO organizations (org_id, org_name, org_slug, email, email_verified,
                                       mfa_required, org_state_code, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(org.org_id)
        .bind(&org.org_name)
        .bind(&org.org_slug)
        .bind(&org.email)
        .bind(org.email_verified)
        .bind(org.mfa_required)
        .bind(&org.org_state_code)
        .bind(org.created_utc)
        .bind(org.updated_utc)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Mark an organization's email verified.
    pub async fn mark_organization_email_verified(
        &self,
        org_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE organizations SET email_verified = TRUE, updated_utc = NOW() WHERE org_id = $1",
        )
        .bind(org_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Toggle the organization-wide MFA mandate.
    pub async fn set_organization_mfa_required(
        &self,
        org_id: Uuid,
        mfa_required: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE organizations SET mfa_required = $1, updated_utc = NOW() WHERE org_id = $2",
        )
        .bind(mfa_required)
        .bind(org_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ==================== Membership Operations ====================

    /// Resolve a user's active membership in one organization, joined with
    /// organization and role.
    pub async fn find_active_membership_detail(
        &self,
        user_id: Uuid,
        org_id: Uuid,
    ) -> Result<Option<MembershipDetail>, sqlx::Error> {
        let sql = format!(
            "{} WHERE m.user_id = $1 AND m.organization_id = $2 \
             AND m.member_state_code = 'active' AND o.org_state_code = 'active'",
            MEMBERSHIP_DETAIL_SELECT
        );
        sqlx::query_as::<_, MembershipDetail>(&sql)
            .bind(user_id)
            .bind(org_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Resolve all of a user's active memberships.
    pub async fn list_active_membership_details(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<MembershipDetail>, sqlx::Error> {
        let sql = format!(
            "{} WHERE m.user_id = $1 AND m.member_state_code = 'active' \
             AND o.org_state_code = 'active' ORDER BY m.created_utc",
            MEMBERSHIP_DETAIL_SELECT
        );
        sqlx::query_as::<_, MembershipDetail>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
    }

    /// Find a bare active membership row.
    pub async fn find_active_membership(
        &self,
        user_id: Uuid,
        org_id: Uuid,
    ) -> Result<Option<OrgMembership>, sqlx::Error> {
        sqlx::query_as::<_, OrgMembership>(
            r#"
            SELECT * FROM org_memberships
            WHERE user_id = $1 AND organization_id = $2 AND member_state_code = 'active'
            "#,
        )
        .bind(user_id)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Insert a membership inside a transaction.
    pub async fn insert_membership_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        membership: &OrgMembership,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO org_memberships (membership_id, user_id, organization_id, role_id,
                                         member_state_code, joined_utc, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(membership.membership_id)
        .bind(membership.user_id)
        .bind(membership.organization_id)
        .bind(membership.role_id)
        .bind(&membership.member_state_code)
        .bind(membership.joined_utc)
        .bind(membership.created_utc)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Reassign a member's role.
    pub async fn update_membership_role(
        &self,
        membership_id: Uuid,
        role_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE org_memberships SET role_id = $1 WHERE membership_id = $2")
            .bind(role_id)
            .bind(membership_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== Role Operations ====================

    /// Find role by ID.
    pub async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, sqlx::Error> {
        sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE role_id = $1")
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Find a role that is available to an organization: a system/default
    /// role, or a custom role scoped to it.
    pub async fn find_role_for_org(
        &self,
        role_id: Uuid,
        org_id: Uuid,
    ) -> Result<Option<Role>, sqlx::Error> {
        sqlx::query_as::<_, Role>(
            r#"
            SELECT * FROM roles
            WHERE role_id = $1 AND is_active = TRUE
              AND (is_system_role = TRUE OR is_default = TRUE OR organization_id = $2)
            "#,
        )
        .bind(role_id)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Find a system role by slug (e.g. the organization owner role).
    pub async fn find_system_role_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Role>, sqlx::Error> {
        sqlx::query_as::<_, Role>(
            "SELECT * FROM roles WHERE role_slug = $1 AND is_system_role = TRUE",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
    }

    /// All active roles visible to an organization: shared default/system
    /// roles plus its own custom roles.
    pub async fn list_roles_for_org(&self, org_id: Uuid) -> Result<Vec<Role>, sqlx::Error> {
        sqlx::query_as::<_, Role>(
            r#"
            SELECT * FROM roles
            WHERE is_active = TRUE
              AND (organization_id IS NULL AND (is_default = TRUE OR is_system_role = TRUE)
                   OR organization_id = $1)
            ORDER BY created_utc
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Write a custom role's hierarchy level.
    pub async fn update_role_hierarchy_level(
        &self,
        role_id: Uuid,
        level: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE roles SET hierarchy_level = $1 WHERE role_id = $2")
            .bind(level)
            .bind(role_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Whether a role has a permission granted.
    pub async fn role_has_permission(
        &self,
        role_id: Uuid,
        perm_slug: &str,
    ) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT 1::BIGINT FROM role_permissions rp
            JOIN permissions p ON p.permission_id = rp.permission_id
            WHERE rp.role_id = $1 AND p.perm_slug = $2
            "#,
        )
        .bind(role_id)
        .bind(perm_slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    // ==================== Session Operations ====================

    /// Insert a session.
    pub async fn insert_session(&self, session: &Session) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, user_id, organization_id, refresh_token_hash,
                                  expiry_utc, revoked_utc, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(session.session_id)
        .bind(session.user_id)
        .bind(session.organization_id)
        .bind(&session.refresh_token_hash)
        .bind(session.expiry_utc)
        .bind(session.revoked_utc)
        .bind(session.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All non-revoked sessions for a user; callers check expiry.
    pub async fn find_unrevoked_sessions_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Session>, sqlx::Error> {
        sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE user_id = $1 AND revoked_utc IS NULL ORDER BY created_utc DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Revoke one session.
    pub async fn revoke_session(&self, session_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE sessions SET revoked_utc = NOW() WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Revoke every session for a user (e.g. after a password reset).
    pub async fn revoke_all_sessions_for_user(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE sessions SET revoked_utc = NOW() WHERE user_id = $1 AND revoked_utc IS NULL",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ==================== Verification Token Operations ====================

    /// Insert a verification token.
    pub async fn insert_verification_token(
        &self,
        token: &VerificationToken,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO email_verifications (verification_id, user_id, email, token, kind_code,
                                             expiry_utc, verified_utc, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(token.verification_id)
        .bind(token.user_id)
        .bind(&token.email)
        .bind(&token.token)
        .bind(&token.kind_code)
        .bind(token.expiry_utc)
        .bind(token.verified_utc)
        .bind(token.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a verification token inside a transaction.
    pub async fn insert_verification_token_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        token: &VerificationToken,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO email_verifications (verification_id, user_id, email, token, kind_code,
                                             expiry_utc, verified_utc, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(token.verification_id)
        .bind(token.user_id)
        .bind(&token.email)
        .bind(&token.token)
        .bind(&token.kind_code)
        .bind(token.expiry_utc)
        .bind(token.verified_utc)
        .bind(token.created_utc)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Find a verification token by its value.
    pub async fn find_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<VerificationToken>, sqlx::Error> {
        sqlx::query_as::<_, VerificationToken>("SELECT * FROM email_verifications WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
    }

    /// Mark a verification token used.
    pub async fn mark_verification_used(
        &self,
        verification_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE email_verifications SET verified_utc = NOW() WHERE verification_id = $1")
            .bind(verification_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== Audit Operations ====================

    /// Insert an audit log row.
    pub async fn insert_audit_log(&self, entry: &AuditLog) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (audit_id, organization_id, actor_user_id, action,
                                    entity_type, entity_id, before_state, after_state, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.audit_id)
        .bind(entry.organization_id)
        .bind(entry.actor_user_id)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.before_state)
        .bind(&entry.after_state)
        .bind(entry.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
