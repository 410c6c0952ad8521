//! Schema bootstrap.
//!
//! Applies the tables, indexes and seed rows the service needs. Every
//! statement is idempotent, so running this at each startup is safe.

use service_core::error::AppError;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::models::{ADMIN_ROLE_SLUG, OWNER_ROLE_SLUG};

const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        user_id UUID PRIMARY KEY,
        email TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        display_name TEXT,
        email_verified BOOLEAN NOT NULL DEFAULT FALSE,
        email_verified_utc TIMESTAMPTZ,
        mfa_enabled BOOLEAN NOT NULL DEFAULT FALSE,
        mfa_secret TEXT,
        mfa_backup_codes TEXT[] NOT NULL DEFAULT '{}',
        mfa_setup_completed_utc TIMESTAMPTZ,
        is_system_admin BOOLEAN NOT NULL DEFAULT FALSE,
        system_admin_role TEXT,
        last_login_utc TIMESTAMPTZ,
        user_state_code TEXT NOT NULL DEFAULT 'active',
        created_utc TIMESTAMPTZ NOT NULL,
        updated_utc TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS users_email_lower_idx ON users (LOWER(email))",
    r#"
    CREATE TABLE IF NOT EXISTS organizations (
        org_id UUID PRIMARY KEY,
        org_name TEXT NOT NULL,
        org_slug TEXT NOT NULL,
        email TEXT NOT NULL,
        email_verified BOOLEAN NOT NULL DEFAULT FALSE,
        mfa_required BOOLEAN NOT NULL DEFAULT FALSE,
        org_state_code TEXT NOT NULL DEFAULT 'active',
        created_utc TIMESTAMPTZ NOT NULL,
        updated_utc TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS organizations_name_idx ON organizations (org_name)",
    "CREATE UNIQUE INDEX IF NOT EXISTS organizations_slug_idx ON organizations (org_slug)",
    "CREATE UNIQUE INDEX IF NOT EXISTS organizations_email_lower_idx ON organizations (LOWER(email))",
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        role_id UUID PRIMARY KEY,
        organization_id UUID REFERENCES organizations (org_id),
        role_slug TEXT NOT NULL,
        role_name TEXT NOT NULL,
        is_organization_owner BOOLEAN NOT NULL DEFAULT FALSE,
        is_system_role BOOLEAN NOT NULL DEFAULT FALSE,
        is_default BOOLEAN NOT NULL DEFAULT FALSE,
        hierarchy_level INTEGER,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_utc TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS roles_org_slug_idx
        ON roles (organization_id, role_slug) WHERE organization_id IS NOT NULL
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS roles_shared_slug_idx
        ON roles (role_slug) WHERE organization_id IS NULL
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS permissions (
        permission_id UUID PRIMARY KEY,
        perm_slug TEXT NOT NULL UNIQUE,
        perm_name TEXT NOT NULL,
        category TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS role_permissions (
        role_id UUID NOT NULL REFERENCES roles (role_id),
        permission_id UUID NOT NULL REFERENCES permissions (permission_id),
        PRIMARY KEY (role_id, permission_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS org_memberships (
        membership_id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users (user_id),
        organization_id UUID NOT NULL REFERENCES organizations (org_id),
        role_id UUID NOT NULL REFERENCES roles (role_id),
        member_state_code TEXT NOT NULL DEFAULT 'active',
        joined_utc TIMESTAMPTZ,
        created_utc TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS org_memberships_active_idx
        ON org_memberships (user_id, organization_id) WHERE member_state_code = 'active'
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        session_id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users (user_id),
        organization_id UUID REFERENCES organizations (org_id),
        refresh_token_hash TEXT NOT NULL,
        expiry_utc TIMESTAMPTZ NOT NULL,
        revoked_utc TIMESTAMPTZ,
        created_utc TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS sessions_user_idx ON sessions (user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS email_verifications (
        verification_id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users (user_id),
        email TEXT NOT NULL,
        token TEXT NOT NULL UNIQUE,
        kind_code TEXT NOT NULL,
        expiry_utc TIMESTAMPTZ NOT NULL,
        verified_utc TIMESTAMPTZ,
        created_utc TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audit_logs (
        audit_id UUID PRIMARY KEY,
        organization_id UUID,
        actor_user_id UUID,
        action TEXT NOT NULL,
        entity_type TEXT NOT NULL,
        entity_id TEXT NOT NULL,
        before_state JSONB,
        after_state JSONB,
        created_utc TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS audit_logs_org_idx ON audit_logs (organization_id, created_utc)",
];

/// Seed permissions: slug, name, category.
const PERMISSIONS: &[(&str, &str, &str)] = &[
    ("roles.view", "View roles", "roles"),
    ("roles.edit", "Edit roles", "roles"),
    ("roles.assign", "Assign roles", "roles"),
    ("roles.delete", "Delete roles", "roles"),
];

/// Apply schema and seed the fixed roles and permission catalog.
pub async fn bootstrap_schema(pool: &PgPool) -> Result<(), AppError> {
    for statement in SCHEMA_STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
    }

    seed_shared_role(pool, OWNER_ROLE_SLUG, "Organization Owner", true, true, true, None).await?;
    seed_shared_role(pool, ADMIN_ROLE_SLUG, "Administrator", false, true, true, None).await?;
    seed_shared_role(pool, "member", "Member", false, false, true, Some(3)).await?;

    for (slug, name, category) in PERMISSIONS {
        sqlx::query(
            r#"
            INSERT INTO permissions (permission_id, perm_slug, perm_name, category)
            SELECT $1, $2, $3, $4
            WHERE NOT EXISTS (SELECT 1 FROM permissions WHERE perm_slug = $2)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(slug)
        .bind(name)
        .bind(category)
        .execute(pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
    }

    // Admin gets the full roles catalog; member may view
    grant_permissions(pool, ADMIN_ROLE_SLUG, &["roles.view", "roles.edit", "roles.assign", "roles.delete"]).await?;
    grant_permissions(pool, "member", &["roles.view"]).await?;

    tracing::info!("Database schema bootstrapped");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn seed_shared_role(
    pool: &PgPool,
    slug: &str,
    name: &str,
    is_owner: bool,
    is_system: bool,
    is_default: bool,
    hierarchy_level: Option<i32>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO roles (role_id, organization_id, role_slug, role_name, is_organization_owner,
                           is_system_role, is_default, hierarchy_level, is_active, created_utc)
        SELECT $1, NULL, $2, $3, $4, $5, $6, $7, TRUE, NOW()
        WHERE NOT EXISTS (SELECT 1 FROM roles WHERE role_slug = $2 AND organization_id IS NULL)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(slug)
    .bind(name)
    .bind(is_owner)
    .bind(is_system)
    .bind(is_default)
    .bind(hierarchy_level)
    .execute(pool)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
    Ok(())
}

async fn grant_permissions(
    pool: &PgPool,
    role_slug: &str,
    perm_slugs: &[&str],
) -> Result<(), AppError> {
    for perm_slug in perm_slugs {
        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id)
            SELECT r.role_id, p.permission_id
            FROM roles r, permissions p
            WHERE r.role_slug = $1 AND r.organization_id IS NULL AND p.perm_slug = $2
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(role_slug)
        .bind(perm_slug)
        .execute(pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
    }
    Ok(())
}
