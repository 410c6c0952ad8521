//! Role hierarchy scenarios exercised through the public API.

use auth_service::models::Role;
use auth_service::services::hierarchy::{authority_level, can_assign, is_assignable};
use auth_service::services::ServiceError;
use chrono::Utc;
use uuid::Uuid;

fn shared_role(slug: &str, is_owner: bool) -> Role {
    Role {
        role_id: Uuid::new_v4(),
        organization_id: None,
        role_slug: slug.to_string(),
        role_name: slug.to_string(),
        is_organization_owner: is_owner,
        is_system_role: true,
        is_default: true,
        hierarchy_level: None,
        is_active: true,
        created_utc: Utc::now(),
    }
}

fn custom_role(org_id: Uuid, slug: &str, level: i32) -> Role {
    Role::new_custom(org_id, slug.to_string(), slug.to_string(), level)
}

#[test]
fn owner_registration_scenario_owner_is_level_1() {
    // User registers an organization and becomes its owner
    let owner = shared_role("organization-owner", true);
    assert_eq!(authority_level(&owner), 1);
}

#[test]
fn equal_level_assignment_is_rejected() {
    // Non-owner R1 (level 3) assigns R2 (level 3) to a user holding R3 (level 4):
    // rejected because the new role is not strictly below the actor
    let org = Uuid::new_v4();
    let r1 = custom_role(org, "team-lead", 3);
    let r2 = custom_role(org, "coordinator", 3);
    let r3 = custom_role(org, "analyst", 4);

    let err = can_assign(&r1, &r3, &r2).unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientAuthority(_)));
}

#[test]
fn admin_manages_custom_roles_below_it() {
    let org = Uuid::new_v4();
    let admin = shared_role("admin", false);
    let lead = custom_role(org, "team-lead", 3);
    let analyst = custom_role(org, "analyst", 4);

    // Demote a lead to analyst: actor 2 < target 3, new 4 > 2, 4 >= 3
    assert!(can_assign(&admin, &lead, &analyst).is_ok());
    // But an admin cannot touch another admin
    assert!(can_assign(&admin, &admin, &analyst).is_err());
}

#[test]
fn owner_bypasses_level_checks_except_ownership() {
    let org = Uuid::new_v4();
    let owner = shared_role("organization-owner", true);
    let admin = shared_role("admin", false);
    let analyst = custom_role(org, "analyst", 4);

    // Promote an analyst straight to admin
    assert!(can_assign(&owner, &analyst, &admin).is_ok());
    // Ownership itself is never assignable
    assert!(can_assign(&owner, &analyst, &owner).is_err());
}

#[test]
fn assignable_listing_matches_assignment_rules() {
    let org = Uuid::new_v4();
    let owner = shared_role("organization-owner", true);
    let admin = shared_role("admin", false);
    let lead = custom_role(org, "team-lead", 3);
    let analyst = custom_role(org, "analyst", 4);

    // A level-3 actor only sees strictly lower roles
    assert!(!is_assignable(&lead, &admin));
    assert!(!is_assignable(&lead, &lead));
    assert!(is_assignable(&lead, &analyst));

    // The owner sees everything but ownership
    assert!(is_assignable(&owner, &admin));
    assert!(is_assignable(&owner, &analyst));
    assert!(!is_assignable(&owner, &owner));
}

#[test]
fn unset_custom_level_defaults_to_floor() {
    let org = Uuid::new_v4();
    let mut role = custom_role(org, "support", 5);
    role.hierarchy_level = None;
    assert_eq!(authority_level(&role), 3);
}
