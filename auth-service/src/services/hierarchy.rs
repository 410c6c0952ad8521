//! Role hierarchy evaluation.
//!
//! Authority is an ordinal: lower number, more privilege. The organization
//! owner is always level 1 and the fixed admin role always level 2;
//! neither can be re-leveled. Custom roles occupy levels >= 3 and default
//! to 3 when unset. Every privilege comparison in the service goes through
//! `authority_level` - there are no role-slug checks elsewhere.

use crate::models::Role;

use super::error::ServiceError;

pub const OWNER_LEVEL: i32 = 1;
pub const ADMIN_LEVEL: i32 = 2;
/// Floor for custom role levels; also the default when unset.
pub const CUSTOM_LEVEL_FLOOR: i32 = 3;

/// Compute the effective authority level of a role.
pub fn authority_level(role: &Role) -> i32 {
    if role.is_organization_owner {
        return OWNER_LEVEL;
    }
    if role.is_fixed_admin() {
        return ADMIN_LEVEL;
    }
    match role.hierarchy_level {
        Some(level) if level >= CUSTOM_LEVEL_FLOOR => level,
        _ => CUSTOM_LEVEL_FLOOR,
    }
}

/// Check whether `actor` may move a member holding `target_current` to
/// `new_role`.
///
/// Owners may assign anything except the owner role itself (and may not
/// strip it from another owner). Non-owners must strictly outrank the
/// target, may only hand out roles strictly below their own authority, and
/// may not promote the target above its current level.
pub fn can_assign(
    actor: &Role,
    target_current: &Role,
    new_role: &Role,
) -> Result<(), ServiceError> {
    if target_current.is_organization_owner {
        return Err(ServiceError::InsufficientAuthority(
            "the organization owner role cannot be reassigned".to_string(),
        ));
    }
    if new_role.is_organization_owner {
        return Err(ServiceError::InsufficientAuthority(
            "the organization owner role cannot be granted".to_string(),
        ));
    }

    if actor.is_organization_owner {
        return Ok(());
    }

    let actor_level = authority_level(actor);
    let target_level = authority_level(target_current);
    let new_level = authority_level(new_role);

    if actor_level >= target_level {
        return Err(ServiceError::InsufficientAuthority(
            "you can only modify members with a lower role than your own".to_string(),
        ));
    }
    if new_level <= actor_level {
        return Err(ServiceError::InsufficientAuthority(
            "you cannot assign a role at or above your own level".to_string(),
        ));
    }
    if new_level < target_level {
        return Err(ServiceError::InsufficientAuthority(
            "you cannot promote a member above their current level".to_string(),
        ));
    }

    Ok(())
}

/// Whether `actor` may offer `candidate` in an assignable-roles listing.
pub fn is_assignable(actor: &Role, candidate: &Role) -> bool {
    if candidate.is_organization_owner {
        return false;
    }
    if actor.is_organization_owner {
        return true;
    }
    authority_level(candidate) > authority_level(actor)
}

/// Gate for writing a custom role's hierarchy level: only the owner or the
/// fixed admin may set it, the value must be >= 3, and the fixed roles
/// themselves are immutable.
pub fn can_set_hierarchy_level(
    actor: &Role,
    target: &Role,
    level: i32,
) -> Result<(), ServiceError> {
    if !actor.is_organization_owner && !actor.is_fixed_admin() {
        return Err(ServiceError::InsufficientAuthority(
            "only organization owners and admins can set role hierarchy levels".to_string(),
        ));
    }
    if target.is_immutable() {
        return Err(ServiceError::Validation(
            "owner and admin role levels are fixed and cannot be changed".to_string(),
        ));
    }
    if level < CUSTOM_LEVEL_FLOOR {
        return Err(ServiceError::Validation(format!(
            "hierarchy level must be {} or higher",
            CUSTOM_LEVEL_FLOOR
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn role(
        slug: &str,
        owner: bool,
        system: bool,
        default: bool,
        level: Option<i32>,
    ) -> Role {
        Role {
            role_id: Uuid::new_v4(),
            organization_id: if system || default {
                None
            } else {
                Some(Uuid::new_v4())
            },
            role_slug: slug.to_string(),
            role_name: slug.to_string(),
            is_organization_owner: owner,
            is_system_role: system,
            is_default: default,
            hierarchy_level: level,
            is_active: true,
            created_utc: Utc::now(),
        }
    }

    fn owner() -> Role {
        role("organization-owner", true, true, true, None)
    }

    fn admin() -> Role {
        role("admin", false, false, true, None)
    }

    fn custom(level: Option<i32>) -> Role {
        role("analyst", false, false, false, level)
    }

    #[test]
    fn owner_is_level_1_and_admin_level_2() {
        assert_eq!(authority_level(&owner()), 1);
        assert_eq!(authority_level(&admin()), 2);
    }

    #[test]
    fn custom_roles_default_to_level_3() {
        assert_eq!(authority_level(&custom(None)), 3);
        assert_eq!(authority_level(&custom(Some(5))), 5);
    }

    #[test]
    fn fixed_levels_survive_hierarchy_level_writes() {
        // Even if a stored row somehow carries a level, owner/admin stay fixed
        let mut o = owner();
        o.hierarchy_level = Some(9);
        assert_eq!(authority_level(&o), 1);

        let mut a = admin();
        a.hierarchy_level = Some(9);
        assert_eq!(authority_level(&a), 2);
    }

    #[test]
    fn org_scoped_admin_slug_does_not_claim_level_2() {
        let impostor = role("admin", false, false, false, None);
        assert_eq!(authority_level(&impostor), 3);
    }

    #[test]
    fn sub_floor_levels_are_clamped_to_3() {
        assert_eq!(authority_level(&custom(Some(1))), 3);
        assert_eq!(authority_level(&custom(Some(2))), 3);
    }

    #[test]
    fn owner_may_assign_anything_but_ownership() {
        assert!(can_assign(&owner(), &custom(Some(4)), &admin()).is_ok());
        assert!(can_assign(&owner(), &admin(), &custom(Some(3))).is_ok());

        assert!(can_assign(&owner(), &custom(Some(3)), &owner()).is_err());
        assert!(can_assign(&owner(), &owner(), &custom(Some(3))).is_err());
    }

    #[test]
    fn non_owner_must_strictly_outrank_target() {
        // admin (2) vs target at 2: equal, rejected
        assert!(can_assign(&admin(), &admin(), &custom(Some(3))).is_err());
        // admin (2) vs target at 3: ok to hand out level >= 3
        assert!(can_assign(&admin(), &custom(Some(3)), &custom(Some(4))).is_ok());
    }

    #[test]
    fn non_owner_cannot_grant_at_or_above_own_level() {
        // spec scenario: actor level 3 assigning a level-3 role must fail
        let actor = custom(Some(3));
        let target = custom(Some(4));
        let new_role = custom(Some(3));
        assert!(matches!(
            can_assign(&actor, &target, &new_role),
            Err(ServiceError::InsufficientAuthority(_))
        ));
    }

    #[test]
    fn non_owner_cannot_promote_past_target_current_level() {
        let actor = admin();
        let target = custom(Some(5));
        assert!(can_assign(&actor, &target, &custom(Some(5))).is_ok());
        assert!(can_assign(&actor, &target, &custom(Some(6))).is_ok());
        assert!(can_assign(&actor, &target, &custom(Some(4))).is_err());
    }

    #[test]
    fn assignable_listing_excludes_owner_and_peers() {
        let actor = custom(Some(3));
        assert!(!is_assignable(&actor, &owner()));
        assert!(!is_assignable(&actor, &admin()));
        assert!(!is_assignable(&actor, &custom(Some(3))));
        assert!(is_assignable(&actor, &custom(Some(4))));

        // owner can offer everything except ownership
        assert!(is_assignable(&owner(), &admin()));
        assert!(!is_assignable(&owner(), &owner()));
    }

    #[test]
    fn hierarchy_level_writes_are_gated() {
        let target = custom(Some(4));

        assert!(can_set_hierarchy_level(&owner(), &target, 3).is_ok());
        assert!(can_set_hierarchy_level(&admin(), &target, 7).is_ok());
        assert!(can_set_hierarchy_level(&custom(Some(3)), &target, 4).is_err());
        assert!(can_set_hierarchy_level(&owner(), &target, 2).is_err());
        assert!(can_set_hierarchy_level(&owner(), &admin(), 5).is_err());
        assert!(can_set_hierarchy_level(&owner(), &owner(), 5).is_err());
    }
}
