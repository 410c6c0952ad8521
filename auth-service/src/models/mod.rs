pub mod audit_log;
pub mod membership;
pub mod organization;
pub mod role;
pub mod session;
pub mod user;
pub mod verification_token;

pub use audit_log::AuditLog;
pub use membership::{MembershipDetail, MembershipState, OrgMembership, OrganizationCandidate};
pub use organization::{generate_slug, Organization, OrganizationResponse, OrganizationState};
pub use role::{Permission, Role, RolePermission, ADMIN_ROLE_SLUG, OWNER_ROLE_SLUG};
pub use session::{Session, SessionInfo};
pub use user::{User, UserResponse, UserState};
pub use verification_token::{VerificationKind, VerificationToken};
