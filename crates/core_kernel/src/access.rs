//! Roles, capabilities, and organization membership checks
//!
//! A user's role is scoped to an organization. What a role may do is a
//! static table keyed by [`Capability`]; services ask [`authorize`] for an
//! [`Actor`] before touching storage.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::ErrorKind;
use crate::identifiers::{OrganizationId, UserId};
use crate::ports::{DomainPort, PortError};

/// Role of a user within one organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    Instructor,
    Member,
    Student,
}

/// Something a role may be allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Create, update, check out and cancel bookings of any member
    ManageBookings,
    /// Create and edit invoices
    ManageInvoices,
    /// Record payments against invoices
    RecordPayments,
    /// See organization-wide financial figures
    ViewFinancials,
    /// Read the audit history of a row
    ViewAuditLog,
    /// Add or remove staff
    ManageStaff,
    /// Change organization settings
    ModifyOrgSettings,
    /// Manage syllabus and lessons
    ManageTraining,
    /// Manage safety reports
    ManageSafetyReports,
}

impl Role {
    /// Position in the role hierarchy; higher outranks lower
    pub fn rank(&self) -> u8 {
        match self {
            Role::Owner => 4,
            Role::Admin => 3,
            Role::Instructor => 2,
            Role::Member => 1,
            Role::Student => 0,
        }
    }

    /// Owner, admin and instructor are staff
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin | Role::Instructor)
    }

    /// Returns true if this role is at least as privileged as `required`
    pub fn has_privilege(&self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    /// Capability table
    pub fn can(&self, capability: Capability) -> bool {
        use Capability::*;
        match capability {
            ManageBookings
            | ManageInvoices
            | RecordPayments
            | ViewAuditLog
            | ManageTraining
            | ManageSafetyReports => self.is_staff(),
            ViewFinancials | ManageStaff | ModifyOrgSettings => {
                matches!(self, Role::Owner | Role::Admin)
            }
        }
    }

    /// Returns the stable wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Instructor => "instructor",
            Role::Member => "member",
            Role::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            "instructor" => Ok(Role::Instructor),
            "member" => Ok(Role::Member),
            "student" => Ok(Role::Student),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// The caller of an operation, as established by the session layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    /// No authenticated identity
    Anonymous,
    /// An authenticated user
    User(UserId),
}

impl Principal {
    /// Returns the user id if authenticated
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Principal::Anonymous => None,
            Principal::User(id) => Some(*id),
        }
    }
}

/// An authenticated user resolved within one organization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    pub role: Role,
}

impl Actor {
    /// Returns true if the actor may use the capability
    pub fn can(&self, capability: Capability) -> bool {
        self.role.can(capability)
    }
}

/// Errors raised while resolving who may do what
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: not a member of organization {0}")]
    NotMember(OrganizationId),

    #[error("Forbidden: role {role} lacks {capability:?}")]
    InsufficientRole {
        role: Role,
        capability: Capability,
    },

    #[error("Role lookup failed: {0}")]
    Lookup(#[from] PortError),
}

impl AccessError {
    /// Machine-readable kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::Unauthorized => ErrorKind::Unauthorized,
            AccessError::NotMember(_) | AccessError::InsufficientRole { .. } => ErrorKind::Forbidden,
            AccessError::Lookup(_) => ErrorKind::DependencyFailure,
        }
    }
}

/// Port resolving a user's role within an organization
#[async_trait]
pub trait AccessPort: DomainPort {
    /// Returns the user's role in the organization, or None if not a member
    async fn role_in(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Option<Role>, PortError>;
}

/// Resolves the principal into an actor of the organization
///
/// Fails with `Unauthorized` for anonymous callers and `Forbidden` kinds
/// when the user is not a member. No capability is checked.
pub async fn resolve_actor(
    access: &dyn AccessPort,
    principal: &Principal,
    organization_id: OrganizationId,
) -> Result<Actor, AccessError> {
    let user_id = principal.user_id().ok_or(AccessError::Unauthorized)?;
    let role = access
        .role_in(organization_id, user_id)
        .await?
        .ok_or(AccessError::NotMember(organization_id))?;

    Ok(Actor {
        user_id,
        organization_id,
        role,
    })
}

/// Resolves the principal and requires a capability
pub async fn authorize(
    access: &dyn AccessPort,
    principal: &Principal,
    organization_id: OrganizationId,
    capability: Capability,
) -> Result<Actor, AccessError> {
    let actor = resolve_actor(access, principal, organization_id).await?;
    if !actor.can(capability) {
        return Err(AccessError::InsufficientRole {
            role: actor.role,
            capability,
        });
    }
    Ok(actor)
}

/// In-memory implementation of AccessPort for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    /// Membership table held in memory
    #[derive(Debug, Default, Clone)]
    pub struct MockAccessPort {
        memberships: Arc<RwLock<HashMap<(OrganizationId, UserId), Role>>>,
    }

    impl MockAccessPort {
        /// Creates an empty membership table
        pub fn new() -> Self {
            Self::default()
        }

        /// Adds or replaces a membership
        pub async fn grant(&self, organization_id: OrganizationId, user_id: UserId, role: Role) {
            self.memberships
                .write()
                .await
                .insert((organization_id, user_id), role);
        }

        /// Removes a membership
        pub async fn revoke(&self, organization_id: OrganizationId, user_id: UserId) {
            self.memberships
                .write()
                .await
                .remove(&(organization_id, user_id));
        }
    }

    impl DomainPort for MockAccessPort {}

    #[async_trait]
    impl AccessPort for MockAccessPort {
        async fn role_in(
            &self,
            organization_id: OrganizationId,
            user_id: UserId,
        ) -> Result<Option<Role>, PortError> {
            Ok(self
                .memberships
                .read()
                .await
                .get(&(organization_id, user_id))
                .copied())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::mock::MockAccessPort;

    #[test]
    fn test_capability_table() {
        assert!(Role::Instructor.can(Capability::ManageBookings));
        assert!(!Role::Member.can(Capability::ManageBookings));
        assert!(!Role::Student.can(Capability::RecordPayments));
        assert!(Role::Admin.can(Capability::ViewFinancials));
        assert!(!Role::Instructor.can(Capability::ViewFinancials));
    }

    #[test]
    fn test_role_hierarchy() {
        assert!(Role::Owner.has_privilege(Role::Admin));
        assert!(Role::Instructor.has_privilege(Role::Member));
        assert!(!Role::Student.has_privilege(Role::Member));
        assert!(Role::Member.has_privilege(Role::Member));
    }

    #[tokio::test]
    async fn test_authorize_paths() {
        let port = MockAccessPort::new();
        let org = OrganizationId::new();
        let instructor = UserId::new();
        let student = UserId::new();
        port.grant(org, instructor, Role::Instructor).await;
        port.grant(org, student, Role::Student).await;

        let actor = authorize(&port, &Principal::User(instructor), org, Capability::ManageBookings)
            .await
            .unwrap();
        assert_eq!(actor.role, Role::Instructor);

        let err = authorize(&port, &Principal::User(student), org, Capability::ManageBookings)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = authorize(&port, &Principal::Anonymous, org, Capability::ManageBookings)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let err = authorize(&port, &Principal::User(UserId::new()), org, Capability::ManageBookings)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::NotMember(_)));
    }
}
