//! PostgreSQL membership adapter

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use core_kernel::{
    AccessPort, DomainPort, HealthCheckResult, HealthCheckable, OrganizationId, PortError, Role,
    UserId,
};

use crate::adapters::check_pool;
use crate::repositories::access::{DbUserRole, MembershipRepository};

/// Resolves roles from `user_organizations`
#[derive(Debug, Clone)]
pub struct PostgresAccessAdapter {
    repository: MembershipRepository,
}

impl PostgresAccessAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: MembershipRepository::new(pool),
        }
    }

    /// Grants a role, replacing any previous one
    pub async fn grant(&self, organization_id: OrganizationId, user_id: UserId, role: Role) -> Result<(), PortError> {
        Ok(self
            .repository
            .upsert(*organization_id.as_uuid(), *user_id.as_uuid(), domain_to_db_role(role))
            .await?)
    }
}

impl DomainPort for PostgresAccessAdapter {}

#[async_trait]
impl HealthCheckable for PostgresAccessAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        check_pool(self.repository.pool(), "postgres-access-adapter").await
    }
}

#[async_trait]
impl AccessPort for PostgresAccessAdapter {
    #[instrument(skip(self), fields(organization_id = %organization_id, user_id = %user_id))]
    async fn role_in(&self, organization_id: OrganizationId, user_id: UserId) -> Result<Option<Role>, PortError> {
        let role = self
            .repository
            .role_of(*organization_id.as_uuid(), *user_id.as_uuid())
            .await?;
        Ok(role.map(db_to_domain_role))
    }
}

fn db_to_domain_role(role: DbUserRole) -> Role {
    match role {
        DbUserRole::Owner => Role::Owner,
        DbUserRole::Admin => Role::Admin,
        DbUserRole::Instructor => Role::Instructor,
        DbUserRole::Member => Role::Member,
        DbUserRole::Student => Role::Student,
    }
}

fn domain_to_db_role(role: Role) -> DbUserRole {
    match role {
        Role::Owner => DbUserRole::Owner,
        Role::Admin => DbUserRole::Admin,
        Role::Instructor => DbUserRole::Instructor,
        Role::Member => DbUserRole::Member,
        Role::Student => DbUserRole::Student,
    }
}
