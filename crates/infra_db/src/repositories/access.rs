//! Organization membership lookups

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseError;

/// Reads the `user_organizations` table
#[derive(Debug, Clone)]
pub struct MembershipRepository {
    pool: PgPool,
}

impl MembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Role of a user in an organization, if they belong to it
    pub async fn role_of(&self, organization_id: Uuid, user_id: Uuid) -> Result<Option<DbUserRole>, DatabaseError> {
        let role = sqlx::query_scalar::<_, DbUserRole>(
            "SELECT role FROM user_organizations WHERE organization_id = $1 AND user_id = $2",
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role)
    }

    /// Adds a user to an organization or changes their role
    pub async fn upsert(&self, organization_id: Uuid, user_id: Uuid, role: DbUserRole) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO user_organizations (organization_id, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (organization_id, user_id) DO UPDATE SET role = EXCLUDED.role
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .bind(role)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Database enum for membership roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
pub enum DbUserRole {
    Owner,
    Admin,
    Instructor,
    Member,
    Student,
}
