//! PostgreSQL audit log reader

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use core_kernel::{
    AuditAction, AuditEntry, AuditLogId, AuditLogPort, DomainPort, HealthCheckResult,
    HealthCheckable, OrganizationId, PortError, UserId,
};

use crate::adapters::check_pool;
use crate::repositories::audit::{AuditRepository, AuditRow, DbAuditAction};

/// Serves audit history from the `audit_logs` table
#[derive(Debug, Clone)]
pub struct PostgresAuditLogAdapter {
    repository: AuditRepository,
}

impl PostgresAuditLogAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: AuditRepository::new(pool),
        }
    }
}

impl DomainPort for PostgresAuditLogAdapter {}

#[async_trait]
impl HealthCheckable for PostgresAuditLogAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        check_pool(self.repository.pool(), "postgres-audit-adapter").await
    }
}

#[async_trait]
impl AuditLogPort for PostgresAuditLogAdapter {
    #[instrument(skip(self), fields(row_id = %row_id))]
    async fn list_for_row(&self, table_name: &str, row_id: Uuid) -> Result<Vec<AuditEntry>, PortError> {
        let rows = self.repository.list_for_row(table_name, row_id).await?;
        Ok(rows.into_iter().map(row_to_entry).collect())
    }
}

fn row_to_entry(row: AuditRow) -> AuditEntry {
    AuditEntry {
        id: AuditLogId::from_uuid(row.id),
        organization_id: OrganizationId::from_uuid(row.organization_id),
        table_name: row.table_name,
        row_id: row.row_id,
        action: match row.action {
            DbAuditAction::Insert => AuditAction::Insert,
            DbAuditAction::Update => AuditAction::Update,
            DbAuditAction::Delete => AuditAction::Delete,
        },
        changed_by: row.changed_by.map(UserId::from_uuid),
        changed_at: row.changed_at,
        column_changes: row.column_changes.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::booking::audit_to_row;
    use core_kernel::{record_change, ColumnChanges};

    #[test]
    fn test_audit_row_round_trips_column_changes() {
        let mut changes = ColumnChanges::new();
        record_change(&mut changes, "status", &"unconfirmed", &"confirmed");
        let entry = AuditEntry::new(
            OrganizationId::new(),
            "bookings",
            Uuid::new_v4(),
            AuditAction::Update,
            UserId::new(),
            changes,
        );

        let back = row_to_entry(audit_to_row(&entry));
        assert_eq!(back, entry);
        assert_eq!(back.describe(), entry.describe());
    }
}
