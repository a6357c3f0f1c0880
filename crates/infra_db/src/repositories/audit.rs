//! Audit log repository
//!
//! Audit rows are written inside the transaction of the change they record
//! and read back per row, newest first.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use core_kernel::ColumnChanges;

use crate::error::DatabaseError;

/// Read access to the audit log
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Entries recorded for one row, newest first
    pub async fn list_for_row(&self, table_name: &str, row_id: Uuid) -> Result<Vec<AuditRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, organization_id, table_name, row_id, action, changed_by, changed_at, column_changes
            FROM audit_logs
            WHERE table_name = $1 AND row_id = $2
            ORDER BY changed_at DESC, id DESC
            "#,
        )
        .bind(table_name)
        .bind(row_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

/// Appends an audit row on the given connection
pub(crate) async fn insert_audit(conn: &mut PgConnection, row: &AuditRow) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, organization_id, table_name, row_id, action, changed_by, changed_at, column_changes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(row.id)
    .bind(row.organization_id)
    .bind(&row.table_name)
    .bind(row.row_id)
    .bind(row.action)
    .bind(row.changed_by)
    .bind(row.changed_at)
    .bind(&row.column_changes)
    .execute(conn)
    .await?;

    Ok(())
}

/// Database row for an audit entry
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub table_name: String,
    pub row_id: Uuid,
    pub action: DbAuditAction,
    pub changed_by: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
    pub column_changes: Json<ColumnChanges>,
}

/// Database enum for audit actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "audit_action", rename_all = "snake_case")]
pub enum DbAuditAction {
    Insert,
    Update,
    Delete,
}
