//! Audit log DTOs

use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Query string of `GET /audit-logs`
#[derive(Debug, Deserialize, Validate)]
pub struct AuditLogQuery {
    pub row_id: Uuid,
    #[validate(length(min = 1, max = 63))]
    pub table_name: String,
}
