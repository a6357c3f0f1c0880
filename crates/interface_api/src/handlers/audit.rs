//! Audit log handlers

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use validator::Validate;

use domain_booking::AuditLine;

use crate::auth::CurrentUser;
use crate::dto::audit::AuditLogQuery;
use crate::{error::ApiError, AppState};

/// Change history of one row, newest first
pub async fn list_audit_logs(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    query: Result<Query<AuditLogQuery>, QueryRejection>,
) -> Result<Json<Vec<AuditLine>>, ApiError> {
    let Query(query) = query?;
    query.validate()?;

    let lines = state
        .services
        .audit_trail
        .history(&query.table_name, query.row_id, &principal)
        .await?;
    Ok(Json(lines))
}
