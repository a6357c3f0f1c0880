//! Column-level audit records
//!
//! Every committed mutation of an audited row produces one [`AuditEntry`]
//! carrying the old and new value of each changed column. Entries are
//! write-only for the domains; the [`AuditLogPort`] reads them back newest
//! first and [`AuditEntry::describe`] renders them for people.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::identifiers::{AuditLogId, OrganizationId, UserId};
use crate::ports::{DomainPort, PortError};

/// Columns that never show up in a rendered description
const IGNORED_FIELDS: &[&str] = &["updated_at", "created_at", "organization_id", "id", "user_id"];

/// Kind of row mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Insert,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Insert => "insert",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
        }
    }
}

/// Old and new value of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnChange {
    pub old: Value,
    pub new: Value,
}

/// Changes keyed by column name
pub type ColumnChanges = BTreeMap<String, ColumnChange>;

/// Records a column change if the value actually differs
pub fn record_change<T: Serialize + PartialEq>(
    changes: &mut ColumnChanges,
    field: &str,
    old: &T,
    new: &T,
) {
    if old == new {
        return;
    }
    let old = serde_json::to_value(old).unwrap_or(Value::Null);
    let new = serde_json::to_value(new).unwrap_or(Value::Null);
    changes.insert(field.to_string(), ColumnChange { old, new });
}

/// Records every column of a freshly inserted row as changed from null
pub fn snapshot_changes<T: Serialize>(row: &T) -> ColumnChanges {
    match serde_json::to_value(row) {
        Ok(Value::Object(columns)) => columns
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(field, new)| (field, ColumnChange { old: Value::Null, new }))
            .collect(),
        _ => ColumnChanges::new(),
    }
}

/// One audit log row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditLogId,
    pub organization_id: OrganizationId,
    pub table_name: String,
    pub row_id: Uuid,
    pub action: AuditAction,
    pub changed_by: Option<UserId>,
    pub changed_at: DateTime<Utc>,
    pub column_changes: ColumnChanges,
}

impl AuditEntry {
    /// Creates an entry stamped now
    pub fn new(
        organization_id: OrganizationId,
        table_name: impl Into<String>,
        row_id: Uuid,
        action: AuditAction,
        changed_by: UserId,
        column_changes: ColumnChanges,
    ) -> Self {
        Self {
            id: AuditLogId::new_v7(),
            organization_id,
            table_name: table_name.into(),
            row_id,
            action,
            changed_by: Some(changed_by),
            changed_at: Utc::now(),
            column_changes,
        }
    }

    /// Renders the entry as one human-readable sentence list
    ///
    /// Ignored bookkeeping columns are skipped. When nothing displayable
    /// changed the action itself is described.
    pub fn describe(&self) -> String {
        let mut descriptions: Vec<String> = self
            .column_changes
            .iter()
            .filter(|(field, _)| !IGNORED_FIELDS.contains(&field.as_str()))
            .map(|(field, change)| {
                format!(
                    "{} changed from \"{}\" to \"{}\"",
                    capitalize(&field_label(field)),
                    format_value(&change.old),
                    format_value(&change.new),
                )
            })
            .collect();

        if descriptions.is_empty() {
            let noun = entity_label(&self.table_name);
            descriptions.push(match self.action {
                AuditAction::Insert => format!("{} Created", noun),
                AuditAction::Update => format!("{} Updated", noun),
                AuditAction::Delete => format!("{} Deleted", noun),
            });
        }

        descriptions.join("; ")
    }
}

/// Port for reading audit history
#[async_trait]
pub trait AuditLogPort: DomainPort {
    /// Returns the entries of one row, newest first
    async fn list_for_row(
        &self,
        table_name: &str,
        row_id: Uuid,
    ) -> Result<Vec<AuditEntry>, PortError>;
}

fn field_label(field: &str) -> String {
    match field {
        "aircraft_id" => "aircraft".to_string(),
        "instructor_id" => "instructor".to_string(),
        "start_time" => "start time".to_string(),
        "end_time" => "end time".to_string(),
        "purpose" => "description".to_string(),
        other => other.replace('_', " "),
    }
}

fn entity_label(table_name: &str) -> String {
    match table_name {
        "bookings" => "Booking".to_string(),
        "booking_details" => "Booking details".to_string(),
        other => capitalize(&other.trim_end_matches('s').replace('_', " ")),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "—".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
