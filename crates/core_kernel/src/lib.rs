//! Core Kernel - Foundational types shared by the flight school domains
//!
//! This crate provides the building blocks used across all domain modules:
//! - Strongly-typed identifiers
//! - Money rounding and tax rates on top of rust_decimal
//! - Half-open time ranges for scheduling
//! - Roles, capabilities and the access port
//! - Audit records and the audit log port
//! - The port error type shared by every storage adapter

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod error;
pub mod ports;
pub mod access;
pub mod audit;

pub use money::{
    checked_money, ensure_money_scale, round_money, MoneyError, TaxRate, MAX_AMOUNT,
};
pub use temporal::{TemporalError, TimeRange};
pub use identifiers::{
    OrganizationId, UserId, AircraftId, FlightTypeId, LessonId,
    BookingId, BookingDetailsId, ChargeableId, InvoiceId, InvoiceItemId,
    PaymentId, TransactionId, AccountBalanceId, AuditLogId,
};
pub use error::{CoreError, ErrorKind};
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth,
};
pub use access::{
    AccessError, AccessPort, Actor, Capability, Principal, Role, authorize, resolve_actor,
};
pub use audit::{
    AuditAction, AuditEntry, AuditLogPort, ColumnChange, ColumnChanges, record_change, snapshot_changes,
};
