//! Repository implementations
//!
//! Repositories own the SQL and map rows to plain row structs; adapters
//! turn those rows into domain types. Writes that must be atomic go through
//! the transaction handles returned by `begin`.

pub mod access;
pub mod audit;
pub mod billing;
pub mod booking;

pub use access::MembershipRepository;
pub use audit::AuditRepository;
pub use billing::{BillingRepository, BillingTx};
pub use booking::{BookingRepository, BookingTx};
