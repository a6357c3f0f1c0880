//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! flight school workspace.
//!
//! # Modules
//!
//! - `fixtures`: A seeded school and in-memory service wiring
//! - `builders`: Builders for booking, invoice and payment inputs
//! - `database`: PostgreSQL test containers and seeding
//! - `assertions`: Ledger and booking assertion helpers
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
