//! Infrastructure Database Layer
//!
//! PostgreSQL storage for the flight school core, built on SQLx.
//!
//! # Architecture
//!
//! Repositories hold the SQL and work on row types. Adapters implement the
//! domain ports (`BookingPort`, `BillingPort`, `AccessPort`, `AuditLogPort`)
//! on top of them and translate rows to domain models.
//!
//! Booking writes run in SERIALIZABLE transactions and the schema carries
//! exclusion constraints over `tstzrange(start_time, end_time, '[)')` for
//! active bookings, so double-booking an aircraft, a member or an instructor
//! fails even under concurrent requests.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig};
//! use infra_db::adapters::PostgresBookingAdapter;
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/flight_school")).await?;
//! run_migrations(&pool).await?;
//! let bookings = PostgresBookingAdapter::new(pool);
//! ```

pub mod adapters;
pub mod error;
pub mod pool;
pub mod repositories;

pub use adapters::{
    PostgresAccessAdapter, PostgresAuditLogAdapter, PostgresBillingAdapter, PostgresBookingAdapter,
};
pub use error::DatabaseError;
pub use pool::{create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool};
