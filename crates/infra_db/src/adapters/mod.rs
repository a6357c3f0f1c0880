//! Domain Adapters
//!
//! Implementations of the domain ports on PostgreSQL. Each adapter:
//! - Implements its domain's port trait and `HealthCheckable`
//! - Translates between domain models and database row types
//! - Uses the repository layer for database operations
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresBookingAdapter;
//! use domain_booking::BookingPort;
//!
//! let adapter = PostgresBookingAdapter::new(pool);
//! let booking = adapter.get_booking(booking_id).await?;
//! ```

pub mod access;
pub mod audit;
pub mod billing;
pub mod booking;

pub use access::PostgresAccessAdapter;
pub use audit::PostgresAuditLogAdapter;
pub use billing::PostgresBillingAdapter;
pub use booking::PostgresBookingAdapter;

use chrono::Utc;
use core_kernel::{AdapterHealth, HealthCheckResult};
use sqlx::PgPool;

/// Runs `SELECT 1` against the pool and reports latency
pub(crate) async fn check_pool(pool: &PgPool, adapter_id: &str) -> HealthCheckResult {
    let start = std::time::Instant::now();

    let result = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await;

    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(_) => HealthCheckResult {
            adapter_id: adapter_id.to_string(),
            status: AdapterHealth::Healthy,
            latency_ms,
            message: None,
            checked_at: Utc::now(),
        },
        Err(e) => HealthCheckResult {
            adapter_id: adapter_id.to_string(),
            status: AdapterHealth::Unhealthy,
            latency_ms,
            message: Some(format!("Database error: {}", e)),
            checked_at: Utc::now(),
        },
    }
}
