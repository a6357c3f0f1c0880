//! Database Test Utilities
//!
//! Provides helpers for database testing including testcontainer management,
//! schema setup through the workspace migrations, and seeding a flight school.

use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;
use once_cell::sync::Lazy;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};
use uuid::Uuid;

use infra_db::{run_migrations, PostgresAccessAdapter};

use crate::fixtures::SchoolFixture;

type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Default PostgreSQL image for testing
const POSTGRES_IMAGE: &str = "postgres";
const POSTGRES_USER: &str = "test_user";
const POSTGRES_PASSWORD: &str = "test_password";
const POSTGRES_DB: &str = "flight_school_test";

/// Image tag, overridable with `TEST_POSTGRES_TAG`
static POSTGRES_TAG: Lazy<String> =
    Lazy::new(|| std::env::var("TEST_POSTGRES_TAG").unwrap_or_else(|_| "16-alpine".to_string()));

/// Configuration for test database
#[derive(Debug, Clone)]
pub struct TestDatabaseConfig {
    pub user: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: u16,
}

impl Default for TestDatabaseConfig {
    fn default() -> Self {
        Self {
            user: POSTGRES_USER.to_string(),
            password: POSTGRES_PASSWORD.to_string(),
            database: POSTGRES_DB.to_string(),
            host: "localhost".to_string(),
            port: 5432,
        }
    }
}

impl TestDatabaseConfig {
    /// Creates the database connection URL
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

/// A wrapper around a PostgreSQL test container
pub struct TestDatabase {
    _container: ContainerAsync<GenericImage>,
    pub config: TestDatabaseConfig,
    pub pool: PgPool,
}

impl TestDatabase {
    /// Starts a PostgreSQL container and applies the migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the container fails to start or a migration fails
    pub async fn new() -> TestResult<Self> {
        let container = GenericImage::new(POSTGRES_IMAGE, POSTGRES_TAG.as_str())
            .with_exposed_port(5432.tcp())
            .with_wait_for(WaitFor::message_on_stderr("database system is ready to accept connections"))
            .with_env_var("POSTGRES_USER", POSTGRES_USER)
            .with_env_var("POSTGRES_PASSWORD", POSTGRES_PASSWORD)
            .with_env_var("POSTGRES_DB", POSTGRES_DB)
            .start()
            .await?;

        let port = container.get_host_port_ipv4(5432).await?;
        let host = container.get_host().await?.to_string();

        let config = TestDatabaseConfig {
            host,
            port,
            ..TestDatabaseConfig::default()
        };

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.connection_url())
            .await?;

        run_migrations(&pool).await?;

        Ok(Self {
            _container: container,
            config,
            pool,
        })
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Clears all data from the database while preserving the schema
    pub async fn clear_data(&self) -> TestResult<()> {
        let tables = [
            "payments",
            "account_balances",
            "transactions",
            "invoice_items",
            "invoices",
            "invoice_sequences",
            "chargeables",
            "audit_logs",
            "booking_details",
            "bookings",
            "lessons",
            "flight_types",
            "aircraft",
            "user_organizations",
            "users",
            "organizations",
        ];

        for table in tables {
            sqlx::query(&format!("TRUNCATE TABLE {} CASCADE", table))
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    /// Inserts a fresh school with its people, aircraft and chargeable
    pub async fn seed_school(&self) -> TestResult<SchoolFixture> {
        let school = SchoolFixture::new();
        let org = *school.organization_id.as_uuid();

        sqlx::query("INSERT INTO organizations (id, name) VALUES ($1, $2)")
            .bind(org)
            .bind(format!("{} Aero Club", LastName().fake::<String>()))
            .execute(&self.pool)
            .await?;

        let access = PostgresAccessAdapter::new(self.pool.clone());
        for (user, role) in school.memberships() {
            let email: String = SafeEmail().fake();
            sqlx::query("INSERT INTO users (id, email, first_name, last_name) VALUES ($1, $2, $3, $4)")
                .bind(*user.as_uuid())
                .bind(format!("{}.{}", Uuid::new_v4().simple(), email))
                .bind(FirstName().fake::<String>())
                .bind(LastName().fake::<String>())
                .execute(&self.pool)
                .await?;
            access.grant(school.organization_id, user, role).await?;
        }

        for (aircraft, registration) in [
            (school.aircraft_id, "ZK-FSA"),
            (school.second_aircraft_id, "ZK-FSB"),
        ] {
            sqlx::query("INSERT INTO aircraft (id, organization_id, registration, aircraft_type) VALUES ($1, $2, $3, $4)")
                .bind(*aircraft.as_uuid())
                .bind(org)
                .bind(registration)
                .bind("C172")
                .execute(&self.pool)
                .await?;
        }

        sqlx::query("INSERT INTO flight_types (id, organization_id, name) VALUES ($1, $2, $3)")
            .bind(*school.flight_type_id.as_uuid())
            .bind(org)
            .bind("Dual")
            .execute(&self.pool)
            .await?;

        sqlx::query("INSERT INTO lessons (id, organization_id, name) VALUES ($1, $2, $3)")
            .bind(*school.lesson_id.as_uuid())
            .bind(org)
            .bind("Effects of controls")
            .execute(&self.pool)
            .await?;

        sqlx::query("INSERT INTO chargeables (id, organization_id, name, rate) VALUES ($1, $2, $3, $4)")
            .bind(*school.chargeable.id.as_uuid())
            .bind(org)
            .bind(&school.chargeable.name)
            .bind(school.chargeable.rate)
            .execute(&self.pool)
            .await?;

        Ok(school)
    }
}

/// Creates an isolated test database for a single test
///
/// Use this when tests need to modify data and isolation is required
pub async fn create_isolated_test_database() -> TestResult<TestDatabase> {
    TestDatabase::new().await
}

/// Declares a test that runs against its own PostgreSQL container
///
/// The tests need a Docker daemon and are ignored by default; run them with
/// `cargo test -- --ignored`.
#[macro_export]
macro_rules! db_test {
    ($name:ident, |$db:ident| $body:block) => {
        #[tokio::test]
        #[ignore = "requires Docker"]
        async fn $name() {
            let $db = $crate::database::create_isolated_test_database()
                .await
                .expect("Failed to create test database");
            $body
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_connection_url() {
        let config = TestDatabaseConfig::default();
        let url = config.connection_url();

        assert!(url.starts_with("postgres://"));
        assert!(url.contains(POSTGRES_USER));
        assert!(url.contains(POSTGRES_DB));
        assert!(url.ends_with(":5432/flight_school_test"));
    }
}
