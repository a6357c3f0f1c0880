//! HTTP API Layer
//!
//! This crate exposes the flight school services over REST using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers for bookings, invoices and audit history
//! - **Middleware**: Bearer token authentication and request logging
//! - **DTOs**: Request bodies with `validator` rules
//! - **Error Handling**: Every failure becomes `{"error": kind, "message": text}`
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppServices};
//!
//! let app = create_router(AppServices::postgres(pool), config);
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;

use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower::layer::util::{Identity, Stack};
use tower::util::MapResponseLayer;
use tower::ServiceBuilder;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use core_kernel::HealthCheckable;
use domain_billing::{InvoiceService, PaymentService};
use domain_booking::{AuditTrailService, BookingService};
use infra_db::{
    PostgresAccessAdapter, PostgresAuditLogAdapter, PostgresBillingAdapter, PostgresBookingAdapter,
};

use crate::config::ApiConfig;
use crate::handlers::{audit, bookings, health, invoices};
use crate::middleware::{audit_middleware, auth_middleware};

/// Domain services behind the routes
pub struct AppServices {
    pub bookings: BookingService,
    pub audit_trail: AuditTrailService,
    pub invoices: InvoiceService,
    pub payments: PaymentService,
    /// Adapters probed by `/health/ready`
    pub health: Vec<Arc<dyn HealthCheckable>>,
}

impl AppServices {
    /// Wires every service to PostgreSQL adapters sharing one pool
    pub fn postgres(pool: PgPool) -> Self {
        let access = Arc::new(PostgresAccessAdapter::new(pool.clone()));
        let booking_store = Arc::new(PostgresBookingAdapter::new(pool.clone()));
        let audit_log = Arc::new(PostgresAuditLogAdapter::new(pool.clone()));
        let billing_store = Arc::new(PostgresBillingAdapter::new(pool));

        Self {
            bookings: BookingService::new(booking_store.clone(), access.clone()),
            audit_trail: AuditTrailService::new(audit_log.clone(), access.clone()),
            invoices: InvoiceService::new(billing_store.clone(), access.clone()),
            payments: PaymentService::new(billing_store.clone(), access.clone()),
            health: vec![
                access as Arc<dyn HealthCheckable>,
                booking_store as Arc<dyn HealthCheckable>,
                audit_log as Arc<dyn HealthCheckable>,
                billing_store as Arc<dyn HealthCheckable>,
            ],
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<AppServices>,
    pub config: ApiConfig,
}

/// Creates the main API router
///
/// # Arguments
///
/// * `services` - Domain services the handlers call
/// * `config` - API configuration
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router(services: AppServices, config: ApiConfig) -> Router {
    let timeout = config.request_timeout();
    let state = AppState {
        services: Arc::new(services),
        config,
    };

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let booking_routes = Router::new()
        .route("/", post(bookings::create_booking))
        .route(
            "/:id",
            get(bookings::get_booking).patch(bookings::update_booking),
        )
        .route(
            "/:id/check-out",
            post(bookings::check_out).put(bookings::save_check_out),
        )
        .route("/:id/cancel", post(bookings::cancel_booking));

    let invoice_routes = Router::new()
        .route("/", post(invoices::create_invoice))
        .route(
            "/:id",
            get(invoices::get_invoice).patch(invoices::edit_invoice),
        )
        .route("/:id/payments", post(invoices::record_payment));

    // API routes; the principal is resolved per request
    let api_routes = Router::new()
        .nest("/bookings", booking_routes)
        .nest("/invoices", invoice_routes)
        .route("/audit-logs", get(audit::list_audit_logs))
        .layer(axum_middleware::from_fn_with_state(state.clone(), audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(http_layers(timeout))
        .with_state(state)
}

type HttpLayers = ServiceBuilder<
    Stack<
        TimeoutLayer,
        Stack<
            TraceLayer<SharedClassifier<ServerErrorsAsFailures>>,
            Stack<MapResponseLayer<fn(TracedResponse) -> axum::response::Response>, Stack<CorsLayer, Identity>>,
        >,
    >,
>;

type TracedResponse = axum::http::Response<
    tower_http::trace::ResponseBody<
        axum::body::Body,
        tower_http::classify::NeverClassifyEos<tower_http::classify::ServerErrorsFailureClass>,
    >,
>;

/// Re-boxes the traced body so `Cors` (which needs a `Default` body) can wrap it
fn box_traced_body(res: TracedResponse) -> axum::response::Response {
    res.map(axum::body::Body::new)
}

/// Layers wrapping every route, outermost first: CORS, tracing, time limit
fn http_layers(timeout: Duration) -> HttpLayers {
    ServiceBuilder::new()
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(MapResponseLayer::new(
            box_traced_body as fn(TracedResponse) -> axum::response::Response,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
}
