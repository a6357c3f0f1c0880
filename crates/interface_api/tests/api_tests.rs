//! HTTP tests against the in-memory stores

use async_trait::async_trait;
use axum::http::{header, HeaderValue, StatusCode};
use axum_test::{TestRequest, TestServer};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;

use core_kernel::{AdapterHealth, HealthCheckResult, HealthCheckable, UserId};
use interface_api::{auth::create_token, config::ApiConfig, create_router, AppServices};
use test_utils::{InMemorySchool, SchoolFixture, TemporalFixtures};

const SECRET: &str = "api-test-secret";

struct StubHealth(AdapterHealth);

#[async_trait]
impl HealthCheckable for StubHealth {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult {
            status: self.0,
            ..HealthCheckResult::healthy("stub-adapter")
        }
    }
}

struct TestApi {
    server: TestServer,
    school: SchoolFixture,
}

impl TestApi {
    async fn new() -> Self {
        Self::with_health(AdapterHealth::Healthy).await
    }

    async fn with_health(health: AdapterHealth) -> Self {
        let InMemorySchool {
            fixture,
            bookings,
            audit_trail,
            invoices,
            payments,
            ..
        } = InMemorySchool::seed().await;

        let services = AppServices {
            bookings,
            audit_trail,
            invoices,
            payments,
            health: vec![Arc::new(StubHealth(health)) as Arc<dyn HealthCheckable>],
        };
        let config = ApiConfig {
            jwt_secret: SECRET.to_string(),
            ..ApiConfig::default()
        };

        Self {
            server: TestServer::new(create_router(services, config)).unwrap(),
            school: fixture,
        }
    }

    fn as_user(request: TestRequest, user: UserId) -> TestRequest {
        let token = create_token(user, SECRET, 300).unwrap();
        request.add_header(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        )
    }

    fn booking_body(&self) -> Value {
        json!({
            "organization_id": self.school.organization_id,
            "aircraft_id": self.school.aircraft_id,
            "user_id": self.school.member,
            "instructor_id": self.school.instructor,
            "start_time": TemporalFixtures::morning_start(),
            "end_time": TemporalFixtures::morning_end(),
            "status": "confirmed",
            "purpose": "Circuit training",
            "booking_type": "flight"
        })
    }

    fn invoice_body(&self) -> Value {
        json!({
            "organization_id": self.school.organization_id,
            "user_id": self.school.member,
            "due_date": TemporalFixtures::due_date(),
            "reference": "Lesson 1",
            "items": [{
                "chargeable_id": self.school.chargeable.id,
                "description": "Dual flight",
                "quantity": "1",
                "rate": "250.00"
            }]
        })
    }

    async fn create_booking(&self) -> Value {
        let response = Self::as_user(self.server.post("/api/v1/bookings"), self.school.admin)
            .json(&self.booking_body())
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        response.json::<Value>()
    }

    async fn create_invoice(&self) -> Value {
        let response = Self::as_user(self.server.post("/api/v1/invoices"), self.school.admin)
            .json(&self.invoice_body())
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        response.json::<Value>()
    }
}

fn money(value: &Value) -> Decimal {
    match value {
        Value::String(text) => Decimal::from_str(text).unwrap(),
        other => Decimal::from_str(&other.to_string()).unwrap(),
    }
}

mod health {
    use super::*;

    #[tokio::test]
    async fn test_liveness_is_public() {
        let api = TestApi::new().await;
        let response = api.server.get("/health").await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.json::<Value>()["status"], "healthy");
    }

    #[tokio::test]
    async fn test_readiness_reports_adapters() {
        let api = TestApi::with_health(AdapterHealth::Degraded).await;
        let response = api.server.get("/health/ready").await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let body = response.json::<Value>();
        assert_eq!(body["adapters"][0]["adapter_id"], "stub-adapter");
        assert_eq!(body["adapters"][0]["status"], "degraded");
    }

    #[tokio::test]
    async fn test_unhealthy_adapter_is_unavailable() {
        let api = TestApi::with_health(AdapterHealth::Unhealthy).await;
        let response = api.server.get("/health/ready").await;

        assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}

mod authentication {
    use super::*;

    #[tokio::test]
    async fn test_anonymous_caller_is_unauthorized() {
        let api = TestApi::new().await;
        let response = api.server.post("/api/v1/bookings").json(&api.booking_body()).await;

        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["error"], "unauthorized");
    }

    #[tokio::test]
    async fn test_bad_token_is_rejected_before_the_handler() {
        let api = TestApi::new().await;
        let response = api
            .server
            .get("/api/v1/audit-logs")
            .add_query_param("row_id", uuid::Uuid::new_v4())
            .add_query_param("table_name", "bookings")
            .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer not-a-jwt"))
            .await;

        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_is_rejected() {
        let api = TestApi::new().await;
        let token = create_token(api.school.admin, "someone-else", 300).unwrap();
        let response = api
            .server
            .post("/api/v1/bookings")
            .add_header(
                header::AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
            )
            .json(&api.booking_body())
            .await;

        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }
}

mod bookings {
    use super::*;

    #[tokio::test]
    async fn test_create_then_read_booking() {
        let api = TestApi::new().await;
        let created = api.create_booking().await;
        assert_eq!(created["status"], "confirmed");

        let id = created["id"].as_str().unwrap();
        let response = TestApi::as_user(
            api.server.get(&format!("/api/v1/bookings/{}", id)),
            api.school.member,
        )
        .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let body = response.json::<Value>();
        assert_eq!(body["booking"]["id"], created["id"]);
        assert_eq!(body["bookingDetails"], Value::Null);
    }

    #[tokio::test]
    async fn test_member_cannot_create_booking() {
        let api = TestApi::new().await;
        let response = TestApi::as_user(api.server.post("/api/v1/bookings"), api.school.member)
            .json(&api.booking_body())
            .await;

        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(response.json::<Value>()["error"], "forbidden");
    }

    #[tokio::test]
    async fn test_overlapping_booking_is_conflict() {
        let api = TestApi::new().await;
        api.create_booking().await;

        let mut clash = api.booking_body();
        clash["user_id"] = json!(api.school.second_member);
        clash["instructor_id"] = Value::Null;
        let response = TestApi::as_user(api.server.post("/api/v1/bookings"), api.school.admin)
            .json(&clash)
            .await;

        assert_eq!(response.status_code(), StatusCode::CONFLICT);
        assert_eq!(response.json::<Value>()["error"], "conflict");
    }

    #[tokio::test]
    async fn test_patch_cannot_cancel() {
        let api = TestApi::new().await;
        let created = api.create_booking().await;
        let id = created["id"].as_str().unwrap();

        let response = TestApi::as_user(
            api.server.patch(&format!("/api/v1/bookings/{}", id)),
            api.school.admin,
        )
        .json(&json!({ "status": "cancelled" }))
        .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "invalid_input");
    }

    #[tokio::test]
    async fn test_cancelled_booking_is_immutable() {
        let api = TestApi::new().await;
        let created = api.create_booking().await;
        let id = created["id"].as_str().unwrap();

        let cancelled = TestApi::as_user(
            api.server.post(&format!("/api/v1/bookings/{}/cancel", id)),
            api.school.admin,
        )
        .await;
        assert_eq!(cancelled.status_code(), StatusCode::OK);
        assert_eq!(cancelled.json::<Value>()["status"], "cancelled");

        let response = TestApi::as_user(
            api.server.patch(&format!("/api/v1/bookings/{}", id)),
            api.school.admin,
        )
        .json(&json!({ "purpose": "Navigation exercise" }))
        .await;

        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json::<Value>()["error"], "immutable");
    }

    #[tokio::test]
    async fn test_check_out_draft_then_submit() {
        let api = TestApi::new().await;
        let created = api.create_booking().await;
        let path = format!("/api/v1/bookings/{}/check-out", created["id"].as_str().unwrap());

        let draft = TestApi::as_user(api.server.put(&path), api.school.instructor)
            .json(&json!({ "booking_details": { "route": "NZAR - NZWP - NZAR" } }))
            .await;
        assert_eq!(draft.status_code(), StatusCode::OK);
        let draft = draft.json::<Value>();
        assert_eq!(draft["booking"]["status"], "confirmed");
        assert_eq!(draft["bookingDetails"]["route"], "NZAR - NZWP - NZAR");

        let submitted = TestApi::as_user(api.server.post(&path), api.school.instructor)
            .json(&json!({
                "booking": { "briefing_completed": true },
                "booking_details": { "authorization_completed": true }
            }))
            .await;
        assert_eq!(submitted.status_code(), StatusCode::OK);
        let submitted = submitted.json::<Value>();
        assert_eq!(submitted["booking"]["status"], "flying");
        assert_eq!(submitted["booking"]["briefing_completed"], true);
        assert_eq!(submitted["bookingDetails"]["route"], "NZAR - NZWP - NZAR");
    }

    #[tokio::test]
    async fn test_check_out_saves_camel_case_details() {
        let api = TestApi::new().await;
        let created = api.create_booking().await;
        let id = created["id"].as_str().unwrap();

        let response = TestApi::as_user(
            api.server.post(&format!("/api/v1/bookings/{}/check-out", id)),
            api.school.instructor,
        )
        .json(&json!({
            "booking": { "purpose": "Nav" },
            "bookingDetails": { "route": "YSCB-YGLB", "overrideConflict": true }
        }))
        .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body = response.json::<Value>();
        assert_eq!(body["booking"]["status"], "flying");
        assert_eq!(body["bookingDetails"]["route"], "YSCB-YGLB");
        assert_eq!(body["bookingDetails"]["override_conflict"], true);

        let stored = TestApi::as_user(
            api.server.get(&format!("/api/v1/bookings/{}", id)),
            api.school.instructor,
        )
        .await
        .json::<Value>();
        assert_eq!(stored["booking"]["purpose"], "Nav");
        assert_eq!(stored["bookingDetails"]["route"], "YSCB-YGLB");
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let api = TestApi::new().await;
        let response = TestApi::as_user(api.server.post("/api/v1/bookings"), api.school.admin)
            .json(&json!({ "purpose": "missing everything else" }))
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "invalid_input");
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let api = TestApi::new().await;
        let response = TestApi::as_user(
            api.server.get(&format!("/api/v1/bookings/{}", uuid::Uuid::new_v4())),
            api.school.admin,
        )
        .await;

        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }
}

mod audit_logs {
    use super::*;

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let api = TestApi::new().await;
        let created = api.create_booking().await;
        let id = created["id"].as_str().unwrap();

        TestApi::as_user(
            api.server.patch(&format!("/api/v1/bookings/{}", id)),
            api.school.admin,
        )
        .json(&json!({ "status": "briefing" }))
        .await;

        let response = TestApi::as_user(api.server.get("/api/v1/audit-logs"), api.school.admin)
            .add_query_param("row_id", id)
            .add_query_param("table_name", "bookings")
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let lines = response.json::<Vec<Value>>();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0]["description"],
            "Status changed from \"confirmed\" to \"briefing\""
        );
    }

    #[tokio::test]
    async fn test_missing_row_id_is_bad_request() {
        let api = TestApi::new().await;
        let response = TestApi::as_user(api.server.get("/api/v1/audit-logs"), api.school.admin)
            .add_query_param("table_name", "bookings")
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }
}

mod invoices {
    use super::*;

    #[tokio::test]
    async fn test_invoice_is_priced_and_issued() {
        let api = TestApi::new().await;
        let created = api.create_invoice().await;

        assert_eq!(created["invoice_number"], "INV-000001");
        assert_eq!(created["invoice"]["status"], "pending");
        assert_eq!(money(&created["invoice"]["total_amount"]), dec!(287.50));
        assert_eq!(money(&created["transaction"]["amount"]), dec!(-287.50));
    }

    #[tokio::test]
    async fn test_two_payments_settle_invoice() {
        let api = TestApi::new().await;
        let created = api.create_invoice().await;
        let path = format!(
            "/api/v1/invoices/{}/payments",
            created["invoice"]["id"].as_str().unwrap()
        );

        let first = TestApi::as_user(api.server.post(&path), api.school.admin)
            .json(&json!({ "amount": "100.00", "payment_method": "cash" }))
            .await;
        assert_eq!(first.status_code(), StatusCode::CREATED);
        let first = first.json::<Value>();
        assert_eq!(first["invoice"]["invoice"]["status"], "pending");
        assert_eq!(money(&first["invoice"]["invoice"]["balance_due"]), dec!(187.50));

        let second = TestApi::as_user(api.server.post(&path), api.school.admin)
            .json(&json!({ "amount": "187.50", "payment_method": "bank_transfer" }))
            .await;
        let second = second.json::<Value>();
        assert_eq!(second["invoice"]["invoice"]["status"], "paid");
        assert_eq!(second["invoice"]["payments"].as_array().unwrap().len(), 2);

        let refused = TestApi::as_user(api.server.post(&path), api.school.admin)
            .json(&json!({ "amount": "1.00", "payment_method": "cash" }))
            .await;
        assert_eq!(refused.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(refused.json::<Value>()["error"], "invalid_state");
    }

    #[tokio::test]
    async fn test_account_credit_without_balance_is_refused() {
        let api = TestApi::new().await;
        let created = api.create_invoice().await;
        let path = format!(
            "/api/v1/invoices/{}/payments",
            created["invoice"]["id"].as_str().unwrap()
        );

        let response = TestApi::as_user(api.server.post(&path), api.school.admin)
            .json(&json!({ "amount": "50.00", "payment_method": "account_credit" }))
            .await;

        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json::<Value>()["error"], "insufficient_credit");
    }

    #[tokio::test]
    async fn test_edit_recomputes_totals() {
        let api = TestApi::new().await;
        let created = api.create_invoice().await;
        let id = created["invoice"]["id"].as_str().unwrap();
        let item_id = created["items"][0]["id"].clone();

        let response = TestApi::as_user(
            api.server.patch(&format!("/api/v1/invoices/{}", id)),
            api.school.admin,
        )
        .json(&json!({
            "items": [{
                "id": item_id,
                "quantity": "2",
                "rate": "250.00",
                "description": "Dual flight x2"
            }]
        }))
        .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let edited = response.json::<Value>();
        assert_eq!(money(&edited["invoice"]["total_amount"]), dec!(575.00));

        let view = TestApi::as_user(
            api.server.get(&format!("/api/v1/invoices/{}", id)),
            api.school.member,
        )
        .await;
        assert_eq!(view.status_code(), StatusCode::OK);
        let view = view.json::<Value>();
        assert_eq!(money(&view["invoice"]["balance_due"]), dec!(575.00));
        assert_eq!(view["transactions"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_other_member_cannot_read_invoice() {
        let api = TestApi::new().await;
        let created = api.create_invoice().await;

        let response = TestApi::as_user(
            api.server.get(&format!(
                "/api/v1/invoices/{}",
                created["invoice"]["id"].as_str().unwrap()
            )),
            api.school.second_member,
        )
        .await;

        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    }
}
