//! Booking DTOs

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use core_kernel::{AircraftId, FlightTypeId, LessonId, OrganizationId, UserId};
use domain_booking::{
    BookingDetailsPatch, BookingPatch, BookingStatus, BookingType, CheckOutRequest, NewBooking,
};

use super::double_option;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub organization_id: OrganizationId,
    pub aircraft_id: AircraftId,
    pub user_id: UserId,
    pub instructor_id: Option<UserId>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: Option<BookingStatus>,
    #[validate(length(min = 1))]
    pub purpose: String,
    pub remarks: Option<String>,
    pub flight_type_id: Option<FlightTypeId>,
    pub lesson_id: Option<LessonId>,
    pub booking_type: Option<BookingType>,
}

impl From<CreateBookingRequest> for NewBooking {
    fn from(request: CreateBookingRequest) -> Self {
        NewBooking {
            organization_id: request.organization_id,
            aircraft_id: request.aircraft_id,
            user_id: request.user_id,
            instructor_id: request.instructor_id,
            start_time: request.start_time,
            end_time: request.end_time,
            status: request.status,
            purpose: request.purpose,
            remarks: request.remarks,
            flight_type_id: request.flight_type_id,
            lesson_id: request.lesson_id,
            booking_type: request.booking_type,
        }
    }
}

/// Body of `PATCH /bookings/:id`
///
/// Absent fields are left untouched; `null` clears a nullable field.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateBookingRequest {
    pub aircraft_id: Option<AircraftId>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: Option<BookingStatus>,
    #[validate(length(min = 1))]
    pub purpose: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub remarks: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub flight_type_id: Option<Option<FlightTypeId>>,
    #[serde(default, deserialize_with = "double_option")]
    pub lesson_id: Option<Option<LessonId>>,
    #[serde(default, deserialize_with = "double_option")]
    pub booking_type: Option<Option<BookingType>>,
    pub briefing_completed: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub instructor_comment: Option<Option<String>>,
}

impl From<UpdateBookingRequest> for BookingPatch {
    fn from(request: UpdateBookingRequest) -> Self {
        BookingPatch {
            aircraft_id: request.aircraft_id,
            start_time: request.start_time,
            end_time: request.end_time,
            status: request.status,
            purpose: request.purpose,
            remarks: request.remarks,
            flight_type_id: request.flight_type_id,
            lesson_id: request.lesson_id,
            booking_type: request.booking_type,
            briefing_completed: request.briefing_completed,
            instructor_comment: request.instructor_comment,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct BookingDetailsRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub eta: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub passengers: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub route: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub equipment: Option<Option<Value>>,
    #[serde(default, deserialize_with = "double_option")]
    pub remarks: Option<Option<String>>,
    #[serde(alias = "authorizationCompleted")]
    pub authorization_completed: Option<bool>,
    #[serde(alias = "overrideConflict")]
    pub override_conflict: Option<bool>,
}

impl From<BookingDetailsRequest> for BookingDetailsPatch {
    fn from(request: BookingDetailsRequest) -> Self {
        BookingDetailsPatch {
            eta: request.eta,
            passengers: request.passengers,
            route: request.route,
            equipment: request.equipment,
            remarks: request.remarks,
            authorization_completed: request.authorization_completed,
            override_conflict: request.override_conflict,
        }
    }
}

/// Body of the check-out endpoints: `{booking, bookingDetails}`
#[derive(Debug, Default, Deserialize, Validate)]
pub struct CheckOutBody {
    #[validate(nested)]
    pub booking: Option<UpdateBookingRequest>,
    #[serde(rename = "bookingDetails", alias = "booking_details")]
    #[validate(nested)]
    pub booking_details: Option<BookingDetailsRequest>,
}

impl From<CheckOutBody> for CheckOutRequest {
    fn from(body: CheckOutBody) -> Self {
        CheckOutRequest {
            booking: body.booking.map(BookingPatch::from),
            booking_details: body.booking_details.map(BookingDetailsPatch::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_clears_and_absent_keeps() {
        let body: UpdateBookingRequest =
            serde_json::from_str(r#"{"remarks": null, "status": "briefing"}"#).unwrap();
        let patch = BookingPatch::from(body);

        assert_eq!(patch.remarks, Some(None));
        assert_eq!(patch.lesson_id, None);
        assert_eq!(patch.status, Some(BookingStatus::Briefing));
    }

    #[test]
    fn test_unknown_status_rejected() {
        let result = serde_json::from_str::<UpdateBookingRequest>(r#"{"status": "airborne"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_purpose_fails_validation() {
        let body = UpdateBookingRequest {
            purpose: Some(String::new()),
            ..Default::default()
        };
        assert!(body.validate().is_err());
    }

    #[test]
    fn test_check_out_body_maps_both_parts() {
        let body: CheckOutBody = serde_json::from_str(
            r#"{"booking": {"briefing_completed": true}, "booking_details": {"route": "NZAR-NZWP"}}"#,
        )
        .unwrap();
        let request = CheckOutRequest::from(body);

        assert_eq!(request.booking.unwrap().briefing_completed, Some(true));
        assert_eq!(
            request.booking_details.unwrap().route,
            Some(Some("NZAR-NZWP".to_string()))
        );
    }

    #[test]
    fn test_check_out_body_reads_camel_case_details() {
        let body: CheckOutBody = serde_json::from_str(
            r#"{"booking": {"purpose": "Nav"}, "bookingDetails": {"route": "YSCB-YGLB", "overrideConflict": true}}"#,
        )
        .unwrap();
        let request = CheckOutRequest::from(body);

        assert_eq!(request.booking.unwrap().purpose.as_deref(), Some("Nav"));
        let details = request.booking_details.unwrap();
        assert_eq!(details.route, Some(Some("YSCB-YGLB".to_string())));
        assert_eq!(details.override_conflict, Some(true));
    }
}
