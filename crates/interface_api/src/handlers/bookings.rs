//! Booking handlers

use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use core_kernel::BookingId;
use domain_booking::{Booking, BookingWithDetails, CheckOutOutcome};

use crate::auth::CurrentUser;
use crate::dto::booking::{CheckOutBody, CreateBookingRequest, UpdateBookingRequest};
use crate::extract::ValidatedJson;
use crate::{error::ApiError, AppState};

fn booking_id(path: Result<Path<Uuid>, PathRejection>) -> Result<BookingId, ApiError> {
    let Path(id) = path?;
    Ok(BookingId::from_uuid(id))
}

/// Creates a booking
pub async fn create_booking(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    ValidatedJson(request): ValidatedJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    let booking = state
        .services
        .bookings
        .create_booking(request.into(), &principal)
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// Gets a booking with its check-out details
pub async fn get_booking(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<BookingWithDetails>, ApiError> {
    let id = booking_id(path)?;
    let booking = state.services.bookings.get_booking(id, &principal).await?;
    Ok(Json(booking))
}

/// Validates and applies a partial update
pub async fn update_booking(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
    ValidatedJson(request): ValidatedJson<UpdateBookingRequest>,
) -> Result<Json<Booking>, ApiError> {
    let id = booking_id(path)?;
    let booking = state
        .services
        .bookings
        .update_booking(id, request.into(), &principal)
        .await?;
    Ok(Json(booking))
}

/// Saves check-out fields and moves the booking to flying
pub async fn check_out(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
    ValidatedJson(body): ValidatedJson<CheckOutBody>,
) -> Result<Json<CheckOutOutcome>, ApiError> {
    let id = booking_id(path)?;
    let outcome = state
        .services
        .bookings
        .check_out(id, body.into(), &principal)
        .await?;
    Ok(Json(outcome))
}

/// Saves a check-out draft without a status change
pub async fn save_check_out(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
    ValidatedJson(body): ValidatedJson<CheckOutBody>,
) -> Result<Json<CheckOutOutcome>, ApiError> {
    let id = booking_id(path)?;
    let outcome = state
        .services
        .bookings
        .save_check_out(id, body.into(), &principal)
        .await?;
    Ok(Json(outcome))
}

/// Cancels a booking
pub async fn cancel_booking(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Booking>, ApiError> {
    let id = booking_id(path)?;
    let booking = state.services.bookings.cancel_booking(id, &principal).await?;
    Ok(Json(booking))
}
