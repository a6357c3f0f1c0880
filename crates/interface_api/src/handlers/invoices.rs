//! Invoice and payment handlers

use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use core_kernel::InvoiceId;
use domain_billing::{CreatedInvoice, EditedInvoice, InvoiceView, RecordedPayment};

use crate::auth::CurrentUser;
use crate::dto::billing::{CreateInvoiceBody, EditInvoiceBody, PaymentBody};
use crate::extract::ValidatedJson;
use crate::{error::ApiError, AppState};

fn invoice_id(path: Result<Path<Uuid>, PathRejection>) -> Result<InvoiceId, ApiError> {
    let Path(id) = path?;
    Ok(InvoiceId::from_uuid(id))
}

/// Creates and issues an invoice
pub async fn create_invoice(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    ValidatedJson(body): ValidatedJson<CreateInvoiceBody>,
) -> Result<(StatusCode, Json<CreatedInvoice>), ApiError> {
    let created = state
        .services
        .invoices
        .create_invoice(body.try_into()?, &principal)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Gets an invoice with its items, payments and ledger rows
pub async fn get_invoice(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<InvoiceView>, ApiError> {
    let id = invoice_id(path)?;
    let view = state.services.invoices.get_invoice(id, &principal).await?;
    Ok(Json(view))
}

/// Edits due date and item lines
pub async fn edit_invoice(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
    ValidatedJson(body): ValidatedJson<EditInvoiceBody>,
) -> Result<Json<EditedInvoice>, ApiError> {
    let id = invoice_id(path)?;
    let edited = state
        .services
        .invoices
        .edit_invoice(id, body.into(), &principal)
        .await?;
    Ok(Json(edited))
}

/// Records a payment against an invoice
pub async fn record_payment(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
    ValidatedJson(body): ValidatedJson<PaymentBody>,
) -> Result<(StatusCode, Json<RecordedPayment>), ApiError> {
    let id = invoice_id(path)?;
    let recorded = state
        .services
        .payments
        .record_payment(id, body.into(), &principal)
        .await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}
