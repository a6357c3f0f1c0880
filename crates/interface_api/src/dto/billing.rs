//! Invoice and payment DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{ChargeableId, InvoiceItemId, OrganizationId, TaxRate, UserId};
use domain_billing::{
    CreateInvoiceRequest, EditInvoiceRequest, InvoiceItemEdit, NewInvoiceItem, PaymentMethod,
    PaymentRequest,
};

use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct InvoiceItemBody {
    pub chargeable_id: ChargeableId,
    #[validate(length(min = 1))]
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    /// Fraction, e.g. `0.15`; the organization default applies when absent
    pub tax_rate: Option<Decimal>,
}

impl TryFrom<InvoiceItemBody> for NewInvoiceItem {
    type Error = ApiError;

    fn try_from(body: InvoiceItemBody) -> Result<Self, Self::Error> {
        let tax_rate = body
            .tax_rate
            .map(TaxRate::new)
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        Ok(NewInvoiceItem {
            chargeable_id: body.chargeable_id,
            description: body.description,
            quantity: body.quantity,
            rate: body.rate,
            tax_rate,
        })
    }
}

/// Body of `POST /invoices`
#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceBody {
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub due_date: NaiveDate,
    pub reference: Option<String>,
    pub notes: Option<String>,
    #[validate(length(min = 1), nested)]
    pub items: Vec<InvoiceItemBody>,
}

impl TryFrom<CreateInvoiceBody> for CreateInvoiceRequest {
    type Error = ApiError;

    fn try_from(body: CreateInvoiceBody) -> Result<Self, Self::Error> {
        let items = body
            .items
            .into_iter()
            .map(NewInvoiceItem::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CreateInvoiceRequest {
            organization_id: body.organization_id,
            user_id: body.user_id,
            due_date: body.due_date,
            reference: body.reference,
            notes: body.notes,
            items,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct InvoiceItemEditBody {
    pub id: InvoiceItemId,
    pub quantity: Decimal,
    pub rate: Decimal,
    #[validate(length(min = 1))]
    pub description: String,
}

/// Body of `PATCH /invoices/:id`
#[derive(Debug, Default, Deserialize, Validate)]
pub struct EditInvoiceBody {
    pub due_date: Option<NaiveDate>,
    #[validate(nested)]
    pub items: Option<Vec<InvoiceItemEditBody>>,
}

impl From<EditInvoiceBody> for EditInvoiceRequest {
    fn from(body: EditInvoiceBody) -> Self {
        EditInvoiceRequest {
            due_date: body.due_date,
            items: body.items.map(|items| {
                items
                    .into_iter()
                    .map(|item| InvoiceItemEdit {
                        id: item.id,
                        quantity: item.quantity,
                        rate: item.rate,
                        description: item.description,
                    })
                    .collect()
            }),
        }
    }
}

/// Body of `POST /invoices/:id/payments`
#[derive(Debug, Deserialize, Validate)]
pub struct PaymentBody {
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

impl From<PaymentBody> for PaymentRequest {
    fn from(body: PaymentBody) -> Self {
        PaymentRequest {
            amount: body.amount,
            payment_method: body.payment_method,
            payment_reference: body.payment_reference,
            notes: body.notes,
            date: body.date,
        }
    }
}
