//! Reading the booking audit trail

use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use core_kernel::{authorize, AccessPort, AuditEntry, AuditLogPort, Capability, Principal};

use crate::error::BookingError;

/// An audit entry with its rendered description
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLine {
    #[serde(flatten)]
    pub entry: AuditEntry,
    pub description: String,
}

/// Serves audit history to staff
pub struct AuditTrailService {
    audit: Arc<dyn AuditLogPort>,
    access: Arc<dyn AccessPort>,
}

impl AuditTrailService {
    pub fn new(audit: Arc<dyn AuditLogPort>, access: Arc<dyn AccessPort>) -> Self {
        Self { audit, access }
    }

    /// History of one row, newest first
    ///
    /// The caller needs `ViewAuditLog` in the organization that owns the
    /// entries. A row without history yields an empty list.
    #[instrument(skip(self, principal))]
    pub async fn history(
        &self,
        table_name: &str,
        row_id: Uuid,
        principal: &Principal,
    ) -> Result<Vec<AuditLine>, BookingError> {
        principal.user_id().ok_or(BookingError::Unauthorized)?;

        let entries = self.audit.list_for_row(table_name, row_id).await?;
        if let Some(first) = entries.first() {
            authorize(
                self.access.as_ref(),
                principal,
                first.organization_id,
                Capability::ViewAuditLog,
            )
            .await?;
        }

        Ok(entries
            .into_iter()
            .map(|entry| AuditLine {
                description: entry.describe(),
                entry,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::{BookingStatus, NewBooking};
    use crate::ports::mock::InMemoryBookingStore;
    use crate::services::BookingService;
    use crate::BookingPatch;
    use chrono::{Duration, TimeZone, Utc};
    use core_kernel::access::mock::MockAccessPort;
    use core_kernel::{AircraftId, ErrorKind, OrganizationId, Role, UserId};

    #[tokio::test]
    async fn test_history_describes_changes_newest_first() {
        let store = InMemoryBookingStore::new();
        let access = MockAccessPort::new();
        let org = OrganizationId::new();
        let aircraft = AircraftId::new();
        let admin = UserId::new();
        let member = UserId::new();
        store.add_aircraft(org, aircraft).await;
        access.grant(org, admin, Role::Admin).await;
        access.grant(org, member, Role::Member).await;

        let bookings = BookingService::new(Arc::new(store.clone()), Arc::new(access.clone()));
        let trail = AuditTrailService::new(Arc::new(store.clone()), Arc::new(access.clone()));
        let staff = Principal::User(admin);

        let start = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        let booking = bookings
            .create_booking(
                NewBooking {
                    organization_id: org,
                    aircraft_id: aircraft,
                    user_id: member,
                    instructor_id: None,
                    start_time: start,
                    end_time: start + Duration::hours(1),
                    status: None,
                    purpose: "Circuits".to_string(),
                    remarks: None,
                    flight_type_id: None,
                    lesson_id: None,
                    booking_type: None,
                },
                &staff,
            )
            .await
            .unwrap();
        bookings
            .update_booking(
                booking.id,
                BookingPatch {
                    status: Some(BookingStatus::Confirmed),
                    ..Default::default()
                },
                &staff,
            )
            .await
            .unwrap();

        let lines = trail
            .history("bookings", *booking.id.as_uuid(), &staff)
            .await
            .unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].description, "Status changed from \"unconfirmed\" to \"confirmed\"");

        let err = trail
            .history("bookings", *booking.id.as_uuid(), &Principal::User(member))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }
}
