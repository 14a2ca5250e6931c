// Test-drive requests: form parsing and the booking insert

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Deserialize;

use crate::backend::{Backend, BackendError};
use crate::models::{BookingStatus, TestDriveBooking};

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct TestDriveForm {
    pub preferred_date: String,
    pub preferred_time: String,
    pub alternate_date: String,
    pub alternate_time: String,
    pub notes: String,
}

// Date and time inputs post "2025-03-14" and "14:30"
fn combine(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time.trim(), "%H:%M:%S"))
        .ok()?;
    Some(NaiveDateTime::new(date, time).and_utc())
}

impl TestDriveForm {
    /// Builds a pending booking. The alternate slot is kept only when both
    /// its date and time were given.
    pub fn to_booking(&self, vehicle_id: &str, user_id: &str) -> Result<TestDriveBooking, String> {
        let preferred_date = combine(&self.preferred_date, &self.preferred_time)
            .ok_or_else(|| "Please choose a preferred date and time".to_string())?;
        let alternate_date = if self.alternate_date.trim().is_empty() || self.alternate_time.trim().is_empty() {
            None
        } else {
            combine(&self.alternate_date, &self.alternate_time)
        };

        Ok(TestDriveBooking {
            vehicle_id: vehicle_id.to_string(),
            user_id: user_id.to_string(),
            preferred_date,
            alternate_date,
            notes: self.notes.trim().to_string(),
            status: BookingStatus::Pending,
        })
    }
}

pub async fn book_test_drive(
    backend: &dyn Backend,
    booking: &TestDriveBooking,
    access_token: &str,
) -> Result<(), BackendError> {
    backend.insert_booking(booking, access_token).await?;
    tracing::info!(
        "Test drive requested for vehicle {} by user {} at {}",
        booking.vehicle_id,
        booking.user_id,
        booking.preferred_date
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;

    fn form() -> TestDriveForm {
        TestDriveForm {
            preferred_date: "2025-03-14".into(),
            preferred_time: "14:30".into(),
            alternate_date: "2025-03-15".into(),
            alternate_time: "".into(),
            notes: "  Interested in the tow bar  ".into(),
        }
    }

    #[test]
    fn combines_date_and_time_as_utc() {
        let booking = form().to_booking("v1", "u1").unwrap();
        assert_eq!(booking.preferred_date.to_rfc3339(), "2025-03-14T14:30:00+00:00");
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.notes, "Interested in the tow bar");
    }

    #[test]
    fn alternate_needs_both_parts() {
        assert!(form().to_booking("v1", "u1").unwrap().alternate_date.is_none());

        let both = TestDriveForm { alternate_time: "09:00".into(), ..form() };
        let alternate = both.to_booking("v1", "u1").unwrap().alternate_date.unwrap();
        assert_eq!(alternate.to_rfc3339(), "2025-03-15T09:00:00+00:00");
    }

    #[test]
    fn missing_preferred_slot_is_rejected() {
        let empty = TestDriveForm::default();
        assert!(empty.to_booking("v1", "u1").is_err());
    }

    #[test]
    fn status_serializes_lowercase() {
        let booking = form().to_booking("v1", "u1").unwrap();
        let json = serde_json::to_value(&booking).unwrap();
        assert_eq!(json["status"], "pending");
        assert!(json["alternate_date"].is_null());
    }

    #[tokio::test]
    async fn booking_requires_a_valid_session() {
        let backend = MemoryBackend::new();
        let token = backend.add_account("u1", "fiona@example.ie", "pw");
        let booking = form().to_booking("v1", "u1").unwrap();

        book_test_drive(&backend, &booking, &token).await.unwrap();
        assert_eq!(backend.bookings.lock().unwrap().len(), 1);

        let err = book_test_drive(&backend, &booking, "expired").await.unwrap_err();
        assert!(err.is_unauthorized());
    }
}
