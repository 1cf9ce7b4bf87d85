use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError};
use crate::store::{AppointmentStore, BookingConflict};

/// Stands between the booking flow and the store: translates the store's
/// serialized check-then-write outcomes into the two typed conflicts a
/// caller can act on (slot taken vs. pending cap).
pub struct BookingConflictGuard {
    store: Arc<dyn AppointmentStore>,
    max_pending: u32,
}

impl BookingConflictGuard {
    pub fn new(store: Arc<dyn AppointmentStore>, max_pending: u32) -> Self {
        Self { store, max_pending }
    }

    pub async fn reserve(
        &self,
        appointment: Appointment,
    ) -> Result<Appointment, AppointmentError> {
        let date = appointment.date;
        let slot = appointment.time_slot.clone();

        self.store
            .create(appointment, self.max_pending)
            .await
            .map_err(|conflict| self.translate(conflict, date, &slot))
    }

    pub async fn move_slot(
        &self,
        id: Uuid,
        new_date: NaiveDate,
        new_slot: &str,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        self.store
            .reschedule(id, new_date, new_slot, now)
            .await
            .map_err(|conflict| self.translate(conflict, new_date, new_slot))
    }

    fn translate(
        &self,
        conflict: BookingConflict,
        date: NaiveDate,
        slot: &str,
    ) -> AppointmentError {
        match conflict {
            BookingConflict::SlotTaken => {
                warn!("Slot conflict on {} {}", date, slot);
                AppointmentError::SlotTaken
            }
            BookingConflict::PendingLimit => {
                AppointmentError::PendingLimitReached(self.max_pending)
            }
            BookingConflict::Store(e) => AppointmentError::Database(e.to_string()),
        }
    }
}
