use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use shared_database::atlas::{is_duplicate_key, AtlasClient};
use shared_database::StoreError;

use crate::models::{Appointment, PricingTable};

const APPOINTMENTS: &str = "appointments";
const SETTINGS: &str = "settings";

const ACTIVE_STATUSES: [&str; 2] = ["pending", "confirmed"];

/// Why a create/reschedule could not claim its slot. Produced inside the
/// store so the check and the write happen under the same serialization
/// point (lock here, unique index in the document store).
#[derive(Debug)]
pub enum BookingConflict {
    SlotTaken,
    PendingLimit,
    Store(StoreError),
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Insert an appointment iff its (date, slot) is unclaimed by any active
    /// appointment and the owner is under the pending cap. Atomic: under
    /// concurrent attempts for one slot exactly one caller succeeds.
    async fn create(
        &self,
        appointment: Appointment,
        max_pending: u32,
    ) -> Result<Appointment, BookingConflict>;

    /// Move an appointment to a new (date, slot), ignoring its own claim.
    async fn reschedule(
        &self,
        id: Uuid,
        new_date: NaiveDate,
        new_slot: &str,
        now: DateTime<Utc>,
    ) -> Result<Appointment, BookingConflict>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Non-slot mutations (status, payment fields, audit timestamps).
    async fn update(&self, appointment: &Appointment) -> Result<(), StoreError>;

    /// Slot labels claimed by active appointments on the date.
    async fn claimed_slots(&self, date: NaiveDate) -> Result<Vec<String>, StoreError>;

    /// Every appointment the user owns, newest date first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Appointment>, StoreError>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load_pricing(&self) -> Result<Option<PricingTable>, StoreError>;
    async fn save_pricing(&self, table: &PricingTable) -> Result<(), StoreError>;
}

// ==============================================================================
// DOCUMENT STORE IMPLEMENTATIONS
// ==============================================================================

/// Requires a partial unique index on (date, timeSlot) filtered to
/// status in {pending, confirmed}; the duplicate-key violation it produces
/// under a race is what makes first-committer-wins hold.
pub struct DocumentAppointmentStore {
    client: Arc<AtlasClient>,
}

impl DocumentAppointmentStore {
    pub fn new(client: Arc<AtlasClient>) -> Self {
        Self { client }
    }

    fn active_slot_filter(date: NaiveDate, slot: &str, exclude: Option<Uuid>) -> Value {
        let mut filter = json!({
            "date": date,
            "timeSlot": slot,
            "status": { "$in": ACTIVE_STATUSES }
        });
        if let Some(id) = exclude {
            filter["id"] = json!({ "$ne": id });
        }
        filter
    }
}

#[async_trait]
impl AppointmentStore for DocumentAppointmentStore {
    async fn create(
        &self,
        appointment: Appointment,
        max_pending: u32,
    ) -> Result<Appointment, BookingConflict> {
        let conflict: Option<Appointment> = self
            .client
            .find_one(
                APPOINTMENTS,
                Self::active_slot_filter(appointment.date, &appointment.time_slot, None),
            )
            .await
            .map_err(|e| BookingConflict::Store(StoreError::backend(e)))?;
        if conflict.is_some() {
            return Err(BookingConflict::SlotTaken);
        }

        let pending: Vec<Appointment> = self
            .client
            .find(
                APPOINTMENTS,
                json!({ "userId": appointment.user_id, "status": "pending" }),
                None,
                None,
            )
            .await
            .map_err(|e| BookingConflict::Store(StoreError::backend(e)))?;
        if pending.len() >= max_pending as usize {
            return Err(BookingConflict::PendingLimit);
        }

        let document =
            serde_json::to_value(&appointment).map_err(|e| BookingConflict::Store(StoreError::backend(e)))?;
        match self.client.insert_one(APPOINTMENTS, document).await {
            Ok(()) => Ok(appointment),
            // The racing writer that loses the unique index gets E11000
            Err(e) if is_duplicate_key(&e) => Err(BookingConflict::SlotTaken),
            Err(e) => Err(BookingConflict::Store(StoreError::backend(e))),
        }
    }

    async fn reschedule(
        &self,
        id: Uuid,
        new_date: NaiveDate,
        new_slot: &str,
        now: DateTime<Utc>,
    ) -> Result<Appointment, BookingConflict> {
        let conflict: Option<Appointment> = self
            .client
            .find_one(
                APPOINTMENTS,
                Self::active_slot_filter(new_date, new_slot, Some(id)),
            )
            .await
            .map_err(|e| BookingConflict::Store(StoreError::backend(e)))?;
        if conflict.is_some() {
            return Err(BookingConflict::SlotTaken);
        }

        let update = json!({
            "$set": {
                "date": new_date,
                "timeSlot": new_slot,
                "rescheduledAt": now
            }
        });
        let outcome = match self
            .client
            .update_one(APPOINTMENTS, json!({ "id": id }), update)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) if is_duplicate_key(&e) => return Err(BookingConflict::SlotTaken),
            Err(e) => return Err(BookingConflict::Store(StoreError::backend(e))),
        };
        if outcome.matched_count == 0 {
            return Err(BookingConflict::Store(StoreError::Backend(format!(
                "appointment {} not found",
                id
            ))));
        }

        self.find_by_id(id)
            .await
            .map_err(BookingConflict::Store)?
            .ok_or_else(|| {
                BookingConflict::Store(StoreError::Backend(format!(
                    "appointment {} disappeared during reschedule",
                    id
                )))
            })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        self.client
            .find_one(APPOINTMENTS, json!({ "id": id }))
            .await
            .map_err(StoreError::backend)
    }

    async fn update(&self, appointment: &Appointment) -> Result<(), StoreError> {
        let document = serde_json::to_value(appointment).map_err(StoreError::backend)?;
        let outcome = self
            .client
            .update_one(
                APPOINTMENTS,
                json!({ "id": appointment.id }),
                json!({ "$set": document }),
            )
            .await
            .map_err(StoreError::backend)?;

        if outcome.matched_count == 0 {
            return Err(StoreError::Backend(format!(
                "appointment {} not found",
                appointment.id
            )));
        }
        Ok(())
    }

    async fn claimed_slots(&self, date: NaiveDate) -> Result<Vec<String>, StoreError> {
        let appointments: Vec<Appointment> = self
            .client
            .find(
                APPOINTMENTS,
                json!({ "date": date, "status": { "$in": ACTIVE_STATUSES } }),
                None,
                None,
            )
            .await
            .map_err(StoreError::backend)?;
        Ok(appointments.into_iter().map(|a| a.time_slot).collect())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        self.client
            .find(
                APPOINTMENTS,
                json!({ "userId": user_id }),
                Some(json!({ "date": -1, "timeSlot": 1 })),
                None,
            )
            .await
            .map_err(StoreError::backend)
    }
}

pub struct DocumentSettingsStore {
    client: Arc<AtlasClient>,
}

impl DocumentSettingsStore {
    pub fn new(client: Arc<AtlasClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SettingsStore for DocumentSettingsStore {
    async fn load_pricing(&self) -> Result<Option<PricingTable>, StoreError> {
        let document: Option<Value> = self
            .client
            .find_one(SETTINGS, json!({ "type": "pricing" }))
            .await
            .map_err(StoreError::backend)?;

        match document {
            Some(doc) => {
                let table = serde_json::from_value(doc["data"].clone())
                    .map_err(StoreError::backend)?;
                Ok(Some(table))
            }
            None => Ok(None),
        }
    }

    async fn save_pricing(&self, table: &PricingTable) -> Result<(), StoreError> {
        let data = serde_json::to_value(table).map_err(StoreError::backend)?;
        self.client
            .upsert_one(
                SETTINGS,
                json!({ "type": "pricing" }),
                json!({ "$set": { "type": "pricing", "data": data, "updatedAt": Utc::now() } }),
            )
            .await
            .map(|_| ())
            .map_err(StoreError::backend)
    }
}

// ==============================================================================
// IN-MEMORY IMPLEMENTATIONS (tests, unconfigured deployments)
// ==============================================================================

/// One mutex over the collection makes the check-then-insert serialized,
/// which is the whole double-booking guarantee for this implementation.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: Mutex<Vec<Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn create(
        &self,
        appointment: Appointment,
        max_pending: u32,
    ) -> Result<Appointment, BookingConflict> {
        let mut appointments = self.appointments.lock().await;

        let slot_claimed = appointments.iter().any(|a| {
            a.date == appointment.date && a.time_slot == appointment.time_slot && a.is_active()
        });
        if slot_claimed {
            return Err(BookingConflict::SlotTaken);
        }

        let pending = appointments
            .iter()
            .filter(|a| {
                a.user_id == appointment.user_id
                    && a.status == crate::models::AppointmentStatus::Pending
            })
            .count();
        if pending >= max_pending as usize {
            return Err(BookingConflict::PendingLimit);
        }

        appointments.push(appointment.clone());
        Ok(appointment)
    }

    async fn reschedule(
        &self,
        id: Uuid,
        new_date: NaiveDate,
        new_slot: &str,
        now: DateTime<Utc>,
    ) -> Result<Appointment, BookingConflict> {
        let mut appointments = self.appointments.lock().await;

        let slot_claimed = appointments
            .iter()
            .any(|a| a.id != id && a.date == new_date && a.time_slot == new_slot && a.is_active());
        if slot_claimed {
            return Err(BookingConflict::SlotTaken);
        }

        let appointment = appointments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| {
                BookingConflict::Store(StoreError::Backend(format!(
                    "appointment {} not found",
                    id
                )))
            })?;

        appointment.date = new_date;
        appointment.time_slot = new_slot.to_string();
        appointment.rescheduled_at = Some(now);
        Ok(appointment.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self
            .appointments
            .lock()
            .await
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn update(&self, appointment: &Appointment) -> Result<(), StoreError> {
        let mut appointments = self.appointments.lock().await;
        match appointments.iter_mut().find(|a| a.id == appointment.id) {
            Some(existing) => {
                *existing = appointment.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(format!(
                "appointment {} not found",
                appointment.id
            ))),
        }
    }

    async fn claimed_slots(&self, date: NaiveDate) -> Result<Vec<String>, StoreError> {
        Ok(self
            .appointments
            .lock()
            .await
            .iter()
            .filter(|a| a.date == date && a.is_active())
            .map(|a| a.time_slot.clone())
            .collect())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let mut list: Vec<Appointment> = self
            .appointments
            .lock()
            .await
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.date.cmp(&a.date).then(a.time_slot.cmp(&b.time_slot)));
        Ok(list)
    }
}

#[derive(Default)]
pub struct InMemorySettingsStore {
    pricing: RwLock<Option<PricingTable>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn load_pricing(&self) -> Result<Option<PricingTable>, StoreError> {
        Ok(self.pricing.read().await.clone())
    }

    async fn save_pricing(&self, table: &PricingTable) -> Result<(), StoreError> {
        *self.pricing.write().await = Some(table.clone());
        Ok(())
    }
}
