use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use tracing::{debug, info};
use uuid::Uuid;

use auth_cell::models::User;
use auth_cell::store::UserStore;
use notification_cell::models::{ChannelPreference, Contact, Notice};
use notification_cell::services::dispatcher::NotificationDispatcher;
use notification_cell::services::templates::Templates;
use shared_config::BookingRules;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, BookingOutcome,
    ConsultationType, DayAvailability, MyAppointmentsQuery, PaymentMethod, PaymentStatus,
    PricingTable, RescheduleAppointmentRequest, UserAppointmentStats,
};
use crate::services::availability::AvailabilityResolver;
use crate::services::conflict::BookingConflictGuard;
use crate::services::pricing::PricingResolver;
use crate::services::slots::find_slot;
use crate::store::{AppointmentStore, SettingsStore};

/// Owns the appointment lifecycle: booking validations in order, the state
/// machine pending -> confirmed -> completed / -> cancelled, reschedules,
/// and the fire-and-forget notifications around each transition.
pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    settings: Arc<dyn SettingsStore>,
    users: Arc<dyn UserStore>,
    guard: BookingConflictGuard,
    availability: AvailabilityResolver,
    pricing: Arc<PricingResolver>,
    dispatcher: Arc<NotificationDispatcher>,
    templates: Templates,
    rules: BookingRules,
}

impl AppointmentBookingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        settings: Arc<dyn SettingsStore>,
        users: Arc<dyn UserStore>,
        pricing: Arc<PricingResolver>,
        dispatcher: Arc<NotificationDispatcher>,
        templates: Templates,
        rules: BookingRules,
    ) -> Self {
        let guard = BookingConflictGuard::new(Arc::clone(&store), rules.max_pending_appointments);
        let availability = AvailabilityResolver::new(rules.clone());

        Self {
            store,
            settings,
            users,
            guard,
            availability,
            pricing,
            dispatcher,
            templates,
            rules,
        }
    }

    // ==========================================================================
    // AVAILABILITY
    // ==========================================================================

    pub async fn slots_for_date(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<DayAvailability, AppointmentError> {
        if date.weekday() == Weekday::Sun {
            return Ok(DayAvailability::Closed);
        }

        let claimed: HashSet<String> = self
            .store
            .claimed_slots(date)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?
            .into_iter()
            .collect();

        Ok(self.availability.resolve(date, &claimed, now))
    }

    // ==========================================================================
    // BOOKING
    // ==========================================================================

    pub async fn book(
        &self,
        actor: Uuid,
        request: BookAppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<BookingOutcome, AppointmentError> {
        let user = self.fetch_user(actor).await?;
        if user.is_admin {
            return Err(AppointmentError::AdminCannotBook);
        }
        if user.is_blocked {
            return Err(AppointmentError::AccountBlocked);
        }

        let (date, label) = match (request.date, request.time_slot.as_deref()) {
            (Some(date), Some(label)) => (date, label),
            _ => return Err(AppointmentError::MissingDateOrSlot),
        };

        self.validate_bookable_date(date, now)?;

        let slot = find_slot(label)
            .filter(|slot| !slot.lunch_break)
            .ok_or(AppointmentError::UnknownSlot)?;

        let pain_type = request.pain_type.unwrap_or_else(|| "Other".to_string());
        let consultation_type = request
            .consultation_type
            .unwrap_or(ConsultationType::Regular);
        let amount = self
            .pricing
            .consultation_fee(Some(&pain_type), Some(consultation_type));

        let appointment = Appointment {
            id: Uuid::new_v4(),
            user_id: actor,
            date,
            time_slot: slot.label.clone(),
            pain_type,
            consultation_type,
            amount,
            payment_status: PaymentStatus::Pending,
            payment_method: PaymentMethod::Pending,
            payment_id: None,
            reason: request.reason.unwrap_or_default(),
            status: AppointmentStatus::Pending,
            notes: String::new(),
            cancelled_at: None,
            cancelled_by: None,
            rescheduled_at: None,
            created_at: now,
        };

        let appointment = self.guard.reserve(appointment).await?;

        info!(
            "Appointment {} booked by {} for {} {}",
            appointment.id, actor, appointment.date, appointment.time_slot
        );

        let contact = Contact {
            name: user.name.clone(),
            phone: request.phone.or(Some(user.phone.clone())),
            email: request.email.or(user.email.clone()),
        };
        self.notify(
            contact,
            self.templates.booking_confirmation(
                &user.name,
                &format_date(appointment.date),
                &appointment.time_slot,
                &appointment.pain_type,
            ),
        );

        Ok(BookingOutcome {
            amount: appointment.amount,
            currency: self.pricing.currency(),
            appointment,
        })
    }

    // ==========================================================================
    // LIFECYCLE TRANSITIONS
    // ==========================================================================

    pub async fn cancel(
        &self,
        actor: Uuid,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let user = self.fetch_user(actor).await?;
        let mut appointment = self.fetch_appointment(id).await?;

        if appointment.user_id != actor && !user.is_admin {
            return Err(AppointmentError::Unauthorized);
        }

        match appointment.status {
            AppointmentStatus::Cancelled => return Err(AppointmentError::AlreadyCancelled),
            AppointmentStatus::Completed => return Err(AppointmentError::CompletedAppointment),
            _ => {}
        }

        // Owners must give notice; administrators may cancel at any time
        if !user.is_admin {
            if let Some(slot) = find_slot(&appointment.time_slot) {
                let start = self.availability.slot_start(appointment.date, &slot);
                if start - now < Duration::hours(self.rules.cancellation_cutoff_hours) {
                    return Err(AppointmentError::CutoffPassed(
                        self.rules.cancellation_cutoff_hours,
                    ));
                }
            }
        }

        appointment.status = AppointmentStatus::Cancelled;
        appointment.cancelled_at = Some(now);
        appointment.cancelled_by = Some(actor);

        self.store
            .update(&appointment)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        info!("Appointment {} cancelled by {}", id, actor);

        let owner = if appointment.user_id == actor {
            user
        } else {
            self.fetch_user(appointment.user_id).await?
        };
        self.notify(
            contact_for(&owner),
            self.templates.cancellation_notice(
                &owner.name,
                &format_date(appointment.date),
                &appointment.time_slot,
            ),
        );

        Ok(appointment)
    }

    pub async fn reschedule(
        &self,
        actor: Uuid,
        id: Uuid,
        request: RescheduleAppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let user = self.fetch_user(actor).await?;
        let appointment = self.fetch_appointment(id).await?;

        if appointment.user_id != actor && !user.is_admin {
            return Err(AppointmentError::Unauthorized);
        }
        if !appointment.is_active() {
            return Err(AppointmentError::InvalidStatus(appointment.status));
        }

        let (new_date, new_label) = match (request.new_date, request.new_time_slot.as_deref()) {
            (Some(date), Some(label)) => (date, label),
            _ => return Err(AppointmentError::MissingDateOrSlot),
        };

        self.validate_bookable_date(new_date, now)?;

        let slot = find_slot(new_label)
            .filter(|slot| !slot.lunch_break)
            .ok_or(AppointmentError::UnknownSlot)?;

        // The slot-conflict check excludes the appointment's own claim
        let updated = self.guard.move_slot(id, new_date, &slot.label, now).await?;

        info!(
            "Appointment {} rescheduled to {} {}",
            id, updated.date, updated.time_slot
        );

        let owner = if updated.user_id == actor {
            user
        } else {
            self.fetch_user(updated.user_id).await?
        };
        self.notify(
            contact_for(&owner),
            self.templates.booking_confirmation(
                &owner.name,
                &format_date(updated.date),
                &updated.time_slot,
                &updated.pain_type,
            ),
        );

        Ok(updated)
    }

    /// Administrator-driven progression through the state machine
    /// (pending -> confirmed -> completed). Cancellation goes through
    /// `cancel` so the audit fields are stamped.
    pub async fn update_status(
        &self,
        actor: Uuid,
        id: Uuid,
        new_status: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        self.ensure_admin(actor).await?;

        if new_status == AppointmentStatus::Cancelled {
            return self.cancel(actor, id, now).await;
        }

        let mut appointment = self.fetch_appointment(id).await?;
        if !allowed_transition(appointment.status, new_status) {
            return Err(AppointmentError::InvalidStatus(appointment.status));
        }

        appointment.status = new_status;
        self.store
            .update(&appointment)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        info!("Appointment {} moved to {}", id, new_status);
        Ok(appointment)
    }

    pub async fn update_payment_method(
        &self,
        actor: Uuid,
        id: Uuid,
        payment_method: PaymentMethod,
    ) -> Result<Appointment, AppointmentError> {
        let mut appointment = self.fetch_appointment(id).await?;
        if appointment.user_id != actor {
            return Err(AppointmentError::Unauthorized);
        }

        appointment.payment_method = payment_method;
        if payment_method == PaymentMethod::Clinic {
            // Settle at the desk: any online attempt no longer applies
            appointment.payment_status = PaymentStatus::Pending;
        }

        self.store
            .update(&appointment)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        Ok(appointment)
    }

    // ==========================================================================
    // QUERIES
    // ==========================================================================

    pub async fn my_appointments(
        &self,
        actor: Uuid,
        query: MyAppointmentsQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut appointments = self
            .store
            .list_for_user(actor)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        if let Some(status) = query.status {
            appointments.retain(|a| a.status == status);
        }
        if query.upcoming.unwrap_or(false) {
            let today = self.availability.clinic_today(now);
            appointments.retain(|a| a.date >= today && a.is_active());
        }

        Ok(appointments)
    }

    pub async fn get(&self, actor: Uuid, id: Uuid) -> Result<Appointment, AppointmentError> {
        let user = self.fetch_user(actor).await?;
        let appointment = self.fetch_appointment(id).await?;

        if appointment.user_id != actor && !user.is_admin {
            return Err(AppointmentError::Unauthorized);
        }
        Ok(appointment)
    }

    pub async fn user_stats(&self, actor: Uuid) -> Result<UserAppointmentStats, AppointmentError> {
        let appointments = self
            .store
            .list_for_user(actor)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let count = |status: AppointmentStatus| {
            appointments.iter().filter(|a| a.status == status).count() as i64
        };
        let total_spent = appointments
            .iter()
            .filter(|a| {
                a.status == AppointmentStatus::Completed
                    && a.payment_status == PaymentStatus::Paid
            })
            .map(|a| a.amount)
            .sum();

        Ok(UserAppointmentStats {
            total: appointments.len() as i64,
            pending: count(AppointmentStatus::Pending),
            confirmed: count(AppointmentStatus::Confirmed),
            completed: count(AppointmentStatus::Completed),
            cancelled: count(AppointmentStatus::Cancelled),
            total_spent,
            currency: self.pricing.currency(),
        })
    }

    // ==========================================================================
    // PRICING ADMINISTRATION
    // ==========================================================================

    pub fn pricing_table(&self) -> PricingTable {
        self.pricing.snapshot()
    }

    pub async fn pricing_for_admin(&self, actor: Uuid) -> Result<PricingTable, AppointmentError> {
        self.ensure_admin(actor).await?;
        Ok(self.pricing.snapshot())
    }

    pub async fn update_pricing(
        &self,
        actor: Uuid,
        table: PricingTable,
    ) -> Result<PricingTable, AppointmentError> {
        self.ensure_admin(actor).await?;

        self.settings
            .save_pricing(&table)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;
        self.pricing.replace(table.clone());

        info!("Pricing table updated by {}", actor);
        Ok(table)
    }

    // ==========================================================================
    // PRIVATE HELPERS
    // ==========================================================================

    fn validate_bookable_date(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        let today = self.availability.clinic_today(now);

        if date < today {
            return Err(AppointmentError::PastDate);
        }
        if date > today + Duration::days(self.rules.advance_booking_days) {
            return Err(AppointmentError::BeyondHorizon(
                self.rules.advance_booking_days,
            ));
        }
        if date.weekday() == Weekday::Sun {
            return Err(AppointmentError::ClosedDay);
        }
        Ok(())
    }

    async fn fetch_user(&self, id: Uuid) -> Result<User, AppointmentError> {
        self.users
            .find_by_id(id)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?
            .ok_or(AppointmentError::Unauthorized)
    }

    async fn fetch_appointment(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store
            .find_by_id(id)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?
            .ok_or(AppointmentError::NotFound)
    }

    async fn ensure_admin(&self, actor: Uuid) -> Result<(), AppointmentError> {
        let user = self.fetch_user(actor).await?;
        if !user.is_admin {
            return Err(AppointmentError::Unauthorized);
        }
        Ok(())
    }

    /// The response never waits on a provider: the record is already durable
    /// and delivery proceeds on its own task.
    fn notify(&self, contact: Contact, notice: Notice) {
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            let report = dispatcher
                .dispatch(&contact, ChannelPreference::PhoneFirst, &notice)
                .await;
            debug!("notification outcome: {:?}", report.outcome);
        });
    }
}

/// The lifecycle state machine; cancelled and completed are terminal.
fn allowed_transition(from: AppointmentStatus, to: AppointmentStatus) -> bool {
    matches!(
        (from, to),
        (AppointmentStatus::Pending, AppointmentStatus::Confirmed)
            | (AppointmentStatus::Confirmed, AppointmentStatus::Completed)
    )
}

fn contact_for(user: &User) -> Contact {
    Contact {
        name: user.name.clone(),
        phone: Some(user.phone.clone()),
        email: user.email.clone(),
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%A, %-d %B %Y").to_string()
}
