use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConsultationType {
    Regular,
    FollowUp,
    Emergency,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Online,
    Clinic,
    Cash,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Calendar date only; the clock position lives in the slot.
    pub date: NaiveDate,
    /// Label drawn from the generated slot sequence.
    pub time_slot: String,
    pub pain_type: String,
    pub consultation_type: ConsultationType,
    pub amount: i64,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub payment_id: Option<Uuid>,
    pub reason: String,
    pub status: AppointmentStatus,
    pub notes: String,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub rescheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    /// Active appointments hold their slot and count against the pending cap.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            AppointmentStatus::Pending | AppointmentStatus::Confirmed
        )
    }
}

// ==============================================================================
// SLOT MODELS
// ==============================================================================

/// A bookable time window, with structured start/end carried from generation
/// so nothing ever has to parse the display label back into a clock time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub label: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub lunch_break: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SlotAvailability {
    pub time: String,
    pub is_booked: bool,
}

/// A closed day is a distinct outcome from a fully booked one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayAvailability {
    Closed,
    Open(Vec<SlotAvailability>),
}

// ==============================================================================
// PRICING MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationPricing {
    pub regular: i64,
    pub follow_up: i64,
    pub emergency: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PricingTable {
    pub consultation: ConsultationPricing,
    /// Pain-type specific treatment prices; an exact match beats the
    /// consultation-type price.
    pub treatments: BTreeMap<String, i64>,
    pub currency: String,
}

impl Default for PricingTable {
    fn default() -> Self {
        let treatments = BTreeMap::from([
            ("Back Pain".to_string(), 600),
            ("Neck Pain".to_string(), 550),
            ("Knee Pain".to_string(), 600),
            ("Shoulder Pain".to_string(), 600),
            ("Sports Injury".to_string(), 700),
            ("Other".to_string(), 500),
        ]);

        Self {
            consultation: ConsultationPricing {
                regular: 500,
                follow_up: 350,
                emergency: 800,
            },
            treatments,
            currency: "INR".to_string(),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookAppointmentRequest {
    pub date: Option<NaiveDate>,
    pub time_slot: Option<String>,
    pub pain_type: Option<String>,
    pub consultation_type: Option<ConsultationType>,
    pub reason: Option<String>,
    /// Overrides for where the confirmation goes; account contacts otherwise.
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleAppointmentRequest {
    pub new_date: Option<NaiveDate>,
    pub new_time_slot: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentMethodRequest {
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Deserialize)]
pub struct MyAppointmentsQuery {
    pub status: Option<AppointmentStatus>,
    pub upcoming: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct BookingOutcome {
    pub appointment: Appointment,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAppointmentStats {
    pub total: i64,
    pub pending: i64,
    pub confirmed: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub total_spent: i64,
    pub currency: String,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Admin cannot book appointments")]
    AdminCannotBook,

    #[error("Your account is blocked")]
    AccountBlocked,

    #[error("Date and time slot required")]
    MissingDateOrSlot,

    #[error("Cannot book past dates")]
    PastDate,

    #[error("Bookings only {0} days in advance")]
    BeyondHorizon(i64),

    #[error("Closed on Sundays")]
    ClosedDay,

    #[error("Unknown time slot")]
    UnknownSlot,

    #[error("Slot already booked")]
    SlotTaken,

    #[error("Maximum {0} pending appointments allowed")]
    PendingLimitReached(u32),

    #[error("Already cancelled")]
    AlreadyCancelled,

    #[error("Cannot cancel completed appointment")]
    CompletedAppointment,

    #[error("Appointments can only be changed at least {0} hours before the slot")]
    CutoffPassed(i64),

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatus(AppointmentStatus),

    #[error("Not authorized")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(String),
}
