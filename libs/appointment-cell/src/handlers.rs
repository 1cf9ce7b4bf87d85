use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};

use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{
    AppointmentError, BookAppointmentRequest, DayAvailability, MyAppointmentsQuery, PricingTable,
    RescheduleAppointmentRequest, UpdatePaymentMethodRequest, UpdateStatusRequest,
};
use crate::services::booking::AppointmentBookingService;

pub struct AppointmentState {
    pub bookings: AppointmentBookingService,
}

fn map_appointment_error(err: AppointmentError) -> AppError {
    match err {
        AppointmentError::NotFound => AppError::NotFound(err.to_string()),
        AppointmentError::AdminCannotBook
        | AppointmentError::AccountBlocked
        | AppointmentError::Unauthorized => AppError::Forbidden(err.to_string()),
        AppointmentError::SlotTaken | AppointmentError::PendingLimitReached(_) => {
            AppError::Conflict(err.to_string())
        }
        AppointmentError::MissingDateOrSlot
        | AppointmentError::PastDate
        | AppointmentError::BeyondHorizon(_)
        | AppointmentError::ClosedDay
        | AppointmentError::UnknownSlot
        | AppointmentError::AlreadyCancelled
        | AppointmentError::CompletedAppointment
        | AppointmentError::CutoffPassed(_)
        | AppointmentError::InvalidStatus(_) => AppError::BadRequest(err.to_string()),
        AppointmentError::Database(msg) => AppError::Database(msg),
    }
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_pricing(State(state): State<Arc<AppointmentState>>) -> Json<Value> {
    Json(json!({
        "success": true,
        "pricing": state.bookings.pricing_table()
    }))
}

#[axum::debug_handler]
pub async fn get_slots(
    State(state): State<Arc<AppointmentState>>,
    Path(date): Path<String>,
) -> Result<Json<Value>, AppError> {
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest("Invalid date".to_string()))?;

    let availability = state
        .bookings
        .slots_for_date(date, Utc::now())
        .await
        .map_err(map_appointment_error)?;

    match availability {
        DayAvailability::Closed => Ok(Json(json!({
            "success": true,
            "slots": [],
            "message": "Clinic is closed on Sundays"
        }))),
        DayAvailability::Open(slots) => Ok(Json(json!({
            "success": true,
            "slots": slots,
            "date": date.to_string()
        }))),
    }
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let outcome = state
        .bookings
        .book(auth_user.id, request, Utc::now())
        .await
        .map_err(map_appointment_error)?;

    let appointment = &outcome.appointment;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Appointment booked successfully!",
            "appointment": {
                "id": appointment.id,
                "date": appointment.date,
                "timeSlot": appointment.time_slot,
                "painType": appointment.pain_type,
                "amount": appointment.amount,
                "status": appointment.status,
                "paymentStatus": appointment.payment_status
            },
            "amount": outcome.amount,
            "currency": outcome.currency,
            "paymentRequired": true
        })),
    ))
}

#[axum::debug_handler]
pub async fn update_payment_method(
    State(state): State<Arc<AppointmentState>>,
    Path(id): Path<uuid::Uuid>,
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<UpdatePaymentMethodRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .bookings
        .update_payment_method(auth_user.id, id, request.payment_method)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Payment method updated",
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn my_appointments(
    State(state): State<Arc<AppointmentState>>,
    Query(query): Query<MyAppointmentsQuery>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let appointments = state
        .bookings
        .my_appointments(auth_user.id, query, Utc::now())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "total": appointments.len(),
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(id): Path<uuid::Uuid>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .bookings
        .get(auth_user.id, id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(id): Path<uuid::Uuid>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    state
        .bookings
        .cancel(auth_user.id, id, Utc::now())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(id): Path<uuid::Uuid>,
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .bookings
        .reschedule(auth_user.id, id, request, Utc::now())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment rescheduled",
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn update_status(
    State(state): State<Arc<AppointmentState>>,
    Path(id): Path<uuid::Uuid>,
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .bookings
        .update_status(auth_user.id, id, request.status, Utc::now())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment status updated",
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn user_stats(
    State(state): State<Arc<AppointmentState>>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let stats = state
        .bookings
        .user_stats(auth_user.id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "stats": stats
    })))
}

// ==============================================================================
// ADMIN PRICING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_pricing_settings(
    State(state): State<Arc<AppointmentState>>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let pricing = state
        .bookings
        .pricing_for_admin(auth_user.id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "pricing": pricing
    })))
}

#[derive(Debug, serde::Deserialize)]
pub struct UpdatePricingRequest {
    pub pricing: PricingTable,
}

#[axum::debug_handler]
pub async fn update_pricing_settings(
    State(state): State<Arc<AppointmentState>>,
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<UpdatePricingRequest>,
) -> Result<Json<Value>, AppError> {
    let pricing = state
        .bookings
        .update_pricing(auth_user.id, request.pricing)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Pricing updated successfully",
        "pricing": pricing
    })))
}
