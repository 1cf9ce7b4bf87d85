use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{CreateOrderRequest, PaymentError, VerifyPaymentRequest};
use crate::services::orders::PaymentService;

pub struct PaymentState {
    pub payments: PaymentService,
}

fn map_payment_error(err: PaymentError) -> AppError {
    match err {
        PaymentError::AppointmentNotFound | PaymentError::PaymentNotFound => {
            AppError::NotFound(err.to_string())
        }
        PaymentError::AlreadyPaid | PaymentError::InvalidSignature => {
            AppError::BadRequest(err.to_string())
        }
        PaymentError::AdminOnly => AppError::Forbidden(err.to_string()),
        PaymentError::Gateway(msg) => AppError::ExternalService(msg),
        PaymentError::Database(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn create_order(
    State(state): State<Arc<PaymentState>>,
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = request
        .appointment_id
        .ok_or_else(|| AppError::BadRequest("Appointment id is required".to_string()))?;

    let order = state
        .payments
        .create_order(auth_user.id, appointment_id, Utc::now())
        .await
        .map_err(map_payment_error)?;

    Ok(Json(json!({
        "success": true,
        "orderId": order.order_id,
        "amount": order.amount_paise,
        "currency": order.currency,
        "key": order.key_id,
        "paymentId": order.payment_id
    })))
}

#[axum::debug_handler]
pub async fn verify_payment(
    State(state): State<Arc<PaymentState>>,
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let (order_id, gateway_payment_id, signature, payment_id) = match (
        request.razorpay_order_id,
        request.razorpay_payment_id,
        request.razorpay_signature,
        request.payment_id,
    ) {
        (Some(order_id), Some(payment), Some(signature), Some(id)) => {
            (order_id, payment, signature, id)
        }
        _ => {
            return Err(AppError::BadRequest(
                "Order id, payment id and signature are required".to_string(),
            ))
        }
    };

    let payment = state
        .payments
        .verify_payment(
            auth_user.id,
            payment_id,
            &order_id,
            &gateway_payment_id,
            &signature,
            Utc::now(),
        )
        .await
        .map_err(map_payment_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Payment verified successfully",
        "payment": payment
    })))
}

#[axum::debug_handler]
pub async fn get_payment(
    State(state): State<Arc<PaymentState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let payment = state
        .payments
        .payment_for_appointment(auth_user.id, appointment_id)
        .await
        .map_err(map_payment_error)?;

    Ok(Json(json!({ "payment": payment })))
}

#[axum::debug_handler]
pub async fn all_payments(
    State(state): State<Arc<PaymentState>>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let (payments, stats) = state
        .payments
        .all_payments(auth_user.id)
        .await
        .map_err(map_payment_error)?;

    Ok(Json(json!({
        "payments": payments,
        "stats": stats
    })))
}
