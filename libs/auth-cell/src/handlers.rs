use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{
    AuthError, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, OtpPurpose,
    ResendOtpRequest, ResetPasswordRequest, SendOtpRequest, UpdateProfileRequest,
    VerifyOtpRequest,
};
use crate::services::account::{AccountService, RegistrationRequest};
use crate::services::otp::OtpService;

pub struct AuthState {
    pub accounts: AccountService,
    pub otps: Arc<OtpService>,
}

fn map_auth_error(err: AuthError) -> AppError {
    match err {
        AuthError::Validation(_)
        | AuthError::PhoneAlreadyRegistered
        | AuthError::EmailAlreadyRegistered
        | AuthError::OtpExpired
        | AuthError::OtpInvalid
        | AuthError::OtpAttemptsExceeded
        | AuthError::InvalidCredentials
        | AuthError::WrongPassword
        | AuthError::SamePassword => AppError::BadRequest(err.to_string()),
        AuthError::OtpCooldown(_) | AuthError::OtpDailyLimitReached(_) => {
            AppError::RateLimited(err.to_string())
        }
        AuthError::AccountNotVerified | AuthError::AccountBlocked(_) => {
            AppError::Forbidden(err.to_string())
        }
        AuthError::UserNotFound => AppError::NotFound(err.to_string()),
        AuthError::Database(msg) => AppError::Database(msg),
        AuthError::Internal(msg) => AppError::Internal(msg),
    }
}

#[axum::debug_handler]
pub async fn send_otp(
    State(state): State<Arc<AuthState>>,
    Json(request): Json<SendOtpRequest>,
) -> Result<Json<Value>, AppError> {
    let phone = request
        .phone
        .ok_or_else(|| AppError::BadRequest("Phone number is required".to_string()))?;

    let dispatch = state
        .otps
        .send_registration_otp(&phone, Utc::now())
        .await
        .map_err(map_auth_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "OTP sent successfully to your mobile number",
        "phone": dispatch.phone,
        "expiryTime": dispatch.expiry_minutes
    })))
}

#[axum::debug_handler]
pub async fn verify_otp(
    State(state): State<Arc<AuthState>>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let (phone, otp, name, password) = match (
        request.phone,
        request.otp,
        request.name,
        request.password,
    ) {
        (Some(phone), Some(otp), Some(name), Some(password)) => (phone, otp, name, password),
        _ => {
            return Err(AppError::BadRequest(
                "Phone, OTP, name and password are required".to_string(),
            ))
        }
    };

    let (user, token) = state
        .accounts
        .register(
            RegistrationRequest {
                phone,
                otp,
                name,
                password,
                email: request.email,
            },
            Utc::now(),
        )
        .await
        .map_err(map_auth_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Registration successful!",
            "token": token,
            "user": user
        })),
    ))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<Arc<AuthState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let (identifier, password) = match (request.identifier, request.password) {
        (Some(identifier), Some(password)) => (identifier, password),
        _ => {
            return Err(AppError::BadRequest(
                "Please enter your phone number/email and password".to_string(),
            ))
        }
    };

    let (user, token) = state
        .accounts
        .login(&identifier, &password, Utc::now())
        .await
        .map_err(map_auth_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Login successful!",
        "token": token,
        "user": user
    })))
}

#[axum::debug_handler]
pub async fn forgot_password(
    State(state): State<Arc<AuthState>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    let phone = request
        .phone
        .ok_or_else(|| AppError::BadRequest("Phone number is required".to_string()))?;

    let dispatch = state
        .otps
        .send_password_reset_otp(&phone, Utc::now())
        .await
        .map_err(map_auth_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "OTP sent successfully for password reset",
        "phone": dispatch.phone,
        "expiryTime": dispatch.expiry_minutes
    })))
}

#[axum::debug_handler]
pub async fn reset_password(
    State(state): State<Arc<AuthState>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    let (phone, otp, new_password) = match (request.phone, request.otp, request.new_password) {
        (Some(phone), Some(otp), Some(new_password)) => (phone, otp, new_password),
        _ => {
            return Err(AppError::BadRequest(
                "Phone, OTP and new password are required".to_string(),
            ))
        }
    };

    state
        .accounts
        .reset_password(&phone, &otp, &new_password, Utc::now())
        .await
        .map_err(map_auth_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Password reset successfully. You can now login with your new password."
    })))
}

#[axum::debug_handler]
pub async fn resend_otp(
    State(state): State<Arc<AuthState>>,
    Json(request): Json<ResendOtpRequest>,
) -> Result<Json<Value>, AppError> {
    let phone = request
        .phone
        .ok_or_else(|| AppError::BadRequest("Phone number is required".to_string()))?;
    let purpose = request.purpose.unwrap_or(OtpPurpose::Registration);

    let dispatch = state
        .otps
        .resend(&phone, purpose, Utc::now())
        .await
        .map_err(map_auth_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "OTP resent successfully",
        "phone": dispatch.phone,
        "expiryTime": dispatch.expiry_minutes
    })))
}

#[axum::debug_handler]
pub async fn me(
    State(state): State<Arc<AuthState>>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let user = state
        .accounts
        .profile(auth_user.id)
        .await
        .map_err(map_auth_error)?;

    Ok(Json(json!({
        "success": true,
        "user": user
    })))
}

#[axum::debug_handler]
pub async fn update_profile(
    State(state): State<Arc<AuthState>>,
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let user = state
        .accounts
        .update_profile(auth_user.id, request.name, request.email)
        .await
        .map_err(map_auth_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Profile updated successfully",
        "user": user
    })))
}

#[axum::debug_handler]
pub async fn change_password(
    State(state): State<Arc<AuthState>>,
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    let (current_password, new_password) =
        match (request.current_password, request.new_password) {
            (Some(current), Some(new)) => (current, new),
            _ => {
                return Err(AppError::BadRequest(
                    "Current password and new password are required".to_string(),
                ))
            }
        };

    state
        .accounts
        .change_password(auth_user.id, &current_password, &new_password, Utc::now())
        .await
        .map_err(map_auth_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Password changed successfully"
    })))
}

#[axum::debug_handler]
pub async fn logout(Extension(_auth_user): Extension<AuthUser>) -> Json<Value> {
    // Tokens are stateless; the client discards its copy
    Json(json!({
        "success": true,
        "message": "Logged out successfully"
    }))
}
