use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use shared_database::StoreError;

// ==============================================================================
// CORE ACCOUNT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Normalized `+91` number; account identity.
    pub phone: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub is_verified: bool,
    pub is_blocked: bool,
    pub is_admin: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The shape of a user returned to clients; never includes the credential.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub is_admin: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            phone: user.phone.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

// ==============================================================================
// OTP MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    Registration,
    PasswordReset,
}

impl fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OtpPurpose::Registration => write!(f, "registration"),
            OtpPurpose::PasswordReset => write!(f, "password_reset"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OtpDeliveryMethod {
    Sms,
    Email,
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpRecord {
    pub id: Uuid,
    pub phone: String,
    pub email: Option<String>,
    pub code: String,
    pub purpose: OtpPurpose,
    pub method: OtpDeliveryMethod,
    pub expires_at: DateTime<Utc>,
    pub attempts: i64,
    pub created_at: DateTime<Utc>,
}

/// What the send/resend operations report back to the client.
#[derive(Debug, Clone)]
pub struct OtpDispatch {
    pub phone: String,
    pub expiry_minutes: i64,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub phone: Option<String>,
    pub otp: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub identifier: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub phone: Option<String>,
    pub otp: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResendOtpRequest {
    pub phone: Option<String>,
    #[serde(rename = "type")]
    pub purpose: Option<OtpPurpose>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    /// `Some("")` removes the address; absent leaves it untouched.
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("This phone number is already registered. Please login instead.")]
    PhoneAlreadyRegistered,

    #[error("This email is already registered with another account")]
    EmailAlreadyRegistered,

    #[error("OTP has expired. Please request a new one.")]
    OtpExpired,

    #[error("Invalid OTP. Please check and try again.")]
    OtpInvalid,

    #[error("Too many incorrect attempts. Please request a new OTP.")]
    OtpAttemptsExceeded,

    #[error("Please wait {0} seconds before requesting a new OTP")]
    OtpCooldown(i64),

    #[error("Maximum OTP limit reached for today ({0} OTPs). Please try again tomorrow.")]
    OtpDailyLimitReached(i64),

    #[error("Invalid credentials. Please check your phone/email and password.")]
    InvalidCredentials,

    #[error("Your account is not verified. Please complete registration.")]
    AccountNotVerified,

    #[error("Your account has been blocked. Please contact admin: {0}")]
    AccountBlocked(String),

    #[error("No account found with this phone number")]
    UserNotFound,

    #[error("Current password is incorrect")]
    WrongPassword,

    #[error("New password cannot be the same as your current password")]
    SamePassword,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(field) if field.contains("email") => {
                AuthError::EmailAlreadyRegistered
            }
            StoreError::Duplicate(_) => AuthError::PhoneAlreadyRegistered,
            StoreError::Backend(msg) => AuthError::Database(msg),
        }
    }
}
