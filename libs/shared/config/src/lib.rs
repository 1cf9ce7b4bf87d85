use std::env;
use tracing::warn;

/// Application configuration assembled once at startup and passed explicitly
/// to every cell. Nothing in the codebase reads the environment after this.
#[derive(Debug, Clone)]
pub struct ClinicConfig {
    // Document store (MongoDB Atlas Data API)
    pub data_api_url: String,
    pub data_api_key: String,
    pub data_source: String,
    pub database_name: String,

    // Auth
    pub jwt_secret: String,

    // Clinic identity
    pub clinic_name: String,
    pub admin_phone: String,
    pub clinic_utc_offset_minutes: i32,

    // Booking rules
    pub max_pending_appointments: u32,
    pub advance_booking_days: i64,
    pub same_day_cutoff_minutes: i64,
    pub cancellation_cutoff_hours: i64,

    // OTP limits
    pub max_otp_per_day: i64,
    pub otp_validity_minutes: i64,
    pub otp_resend_cooldown_seconds: i64,

    // Payment gateway
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,

    // SMS gateway
    pub sms_gateway_url: String,
    pub sms_gateway_username: String,
    pub sms_gateway_password: String,

    // SMTP
    pub smtp_host: String,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_from: String,
}

/// Booking-rule subset handed to the appointment cell.
#[derive(Debug, Clone)]
pub struct BookingRules {
    pub max_pending_appointments: u32,
    pub advance_booking_days: i64,
    pub same_day_cutoff_minutes: i64,
    pub cancellation_cutoff_hours: i64,
    pub clinic_utc_offset_minutes: i32,
}

/// OTP-limit subset handed to the auth cell.
#[derive(Debug, Clone)]
pub struct OtpPolicy {
    pub max_per_day: i64,
    pub validity_minutes: i64,
    pub resend_cooldown_seconds: i64,
}

fn env_string(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", key);
        String::new()
    })
}

fn env_string_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_number<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl ClinicConfig {
    pub fn from_env() -> Self {
        let config = Self {
            data_api_url: env_string("DATA_API_URL"),
            data_api_key: env_string("DATA_API_KEY"),
            data_source: env_string_or("DATA_API_SOURCE", "Cluster0"),
            database_name: env_string_or("DATA_API_DATABASE", "clinic"),

            jwt_secret: env_string("JWT_SECRET"),

            clinic_name: env_string_or("CLINIC_NAME", "CityCare Physiotherapy"),
            admin_phone: env_string("ADMIN_PHONE"),
            // IST (+05:30) unless the deployment says otherwise
            clinic_utc_offset_minutes: env_number("CLINIC_UTC_OFFSET_MINUTES", 330),

            max_pending_appointments: env_number("MAX_PENDING_APPOINTMENTS", 3),
            advance_booking_days: env_number("ADVANCE_BOOKING_DAYS", 7),
            same_day_cutoff_minutes: env_number("SAME_DAY_CUTOFF_MINUTES", 30),
            cancellation_cutoff_hours: env_number("CANCELLATION_CUTOFF_HOURS", 2),

            max_otp_per_day: env_number("MAX_OTP_PER_DAY", 5),
            otp_validity_minutes: env_number("OTP_VALIDITY_MINUTES", 5),
            otp_resend_cooldown_seconds: env_number("OTP_RESEND_COOLDOWN_SECONDS", 60),

            razorpay_key_id: env_string("RAZORPAY_KEY_ID"),
            razorpay_key_secret: env_string("RAZORPAY_KEY_SECRET"),

            sms_gateway_url: env_string_or("SMS_GATEWAY_URL", "https://api.sms-gate.app/3rdparty/v1"),
            sms_gateway_username: env_string("SMS_GATEWAY_USERNAME"),
            sms_gateway_password: env_string("SMS_GATEWAY_PASSWORD"),

            smtp_host: env_string("SMTP_HOST"),
            smtp_username: env_string("SMTP_USERNAME"),
            smtp_password: env_string("SMTP_PASSWORD"),
            smtp_from: env_string("SMTP_FROM"),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.jwt_secret.is_empty()
    }

    pub fn is_store_configured(&self) -> bool {
        !self.data_api_url.is_empty() && !self.data_api_key.is_empty()
    }

    pub fn is_payment_configured(&self) -> bool {
        !self.razorpay_key_id.is_empty() && !self.razorpay_key_secret.is_empty()
    }

    pub fn is_sms_configured(&self) -> bool {
        !self.sms_gateway_username.is_empty() && !self.sms_gateway_password.is_empty()
    }

    pub fn is_smtp_configured(&self) -> bool {
        !self.smtp_host.is_empty() && !self.smtp_from.is_empty()
    }

    pub fn booking_rules(&self) -> BookingRules {
        BookingRules {
            max_pending_appointments: self.max_pending_appointments,
            advance_booking_days: self.advance_booking_days,
            same_day_cutoff_minutes: self.same_day_cutoff_minutes,
            cancellation_cutoff_hours: self.cancellation_cutoff_hours,
            clinic_utc_offset_minutes: self.clinic_utc_offset_minutes,
        }
    }

    pub fn otp_policy(&self) -> OtpPolicy {
        OtpPolicy {
            max_per_day: self.max_otp_per_day,
            validity_minutes: self.otp_validity_minutes,
            resend_cooldown_seconds: self.otp_resend_cooldown_seconds,
        }
    }
}
