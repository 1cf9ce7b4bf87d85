use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use notification_cell::models::{ChannelPreference, Contact};
use notification_cell::services::dispatcher::NotificationDispatcher;
use notification_cell::services::templates::Templates;
use shared_config::OtpPolicy;

use crate::models::{AuthError, OtpDeliveryMethod, OtpDispatch, OtpPurpose, OtpRecord, User};
use crate::services::phone::{is_valid_indian_phone, normalize_phone};
use crate::store::{OtpStore, UserStore};

/// A code is dead after this many wrong guesses, even if unexpired.
const MAX_VERIFY_ATTEMPTS: i64 = 5;

pub struct OtpService {
    store: Arc<dyn OtpStore>,
    users: Arc<dyn UserStore>,
    dispatcher: Arc<NotificationDispatcher>,
    templates: Templates,
    policy: OtpPolicy,
    admin_phone: String,
}

impl OtpService {
    pub fn new(
        store: Arc<dyn OtpStore>,
        users: Arc<dyn UserStore>,
        dispatcher: Arc<NotificationDispatcher>,
        templates: Templates,
        policy: OtpPolicy,
        admin_phone: String,
    ) -> Self {
        Self {
            store,
            users,
            dispatcher,
            templates,
            policy,
            admin_phone,
        }
    }

    /// First step of registration: validate the phone, enforce limits, store
    /// and deliver a fresh code.
    pub async fn send_registration_otp(
        &self,
        raw_phone: &str,
        now: DateTime<Utc>,
    ) -> Result<OtpDispatch, AuthError> {
        let phone = normalize_phone(raw_phone);
        if !is_valid_indian_phone(&phone) {
            return Err(AuthError::Validation(
                "Please enter a valid 10-digit Indian mobile number".to_string(),
            ));
        }

        self.store.delete_expired(&phone, now).await?;

        if let Some(existing) = self.users.find_by_phone(&phone).await? {
            if existing.is_verified {
                return Err(AuthError::PhoneAlreadyRegistered);
            }
        }

        self.enforce_limits(&phone, OtpPurpose::Registration, now)
            .await?;

        let record = self
            .create_record(&phone, None, OtpPurpose::Registration, OtpDeliveryMethod::Sms, now)
            .await?;

        self.deliver(record, None, ChannelPreference::PhoneFirst);

        Ok(OtpDispatch {
            phone,
            expiry_minutes: self.policy.validity_minutes,
        })
    }

    /// Password-reset variant: the account must exist and not be blocked; the
    /// code may also fall back to the account's email address.
    pub async fn send_password_reset_otp(
        &self,
        raw_phone: &str,
        now: DateTime<Utc>,
    ) -> Result<OtpDispatch, AuthError> {
        let phone = normalize_phone(raw_phone);
        if !is_valid_indian_phone(&phone) {
            return Err(AuthError::Validation(
                "Please enter a valid Indian phone number".to_string(),
            ));
        }

        let user = self
            .users
            .find_by_phone(&phone)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.is_blocked {
            return Err(AuthError::AccountBlocked(self.admin_phone.clone()));
        }

        self.store.delete_expired(&phone, now).await?;
        self.enforce_limits(&phone, OtpPurpose::PasswordReset, now)
            .await?;

        let record = self
            .create_record(
                &phone,
                user.email.clone(),
                OtpPurpose::PasswordReset,
                if user.email.is_some() {
                    OtpDeliveryMethod::Both
                } else {
                    OtpDeliveryMethod::Sms
                },
                now,
            )
            .await?;

        self.deliver(record, Some(&user), ChannelPreference::PhoneFirst);

        Ok(OtpDispatch {
            phone,
            expiry_minutes: self.policy.validity_minutes,
        })
    }

    /// Re-send a code of the given purpose, subject to the same limits.
    pub async fn resend(
        &self,
        raw_phone: &str,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> Result<OtpDispatch, AuthError> {
        let phone = normalize_phone(raw_phone);

        self.enforce_limits(&phone, purpose, now).await?;

        let record = self
            .create_record(&phone, None, purpose, OtpDeliveryMethod::Sms, now)
            .await?;

        self.deliver(record, None, ChannelPreference::PhoneFirst);

        Ok(OtpDispatch {
            phone,
            expiry_minutes: self.policy.validity_minutes,
        })
    }

    /// Check a submitted code. Distinguishes expired from wrong codes and
    /// counts wrong guesses against the newest outstanding record.
    pub async fn verify(
        &self,
        phone: &str,
        code: &str,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> Result<OtpRecord, AuthError> {
        if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(AuthError::Validation(
                "Please enter a valid 6-digit OTP".to_string(),
            ));
        }

        match self.store.find_by_code(phone, code, purpose).await? {
            Some(record) if record.expires_at <= now => Err(AuthError::OtpExpired),
            Some(record) if record.attempts >= MAX_VERIFY_ATTEMPTS => {
                Err(AuthError::OtpAttemptsExceeded)
            }
            Some(record) => {
                debug!("OTP verified for {} ({})", phone, purpose);
                Ok(record)
            }
            None => {
                if let Some(newest) = self.store.newest(phone, purpose).await? {
                    self.store.record_failed_attempt(newest.id).await?;
                }
                Err(AuthError::OtpInvalid)
            }
        }
    }

    /// Consume every outstanding code for the phone (all purposes when
    /// registration completes, reset codes only after a reset).
    pub async fn consume(
        &self,
        phone: &str,
        purpose: Option<OtpPurpose>,
    ) -> Result<(), AuthError> {
        self.store.delete_for_phone(phone, purpose).await?;
        Ok(())
    }

    async fn enforce_limits(
        &self,
        phone: &str,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let start_of_day = now.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
        let sent_today = self.store.count_created_since(phone, start_of_day).await?;
        if sent_today >= self.policy.max_per_day {
            return Err(AuthError::OtpDailyLimitReached(self.policy.max_per_day));
        }

        if let Some(recent) = self.store.newest(phone, purpose).await? {
            let elapsed = now - recent.created_at;
            if elapsed < Duration::seconds(self.policy.resend_cooldown_seconds) {
                return Err(AuthError::OtpCooldown(self.policy.resend_cooldown_seconds));
            }
        }

        Ok(())
    }

    async fn create_record(
        &self,
        phone: &str,
        email: Option<String>,
        purpose: OtpPurpose,
        method: OtpDeliveryMethod,
        now: DateTime<Utc>,
    ) -> Result<OtpRecord, AuthError> {
        let record = OtpRecord {
            id: Uuid::new_v4(),
            phone: phone.to_string(),
            email,
            code: generate_code(),
            purpose,
            method,
            expires_at: now + Duration::minutes(self.policy.validity_minutes),
            attempts: 0,
            created_at: now,
        };

        self.store.insert(&record).await?;
        info!("OTP created for {} ({})", phone, purpose);
        Ok(record)
    }

    /// Delivery never blocks or fails the request that triggered it.
    fn deliver(&self, record: OtpRecord, user: Option<&User>, preference: ChannelPreference) {
        let contact = Contact {
            name: user.map(|u| u.name.clone()).unwrap_or_else(|| record.phone.clone()),
            phone: Some(record.phone.clone()),
            email: record.email.clone(),
        };
        let notice = self
            .templates
            .otp(&record.code, self.policy.validity_minutes);
        let dispatcher = Arc::clone(&self.dispatcher);

        tokio::spawn(async move {
            dispatcher.dispatch(&contact, preference, &notice).await;
        });
    }
}

fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    rng.gen_range(100_000..1_000_000).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..64 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
