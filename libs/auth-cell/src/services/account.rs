use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use notification_cell::models::{ChannelPreference, Contact};
use notification_cell::services::dispatcher::NotificationDispatcher;
use notification_cell::services::templates::Templates;
use shared_utils::jwt::issue_token;

use crate::models::{AuthError, OtpPurpose, User, UserProfile};
use crate::services::otp::OtpService;
use crate::services::phone::{is_valid_email, is_valid_indian_phone, normalize_phone};
use crate::store::UserStore;

const MIN_PASSWORD_LEN: usize = 8;
const MIN_NAME_LEN: usize = 2;

pub struct AccountService {
    users: Arc<dyn UserStore>,
    otps: Arc<OtpService>,
    dispatcher: Arc<NotificationDispatcher>,
    templates: Templates,
    admin_phone: String,
    jwt_secret: String,
}

pub struct RegistrationRequest {
    pub phone: String,
    pub otp: String,
    pub name: String,
    pub password: String,
    pub email: Option<String>,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserStore>,
        otps: Arc<OtpService>,
        dispatcher: Arc<NotificationDispatcher>,
        templates: Templates,
        admin_phone: String,
        jwt_secret: String,
    ) -> Self {
        Self {
            users,
            otps,
            dispatcher,
            templates,
            admin_phone,
            jwt_secret,
        }
    }

    /// Complete registration: a valid registration OTP turns into a verified
    /// account and a session token.
    pub async fn register(
        &self,
        request: RegistrationRequest,
        now: DateTime<Utc>,
    ) -> Result<(UserProfile, String), AuthError> {
        let phone = normalize_phone(&request.phone);

        self.otps
            .verify(&phone, &request.otp, OtpPurpose::Registration, now)
            .await?;

        let name = request.name.trim().to_string();
        if name.len() < MIN_NAME_LEN {
            return Err(AuthError::Validation(
                "Name must be at least 2 characters long".to_string(),
            ));
        }
        if request.password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(
                "Password must be at least 8 characters long".to_string(),
            ));
        }

        let email = match request.email.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                let email = raw.to_lowercase();
                if !is_valid_email(&email) {
                    return Err(AuthError::Validation(
                        "Please enter a valid email address".to_string(),
                    ));
                }
                if self.users.find_by_email(&email).await?.is_some() {
                    return Err(AuthError::EmailAlreadyRegistered);
                }
                Some(email)
            }
            _ => None,
        };

        let existing = self.users.find_by_phone(&phone).await?;
        if matches!(&existing, Some(user) if user.is_verified) {
            return Err(AuthError::PhoneAlreadyRegistered);
        }

        let password_hash = hash_password(&request.password)?;
        let is_admin = phone == self.admin_phone;

        let user = match existing {
            // A previous registration stalled before verification; take the
            // record over rather than conflicting with it.
            Some(mut user) => {
                user.name = name;
                user.email = email;
                user.password_hash = password_hash;
                user.is_admin = is_admin;
                user.is_verified = true;
                user.is_blocked = false;
                self.users.update(&user).await?;
                user
            }
            None => {
                let user = User {
                    id: Uuid::new_v4(),
                    name,
                    phone: phone.clone(),
                    email,
                    password_hash,
                    is_verified: true,
                    is_blocked: false,
                    is_admin,
                    last_login: None,
                    password_changed_at: None,
                    created_at: now,
                };
                self.users.insert(&user).await?;
                user
            }
        };

        self.otps.consume(&phone, None).await?;

        let token =
            issue_token(user.id, &self.jwt_secret).map_err(AuthError::Internal)?;

        if user.email.is_some() {
            self.send_email(&user, self.templates.welcome(&user.name));
        }

        info!("User registered: {} (admin: {})", user.id, user.is_admin);
        Ok((UserProfile::from(&user), token))
    }

    /// Login with phone number or email plus password.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<(UserProfile, String), AuthError> {
        let identifier = identifier.trim();

        let user = if identifier.contains('@') {
            let email = identifier.to_lowercase();
            if !is_valid_email(&email) {
                return Err(AuthError::Validation(
                    "Please enter a valid email address".to_string(),
                ));
            }
            self.users.find_by_email(&email).await?
        } else {
            let phone = normalize_phone(identifier);
            if !is_valid_indian_phone(&phone) {
                return Err(AuthError::Validation(
                    "Please enter a valid phone number".to_string(),
                ));
            }
            self.users.find_by_phone(&phone).await?
        };

        let mut user = user.ok_or(AuthError::InvalidCredentials)?;

        if !user.is_verified {
            return Err(AuthError::AccountNotVerified);
        }
        if user.is_blocked {
            return Err(AuthError::AccountBlocked(self.admin_phone.clone()));
        }
        if !verify_password(password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        user.last_login = Some(now);
        self.users.update(&user).await?;

        let token =
            issue_token(user.id, &self.jwt_secret).map_err(AuthError::Internal)?;

        Ok((UserProfile::from(&user), token))
    }

    /// Finish a password reset started with a password-reset OTP.
    pub async fn reset_password(
        &self,
        raw_phone: &str,
        otp: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let phone = normalize_phone(raw_phone);

        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(
                "Password must be at least 8 characters long".to_string(),
            ));
        }

        self.otps
            .verify(&phone, otp, OtpPurpose::PasswordReset, now)
            .await?;

        let mut user = self
            .users
            .find_by_phone(&phone)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if verify_password(new_password, &user.password_hash) {
            return Err(AuthError::SamePassword);
        }

        user.password_hash = hash_password(new_password)?;
        user.password_changed_at = Some(now);
        self.users.update(&user).await?;

        self.otps
            .consume(&phone, Some(OtpPurpose::PasswordReset))
            .await?;

        self.send_email(&user, self.templates.password_changed(&user.name));

        info!("Password reset for user {}", user.id);
        Ok(())
    }

    /// Change password for a logged-in user.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(
                "New password must be at least 8 characters long".to_string(),
            ));
        }

        let mut user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !verify_password(current_password, &user.password_hash) {
            return Err(AuthError::WrongPassword);
        }
        if current_password == new_password {
            return Err(AuthError::Validation(
                "New password must be different from current password".to_string(),
            ));
        }

        user.password_hash = hash_password(new_password)?;
        user.password_changed_at = Some(now);
        self.users.update(&user).await?;

        self.send_email(&user, self.templates.password_changed(&user.name));

        Ok(())
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserProfile, AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        Ok(UserProfile::from(&user))
    }

    /// Update name and/or email. An explicitly empty email removes the
    /// address.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        name: Option<String>,
        email: Option<String>,
    ) -> Result<UserProfile, AuthError> {
        let mut user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if let Some(name) = name {
            let trimmed = name.trim().to_string();
            if trimmed.len() < MIN_NAME_LEN {
                return Err(AuthError::Validation(
                    "Name must be at least 2 characters long".to_string(),
                ));
            }
            user.name = trimmed;
        }

        if let Some(email) = email {
            if email.is_empty() {
                user.email = None;
            } else {
                let email = email.trim().to_lowercase();
                if !is_valid_email(&email) {
                    return Err(AuthError::Validation(
                        "Please enter a valid email address".to_string(),
                    ));
                }
                if let Some(existing) = self.users.find_by_email(&email).await? {
                    if existing.id != user.id {
                        return Err(AuthError::EmailAlreadyRegistered);
                    }
                }
                user.email = Some(email);
            }
        }

        self.users.update(&user).await?;
        Ok(UserProfile::from(&user))
    }

    fn send_email(&self, user: &User, notice: notification_cell::models::Notice) {
        let contact = Contact {
            name: user.name.clone(),
            phone: None,
            email: user.email.clone(),
        };
        let dispatcher = Arc::clone(&self.dispatcher);

        tokio::spawn(async move {
            dispatcher
                .dispatch(&contact, ChannelPreference::EmailFirst, &notice)
                .await;
        });
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trips() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }
}
