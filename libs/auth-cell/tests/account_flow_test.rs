use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};

use auth_cell::models::{AuthError, OtpPurpose};
use auth_cell::services::account::{AccountService, RegistrationRequest};
use auth_cell::services::otp::OtpService;
use auth_cell::store::{InMemoryOtpStore, InMemoryUserStore, OtpStore, UserStore};
use notification_cell::services::dispatcher::NotificationDispatcher;
use notification_cell::services::templates::Templates;
use shared_config::OtpPolicy;
use shared_utils::jwt::validate_token;

const JWT_SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";
const ADMIN_PHONE: &str = "+919999999999";
const PHONE: &str = "+919876543210";

struct Harness {
    accounts: AccountService,
    otps: Arc<OtpService>,
    otp_store: Arc<InMemoryOtpStore>,
    users: Arc<InMemoryUserStore>,
}

fn default_policy() -> OtpPolicy {
    OtpPolicy {
        max_per_day: 5,
        validity_minutes: 5,
        resend_cooldown_seconds: 60,
    }
}

fn harness(policy: OtpPolicy) -> Harness {
    let users = Arc::new(InMemoryUserStore::new());
    let otp_store = Arc::new(InMemoryOtpStore::new());
    let dispatcher = Arc::new(NotificationDispatcher::new(vec![]));
    let templates = Templates::new("Test Clinic".to_string(), ADMIN_PHONE.to_string());

    let otps = Arc::new(OtpService::new(
        otp_store.clone(),
        users.clone(),
        dispatcher.clone(),
        templates.clone(),
        policy,
        ADMIN_PHONE.to_string(),
    ));
    let accounts = AccountService::new(
        users.clone(),
        otps.clone(),
        dispatcher,
        templates,
        ADMIN_PHONE.to_string(),
        JWT_SECRET.to_string(),
    );

    Harness {
        accounts,
        otps,
        otp_store,
        users,
    }
}

async fn latest_code(harness: &Harness, phone: &str, purpose: OtpPurpose) -> String {
    harness
        .otp_store
        .newest(phone, purpose)
        .await
        .unwrap()
        .expect("an OTP should have been stored")
        .code
}

async fn register(harness: &Harness, phone: &str, password: &str) {
    let now = Utc::now();
    harness
        .otps
        .send_registration_otp(phone, now)
        .await
        .unwrap();
    let code = latest_code(harness, phone, OtpPurpose::Registration).await;

    harness
        .accounts
        .register(
            RegistrationRequest {
                phone: phone.to_string(),
                otp: code,
                name: "Asha Patel".to_string(),
                password: password.to_string(),
                email: Some("asha@example.com".to_string()),
            },
            now,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn registration_flow_creates_verified_user_with_valid_token() {
    let h = harness(default_policy());
    let now = Utc::now();

    h.otps.send_registration_otp(PHONE, now).await.unwrap();
    let code = latest_code(&h, PHONE, OtpPurpose::Registration).await;

    let (profile, token) = h
        .accounts
        .register(
            RegistrationRequest {
                phone: PHONE.to_string(),
                otp: code,
                name: "Asha Patel".to_string(),
                password: "sufficiently-long".to_string(),
                email: None,
            },
            now,
        )
        .await
        .unwrap();

    assert_eq!(profile.phone, PHONE);
    assert!(profile.is_verified);
    assert!(!profile.is_admin);

    let auth_user = validate_token(&token, JWT_SECRET).unwrap();
    assert_eq!(auth_user.id, profile.id);

    // Registration consumes every outstanding code for the phone
    assert!(h
        .otp_store
        .newest(PHONE, OtpPurpose::Registration)
        .await
        .unwrap()
        .is_none());

    // And the credentials work
    let (logged_in, _) = h
        .accounts
        .login(PHONE, "sufficiently-long", Utc::now())
        .await
        .unwrap();
    assert_eq!(logged_in.id, profile.id);
}

#[tokio::test]
async fn admin_phone_registers_as_admin() {
    let h = harness(default_policy());
    let now = Utc::now();

    h.otps
        .send_registration_otp(ADMIN_PHONE, now)
        .await
        .unwrap();
    let code = latest_code(&h, ADMIN_PHONE, OtpPurpose::Registration).await;

    let (profile, _) = h
        .accounts
        .register(
            RegistrationRequest {
                phone: ADMIN_PHONE.to_string(),
                otp: code,
                name: "Clinic Admin".to_string(),
                password: "sufficiently-long".to_string(),
                email: None,
            },
            now,
        )
        .await
        .unwrap();

    assert!(profile.is_admin);
}

#[tokio::test]
async fn second_request_within_cooldown_is_rate_limited() {
    let h = harness(default_policy());
    let now = Utc::now();

    h.otps.send_registration_otp(PHONE, now).await.unwrap();
    let err = h
        .otps
        .send_registration_otp(PHONE, now + Duration::seconds(10))
        .await
        .unwrap_err();

    assert_matches!(err, AuthError::OtpCooldown(_));
}

#[tokio::test]
async fn daily_cap_refuses_the_sixth_code() {
    let policy = OtpPolicy {
        resend_cooldown_seconds: 0,
        ..default_policy()
    };
    let h = harness(policy);
    let mut now = Utc::now();

    for _ in 0..5 {
        h.otps.send_registration_otp(PHONE, now).await.unwrap();
        now += Duration::seconds(1);
    }

    let err = h.otps.send_registration_otp(PHONE, now).await.unwrap_err();
    assert_matches!(err, AuthError::OtpDailyLimitReached(5));
}

#[tokio::test]
async fn wrong_code_is_rejected_and_locks_after_five_attempts() {
    let h = harness(default_policy());
    let now = Utc::now();

    h.otps.send_registration_otp(PHONE, now).await.unwrap();
    let code = latest_code(&h, PHONE, OtpPurpose::Registration).await;
    let wrong = if code == "000000" { "000001" } else { "000000" };

    for _ in 0..5 {
        let err = h
            .otps
            .verify(PHONE, wrong, OtpPurpose::Registration, now)
            .await
            .unwrap_err();
        assert_matches!(err, AuthError::OtpInvalid);
    }

    // The real code is burned once too many wrong guesses accumulate
    let err = h
        .otps
        .verify(PHONE, &code, OtpPurpose::Registration, now)
        .await
        .unwrap_err();
    assert_matches!(err, AuthError::OtpAttemptsExceeded);
}

#[tokio::test]
async fn expired_code_is_distinguished_from_invalid() {
    let h = harness(default_policy());
    let now = Utc::now();

    h.otps.send_registration_otp(PHONE, now).await.unwrap();
    let code = latest_code(&h, PHONE, OtpPurpose::Registration).await;

    let err = h
        .otps
        .verify(PHONE, &code, OtpPurpose::Registration, now + Duration::minutes(6))
        .await
        .unwrap_err();

    assert_matches!(err, AuthError::OtpExpired);
}

#[tokio::test]
async fn verified_phone_cannot_request_registration_code() {
    let h = harness(default_policy());
    register(&h, PHONE, "sufficiently-long").await;

    let err = h
        .otps
        .send_registration_otp(PHONE, Utc::now() + Duration::minutes(10))
        .await
        .unwrap_err();

    assert_matches!(err, AuthError::PhoneAlreadyRegistered);
}

#[tokio::test]
async fn blocked_user_cannot_login() {
    let h = harness(default_policy());
    register(&h, PHONE, "sufficiently-long").await;

    let mut user = h.users.find_by_phone(PHONE).await.unwrap().unwrap();
    user.is_blocked = true;
    h.users.update(&user).await.unwrap();

    let err = h
        .accounts
        .login(PHONE, "sufficiently-long", Utc::now())
        .await
        .unwrap_err();

    assert_matches!(err, AuthError::AccountBlocked(_));
}

#[tokio::test]
async fn password_reset_flow_replaces_the_credential() {
    let h = harness(default_policy());
    register(&h, PHONE, "old-password-123").await;

    let now = Utc::now() + Duration::minutes(5);
    h.otps.send_password_reset_otp(PHONE, now).await.unwrap();
    let code = latest_code(&h, PHONE, OtpPurpose::PasswordReset).await;

    // Reusing the current password is refused
    let err = h
        .accounts
        .reset_password(PHONE, &code, "old-password-123", now)
        .await
        .unwrap_err();
    assert_matches!(err, AuthError::SamePassword);

    h.accounts
        .reset_password(PHONE, &code, "new-password-456", now)
        .await
        .unwrap();

    let err = h
        .accounts
        .login(PHONE, "old-password-123", now)
        .await
        .unwrap_err();
    assert_matches!(err, AuthError::InvalidCredentials);

    h.accounts
        .login(PHONE, "new-password-456", now)
        .await
        .unwrap();
}

#[tokio::test]
async fn change_password_requires_the_current_one() {
    let h = harness(default_policy());
    register(&h, PHONE, "old-password-123").await;
    let user = h.users.find_by_phone(PHONE).await.unwrap().unwrap();

    let err = h
        .accounts
        .change_password(user.id, "not-the-password", "new-password-456", Utc::now())
        .await
        .unwrap_err();
    assert_matches!(err, AuthError::WrongPassword);

    h.accounts
        .change_password(user.id, "old-password-123", "new-password-456", Utc::now())
        .await
        .unwrap();

    h.accounts
        .login(PHONE, "new-password-456", Utc::now())
        .await
        .unwrap();
}

#[tokio::test]
async fn profile_email_must_be_unique() {
    let h = harness(OtpPolicy {
        resend_cooldown_seconds: 0,
        ..default_policy()
    });
    register(&h, PHONE, "sufficiently-long").await;

    // Second user without an email
    let other_phone = "+919876500000";
    let now = Utc::now();
    h.otps
        .send_registration_otp(other_phone, now)
        .await
        .unwrap();
    let code = latest_code(&h, other_phone, OtpPurpose::Registration).await;
    let (other, _) = h
        .accounts
        .register(
            RegistrationRequest {
                phone: other_phone.to_string(),
                otp: code,
                name: "Ravi Kumar".to_string(),
                password: "sufficiently-long".to_string(),
                email: None,
            },
            now,
        )
        .await
        .unwrap();

    let err = h
        .accounts
        .update_profile(other.id, None, Some("asha@example.com".to_string()))
        .await
        .unwrap_err();
    assert_matches!(err, AuthError::EmailAlreadyRegistered);

    // Removing an email is always allowed
    let profile = h
        .accounts
        .update_profile(other.id, None, Some(String::new()))
        .await
        .unwrap();
    assert!(profile.email.is_none());
}
