use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::Result;
use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use uuid::Uuid;

use appointment_cell::models::{
    Appointment, AppointmentStatus, ConsultationType, PaymentMethod,
    PaymentStatus as AppointmentPaymentStatus,
};
use appointment_cell::store::{AppointmentStore, InMemoryAppointmentStore};
use auth_cell::models::User;
use auth_cell::store::{InMemoryUserStore, UserStore};
use notification_cell::services::dispatcher::NotificationDispatcher;
use notification_cell::services::templates::Templates;
use payment_cell::models::{PaymentError, PaymentStatus};
use payment_cell::services::gateway::{GatewayOrder, PaymentGateway};
use payment_cell::services::orders::PaymentService;
use payment_cell::store::{InMemoryPaymentStore, PaymentStore};

const KEY_ID: &str = "rzp_test_key";
const KEY_SECRET: &str = "rzp_test_secret";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 3, 8, 0, 0).unwrap()
}

struct StubGateway {
    counter: AtomicU32,
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_order(
        &self,
        amount_paise: i64,
        currency: &str,
        _receipt: &str,
        _notes: Value,
    ) -> Result<GatewayOrder> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        Ok(GatewayOrder {
            id: format!("order_stub_{}", n),
            amount: amount_paise,
            currency: currency.to_string(),
        })
    }
}

struct Harness {
    service: PaymentService,
    payments: Arc<InMemoryPaymentStore>,
    appointments: Arc<InMemoryAppointmentStore>,
    users: Arc<InMemoryUserStore>,
}

fn harness() -> Harness {
    let payments = Arc::new(InMemoryPaymentStore::new());
    let appointments = Arc::new(InMemoryAppointmentStore::new());
    let users = Arc::new(InMemoryUserStore::new());
    let gateway = Arc::new(StubGateway {
        counter: AtomicU32::new(0),
    });
    let dispatcher = Arc::new(NotificationDispatcher::new(vec![]));
    let templates = Templates::new("Test Clinic".to_string(), "+919999999999".to_string());

    let service = PaymentService::new(
        payments.clone(),
        appointments.clone(),
        users.clone(),
        gateway,
        dispatcher,
        templates,
        KEY_ID.to_string(),
        KEY_SECRET.to_string(),
    );

    Harness {
        service,
        payments,
        appointments,
        users,
    }
}

async fn seed_user(harness: &Harness, admin: bool) -> Uuid {
    static NEXT: AtomicU32 = AtomicU32::new(0);
    let user = User {
        id: Uuid::new_v4(),
        name: "Asha Patel".to_string(),
        phone: format!("+9198764{:05}", NEXT.fetch_add(1, Ordering::Relaxed)),
        email: Some(format!("user{}@example.com", Uuid::new_v4())),
        password_hash: "unused".to_string(),
        is_verified: true,
        is_blocked: false,
        is_admin: admin,
        last_login: None,
        password_changed_at: None,
        created_at: now(),
    };
    let id = user.id;
    harness.users.insert(&user).await.unwrap();
    id
}

async fn seed_appointment(harness: &Harness, user: Uuid, slot: &str) -> Uuid {
    let appointment = Appointment {
        id: Uuid::new_v4(),
        user_id: user,
        date: NaiveDate::from_ymd_opt(2026, 8, 5).unwrap(),
        time_slot: slot.to_string(),
        pain_type: "Back Pain".to_string(),
        consultation_type: ConsultationType::Regular,
        amount: 600,
        payment_status: AppointmentPaymentStatus::Pending,
        payment_method: PaymentMethod::Pending,
        payment_id: None,
        reason: String::new(),
        status: AppointmentStatus::Pending,
        notes: String::new(),
        cancelled_at: None,
        cancelled_by: None,
        rescheduled_at: None,
        created_at: now(),
    };
    let id = appointment.id;
    harness.appointments.create(appointment, 3).await.unwrap();
    id
}

fn sign(order_id: &str, payment_id: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(KEY_SECRET.as_bytes()).unwrap();
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[tokio::test]
async fn create_order_charges_the_appointment_fee_in_paise() {
    let h = harness();
    let user = seed_user(&h, false).await;
    let appointment = seed_appointment(&h, user, "10:00 AM - 10:50 AM").await;

    let order = h
        .service
        .create_order(user, appointment, now())
        .await
        .unwrap();

    assert_eq!(order.amount_paise, 60000);
    assert_eq!(order.currency, "INR");
    assert_eq!(order.key_id, KEY_ID);

    let payment = h.payments.find_by_id(order.payment_id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.amount, 600);
    assert_eq!(payment.order_id, order.order_id);
}

#[tokio::test]
async fn create_order_rejects_foreign_appointments() {
    let h = harness();
    let owner = seed_user(&h, false).await;
    let other = seed_user(&h, false).await;
    let appointment = seed_appointment(&h, owner, "10:00 AM - 10:50 AM").await;

    let err = h
        .service
        .create_order(other, appointment, now())
        .await
        .unwrap_err();
    assert_matches!(err, PaymentError::AppointmentNotFound);
}

#[tokio::test]
async fn verified_payment_settles_the_appointment() {
    let h = harness();
    let user = seed_user(&h, false).await;
    let appointment_id = seed_appointment(&h, user, "10:00 AM - 10:50 AM").await;

    let order = h
        .service
        .create_order(user, appointment_id, now())
        .await
        .unwrap();

    let signature = sign(&order.order_id, "pay_live_1");
    let payment = h
        .service
        .verify_payment(
            user,
            order.payment_id,
            &order.order_id,
            "pay_live_1",
            &signature,
            now(),
        )
        .await
        .unwrap();

    assert_eq!(payment.status, PaymentStatus::Success);
    assert_eq!(payment.paid_at, Some(now()));
    assert_eq!(payment.gateway_payment_id.as_deref(), Some("pay_live_1"));

    let appointment = h
        .appointments
        .find_by_id(appointment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(appointment.payment_status, AppointmentPaymentStatus::Paid);
    assert_eq!(appointment.payment_id, Some(payment.id));

    // A settled appointment refuses a second order
    let err = h
        .service
        .create_order(user, appointment_id, now())
        .await
        .unwrap_err();
    assert_matches!(err, PaymentError::AlreadyPaid);
}

#[tokio::test]
async fn bad_signature_marks_the_attempt_failed() {
    let h = harness();
    let user = seed_user(&h, false).await;
    let appointment_id = seed_appointment(&h, user, "10:00 AM - 10:50 AM").await;

    let order = h
        .service
        .create_order(user, appointment_id, now())
        .await
        .unwrap();

    let err = h
        .service
        .verify_payment(
            user,
            order.payment_id,
            &order.order_id,
            "pay_live_1",
            "0badc0de",
            now(),
        )
        .await
        .unwrap_err();
    assert_matches!(err, PaymentError::InvalidSignature);

    let payment = h.payments.find_by_id(order.payment_id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert_eq!(payment.failure_reason.as_deref(), Some("Invalid signature"));

    // The appointment stays unpaid
    let appointment = h
        .appointments
        .find_by_id(appointment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(appointment.payment_status, AppointmentPaymentStatus::Pending);
}

#[tokio::test]
async fn payment_listing_is_admin_only_and_aggregates() {
    let h = harness();
    let user = seed_user(&h, false).await;
    let admin = seed_user(&h, true).await;

    let first = seed_appointment(&h, user, "10:00 AM - 10:50 AM").await;
    let second = seed_appointment(&h, user, "11:00 AM - 11:50 AM").await;

    let order = h.service.create_order(user, first, now()).await.unwrap();
    let signature = sign(&order.order_id, "pay_live_1");
    h.service
        .verify_payment(
            user,
            order.payment_id,
            &order.order_id,
            "pay_live_1",
            &signature,
            now(),
        )
        .await
        .unwrap();

    // A second, still-pending order
    h.service.create_order(user, second, now()).await.unwrap();

    let err = h.service.all_payments(user).await.unwrap_err();
    assert_matches!(err, PaymentError::AdminOnly);

    let (payments, stats) = h.service.all_payments(admin).await.unwrap();
    assert_eq!(payments.len(), 2);
    assert_eq!(stats.total, 2);
    assert_eq!(stats.successful, 1);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.total_revenue, 600);
}
