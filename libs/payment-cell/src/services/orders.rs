use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use appointment_cell::models::PaymentStatus as AppointmentPaymentStatus;
use appointment_cell::store::AppointmentStore;
use auth_cell::store::UserStore;
use notification_cell::models::{ChannelPreference, Contact};
use notification_cell::services::dispatcher::NotificationDispatcher;
use notification_cell::services::templates::Templates;

use crate::models::{OrderCreated, Payment, PaymentError, PaymentStats, PaymentStatus};
use crate::services::gateway::{verify_signature, PaymentGateway};
use crate::store::PaymentStore;

/// Owns the online-payment flow: order creation against the gateway,
/// signature verification on the checkout callback, and the one-time
/// settlement of the appointment it pays for.
pub struct PaymentService {
    payments: Arc<dyn PaymentStore>,
    appointments: Arc<dyn AppointmentStore>,
    users: Arc<dyn UserStore>,
    gateway: Arc<dyn PaymentGateway>,
    dispatcher: Arc<NotificationDispatcher>,
    templates: Templates,
    key_id: String,
    key_secret: String,
}

impl PaymentService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        appointments: Arc<dyn AppointmentStore>,
        users: Arc<dyn UserStore>,
        gateway: Arc<dyn PaymentGateway>,
        dispatcher: Arc<NotificationDispatcher>,
        templates: Templates,
        key_id: String,
        key_secret: String,
    ) -> Self {
        Self {
            payments,
            appointments,
            users,
            gateway,
            dispatcher,
            templates,
            key_id,
            key_secret,
        }
    }

    pub async fn create_order(
        &self,
        actor: Uuid,
        appointment_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<OrderCreated, PaymentError> {
        let appointment = self
            .appointments
            .find_by_id(appointment_id)
            .await
            .map_err(|e| PaymentError::Database(e.to_string()))?
            .filter(|a| a.user_id == actor)
            .ok_or(PaymentError::AppointmentNotFound)?;

        let already_paid = self
            .payments
            .successful_for_appointment(appointment_id)
            .await
            .map_err(|e| PaymentError::Database(e.to_string()))?;
        if already_paid.is_some() {
            return Err(PaymentError::AlreadyPaid);
        }

        let receipt = format!("receipt_{}_{}", appointment_id, now.timestamp_millis());
        let notes = json!({
            "appointmentId": appointment_id,
            "userId": actor
        });

        let order = self
            .gateway
            .create_order(appointment.amount * 100, "INR", &receipt, notes)
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        let payment = Payment {
            id: Uuid::new_v4(),
            user_id: actor,
            appointment_id,
            order_id: order.id.clone(),
            amount: appointment.amount,
            currency: order.currency.clone(),
            status: PaymentStatus::Pending,
            gateway_payment_id: None,
            gateway_order_id: None,
            gateway_signature: None,
            method: None,
            bank: None,
            wallet: None,
            vpa: None,
            failure_reason: None,
            refund_status: None,
            refund_amount: None,
            paid_at: None,
            created_at: now,
        };
        self.payments
            .insert(&payment)
            .await
            .map_err(|e| PaymentError::Database(e.to_string()))?;

        info!(
            "Payment order {} created for appointment {}",
            payment.order_id, appointment_id
        );

        Ok(OrderCreated {
            order_id: order.id,
            amount_paise: order.amount,
            currency: order.currency,
            key_id: self.key_id.clone(),
            payment_id: payment.id,
        })
    }

    /// Verify the checkout callback. A bad signature marks the attempt
    /// failed; a good one settles the payment and the appointment.
    pub async fn verify_payment(
        &self,
        actor: Uuid,
        payment_id: Uuid,
        order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<Payment, PaymentError> {
        let mut payment = self
            .payments
            .find_by_id(payment_id)
            .await
            .map_err(|e| PaymentError::Database(e.to_string()))?
            .filter(|p| p.user_id == actor)
            .ok_or(PaymentError::PaymentNotFound)?;

        if !verify_signature(order_id, gateway_payment_id, signature, &self.key_secret) {
            payment.status = PaymentStatus::Failed;
            payment.failure_reason = Some("Invalid signature".to_string());
            self.payments
                .update(&payment)
                .await
                .map_err(|e| PaymentError::Database(e.to_string()))?;
            return Err(PaymentError::InvalidSignature);
        }

        payment.gateway_order_id = Some(order_id.to_string());
        payment.gateway_payment_id = Some(gateway_payment_id.to_string());
        payment.gateway_signature = Some(signature.to_string());
        payment.status = PaymentStatus::Success;
        payment.paid_at = Some(now);
        self.payments
            .update(&payment)
            .await
            .map_err(|e| PaymentError::Database(e.to_string()))?;

        // Settle the appointment the payment was opened for
        if let Some(mut appointment) = self
            .appointments
            .find_by_id(payment.appointment_id)
            .await
            .map_err(|e| PaymentError::Database(e.to_string()))?
        {
            appointment.payment_status = AppointmentPaymentStatus::Paid;
            appointment.payment_id = Some(payment.id);
            self.appointments
                .update(&appointment)
                .await
                .map_err(|e| PaymentError::Database(e.to_string()))?;
        }

        info!(
            "Payment {} verified for appointment {}",
            payment.id, payment.appointment_id
        );

        if let Ok(Some(user)) = self.users.find_by_id(actor).await {
            if user.email.is_some() {
                let contact = Contact {
                    name: user.name.clone(),
                    phone: None,
                    email: user.email.clone(),
                };
                let notice = self.templates.payment_confirmation(
                    &user.name,
                    payment.amount,
                    &payment.currency,
                    gateway_payment_id,
                );
                let dispatcher = Arc::clone(&self.dispatcher);
                tokio::spawn(async move {
                    dispatcher
                        .dispatch(&contact, ChannelPreference::EmailFirst, &notice)
                        .await;
                });
            }
        }

        Ok(payment)
    }

    pub async fn payment_for_appointment(
        &self,
        actor: Uuid,
        appointment_id: Uuid,
    ) -> Result<Option<Payment>, PaymentError> {
        self.payments
            .find_for_appointment(appointment_id, actor)
            .await
            .map_err(|e| PaymentError::Database(e.to_string()))
    }

    pub async fn all_payments(
        &self,
        actor: Uuid,
    ) -> Result<(Vec<Payment>, PaymentStats), PaymentError> {
        let is_admin = self
            .users
            .find_by_id(actor)
            .await
            .map_err(|e| PaymentError::Database(e.to_string()))?
            .map(|u| u.is_admin)
            .unwrap_or(false);
        if !is_admin {
            return Err(PaymentError::AdminOnly);
        }

        let payments = self
            .payments
            .list_all()
            .await
            .map_err(|e| PaymentError::Database(e.to_string()))?;

        let count = |status: PaymentStatus| {
            payments.iter().filter(|p| p.status == status).count() as i64
        };
        let stats = PaymentStats {
            total: payments.len() as i64,
            successful: count(PaymentStatus::Success),
            pending: count(PaymentStatus::Pending),
            failed: count(PaymentStatus::Failed),
            total_revenue: payments
                .iter()
                .filter(|p| p.status == PaymentStatus::Success)
                .map(|p| p.amount)
                .sum(),
        };

        Ok((payments, stats))
    }
}
