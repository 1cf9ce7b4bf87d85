use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use shared_database::atlas::{is_duplicate_key, AtlasClient};
use shared_database::StoreError;

use crate::models::{Payment, PaymentStatus};

const PAYMENTS: &str = "payments";

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Insert a payment; `order_id` is unique across the collection.
    async fn insert(&self, payment: &Payment) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>, StoreError>;
    async fn successful_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Payment>, StoreError>;
    async fn find_for_appointment(
        &self,
        appointment_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Payment>, StoreError>;
    async fn update(&self, payment: &Payment) -> Result<(), StoreError>;
    /// Every payment, newest first (administrator view).
    async fn list_all(&self) -> Result<Vec<Payment>, StoreError>;
}

// ==============================================================================
// DOCUMENT STORE IMPLEMENTATION
// ==============================================================================

/// Payments collection carries a unique index on `orderId`.
pub struct DocumentPaymentStore {
    client: Arc<AtlasClient>,
}

impl DocumentPaymentStore {
    pub fn new(client: Arc<AtlasClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PaymentStore for DocumentPaymentStore {
    async fn insert(&self, payment: &Payment) -> Result<(), StoreError> {
        let document = serde_json::to_value(payment).map_err(StoreError::backend)?;
        self.client
            .insert_one(PAYMENTS, document)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    StoreError::Duplicate("orderId".to_string())
                } else {
                    StoreError::backend(e)
                }
            })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        self.client
            .find_one(PAYMENTS, json!({ "id": id }))
            .await
            .map_err(StoreError::backend)
    }

    async fn successful_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Payment>, StoreError> {
        self.client
            .find_one(
                PAYMENTS,
                json!({ "appointmentId": appointment_id, "status": "success" }),
            )
            .await
            .map_err(StoreError::backend)
    }

    async fn find_for_appointment(
        &self,
        appointment_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Payment>, StoreError> {
        self.client
            .find_one(
                PAYMENTS,
                json!({ "appointmentId": appointment_id, "userId": user_id }),
            )
            .await
            .map_err(StoreError::backend)
    }

    async fn update(&self, payment: &Payment) -> Result<(), StoreError> {
        let document = serde_json::to_value(payment).map_err(StoreError::backend)?;
        let outcome = self
            .client
            .update_one(
                PAYMENTS,
                json!({ "id": payment.id }),
                json!({ "$set": document }),
            )
            .await
            .map_err(StoreError::backend)?;

        if outcome.matched_count == 0 {
            return Err(StoreError::Backend(format!(
                "payment {} not found",
                payment.id
            )));
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Payment>, StoreError> {
        self.client
            .find(
                PAYMENTS,
                json!({}),
                Some(json!({ "createdAt": -1 })),
                None,
            )
            .await
            .map_err(StoreError::backend)
    }
}

// ==============================================================================
// IN-MEMORY IMPLEMENTATION (tests, unconfigured deployments)
// ==============================================================================

#[derive(Default)]
pub struct InMemoryPaymentStore {
    payments: RwLock<Vec<Payment>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, payment: &Payment) -> Result<(), StoreError> {
        let mut payments = self.payments.write().await;
        if payments.iter().any(|p| p.order_id == payment.order_id) {
            return Err(StoreError::Duplicate("orderId".to_string()));
        }
        payments.push(payment.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        Ok(self
            .payments
            .read()
            .await
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn successful_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Payment>, StoreError> {
        Ok(self
            .payments
            .read()
            .await
            .iter()
            .find(|p| p.appointment_id == appointment_id && p.status == PaymentStatus::Success)
            .cloned())
    }

    async fn find_for_appointment(
        &self,
        appointment_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Payment>, StoreError> {
        Ok(self
            .payments
            .read()
            .await
            .iter()
            .find(|p| p.appointment_id == appointment_id && p.user_id == user_id)
            .cloned())
    }

    async fn update(&self, payment: &Payment) -> Result<(), StoreError> {
        let mut payments = self.payments.write().await;
        match payments.iter_mut().find(|p| p.id == payment.id) {
            Some(existing) => {
                *existing = payment.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(format!(
                "payment {} not found",
                payment.id
            ))),
        }
    }

    async fn list_all(&self) -> Result<Vec<Payment>, StoreError> {
        let mut list: Vec<Payment> = self.payments.read().await.iter().cloned().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }
}
