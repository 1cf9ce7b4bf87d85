use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use shared_database::atlas::{is_duplicate_key, AtlasClient};
use shared_database::StoreError;

use crate::models::{OtpPurpose, OtpRecord, User};

const USERS: &str = "users";
const OTPS: &str = "otps";

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn insert(&self, user: &User) -> Result<(), StoreError>;
    async fn update(&self, user: &User) -> Result<(), StoreError>;
}

#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn insert(&self, record: &OtpRecord) -> Result<(), StoreError>;
    /// Newest record matching phone + code + purpose, regardless of expiry.
    async fn find_by_code(
        &self,
        phone: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<Option<OtpRecord>, StoreError>;
    /// Newest record for phone + purpose (used for the resend cooldown).
    async fn newest(
        &self,
        phone: &str,
        purpose: OtpPurpose,
    ) -> Result<Option<OtpRecord>, StoreError>;
    async fn count_created_since(
        &self,
        phone: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError>;
    async fn record_failed_attempt(&self, id: Uuid) -> Result<(), StoreError>;
    async fn delete_for_phone(
        &self,
        phone: &str,
        purpose: Option<OtpPurpose>,
    ) -> Result<u64, StoreError>;
    async fn delete_expired(&self, phone: &str, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

// ==============================================================================
// DOCUMENT STORE IMPLEMENTATIONS
// ==============================================================================

/// Users collection requires unique indexes on `phone` and on `email`
/// (sparse); duplicate-key violations surface here as `StoreError::Duplicate`.
pub struct DocumentUserStore {
    client: Arc<AtlasClient>,
}

impl DocumentUserStore {
    pub fn new(client: Arc<AtlasClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UserStore for DocumentUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.client
            .find_one(USERS, json!({ "id": id }))
            .await
            .map_err(StoreError::backend)
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError> {
        self.client
            .find_one(USERS, json!({ "phone": phone }))
            .await
            .map_err(StoreError::backend)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.client
            .find_one(USERS, json!({ "email": email }))
            .await
            .map_err(StoreError::backend)
    }

    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        let document = serde_json::to_value(user).map_err(StoreError::backend)?;
        self.client
            .insert_one(USERS, document)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    let field = if e.to_string().contains("email") {
                        "email"
                    } else {
                        "phone"
                    };
                    StoreError::Duplicate(field.to_string())
                } else {
                    StoreError::backend(e)
                }
            })
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let document = serde_json::to_value(user).map_err(StoreError::backend)?;
        let outcome = self
            .client
            .update_one(USERS, json!({ "id": user.id }), json!({ "$set": document }))
            .await
            .map_err(StoreError::backend)?;

        if outcome.matched_count == 0 {
            return Err(StoreError::Backend(format!("user {} not found", user.id)));
        }
        Ok(())
    }
}

pub struct DocumentOtpStore {
    client: Arc<AtlasClient>,
}

impl DocumentOtpStore {
    pub fn new(client: Arc<AtlasClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OtpStore for DocumentOtpStore {
    async fn insert(&self, record: &OtpRecord) -> Result<(), StoreError> {
        let document = serde_json::to_value(record).map_err(StoreError::backend)?;
        self.client
            .insert_one(OTPS, document)
            .await
            .map_err(StoreError::backend)
    }

    async fn find_by_code(
        &self,
        phone: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<Option<OtpRecord>, StoreError> {
        let mut records: Vec<OtpRecord> = self
            .client
            .find(
                OTPS,
                json!({ "phone": phone, "code": code, "purpose": purpose.to_string() }),
                Some(json!({ "createdAt": -1 })),
                Some(1),
            )
            .await
            .map_err(StoreError::backend)?;
        Ok(records.pop())
    }

    async fn newest(
        &self,
        phone: &str,
        purpose: OtpPurpose,
    ) -> Result<Option<OtpRecord>, StoreError> {
        let mut records: Vec<OtpRecord> = self
            .client
            .find(
                OTPS,
                json!({ "phone": phone, "purpose": purpose.to_string() }),
                Some(json!({ "createdAt": -1 })),
                Some(1),
            )
            .await
            .map_err(StoreError::backend)?;
        Ok(records.pop())
    }

    async fn count_created_since(
        &self,
        phone: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let records: Vec<OtpRecord> = self
            .client
            .find(
                OTPS,
                json!({ "phone": phone, "createdAt": { "$gte": since } }),
                None,
                None,
            )
            .await
            .map_err(StoreError::backend)?;
        Ok(records.len() as i64)
    }

    async fn record_failed_attempt(&self, id: Uuid) -> Result<(), StoreError> {
        self.client
            .update_one(OTPS, json!({ "id": id }), json!({ "$inc": { "attempts": 1 } }))
            .await
            .map(|_| ())
            .map_err(StoreError::backend)
    }

    async fn delete_for_phone(
        &self,
        phone: &str,
        purpose: Option<OtpPurpose>,
    ) -> Result<u64, StoreError> {
        let filter = match purpose {
            Some(purpose) => json!({ "phone": phone, "purpose": purpose.to_string() }),
            None => json!({ "phone": phone }),
        };
        self.client
            .delete_many(OTPS, filter)
            .await
            .map_err(StoreError::backend)
    }

    async fn delete_expired(&self, phone: &str, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.client
            .delete_many(OTPS, json!({ "phone": phone, "expiresAt": { "$lt": now } }))
            .await
            .map_err(StoreError::backend)
    }
}

// ==============================================================================
// IN-MEMORY IMPLEMENTATIONS (tests, unconfigured deployments)
// ==============================================================================

#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.phone == phone)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.phone == user.phone) {
            return Err(StoreError::Duplicate("phone".to_string()));
        }
        if let Some(email) = &user.email {
            if users.iter().any(|u| u.email.as_ref() == Some(email)) {
                return Err(StoreError::Duplicate("email".to_string()));
            }
        }
        users.push(user.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        match users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(format!("user {} not found", user.id))),
        }
    }
}

#[derive(Default)]
pub struct InMemoryOtpStore {
    records: Mutex<Vec<OtpRecord>>,
}

impl InMemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn insert(&self, record: &OtpRecord) -> Result<(), StoreError> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }

    async fn find_by_code(
        &self,
        phone: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<Option<OtpRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .filter(|r| r.phone == phone && r.code == code && r.purpose == purpose)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn newest(
        &self,
        phone: &str,
        purpose: OtpPurpose,
    ) -> Result<Option<OtpRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .filter(|r| r.phone == phone && r.purpose == purpose)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn count_created_since(
        &self,
        phone: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .filter(|r| r.phone == phone && r.created_at >= since)
            .count() as i64)
    }

    async fn record_failed_attempt(&self, id: Uuid) -> Result<(), StoreError> {
        if let Some(record) = self.records.lock().await.iter_mut().find(|r| r.id == id) {
            record.attempts += 1;
        }
        Ok(())
    }

    async fn delete_for_phone(
        &self,
        phone: &str,
        purpose: Option<OtpPurpose>,
    ) -> Result<u64, StoreError> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|r| {
            !(r.phone == phone && purpose.map(|p| r.purpose == p).unwrap_or(true))
        });
        Ok((before - records.len()) as u64)
    }

    async fn delete_expired(&self, phone: &str, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|r| !(r.phone == phone && r.expires_at < now));
        Ok((before - records.len()) as u64)
    }
}
