use anyhow::{anyhow, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::debug;

use shared_config::ClinicConfig;

type HmacSha256 = Hmac<Sha256>;

const RAZORPAY_BASE_URL: &str = "https://api.razorpay.com/v1";

/// What the gateway returns when an order is opened.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(
        &self,
        amount_paise: i64,
        currency: &str,
        receipt: &str,
        notes: Value,
    ) -> Result<GatewayOrder>;
}

/// Razorpay orders API client (basic auth over the key pair).
pub struct RazorpayGateway {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    pub fn new(config: &ClinicConfig) -> Self {
        Self::with_settings(
            RAZORPAY_BASE_URL.to_string(),
            config.razorpay_key_id.clone(),
            config.razorpay_key_secret.clone(),
        )
    }

    pub fn with_settings(base_url: String, key_id: String, key_secret: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            key_id,
            key_secret,
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_order(
        &self,
        amount_paise: i64,
        currency: &str,
        receipt: &str,
        notes: Value,
    ) -> Result<GatewayOrder> {
        debug!("Creating gateway order for {} {}", amount_paise, currency);

        let response = self
            .client
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&json!({
                "amount": amount_paise,
                "currency": currency,
                "receipt": receipt,
                "notes": notes
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("gateway order failed ({}): {}", status, error_text));
        }

        Ok(response.json::<GatewayOrder>().await?)
    }
}

/// Check the checkout callback signature: HMAC-SHA256 over
/// `"{order_id}|{payment_id}"` keyed with the gateway secret, hex-encoded.
pub fn verify_signature(
    order_id: &str,
    payment_id: &str,
    signature_hex: &str,
    key_secret: &str,
) -> bool {
    let signature = match hex::decode(signature_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(key_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());

    mac.verify_slice(&signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sign(order_id: &str, payment_id: &str, secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_verifies() {
        let signature = sign("order_123", "pay_456", "secret");
        assert!(verify_signature("order_123", "pay_456", &signature, "secret"));
    }

    #[test]
    fn tampered_fields_fail_verification() {
        let signature = sign("order_123", "pay_456", "secret");
        assert!(!verify_signature("order_999", "pay_456", &signature, "secret"));
        assert!(!verify_signature("order_123", "pay_999", &signature, "secret"));
        assert!(!verify_signature("order_123", "pay_456", &signature, "other-secret"));
    }

    #[test]
    fn garbage_signatures_fail_quietly() {
        assert!(!verify_signature("order_123", "pay_456", "not-hex!", "secret"));
        assert!(!verify_signature("order_123", "pay_456", "deadbeef", "secret"));
    }

    #[tokio::test]
    async fn create_order_parses_the_gateway_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(body_partial_json(json!({ "amount": 60000, "currency": "INR" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "order_abc123",
                "amount": 60000,
                "currency": "INR",
                "status": "created"
            })))
            .mount(&server)
            .await;

        let gateway = RazorpayGateway::with_settings(
            server.uri(),
            "key_id".to_string(),
            "key_secret".to_string(),
        );

        let order = gateway
            .create_order(60000, "INR", "receipt_1", json!({}))
            .await
            .unwrap();
        assert_eq!(order.id, "order_abc123");
        assert_eq!(order.amount, 60000);
    }

    #[tokio::test]
    async fn gateway_errors_are_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/orders"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let gateway = RazorpayGateway::with_settings(
            server.uri(),
            "key_id".to_string(),
            "key_secret".to_string(),
        );

        let err = gateway
            .create_order(100, "INR", "receipt_1", json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("gateway order failed"));
    }
}
