use crate::{
    error::{ApiError, ApiResult},
    models::Order,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Flat delivery charge added to every order, in the catalog currency.
pub const DELIVERY_FEE: f64 = 10.0;

/// Currency used for all checkout sessions.
const CURRENCY: &str = "usd";

/// CheckoutSession
///
/// The provider-side session created for a Stripe order: the id is recorded
/// on the order row, the URL is handed to the client for redirect.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// PaymentGateway Contract
///
/// Abstracts the payment provider behind a trait so handlers never talk HTTP
/// to Stripe directly and tests can swap in `MockPaymentGateway`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a hosted checkout session for the order's line items plus the
    /// delivery fee.
    async fn create_checkout_session(
        &self,
        order: &Order,
        success_url: &str,
        cancel_url: &str,
    ) -> ApiResult<CheckoutSession>;

    /// Confirms with the provider whether the session has actually been paid.
    /// The client's redirect parameters are a hint, never the authority.
    async fn session_paid(&self, session_id: &str) -> ApiResult<bool>;
}

/// PaymentState
///
/// The concrete type used to share the payment gateway across the application
/// state.
pub type PaymentState = Arc<dyn PaymentGateway>;

/// StripeGateway
///
/// Stripe Checkout Sessions over plain form-encoded REST calls. Uses the
/// hosted checkout page, so no card data ever touches this service.
pub struct StripeGateway {
    client: Client,
    secret_key: String,
    api_base: String,
}

impl StripeGateway {
    pub fn new(secret_key: &str, api_base: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            secret_key: secret_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.secret_key)
    }

    /// Flattens the order into Stripe's indexed form-field encoding. Amounts
    /// are converted from the catalog's major units to cents.
    fn build_form(order: &Order, success_url: &str, cancel_url: &str) -> Vec<(String, String)> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), success_url.to_string()),
            ("cancel_url".to_string(), cancel_url.to_string()),
            ("metadata[order_id]".to_string(), order.id.to_string()),
        ];

        for (i, item) in order.items.iter().enumerate() {
            form.push((
                format!("line_items[{i}][price_data][currency]"),
                CURRENCY.to_string(),
            ));
            form.push((
                format!("line_items[{i}][price_data][unit_amount]"),
                to_minor_units(item.price).to_string(),
            ));
            form.push((
                format!("line_items[{i}][price_data][product_data][name]"),
                format!("{} ({})", item.name, item.size),
            ));
            form.push((
                format!("line_items[{i}][quantity]"),
                item.quantity.to_string(),
            ));
        }

        // The delivery fee rides along as its own line item.
        let i = order.items.len();
        form.push((
            format!("line_items[{i}][price_data][currency]"),
            CURRENCY.to_string(),
        ));
        form.push((
            format!("line_items[{i}][price_data][unit_amount]"),
            to_minor_units(DELIVERY_FEE).to_string(),
        ));
        form.push((
            format!("line_items[{i}][price_data][product_data][name]"),
            "Delivery charges".to_string(),
        ));
        form.push((format!("line_items[{i}][quantity]"), "1".to_string()));

        form
    }
}

/// Converts a major-unit price to integer cents for the provider API.
fn to_minor_units(price: f64) -> i64 {
    (price * 100.0).round() as i64
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        order: &Order,
        success_url: &str,
        cancel_url: &str,
    ) -> ApiResult<CheckoutSession> {
        let form = Self::build_form(order, success_url, cancel_url);
        let url = format!("{}/v1/checkout/sessions", self.api_base);

        tracing::debug!(
            order_id = %order.id,
            items = order.items.len(),
            "creating stripe checkout session"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            // The order id doubles as the idempotency key: retrying a
            // checkout for the same order must not mint a second session.
            .header("Idempotency-Key", order.id.to_string())
            .form(&form)
            .send()
            .await
            .map_err(|e| ApiError::Payment(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Payment(e.to_string()))?;

        if !status.is_success() {
            tracing::error!("stripe API error: status={}, body={}", status, body);
            if let Ok(err) = serde_json::from_str::<StripeErrorResponse>(&body) {
                return Err(ApiError::Payment(err.error.message));
            }
            return Err(ApiError::Payment(format!("HTTP {status}")));
        }

        let session: StripeSessionResponse = serde_json::from_str(&body)
            .map_err(|e| ApiError::Payment(format!("unparseable stripe response: {e}")))?;

        tracing::info!(session_id = %session.id, "created stripe checkout session");

        Ok(CheckoutSession {
            id: session.id,
            url: session.url,
        })
    }

    async fn session_paid(&self, session_id: &str) -> ApiResult<bool> {
        let url = format!("{}/v1/checkout/sessions/{}", self.api_base, session_id);

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| ApiError::Payment(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ApiError::Payment(format!(
                "session lookup failed: HTTP {}",
                response.status()
            )));
        }

        let session: StripeSessionStatus = response
            .json()
            .await
            .map_err(|e| ApiError::Payment(e.to_string()))?;

        Ok(session.payment_status == "paid")
    }
}

// --- Stripe API Types ---

#[derive(Debug, Deserialize)]
struct StripeSessionResponse {
    id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct StripeSessionStatus {
    #[serde(default)]
    payment_status: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    message: String,
}

// --- Mock Implementation (For Tests) ---

/// MockPaymentGateway
///
/// Canned gateway used by the test suite: returns a deterministic session and
/// reports the configured payment outcome.
pub struct MockPaymentGateway {
    pub should_fail: bool,
    /// What `session_paid` reports for any session id.
    pub paid: bool,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self {
            should_fail: false,
            paid: true,
        }
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            paid: false,
        }
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_checkout_session(
        &self,
        order: &Order,
        _success_url: &str,
        _cancel_url: &str,
    ) -> ApiResult<CheckoutSession> {
        if self.should_fail {
            return Err(ApiError::Payment("Mock gateway failure".to_string()));
        }
        Ok(CheckoutSession {
            id: format!("cs_mock_{}", order.id.simple()),
            url: format!("https://checkout.stripe.local/pay/cs_mock_{}", order.id.simple()),
        })
    }

    async fn session_paid(&self, _session_id: &str) -> ApiResult<bool> {
        if self.should_fail {
            return Err(ApiError::Payment("Mock gateway failure".to_string()));
        }
        Ok(self.paid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderLine, OrderStatus, PaymentMethod};
    use uuid::Uuid;

    fn sample_order() -> Order {
        Order {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            items: vec![OrderLine {
                product_id: Uuid::new_v4(),
                name: "Crewneck Tee".to_string(),
                price: 24.5,
                size: "M".to_string(),
                quantity: 2,
            }],
            amount: 59.0,
            address: Default::default(),
            payment_method: PaymentMethod::Stripe,
            paid: false,
            status: OrderStatus::Placed,
            session_id: None,
            created_at: Default::default(),
        }
    }

    #[test]
    fn minor_unit_conversion_rounds() {
        assert_eq!(to_minor_units(24.5), 2450);
        assert_eq!(to_minor_units(10.0), 1000);
        assert_eq!(to_minor_units(0.015), 2);
    }

    #[test]
    fn checkout_form_includes_items_and_delivery_fee() {
        let order = sample_order();
        let form = StripeGateway::build_form(&order, "http://s", "http://c");

        let get = |k: &str| {
            form.iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("2450"));
        assert_eq!(get("line_items[0][quantity]"), Some("2"));
        // Delivery fee is appended as the final line item.
        assert_eq!(get("line_items[1][price_data][unit_amount]"), Some("1000"));
        assert_eq!(
            get("line_items[1][price_data][product_data][name]"),
            Some("Delivery charges")
        );
        assert_eq!(get("metadata[order_id]"), Some(order.id.to_string().as_str()));
    }
}
