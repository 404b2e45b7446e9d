use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// CartData
///
/// The embedded per-user cart document: product id -> size label -> quantity.
/// Quantities are always >= 1; removing the last unit deletes the entry.
pub type CartData = BTreeMap<Uuid, BTreeMap<String, i32>>;

/// User
///
/// A customer account from the `users` table. The cart lives embedded in the
/// user row as a single JSONB document, mirroring the document-store shape it
/// replaces.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    // Unique identifier used at login.
    pub email: String,
    /// Argon2 PHC-format hash. Never serialized into any response.
    #[serde(skip_serializing, default)]
    #[schema(write_only)]
    pub password_hash: String,
    // UUID-keyed maps have no generic OpenAPI representation; document the
    // cart as a free-form object.
    #[schema(value_type = Object)]
    pub cart: CartData,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Product
///
/// A catalog entry from the `products` table. Created by admin add-product,
/// deleted by admin remove-product, immutable otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub sub_category: String,
    // Size labels offered for this product (e.g. S, M, L, XL).
    pub sizes: Vec<String>,
    // Hosted image URLs produced by the storage layer.
    pub images: Vec<String>,
    pub bestseller: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// OrderStatus
///
/// Enumerated fulfillment state machine. Transitions outside `can_transition`
/// are rejected instead of stored, replacing free-form status strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum OrderStatus {
    #[default]
    Placed,
    Paid,
    Packing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// The canonical text form stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Paid => "paid",
            OrderStatus::Packing => "packing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Allowed fulfillment transitions. Terminal states (`delivered`,
    /// `cancelled`) permit none.
    pub fn can_transition(&self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Placed, Paid)
                | (Placed, Packing)
                | (Placed, Cancelled)
                | (Paid, Packing)
                | (Paid, Cancelled)
                | (Packing, Shipped)
                | (Packing, Cancelled)
                | (Shipped, Delivered)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placed" => Ok(OrderStatus::Placed),
            "paid" => Ok(OrderStatus::Paid),
            "packing" => Ok(OrderStatus::Packing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// PaymentMethod
///
/// The payment path chosen at order placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PaymentMethod {
    /// Cash on delivery, settled offline.
    #[default]
    Cod,
    /// Stripe Checkout Session.
    Stripe,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::Stripe => "stripe",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cod" => Ok(PaymentMethod::Cod),
            "stripe" => Ok(PaymentMethod::Stripe),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

/// OrderLine
///
/// One cart entry snapshotted into an order at placement time. Name and price
/// are copied from the catalog so later product removal cannot mutate history.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub name: String,
    pub price: f64,
    pub size: String,
    pub quantity: i32,
}

/// Address
///
/// Delivery address captured with each order.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub country: String,
    pub phone: String,
}

/// Order
///
/// An order row from the `orders` table. Line items and the delivery address
/// are stored as JSONB documents alongside the scalar columns.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<OrderLine>,
    // Total charged, items plus the flat delivery fee.
    pub amount: f64,
    pub address: Address,
    pub payment_method: PaymentMethod,
    // Whether the payment has been settled (always false for fresh COD orders).
    pub paid: bool,
    pub status: OrderStatus,
    /// Provider-side checkout session id, present for Stripe orders only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for POST /api/user/register.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// LoginRequest
///
/// Input payload for POST /api/user/login and POST /api/user/admin.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// SingleProductRequest
///
/// Input payload for POST /api/product/single.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SingleProductRequest {
    pub product_id: Uuid,
}

/// RemoveProductRequest
///
/// Input payload for POST /api/product/remove.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RemoveProductRequest {
    pub id: Uuid,
}

/// CartAddRequest
///
/// Input payload for POST /api/cart/add. The acting user comes from the
/// session token, never from the body.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartAddRequest {
    pub item_id: Uuid,
    pub size: String,
}

/// CartUpdateRequest
///
/// Input payload for POST /api/cart/update. Quantity 0 removes the entry.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartUpdateRequest {
    pub item_id: Uuid,
    pub size: String,
    pub quantity: i32,
}

/// PlaceOrderRequest
///
/// Input payload for POST /api/order/place and /api/order/stripe. Line items
/// are derived server-side from the caller's current cart.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PlaceOrderRequest {
    pub address: Address,
}

/// VerifyStripeRequest
///
/// Input payload for POST /api/order/verifyStripe, posted by the frontend
/// after the checkout redirect comes back.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct VerifyStripeRequest {
    pub order_id: Uuid,
    pub success: bool,
}

/// UpdateStatusRequest
///
/// Input payload for the admin fulfillment-status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateStatusRequest {
    pub order_id: Uuid,
    pub status: OrderStatus,
}

// --- Response Envelopes (Output Schemas) ---

/// AuthResponse
///
/// Success envelope carrying a freshly signed session token.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
}

/// MessageResponse
///
/// Success envelope for operations that only report an outcome message.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// ProductListResponse
///
/// Success envelope for the full, unfiltered catalog listing.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ProductListResponse {
    pub success: bool,
    pub products: Vec<Product>,
}

/// SingleProductResponse
///
/// Success envelope for a single catalog lookup. `product` is null when the
/// id does not exist; the lookup itself still succeeds.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SingleProductResponse {
    pub success: bool,
    pub product: Option<Product>,
}

/// CartResponse
///
/// Success envelope returning the caller's cart mapping verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartResponse {
    pub success: bool,
    #[schema(value_type = Object)]
    pub cart_data: CartData,
}

/// OrderListResponse
///
/// Success envelope for both the admin order list and the caller's own orders.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct OrderListResponse {
    pub success: bool,
    pub orders: Vec<Order>,
}

/// CheckoutResponse
///
/// Success envelope carrying the provider-hosted checkout URL to redirect to.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CheckoutResponse {
    pub success: bool,
    pub session_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_transitions() {
        assert!(OrderStatus::Placed.can_transition(OrderStatus::Packing));
        assert!(OrderStatus::Placed.can_transition(OrderStatus::Paid));
        assert!(OrderStatus::Packing.can_transition(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition(OrderStatus::Delivered));

        // Terminal states and backward moves are rejected.
        assert!(!OrderStatus::Delivered.can_transition(OrderStatus::Placed));
        assert!(!OrderStatus::Cancelled.can_transition(OrderStatus::Packing));
        assert!(!OrderStatus::Shipped.can_transition(OrderStatus::Placed));
        assert!(!OrderStatus::Placed.can_transition(OrderStatus::Delivered));
    }

    #[test]
    fn order_status_round_trips_through_text() {
        for status in [
            OrderStatus::Placed,
            OrderStatus::Paid,
            OrderStatus::Packing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("express".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn cart_envelope_uses_camel_case_key() {
        let resp = CartResponse {
            success: true,
            cart_data: CartData::new(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("cartData").is_some());
        assert!(json.get("cart_data").is_none());
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let user = User {
            password_hash: "$argon2id$v=19$secret".to_string(),
            ..User::default()
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
    }
}
