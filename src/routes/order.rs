use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Order Router Module
///
/// Mixes user-gated endpoints (placement, verification, own-order listing)
/// with admin-gated ones (global listing, fulfillment status), so gating is
/// done per-handler via the extractors rather than a blanket layer.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Admin
        // POST /api/order/list: every order in the system.
        .route("/list", post(handlers::all_orders))
        // POST /api/order/status: enumerated fulfillment transition.
        .route("/status", post(handlers::update_status))
        // Payment
        // POST /api/order/place: cash-on-delivery checkout.
        .route("/place", post(handlers::place_order))
        // POST /api/order/stripe: provider-hosted checkout session.
        .route("/stripe", post(handlers::place_order_stripe))
        // POST /api/order/verifyStripe: finalize after the redirect.
        .route("/verifyStripe", post(handlers::verify_stripe))
        // User
        // POST /api/order/userorders: the caller's own orders.
        .route("/userorders", post(handlers::user_orders))
}
