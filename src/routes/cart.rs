use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Cart Router Module
///
/// Every endpoint here acts on the caller's own cart: the user id comes from
/// the `AuthUser` extractor, never from the request body, so one session can
/// never address another user's cart.
pub fn routes() -> Router<AppState> {
    Router::new()
        // POST /api/cart/get
        // The embedded cart mapping verbatim.
        .route("/get", post(handlers::get_user_cart))
        // POST /api/cart/add
        // Atomic +1 at [item][size], creating nested entries as needed.
        .route("/add", post(handlers::add_to_cart))
        // POST /api/cart/update
        // Direct quantity set; requires a prior add.
        .route("/update", post(handlers::update_cart))
}
