use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Product Router Module
///
/// Catalog reads are public; catalog mutations sit behind the admin gate
/// (the `AdminUser` extractor on their handlers).
pub fn routes() -> Router<AppState> {
    Router::new()
        // POST /api/product/add (admin, multipart)
        // Stages the uploaded images, pushes them to the object store under
        // server-generated keys, and persists the catalog entry.
        .route("/add", post(handlers::add_product))
        // POST /api/product/remove (admin)
        // Idempotent-silent delete by id.
        .route("/remove", post(handlers::remove_product))
        // POST /api/product/single
        // One catalog entry, or a null product on a miss.
        .route("/single", post(handlers::single_product))
        // GET /api/product/list
        // The whole catalog, unfiltered.
        .route("/list", get(handlers::list_products))
}
