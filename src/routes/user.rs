use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// User Router Module
///
/// All three identity endpoints are public: they are the gateway through
/// which session tokens are issued. The admin variant compares against the
/// credentials injected via `AppConfig` and issues a role-claimed token.
pub fn routes() -> Router<AppState> {
    Router::new()
        // POST /api/user/register
        // Creates an account; rejects duplicate emails, malformed emails,
        // and passwords shorter than the minimum.
        .route("/register", post(handlers::register_user))
        // POST /api/user/login
        // Verifies the stored credential and returns a session token.
        .route("/login", post(handlers::login_user))
        // POST /api/user/admin
        // Issues an admin-role session from the configured secrets.
        .route("/admin", post(handlers::admin_login))
}
