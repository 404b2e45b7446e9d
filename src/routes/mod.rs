//! Router Module Index
//!
//! Organizes the application's routing logic into the four API mount points.
//! Each module maps HTTP verb + path to a handler; access control is applied
//! per-handler through the `AuthUser` / `AdminUser` extractors, so a route
//! cannot reach its handler body without the corresponding gate resolving.

/// `/api/user`: registration, login, and admin login.
pub mod user;

/// `/api/product`: catalog listing and admin catalog management.
pub mod product;

/// `/api/cart`: per-user cart state, entirely behind the user auth gate.
pub mod cart;

/// `/api/order`: order placement, payment verification, and fulfillment.
pub mod order;
