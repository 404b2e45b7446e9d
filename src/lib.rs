use axum::{Router, extract::FromRef, http::HeaderName, routing::get};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod payments;
pub mod repository;
pub mod storage;

// Module for routing segregation by API mount point.
pub mod routes;
use routes::{cart, order, product, user};

// --- Public Re-exports ---

// Makes core state types easily accessible to the application entry point
// (main.rs) and to the integration tests.
pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use payments::{MockPaymentGateway, PaymentState, StripeGateway};
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageService, StorageState};

/// ApiDoc
///
/// Auto-generates the OpenAPI documentation (Swagger JSON) for the
/// application from the `#[utoipa::path]` and `#[derive(utoipa::ToSchema)]`
/// annotations. The resulting JSON is served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::login_user, handlers::admin_login,
        handlers::add_product, handlers::list_products, handlers::remove_product,
        handlers::single_product,
        handlers::get_user_cart, handlers::add_to_cart, handlers::update_cart,
        handlers::place_order, handlers::place_order_stripe, handlers::verify_stripe,
        handlers::all_orders, handlers::update_status, handlers::user_orders,
    ),
    components(
        schemas(
            models::User, models::Product, models::Order, models::OrderLine,
            models::OrderStatus, models::PaymentMethod, models::Address,
            models::RegisterRequest, models::LoginRequest,
            models::SingleProductRequest, models::RemoveProductRequest,
            models::CartAddRequest, models::CartUpdateRequest,
            models::PlaceOrderRequest, models::VerifyStripeRequest,
            models::UpdateStatusRequest,
            models::AuthResponse, models::MessageResponse,
            models::ProductListResponse, models::SingleProductResponse,
            models::CartResponse, models::OrderListResponse,
            models::CheckoutResponse,
        )
    ),
    tags(
        (name = "storefront", description = "Storefront e-commerce API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, thread-safe, immutable container holding all essential
/// application services and configuration, shared across all requests.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: abstracts database access via the PgPool connection.
    pub repo: RepositoryState,
    /// Storage Layer: abstracts the image host (S3/MinIO).
    pub storage: StorageState,
    /// Payments Layer: abstracts the checkout provider (Stripe).
    pub payments: PaymentState,
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// These implementations allow extractors and handlers to selectively pull
// components from the shared AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for PaymentState {
    fn from_ref(app_state: &AppState) -> PaymentState {
        app_state.payments.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the application's entire routing structure, applies global
/// middleware, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration. The browser storefront and the admin panel run
    // on different origins, so traffic is accepted from anywhere; the custom
    // `token` header must be allowed through.
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // GET /health: liveness endpoint for monitors and load balancers.
        .route("/health", get(|| async { "ok" }))
        // The four API mount points. Access control lives in the handlers'
        // AuthUser/AdminUser extractors.
        .nest("/api/user", user::routes())
        .nest("/api/product", product::routes())
        .nest("/api/cart", cart::routes())
        .nest("/api/order", order::routes())
        // Apply the unified state to all routes.
        .with_state(state);

    // 3. Observability and Correlation Layers (applied outermost/first).
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a unique UUID per incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: wraps the request/response lifecycle in
                // a tracing span that carries the generated request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: returns the x-request-id header
                // to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer (applied last).
        .layer(cors)
}

/// trace_span_logger
///
/// Helper used by `TraceLayer` to customize span creation: extracts the
/// `x-request-id` header (if present) and includes it in the structured
/// logging metadata alongside the HTTP method and URI, so every log line for
/// a single request is correlated by a unique ID.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
