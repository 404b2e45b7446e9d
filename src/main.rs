use std::sync::Arc;

use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use storefront_api::{
    AppConfig, AppState, PostgresRepository, S3StorageClient, StorageService, StripeGateway,
    config::Env, create_router,
};

#[tokio::main]
async fn main() {
    dotenv().ok();

    // Configuration is loaded once at startup; missing required values in
    // production abort the process here rather than mid-request.
    let config = AppConfig::load();

    init_tracing(&config);

    info!(env = ?config.env, "starting storefront-api");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.db_url)
        .await
        .expect("failed to connect to Postgres");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run database migrations");

    let repo = Arc::new(PostgresRepository::new(pool));

    let storage = S3StorageClient::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.s3_bucket,
    )
    .await;

    // Local MinIO starts empty; the bucket is created on boot so image
    // uploads work without manual setup.
    if config.env == Env::Local {
        storage.ensure_bucket_exists().await;
    }

    let payments = StripeGateway::new(&config.stripe_secret_key, &config.stripe_api_base);

    let state = AppState {
        repo,
        storage: Arc::new(storage),
        payments: Arc::new(payments),
        config,
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:4000")
        .await
        .expect("failed to bind 0.0.0.0:4000");

    info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app)
        .await
        .expect("server error");
}

/// Pretty, human-readable logs locally; single-line JSON in production so the
/// log aggregator can ingest them.
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,sqlx=warn"));

    match config.env {
        Env::Local => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .pretty()
                .init();
        }
        Env::Production => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
    }
}
