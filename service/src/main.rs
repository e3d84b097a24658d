#![deny(
    clippy::expect_used,
    clippy::panic,
    clippy::print_stdout,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used
)]

use axum::{
    http::{HeaderValue, Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Extension, Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use vormiaquery_api::{
    config::{Config, CorsConfig},
    http::{
        allowlist_middleware, decrypt_request_middleware, encrypt_response_middleware,
        AccessPolicy, EncryptionContext,
    },
    keys::{KeySet, ReloadableKeys},
    rest::{self, ApiDoc},
};

// Health check handler
async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let cors_origins = &config.allowed_origins;
    let allow_origin: AllowOrigin = if cors_origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow any origin - not recommended for production");
        AllowOrigin::any()
    } else if cors_origins.is_empty() {
        tracing::info!(
            "CORS allowed origins not configured - cross-origin requests will be blocked"
        );
        AllowOrigin::list(Vec::<HeaderValue>::new())
    } else {
        let origins: Vec<HeaderValue> = cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        tracing::info!(origins = ?cors_origins, "CORS allowed origins configured");
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(allow_origin)
}

/// Re-read configuration and swap in new keys on `SIGHUP`.
#[cfg(unix)]
fn spawn_key_reload(keys: Arc<ReloadableKeys>) -> Result<(), anyhow::Error> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            tracing::info!("SIGHUP received, reloading encryption keys");
            let result = Config::load()
                .map_err(|e| anyhow::anyhow!("{e}"))
                .and_then(|config| keys.reload(&config.encryption).map_err(anyhow::Error::from));
            if let Err(e) = result {
                tracing::error!(error = %e, "key reload failed, keeping previous keys");
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn spawn_key_reload(_keys: Arc<ReloadableKeys>) -> Result<(), anyhow::Error> {
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load and validate configuration first (fail-fast)
    let config = Config::load().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up logging from config
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.level)?)
        .init();

    // Init banner so container logs clearly show startup
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "vormiaquery-api starting up"
    );

    // Invalid PEM is a startup error; an absent key only disables its stage
    let key_set = KeySet::from_config(&config.encryption)?;
    tracing::info!(
        decrypt_requests = key_set.has_private_key(),
        encrypt_responses = key_set.has_public_key(),
        "encryption keys loaded"
    );
    let keys = Arc::new(ReloadableKeys::new(key_set));
    spawn_key_reload(Arc::clone(&keys))?;

    let encryption = EncryptionContext::new(keys, config.encryption.max_body_bytes)
        .with_trust_forwarded_for(config.access.trust_forwarded_for);

    // Build the API
    let mut app = Router::new()
        // REST routes
        .nest("/api/v1", rest::router())
        // Health check route
        .route("/health", get(health_check));

    if config.swagger.enabled {
        tracing::info!("Swagger UI enabled at /swagger-ui");
        app = app.merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        );
    }

    let mut app = app
        .layer(middleware::from_fn(decrypt_request_middleware))
        .layer(middleware::from_fn(encrypt_response_middleware))
        .layer(Extension(encryption))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors));

    // Allow-lists sit outermost so refused requests never reach the exchange
    if config.access.is_enabled() {
        tracing::info!(
            domains = config.access.allowed_domains.len(),
            ips = config.access.allowed_ips.len(),
            "access allow-lists enabled"
        );
        app = app
            .layer(middleware::from_fn(allowlist_middleware))
            .layer(Extension(AccessPolicy::from_config(&config.access)));
    }

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Starting server at http://{}/api/v1", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}
