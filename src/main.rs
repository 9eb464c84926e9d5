use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ecoplates::config::{Backend, Config};
use ecoplates::db::models::Role;
use ecoplates::db::{Database, MemoryDatabase, PostgrestDatabase};
use ecoplates::identity::{
    log_session_events, GoTrueIdentity, IdentityProvider, MemoryIdentity, SessionEvents,
    SignUpMetadata,
};
use ecoplates::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if it exists
    dotenvy::dotenv().ok();

    // Initialize Tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "ecoplates=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting EcoPlates service...");

    let config = Arc::new(Config::from_env()?);

    let (db, identity): (Arc<dyn Database>, Arc<dyn IdentityProvider>) = match &config.backend {
        Backend::Hosted { url, anon_key } => {
            tracing::info!("Using hosted backend at {}", url);
            (
                Arc::new(PostgrestDatabase::new(url, anon_key.clone())) as Arc<dyn Database>,
                Arc::new(GoTrueIdentity::new(url, anon_key.clone())) as Arc<dyn IdentityProvider>,
            )
        }
        Backend::Memory => {
            let memory = MemoryDatabase::new();
            let accounts = MemoryIdentity::new(memory.memory_store());
            if let Some((email, password)) = &config.dev_admin {
                let metadata = SignUpMetadata {
                    full_name: "Administrator".to_string(),
                    role: Role::Admin,
                    phone: None,
                    address: None,
                    organization_name: None,
                };
                accounts.seed_account(email, password, &metadata).await?;
                tracing::info!("Seeded development admin {}", email);
            }
            (
                Arc::new(memory) as Arc<dyn Database>,
                Arc::new(accounts) as Arc<dyn IdentityProvider>,
            )
        }
    };
    tracing::info!("Data backend initialized: {}", db.backend_tag());

    let events = SessionEvents::default();
    tokio::spawn(log_session_events(events.subscribe()));

    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .period(config.rate_limit_period())
            .burst_size(config.rate_limit_burst)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limit configuration"))?,
    );

    // CORS configuration (no permissive mode)
    let origins = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid ALLOWED_ORIGINS entry: {}", origin);
                None
            }
        })
        .collect::<Vec<_>>();
    if origins.is_empty() && config.is_production() {
        anyhow::bail!("ALLOWED_ORIGINS must contain at least one valid origin in production");
    }
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(true);

    let port = config.port;
    let state = AppState { config, db, identity, events };

    let app = build_router(state)
        .layer(cors)
        .layer(GovernorLayer { config: governor_config })
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        ));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("signal received, starting graceful shutdown");
}
