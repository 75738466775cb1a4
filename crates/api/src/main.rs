use std::net::SocketAddr;
use std::sync::Arc;

use packforge_db::repositories::{
    InMemoryJobRepository, InMemoryPackRepository, PgJobRepository, PgPackRepository,
};
use packforge_db::{JobRepository, PackRepository};
use packforge_pipeline::converter::CommandConverter;
use packforge_pipeline::orchestrator::ConversionOrchestrator;
use packforge_pipeline::service::PackService;
use packforge_pipeline::store::PackStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use packforge_api::config::ServerConfig;
use packforge_api::router::build_app_router;
use packforge_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "packforge_api=debug,packforge_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Repositories ---
    let (pool, packs, jobs) = match &config.database_url {
        Some(database_url) => {
            let pool = packforge_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            packforge_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            tracing::info!("Database health check passed");

            packforge_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            let packs: Arc<dyn PackRepository> = Arc::new(PgPackRepository::new(pool.clone()));
            let jobs: Arc<dyn JobRepository> = Arc::new(PgJobRepository::new(pool.clone()));
            (Some(pool), packs, jobs)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, keeping packs and jobs in memory");
            let packs: Arc<dyn PackRepository> = Arc::new(InMemoryPackRepository::new());
            let jobs: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository::new());
            (None, packs, jobs)
        }
    };

    // --- Pack store ---
    let store = PackStore::open(&config.pipeline.storage)
        .await
        .expect("Failed to open pack store");

    // --- Pipeline ---
    let converter = Arc::new(CommandConverter::from_config(&config.pipeline.converter));
    tracing::info!(
        program = %config.pipeline.converter.program.display(),
        "Converter configured",
    );

    let pack_service = Arc::new(PackService::new(Arc::clone(&packs), store.clone()));
    let orchestrator = Arc::new(ConversionOrchestrator::new(
        packs,
        jobs,
        store,
        converter,
        config.pipeline.conversion.clone(),
    ));

    // --- App state ---
    let state = AppState {
        pool,
        packs: pack_service,
        orchestrator,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
