//! API server entry point.

use std::sync::Arc;

use api::SharedEventStore;
use api::config::{Config, LogFormat};
use event_store::{InMemoryEventStore, PostgresEventStore};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn open_event_store(config: &Config) -> SharedEventStore {
    match &config.database_url {
        Some(url) => {
            let store = PostgresEventStore::connect(url)
                .await
                .expect("failed to connect to PostgreSQL");
            store
                .run_migrations()
                .await
                .expect("failed to run event store migrations");
            tracing::info!("using PostgreSQL event store");
            Arc::new(store)
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory event store");
            Arc::new(InMemoryEventStore::new())
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Open the event store and build application state
    let event_store = open_event_store(&config).await;
    let state = api::create_default_state(event_store, &config);

    // 4. Start the projection synchronizer
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let synchronizer = {
        let synchronizer = Arc::clone(&state.synchronizer);
        tokio::spawn(async move { synchronizer.run(shutdown_rx).await })
    };

    // 5. Build the application
    let app = api::create_app(state, metrics_handle);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 7. Stop the synchronizer once in-flight requests are done
    let _ = shutdown_tx.send(true);
    if let Err(e) = synchronizer.await {
        tracing::error!(error = %e, "projection synchronizer task failed");
    }

    tracing::info!("server shut down gracefully");
}
