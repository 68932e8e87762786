use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tokio::time::Duration;
use tracing::info;

use k8s_loadviz::AppState;
use k8s_loadviz::clients::MetricsClient;
use k8s_loadviz::clients::poller::Poller;
use k8s_loadviz::{config, routes};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "k8s_loadviz=info".parse().unwrap()),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| {
            std::env::args().skip(1).zip(std::env::args().skip(2)).find_map(|(k, v)| {
                if k == "-config" || k == "--config" {
                    Some(v)
                } else {
                    None
                }
            })
        })
        .unwrap_or_else(|| "/etc/k8s-loadviz/config.yaml".to_string());

    let cfg = config::Config::load(&PathBuf::from(&config_path)).unwrap_or_else(|e| {
        eprintln!("error loading config: {}", e);
        std::process::exit(1);
    });

    let client = MetricsClient::new(cfg.k8s_api_endpoint.clone());
    let poller = Arc::new(Poller::new(
        client,
        cfg.render.memory_convention,
        Duration::from_secs(cfg.poll_interval_secs),
    ));
    let cfg = Arc::new(cfg);

    // Shutdown signal
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(());

    // Start the metrics poller
    let poller_clone = poller.clone();
    tokio::spawn(async move {
        poller_clone.run(shutdown_rx).await;
    });

    let state = AppState {
        poller,
        config: cfg.clone(),
    };

    let router = routes::build_router(state);

    let listen_addr = cfg.listen_addr();
    let listener = TcpListener::bind(&listen_addr).await.unwrap_or_else(|e| {
        eprintln!("failed to bind {}: {}", listen_addr, e);
        std::process::exit(1);
    });

    info!(
        "k8s-loadviz listening on {}, polling {}",
        listen_addr, cfg.k8s_api_endpoint
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(());
        })
        .await
        .unwrap_or_else(|e| {
            eprintln!("server error: {}", e);
            std::process::exit(1);
        });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
