//! subswitch - Entry Point
//!
//! Runs the selection loop until Ctrl+C or SIGTERM, then stops the engine it started.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use subswitch::check::HttpProxyCheck;
use subswitch::config::{self, Config, LogConfig};
use subswitch::probe::{LatencyProber, TcpDialer};
use subswitch::sink::{ConfigSink, V2rayConfigSink};
use subswitch::subscription::{HttpTransport, SubscriptionFetcher};
use subswitch::switcher::{Switcher, SwitcherHandle};

#[tokio::main]
async fn main() -> subswitch::Result<()> {
    let args = config::cli().get_matches();

    // Load configuration
    let mut config = Config::from_env()?;
    config.apply_args(&args)?;

    init_tracing(&config.log);
    info!("Starting subswitch");

    let transport = Arc::new(HttpTransport::new(Duration::from_secs(
        config.subscription.timeout,
    ))?);
    let fetcher = SubscriptionFetcher::new(transport);
    let prober = LatencyProber::new(Arc::new(TcpDialer), config.probe_config());
    info!(
        "Probing with {:?} timeout, {} workers",
        prober.config().timeout,
        prober.config().max_concurrency
    );

    let sink = Arc::new(V2rayConfigSink::new(config.engine_config()));
    info!(
        "Engine config: {} (HTTP {}, SOCKS {})",
        sink.config().config_path().display(),
        config.engine.http_port,
        config.engine.socks_port
    );

    let checker = Arc::new(HttpProxyCheck::new(
        &config.check.url,
        config.engine.http_port,
        Duration::from_secs(config.check.timeout),
    )?);
    info!("Verifying through {}", checker.url());

    let mut switcher = Switcher::new(
        config.switcher_config(),
        fetcher,
        prober,
        sink.clone(),
        checker,
    );

    // Start selection loop
    let (switcher_handle, switcher_shutdown) = SwitcherHandle::new();
    let switcher_task = tokio::spawn(async move {
        switcher.run(switcher_shutdown).await;
    });

    // Wait for shutdown signal
    shutdown_signal().await;
    info!("Shutdown signal received");

    switcher_handle.shutdown();
    let _ = switcher_task.await;
    sink.shutdown().await;

    info!("subswitch stopped");
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("subswitch={}", log.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if log.format.eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
}
