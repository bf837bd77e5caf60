use tickercast::TickercastError;
use tickercast::config::fetch_config;
use tickercast::logging::init_logging;
use tickercast::orchestrator::{Shutdown, StreamOrchestrator, StreamSettings};
use tickercast::provider::Provider;
use tickercast::publisher::{Publisher, RedisBus};
use tickercast::source::Source;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), TickercastError> {
    let app_config = fetch_config()?;
    init_logging(&app_config.logging)?;

    let provider = Provider::from_config(&app_config)?;
    let source = Source::from_config(&app_config);

    let bus = RedisBus::connect(&app_config.bus.redis_url).await?;
    let publisher = Publisher::new(
        bus,
        app_config.bus.max_attempts,
        app_config.bus.retry_delay,
    );

    let shutdown = Shutdown::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let settings = StreamSettings {
        poll_interval: app_config.poll_interval,
        catch_up: app_config.catch_up,
    };
    let exit = StreamOrchestrator::new(provider, source, publisher, settings, shutdown)
        .run()
        .await?;

    info!(cycles = exit.cycles, state = ?exit.state, "Exiting");
    Ok(())
}

/// Requests shutdown on Ctrl+C or SIGTERM.
async fn wait_for_signal(shutdown: Shutdown) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
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
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C"),
        () = terminate => info!("Received SIGTERM"),
    }

    info!("Finishing current cycle before stopping");
    shutdown.request();
}
