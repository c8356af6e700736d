use anyhow::Result;
use lib_stream::{ConnectionError, StreamClient, StreamError};
use tokio::signal;
use tokio_util::sync::CancellationToken;

mod stream_logic;
use stream_logic::{config, handlers, logger};

/// Resolves on Ctrl-C or SIGTERM.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        #[cfg(unix)]
        {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut term_signal) => {
                    term_signal.recv().await;
                }
                Err(e) => {
                    log::error!("Failed to listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            // On non-unix platforms, just wait forever.
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = ctrl_c => log::info!("Ctrl-C received, initiating shutdown."),
        _ = terminate => log::info!("SIGTERM received, initiating shutdown."),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config();
    logger::setup_logging(&config.log_dir(), config.log_level())?;

    let shutdown = CancellationToken::new();
    let client = StreamClient::with_shutdown(config.client_config()?, shutdown.clone())?;
    let _subscriptions = handlers::register(&client);

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_token.cancel();
    });

    log::info!(
        "Connecting to the {} stream",
        config.network.unwrap_or_default()
    );
    match client.start().await {
        Ok(()) => {}
        Err(StreamError::Connection(ConnectionError::Shutdown)) => {
            log::info!("Shutdown requested before the stream connected.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    shutdown.cancelled().await;
    client.stop().await;

    log::info!("Shutdown complete.");
    Ok(())
}
