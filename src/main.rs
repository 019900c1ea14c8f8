use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::time::Duration;
use tracing::{error, info};
use wattson::WattsonClient;
use wattson::config::Config;
use wattson::coordinator::PollCoordinator;
use wattson::logging::init_logging;
use wattson::persistence::{StateStore, TokenPersistence};

struct Args {
    config: Option<PathBuf>,
    once: bool,
}

fn parse_args() -> Args {
    let mut args = Args {
        config: None,
        once: false,
    };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--once" => args.once = true,
            path => args.config = Some(PathBuf::from(path)),
        }
    }
    args
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    init_logging(&config.logging).context("Failed to initialize logging")?;

    info!("Wattson {} starting up", env!("APP_VERSION"));

    let store = StateStore::new(&config.state_file);
    let persisted = match store.load().await {
        Ok(state) => Some(state),
        Err(e) => {
            error!("Ignoring unreadable state file: {}", e);
            None
        }
    };

    let mut client = WattsonClient::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;
    if let Some(state) = &persisted {
        client = client
            .with_tokens(state.tokens.clone())
            .with_devices(state.devices.clone());
    }

    let mut coordinator = PollCoordinator::new(
        client,
        store,
        Duration::from_secs(config.poll_interval_secs),
        persisted,
    );

    if args.once {
        coordinator.refresh().await;
        let state = coordinator.state();
        return match &state.data {
            Some(snapshot) if state.last_update_success => {
                println!("{}", serde_json::to_string_pretty(snapshot)?);
                Ok(())
            }
            _ => Err(anyhow::anyhow!(
                "Fetch failed: {}",
                state.last_error.clone().unwrap_or_default()
            )),
        };
    }

    let shutdown = coordinator.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown.send(());
        }
    });

    match coordinator.run().await {
        Ok(()) => {
            info!("Wattson shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Poll loop failed with error: {}", e);
            Err(anyhow::anyhow!("Poll loop error: {}", e))
        }
    }
}
