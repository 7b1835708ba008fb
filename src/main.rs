use anyhow::{Context, Result};
use clap::Parser;
use specpipe_player::{
    create_router, AppState, Config, HttpDeviceApi, NatsSourceFactory, OutputBackend,
    OutputBackendFactory, PlaybackController,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How often a session that ended on its own is cleaned up
const REAP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Parser)]
#[command(name = "specpipe-player", version, about = "Plays a device's streamed FM audio")]
struct Args {
    /// Configuration file (extension optional)
    #[arg(long, default_value = "config/specpipe-player")]
    config: String,

    /// Override the configured output backend
    #[arg(long, value_enum)]
    output: Option<OutputBackend>,

    /// Select this device instead of the first registered one
    #[arg(long)]
    device: Option<String>,

    /// Start playback once a device is selected
    #[arg(long)]
    autoplay: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("NATS: {} (namespace {})", cfg.nats.url, cfg.nats.namespace);

    let backend = args.output.unwrap_or(cfg.playback.output);
    let outputs = OutputBackendFactory::create(backend)?;
    info!("Audio output: {:?}", backend);

    let api = Arc::new(HttpDeviceApi::new(&cfg.api.base_url, cfg.api.timeout())?);
    let sources = Arc::new(NatsSourceFactory::new(
        cfg.nats.url.clone(),
        cfg.nats.token.clone(),
        cfg.nats.connect_timeout(),
    ));

    let controller = PlaybackController::new(
        api,
        sources,
        outputs,
        cfg.playback.config.clone(),
        cfg.nats.namespace.clone(),
    );
    let state = AppState::new(controller);

    initial_selection(&state, &args).await;

    let reaper = {
        let state = state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(REAP_INTERVAL);
            loop {
                interval.tick().await;
                state.controller.lock().await.reap().await;
            }
        })
    };

    let addr = cfg.http_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, create_router(state.clone()))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")?;

    reaper.abort();
    state.controller.lock().await.stop().await;

    Ok(())
}

/// Dashboard start-up: pick a device, optionally start playing it
async fn initial_selection(state: &AppState, args: &Args) {
    let mut controller = state.controller.lock().await;

    let selected = match &args.device {
        Some(device) => controller
            .switch_device(device)
            .await
            .map(|_| Some(device.clone())),
        None => controller.select_default().await,
    };

    let device = match selected {
        Ok(Some(device)) => device,
        Ok(None) => return,
        Err(e) => {
            warn!("No device selected at startup: {}", e);
            return;
        }
    };
    info!("Selected device {}", device);

    if args.autoplay {
        if let Err(e) = controller.start(&device).await {
            warn!("Autoplay failed: {}", e);
        }
    }
}
