//! grid-agent entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::Result;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use grid_agent::docker::DockerRuntime;
use grid_agent::{AgentConfig, EventBus, Mailbox, OverlayWorker, RawEvent, Topic};
use grid_network::{WeaveAdapter, WeaveDns};

/// Overlay network and DNS agent for grid containers
#[derive(Parser, Debug)]
#[command(name = "grid-agent")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the agent config (TOML)
    #[arg(short, long, env = "GRID_AGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Number of mailbox consumers
    #[arg(long)]
    shards: Option<usize>,

    /// Bound on each network/DNS call, in seconds
    #[arg(long, value_name = "SECS")]
    call_timeout: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };
    if let Some(shards) = args.shards {
        config = config.with_shards(shards);
    }
    if let Some(secs) = args.call_timeout {
        config = config.with_call_timeout(secs);
    }
    config.validate()?;

    // The filter comes from the config, so logging starts once it is loaded.
    let filter = if args.debug {
        EnvFilter::new(config.log_directive(true))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.log_directive(false)))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();

    if let Some(path) = &args.config {
        tracing::debug!(path = %path.display(), "Loaded agent config");
    }

    let adapter = Arc::new(WeaveAdapter::new(config.weave.clone()));
    let runtime = Arc::new(DockerRuntime::connect().await?);
    let dns = Arc::new(WeaveDns::new(&config.weave));

    let worker = OverlayWorker::new(adapter.clone(), runtime.clone(), dns)
        .with_call_timeout(config.call_timeout());

    let bus = EventBus::with_capacity(config.dispatch.capacity);
    let mailbox = Mailbox::spawn(
        Arc::new(worker),
        config.dispatch.shards,
        config.dispatch.capacity,
    );
    let events = bus.subscribe();

    // Bring the router up before any container events arrive.
    bus.publish(Topic::RouterLifecycle, RawEvent::new("grid-agent", "start"));

    tracing::info!(
        shards = mailbox.shards(),
        router = %config.weave.api_url,
        "grid-agent started"
    );

    tokio::select! {
        () = mailbox.forward(events) => {
            tracing::error!("Event forwarding stopped");
        }
        result = runtime.publish_events(&bus, adapter.as_ref()) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Docker event stream failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    mailbox.shutdown().await;
    Ok(())
}
