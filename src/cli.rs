//! CLI for the eventbus demo binary
//!
//! - `listen`: log every payload delivered on the bus until Ctrl+C
//! - `publish`: publish one or more messages on the bus

use crate::config::{AppConfig, Backend};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eventbus_core::{handler_fn, CancellationToken, Event};
use eventbus_stores::{memory, redis_store};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How long `publish` waits for local loop-back delivery on the memory backend
const LOCAL_DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Eventbus CLI
#[derive(Parser, Debug)]
#[command(name = "eventbus")]
#[command(about = "Publish/subscribe event bus over pluggable transports")]
#[command(version)]
pub struct Cli {
    /// Override the configured transport
    #[arg(long, global = true)]
    pub backend: Option<Backend>,

    /// Override the configured Redis channel
    #[arg(long, global = true)]
    pub channel: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log every payload delivered on the bus until interrupted
    Listen {
        /// Handler id to register
        #[arg(long, default_value = "cli-listener")]
        id: String,
    },
    /// Publish messages on the bus
    Publish {
        /// Messages to publish, one payload each
        #[arg(required = true)]
        messages: Vec<String>,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli, mut config: AppConfig) -> Result<()> {
    if let Some(backend) = cli.backend {
        config.bus.backend = backend;
    }
    if let Some(channel) = cli.channel {
        config.redis.channel = channel;
    }

    match cli.command {
        Some(Commands::Listen { id }) => listen(&config, id).await,
        Some(Commands::Publish { messages }) => publish(&config, messages).await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

async fn build_bus(config: &AppConfig, cancel: CancellationToken) -> Result<Event<String>> {
    match config.bus.backend {
        Backend::Memory => memory::new_event(cancel, config.bus.buffer)
            .await
            .context("Failed to start in-memory bus"),
        Backend::Redis => {
            let client = redis::Client::open(config.redis.url.as_str())
                .context("Invalid Redis URL")?;
            redis_store::new_event(cancel, client, config.redis.channel.clone())
                .await
                .with_context(|| format!("Failed to subscribe to Redis channel '{}'", config.redis.channel))
        }
    }
}

async fn listen(config: &AppConfig, id: String) -> Result<()> {
    let cancel = CancellationToken::new();
    let bus = build_bus(config, cancel.clone()).await?;

    let handler_id = id.clone();
    bus.register_handler(
        id,
        handler_fn(move |payload: String| {
            let handler_id = handler_id.clone();
            async move {
                info!(handler_id = %handler_id, payload = %payload, "Received payload");
            }
        }),
    )?;

    if config.bus.backend == Backend::Memory {
        warn!("Listening on the memory backend; only this process can publish to it");
    }
    info!(backend = %config.bus.backend, "Listening, press Ctrl+C to stop");

    crate::shutdown::wait_for_shutdown_signal().await?;
    cancel.cancel();
    info!("Bus cancelled");
    Ok(())
}

async fn publish(config: &AppConfig, messages: Vec<String>) -> Result<()> {
    let cancel = CancellationToken::new();
    let bus = build_bus(config, cancel.clone()).await?;

    // On the memory backend nothing outside this process can listen, so loop
    // the payloads back to a local logging handler.
    let delivered = Arc::new(AtomicUsize::new(0));
    if config.bus.backend == Backend::Memory {
        let counter = Arc::clone(&delivered);
        bus.register_handler(
            "cli-echo",
            handler_fn(move |payload: String| {
                let counter = Arc::clone(&counter);
                async move {
                    info!(payload = %payload, "Delivered locally");
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }),
        )?;
    }

    let total = messages.len();
    for message in messages {
        bus.publish(message).await.context("Failed to publish message")?;
    }
    info!(count = total, backend = %config.bus.backend, "Published messages");

    if config.bus.backend == Backend::Memory {
        let wait = async {
            while delivered.load(Ordering::SeqCst) < total {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        if tokio::time::timeout(LOCAL_DELIVERY_TIMEOUT, wait).await.is_err() {
            warn!(
                delivered = delivered.load(Ordering::SeqCst),
                expected = total,
                "Timed out waiting for local delivery"
            );
        }
    }

    cancel.cancel();
    Ok(())
}
