//! apex-hass-mqtt - republish Neptune Apex channels into Home Assistant.
//!
//! Startup is fail-fast: broker connect and the first snapshot fetch must
//! succeed or the process exits non-zero. After the entities are announced
//! via MQTT discovery, the poll loop runs until externally killed.

mod apex;
mod classify;
mod hass;
mod poll;
mod registry;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crate::apex::ApexClient;
use crate::hass::MqttSettings;

/// Poll a Neptune Apex controller and feed Home Assistant over MQTT.
#[derive(Debug, Parser)]
#[command(name = "apex-hass-mqtt", version, about)]
struct Args {
    /// Hostname or IP of the Apex controller
    #[arg(long)]
    host: String,

    /// Apex username
    #[arg(long, default_value = "admin")]
    apex_user: String,

    /// Apex password
    #[arg(long, default_value = "1234")]
    apex_password: String,

    /// Seconds between polls
    #[arg(long, default_value_t = 60)]
    poll_time: u64,

    /// Sensor name (the hostname reported by the controller takes
    /// precedence for entity naming)
    #[arg(short, long, default_value = "apex")]
    name: String,

    /// MQTT broker host
    #[arg(long, default_value = "127.0.0.1")]
    broker: String,

    /// MQTT broker port
    #[arg(long, default_value_t = 1883)]
    broker_port: u16,

    /// MQTT username
    #[arg(short, long)]
    user: Option<String>,

    /// MQTT password
    #[arg(short = 'w', long)]
    password: Option<String>,

    /// MQTT client id
    #[arg(short = 'i', long, default_value = "apex")]
    client_id: String,

    /// Debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    info!("starting apex-hass-mqtt for {}", args.name);

    let settings = MqttSettings {
        broker: args.broker,
        port: args.broker_port,
        client_id: args.client_id,
        username: args.user,
        password: args.password,
    };
    let client = hass::connect_mqtt(&settings).await?;
    info!(
        "connected to MQTT broker at {}:{}",
        settings.broker, settings.port
    );

    let apex = ApexClient::new(&args.host, &args.apex_user, &args.apex_password)?;
    let snapshot = apex
        .fetch()
        .await
        .with_context(|| format!("initial connection to apex at {} failed", args.host))?;
    info!(
        "connected to {} (serial {})",
        snapshot.hostname, snapshot.serial
    );

    let registry = registry::build_registry(&client, &snapshot)
        .await
        .context("failed to announce discovery entities")?;

    poll::run(&apex, &registry, Duration::from_secs(args.poll_time)).await;
    Ok(())
}
