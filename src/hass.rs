//! Home Assistant MQTT discovery publishing.
//!
//! Each registered channel becomes one `HassEntity`: a retained discovery
//! config under `homeassistant/<component>/<unique_id>/config` plus state
//! updates on the matching `.../state` topic. The shared `AsyncClient` is
//! the only connection the process holds; its event loop runs detached in
//! the background once the initial session is acknowledged.

use std::fmt;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::Serialize;
use tracing::{debug, error};

use crate::classify::{EntityKind, EntityPlan};

/// Broker connection parameters taken from the CLI.
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub broker: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Owning device block embedded in every discovery payload, so Home
/// Assistant groups all channels under one device entry.
#[derive(Debug, Clone, Serialize)]
pub struct HaDevice {
    pub name: String,
    pub identifiers: Vec<String>,
    pub manufacturer: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hw_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,
}

#[derive(Debug, Serialize)]
struct Discovery<'a> {
    name: &'a str,
    unique_id: &'a str,
    state_topic: &'a str,
    device: &'a HaDevice,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<&'a str>,
}

/// State pushed into an entity each cycle: "ON"/"OFF" for binary sensors,
/// a decimal number for everything else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateValue {
    Binary(bool),
    Numeric(f64),
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Binary(true) => f.write_str("ON"),
            StateValue::Binary(false) => f.write_str("OFF"),
            StateValue::Numeric(value) => write!(f, "{value}"),
        }
    }
}

/// One announced sensor or binary sensor, bound to the shared client.
pub struct HassEntity {
    client: AsyncClient,
    name: String,
    unique_id: String,
    config_topic: String,
    state_topic: String,
    unit: Option<&'static str>,
    device_class: Option<&'static str>,
    device: HaDevice,
}

impl HassEntity {
    pub fn new(
        client: AsyncClient,
        device: HaDevice,
        plan: &EntityPlan,
        unique_id: String,
        name: String,
    ) -> Self {
        let component = plan.kind.component();
        Self {
            client,
            config_topic: format!("homeassistant/{component}/{unique_id}/config"),
            state_topic: format!("homeassistant/{component}/{unique_id}/state"),
            unit: plan.unit,
            device_class: plan.device_class,
            device,
            unique_id,
            name,
        }
    }

    /// Announce the entity to Home Assistant (retained config message).
    pub async fn publish_discovery(&self) -> Result<()> {
        let payload = serde_json::to_vec(&Discovery {
            name: &self.name,
            unique_id: &self.unique_id,
            state_topic: &self.state_topic,
            device: &self.device,
            device_class: self.device_class,
            unit_of_measurement: self.unit,
        })
        .context("failed to serialize discovery payload")?;

        self.client
            .publish(self.config_topic.as_str(), QoS::AtLeastOnce, true, payload)
            .await
            .with_context(|| format!("discovery publish failed for {}", self.unique_id))
    }

    /// Push the current state over the existing connection.
    pub async fn publish_state(&self, value: StateValue) -> Result<()> {
        debug!("{} <- {}", self.state_topic, value);
        self.client
            .publish(
                self.state_topic.as_str(),
                QoS::AtLeastOnce,
                false,
                value.to_string(),
            )
            .await
            .with_context(|| format!("state publish failed for {}", self.unique_id))
    }
}

/// Connect to the broker and detach the event loop into a background task.
///
/// rumqttc connects lazily and retries forever; driving the event loop to
/// the first ConnAck here is what lets startup fail fast on a dead broker.
pub async fn connect_mqtt(settings: &MqttSettings) -> Result<AsyncClient> {
    let mut options = MqttOptions::new(&settings.client_id, &settings.broker, settings.port);
    options.set_keep_alive(Duration::from_secs(30));
    if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
        options.set_credentials(username, password);
    }

    let (client, mut eventloop) = AsyncClient::new(options, 10);

    loop {
        match tokio::time::timeout(Duration::from_secs(10), eventloop.poll()).await {
            Ok(Ok(Event::Incoming(Incoming::ConnAck(_)))) => break,
            Ok(Ok(_)) => continue,
            Ok(Err(e)) => {
                return Err(e).with_context(|| {
                    format!(
                        "unable to connect to MQTT broker at {}:{}",
                        settings.broker, settings.port
                    )
                })
            }
            Err(_) => bail!(
                "timed out connecting to MQTT broker at {}:{}",
                settings.broker,
                settings.port
            ),
        }
    }

    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT connection error: {e}");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    });

    Ok(client)
}
