//! Neptune Apex status endpoint client.
//!
//! One authenticated GET against `/cgi-bin/status.json` per poll cycle.
//! The decoded snapshot lives only for that cycle.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;

/// Envelope around the snapshot: the controller nests everything under `istat`.
#[derive(Debug, Deserialize)]
struct StatusDocument {
    istat: DeviceSnapshot,
}

/// One decoded poll of the controller.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSnapshot {
    pub hostname: String,
    pub serial: String,
    /// Controller model; older firmware omits it.
    #[serde(rename = "type")]
    pub model: Option<String>,
    pub hardware: String,
    pub software: String,
    pub inputs: Vec<InputRecord>,
    pub outputs: Vec<OutputRecord>,
}

impl DeviceSnapshot {
    /// Serial normalized for use in MQTT topics and unique ids
    /// (the controller reports it colon-separated).
    pub fn serial_id(&self) -> String {
        self.serial.replace(':', "_")
    }
}

/// One monitored probe or switch input.
#[derive(Debug, Clone, Deserialize)]
pub struct InputRecord {
    pub did: String,
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: String,
    pub value: InputValue,
}

/// Raw input value: digital inputs report a bool, probes a number.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Bool(bool),
    Number(f64),
}

/// One controlled output. The meaning of each `status` slot depends on
/// the output type.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputRecord {
    pub did: String,
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: String,
    pub status: Vec<String>,
}

/// HTTP client bound to one controller.
pub struct ApexClient {
    http: Client,
    url: String,
    username: String,
    password: String,
}

impl ApexClient {
    pub fn new(host: &str, username: &str, password: &str) -> Result<Self> {
        Self::with_base_url(&format!("http://{host}"), username, password)
    }

    fn with_base_url(base: &str, username: &str, password: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            url: format!("{base}/cgi-bin/status.json"),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Fetch and decode one snapshot. Any network, auth or decode failure
    /// surfaces as an error for the caller's cycle policy to handle.
    pub async fn fetch(&self) -> Result<DeviceSnapshot> {
        let document: StatusDocument = self
            .http
            .get(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.url))?
            .error_for_status()
            .with_context(|| format!("{} returned an error status", self.url))?
            .json()
            .await
            .with_context(|| format!("{} returned malformed JSON", self.url))?;
        Ok(document.istat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "istat": {
            "hostname": "apex",
            "serial": "AC5:12345",
            "type": "AC5",
            "hardware": "1.0",
            "software": "5.12_7A24",
            "date": 1700000000,
            "inputs": [
                {"did": "base_Temp", "name": "Tmp", "type": "Temp", "value": 78.3},
                {"did": "base_Alarm", "name": "Leak", "type": "digital", "value": false}
            ],
            "outputs": [
                {"did": "base_Var1", "name": "Pump", "type": "variable", "status": ["OFF", "35"]}
            ]
        }
    }"#;

    #[tokio::test]
    async fn fetch_decodes_snapshot() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/cgi-bin/status.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(SAMPLE)
            .create_async()
            .await;

        let client = ApexClient::with_base_url(&server.url(), "admin", "1234").unwrap();
        let snapshot = client.fetch().await.unwrap();

        mock.assert_async().await;
        assert_eq!(snapshot.hostname, "apex");
        assert_eq!(snapshot.serial_id(), "AC5_12345");
        assert_eq!(snapshot.model.as_deref(), Some("AC5"));
        assert_eq!(snapshot.inputs.len(), 2);
        assert_eq!(snapshot.inputs[0].value, InputValue::Number(78.3));
        assert_eq!(snapshot.inputs[1].value, InputValue::Bool(false));
        assert_eq!(snapshot.outputs[0].status, vec!["OFF", "35"]);
    }

    #[tokio::test]
    async fn fetch_fails_on_malformed_json() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/cgi-bin/status.json")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = ApexClient::with_base_url(&server.url(), "admin", "1234").unwrap();
        assert!(client.fetch().await.is_err());
    }

    #[tokio::test]
    async fn fetch_fails_on_auth_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/cgi-bin/status.json")
            .with_status(401)
            .create_async()
            .await;

        let client = ApexClient::with_base_url(&server.url(), "admin", "wrong").unwrap();
        assert!(client.fetch().await.is_err());
    }
}
