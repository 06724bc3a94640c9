//! Entity registry built once from the first device snapshot.
//!
//! Channels appearing in later snapshots that were not in the first are
//! never registered; a lookup miss during polling means "not monitored".

use std::collections::HashMap;

use anyhow::Result;
use rumqttc::AsyncClient;
use tracing::{debug, info};

use crate::apex::DeviceSnapshot;
use crate::classify::{classify_input, classify_output, EntityPlan};
use crate::hass::{HaDevice, HassEntity};

pub type EntityRegistry = HashMap<String, HassEntity>;

/// One planned registration: registry key, display name, entity shape.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedChannel {
    pub key: String,
    pub name: String,
    pub plan: EntityPlan,
}

/// Pure planning step: every channel the snapshot yields, before any I/O.
///
/// Overlapping output rules may plan the same base key more than once; the
/// later plan wins on insert, matching the classifier's rule order.
pub fn plan_snapshot(snapshot: &DeviceSnapshot) -> Vec<PlannedChannel> {
    let mut planned = Vec::new();

    for input in &snapshot.inputs {
        if let Some(plan) = classify_input(&input.channel_type) {
            planned.push(PlannedChannel {
                key: input.did.clone(),
                name: format!("{} {}", snapshot.hostname, input.name),
                plan,
            });
        }
    }

    for output in &snapshot.outputs {
        for plan in classify_output(&output.channel_type) {
            let name = match plan.name_suffix {
                Some(suffix) => format!("{} {} {}", snapshot.hostname, output.name, suffix),
                None => format!("{} {}", snapshot.hostname, output.name),
            };
            planned.push(PlannedChannel {
                key: format!("{}{}", output.did, plan.key_suffix),
                name,
                plan,
            });
        }
    }

    planned
}

/// Device identity shared by every discovery payload.
pub fn device_identity(snapshot: &DeviceSnapshot) -> HaDevice {
    HaDevice {
        name: snapshot.hostname.clone(),
        identifiers: vec![snapshot.serial_id()],
        manufacturer: "Neptune".to_string(),
        model: snapshot.model.clone().unwrap_or_else(|| "AC4".to_string()),
        hw_version: Some(snapshot.hardware.clone()),
        sw_version: Some(snapshot.software.clone()),
    }
}

/// Build the write-once registry and announce every entity to Home Assistant.
pub async fn build_registry(
    client: &AsyncClient,
    snapshot: &DeviceSnapshot,
) -> Result<EntityRegistry> {
    let device = device_identity(snapshot);
    let serial = snapshot.serial_id();
    let mut registry = EntityRegistry::new();

    for channel in plan_snapshot(snapshot) {
        let unique_id = format!("{serial}_{}", channel.key);
        let entity = HassEntity::new(
            client.clone(),
            device.clone(),
            &channel.plan,
            unique_id,
            channel.name,
        );
        entity.publish_discovery().await?;
        debug!("registered channel {}", channel.key);
        registry.insert(channel.key, entity);
    }

    info!(
        "registered {} channels for {}",
        registry.len(),
        snapshot.hostname
    );
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apex::{InputRecord, InputValue, OutputRecord};
    use crate::classify::EntityKind;

    fn snapshot(inputs: Vec<InputRecord>, outputs: Vec<OutputRecord>) -> DeviceSnapshot {
        DeviceSnapshot {
            hostname: "apex".to_string(),
            serial: "AC5:12345".to_string(),
            model: None,
            hardware: "1.0".to_string(),
            software: "5.12_7A24".to_string(),
            inputs,
            outputs,
        }
    }

    fn input(did: &str, name: &str, channel_type: &str) -> InputRecord {
        InputRecord {
            did: did.to_string(),
            name: name.to_string(),
            channel_type: channel_type.to_string(),
            value: InputValue::Number(0.0),
        }
    }

    fn output(did: &str, name: &str, channel_type: &str) -> OutputRecord {
        OutputRecord {
            did: did.to_string(),
            name: name.to_string(),
            channel_type: channel_type.to_string(),
            status: vec![],
        }
    }

    #[test]
    fn plans_one_channel_per_known_input() {
        let snap = snapshot(
            vec![
                input("base_Temp", "Tmp", "Temp"),
                input("base_X", "Mystery", "unknown"),
            ],
            vec![],
        );
        let planned = plan_snapshot(&snap);
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].key, "base_Temp");
        assert_eq!(planned[0].name, "apex Tmp");
        assert_eq!(planned[0].plan.kind, EntityKind::Sensor);
    }

    #[test]
    fn plans_cor_output_as_four_channels() {
        let snap = snapshot(vec![], vec![output("4_1", "Return", "cor_a")]);
        let keys: Vec<_> = plan_snapshot(&snap).into_iter().map(|c| c.key).collect();
        assert_eq!(keys, vec!["4_1", "4_1_1", "4_1_4", "4_1_6"]);
    }

    #[test]
    fn plans_dos_output_as_switch_plus_dosage() {
        let snap = snapshot(vec![], vec![output("6_1", "Doser", "dos")]);
        let planned = plan_snapshot(&snap);
        assert_eq!(planned.len(), 2);
        assert_eq!(planned[0].key, "6_1");
        assert_eq!(planned[0].plan.kind, EntityKind::BinarySensor);
        assert_eq!(planned[0].plan.device_class, Some("power"));
        assert_eq!(planned[1].key, "6_1_4");
        assert_eq!(planned[1].plan.kind, EntityKind::Sensor);
        assert_eq!(planned[1].plan.unit, Some("ml"));
        assert_eq!(planned[1].name, "apex Doser total dosage");
    }

    #[test]
    fn unknown_output_plans_nothing() {
        let snap = snapshot(vec![], vec![output("9_9", "Heater", "heater")]);
        assert!(plan_snapshot(&snap).is_empty());
    }

    #[test]
    fn compound_names_append_suffix() {
        let snap = snapshot(vec![], vec![output("5_1", "Wave", "wav")]);
        let names: Vec<_> = plan_snapshot(&snap).into_iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            vec![
                "apex Wave",
                "apex Wave Duty",
                "apex Wave RPM",
                "apex Wave Temperature"
            ]
        );
    }

    #[test]
    fn device_identity_defaults_model() {
        let snap = snapshot(vec![], vec![]);
        let device = device_identity(&snap);
        assert_eq!(device.model, "AC4");
        assert_eq!(device.manufacturer, "Neptune");
        assert_eq!(device.identifiers, vec!["AC5_12345"]);

        let mut snap = snapshot(vec![], vec![]);
        snap.model = Some("AC5".to_string());
        assert_eq!(device_identity(&snap).model, "AC5");
    }
}
