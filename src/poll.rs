//! Fixed-interval poll loop and per-record state extraction.
//!
//! Extraction is pure: each record maps to (registry key, state) pairs,
//! with the same independent per-type rules the classifier registers under.
//! The loop itself is thin glue: fetch, publish, sleep, forever. A failed
//! cycle is logged and skipped; only startup failures terminate the process.

use std::time::Duration;

use thiserror::Error;
use tracing::error;

use crate::apex::{ApexClient, InputRecord, InputValue, OutputRecord};
use crate::classify::{LEVEL_TYPES, SWITCH_TYPES};
use crate::hass::StateValue;
use crate::registry::EntityRegistry;

/// Malformed per-record data. Aborts the cycle it occurred in, nothing more.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("output {did}: missing status slot {slot}")]
    MissingSlot { did: String, slot: usize },
    #[error("output {did}: expected a number in status slot {slot}, got {value:?}")]
    NotANumber {
        did: String,
        slot: usize,
        value: String,
    },
}

/// State for one input record.
pub fn input_state(input: &InputRecord) -> StateValue {
    match (input.channel_type.as_str(), input.value) {
        ("digital", InputValue::Bool(on)) => StateValue::Binary(on),
        ("digital", InputValue::Number(raw)) => StateValue::Binary(raw != 0.0),
        (_, InputValue::Number(raw)) => StateValue::Numeric(raw),
        (_, InputValue::Bool(on)) => StateValue::Numeric(if on { 1.0 } else { 0.0 }),
    }
}

fn status_slot<'a>(output: &'a OutputRecord, slot: usize) -> Result<&'a str, ExtractError> {
    output
        .status
        .get(slot)
        .map(String::as_str)
        .ok_or_else(|| ExtractError::MissingSlot {
            did: output.did.clone(),
            slot,
        })
}

/// Numeric status slot; the controller reports an empty string for "no
/// reading yet", which counts as zero.
fn status_float(output: &OutputRecord, slot: usize) -> Result<f64, ExtractError> {
    let raw = status_slot(output, slot)?;
    if raw.is_empty() {
        return Ok(0.0);
    }
    raw.parse().map_err(|_| ExtractError::NotANumber {
        did: output.did.clone(),
        slot,
        value: raw.to_string(),
    })
}

/// Switch state from status slot 0. "TBL" (tracking a table/profile) still
/// means the output is energized.
fn switch_state(output: &OutputRecord) -> Result<StateValue, ExtractError> {
    let raw = status_slot(output, 0)?;
    Ok(StateValue::Binary(raw.contains("ON") || raw.contains("TBL")))
}

/// States for one output record, keyed like the classifier registered them.
/// Rules are evaluated independently, never as exclusive branches.
pub fn output_states(output: &OutputRecord) -> Result<Vec<(String, StateValue)>, ExtractError> {
    let mut states = Vec::new();
    let channel_type = output.channel_type.as_str();

    if LEVEL_TYPES.contains(&channel_type) {
        states.push((
            output.did.clone(),
            StateValue::Numeric(status_float(output, 1)?),
        ));
    }

    if channel_type == "alert" || SWITCH_TYPES.contains(&channel_type) {
        states.push((output.did.clone(), switch_state(output)?));
    }

    if channel_type.contains("cor") {
        states.push((output.did.clone(), switch_state(output)?));
        for slot in [1usize, 4, 6] {
            states.push((
                format!("{}_{slot}", output.did),
                StateValue::Numeric(status_float(output, slot)?),
            ));
        }
    }

    if channel_type == "wav" {
        states.push((output.did.clone(), switch_state(output)?));
        for slot in [1usize, 4, 5] {
            states.push((
                format!("{}_{slot}", output.did),
                StateValue::Numeric(status_float(output, slot)?),
            ));
        }
    }

    if channel_type == "dos" {
        states.push((
            format!("{}_4", output.did),
            StateValue::Numeric(status_float(output, 4)?),
        ));
    }

    Ok(states)
}

/// One fetch-and-publish pass over every registered channel.
async fn run_cycle(apex: &ApexClient, registry: &EntityRegistry) -> anyhow::Result<()> {
    let snapshot = apex.fetch().await?;

    for input in &snapshot.inputs {
        let Some(entity) = registry.get(&input.did) else {
            continue;
        };
        entity.publish_state(input_state(input)).await?;
    }

    for output in &snapshot.outputs {
        if !registry.contains_key(&output.did) {
            continue;
        }
        for (key, state) in output_states(output)? {
            if let Some(entity) = registry.get(&key) {
                entity.publish_state(state).await?;
            }
        }
    }

    Ok(())
}

/// Poll forever. Never returns; the process runs until externally killed.
pub async fn run(apex: &ApexClient, registry: &EntityRegistry, poll_interval: Duration) {
    loop {
        if let Err(e) = run_cycle(apex, registry).await {
            error!("poll cycle failed: {e:#}");
        }
        tokio::time::sleep(poll_interval).await;
    }
}
