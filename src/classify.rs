//! Apex channel type → Home Assistant entity mapping tables.
//!
//! Output rules are evaluated independently, never as exclusive branches:
//! a type that matches several rules registers the entities of every rule
//! (observed device firmware never produces a conflicting combination).

/// Home Assistant component an entity is announced under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Sensor,
    BinarySensor,
}

impl EntityKind {
    /// Component segment used in discovery/state topics.
    pub fn component(self) -> &'static str {
        match self {
            EntityKind::Sensor => "sensor",
            EntityKind::BinarySensor => "binary_sensor",
        }
    }
}

/// Registration descriptor for one entity derived from a channel record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityPlan {
    pub kind: EntityKind,
    pub unit: Option<&'static str>,
    pub device_class: Option<&'static str>,
    /// Appended to the record's `did` to form the registry key ("" for the
    /// base entity, "_1"/"_4"/... for compound sub-entities).
    pub key_suffix: &'static str,
    /// Appended to the display name for compound sub-entities.
    pub name_suffix: Option<&'static str>,
}

impl EntityPlan {
    const fn sensor(
        key_suffix: &'static str,
        unit: Option<&'static str>,
        device_class: Option<&'static str>,
        name_suffix: Option<&'static str>,
    ) -> Self {
        Self {
            kind: EntityKind::Sensor,
            unit,
            device_class,
            key_suffix,
            name_suffix,
        }
    }

    const fn binary(key_suffix: &'static str, device_class: Option<&'static str>) -> Self {
        Self {
            kind: EntityKind::BinarySensor,
            unit: None,
            device_class,
            key_suffix,
            name_suffix: None,
        }
    }
}

/// Input probe types, exact case-sensitive match.
const INPUT_TABLE: &[(&str, EntityPlan)] = &[
    ("Temp", EntityPlan::sensor("", Some("°F"), Some("temperature"), None)),
    ("pH", EntityPlan::sensor("", Some("pH"), None, None)),
    ("Cond", EntityPlan::sensor("", Some("mS"), None, None)),
    ("Amps", EntityPlan::sensor("", Some("A"), Some("current"), None)),
    ("digital", EntityPlan::binary("", Some("opening"))),
    ("ORP", EntityPlan::sensor("", Some("ORP"), None, None)),
    ("pwr", EntityPlan::sensor("", Some("W"), Some("power"), None)),
    ("volts", EntityPlan::sensor("", Some("V"), Some("voltage"), None)),
    ("alk", EntityPlan::sensor("", Some("dKH"), None, None)),
    ("ca", EntityPlan::sensor("", Some("ppm"), None, None)),
    ("mg", EntityPlan::sensor("", Some("ppm"), None, None)),
    ("gph", EntityPlan::sensor("", Some("gph"), None, None)),
];

/// Output types reporting a percentage level in status[1].
pub(crate) const LEVEL_TYPES: &[&str] = &["variable", "serial", "sky", "moon"];

/// Output types reporting a plain ON/OFF switch state in status[0].
pub(crate) const SWITCH_TYPES: &[&str] = &["outlet", "24v", "virtual", "afs", "dos", "selector"];

/// Classify one input record's type. Unknown types are not monitored.
pub fn classify_input(channel_type: &str) -> Option<EntityPlan> {
    INPUT_TABLE
        .iter()
        .find(|(ty, _)| *ty == channel_type)
        .map(|(_, plan)| *plan)
}

/// Classify one output record's type into every entity it registers.
/// Returns an empty vec for unknown types.
pub fn classify_output(channel_type: &str) -> Vec<EntityPlan> {
    let mut plans = Vec::new();

    if LEVEL_TYPES.contains(&channel_type) {
        plans.push(EntityPlan::sensor("", Some("%"), None, None));
    }
    if channel_type == "alert" {
        plans.push(EntityPlan::binary("", Some("problem")));
    }
    if SWITCH_TYPES.contains(&channel_type) {
        plans.push(EntityPlan::binary("", Some("power")));
    }

    // COR pumps expose duty cycle, RPM and wattage next to the switch state.
    if channel_type.contains("cor") {
        plans.push(EntityPlan::binary("", Some("power")));
        plans.push(EntityPlan::sensor("_1", Some("%"), None, Some("Duty")));
        plans.push(EntityPlan::sensor("_4", Some("RPM"), None, Some("RPM")));
        plans.push(EntityPlan::sensor("_6", Some("W"), Some("power"), Some("Power")));
    }

    // WAV powerheads report temperature instead of wattage.
    if channel_type == "wav" {
        plans.push(EntityPlan::binary("", Some("power")));
        plans.push(EntityPlan::sensor("_1", Some("%"), None, Some("Duty")));
        plans.push(EntityPlan::sensor("_4", Some("RPM"), None, Some("RPM")));
        plans.push(EntityPlan::sensor(
            "_5",
            Some("°F"),
            Some("temperature"),
            Some("Temperature"),
        ));
    }

    // DOS pumps get a dosage sensor on top of the switch entity above.
    if channel_type == "dos" {
        plans.push(EntityPlan::sensor("_4", Some("ml"), None, Some("total dosage")));
    }

    plans
}
