//! Power supply properties
//!
//! Property identifiers, typed values and the constant lookup table the
//! dummy battery answers queries from. Values render the way the power supply
//! class exposes them in sysfs (`Full`, `Li-ion`, `1`, ...).

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Query for a property the battery does not expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Unsupported property: {id:#x}")]
pub struct UnsupportedProperty {
    pub id: u32,
}

/// Power supply property identifiers known to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PowerSupplyProperty {
    Status,
    ChargeType,
    Health,
    Present,
    Online,
    Technology,
    VoltageNow,
    CurrentNow,
    Capacity,
    CapacityLevel,
    Temp,
    ModelName,
}

impl PowerSupplyProperty {
    /// All known properties in raw id order
    pub fn all() -> &'static [PowerSupplyProperty] {
        &[
            PowerSupplyProperty::Status,
            PowerSupplyProperty::ChargeType,
            PowerSupplyProperty::Health,
            PowerSupplyProperty::Present,
            PowerSupplyProperty::Online,
            PowerSupplyProperty::Technology,
            PowerSupplyProperty::VoltageNow,
            PowerSupplyProperty::CurrentNow,
            PowerSupplyProperty::Capacity,
            PowerSupplyProperty::CapacityLevel,
            PowerSupplyProperty::Temp,
            PowerSupplyProperty::ModelName,
        ]
    }

    /// Raw identifier carried on the host side
    pub fn id(self) -> u32 {
        self as u32
    }

    /// Resolve a raw identifier
    pub fn from_raw(id: u32) -> Option<Self> {
        Self::all().get(usize::try_from(id).ok()?).copied()
    }

    /// Get sysfs attribute name
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerSupplyProperty::Status => "status",
            PowerSupplyProperty::ChargeType => "charge_type",
            PowerSupplyProperty::Health => "health",
            PowerSupplyProperty::Present => "present",
            PowerSupplyProperty::Online => "online",
            PowerSupplyProperty::Technology => "technology",
            PowerSupplyProperty::VoltageNow => "voltage_now",
            PowerSupplyProperty::CurrentNow => "current_now",
            PowerSupplyProperty::Capacity => "capacity",
            PowerSupplyProperty::CapacityLevel => "capacity_level",
            PowerSupplyProperty::Temp => "temp",
            PowerSupplyProperty::ModelName => "model_name",
        }
    }

    /// Parse from sysfs attribute name
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|p| p.as_str() == s.trim())
    }
}

/// Battery charging status
///
/// Serializes to the same strings sysfs shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatteryStatus {
    Unknown,
    Charging,
    Discharging,
    #[serde(rename = "Not charging")]
    NotCharging,
    Full,
}

impl BatteryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatteryStatus::Unknown => "Unknown",
            BatteryStatus::Charging => "Charging",
            BatteryStatus::Discharging => "Discharging",
            BatteryStatus::NotCharging => "Not charging",
            BatteryStatus::Full => "Full",
        }
    }
}

/// Battery cell chemistry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Technology {
    Unknown,
    NiMH,
    #[serde(rename = "Li-ion")]
    LiIon,
    #[serde(rename = "Li-poly")]
    LiPoly,
    LiFe,
    NiCd,
    LiMn,
}

impl Technology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Technology::Unknown => "Unknown",
            Technology::NiMH => "NiMH",
            Technology::LiIon => "Li-ion",
            Technology::LiPoly => "Li-poly",
            Technology::LiFe => "LiFe",
            Technology::NiCd => "NiCd",
            Technology::LiMn => "LiMn",
        }
    }
}

/// Coarse charge level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CapacityLevel {
    Unknown,
    Critical,
    Low,
    Normal,
    High,
    Full,
}

impl CapacityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapacityLevel::Unknown => "Unknown",
            CapacityLevel::Critical => "Critical",
            CapacityLevel::Low => "Low",
            CapacityLevel::Normal => "Normal",
            CapacityLevel::High => "High",
            CapacityLevel::Full => "Full",
        }
    }
}

/// Typed answer to a property query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Status(BatteryStatus),
    Technology(Technology),
    CapacityLevel(CapacityLevel),
    Bool(bool),
    Int(i32),
}

impl PropertyValue {
    /// Integer form as carried by the host (enum ordinal for enumerated values)
    pub fn intval(&self) -> i32 {
        match *self {
            PropertyValue::Status(status) => status as i32,
            PropertyValue::Technology(technology) => technology as i32,
            PropertyValue::CapacityLevel(level) => level as i32,
            PropertyValue::Bool(flag) => i32::from(flag),
            PropertyValue::Int(value) => value,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Status(status) => f.write_str(status.as_str()),
            PropertyValue::Technology(technology) => f.write_str(technology.as_str()),
            PropertyValue::CapacityLevel(level) => f.write_str(level.as_str()),
            PropertyValue::Bool(flag) => write!(f, "{}", i32::from(*flag)),
            PropertyValue::Int(value) => write!(f, "{}", value),
        }
    }
}

/// Properties the dummy battery answers, in publication order
pub const SUPPORTED_PROPERTIES: &[PowerSupplyProperty] = &[
    PowerSupplyProperty::Status,
    PowerSupplyProperty::Present,
    PowerSupplyProperty::Technology,
    PowerSupplyProperty::Capacity,
    PowerSupplyProperty::CapacityLevel,
    PowerSupplyProperty::CurrentNow,
];

/// Answer a property query for the dummy battery.
///
/// Pure lookup over a closed enumeration: no state, no I/O, safe to call from
/// any thread. Handed to the registry as the supply's query callback.
pub fn get_property(property: PowerSupplyProperty) -> Result<PropertyValue, UnsupportedProperty> {
    let value = match property {
        PowerSupplyProperty::Status => PropertyValue::Status(BatteryStatus::Full),
        PowerSupplyProperty::Present => PropertyValue::Bool(true),
        PowerSupplyProperty::Technology => PropertyValue::Technology(Technology::LiIon),
        PowerSupplyProperty::Capacity => PropertyValue::Int(100),
        PowerSupplyProperty::CapacityLevel => PropertyValue::CapacityLevel(CapacityLevel::Full),
        PowerSupplyProperty::CurrentNow => PropertyValue::Int(0),
        other => return Err(UnsupportedProperty { id: other.id() }),
    };

    Ok(value)
}

/// Same lookup keyed by a raw identifier
pub fn query_raw(id: u32) -> Result<PropertyValue, UnsupportedProperty> {
    PowerSupplyProperty::from_raw(id)
        .ok_or(UnsupportedProperty { id })
        .and_then(get_property)
}
