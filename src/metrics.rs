use plist::{Dictionary, Value};
use serde::Serialize;

use crate::error::ReporterError;

/// Raw `Temperature` is hundredths of a degree Celsius (3150 -> 31.50 C).
const TEMPERATURE_DIVISOR: f64 = 100.0;
/// Raw `Voltage` is millivolts.
const VOLTAGE_DIVISOR: f64 = 1000.0;
/// mV x mA -> W.
const POWER_DIVISOR: f64 = 1_000_000.0;

/// A node carrying none of these keys is not smart-battery data (for example a
/// machine with no battery) and extraction is refused outright.
const BATTERY_SIGNATURE_KEYS: &[&str] =
    &["DesignCapacity", "AppleRawMaxCapacity", "CycleCount", "Voltage"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChargingStatus {
    FullyCharged,
    Charging,
    NotCharging,
    Discharging,
}

impl ChargingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargingStatus::FullyCharged => "Fully Charged",
            ChargingStatus::Charging => "Charging",
            ChargingStatus::NotCharging => "Not Charging",
            ChargingStatus::Discharging => "Discharging",
        }
    }
}

/// Flat battery telemetry record. Optional fields are `None` when the firmware
/// does not report them; absence never fails the extraction.
///
/// Sign convention: `amperage_ma` is negative while discharging, positive while
/// charging, as reported by the battery controller.
#[derive(Debug, Clone, Serialize)]
pub struct BatteryMetrics {
    pub serial: Option<String>,
    pub device_name: Option<String>,
    pub manufacturer: Option<String>,

    pub design_capacity_mah: Option<i64>,
    pub current_max_capacity_mah: Option<i64>,
    pub nominal_charge_capacity_mah: Option<i64>,
    pub raw_current_capacity_mah: Option<i64>,
    /// System-reported charge percentage (`CurrentCapacity`).
    pub current_capacity_pct: Option<i64>,
    pub cycle_count: Option<i64>,

    pub voltage_mv: Option<i64>,
    pub voltage_v: Option<f64>,
    pub amperage_ma: Option<i64>,
    pub power_watts: Option<f64>,
    pub adapter_watts: Option<i64>,

    pub temperature_raw: Option<i64>,
    pub temperature_c: Option<f64>,

    /// Current max capacity over design capacity, as a percentage clamped to
    /// 0..=100. `None` means unavailable: design capacity missing or zero.
    pub health_percent: Option<f64>,
    /// Set when the raw health ratio fell outside 0..=100 before clamping.
    pub health_out_of_range: bool,
    pub wear_percent: Option<f64>,
    /// Raw current capacity over raw max capacity, as a percentage.
    pub charge_percent: Option<f64>,

    pub time_remaining_min: Option<i64>,
    pub avg_time_to_empty_min: Option<i64>,
    pub instant_time_to_empty_min: Option<i64>,
    pub external_connected: Option<bool>,
    pub charging_status: ChargingStatus,
}

/// Walks the battery service dictionary and derives the health metrics.
///
/// Fails with `MissingRequiredField` only when the node carries no battery
/// signature keys at all; individual missing fields degrade to `None`, and the
/// health percentage is left unavailable rather than dividing by zero.
pub fn extract(node: &Dictionary) -> Result<BatteryMetrics, ReporterError> {
    if !BATTERY_SIGNATURE_KEYS
        .iter()
        .any(|key| node.get(key).is_some())
    {
        return Err(ReporterError::MissingRequiredField(format!(
            "none of {BATTERY_SIGNATURE_KEYS:?} present"
        )));
    }

    let design_capacity_mah = get_int(node, "DesignCapacity");
    let current_max_capacity_mah = get_int(node, "AppleRawMaxCapacity");
    let raw_current_capacity_mah = get_int(node, "AppleRawCurrentCapacity");
    let cycle_count = get_int(node, "CycleCount");

    let voltage_mv = get_int(node, "Voltage");
    let voltage_v = voltage_mv.map(|mv| mv as f64 / VOLTAGE_DIVISOR);
    let amperage_ma = get_int(node, "Amperage");
    let power_watts = match (voltage_mv, amperage_ma) {
        (Some(mv), Some(ma)) => Some((mv as f64 * (ma as f64).abs()) / POWER_DIVISOR),
        _ => None,
    };
    let adapter_watts = adapter_watts(node);

    let temperature_raw = get_int(node, "Temperature");
    let temperature_c = temperature_raw.map(|raw| raw as f64 / TEMPERATURE_DIVISOR);

    let raw_health = match (current_max_capacity_mah, design_capacity_mah) {
        (Some(max), Some(design)) if design > 0 => Some(max as f64 / design as f64 * 100.0),
        _ => None,
    };
    let health_out_of_range = raw_health.is_some_and(|h| !(0.0..=100.0).contains(&h));
    let health_percent = raw_health.map(|h| h.clamp(0.0, 100.0));
    let wear_percent = health_percent.map(|h| 100.0 - h);

    let charge_percent = match (raw_current_capacity_mah, current_max_capacity_mah) {
        (Some(current), Some(max)) if max > 0 => Some(current as f64 / max as f64 * 100.0),
        _ => None,
    };

    let external_connected = get_bool(node, "ExternalConnected");
    let charging_status = charging_status(
        get_bool(node, "FullyCharged").unwrap_or(false),
        get_bool(node, "IsCharging").unwrap_or(false),
        external_connected.unwrap_or(false),
    );

    Ok(BatteryMetrics {
        serial: get_string(node, "Serial"),
        device_name: get_string(node, "DeviceName"),
        manufacturer: get_string(node, "Manufacturer"),
        design_capacity_mah,
        current_max_capacity_mah,
        nominal_charge_capacity_mah: get_int(node, "NominalChargeCapacity"),
        raw_current_capacity_mah,
        current_capacity_pct: get_int(node, "CurrentCapacity"),
        cycle_count,
        voltage_mv,
        voltage_v,
        amperage_ma,
        power_watts,
        adapter_watts,
        temperature_raw,
        temperature_c,
        health_percent,
        health_out_of_range,
        wear_percent,
        charge_percent,
        time_remaining_min: get_int(node, "TimeRemaining"),
        avg_time_to_empty_min: get_int(node, "AvgTimeToEmpty"),
        instant_time_to_empty_min: get_int(node, "InstantTimeToEmpty"),
        external_connected,
        charging_status,
    })
}

fn charging_status(fully_charged: bool, is_charging: bool, external: bool) -> ChargingStatus {
    if fully_charged {
        ChargingStatus::FullyCharged
    } else if is_charging {
        ChargingStatus::Charging
    } else if external {
        ChargingStatus::NotCharging
    } else {
        ChargingStatus::Discharging
    }
}

/// Adapter wattage from the first populated `AppleRawAdapterDetails` entry.
fn adapter_watts(node: &Dictionary) -> Option<i64> {
    node.get("AppleRawAdapterDetails")
        .and_then(Value::as_array)
        .and_then(|adapters| {
            adapters.iter().find_map(|adapter| {
                adapter
                    .as_dictionary()
                    .and_then(|details| details.get("Watts"))
                    .and_then(Value::as_signed_integer)
            })
        })
}

fn get_int(node: &Dictionary, key: &str) -> Option<i64> {
    node.get(key).and_then(Value::as_signed_integer)
}

fn get_bool(node: &Dictionary, key: &str) -> Option<bool> {
    node.get(key).and_then(Value::as_boolean)
}

fn get_string(node: &Dictionary, key: &str) -> Option<String> {
    node.get(key)
        .and_then(Value::as_string)
        .map(|s| s.to_string())
}
