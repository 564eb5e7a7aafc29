use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::metrics::BatteryMetrics;

/// One outbound report row: the extracted metrics plus the capture timestamp.
/// Insert-only; every run creates a new page in the target database.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRecord {
    pub metrics: BatteryMetrics,
    pub captured_at: DateTime<Utc>,
}

impl ReportRecord {
    pub fn new(metrics: BatteryMetrics, captured_at: DateTime<Utc>) -> Self {
        Self { metrics, captured_at }
    }

    /// Title cell content for the "Date" column.
    pub fn title(&self) -> String {
        self.captured_at.format("%Y-%m-%d %H:%M").to_string()
    }

    /// Full create-page request body: parent database, property row, and the
    /// engineering-report page body.
    pub fn to_page_payload(&self, database_id: &str) -> Value {
        json!({
            "parent": { "database_id": database_id },
            "properties": self.properties(),
            "children": self.children(),
        })
    }

    /// Property values keyed by column name. Metrics the firmware did not
    /// report are omitted entirely; the remote API rejects null numbers.
    pub fn properties(&self) -> Value {
        let m = &self.metrics;
        let mut props = Map::new();
        props.insert(
            "Date".to_string(),
            json!({ "title": [{ "text": { "content": self.title() } }] }),
        );
        push_percent(&mut props, "Real Health %", m.health_percent);
        push_number(&mut props, "Design Capacity (mAh)", m.design_capacity_mah.map(|v| v as f64));
        push_number(
            &mut props,
            "Current Max Capacity (mAh)",
            m.current_max_capacity_mah.map(|v| v as f64),
        );
        push_number(&mut props, "Cycle Count", m.cycle_count.map(|v| v as f64));
        push_number(&mut props, "Temperature (C)", m.temperature_c);
        push_number(&mut props, "Voltage (V)", m.voltage_v);
        push_number(&mut props, "Amperage (mA)", m.amperage_ma.map(|v| v as f64));
        push_number(&mut props, "Watts", m.power_watts);
        push_number(&mut props, "Time Remaining (Min)", m.time_remaining_min.map(|v| v as f64));
        props.insert(
            "Charging Status".to_string(),
            json!({ "select": { "name": m.charging_status.as_str() } }),
        );
        Value::Object(props)
    }

    /// Page body blocks: bulleted sections mirroring the report row, followed
    /// by a raw JSON dump of the full record.
    pub fn children(&self) -> Vec<Value> {
        let m = &self.metrics;
        let mut blocks = Vec::new();

        blocks.push(heading2("Power Flow"));
        push_bullets(
            &mut blocks,
            &[
                format!(
                    "Voltage: {} ({})",
                    fmt_f64(m.voltage_v, "V"),
                    fmt_i64(m.voltage_mv, "mV")
                ),
                format!("Amperage: {}", fmt_i64(m.amperage_ma, "mA")),
                format!("Power Draw: {}", fmt_f64(m.power_watts, "W")),
                format!("Status: {}", m.charging_status.as_str()),
                format!(
                    "External Power: {}",
                    match m.external_connected {
                        Some(true) => "Connected",
                        Some(false) => "Disconnected",
                        None => "Unknown",
                    }
                ),
            ],
        );

        blocks.push(heading2("Health Diagnostics"));
        push_bullets(
            &mut blocks,
            &[
                format!("Real Health: {}", fmt_f64(m.health_percent, "%")),
                format!("Wear Level: {}", fmt_f64(m.wear_percent, "%")),
                format!("Cycle Count: {}", fmt_i64(m.cycle_count, "")),
                format!("Temperature: {}", fmt_f64(m.temperature_c, " C")),
            ],
        );

        blocks.push(heading2("Capacity Analysis"));
        push_bullets(
            &mut blocks,
            &[
                format!("Design Capacity: {}", fmt_i64(m.design_capacity_mah, " mAh")),
                format!(
                    "Current Max Capacity: {}",
                    fmt_i64(m.current_max_capacity_mah, " mAh")
                ),
                format!(
                    "Raw Current Charge: {}",
                    fmt_i64(m.raw_current_capacity_mah, " mAh")
                ),
                format!("Real Percentage: {}", fmt_f64(m.charge_percent, "%")),
                format!("Time Remaining: {}", fmt_i64(m.time_remaining_min, " min")),
            ],
        );

        blocks.push(heading2("Device Information"));
        push_bullets(
            &mut blocks,
            &[
                format!("Serial: {}", m.serial.as_deref().unwrap_or("Unknown")),
                format!("Device Name: {}", m.device_name.as_deref().unwrap_or("Unknown")),
                format!(
                    "Manufacturer: {}",
                    m.manufacturer.as_deref().unwrap_or("Unknown")
                ),
                format!("Timestamp: {}", self.captured_at.to_rfc3339()),
            ],
        );

        blocks.push(json!({ "object": "block", "type": "divider", "divider": {} }));
        blocks.push(heading3("Raw Metrics (JSON)"));
        blocks.push(json!({
            "object": "block",
            "type": "code",
            "code": {
                "rich_text": [text_span(&serde_json::to_string_pretty(self).unwrap_or_default())],
                "language": "json",
            },
        }));

        blocks
    }
}

fn push_number(props: &mut Map<String, Value>, name: &str, value: Option<f64>) {
    if let Some(value) = value {
        props.insert(name.to_string(), json!({ "number": round2(value) }));
    }
}

/// Percent columns take fractions at four-decimal resolution: 84.57% uploads
/// as 0.8457, not 0.85.
fn push_percent(props: &mut Map<String, Value>, name: &str, value: Option<f64>) {
    if let Some(value) = value {
        let fraction = (value / 100.0 * 10_000.0).round() / 10_000.0;
        props.insert(name.to_string(), json!({ "number": fraction }));
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn fmt_f64(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(value) => format!("{}{unit}", round2(value)),
        None => "n/a".to_string(),
    }
}

fn fmt_i64(value: Option<i64>, unit: &str) -> String {
    match value {
        Some(value) => format!("{value}{unit}"),
        None => "n/a".to_string(),
    }
}

fn text_span(content: &str) -> Value {
    json!({ "type": "text", "text": { "content": content } })
}

fn heading2(text: &str) -> Value {
    json!({
        "object": "block",
        "type": "heading_2",
        "heading_2": { "rich_text": [text_span(text)] },
    })
}

fn heading3(text: &str) -> Value {
    json!({
        "object": "block",
        "type": "heading_3",
        "heading_3": { "rich_text": [text_span(text)] },
    })
}

fn push_bullets(blocks: &mut Vec<Value>, lines: &[String]) {
    for line in lines {
        blocks.push(json!({
            "object": "block",
            "type": "bulleted_list_item",
            "bulleted_list_item": { "rich_text": [text_span(line)] },
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{ChargingStatus, extract};
    use chrono::TimeZone;
    use plist::{Dictionary, Value as Plist};

    fn sample_record() -> ReportRecord {
        let mut node = Dictionary::new();
        node.insert("DesignCapacity".to_string(), Plist::from(6000));
        node.insert("AppleRawMaxCapacity".to_string(), Plist::from(5100));
        node.insert("CycleCount".to_string(), Plist::from(312));
        node.insert("Voltage".to_string(), Plist::from(12100));
        node.insert("Amperage".to_string(), Plist::from(-450));
        let captured_at = Utc.with_ymd_and_hms(2026, 2, 1, 8, 30, 0).unwrap();
        ReportRecord::new(extract(&node).unwrap(), captured_at)
    }

    #[test]
    fn health_uploads_as_percent_fraction() {
        let properties = sample_record().properties();
        assert_eq!(properties["Real Health %"]["number"], json!(0.85));
    }

    #[test]
    fn sub_percent_health_survives_upload_rounding() {
        let mut node = Dictionary::new();
        node.insert("DesignCapacity".to_string(), Plist::from(10000));
        node.insert("AppleRawMaxCapacity".to_string(), Plist::from(8457));
        let captured_at = Utc.with_ymd_and_hms(2026, 2, 1, 8, 30, 0).unwrap();
        let record = ReportRecord::new(extract(&node).unwrap(), captured_at);
        assert_eq!(record.properties()["Real Health %"]["number"], json!(0.8457));
    }

    #[test]
    fn absent_metrics_are_omitted_not_null() {
        let properties = sample_record().properties();
        assert!(properties.get("Temperature (C)").is_none());
        assert!(properties.get("Watts").is_some());
    }

    #[test]
    fn title_is_minute_resolution_timestamp() {
        let record = sample_record();
        assert_eq!(record.title(), "2026-02-01 08:30");
        assert_eq!(
            record.properties()["Date"]["title"][0]["text"]["content"],
            json!("2026-02-01 08:30")
        );
    }

    #[test]
    fn select_cell_uses_display_name() {
        let record = sample_record();
        assert_eq!(record.metrics.charging_status, ChargingStatus::Discharging);
        assert_eq!(
            record.properties()["Charging Status"]["select"]["name"],
            json!("Discharging")
        );
    }

    #[test]
    fn page_payload_targets_parent_database() {
        let payload = sample_record().to_page_payload("db-42");
        assert_eq!(payload["parent"]["database_id"], json!("db-42"));
        assert!(payload["children"].as_array().unwrap().len() > 10);
    }
}
