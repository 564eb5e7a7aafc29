use std::collections::HashSet;

use serde_json::{json, Value};

/// Notion property type for a report column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Number,
    /// Number rendered as a percentage; values are uploaded as fractions.
    NumberPercent,
    /// Select over the charging status options.
    ChargingSelect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
}

/// Columns the report row writes into, in creation order. The database's title
/// column ("Date") always exists and is not listed here.
pub const REQUIRED_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec { name: "Real Health %", kind: ColumnKind::NumberPercent },
    ColumnSpec { name: "Design Capacity (mAh)", kind: ColumnKind::Number },
    ColumnSpec { name: "Current Max Capacity (mAh)", kind: ColumnKind::Number },
    ColumnSpec { name: "Cycle Count", kind: ColumnKind::Number },
    ColumnSpec { name: "Temperature (C)", kind: ColumnKind::Number },
    ColumnSpec { name: "Voltage (V)", kind: ColumnKind::Number },
    ColumnSpec { name: "Amperage (mA)", kind: ColumnKind::Number },
    ColumnSpec { name: "Watts", kind: ColumnKind::Number },
    ColumnSpec { name: "Time Remaining (Min)", kind: ColumnKind::Number },
    ColumnSpec { name: "Charging Status", kind: ColumnKind::ChargingSelect },
];

const CHARGING_STATUS_OPTIONS: &[(&str, &str)] = &[
    ("Charging", "green"),
    ("Discharging", "orange"),
    ("Fully Charged", "blue"),
    ("Not Charging", "gray"),
];

impl ColumnSpec {
    /// Property definition payload for a create-column request.
    pub fn definition(&self) -> Value {
        match self.kind {
            ColumnKind::Number => json!({ "number": { "format": "number" } }),
            ColumnKind::NumberPercent => json!({ "number": { "format": "percent" } }),
            ColumnKind::ChargingSelect => {
                let options: Vec<Value> = CHARGING_STATUS_OPTIONS
                    .iter()
                    .map(|(name, color)| json!({ "name": name, "color": color }))
                    .collect();
                json!({ "select": { "options": options } })
            }
        }
    }
}

/// Columns created during one schema reconciliation. Empty means the remote
/// schema was already satisfied.
#[derive(Debug, Clone, Default)]
pub struct SchemaDiff {
    pub created: Vec<String>,
}

/// Ordered set difference: required columns absent from the fetched schema.
pub fn missing_columns<'a>(
    required: &'a [ColumnSpec],
    existing: &HashSet<String>,
) -> Vec<&'a ColumnSpec> {
    required
        .iter()
        .filter(|column| !existing.contains(column.name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn existing(names: &[&str]) -> HashSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn reports_missing_columns_in_required_order() {
        let existing = existing(&["Cycle Count", "Voltage (V)", "Date"]);
        let missing = missing_columns(REQUIRED_COLUMNS, &existing);
        let names: Vec<&str> = missing.iter().map(|column| column.name).collect();
        assert_eq!(
            names,
            vec![
                "Real Health %",
                "Design Capacity (mAh)",
                "Current Max Capacity (mAh)",
                "Temperature (C)",
                "Amperage (mA)",
                "Watts",
                "Time Remaining (Min)",
                "Charging Status",
            ]
        );
    }

    #[test]
    fn satisfied_schema_needs_no_columns() {
        let existing: HashSet<String> = REQUIRED_COLUMNS
            .iter()
            .map(|column| column.name.to_string())
            .collect();
        assert!(missing_columns(REQUIRED_COLUMNS, &existing).is_empty());
    }

    #[test]
    fn reconciliation_is_idempotent() {
        // After creating everything the first diff reported, a second diff
        // against the updated schema is empty.
        let mut existing = existing(&["Date"]);
        let first: Vec<String> = missing_columns(REQUIRED_COLUMNS, &existing)
            .iter()
            .map(|column| column.name.to_string())
            .collect();
        assert_eq!(first.len(), REQUIRED_COLUMNS.len());
        existing.extend(first);
        assert!(missing_columns(REQUIRED_COLUMNS, &existing).is_empty());
    }

    #[test]
    fn select_definition_carries_status_options() {
        let spec = ColumnSpec { name: "Charging Status", kind: ColumnKind::ChargingSelect };
        let definition = spec.definition();
        let options = definition["select"]["options"].as_array().unwrap();
        assert_eq!(options.len(), 4);
        assert_eq!(options[0]["name"], "Charging");
    }
}
