//! Vertical card display for records, schemas and property sets.

use std::fmt::Write as _;

use serde_json::Value;
use slotbook_core::{CrmRecord, PropertySet, RoleResolution, SearchResults};
use slotbook_crm::Discovery;

const MAX_OPTIONS: usize = 10;

// ── Public API ──

/// Render one record as a card: id header, properties, then timestamps.
pub fn record_card(record: &CrmRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ===", record.id);

    let props: Vec<(&str, String)> = record
        .properties
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.as_str(), scalar(v)))
        .collect();
    section(&mut out, "Properties", &props);

    let stamps: Vec<(&str, String)> = [
        ("created_at", record.created_at.clone()),
        ("updated_at", record.updated_at.clone()),
        ("archived", record.archived.map(|a| a.to_string())),
    ]
    .into_iter()
    .filter_map(|(k, v)| v.map(|v| (k, v)))
    .collect();
    section(&mut out, "Timestamps", &stamps);
    out
}

/// Render search results: a count line followed by one card per record.
pub fn search_cards(results: &SearchResults) -> String {
    let mut out = format!(
        "{} of {} matching appointment(s)\n",
        results.results.len(),
        results.total
    );
    for record in &results.results {
        out.push('\n');
        out.push_str(&record_card(record));
    }
    out
}

/// Render a discovered schema and how the booking roles resolved against it.
pub fn discovery_card(d: &Discovery) -> String {
    let mut out = String::new();
    if !d.schema_available {
        out.push_str("Schema unavailable: using configured field names\n\n");
    }

    let roles = [
        ("date", &d.fields.date.name, d.fields.date.resolution),
        ("category", &d.fields.category.name, d.fields.category.resolution),
    ]
    .map(|(role, name, how)| (role, format!("{name} ({})", resolution(how))));
    section(&mut out, "Roles", &roles);

    let primary = d
        .schema
        .primary_display_field
        .clone()
        .unwrap_or_else(|| "-".to_string());
    section(&mut out, "Display", &[("primary", primary)]);

    let fields: Vec<(&str, String)> = d
        .schema
        .fields
        .iter()
        .map(|f| {
            let mut desc = f.data_type.to_string();
            if d.schema.required.contains(&f.name) {
                desc.push_str(", required");
            }
            if f.read_only {
                desc.push_str(", read-only");
            }
            if f.is_enumerated() {
                let shown: Vec<&str> = f
                    .options
                    .iter()
                    .take(MAX_OPTIONS)
                    .filter_map(|o| o.identity())
                    .collect();
                let _ = write!(desc, " [{}", shown.join(", "));
                if f.options.len() > MAX_OPTIONS {
                    let _ = write!(desc, ", ... +{} more", f.options.len() - MAX_OPTIONS);
                }
                desc.push(']');
            }
            (f.name.as_str(), desc)
        })
        .collect();
    section(&mut out, "Fields", &fields);
    out
}

/// Render the property set that would be or was submitted.
pub fn properties_card(props: &PropertySet) -> String {
    let rows: Vec<(&str, String)> = props.iter().map(|(k, v)| (k, v.to_string())).collect();
    let mut out = String::new();
    section(&mut out, "Submitted", &rows);
    out
}

// ── Section rendering ──

fn section<K: AsRef<str>>(out: &mut String, header: &str, rows: &[(K, String)]) {
    if rows.is_empty() {
        return;
    }
    let _ = writeln!(out, "{header}");
    for (key, value) in rows {
        let _ = writeln!(out, "  {:<26} {}", key.as_ref(), value);
    }
    out.push('\n');
}

fn scalar(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn resolution(r: RoleResolution) -> &'static str {
    match r {
        RoleResolution::Explicit => "configured",
        RoleResolution::Inferred => "inferred",
        RoleResolution::Default => "default, unverified",
    }
}
