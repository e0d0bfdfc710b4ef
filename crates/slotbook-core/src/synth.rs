//! Property synthesis: turn a date and a language list into a property set
//! the schema will accept.
//!
//! The steps run in a fixed order and each one only fills what the previous
//! ones left open, except enum normalisation, which deliberately rewrites
//! the caller's category value:
//!
//! 1. seed the two role fields with the caller's values
//! 2. add a display label if the schema has a primary display field
//! 3. normalise the category value to one of the field's options
//! 4. fill every remaining required, writable field with a typed placeholder

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::property::{PropertySet, PropertyValue};
use crate::resolve::ResolvedFieldMap;
use crate::schema::{FieldDefinition, FieldType, SchemaDescriptor};

/// Caller-supplied values for one booking.
#[derive(Debug, Clone, Copy)]
pub struct Seed<'a> {
    /// Meeting date, `YYYY-MM-DD`.
    pub date: &'a str,
    /// Comma-separated language preferences.
    pub category_csv: &'a str,
    /// Leading text of the display label.
    pub label_prefix: &'a str,
}

/// Build the property set for one booking.
///
/// Never fails: a required field that cannot be classified gets a string
/// placeholder.
pub fn synthesize(
    schema: &SchemaDescriptor,
    resolved: &ResolvedFieldMap,
    seed: &Seed<'_>,
    primary_display_field: Option<&str>,
) -> PropertySet {
    synthesize_at(schema, resolved, seed, primary_display_field, Utc::now())
}

/// [`synthesize`] with an explicit clock for datetime placeholders.
pub fn synthesize_at(
    schema: &SchemaDescriptor,
    resolved: &ResolvedFieldMap,
    seed: &Seed<'_>,
    primary_display_field: Option<&str>,
    now: DateTime<Utc>,
) -> PropertySet {
    let mut props = PropertySet::new();
    props.insert(resolved.date_field(), seed.date);
    props.insert(resolved.category_field(), seed.category_csv);

    if let Some(primary) = primary_display_field
        && !props.is_set(primary)
    {
        props.insert(primary, display_label(seed));
    }

    if let Some(field) = schema.field(resolved.category_field())
        && let Some(choice) = normalize_option(field, seed.category_csv)
    {
        props.insert(resolved.category_field(), choice);
    }

    for name in &schema.required {
        if props.is_set(name) {
            continue;
        }
        let def = schema.field(name);
        if def.is_some_and(|d| d.read_only) {
            continue;
        }
        props.insert(name.as_str(), placeholder(def, seed.date, now));
    }

    props
}

/// Human-readable label for the primary display field.
pub fn display_label(seed: &Seed<'_>) -> String {
    format!("{} {} - {}", seed.label_prefix, seed.date, seed.category_csv)
}

/// Pick the option of an enumerated field that the caller's list asks for.
///
/// The first comma-separated token that exactly equals an option identity
/// wins; with no match the field's first declared option is used. Returns
/// `None` when the field has no usable options, leaving the caller's value
/// untouched.
pub fn normalize_option(field: &FieldDefinition, csv: &str) -> Option<String> {
    if !field.is_enumerated() {
        return None;
    }
    csv.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .find(|token| field.accepts_option(token))
        .or_else(|| field.first_option())
        .map(str::to_string)
}

/// Placeholder value for a required field the caller did not supply.
///
/// `def` is `None` when the schema lists the field as required but never
/// defines it; such fields get the string placeholder.
pub fn placeholder(def: Option<&FieldDefinition>, date: &str, now: DateTime<Utc>) -> PropertyValue {
    let Some(def) = def else {
        return PropertyValue::Text(format!("Auto-{date}"));
    };
    if def.is_enumerated() {
        return PropertyValue::Text(def.first_option().unwrap_or("Auto").to_string());
    }
    match &def.data_type {
        FieldType::Number => PropertyValue::Number(0),
        FieldType::Boolean => PropertyValue::Bool(false),
        FieldType::Date => PropertyValue::Number(midnight_utc_millis(date, now)),
        FieldType::DateTime => PropertyValue::Number(now.timestamp_millis()),
        FieldType::String | FieldType::Other(_) => PropertyValue::Text(format!("Auto-{date}")),
    }
}

/// Epoch milliseconds of midnight UTC on `date`'s calendar day.
///
/// An unparseable date falls back to `now`'s day.
pub fn midnight_utc_millis(date: &str, now: DateTime<Utc>) -> i64 {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .unwrap_or_else(|_| now.date_naive())
        .and_time(NaiveTime::MIN)
        .and_utc()
        .timestamp_millis()
}
