//! Record-type schema as discovered from the CRM at call time.
//!
//! The CRM owns the schema and may change it between calls, so a
//! [`SchemaDescriptor`] is a read-only snapshot: fetched, used for one
//! booking, then dropped. The wire types at the bottom of this module mirror
//! the `GET /crm/v3/schemas/{objectType}` response and are deliberately
//! lenient: anything missing or oddly shaped degrades to "unknown" instead
//! of failing the parse.

use std::collections::BTreeSet;
use std::fmt;

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Declared data type of a schema field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    DateTime,
    /// Any type name the resolver does not classify, kept verbatim
    /// (e.g. `enumeration`, `phone_number`).
    Other(String),
}

impl FieldType {
    /// Classify a type name as declared by the CRM.
    pub fn from_declared(name: &str) -> Self {
        match name {
            "string" => Self::String,
            "number" => Self::Number,
            "bool" | "boolean" => Self::Boolean,
            "date" => Self::Date,
            "datetime" => Self::DateTime,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Date | Self::DateTime)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Number => f.write_str("number"),
            Self::Boolean => f.write_str("boolean"),
            Self::Date => f.write_str("date"),
            Self::DateTime => f.write_str("datetime"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// One allowed value of an enumerated field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    #[serde(default, deserialize_with = "scalar_string")]
    pub value: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub label: Option<String>,
}

impl FieldOption {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            label: None,
        }
    }

    pub fn labelled(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            label: Some(label.into()),
        }
    }

    /// The identity the CRM accepts for this option: its value, or its
    /// label when the value is absent.
    pub fn identity(&self) -> Option<&str> {
        self.value.as_deref().or(self.label.as_deref())
    }
}

/// A single field of a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: String,
    pub data_type: FieldType,
    pub options: Vec<FieldOption>,
    pub read_only: bool,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, data_type: FieldType) -> Self {
        Self {
            name: name.into(),
            data_type,
            options: Vec::new(),
            read_only: false,
        }
    }

    pub fn with_options(mut self, options: Vec<FieldOption>) -> Self {
        self.options = options;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// A field with any declared options is enumerated, whatever its type.
    pub fn is_enumerated(&self) -> bool {
        !self.options.is_empty()
    }

    /// Identity of the first declared option, the default of last resort.
    pub fn first_option(&self) -> Option<&str> {
        self.options.first().and_then(FieldOption::identity)
    }

    /// Whether `token` is exactly one of this field's option identities.
    pub fn accepts_option(&self, token: &str) -> bool {
        self.options.iter().any(|o| o.identity() == Some(token))
    }
}

/// Snapshot of a record type's schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDescriptor {
    pub required: BTreeSet<String>,
    pub primary_display_field: Option<String>,
    /// Fields in schema-declared order, names unique.
    pub fields: Vec<FieldDefinition>,
}

impl SchemaDescriptor {
    /// The schema assumed when the real one cannot be fetched.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.required.is_empty() && self.primary_display_field.is_none()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Parse a schema response body.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        let response: SchemaResponse = serde_json::from_str(body)?;
        Ok(response.into())
    }
}

// ── Wire format ──

/// Body of `GET /crm/v3/schemas/{objectType}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaResponse {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub required_properties: Vec<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub primary_display_property: Option<String>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub properties: Vec<PropertyResponse>,
}

/// One entry of the schema's `properties` array.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyResponse {
    pub name: String,
    #[serde(default, rename = "type", deserialize_with = "scalar_string")]
    pub type_: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub field_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub options: Vec<FieldOption>,
    #[serde(default, deserialize_with = "strict_true")]
    pub read_only_value: bool,
    #[serde(default, deserialize_with = "strict_true")]
    pub read_only_definition: bool,
    #[serde(default, deserialize_with = "lenient_metadata")]
    pub modification_metadata: ModificationMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModificationMetadata {
    #[serde(default, deserialize_with = "strict_true")]
    pub read_only: bool,
}

impl PropertyResponse {
    fn is_read_only(&self) -> bool {
        self.read_only_value || self.read_only_definition || self.modification_metadata.read_only
    }
}

impl From<PropertyResponse> for FieldDefinition {
    fn from(p: PropertyResponse) -> Self {
        let declared = p
            .type_
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(p.field_type.as_deref().filter(|t| !t.is_empty()))
            .unwrap_or("string");
        let read_only = p.is_read_only();
        Self {
            data_type: FieldType::from_declared(declared),
            name: p.name,
            options: p.options,
            read_only,
        }
    }
}

impl From<SchemaResponse> for SchemaDescriptor {
    fn from(r: SchemaResponse) -> Self {
        let mut fields: Vec<FieldDefinition> = Vec::with_capacity(r.properties.len());
        for prop in r.properties {
            let def = FieldDefinition::from(prop);
            // A repeated name keeps its first position and its last definition.
            match fields.iter_mut().find(|f| f.name == def.name) {
                Some(existing) => *existing = def,
                None => fields.push(def),
            }
        }
        Self {
            required: r.required_properties.into_iter().collect(),
            primary_display_field: r.primary_display_property.filter(|p| !p.is_empty()),
            fields,
        }
    }
}

/// Accept any JSON scalar as a string; `null` and absence become `None`.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Only a JSON `true` counts; `"true"`, `1` and anything else are false.
fn strict_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(matches!(Value::deserialize(deserializer)?, Value::Bool(true)))
}

/// Metadata that is not an object reads as "not read-only".
fn lenient_metadata<'de, D>(deserializer: D) -> Result<ModificationMetadata, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(serde_json::from_value(Value::deserialize(deserializer)?).unwrap_or_default())
}

/// Accept an array of `T`, dropping elements that do not parse; anything
/// that is not an array becomes empty.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(error = %e, "skipping malformed schema entry");
                None
            }
        })
        .collect())
}
