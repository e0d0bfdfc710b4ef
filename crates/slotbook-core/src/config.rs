//! Per-deployment booking configuration.

/// HubSpot custom object type that holds appointments.
pub const DEFAULT_OBJECT_TYPE: &str = "2-50779282";
/// Field name assumed for the meeting date role.
pub const DEFAULT_MEETING_PROP: &str = "meeting";
/// Field name assumed for the languages role.
pub const DEFAULT_LANGUAGES_PROP: &str = "languages";
/// Leading text of a synthesised display label.
pub const DEFAULT_LABEL_PREFIX: &str = "Appointment";

/// Settings the booking core consumes.
///
/// The role names override inference entirely when the schema already has a
/// field by that name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingConfig {
    pub object_type: String,
    pub meeting_prop: String,
    pub languages_prop: String,
    pub label_prefix: String,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            object_type: DEFAULT_OBJECT_TYPE.to_string(),
            meeting_prop: DEFAULT_MEETING_PROP.to_string(),
            languages_prop: DEFAULT_LANGUAGES_PROP.to_string(),
            label_prefix: DEFAULT_LABEL_PREFIX.to_string(),
        }
    }
}
