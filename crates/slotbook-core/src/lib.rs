pub mod config;
pub mod property;
pub mod record;
pub mod request;
pub mod resolve;
pub mod schema;
pub mod synth;

pub use config::BookingConfig;
pub use property::{PropertySet, PropertyValue};
pub use record::{CrmRecord, SearchResults};
pub use request::{AppointmentRequest, RequestError};
pub use resolve::{ResolvedFieldMap, Role, RoleResolution, resolve_fields};
pub use schema::{FieldDefinition, FieldOption, FieldType, SchemaDescriptor};
pub use synth::{Seed, synthesize};
