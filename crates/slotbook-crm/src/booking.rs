//! Appointment booking against a schema discovered per call.
//!
//! Every booking re-reads the schema: the CRM owner can rename or add
//! fields at any time, and a stale copy would produce writes the CRM
//! rejects. A schema read failure is not fatal; booking continues with an
//! empty schema and the configured field names, and only the write decides
//! the outcome.

use slotbook_core::synth::{Seed, synthesize};
use slotbook_core::{
    AppointmentRequest, BookingConfig, CrmRecord, PropertySet, ResolvedFieldMap,
    SchemaDescriptor, SearchResults, resolve_fields,
};
use tracing::{info, warn};

use crate::client::{CrmClient, CrmError, SearchQuery};

/// Schema snapshot and field resolution for one call.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub schema: SchemaDescriptor,
    /// False when the schema read failed and `schema` is empty.
    pub schema_available: bool,
    pub fields: ResolvedFieldMap,
}

/// Outcome of a successful booking.
#[derive(Debug, Clone)]
pub struct Booking {
    pub record: CrmRecord,
    pub fields: ResolvedFieldMap,
    /// Exactly what was submitted.
    pub properties: PropertySet,
}

/// Books and finds appointments for one configured object type.
pub struct AppointmentBooker {
    client: CrmClient,
    config: BookingConfig,
}

impl AppointmentBooker {
    pub fn new(client: CrmClient, config: BookingConfig) -> Self {
        Self { client, config }
    }

    /// Read the schema and resolve the meeting and languages fields.
    pub async fn discover(&self) -> Discovery {
        let (schema, schema_available) =
            match self.client.fetch_schema(&self.config.object_type).await {
                Ok(schema) => (schema, true),
                Err(e) => {
                    warn!(
                        object_type = %self.config.object_type,
                        error = %e,
                        "schema unavailable, using default field names"
                    );
                    (SchemaDescriptor::empty(), false)
                }
            };

        let fields = resolve_fields(
            &schema,
            &self.config.meeting_prop,
            &self.config.languages_prop,
        );
        if schema_available {
            for (role, name) in fields.unresolved() {
                warn!(
                    role = role.as_str(),
                    field = name,
                    "no candidate field for role, keeping configured name"
                );
            }
        }
        info!(
            date_field = fields.date_field(),
            category_field = fields.category_field(),
            "resolved booking fields"
        );

        Discovery {
            schema,
            schema_available,
            fields,
        }
    }

    /// Build the property set for `request` against a discovered schema.
    pub fn properties_for(&self, discovery: &Discovery, request: &AppointmentRequest) -> PropertySet {
        let seed = Seed {
            date: request.meeting(),
            category_csv: request.languages(),
            label_prefix: &self.config.label_prefix,
        };
        synthesize(
            &discovery.schema,
            &discovery.fields,
            &seed,
            discovery.schema.primary_display_field.as_deref(),
        )
    }

    /// Create an appointment record for `request`.
    pub async fn book(&self, request: &AppointmentRequest) -> Result<Booking, CrmError> {
        let discovery = self.discover().await;
        let properties = self.properties_for(&discovery, request);

        let missing = properties.missing_required(&discovery.schema);
        if !missing.is_empty() {
            warn!(?missing, "required fields still unset before submission");
        }

        let record = self
            .client
            .create_record(&self.config.object_type, &properties)
            .await?;
        info!(id = %record.id, meeting = request.meeting(), "appointment booked");

        Ok(Booking {
            record,
            fields: discovery.fields,
            properties,
        })
    }

    /// Find up to ten appointments matching `request` exactly.
    ///
    /// Uses the configured field names; search does no schema discovery.
    pub async fn find(&self, request: &AppointmentRequest) -> Result<SearchResults, CrmError> {
        let fields =
            ResolvedFieldMap::defaults(&self.config.meeting_prop, &self.config.languages_prop);
        let query = SearchQuery {
            date_field: fields.date_field(),
            category_field: fields.category_field(),
            date: Some(request.meeting()),
            category: Some(request.languages()),
        };
        self.client
            .search_records(&self.config.object_type, &query)
            .await
    }
}
