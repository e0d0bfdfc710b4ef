//! HTTP client for HubSpot's CRM v3 schema and object endpoints.

use std::fmt;

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use slotbook_core::{CrmRecord, PropertySet, SchemaDescriptor, SearchResults};
use thiserror::Error;
use tracing::info;

/// Maximum number of records a search returns.
pub const SEARCH_LIMIT: u32 = 10;

/// The CRM call an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    FetchSchema,
    Create,
    Search,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FetchSchema => "HubSpot schema fetch",
            Self::Create => "HubSpot create",
            Self::Search => "HubSpot search",
        })
    }
}

#[derive(Error, Debug)]
pub enum CrmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The CRM refused the request and said why. The message is passed on untouched.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("{operation} failed with {status}")]
    Server { status: u16, operation: Operation },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid base URL {url:?}: {reason}")]
    BaseUrl { url: String, reason: String },
}

impl CrmError {
    /// HTTP status behind the error, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Rejected { status, .. } | Self::Server { status, .. } => Some(*status),
            Self::Json(_) | Self::BaseUrl { .. } => None,
        }
    }

    /// Whether the CRM rejected the request with its own explanation.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Filters for a record search. Empty values are left out of the filter.
#[derive(Debug, Clone, Copy)]
pub struct SearchQuery<'a> {
    pub date_field: &'a str,
    pub category_field: &'a str,
    pub date: Option<&'a str>,
    pub category: Option<&'a str>,
}

/// Authenticated client for one HubSpot account.
pub struct CrmClient {
    client: reqwest::Client,
    base_url: Url,
    token: String,
}

#[derive(Serialize)]
struct CreateBody<'a> {
    properties: &'a PropertySet,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody<'a> {
    filter_groups: Vec<FilterGroup<'a>>,
    properties: [&'a str; 2],
    limit: u32,
}

#[derive(Serialize)]
struct FilterGroup<'a> {
    filters: Vec<Filter<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Filter<'a> {
    property_name: &'a str,
    operator: &'static str,
    value: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl CrmClient {
    /// Create a client for the CRM at `base_url` (e.g. `https://api.hubapi.com`),
    /// authenticating with a private-app bearer token.
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, CrmError> {
        let base_url = Url::parse(base_url).map_err(|e| CrmError::BaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(CrmError::BaseUrl {
                url: base_url.to_string(),
                reason: "not a hierarchical URL".into(),
            });
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            token: token.into(),
        })
    }

    /// `base_url` with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Fetch the current schema of `object_type`.
    pub async fn fetch_schema(&self, object_type: &str) -> Result<SchemaDescriptor, CrmError> {
        let url = self.endpoint(&["crm", "v3", "schemas", object_type]);

        info!(url = %url, "fetching record schema");
        let resp = self.client.get(url).bearer_auth(&self.token).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CrmError::Server {
                status: status.as_u16(),
                operation: Operation::FetchSchema,
            });
        }

        let body = resp.text().await?;
        let schema = SchemaDescriptor::from_json(&body)?;
        info!(
            fields = schema.fields.len(),
            required = schema.required.len(),
            "fetched record schema"
        );
        Ok(schema)
    }

    /// Create one record of `object_type` with `properties`.
    pub async fn create_record(
        &self,
        object_type: &str,
        properties: &PropertySet,
    ) -> Result<CrmRecord, CrmError> {
        let url = self.endpoint(&["crm", "v3", "objects", object_type]);

        info!(url = %url, properties = properties.len(), "creating record");
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&CreateBody { properties })
            .send()
            .await?;

        let record: CrmRecord = read_json(resp, Operation::Create).await?;
        info!(id = %record.id, "record created");
        Ok(record)
    }

    /// Search `object_type` by exact match on the query's fields.
    pub async fn search_records(
        &self,
        object_type: &str,
        query: &SearchQuery<'_>,
    ) -> Result<SearchResults, CrmError> {
        let url = self.endpoint(&["crm", "v3", "objects", object_type, "search"]);
        let body = search_body(query);

        info!(url = %url, filters = body.filter_groups.len(), "searching records");
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let results: SearchResults = read_json(resp, Operation::Search).await?;
        info!(total = results.total, returned = results.results.len(), "search complete");
        Ok(results)
    }
}

fn search_body<'a>(query: &SearchQuery<'a>) -> SearchBody<'a> {
    let filters: Vec<Filter<'a>> = [
        (query.date_field, query.date),
        (query.category_field, query.category),
    ]
    .into_iter()
    .filter_map(|(field, value)| {
        value.filter(|v| !v.is_empty()).map(|value| Filter {
            property_name: field,
            operator: "EQ",
            value,
        })
    })
    .collect();

    SearchBody {
        filter_groups: if filters.is_empty() {
            Vec::new()
        } else {
            vec![FilterGroup { filters }]
        },
        properties: [query.date_field, query.category_field],
        limit: SEARCH_LIMIT,
    }
}

/// Decode a success body, or turn a failure into [`CrmError`] keeping the
/// CRM's own message when it sent one.
async fn read_json<T: DeserializeOwned>(
    resp: reqwest::Response,
    operation: Operation,
) -> Result<T, CrmError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(failure(status.as_u16(), &body, operation));
    }
    let body = resp.text().await?;
    Ok(serde_json::from_str(&body)?)
}

fn failure(status: u16, body: &str, operation: Operation) -> CrmError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty());
    match message {
        Some(message) => CrmError::Rejected { status, message },
        None => CrmError::Server { status, operation },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use slotbook_core::{FieldType, PropertyValue};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "pat-test-token";

    fn client(server: &MockServer) -> CrmClient {
        CrmClient::new(&server.uri(), TOKEN).unwrap()
    }

    #[test]
    fn endpoint_handles_trailing_slash_and_prefix() {
        let c = CrmClient::new("http://localhost:4000/", TOKEN).unwrap();
        assert_eq!(
            c.endpoint(&["crm", "v3", "schemas", "2-50779282"]).as_str(),
            "http://localhost:4000/crm/v3/schemas/2-50779282"
        );
        let c = CrmClient::new("http://localhost:4000/proxy", TOKEN).unwrap();
        assert_eq!(
            c.endpoint(&["crm", "v3", "objects", "p_appointments"]).as_str(),
            "http://localhost:4000/proxy/crm/v3/objects/p_appointments"
        );
    }

    #[test]
    fn endpoint_encodes_object_type() {
        let c = CrmClient::new("http://localhost:4000", TOKEN).unwrap();
        assert_eq!(
            c.endpoint(&["crm", "v3", "schemas", "a/b c"]).as_str(),
            "http://localhost:4000/crm/v3/schemas/a%2Fb%20c"
        );
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(matches!(
            CrmClient::new("not a url", TOKEN),
            Err(CrmError::BaseUrl { .. })
        ));
        assert!(matches!(
            CrmClient::new("mailto:crm@example.com", TOKEN),
            Err(CrmError::BaseUrl { .. })
        ));
    }

    #[test]
    fn search_body_with_both_filters() {
        let body = search_body(&SearchQuery {
            date_field: "meeting",
            category_field: "languages",
            date: Some("2024-03-15"),
            category: Some("es,en"),
        });
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "filterGroups": [{ "filters": [
                    { "propertyName": "meeting", "operator": "EQ", "value": "2024-03-15" },
                    { "propertyName": "languages", "operator": "EQ", "value": "es,en" }
                ]}],
                "properties": ["meeting", "languages"],
                "limit": 10
            })
        );
    }

    #[test]
    fn search_body_without_filters_has_no_groups() {
        let body = search_body(&SearchQuery {
            date_field: "meeting",
            category_field: "languages",
            date: Some(""),
            category: None,
        });
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["filterGroups"], json!([]));
    }

    #[test]
    fn failure_prefers_crm_message() {
        let err = failure(
            400,
            r#"{"status":"error","message":"Property values were not valid","category":"VALIDATION_ERROR"}"#,
            Operation::Create,
        );
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Property values were not valid");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn failure_without_message_is_generic() {
        let err = failure(502, "<html>Bad Gateway</html>", Operation::Create);
        assert!(!err.is_validation());
        assert_eq!(err.to_string(), "HubSpot create failed with 502");
        let err = failure(500, r#"{"message":""}"#, Operation::Search);
        assert_eq!(err.to_string(), "HubSpot search failed with 500");
    }

    #[tokio::test]
    async fn fetch_schema_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/crm/v3/schemas/2-50779282"))
            .and(header("authorization", "Bearer pat-test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "requiredProperties": ["meeting"],
                "primaryDisplayProperty": "title",
                "properties": [{ "name": "meeting", "type": "date" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let schema = client(&server).fetch_schema("2-50779282").await.unwrap();
        assert_eq!(schema.field("meeting").unwrap().data_type, FieldType::Date);
        assert_eq!(schema.primary_display_field.as_deref(), Some("title"));
    }

    #[tokio::test]
    async fn fetch_schema_non_success_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/crm/v3/schemas/2-50779282"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "message": "missing scopes" })))
            .mount(&server)
            .await;

        let err = client(&server).fetch_schema("2-50779282").await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert!(matches!(err, CrmError::Server { operation: Operation::FetchSchema, .. }));
    }

    #[tokio::test]
    async fn create_record_posts_properties() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/crm/v3/objects/2-50779282"))
            .and(header("authorization", "Bearer pat-test-token"))
            .and(body_json(json!({
                "properties": { "meeting": "2024-03-15", "languages": "es", "count": 0 }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "901",
                "properties": { "meeting": "2024-03-15", "languages": "es" },
                "archived": false
            })))
            .expect(1)
            .mount(&server)
            .await;

        let props: PropertySet = [
            ("meeting", PropertyValue::from("2024-03-15")),
            ("languages", PropertyValue::from("es")),
            ("count", PropertyValue::from(0_i64)),
        ]
        .into_iter()
        .collect();
        let record = client(&server).create_record("2-50779282", &props).await.unwrap();
        assert_eq!(record.id, "901");
    }

    #[tokio::test]
    async fn create_record_surfaces_validation_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/crm/v3/objects/2-50779282"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "status": "error",
                "message": "Property values were not valid: [{\"name\":\"languages\"}]",
                "category": "VALIDATION_ERROR"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .create_record("2-50779282", &PropertySet::new())
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "Property values were not valid: [{\"name\":\"languages\"}]"
        );
    }

    #[tokio::test]
    async fn search_records_returns_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/crm/v3/objects/2-50779282/search"))
            .and(body_json(json!({
                "filterGroups": [{ "filters": [
                    { "propertyName": "meeting", "operator": "EQ", "value": "2024-03-15" }
                ]}],
                "properties": ["meeting", "languages"],
                "limit": 10
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": 1,
                "results": [{ "id": "7", "properties": { "meeting": "2024-03-15" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let results = client(&server)
            .search_records(
                "2-50779282",
                &SearchQuery {
                    date_field: "meeting",
                    category_field: "languages",
                    date: Some("2024-03-15"),
                    category: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(results.total, 1);
        assert_eq!(results.results[0].id, "7");
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let c = CrmClient::new("http://127.0.0.1:9", TOKEN).unwrap();
        let err = c.fetch_schema("2-50779282").await.unwrap_err();
        assert!(matches!(err, CrmError::Http(_)));
    }
}
