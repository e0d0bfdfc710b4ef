//! HTTP endpoint for booking and finding appointments.
//!
//! One route, `/api/book-appointment`:
//!
//! - `GET ?meeting=YYYY-MM-DD&languages=en,es` searches
//! - `POST` with a JSON, url-encoded or multipart body carrying the same
//!   fields books
//!
//! Every response is a JSON envelope `{status, message, data?}`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{FromRequest, Multipart, Query, Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use slotbook_core::{AppointmentRequest, RequestError};
use slotbook_crm::{AppointmentBooker, CrmError};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

pub const ROUTE: &str = "/api/book-appointment";

type SharedBooker = Arc<AppointmentBooker>;

/// Raw inbound fields; validation happens in [`AppointmentRequest::new`].
#[derive(Debug, Default, Deserialize)]
struct BookingParams {
    #[serde(default, deserialize_with = "text_or_blank")]
    meeting: String,
    #[serde(default, deserialize_with = "text_or_blank")]
    languages: String,
}

/// Anything but a string reads as blank, so validation reports it.
fn text_or_blank<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => s,
        _ => String::new(),
    })
}

#[derive(Serialize)]
struct Envelope<T> {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

fn success<T: Serialize>(message: &str, data: T) -> Response {
    let body = Envelope {
        status: "success",
        message: message.to_string(),
        data: Some(data),
    };
    (StatusCode::OK, Json(body)).into_response()
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    let body: Envelope<()> = Envelope {
        status: "error",
        message: message.into(),
        data: None,
    };
    (status, Json(body)).into_response()
}

fn invalid(e: RequestError) -> Response {
    failure(StatusCode::BAD_REQUEST, e.to_string())
}

fn crm_failure(e: CrmError) -> Response {
    error!(error = %e, status = ?e.status(), "CRM call failed");
    failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// Build the router with permissive CORS.
pub fn router(booker: SharedBooker) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    Router::new()
        .route(
            ROUTE,
            get(find_appointments)
                .post(book_appointment)
                .fallback(method_not_allowed),
        )
        .layer(cors)
        .with_state(booker)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(booker: AppointmentBooker, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(addr = %listener.local_addr()?, route = ROUTE, "serving");
    axum::serve(listener, router(Arc::new(booker)))
        .await
        .context("http server")?;
    Ok(())
}

async fn find_appointments(
    State(booker): State<SharedBooker>,
    Query(params): Query<BookingParams>,
) -> Response {
    let request = match AppointmentRequest::new(params.meeting, params.languages) {
        Ok(r) => r,
        Err(e) => return invalid(e),
    };
    match booker.find(&request).await {
        Ok(found) => success("Fetched appointments", found),
        Err(e) => crm_failure(e),
    }
}

async fn book_appointment(State(booker): State<SharedBooker>, req: Request) -> Response {
    let params = match body_params(req).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let request = match AppointmentRequest::new(params.meeting, params.languages) {
        Ok(r) => r,
        Err(e) => return invalid(e),
    };
    match booker.book(&request).await {
        Ok(booking) => success("Appointment booked", booking.record),
        Err(e) => crm_failure(e),
    }
}

async fn method_not_allowed() -> Response {
    failure(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

/// Parse the body by content type: JSON, multipart, otherwise url-encoded.
async fn body_params(req: Request) -> Result<BookingParams, Response> {
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.contains("application/json") {
        Json::<BookingParams>::from_request(req, &())
            .await
            .map(|Json(p)| p)
            .map_err(|e| failure(StatusCode::BAD_REQUEST, e.body_text()))
    } else if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(req, &())
            .await
            .map_err(|e| failure(StatusCode::BAD_REQUEST, e.body_text()))?;
        multipart_params(multipart).await
    } else {
        Form::<BookingParams>::from_request(req, &())
            .await
            .map(|Form(p)| p)
            .map_err(|e| failure(StatusCode::BAD_REQUEST, e.body_text()))
    }
}

/// Collect the text parts named `meeting` and `languages`; others are ignored.
async fn multipart_params(mut multipart: Multipart) -> Result<BookingParams, Response> {
    let mut params = BookingParams::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| failure(StatusCode::BAD_REQUEST, e.body_text()))?
    {
        let slot = match field.name() {
            Some("meeting") => &mut params.meeting,
            Some("languages") => &mut params.languages,
            _ => continue,
        };
        *slot = field
            .text()
            .await
            .map_err(|e| failure(StatusCode::BAD_REQUEST, e.body_text()))?;
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use serde_json::{Value, json};
    use slotbook_core::BookingConfig;
    use slotbook_crm::CrmClient;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app(base_url: &str) -> Router {
        let client = CrmClient::new(base_url, "pat-test-token").unwrap();
        router(Arc::new(AppointmentBooker::new(client, BookingConfig::default())))
    }

    /// A router whose CRM is never reached.
    fn offline_app() -> Router {
        app("http://127.0.0.1:9")
    }

    async fn call(app: Router, req: axum::http::Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::get(uri).body(Body::empty()).unwrap()
    }

    async fn mock_crm() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/crm/v3/schemas/2-50779282"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/crm/v3/objects/2-50779282"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "42",
                "properties": { "meeting": "2024-03-15", "languages": "es,en" }
            })))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn get_rejects_bad_meeting() {
        let (status, body) = call(
            offline_app(),
            get("/api/book-appointment?meeting=15-03-2024&languages=en"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Invalid or missing 'meeting' (YYYY-MM-DD)");
    }

    #[tokio::test]
    async fn get_rejects_missing_languages() {
        let (status, body) =
            call(offline_app(), get("/api/book-appointment?meeting=2024-03-15")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "Invalid or missing 'languages' (comma-separated string)"
        );
    }

    #[tokio::test]
    async fn other_methods_are_not_allowed() {
        let req = axum::http::Request::put("/api/book-appointment")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(offline_app(), req).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["message"], "Method not allowed");
    }

    #[tokio::test]
    async fn preflight_gets_cors_headers() {
        let req = axum::http::Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/book-appointment")
            .header("origin", "https://booking.example.com")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let resp = offline_app().oneshot(req).await.unwrap();
        assert!(resp.status().is_success());
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn get_searches_crm() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/crm/v3/objects/2-50779282/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": 1,
                "results": [{ "id": "7", "properties": { "meeting": "2024-03-15" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (status, body) = call(
            app(&server.uri()),
            get("/api/book-appointment?meeting=2024-03-15&languages=es%2Cen"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Fetched appointments");
        assert_eq!(body["data"]["results"][0]["id"], "7");
    }

    #[tokio::test]
    async fn post_json_books() {
        let server = mock_crm().await;
        let req = axum::http::Request::post("/api/book-appointment")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({ "meeting": "2024-03-15", "languages": "es,en" }).to_string(),
            ))
            .unwrap();
        let (status, body) = call(app(&server.uri()), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["id"], "42");
    }

    #[tokio::test]
    async fn post_form_books() {
        let server = mock_crm().await;
        let req = axum::http::Request::post("/api/book-appointment")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("meeting=2024-03-15&languages=es%2Cen"))
            .unwrap();
        let (status, body) = call(app(&server.uri()), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["id"], "42");
    }

    #[tokio::test]
    async fn post_multipart_books() {
        let server = mock_crm().await;
        let body = "--slot\r\n\
            Content-Disposition: form-data; name=\"meeting\"\r\n\r\n\
            2024-03-15\r\n\
            --slot\r\n\
            Content-Disposition: form-data; name=\"languages\"\r\n\r\n\
            es,en\r\n\
            --slot--\r\n";
        let req = axum::http::Request::post("/api/book-appointment")
            .header("content-type", "multipart/form-data; boundary=slot")
            .body(Body::from(body))
            .unwrap();
        let (status, body) = call(app(&server.uri()), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["id"], "42");
    }

    #[tokio::test]
    async fn non_string_json_fields_get_validation_message() {
        let req = axum::http::Request::post("/api/book-appointment")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"meeting":null,"languages":"en"}"#))
            .unwrap();
        let (status, body) = call(offline_app(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid or missing 'meeting' (YYYY-MM-DD)");

        let req = axum::http::Request::post("/api/book-appointment")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"meeting":"2024-03-15","languages":["en","es"]}"#))
            .unwrap();
        let (status, body) = call(offline_app(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "Invalid or missing 'languages' (comma-separated string)"
        );
    }

    #[tokio::test]
    async fn crm_rejection_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/crm/v3/objects/2-50779282"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "message": "Property values were not valid"
            })))
            .mount(&server)
            .await;
        let req = axum::http::Request::post("/api/book-appointment")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"meeting":"2024-03-15","languages":"en"}"#))
            .unwrap();
        let (status, body) = call(app(&server.uri()), req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Property values were not valid");
    }
}
