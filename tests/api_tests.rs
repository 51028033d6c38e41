//! Router tests against an in-memory store

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::Utc;
use image::GenericImageView;
use serde_json::json;

use common::{
    arrival_body, arrival_request, sample_jpeg, spawn_app, spawn_app_with, spawn_app_with_cron,
    TestApp, AGENT_PIN, CRON_SECRET, MANAGER_PIN,
};
use valet_server::services::local_time;

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::get(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

/// Today's date at the hotel, as the report endpoints expect it
fn hotel_today(app: &TestApp) -> String {
    let tz = app.state.services.reports.timezone();
    local_time::local_today(Utc::now(), tz).to_string()
}

fn post_json(uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn login_with_wrong_pin_is_unauthorized() {
    let app = spawn_app().await;
    let request = Request::post("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "pin": "9999" }).to_string()))
        .unwrap();

    let (status, body) = app.send_json(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NotAuthorized");
}

#[tokio::test]
async fn login_without_pin_is_bad_request() {
    let app = spawn_app().await;
    let request = Request::post("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();

    let (status, _) = app.send_json(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn me_returns_profile_without_pin_hash() {
    let app = spawn_app().await;
    let token = app.login(AGENT_PIN).await;

    let (status, body) = app.send_json(get("/api/me", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "agent-lino");
    assert_eq!(body["firstName"], "Lino");
    assert_eq!(body["isManager"], false);
    assert!(body.get("pinHash").is_none());
}

#[tokio::test]
async fn missing_bearer_is_unauthorized() {
    let app = spawn_app().await;
    let request = Request::get("/api/records/search?query=T100")
        .body(Body::empty())
        .unwrap();

    let (status, _) = app.send_json(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn agent_cannot_reach_admin_routes() {
    let app = spawn_app().await;
    let token = app.login(AGENT_PIN).await;

    let (status, body) = app.send_json(get("/api/admin/records", &token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden");
}

#[tokio::test]
async fn search_requires_a_usable_query() {
    let app = spawn_app().await;
    let token = app.login(AGENT_PIN).await;

    let (missing, _) = app.send_json(get("/api/records/search", &token)).await;
    assert_eq!(missing, StatusCode::BAD_REQUEST);

    let (short, _) = app.send_json(get("/api/records/search?query=%20A%20", &token)).await;
    assert_eq!(short, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_store_and_disk() {
    let app = spawn_app().await;
    let request = Request::get("/api/healthz").body(Body::empty()).unwrap();

    let (status, body) = app.send_json(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["diskWritable"], true);
    assert!(body["db"]["lastUpdated"].is_string());
}

#[tokio::test]
async fn cron_trigger_checks_key() {
    let app = spawn_app().await;

    let wrong = Request::post("/api/system/reports/daily")
        .header("x-cron-key", "guess")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send_json(wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let right = Request::post("/api/system/reports/daily")
        .header("x-cron-key", CRON_SECRET)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "date": "2024-06-01" }).to_string()))
        .unwrap();
    let (status, body) = app.send_json(right).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    // No SMTP relay in tests
    assert_eq!(body["delivered"], false);
    assert_eq!(body["purged"], 0);
}

#[tokio::test]
async fn cron_trigger_disabled_without_secret() {
    let app = spawn_app_with_cron("").await;
    let request = Request::post("/api/system/reports/daily")
        .header("x-cron-key", "")
        .body(Body::empty())
        .unwrap();

    let (status, _) = app.send_json(request).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn arrival_then_duplicate_then_departure() {
    let app = spawn_app().await;
    let token = app.login(AGENT_PIN).await;

    let photo = sample_jpeg(64, 48);
    let fields = [("ticketUid", "T100"), ("plateNumber", "ny-123 abc"), ("vehicleColor", "Blue")];
    let (status, body) = app
        .send_json(arrival_request(&token, arrival_body(&fields, Some(&photo))))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["success"], true);
    let record = &body["record"];
    assert_eq!(record["plate"]["number"], "NY123ABC");
    assert_eq!(record["status"], "parked");
    assert_eq!(record["vehicle"]["color"], "Blue");
    assert!(record["departureTimestampUtc"].is_null());
    let record_id = record["id"].as_str().unwrap().to_string();

    let thumb = record["image"]["thumbUrl"].as_str().unwrap();
    let thumb_name = thumb.trim_start_matches("/uploads/");
    let thumb_bytes = std::fs::read(app.uploads.path().join(thumb_name)).unwrap();
    let (width, height) = image::load_from_memory(&thumb_bytes).unwrap().dimensions();
    assert!(width <= 360 && height <= 360);

    let (status, body) = app
        .send_json(arrival_request(&token, arrival_body(&fields, Some(&photo))))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Duplicate");

    let (status, body) = app
        .send_json(get("/api/records/search?query=NY123ABC", &token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 1);

    let departure = json!({ "recordId": record_id });
    let (status, body) = app
        .send_json(post_json("/api/departures", &token, departure.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["durationMinutes"], 1);
    assert_eq!(body["record"]["status"], "closed");

    let (status, _) = app
        .send_json(post_json("/api/departures", &token, departure))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn arrival_without_image_is_rejected() {
    let app = spawn_app().await;
    let token = app.login(AGENT_PIN).await;

    let fields = [("ticketUid", "T200"), ("plateNumber", "AB12")];
    let (status, _) = app
        .send_json(arrival_request(&token, arrival_body(&fields, None)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_image_is_rejected() {
    let app = spawn_app().await;
    let token = app.login(AGENT_PIN).await;

    let big = vec![0xAB; 20 * 1024];
    let fields = [("ticketUid", "T300"), ("plateNumber", "AB12")];
    let (status, body) = app
        .send_json(arrival_request(&token, arrival_body(&fields, Some(&big))))
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "TooLarge");
}

#[tokio::test]
async fn departure_with_bad_or_unknown_id() {
    let app = spawn_app().await;
    let token = app.login(AGENT_PIN).await;

    let (status, _) = app
        .send_json(post_json("/api/departures", &token, json!({ "recordId": "nope" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unknown = json!({ "recordId": "6f1c2b9e-4d1a-4c8e-9a7b-2f3e4d5c6b7a" });
    let (status, _) = app.send_json(post_json("/api/departures", &token, unknown)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn manager_lists_records_and_downloads_reports() {
    let app = spawn_app().await;
    let agent = app.login(AGENT_PIN).await;
    let manager = app.login(MANAGER_PIN).await;

    let photo = sample_jpeg(64, 48);
    let fields = [("ticketUid", "T400"), ("plateNumber", "FL777"), ("notes", "a \"quoted\" note")];
    let (status, _) = app
        .send_json(arrival_request(&agent, arrival_body(&fields, Some(&photo))))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .send_json(get("/api/admin/records?status=parked", &manager))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["records"].as_array().unwrap().len(), 1);

    let (status, body) = app
        .send_json(get("/api/admin/records?date=2001-01-01", &manager))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["records"].as_array().unwrap().is_empty());

    let csv_uri = format!("/api/admin/reports/daily?date={}", hotel_today(&app));
    let response = app.send_raw(get(&csv_uri, &manager)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"valet-report-"));

    let (_, csv) = app.send(get(&csv_uri, &manager)).await;
    let csv = String::from_utf8(csv).unwrap();
    assert!(csv.starts_with("ticketUid,plate,arrivalLocal,departureLocal,parkedMinutes,notes\n"));
    assert!(csv.contains("T400,FL777,"));
    assert!(csv.contains("\"a \"\"quoted\"\" note\""));

    let html_uri = format!("/api/admin/reports/daily/html?date={}", hotel_today(&app));
    let (status, html) = app.send(get(&html_uri, &manager)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(html).unwrap().contains("T400"));

    let (status, _) = app
        .send_json(get("/api/admin/reports/daily?date=June-1", &manager))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for uri in ["/api/admin/reports/daily", "/api/admin/reports/daily/html"] {
        let (status, body) = app.send_json(get(uri, &manager)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "date query param is required (YYYY-MM-DD)");
    }
}

#[tokio::test]
async fn undecodable_photo_is_a_processing_failure() {
    let app = spawn_app().await;
    let token = app.login(AGENT_PIN).await;

    let not_a_photo = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];
    let fields = [("ticketUid", "T500"), ("plateNumber", "AB12")];
    let (status, body) = app
        .send_json(arrival_request(&token, arrival_body(&fields, Some(&not_a_photo))))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "UpstreamFailure");

    let (_, body) = app
        .send_json(get("/api/records/search?query=T500", &token))
        .await;
    assert!(body["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_filters_and_payloads_get_json_errors() {
    let app = spawn_app().await;
    let agent = app.login(AGENT_PIN).await;
    let manager = app.login(MANAGER_PIN).await;

    let (status, body) = app
        .send_json(get("/api/admin/records?status=towed", &manager))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
    assert_eq!(body["code"], 6);

    let (status, body) = app
        .send_json(post_json("/api/departures", &agent, json!({ "recordId": 5 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");

    let untyped = Request::post("/api/departures")
        .header(header::AUTHORIZATION, format!("Bearer {}", agent))
        .body(Body::from(json!({ "recordId": "x" }).to_string()))
        .unwrap();
    let (status, body) = app.send_json(untyped).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let broken = Request::post("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"pin\":"))
        .unwrap();
    let (status, body) = app.send_json(broken).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");

    let not_multipart = Request::post("/api/arrivals")
        .header(header::AUTHORIZATION, format!("Bearer {}", agent))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, body) = app.send_json(not_multipart).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let app = spawn_app().await;
    let response = app
        .send_raw(Request::get("/api/healthz").body(Body::empty()).unwrap())
        .await;

    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["referrer-policy"], "no-referrer");
    assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
    assert!(headers["content-security-policy"]
        .to_str()
        .unwrap()
        .starts_with("default-src 'self'"));
}

#[tokio::test]
async fn uploads_are_served_with_long_lived_caching() {
    let app = spawn_app().await;
    let token = app.login(AGENT_PIN).await;

    let photo = sample_jpeg(64, 48);
    let fields = [("ticketUid", "T600"), ("plateNumber", "AB12")];
    let (status, body) = app
        .send_json(arrival_request(&token, arrival_body(&fields, Some(&photo))))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let url = body["record"]["image"]["originalUrl"].as_str().unwrap();
    let response = app
        .send_raw(Request::get(url).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, max-age=31536000, immutable"
    );
}

#[tokio::test]
async fn api_requests_are_rate_limited_per_client() {
    let app = spawn_app_with(|config| config.rate_limit.per_minute = 2).await;
    let from = |client: &str| {
        Request::get("/api/healthz")
            .header("x-forwarded-for", client)
            .body(Body::empty())
            .unwrap()
    };

    assert_eq!(app.send_raw(from("203.0.113.7")).await.status(), StatusCode::OK);
    assert_eq!(app.send_raw(from("203.0.113.7")).await.status(), StatusCode::OK);
    assert_eq!(
        app.send_raw(from("203.0.113.7")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(app.send_raw(from("198.51.100.2")).await.status(), StatusCode::OK);
}
