//! Shared setup for router tests

use std::io::Cursor;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use valet_server::{
    api,
    config::{AppConfig, AuthConfig, CronConfig, EmailConfig, RateLimitConfig, UploadsConfig},
    repository::Repository,
    services::Services,
    AppState,
};

pub const CRON_SECRET: &str = "nightly-cron-secret";
pub const MANAGER_PIN: &str = "4321";
pub const AGENT_PIN: &str = "1234";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    // Removed on drop
    pub uploads: TempDir,
}

pub fn test_config(uploads: &TempDir, cron_secret: &str) -> AppConfig {
    AppConfig {
        server: Default::default(),
        database: Default::default(),
        auth: AuthConfig {
            jwt_secret: "test-secret-test-secret-test-secret".to_string(),
            jwt_expiration_hours: 1,
            manager_pin: MANAGER_PIN.to_string(),
        },
        logging: Default::default(),
        email: EmailConfig::default(),
        hotel: Default::default(),
        retention: Default::default(),
        uploads: UploadsConfig {
            dir: uploads.path().to_string_lossy().into_owned(),
            max_image_mb: 0.01,
        },
        cors: Default::default(),
        cron: CronConfig {
            secret: cron_secret.to_string(),
            enable_local: false,
            run_at: "23:59".to_string(),
        },
        // Enabled per test; oneshot requests carry no client address
        rate_limit: RateLimitConfig { per_minute: 0 },
    }
}

pub async fn spawn_app_with(configure: impl FnOnce(&mut AppConfig)) -> TestApp {
    let uploads = tempfile::tempdir().expect("tempdir");
    let mut config = test_config(&uploads, CRON_SECRET);
    configure(&mut config);

    let repository = Repository::in_memory().await.expect("in-memory store");
    let services = Services::from_config(repository, &config).expect("services");
    services.auth.seed_default_agents().await.expect("seed agents");

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    TestApp {
        router: api::create_router(state.clone()),
        state,
        uploads,
    }
}

pub async fn spawn_app_with_cron(cron_secret: &str) -> TestApp {
    spawn_app_with(|config| config.cron.secret = cron_secret.to_string()).await
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

impl TestApp {
    pub async fn send_raw(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.send_raw(request).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        (status, bytes.to_vec())
    }

    pub async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, bytes) = self.send(request).await;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn login(&self, pin: &str) -> String {
        let request = Request::post("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::json!({ "pin": pin }).to_string()))
            .unwrap();
        let (status, body) = self.send_json(request).await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().expect("token").to_string()
    }
}

pub const BOUNDARY: &str = "valet-test-boundary";

/// A small solid-colour JPEG that decodes like a camera photo
pub fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([200, 40, 40]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .expect("encode sample photo");
    bytes
}

/// Multipart body with text fields and an optional JPEG part
pub fn arrival_body(fields: &[(&str, &str)], image: Option<&[u8]>) -> Body {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some(bytes) = image {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"car.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n",
                BOUNDARY
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    Body::from(body)
}

pub fn arrival_request(token: &str, body: Body) -> Request<Body> {
    Request::post("/api/arrivals")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(body)
        .unwrap()
}
