#![allow(dead_code)]

use actix_web::{http, test, web, App};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

use video_sharing_backend::config::Config;
use video_sharing_backend::file_store::FileStore;
use video_sharing_backend::handlers;
use video_sharing_backend::models::{LoginRequest, RegisterRequest};
use video_sharing_backend::notifier::RecordingNotifier;
use video_sharing_backend::services;
use video_sharing_backend::AppState;

pub const PASSWORD: &str = "password123";
const BOUNDARY: &str = "----videosharingtestboundary";

/// Keeps the temporary database and upload directory alive for one test.
pub struct TestEnv {
    pub dir: TempDir,
    pub notifier: Arc<RecordingNotifier>,
    pub store: FileStore,
}

pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub token: String,
}

pub fn test_config(dir: &TempDir) -> Config {
    Config {
        database_url: format!("sqlite://{}", dir.path().join("test.db").display()),
        uploads_dir: dir.path().join("uploads"),
        jwt_secret: "integration-test-secret".to_string(),
        token_ttl_hours: 24,
        reset_token_ttl_minutes: 60,
        bcrypt_cost: 4,
        max_upload_bytes: 1024 * 1024,
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_allowed_origins: vec![],
    }
}

pub async fn setup_test_app() -> (
    impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
    >,
    TestEnv,
) {
    setup_test_app_with(|_| {}).await
}

pub async fn setup_test_app_with(
    customize: impl FnOnce(&mut Config),
) -> (
    impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
    >,
    TestEnv,
) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);
    customize(&mut config);

    let notifier = Arc::new(RecordingNotifier::new());
    let app_state = services::init_app_state(config, notifier.clone()).await.unwrap();
    let store = app_state.file_store.clone();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state))
            .configure(handlers::configure_routes),
    )
    .await;

    (app, TestEnv { dir, notifier, store })
}

/// Shared state without the HTTP layer, for driving the services from many tasks.
pub async fn setup_test_state() -> (Arc<AppState>, TestEnv) {
    let dir = tempfile::tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    let app_state = services::init_app_state(test_config(&dir), notifier.clone())
        .await
        .unwrap();
    let store = app_state.file_store.clone();
    (Arc::new(app_state), TestEnv { dir, notifier, store })
}

impl TestEnv {
    pub fn uploads_dir(&self) -> PathBuf {
        self.store.root().to_path_buf()
    }

    pub fn stored_files(&self) -> usize {
        std::fs::read_dir(self.uploads_dir())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub fn bearer(token: &str) -> (http::header::HeaderName, String) {
    (http::header::AUTHORIZATION, format!("Bearer {}", token))
}

pub async fn read_json(resp: actix_web::dev::ServiceResponse) -> serde_json::Value {
    let body = test::read_body(resp).await;
    serde_json::from_slice(&body).unwrap()
}

pub async fn register(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
    >,
    username: &str,
    email: &str,
    password: &str,
) -> actix_web::dev::ServiceResponse {
    let req = test::TestRequest::post()
        .uri("/api/register")
        .set_json(&RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        })
        .to_request();
    test::call_service(app, req).await
}

pub async fn login(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
    >,
    username: &str,
    password: &str,
) -> actix_web::dev::ServiceResponse {
    let req = test::TestRequest::post()
        .uri("/api/login")
        .set_json(&LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })
        .to_request();
    test::call_service(app, req).await
}

/// Registers a fresh user, logs in and looks up the account id.
pub async fn create_user(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
    >,
) -> TestUser {
    let unique_id = Uuid::new_v4().simple().to_string();
    let username = format!("testuser_{}", &unique_id[..8]);
    let email = format!("test_{}@example.com", &unique_id[..8]);

    let resp = register(app, &username, &email, PASSWORD).await;
    assert!(resp.status().is_success(), "registration failed: {}", resp.status());

    let resp = login(app, &username, PASSWORD).await;
    assert!(resp.status().is_success(), "login failed: {}", resp.status());
    let token = read_json(resp).await["access_token"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri("/api/me")
        .insert_header(bearer(&token))
        .to_request();
    let me = read_json(test::call_service(app, req).await).await;

    TestUser {
        id: me["id"].as_i64().unwrap(),
        username,
        email,
        token,
    }
}

/// Encodes text fields and an optional file as `multipart/form-data`.
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    if let Some((filename, bytes)) = file {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: video/mp4\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

pub async fn upload(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
    >,
    token: Option<&str>,
    fields: &[(&str, &str)],
    file: Option<(&str, &[u8])>,
) -> actix_web::dev::ServiceResponse {
    let (content_type, body) = multipart_body(fields, file);
    let mut req = test::TestRequest::post()
        .uri("/api/upload")
        .insert_header((http::header::CONTENT_TYPE, content_type));
    if let Some(token) = token {
        req = req.insert_header(bearer(token));
    }
    test::call_service(app, req.set_payload(body).to_request()).await
}

/// Uploads a small video owned by `user` and returns its id.
pub async fn upload_video(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
    >,
    user: &TestUser,
    title: &str,
    bytes: &[u8],
) -> i64 {
    let resp = upload(
        app,
        Some(user.token.as_str()),
        &[("title", title), ("description", "a test video")],
        Some(("clip.mp4", bytes)),
    )
    .await;
    assert!(resp.status().is_success(), "upload failed: {}", resp.status());
    read_json(resp).await["video_id"].as_i64().unwrap()
}

pub fn sample_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
