//! Shared helpers for the HTTP-level tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use filemart::api::AppState;
use filemart::config::Config;
use filemart::server::{build_router, build_state};
use filemart::services::credentials;

const BOUNDARY: &str = "filemart-test-boundary";

/// Test application with an in-memory database and a throwaway upload dir.
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub config: Config,
    _uploads: TempDir,
}

/// Response from a test request.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    /// Parsed JSON body, or `Null` when the body is not JSON.
    pub body: Value,
    pub bytes: Vec<u8>,
}

impl TestResponse {
    pub fn error_code(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }
}

/// One part of a multipart form.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        field: &'a str,
        filename: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

impl TestApp {
    pub async fn new() -> Self {
        let uploads = tempfile::tempdir().expect("Failed to create upload dir");
        let config = Config::for_tests(uploads.path());
        let state = build_state(&config).await.expect("Failed to build state");
        let router = build_router(state.clone(), &config);

        Self {
            router,
            state,
            config,
            _uploads: uploads,
        }
    }

    /// Registers a user and returns its id.
    pub async fn register(&self, email: &str, username: &str, password: &str) -> i64 {
        let response = self
            .request(
                "POST",
                "/register",
                Some(serde_json::json!({
                    "email": email,
                    "username": username,
                    "password": password,
                })),
                None,
            )
            .await;

        assert_eq!(
            response.status,
            StatusCode::OK,
            "Registration failed: {:?}",
            response.body
        );
        response.body["id"].as_i64().expect("No id in register response")
    }

    /// Logs in and returns the bearer token.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .request(
                "POST",
                "/login",
                Some(serde_json::json!({ "email": email, "password": password })),
                None,
            )
            .await;

        assert_eq!(
            response.status,
            StatusCode::OK,
            "Login failed: {:?}",
            response.body
        );
        response.body["token"]
            .as_str()
            .expect("No token in login response")
            .to_string()
    }

    /// Registers and logs in; returns `(user id, token)`.
    pub async fn signup(&self, username: &str) -> (i64, String) {
        let email = format!("{}@example.com", username);
        let id = self.register(&email, username, "secret123").await;
        let token = self.login(&email, "secret123").await;
        (id, token)
    }

    /// Seeds an admin account and returns its token.
    pub async fn admin_token(&self) -> String {
        credentials::ensure_admin(&self.state.db, "root@example.com", "rootpass")
            .await
            .expect("Failed to seed admin");
        self.login("root@example.com", "rootpass").await
    }

    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let mut req = Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");

        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let req = req
            .body(Body::from(body_str))
            .expect("Failed to build request");

        self.send(req).await
    }

    pub async fn multipart(&self, path: &str, parts: &[Part<'_>], token: &str) -> TestResponse {
        let mut body = Vec::new();

        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File {
                    field,
                    filename,
                    content_type,
                    data,
                } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                            field, filename, content_type
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(data);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from(body))
            .expect("Failed to build request");

        self.send(req).await
    }

    /// Uploads `data` as `filename` and returns the new file id.
    pub async fn upload(
        &self,
        token: &str,
        filename: &str,
        data: &[u8],
        category: &str,
        price: &str,
    ) -> i64 {
        let response = self
            .multipart(
                "/upload-file",
                &[
                    Part::Text("category", category),
                    Part::Text("price", price),
                    Part::File {
                        field: "file",
                        filename,
                        content_type: "application/octet-stream",
                        data,
                    },
                ],
                token,
            )
            .await;

        assert_eq!(
            response.status,
            StatusCode::OK,
            "Upload failed: {:?}",
            response.body
        );
        response.body["file"]["id"]
            .as_i64()
            .expect("No file id in upload response")
    }

    async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 16 * 1024 * 1024)
            .await
            .expect("Failed to read body")
            .to_vec();
        let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            body,
            bytes,
        }
    }
}
