#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use product_dashboard::{
    config::AppConfig,
    db,
    dto::product::StoreProductForm,
    entities::category,
    AppState,
};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "----dashboard-test-boundary";

/// Smallest byte sequence recognised as a PNG
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01\x08\x02\0\0\0";

/// Helper harness for spinning up the full router backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    assets: TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state and an
    /// empty asset directory.
    pub async fn new() -> Self {
        let assets = tempfile::tempdir().expect("failed to create asset dir");

        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // A single connection keeps the in-memory database alive and shared
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.asset_root = assets.path().to_string_lossy().into_owned();

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = product_dashboard::build_router(state.clone());

        Self {
            router,
            state,
            assets,
        }
    }

    /// Same as [`TestApp::new`] with the categories used across tests seeded.
    pub async fn with_categories() -> Self {
        let app = Self::new().await;
        app.seed_category(1, "Office").await;
        app.seed_category(3, "Stationery").await;
        app
    }

    pub fn asset_root(&self) -> &Path {
        self.assets.path()
    }

    pub async fn seed_category(&self, id: i32, name: &str) -> category::Model {
        category::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed category")
    }

    /// Creates a product through the service, panicking if it is rejected.
    pub async fn seed_product(&self, form: StoreProductForm) {
        let outcome = self
            .state
            .services
            .products
            .store_product(form, None)
            .await
            .expect("store product");
        assert!(outcome.is_success(), "seed rejected: {:?}", outcome);
    }

    /// Send a request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Body,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.request(Method::GET, uri, Body::empty(), &[]).await
    }

    pub async fn delete(&self, uri: &str) -> Response {
        self.request(Method::DELETE, uri, Body::empty(), &[]).await
    }

    pub async fn post_multipart(&self, uri: &str, parts: &[Part<'_>]) -> Response {
        let content_type = format!("multipart/form-data; boundary={}", BOUNDARY);
        self.request(
            Method::POST,
            uri,
            Body::from(multipart_body(parts)),
            &[("content-type", content_type.as_str())],
        )
        .await
    }

    pub async fn put_form(&self, uri: &str, fields: &[(&str, &str)]) -> Response {
        self.request(
            Method::PUT,
            uri,
            Body::from(urlencoded(fields)),
            &[("content-type", "application/x-www-form-urlencoded")],
        )
        .await
    }
}

/// One part of a multipart request body
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
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
                name,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, file_name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn urlencoded(fields: &[(&str, &str)]) -> String {
    fn encode(value: &str) -> String {
        value
            .bytes()
            .map(|b| match b {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    (b as char).to_string()
                }
                b' ' => "+".to_string(),
                other => format!("%{:02X}", other),
            })
            .collect()
    }

    fields
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// The form from the dashboard's worked example
pub fn pen_form() -> StoreProductForm {
    StoreProductForm {
        name: "Pen".into(),
        slug: "pen-01".into(),
        sku: "SKU1".into(),
        description: "A pen".into(),
        category_id: "3".into(),
        price: "2.5".into(),
        stock: "10".into(),
    }
}

pub fn pen_parts() -> Vec<Part<'static>> {
    vec![
        Part::Text("name", "Pen"),
        Part::Text("slug", "pen-01"),
        Part::Text("sku", "SKU1"),
        Part::Text("description", "A pen"),
        Part::Text("category_id", "3"),
        Part::Text("price", "2.5"),
        Part::Text("stock", "10"),
    ]
}

/// A distinct product in category 3
pub fn numbered_form(prefix: &str, n: usize, description: &str) -> StoreProductForm {
    StoreProductForm {
        name: format!("{} {}", prefix, n),
        slug: format!("{}-{}", prefix.to_lowercase(), n),
        sku: format!("{}-{}", prefix.to_uppercase(), n),
        description: description.to_string(),
        category_id: "3".into(),
        price: "1".into(),
        stock: "1".into(),
    }
}
