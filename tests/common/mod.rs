use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::{Method, StatusCode};
use serde_json::Value;

use admin_api::auth::issue_token;
use admin_api::database::{MemoryStore, Store};
use admin_api::types::{Actor, Role};

/// An in-process server over a fresh memory store
pub struct TestServer {
    pub base_url: String,
    client: reqwest::Client,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("failed to bind port {}", port))?;

        // Small body limit so oversized requests stay cheap; read once when config loads
        if std::env::var_os("API_MAX_REQUEST_SIZE_BYTES").is_none() {
            std::env::set_var("API_MAX_REQUEST_SIZE_BYTES", "65536");
        }

        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        tokio::spawn(async move {
            let _ = axum::serve(listener, admin_api::app(store)).await;
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            client: reqwest::Client::new(),
        })
    }

    pub fn request(&self, method: Method, path: &str, role: Option<Role>) -> Result<reqwest::RequestBuilder> {
        let mut builder = self.client.request(method, format!("{}{}", self.base_url, path));
        if let Some(role) = role {
            builder = builder.bearer_auth(token(role)?);
        }
        Ok(builder)
    }

    /// Send a request and return the status with the parsed body (`Null` if not JSON)
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        role: Option<Role>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = self.request(method, path, role)?;
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        read(builder.send().await?).await
    }

    pub async fn get(&self, path: &str, role: Role) -> Result<(StatusCode, Value)> {
        self.send(Method::GET, path, Some(role), None).await
    }

    pub async fn post(&self, path: &str, role: Role, body: Value) -> Result<(StatusCode, Value)> {
        self.send(Method::POST, path, Some(role), Some(body)).await
    }

    pub async fn patch(&self, path: &str, role: Role, body: Value) -> Result<(StatusCode, Value)> {
        self.send(Method::PATCH, path, Some(role), Some(body)).await
    }

    pub async fn delete(&self, path: &str, role: Role) -> Result<(StatusCode, Value)> {
        self.send(Method::DELETE, path, Some(role), None).await
    }

    /// POST as admin and return the created record's id
    pub async fn create(&self, path: &str, body: Value) -> Result<i64> {
        let (status, body) = self.post(path, Role::Admin, body).await?;
        anyhow::ensure!(status == StatusCode::CREATED, "create {} failed: {} {}", path, status, body);
        body["data"]["id"].as_i64().context("created record has no id")
    }
}

pub async fn read(res: reqwest::Response) -> Result<(StatusCode, Value)> {
    let status = res.status();
    let bytes = res.bytes().await?;
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Ok((status, body))
}

pub fn token(role: Role) -> Result<String> {
    let mut actor = Actor::new(format!("{}-1", role), role);
    actor.name = Some(format!("Test {}", role));
    Ok(issue_token(&actor)?)
}

/// Error code from an error envelope
pub fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

pub fn error_fields(body: &Value) -> Vec<String> {
    body["error"]["errors"]
        .as_array()
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e["field"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
