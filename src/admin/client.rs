//! Typed client for the admin API.
//!
//! Used by backends to announce and withdraw themselves, and by `gateway-cli`.

use reqwest::{header::AUTHORIZATION, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::admin::handlers::{RegisterRequest, RegisterResponse, ResetResponse, SystemStatus};

#[derive(Debug, thiserror::Error)]
pub enum AdminClientError {
    #[error("admin request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("admin API returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl AdminClientError {
    /// HTTP status returned by the gateway, if the request got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            AdminClientError::Status { status, .. } => Some(*status),
            AdminClientError::Http(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdminClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AdminClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub async fn status(&self) -> Result<SystemStatus, AdminClientError> {
        json(self.send(self.client.get(self.url("/admin/status"))).await?).await
    }

    /// Current registry snapshot, as raw JSON.
    pub async fn backends(&self) -> Result<Value, AdminClientError> {
        json(self.send(self.client.get(self.url("/admin/backends"))).await?).await
    }

    pub async fn backend(&self, id: &str) -> Result<Value, AdminClientError> {
        json(self.send(self.client.get(self.url(&format!("/admin/backends/{}", id)))).await?).await
    }

    /// Announce a backend. Re-announcing the same backend is not an error.
    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse, AdminClientError> {
        json(self.send(self.client.post(self.url("/admin/backends")).json(request)).await?).await
    }

    pub async fn deregister(&self, id: &str) -> Result<(), AdminClientError> {
        self.send(self.client.delete(self.url(&format!("/admin/backends/{}", id))))
            .await
            .map(drop)
    }

    pub async fn reset(&self, id: &str) -> Result<ResetResponse, AdminClientError> {
        json(self.send(self.client.post(self.url(&format!("/admin/backends/{}/reset", id)))).await?).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, AdminClientError> {
        let response = request
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdminClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

async fn json<T: DeserializeOwned>(response: Response) -> Result<T, AdminClientError> {
    Ok(response.json().await?)
}
