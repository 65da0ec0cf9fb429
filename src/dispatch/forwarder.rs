//! Upstream forwarding.
//!
//! # Responsibilities
//! - Rewrite the inbound URI onto the selected backend's address
//! - Strip hop-by-hop headers
//! - Send the request and hand back the streaming response

use std::future::Future;
use std::str::FromStr;

use axum::body::{Body, Bytes};
use axum::http::{
    header,
    uri::{Authority, PathAndQuery, Scheme},
    HeaderMap, HeaderName, Request, Response, Uri,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForwardError {
    #[error("cannot build upstream request: {0}")]
    InvalidRequest(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Sends one request to one backend.
pub trait Forwarder: Send + Sync + 'static {
    fn forward(
        &self,
        address: &Authority,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Body>, ForwardError>> + Send;
}

/// Forwarder backed by a pooled hyper client.
#[derive(Clone)]
pub struct HyperForwarder {
    client: Client<HttpConnector, Body>,
}

impl HyperForwarder {
    pub fn new() -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);
        Self {
            client: Client::builder(TokioExecutor::new()).build(connector),
        }
    }
}

impl Default for HyperForwarder {
    fn default() -> Self {
        Self::new()
    }
}

impl Forwarder for HyperForwarder {
    async fn forward(&self, address: &Authority, request: Request<Bytes>) -> Result<Response<Body>, ForwardError> {
        let (mut parts, body) = request.into_parts();

        let path = parts
            .uri
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));
        parts.uri = Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(address.clone())
            .path_and_query(path)
            .build()
            .map_err(|e| ForwardError::InvalidRequest(e.to_string()))?;
        strip_hop_by_hop(&mut parts.headers);

        let upstream = Request::from_parts(parts, Body::from(body));
        let response = self
            .client
            .request(upstream)
            .await
            .map_err(|e| ForwardError::Transport(e.to_string()))?;

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

const HOP_BY_HOP: [&str; 7] = [
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_str(name.trim()).ok())
        .collect();
    for name in named {
        headers.remove(name);
    }
    headers.remove(header::CONNECTION);
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}
