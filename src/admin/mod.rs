//! Registration and admin API.
//!
//! Backends announce themselves here; operators inspect and reset them.
//! Served on its own bind address, behind a bearer token.

pub mod auth;
pub mod client;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::health::tracker::Tracker;

pub use client::{AdminClient, AdminClientError};

#[derive(Clone)]
pub struct AdminState {
    pub tracker: Arc<Tracker>,
    pub api_key: Arc<str>,
    pub started_at: Instant,
}

impl AdminState {
    pub fn new(tracker: Arc<Tracker>, api_key: &str) -> Self {
        Self {
            tracker,
            api_key: Arc::from(api_key),
            started_at: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/backends", get(get_backends).post(register_backend))
        .route("/admin/backends/{id}", get(get_backend).delete(deregister_backend))
        .route("/admin/backends/{id}/reset", post(reset_backend))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
