// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod behavior;
pub mod config;
pub mod content;
pub mod dates;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod profile;
pub mod recommend;
pub mod seed;
pub mod service;
pub mod store;
pub mod tagging;
pub mod taxonomy;

pub use crate::api::{AppState, CurrentUser};
pub use crate::error::{PortalError, StoreError};
pub use crate::service::PortalService;

use axum::Router;

/// Full HTTP surface (without `/metrics`, which needs a global recorder).
pub fn app(state: AppState) -> Router {
    api::router(state)
}
