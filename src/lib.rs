//! Teledrop library — self-hosted file-sharing engine.
//!
//! This crate provides the core components for running a drop-sharing
//! server: streaming upload/download handling, the access-control
//! evaluator, pluggable blob storage backends, and SQLite-backed drop
//! metadata.

use std::sync::Arc;

pub mod access;
pub mod auth;
pub mod config;
pub mod engine;
pub mod errors;
pub mod handlers;
pub mod metadata;
pub mod metrics;
pub mod passphrase;
pub mod range;
pub mod server;
pub mod slug;
pub mod storage;

use crate::auth::IdentityVerifier;
use crate::config::Config;
use crate::engine::DropEngine;
use crate::storage::backend::BlobStore;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Drop lifecycle coordinator (owns the metadata store).
    pub engine: DropEngine,
    /// Blob storage backend (local filesystem or S3 gateway).
    pub storage: Arc<dyn BlobStore>,
    /// Resolves request credentials to a caller identity.
    pub verifier: Arc<dyn IdentityVerifier>,
}
