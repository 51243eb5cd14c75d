//! Case intake service
//!
//! Accepts case submissions from a public form, guards the write path with
//! per-address admission budgets, and exposes list, lookup, lifecycle and
//! statistics endpoints over the stored cases.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, future_incompatible)]

pub mod admission;
pub mod case_id;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod logging;
pub mod response;
pub mod service;
pub mod sql_store;
pub mod statistics;
pub mod store;

use admission::{admission_middleware, AdmissionController};
use anyhow::{Context, Result};
use axum::{
    routing::{get, patch},
    Router,
};
use case_id::TimestampCaseIdGenerator;
use common::CaseStore;
use config::{IntakeConfig, StorageBackend};
use service::CaseService;
use sql_store::PgCaseStore;
use std::sync::Arc;
use store::MemoryCaseStore;
use tower_http::trace::TraceLayer;

pub use errors::{IntakeError, IntakeResult};

/// Shared handler state
pub struct AppState {
    pub service: CaseService,
    pub admission: Arc<AdmissionController>,
}

impl AppState {
    pub fn new(store: Arc<dyn CaseStore>, admission: Arc<AdmissionController>) -> Self {
        Self {
            service: CaseService::new(store, Arc::new(TimestampCaseIdGenerator)),
            admission,
        }
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api", get(handlers::api_index))
        .route("/api/form", get(handlers::list_cases).post(handlers::create_case))
        .route("/api/form/stats", get(handlers::statistics))
        .route("/api/form/case/:case_id", get(handlers::get_case_by_case_id))
        .route("/api/form/:id", get(handlers::get_case).delete(handlers::soft_delete))
        .route("/api/form/:id/status", patch(handlers::update_status))
        .fallback(handlers::route_not_found)
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state.admission),
            admission_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the configured case store
pub async fn open_store(config: &IntakeConfig) -> Result<Arc<dyn CaseStore>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory case store; cases are lost on restart");
            Ok(Arc::new(MemoryCaseStore::new()))
        }
        StorageBackend::Postgres => {
            let store = PgCaseStore::connect(&config.storage).await?;
            if config.storage.run_migrations {
                store.run_migrations().await?;
            }
            let healthy = store.health_check().await.context("Database health check failed")?;
            if !healthy {
                anyhow::bail!("Database is not reachable");
            }
            Ok(Arc::new(store))
        }
    }
}
