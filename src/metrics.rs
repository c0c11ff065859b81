//! `/metrics` endpoint: collector registration and text exposition.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{self, Router},
};
use prometheus::{Encoder, TextEncoder};
use tracing::{debug_span, error};

use crate::{
    collectors::{CollectorSet, EntryCollector, PoolCollector},
    config::{BackendType, ExporterConfig},
    monitor,
    pool::LdapPool,
};

/// Base DN of the database-wide LDBM monitor entries.
const LDBM_MONITOR_DN: &str = "cn=monitor,cn=ldbm database,cn=plugins,cn=config";
const LDBM_DATABASE_DN: &str = "cn=database,cn=monitor,cn=ldbm database,cn=plugins,cn=config";

/// Shared state of the metrics endpoint.
#[derive(Clone)]
pub struct MetricsState {
    collectors: Arc<CollectorSet>,
    metrics_path: String,
}

impl MetricsState {
    /// Register all collectors called for by the configuration.
    #[must_use]
    pub fn build(cfg: &ExporterConfig, pool: &LdapPool) -> Self {
        let _span = debug_span!("build_metrics").entered();
        let timeout = cfg.ldap.pool.acquire_timeout;
        let mut set = CollectorSet::new();

        set.register(
            "server",
            Box::new(EntryCollector::new(
                "server",
                pool.clone(),
                "cn=monitor",
                monitor::server_attrs(),
                Vec::new(),
                timeout,
            )),
        );
        set.register(
            "snmp",
            Box::new(EntryCollector::new(
                "snmp",
                pool.clone(),
                "cn=snmp,cn=monitor",
                monitor::snmp_attrs(),
                Vec::new(),
                timeout,
            )),
        );

        for entry in &cfg.global.num_subordinate_entries {
            set.register(
                format!("entry:{entry}"),
                Box::new(EntryCollector::new(
                    "entry",
                    pool.clone(),
                    entry.clone(),
                    monitor::entry_count_attrs(),
                    vec![("entry".into(), entry.clone())],
                    timeout,
                )),
            );
        }

        for backend in &cfg.global.backends {
            set.register(
                format!("backend:{backend}"),
                Box::new(EntryCollector::new(
                    "backend",
                    pool.clone(),
                    format!("cn=monitor,cn={backend},cn=ldbm database,cn=plugins,cn=config"),
                    monitor::backend_cache_attrs(),
                    vec![("database".into(), backend.clone())],
                    timeout,
                )),
            );
        }

        // BDB and MDB instances expose different database-wide attributes.
        let (cache_attrs, database_attrs) = match cfg.global.backend {
            BackendType::Bdb => (
                monitor::bdb_server_cache_attrs(),
                monitor::bdb_database_attrs(),
            ),
            BackendType::Mdb => (
                monitor::mdb_server_cache_attrs(),
                monitor::mdb_database_attrs(),
            ),
        };
        set.register(
            "cache",
            Box::new(EntryCollector::new(
                "cache",
                pool.clone(),
                LDBM_MONITOR_DN,
                cache_attrs,
                Vec::new(),
                timeout,
            )),
        );
        set.register(
            "database",
            Box::new(EntryCollector::new(
                "database",
                pool.clone(),
                LDBM_DATABASE_DN,
                database_attrs,
                Vec::new(),
                timeout,
            )),
        );

        set.register("pool", Box::new(PoolCollector::new(pool.clone())));

        Self {
            collectors: Arc::new(set),
            metrics_path: cfg.http.metrics_path.clone(),
        }
    }

    /// URL path the exposition endpoint is served from.
    #[must_use]
    pub fn metrics_path(&self) -> &str {
        &self.metrics_path
    }

    /// Build the router containing the exposition endpoint.
    #[must_use]
    pub fn build_router(&self) -> Router {
        Router::new()
            .route(&self.metrics_path, routing::get(get_metrics))
            .with_state(self.clone())
    }
}

/// Scrape handler: fan out all collectors and encode the merged result.
async fn get_metrics(State(state): State<MetricsState>) -> impl IntoResponse {
    let families = state.collectors.gather().await;
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    match encoder.encode(&families, &mut buf) {
        Ok(()) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            buf,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
