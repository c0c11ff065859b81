//! Landing page and service probe endpoints.

use std::time::{Duration, Instant};

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Json},
    routing::{self, Router},
};
use ldap3::Scope;
use serde_json::json;
use tracing::warn;

use crate::pool::{LdapPool, SearchRequest};

/// Budget for the health check's pool acquisition plus root DSE search.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(1);

/// Shared state for probe handlers.
#[derive(Clone)]
pub struct ProbeState {
    pool: LdapPool,
    started_at: Instant,
    metrics_path: String,
}

impl ProbeState {
    #[must_use]
    pub fn new(pool: LdapPool, metrics_path: impl Into<String>) -> Self {
        Self {
            pool,
            started_at: Instant::now(),
            metrics_path: metrics_path.into(),
        }
    }

    /// Build the router containing the landing page and probes.
    #[must_use]
    pub fn build_router(&self) -> Router {
        Router::new()
            .route("/", routing::get(landing_page))
            .route("/health", routing::get(health))
            .route("/up", routing::get(up))
            .with_state(self.clone())
    }
}

/// Landing page pointing at the exposition endpoint.
async fn landing_page(State(state): State<ProbeState>) -> Html<String> {
    Html(format!(
        r#"<html>
    <head>
        <title>ds389-exporter</title>
    </head>
    <body>
        <p>Metrics are <a href="{}">here</a></p>
    </body>
</html>
"#,
        state.metrics_path
    ))
}

/// Health probe: run a root DSE search through the pool.
///
/// The pool hands out either a verified idle connection or a freshly bound
/// one, so a successful search means the directory is reachable and
/// answering.
async fn health(State(state): State<ProbeState>) -> impl IntoResponse {
    let req = SearchRequest {
        base_dn: String::new(),
        scope: Scope::Base,
        filter: "(objectClass=*)".into(),
        attrs: vec!["dn".into()],
    };
    let ldap_available = match state.pool.acquire_timeout(HEALTH_TIMEOUT).await {
        Ok(mut conn) => {
            let searched = conn.search(&req).await;
            conn.close();
            match searched {
                Ok(_) => true,
                Err(err) => {
                    warn!(error = %err, "LDAP health check search failed");
                    false
                }
            }
        }
        Err(err) => {
            warn!(error = %err, "health check could not get a pooled connection");
            false
        }
    };

    let status = if ldap_available {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = json!({
        "status": {
            "ldap": if ldap_available { "ok" } else { "unavailable" },
        },
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    (status, Json(body))
}

/// Static liveness answer.
async fn up() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
