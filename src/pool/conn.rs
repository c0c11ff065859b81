//! Dial capability used by the connection pool.
//!
//! The pool never speaks LDAP itself. It is handed a [`ConnFactory`] that
//! produces fresh, *unbound* sessions, and drives them through the
//! [`LdapSession`] trait. Production code plugs in [`dial_factory`]; tests
//! plug in fakes.

use std::{io, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry};
use tracing::debug;

/// Authentication bundle for one directory server.
///
/// Immutable after construction; cloned into every dial attempt.
#[derive(Clone, Debug)]
pub struct LdapAuthConfig {
    /// Server URL, `ldap://`, `ldaps://` or `ldapi://` scheme.
    pub url: String,
    /// DN to bind as.
    pub bind_dn: String,
    /// Password for the bind DN.
    pub bind_password: String,
    /// Skip server certificate verification on TLS connections.
    pub tls_skip_verify: bool,
    /// Network timeout for the initial dial.
    pub dial_timeout: Duration,
}

/// One LDAP search, scoped to a base entry.
#[derive(Clone, Debug)]
pub struct SearchRequest {
    /// Entry the search starts from.
    pub base_dn: String,
    /// Search scope, almost always [`Scope::Base`] here.
    pub scope: Scope,
    /// LDAP filter string.
    pub filter: String,
    /// Attributes to request.
    pub attrs: Vec<String>,
}

impl SearchRequest {
    /// Base-scope request for the attributes of a single entry.
    pub fn base(base_dn: impl Into<String>, attrs: Vec<String>) -> Self {
        Self {
            base_dn: base_dn.into(),
            scope: Scope::Base,
            filter: "(objectClass=*)".into(),
            attrs,
        }
    }
}

/// Minimal operation set the pool needs from an LDAP session.
///
/// Mirrors the lifecycle of a real connection: dialed unbound, bound once
/// by the pool, searched many times, finally unbound. `unbind` and `close`
/// are best-effort; the pool treats both as idempotent.
#[async_trait]
pub trait LdapSession: Send {
    /// Authenticate with the configured bind DN and password.
    async fn bind(&mut self, auth: &LdapAuthConfig) -> Result<(), LdapError>;
    /// Run one search and return the decoded entries.
    async fn search(&mut self, req: &SearchRequest) -> Result<Vec<SearchEntry>, LdapError>;
    /// Terminate the session on the wire.
    async fn unbind(&mut self) -> Result<(), LdapError>;
    /// Release any remaining local resources.
    async fn close(&mut self) {}
}

/// Factory producing fresh, unbound sessions from an auth bundle.
///
/// Injected so that the pool is testable without a directory server.
pub type ConnFactory =
    Arc<dyn Fn(LdapAuthConfig) -> BoxFuture<'static, Result<Box<dyn LdapSession>, LdapError>> + Send + Sync>;

/// Factory backed by a real network dial via [`ldap3`].
pub fn dial_factory() -> ConnFactory {
    Arc::new(|auth| async move { dial(&auth).await }.boxed())
}

/// Decide whether a search failure means the underlying session is unusable.
///
/// LDAP result-code errors (no such object, insufficient access, ...) come
/// back as [`LdapError::LdapResult`] and leave the session healthy. Anything
/// that points at the transport does not.
pub fn is_transport_error(err: &LdapError) -> bool {
    matches!(
        err,
        LdapError::Io { .. } | LdapError::EndOfStream | LdapError::Timeout { .. }
    )
}

/// Session backed by a driven [`ldap3::Ldap`] handle.
struct DialedSession {
    ldap: Ldap,
}

#[async_trait]
impl LdapSession for DialedSession {
    async fn bind(&mut self, auth: &LdapAuthConfig) -> Result<(), LdapError> {
        self.ldap
            .simple_bind(&auth.bind_dn, &auth.bind_password)
            .await?
            .success()?;
        Ok(())
    }

    async fn search(&mut self, req: &SearchRequest) -> Result<Vec<SearchEntry>, LdapError> {
        let (entries, _res) = self
            .ldap
            .search(&req.base_dn, req.scope, &req.filter, req.attrs.clone())
            .await?
            .success()?;
        Ok(entries.into_iter().map(SearchEntry::construct).collect())
    }

    async fn unbind(&mut self) -> Result<(), LdapError> {
        self.ldap.unbind().await
    }
}

/// Dial a new unbound session.
///
/// TLS connections require at least TLS 1.2 and honor the skip-verify flag.
async fn dial(auth: &LdapAuthConfig) -> Result<Box<dyn LdapSession>, LdapError> {
    let mut settings = LdapConnSettings::new().set_conn_timeout(auth.dial_timeout);
    if auth.url.starts_with("ldaps://") {
        let connector = native_tls::TlsConnector::builder()
            .min_protocol_version(Some(native_tls::Protocol::Tlsv12))
            .danger_accept_invalid_certs(auth.tls_skip_verify)
            .build()
            .map_err(|err| LdapError::from(io::Error::new(io::ErrorKind::Other, err)))?;
        settings = settings.set_connector(connector);
    }
    let (conn, ldap) = LdapConnAsync::with_settings(settings, &auth.url).await?;
    ldap3::drive!(conn);
    debug!(url = %auth.url, "dialed LDAP server");
    Ok(Box::new(DialedSession { ldap }))
}
