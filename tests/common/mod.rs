//! Instrumented fake LDAP sessions for pool and collector tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::FutureExt;
use ldap3::{LdapError, SearchEntry};
use parking_lot::Mutex;

use ds389_exporter::pool::{
    ConnFactory, LdapAuthConfig, LdapPool, LdapPoolConfig, LdapSession, SearchRequest,
};

/// Shared observation point for everything the fakes do.
#[derive(Default)]
pub struct Harness {
    /// Successful factory calls, also used to assign session ids.
    pub created: AtomicUsize,
    /// Total factory invocations, including failing ones.
    pub factory_calls: AtomicUsize,
    /// Bind calls across all sessions.
    pub binds: AtomicUsize,
    /// Unbind calls across all sessions.
    pub unbinds: AtomicUsize,
    /// Session ids whose next search fails with a transport error.
    fail_search: Mutex<HashSet<usize>>,
    /// Canned search result; defaults to a single entry carrying the
    /// session id in the `id` attribute.
    entries: Mutex<Option<Vec<SearchEntry>>>,
}

impl Harness {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make searches on the session with this id fail at the transport level.
    pub fn fail_search(&self, id: usize) {
        self.fail_search.lock().insert(id);
    }

    /// Stop failing searches on the session with this id.
    pub fn heal_search(&self, id: usize) {
        self.fail_search.lock().remove(&id);
    }

    /// Serve these entries from every future search.
    pub fn set_entries(&self, entries: Vec<SearchEntry>) {
        *self.entries.lock() = Some(entries);
    }

    /// Factory producing fake sessions bound to this harness.
    pub fn factory(self: &Arc<Self>) -> ConnFactory {
        let harness = self.clone();
        Arc::new(move |_auth| {
            let harness = harness.clone();
            async move {
                harness.factory_calls.fetch_add(1, Ordering::SeqCst);
                let id = harness.created.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(FakeSession { id, harness }) as Box<dyn LdapSession>)
            }
            .boxed()
        })
    }

    /// Factory whose first invocation fails before producing a session.
    pub fn factory_failing_first(self: &Arc<Self>) -> ConnFactory {
        let harness = self.clone();
        Arc::new(move |_auth| {
            let harness = harness.clone();
            async move {
                if harness.factory_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(LdapError::EndOfStream);
                }
                let id = harness.created.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(FakeSession { id, harness }) as Box<dyn LdapSession>)
            }
            .boxed()
        })
    }
}

/// Fake LDAP session; reports its id through search results.
pub struct FakeSession {
    id: usize,
    harness: Arc<Harness>,
}

#[async_trait]
impl LdapSession for FakeSession {
    async fn bind(&mut self, _auth: &LdapAuthConfig) -> Result<(), LdapError> {
        self.harness.binds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn search(&mut self, _req: &SearchRequest) -> Result<Vec<SearchEntry>, LdapError> {
        if self.harness.fail_search.lock().contains(&self.id) {
            return Err(LdapError::EndOfStream);
        }
        if let Some(entries) = self.harness.entries.lock().clone() {
            return Ok(entries);
        }
        let mut attrs = HashMap::new();
        attrs.insert("id".to_string(), vec![self.id.to_string()]);
        Ok(vec![SearchEntry {
            dn: format!("cn=fake-{}", self.id),
            attrs,
            bin_attrs: HashMap::new(),
        }])
    }

    async fn unbind(&mut self) -> Result<(), LdapError> {
        self.harness.unbinds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Auth bundle with inert values; the fakes never look at it.
pub fn test_auth() -> LdapAuthConfig {
    LdapAuthConfig {
        url: "ldap://localhost:389".into(),
        bind_dn: "cn=monitor".into(),
        bind_password: "secret".into(),
        tls_skip_verify: false,
        dial_timeout: Duration::from_secs(1),
    }
}

/// Pool over the harness with the given capacity and no expiry.
pub fn make_pool(harness: &Arc<Harness>, max_connections: usize) -> LdapPool {
    make_pool_with(harness, max_connections, Duration::ZERO, Duration::ZERO)
}

/// Pool over the harness with explicit expiry settings.
pub fn make_pool_with(
    harness: &Arc<Harness>,
    max_connections: usize,
    max_idle_time: Duration,
    max_life_time: Duration,
) -> LdapPool {
    LdapPool::new(LdapPoolConfig {
        auth: test_auth(),
        max_connections,
        max_idle_time,
        max_life_time,
        conn_factory: harness.factory(),
    })
}

/// Extract the fake session id from a search result.
pub fn session_id(entries: &[SearchEntry]) -> usize {
    entries
        .first()
        .and_then(|entry| entry.attrs.get("id"))
        .and_then(|values| values.first())
        .and_then(|value| value.parse().ok())
        .expect("fake search result carries a session id")
}
