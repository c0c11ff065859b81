//! Bounded LDAP connection pool.
//!
//! Every collector talks to the directory through this pool. An acquisition
//! either reuses the most recently returned idle connection, dials a new one
//! while capacity remains, or parks the caller as a waiter until a holder
//! releases. Idle connections age out in the background; connections that
//! observed a transport error are never handed out again.
//!
//! Concurrency model: one mutex guards the idle list, the open-connection
//! count, the closed flag, the cleaner slot and the waiter set. Statistics
//! counters are relaxed atomics outside that lock. Waiters are single-shot
//! delivery slots chosen uniformly at random on release, which avoids FIFO
//! starvation pathologies when bursts of identical deadlines arrive.

mod conn;
mod waiters;

pub use conn::{
    dial_factory, is_transport_error, ConnFactory, LdapAuthConfig, LdapSession, SearchRequest,
};

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Weak,
    },
    time::{Duration, Instant},
};

use ldap3::{LdapError, SearchEntry};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{oneshot, Notify};
use tracing::{debug, trace};

use self::waiters::{WaiterHandle, WaiterSet};

/// Retries of the cached-connection path before a fresh connection is forced.
const MAX_BAD_CONN_RETRIES: usize = 2;

/// Floor for the background cleaner wake-up interval.
const CLEANER_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Error type for pool acquisition and handle operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool has been closed; no further acquisitions are possible.
    #[error("pool closed")]
    Closed,
    /// Waiting for a connection exceeded the caller's budget.
    #[error("connection acquisition timeout")]
    AcquireTimeout,
    /// The connection selected from the pool turned out to be unusable.
    ///
    /// Internal sentinel: recovered inside [`LdapPool::acquire`] by a bounded
    /// retry loop and never surfaced to callers.
    #[error("bad connection")]
    BadConnection,
    /// The connection factory failed before bind.
    #[error("dial failed: {0}")]
    Dial(#[source] LdapError),
    /// Authentication of a freshly dialed connection failed.
    #[error("bind failed: {0}")]
    Bind(#[source] LdapError),
}

/// Pool configuration, immutable after construction.
pub struct LdapPoolConfig {
    /// Authentication bundle handed to the factory and to `bind`.
    pub auth: LdapAuthConfig,
    /// Upper bound on open connections. Zero means unbounded.
    pub max_connections: usize,
    /// Maximum time a connection may sit idle before being closed.
    /// Zero disables idle aging.
    pub max_idle_time: Duration,
    /// Maximum wall-clock age of a connection. Zero disables lifetime aging.
    pub max_life_time: Duration,
    /// Producer of fresh, unbound sessions.
    pub conn_factory: ConnFactory,
}

/// Snapshot of pool usage counters.
///
/// All fields except `open` are monotonic over the life of the pool.
#[derive(Clone, Copy, Debug, Default)]
pub struct PoolStat {
    /// Currently open connections, in use plus idle.
    pub open: usize,
    /// Times an acquirer had to block waiting for a connection.
    pub wait_count: u64,
    /// Accumulated time acquirers spent blocked.
    pub wait_duration: Duration,
    /// Connections reaped because they sat idle too long.
    pub closed_idle_time: u64,
    /// Connections reaped for age, or discarded as bad.
    pub closed_life_time: u64,
}

/// How an acquisition may source its connection.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Strategy {
    /// Reuse a cached connection if available, else wait or dial.
    CachedOrNew,
    /// Dial a fresh connection, bypassing the idle list.
    ///
    /// Used as the last resort after [`MAX_BAD_CONN_RETRIES`] cached attempts
    /// all surfaced bad connections.
    AlwaysNew,
}

/// Mutable per-connection bookkeeping, touched only under the pool lock.
struct ConnMeta {
    in_use: bool,
    returned_at: Instant,
}

/// One pooled connection: an LDAP session plus lifecycle metadata.
struct PooledConn {
    /// Owning pool, held weakly so the pool's idle list never forms a cycle.
    pool: Weak<PoolShared>,
    created_at: Instant,
    /// Latched by the handle on transport errors; never cleared.
    bad: AtomicBool,
    meta: Mutex<ConnMeta>,
    /// The underlying session. `None` once torn down, which makes teardown
    /// exactly-once.
    session: Mutex<Option<Box<dyn LdapSession>>>,
}

impl PooledConn {
    fn expired(&self, timeout: Duration) -> bool {
        !timeout.is_zero() && self.created_at.elapsed() > timeout
    }

    fn idle_expired(&self, timeout: Duration) -> bool {
        !timeout.is_zero() && self.meta.lock().returned_at.elapsed() > timeout
    }

    /// Tear this connection down: sever the session and release pool
    /// capacity through the back-reference.
    ///
    /// Must be called without the pool lock held. Exactly-once per
    /// connection; later calls are no-ops.
    fn teardown(&self) {
        let Some(mut session) = self.session.lock().take() else {
            return;
        };
        // Unbind off the hot path; release must not block on the network.
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                rt.spawn(async move {
                    let _ = session.unbind().await;
                    session.close().await;
                });
            }
            Err(_) => drop(session),
        }
        if let Some(pool) = self.pool.upgrade() {
            let mut state = pool.state.lock();
            state.num_open = state.num_open.saturating_sub(1);
        }
    }
}

/// State guarded by the single pool mutex.
struct PoolState {
    /// Idle connections ordered by return time, oldest first.
    free_conns: Vec<Arc<PooledConn>>,
    /// Open connections, in use plus idle. Bounded by `max_open` when positive.
    num_open: usize,
    closed: bool,
    waiters: WaiterSet<Arc<PooledConn>>,
    /// Wake-up slot of the running cleaner task, if any.
    cleaner: Option<Arc<Notify>>,
}

struct PoolShared {
    auth: LdapAuthConfig,
    factory: ConnFactory,
    max_open: usize,
    max_life_time: Duration,
    max_idle_time: Duration,
    state: Mutex<PoolState>,
    wait_count: AtomicU64,
    /// Nanoseconds; summed outside the lock.
    wait_duration: AtomicU64,
    idle_closed: AtomicU64,
    lifetime_closed: AtomicU64,
    /// Self-reference handed to pooled connections and spawned tasks.
    weak_self: Weak<PoolShared>,
}

/// Bounded reservoir of authenticated LDAP connections.
///
/// Cheap to clone; all clones share the same pool.
#[derive(Clone)]
pub struct LdapPool {
    shared: Arc<PoolShared>,
}

impl LdapPool {
    pub fn new(cfg: LdapPoolConfig) -> Self {
        Self {
            shared: Arc::new_cyclic(|weak| PoolShared {
                auth: cfg.auth,
                factory: cfg.conn_factory,
                max_open: cfg.max_connections,
                max_life_time: cfg.max_life_time,
                max_idle_time: cfg.max_idle_time,
                state: Mutex::new(PoolState {
                    free_conns: Vec::new(),
                    num_open: 0,
                    closed: false,
                    waiters: WaiterSet::new(),
                    cleaner: None,
                }),
                wait_count: AtomicU64::new(0),
                wait_duration: AtomicU64::new(0),
                idle_closed: AtomicU64::new(0),
                lifetime_closed: AtomicU64::new(0),
                weak_self: weak.clone(),
            }),
        }
    }

    /// Acquire a connection handle, blocking while the pool is at capacity.
    ///
    /// Cancellation-safe: dropping the returned future while it waits
    /// removes the caller from the waiter set, and a delivery that raced the
    /// cancellation is fed back into the pool rather than leaked.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Closed`] after [`Self::close`], or a
    /// [`PoolError::Dial`]/[`PoolError::Bind`] from establishing a fresh
    /// connection. Bad cached connections are retried internally and never
    /// surface.
    pub async fn acquire(&self) -> Result<PooledLdap, PoolError> {
        let mut attempts = 0;
        let pc = loop {
            match self.shared.conn(Strategy::CachedOrNew).await {
                Err(PoolError::BadConnection) if attempts < MAX_BAD_CONN_RETRIES - 1 => {
                    attempts += 1;
                }
                Err(PoolError::BadConnection) => {
                    break self.shared.conn(Strategy::AlwaysNew).await?;
                }
                res => break res?,
            }
        };
        trace!(
            max = self.shared.max_open,
            open = self.shared.state.lock().num_open,
            waited = self.shared.wait_count.load(Ordering::Relaxed),
            "pool counters"
        );
        Ok(PooledLdap {
            shared: self.shared.clone(),
            conn: Some(pc),
        })
    }

    /// [`Self::acquire`] with an overall deadline.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::AcquireTimeout`] when the budget elapses before a
    /// connection is produced, otherwise as [`Self::acquire`].
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<PooledLdap, PoolError> {
        match tokio::time::timeout(timeout, self.acquire()).await {
            Ok(res) => res,
            Err(_) => Err(PoolError::AcquireTimeout),
        }
    }

    /// Snapshot the usage counters.
    pub fn stat(&self) -> PoolStat {
        let open = self.shared.state.lock().num_open;
        PoolStat {
            open,
            wait_count: self.shared.wait_count.load(Ordering::Relaxed),
            wait_duration: Duration::from_nanos(self.shared.wait_duration.load(Ordering::Relaxed)),
            closed_idle_time: self.shared.idle_closed.load(Ordering::Relaxed),
            closed_life_time: self.shared.lifetime_closed.load(Ordering::Relaxed),
        }
    }

    /// Close the pool: reject new acquisitions, wake every waiter with
    /// [`PoolError::Closed`], and tear down all idle connections.
    ///
    /// Connections currently in use are not waited for; they are torn down
    /// when their handles are released. Subsequent calls are no-ops.
    pub fn close(&self) {
        let (idle, cleaner) = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.waiters.close_and_remove_all();
            (
                std::mem::take(&mut state.free_conns),
                state.cleaner.take(),
            )
        };
        if let Some(notify) = cleaner {
            notify.notify_one();
        }
        for pc in &idle {
            pc.teardown();
        }
        debug!("LDAP connection pool closed");
    }
}

impl PoolShared {
    /// Produce one pooled connection per the given reuse strategy.
    async fn conn(&self, strategy: Strategy) -> Result<Arc<PooledConn>, PoolError> {
        // Scoped so the (non-`Send`) lock guard's lexical lifetime ends
        // before any `.await` below, rather than spanning the whole
        // function body.
        enum Immediate {
            Wait(WaiterHandle, oneshot::Receiver<Arc<PooledConn>>),
            Dial,
        }

        let immediate = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(PoolError::Closed);
            }

            // Prefer the most recently returned idle connection.
            if strategy == Strategy::CachedOrNew {
                if let Some(pc) = state.free_conns.pop() {
                    pc.meta.lock().in_use = true;
                    if pc.bad.load(Ordering::Acquire) || pc.expired(self.max_life_time) {
                        drop(state);
                        self.lifetime_closed.fetch_add(1, Ordering::Relaxed);
                        pc.teardown();
                        return Err(PoolError::BadConnection);
                    }
                    if pc.idle_expired(self.max_idle_time) {
                        drop(state);
                        self.idle_closed.fetch_add(1, Ordering::Relaxed);
                        pc.teardown();
                        return Err(PoolError::BadConnection);
                    }
                    drop(state);
                    return Ok(pc);
                }
            }

            if self.max_open > 0 && state.num_open >= self.max_open {
                // At capacity: enroll as a waiter and block on delivery.
                let (tx, rx) = oneshot::channel();
                let handle = state.waiters.add(tx);
                self.wait_count.fetch_add(1, Ordering::Relaxed);
                Immediate::Wait(handle, rx)
            } else {
                // Capacity remains: account for the new connection before
                // dialing so the bound stays a hard invariant, roll back on
                // failure.
                state.num_open += 1;
                Immediate::Dial
            }
        };

        let (handle, rx) = match immediate {
            Immediate::Wait(handle, rx) => (handle, rx),
            Immediate::Dial => {
                let session = match (self.factory)(self.auth.clone()).await {
                    Ok(session) => session,
                    Err(err) => {
                        self.state.lock().num_open -= 1;
                        return Err(PoolError::Dial(err));
                    }
                };
                let mut session = session;
                if let Err(err) = session.bind(&self.auth).await {
                    tokio::spawn(async move { session.close().await });
                    self.state.lock().num_open -= 1;
                    return Err(PoolError::Bind(err));
                }

                let now = Instant::now();
                return Ok(Arc::new(PooledConn {
                    pool: self.weak_self.clone(),
                    created_at: now,
                    bad: AtomicBool::new(false),
                    meta: Mutex::new(ConnMeta {
                        in_use: true,
                        returned_at: now,
                    }),
                    session: Mutex::new(Some(session)),
                }));
            }
        };

        let mut waiter = WaitGuard {
            shared: self,
            handle,
            rx,
            start: Instant::now(),
            completed: false,
        };
        let delivered = waiter.recv().await;
        self.wait_duration
            .fetch_add(waiter.start.elapsed().as_nanos() as u64, Ordering::Relaxed);

        let pc = delivered.ok_or(PoolError::Closed)?;
        // The releaser could not know this acquirer's freshness
        // requirements, so re-check what arrived. A forced-new strategy
        // skips the check: handing over a usable connection now beats
        // enforcing an expiry that may land a moment later anyway.
        if strategy == Strategy::CachedOrNew {
            if pc.bad.load(Ordering::Acquire) || pc.expired(self.max_life_time) {
                self.lifetime_closed.fetch_add(1, Ordering::Relaxed);
                pc.teardown();
                return Err(PoolError::BadConnection);
            }
            if pc.idle_expired(self.max_idle_time) {
                self.idle_closed.fetch_add(1, Ordering::Relaxed);
                pc.teardown();
                return Err(PoolError::BadConnection);
            }
        }
        Ok(pc)
    }

    /// Return a connection to the pool.
    ///
    /// Idempotent: only the first release of a given acquisition changes
    /// pool state. Bad or lifetime-expired connections are torn down instead
    /// of pooled.
    fn put_conn(&self, pc: &Arc<PooledConn>) {
        let mut state = self.state.lock();
        {
            let mut meta = pc.meta.lock();
            if !meta.in_use {
                return;
            }
            meta.in_use = false;
            meta.returned_at = Instant::now();
        }

        if pc.bad.load(Ordering::Acquire) || pc.expired(self.max_life_time) {
            self.lifetime_closed.fetch_add(1, Ordering::Relaxed);
            drop(state);
            pc.teardown();
            return;
        }

        let added = self.put_conn_locked(&mut state, pc);
        drop(state);
        if !added {
            pc.teardown();
        }
    }

    /// Hand `pc` to a random waiter or append it to the idle list.
    ///
    /// Returns `false` if neither was possible (pool closed or over
    /// capacity); the caller must then tear the connection down.
    fn put_conn_locked(&self, state: &mut PoolState, pc: &Arc<PooledConn>) -> bool {
        if state.closed {
            return false;
        }
        if self.max_open > 0 && state.num_open > self.max_open {
            return false;
        }
        while let Some(tx) = state.waiters.take_random() {
            pc.meta.lock().in_use = true;
            if tx.send(pc.clone()).is_ok() {
                return true;
            }
            // Receiver vanished before delivery; try the next waiter.
            pc.meta.lock().in_use = false;
        }
        state.free_conns.push(pc.clone());
        self.start_cleaner_locked(state);
        true
    }

    fn shortest_idle_time(&self) -> Duration {
        if self.max_idle_time.is_zero() {
            return self.max_life_time;
        }
        if self.max_life_time.is_zero() {
            return self.max_idle_time;
        }
        self.max_idle_time.min(self.max_life_time)
    }

    fn start_cleaner_locked(&self, state: &mut PoolState) {
        if (!self.max_life_time.is_zero() || !self.max_idle_time.is_zero())
            && state.num_open > 0
            && state.cleaner.is_none()
        {
            let Some(shared) = self.weak_self.upgrade() else {
                return;
            };
            let notify = Arc::new(Notify::new());
            state.cleaner = Some(notify.clone());
            let interval = self.shortest_idle_time();
            tokio::spawn(async move { shared.connection_cleaner(interval, notify).await });
        }
    }

    /// Long-lived reaper of idle- and lifetime-expired connections.
    ///
    /// Exits once the pool closes, drains to zero open connections, or both
    /// expiry settings are disabled; a later release restarts it.
    async fn connection_cleaner(self: Arc<Self>, mut interval: Duration, notify: Arc<Notify>) {
        if interval < CLEANER_MIN_INTERVAL {
            interval = CLEANER_MIN_INTERVAL;
        }
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = notify.notified() => {}
            }

            let closing;
            {
                let mut state = self.state.lock();
                let shortest = self.shortest_idle_time();
                if state.closed || state.num_open == 0 || shortest.is_zero() {
                    if state
                        .cleaner
                        .as_ref()
                        .is_some_and(|n| Arc::ptr_eq(n, &notify))
                    {
                        state.cleaner = None;
                    }
                    return;
                }
                let (next, victims) = self.cleaner_sweep_locked(&mut state, shortest);
                interval = next.max(CLEANER_MIN_INTERVAL);
                closing = victims;
            }
            if !closing.is_empty() {
                trace!(reaped = closing.len(), "cleaner closing expired connections");
            }
            for pc in &closing {
                pc.teardown();
            }
        }
    }

    /// Remove expired connections from the idle list.
    ///
    /// Returns the interval until the next connection is due, plus the
    /// victims; the caller closes them after releasing the lock.
    fn cleaner_sweep_locked(
        &self,
        state: &mut PoolState,
        mut next: Duration,
    ) -> (Duration, Vec<Arc<PooledConn>>) {
        let now = Instant::now();
        let mut closing: Vec<Arc<PooledConn>> = Vec::new();
        let mut idle_reaped = 0u64;

        if !self.max_idle_time.is_zero() {
            // The idle list is ordered by return time, so the expired
            // connections form a prefix. Scan newest-first to find where it
            // ends and slice it off in one go.
            let mut split = 0;
            for (i, pc) in state.free_conns.iter().enumerate().rev() {
                if now.duration_since(pc.meta.lock().returned_at) > self.max_idle_time {
                    split = i + 1;
                    break;
                }
            }
            if split > 0 {
                closing.extend(state.free_conns.drain(..split));
                idle_reaped = closing.len() as u64;
                self.idle_closed.fetch_add(idle_reaped, Ordering::Relaxed);
            }
            if let Some(oldest) = state.free_conns.first() {
                let age = now.duration_since(oldest.meta.lock().returned_at);
                let due = self.max_idle_time.saturating_sub(age);
                if due < next {
                    next = due;
                }
            }
        }

        if !self.max_life_time.is_zero() {
            let mut kept = Vec::with_capacity(state.free_conns.len());
            for pc in state.free_conns.drain(..) {
                let age = now.duration_since(pc.created_at);
                if age > self.max_life_time {
                    closing.push(pc);
                    continue;
                }
                let due = self.max_life_time - age;
                if due < next {
                    next = due;
                }
                kept.push(pc);
            }
            state.free_conns = kept;
            self.lifetime_closed
                .fetch_add(closing.len() as u64 - idle_reaped, Ordering::Relaxed);
        }

        (next, closing)
    }
}

/// Pending acquirer registration.
///
/// Dropping this mid-wait (the caller's deadline fired, or the acquire
/// future was cancelled) removes the waiter from the set; if removal loses
/// the race against a delivery, the delivered connection is drained and fed
/// back into the pool so it is not leaked.
struct WaitGuard<'a> {
    shared: &'a PoolShared,
    handle: WaiterHandle,
    rx: oneshot::Receiver<Arc<PooledConn>>,
    start: Instant,
    completed: bool,
}

impl WaitGuard<'_> {
    async fn recv(&mut self) -> Option<Arc<PooledConn>> {
        let res = (&mut self.rx).await.ok();
        self.completed = true;
        res
    }
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let deleted = {
            let mut state = self.shared.state.lock();
            state.waiters.delete(&self.handle)
        };
        if !deleted {
            // The pool took this waiter concurrently and has already placed
            // a connection in the slot; absorb it back.
            if let Ok(pc) = self.rx.try_recv() {
                self.shared.put_conn(&pc);
            }
        }
        self.shared
            .wait_duration
            .fetch_add(self.start.elapsed().as_nanos() as u64, Ordering::Relaxed);
    }
}

/// User-facing connection handle.
///
/// Obtained from [`LdapPool::acquire`]; returns the connection to the pool
/// on [`Self::close`] or drop. Consuming `close` makes use-after-close
/// unrepresentable, and the pool keeps release idempotent regardless.
pub struct PooledLdap {
    shared: Arc<PoolShared>,
    conn: Option<Arc<PooledConn>>,
}

impl std::fmt::Debug for PooledLdap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledLdap").finish_non_exhaustive()
    }
}

impl PooledLdap {
    /// Run one search on the pooled session.
    ///
    /// Transport-class failures latch the connection as bad so it is torn
    /// down on release instead of being reused. Application-level LDAP
    /// errors pass through without affecting the connection.
    ///
    /// # Errors
    ///
    /// Returns the raw [`LdapError`] from the underlying session.
    pub async fn search(&mut self, req: &SearchRequest) -> Result<Vec<SearchEntry>, LdapError> {
        let pc = self
            .conn
            .as_ref()
            .expect("connection handle used after close");
        let mut session = pc
            .session
            .lock()
            .take()
            .expect("pooled session torn down while in use");
        let res = session.search(req).await;
        *pc.session.lock() = Some(session);
        if let Err(err) = &res {
            if is_transport_error(err) {
                pc.bad.store(true, Ordering::Release);
                debug!(error = %err, "transport error, marking pooled connection bad");
            }
        }
        res
    }

    /// Return the connection to the pool.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(pc) = self.conn.take() {
            self.shared.put_conn(&pc);
        }
    }
}

impl Drop for PooledLdap {
    fn drop(&mut self) {
        self.release();
    }
}
