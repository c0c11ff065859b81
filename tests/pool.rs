//! Behavioral suite for the LDAP connection pool, driven entirely through
//! fake sessions.

mod common;

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;
use tokio::time::sleep;

use common::{make_pool, make_pool_with, session_id, Harness};
use ds389_exporter::pool::{LdapPool, LdapPoolConfig, PoolError};

#[tokio::test]
async fn happy_path_reuses_single_connection() {
    let harness = Harness::new();
    let pool = make_pool(&harness, 1);

    let mut conn = pool.acquire().await.expect("first acquire");
    let first_id = session_id(&conn.search(&req()).await.expect("search"));
    conn.close();

    let mut conn = pool.acquire().await.expect("second acquire");
    let second_id = session_id(&conn.search(&req()).await.expect("search"));
    conn.close();

    assert_eq!(first_id, second_id, "idle connection must be reused");
    assert_eq!(harness.created.load(Ordering::SeqCst), 1);
    assert_eq!(harness.binds.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn waiter_times_out_and_holder_still_releases() {
    let harness = Harness::new();
    let pool = make_pool(&harness, 1);

    let holder = pool.acquire().await.expect("holder");

    let err = pool
        .acquire_timeout(Duration::from_millis(10))
        .await
        .expect_err("pool is exhausted, waiter must time out");
    assert!(matches!(err, PoolError::AcquireTimeout), "got {err:?}");

    let stat = pool.stat();
    assert_eq!(stat.wait_count, 1);
    // The wait clock starts a hair after the deadline is armed, so allow
    // a small margin below the nominal 10ms.
    assert!(
        stat.wait_duration >= Duration::from_millis(9),
        "wait_duration {:?} must cover the deadline",
        stat.wait_duration
    );

    holder.close();
    let conn = pool.acquire().await.expect("acquire after release");
    conn.close();
}

#[tokio::test]
async fn transport_error_invalidates_connection() {
    let harness = Harness::new();
    let pool = make_pool(&harness, 1);

    let mut conn = pool.acquire().await.expect("acquire");
    let id = session_id(&conn.search(&req()).await.expect("search"));
    harness.fail_search(id);
    conn.search(&req()).await.expect_err("injected transport error");
    conn.close();

    let mut conn = pool.acquire().await.expect("acquire after bad");
    let new_id = session_id(&conn.search(&req()).await.expect("search"));
    conn.close();

    assert_ne!(id, new_id, "bad connection must not be reused");
    assert_eq!(harness.created.load(Ordering::SeqCst), 2);
    assert_eq!(pool.stat().closed_life_time, 1);
}

#[tokio::test]
async fn sticky_bad_flag_survives_recovery_of_the_fake() {
    let harness = Harness::new();
    let pool = make_pool(&harness, 1);

    let mut conn = pool.acquire().await.expect("acquire");
    let id = session_id(&conn.search(&req()).await.expect("search"));
    harness.fail_search(id);
    conn.search(&req()).await.expect_err("transport error");
    // The underlying session works again, but the bad flag is one-way.
    harness.heal_search(id);
    conn.close();

    let mut conn = pool.acquire().await.expect("acquire");
    let new_id = session_id(&conn.search(&req()).await.expect("search"));
    conn.close();
    assert_ne!(id, new_id);
}

#[tokio::test]
async fn application_error_does_not_mark_bad() {
    let harness = Harness::new();
    let pool = make_pool(&harness, 1);

    let mut conn = pool.acquire().await.expect("acquire");
    let id = session_id(&conn.search(&req()).await.expect("search"));
    // An LDAP-level failure leaves the transport healthy.
    let err = ldap3::LdapError::UnknownScheme("gopher".into());
    assert!(!ds389_exporter::pool::is_transport_error(&err));
    conn.close();

    let mut conn = pool.acquire().await.expect("acquire");
    let same_id = session_id(&conn.search(&req()).await.expect("search"));
    conn.close();
    assert_eq!(id, same_id, "healthy connection must be reused");
    assert_eq!(pool.stat().closed_life_time, 0);
}

#[tokio::test]
async fn idle_expiry_replaces_connection() {
    let harness = Harness::new();
    let pool = make_pool_with(&harness, 1, Duration::from_millis(10), Duration::ZERO);

    let mut conn = pool.acquire().await.expect("acquire");
    let id = session_id(&conn.search(&req()).await.expect("search"));
    conn.close();

    sleep(Duration::from_millis(20)).await;

    let mut conn = pool.acquire().await.expect("acquire after idle expiry");
    let new_id = session_id(&conn.search(&req()).await.expect("search"));
    conn.close();

    assert_ne!(id, new_id, "idle-expired connection must not be served");
    assert!(pool.stat().closed_idle_time >= 1);
}

#[tokio::test]
async fn lifetime_expiry_replaces_connection() {
    let harness = Harness::new();
    let pool = make_pool_with(&harness, 1, Duration::ZERO, Duration::from_millis(10));

    let mut conn = pool.acquire().await.expect("acquire");
    let id = session_id(&conn.search(&req()).await.expect("search"));
    conn.close();

    sleep(Duration::from_millis(20)).await;

    let mut conn = pool.acquire().await.expect("acquire after lifetime expiry");
    let new_id = session_id(&conn.search(&req()).await.expect("search"));
    conn.close();

    assert_ne!(id, new_id, "lifetime-expired connection must not be served");
    assert!(pool.stat().closed_life_time >= 1);
}

#[tokio::test]
async fn expiry_edge_boundaries() {
    let harness = Harness::new();
    let pool = make_pool_with(
        &harness,
        1,
        Duration::from_millis(200),
        Duration::from_millis(200),
    );

    let mut conn = pool.acquire().await.expect("acquire");
    let id = session_id(&conn.search(&req()).await.expect("search"));
    conn.close();

    // Well inside both limits: the same connection comes back.
    sleep(Duration::from_millis(50)).await;
    let mut conn = pool.acquire().await.expect("acquire inside the limits");
    let same_id = session_id(&conn.search(&req()).await.expect("search"));
    assert_eq!(id, same_id);
    conn.close();

    // Past both limits: a replacement is dialed.
    sleep(Duration::from_millis(250)).await;
    let mut conn = pool.acquire().await.expect("acquire past the limits");
    let new_id = session_id(&conn.search(&req()).await.expect("search"));
    assert_ne!(same_id, new_id, "expired connection must be replaced");
    conn.close();
}

#[tokio::test]
async fn dial_failure_rolls_back_capacity() {
    let harness = Harness::new();
    let pool = LdapPool::new(LdapPoolConfig {
        auth: common::test_auth(),
        max_connections: 1,
        max_idle_time: Duration::ZERO,
        max_life_time: Duration::ZERO,
        conn_factory: harness.factory_failing_first(),
    });

    let err = pool.acquire().await.expect_err("first dial fails");
    assert!(matches!(err, PoolError::Dial(_)), "got {err:?}");
    assert_eq!(pool.stat().open, 0, "failed dial must not hold capacity");

    let conn = pool.acquire().await.expect("second dial succeeds");
    assert_eq!(pool.stat().open, 1);
    conn.close();
    assert_eq!(harness.factory_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn acquire_after_close_is_rejected() {
    let harness = Harness::new();
    let pool = make_pool(&harness, 1);

    let conn = pool.acquire().await.expect("acquire");
    conn.close();
    pool.close();
    // A second close is a no-op.
    pool.close();

    let err = pool.acquire().await.expect_err("pool is closed");
    assert!(matches!(err, PoolError::Closed), "got {err:?}");
    assert_eq!(pool.stat().open, 0, "idle connections torn down on close");
}

#[tokio::test]
async fn release_after_pool_close_tears_down() {
    let harness = Harness::new();
    let pool = make_pool(&harness, 1);

    let conn = pool.acquire().await.expect("acquire");
    pool.close();
    assert_eq!(pool.stat().open, 1, "in-use connection outlives close");
    conn.close();
    assert_eq!(pool.stat().open, 0, "late release must discard, not pool");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn close_wakes_all_waiters() {
    let harness = Harness::new();
    let pool = make_pool(&harness, 1);

    let holder = pool.acquire().await.expect("holder");

    let mut waiters = Vec::new();
    for _ in 0..10 {
        let pool = pool.clone();
        waiters.push(tokio::spawn(async move { pool.acquire().await }));
    }
    // Let the waiters enqueue before pulling the plug.
    sleep(Duration::from_millis(20)).await;
    pool.close();
    holder.close();

    for waiter in waiters {
        let res = tokio::time::timeout(Duration::from_millis(100), waiter)
            .await
            .expect("waiter must wake promptly")
            .expect("waiter task must not panic");
        assert!(matches!(res, Err(PoolError::Closed)), "got {res:?}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancelled_waiters_leak_nothing() {
    let harness = Harness::new();
    let pool = make_pool(&harness, 1);

    let holder = pool.acquire().await.expect("holder");

    let mut cancelled = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        cancelled.push(tokio::spawn(async move {
            pool.acquire_timeout(Duration::from_millis(10)).await
        }));
    }
    for task in cancelled {
        let res = task.await.expect("no panic");
        assert!(matches!(res, Err(PoolError::AcquireTimeout)), "got {res:?}");
    }

    assert_eq!(pool.stat().wait_count, 8);
    assert_eq!(pool.stat().open, 1, "only the held connection is open");

    holder.close();
    let conn = pool.acquire().await.expect("pool still serves after churn");
    conn.close();
    assert_eq!(
        harness.created.load(Ordering::SeqCst),
        1,
        "cancelled waiters must not have forced extra dials"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn contention_hammering_respects_bound() {
    const MAX_CONNS: usize = 5;
    const WORKERS: usize = 50;
    const ITERS: usize = 20;

    let harness = Harness::new();
    let pool = make_pool(&harness, MAX_CONNS);

    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..WORKERS {
        let pool = pool.clone();
        let current = current.clone();
        let peak = peak.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..ITERS {
                let conn = pool.acquire().await.expect("acquire under contention");
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(1)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                conn.close();
            }
        }));
    }
    for task in tasks {
        task.await.expect("worker must not panic");
    }

    assert!(
        peak.load(Ordering::SeqCst) <= MAX_CONNS,
        "outstanding handles exceeded the bound: {}",
        peak.load(Ordering::SeqCst)
    );
    assert!(harness.created.load(Ordering::SeqCst) <= MAX_CONNS);

    pool.close();
    assert_eq!(pool.stat().open, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn waiters_all_served_under_stepwise_release() {
    let harness = Harness::new();
    let pool = make_pool(&harness, 2);

    let first = pool.acquire().await.expect("first");
    let second = pool.acquire().await.expect("second");

    let served = Arc::new(AtomicUsize::new(0));
    let mut tasks = Vec::new();
    for _ in 0..20 {
        let pool = pool.clone();
        let served = served.clone();
        tasks.push(tokio::spawn(async move {
            let conn = pool.acquire().await.expect("waiter must be served");
            served.fetch_add(1, Ordering::SeqCst);
            conn.close();
        }));
    }

    sleep(Duration::from_millis(10)).await;
    first.close();
    sleep(Duration::from_millis(10)).await;
    second.close();

    for task in tasks {
        task.await.expect("waiter must not panic");
    }
    assert_eq!(served.load(Ordering::SeqCst), 20, "every waiter is served");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn bad_connections_under_concurrency_never_resurface() {
    const MAX_CONNS: usize = 5;
    const WORKERS: usize = 20;
    const ITERS: usize = 30;

    let harness = Harness::new();
    let pool = make_pool(&harness, MAX_CONNS);
    let poisoned: Arc<Mutex<HashSet<usize>>> = Arc::new(Mutex::new(HashSet::new()));

    let mut tasks = Vec::new();
    for worker in 0..WORKERS {
        let pool = pool.clone();
        let harness = harness.clone();
        let poisoned = poisoned.clone();
        tasks.push(tokio::spawn(async move {
            for iter in 0..ITERS {
                let mut conn = pool.acquire().await.expect("acquire");
                let entries = conn
                    .search(&req())
                    .await
                    .expect("freshly served connection must search cleanly");
                let id = session_id(&entries);
                assert!(
                    !poisoned.lock().contains(&id),
                    "poisoned session {id} was handed out again"
                );
                if (worker + iter) % 7 == 0 {
                    poisoned.lock().insert(id);
                    harness.fail_search(id);
                    conn.search(&req()).await.expect_err("poisoned search");
                }
                conn.close();
            }
        }));
    }
    for task in tasks {
        task.await.expect("worker must not panic");
    }

    pool.close();
    assert_eq!(pool.stat().open, 0);
}

#[tokio::test]
async fn counters_are_monotonic() {
    let harness = Harness::new();
    let pool = make_pool_with(&harness, 1, Duration::from_millis(5), Duration::ZERO);

    let mut last = pool.stat();
    for round in 0..10 {
        let conn = pool.acquire().await.expect("acquire");
        if round % 3 == 0 {
            let blocked = pool.acquire_timeout(Duration::from_millis(5)).await;
            assert!(blocked.is_err());
        }
        conn.close();
        if round % 2 == 0 {
            sleep(Duration::from_millis(10)).await;
        }

        let stat = pool.stat();
        assert!(stat.wait_count >= last.wait_count);
        assert!(stat.wait_duration >= last.wait_duration);
        assert!(stat.closed_idle_time >= last.closed_idle_time);
        assert!(stat.closed_life_time >= last.closed_life_time);
        last = stat;
    }
}

fn req() -> ds389_exporter::pool::SearchRequest {
    ds389_exporter::pool::SearchRequest::base("cn=monitor", vec!["id".into()])
}
