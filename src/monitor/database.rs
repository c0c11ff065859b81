//! Attributes of the LDBM database entry,
//! `cn=database,cn=monitor,cn=ldbm database,cn=plugins,cn=config`.

use super::{counter, gauge};
use crate::collectors::MonitoredAttribute;

/// Database-level attributes of a BDB-backed instance.
pub fn bdb_database_attrs() -> Vec<(&'static str, MonitoredAttribute)> {
    vec![
        (
            "abort_rate",
            counter(
                "nsslapd-db-abort-rate",
                "Number of transactions that have been aborted",
            ),
        ),
        (
            "active_txns",
            gauge(
                "nsslapd-db-active-txns",
                "Number of transactions that are currently active",
            ),
        ),
        (
            "cache_size_bytes",
            gauge("nsslapd-db-cache-size-bytes", "Total cache size in bytes"),
        ),
        (
            "cache_region_wait_rate",
            gauge(
                "nsslapd-db-cache-region-wait-rate",
                "Number of times a thread was forced to wait before obtaining the cache region lock",
            ),
        ),
        (
            "clean_pages",
            gauge("nsslapd-db-clean-pages", "Clean pages currently in the cache"),
        ),
        (
            "commit_rate",
            counter(
                "nsslapd-db-commit-rate",
                "Number of transactions that have been committed",
            ),
        ),
        (
            "deadlock_rate",
            gauge("nsslapd-db-deadlock-rate", "Number of deadlocks detected"),
        ),
        (
            "dirty_pages",
            gauge("nsslapd-db-dirty-pages", "Dirty pages currently in the cache"),
        ),
        (
            "hash_buckets",
            gauge(
                "nsslapd-db-hash-buckets",
                "Number of hash buckets in the buffer hash table",
            ),
        ),
        (
            "hash_elements_examine_rate",
            gauge(
                "nsslapd-db-hash-elements-examine-rate",
                "Total number of hash elements traversed during hash table lookups",
            ),
        ),
        (
            "hash_search_rate",
            gauge(
                "nsslapd-db-hash-search-rate",
                "Total number of buffer hash table lookups",
            ),
        ),
        (
            "lock_conflicts",
            gauge(
                "nsslapd-db-lock-conflicts",
                "Total number of locks not immediately available due to conflicts",
            ),
        ),
        (
            "lock_region_wait_rate",
            gauge(
                "nsslapd-db-lock-region-wait-rate",
                "Number of times a thread was forced to wait before obtaining the lock region lock",
            ),
        ),
        (
            "lock_request_rate",
            gauge("nsslapd-db-lock-request-rate", "Total number of locks requested"),
        ),
        (
            "lockers",
            gauge("nsslapd-db-lockers", "Number of current lockers"),
        ),
        (
            "configured_locks",
            gauge("nsslapd-db-configured-locks", "Configured number of locks"),
        ),
        (
            "current_locks",
            gauge(
                "nsslapd-db-current-locks",
                "Number of locks currently used by the database",
            ),
        ),
        (
            "max_locks",
            gauge(
                "nsslapd-db-max-locks",
                "Maximum number of locks held at any one time",
            ),
        ),
        (
            "log_region_wait_rate",
            gauge(
                "nsslapd-db-log-region-wait-rate",
                "Number of times a thread was forced to wait before obtaining the log region lock",
            ),
        ),
        (
            "log_write_rate",
            gauge(
                "nsslapd-db-log-write-rate",
                "Number of bytes written to the transaction log since the last checkpoint",
            ),
        ),
        (
            "longest_chain_length",
            gauge(
                "nsslapd-db-longest-chain-length",
                "Longest chain ever encountered in buffer hash table lookups",
            ),
        ),
        (
            "page_create_rate",
            gauge("nsslapd-db-page-create-rate", "Pages created in the cache"),
        ),
        (
            "page_read_rate",
            gauge("nsslapd-db-page-read-rate", "Pages read into the cache"),
        ),
        (
            "page_ro_evict_rate",
            gauge("nsslapd-db-page-ro-evict-rate", "Clean pages forced from the cache"),
        ),
        (
            "page_rw_evict_rate",
            gauge("nsslapd-db-page-rw-evict-rate", "Dirty pages forced from the cache"),
        ),
        (
            "page_trickle_rate",
            gauge(
                "nsslapd-db-page-trickle-rate",
                "Dirty pages written using the memp_trickle interface",
            ),
        ),
        (
            "page_write_rate",
            gauge(
                "nsslapd-db-page-write-rate",
                "Pages written from the cache to the backing file",
            ),
        ),
        (
            "pages_in_use",
            gauge(
                "nsslapd-db-pages-in-use",
                "All pages, clean or dirty, currently in use",
            ),
        ),
        (
            "txn_region_wait_rate",
            gauge(
                "nsslapd-db-txn-region-wait-rate",
                "Number of times a thread was forced to wait before obtaining the txn region lock",
            ),
        ),
        (
            "current_lock_objects",
            gauge("nsslapd-db-current-lock-objects", "Number of current lock objects"),
        ),
        (
            "max_lock_objects",
            gauge(
                "nsslapd-db-max-lock-objects",
                "Maximum number of lock objects at any one time",
            ),
        ),
    ]
}

/// Database-level attributes of an MDB-backed instance.
pub fn mdb_database_attrs() -> Vec<(&'static str, MonitoredAttribute)> {
    vec![
        (
            "dbenvmapsize",
            gauge("dbenvmapsize", "Size of the LMDB memory map in bytes"),
        ),
        (
            "dbenvlastpageno",
            gauge("dbenvlastpageno", "Last page number used in the LMDB environment"),
        ),
        (
            "dbenvlasttxnid",
            gauge("dbenvlasttxnid", "ID of the last committed transaction"),
        ),
        (
            "dbenvmaxreaders",
            gauge("dbenvmaxreaders", "Maximum number of reader slots"),
        ),
        (
            "dbenvnumreaders",
            gauge("dbenvnumreaders", "Number of reader slots currently in use"),
        ),
        (
            "dbenvnumdbis",
            gauge("dbenvnumdbis", "Number of named databases in the environment"),
        ),
        (
            "waitingrwtxn",
            gauge("waitingrwtxn", "Read-write transactions waiting to start"),
        ),
        (
            "activerwtxn",
            gauge("activerwtxn", "Read-write transactions currently active"),
        ),
        (
            "abortrwtxn",
            gauge("abortrwtxn", "Read-write transactions aborted"),
        ),
        (
            "commitrwtxn",
            gauge("commitrwtxn", "Read-write transactions committed"),
        ),
        (
            "granttimerwtxn",
            gauge("granttimerwtxn", "Time spent granting read-write transactions"),
        ),
        (
            "lifetimerwtxn",
            gauge("lifetimerwtxn", "Lifetime of read-write transactions"),
        ),
        (
            "waitingrotxn",
            gauge("waitingrotxn", "Read-only transactions waiting to start"),
        ),
        (
            "activerotxn",
            gauge("activerotxn", "Read-only transactions currently active"),
        ),
        (
            "abortrotxn",
            gauge("abortrotxn", "Read-only transactions aborted"),
        ),
        (
            "commitrotxn",
            gauge("commitrotxn", "Read-only transactions committed"),
        ),
        (
            "granttimerotxn",
            gauge("granttimerotxn", "Time spent granting read-only transactions"),
        ),
        (
            "lifetimerotxn",
            gauge("lifetimerotxn", "Lifetime of read-only transactions"),
        ),
    ]
}
