//! Attributes of the database-wide cache entry,
//! `cn=monitor,cn=ldbm database,cn=plugins,cn=config`.
//!
//! The attribute set differs between the BDB and MDB storage flavors, so
//! there is one table per flavor; configuration picks which one is
//! registered.

use super::gauge;
use crate::collectors::MonitoredAttribute;

/// Normalized DN cache attributes, present for both flavors.
fn ndn_cache_attrs() -> Vec<(&'static str, MonitoredAttribute)> {
    vec![
        (
            "normalizeddncachetries",
            gauge(
                "normalizeddncachetries",
                "Total number of cache lookups since the instance was started",
            ),
        ),
        (
            "normalizeddncachehits",
            gauge(
                "normalizeddncachehits",
                "Normalized DNs found within the cache",
            ),
        ),
        (
            "normalizeddncachemisses",
            gauge(
                "normalizeddncachemisses",
                "Normalized DNs not found within the cache",
            ),
        ),
        (
            "normalizeddncachehitratio",
            gauge(
                "normalizeddncachehitratio",
                "Percentage of the normalized DNs found in the cache",
            ),
        ),
        (
            "currentnormalizeddncachesize",
            gauge(
                "currentnormalizeddncachesize",
                "Current size of the normalized DN cache in bytes",
            ),
        ),
        (
            "maxnormalizeddncachesize",
            gauge(
                "maxnormalizeddncachesize",
                "Maximum size of the normalized DN cache in bytes",
            ),
        ),
        (
            "currentnormalizeddncachecount",
            gauge(
                "currentnormalizeddncachecount",
                "Number of normalized cached DNs",
            ),
        ),
    ]
}

/// Cache attributes exposed by a BDB-backed instance.
pub fn bdb_server_cache_attrs() -> Vec<(&'static str, MonitoredAttribute)> {
    let mut attrs = vec![
        (
            "dbcachehits",
            gauge(
                "dbcachehits",
                "Number of requested pages found in the database cache",
            ),
        ),
        (
            "dbcachetries",
            gauge("dbcachetries", "Total number of cache lookups"),
        ),
        (
            "dbcachehitratio",
            gauge(
                "dbcachehitratio",
                "Percentage of requested pages found in the database cache",
            ),
        ),
        (
            "dbcachepagein",
            gauge("dbcachepagein", "Number of pages read into the database cache"),
        ),
        (
            "dbcachepageout",
            gauge(
                "dbcachepageout",
                "Number of pages written from the database cache to the backing file",
            ),
        ),
        (
            "dbcacheroevict",
            gauge("dbcacheroevict", "Number of clean pages forced from the cache"),
        ),
        (
            "dbcacherwevict",
            gauge("dbcacherwevict", "Number of dirty pages forced from the cache"),
        ),
    ];
    attrs.extend(ndn_cache_attrs());
    attrs
}

/// Cache attributes exposed by an MDB-backed instance.
pub fn mdb_server_cache_attrs() -> Vec<(&'static str, MonitoredAttribute)> {
    ndn_cache_attrs()
}
