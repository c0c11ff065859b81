//! Attributes of a per-backend monitor entry,
//! `cn=monitor,cn=<backend>,cn=ldbm database,cn=plugins,cn=config`.

use super::gauge;
use crate::collectors::MonitoredAttribute;

/// DN and entry cache attributes of one LDBM backend.
pub fn backend_cache_attrs() -> Vec<(&'static str, MonitoredAttribute)> {
    vec![
        (
            "dncachehits",
            gauge("dncachehits", "Number of DN cache lookups that hit"),
        ),
        (
            "dncachetries",
            gauge("dncachetries", "Total number of DN cache lookups"),
        ),
        (
            "dncachehitratio",
            gauge("dncachehitratio", "Percentage of DN cache lookups that hit"),
        ),
        (
            "currentdncachesize",
            gauge("currentdncachesize", "Current size of the DN cache in bytes"),
        ),
        (
            "maxdncachesize",
            gauge("maxdncachesize", "Maximum size of the DN cache in bytes"),
        ),
        (
            "currentdncachecount",
            gauge("currentdncachecount", "Number of DNs currently cached"),
        ),
        (
            "entrycachehits",
            gauge("entrycachehits", "Number of entry cache lookups that hit"),
        ),
        (
            "entrycachetries",
            gauge("entrycachetries", "Total number of entry cache lookups"),
        ),
        (
            "entrycachehitratio",
            gauge(
                "entrycachehitratio",
                "Percentage of entry cache lookups that hit",
            ),
        ),
        (
            "currententrycachesize",
            gauge(
                "currententrycachesize",
                "Current size of the entry cache in bytes",
            ),
        ),
        (
            "maxentrycachesize",
            gauge(
                "maxentrycachesize",
                "Maximum size of the entry cache in bytes",
            ),
        ),
        (
            "currententrycachecount",
            gauge(
                "currententrycachecount",
                "Number of entries currently cached",
            ),
        ),
    ]
}
