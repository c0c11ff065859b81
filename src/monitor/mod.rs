//! Ready-made mappings of 389-DS monitor attributes to metrics.
//!
//! One module per monitor entry. The tables are consumed by
//! [`crate::collectors::EntryCollector`]; nothing here talks to the
//! directory.

mod backend;
mod database;
mod server;
mod server_caches;
mod snmp;
mod subordinates;

pub use backend::backend_cache_attrs;
pub use database::{bdb_database_attrs, mdb_database_attrs};
pub use server::server_attrs;
pub use server_caches::{bdb_server_cache_attrs, mdb_server_cache_attrs};
pub use snmp::snmp_attrs;
pub use subordinates::entry_count_attrs;

use crate::collectors::{AttrValueKind, MetricKind, MonitoredAttribute};

/// Numeric attribute exported as a gauge.
pub(crate) const fn gauge(ldap_name: &'static str, help: &'static str) -> MonitoredAttribute {
    MonitoredAttribute {
        ldap_name,
        help,
        kind: MetricKind::Gauge,
        value: AttrValueKind::Numeric,
    }
}

/// Numeric attribute exported as a counter.
pub(crate) const fn counter(ldap_name: &'static str, help: &'static str) -> MonitoredAttribute {
    MonitoredAttribute {
        ldap_name,
        help,
        kind: MetricKind::Counter,
        value: AttrValueKind::Numeric,
    }
}

/// Compact ISO 8601 timestamp attribute exported as an epoch-seconds gauge.
pub(crate) const fn time_gauge(ldap_name: &'static str, help: &'static str) -> MonitoredAttribute {
    MonitoredAttribute {
        ldap_name,
        help,
        kind: MetricKind::Gauge,
        value: AttrValueKind::Iso8601Compact,
    }
}
