//! Scrape fan-out and metric family construction.
//!
//! Each registered collector reads one corner of the directory per scrape.
//! Collectors run concurrently, each with its own pool acquisition, and a
//! failing collector only zeroes its own `scrape_success` sample; the rest
//! of the scrape proceeds. Partial scrapes are the norm.

mod entry;
mod pool;

pub use entry::{AttrValueKind, EntryCollector, MonitoredAttribute};
pub use pool::PoolCollector;

use std::{collections::BTreeMap, time::Instant};

use async_trait::async_trait;
use futures::future::join_all;
use ldap3::LdapError;
use prometheus::proto;
use thiserror::Error;
use tracing::error;

use crate::pool::PoolError;

/// Namespace prefixed to every exported metric name.
pub const NAMESPACE: &str = "ds";

/// Subsystem of the scrape meta metrics.
const SCRAPE_SUBSYSTEM: &str = "exporter_scrape";

/// Error type for one collector scrape.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// No pooled connection could be produced in time.
    #[error("failed to get connection from pool: {0}")]
    Pool(#[from] PoolError),
    /// The LDAP search itself failed.
    #[error("LDAP search under '{base_dn}' failed: {source}")]
    Search {
        /// Entry the search was scoped to.
        base_dn: String,
        #[source]
        source: LdapError,
    },
    /// The monitor entry exists but came back empty.
    #[error("monitor entry '{0}' returned no entries")]
    EmptyEntry(String),
    /// An attribute value did not convert to a sample.
    #[error("cannot convert attribute '{attr}' value '{value}' to a metric")]
    Convert {
        /// LDAP attribute name.
        attr: String,
        /// Offending value.
        value: String,
    },
}

/// One source of metric families, scraped on every `/metrics` request.
///
/// Implementations append whatever they could collect to `out` even when
/// returning an error, mirroring how a partially readable monitor entry
/// still yields the attributes that did convert.
#[async_trait]
pub trait MonitorCollector: Send + Sync {
    /// Collect metric families into `out`.
    async fn collect(&self, out: &mut Vec<proto::MetricFamily>) -> Result<(), ScrapeError>;
}

/// The set of registered collectors; drives one scrape.
#[derive(Default)]
pub struct CollectorSet {
    collectors: Vec<(String, Box<dyn MonitorCollector>)>,
}

impl CollectorSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named collector. The name labels the scrape meta metrics.
    pub fn register(&mut self, name: impl Into<String>, collector: Box<dyn MonitorCollector>) {
        self.collectors.push((name.into(), collector));
    }

    /// Run every collector concurrently and merge the results.
    ///
    /// Families are merged by name (several collectors contribute to the
    /// scrape meta families) and returned sorted for stable exposition.
    pub async fn gather(&self) -> Vec<proto::MetricFamily> {
        let scrapes = self.collectors.iter().map(|(name, collector)| async move {
            let start = Instant::now();
            let mut families = Vec::new();
            let result = collector.collect(&mut families).await;
            let elapsed = start.elapsed().as_secs_f64();
            let success = match result {
                Ok(()) => 1.0,
                Err(err) => {
                    error!(collector = %name, error = %err, "collector failed");
                    0.0
                }
            };
            let label = [("collector".to_string(), name.clone())];
            families.push(new_family(
                &build_fq_name(SCRAPE_SUBSYSTEM, "duration_seconds"),
                "Duration of a collector scrape",
                MetricKind::Gauge,
                &label,
                elapsed,
            ));
            families.push(new_family(
                &build_fq_name(SCRAPE_SUBSYSTEM, "success"),
                "Whether a collector succeeded",
                MetricKind::Gauge,
                &label,
                success,
            ));
            families
        });
        merge_families(join_all(scrapes).await.into_iter().flatten())
    }
}

/// Exported sample type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricKind {
    /// Monotonically increasing value.
    Counter,
    /// Value that can go up and down.
    Gauge,
}

/// Compose `<namespace>_<subsystem>_<name>`.
#[must_use]
pub fn build_fq_name(subsystem: &str, name: &str) -> String {
    format!("{NAMESPACE}_{subsystem}_{name}")
}

/// Build a single-sample metric family.
pub(crate) fn new_family(
    name: &str,
    help: &str,
    kind: MetricKind,
    labels: &[(String, String)],
    value: f64,
) -> proto::MetricFamily {
    let mut metric = proto::Metric::default();
    for (label_name, label_value) in labels {
        let mut pair = proto::LabelPair::default();
        pair.set_name(label_name.clone());
        pair.set_value(label_value.clone());
        metric.mut_label().push(pair);
    }
    let mut family = proto::MetricFamily::default();
    family.set_name(name.to_string());
    family.set_help(help.to_string());
    match kind {
        MetricKind::Counter => {
            let mut counter = proto::Counter::default();
            counter.set_value(value);
            metric.set_counter(counter);
            family.set_field_type(proto::MetricType::COUNTER);
        }
        MetricKind::Gauge => {
            let mut gauge = proto::Gauge::default();
            gauge.set_value(value);
            metric.set_gauge(gauge);
            family.set_field_type(proto::MetricType::GAUGE);
        }
    }
    family.mut_metric().push(metric);
    family
}

/// Merge families sharing a name and order the result by name.
fn merge_families(
    families: impl IntoIterator<Item = proto::MetricFamily>,
) -> Vec<proto::MetricFamily> {
    let mut merged: BTreeMap<String, proto::MetricFamily> = BTreeMap::new();
    for family in families {
        match merged.get_mut(family.get_name()) {
            Some(existing) => {
                for metric in family.get_metric() {
                    existing.mut_metric().push(metric.clone());
                }
            }
            None => {
                merged.insert(family.get_name().to_string(), family);
            }
        }
    }
    merged.into_values().collect()
}
