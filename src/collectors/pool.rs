//! Collector for the connection pool's own statistics.

use async_trait::async_trait;
use prometheus::proto;

use super::{build_fq_name, new_family, MetricKind, MonitorCollector, ScrapeError};
use crate::pool::LdapPool;

/// Subsystem of the pool metrics.
const POOL_SUBSYSTEM: &str = "pool";

/// Exports the pool counters described in [`crate::pool::PoolStat`].
pub struct PoolCollector {
    pool: LdapPool,
}

impl PoolCollector {
    pub fn new(pool: LdapPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MonitorCollector for PoolCollector {
    async fn collect(&self, out: &mut Vec<proto::MetricFamily>) -> Result<(), ScrapeError> {
        let stat = self.pool.stat();
        let no_labels: [(String, String); 0] = [];
        out.push(new_family(
            &build_fq_name(POOL_SUBSYSTEM, "open"),
            "Number of open connections in the pool",
            MetricKind::Gauge,
            &no_labels,
            stat.open as f64,
        ));
        out.push(new_family(
            &build_fq_name(POOL_SUBSYSTEM, "closed_idletime"),
            "Number of connections closed after idle timeout",
            MetricKind::Counter,
            &no_labels,
            stat.closed_idle_time as f64,
        ));
        out.push(new_family(
            &build_fq_name(POOL_SUBSYSTEM, "closed_lifetime"),
            "Number of connections closed after lifetime expired or marked bad",
            MetricKind::Counter,
            &no_labels,
            stat.closed_life_time as f64,
        ));
        out.push(new_family(
            &build_fq_name(POOL_SUBSYSTEM, "wait_count"),
            "Number of times clients waited for a connection to appear in the pool",
            MetricKind::Counter,
            &no_labels,
            stat.wait_count as f64,
        ));
        out.push(new_family(
            &build_fq_name(POOL_SUBSYSTEM, "wait_duration_seconds"),
            "Total time spent waiting for a connection",
            MetricKind::Counter,
            &no_labels,
            stat.wait_duration.as_secs_f64(),
        ));
        Ok(())
    }
}
