//! Table-driven collector for a single monitor entry.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use prometheus::proto;
use tracing::debug;

use super::{build_fq_name, new_family, MetricKind, MonitorCollector, ScrapeError};
use crate::pool::{LdapPool, SearchRequest};

/// Compact ISO 8601 layout used by 389-DS time attributes.
const DATE_TIME_LAYOUT: &str = "%Y%m%d%H%M%SZ";

/// How an LDAP attribute value is stored, and hence how it converts to a
/// sample value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AttrValueKind {
    /// Plain number.
    #[default]
    Numeric,
    /// Date and time in `YYYYMMDDhhmmssZ` format, exported as epoch seconds.
    Iso8601Compact,
}

/// Mapping of one monitor attribute to one metric.
#[derive(Clone, Copy, Debug)]
pub struct MonitoredAttribute {
    /// Attribute name as it appears in the directory.
    pub ldap_name: &'static str,
    /// Metric help string.
    pub help: &'static str,
    /// Exported sample type.
    pub kind: MetricKind,
    /// Stored value format.
    pub value: AttrValueKind,
}

/// Collector reading the attributes of one monitor entry.
///
/// All heavy lifting is in the attribute table; the collector itself just
/// runs one base-scope search through the pool and converts what came back.
pub struct EntryCollector {
    subsystem: String,
    pool: LdapPool,
    base_dn: String,
    attrs: Vec<(&'static str, MonitoredAttribute)>,
    labels: Vec<(String, String)>,
    acquire_timeout: Duration,
}

impl EntryCollector {
    pub fn new(
        subsystem: impl Into<String>,
        pool: LdapPool,
        base_dn: impl Into<String>,
        attrs: Vec<(&'static str, MonitoredAttribute)>,
        labels: Vec<(String, String)>,
        acquire_timeout: Duration,
    ) -> Self {
        Self {
            subsystem: subsystem.into(),
            pool,
            base_dn: base_dn.into(),
            attrs,
            labels,
            acquire_timeout,
        }
    }

    /// Convert one attribute value per its declared kind.
    fn convert(attr: &MonitoredAttribute, raw: &str) -> Option<f64> {
        match attr.value {
            AttrValueKind::Numeric => raw.parse::<f64>().ok(),
            AttrValueKind::Iso8601Compact => NaiveDateTime::parse_from_str(raw, DATE_TIME_LAYOUT)
                .ok()
                .map(|dt| dt.and_utc().timestamp() as f64),
        }
    }
}

#[async_trait]
impl MonitorCollector for EntryCollector {
    async fn collect(&self, out: &mut Vec<proto::MetricFamily>) -> Result<(), ScrapeError> {
        let attr_names = self
            .attrs
            .iter()
            .map(|(_, attr)| attr.ldap_name.to_string())
            .collect();
        let req = SearchRequest::base(self.base_dn.clone(), attr_names);

        let mut conn = self.pool.acquire_timeout(self.acquire_timeout).await?;
        let searched = conn.search(&req).await;
        conn.close();
        let entries = searched.map_err(|source| ScrapeError::Search {
            base_dn: self.base_dn.clone(),
            source,
        })?;
        let entry = entries
            .first()
            .ok_or_else(|| ScrapeError::EmptyEntry(self.base_dn.clone()))?;

        let mut failed = None;
        for (metric_name, attr) in &self.attrs {
            let Some(values) = entry.attrs.get(attr.ldap_name) else {
                debug!(attr_name = attr.ldap_name, "attribute not in LDAP response");
                continue;
            };
            let Some(raw) = values.first() else {
                debug!(attr_name = attr.ldap_name, "attribute has no values");
                continue;
            };
            if values.len() > 1 {
                debug!(
                    attr_name = attr.ldap_name,
                    "attribute has more than one value, using the first"
                );
            }
            match Self::convert(attr, raw) {
                Some(value) => out.push(new_family(
                    &build_fq_name(&self.subsystem, metric_name),
                    attr.help,
                    attr.kind,
                    &self.labels,
                    value,
                )),
                None => {
                    debug!(
                        attr_name = attr.ldap_name,
                        attr_value = %raw,
                        "error converting attribute value to a sample"
                    );
                    failed = Some(ScrapeError::Convert {
                        attr: attr.ldap_name.to_string(),
                        value: raw.clone(),
                    });
                }
            }
        }
        match failed {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
