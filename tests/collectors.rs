//! Collector conversion and scrape fan-out tests against fake-backed pools.

mod common;

use std::{collections::HashMap, time::Duration};

use ldap3::SearchEntry;
use prometheus::{proto, Encoder, TextEncoder};

use common::{make_pool, Harness};
use ds389_exporter::{
    collectors::{CollectorSet, EntryCollector, MonitorCollector, PoolCollector, ScrapeError},
    monitor,
};

const TIMEOUT: Duration = Duration::from_secs(1);

fn monitor_entry(attrs: &[(&str, &str)]) -> SearchEntry {
    SearchEntry {
        dn: "cn=monitor".into(),
        attrs: attrs
            .iter()
            .map(|(name, value)| (name.to_string(), vec![value.to_string()]))
            .collect(),
        bin_attrs: HashMap::new(),
    }
}

fn find<'a>(families: &'a [proto::MetricFamily], name: &str) -> &'a proto::MetricFamily {
    families
        .iter()
        .find(|family| family.get_name() == name)
        .unwrap_or_else(|| panic!("missing metric family '{name}'"))
}

#[tokio::test]
async fn numeric_and_timestamp_attributes_convert() {
    let harness = Harness::new();
    harness.set_entries(vec![monitor_entry(&[
        ("threads", "5"),
        ("currentconnections", "17"),
        ("currenttime", "20240102030405Z"),
    ])]);
    let pool = make_pool(&harness, 1);
    let collector = EntryCollector::new(
        "server",
        pool,
        "cn=monitor",
        monitor::server_attrs(),
        Vec::new(),
        TIMEOUT,
    );

    let mut families = Vec::new();
    collector.collect(&mut families).await.expect("collect");

    let threads = find(&families, "ds_server_threads");
    assert_eq!(threads.get_field_type(), proto::MetricType::COUNTER);
    assert_eq!(threads.get_metric()[0].get_counter().get_value(), 5.0);

    let conns = find(&families, "ds_server_currentconnections");
    assert_eq!(conns.get_field_type(), proto::MetricType::GAUGE);
    assert_eq!(conns.get_metric()[0].get_gauge().get_value(), 17.0);

    // 2024-01-02T03:04:05Z as epoch seconds.
    let time = find(&families, "ds_server_currenttime");
    assert_eq!(time.get_metric()[0].get_gauge().get_value(), 1_704_164_645.0);

    // Attributes absent from the entry are skipped without error.
    assert!(families
        .iter()
        .all(|family| family.get_name() != "ds_server_starttime"));
}

#[tokio::test]
async fn conversion_failure_keeps_good_samples_and_reports() {
    let harness = Harness::new();
    harness.set_entries(vec![monitor_entry(&[
        ("threads", "not-a-number"),
        ("currentconnections", "3"),
    ])]);
    let pool = make_pool(&harness, 1);
    let collector = EntryCollector::new(
        "server",
        pool,
        "cn=monitor",
        monitor::server_attrs(),
        Vec::new(),
        TIMEOUT,
    );

    let mut families = Vec::new();
    let err = collector
        .collect(&mut families)
        .await
        .expect_err("bad value must fail the scrape");
    assert!(matches!(err, ScrapeError::Convert { .. }), "got {err:?}");

    let conns = find(&families, "ds_server_currentconnections");
    assert_eq!(conns.get_metric()[0].get_gauge().get_value(), 3.0);
}

#[tokio::test]
async fn static_labels_are_attached() {
    let harness = Harness::new();
    harness.set_entries(vec![monitor_entry(&[("numsubordinates", "42")])]);
    let pool = make_pool(&harness, 1);
    let collector = EntryCollector::new(
        "entry",
        pool,
        "ou=people,dc=example,dc=org",
        monitor::entry_count_attrs(),
        vec![("entry".into(), "ou=people,dc=example,dc=org".into())],
        TIMEOUT,
    );

    let mut families = Vec::new();
    collector.collect(&mut families).await.expect("collect");

    let family = find(&families, "ds_entry_numsubordinates");
    let metric = &family.get_metric()[0];
    assert_eq!(metric.get_gauge().get_value(), 42.0);
    let label = &metric.get_label()[0];
    assert_eq!(label.get_name(), "entry");
    assert_eq!(label.get_value(), "ou=people,dc=example,dc=org");
}

#[tokio::test]
async fn gather_reports_success_per_collector_and_merges_families() {
    let healthy = Harness::new();
    healthy.set_entries(vec![monitor_entry(&[("threads", "2")])]);
    let broken = Harness::new();
    // An empty result set fails the scrape of this collector only.
    broken.set_entries(Vec::new());

    let mut set = CollectorSet::new();
    set.register(
        "server",
        Box::new(EntryCollector::new(
            "server",
            make_pool(&healthy, 1),
            "cn=monitor",
            monitor::server_attrs(),
            Vec::new(),
            TIMEOUT,
        )),
    );
    set.register(
        "snmp",
        Box::new(EntryCollector::new(
            "snmp",
            make_pool(&broken, 1),
            "cn=snmp,cn=monitor",
            monitor::snmp_attrs(),
            Vec::new(),
            TIMEOUT,
        )),
    );

    let families = set.gather().await;

    let success = find(&families, "ds_exporter_scrape_success");
    assert_eq!(success.get_metric().len(), 2, "one sample per collector");
    let by_collector: HashMap<&str, f64> = success
        .get_metric()
        .iter()
        .map(|metric| {
            (
                metric.get_label()[0].get_value(),
                metric.get_gauge().get_value(),
            )
        })
        .collect();
    assert_eq!(by_collector["server"], 1.0);
    assert_eq!(by_collector["snmp"], 0.0);

    let duration = find(&families, "ds_exporter_scrape_duration_seconds");
    assert_eq!(duration.get_metric().len(), 2);

    // Families come out sorted and encodable.
    let names: Vec<_> = families.iter().map(proto::MetricFamily::get_name).collect();
    let mut sorted = names.clone();
    sorted.sort_unstable();
    assert_eq!(names, sorted);

    let mut buf = Vec::new();
    TextEncoder::new()
        .encode(&families, &mut buf)
        .expect("exposition must encode");
    assert!(!buf.is_empty());
}

#[tokio::test]
async fn pool_collector_exports_counters() {
    let harness = Harness::new();
    let pool = make_pool(&harness, 1);
    let conn = pool.acquire().await.expect("acquire");
    conn.close();

    let collector = PoolCollector::new(pool);
    let mut families = Vec::new();
    collector.collect(&mut families).await.expect("collect");

    assert_eq!(
        find(&families, "ds_pool_open").get_metric()[0]
            .get_gauge()
            .get_value(),
        1.0
    );
    for name in [
        "ds_pool_closed_idletime",
        "ds_pool_closed_lifetime",
        "ds_pool_wait_count",
        "ds_pool_wait_duration_seconds",
    ] {
        assert_eq!(
            find(&families, name).get_field_type(),
            proto::MetricType::COUNTER
        );
    }
}
