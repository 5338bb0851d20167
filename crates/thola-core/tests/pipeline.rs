#![allow(clippy::unwrap_used)]

// End-to-end requests through the engine against an in-process SNMP agent.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use thola_core::check::Thresholds;
use thola_core::config::default_connection;
use thola_core::device::Transports;
use thola_core::model::{ConnectionData, HttpConnectionData, SnmpConnectionData};
use thola_core::request::types::{InterfaceOptions, MemoryCheck};
use thola_core::store::{CacheStore, DEFAULT_TTL, SqlBackend};
use thola_core::{CoreError, Engine, EngineConfig, Request, RequestKind, Response};
use thola_transport::http::TransportConfig;
use thola_transport::snmp::testing::{MockAgent, MockAgentBuilder};
use thola_transport::snmp::{SnmpValue, SnmpVersion};

const SYS_DESCR: &str = "1.3.6.1.2.1.1.1.0";
const SYS_OBJECT_ID: &str = "1.3.6.1.2.1.1.2.0";

const IOS_DESCR: &str = "Cisco IOS Software, C2960 Software (C2960-LANBASEK9-M), Version 15.0(2)SE4, RELEASE SOFTWARE (fc1)";

fn text(s: &str) -> SnmpValue {
    SnmpValue::OctetString(s.as_bytes().to_vec())
}

fn oid(s: &str) -> SnmpValue {
    SnmpValue::ObjectId(s.parse().unwrap())
}

fn agent(object_id: &str, descr: &str) -> MockAgentBuilder {
    MockAgent::builder()
        .accept(SnmpVersion::V2c, "public", 161)
        .value(SYS_DESCR, text(descr))
        .value(SYS_OBJECT_ID, oid(object_id))
}

/// SNMP only, so no test ever probes local HTTP ports.
fn config() -> EngineConfig {
    EngineConfig {
        connection: ConnectionData {
            snmp: SnmpConnectionData {
                versions: vec!["2c".into()],
                discover_timeout: Some(1),
                ..default_connection().snmp
            },
            http: HttpConnectionData::default(),
        },
        ..EngineConfig::default()
    }
}

fn engine(agent: &Arc<MockAgent>, cache: CacheStore) -> Engine {
    Engine::builder(config())
        .cache(cache)
        .transports(Transports {
            snmp: agent.connector(),
            http: TransportConfig::default(),
        })
        .build()
        .unwrap()
}

fn sql_cache() -> CacheStore {
    CacheStore::new(Arc::new(SqlBackend::in_memory().unwrap()), DEFAULT_TTL)
}

fn ip() -> String {
    MockAgent::address().to_string()
}

fn identify(response: Response) -> thola_core::model::IdentifyResponse {
    match response {
        Response::Identify(identified) => identified,
        other => panic!("not an identify response: {other:?}"),
    }
}

#[tokio::test]
async fn identifies_a_catalyst_switch() {
    let agent = agent("1.3.6.1.4.1.9.1.716", IOS_DESCR).build();
    let engine = engine(&agent, CacheStore::disabled());

    let identified = identify(
        engine
            .process(Request::new(ip(), RequestKind::Identify))
            .await
            .unwrap(),
    );

    assert_eq!(identified.class, "cisco/ios");
    assert_eq!(identified.properties.vendor.as_deref(), Some("Cisco"));
    assert_eq!(identified.properties.model.as_deref(), Some("Catalyst 2960"));
    assert_eq!(identified.properties.model_series.as_deref(), Some("C2960"));
    assert_eq!(identified.properties.os_version.as_deref(), Some("15.0(2)SE4"));
    assert_eq!(agent.open_sessions(), 0);
}

#[tokio::test]
async fn identify_is_deterministic() {
    let agent = agent("1.3.6.1.4.1.9.1.716", IOS_DESCR).build();
    let engine = engine(&agent, CacheStore::disabled());

    let mut classes = Vec::new();
    for _ in 0..5 {
        let response = engine
            .process(Request::new(ip(), RequestKind::Identify))
            .await
            .unwrap();
        classes.push(identify(response).class);
    }
    assert!(classes.iter().all(|c| c == "cisco/ios"), "{classes:?}");
}

#[tokio::test]
async fn cached_identify_only_reverifies_the_class() {
    let agent = agent("1.3.6.1.4.1.9.1.716", IOS_DESCR).build();
    let engine = engine(&agent, sql_cache());

    let first = identify(
        engine
            .process(Request::new(ip(), RequestKind::Identify))
            .await
            .unwrap(),
    );
    let cold = agent.queries();
    agent.reset_counters();

    let second = identify(
        engine
            .process(Request::new(ip(), RequestKind::Identify))
            .await
            .unwrap(),
    );

    assert_eq!(first, second);
    // The cached credential tuple answers the probe (sysObjectID); the
    // cached class then re-checks its own condition (sysDescr).
    assert!(agent.queries() <= 2, "{} queries", agent.queries());
    assert!(agent.queries() < cold);
    assert_eq!(agent.sessions_opened(), 1);
}

#[tokio::test]
async fn stale_cached_class_falls_back_to_identify() {
    let agent = agent("1.3.6.1.4.1.9.1.716", IOS_DESCR).build();
    let cache = sql_cache();
    let engine = engine(&agent, cache.clone());
    let address: IpAddr = ip().parse().unwrap();

    engine
        .process(Request::new(ip(), RequestKind::Identify))
        .await
        .unwrap();
    assert_eq!(cache.get_identify(address).await.unwrap().class, "cisco/ios");

    agent.set_value(
        SYS_DESCR,
        text("Cisco IOS Software [Amsterdam], IOS-XE Software, Version 17.3.4a"),
    );
    let identified = identify(
        engine
            .process(Request::new(ip(), RequestKind::Identify))
            .await
            .unwrap(),
    );

    assert_eq!(identified.class, "cisco");
    assert_eq!(cache.get_identify(address).await.unwrap().class, "cisco");
}

#[tokio::test]
async fn ignore_cache_still_writes() {
    let agent = agent("1.3.6.1.4.1.9.1.716", IOS_DESCR).build();
    let cache = sql_cache();
    let engine = engine(&agent, cache.clone());

    engine
        .process(Request::new(ip(), RequestKind::Identify).ignoring_cache())
        .await
        .unwrap();

    let address: IpAddr = ip().parse().unwrap();
    let connection = cache.get_connection(address).await.unwrap();
    assert_eq!(connection.snmp.communities, ["public"]);
    assert_eq!(connection.snmp.versions, ["2c"]);
}

fn interface_row(builder: MockAgentBuilder, index: u32, descr: &str, if_type: i64) -> MockAgentBuilder {
    let cell = |column: u32| format!("1.3.6.1.2.1.2.2.1.{column}.{index}");
    builder
        .value(&cell(1), SnmpValue::Integer(index.into()))
        .value(&cell(2), text(descr))
        .value(&cell(3), SnmpValue::Integer(if_type))
}

#[tokio::test]
async fn interface_type_filter_drops_matching_rows() {
    let mut builder = agent("1.3.6.1.4.1.99999.1", "lab switch");
    for (index, descr, if_type) in [
        (1, "eth0", 6),
        (2, "lo", 24),
        (3, "eth1", 6),
        (4, "tun0", 131),
    ] {
        builder = interface_row(builder, index, descr, if_type);
    }
    let agent = builder.build();
    let engine = engine(&agent, CacheStore::disabled());

    let request = Request::new(
        ip(),
        RequestKind::ReadInterfaces(InterfaceOptions {
            if_type_filter: vec!["ethernetCsmacd".into()],
            ..InterfaceOptions::default()
        }),
    );
    let Response::Interfaces(response) = engine.process(request).await.unwrap() else {
        panic!("not an interfaces response");
    };

    let kept: Vec<(Option<u64>, Option<&str>)> = response
        .interfaces
        .iter()
        .map(|i| (i.if_index, i.if_descr.as_deref()))
        .collect();
    assert_eq!(kept, [(Some(2), Some("lo")), (Some(4), Some("tun0"))]);
    assert_eq!(response.interfaces[1].if_type.as_deref(), Some("tunnel"));
}

#[tokio::test]
async fn counts_interfaces() {
    let mut builder = agent("1.3.6.1.4.1.99999.1", "lab switch");
    for index in 1..=3 {
        builder = interface_row(builder, index, "port", 6);
    }
    let engine = engine(&builder.build(), CacheStore::disabled());

    let response = engine
        .process(Request::new(ip(), RequestKind::ReadCountInterfaces))
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        serde_json::json!({ "interfaces": 3 })
    );
}

fn storage(builder: MockAgentBuilder, index: u32, kind: u32, size: i64, used: i64) -> MockAgentBuilder {
    let cell = |column: u32| format!("1.3.6.1.2.1.25.2.3.1.{column}.{index}");
    builder
        .value(&cell(2), oid(&format!("1.3.6.1.2.1.25.2.1.{kind}")))
        .value(&cell(3), text(if kind == 2 { "Physical memory" } else { "/" }))
        .value(&cell(4), SnmpValue::Integer(1024))
        .value(&cell(5), SnmpValue::Integer(size))
        .value(&cell(6), SnmpValue::Integer(used))
}

#[tokio::test]
async fn memory_check_reports_the_warning() {
    let builder = agent("1.3.6.1.4.1.8072.3.2.10", "Linux db01 5.15.0-91-generic");
    let builder = storage(builder, 1, 2, 1000, 850);
    let builder = storage(builder, 31, 4, 5000, 1000);
    let engine = engine(&builder.build(), CacheStore::disabled());

    let request = Request::new(
        ip(),
        RequestKind::CheckMemory(MemoryCheck {
            usage: Thresholds {
                warn_max: Some(80.0),
                crit_max: Some(90.0),
                ..Thresholds::default()
            },
        }),
    );
    let response = engine.process(request).await.unwrap();
    let check = response.as_check().unwrap();

    assert_eq!(check.exit_code, 1);
    assert!(check.raw_output.contains("85"), "{}", check.raw_output);
    assert_eq!(check.perf_data.len(), 1);
    assert_eq!(engine.statistics().failed, 1);
}

#[tokio::test]
async fn disabled_component_is_unknown() {
    let agent = agent("1.3.6.1.4.1.99999.1", "lab switch").build();
    let engine = engine(&agent, CacheStore::disabled());

    let response = engine
        .process(Request::new(ip(), RequestKind::CheckUps(Default::default())))
        .await
        .unwrap();
    let check = response.as_check().unwrap();
    assert_eq!(check.exit_code, 3);
    assert!(check.raw_output.contains("'ups' is not available"), "{}", check.raw_output);

    let read = engine
        .process(Request::new(ip(), RequestKind::ReadUps))
        .await
        .unwrap_err();
    assert!(read.is_component_not_found());
}

#[tokio::test(start_paused = true)]
async fn unanswered_probe_is_an_unknown_check() {
    let agent = MockAgent::builder()
        .accept(SnmpVersion::V2c, "secret", 161)
        .value(SYS_OBJECT_ID, oid("1.3.6.1.4.1.9.1.716"))
        .build();
    let engine = engine(&agent, CacheStore::disabled());

    let response = engine
        .process(Request::new(ip(), RequestKind::CheckMemory(MemoryCheck::default())))
        .await
        .unwrap();
    let check = response.as_check().unwrap();

    assert_eq!(check.exit_code, 3);
    assert!(
        check.raw_output.contains("failed to create snmp connection"),
        "{}",
        check.raw_output
    );
    assert_eq!(agent.open_sessions(), 0);

    let read = engine
        .process(Request::new(ip(), RequestKind::Identify))
        .await
        .unwrap_err();
    assert!(matches!(read, CoreError::Network(_)));
}

#[tokio::test(start_paused = true)]
async fn deadline_cancels_a_hanging_request() {
    let agent = agent("1.3.6.1.4.1.9.1.716", IOS_DESCR).hang().build();
    let engine = engine(&agent, CacheStore::disabled());

    let started = tokio::time::Instant::now();
    let err = engine
        .process(Request::new(ip(), RequestKind::Identify).with_timeout(3))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::TimedOut { timeout_secs: 3 }));
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(agent.open_sessions(), 0);
}

#[tokio::test]
async fn validation_happens_before_any_io() {
    let agent = agent("1.3.6.1.4.1.9.1.716", IOS_DESCR).build();
    let engine = engine(&agent, CacheStore::disabled());

    let err = engine
        .process(Request::new("not-an-ip", RequestKind::Identify))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
    assert_eq!(agent.sessions_opened(), 0);
}

#[tokio::test]
async fn server_check_reports_statistics() {
    let agent = agent("1.3.6.1.4.1.9.1.716", IOS_DESCR).build();
    let engine = engine(&agent, CacheStore::disabled());
    engine
        .process(Request::new(ip(), RequestKind::Identify))
        .await
        .unwrap();

    let response = engine
        .process(Request::new("", RequestKind::CheckTholaServer))
        .await
        .unwrap();
    let check = response.as_check().unwrap();
    assert_eq!(check.exit_code, 0);
    assert!(check.raw_output.contains("'successful_requests'=1c"), "{}", check.raw_output);
}

#[tokio::test]
async fn snmp_check_returns_the_working_credentials() {
    let agent = agent("1.3.6.1.4.1.9.1.716", IOS_DESCR).build();
    let engine = engine(&agent, CacheStore::disabled());

    let response = engine
        .process(Request::new(ip(), RequestKind::CheckSnmp))
        .await
        .unwrap();
    let check = response.as_check().unwrap();
    assert_eq!(check.exit_code, 0);
    let credentials = check.successful_snmp_credentials.as_ref().unwrap();
    assert_eq!(credentials.communities, ["public"]);
    assert_eq!(credentials.ports, [161]);
}
