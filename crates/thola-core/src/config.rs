use std::time::Duration;

use crate::model::{ConnectionData, HttpConnectionData, SnmpConnectionData};

/// Request deadline when neither the request nor the config sets one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Engine-wide settings. `connection` is the lowest-priority credential
/// layer, below the request and the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub connection: ConnectionData,
    pub request_timeout: Duration,
    /// Serialise requests against the same address.
    pub lock_per_ip: bool,
    pub gets_instead_of_walk: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            connection: default_connection(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            lock_per_ip: true,
            gets_instead_of_walk: false,
        }
    }
}

pub fn default_connection() -> ConnectionData {
    ConnectionData {
        snmp: SnmpConnectionData {
            communities: vec!["public".into()],
            versions: vec!["2c".into(), "1".into()],
            ports: vec![161],
            v3_data: Vec::new(),
            discover_parallel: Some(5),
            discover_timeout: Some(2),
            discover_retries: Some(0),
        },
        http: HttpConnectionData {
            http_ports: vec![80],
            https_ports: vec![443],
            username: None,
            password: None,
        },
    }
}
