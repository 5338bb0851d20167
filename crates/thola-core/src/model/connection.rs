// ── Connection data ──
//
// Credential sets as they arrive in requests, live in the config and get
// persisted in the cache. Merging is by priority: list fields are a
// deduplicated union in priority order, optional scalars take the first
// present value.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionData {
    pub snmp: SnmpConnectionData,
    pub http: HttpConnectionData,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnmpConnectionData {
    pub communities: Vec<String>,
    /// "1", "2c" or "3".
    pub versions: Vec<String>,
    pub ports: Vec<u16>,
    pub v3_data: Vec<V3ConnectionData>,
    pub discover_parallel: Option<usize>,
    /// Seconds per attempt.
    pub discover_timeout: Option<u64>,
    pub discover_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct V3ConnectionData {
    pub level: Option<String>,
    pub user: Option<String>,
    pub auth_protocol: Option<String>,
    pub auth_key: Option<String>,
    pub priv_protocol: Option<String>,
    pub priv_key: Option<String>,
    pub context_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpConnectionData {
    pub http_ports: Vec<u16>,
    pub https_ports: Vec<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
}

fn union<T: Clone + PartialEq>(high: &[T], low: &[T]) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(high.len() + low.len());
    for item in high.iter().chain(low) {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

impl ConnectionData {
    /// Merge with a lower-priority set. `self` wins.
    #[must_use]
    pub fn merge(&self, lower: &ConnectionData) -> ConnectionData {
        ConnectionData {
            snmp: self.snmp.merge(&lower.snmp),
            http: self.http.merge(&lower.http),
        }
    }
}

impl SnmpConnectionData {
    #[must_use]
    pub fn merge(&self, lower: &SnmpConnectionData) -> SnmpConnectionData {
        SnmpConnectionData {
            communities: union(&self.communities, &lower.communities),
            versions: union(&self.versions, &lower.versions),
            ports: union(&self.ports, &lower.ports),
            v3_data: union(&self.v3_data, &lower.v3_data),
            discover_parallel: self.discover_parallel.or(lower.discover_parallel),
            discover_timeout: self.discover_timeout.or(lower.discover_timeout),
            discover_retries: self.discover_retries.or(lower.discover_retries),
        }
    }

    /// Exactly one tuple to try: what a cache entry holds.
    pub fn is_single_tuple(&self) -> bool {
        self.versions.len() == 1
            && self.ports.len() == 1
            && (self.communities.len() == 1 || self.v3_data.len() == 1)
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty() || self.ports.is_empty()
    }
}

impl HttpConnectionData {
    #[must_use]
    pub fn merge(&self, lower: &HttpConnectionData) -> HttpConnectionData {
        HttpConnectionData {
            http_ports: union(&self.http_ports, &lower.http_ports),
            https_ports: union(&self.https_ports, &lower.https_ports),
            username: self.username.clone().or_else(|| lower.username.clone()),
            password: self.password.clone().or_else(|| lower.password.clone()),
        }
    }

    pub fn has_ports(&self) -> bool {
        !self.http_ports.is_empty() || !self.https_ports.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn snmp(communities: &[&str], versions: &[&str], ports: &[u16]) -> SnmpConnectionData {
        SnmpConnectionData {
            communities: communities.iter().map(|c| (*c).to_owned()).collect(),
            versions: versions.iter().map(|v| (*v).to_owned()).collect(),
            ports: ports.to_vec(),
            ..SnmpConnectionData::default()
        }
    }

    #[test]
    fn merge_keeps_priority_order_and_dedups() {
        let request = ConnectionData {
            snmp: snmp(&["private"], &["2c"], &[]),
            ..ConnectionData::default()
        };
        let cache = ConnectionData {
            snmp: SnmpConnectionData {
                discover_timeout: Some(5),
                ..snmp(&["public"], &["1"], &[161])
            },
            ..ConnectionData::default()
        };
        let config = ConnectionData {
            snmp: SnmpConnectionData {
                discover_timeout: Some(2),
                discover_parallel: Some(8),
                ..snmp(&["public", "private"], &["2c", "1"], &[161, 1161])
            },
            http: HttpConnectionData {
                https_ports: vec![443],
                http_ports: vec![80],
                ..HttpConnectionData::default()
            },
        };

        let merged = request.merge(&cache).merge(&config);
        assert_eq!(merged.snmp.communities, ["private", "public"]);
        assert_eq!(merged.snmp.versions, ["2c", "1"]);
        assert_eq!(merged.snmp.ports, [161, 1161]);
        assert_eq!(merged.snmp.discover_timeout, Some(5));
        assert_eq!(merged.snmp.discover_parallel, Some(8));
        assert_eq!(merged.http.https_ports, [443]);
    }

    #[test]
    fn merge_is_idempotent() {
        let a = ConnectionData {
            snmp: snmp(&["a", "b"], &["2c"], &[161]),
            http: HttpConnectionData {
                username: Some("admin".into()),
                ..HttpConnectionData::default()
            },
        };
        let b = ConnectionData {
            snmp: SnmpConnectionData {
                discover_retries: Some(1),
                ..snmp(&["b", "c"], &["1", "2c"], &[1161])
            },
            http: HttpConnectionData {
                http_ports: vec![80],
                username: Some("other".into()),
                ..HttpConnectionData::default()
            },
        };
        let once = a.merge(&b);
        assert_eq!(a.merge(&once), once);
    }

    #[test]
    fn serialises_camel_case() {
        let data = ConnectionData {
            snmp: SnmpConnectionData {
                discover_parallel: Some(3),
                ..snmp(&["public"], &["2c"], &[161])
            },
            ..ConnectionData::default()
        };
        let json = serde_json::to_value(&data).unwrap_or_default();
        assert_eq!(json["snmp"]["discoverParallel"], 3);
        assert_eq!(json["http"]["httpPorts"], serde_json::json!([]));
        assert!(data.snmp.is_single_tuple());
    }
}
