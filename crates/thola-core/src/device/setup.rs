// ── Session setup ──
//
// Turns merged connection data into live sessions. SNMP: the cached
// winning tuple is tried on its own first, then the full probe. HTTP is
// set up concurrently. The request succeeds if any transport is usable.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thola_transport::http::{HttpClient, HttpCredentials, TransportConfig};
use thola_transport::snmp::{
    AuthProtocol, PrivProtocol, ProbeCandidates, ProbeOutcome, ProbeSettings, SecurityLevel,
    SessionOptions, SnmpConnector, SnmpTarget, SnmpVersion, V3Credentials, probe,
};
use thola_transport::snmp::udp::UdpConnector;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::DeviceContext;
use crate::error::CoreError;
use crate::model::{ConnectionData, HttpConnectionData, SnmpConnectionData, V3ConnectionData};

/// Transport factories shared by all requests.
#[derive(Clone)]
pub struct Transports {
    pub snmp: Arc<dyn SnmpConnector>,
    pub http: TransportConfig,
}

impl Default for Transports {
    /// UDP SNMP sessions and the default HTTP client settings.
    fn default() -> Self {
        Self {
            snmp: Arc::new(UdpConnector),
            http: TransportConfig::default(),
        }
    }
}

/// Live sessions plus the credentials that actually worked.
pub struct Established {
    pub context: DeviceContext,
    pub ideal: ConnectionData,
}

pub async fn establish(
    address: IpAddr,
    merged: &ConnectionData,
    cached: Option<&ConnectionData>,
    transports: &Transports,
    cancel: CancellationToken,
) -> Result<Established, CoreError> {
    let snmp_wanted = !merged.snmp.is_empty()
        && (!merged.snmp.communities.is_empty() || !merged.snmp.v3_data.is_empty());
    let http_wanted = merged.http.has_ports();
    if !snmp_wanted && !http_wanted {
        return Err(CoreError::validation(
            "connection",
            "neither SNMP nor HTTP credentials to try",
        ));
    }

    let snmp = async {
        if snmp_wanted {
            Some(connect_snmp(address, merged, cached, transports, &cancel).await)
        } else {
            None
        }
    };
    let http = async {
        if http_wanted {
            Some(connect_http(address, &merged.http, &transports.http, &cancel).await)
        } else {
            None
        }
    };
    let (snmp, http) = tokio::join!(snmp, http);

    if cancel.is_cancelled() {
        return Err(CoreError::Cancelled);
    }

    let mut ideal = ConnectionData::default();
    let mut failures = Vec::new();

    let snmp = match snmp {
        Some(Ok(outcome)) => {
            ideal.snmp = ideal_snmp(outcome.client.target(), &merged.snmp);
            Some(outcome)
        }
        Some(Err(e)) => {
            failures.push(format!("failed to create snmp connection: {e}"));
            None
        }
        None => None,
    };
    let http = match http {
        Some(Ok(client)) => {
            ideal.http = ideal_http(&client, &merged.http);
            Some(client)
        }
        Some(Err(e)) => {
            failures.push(format!("failed to create http connection: {e}"));
            None
        }
        None => None,
    };

    if snmp.is_none() && http.is_none() {
        return Err(CoreError::Network(failures.join("; ")));
    }
    for failure in &failures {
        debug!(ip = %address, "{failure}");
    }

    let (client, probe_answer) = match snmp {
        Some(ProbeOutcome { client, probe }) => (Some(client), Some(probe)),
        None => (None, None),
    };
    let context = DeviceContext::new(address, client, http, cancel);
    if let Some(vb) = &probe_answer {
        context.seed(vb);
    }
    Ok(Established { context, ideal })
}

async fn connect_snmp(
    address: IpAddr,
    merged: &ConnectionData,
    cached: Option<&ConnectionData>,
    transports: &Transports,
    cancel: &CancellationToken,
) -> Result<ProbeOutcome, CoreError> {
    let settings = probe_settings(&merged.snmp);

    if let Some(cached) = cached.filter(|c| c.snmp.is_single_tuple()) {
        let candidates = candidates(&cached.snmp)?;
        let single = ProbeSettings {
            parallel: 1,
            ..settings.clone()
        };
        match probe(Arc::clone(&transports.snmp), address, &candidates, &single, cancel).await {
            Ok(outcome) => return Ok(outcome),
            Err(thola_transport::Error::Cancelled) => return Err(CoreError::Cancelled),
            Err(e) => warn!(ip = %address, error = %e, "cached snmp credentials failed, probing"),
        }
    }

    let candidates = candidates(&merged.snmp)?;
    probe(Arc::clone(&transports.snmp), address, &candidates, &settings, cancel)
        .await
        .map_err(CoreError::from)
}

async fn connect_http(
    address: IpAddr,
    data: &HttpConnectionData,
    config: &TransportConfig,
    cancel: &CancellationToken,
) -> Result<HttpClient, CoreError> {
    let credentials = HttpCredentials {
        https_ports: data.https_ports.clone(),
        http_ports: data.http_ports.clone(),
        username: data.username.clone(),
        password: data.password.clone().map(SecretString::from),
    };
    tokio::select! {
        () = cancel.cancelled() => Err(CoreError::Cancelled),
        client = HttpClient::connect(address, &credentials, config) => client.map_err(CoreError::from),
    }
}

pub(crate) fn probe_settings(data: &SnmpConnectionData) -> ProbeSettings {
    let defaults = ProbeSettings::default();
    ProbeSettings {
        parallel: data.discover_parallel.unwrap_or(defaults.parallel),
        options: SessionOptions {
            timeout: data
                .discover_timeout
                .map_or(defaults.options.timeout, Duration::from_secs),
            retries: data.discover_retries.unwrap_or(defaults.options.retries),
        },
        probe_oid: defaults.probe_oid,
    }
}

// ── Credential conversion ───────────────────────────────────────────

pub(crate) fn candidates(data: &SnmpConnectionData) -> Result<ProbeCandidates, CoreError> {
    let versions = data
        .versions
        .iter()
        .map(|v| {
            v.parse::<SnmpVersion>()
                .map_err(|_| CoreError::validation("snmp version", format!("unknown version '{v}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let v3 = data
        .v3_data
        .iter()
        .map(v3_credentials)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ProbeCandidates {
        versions,
        communities: data.communities.clone(),
        ports: data.ports.clone(),
        v3,
    })
}

pub(crate) fn v3_credentials(data: &V3ConnectionData) -> Result<V3Credentials, CoreError> {
    let invalid = |reason: String| CoreError::validation("snmp v3 data", reason);

    let user = data
        .user
        .clone()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| invalid("user is required".into()))?;
    let level = match data.level.as_deref() {
        Some(level) => level
            .parse::<SecurityLevel>()
            .map_err(|_| invalid(format!("unknown security level '{level}'")))?,
        None => SecurityLevel::NoAuthNoPriv,
    };

    let auth = if level == SecurityLevel::NoAuthNoPriv {
        None
    } else {
        let proto = data
            .auth_protocol
            .as_deref()
            .ok_or_else(|| invalid(format!("{level} requires an auth protocol")))?;
        let proto = proto
            .parse::<AuthProtocol>()
            .map_err(|_| invalid(format!("unknown auth protocol '{proto}'")))?;
        let key = data
            .auth_key
            .clone()
            .ok_or_else(|| invalid(format!("{level} requires an auth key")))?;
        Some((proto, SecretString::from(key)))
    };

    let privacy = if level == SecurityLevel::AuthPriv {
        let proto = data
            .priv_protocol
            .as_deref()
            .ok_or_else(|| invalid("authPriv requires a privacy protocol".into()))?;
        let proto = proto
            .parse::<PrivProtocol>()
            .map_err(|_| invalid(format!("unknown privacy protocol '{proto}'")))?;
        let key = data
            .priv_key
            .clone()
            .ok_or_else(|| invalid("authPriv requires a privacy key".into()))?;
        Some((proto, SecretString::from(key)))
    } else {
        None
    };

    Ok(V3Credentials {
        level,
        user,
        auth,
        privacy,
        context_name: data.context_name.clone(),
    })
}

fn ideal_snmp(target: &SnmpTarget, merged: &SnmpConnectionData) -> SnmpConnectionData {
    let (communities, v3_data) = match &target.v3 {
        Some(v3) => (
            Vec::new(),
            vec![V3ConnectionData {
                level: Some(v3.level.to_string()),
                user: Some(v3.user.clone()),
                auth_protocol: v3.auth.as_ref().map(|(p, _)| p.to_string()),
                auth_key: v3.auth.as_ref().map(|(_, k)| k.expose_secret().to_owned()),
                priv_protocol: v3.privacy.as_ref().map(|(p, _)| p.to_string()),
                priv_key: v3.privacy.as_ref().map(|(_, k)| k.expose_secret().to_owned()),
                context_name: v3.context_name.clone(),
            }],
        ),
        None => (vec![target.community.clone()], Vec::new()),
    };
    SnmpConnectionData {
        communities,
        versions: vec![target.version.to_string()],
        ports: vec![target.address.port()],
        v3_data,
        discover_parallel: None,
        discover_timeout: merged.discover_timeout,
        discover_retries: merged.discover_retries,
    }
}

fn ideal_http(client: &HttpClient, merged: &HttpConnectionData) -> HttpConnectionData {
    let endpoint = client.endpoint();
    let (https_ports, http_ports) = if endpoint.https {
        (vec![endpoint.port], Vec::new())
    } else {
        (Vec::new(), vec![endpoint.port])
    };
    HttpConnectionData {
        http_ports,
        https_ports,
        username: merged.username.clone(),
        password: merged.password.clone(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use thola_transport::snmp::SnmpValue;
    use thola_transport::snmp::testing::MockAgent;

    use super::*;

    fn transports(agent: &Arc<MockAgent>) -> Transports {
        Transports {
            snmp: agent.connector(),
            http: TransportConfig::default(),
        }
    }

    fn data(communities: &[&str], versions: &[&str], ports: &[u16]) -> ConnectionData {
        ConnectionData {
            snmp: SnmpConnectionData {
                communities: communities.iter().map(|s| (*s).to_owned()).collect(),
                versions: versions.iter().map(|s| (*s).to_owned()).collect(),
                ports: ports.to_vec(),
                discover_timeout: Some(1),
                ..SnmpConnectionData::default()
            },
            ..ConnectionData::default()
        }
    }

    fn agent() -> Arc<MockAgent> {
        MockAgent::builder()
            .accept(SnmpVersion::V2c, "private", 161)
            .value(
                "1.3.6.1.2.1.1.2.0",
                SnmpValue::ObjectId("1.3.6.1.4.1.9.1.1208".parse().unwrap()),
            )
            .build()
    }

    #[tokio::test(start_paused = true)]
    async fn probe_answer_seeds_the_context() {
        let agent = agent();
        let merged = data(&["public", "private"], &["2c"], &[161]);
        let established = establish(
            MockAgent::address(),
            &merged,
            None,
            &transports(&agent),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(established.ideal.snmp.communities, ["private"]);
        assert_eq!(established.ideal.snmp.versions, ["2c"]);
        assert_eq!(established.ideal.snmp.ports, [161]);

        agent.reset_counters();
        let sys_object_id: thola_transport::Oid = "1.3.6.1.2.1.1.2.0".parse().unwrap();
        established.context.snmp_get(&sys_object_id).await.unwrap();
        assert_eq!(agent.queries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cached_tuple_is_tried_alone_first() {
        let agent = agent();
        let merged = data(&["public", "private"], &["1", "2c"], &[161]);
        let cached = data(&["private"], &["2c"], &[161]);
        establish(
            MockAgent::address(),
            &merged,
            Some(&cached),
            &transports(&agent),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(agent.sessions_opened(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_names_the_transport() {
        let agent = agent();
        let merged = data(&["nope"], &["2c"], &[161]);
        let err = establish(
            MockAgent::address(),
            &merged,
            None,
            &transports(&agent),
            CancellationToken::new(),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, CoreError::Network(_)));
        assert!(err.to_string().contains("failed to create snmp connection"));
        assert_eq!(agent.open_sessions(), 0);
    }

    #[test]
    fn v3_conversion_checks_levels() {
        let ok = V3ConnectionData {
            level: Some("authPriv".into()),
            user: Some("monitor".into()),
            auth_protocol: Some("sha".into()),
            auth_key: Some("authsecret".into()),
            priv_protocol: Some("aes".into()),
            priv_key: Some("privsecret".into()),
            context_name: None,
        };
        let creds = v3_credentials(&ok).unwrap();
        assert_eq!(creds.level, SecurityLevel::AuthPriv);
        assert!(creds.privacy.is_some());

        let missing_priv = V3ConnectionData {
            priv_key: None,
            ..ok
        };
        assert!(matches!(
            v3_credentials(&missing_priv),
            Err(CoreError::Validation { .. })
        ));
    }
}
