// ── SNMP transport ──
//
// Session abstraction over the wire client, the per-request `SnmpClient`
// wrapper (chunked gets, walks, v1 bulk downgrade) and the parallel
// credential prober.

pub mod client;
pub mod prober;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod udp;
pub mod value;

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::Error;
use crate::oid::Oid;

pub use client::SnmpClient;
pub use prober::{ProbeCandidates, ProbeOutcome, ProbeSettings, probe};
pub use value::{SnmpValue, VarBind};

// ── Credentials ─────────────────────────────────────────────────────

/// SNMP protocol version. Ordering is the probe preference order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, Serialize,
    Deserialize,
)]
pub enum SnmpVersion {
    #[strum(serialize = "1")]
    #[serde(rename = "1")]
    V1,
    #[strum(serialize = "2c")]
    #[serde(rename = "2c")]
    V2c,
    #[strum(serialize = "3")]
    #[serde(rename = "3")]
    V3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum SecurityLevel {
    #[strum(serialize = "noAuthNoPriv")]
    #[serde(rename = "noAuthNoPriv")]
    NoAuthNoPriv,
    #[strum(serialize = "authNoPriv")]
    #[serde(rename = "authNoPriv")]
    AuthNoPriv,
    #[strum(serialize = "authPriv")]
    #[serde(rename = "authPriv")]
    AuthPriv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum AuthProtocol {
    #[strum(serialize = "MD5")]
    Md5,
    #[strum(serialize = "SHA")]
    Sha,
    #[strum(serialize = "SHA224")]
    Sha224,
    #[strum(serialize = "SHA256")]
    Sha256,
    #[strum(serialize = "SHA384")]
    Sha384,
    #[strum(serialize = "SHA512")]
    Sha512,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum PrivProtocol {
    #[strum(serialize = "DES")]
    Des,
    #[strum(serialize = "AES")]
    Aes,
    #[strum(serialize = "AES192")]
    Aes192,
    #[strum(serialize = "AES256")]
    Aes256,
}

/// One explicitly configured SNMPv3 credential set.
#[derive(Debug, Clone)]
pub struct V3Credentials {
    pub level: SecurityLevel,
    pub user: String,
    pub auth: Option<(AuthProtocol, SecretString)>,
    pub privacy: Option<(PrivProtocol, SecretString)>,
    pub context_name: Option<String>,
}

/// A fully specified SNMP endpoint: address, port, version and credentials.
#[derive(Debug, Clone)]
pub struct SnmpTarget {
    pub address: SocketAddr,
    pub version: SnmpVersion,
    /// Community string (v1/v2c). Empty for v3.
    pub community: String,
    pub v3: Option<V3Credentials>,
}

impl fmt::Display for SnmpTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.v3 {
            Some(v3) => write!(f, "v3 user '{}' ({}) @ {}", v3.user, v3.level, self.address),
            None => write!(f, "v{} @ {}", self.version, self.address),
        }
    }
}

/// Per-session timeout and retry budget.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub timeout: Duration,
    pub retries: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            retries: 0,
        }
    }
}

// ── Session traits ──────────────────────────────────────────────────

/// An open SNMP session against one target.
///
/// Implementations own their socket and release it on drop. Each call
/// honours the `SessionOptions` the session was opened with.
#[async_trait]
pub trait SnmpSession: Send + Sync {
    async fn get(&self, oids: &[Oid]) -> Result<Vec<VarBind>, Error>;

    async fn get_next(&self, oids: &[Oid]) -> Result<Vec<VarBind>, Error>;

    /// GETBULK with `non_repeaters = 0`. Never called on v1 sessions.
    async fn get_bulk(&self, oids: &[Oid], max_repetitions: u32) -> Result<Vec<VarBind>, Error>;
}

/// Opens sessions. The UDP connector is used in production, tests plug in
/// an in-process agent.
#[async_trait]
pub trait SnmpConnector: Send + Sync {
    async fn connect(
        &self,
        target: &SnmpTarget,
        options: SessionOptions,
    ) -> Result<Box<dyn SnmpSession>, Error>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn version_order_is_probe_preference() {
        let mut versions = vec![SnmpVersion::V3, SnmpVersion::V1, SnmpVersion::V2c];
        versions.sort();
        assert_eq!(versions, [SnmpVersion::V1, SnmpVersion::V2c, SnmpVersion::V3]);
    }

    #[test]
    fn version_strings() {
        assert_eq!("2c".parse::<SnmpVersion>().unwrap(), SnmpVersion::V2c);
        assert_eq!(SnmpVersion::V1.to_string(), "1");
        assert!("4".parse::<SnmpVersion>().is_err());
        assert_eq!(
            "authpriv".parse::<SecurityLevel>().unwrap(),
            SecurityLevel::AuthPriv
        );
        assert_eq!("sha256".parse::<AuthProtocol>().unwrap(), AuthProtocol::Sha256);
    }
}
