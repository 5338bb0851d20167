// UDP connector backed by `async-snmp`
//
// Translates between the engine's credential/value types and the wire
// client. One dedicated socket per session; dropping the session closes it.

use async_snmp::v3::{AuthProtocol as WireAuth, PrivProtocol as WirePriv};
use async_snmp::{Auth, Backoff, Client, Retry, UdpClient};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::debug;

use super::{
    AuthProtocol, PrivProtocol, SessionOptions, SnmpConnector, SnmpSession, SnmpTarget,
    SnmpValue, SnmpVersion, VarBind,
};
use crate::error::Error;
use crate::oid::Oid;

/// Production connector: real SNMP over UDP.
#[derive(Debug, Default, Clone, Copy)]
pub struct UdpConnector;

#[async_trait]
impl SnmpConnector for UdpConnector {
    async fn connect(
        &self,
        target: &SnmpTarget,
        options: SessionOptions,
    ) -> Result<Box<dyn SnmpSession>, Error> {
        let label = target.to_string();
        debug!(target = %label, "opening snmp session");
        let client = Client::builder(target.address.to_string(), wire_auth(target))
            .timeout(options.timeout)
            .retry(Retry {
                max_attempts: options.retries,
                backoff: Backoff::None,
            })
            .connect()
            .await
            .map_err(|e| Error::Connect {
                target: label.clone(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(UdpSession {
            client,
            label,
            attempts: options.retries + 1,
        }))
    }
}

fn wire_auth(target: &SnmpTarget) -> Auth {
    match (&target.v3, target.version) {
        (Some(v3), _) => {
            let mut usm = Auth::usm(v3.user.as_str());
            if let Some((proto, key)) = &v3.auth {
                usm = usm.auth(wire_auth_protocol(*proto), key.expose_secret());
            }
            if let Some((proto, key)) = &v3.privacy {
                usm = usm.privacy(wire_priv_protocol(*proto), key.expose_secret());
            }
            usm.into()
        }
        (None, SnmpVersion::V1) => Auth::v1(target.community.as_str()),
        (None, _) => Auth::v2c(target.community.as_str()),
    }
}

fn wire_auth_protocol(proto: AuthProtocol) -> WireAuth {
    match proto {
        AuthProtocol::Md5 => WireAuth::Md5,
        AuthProtocol::Sha => WireAuth::Sha1,
        AuthProtocol::Sha224 => WireAuth::Sha224,
        AuthProtocol::Sha256 => WireAuth::Sha256,
        AuthProtocol::Sha384 => WireAuth::Sha384,
        AuthProtocol::Sha512 => WireAuth::Sha512,
    }
}

fn wire_priv_protocol(proto: PrivProtocol) -> WirePriv {
    match proto {
        PrivProtocol::Des => WirePriv::Des,
        PrivProtocol::Aes => WirePriv::Aes128,
        PrivProtocol::Aes192 => WirePriv::Aes192,
        PrivProtocol::Aes256 => WirePriv::Aes256,
    }
}

// ── Session ─────────────────────────────────────────────────────────

struct UdpSession {
    client: UdpClient,
    label: String,
    attempts: u32,
}

impl UdpSession {
    fn map_error(&self, err: &async_snmp::Error, oids: &[Oid]) -> Error {
        match err {
            async_snmp::Error::Timeout { .. } => Error::Timeout {
                target: self.label.clone(),
                attempts: self.attempts,
            },
            async_snmp::Error::Snmp {
                status: async_snmp::ErrorStatus::NoSuchName,
                ..
            } => Error::NoSuchObject {
                oid: oids.first().map(ToString::to_string).unwrap_or_default(),
            },
            other => Error::Snmp {
                message: other.to_string(),
            },
        }
    }
}

fn to_wire(oids: &[Oid]) -> Result<Vec<async_snmp::Oid>, Error> {
    oids.iter()
        .map(|oid| {
            async_snmp::Oid::parse(&oid.to_string()).map_err(|_| Error::InvalidOid(oid.to_string()))
        })
        .collect()
}

fn from_wire(vb: async_snmp::VarBind) -> Result<VarBind, Error> {
    let oid: Oid = vb.oid.to_string().parse()?;
    Ok(VarBind::new(oid, from_wire_value(vb.value)))
}

fn from_wire_value(value: async_snmp::Value) -> SnmpValue {
    use async_snmp::Value as W;
    match value {
        W::Integer(v) => SnmpValue::Integer(i64::from(v)),
        W::OctetString(bytes) => SnmpValue::OctetString(bytes.to_vec()),
        W::ObjectIdentifier(oid) => oid
            .to_string()
            .parse()
            .map_or(SnmpValue::Null, SnmpValue::ObjectId),
        W::IpAddress(octets) => SnmpValue::IpAddress(octets),
        W::Counter32(v) => SnmpValue::Counter32(v),
        W::Gauge32(v) => SnmpValue::Gauge32(v),
        W::TimeTicks(v) => SnmpValue::TimeTicks(v),
        W::Counter64(v) => SnmpValue::Counter64(v),
        W::Opaque(bytes) => SnmpValue::Opaque(bytes.to_vec()),
        W::NoSuchObject => SnmpValue::NoSuchObject,
        W::NoSuchInstance => SnmpValue::NoSuchInstance,
        W::EndOfMibView => SnmpValue::EndOfMibView,
        _ => SnmpValue::Null,
    }
}

#[async_trait]
impl SnmpSession for UdpSession {
    async fn get(&self, oids: &[Oid]) -> Result<Vec<VarBind>, Error> {
        let wire = to_wire(oids)?;
        let varbinds = self
            .client
            .get_many(&wire)
            .await
            .map_err(|e| self.map_error(&e, oids))?;
        varbinds.into_iter().map(from_wire).collect()
    }

    async fn get_next(&self, oids: &[Oid]) -> Result<Vec<VarBind>, Error> {
        let mut out = Vec::with_capacity(oids.len());
        for (oid, wire) in oids.iter().zip(to_wire(oids)?) {
            let vb = self
                .client
                .get_next(&wire)
                .await
                .map_err(|e| self.map_error(&e, std::slice::from_ref(oid)))?;
            out.push(from_wire(vb)?);
        }
        Ok(out)
    }

    async fn get_bulk(&self, oids: &[Oid], max_repetitions: u32) -> Result<Vec<VarBind>, Error> {
        let wire = to_wire(oids)?;
        let reps = i32::try_from(max_repetitions).unwrap_or(i32::MAX);
        let varbinds = self
            .client
            .get_bulk(&wire, 0, reps)
            .await
            .map_err(|e| self.map_error(&e, oids))?;
        varbinds.into_iter().map(from_wire).collect()
    }
}
