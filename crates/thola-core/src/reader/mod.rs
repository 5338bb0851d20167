// ── Property readers ──
//
// Lazy strategies producing one `Value` from a device. Built once from
// class files and immutable afterwards; reading never mutates anything
// but the per-request memo inside `DeviceContext`.

mod decode;
mod group;
mod transform;

use futures::future::{BoxFuture, FutureExt};
use regex::Regex;
use thola_transport::Oid;

use crate::class::DeviceClass;
use crate::condition::Condition;
use crate::device::DeviceContext;
use crate::error::CoreError;
use crate::value::Value;

pub use decode::{Decode, natural};
pub use group::{Column, GroupReader, Row, RowFilter};
pub use transform::{TransformOp, apply_all};

/// What a reader runs against: the device and the class it is read through.
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    pub device: &'a DeviceContext,
    pub class: &'a DeviceClass,
}

impl<'a> Scope<'a> {
    pub fn new(device: &'a DeviceContext, class: &'a DeviceClass) -> Self {
        Self { device, class }
    }
}

#[derive(Debug, Clone)]
pub enum Reader {
    Constant(Value),
    Snmp {
        oid: Oid,
        decode: Decode,
    },
    /// Body of an HTTP GET, optionally narrowed to a regex capture group.
    HttpBody {
        path: String,
        regex: Option<Regex>,
        group: usize,
        decode: Decode,
    },
    /// First reader that yields a non-empty value.
    FirstNonEmpty(Vec<Reader>),
    Transform {
        inner: Box<Reader>,
        ops: Vec<TransformOp>,
    },
    /// `NotFound` unless the gate holds.
    Gated {
        gate: Condition,
        inner: Box<Reader>,
    },
}

impl Reader {
    pub fn get<'a>(&'a self, scope: Scope<'a>) -> BoxFuture<'a, Result<Value, CoreError>> {
        async move {
            match self {
                Self::Constant(value) => Ok(value.clone()),
                Self::Snmp { oid, decode } => {
                    let raw = scope.device.snmp_get(oid).await?;
                    decode.snmp(&raw)
                }
                Self::HttpBody {
                    path,
                    regex,
                    group,
                    decode,
                } => {
                    let body = scope.device.http_get(path).await?;
                    let text = match regex {
                        None => body.as_str().to_owned(),
                        Some(regex) => regex
                            .captures(&body)
                            .and_then(|caps| caps.get(*group))
                            .map(|m| m.as_str().to_owned())
                            .ok_or_else(|| {
                                CoreError::not_found(format!(
                                    "/{}/ does not match the body of {path}",
                                    regex.as_str()
                                ))
                            })?,
                    };
                    decode.value(Value::String(text))
                }
                Self::FirstNonEmpty(readers) => {
                    let mut last = CoreError::not_implemented("no readers to try");
                    for reader in readers {
                        match reader.get(scope).await {
                            Ok(value) if value.is_empty() => {
                                last = CoreError::not_found("empty value");
                            }
                            Ok(value) => return Ok(value),
                            Err(e) if e.is_absent() => last = e,
                            Err(e) => return Err(e),
                        }
                    }
                    Err(last)
                }
                Self::Transform { inner, ops } => apply_all(ops, inner.get(scope).await?),
                Self::Gated { gate, inner } => {
                    if gate.evaluate(scope).await? {
                        inner.get(scope).await
                    } else {
                        Err(CoreError::not_found("reader gate did not match"))
                    }
                }
            }
        }
        .boxed()
    }

    /// OIDs this reader may fetch with plain gets.
    pub fn snmp_oids(&self, out: &mut Vec<Oid>) {
        match self {
            Self::Snmp { oid, .. } => out.push(oid.clone()),
            Self::FirstNonEmpty(readers) => readers.iter().for_each(|r| r.snmp_oids(out)),
            Self::Transform { inner, .. } => inner.snmp_oids(out),
            Self::Gated { gate, inner } => {
                out.extend(gate.snmp_oids());
                inner.snmp_oids(out);
            }
            Self::Constant(_) | Self::HttpBody { .. } => {}
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use thola_transport::http::{HttpClient, HttpCredentials, TransportConfig};
    use thola_transport::snmp::testing::MockAgent;
    use thola_transport::snmp::{SessionOptions, SnmpClient, SnmpConnector, SnmpValue, SnmpVersion};
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::class::ClassTree;
    use crate::condition::Matcher;

    const SYS_NAME: &str = "1.3.6.1.2.1.1.5.0";
    const SYS_CONTACT: &str = "1.3.6.1.2.1.1.4.0";

    async fn snmp_device(agent: &Arc<MockAgent>) -> DeviceContext {
        let target = MockAgent::target(SnmpVersion::V2c, "public", 161);
        let session = agent
            .connector()
            .connect(&target, SessionOptions::default())
            .await
            .unwrap();
        DeviceContext::new(
            MockAgent::address(),
            Some(SnmpClient::new(session, target)),
            None,
            CancellationToken::new(),
        )
    }

    fn snmp(oid: &str) -> Reader {
        Reader::Snmp {
            oid: oid.parse().unwrap(),
            decode: Decode::Auto,
        }
    }

    #[tokio::test]
    async fn first_non_empty_skips_blank_and_missing_values() {
        let agent = MockAgent::builder()
            .accept(SnmpVersion::V2c, "public", 161)
            .value(SYS_CONTACT, SnmpValue::OctetString(Vec::new()))
            .value(SYS_NAME, SnmpValue::OctetString(b"core-sw-1".to_vec()))
            .build();
        let device = snmp_device(&agent).await;
        let tree = ClassTree::builtin().unwrap();
        let scope = Scope::new(&device, tree.root());

        let reader = Reader::FirstNonEmpty(vec![
            snmp("1.3.6.1.2.1.1.6.0"),
            snmp(SYS_CONTACT),
            snmp(SYS_NAME),
        ]);
        assert_eq!(reader.get(scope).await.unwrap(), Value::from("core-sw-1"));

        let nothing = Reader::FirstNonEmpty(vec![snmp(SYS_CONTACT)]);
        assert!(nothing.get(scope).await.unwrap_err().is_absent());
    }

    #[tokio::test]
    async fn transform_and_gate() {
        let agent = MockAgent::builder()
            .accept(SnmpVersion::V2c, "public", 161)
            .value(SYS_NAME, SnmpValue::OctetString(b"Core-SW-1".to_vec()))
            .build();
        let device = snmp_device(&agent).await;
        let tree = ClassTree::builtin().unwrap();
        let scope = Scope::new(&device, tree.root());

        let lowered = Reader::Transform {
            inner: Box::new(snmp(SYS_NAME)),
            ops: vec![TransformOp::ToLower, TransformOp::AddPrefix("host:".into())],
        };
        assert_eq!(lowered.get(scope).await.unwrap(), Value::from("host:core-sw-1"));

        let gated = |expected: &str| Reader::Gated {
            gate: Condition::SnmpGet {
                oid: SYS_NAME.parse().unwrap(),
                matcher: Matcher::equals(expected),
            },
            inner: Box::new(Reader::Constant(Value::Bool(true))),
        };
        assert_eq!(gated("core-sw-1").get(scope).await.unwrap(), Value::Bool(true));
        assert!(gated("edge").get(scope).await.unwrap_err().is_absent());

        let mut oids = Vec::new();
        gated("x").snmp_oids(&mut oids);
        assert_eq!(oids.len(), 1);
    }

    #[tokio::test]
    async fn http_body_capture() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_string("firmware: 4.2.1\nuptime: 7d"))
            .expect(1)
            .mount(&server)
            .await;

        let http = HttpClient::from_base_url(
            server.uri().parse().unwrap(),
            &HttpCredentials::default(),
            &TransportConfig::default(),
        )
        .unwrap();
        let device = DeviceContext::new(
            "127.0.0.1".parse().unwrap(),
            None,
            Some(http),
            CancellationToken::new(),
        );
        let tree = ClassTree::builtin().unwrap();
        let scope = Scope::new(&device, tree.root());

        let version = Reader::HttpBody {
            path: "status".into(),
            regex: Some(Regex::new(r"firmware: (\S+)").unwrap()),
            group: 1,
            decode: Decode::String,
        };
        assert_eq!(version.get(scope).await.unwrap(), Value::from("4.2.1"));

        // Same path again is served from the request memo.
        let missing = Reader::HttpBody {
            path: "status".into(),
            regex: Some(Regex::new(r"serial: (\S+)").unwrap()),
            group: 1,
            decode: Decode::String,
        };
        assert!(missing.get(scope).await.unwrap_err().is_absent());
    }
}
