// ── In-process SNMP agent ──
//
// A scripted agent for tests: answers an OID table for a fixed set of
// credential tuples, can delay individual tuples, crash on one, or never
// answer at all, and counts queries plus open sessions so tests can assert that every
// session was released.

use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use super::{
    SecurityLevel, SessionOptions, SnmpConnector, SnmpSession, SnmpTarget, SnmpValue,
    SnmpVersion, V3Credentials, VarBind,
};
use crate::error::Error;
use crate::oid::Oid;

type TupleKey = (SnmpVersion, String, u16);

pub struct MockAgent {
    table: RwLock<BTreeMap<Oid, SnmpValue>>,
    accepted: Vec<TupleKey>,
    delays: HashMap<TupleKey, Duration>,
    crashes: Vec<TupleKey>,
    hang: bool,
    queries: AtomicUsize,
    bulk_requests: AtomicUsize,
    open_sessions: AtomicUsize,
    sessions_opened: AtomicUsize,
}

#[derive(Default)]
pub struct MockAgentBuilder {
    table: BTreeMap<Oid, SnmpValue>,
    accepted: Vec<TupleKey>,
    delays: HashMap<TupleKey, Duration>,
    crashes: Vec<TupleKey>,
    hang: bool,
}

impl MockAgentBuilder {
    /// Answer requests carrying this version/community (or v3 user) on this port.
    pub fn accept(mut self, version: SnmpVersion, community: &str, port: u16) -> Self {
        self.accepted.push((version, community.to_owned(), port));
        self
    }

    /// Delay answers for one tuple. A delay longer than the session
    /// timeout behaves like a silent tuple.
    pub fn delay(mut self, version: SnmpVersion, community: &str, port: u16, by: Duration) -> Self {
        self.delays.insert((version, community.to_owned(), port), by);
        self
    }

    /// Panic inside `connect` for one tuple.
    pub fn crash(mut self, version: SnmpVersion, community: &str, port: u16) -> Self {
        self.crashes.push((version, community.to_owned(), port));
        self
    }

    /// Never answer anything, not even with a timeout.
    pub fn hang(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Add an OID to the table. Panics on a malformed OID (test input).
    #[allow(clippy::expect_used)]
    pub fn value(mut self, oid: &str, value: SnmpValue) -> Self {
        self.table.insert(oid.parse().expect("valid test OID"), value);
        self
    }

    pub fn build(self) -> Arc<MockAgent> {
        Arc::new(MockAgent {
            table: RwLock::new(self.table),
            accepted: self.accepted,
            delays: self.delays,
            crashes: self.crashes,
            hang: self.hang,
            queries: AtomicUsize::new(0),
            bulk_requests: AtomicUsize::new(0),
            open_sessions: AtomicUsize::new(0),
            sessions_opened: AtomicUsize::new(0),
        })
    }
}

impl MockAgent {
    pub fn builder() -> MockAgentBuilder {
        MockAgentBuilder::default()
    }

    pub fn address() -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    /// A community target on the loopback address.
    pub fn target(version: SnmpVersion, community: &str, port: u16) -> SnmpTarget {
        SnmpTarget {
            address: SocketAddr::new(Self::address(), port),
            version,
            community: community.to_owned(),
            v3: None,
        }
    }

    /// A noAuthNoPriv v3 target on the loopback address.
    pub fn v3_target(user: &str, port: u16) -> SnmpTarget {
        SnmpTarget {
            address: SocketAddr::new(Self::address(), port),
            version: SnmpVersion::V3,
            community: String::new(),
            v3: Some(V3Credentials {
                level: SecurityLevel::NoAuthNoPriv,
                user: user.to_owned(),
                auth: None,
                privacy: None,
                context_name: None,
            }),
        }
    }

    pub fn connector(self: &Arc<Self>) -> Arc<dyn SnmpConnector> {
        Arc::new(MockConnector(Arc::clone(self)))
    }

    /// Replace or insert a value while tests run.
    #[allow(clippy::expect_used)]
    pub fn set_value(&self, oid: &str, value: SnmpValue) {
        let oid: Oid = oid.parse().expect("valid test OID");
        self.table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(oid, value);
    }

    /// Requests received (every PDU counts, accepted or not).
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn bulk_requests(&self) -> usize {
        self.bulk_requests.load(Ordering::SeqCst)
    }

    /// Sessions currently alive.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// Sessions ever opened.
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.queries.store(0, Ordering::SeqCst);
        self.bulk_requests.store(0, Ordering::SeqCst);
        self.sessions_opened.store(0, Ordering::SeqCst);
    }

    fn lookup(&self, oid: &Oid) -> Option<SnmpValue> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(oid)
            .cloned()
    }

    fn successor(&self, oid: &Oid) -> Option<VarBind> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .range((Bound::Excluded(oid.clone()), Bound::Unbounded))
            .next()
            .map(|(k, v)| VarBind::new(k.clone(), v.clone()))
    }
}

// ── Connector + session ─────────────────────────────────────────────

struct MockConnector(Arc<MockAgent>);

#[async_trait]
impl SnmpConnector for MockConnector {
    async fn connect(
        &self,
        target: &SnmpTarget,
        options: SessionOptions,
    ) -> Result<Box<dyn SnmpSession>, Error> {
        let agent = Arc::clone(&self.0);
        let identity = target
            .v3
            .as_ref()
            .map_or_else(|| target.community.clone(), |v3| v3.user.clone());
        let key = (target.version, identity, target.address.port());
        assert!(!agent.crashes.contains(&key), "agent crashed on {target}");
        let accepted = agent.accepted.contains(&key);
        let delay = agent.delays.get(&key).copied().unwrap_or_default();

        agent.open_sessions.fetch_add(1, Ordering::SeqCst);
        agent.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            agent,
            target: target.to_string(),
            version: target.version,
            options,
            accepted,
            delay,
        }))
    }
}

struct MockSession {
    agent: Arc<MockAgent>,
    target: String,
    version: SnmpVersion,
    options: SessionOptions,
    accepted: bool,
    delay: Duration,
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.agent.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockSession {
    /// Wait the way a real agent would before answering, or time out.
    async fn answer(&self) -> Result<(), Error> {
        self.agent.queries.fetch_add(1, Ordering::SeqCst);
        if self.agent.hang {
            std::future::pending::<()>().await;
        }
        if !self.accepted || self.delay > self.options.timeout {
            let attempts = self.options.retries + 1;
            tokio::time::sleep(self.options.timeout * attempts).await;
            return Err(Error::Timeout {
                target: self.target.clone(),
                attempts,
            });
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(())
    }

    fn missing(&self, oid: &Oid) -> Result<SnmpValue, Error> {
        if self.version == SnmpVersion::V1 {
            Err(Error::NoSuchObject {
                oid: oid.to_string(),
            })
        } else {
            Ok(SnmpValue::NoSuchObject)
        }
    }
}

#[async_trait]
impl SnmpSession for MockSession {
    async fn get(&self, oids: &[Oid]) -> Result<Vec<VarBind>, Error> {
        self.answer().await?;
        oids.iter()
            .map(|oid| {
                let value = match self.agent.lookup(oid) {
                    Some(value) => value,
                    None => self.missing(oid)?,
                };
                Ok(VarBind::new(oid.clone(), value))
            })
            .collect()
    }

    async fn get_next(&self, oids: &[Oid]) -> Result<Vec<VarBind>, Error> {
        self.answer().await?;
        oids.iter()
            .map(|oid| match self.agent.successor(oid) {
                Some(vb) => Ok(vb),
                None if self.version == SnmpVersion::V1 => Err(Error::NoSuchObject {
                    oid: oid.to_string(),
                }),
                None => Ok(VarBind::new(oid.clone(), SnmpValue::EndOfMibView)),
            })
            .collect()
    }

    async fn get_bulk(&self, oids: &[Oid], max_repetitions: u32) -> Result<Vec<VarBind>, Error> {
        self.agent.bulk_requests.fetch_add(1, Ordering::SeqCst);
        self.answer().await?;
        let mut out = Vec::new();
        for oid in oids {
            let mut cursor = oid.clone();
            for _ in 0..max_repetitions {
                if let Some(vb) = self.agent.successor(&cursor) {
                    cursor = vb.oid.clone();
                    out.push(vb);
                } else {
                    out.push(VarBind::new(cursor.clone(), SnmpValue::EndOfMibView));
                    break;
                }
            }
        }
        Ok(out)
    }
}
