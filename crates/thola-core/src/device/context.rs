// ── Per-request device context ──
//
// Owns the request's transport sessions and memoises every SNMP get,
// walk and HTTP body so that conditions and readers sharing a datum share
// the underlying query. Every I/O call races the request's cancellation
// token. Dropping the context closes the sessions.

use std::net::IpAddr;
use std::sync::Arc;

use dashmap::DashMap;
use thola_transport::http::HttpClient;
use thola_transport::snmp::{SnmpClient, SnmpValue, VarBind};
use thola_transport::Oid;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::CoreError;

pub struct DeviceContext {
    address: IpAddr,
    snmp: Option<SnmpClient>,
    http: Option<HttpClient>,
    snmp_memo: DashMap<Oid, SnmpValue>,
    walk_memo: DashMap<Oid, Arc<Vec<VarBind>>>,
    http_memo: DashMap<String, Arc<String>>,
    cancel: CancellationToken,
    gets_instead_of_walk: bool,
}

impl DeviceContext {
    pub fn new(
        address: IpAddr,
        snmp: Option<SnmpClient>,
        http: Option<HttpClient>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            address,
            snmp,
            http,
            snmp_memo: DashMap::new(),
            walk_memo: DashMap::new(),
            http_memo: DashMap::new(),
            cancel,
            gets_instead_of_walk: false,
        }
    }

    #[must_use]
    pub fn with_gets_instead_of_walk(mut self, enabled: bool) -> Self {
        self.gets_instead_of_walk = enabled;
        self
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn snmp(&self) -> Option<&SnmpClient> {
        self.snmp.as_ref()
    }

    pub fn http(&self) -> Option<&HttpClient> {
        self.http.as_ref()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn gets_instead_of_walk(&self) -> bool {
        self.gets_instead_of_walk
    }

    fn snmp_client(&self) -> Result<&SnmpClient, CoreError> {
        self.snmp
            .as_ref()
            .ok_or_else(|| CoreError::not_found("no SNMP session for this device"))
    }

    fn http_client(&self) -> Result<&HttpClient, CoreError> {
        self.http
            .as_ref()
            .ok_or_else(|| CoreError::not_found("no HTTP session for this device"))
    }

    async fn guarded<T>(
        &self,
        fut: impl Future<Output = Result<T, thola_transport::Error>>,
    ) -> Result<T, CoreError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(CoreError::Cancelled),
            result = fut => result.map_err(CoreError::from),
        }
    }

    // ── SNMP ─────────────────────────────────────────────────────────

    /// Record an answer obtained elsewhere (the probe), so it is not fetched again.
    pub fn seed(&self, varbind: &VarBind) {
        self.snmp_memo
            .insert(varbind.oid.clone(), varbind.value.clone());
    }

    /// Number of distinct OIDs answered so far (seeded ones included).
    pub fn memoized_gets(&self) -> usize {
        self.snmp_memo.len()
    }

    /// Get one OID. An absent value, or no SNMP session at all, is `NotFound`.
    pub async fn snmp_get(&self, oid: &Oid) -> Result<SnmpValue, CoreError> {
        if let Some(value) = self.snmp_memo.get(oid).map(|v| v.value().clone()) {
            return present(oid, value);
        }
        let client = self.snmp_client()?;
        let mut varbinds = self.guarded(client.get_many(std::slice::from_ref(oid))).await?;
        let value = varbinds
            .pop()
            .map_or(SnmpValue::NoSuchObject, |vb| vb.value);
        trace!(%oid, %value, "snmp get");
        self.snmp_memo.insert(oid.clone(), value.clone());
        present(oid, value)
    }

    /// Fetch every OID not yet memoised in as few PDUs as the session allows.
    ///
    /// Only a timeout or cancellation is returned. A batch the agent
    /// rejects otherwise leaves its OIDs to single gets.
    pub async fn prefetch(&self, oids: &[Oid]) -> Result<(), CoreError> {
        let Some(client) = self.snmp.as_ref() else {
            return Ok(());
        };
        let mut missing: Vec<Oid> = oids
            .iter()
            .filter(|oid| !self.snmp_memo.contains_key(*oid))
            .cloned()
            .collect();
        missing.sort();
        missing.dedup();
        if missing.is_empty() {
            return Ok(());
        }
        let fetched = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(CoreError::Cancelled),
            result = client.get_many(&missing) => result,
        };
        let varbinds = match fetched {
            Ok(varbinds) => varbinds,
            Err(e @ (thola_transport::Error::Timeout { .. } | thola_transport::Error::Cancelled)) => {
                return Err(e.into());
            }
            Err(e) => {
                debug!(error = %e, oids = missing.len(), "batched get rejected, falling back to single gets");
                return Ok(());
            }
        };
        for (oid, vb) in missing.into_iter().zip(varbinds) {
            self.snmp_memo.insert(oid, vb.value);
        }
        Ok(())
    }

    /// Walk a subtree. Walks are memoised per root.
    pub async fn snmp_walk(&self, root: &Oid) -> Result<Arc<Vec<VarBind>>, CoreError> {
        if let Some(rows) = self.walk_memo.get(root).map(|r| Arc::clone(r.value())) {
            return Ok(rows);
        }
        let client = self.snmp_client()?;
        let rows = Arc::new(self.guarded(client.walk(root)).await?);
        self.walk_memo.insert(root.clone(), Arc::clone(&rows));
        Ok(rows)
    }

    /// Get the cells of one table column for known row indices. Absent
    /// cells are left out.
    pub async fn snmp_get_column(
        &self,
        column: &Oid,
        indices: &[Vec<u32>],
    ) -> Result<Vec<VarBind>, CoreError> {
        let client = self.snmp_client()?;
        let oids: Vec<Oid> = indices.iter().map(|index| column.join(index)).collect();
        let varbinds = self.guarded(client.get_many(&oids)).await?;
        Ok(varbinds
            .into_iter()
            .filter(|vb| !vb.value.is_absent())
            .collect())
    }

    // ── HTTP ─────────────────────────────────────────────────────────

    /// GET a path relative to the device's base URL. Bodies are memoised per path.
    pub async fn http_get(&self, path: &str) -> Result<Arc<String>, CoreError> {
        if let Some(body) = self.http_memo.get(path).map(|b| Arc::clone(b.value())) {
            return Ok(body);
        }
        let client = self.http_client()?;
        let body = Arc::new(self.guarded(client.get_text(path)).await?);
        self.http_memo.insert(path.to_owned(), Arc::clone(&body));
        Ok(body)
    }
}

fn present(oid: &Oid, value: SnmpValue) -> Result<SnmpValue, CoreError> {
    if value.is_absent() {
        Err(CoreError::not_found(format!("no value for {oid}")))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use thola_transport::snmp::testing::MockAgent;
    use thola_transport::snmp::{SessionOptions, SnmpConnector, SnmpVersion};

    use super::*;

    async fn context(agent: &Arc<MockAgent>) -> DeviceContext {
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

    fn agent() -> Arc<MockAgent> {
        MockAgent::builder()
            .accept(SnmpVersion::V2c, "public", 161)
            .value("1.3.6.1.2.1.1.5.0", SnmpValue::OctetString(b"core-sw".to_vec()))
            .value("1.3.6.1.2.1.1.6.0", SnmpValue::OctetString(b"rack 4".to_vec()))
            .build()
    }

    #[tokio::test]
    async fn gets_are_memoised() {
        let agent = agent();
        let ctx = context(&agent).await;
        let oid: Oid = "1.3.6.1.2.1.1.5.0".parse().unwrap();
        ctx.snmp_get(&oid).await.unwrap();
        ctx.snmp_get(&oid).await.unwrap();
        assert_eq!(agent.queries(), 1);

        let missing: Oid = "1.3.6.1.2.1.1.7.0".parse().unwrap();
        assert!(ctx.snmp_get(&missing).await.unwrap_err().is_absent());
        assert!(ctx.snmp_get(&missing).await.unwrap_err().is_absent());
        assert_eq!(agent.queries(), 2);
    }

    #[tokio::test]
    async fn prefetch_batches_into_one_query() {
        let agent = agent();
        let ctx = context(&agent).await;
        let oids: Vec<Oid> = ["1.3.6.1.2.1.1.5.0", "1.3.6.1.2.1.1.6.0"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        ctx.prefetch(&oids).await.unwrap();
        for oid in &oids {
            ctx.snmp_get(oid).await.unwrap();
        }
        assert_eq!(agent.queries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn prefetch_reports_a_silent_agent_once() {
        let agent = MockAgent::builder().build();
        let ctx = context(&agent).await;
        let oids: Vec<Oid> = ["1.3.6.1.2.1.1.5.0", "1.3.6.1.2.1.1.6.0"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        let err = ctx.prefetch(&oids).await.unwrap_err();
        assert!(matches!(err, CoreError::Network(_)));
        assert_eq!(agent.queries(), 1);
    }

    #[tokio::test]
    async fn cancelled_context_fails_fast() {
        let agent = agent();
        let ctx = context(&agent).await;
        ctx.cancel_token().cancel();
        let err = ctx
            .snmp_get(&"1.3.6.1.2.1.1.5.0".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Cancelled));
    }

    #[tokio::test]
    async fn no_session_is_not_found() {
        let ctx = DeviceContext::new(MockAgent::address(), None, None, CancellationToken::new());
        assert!(ctx.http_get("/").await.unwrap_err().is_absent());
        assert!(
            ctx.snmp_get(&"1.3.6.1.2.1.1.5.0".parse().unwrap())
                .await
                .unwrap_err()
                .is_absent()
        );
    }
}
