// ── SNMP credential prober ──
//
// Tests the cartesian product of version × port × community (plus any
// explicit v3 sets) against a probe OID with a bounded worker pool.
// Tuples are ranked by (version asc, port asc, community order as given);
// the lowest-ranked successful tuple always wins, however workers are
// scheduled. A success cancels every running worker ranked after it and
// stops new spawns; workers ranked before it run to completion.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{
    SessionOptions, SnmpClient, SnmpConnector, SnmpTarget, SnmpValue, SnmpVersion,
    V3Credentials, VarBind,
};
use crate::error::{Error, ProbeAttempt};
use crate::oid::{Oid, SYS_OBJECT_ID};

/// Candidate credentials to combine.
#[derive(Debug, Clone, Default)]
pub struct ProbeCandidates {
    pub versions: Vec<SnmpVersion>,
    pub communities: Vec<String>,
    pub ports: Vec<u16>,
    /// Only these v3 sets are tried when `versions` contains v3.
    pub v3: Vec<V3Credentials>,
}

impl ProbeCandidates {
    /// Every tuple to try, in rank order.
    pub fn targets(&self, address: IpAddr) -> Vec<SnmpTarget> {
        let mut versions = self.versions.clone();
        versions.sort();
        versions.dedup();
        let mut ports = self.ports.clone();
        ports.sort_unstable();
        ports.dedup();

        let mut out = Vec::new();
        for version in versions {
            for &port in &ports {
                let address = SocketAddr::new(address, port);
                if version == SnmpVersion::V3 {
                    out.extend(self.v3.iter().map(|v3| SnmpTarget {
                        address,
                        version,
                        community: String::new(),
                        v3: Some(v3.clone()),
                    }));
                } else {
                    out.extend(self.communities.iter().map(|community| SnmpTarget {
                        address,
                        version,
                        community: community.clone(),
                        v3: None,
                    }));
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Worker pool size.
    pub parallel: usize,
    /// Per-attempt timeout and retry budget.
    pub options: SessionOptions,
    pub probe_oid: Oid,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            parallel: 5,
            options: SessionOptions::default(),
            probe_oid: Oid::new(vec![1, 3, 6, 1, 2, 1, 1, 2, 0]),
        }
    }
}

/// The winning session, still open, plus the probe answer.
pub struct ProbeOutcome {
    pub client: SnmpClient,
    pub probe: VarBind,
}

type WorkerResult = (usize, String, Result<(SnmpClient, VarBind), Error>);

/// Find the best working credential tuple for `address`.
pub async fn probe(
    connector: Arc<dyn SnmpConnector>,
    address: IpAddr,
    candidates: &ProbeCandidates,
    settings: &ProbeSettings,
    cancel: &CancellationToken,
) -> Result<ProbeOutcome, Error> {
    let targets = candidates.targets(address);
    if targets.is_empty() {
        return Err(Error::NoCandidates {
            address: address.to_string(),
        });
    }
    debug!(%address, tuples = targets.len(), parallel = settings.parallel, "probing snmp credentials");

    let parallel = settings.parallel.max(1);
    let mut pending = targets.into_iter().enumerate();
    let mut pool = Pool::default();
    let mut best: Option<(usize, ProbeOutcome)> = None;
    let mut failures: Vec<(usize, ProbeAttempt)> = Vec::new();

    pool.fill(&mut pending, parallel, &connector, settings, cancel);

    while let Some(joined) = pool.workers.join_next_with_id().await {
        match joined {
            Ok((id, (rank, label, result))) => {
                pool.finished(id);
                match result {
                    Ok((client, vb)) => {
                        if best.as_ref().is_none_or(|(current, _)| rank < *current) {
                            debug!(%label, rank, "probe succeeded");
                            pool.cancel_after(rank);
                            best = Some((rank, ProbeOutcome { client, probe: vb }));
                        }
                    }
                    Err(e) => failures.push((
                        rank,
                        ProbeAttempt {
                            target: label,
                            source: Box::new(e),
                        },
                    )),
                }
            }
            Err(e) => {
                let rank = pool.finished(e.id());
                warn!(error = %e, ?rank, "probe worker failed");
            }
        }

        // Every unspawned tuple ranks after every spawned one.
        if best.is_none() {
            pool.fill(&mut pending, parallel, &connector, settings, cancel);
        }
    }

    match best {
        Some((_, outcome)) => Ok(outcome),
        None if cancel.is_cancelled() => Err(Error::Cancelled),
        None => {
            failures.sort_by_key(|(rank, _)| *rank);
            Err(Error::ProbeFailed {
                address: address.to_string(),
                attempts: failures.into_iter().map(|(_, attempt)| attempt).collect(),
            })
        }
    }
}

/// Running workers, with the rank and cancel token of each task.
#[derive(Default)]
struct Pool {
    workers: JoinSet<WorkerResult>,
    ranks: HashMap<task::Id, usize>,
    running: HashMap<usize, CancellationToken>,
}

impl Pool {
    /// Forget a finished task; returns its rank.
    fn finished(&mut self, id: task::Id) -> Option<usize> {
        let rank = self.ranks.remove(&id)?;
        self.running.remove(&rank);
        Some(rank)
    }

    fn cancel_after(&self, rank: usize) {
        for (other, token) in &self.running {
            if *other > rank {
                token.cancel();
            }
        }
    }

    fn fill(
        &mut self,
        pending: &mut impl Iterator<Item = (usize, SnmpTarget)>,
        parallel: usize,
        connector: &Arc<dyn SnmpConnector>,
        settings: &ProbeSettings,
        cancel: &CancellationToken,
    ) {
        while self.workers.len() < parallel {
            let Some((rank, target)) = pending.next() else {
                break;
            };
            let token = cancel.child_token();
            self.running.insert(rank, token.clone());

            let connector = Arc::clone(connector);
            let options = settings.options;
            let probe_oid = settings.probe_oid.clone();
            let handle = self.workers.spawn(async move {
                let label = target.to_string();
                let result = tokio::select! {
                    biased;
                    () = token.cancelled() => Err(Error::Cancelled),
                    r = attempt(connector, target, options, probe_oid) => r,
                };
                (rank, label, result)
            });
            self.ranks.insert(handle.id(), rank);
        }
    }
}

/// Open a session and ask for the probe OID. Any answer, including an
/// exception value, proves the credentials work.
async fn attempt(
    connector: Arc<dyn SnmpConnector>,
    target: SnmpTarget,
    options: SessionOptions,
    probe_oid: Oid,
) -> Result<(SnmpClient, VarBind), Error> {
    let session = connector.connect(&target, options).await?;
    let probe = match session.get(std::slice::from_ref(&probe_oid)).await {
        Ok(mut varbinds) => varbinds
            .pop()
            .unwrap_or_else(|| VarBind::new(probe_oid.clone(), SnmpValue::NoSuchObject)),
        Err(Error::NoSuchObject { .. }) => VarBind::new(probe_oid, SnmpValue::NoSuchObject),
        Err(e) => return Err(e),
    };
    Ok((SnmpClient::new(session, target), probe))
}

/// `sysObjectID.0`, parsed.
pub fn default_probe_oid() -> Oid {
    SYS_OBJECT_ID.parse().unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use tokio::time::Instant;

    use super::*;
    use crate::snmp::testing::MockAgent;

    fn candidates(versions: &[SnmpVersion], communities: &[&str], ports: &[u16]) -> ProbeCandidates {
        ProbeCandidates {
            versions: versions.to_vec(),
            communities: communities.iter().map(|c| (*c).to_owned()).collect(),
            ports: ports.to_vec(),
            v3: Vec::new(),
        }
    }

    fn settings(parallel: usize, timeout_ms: u64, retries: u32) -> ProbeSettings {
        ProbeSettings {
            parallel,
            options: SessionOptions {
                timeout: Duration::from_millis(timeout_ms),
                retries,
            },
            probe_oid: default_probe_oid(),
        }
    }

    fn sys_object_id() -> SnmpValue {
        SnmpValue::ObjectId("1.3.6.1.4.1.9.1.1208".parse().unwrap())
    }

    #[test]
    fn targets_follow_rank_order() {
        let c = candidates(
            &[SnmpVersion::V2c, SnmpVersion::V1],
            &["private", "public"],
            &[1161, 161],
        );
        let order: Vec<String> = c
            .targets(MockAgent::address())
            .iter()
            .map(|t| format!("{}/{}/{}", t.version, t.address.port(), t.community))
            .collect();
        assert_eq!(
            order,
            [
                "1/161/private",
                "1/161/public",
                "1/1161/private",
                "1/1161/public",
                "2c/161/private",
                "2c/161/public",
                "2c/1161/private",
                "2c/1161/public",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_better_tuple_beats_fast_worse_tuple() {
        let agent = MockAgent::builder()
            .accept(SnmpVersion::V1, "public", 161)
            .accept(SnmpVersion::V2c, "private", 161)
            .delay(SnmpVersion::V1, "public", 161, Duration::from_millis(800))
            .value("1.3.6.1.2.1.1.2.0", sys_object_id())
            .build();
        let c = candidates(&[SnmpVersion::V1, SnmpVersion::V2c], &["public", "private"], &[161]);

        for _ in 0..5 {
            let outcome = probe(
                agent.connector(),
                MockAgent::address(),
                &c,
                &settings(4, 1000, 0),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
            let target = outcome.client.target();
            assert_eq!(target.version, SnmpVersion::V1);
            assert_eq!(target.community, "public");
            assert_eq!(outcome.probe.value, sys_object_id());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn success_cancels_worse_workers_and_releases_sessions() {
        let agent = MockAgent::builder()
            .accept(SnmpVersion::V2c, "public", 161)
            .value("1.3.6.1.2.1.1.2.0", sys_object_id())
            .build();
        // "public" is first; the three silent communities would each take 5s.
        let c = candidates(&[SnmpVersion::V2c], &["public", "a", "b", "c"], &[161]);
        let started = Instant::now();
        let outcome = probe(
            agent.connector(),
            MockAgent::address(),
            &c,
            &settings(4, 5000, 0),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(outcome.client.target().community, "public");
        assert_eq!(agent.open_sessions(), 1);
        drop(outcome);
        assert_eq!(agent.open_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_pool_stops_after_first_success() {
        let agent = MockAgent::builder()
            .accept(SnmpVersion::V2c, "second", 161)
            .accept(SnmpVersion::V2c, "third", 161)
            .build();
        let c = candidates(&[SnmpVersion::V2c], &["first", "second", "third"], &[161]);
        let outcome = probe(
            agent.connector(),
            MockAgent::address(),
            &c,
            &settings(1, 100, 0),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome.client.target().community, "second");
        assert_eq!(agent.sessions_opened(), 2);
        // no probe OID in the table still proves the credentials
        assert_eq!(outcome.probe.value, SnmpValue::NoSuchObject);
    }

    #[tokio::test(start_paused = true)]
    async fn all_fail_reports_every_attempt_after_full_retry_budget() {
        let agent = MockAgent::builder().build();
        let c = candidates(&[SnmpVersion::V2c], &["public", "private"], &[161]);
        let started = Instant::now();
        let err = probe(
            agent.connector(),
            MockAgent::address(),
            &c,
            &settings(2, 1000, 2),
            &CancellationToken::new(),
        )
        .await
        .err()
        .unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(4), "{elapsed:?}");
        match err {
            Error::ProbeFailed { attempts, .. } => assert_eq!(attempts.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(agent.open_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_is_prompt_and_closes_sessions() {
        let agent = MockAgent::builder().hang().build();
        let c = candidates(&[SnmpVersion::V2c], &["public", "private"], &[161]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = probe(
            agent.connector(),
            MockAgent::address(),
            &c,
            &settings(2, 1000, 0),
            &cancel,
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(agent.open_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn v3_sets_rank_after_community_versions() {
        let agent = MockAgent::builder()
            .accept(SnmpVersion::V3, "monitor", 161)
            .accept(SnmpVersion::V2c, "public", 161)
            .build();
        let mut c = candidates(&[SnmpVersion::V3, SnmpVersion::V2c], &["public"], &[161]);
        c.v3 = vec![MockAgent::v3_target("monitor", 161).v3.unwrap()];

        let outcome = probe(
            agent.connector(),
            MockAgent::address(),
            &c,
            &settings(2, 1000, 0),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome.client.target().version, SnmpVersion::V2c);

        c.versions = vec![SnmpVersion::V3];
        let outcome = probe(
            agent.connector(),
            MockAgent::address(),
            &c,
            &settings(2, 1000, 0),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome.client.target().v3.as_ref().unwrap().user, "monitor");
    }

    #[tokio::test(start_paused = true)]
    async fn crashed_worker_frees_its_slot() {
        let agent = MockAgent::builder()
            .crash(SnmpVersion::V2c, "broken", 161)
            .accept(SnmpVersion::V2c, "public", 161)
            .build();
        let c = candidates(&[SnmpVersion::V2c], &["broken", "public"], &[161]);
        let outcome = probe(
            agent.connector(),
            MockAgent::address(),
            &c,
            &settings(1, 1000, 0),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome.client.target().community, "public");
    }

    #[tokio::test]
    async fn crashed_worker_is_forgotten_by_the_pool() {
        let agent = MockAgent::builder()
            .crash(SnmpVersion::V2c, "broken", 161)
            .build();
        let c = candidates(&[SnmpVersion::V2c], &["broken"], &[161]);
        let mut pending = c.targets(MockAgent::address()).into_iter().enumerate();
        let mut pool = Pool::default();
        pool.fill(
            &mut pending,
            1,
            &agent.connector(),
            &settings(1, 1000, 0),
            &CancellationToken::new(),
        );
        assert_eq!(pool.running.len(), 1);

        let err = pool.workers.join_next_with_id().await.unwrap().err().unwrap();
        assert!(err.is_panic());
        assert_eq!(pool.finished(err.id()), Some(0));
        assert!(pool.running.is_empty());
        assert!(pool.ranks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_attempts_keep_their_cause() {
        let agent = MockAgent::builder().build();
        let c = candidates(&[SnmpVersion::V2c], &["public"], &[161]);
        let err = probe(
            agent.connector(),
            MockAgent::address(),
            &c,
            &settings(1, 1000, 0),
            &CancellationToken::new(),
        )
        .await
        .err()
        .unwrap();
        let Error::ProbeFailed { attempts, .. } = err else {
            panic!("unexpected error: {err}");
        };
        assert!(std::error::Error::source(&attempts[0]).is_some());
        assert!(matches!(*attempts[0].source, Error::Timeout { attempts: 1, .. }));
        assert!(attempts[0].to_string().starts_with(&attempts[0].target));
    }

    #[tokio::test]
    async fn empty_candidates_rejected() {
        let agent = MockAgent::builder().build();
        let err = probe(
            agent.connector(),
            MockAgent::address(),
            &ProbeCandidates::default(),
            &ProbeSettings::default(),
            &CancellationToken::new(),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, Error::NoCandidates { .. }));
    }
}
