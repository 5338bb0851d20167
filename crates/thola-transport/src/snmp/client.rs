// Per-request SNMP client
//
// Wraps an open `SnmpSession` with the request-level operations the
// readers need: single and chunked gets, subtree walks. Bulk walks are
// downgraded to GETNEXT on v1 sessions. The class config adjusts
// `max_repetitions` / `max_oids` after identification.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use tracing::{debug, trace};

use super::{SnmpSession, SnmpTarget, SnmpValue, SnmpVersion, VarBind};
use crate::error::Error;
use crate::oid::Oid;

pub const DEFAULT_MAX_REPETITIONS: u32 = 20;
pub const DEFAULT_MAX_OIDS: usize = 60;

/// An SNMP session bound to the credentials that won the probe.
pub struct SnmpClient {
    session: Box<dyn SnmpSession>,
    target: SnmpTarget,
    max_repetitions: AtomicU32,
    max_oids: AtomicUsize,
}

impl SnmpClient {
    pub fn new(session: Box<dyn SnmpSession>, target: SnmpTarget) -> Self {
        Self {
            session,
            target,
            max_repetitions: AtomicU32::new(DEFAULT_MAX_REPETITIONS),
            max_oids: AtomicUsize::new(DEFAULT_MAX_OIDS),
        }
    }

    pub fn target(&self) -> &SnmpTarget {
        &self.target
    }

    pub fn version(&self) -> SnmpVersion {
        self.target.version
    }

    /// Apply a device class's bulk limits. Zero values are ignored.
    pub fn set_limits(&self, max_repetitions: Option<u32>, max_oids: Option<usize>) {
        if let Some(reps) = max_repetitions.filter(|r| *r > 0) {
            self.max_repetitions.store(reps, Ordering::Relaxed);
        }
        if let Some(oids) = max_oids.filter(|o| *o > 0) {
            self.max_oids.store(oids, Ordering::Relaxed);
        }
    }

    pub fn max_repetitions(&self) -> u32 {
        self.max_repetitions.load(Ordering::Relaxed)
    }

    pub fn max_oids(&self) -> usize {
        self.max_oids.load(Ordering::Relaxed)
    }

    // ── Gets ─────────────────────────────────────────────────────────

    /// Fetch one OID. Exception values surface as `Error::NoSuchObject`.
    pub async fn get(&self, oid: &Oid) -> Result<SnmpValue, Error> {
        let mut varbinds = self.session.get(std::slice::from_ref(oid)).await?;
        match varbinds.pop() {
            Some(vb) if !vb.value.is_absent() => Ok(vb.value),
            _ => Err(Error::NoSuchObject {
                oid: oid.to_string(),
            }),
        }
    }

    /// Fetch many OIDs in PDUs of at most `max_oids` varbinds.
    ///
    /// The result is aligned with `oids`; missing objects come back as
    /// `SnmpValue::NoSuchObject` rather than failing the whole batch.
    pub async fn get_many(&self, oids: &[Oid]) -> Result<Vec<VarBind>, Error> {
        let chunk = self.max_oids().max(1);
        let mut out = Vec::with_capacity(oids.len());
        for batch in oids.chunks(chunk) {
            debug!(target = %self.target, count = batch.len(), "snmp get");
            match self.session.get(batch).await {
                Ok(varbinds) => out.extend(varbinds),
                // v1 agents reject the whole PDU if one OID is unknown
                Err(Error::NoSuchObject { .. }) if batch.len() > 1 => {
                    for oid in batch {
                        let value = match self.session.get(std::slice::from_ref(oid)).await {
                            Ok(mut vbs) => vbs.pop().map_or(SnmpValue::NoSuchObject, |vb| vb.value),
                            Err(Error::NoSuchObject { .. }) => SnmpValue::NoSuchObject,
                            Err(e) => return Err(e),
                        };
                        out.push(VarBind::new(oid.clone(), value));
                    }
                }
                Err(Error::NoSuchObject { .. }) => {
                    out.extend(batch.iter().map(|oid| VarBind::new(oid.clone(), SnmpValue::NoSuchObject)));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    // ── Walks ────────────────────────────────────────────────────────

    /// Walk the subtree under `root`, returning varbinds in agent order.
    pub async fn walk(&self, root: &Oid) -> Result<Vec<VarBind>, Error> {
        let bulk = self.version() != SnmpVersion::V1;
        let reps = self.max_repetitions().max(1);
        let mut cursor = root.clone();
        let mut out = Vec::new();

        debug!(target = %self.target, %root, bulk, "snmp walk");
        loop {
            let request = std::slice::from_ref(&cursor);
            let batch = if bulk {
                self.session.get_bulk(request, reps).await
            } else {
                self.session.get_next(request).await
            };
            let batch = match batch {
                Ok(batch) => batch,
                // v1 signals end of view with noSuchName
                Err(Error::NoSuchObject { .. }) => break,
                Err(e) => return Err(e),
            };
            if batch.is_empty() {
                break;
            }

            let mut finished = false;
            for vb in batch {
                if matches!(vb.value, SnmpValue::EndOfMibView) || !vb.oid.is_under(root) {
                    finished = true;
                    break;
                }
                if vb.oid <= cursor {
                    return Err(Error::Snmp {
                        message: format!("agent returned non-increasing OID {} after {cursor}", vb.oid),
                    });
                }
                trace!(oid = %vb.oid, value = %vb.value, "walk varbind");
                cursor = vb.oid.clone();
                out.push(vb);
            }
            if finished {
                break;
            }
        }
        Ok(out)
    }
}
