// ── Request pipeline ──
//
// validate → per-address lock → handler task under the deadline → stats.
// The handler reads the cache, merges credentials (request > cache >
// config), sets up sessions, identifies the device or re-verifies the
// cached class, dispatches to the communicator and writes the cache.
// A panic in a handler becomes `Internal`; a fired deadline cancels the
// handler and becomes `TimedOut`.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::check::CheckPlugin;
use crate::check::handlers::{
    check_cpu, check_disk, check_hardware_health, check_high_availability, check_identify,
    check_interface_metrics, check_memory, check_metrics, check_sbc, check_server, check_siem,
    check_snmp, check_thola_server, check_ups,
};
use crate::class::ClassTree;
use crate::communicator::{Communicator, OverrideRegistry, optional};
use crate::config::EngineConfig;
use crate::device::{Established, Transports, establish};
use crate::error::CoreError;
use crate::model::IdentifyResponse;
use crate::stats::{Statistics, StatisticsSnapshot};
use crate::store::CacheStore;

use super::types::{
    AvailableComponentsResponse, CountInterfacesResponse, InterfacesResponse, Request, RequestKind,
    Response,
};
use super::validate::validate;

struct EngineInner {
    config: EngineConfig,
    classes: ClassTree,
    overrides: OverrideRegistry,
    cache: CacheStore,
    transports: Transports,
    stats: Statistics,
    locks: DashMap<IpAddr, Arc<Mutex<()>>>,
}

/// Shared request processor. Cloning is cheap.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("classes", &self.inner.classes.len())
            .field("cache", &self.inner.cache)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

pub struct EngineBuilder {
    config: EngineConfig,
    classes: Option<ClassTree>,
    overrides: OverrideRegistry,
    cache: CacheStore,
    transports: Transports,
}

impl EngineBuilder {
    #[must_use]
    pub fn classes(mut self, classes: ClassTree) -> Self {
        self.classes = Some(classes);
        self
    }

    #[must_use]
    pub fn overrides(mut self, overrides: OverrideRegistry) -> Self {
        self.overrides = overrides;
        self
    }

    #[must_use]
    pub fn cache(mut self, cache: CacheStore) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn transports(mut self, transports: Transports) -> Self {
        self.transports = transports;
        self
    }

    /// Falls back to the built-in device classes when none were given.
    pub fn build(self) -> Result<Engine, CoreError> {
        let classes = match self.classes {
            Some(classes) => classes,
            None => ClassTree::builtin()?,
        };
        info!(classes = classes.len(), "engine ready");
        Ok(Engine {
            inner: Arc::new(EngineInner {
                config: self.config,
                classes,
                overrides: self.overrides,
                cache: self.cache,
                transports: self.transports,
                stats: Statistics::new(),
                locks: DashMap::new(),
            }),
        })
    }
}

/// A cache read that missed or failed counts as a miss.
fn from_cache<T>(result: Result<T, CoreError>, ip: IpAddr, what: &str) -> Option<T> {
    match optional(result) {
        Ok(hit) => hit,
        Err(e) => {
            warn!(%ip, error = %e, "ignoring unreadable cached {what}");
            None
        }
    }
}

impl Engine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            classes: None,
            overrides: OverrideRegistry::builtin(),
            cache: CacheStore::disabled(),
            transports: Transports::default(),
        }
    }

    pub fn classes(&self) -> &ClassTree {
        &self.inner.classes
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Run one request to completion.
    ///
    /// Check requests report failures other than validation as an
    /// `UNKNOWN` check response.
    pub async fn process(&self, request: Request) -> Result<Response, CoreError> {
        let started = Instant::now();
        let kind = request.kind.name();
        let is_check = request.kind.is_check();

        let result = match self.run(request).await {
            Err(e) if is_check && !matches!(e, CoreError::Validation { .. }) => {
                Ok(Response::Check(CheckPlugin::unknown(&e)))
            }
            other => other,
        };

        let exit_code = result.as_ref().map_or(1, Response::exit_code);
        self.inner.stats.record(started.elapsed(), exit_code);
        match &result {
            Ok(_) => debug!(kind, exit_code, elapsed = ?started.elapsed(), "request done"),
            Err(e) => warn!(kind, error = %e, "request failed"),
        }
        result
    }

    async fn run(&self, request: Request) -> Result<Response, CoreError> {
        let Some(ip) = validate(&request)? else {
            return self.local(&request.kind);
        };

        let lock = self
            .inner
            .config
            .lock_per_ip
            .then(|| Arc::clone(&self.inner.locks.entry(ip).or_default()));
        let guard = match &lock {
            Some(lock) => Some(Arc::clone(lock).lock_owned().await),
            None => None,
        };

        let result = self.run_with_deadline(ip, request).await;

        drop(guard);
        drop(lock);
        self.inner
            .locks
            .remove_if(&ip, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn run_with_deadline(&self, ip: IpAddr, request: Request) -> Result<Response, CoreError> {
        let deadline = request
            .base
            .timeout
            .map_or(self.inner.config.request_timeout, Duration::from_secs);
        let cancel = CancellationToken::new();

        let engine = self.clone();
        let token = cancel.clone();
        let mut handle = tokio::spawn(async move { engine.handle(ip, request, token).await });

        match tokio::time::timeout(deadline, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) if join.is_panic() => {
                warn!(%ip, "request handler panicked");
                Err(CoreError::Internal("request handler panicked".into()))
            }
            Ok(Err(_)) => Err(CoreError::Cancelled),
            Err(_) => {
                cancel.cancel();
                handle.abort();
                // Wait until the task is gone so its sessions are closed.
                let _ = handle.await;
                warn!(%ip, timeout_secs = deadline.as_secs(), "request timed out");
                Err(CoreError::TimedOut {
                    timeout_secs: deadline.as_secs(),
                })
            }
        }
    }

    fn local(&self, kind: &RequestKind) -> Result<Response, CoreError> {
        match kind {
            RequestKind::CheckTholaServer => Ok(Response::Check(
                check_thola_server(&self.inner.stats.snapshot()).finish(),
            )),
            other => Err(CoreError::Internal(format!(
                "{} needs a device",
                other.name()
            ))),
        }
    }

    async fn handle(
        self,
        ip: IpAddr,
        request: Request,
        cancel: CancellationToken,
    ) -> Result<Response, CoreError> {
        let inner = &*self.inner;
        let Request { base, kind } = request;

        // ── Credentials and sessions ─────────────────────────────────
        let cached_connection = if base.ignore_cache {
            None
        } else {
            from_cache(inner.cache.get_connection(ip).await, ip, "connection data")
        };
        let merged = base
            .device_data
            .connection_data
            .merge(&cached_connection.clone().unwrap_or_default())
            .merge(&inner.config.connection);

        debug!(%ip, kind = kind.name(), "setting up sessions");
        let Established { context, ideal } =
            establish(ip, &merged, cached_connection.as_ref(), &inner.transports, cancel).await?;
        let device = context.with_gets_instead_of_walk(inner.config.gets_instead_of_walk);

        if matches!(kind, RequestKind::CheckSnmp) {
            let credentials = device.snmp().map(|_| ideal.snmp.clone());
            return Ok(Response::Check(check_snmp(credentials)));
        }

        // ── Identify or verify the cached class ──────────────────────
        let cached_identify = if base.ignore_cache {
            None
        } else {
            from_cache(inner.cache.get_identify(ip).await, ip, "identify response")
        };
        let (class, cached_properties) = match cached_identify {
            Some(cached) => match inner.classes.verify(&cached.class, &device).await? {
                Some(class) => {
                    debug!(%ip, class = %cached.class, "cached class still matches");
                    (class, Some(cached.properties))
                }
                None => {
                    debug!(%ip, class = %cached.class, "cached class no longer matches");
                    (inner.classes.identify(&device).await?, None)
                }
            },
            None => (inner.classes.identify(&device).await?, None),
        };

        if let Some(snmp) = device.snmp() {
            let (max_repetitions, max_oids) = class.snmp_limits();
            snmp.set_limits(max_repetitions, max_oids);
        }
        let overrides = inner.overrides.resolve(&inner.classes, class.name());
        let comm = Communicator::new(&device, Arc::clone(&class), overrides);

        let fresh = cached_properties.is_none();
        let properties = match cached_properties {
            Some(properties) => properties,
            None => comm.properties().await?,
        };
        let identified = IdentifyResponse {
            class: class.name().to_owned(),
            properties,
        };

        // ── Dispatch and persist ─────────────────────────────────────
        debug!(%ip, class = %identified.class, kind = kind.name(), "dispatching");
        let response = dispatch(&comm, &identified, &kind).await;

        if fresh || cached_connection.as_ref() != Some(&ideal) {
            if let Err(e) = inner.cache.set_identify(ip, &ideal, &identified).await {
                warn!(%ip, error = %e, "cache write failed");
            }
        }
        response
    }
}

async fn dispatch(
    comm: &Communicator<'_>,
    identified: &IdentifyResponse,
    kind: &RequestKind,
) -> Result<Response, CoreError> {
    let check = |plugin: CheckPlugin| Response::Check(plugin.finish());
    let response = match kind {
        RequestKind::Identify => Response::Identify(identified.clone()),

        RequestKind::ReadAvailableComponents => {
            Response::AvailableComponents(AvailableComponentsResponse {
                available_components: comm.available_components(),
            })
        }
        RequestKind::ReadCountInterfaces => Response::CountInterfaces(CountInterfacesResponse {
            interfaces: comm.count_interfaces().await?,
        }),
        RequestKind::ReadInterfaces(options) => Response::Interfaces(InterfacesResponse {
            interfaces: comm.interfaces(&options.row_filters()?).await?,
        }),
        RequestKind::ReadCpu => Response::Cpu(comm.cpu_component().await?),
        RequestKind::ReadMemory => Response::Memory(comm.memory_component().await?),
        RequestKind::ReadUps => Response::Ups(comm.ups_component().await?),
        RequestKind::ReadSbc => Response::Sbc(comm.sbc_component().await?),
        RequestKind::ReadHardwareHealth => {
            Response::HardwareHealth(comm.hardware_health_component().await?)
        }
        RequestKind::ReadHighAvailability => {
            Response::HighAvailability(comm.high_availability_component().await?)
        }
        RequestKind::ReadDisk => Response::Disk(comm.disk_component().await?),
        RequestKind::ReadSiem => Response::Siem(comm.siem_component().await?),
        RequestKind::ReadServer => Response::Server(comm.server_component().await?),

        RequestKind::CheckIdentify(expect) => check(check_identify(identified, expect)),
        RequestKind::CheckInterfaceMetrics(options) => {
            check(check_interface_metrics(comm, options).await?)
        }
        RequestKind::CheckCpu(options) => check(check_cpu(comm, options).await?),
        RequestKind::CheckMemory(options) => check(check_memory(comm, options).await?),
        RequestKind::CheckUps(options) => check(check_ups(comm, options).await?),
        RequestKind::CheckSbc(options) => check(check_sbc(comm, options).await?),
        RequestKind::CheckHardwareHealth => check(check_hardware_health(comm).await?),
        RequestKind::CheckHighAvailability(options) => {
            check(check_high_availability(comm, options).await?)
        }
        RequestKind::CheckDisk(options) => check(check_disk(comm, options).await?),
        RequestKind::CheckSiem(options) => check(check_siem(comm, options).await?),
        RequestKind::CheckServer(options) => check(check_server(comm, options).await?),
        RequestKind::CheckMetrics(options) => check(check_metrics(comm, options).await?),

        RequestKind::CheckSnmp | RequestKind::CheckTholaServer => {
            return Err(CoreError::Internal(format!(
                "{} is not dispatched to a device class",
                kind.name()
            )));
        }
    };
    Ok(response)
}
