// ── Request / response contract ──
//
// Every request carries the target device and optional credentials; the
// kind selects identify, a component read or a check. Requests and
// responses are serde types so an outer framing layer can carry them
// unchanged.

use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::check::{CheckResponse, Thresholds};
use crate::condition::Matcher;
use crate::error::CoreError;
use crate::model::{
    Component, ConnectionData, CpuComponent, DiskComponent, HardwareHealthComponent,
    HighAvailabilityComponent, IdentifyResponse, Interface, MemoryComponent, SbcComponent,
    ServerComponent, SiemComponent, UpsComponent,
};
use crate::reader::RowFilter;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceData {
    pub ip_address: String,
    pub connection_data: ConnectionData,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BaseRequest {
    pub device_data: DeviceData,
    /// Overall deadline in seconds; the engine default applies when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Skip reading the cache; fresh results are still written.
    pub ignore_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(flatten)]
    pub base: BaseRequest,
    pub kind: RequestKind,
}

impl Request {
    pub fn new(ip: impl Into<String>, kind: RequestKind) -> Self {
        Self {
            base: BaseRequest {
                device_data: DeviceData {
                    ip_address: ip.into(),
                    ..DeviceData::default()
                },
                ..BaseRequest::default()
            },
            kind,
        }
    }

    #[must_use]
    pub fn with_connection(mut self, data: ConnectionData) -> Self {
        self.base.device_data.connection_data = data;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.base.timeout = Some(seconds);
        self
    }

    #[must_use]
    pub fn ignoring_cache(mut self) -> Self {
        self.base.ignore_cache = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RequestKind {
    Identify,

    // ── Reads ────────────────────────────────────────────────────────
    ReadAvailableComponents,
    ReadCountInterfaces,
    ReadInterfaces(InterfaceOptions),
    ReadCpu,
    ReadMemory,
    ReadUps,
    ReadSbc,
    ReadHardwareHealth,
    ReadHighAvailability,
    ReadDisk,
    ReadSiem,
    ReadServer,

    // ── Checks ───────────────────────────────────────────────────────
    CheckIdentify(IdentifyExpectations),
    CheckSnmp,
    CheckTholaServer,
    CheckInterfaceMetrics(InterfaceMetricsCheck),
    CheckCpu(CpuCheck),
    CheckMemory(MemoryCheck),
    CheckUps(UpsCheck),
    CheckSbc(SbcCheck),
    CheckHardwareHealth,
    CheckHighAvailability(HighAvailabilityCheck),
    CheckDisk(DiskCheck),
    CheckSiem(SiemCheck),
    CheckServer(ServerCheck),
    CheckMetrics(MetricsCheck),
}

impl RequestKind {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn is_check(&self) -> bool {
        matches!(
            self,
            Self::CheckIdentify(_)
                | Self::CheckSnmp
                | Self::CheckTholaServer
                | Self::CheckInterfaceMetrics(_)
                | Self::CheckCpu(_)
                | Self::CheckMemory(_)
                | Self::CheckUps(_)
                | Self::CheckSbc(_)
                | Self::CheckHardwareHealth
                | Self::CheckHighAvailability(_)
                | Self::CheckDisk(_)
                | Self::CheckSiem(_)
                | Self::CheckServer(_)
                | Self::CheckMetrics(_)
        )
    }

    /// Kinds answered by the engine itself, without touching a device.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::CheckTholaServer)
    }

    /// Named threshold sets carried by this kind.
    pub fn thresholds(&self) -> Vec<(&'static str, &Thresholds)> {
        match self {
            Self::CheckCpu(c) => vec![("cpuLoad", &c.load), ("cpuTemperature", &c.temperature)],
            Self::CheckMemory(c) => vec![("memoryUsage", &c.usage)],
            Self::CheckUps(c) => vec![
                ("batteryCurrent", &c.battery_current),
                ("batteryTemperature", &c.battery_temperature),
                ("currentLoad", &c.current_load),
                ("rectifierCurrent", &c.rectifier_current),
                ("systemVoltage", &c.system_voltage),
            ],
            Self::CheckSbc(c) => vec![("systemHealthScore", &c.system_health_score)],
            Self::CheckHighAvailability(c) => vec![("nodes", &c.nodes)],
            Self::CheckDisk(c) => vec![("free", &c.free)],
            Self::CheckSiem(c) => vec![
                ("systemCpuLoad", &c.cpu_load),
                ("systemMemoryUsage", &c.memory_usage),
                ("queueLength", &c.queue_length),
            ],
            Self::CheckServer(c) => vec![("procs", &c.procs), ("users", &c.users)],
            Self::CheckMetrics(c) => vec![("cpuLoad", &c.cpu_load), ("memoryUsage", &c.memory_usage)],
            _ => Vec::new(),
        }
    }

    pub fn interface_options(&self) -> Option<&InterfaceOptions> {
        match self {
            Self::ReadInterfaces(options) => Some(options),
            Self::CheckInterfaceMetrics(check) => Some(&check.interfaces),
            Self::CheckMetrics(check) => Some(&check.interfaces),
            _ => None,
        }
    }
}

// ── Request options ─────────────────────────────────────────────────

/// Interface exclusion filters. Every filter drops the rows it matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterfaceOptions {
    #[serde(rename = "ifTypeFilter", skip_serializing_if = "Vec::is_empty")]
    pub if_type_filter: Vec<String>,
    #[serde(rename = "ifNameFilter", skip_serializing_if = "Vec::is_empty")]
    pub if_name_filter: Vec<String>,
    #[serde(rename = "ifDescrFilter", skip_serializing_if = "Vec::is_empty")]
    pub if_descr_filter: Vec<String>,
}

impl InterfaceOptions {
    pub fn is_empty(&self) -> bool {
        self.if_type_filter.is_empty()
            && self.if_name_filter.is_empty()
            && self.if_descr_filter.is_empty()
    }

    /// Row filters for the interface table. Name and description filters
    /// are unanchored regexes.
    pub fn row_filters(&self) -> Result<Vec<RowFilter>, CoreError> {
        let mut filters = Vec::new();
        if !self.if_type_filter.is_empty() {
            filters.push(RowFilter::ValueDrop {
                attribute: "if_type".into(),
                matcher: Matcher::one_of(self.if_type_filter.clone()),
            });
        }
        for (attribute, field, patterns) in [
            ("if_name", "ifNameFilter", &self.if_name_filter),
            ("if_descr", "ifDescrFilter", &self.if_descr_filter),
        ] {
            for pattern in patterns {
                let matcher = Matcher::regex(pattern, false, true)
                    .map_err(|e| CoreError::validation(field, e.to_string()))?;
                filters.push(RowFilter::ValueDrop {
                    attribute: attribute.into(),
                    matcher,
                });
            }
        }
        Ok(filters)
    }
}

/// Expected identify properties; every set field must match exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentifyExpectations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_series: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    /// Report a differing OS version as WARNING instead of CRITICAL.
    pub os_diff_warning: bool,
    /// Report a differing serial number as WARNING instead of CRITICAL.
    pub serial_number_diff_warning: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterfaceMetricsCheck {
    #[serde(flatten)]
    pub interfaces: InterfaceOptions,
    /// Append the filtered interfaces as JSON to the plugin output.
    pub print_interfaces: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CpuCheck {
    pub load: Thresholds,
    pub temperature: Thresholds,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryCheck {
    pub usage: Thresholds,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpsCheck {
    pub battery_current: Thresholds,
    pub battery_temperature: Thresholds,
    pub current_load: Thresholds,
    pub rectifier_current: Thresholds,
    pub system_voltage: Thresholds,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SbcCheck {
    pub system_health_score: Thresholds,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HighAvailabilityCheck {
    /// Expected role, e.g. `master`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub nodes: Thresholds,
}

/// Thresholds apply to the free space of each storage in percent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiskCheck {
    pub free: Thresholds,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiemCheck {
    pub cpu_load: Thresholds,
    pub memory_usage: Thresholds,
    pub queue_length: Thresholds,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerCheck {
    pub procs: Thresholds,
    pub users: Thresholds,
}

/// CPU, memory and interface counters in one run; components the class
/// lacks are skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricsCheck {
    pub cpu_load: Thresholds,
    pub memory_usage: Thresholds,
    #[serde(flatten)]
    pub interfaces: InterfaceOptions,
}

// ── Responses ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableComponentsResponse {
    pub available_components: Vec<Component>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountInterfacesResponse {
    pub interfaces: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfacesResponse {
    pub interfaces: Vec<Interface>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Identify(IdentifyResponse),
    AvailableComponents(AvailableComponentsResponse),
    CountInterfaces(CountInterfacesResponse),
    Interfaces(InterfacesResponse),
    Cpu(CpuComponent),
    Memory(MemoryComponent),
    Ups(UpsComponent),
    Sbc(SbcComponent),
    HardwareHealth(HardwareHealthComponent),
    HighAvailability(HighAvailabilityComponent),
    Disk(DiskComponent),
    Siem(SiemComponent),
    Server(ServerComponent),
    Check(CheckResponse),
}

impl Response {
    /// Plugin exit code for checks, 0 for every other response.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Check(check) => check.exit_code,
            _ => 0,
        }
    }

    pub fn as_check(&self) -> Option<&CheckResponse> {
        match self {
            Self::Check(check) => Some(check),
            _ => None,
        }
    }
}
