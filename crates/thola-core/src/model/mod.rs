// ── Domain model ──
//
// Response shapes and persisted data: connection credentials, identify
// results and the typed component structs the communicator assembles.

pub mod components;
pub mod connection;
pub mod identify;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

pub use components::{
    CpuComponent, DiskComponent, DiskStorage, EthernetLikeCounters, HardwareHealthComponent,
    HardwareHealthState, HighAvailabilityComponent, Interface, MemoryComponent, RadioCounters,
    SbcAgent, SbcComponent, SbcRealm, ServerComponent, SiemComponent, UpsComponent,
};
pub use connection::{ConnectionData, HttpConnectionData, SnmpConnectionData, V3ConnectionData};
pub use identify::{IdentifyProperty, IdentifyResponse, Properties};

/// A logical feature area of a device.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Component {
    Interfaces,
    Cpu,
    Memory,
    Ups,
    Sbc,
    HardwareHealth,
    HighAvailability,
    Disk,
    Siem,
    Server,
}

/// Shape of a component's declarative readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentLayout {
    /// Scalar metrics read with a `Reader`.
    pub metrics: &'static [&'static str],
    /// Tables read with a `GroupReader`.
    pub tables: &'static [&'static str],
}

impl Component {
    /// Which metric and table keys a class may define for this component.
    pub fn layout(self) -> ComponentLayout {
        match self {
            Self::Interfaces => ComponentLayout {
                metrics: &[],
                tables: &["table"],
            },
            Self::Cpu => ComponentLayout {
                metrics: &[],
                tables: &["load", "temperature"],
            },
            Self::Memory => ComponentLayout {
                metrics: &["usage"],
                tables: &[],
            },
            Self::Ups => ComponentLayout {
                metrics: &[
                    "alarm_low_voltage_disconnect",
                    "battery_amperage",
                    "battery_capacity",
                    "battery_current",
                    "battery_remaining_time",
                    "battery_temperature",
                    "battery_voltage",
                    "current_load",
                    "mains_voltage_applied",
                    "rectifier_current",
                    "system_voltage",
                ],
                tables: &[],
            },
            Self::Sbc => ComponentLayout {
                metrics: &[
                    "global_call_per_second",
                    "global_concurrent_sessions",
                    "active_local_contacts",
                    "transcoding_capacity",
                    "license_capacity",
                    "system_redundancy",
                    "system_health_score",
                ],
                tables: &["agents", "realms"],
            },
            Self::HardwareHealth => ComponentLayout {
                metrics: &["environment_monitor_state"],
                tables: &["fans", "power_supply", "temperature", "voltage"],
            },
            Self::HighAvailability => ComponentLayout {
                metrics: &["role", "nodes"],
                tables: &[],
            },
            Self::Disk => ComponentLayout {
                metrics: &[],
                tables: &["storages"],
            },
            Self::Siem => ComponentLayout {
                metrics: &[
                    "last_recorded_messages_per_second",
                    "average_messages_per_second",
                    "last_processed_messages_per_second",
                    "system_version",
                    "cpu_load",
                    "memory_usage",
                    "queue_length",
                ],
                tables: &[],
            },
            Self::Server => ComponentLayout {
                metrics: &["procs", "users"],
                tables: &[],
            },
        }
    }
}

/// `snake_case` class-file key to the `camelCase` response field name.
pub(crate) fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
