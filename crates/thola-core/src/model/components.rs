// ── Component response types ──
//
// Every field is optional: the communicator fills in what the device
// answered and leaves the rest out of the serialised response.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// `ifSpeed` saturates at this value; `ifHighSpeed` (Mbit/s) then holds the real speed.
pub const IF_SPEED_SATURATED: u64 = 4_294_967_295;

// ── Interfaces ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(clippy::struct_field_names)]
pub struct Interface {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_index: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_descr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_mtu: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_speed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_phys_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_admin_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_oper_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_last_change: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_in_octets: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_in_ucast_pkts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_in_nucast_pkts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_in_discards: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_in_errors: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_in_unknown_protos: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_out_octets: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_out_ucast_pkts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_out_nucast_pkts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_out_discards: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_out_errors: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_out_qlen: Option<u64>,

    // ifXTable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_in_multicast_pkts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_in_broadcast_pkts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_out_multicast_pkts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_out_broadcast_pkts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_hc_in_octets: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_hc_in_ucast_pkts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_hc_in_multicast_pkts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_hc_in_broadcast_pkts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_hc_out_octets: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_hc_out_ucast_pkts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_hc_out_multicast_pkts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_hc_out_broadcast_pkts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_high_speed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_alias: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ethernet_like: Option<EthernetLikeCounters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radio: Option<RadioCounters>,
}

/// EtherLike-MIB `dot3StatsTable` counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EthernetLikeCounters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dot3_stats_alignment_errors: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dot3_stats_fcs_errors: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dot3_stats_single_collision_frames: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dot3_stats_multiple_collision_frames: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dot3_stats_deferred_transmissions: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dot3_stats_late_collisions: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dot3_stats_excessive_collisions: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dot3_stats_internal_mac_transmit_errors: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dot3_stats_carrier_sense_errors: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dot3_stats_frame_too_longs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dot3_stats_internal_mac_receive_errors: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dot3_stats_symbol_errors: Option<u64>,
}

/// Microwave radio levels (dBm) and capacities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RadioCounters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_in: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_out: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bitrate_in: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bitrate_out: Option<u64>,
}

impl Interface {
    /// Replace a saturated `ifSpeed` with `ifHighSpeed` converted to bit/s.
    pub fn normalize_speed(&mut self) {
        if self.if_speed == Some(IF_SPEED_SATURATED) {
            if let Some(high) = self.if_high_speed {
                self.if_speed = Some(high.saturating_mul(1_000_000));
            }
        }
    }

    /// Base label: `ifDescr`, then `ifName`, then the index.
    pub fn base_label(&self) -> Option<String> {
        self.if_descr
            .clone()
            .filter(|d| !d.is_empty())
            .or_else(|| self.if_name.clone().filter(|n| !n.is_empty()))
            .or_else(|| self.if_index.map(|i| i.to_string()))
    }
}

/// Labels for a set of interfaces, disambiguating duplicates with `_<ifIndex>`.
///
/// Fails when an interface has neither a textual label nor an index.
pub fn interface_labels(interfaces: &[Interface]) -> Result<Vec<String>, CoreError> {
    let bases = interfaces
        .iter()
        .map(|iface| {
            iface
                .base_label()
                .ok_or_else(|| CoreError::decode("interface has neither a label nor an ifIndex"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut counts: HashMap<&str, usize> = HashMap::with_capacity(bases.len());
    for base in &bases {
        *counts.entry(base.as_str()).or_default() += 1;
    }

    let mut labels = Vec::with_capacity(bases.len());
    for (iface, base) in interfaces.iter().zip(&bases) {
        if counts.get(base.as_str()).copied().unwrap_or_default() > 1 {
            let index = iface.if_index.ok_or_else(|| {
                CoreError::decode(format!("duplicate interface label '{base}' without ifIndex"))
            })?;
            labels.push(format!("{base}_{index}"));
        } else {
            labels.push(base.clone());
        }
    }
    Ok(labels)
}

// ── CPU / memory / server ───────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CpuComponent {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub load: Vec<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub temperature: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryComponent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerComponent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub procs: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<i64>,
}

// ── UPS ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpsComponent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alarm_low_voltage_disconnect: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_amperage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_capacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_current: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_remaining_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_voltage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_load: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mains_voltage_applied: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rectifier_current: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_voltage: Option<f64>,
}

// ── SBC ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SbcComponent {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<SbcAgent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub realms: Vec<SbcRealm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_call_per_second: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_concurrent_sessions: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_local_contacts: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcoding_capacity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_capacity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_redundancy: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_health_score: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SbcAgent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_active_sessions_inbound: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_session_rate_inbound: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_active_sessions_outbound: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_session_rate_outbound: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_asr: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SbcRealm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_active_sessions_inbound: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_session_rate_inbound: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_active_sessions_outbound: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_session_rate_outbound: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_asr: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_local_contacts: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
}

// ── Hardware health ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HardwareHealthComponent {
    /// `normal`, `warning`, `critical`, `shutdown`, `notPresent`, `notFunctioning` or `unknown`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_monitor_state: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fans: Vec<HardwareHealthState>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub power_supply: Vec<HardwareHealthState>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub temperature: Vec<HardwareHealthState>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub voltage: Vec<HardwareHealthState>,
}

/// One sensor or unit. `value` is set for temperature and voltage sensors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HardwareHealthState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

// ── High availability / disk / SIEM ─────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HighAvailabilityComponent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiskComponent {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub storages: Vec<DiskStorage>,
}

/// One storage area. `available` and `used` are in bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiskStorage {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used: Option<u64>,
}

impl DiskStorage {
    /// Free space in percent of the total, when both sizes are known.
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn free_percent(&self) -> Option<f64> {
        let (available, used) = (self.available?, self.used?);
        let total = available.checked_add(used)?;
        if total == 0 {
            return None;
        }
        Some(available as f64 / total as f64 * 100.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiemComponent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_recorded_messages_per_second: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_messages_per_second: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_processed_messages_per_second: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_load: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_length: Option<i64>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn iface(index: u64, descr: Option<&str>, name: Option<&str>) -> Interface {
        Interface {
            if_index: Some(index),
            if_descr: descr.map(str::to_owned),
            if_name: name.map(str::to_owned),
            ..Interface::default()
        }
    }

    #[test]
    fn saturated_speed_uses_high_speed() {
        let mut fast = Interface {
            if_speed: Some(IF_SPEED_SATURATED),
            if_high_speed: Some(10_000),
            ..Interface::default()
        };
        fast.normalize_speed();
        assert_eq!(fast.if_speed, Some(10_000_000_000));

        let mut unknown = Interface {
            if_speed: Some(IF_SPEED_SATURATED),
            ..Interface::default()
        };
        unknown.normalize_speed();
        assert_eq!(unknown.if_speed, Some(IF_SPEED_SATURATED));
    }

    #[test]
    fn duplicate_labels_get_the_index() {
        let interfaces = [
            iface(1, Some("Gi0/1"), None),
            iface(2, Some("uplink"), None),
            iface(3, Some("uplink"), None),
            iface(4, None, Some("lo")),
            iface(5, None, None),
        ];
        assert_eq!(
            interface_labels(&interfaces).unwrap(),
            ["Gi0/1", "uplink_2", "uplink_3", "lo", "5"]
        );
    }

    #[test]
    fn labels_scale_to_large_chassis() {
        let interfaces: Vec<Interface> = (1..=20_000)
            .map(|i| iface(i, Some(if i % 2 == 0 { "uplink" } else { "access" }), None))
            .collect();
        let labels = interface_labels(&interfaces).unwrap();
        assert_eq!(labels.len(), 20_000);
        assert_eq!(labels[0], "access_1");
        assert_eq!(labels[19_999], "uplink_20000");
    }

    #[test]
    fn unlabelled_interface_is_an_error() {
        let interfaces = [Interface::default()];
        assert!(interface_labels(&interfaces).is_err());
    }

    #[test]
    fn nested_counters_deserialise() {
        let json = serde_json::json!({
            "ifIndex": 3,
            "ifHcInOctets": 12,
            "ethernetLike": { "dot3StatsFcsErrors": 2 }
        });
        let iface: Interface = serde_json::from_value(json).unwrap();
        assert_eq!(iface.if_hc_in_octets, Some(12));
        assert_eq!(iface.ethernet_like.unwrap().dot3_stats_fcs_errors, Some(2));
    }

    #[test]
    fn disk_free_percent() {
        let storage = DiskStorage {
            available: Some(25),
            used: Some(75),
            ..DiskStorage::default()
        };
        assert_eq!(storage.free_percent(), Some(25.0));
        assert_eq!(DiskStorage::default().free_percent(), None);
    }
}
