// Per-request check handlers. Each runs the matching read through the
// communicator and turns the result into perf data and status updates.

use crate::communicator::{Communicator, optional};
use crate::error::CoreError;
use crate::model::components::interface_labels;
use crate::model::{
    HardwareHealthState, IdentifyProperty, IdentifyResponse, Interface, SnmpConnectionData,
};
use crate::request::types::{
    CpuCheck, DiskCheck, HighAvailabilityCheck, IdentifyExpectations, InterfaceMetricsCheck,
    MemoryCheck, MetricsCheck, SbcCheck, ServerCheck, SiemCheck, UpsCheck,
};
use crate::stats::StatisticsSnapshot;
use crate::value::Value;

use super::{CheckPlugin, CheckResponse, FailedExpectation, PerfDataPoint, Status, Thresholds};

fn metric<T: Into<Value>>(
    plugin: &mut CheckPlugin,
    label: &str,
    value: Option<T>,
    unit: &str,
    thresholds: Option<&Thresholds>,
) {
    if let Some(value) = value {
        plugin.add_metric(PerfDataPoint::new(label, value).unit(unit), thresholds);
    }
}

/// `metric` for a single instance, `metric_<n>` (1-based) when there are several.
fn instance_label(metric: &str, index: usize, count: usize) -> String {
    if count == 1 {
        metric.to_owned()
    } else {
        format!("{metric}_{}", index + 1)
    }
}

/// Absent data and disabled components are skipped in multi-component checks.
fn skip_unavailable<T>(result: Result<T, CoreError>) -> Result<Option<T>, CoreError> {
    match result {
        Err(e) if e.is_component_not_found() => Ok(None),
        other => optional(other),
    }
}

// ── Identify / SNMP / engine ────────────────────────────────────────

pub fn check_identify(identified: &IdentifyResponse, expect: &IdentifyExpectations) -> CheckPlugin {
    let mut plugin = CheckPlugin::new();

    if let Some(class) = &expect.class {
        if *class != identified.class {
            plugin.fail_expectation(
                Status::Critical,
                FailedExpectation {
                    field: "class".into(),
                    expected: class.clone(),
                    got: Some(identified.class.clone()),
                },
            );
        }
    }

    let expectations = [
        (IdentifyProperty::Vendor, &expect.vendor, Status::Critical),
        (IdentifyProperty::Model, &expect.model, Status::Critical),
        (IdentifyProperty::ModelSeries, &expect.model_series, Status::Critical),
        (
            IdentifyProperty::SerialNumber,
            &expect.serial_number,
            if expect.serial_number_diff_warning {
                Status::Warning
            } else {
                Status::Critical
            },
        ),
        (
            IdentifyProperty::OsVersion,
            &expect.os_version,
            if expect.os_diff_warning {
                Status::Warning
            } else {
                Status::Critical
            },
        ),
    ];
    for (property, expected, status) in expectations {
        let Some(expected) = expected else {
            continue;
        };
        let got = identified.properties.get(property);
        if got != Some(expected.as_str()) {
            plugin.fail_expectation(
                status,
                FailedExpectation {
                    field: crate::model::camel_case(&property.to_string()),
                    expected: expected.clone(),
                    got: got.map(str::to_owned),
                },
            );
        }
    }

    if plugin.status() == Status::Ok {
        plugin.update(Status::Ok, format!("device matches class '{}'", identified.class));
    }
    plugin
}

/// `credentials` are the SNMP settings that answered, if any did.
pub fn check_snmp(credentials: Option<SnmpConnectionData>) -> CheckResponse {
    let mut plugin = CheckPlugin::new();
    match &credentials {
        Some(data) => plugin.update(
            Status::Ok,
            format!(
                "SNMP connection established (version {})",
                data.versions.first().map_or("?", String::as_str)
            ),
        ),
        None => plugin.update(Status::Critical, "no working SNMP credentials"),
    }
    let mut response = plugin.finish();
    response.successful_snmp_credentials = credentials;
    response
}

pub fn check_thola_server(stats: &StatisticsSnapshot) -> CheckPlugin {
    let mut plugin = CheckPlugin::new();
    plugin.add_perf(PerfDataPoint::new("uptime", stats.uptime_secs).unit("s"));
    plugin.add_perf(PerfDataPoint::new("successful_requests", stats.successful).unit("c"));
    plugin.add_perf(PerfDataPoint::new("failed_requests", stats.failed).unit("c"));
    plugin.add_perf(PerfDataPoint::new("total_requests", stats.total_requests).unit("c"));
    plugin.add_perf(
        PerfDataPoint::new("average_response_time", stats.average_response_time_ms).unit("ms"),
    );
    plugin
}

// ── Interfaces ──────────────────────────────────────────────────────

fn oper_status_code(status: &str) -> Option<u64> {
    let code = match status {
        "up" => 1,
        "down" => 2,
        "testing" => 3,
        "unknown" => 4,
        "dormant" => 5,
        "notPresent" => 6,
        "lowerLayerDown" => 7,
        _ => return None,
    };
    Some(code)
}

fn add_interface_metrics(plugin: &mut CheckPlugin, interfaces: &[Interface]) -> Result<(), CoreError> {
    let labels = interface_labels(interfaces)?;
    for (iface, label) in interfaces.iter().zip(&labels) {
        let mut counter = |name: &str, value: Option<u64>| {
            if let Some(value) = value {
                plugin.add_perf(PerfDataPoint::new(format!("{name}_{label}"), value).unit("c"));
            }
        };
        counter("error_counter_in", iface.if_in_errors);
        counter("error_counter_out", iface.if_out_errors);
        counter("packet_counter_discard_in", iface.if_in_discards);
        counter("packet_counter_discard_out", iface.if_out_discards);
        counter("traffic_counter_in", iface.if_hc_in_octets.or(iface.if_in_octets));
        counter("traffic_counter_out", iface.if_hc_out_octets.or(iface.if_out_octets));
        counter(
            "packet_counter_unicast_in",
            iface.if_hc_in_ucast_pkts.or(iface.if_in_ucast_pkts),
        );
        counter(
            "packet_counter_unicast_out",
            iface.if_hc_out_ucast_pkts.or(iface.if_out_ucast_pkts),
        );
        counter(
            "packet_counter_multicast_in",
            iface.if_hc_in_multicast_pkts.or(iface.if_in_multicast_pkts),
        );
        counter(
            "packet_counter_multicast_out",
            iface.if_hc_out_multicast_pkts.or(iface.if_out_multicast_pkts),
        );
        counter(
            "packet_counter_broadcast_in",
            iface.if_hc_in_broadcast_pkts.or(iface.if_in_broadcast_pkts),
        );
        counter(
            "packet_counter_broadcast_out",
            iface.if_hc_out_broadcast_pkts.or(iface.if_out_broadcast_pkts),
        );
        if let Some(ether) = &iface.ethernet_like {
            counter("error_counter_fcs", ether.dot3_stats_fcs_errors);
            counter("error_counter_alignment", ether.dot3_stats_alignment_errors);
            counter("error_counter_late_collisions", ether.dot3_stats_late_collisions);
            counter("error_counter_symbol", ether.dot3_stats_symbol_errors);
        }

        if let Some(speed) = iface.if_speed {
            plugin.add_perf(PerfDataPoint::new(format!("interface_speed_{label}"), speed));
        }
        if let Some(code) = iface.if_oper_status.as_deref().and_then(oper_status_code) {
            plugin.add_perf(PerfDataPoint::new(format!("interface_oper_status_{label}"), code));
        }
        if let Some(radio) = &iface.radio {
            if let Some(level) = radio.level_in {
                plugin.add_perf(PerfDataPoint::new(format!("rx_level_{label}"), level));
            }
            if let Some(level) = radio.level_out {
                plugin.add_perf(PerfDataPoint::new(format!("tx_level_{label}"), level));
            }
            if let Some(rate) = radio.max_bitrate_in {
                plugin.add_perf(PerfDataPoint::new(format!("maxbitrate_in_{label}"), rate));
            }
            if let Some(rate) = radio.max_bitrate_out {
                plugin.add_perf(PerfDataPoint::new(format!("maxbitrate_out_{label}"), rate));
            }
        }
    }
    Ok(())
}

pub async fn check_interface_metrics(
    comm: &Communicator<'_>,
    check: &InterfaceMetricsCheck,
) -> Result<CheckPlugin, CoreError> {
    let interfaces = comm.interfaces(&check.interfaces.row_filters()?).await?;
    let mut plugin = CheckPlugin::new();
    add_interface_metrics(&mut plugin, &interfaces)?;
    plugin.update(Status::Ok, format!("checked {} interfaces", interfaces.len()));
    if check.print_interfaces {
        plugin.append_output(serde_json::to_string(&interfaces)?);
    }
    Ok(plugin)
}

// ── Single components ───────────────────────────────────────────────

pub async fn check_cpu(comm: &Communicator<'_>, check: &CpuCheck) -> Result<CheckPlugin, CoreError> {
    let cpu = comm.cpu_component().await?;
    let mut plugin = CheckPlugin::new();
    for (i, load) in cpu.load.iter().enumerate() {
        let label = instance_label("cpu_load", i, cpu.load.len());
        metric(&mut plugin, &label, Some(*load), "%", Some(&check.load));
    }
    for (i, temperature) in cpu.temperature.iter().enumerate() {
        let label = instance_label("cpu_temperature", i, cpu.temperature.len());
        metric(&mut plugin, &label, Some(*temperature), "", Some(&check.temperature));
    }
    Ok(plugin)
}

pub async fn check_memory(
    comm: &Communicator<'_>,
    check: &MemoryCheck,
) -> Result<CheckPlugin, CoreError> {
    let usage = comm.memory_usage().await?;
    let mut plugin = CheckPlugin::new();
    metric(&mut plugin, "memory_usage", Some(usage), "%", Some(&check.usage));
    Ok(plugin)
}

pub async fn check_server(
    comm: &Communicator<'_>,
    check: &ServerCheck,
) -> Result<CheckPlugin, CoreError> {
    let server = comm.server_component().await?;
    let mut plugin = CheckPlugin::new();
    metric(&mut plugin, "procs", server.procs, "", Some(&check.procs));
    metric(&mut plugin, "users", server.users, "", Some(&check.users));
    Ok(plugin)
}

pub async fn check_ups(comm: &Communicator<'_>, check: &UpsCheck) -> Result<CheckPlugin, CoreError> {
    let ups = comm.ups_component().await?;
    let mut plugin = CheckPlugin::new();

    if let Some(alarm) = ups.alarm_low_voltage_disconnect {
        plugin.add_perf(PerfDataPoint::new("alarm_low_voltage_disconnect", alarm));
        if alarm != 0 {
            plugin.update(Status::Critical, "low voltage disconnect alarm is raised");
        }
    }
    if let Some(applied) = ups.mains_voltage_applied {
        plugin.add_perf(PerfDataPoint::new("mains_voltage_applied", u64::from(applied)));
        if !applied {
            plugin.update(Status::Critical, "mains voltage is not applied");
        }
    }
    metric(&mut plugin, "batt_amperage", ups.battery_amperage, "", None);
    metric(&mut plugin, "batt_capacity", ups.battery_capacity, "%", None);
    metric(
        &mut plugin,
        "batt_current",
        ups.battery_current,
        "",
        Some(&check.battery_current),
    );
    metric(&mut plugin, "batt_remaining_time", ups.battery_remaining_time, "s", None);
    metric(
        &mut plugin,
        "batt_temperature",
        ups.battery_temperature,
        "",
        Some(&check.battery_temperature),
    );
    metric(&mut plugin, "batt_voltage", ups.battery_voltage, "", None);
    metric(&mut plugin, "current_load", ups.current_load, "%", Some(&check.current_load));
    metric(
        &mut plugin,
        "rectifier_current",
        ups.rectifier_current,
        "",
        Some(&check.rectifier_current),
    );
    metric(
        &mut plugin,
        "system_voltage",
        ups.system_voltage,
        "",
        Some(&check.system_voltage),
    );
    Ok(plugin)
}

pub async fn check_sbc(comm: &Communicator<'_>, check: &SbcCheck) -> Result<CheckPlugin, CoreError> {
    let sbc = comm.sbc_component().await?;
    let mut plugin = CheckPlugin::new();

    metric(&mut plugin, "global_call_per_second", sbc.global_call_per_second, "", None);
    metric(
        &mut plugin,
        "global_concurrent_sessions",
        sbc.global_concurrent_sessions,
        "",
        None,
    );
    metric(&mut plugin, "active_local_contacts", sbc.active_local_contacts, "", None);
    metric(&mut plugin, "transcoding_capacity", sbc.transcoding_capacity, "%", None);
    metric(&mut plugin, "license_capacity", sbc.license_capacity, "%", None);
    metric(&mut plugin, "system_redundancy", sbc.system_redundancy, "", None);
    metric(
        &mut plugin,
        "system_health_score",
        sbc.system_health_score,
        "%",
        Some(&check.system_health_score),
    );

    for (i, agent) in sbc.agents.iter().enumerate() {
        let name = agent.hostname.clone().unwrap_or_else(|| (i + 1).to_string());
        metric(
            &mut plugin,
            &format!("agent_active_sessions_inbound_{name}"),
            agent.current_active_sessions_inbound,
            "",
            None,
        );
        metric(
            &mut plugin,
            &format!("agent_active_sessions_outbound_{name}"),
            agent.current_active_sessions_outbound,
            "",
            None,
        );
        metric(&mut plugin, &format!("agent_period_asr_{name}"), agent.period_asr, "", None);
        metric(&mut plugin, &format!("agent_status_{name}"), agent.status, "", None);
    }
    for (i, realm) in sbc.realms.iter().enumerate() {
        let name = realm.name.clone().unwrap_or_else(|| (i + 1).to_string());
        metric(
            &mut plugin,
            &format!("realm_active_sessions_inbound_{name}"),
            realm.current_active_sessions_inbound,
            "",
            None,
        );
        metric(
            &mut plugin,
            &format!("realm_active_sessions_outbound_{name}"),
            realm.current_active_sessions_outbound,
            "",
            None,
        );
        metric(&mut plugin, &format!("realm_period_asr_{name}"), realm.period_asr, "", None);
        metric(&mut plugin, &format!("realm_status_{name}"), realm.status, "", None);
    }
    Ok(plugin)
}

/// CISCO-ENVMON-MIB state order.
fn state_code(state: &str) -> Option<u64> {
    let code = match state {
        "normal" => 1,
        "warning" => 2,
        "critical" => 3,
        "shutdown" => 4,
        "notPresent" => 5,
        "notFunctioning" => 6,
        _ => return None,
    };
    Some(code)
}

fn state_status(state: &str) -> Status {
    match state {
        "normal" | "notPresent" => Status::Ok,
        "warning" => Status::Warning,
        "critical" | "shutdown" | "notFunctioning" => Status::Critical,
        _ => Status::Unknown,
    }
}

fn add_sensor_states(plugin: &mut CheckPlugin, kind: &str, sensors: &[HardwareHealthState]) {
    for (i, sensor) in sensors.iter().enumerate() {
        let name = sensor.description.clone().unwrap_or_else(|| (i + 1).to_string());
        if let Some(state) = &sensor.state {
            if let Some(code) = state_code(state) {
                plugin.add_perf(PerfDataPoint::new(format!("{kind}_state_{name}"), code));
            }
            let status = state_status(state);
            if status != Status::Ok {
                plugin.update(status, format!("{kind} '{name}' is in state {state}"));
            }
        }
        if let Some(value) = sensor.value {
            plugin.add_perf(PerfDataPoint::new(format!("{kind}_{name}"), value));
        }
    }
}

pub async fn check_hardware_health(comm: &Communicator<'_>) -> Result<CheckPlugin, CoreError> {
    let health = comm.hardware_health_component().await?;
    let mut plugin = CheckPlugin::new();
    if let Some(state) = &health.environment_monitor_state {
        if let Some(code) = state_code(state) {
            plugin.add_perf(PerfDataPoint::new("environment_monitor_state", code));
        }
        let status = state_status(state);
        if status != Status::Ok {
            plugin.update(status, format!("environment monitor is in state {state}"));
        }
    }
    add_sensor_states(&mut plugin, "fan", &health.fans);
    add_sensor_states(&mut plugin, "power_supply", &health.power_supply);
    add_sensor_states(&mut plugin, "temperature", &health.temperature);
    add_sensor_states(&mut plugin, "voltage", &health.voltage);
    Ok(plugin)
}

pub async fn check_high_availability(
    comm: &Communicator<'_>,
    check: &HighAvailabilityCheck,
) -> Result<CheckPlugin, CoreError> {
    let ha = comm.high_availability_component().await?;
    let mut plugin = CheckPlugin::new();
    if let Some(expected) = &check.role {
        if ha.role.as_deref() != Some(expected.as_str()) {
            plugin.fail_expectation(
                Status::Critical,
                FailedExpectation {
                    field: "role".into(),
                    expected: expected.clone(),
                    got: ha.role.clone(),
                },
            );
        }
    }
    metric(&mut plugin, "nodes", ha.nodes, "", Some(&check.nodes));
    Ok(plugin)
}

pub async fn check_disk(comm: &Communicator<'_>, check: &DiskCheck) -> Result<CheckPlugin, CoreError> {
    let storages = comm.disk_storages().await?;
    let mut plugin = CheckPlugin::new();
    for (i, storage) in storages.iter().enumerate() {
        let name = storage
            .description
            .clone()
            .or_else(|| storage.storage_type.clone())
            .unwrap_or_else(|| (i + 1).to_string());
        let free = storage.free_percent().map(|f| (f * 100.0).round() / 100.0);
        metric(&mut plugin, &format!("disk_free_{name}"), free, "%", Some(&check.free));
    }
    Ok(plugin)
}

pub async fn check_siem(comm: &Communicator<'_>, check: &SiemCheck) -> Result<CheckPlugin, CoreError> {
    let siem = comm.siem_component().await?;
    let mut plugin = CheckPlugin::new();
    metric(
        &mut plugin,
        "last_recorded_messages_per_second",
        siem.last_recorded_messages_per_second,
        "",
        None,
    );
    metric(
        &mut plugin,
        "average_messages_per_second",
        siem.average_messages_per_second,
        "",
        None,
    );
    metric(
        &mut plugin,
        "last_processed_messages_per_second",
        siem.last_processed_messages_per_second,
        "",
        None,
    );
    metric(&mut plugin, "system_cpu_load", siem.cpu_load, "%", Some(&check.cpu_load));
    metric(
        &mut plugin,
        "system_memory_usage",
        siem.memory_usage,
        "%",
        Some(&check.memory_usage),
    );
    metric(&mut plugin, "queue_length", siem.queue_length, "", Some(&check.queue_length));
    if let Some(version) = &siem.system_version {
        plugin.append_output(format!("system version: {version}"));
    }
    Ok(plugin)
}

// ── Multi-component ─────────────────────────────────────────────────

pub async fn check_metrics(
    comm: &Communicator<'_>,
    check: &MetricsCheck,
) -> Result<CheckPlugin, CoreError> {
    let mut plugin = CheckPlugin::new();

    if let Some(interfaces) = skip_unavailable(comm.interfaces(&check.interfaces.row_filters()?).await)? {
        add_interface_metrics(&mut plugin, &interfaces)?;
    }
    if let Some(cpu) = skip_unavailable(comm.cpu_load().await)? {
        for (i, load) in cpu.iter().enumerate() {
            let label = instance_label("cpu_load", i, cpu.len());
            metric(&mut plugin, &label, Some(*load), "%", Some(&check.cpu_load));
        }
    }
    if let Some(usage) = skip_unavailable(comm.memory_usage().await)? {
        metric(&mut plugin, "memory_usage", Some(usage), "%", Some(&check.memory_usage));
    }
    Ok(plugin)
}
