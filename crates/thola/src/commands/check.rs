use thola_core::RequestKind;
use thola_core::request::types::{
    CpuCheck, DiskCheck, HighAvailabilityCheck, IdentifyExpectations, InterfaceMetricsCheck,
    MemoryCheck, MetricsCheck, SbcCheck, ServerCheck, SiemCheck, UpsCheck,
};

use crate::cli::{CheckCommand, thresholds};

use super::interface_options;

/// Target address and request kind of a `check` subcommand. The address
/// is empty for checks that never touch a device.
pub fn request(command: CheckCommand) -> (String, RequestKind) {
    match command {
        CheckCommand::Identify(args) => (
            args.host.host,
            RequestKind::CheckIdentify(IdentifyExpectations {
                class: args.class,
                vendor: args.vendor,
                model: args.model,
                model_series: args.model_series,
                serial_number: args.serial_number,
                os_version: args.os_version,
                os_diff_warning: args.os_diff_warning,
                serial_number_diff_warning: args.serial_number_diff_warning,
            }),
        ),
        CheckCommand::Snmp(args) => (args.host, RequestKind::CheckSnmp),
        CheckCommand::TholaServer => (String::new(), RequestKind::CheckTholaServer),
        CheckCommand::InterfaceMetrics(args) => (
            args.host.host,
            RequestKind::CheckInterfaceMetrics(InterfaceMetricsCheck {
                interfaces: interface_options(args.filters),
                print_interfaces: args.print_interfaces,
            }),
        ),
        CheckCommand::Cpu(args) => (
            args.host.host,
            RequestKind::CheckCpu(CpuCheck {
                load: thresholds(args.load_warning, args.load_critical),
                temperature: thresholds(args.temperature_warning, args.temperature_critical),
            }),
        ),
        CheckCommand::Memory(args) => (
            args.host.host,
            RequestKind::CheckMemory(MemoryCheck {
                usage: thresholds(args.warning, args.critical),
            }),
        ),
        CheckCommand::Ups(args) => (
            args.host.host,
            RequestKind::CheckUps(UpsCheck {
                battery_current: thresholds(args.battery_current_warning, args.battery_current_critical),
                battery_temperature: thresholds(
                    args.battery_temperature_warning,
                    args.battery_temperature_critical,
                ),
                current_load: thresholds(args.current_load_warning, args.current_load_critical),
                rectifier_current: thresholds(
                    args.rectifier_current_warning,
                    args.rectifier_current_critical,
                ),
                system_voltage: thresholds(args.system_voltage_warning, args.system_voltage_critical),
            }),
        ),
        CheckCommand::Sbc(args) => (
            args.host.host,
            RequestKind::CheckSbc(SbcCheck {
                system_health_score: thresholds(args.warning, args.critical),
            }),
        ),
        CheckCommand::HardwareHealth(args) => (args.host, RequestKind::CheckHardwareHealth),
        CheckCommand::HighAvailability(args) => (
            args.host.host,
            RequestKind::CheckHighAvailability(HighAvailabilityCheck {
                role: args.role,
                nodes: thresholds(args.nodes_warning, args.nodes_critical),
            }),
        ),
        CheckCommand::Disk(args) => (
            args.host.host,
            RequestKind::CheckDisk(DiskCheck {
                free: thresholds(args.warning, args.critical),
            }),
        ),
        CheckCommand::Siem(args) => (
            args.host.host,
            RequestKind::CheckSiem(SiemCheck {
                cpu_load: thresholds(args.cpu_load_warning, args.cpu_load_critical),
                memory_usage: thresholds(args.memory_usage_warning, args.memory_usage_critical),
                queue_length: thresholds(args.queue_length_warning, args.queue_length_critical),
            }),
        ),
        CheckCommand::Server(args) => (
            args.host.host,
            RequestKind::CheckServer(ServerCheck {
                procs: thresholds(args.procs_warning, args.procs_critical),
                users: thresholds(args.users_warning, args.users_critical),
            }),
        ),
        CheckCommand::Metrics(args) => (
            args.host.host,
            RequestKind::CheckMetrics(MetricsCheck {
                cpu_load: thresholds(args.cpu_load_warning, args.cpu_load_critical),
                memory_usage: thresholds(args.memory_usage_warning, args.memory_usage_critical),
                interfaces: interface_options(args.filters),
            }),
        ),
    }
}
