//! Clap derive structures for the `thola` CLI.
//!
//! Defines the command tree, global flags and the threshold range syntax.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand, ValueEnum};

use thola_core::Thresholds;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// thola -- identify, read and check network devices over SNMP and HTTP
#[derive(Debug, Parser)]
#[command(
    name = "thola",
    version,
    about = "Identify, read and monitor network devices",
    long_about = "Identifies network devices by matching them against a tree of device \
        classes, reads their components over SNMP and HTTP, and runs \
        monitoring-plugin style checks against them.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Alternative config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format (overrides api.format)
    #[arg(long, short = 'o', global = true)]
    pub format: Option<OutputFormat>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Request deadline in seconds (overrides api.timeout)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Do not read cached credentials or device classes
    #[arg(long, global = true)]
    pub ignore_cache: bool,

    #[command(flatten)]
    pub connection: ConnectionOpts,
}

/// Credentials tried before the configured ones.
#[derive(Debug, Default, Args)]
#[command(next_help_heading = "Connection")]
pub struct ConnectionOpts {
    /// SNMP community (repeatable)
    #[arg(long = "community", global = true, value_name = "COMMUNITY")]
    pub communities: Vec<String>,

    /// SNMP version: 1, 2c or 3 (repeatable)
    #[arg(long = "snmp-version", global = true, value_name = "VERSION")]
    pub versions: Vec<String>,

    /// SNMP port (repeatable)
    #[arg(long = "snmp-port", global = true, value_name = "PORT")]
    pub ports: Vec<u16>,

    /// Seconds to wait for each SNMP probe attempt
    #[arg(long, global = true, value_name = "SECONDS")]
    pub discover_timeout: Option<u64>,

    /// Concurrent SNMP probes
    #[arg(long, global = true, value_name = "N")]
    pub discover_parallel: Option<usize>,

    /// Retries per SNMP probe
    #[arg(long, global = true, value_name = "N")]
    pub discover_retries: Option<u32>,

    /// SNMPv3 user
    #[arg(long, global = true)]
    pub v3_user: Option<String>,

    /// SNMPv3 security level: noAuthNoPriv, authNoPriv or authPriv
    #[arg(long, global = true)]
    pub v3_level: Option<String>,

    /// SNMPv3 authentication protocol
    #[arg(long, global = true)]
    pub v3_auth_proto: Option<String>,

    /// SNMPv3 authentication key
    #[arg(long, global = true, env = "THOLA_V3_AUTH_KEY", hide_env_values = true)]
    pub v3_auth_key: Option<String>,

    /// SNMPv3 privacy protocol
    #[arg(long, global = true)]
    pub v3_priv_proto: Option<String>,

    /// SNMPv3 privacy key
    #[arg(long, global = true, env = "THOLA_V3_PRIV_KEY", hide_env_values = true)]
    pub v3_priv_key: Option<String>,

    /// SNMPv3 context name
    #[arg(long, global = true)]
    pub v3_context: Option<String>,

    /// HTTP port (repeatable)
    #[arg(long = "http-port", global = true, value_name = "PORT")]
    pub http_ports: Vec<u16>,

    /// HTTPS port (repeatable)
    #[arg(long = "https-port", global = true, value_name = "PORT")]
    pub https_ports: Vec<u16>,

    /// HTTP basic-auth user
    #[arg(long, global = true)]
    pub http_username: Option<String>,

    /// HTTP basic-auth password
    #[arg(long, global = true, env = "THOLA_HTTP_PASSWORD", hide_env_values = true)]
    pub http_password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Tables for reads, plugin text for checks
    Pretty,
    /// Pretty-printed JSON
    Json,
}

impl From<thola_config::OutputFormat> for OutputFormat {
    fn from(format: thola_config::OutputFormat) -> Self {
        match format {
            thola_config::OutputFormat::Pretty => Self::Pretty,
            thola_config::OutputFormat::Json => Self::Json,
        }
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Identify a device's class, vendor, model and OS version
    #[command(alias = "id")]
    Identify(HostArgs),

    /// Read a component from a device
    #[command(subcommand)]
    Read(ReadCommand),

    /// Run a monitoring check against a device
    #[command(subcommand)]
    Check(CheckCommand),

    /// Inspect the effective configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct HostArgs {
    /// Device IP address
    pub host: String,
}

#[derive(Debug, Default, Args)]
pub struct InterfaceFilterArgs {
    /// Drop interfaces of this ifType, e.g. softwareLoopback (repeatable)
    #[arg(long = "ifType-filter", alias = "if-type-filter", value_name = "TYPE")]
    pub if_type: Vec<String>,

    /// Drop interfaces whose ifName matches this regex (repeatable)
    #[arg(long = "ifName-filter", alias = "if-name-filter", value_name = "REGEX")]
    pub if_name: Vec<String>,

    /// Drop interfaces whose ifDescr matches this regex (repeatable)
    #[arg(long = "ifDescr-filter", alias = "if-descr-filter", value_name = "REGEX")]
    pub if_descr: Vec<String>,
}

// ── Read ─────────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum ReadCommand {
    /// Components the device's class supports
    AvailableComponents(HostArgs),

    /// Number of interfaces
    CountInterfaces(HostArgs),

    /// Interface table with counters
    #[command(alias = "if")]
    Interfaces {
        #[command(flatten)]
        host: HostArgs,
        #[command(flatten)]
        filters: InterfaceFilterArgs,
    },

    /// CPU load and temperature
    Cpu(HostArgs),

    /// Memory usage
    Memory(HostArgs),

    /// UPS battery and mains state
    Ups(HostArgs),

    /// Session border controller statistics
    Sbc(HostArgs),

    /// Fans, power supplies, temperatures and voltages
    HardwareHealth(HostArgs),

    /// High-availability role and node count
    HighAvailability(HostArgs),

    /// Storage usage
    Disk(HostArgs),

    /// SIEM message rates and load
    Siem(HostArgs),

    /// Process and user counts
    Server(HostArgs),
}

// ── Check ────────────────────────────────────────────────────────────

/// A monitoring-plugin range: `MAX`, `MIN:`, `MIN:MAX` or `~:MAX`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug)]
pub struct RangeError(String);

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for RangeError {}

impl FromStr for Range {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bound = |raw: &str| -> Result<Option<f64>, RangeError> {
            match raw.trim() {
                "" | "~" => Ok(None),
                n => n
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(Some)
                    .ok_or_else(|| RangeError(format!("'{n}' is not a number"))),
            }
        };
        let range = match s.split_once(':') {
            Some((min, max)) => Self {
                min: bound(min)?,
                max: bound(max)?,
            },
            None => Self {
                min: None,
                max: bound(s)?,
            },
        };
        if range.min.is_none() && range.max.is_none() {
            return Err(RangeError(format!("'{s}' sets no bound")));
        }
        if let (Some(min), Some(max)) = (range.min, range.max) {
            if min > max {
                return Err(RangeError(format!("{min} is above {max}")));
            }
        }
        Ok(range)
    }
}

pub fn thresholds(warning: Option<Range>, critical: Option<Range>) -> Thresholds {
    Thresholds {
        warn_min: warning.and_then(|r| r.min),
        warn_max: warning.and_then(|r| r.max),
        crit_min: critical.and_then(|r| r.min),
        crit_max: critical.and_then(|r| r.max),
    }
}

#[derive(Debug, Subcommand)]
pub enum CheckCommand {
    /// Compare the identified properties with expected values
    Identify(CheckIdentifyArgs),

    /// Report which SNMP credentials work
    Snmp(HostArgs),

    /// Statistics of this thola process
    TholaServer,

    /// Interface counters as performance data
    InterfaceMetrics(InterfaceMetricsArgs),

    /// CPU load and temperature
    Cpu(CpuArgs),

    /// Memory usage in percent
    Memory(SingleThresholdArgs),

    /// UPS battery, load and mains state
    Ups(UpsArgs),

    /// Session border controller health
    Sbc(SingleThresholdArgs),

    /// Hardware sensor states
    HardwareHealth(HostArgs),

    /// High-availability role and node count
    HighAvailability(HighAvailabilityArgs),

    /// Free space per storage in percent
    Disk(SingleThresholdArgs),

    /// SIEM load and queue length
    Siem(SiemArgs),

    /// Process and user counts
    Server(ServerArgs),

    /// CPU, memory and interface metrics in one run
    Metrics(MetricsArgs),
}

#[derive(Debug, Args)]
pub struct CheckIdentifyArgs {
    #[command(flatten)]
    pub host: HostArgs,

    /// Expected device class
    #[arg(long)]
    pub class: Option<String>,

    /// Expected vendor
    #[arg(long)]
    pub vendor: Option<String>,

    /// Expected model
    #[arg(long)]
    pub model: Option<String>,

    /// Expected model series
    #[arg(long)]
    pub model_series: Option<String>,

    /// Expected serial number
    #[arg(long)]
    pub serial_number: Option<String>,

    /// Expected OS version
    #[arg(long)]
    pub os_version: Option<String>,

    /// A differing OS version is a warning, not critical
    #[arg(long)]
    pub os_diff_warning: bool,

    /// A differing serial number is a warning, not critical
    #[arg(long)]
    pub serial_number_diff_warning: bool,
}

#[derive(Debug, Args)]
pub struct SingleThresholdArgs {
    #[command(flatten)]
    pub host: HostArgs,

    /// Warning range
    #[arg(long, short = 'w', value_name = "RANGE")]
    pub warning: Option<Range>,

    /// Critical range
    #[arg(long, short = 'c', value_name = "RANGE")]
    pub critical: Option<Range>,
}

#[derive(Debug, Args)]
pub struct InterfaceMetricsArgs {
    #[command(flatten)]
    pub host: HostArgs,

    #[command(flatten)]
    pub filters: InterfaceFilterArgs,

    /// Append the filtered interfaces as JSON to the output
    #[arg(long)]
    pub print_interfaces: bool,
}

#[derive(Debug, Args)]
pub struct CpuArgs {
    #[command(flatten)]
    pub host: HostArgs,

    #[arg(long, value_name = "RANGE")]
    pub load_warning: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub load_critical: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub temperature_warning: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub temperature_critical: Option<Range>,
}

#[derive(Debug, Args)]
pub struct UpsArgs {
    #[command(flatten)]
    pub host: HostArgs,

    #[arg(long, value_name = "RANGE")]
    pub battery_current_warning: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub battery_current_critical: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub battery_temperature_warning: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub battery_temperature_critical: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub current_load_warning: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub current_load_critical: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub rectifier_current_warning: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub rectifier_current_critical: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub system_voltage_warning: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub system_voltage_critical: Option<Range>,
}

#[derive(Debug, Args)]
pub struct HighAvailabilityArgs {
    #[command(flatten)]
    pub host: HostArgs,

    /// Expected role, e.g. master
    #[arg(long)]
    pub role: Option<String>,

    #[arg(long, value_name = "RANGE")]
    pub nodes_warning: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub nodes_critical: Option<Range>,
}

#[derive(Debug, Args)]
pub struct SiemArgs {
    #[command(flatten)]
    pub host: HostArgs,

    #[arg(long, value_name = "RANGE")]
    pub cpu_load_warning: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub cpu_load_critical: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub memory_usage_warning: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub memory_usage_critical: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub queue_length_warning: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub queue_length_critical: Option<Range>,
}

#[derive(Debug, Args)]
pub struct ServerArgs {
    #[command(flatten)]
    pub host: HostArgs,

    #[arg(long, value_name = "RANGE")]
    pub procs_warning: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub procs_critical: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub users_warning: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub users_critical: Option<Range>,
}

#[derive(Debug, Args)]
pub struct MetricsArgs {
    #[command(flatten)]
    pub host: HostArgs,

    #[command(flatten)]
    pub filters: InterfaceFilterArgs,

    #[arg(long, value_name = "RANGE")]
    pub cpu_load_warning: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub cpu_load_critical: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub memory_usage_warning: Option<Range>,
    #[arg(long, value_name = "RANGE")]
    pub memory_usage_critical: Option<Range>,
}

// ── Config & Completions ─────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,

    /// Print the default config file location
    Path,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ranges_parse_plugin_syntax() {
        assert_eq!(
            "80".parse::<Range>().unwrap(),
            Range {
                min: None,
                max: Some(80.0)
            }
        );
        assert_eq!(
            "10:".parse::<Range>().unwrap(),
            Range {
                min: Some(10.0),
                max: None
            }
        );
        assert_eq!(
            "~:5.5".parse::<Range>().unwrap(),
            Range {
                min: None,
                max: Some(5.5)
            }
        );
        assert_eq!(
            "1:2".parse::<Range>().unwrap(),
            Range {
                min: Some(1.0),
                max: Some(2.0)
            }
        );
        assert!("5:1".parse::<Range>().is_err());
        assert!("abc".parse::<Range>().is_err());
        assert!(":".parse::<Range>().is_err());
    }

    #[test]
    fn thresholds_combine_both_ranges() {
        let t = thresholds(Some("80".parse().unwrap()), Some("5:90".parse().unwrap()));
        assert_eq!(t.warn_max, Some(80.0));
        assert_eq!(t.warn_min, None);
        assert_eq!(t.crit_min, Some(5.0));
        assert_eq!(t.crit_max, Some(90.0));
    }

    #[test]
    fn check_flags_parse() {
        let cli = Cli::try_parse_from([
            "thola",
            "check",
            "memory",
            "192.0.2.1",
            "--warning",
            "80",
            "--critical",
            "90",
            "--community",
            "private",
        ])
        .unwrap();
        assert_eq!(cli.global.connection.communities, ["private"]);
        let Command::Check(CheckCommand::Memory(args)) = cli.command else {
            panic!("parsed into the wrong command");
        };
        assert_eq!(args.host.host, "192.0.2.1");
        assert_eq!(args.warning.unwrap().max, Some(80.0));
    }
}
