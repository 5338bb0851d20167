//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with help
//! text and plugin-compatible exit codes.

use miette::Diagnostic;
use thiserror::Error;

use thola_config::ConfigError;
use thola_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const UNKNOWN: i32 = 3;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Input ────────────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(thola::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(thola::config),
        help(
            "Check the config file and THOLA_* environment variables.\n\
             Run: thola config show"
        )
    )]
    Config(#[source] ConfigError),

    // ── Device ───────────────────────────────────────────────────────
    #[error("Could not reach {host}: {reason}")]
    #[diagnostic(
        code(thola::unreachable),
        help(
            "Check the address and the SNMP credentials.\n\
             Try: thola check snmp {host} --community <COMMUNITY>"
        )
    )]
    Unreachable { host: String, reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(thola::timeout),
        help("Increase the deadline with --timeout or api.timeout.")
    )]
    Timeout { seconds: u64 },

    #[error("{0}")]
    #[diagnostic(
        code(thola::component_not_found),
        help("Run: thola read available-components <host>")
    )]
    ComponentNotFound(String),

    #[error(transparent)]
    #[diagnostic(code(thola::core))]
    Core(CoreError),

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render output: {0}")]
    #[diagnostic(code(thola::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } | Self::Config(_) => exit_code::USAGE,
            Self::Unreachable { .. } | Self::Timeout { .. } | Self::ComponentNotFound(_) => {
                exit_code::UNKNOWN
            }
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the target address to connection failures.
    pub fn for_host(err: CoreError, host: &str) -> Self {
        match err {
            CoreError::Network(reason) => Self::Unreachable {
                host: host.into(),
                reason,
            },
            other => other.into(),
        }
    }
}

// ── CoreError / ConfigError → CliError mapping ──────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { field, reason } => Self::Validation { field, reason },
            CoreError::TimedOut { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            e @ CoreError::ComponentNotFound { .. } => Self::ComponentNotFound(e.to_string()),
            CoreError::Network(reason) => Self::Unreachable {
                host: "device".into(),
                reason,
            },
            other => Self::Core(other),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Core(core) => core.into(),
            other => Self::Config(other),
        }
    }
}
