use thiserror::Error;

/// Top-level error type for the `thola-transport` crate.
///
/// Covers every failure mode of the device-facing sessions: SNMP protocol
/// and timeout failures, credential probing, and HTTP transport.
/// `thola-core` maps these into its classified error kinds.
#[derive(Debug, Error)]
pub enum Error {
    // ── SNMP ────────────────────────────────────────────────────────
    /// The agent answered, but holds no value for this OID.
    #[error("no such object: {oid}")]
    NoSuchObject { oid: String },

    /// The agent answered with an error status.
    #[error("SNMP error: {message}")]
    Snmp { message: String },

    /// No answer within the per-attempt timeout (after all retries).
    #[error("SNMP request to {target} timed out after {attempts} attempt(s)")]
    Timeout { target: String, attempts: u32 },

    /// Opening the UDP session failed (bind/resolve).
    #[error("SNMP session to {target} could not be opened: {reason}")]
    Connect { target: String, reason: String },

    /// Malformed dotted OID.
    #[error("invalid OID '{0}'")]
    InvalidOid(String),

    /// Every candidate credential tuple failed.
    #[error(
        "no working SNMP credentials for {address} ({} attempt(s): {})",
        attempts.len(),
        attempts.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
    )]
    ProbeFailed {
        address: String,
        attempts: Vec<ProbeAttempt>,
    },

    /// The probe was given nothing to try.
    #[error("no SNMP credential candidates for {address}")]
    NoCandidates { address: String },

    // ── HTTP ────────────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Non-success HTTP status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// None of the configured HTTP/HTTPS ports accepted a TCP connection.
    #[error("no reachable HTTP port on {address} (tried {tried})")]
    NoHttpPort { address: String, tried: String },

    /// Building the HTTP client failed (TLS setup).
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Lifecycle ───────────────────────────────────────────────────
    /// The owning request was cancelled while the operation was in flight.
    #[error("operation cancelled")]
    Cancelled,
}

/// One failed credential tuple of a probe, with the error it ended in.
#[derive(Debug, Error)]
#[error("{target}: {source}")]
pub struct ProbeAttempt {
    pub target: String,
    #[source]
    pub source: Box<Error>,
}

impl Error {
    /// Returns `true` if the device answered but had no data.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NoSuchObject { .. } | Self::HttpStatus { status: 404, .. } => true,
            Self::Http(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::Connect { .. } => true,
            _ => false,
        }
    }
}
