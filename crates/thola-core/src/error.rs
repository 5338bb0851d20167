// ── Core error types ──
//
// The classified error kinds every engine layer speaks. Transport errors
// are translated by the `From<thola_transport::Error>` impl so callers
// never see SNMP or HTTP details directly.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Missing data ─────────────────────────────────────────────────
    /// The device returned nothing for this datum.
    #[error("not found: {0}")]
    NotFound(String),

    /// The device class defines no reader or override for this datum.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// The component is disabled for the resolved device class.
    #[error("component '{component}' is not available for class '{class}'")]
    ComponentNotFound { component: String, class: String },

    // ── Data errors ──────────────────────────────────────────────────
    /// Data was received but could not be interpreted.
    #[error("decode error: {0}")]
    Decode(String),

    // ── Transport / lifecycle ────────────────────────────────────────
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {timeout_secs}s")]
    TimedOut { timeout_secs: u64 },

    #[error("request cancelled")]
    Cancelled,

    // ── Input errors ─────────────────────────────────────────────────
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    // ── Definition / setup errors ────────────────────────────────────
    /// A device-class file, cache backend or engine setting is unusable.
    #[error("configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn not_implemented(what: impl Into<String>) -> Self {
        Self::NotImplemented(what.into())
    }

    pub fn decode(what: impl Into<String>) -> Self {
        Self::Decode(what.into())
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// `NotFound` or `NotImplemented`: the datum is simply absent.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::NotImplemented(_))
    }

    pub fn is_component_not_found(&self) -> bool {
        matches!(self, Self::ComponentNotFound { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<thola_transport::Error> for CoreError {
    fn from(err: thola_transport::Error) -> Self {
        use thola_transport::Error as T;

        if err.is_not_found() {
            return CoreError::NotFound(err.to_string());
        }
        match err {
            T::Cancelled => CoreError::Cancelled,
            T::InvalidOid(oid) => CoreError::config(format!("invalid OID '{oid}'")),
            T::InvalidUrl(e) => CoreError::config(format!("invalid URL: {e}")),
            T::Tls(msg) => CoreError::config(format!("TLS setup failed: {msg}")),
            other => CoreError::Network(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_classified() {
        let missing: CoreError = thola_transport::Error::NoSuchObject {
            oid: "1.3.6.1.2.1.1.5.0".into(),
        }
        .into();
        assert!(missing.is_absent());

        let timeout: CoreError = thola_transport::Error::Timeout {
            target: "v2c @ 10.0.0.1:161".into(),
            attempts: 2,
        }
        .into();
        assert!(matches!(timeout, CoreError::Network(_)));

        let cancelled: CoreError = thola_transport::Error::Cancelled.into();
        assert!(matches!(cancelled, CoreError::Cancelled));
    }

    #[test]
    fn absent_kinds() {
        assert!(CoreError::not_implemented("vendor").is_absent());
        assert!(!CoreError::decode("bad").is_absent());
        assert!(
            CoreError::ComponentNotFound {
                component: "ups".into(),
                class: "generic".into()
            }
            .is_component_not_found()
        );
    }
}
