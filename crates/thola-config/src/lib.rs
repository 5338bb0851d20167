//! Configuration for the thola binary.
//!
//! A TOML file layered over built-in defaults and overlaid by `THOLA_`
//! environment variables, plus translation into the core crate's
//! `EngineConfig` and `CacheStore`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
    value::Uncased,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use thola_core::config::default_connection;
use thola_core::model::{ConnectionData, HttpConnectionData, SnmpConnectionData, V3ConnectionData};
use thola_core::request::validate::validate_connection;
use thola_core::store::{EmbeddedBackend, MAX_TTL, RedisBackend, SqlBackend};
use thola_core::{CacheStore, CoreError, EngineConfig};

/// Prefix of environment variables that override config keys.
pub const ENV_PREFIX: &str = "THOLA_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub device: DeviceConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ApiConfig {
    /// Request deadline in seconds.
    pub timeout: u64,

    pub format: OutputFormat,

    /// Serialise requests against the same device.
    pub lock_per_ip: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            timeout: thola_core::config::DEFAULT_REQUEST_TIMEOUT.as_secs(),
            format: OutputFormat::default(),
            lock_per_ip: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable tables and plugin text.
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    #[default]
    Embedded,
    Sql,
    Redis,
    Null,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct CacheConfig {
    pub enabled: bool,

    pub backend: CacheBackendKind,

    /// Entry lifetime in seconds.
    pub ttl: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedded_path: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_path: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackendKind::default(),
            ttl: thola_core::store::DEFAULT_TTL.as_secs(),
            embedded_path: None,
            sql_path: None,
            redis_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct DeviceConfig {
    pub snmp: SnmpConfig,

    pub http: HttpConfig,

    /// Load device classes from this directory instead of the built-in set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct SnmpConfig {
    pub versions: Vec<String>,
    pub communities: Vec<String>,
    pub ports: Vec<u16>,
    pub discover_parallel: usize,
    /// Seconds per probe attempt.
    pub discover_timeout: u64,
    pub discover_retries: u32,
    pub gets_instead_of_walk: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub v3: Vec<V3Config>,
}

impl Default for SnmpConfig {
    fn default() -> Self {
        let snmp = default_connection().snmp;
        Self {
            versions: snmp.versions,
            communities: snmp.communities,
            ports: snmp.ports,
            discover_parallel: snmp.discover_parallel.unwrap_or(5),
            discover_timeout: snmp.discover_timeout.unwrap_or(2),
            discover_retries: snmp.discover_retries.unwrap_or_default(),
            gets_instead_of_walk: false,
            v3: Vec::new(),
        }
    }
}

/// One SNMPv3 credential set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct V3Config {
    pub level: Option<String>,
    pub user: Option<String>,
    pub auth_protocol: Option<String>,
    pub auth_key: Option<String>,
    pub priv_protocol: Option<String>,
    pub priv_key: Option<String>,
    pub context_name: Option<String>,
}

impl From<&V3Config> for V3ConnectionData {
    fn from(v3: &V3Config) -> Self {
        Self {
            level: v3.level.clone(),
            user: v3.user.clone(),
            auth_protocol: v3.auth_protocol.clone(),
            auth_key: v3.auth_key.clone(),
            priv_protocol: v3.priv_protocol.clone(),
            priv_key: v3.priv_key.clone(),
            context_name: v3.context_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct HttpConfig {
    pub http_ports: Vec<u16>,
    pub https_ports: Vec<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let http = default_connection().http;
        Self {
            http_ports: http.http_ports,
            https_ports: http.https_ports,
            username: None,
            password: None,
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "thola", "thola")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || PathBuf::from("thola.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Where file-backed caches live unless configured otherwise.
pub fn cache_dir() -> PathBuf {
    project_dirs().map_or_else(
        || PathBuf::from(".thola-cache"),
        |dirs| dirs.cache_dir().to_path_buf(),
    )
}

// ── Loading ─────────────────────────────────────────────────────────

/// Dotted keys that may be overridden from the environment.
const ENV_KEYS: &[&str] = &[
    "api.timeout",
    "api.format",
    "api.lock_per_ip",
    "cache.enabled",
    "cache.backend",
    "cache.ttl",
    "cache.embedded_path",
    "cache.sql_path",
    "cache.redis_url",
    "device.class_dir",
    "device.snmp.versions",
    "device.snmp.communities",
    "device.snmp.ports",
    "device.snmp.discover_parallel",
    "device.snmp.discover_timeout",
    "device.snmp.discover_retries",
    "device.snmp.gets_instead_of_walk",
    "device.http.http_ports",
    "device.http.https_ports",
    "device.http.username",
    "device.http.password",
];

/// `THOLA_CACHE_TTL` → `cache.ttl`. Unknown variables are ignored.
fn env_key(name: &str) -> Option<&'static str> {
    ENV_KEYS.iter().copied().find(|key| {
        let flat: String = key
            .chars()
            .map(|c| if c == '.' || c == '-' { '_' } else { c })
            .collect();
        flat.eq_ignore_ascii_case(name)
    })
}

/// Defaults, then the TOML file, then the environment.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).filter_map(|name| env_key(name.as_str()).map(Uncased::from)))
}

/// Load and validate the config; `path` defaults to [`config_path`].
/// A missing file is not an error.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    let config: Config = figment(&path).extract()?;
    config.validate()?;
    Ok(config)
}

// ── Validation and translation ──────────────────────────────────────

/// `connectionData.snmp.discoverParallel` → `device.snmp.discover_parallel`.
fn config_field(core_field: &str) -> String {
    let tail = core_field.strip_prefix("connectionData.").unwrap_or(core_field);
    let mut out = String::from("device.");
    for c in tail.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.timeout == 0 {
            return Err(invalid("api.timeout", "must be greater than zero"));
        }
        if self.cache.ttl == 0 {
            return Err(invalid("cache.ttl", "must be greater than zero"));
        }
        if self.cache.ttl > MAX_TTL.as_secs() {
            return Err(invalid(
                "cache.ttl",
                format!("must not exceed {} seconds", MAX_TTL.as_secs()),
            ));
        }
        if self.cache.enabled
            && self.cache.backend == CacheBackendKind::Redis
            && self.cache.redis_url.is_none()
        {
            return Err(invalid("cache.redis_url", "is required for the redis backend"));
        }
        validate_connection(&self.connection_data()).map_err(|e| match e {
            CoreError::Validation { field, reason } => ConfigError::Validation {
                field: config_field(&field),
                reason,
            },
            other => ConfigError::Core(other),
        })
    }

    /// The lowest-priority credential layer.
    pub fn connection_data(&self) -> ConnectionData {
        let snmp = &self.device.snmp;
        let http = &self.device.http;
        ConnectionData {
            snmp: SnmpConnectionData {
                communities: snmp.communities.clone(),
                versions: snmp.versions.clone(),
                ports: snmp.ports.clone(),
                v3_data: snmp.v3.iter().map(V3ConnectionData::from).collect(),
                discover_parallel: Some(snmp.discover_parallel),
                discover_timeout: Some(snmp.discover_timeout),
                discover_retries: Some(snmp.discover_retries),
            },
            http: HttpConnectionData {
                http_ports: http.http_ports.clone(),
                https_ports: http.https_ports.clone(),
                username: http.username.clone(),
                password: http.password.clone(),
            },
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            connection: self.connection_data(),
            request_timeout: Duration::from_secs(self.api.timeout),
            lock_per_ip: self.api.lock_per_ip,
            gets_instead_of_walk: self.device.snmp.gets_instead_of_walk,
        }
    }

    /// Open the configured cache backend.
    pub fn cache_store(&self) -> Result<CacheStore, ConfigError> {
        let ttl = Duration::from_secs(self.cache.ttl);
        if !self.cache.enabled {
            return Ok(CacheStore::disabled());
        }
        let store = match self.cache.backend {
            CacheBackendKind::Null => CacheStore::disabled(),
            CacheBackendKind::Embedded => {
                let path = self
                    .cache
                    .embedded_path
                    .clone()
                    .unwrap_or_else(|| cache_dir().join("cache.json"));
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                CacheStore::new(Arc::new(EmbeddedBackend::new(path)), ttl)
            }
            CacheBackendKind::Sql => {
                let path = self
                    .cache
                    .sql_path
                    .clone()
                    .unwrap_or_else(|| cache_dir().join("cache.sqlite"));
                CacheStore::new(Arc::new(SqlBackend::open(&path)?), ttl)
            }
            CacheBackendKind::Redis => {
                let url = self
                    .cache
                    .redis_url
                    .as_deref()
                    .ok_or_else(|| invalid("cache.redis_url", "is required for the redis backend"))?;
                CacheStore::new(Arc::new(RedisBackend::new(url)?), ttl)
            }
        };
        Ok(store)
    }

    /// The effective config as a TOML document.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    fn load(jail: &Jail) -> Result<Config, ConfigError> {
        load_config(Some(&jail.directory().join("thola.toml")))
    }

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|jail| {
            let config = load(jail).unwrap();
            assert_eq!(config, Config::default());
            assert_eq!(config.api.timeout, 180);
            assert_eq!(config.device.snmp.communities, ["public"]);
            Ok(())
        });
    }

    #[test]
    fn file_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "thola.toml",
                r#"
                [api]
                format = "json"

                [cache]
                backend = "sql"
                ttl = 600

                [device.snmp]
                communities = ["private", "public"]
                gets_instead_of_walk = true
                "#,
            )?;
            let config = load(jail).unwrap();
            assert_eq!(config.api.format, OutputFormat::Json);
            assert_eq!(config.cache.backend, CacheBackendKind::Sql);
            assert_eq!(config.cache.ttl, 600);
            assert_eq!(config.device.snmp.communities, ["private", "public"]);
            assert_eq!(config.device.snmp.ports, [161]);

            let engine = config.engine_config();
            assert!(engine.gets_instead_of_walk);
            assert_eq!(engine.connection.snmp.discover_parallel, Some(5));
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("thola.toml", "[cache]\nttl = 600\n")?;
            jail.set_env("THOLA_CACHE_TTL", "120");
            jail.set_env("THOLA_DEVICE_SNMP_DISCOVER_PARALLEL", "9");
            jail.set_env("THOLA_API_LOCK_PER_IP", "false");
            jail.set_env("THOLA_SOMETHING_ELSE", "ignored");

            let config = load(jail).unwrap();
            assert_eq!(config.cache.ttl, 120);
            assert_eq!(config.device.snmp.discover_parallel, 9);
            assert!(!config.api.lock_per_ip);
            Ok(())
        });
    }

    #[test]
    fn bare_format_key_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("thola.toml", "format = \"json\"\n")?;
            assert!(matches!(load(jail), Err(ConfigError::Figment(_))));
            Ok(())
        });
    }

    #[test]
    fn invalid_values_name_their_field() {
        Jail::expect_with(|jail| {
            jail.create_file("thola.toml", "[device.snmp]\nversions = [\"2\"]\n")?;
            match load(jail) {
                Err(ConfigError::Validation { field, .. }) => {
                    assert_eq!(field, "device.snmp.versions");
                }
                other => panic!("expected a validation error, got {other:?}"),
            }

            jail.create_file("thola.toml", "[device.snmp]\ndiscover_parallel = 0\n")?;
            match load(jail) {
                Err(ConfigError::Validation { field, .. }) => {
                    assert_eq!(field, "device.snmp.discover_parallel");
                }
                other => panic!("expected a validation error, got {other:?}"),
            }

            jail.create_file("thola.toml", "[cache]\nttl = 10000000000000\n")?;
            match load(jail) {
                Err(ConfigError::Validation { field, reason }) => {
                    assert_eq!(field, "cache.ttl");
                    assert!(reason.contains("must not exceed"));
                }
                other => panic!("expected a validation error, got {other:?}"),
            }

            jail.create_file("thola.toml", "[cache]\nbackend = \"redis\"\n")?;
            match load(jail) {
                Err(ConfigError::Validation { field, .. }) => assert_eq!(field, "cache.redis_url"),
                other => panic!("expected a validation error, got {other:?}"),
            }
            Ok(())
        });
    }

    #[test]
    fn env_names_map_to_dotted_keys() {
        assert_eq!(env_key("cache_ttl"), Some("cache.ttl"));
        assert_eq!(env_key("DEVICE_HTTP_HTTPS_PORTS"), Some("device.http.https_ports"));
        assert_eq!(env_key("cache"), None);
        assert_eq!(
            config_field("connectionData.http.httpsPorts"),
            "device.http.https_ports"
        );
    }

    #[test]
    fn cache_backends_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();

        config.cache.backend = CacheBackendKind::Sql;
        config.cache.sql_path = Some(dir.path().join("nested/cache.sqlite"));
        config.cache_store().unwrap();
        assert!(dir.path().join("nested/cache.sqlite").exists());

        config.cache.backend = CacheBackendKind::Embedded;
        config.cache.embedded_path = Some(dir.path().join("other/cache.json"));
        let store = config.cache_store().unwrap();
        assert_eq!(store.ttl(), Duration::from_secs(86_400));
        assert!(dir.path().join("other").is_dir());

        config.cache.backend = CacheBackendKind::Redis;
        config.cache.redis_url = Some("not a url".into());
        assert!(config.cache_store().is_err());
    }

    #[test]
    fn effective_config_renders_as_toml() {
        let rendered = Config::default().to_toml().unwrap();
        assert!(rendered.contains("discover_parallel = 5"), "{rendered}");
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
