// ── Cache store ──
//
// Remembers per device address the credentials that worked and the class
// it was identified as. Backends are interchangeable behind
// `CacheBackend`; a miss or an expired entry is always `NotFound`.
// Concurrent writers for one address race, last writer wins.

mod embedded;
mod keyvalue;
mod null;
mod sql;

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use strum::{Display, EnumString};
use tracing::debug;

use crate::error::CoreError;
use crate::model::{ConnectionData, IdentifyResponse};

pub use embedded::EmbeddedBackend;
pub use keyvalue::RedisBackend;
pub use null::NullBackend;
pub use sql::SqlBackend;

/// Default time-to-live for cache entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest TTL a configuration may ask for (100 years).
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// When an entry written at `written` expires, or `None` if `ttl` reaches
/// past the last representable instant.
pub(crate) fn expiry(written: DateTime<Utc>, ttl: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| written.checked_add_signed(ttl))
}

/// What an entry holds. The name is part of the persisted key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum DataType {
    IdentifyResponse,
    ConnectionData,
}

/// `<DataType>-<ip>`, the key layout of key-value backends.
pub fn entry_key(ip: IpAddr, kind: DataType) -> String {
    format!("{kind}-{ip}")
}

#[async_trait]
pub trait CacheBackend: Send + Sync + fmt::Debug {
    /// The stored JSON document, or `NotFound` when missing or older than `ttl`.
    async fn get(&self, ip: IpAddr, kind: DataType, ttl: Duration) -> Result<String, CoreError>;

    async fn set(
        &self,
        ip: IpAddr,
        kind: DataType,
        data: String,
        ttl: Duration,
    ) -> Result<(), CoreError>;
}

/// Typed access to a backend with one TTL for every entry.
#[derive(Debug, Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    /// A store that never remembers anything.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NullBackend), DEFAULT_TTL)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn get_typed<T: DeserializeOwned>(
        &self,
        ip: IpAddr,
        kind: DataType,
    ) -> Result<T, CoreError> {
        let raw = self.backend.get(ip, kind, self.ttl).await?;
        serde_json::from_str(&raw)
            .map_err(|e| CoreError::decode(format!("cached {kind} for {ip}: {e}")))
    }

    async fn set_typed<T: Serialize + Sync>(
        &self,
        ip: IpAddr,
        kind: DataType,
        value: &T,
    ) -> Result<(), CoreError> {
        let data = serde_json::to_string(value)?;
        self.backend.set(ip, kind, data, self.ttl).await?;
        debug!(%ip, %kind, "cache entry written");
        Ok(())
    }

    pub async fn get_identify(&self, ip: IpAddr) -> Result<IdentifyResponse, CoreError> {
        self.get_typed(ip, DataType::IdentifyResponse).await
    }

    /// Store an identify result together with the credentials it was found with.
    pub async fn set_identify(
        &self,
        ip: IpAddr,
        connection: &ConnectionData,
        identify: &IdentifyResponse,
    ) -> Result<(), CoreError> {
        self.set_connection(ip, connection).await?;
        self.set_typed(ip, DataType::IdentifyResponse, identify).await
    }

    pub async fn get_connection(&self, ip: IpAddr) -> Result<ConnectionData, CoreError> {
        self.get_typed(ip, DataType::ConnectionData).await
    }

    pub async fn set_connection(
        &self,
        ip: IpAddr,
        connection: &ConnectionData,
    ) -> Result<(), CoreError> {
        self.set_typed(ip, DataType::ConnectionData, connection).await
    }
}
