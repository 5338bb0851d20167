use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;

use super::{CacheBackend, DataType};
use crate::error::CoreError;

/// Used when caching is disabled: every read misses, writes are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

#[async_trait]
impl CacheBackend for NullBackend {
    async fn get(&self, ip: IpAddr, kind: DataType, _ttl: Duration) -> Result<String, CoreError> {
        Err(CoreError::not_found(format!("{kind} for {ip} (cache disabled)")))
    }

    async fn set(
        &self,
        _ip: IpAddr,
        _kind: DataType,
        _data: String,
        _ttl: Duration,
    ) -> Result<(), CoreError> {
        Ok(())
    }
}
