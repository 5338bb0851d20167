// Redis backend. Entries are written with `SET … EX`, so expiry is handled
// by the server.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tokio::sync::OnceCell;

use super::{CacheBackend, DataType, entry_key};
use crate::error::CoreError;

pub struct RedisBackend {
    client: redis::Client,
    conn: OnceCell<MultiplexedConnection>,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("connected", &self.conn.initialized())
            .finish_non_exhaustive()
    }
}

fn redis_error(e: &redis::RedisError) -> CoreError {
    CoreError::Network(format!("redis cache: {e}"))
}

impl RedisBackend {
    /// Validates the URL; the connection is opened on first use.
    pub fn new(url: &str) -> Result<Self, CoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| CoreError::config(format!("invalid redis URL '{url}': {e}")))?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CoreError> {
        self.conn
            .get_or_try_init(|| async {
                self.client
                    .get_multiplexed_async_connection()
                    .await
                    .map_err(|e| redis_error(&e))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, ip: IpAddr, kind: DataType, _ttl: Duration) -> Result<String, CoreError> {
        let key = entry_key(ip, kind);
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(&key).await.map_err(|e| redis_error(&e))?;
        value.ok_or_else(|| CoreError::not_found(key))
    }

    async fn set(
        &self,
        ip: IpAddr,
        kind: DataType,
        data: String,
        ttl: Duration,
    ) -> Result<(), CoreError> {
        let mut conn = self.connection().await?;
        // SET EX rejects 0
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(entry_key(ip, kind), data, seconds)
            .await
            .map_err(|e| redis_error(&e))
    }
}
