// SQLite backend: one `cache` table, unique per (ip, datatype). Writes
// replace the row; entries older than the TTL are treated as missing.

use std::net::IpAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::{CacheBackend, DataType, expiry};
use crate::error::CoreError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS cache (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ip VARCHAR(255) NOT NULL,
    datatype VARCHAR(255) NOT NULL,
    data TEXT NOT NULL,
    time DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (ip, datatype)
);
";

/// Matches SQLite's `CURRENT_TIMESTAMP` layout (UTC).
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct SqlBackend {
    conn: Arc<Mutex<Connection>>,
}

fn sql_error(e: impl std::fmt::Display) -> CoreError {
    CoreError::Internal(format!("sql cache: {e}"))
}

impl SqlBackend {
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(sql_error)?;
        }
        Self::init(Connection::open(path).map_err(sql_error)?)
    }

    pub fn in_memory() -> Result<Self, CoreError> {
        Self::init(Connection::open_in_memory().map_err(sql_error)?)
    }

    fn init(conn: Connection) -> Result<Self, CoreError> {
        conn.execute_batch(SCHEMA).map_err(sql_error)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, CoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, CoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| CoreError::Internal("sql cache connection poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(sql_error)?
    }
}

#[async_trait]
impl CacheBackend for SqlBackend {
    async fn get(&self, ip: IpAddr, kind: DataType, ttl: Duration) -> Result<String, CoreError> {
        let key = (ip.to_string(), kind.to_string());
        let row: Option<(String, String)> = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT data, time FROM cache WHERE ip = ?1 AND datatype = ?2",
                    params![key.0, key.1],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .map_err(sql_error)
            })
            .await?;

        let Some((data, time)) = row else {
            return Err(CoreError::not_found(format!("no cached {kind} for {ip}")));
        };
        let written = NaiveDateTime::parse_from_str(&time, TIME_FORMAT)
            .map_err(|e| CoreError::decode(format!("cache time '{time}': {e}")))?
            .and_utc();
        if expiry(written, ttl).is_some_and(|at| at <= Utc::now()) {
            return Err(CoreError::not_found(format!("cached {kind} for {ip} expired")));
        }
        Ok(data)
    }

    async fn set(
        &self,
        ip: IpAddr,
        kind: DataType,
        data: String,
        _ttl: Duration,
    ) -> Result<(), CoreError> {
        let now = Utc::now().format(TIME_FORMAT).to_string();
        let (ip, kind) = (ip.to_string(), kind.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "REPLACE INTO cache (ip, datatype, data, time) VALUES (?1, ?2, ?3, ?4)",
                params![ip, kind, data, now],
            )
            .map(|_| ())
            .map_err(sql_error)
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    const IP: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 7));
    const TTL: Duration = Duration::from_secs(600);

    fn rows(backend: &SqlBackend) -> i64 {
        let conn = backend.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM cache", [], |r| r.get(0))
            .unwrap()
    }

    #[tokio::test]
    async fn replace_keeps_one_row_per_key() {
        let backend = SqlBackend::in_memory().unwrap();
        backend
            .set(IP, DataType::ConnectionData, "{\"a\":1}".into(), TTL)
            .await
            .unwrap();
        backend
            .set(IP, DataType::ConnectionData, "{\"a\":2}".into(), TTL)
            .await
            .unwrap();
        backend
            .set(IP, DataType::IdentifyResponse, "{}".into(), TTL)
            .await
            .unwrap();

        assert_eq!(rows(&backend), 2);
        assert_eq!(
            backend.get(IP, DataType::ConnectionData, TTL).await.unwrap(),
            "{\"a\":2}"
        );
    }

    #[tokio::test]
    async fn old_rows_are_expired_on_read() {
        let backend = SqlBackend::in_memory().unwrap();
        {
            let conn = backend.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO cache (ip, datatype, data, time) VALUES (?1, 'ConnectionData', '{}', '2020-01-01 00:00:00')",
                params![IP.to_string()],
            )
            .unwrap();
        }
        let err = backend
            .get(IP, DataType::ConnectionData, TTL)
            .await
            .unwrap_err();
        assert!(err.is_absent());
    }

    #[tokio::test]
    async fn ttl_past_the_calendar_keeps_the_row() {
        let backend = SqlBackend::in_memory().unwrap();
        backend
            .set(IP, DataType::ConnectionData, "{}".into(), TTL)
            .await
            .unwrap();
        let huge = Duration::from_secs(10_000_000_000_000);
        assert_eq!(
            backend.get(IP, DataType::ConnectionData, huge).await.unwrap(),
            "{}"
        );
    }

    #[tokio::test]
    async fn file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/thola.db");
        SqlBackend::open(&path)
            .unwrap()
            .set(IP, DataType::IdentifyResponse, "{}".into(), TTL)
            .await
            .unwrap();

        let reopened = SqlBackend::open(&path).unwrap();
        assert_eq!(
            reopened.get(IP, DataType::IdentifyResponse, TTL).await.unwrap(),
            "{}"
        );
    }
}
