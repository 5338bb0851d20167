// File-backed key-value cache: one JSON document mapping `<DataType>-<ip>`
// to the entry and its expiry. Expired entries are dropped on the next
// write.
//
// Several processes may share the file. Every access holds an advisory
// lock on a sibling `.lock` file (shared for reads, exclusive for
// read-modify-write), and writes land through a uniquely named temporary
// file that is renamed over the document.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::warn;

use super::{CacheBackend, DataType, entry_key, expiry};
use crate::error::CoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    data: String,
    /// `None` never expires.
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

type Entries = BTreeMap<String, Entry>;

#[derive(Debug, Clone, Copy)]
enum Access {
    Read,
    Write,
}

#[derive(Debug, Clone)]
pub struct EmbeddedBackend {
    path: PathBuf,
}

fn io_error(path: &Path, e: impl std::fmt::Display) -> CoreError {
    CoreError::Internal(format!("cache file {}: {e}", path.display()))
}

impl EmbeddedBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` on a blocking thread while holding the file lock.
    async fn locked<T, F>(&self, access: Access, f: F) -> Result<T, CoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, CoreError> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let lock = open_lock(&path)?;
            match access {
                Access::Read => FileExt::lock_shared(&lock),
                Access::Write => FileExt::lock_exclusive(&lock),
            }
            .map_err(|e| io_error(&path, e))?;
            let result = f(&path);
            if let Err(e) = FileExt::unlock(&lock) {
                warn!(path = %path.display(), error = %e, "cache lock release failed");
            }
            result
        })
        .await
        .map_err(|e| CoreError::Internal(format!("cache file task failed: {e}")))?
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map_or_else(OsString::new, OsString::from);
    name.push(".lock");
    path.with_file_name(name)
}

fn open_lock(path: &Path) -> Result<File, CoreError> {
    let dir = parent_dir(path);
    std::fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
    let lock = lock_path(path);
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock)
        .map_err(|e| io_error(&lock, e))
}

/// The current document. A file that does not parse is logged and read
/// as empty; the next write replaces it.
fn load(path: &Path) -> Result<Entries, CoreError> {
    match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding unreadable cache file");
                Ok(Entries::new())
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Entries::new()),
        Err(e) => Err(io_error(path, e)),
    }
}

fn store(path: &Path, entries: &Entries) -> Result<(), CoreError> {
    let mut tmp = NamedTempFile::new_in(parent_dir(path)).map_err(|e| io_error(path, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer(&mut writer, entries)?;
        writer.flush().map_err(|e| io_error(path, e))?;
    }
    tmp.as_file().sync_all().map_err(|e| io_error(path, e))?;
    tmp.persist(path).map_err(|e| io_error(path, e.error))?;
    Ok(())
}

#[async_trait]
impl CacheBackend for EmbeddedBackend {
    async fn get(&self, ip: IpAddr, kind: DataType, _ttl: Duration) -> Result<String, CoreError> {
        let key = entry_key(ip, kind);
        let entries = self.locked(Access::Read, load).await?;
        match entries.get(&key) {
            Some(entry) if entry.live(Utc::now()) => Ok(entry.data.clone()),
            Some(_) => Err(CoreError::not_found(format!("{key} expired"))),
            None => Err(CoreError::not_found(key)),
        }
    }

    async fn set(
        &self,
        ip: IpAddr,
        kind: DataType,
        data: String,
        ttl: Duration,
    ) -> Result<(), CoreError> {
        let key = entry_key(ip, kind);
        self.locked(Access::Write, move |path| {
            let now = Utc::now();
            let mut entries = load(path)?;
            entries.retain(|_, entry| entry.live(now));
            entries.insert(
                key,
                Entry {
                    data,
                    expires_at: expiry(now, ttl),
                },
            );
            store(path, &entries)
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    const IP: IpAddr = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 3));
    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn entries_survive_a_new_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache/thola.json");
        EmbeddedBackend::new(&path)
            .set(IP, DataType::ConnectionData, "{}".into(), Duration::from_secs(60))
            .await
            .unwrap();

        let again = EmbeddedBackend::new(&path);
        let data = again
            .get(IP, DataType::ConnectionData, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(data, "{}");
        assert!(again
            .get(IP, DataType::IdentifyResponse, Duration::from_secs(60))
            .await
            .unwrap_err()
            .is_absent());
    }

    #[tokio::test]
    async fn zero_ttl_is_expired_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let backend = EmbeddedBackend::new(dir.path().join("thola.json"));
        backend
            .set(IP, DataType::IdentifyResponse, "{}".into(), Duration::ZERO)
            .await
            .unwrap();
        let err = backend
            .get(IP, DataType::IdentifyResponse, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(err.is_absent());
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_empty_and_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thola.json");
        std::fs::write(&path, "not json").unwrap();
        let backend = EmbeddedBackend::new(&path);
        assert!(backend
            .get(IP, DataType::ConnectionData, TTL)
            .await
            .unwrap_err()
            .is_absent());

        backend
            .set(IP, DataType::ConnectionData, "{}".into(), TTL)
            .await
            .unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        let entries: Entries = serde_json::from_str(&raw).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(backend.get(IP, DataType::ConnectionData, TTL).await.unwrap(), "{}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_handles_keep_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache/thola.json");
        let first = EmbeddedBackend::new(&path);
        let second = EmbeddedBackend::new(&path);

        let writes = (1..=32u8).map(|host| {
            let backend = if host % 2 == 0 { first.clone() } else { second.clone() };
            tokio::spawn(async move {
                let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, host));
                backend
                    .set(ip, DataType::ConnectionData, format!("{{\"host\":{host}}}"), TTL)
                    .await
            })
        });
        for write in futures::future::join_all(writes).await {
            write.unwrap().unwrap();
        }

        for host in 1..=32u8 {
            let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, host));
            let data = first.get(ip, DataType::ConnectionData, TTL).await.unwrap();
            assert_eq!(data, format!("{{\"host\":{host}}}"));
        }
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|name| name != "thola.json" && name != "thola.json.lock")
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[tokio::test]
    async fn ttl_past_the_calendar_never_expires() {
        let dir = tempfile::tempdir().unwrap();
        let backend = EmbeddedBackend::new(dir.path().join("thola.json"));
        let huge = Duration::from_secs(10_000_000_000_000);
        backend
            .set(IP, DataType::IdentifyResponse, "{}".into(), huge)
            .await
            .unwrap();
        assert_eq!(
            backend.get(IP, DataType::IdentifyResponse, huge).await.unwrap(),
            "{}"
        );
    }

    #[tokio::test]
    async fn entries_from_older_files_still_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thola.json");
        std::fs::write(
            &path,
            r#"{"ConnectionData-198.51.100.3":{"data":"{}","expires_at":"2999-01-01T00:00:00Z"}}"#,
        )
        .unwrap();
        let backend = EmbeddedBackend::new(&path);
        assert_eq!(backend.get(IP, DataType::ConnectionData, TTL).await.unwrap(), "{}");
    }
}
