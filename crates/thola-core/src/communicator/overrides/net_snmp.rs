// net-snmp: memory and disks from HOST-RESOURCES-MIB hrStorageTable.

use async_trait::async_trait;

use super::{ClassOverrides, percent, walk_columns};
use crate::device::DeviceContext;
use crate::error::CoreError;
use crate::model::DiskStorage;
use crate::reader::{Row, Scope};

const STORAGE_TYPE: &[u32] = &[1, 3, 6, 1, 2, 1, 25, 2, 3, 1, 2];
const STORAGE_DESCR: &[u32] = &[1, 3, 6, 1, 2, 1, 25, 2, 3, 1, 3];
const STORAGE_UNITS: &[u32] = &[1, 3, 6, 1, 2, 1, 25, 2, 3, 1, 4];
const STORAGE_SIZE: &[u32] = &[1, 3, 6, 1, 2, 1, 25, 2, 3, 1, 5];
const STORAGE_USED: &[u32] = &[1, 3, 6, 1, 2, 1, 25, 2, 3, 1, 6];

/// hrStorageTypes registrations below 1.3.6.1.2.1.25.2.1.
const STORAGE_TYPES: &str = "1.3.6.1.2.1.25.2.1.";

pub struct NetSnmpOverrides;

#[async_trait]
impl ClassOverrides for NetSnmpOverrides {
    async fn memory_usage(&self, scope: Scope<'_>) -> Option<Result<f64, CoreError>> {
        Some(memory_usage(scope.device).await)
    }

    async fn disk_storages(&self, scope: Scope<'_>) -> Option<Result<Vec<DiskStorage>, CoreError>> {
        Some(disk_storages(scope.device).await)
    }
}

#[derive(Debug)]
struct Storage {
    kind: String,
    description: Option<String>,
    size: u64,
    used: u64,
}

async fn storages(device: &DeviceContext) -> Result<Vec<Storage>, CoreError> {
    let rows = walk_columns(
        device,
        &[
            ("type", STORAGE_TYPE),
            ("descr", STORAGE_DESCR),
            ("units", STORAGE_UNITS),
            ("size", STORAGE_SIZE),
            ("used", STORAGE_USED),
        ],
    )
    .await?;
    rows.iter().filter_map(|row| storage(row).transpose()).collect()
}

/// `None` for rows missing a type or size.
fn storage(row: &Row) -> Result<Option<Storage>, CoreError> {
    let (Some(kind), Some(size)) = (row.get("type"), row.get("size")) else {
        return Ok(None);
    };
    let units = row.get("units").map_or(Ok(1), |u| u.as_u64())?;
    let used = row.get("used").map_or(Ok(0), |u| u.as_u64())?;
    let kind = kind.to_text();
    let kind = kind
        .strip_prefix(STORAGE_TYPES)
        .map_or_else(|| kind.clone(), |suffix| type_name(suffix).to_owned());
    Ok(Some(Storage {
        kind,
        description: row.get("descr").map(|d| d.to_text()),
        size: size.as_u64()?.saturating_mul(units),
        used: used.saturating_mul(units),
    }))
}

fn type_name(suffix: &str) -> &str {
    match suffix {
        "1" => "other",
        "2" => "ram",
        "3" => "virtual memory",
        "4" => "fixed disk",
        "5" => "removable disk",
        "6" => "floppy disk",
        "7" => "compact disc",
        "8" => "ram disk",
        "9" => "flash memory",
        "10" => "network disk",
        other => other,
    }
}

async fn memory_usage(device: &DeviceContext) -> Result<f64, CoreError> {
    let storages = storages(device).await?;
    let ram = storages
        .iter()
        .find(|s| s.kind == "ram")
        .ok_or_else(|| CoreError::not_found("no RAM entry in hrStorageTable"))?;
    percent(ram.used, ram.size)
}

async fn disk_storages(device: &DeviceContext) -> Result<Vec<DiskStorage>, CoreError> {
    let disks: Vec<DiskStorage> = storages(device)
        .await?
        .into_iter()
        .filter(|s| s.kind.ends_with("disk") && s.size > 0)
        .map(|s| DiskStorage {
            storage_type: Some(s.kind),
            description: s.description,
            available: Some(s.size.saturating_sub(s.used)),
            used: Some(s.used),
        })
        .collect();
    if disks.is_empty() {
        return Err(CoreError::not_found("no disks in hrStorageTable"));
    }
    Ok(disks)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use thola_transport::snmp::testing::{MockAgent, MockAgentBuilder};
    use thola_transport::snmp::{SessionOptions, SnmpClient, SnmpConnector, SnmpValue, SnmpVersion};
    use thola_transport::Oid;
    use tokio_util::sync::CancellationToken;

    use super::*;

    fn storage_row(
        agent: MockAgentBuilder,
        index: u32,
        kind: u32,
        descr: &str,
        (size, used): (u32, u32),
    ) -> MockAgentBuilder {
        let cell = |column: &[u32]| Oid::new(column.to_vec()).join(&[index]).to_string();
        agent
            .value(
                &cell(STORAGE_TYPE),
                SnmpValue::ObjectId(format!("{STORAGE_TYPES}{kind}").parse().unwrap()),
            )
            .value(&cell(STORAGE_DESCR), SnmpValue::OctetString(descr.as_bytes().to_vec()))
            .value(&cell(STORAGE_UNITS), SnmpValue::Integer(1024))
            .value(&cell(STORAGE_SIZE), SnmpValue::Integer(size.into()))
            .value(&cell(STORAGE_USED), SnmpValue::Integer(used.into()))
    }

    async fn device(agent: &Arc<MockAgent>) -> DeviceContext {
        let target = MockAgent::target(SnmpVersion::V2c, "public", 161);
        let session = agent
            .connector()
            .connect(&target, SessionOptions::default())
            .await
            .unwrap();
        DeviceContext::new(
            MockAgent::address(),
            Some(SnmpClient::new(session, target)),
            None,
            CancellationToken::new(),
        )
    }

    fn agent() -> Arc<MockAgent> {
        let builder = MockAgent::builder().accept(SnmpVersion::V2c, "public", 161);
        let builder = storage_row(builder, 1, 2, "Physical memory", (1000, 250));
        let builder = storage_row(builder, 3, 3, "Virtual memory", (2000, 300));
        let builder = storage_row(builder, 31, 4, "/", (4000, 1000));
        builder.build()
    }

    #[tokio::test]
    async fn memory_usage_from_ram_entry() {
        let agent = agent();
        let device = device(&agent).await;
        assert!((memory_usage(&device).await.unwrap() - 25.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn only_disks_are_storages() {
        let agent = agent();
        let device = device(&agent).await;
        let disks = disk_storages(&device).await.unwrap();
        assert_eq!(
            disks,
            [DiskStorage {
                storage_type: Some("fixed disk".into()),
                description: Some("/".into()),
                available: Some(3000 * 1024),
                used: Some(1000 * 1024),
            }]
        );
    }
}
