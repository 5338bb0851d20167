// Cisco: memory usage from CISCO-MEMORY-POOL-MIB, or from
// CISCO-PROCESS-MIB on platforms without memory pools.

use async_trait::async_trait;

use super::{ClassOverrides, percent, walk_columns};
use crate::error::CoreError;
use crate::reader::{Row, Scope};

const POOL_USED: &[u32] = &[1, 3, 6, 1, 4, 1, 9, 9, 48, 1, 1, 1, 5];
const POOL_FREE: &[u32] = &[1, 3, 6, 1, 4, 1, 9, 9, 48, 1, 1, 1, 6];
const CPM_MEMORY_USED: &[u32] = &[1, 3, 6, 1, 4, 1, 9, 9, 109, 1, 1, 1, 1, 12];
const CPM_MEMORY_FREE: &[u32] = &[1, 3, 6, 1, 4, 1, 9, 9, 109, 1, 1, 1, 1, 13];

pub struct CiscoOverrides;

#[async_trait]
impl ClassOverrides for CiscoOverrides {
    async fn memory_usage(&self, scope: Scope<'_>) -> Option<Result<f64, CoreError>> {
        let pools = walk_columns(scope.device, &[("used", POOL_USED), ("free", POOL_FREE)]).await;
        let result = match pools {
            Err(e) if e.is_absent() => {
                walk_columns(
                    scope.device,
                    &[("used", CPM_MEMORY_USED), ("free", CPM_MEMORY_FREE)],
                )
                .await
                .and_then(|rows| usage(&rows))
            }
            other => other.and_then(|rows| usage(&rows)),
        };
        Some(result)
    }
}

/// Used share of all pools together.
fn usage(rows: &[Row]) -> Result<f64, CoreError> {
    let mut used = 0u64;
    let mut free = 0u64;
    for row in rows {
        let (Some(u), Some(f)) = (row.get("used"), row.get("free")) else {
            continue;
        };
        used = used.saturating_add(u.as_u64()?);
        free = free.saturating_add(f.as_u64()?);
    }
    percent(used, used.saturating_add(free))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::value::Value;

    fn row(index: u32, used: i64, free: i64) -> Row {
        let mut values = IndexMap::new();
        values.insert("used".to_owned(), Value::Int(used));
        values.insert("free".to_owned(), Value::Int(free));
        Row {
            index: vec![index],
            values,
        }
    }

    #[test]
    fn pools_are_summed() {
        let rows = [row(1, 300, 700), row(2, 100, 900)];
        assert!((usage(&rows).unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn incomplete_rows_are_skipped() {
        let mut partial = row(3, 1, 1);
        partial.values.shift_remove("free");
        let rows = [row(1, 50, 50), partial];
        assert!((usage(&rows).unwrap() - 50.0).abs() < 1e-9);
    }
}
