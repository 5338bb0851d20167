// ── Communicator ──
//
// Per-request facade over a resolved device class. Every metric resolves
// through the class's code overrides (nearest class first) and then its
// declarative readers. Component assemblers are empty-aware: absent
// sub-metrics are skipped, and a component with nothing at all is
// `NotFound`.

pub mod overrides;

use std::sync::Arc;

use tracing::{debug, trace};

use crate::class::DeviceClass;
use crate::device::DeviceContext;
use crate::error::CoreError;
use crate::model::{
    Component, CpuComponent, DiskComponent, DiskStorage, HardwareHealthComponent,
    HardwareHealthState, HighAvailabilityComponent, IdentifyProperty, Interface, MemoryComponent,
    Properties, SbcAgent, SbcComponent, SbcRealm, ServerComponent, SiemComponent, UpsComponent,
};
use crate::reader::{Row, RowFilter, Scope};
use crate::value::Value;

pub use overrides::{ClassOverrides, OverrideRegistry};

/// `NotFound`/`NotImplemented` become `None`; everything else propagates.
pub fn optional<T>(result: Result<T, CoreError>) -> Result<Option<T>, CoreError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_absent() => {
            trace!(reason = %e, "value absent");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn deserialize_rows<T: serde::de::DeserializeOwned>(rows: &[Row]) -> Result<Vec<T>, CoreError> {
    rows.iter()
        .map(|row| Ok(serde_json::from_value(row.to_json_object().into())?))
        .collect()
}

/// Numeric cells of a single-valued table, one per row.
fn row_values(rows: &[Row]) -> Result<Vec<f64>, CoreError> {
    rows.iter()
        .filter_map(|row| row.values.values().next())
        .map(Value::as_f64)
        .collect()
}

pub struct Communicator<'a> {
    device: &'a DeviceContext,
    class: Arc<DeviceClass>,
    overrides: Vec<Arc<dyn ClassOverrides>>,
}

impl<'a> Communicator<'a> {
    /// `overrides` are ordered nearest class first.
    pub fn new(
        device: &'a DeviceContext,
        class: Arc<DeviceClass>,
        overrides: Vec<Arc<dyn ClassOverrides>>,
    ) -> Self {
        Self {
            device,
            class,
            overrides,
        }
    }

    pub fn class(&self) -> &DeviceClass {
        &self.class
    }

    pub fn device(&self) -> &DeviceContext {
        self.device
    }

    fn scope(&self) -> Scope<'_> {
        Scope::new(self.device, &self.class)
    }

    fn require(&self, component: Component) -> Result<(), CoreError> {
        if self.class.is_enabled(component) {
            Ok(())
        } else {
            Err(CoreError::ComponentNotFound {
                component: component.to_string(),
                class: self.class.name().to_owned(),
            })
        }
    }

    pub fn available_components(&self) -> Vec<Component> {
        self.class.enabled_components().collect()
    }

    // ── Identify ─────────────────────────────────────────────────────

    pub async fn identify_property(&self, property: IdentifyProperty) -> Result<String, CoreError> {
        let reader = self
            .class
            .identify_reader(property)
            .ok_or_else(|| CoreError::not_implemented(property.to_string()))?;
        let value = reader.get(self.scope()).await?;
        if value.is_empty() {
            return Err(CoreError::not_found(property.to_string()));
        }
        Ok(value.to_text())
    }

    /// Every identify property the class can read; absent ones are skipped.
    pub async fn properties(&self) -> Result<Properties, CoreError> {
        use strum::IntoEnumIterator;

        let mut properties = Properties::default();
        for property in IdentifyProperty::iter() {
            if let Some(value) = optional(self.identify_property(property).await)? {
                properties.set(property, value);
            }
        }
        Ok(properties)
    }

    // ── Declarative access ───────────────────────────────────────────

    /// Read one scalar metric through the class's reader.
    pub async fn metric(&self, component: Component, key: &str) -> Result<Value, CoreError> {
        let reader = self
            .class
            .components(component)
            .and_then(|c| c.metrics.get(key))
            .ok_or_else(|| CoreError::not_implemented(format!("{component}.{key}")))?;
        reader.get(self.scope()).await
    }

    pub async fn metric_f64(&self, component: Component, key: &str) -> Result<f64, CoreError> {
        self.metric(component, key).await?.as_f64()
    }

    pub async fn metric_i64(&self, component: Component, key: &str) -> Result<i64, CoreError> {
        self.metric(component, key).await?.as_i64()
    }

    pub async fn metric_bool(&self, component: Component, key: &str) -> Result<bool, CoreError> {
        self.metric(component, key).await?.as_bool()
    }

    pub async fn metric_text(&self, component: Component, key: &str) -> Result<String, CoreError> {
        Ok(self.metric(component, key).await?.to_text())
    }

    /// Read one table through the class's group reader.
    pub async fn table(
        &self,
        component: Component,
        key: &str,
        filters: &[RowFilter],
    ) -> Result<Vec<Row>, CoreError> {
        let reader = self
            .class
            .components(component)
            .and_then(|c| c.tables.get(key))
            .ok_or_else(|| CoreError::not_implemented(format!("{component}.{key}")))?;
        reader.read(self.device, filters).await
    }

    // ── Interfaces ───────────────────────────────────────────────────

    pub async fn interfaces(&self, filters: &[RowFilter]) -> Result<Vec<Interface>, CoreError> {
        self.require(Component::Interfaces)?;
        let rows = self.table(Component::Interfaces, "table", filters).await?;
        let mut interfaces: Vec<Interface> = deserialize_rows(&rows)?;
        for (iface, row) in interfaces.iter_mut().zip(&rows) {
            if iface.if_index.is_none() {
                if let [index] = row.index.as_slice() {
                    iface.if_index = Some(u64::from(*index));
                }
            }
            iface.normalize_speed();
        }
        debug!(count = interfaces.len(), "interfaces read");
        Ok(interfaces)
    }

    pub async fn count_interfaces(&self) -> Result<usize, CoreError> {
        self.require(Component::Interfaces)?;
        let columns = self
            .class
            .components(Component::Interfaces)
            .and_then(|c| c.tables.get("table"))
            .map(|t| t.columns().keys().take(1).cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        let rows = self
            .table(
                Component::Interfaces,
                "table",
                &[RowFilter::IncludeOnly(columns)],
            )
            .await?;
        Ok(rows.len())
    }

    // ── CPU / memory / server ────────────────────────────────────────

    pub async fn cpu_load(&self) -> Result<Vec<f64>, CoreError> {
        self.require(Component::Cpu)?;
        row_values(&self.table(Component::Cpu, "load", &[]).await?)
    }

    pub async fn cpu_temperature(&self) -> Result<Vec<f64>, CoreError> {
        self.require(Component::Cpu)?;
        row_values(&self.table(Component::Cpu, "temperature", &[]).await?)
    }

    pub async fn cpu_component(&self) -> Result<CpuComponent, CoreError> {
        self.require(Component::Cpu)?;
        let cpu = CpuComponent {
            load: optional(self.cpu_load().await)?.unwrap_or_default(),
            temperature: optional(self.cpu_temperature().await)?.unwrap_or_default(),
        };
        non_empty(cpu, Component::Cpu)
    }

    pub async fn memory_usage(&self) -> Result<f64, CoreError> {
        self.require(Component::Memory)?;
        for set in &self.overrides {
            if let Some(result) = set.memory_usage(self.scope()).await {
                return result;
            }
        }
        self.metric_f64(Component::Memory, "usage").await
    }

    pub async fn memory_component(&self) -> Result<MemoryComponent, CoreError> {
        let memory = MemoryComponent {
            usage: optional(self.memory_usage().await)?,
        };
        non_empty(memory, Component::Memory)
    }

    pub async fn server_component(&self) -> Result<ServerComponent, CoreError> {
        self.require(Component::Server)?;
        let server = ServerComponent {
            procs: optional(self.metric_i64(Component::Server, "procs").await)?,
            users: optional(self.metric_i64(Component::Server, "users").await)?,
        };
        non_empty(server, Component::Server)
    }

    // ── UPS ──────────────────────────────────────────────────────────

    pub async fn ups_component(&self) -> Result<UpsComponent, CoreError> {
        const C: Component = Component::Ups;
        self.require(C)?;
        let ups = UpsComponent {
            alarm_low_voltage_disconnect: optional(
                self.metric_i64(C, "alarm_low_voltage_disconnect").await,
            )?,
            battery_amperage: optional(self.metric_f64(C, "battery_amperage").await)?,
            battery_capacity: optional(self.metric_f64(C, "battery_capacity").await)?,
            battery_current: optional(self.metric_f64(C, "battery_current").await)?,
            battery_remaining_time: optional(self.metric_f64(C, "battery_remaining_time").await)?,
            battery_temperature: optional(self.metric_f64(C, "battery_temperature").await)?,
            battery_voltage: optional(self.metric_f64(C, "battery_voltage").await)?,
            current_load: optional(self.metric_f64(C, "current_load").await)?,
            mains_voltage_applied: optional(self.metric_bool(C, "mains_voltage_applied").await)?,
            rectifier_current: optional(self.metric_f64(C, "rectifier_current").await)?,
            system_voltage: optional(self.metric_f64(C, "system_voltage").await)?,
        };
        non_empty(ups, C)
    }

    // ── SBC ──────────────────────────────────────────────────────────

    pub async fn sbc_agents(&self) -> Result<Vec<SbcAgent>, CoreError> {
        self.require(Component::Sbc)?;
        deserialize_rows(&self.table(Component::Sbc, "agents", &[]).await?)
    }

    pub async fn sbc_realms(&self) -> Result<Vec<SbcRealm>, CoreError> {
        self.require(Component::Sbc)?;
        deserialize_rows(&self.table(Component::Sbc, "realms", &[]).await?)
    }

    pub async fn sbc_component(&self) -> Result<SbcComponent, CoreError> {
        const C: Component = Component::Sbc;
        self.require(C)?;
        let sbc = SbcComponent {
            agents: optional(self.sbc_agents().await)?.unwrap_or_default(),
            realms: optional(self.sbc_realms().await)?.unwrap_or_default(),
            global_call_per_second: optional(self.metric_i64(C, "global_call_per_second").await)?,
            global_concurrent_sessions: optional(
                self.metric_i64(C, "global_concurrent_sessions").await,
            )?,
            active_local_contacts: optional(self.metric_i64(C, "active_local_contacts").await)?,
            transcoding_capacity: optional(self.metric_i64(C, "transcoding_capacity").await)?,
            license_capacity: optional(self.metric_i64(C, "license_capacity").await)?,
            system_redundancy: optional(self.metric_i64(C, "system_redundancy").await)?,
            system_health_score: optional(self.metric_i64(C, "system_health_score").await)?,
        };
        non_empty(sbc, C)
    }

    // ── Hardware health ──────────────────────────────────────────────

    async fn health_states(&self, key: &str) -> Result<Vec<HardwareHealthState>, CoreError> {
        deserialize_rows(&self.table(Component::HardwareHealth, key, &[]).await?)
    }

    pub async fn hardware_health_component(&self) -> Result<HardwareHealthComponent, CoreError> {
        const C: Component = Component::HardwareHealth;
        self.require(C)?;
        let health = HardwareHealthComponent {
            environment_monitor_state: optional(
                self.metric_text(C, "environment_monitor_state").await,
            )?,
            fans: optional(self.health_states("fans").await)?.unwrap_or_default(),
            power_supply: optional(self.health_states("power_supply").await)?.unwrap_or_default(),
            temperature: optional(self.health_states("temperature").await)?.unwrap_or_default(),
            voltage: optional(self.health_states("voltage").await)?.unwrap_or_default(),
        };
        non_empty(health, C)
    }

    // ── High availability / disk / SIEM ──────────────────────────────

    pub async fn high_availability_component(
        &self,
    ) -> Result<HighAvailabilityComponent, CoreError> {
        const C: Component = Component::HighAvailability;
        self.require(C)?;
        let ha = HighAvailabilityComponent {
            role: optional(self.metric_text(C, "role").await)?,
            nodes: optional(self.metric_i64(C, "nodes").await)?,
        };
        non_empty(ha, C)
    }

    pub async fn disk_storages(&self) -> Result<Vec<DiskStorage>, CoreError> {
        self.require(Component::Disk)?;
        for set in &self.overrides {
            if let Some(result) = set.disk_storages(self.scope()).await {
                return result;
            }
        }
        deserialize_rows(&self.table(Component::Disk, "storages", &[]).await?)
    }

    pub async fn disk_component(&self) -> Result<DiskComponent, CoreError> {
        let disk = DiskComponent {
            storages: optional(self.disk_storages().await)?.unwrap_or_default(),
        };
        non_empty(disk, Component::Disk)
    }

    pub async fn siem_component(&self) -> Result<SiemComponent, CoreError> {
        const C: Component = Component::Siem;
        self.require(C)?;
        let siem = SiemComponent {
            last_recorded_messages_per_second: optional(
                self.metric_f64(C, "last_recorded_messages_per_second").await,
            )?,
            average_messages_per_second: optional(
                self.metric_f64(C, "average_messages_per_second").await,
            )?,
            last_processed_messages_per_second: optional(
                self.metric_f64(C, "last_processed_messages_per_second").await,
            )?,
            system_version: optional(self.metric_text(C, "system_version").await)?,
            cpu_load: optional(self.metric_f64(C, "cpu_load").await)?,
            memory_usage: optional(self.metric_f64(C, "memory_usage").await)?,
            queue_length: optional(self.metric_i64(C, "queue_length").await)?,
        };
        non_empty(siem, C)
    }
}

fn non_empty<T: Default + PartialEq>(component: T, kind: Component) -> Result<T, CoreError> {
    if component == T::default() {
        Err(CoreError::not_found(format!("no {kind} data")))
    } else {
        Ok(component)
    }
}
