use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Properties read once a class has been resolved.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IdentifyProperty {
    Vendor,
    Model,
    ModelSeries,
    SerialNumber,
    OsVersion,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Properties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_series: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
}

impl Properties {
    pub fn get(&self, property: IdentifyProperty) -> Option<&str> {
        match property {
            IdentifyProperty::Vendor => self.vendor.as_deref(),
            IdentifyProperty::Model => self.model.as_deref(),
            IdentifyProperty::ModelSeries => self.model_series.as_deref(),
            IdentifyProperty::SerialNumber => self.serial_number.as_deref(),
            IdentifyProperty::OsVersion => self.os_version.as_deref(),
        }
    }

    pub fn set(&mut self, property: IdentifyProperty, value: String) {
        let slot = match property {
            IdentifyProperty::Vendor => &mut self.vendor,
            IdentifyProperty::Model => &mut self.model,
            IdentifyProperty::ModelSeries => &mut self.model_series,
            IdentifyProperty::SerialNumber => &mut self.serial_number,
            IdentifyProperty::OsVersion => &mut self.os_version,
        };
        *slot = Some(value);
    }
}

/// Result of `identify`: the resolved class and its properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyResponse {
    pub class: String,
    #[serde(default)]
    pub properties: Properties,
}
