// Syntactic request checks, run before any I/O.

use std::net::IpAddr;

use crate::device::setup::{candidates, v3_credentials};
use crate::error::CoreError;
use crate::model::ConnectionData;

use super::types::Request;

const VERSIONS: [&str; 3] = ["1", "2c", "3"];

/// The request's target address; `None` for kinds that never touch a device.
pub fn validate(request: &Request) -> Result<Option<IpAddr>, CoreError> {
    for (field, thresholds) in request.kind.thresholds() {
        thresholds.validate(field)?;
    }
    if let Some(options) = request.kind.interface_options() {
        options.row_filters()?;
    }
    if request.base.timeout == Some(0) {
        return Err(CoreError::validation("timeout", "must be greater than zero"));
    }
    if request.kind.is_local() {
        return Ok(None);
    }

    let raw = request.base.device_data.ip_address.trim();
    if raw.is_empty() {
        return Err(CoreError::validation("deviceData.ipAddress", "is required"));
    }
    let ip = raw
        .parse::<IpAddr>()
        .map_err(|_| CoreError::validation("deviceData.ipAddress", format!("'{raw}' is not an IP address")))?;

    validate_connection(&request.base.device_data.connection_data)?;
    Ok(Some(ip))
}

pub fn validate_connection(data: &ConnectionData) -> Result<(), CoreError> {
    let snmp = &data.snmp;
    if let Some(version) = snmp.versions.iter().find(|v| !VERSIONS.contains(&v.as_str())) {
        return Err(CoreError::validation(
            "connectionData.snmp.versions",
            format!("unknown version '{version}', expected one of 1, 2c, 3"),
        ));
    }
    let ports = snmp
        .ports
        .iter()
        .map(|p| ("connectionData.snmp.ports", p))
        .chain(data.http.http_ports.iter().map(|p| ("connectionData.http.httpPorts", p)))
        .chain(data.http.https_ports.iter().map(|p| ("connectionData.http.httpsPorts", p)));
    for (field, port) in ports {
        if *port == 0 {
            return Err(CoreError::validation(field, "port 0 is not allowed"));
        }
    }
    if snmp.discover_parallel == Some(0) {
        return Err(CoreError::validation(
            "connectionData.snmp.discoverParallel",
            "must be at least 1",
        ));
    }
    if snmp.discover_timeout == Some(0) {
        return Err(CoreError::validation(
            "connectionData.snmp.discoverTimeout",
            "must be greater than zero",
        ));
    }
    for v3 in &snmp.v3_data {
        v3_credentials(v3)?;
    }
    candidates(snmp).map(|_| ())
}
