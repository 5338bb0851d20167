//! Output formatting: pretty tables or JSON.
//!
//! Checks print their plugin text in pretty mode. Interface reads get a
//! column per interesting counter; every other response is flattened
//! into a field/value table.

use std::io::{self, Write};

use serde_json::Value as Json;
use tabled::{Table, Tabled, settings::Style};

use thola_core::Response;
use thola_core::model::Interface;
use thola_core::model::components::IF_SPEED_SATURATED;

use crate::cli::OutputFormat;
use crate::error::CliError;

// ── Render dispatchers ───────────────────────────────────────────────

pub fn render(format: OutputFormat, response: &Response) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(response)?),
        OutputFormat::Pretty => match response {
            Response::Check(check) => Ok(check.raw_output.clone()),
            Response::Interfaces(read) => Ok(interface_table(&read.interfaces)),
            other => Ok(field_table(&serde_json::to_value(other)?)),
        },
    }
}

/// Print to stdout; logs go to stderr.
pub fn print_output(output: &str) {
    if output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Tables ───────────────────────────────────────────────────────────

#[derive(Tabled)]
struct InterfaceRow {
    #[tabled(rename = "Index")]
    index: String,
    #[tabled(rename = "Descr")]
    descr: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Admin")]
    admin: String,
    #[tabled(rename = "Oper")]
    oper: String,
    #[tabled(rename = "Speed")]
    speed: String,
    #[tabled(rename = "In Octets")]
    in_octets: String,
    #[tabled(rename = "Out Octets")]
    out_octets: String,
}

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".into(), |v| v.to_string())
}

fn interface_row(i: &Interface) -> InterfaceRow {
    let speed = i
        .if_high_speed
        .map(|mbit| mbit.saturating_mul(1_000_000))
        .filter(|_| i.if_speed.is_none_or(|s| s == IF_SPEED_SATURATED))
        .or(i.if_speed);
    InterfaceRow {
        index: cell(i.if_index),
        descr: cell(i.if_descr.as_deref().or(i.if_name.as_deref())),
        kind: cell(i.if_type.as_deref()),
        admin: cell(i.if_admin_status.as_deref()),
        oper: cell(i.if_oper_status.as_deref()),
        speed: cell(speed),
        in_octets: cell(i.if_hc_in_octets.or(i.if_in_octets)),
        out_octets: cell(i.if_hc_out_octets.or(i.if_out_octets)),
    }
}

fn interface_table(interfaces: &[Interface]) -> String {
    let rows: Vec<InterfaceRow> = interfaces.iter().map(interface_row).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// `{"cpu": {"load": [1, 2]}}` → `cpu.load[0] = 1`, `cpu.load[1] = 2`.
fn flatten(prefix: &str, value: &Json, rows: &mut Vec<FieldRow>) {
    match value {
        Json::Object(map) => {
            for (key, inner) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&path, inner, rows);
            }
        }
        Json::Array(items) => {
            for (i, inner) in items.iter().enumerate() {
                flatten(&format!("{prefix}[{i}]"), inner, rows);
            }
        }
        Json::String(s) => rows.push(FieldRow {
            field: prefix.into(),
            value: s.clone(),
        }),
        other => rows.push(FieldRow {
            field: prefix.into(),
            value: other.to_string(),
        }),
    }
}

fn field_table(value: &Json) -> String {
    let mut rows = Vec::new();
    flatten("", value, &mut rows);
    if rows.is_empty() {
        return "no data".into();
    }
    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_values_flatten_to_paths() {
        let mut rows = Vec::new();
        flatten(
            "",
            &json!({ "class": "cisco/ios", "properties": { "vendor": "Cisco" }, "load": [1.5, 2] }),
            &mut rows,
        );
        let mut fields: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.field.as_str(), r.value.as_str()))
            .collect();
        fields.sort_unstable();
        assert_eq!(
            fields,
            [
                ("class", "cisco/ios"),
                ("load[0]", "1.5"),
                ("load[1]", "2"),
                ("properties.vendor", "Cisco"),
            ]
        );
    }

    #[test]
    fn saturated_speed_uses_high_speed() {
        let row = interface_row(&Interface {
            if_index: Some(3),
            if_speed: Some(IF_SPEED_SATURATED),
            if_high_speed: Some(10_000),
            ..Interface::default()
        });
        assert_eq!(row.speed, "10000000000");
        assert_eq!(row.descr, "-");
    }
}
