// ── Check layer ──
//
// Monitoring-plugin verdicts: thresholds, performance data and the
// aggregate status of a check. The overall status is the worst one seen
// (OK < WARNING < CRITICAL < UNKNOWN).

pub mod handlers;

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::CoreError;
use crate::model::SnmpConnectionData;
use crate::value::Value;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Status {
    #[default]
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Status {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::Warning => 1,
            Self::Critical => 2,
            Self::Unknown => 3,
        }
    }
}

// ── Thresholds ──────────────────────────────────────────────────────

/// `crit_min <= warn_min <= warn_max <= crit_max` wherever both sides are set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Thresholds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warn_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warn_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crit_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crit_max: Option<f64>,
}

impl Thresholds {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self, field: &str) -> Result<(), CoreError> {
        let bounds = [
            ("critMin", self.crit_min),
            ("warnMin", self.warn_min),
            ("warnMax", self.warn_max),
            ("critMax", self.crit_max),
        ];
        if let Some((name, _)) = bounds.iter().find(|(_, v)| v.is_some_and(f64::is_nan)) {
            return Err(CoreError::validation(field, format!("{name} is not a number")));
        }
        for (i, (low_name, low)) in bounds.iter().enumerate() {
            for (high_name, high) in bounds.iter().skip(i + 1) {
                if let (Some(low), Some(high)) = (low, high) {
                    if low > high {
                        return Err(CoreError::validation(
                            field,
                            format!("{low_name} ({low}) is greater than {high_name} ({high})"),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn check(&self, x: f64) -> Status {
        let below = |bound: Option<f64>| bound.is_some_and(|b| x < b);
        let above = |bound: Option<f64>| bound.is_some_and(|b| x > b);
        if below(self.crit_min) || above(self.crit_max) {
            Status::Critical
        } else if below(self.warn_min) || above(self.warn_max) {
            Status::Warning
        } else {
            Status::Ok
        }
    }

    fn range(min: Option<f64>, max: Option<f64>) -> String {
        match (min, max) {
            (None, None) => String::new(),
            (None, Some(max)) => format!("{max}"),
            (Some(min), None) => format!("{min}:"),
            (Some(min), Some(max)) => format!("{min}:{max}"),
        }
    }

    /// Plugin range syntax of the warning bracket.
    pub fn warn_range(&self) -> String {
        Self::range(self.warn_min, self.warn_max)
    }

    pub fn crit_range(&self) -> String {
        Self::range(self.crit_min, self.crit_max)
    }

    fn describe(&self, status: Status, x: f64) -> String {
        let (min, max) = match status {
            Status::Critical => (self.crit_min, self.crit_max),
            _ => (self.warn_min, self.warn_max),
        };
        match (min, max) {
            (Some(min), _) if x < min => format!("below {min}"),
            (_, Some(max)) if x > max => format!("above {max}"),
            _ => String::new(),
        }
    }
}

// ── Performance data ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfDataPoint {
    pub label: String,
    pub value: Value,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub unit: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub warn: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub crit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl PerfDataPoint {
    pub fn new(label: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            unit: String::new(),
            warn: String::new(),
            crit: String::new(),
            min: None,
            max: None,
        }
    }

    #[must_use]
    pub fn unit(mut self, unit: &str) -> Self {
        unit.clone_into(&mut self.unit);
        self
    }

    #[must_use]
    pub fn bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    #[must_use]
    pub fn thresholds(mut self, thresholds: &Thresholds) -> Self {
        self.warn = thresholds.warn_range();
        self.crit = thresholds.crit_range();
        self
    }
}

/// `'label'=value[uom];warn;crit;min;max`
impl fmt::Display for PerfDataPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |b: Option<f64>| b.map(|v| v.to_string()).unwrap_or_default();
        write!(
            f,
            "'{}'={}{};{};{};{};{}",
            self.label.replace('\'', "\"").replace('=', "_"),
            self.value,
            self.unit,
            self.warn,
            self.crit,
            bound(self.min),
            bound(self.max)
        )
    }
}

// ── Check plugin ────────────────────────────────────────────────────

/// A field of `check identify` that did not meet its expectation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedExpectation {
    pub field: String,
    pub expected: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub got: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CheckPlugin {
    status: Status,
    messages: Vec<(Status, String)>,
    perf_data: Vec<PerfDataPoint>,
    failed_expectations: Vec<FailedExpectation>,
    long_output: Vec<String>,
}

impl CheckPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Raise the overall status; `OK` messages are kept as informational lines.
    pub fn update(&mut self, status: Status, message: impl Into<String>) {
        self.status = self.status.max(status);
        self.messages.push((status, message.into()));
    }

    /// Add a perf data point and fold its threshold verdict into the status.
    pub fn add_metric(&mut self, point: PerfDataPoint, thresholds: Option<&Thresholds>) {
        if let Some(thresholds) = thresholds.filter(|t| !t.is_empty()) {
            let point = point.thresholds(thresholds);
            if let Ok(x) = point.value.as_f64() {
                let status = thresholds.check(x);
                if status != Status::Ok {
                    let message = format!(
                        "{} is {}{} ({})",
                        point.label,
                        point.value,
                        point.unit,
                        thresholds.describe(status, x)
                    );
                    self.update(status, message);
                }
            }
            self.perf_data.push(point);
        } else {
            self.perf_data.push(point);
        }
    }

    pub fn add_perf(&mut self, point: PerfDataPoint) {
        self.perf_data.push(point);
    }

    pub fn fail_expectation(&mut self, status: Status, failed: FailedExpectation) {
        let message = match &failed.got {
            Some(got) => format!("{} is '{got}', expected '{}'", failed.field, failed.expected),
            None => format!("{} is unknown, expected '{}'", failed.field, failed.expected),
        };
        self.update(status, message);
        self.failed_expectations.push(failed);
    }

    /// Text appended to the output regardless of status.
    pub fn append_output(&mut self, text: impl Into<String>) {
        self.long_output.push(text.into());
    }

    pub fn perf_data(&self) -> &[PerfDataPoint] {
        &self.perf_data
    }

    /// `STATUS: first message | perf data`, then one line per further message.
    pub fn output(&self) -> String {
        let mut lines: Vec<&str> = self
            .messages
            .iter()
            .filter(|(status, _)| *status != Status::Ok || self.status == Status::Ok)
            .map(|(_, message)| message.as_str())
            .collect();
        let mut out = self.status.to_string();
        if !lines.is_empty() {
            out.push_str(": ");
            out.push_str(lines.remove(0));
        }
        if !self.perf_data.is_empty() {
            out.push_str(" | ");
            let perf: Vec<String> = self.perf_data.iter().map(ToString::to_string).collect();
            out.push_str(&perf.join(" "));
        }
        for line in lines.into_iter().chain(self.long_output.iter().map(String::as_str)) {
            out.push('\n');
            out.push_str(line);
        }
        out
    }

    pub fn finish(self) -> CheckResponse {
        CheckResponse {
            exit_code: self.status.exit_code(),
            raw_output: self.output(),
            perf_data: self.perf_data,
            failed_expectations: if self.failed_expectations.is_empty() {
                None
            } else {
                Some(self.failed_expectations)
            },
            successful_snmp_credentials: None,
        }
    }

    /// A check that could not run at all.
    pub fn unknown(error: &CoreError) -> CheckResponse {
        let mut plugin = Self::new();
        plugin.update(Status::Unknown, error.to_string());
        plugin.finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub exit_code: i32,
    pub raw_output: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub perf_data: Vec<PerfDataPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_expectations: Option<Vec<FailedExpectation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successful_snmp_credentials: Option<SnmpConnectionData>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn thresholds(warn: (Option<f64>, Option<f64>), crit: (Option<f64>, Option<f64>)) -> Thresholds {
        Thresholds {
            warn_min: warn.0,
            warn_max: warn.1,
            crit_min: crit.0,
            crit_max: crit.1,
        }
    }

    #[test]
    fn severity_brackets() {
        let t = thresholds((Some(10.0), Some(80.0)), (Some(5.0), Some(90.0)));
        assert_eq!(t.check(50.0), Status::Ok);
        assert_eq!(t.check(80.0), Status::Ok);
        assert_eq!(t.check(85.0), Status::Warning);
        assert_eq!(t.check(95.0), Status::Critical);
        assert_eq!(t.check(7.0), Status::Warning);
        assert_eq!(t.check(1.0), Status::Critical);
    }

    #[test]
    fn severity_is_monotonic_on_each_side() {
        let t = thresholds((Some(10.0), Some(80.0)), (Some(5.0), Some(90.0)));
        let mid = 45.0;
        let mut previous = Status::Ok;
        for step in 0..200 {
            let x = mid + f64::from(step) * 0.5;
            let status = t.check(x);
            assert!(status >= previous, "{x}");
            previous = status;
        }
        previous = Status::Ok;
        for step in 0..200 {
            let x = mid - f64::from(step) * 0.5;
            let status = t.check(x);
            assert!(status >= previous, "{x}");
            previous = status;
        }
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let t = thresholds((None, Some(95.0)), (None, Some(90.0)));
        let err = t.validate("memoryUsage").unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
        assert!(thresholds((Some(1.0), None), (None, Some(2.0))).validate("x").is_ok());
    }

    #[test]
    fn warning_message_carries_the_value() {
        let mut plugin = CheckPlugin::new();
        let t = thresholds((None, Some(80.0)), (None, Some(90.0)));
        plugin.add_metric(PerfDataPoint::new("memory_usage", 85.0).unit("%"), Some(&t));
        let response = plugin.finish();

        assert_eq!(response.exit_code, 1);
        assert_eq!(
            response.raw_output,
            "WARNING: memory_usage is 85% (above 80) | 'memory_usage'=85%;80;90;;"
        );
    }

    #[test]
    fn worst_status_wins() {
        let mut plugin = CheckPlugin::new();
        plugin.update(Status::Critical, "fan 1 failed");
        plugin.update(Status::Warning, "psu 2 degraded");
        plugin.update(Status::Ok, "all else fine");
        assert_eq!(plugin.status(), Status::Critical);
        assert_eq!(plugin.output(), "CRITICAL: fan 1 failed\npsu 2 degraded");
    }

    #[test]
    fn unknown_response_has_exit_code_three() {
        let response = CheckPlugin::unknown(&CoreError::Network("failed to create snmp connection".into()));
        assert_eq!(response.exit_code, 3);
        assert!(response.raw_output.starts_with("UNKNOWN: network error: failed to create snmp connection"));
    }
}
