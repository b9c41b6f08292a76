//! Check results and their single-line rendering.
//!
//! Grammar: `<summary> | <name>=<value><unit>[;<warn>;<crit>[;<min>;<max>]] ...`
//! with values at two decimals and bounds in their shortest form.

use std::fmt;

use crate::error::{ProbeError, Result};
use crate::threshold::{Status, Threshold};

/// One performance-data entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PerfData {
    pub name: &'static str,
    pub value: f64,
    pub unit: &'static str,
    pub threshold: Option<Threshold>,
    /// Whole-unit `min;max`, printed exactly
    pub range: Option<(u64, u64)>,
}

impl PerfData {
    pub fn new(name: &'static str, value: f64) -> Self {
        PerfData {
            name,
            value,
            unit: "",
            threshold: None,
            range: None,
        }
    }

    pub fn unit(mut self, unit: &'static str) -> Self {
        self.unit = unit;
        self
    }

    pub fn threshold(mut self, threshold: Option<&Threshold>) -> Self {
        self.threshold = threshold.copied();
        self
    }

    pub fn range(mut self, min: u64, max: u64) -> Self {
        self.range = Some((min, max));
        self
    }
}

impl fmt::Display for PerfData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:.2}{}", self.name, self.value, self.unit)?;
        if self.threshold.is_none() && self.range.is_none() {
            return Ok(());
        }
        let threshold = self.threshold.unwrap_or_default();
        write!(f, ";{};{}", Bound(threshold.warn), Bound(threshold.crit))?;
        if let Some((min, max)) = self.range {
            write!(f, ";{min};{max}")?;
        }
        Ok(())
    }
}

/// A threshold bound; absent bounds render as an empty field.
struct Bound(Option<f64>);

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{value}"),
            None => Ok(()),
        }
    }
}

/// Outcome of one check: status, summary text and performance data.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub status: Status,
    pub summary: String,
    pub perfdata: Vec<PerfData>,
}

impl CheckResult {
    pub fn new(status: Status, summary: String, perfdata: Vec<PerfData>) -> Self {
        CheckResult {
            status,
            summary,
            perfdata,
        }
    }

    /// A result without performance data, used for bootstrap and diagnostics.
    pub fn message(status: Status, summary: impl Into<String>) -> Self {
        CheckResult {
            status,
            summary: summary.into(),
            perfdata: Vec::new(),
        }
    }

    /// First observation of a source: nothing to diff against yet.
    pub fn bootstrap(source: Option<&str>) -> Self {
        let mut summary = String::from("This was the first run, run again to get values");
        if let Some(source) = source {
            summary.push_str(": ");
            summary.push_str(source);
        }
        Self::message(Status::Unknown, summary)
    }

    /// Counters went backwards since the stored sample.
    pub fn counter_reset(fields: &[&str]) -> Self {
        Self::message(
            Status::Unknown,
            format!(
                "Counter reset detected ({}), run again to get values",
                fields.join(", ")
            ),
        )
    }

    /// Refuse to emit NaN or infinite performance data.
    pub fn ensure_finite(self) -> Result<Self> {
        if let Some(bad) = self.perfdata.iter().find(|p| !p.value.is_finite()) {
            return Err(ProbeError::computation(format!("{} (got {})", bad.name, bad.value)));
        }
        Ok(self)
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary)?;
        for (idx, entry) in self.perfdata.iter().enumerate() {
            f.write_str(if idx == 0 { " | " } else { " " })?;
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}

/// Append the ` (OK)` style suffix used when thresholds were supplied.
pub fn push_status(summary: &mut String, status: Status) {
    summary.push_str(" (");
    summary.push_str(status.label());
    summary.push(')');
}
