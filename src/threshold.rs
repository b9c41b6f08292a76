//! Status levels and warning/critical bounds.

use std::fmt;

/// Check outcome in the supervisor's convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl Status {
    /// Process exit code for this status
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Warning => "Warning",
            Status::Critical => "Critical",
            Status::Unknown => "Unknown",
        }
    }

    /// Keep the more severe of two statuses; a CRITICAL is never downgraded.
    pub fn worst(self, other: Status) -> Status {
        self.max(other)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Optional warning and critical bounds for one quantity.
///
/// Both bounds are inclusive. When both are present `warn < crit`, which
/// [`Threshold::new`] enforces.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Threshold {
    pub warn: Option<f64>,
    pub crit: Option<f64>,
}

impl Threshold {
    pub fn new(warn: Option<f64>, crit: Option<f64>) -> Result<Self, String> {
        if let (Some(w), Some(c)) = (warn, crit) {
            if w >= c {
                return Err(format!(
                    "Warning({w}) threshold should be less than critical({c})"
                ));
            }
        }
        Ok(Threshold { warn, crit })
    }

    pub fn is_empty(&self) -> bool {
        self.warn.is_none() && self.crit.is_none()
    }

    /// Critical is tested first so it always wins over warning.
    pub fn evaluate(&self, value: f64) -> Status {
        match (self.warn, self.crit) {
            (_, Some(crit)) if value >= crit => Status::Critical,
            (Some(warn), _) if value >= warn => Status::Warning,
            _ => Status::Ok,
        }
    }

    /// Same bounds scaled by `factor` and truncated to whole units.
    pub fn scaled_whole(&self, factor: f64) -> Threshold {
        let scale = |bound: f64| (bound * factor).trunc();
        Threshold {
            warn: self.warn.map(scale),
            crit: self.crit.map(scale),
        }
    }
}

/// Evaluate `value` against an optional threshold; no threshold means OK.
pub fn evaluate(value: f64, threshold: Option<&Threshold>) -> Status {
    threshold.map_or(Status::Ok, |t| t.evaluate(value))
}

/// Evaluate several quantities independently and keep the worst status.
pub fn evaluate_all<'a>(
    quantities: impl IntoIterator<Item = (f64, Option<&'a Threshold>)>,
) -> Status {
    quantities
        .into_iter()
        .map(|(value, threshold)| evaluate(value, threshold))
        .fold(Status::Ok, Status::worst)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(warn: f64, crit: f64) -> Threshold {
        Threshold::new(Some(warn), Some(crit)).unwrap()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Status::Ok.code(), 0);
        assert_eq!(Status::Warning.code(), 1);
        assert_eq!(Status::Critical.code(), 2);
        assert_eq!(Status::Unknown.code(), 3);
    }

    #[test]
    fn test_evaluate_no_threshold_is_ok() {
        assert_eq!(evaluate(1e12, None), Status::Ok);
        assert_eq!(evaluate(1e12, Some(&Threshold::default())), Status::Ok);
    }

    #[test]
    fn test_evaluate_bands() {
        let t = pair(80.0, 90.0);
        assert_eq!(t.evaluate(79.99), Status::Ok);
        assert_eq!(t.evaluate(85.0), Status::Warning);
        assert_eq!(t.evaluate(95.0), Status::Critical);
    }

    #[test]
    fn test_evaluate_boundaries_inclusive() {
        let t = pair(80.0, 90.0);
        assert_eq!(t.evaluate(80.0), Status::Warning);
        assert_eq!(t.evaluate(90.0), Status::Critical);
    }

    #[test]
    fn test_single_bound_evaluates_alone() {
        let crit_only = Threshold::new(None, Some(10.0)).unwrap();
        assert_eq!(crit_only.evaluate(9.0), Status::Ok);
        assert_eq!(crit_only.evaluate(10.0), Status::Critical);

        let warn_only = Threshold::new(Some(5.0), None).unwrap();
        assert_eq!(warn_only.evaluate(100.0), Status::Warning);
    }

    #[test]
    fn test_new_rejects_warn_not_below_crit() {
        assert!(Threshold::new(Some(90.0), Some(80.0)).is_err());
        assert!(Threshold::new(Some(90.0), Some(90.0)).is_err());
        assert!(Threshold::new(Some(80.0), Some(90.0)).is_ok());
    }

    #[test]
    fn test_evaluate_all_keeps_worst() {
        let load1 = pair(1.0, 2.0);
        let load5 = pair(1.0, 2.0);
        let status = evaluate_all([(3.0, Some(&load1)), (1.5, Some(&load5))]);
        assert_eq!(status, Status::Critical);

        let status = evaluate_all([(1.5, Some(&load1)), (0.5, None)]);
        assert_eq!(status, Status::Warning);
    }

    #[test]
    fn test_scaled_whole_truncates() {
        let t = pair(80.0, 90.0).scaled_whole(1000.5 / 100.0);
        assert_eq!(t.warn, Some(800.0));
        assert_eq!(t.crit, Some(900.0));
    }
}
