//! Delta/rate engine.
//!
//! Turns two snapshots of monotonically increasing kernel counters into
//! per-second rates. The previous snapshot comes from the sample store and
//! its age is the divisor. Deltas are signed: a counter that went backwards
//! yields a negative rate here, and [`open_window`] is where that is
//! recognised as a counter reset.

use std::time::Duration;

use crate::error::{ProbeError, Result};
use crate::report::CheckResult;
use crate::store::{MetricKind, MetricSample, PreviousSample, SampleStore, SourceKey};

/// Elapsed wall-clock time between two samples, always positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    seconds: f64,
}

impl Interval {
    pub fn from_age(age: Duration) -> Result<Self> {
        Self::from_secs(age.as_secs_f64())
    }

    pub fn from_secs(seconds: f64) -> Result<Self> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(ProbeError::computation(format!(
                "rates over a {seconds:.2}s sampling interval"
            )));
        }
        Ok(Interval { seconds })
    }

    pub fn seconds(&self) -> f64 {
        self.seconds
    }

    /// Per-second change of one counter.
    #[inline]
    pub fn rate(&self, prev: u64, curr: u64) -> f64 {
        delta(prev, curr) / self.seconds
    }
}

/// Signed difference `curr - prev`.
#[inline]
pub fn delta(prev: u64, curr: u64) -> f64 {
    (curr as i128 - prev as i128) as f64
}

/// A fixed set of raw counters for one metric kind.
///
/// `FIELDS` names the counters in storage order; `counters` and
/// `from_counters` must agree with it.
pub trait CounterSet: Sized {
    const KIND: MetricKind;
    const FIELDS: &'static [&'static str];

    fn counters(&self) -> Vec<u64>;

    /// Rebuild from a slice already checked to hold `FIELDS.len()` values.
    fn from_counters(counters: &[u64]) -> Self;

    fn to_sample(&self) -> MetricSample {
        MetricSample {
            kind: Self::KIND,
            counters: self.counters(),
        }
    }
}

/// Decode a stored sample, rejecting a different kind or field count.
pub fn decode<C: CounterSet>(key: &SourceKey, sample: &MetricSample) -> Result<C> {
    if sample.kind != C::KIND {
        return Err(ProbeError::SampleLayout {
            key: key.to_string(),
            reason: format!(
                "kind {} where {} was expected",
                sample.kind.as_str(),
                C::KIND.as_str()
            ),
        });
    }
    if sample.counters.len() != C::FIELDS.len() {
        return Err(ProbeError::SampleLayout {
            key: key.to_string(),
            reason: format!(
                "{} counters where {} were expected",
                sample.counters.len(),
                C::FIELDS.len()
            ),
        });
    }
    Ok(C::from_counters(&sample.counters))
}

/// Names of the counters that went backwards between two samples.
pub fn reset_fields<C: CounterSet>(prev: &C, curr: &C) -> Vec<&'static str> {
    prev.counters()
        .iter()
        .zip(curr.counters())
        .zip(C::FIELDS)
        .filter(|((p, c), _)| c < *p)
        .map(|(_, name)| *name)
        .collect()
}

/// What the store had to offer for a rate computation.
#[derive(Debug)]
pub enum Window<C> {
    /// Nothing stored yet; the current sample has been saved.
    Bootstrap,
    /// At least one counter decreased (reboot or wrap); the store was reseeded.
    Reset { fields: Vec<&'static str> },
    /// A usable previous sample and the time elapsed since it.
    Ready { previous: C, interval: Interval },
}

impl<C> Window<C> {
    /// Split off the ready case; bootstrap and reset become the result to report.
    pub fn ready_or_report(
        self,
        source: Option<&str>,
    ) -> std::result::Result<(C, Interval), CheckResult> {
        match self {
            Window::Ready { previous, interval } => Ok((previous, interval)),
            Window::Bootstrap => Err(CheckResult::bootstrap(source)),
            Window::Reset { fields } => Err(CheckResult::counter_reset(&fields)),
        }
    }
}

/// Load the previous sample for `key`, then overwrite it with `current`.
///
/// The store is written on every path, so whatever happens now the next
/// invocation measures the interval starting here.
pub fn open_window<C: CounterSet>(
    store: &SampleStore,
    key: &SourceKey,
    current: &C,
) -> Result<Window<C>> {
    let sample = current.to_sample();

    let previous = match store.load(key) {
        Ok(previous) => previous,
        Err(err) => {
            reseed(store, key, &sample);
            return Err(err.into());
        }
    };

    let Some(previous) = previous else {
        store.save(key, &sample)?;
        return Ok(Window::Bootstrap);
    };

    let window = compare(key, &previous, current);
    reseed(store, key, &sample);
    window
}

fn compare<C: CounterSet>(
    key: &SourceKey,
    previous: &PreviousSample,
    current: &C,
) -> Result<Window<C>> {
    let prev = decode::<C>(key, &previous.sample)?;

    let fields = reset_fields(&prev, current);
    if !fields.is_empty() {
        tracing::info!(key = %key, ?fields, "counter reset detected");
        return Ok(Window::Reset { fields });
    }

    let interval = Interval::from_age(previous.age)?;
    tracing::debug!(
        key = %key,
        captured_at = ?previous.captured_at,
        interval_secs = interval.seconds(),
        "sampling window ready"
    );
    Ok(Window::Ready {
        previous: prev,
        interval,
    })
}

fn reseed(store: &SampleStore, key: &SourceKey, sample: &MetricSample) {
    if let Err(err) = store.save(key, sample) {
        tracing::warn!(key = %key, error = %err, "failed to save sample");
    }
}
