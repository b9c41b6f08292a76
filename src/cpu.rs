/// CPU metrics collection and parsing
use std::path::Path;

use crate::constants::PROC_STAT_PATH;
use crate::error::{ProbeError, ReadError, Result};
use crate::procfs::{parse_u64_fields, require_fields, ProcFs};
use crate::rate::{delta, open_window, CounterSet};
use crate::report::{push_status, CheckResult, PerfData};
use crate::store::{MetricKind, SampleStore, SourceKey};
use crate::threshold::{evaluate, Threshold};

/// Store key for the aggregate CPU line
pub const CPU_KEY: &str = "cpu";

/// Jiffy buckets below this count mean the stat interface changed
const REQUIRED_BUCKETS: usize = 7;

/// Aggregate jiffy counters from the first `cpu` line of /proc/stat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuCounters {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    /// Absent on older kernels, read as zero
    pub steal: u64,
}

impl CounterSet for CpuCounters {
    const KIND: MetricKind = MetricKind::Cpu;
    const FIELDS: &'static [&'static str] = &[
        "user", "nice", "system", "idle", "iowait", "irq", "softirq", "steal",
    ];

    fn counters(&self) -> Vec<u64> {
        vec![
            self.user,
            self.nice,
            self.system,
            self.idle,
            self.iowait,
            self.irq,
            self.softirq,
            self.steal,
        ]
    }

    fn from_counters(c: &[u64]) -> Self {
        CpuCounters {
            user: c[0],
            nice: c[1],
            system: c[2],
            idle: c[3],
            iowait: c[4],
            irq: c[5],
            softirq: c[6],
            steal: c[7],
        }
    }
}

/// Share of elapsed jiffies per bucket, in percent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuUsage {
    pub user: f64,
    pub nice: f64,
    pub system: f64,
    pub idle: f64,
    pub iowait: f64,
    pub irq: f64,
    pub softirq: f64,
    pub steal: f64,
    /// 100 - idle
    pub busy: f64,
}

/// Read the aggregate CPU counters.
pub fn collect_cpu(procfs: &ProcFs) -> std::result::Result<CpuCounters, ReadError> {
    let path = procfs.path(PROC_STAT_PATH);
    let content = procfs.read(PROC_STAT_PATH)?;
    let line = content
        .lines()
        .find(|line| line.split_whitespace().next() == Some("cpu"))
        .ok_or_else(|| ReadError::malformed(&path, "no aggregate cpu line"))?;
    parse_cpu_counters(line, &path)
}

/// Parse `cpu  user nice system idle iowait irq softirq [steal ...]`.
fn parse_cpu_counters(line: &str, path: &Path) -> std::result::Result<CpuCounters, ReadError> {
    let mut tokens = line.split_whitespace();
    if tokens.next() != Some("cpu") {
        return Err(ReadError::malformed(path, "line does not start with cpu"));
    }
    let fields = parse_u64_fields(tokens, path)?;
    require_fields(&fields, REQUIRED_BUCKETS, path, "cpu")?;

    Ok(CpuCounters {
        user: fields[0],
        nice: fields[1],
        system: fields[2],
        idle: fields[3],
        iowait: fields[4],
        irq: fields[5],
        softirq: fields[6],
        steal: fields.get(7).copied().unwrap_or(0),
    })
}

/// Normalise bucket deltas against their total.
pub fn calculate_cpu_usage(prev: &CpuCounters, curr: &CpuCounters) -> Result<CpuUsage> {
    let deltas: Vec<f64> = prev
        .counters()
        .into_iter()
        .zip(curr.counters())
        .map(|(p, c)| delta(p, c))
        .collect();
    let total: f64 = deltas.iter().sum();
    if total <= 0.0 {
        return Err(ProbeError::computation(
            "CPU usage: no jiffies elapsed since the previous sample",
        ));
    }

    let pct = |d: f64| 100.0 * d / total;
    let idle = pct(deltas[3]);
    Ok(CpuUsage {
        user: pct(deltas[0]),
        nice: pct(deltas[1]),
        system: pct(deltas[2]),
        idle,
        iowait: pct(deltas[4]),
        irq: pct(deltas[5]),
        softirq: pct(deltas[6]),
        steal: pct(deltas[7]),
        busy: 100.0 - idle,
    })
}

/// `cpu [warn crit]`: busy percentage over the interval since the last run.
pub fn check_cpu(
    procfs: &ProcFs,
    store: &SampleStore,
    threshold: Option<&Threshold>,
) -> Result<CheckResult> {
    let current = collect_cpu(procfs)?;
    let window = open_window(store, &SourceKey::aggregate(CPU_KEY), &current)?;
    let (previous, interval) = match window.ready_or_report(None) {
        Ok(ready) => ready,
        Err(result) => return Ok(result),
    };
    let usage = calculate_cpu_usage(&previous, &current)?;

    let mut summary = format!("CPU Usage: {:.2}% [t:{:.2}]", usage.busy, interval.seconds());
    let status = evaluate(usage.busy, threshold);
    if threshold.is_some() {
        push_status(&mut summary, status);
    }

    let perfdata = [
        ("cpu", usage.busy),
        ("user", usage.user),
        ("system", usage.system),
        ("iowait", usage.iowait),
        ("nice", usage.nice),
        ("irq", usage.irq),
        ("softirq", usage.softirq),
        ("steal", usage.steal),
    ]
    .into_iter()
    .map(|(name, value)| PerfData::new(name, value).unit("%").threshold(threshold))
    .collect();

    CheckResult::new(status, summary, perfdata).ensure_finite()
}
