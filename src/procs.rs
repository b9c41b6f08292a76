/// Process census and fork rate
use std::fs;
use std::path::Path;

use crate::constants::PROC_STAT_PATH;
use crate::error::{ReadError, Result};
use crate::procfs::ProcFs;
use crate::rate::{open_window, CounterSet};
use crate::report::{push_status, CheckResult, PerfData};
use crate::store::{MetricKind, SampleStore, SourceKey};
use crate::threshold::{Status, Threshold};

/// Store key for the fork counter
pub const PROCS_KEY: &str = "procs";

/// The `processes` line of /proc/stat: forks since boot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkCounter {
    pub processes: u64,
}

impl CounterSet for ForkCounter {
    const KIND: MetricKind = MetricKind::Forks;
    const FIELDS: &'static [&'static str] = &["processes"];

    fn counters(&self) -> Vec<u64> {
        vec![self.processes]
    }

    fn from_counters(c: &[u64]) -> Self {
        ForkCounter { processes: c[0] }
    }
}

/// Processes grouped by scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessCensus {
    pub total: u64,
    /// R
    pub running: u64,
    /// S
    pub sleeping: u64,
    /// D, uninterruptible wait
    pub waiting: u64,
    /// Z
    pub zombie: u64,
    pub others: u64,
}

impl ProcessCensus {
    fn record(&mut self, state: char) {
        self.total += 1;
        match state {
            'R' => self.running += 1,
            'S' => self.sleeping += 1,
            'D' => self.waiting += 1,
            'Z' => self.zombie += 1,
            _ => self.others += 1,
        }
    }
}

pub fn collect_forks(procfs: &ProcFs) -> std::result::Result<ForkCounter, ReadError> {
    let path = procfs.path(PROC_STAT_PATH);
    let content = procfs.read(PROC_STAT_PATH)?;
    parse_forks(&content, &path)
}

fn parse_forks(content: &str, path: &Path) -> std::result::Result<ForkCounter, ReadError> {
    let value = content
        .lines()
        .find_map(|line| line.strip_prefix("processes "))
        .ok_or_else(|| ReadError::malformed(path, "no processes line"))?;
    let processes = value
        .trim()
        .parse()
        .map_err(|_| ReadError::malformed(path, format!("bad processes value {value:?}")))?;
    Ok(ForkCounter { processes })
}

/// State code of a `<pid>/stat` line, the token after the last `)`.
///
/// The command name may itself contain spaces and parentheses.
fn parse_state(line: &str) -> Option<char> {
    let (_, rest) = line.rsplit_once(')')?;
    rest.split_whitespace().next()?.chars().next()
}

/// Walk the numeric entries of the proc root and tally their states.
///
/// A process that exits between listing and reading is skipped.
pub fn collect_census(procfs: &ProcFs) -> std::result::Result<ProcessCensus, ReadError> {
    let root = procfs.root();
    let entries = fs::read_dir(root).map_err(|source| ReadError::Io {
        path: root.to_path_buf(),
        source,
    })?;

    let mut census = ProcessCensus::default();
    let mut vanished = 0u32;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(pid) = name.to_str() else {
            continue;
        };
        if pid.is_empty() || !pid.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }

        let Ok(stat) = fs::read_to_string(entry.path().join("stat")) else {
            vanished += 1;
            continue;
        };
        match parse_state(&stat) {
            Some(state) => census.record(state),
            None => vanished += 1,
        }
    }
    if vanished > 0 {
        tracing::debug!(vanished, "processes skipped during census");
    }
    Ok(census)
}

/// `procs [wt,wr,ww ct,cr,cw]`: total, running and waiting, in list order.
pub fn check_procs(
    procfs: &ProcFs,
    store: &SampleStore,
    thresholds: &[Threshold],
) -> Result<CheckResult> {
    let current = collect_forks(procfs)?;
    let window = open_window(store, &SourceKey::aggregate(PROCS_KEY), &current)?;
    let (previous, interval) = match window.ready_or_report(None) {
        Ok(ready) => ready,
        Err(result) => return Ok(result),
    };
    let forks = interval.rate(previous.processes, current.processes);
    let census = collect_census(procfs)?;

    let mut summary = format!(
        "Total:{} Running:{} Sleeping:{} Waiting:{} Zombie:{} Others:{} New_Forks:{:.2}/s",
        census.total,
        census.running,
        census.sleeping,
        census.waiting,
        census.zombie,
        census.others,
        forks
    );

    let judged = [
        ("total", census.total),
        ("running", census.running),
        ("waiting", census.waiting),
    ];
    let mut status = Status::Ok;
    for ((name, value), threshold) in judged.into_iter().zip(thresholds) {
        if threshold.is_empty() {
            continue;
        }
        match threshold.evaluate(value as f64) {
            Status::Ok => push_status(&mut summary, Status::Ok),
            quantity => {
                summary.push_str(&format!(" ({} {name})", quantity.label()));
                status = status.worst(quantity);
            }
        }
    }

    let perfdata = vec![
        PerfData::new("total", census.total as f64).threshold(thresholds.first()),
        PerfData::new("forks", forks),
        PerfData::new("sleeping", census.sleeping as f64),
        PerfData::new("running", census.running as f64).threshold(thresholds.get(1)),
        PerfData::new("waiting", census.waiting as f64).threshold(thresholds.get(2)),
        PerfData::new("zombie", census.zombie as f64),
        PerfData::new("others", census.others as f64),
    ];
    CheckResult::new(status, summary, perfdata).ensure_finite()
}
