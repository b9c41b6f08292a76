/// Load average and thread counts from /proc/loadavg
use std::path::Path;

use crate::constants::LOADAVG_PATH;
use crate::error::{ReadError, Result};
use crate::procfs::{require_fields, ProcFs};
use crate::report::{push_status, CheckResult, PerfData};
use crate::threshold::{evaluate, Status, Threshold};

/// Parsed /proc/loadavg: `l1 l5 l15 running/total lastpid`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadAvg {
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
    /// Currently runnable scheduling entities
    pub running: u64,
    /// Scheduling entities in existence
    pub total: u64,
}

impl LoadAvg {
    fn averages(&self) -> [f64; 3] {
        [self.load1, self.load5, self.load15]
    }
}

pub fn collect_load(procfs: &ProcFs) -> std::result::Result<LoadAvg, ReadError> {
    let line = procfs.read_first_line(LOADAVG_PATH)?;
    parse_loadavg(&line, &procfs.path(LOADAVG_PATH))
}

fn parse_loadavg(line: &str, path: &Path) -> std::result::Result<LoadAvg, ReadError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    require_fields(&fields, 4, path, "loadavg")?;

    let parse_avg = |token: &str| {
        token
            .parse::<f64>()
            .map_err(|_| ReadError::malformed(path, format!("bad load average {token:?}")))
    };
    let (running, total) = fields[3]
        .split_once('/')
        .and_then(|(r, t)| Some((r.parse::<u64>().ok()?, t.parse::<u64>().ok()?)))
        .ok_or_else(|| ReadError::malformed(path, format!("bad thread count {:?}", fields[3])))?;

    Ok(LoadAvg {
        load1: parse_avg(fields[0])?,
        load5: parse_avg(fields[1])?,
        load15: parse_avg(fields[2])?,
        running,
        total,
    })
}

/// `load [w1,w5,w15 c1,c5,c15]`: each average judged by its own slot.
pub fn check_load(procfs: &ProcFs, thresholds: &[Threshold]) -> Result<CheckResult> {
    let load = collect_load(procfs)?;

    let mut summary = format!(
        "Load1: {:.2} Load5: {:.2} Load15: {:.2}",
        load.load1, load.load5, load.load15
    );
    let mut status = Status::Ok;
    for (value, threshold) in load.averages().into_iter().zip(thresholds) {
        if threshold.is_empty() {
            continue;
        }
        let quantity = threshold.evaluate(value);
        push_status(&mut summary, quantity);
        status = status.worst(quantity);
    }

    let perfdata = ["load1", "load5", "load15"]
        .into_iter()
        .zip(load.averages())
        .enumerate()
        .map(|(idx, (name, value))| PerfData::new(name, value).threshold(thresholds.get(idx)))
        .collect();

    Ok(CheckResult::new(status, summary, perfdata))
}

/// `threads [warn crit]`: judged on the running count.
pub fn check_threads(procfs: &ProcFs, threshold: Option<&Threshold>) -> Result<CheckResult> {
    let load = collect_load(procfs)?;

    let mut summary = format!("Threads: {}/{}", load.running, load.total);
    let status = evaluate(load.running as f64, threshold);
    if threshold.is_some() {
        push_status(&mut summary, status);
    }

    let perfdata = vec![
        PerfData::new("running", load.running as f64).threshold(threshold),
        PerfData::new("total", load.total as f64),
    ];
    Ok(CheckResult::new(status, summary, perfdata))
}
