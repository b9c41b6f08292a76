/// Memory and swap metrics collection
use std::path::Path;

use crate::constants::{KIB_PER_MIB, MEMINFO_PATH};
use crate::error::{ProbeError, ReadError, Result};
use crate::procfs::ProcFs;
use crate::report::{push_status, CheckResult, PerfData};
use crate::threshold::{evaluate, Threshold};

/// RAM figures from /proc/meminfo, in KiB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryCounters {
    pub total_kib: u64,
    pub free_kib: u64,
    pub cached_kib: u64,
    pub buffers_kib: u64,
    pub active_kib: u64,
}

/// Swap figures from /proc/meminfo, in KiB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapCounters {
    pub total_kib: u64,
    pub free_kib: u64,
    pub cached_kib: u64,
}

/// Derived usage in MiB plus the used share of the total
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Usage {
    pub total_mib: f64,
    pub used_mib: f64,
    pub cached_mib: f64,
    pub used_percent: f64,
}

/// Look up `keys` in meminfo content, every key is required.
fn parse_meminfo<const N: usize>(
    data: &str,
    keys: [&str; N],
    path: &Path,
) -> std::result::Result<[u64; N], ReadError> {
    let mut values = [None; N];

    for line in data.lines() {
        let Some((label, rest)) = line.split_once(':') else {
            continue;
        };
        let Some(slot) = keys.iter().position(|key| *key == label) else {
            continue;
        };
        let value = parse_number_from_line(rest)
            .ok_or_else(|| ReadError::malformed(path, format!("bad value for {label}")))?;
        values[slot] = Some(value);
        if values.iter().all(Option::is_some) {
            break;
        }
    }

    let mut out = [0u64; N];
    for (idx, value) in values.into_iter().enumerate() {
        out[idx] =
            value.ok_or_else(|| ReadError::malformed(path, format!("missing {}", keys[idx])))?;
    }
    Ok(out)
}

/// Parse the number from the value part of a meminfo line (e.g. "  16304284 kB" -> 16304284)
fn parse_number_from_line(rest: &str) -> Option<u64> {
    rest.split_whitespace().next()?.parse().ok()
}

pub fn collect_memory(procfs: &ProcFs) -> std::result::Result<MemoryCounters, ReadError> {
    let data = procfs.read(MEMINFO_PATH)?;
    let [total_kib, free_kib, cached_kib, buffers_kib, active_kib] = parse_meminfo(
        &data,
        ["MemTotal", "MemFree", "Cached", "Buffers", "Active"],
        &procfs.path(MEMINFO_PATH),
    )?;
    Ok(MemoryCounters {
        total_kib,
        free_kib,
        cached_kib,
        buffers_kib,
        active_kib,
    })
}

pub fn collect_swap(procfs: &ProcFs) -> std::result::Result<SwapCounters, ReadError> {
    let data = procfs.read(MEMINFO_PATH)?;
    let [total_kib, free_kib, cached_kib] = parse_meminfo(
        &data,
        ["SwapTotal", "SwapFree", "SwapCached"],
        &procfs.path(MEMINFO_PATH),
    )?;
    Ok(SwapCounters {
        total_kib,
        free_kib,
        cached_kib,
    })
}

/// used = total - free - cached - buffers
pub fn memory_usage(mem: &MemoryCounters) -> Result<Usage> {
    if mem.total_kib == 0 {
        return Err(ProbeError::computation("memory usage: MemTotal is zero"));
    }
    let used_kib = mem.total_kib as f64
        - mem.free_kib as f64
        - mem.cached_kib as f64
        - mem.buffers_kib as f64;
    Ok(Usage {
        total_mib: mem.total_kib as f64 / KIB_PER_MIB,
        used_mib: used_kib / KIB_PER_MIB,
        cached_mib: (mem.cached_kib + mem.buffers_kib) as f64 / KIB_PER_MIB,
        used_percent: used_kib / mem.total_kib as f64 * 100.0,
    })
}

/// used = total - free - cached; no swap configured reads as 0% used
pub fn swap_usage(swap: &SwapCounters) -> Usage {
    let used_kib = swap.total_kib as f64 - swap.free_kib as f64 - swap.cached_kib as f64;
    let used_percent = if swap.total_kib == 0 {
        0.0
    } else {
        used_kib / swap.total_kib as f64 * 100.0
    };
    Usage {
        total_mib: swap.total_kib as f64 / KIB_PER_MIB,
        used_mib: used_kib / KIB_PER_MIB,
        cached_mib: swap.cached_kib as f64 / KIB_PER_MIB,
        used_percent,
    }
}

/// `used` perfdata: percent bounds become whole MiB, range is 0..total
fn used_perfdata(usage: &Usage, threshold: Option<&Threshold>) -> PerfData {
    let bounds = threshold.map(|t| t.scaled_whole(usage.total_mib / 100.0));
    PerfData::new("used", usage.used_mib)
        .threshold(Some(&bounds.unwrap_or_default()))
        .range(0, usage.total_mib as u64)
}

fn usage_summary(label: &str, usage: &Usage) -> String {
    format!(
        "{label} Used: {:.2}MB / {:.2}MB ({:.2}%)",
        usage.used_mib, usage.total_mib, usage.used_percent
    )
}

/// `memory [warn crit]`: judged on the used percentage.
pub fn check_memory(procfs: &ProcFs, threshold: Option<&Threshold>) -> Result<CheckResult> {
    let mem = collect_memory(procfs)?;
    let usage = memory_usage(&mem)?;

    let mut summary = usage_summary("Memory", &usage);
    let status = evaluate(usage.used_percent, threshold);
    if threshold.is_some() {
        push_status(&mut summary, status);
    }

    let perfdata = vec![
        used_perfdata(&usage, threshold),
        PerfData::new("cached", usage.cached_mib),
        PerfData::new("active", mem.active_kib as f64 / KIB_PER_MIB),
    ];
    CheckResult::new(status, summary, perfdata).ensure_finite()
}

/// `swap [warn crit]`: judged on the used percentage.
pub fn check_swap(procfs: &ProcFs, threshold: Option<&Threshold>) -> Result<CheckResult> {
    let swap = collect_swap(procfs)?;
    let usage = swap_usage(&swap);

    let mut summary = usage_summary("Swap", &usage);
    let status = evaluate(usage.used_percent, threshold);
    if threshold.is_some() {
        push_status(&mut summary, status);
    }

    let perfdata = vec![
        used_perfdata(&usage, threshold),
        PerfData::new("cached", usage.cached_mib),
    ];
    CheckResult::new(status, summary, perfdata).ensure_finite()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::ProcTree;
    use crate::threshold::Status;

    const MEMINFO: &str = "MemTotal:        8192000 kB
MemFree:         2048000 kB
MemAvailable:    4096000 kB
Buffers:          102400 kB
Cached:          1945600 kB
SwapCached:        10240 kB
Active:          3072000 kB
Inactive:        1024000 kB
SwapTotal:       2097152 kB
SwapFree:        1048576 kB
";

    #[test]
    fn test_parse_number_from_line_valid() {
        assert_eq!(parse_number_from_line("       16304284 kB"), Some(16304284));
        assert_eq!(parse_number_from_line(" 0 kB"), Some(0));
        assert_eq!(parse_number_from_line(""), None);
    }

    #[test]
    fn test_parse_meminfo_exact_labels() {
        // SwapCached must not satisfy Cached
        let data = "SwapCached: 5 kB\nCached: 7 kB\n";
        let [cached] = parse_meminfo(data, ["Cached"], Path::new("meminfo")).unwrap();
        assert_eq!(cached, 7);
    }

    #[test]
    fn test_parse_meminfo_missing_key() {
        let err = parse_meminfo("MemTotal: 10 kB\n", ["MemTotal", "MemFree"], Path::new("meminfo"))
            .unwrap_err();
        assert!(err.to_string().contains("missing MemFree"));
    }

    #[test]
    fn test_memory_usage() {
        let mem = MemoryCounters {
            total_kib: 8192000,
            free_kib: 2048000,
            cached_kib: 1945600,
            buffers_kib: 102400,
            active_kib: 0,
        };
        let usage = memory_usage(&mem).unwrap();
        assert_eq!(usage.used_mib, 4000.0);
        assert_eq!(usage.total_mib, 8000.0);
        assert_eq!(usage.cached_mib, 2000.0);
        assert_eq!(usage.used_percent, 50.0);
    }

    #[test]
    fn test_memory_usage_zero_total() {
        let mem = MemoryCounters {
            total_kib: 0,
            free_kib: 0,
            cached_kib: 0,
            buffers_kib: 0,
            active_kib: 0,
        };
        assert!(matches!(memory_usage(&mem), Err(ProbeError::Computation(_))));
    }

    #[test]
    fn test_swap_usage_without_swap() {
        let usage = swap_usage(&SwapCounters {
            total_kib: 0,
            free_kib: 0,
            cached_kib: 0,
        });
        assert_eq!(usage.used_percent, 0.0);
    }

    #[test]
    fn test_check_memory_report_only() {
        let tree = ProcTree::new();
        tree.write("meminfo", MEMINFO);
        let result = check_memory(&tree.procfs(), None).unwrap();
        assert_eq!(result.status, Status::Ok);
        assert_eq!(
            result.to_string(),
            "Memory Used: 4000.00MB / 8000.00MB (50.00%) | used=4000.00;;;0;8000 cached=2000.00 active=3000.00"
        );
    }

    #[test]
    fn test_check_memory_threshold_in_megabytes() {
        let tree = ProcTree::new();
        tree.write("meminfo", MEMINFO);
        let threshold = Threshold::new(Some(40.0), Some(90.0)).unwrap();
        let result = check_memory(&tree.procfs(), Some(&threshold)).unwrap();
        assert_eq!(result.status, Status::Warning);
        assert_eq!(result.perfdata[0].to_string(), "used=4000.00;3200;7200;0;8000");
    }

    #[test]
    fn test_check_swap() {
        let tree = ProcTree::new();
        tree.write("meminfo", MEMINFO);
        let threshold = Threshold::new(Some(40.0), Some(45.0)).unwrap();
        let result = check_swap(&tree.procfs(), Some(&threshold)).unwrap();
        // used = 2048 - 1024 - 10 MiB
        assert_eq!(result.status, Status::Critical);
        assert_eq!(
            result.to_string(),
            "Swap Used: 1014.00MB / 2048.00MB (49.51%) (Critical) | used=1014.00;819;921;0;2048 cached=10.00"
        );
    }
}
