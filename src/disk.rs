/// Disk I/O and filesystem usage metrics
use std::ffi::CString;
use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use crate::constants::{BYTES_PER_GIB, BYTES_PER_MIB, DISKSTATS_PATH, DISK_SECTOR_SIZE};
use crate::error::{ProbeError, ReadError, Result};
use crate::procfs::{parse_u64_fields, require_fields, ProcFs};
use crate::rate::{open_window, CounterSet, Interval};
use crate::report::{push_status, CheckResult, PerfData};
use crate::store::{MetricKind, SampleStore, SourceKey};
use crate::threshold::{evaluate, evaluate_all, Threshold};

/// Counters after the device name in a diskstats row that must be present
const DISKSTATS_FIELDS: usize = 8;

/// The six iostat counters used for rates, from one /proc/diskstats row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiskCounters {
    /// Reads completed
    pub read_ops: u64,
    /// Sectors read
    pub read_sectors: u64,
    /// Milliseconds spent reading
    pub read_time: u64,
    /// Writes completed
    pub write_ops: u64,
    /// Sectors written
    pub write_sectors: u64,
    /// Milliseconds spent writing
    pub write_time: u64,
}

impl CounterSet for DiskCounters {
    const KIND: MetricKind = MetricKind::Disk;
    const FIELDS: &'static [&'static str] = &[
        "read_operations",
        "read_sectors",
        "read_time",
        "write_operations",
        "write_sectors",
        "write_time",
    ];

    fn counters(&self) -> Vec<u64> {
        vec![
            self.read_ops,
            self.read_sectors,
            self.read_time,
            self.write_ops,
            self.write_sectors,
            self.write_time,
        ]
    }

    fn from_counters(c: &[u64]) -> Self {
        DiskCounters {
            read_ops: c[0],
            read_sectors: c[1],
            read_time: c[2],
            write_ops: c[3],
            write_sectors: c[4],
            write_time: c[5],
        }
    }
}

/// Per-second disk activity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskIoRates {
    pub read_ops: f64,
    pub read_sectors: f64,
    pub read_time: f64,
    pub write_ops: f64,
    pub write_sectors: f64,
    pub write_time: f64,
    pub read_mib_s: f64,
    pub write_mib_s: f64,
}

/// Map a disk selector to its diskstats name.
///
/// Bare names pass through. Absolute paths are canonicalised and must live
/// under `dev_root`; nested names use `!` like the kernel (`cciss/c0d0`
/// becomes `cciss!c0d0`).
pub fn resolve_device(selector: &str, dev_root: &Path) -> std::result::Result<String, ReadError> {
    if !selector.starts_with('/') {
        return Ok(selector.to_string());
    }

    let invalid = |reason: String| ReadError::InvalidSelector {
        selector: selector.to_string(),
        reason,
    };
    let real = fs::canonicalize(selector).map_err(|err| invalid(err.to_string()))?;
    let dev_root = fs::canonicalize(dev_root)
        .map_err(|err| invalid(format!("{}: {err}", dev_root.display())))?;
    let relative = real
        .strip_prefix(&dev_root)
        .map_err(|_| invalid(format!("{} is outside {}", real.display(), dev_root.display())))?;

    let name = relative
        .to_str()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| invalid(format!("{} is not a device", real.display())))?;
    tracing::debug!(selector, device = name, "resolved block device");
    Ok(name.replace('/', "!"))
}

/// Find the row for `device` by exact name match.
fn parse_disk_line(
    data: &str,
    device: &str,
    path: &Path,
) -> std::result::Result<DiskCounters, ReadError> {
    for line in data.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.get(2) != Some(&device) {
            continue;
        }
        let fields = parse_u64_fields(tokens[3..].iter().copied(), path)?;
        require_fields(&fields, DISKSTATS_FIELDS, path, device)?;
        return Ok(DiskCounters {
            read_ops: fields[0],
            read_sectors: fields[2],
            read_time: fields[3],
            write_ops: fields[4],
            write_sectors: fields[6],
            write_time: fields[7],
        });
    }
    Err(ReadError::not_found("Block device", device))
}

pub fn collect_disk(procfs: &ProcFs, device: &str) -> std::result::Result<DiskCounters, ReadError> {
    let data = procfs.read(DISKSTATS_PATH)?;
    parse_disk_line(&data, device, &procfs.path(DISKSTATS_PATH))
}

/// Calculate I/O rates from the iostat counters
pub fn calculate_disk_io_rates(
    prev: &DiskCounters,
    curr: &DiskCounters,
    interval: &Interval,
) -> DiskIoRates {
    let read_sectors = interval.rate(prev.read_sectors, curr.read_sectors);
    let write_sectors = interval.rate(prev.write_sectors, curr.write_sectors);
    let sectors_to_mib = DISK_SECTOR_SIZE as f64 / BYTES_PER_MIB;

    DiskIoRates {
        read_ops: interval.rate(prev.read_ops, curr.read_ops),
        read_sectors,
        read_time: interval.rate(prev.read_time, curr.read_time),
        write_ops: interval.rate(prev.write_ops, curr.write_ops),
        write_sectors,
        write_time: interval.rate(prev.write_time, curr.write_time),
        read_mib_s: read_sectors * sectors_to_mib,
        write_mib_s: write_sectors * sectors_to_mib,
    }
}

/// `diskio <dev> [wr,ww cr,cw]`: sector rates judged against read/write slots.
pub fn check_diskio(
    procfs: &ProcFs,
    store: &SampleStore,
    dev_root: &Path,
    selector: &str,
    thresholds: &[Threshold],
) -> Result<CheckResult> {
    let device = resolve_device(selector, dev_root)?;
    let current = collect_disk(procfs, &device)?;

    let window = open_window(store, &SourceKey::keyed("diskio", &device), &current)?;
    let label = format!("diskio({device})");
    let (previous, interval) = match window.ready_or_report(Some(&label)) {
        Ok(ready) => ready,
        Err(result) => return Ok(result),
    };
    let rates = calculate_disk_io_rates(&previous, &current, &interval);

    let (read_limit, write_limit) = (thresholds.first(), thresholds.get(1));
    let mut summary = format!(
        "{selector}({device}) Read: {:.2} sec/s ({:.2} t/s) Write: {:.2} sec/s ({:.2} t/s) [t:{:.2}]",
        rates.read_sectors,
        rates.read_ops,
        rates.write_sectors,
        rates.write_ops,
        interval.seconds()
    );
    let status = evaluate_all([
        (rates.read_sectors, read_limit),
        (rates.write_sectors, write_limit),
    ]);
    if !thresholds.is_empty() {
        push_status(&mut summary, status);
    }

    let perfdata = vec![
        PerfData::new("read_operations", rates.read_ops),
        PerfData::new("read_sectors", rates.read_sectors).threshold(read_limit),
        PerfData::new("read_time", rates.read_time),
        PerfData::new("write_operations", rates.write_ops),
        PerfData::new("write_sectors", rates.write_sectors).threshold(write_limit),
        PerfData::new("write_time", rates.write_time),
        PerfData::new("read_mbps", rates.read_mib_s),
        PerfData::new("write_mbps", rates.write_mib_s),
    ];
    CheckResult::new(status, summary, perfdata).ensure_finite()
}

/// Block accounting of a mounted filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStats {
    pub frsize: u64,
    pub blocks: u64,
    pub bfree: u64,
    pub bavail: u64,
}

/// Filesystem usage in GiB
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskUsage {
    pub size_gib: f64,
    pub free_gib: f64,
    pub avail_gib: f64,
    /// Share of the size not available to unprivileged users
    pub used_percent: f64,
}

pub fn statvfs(path: &Path) -> std::result::Result<FsStats, ReadError> {
    let io_error = |source: io::Error| ReadError::Io {
        path: path.to_path_buf(),
        source,
    };
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|err| io_error(io::Error::new(io::ErrorKind::InvalidInput, err)))?;

    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let ret = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if ret != 0 {
        return Err(io_error(io::Error::last_os_error()));
    }

    Ok(FsStats {
        frsize: stat.f_frsize as u64,
        blocks: stat.f_blocks as u64,
        bfree: stat.f_bfree as u64,
        bavail: stat.f_bavail as u64,
    })
}

pub fn disk_usage(stats: &FsStats) -> Result<DiskUsage> {
    if stats.blocks == 0 || stats.frsize == 0 {
        return Err(ProbeError::computation("disk usage of a filesystem with no blocks"));
    }
    let gib = |blocks: u64| stats.frsize as f64 * blocks as f64 / BYTES_PER_GIB;
    let size_gib = gib(stats.blocks);
    let avail_gib = gib(stats.bavail);
    Ok(DiskUsage {
        size_gib,
        free_gib: gib(stats.bfree),
        avail_gib,
        used_percent: (size_gib - avail_gib) / size_gib * 100.0,
    })
}

/// A mount point sits on a different device than its parent, or is the root.
pub fn is_mount_point(path: &Path) -> bool {
    let (Ok(meta), Ok(parent)) = (fs::metadata(path), fs::metadata(path.join(".."))) else {
        return false;
    };
    meta.is_dir() && (meta.dev() != parent.dev() || meta.ino() == parent.ino())
}

/// `disku <mount> [warn crit]`: judged on the used percentage.
pub fn check_disku(mount: &Path, threshold: Option<&Threshold>) -> Result<CheckResult> {
    if !is_mount_point(mount) {
        return Err(ReadError::NotMounted {
            path: mount.to_path_buf(),
        }
        .into());
    }
    let usage = disk_usage(&statvfs(mount)?)?;
    tracing::debug!(mount = %mount.display(), free_gib = usage.free_gib, "filesystem usage");

    let mut summary = format!(
        "{} Used: {:.2} GB / {:.2} GB ({:.2}%)",
        mount.display(),
        usage.size_gib - usage.avail_gib,
        usage.size_gib,
        usage.used_percent
    );
    let status = evaluate(usage.used_percent, threshold);
    if threshold.is_some() {
        push_status(&mut summary, status);
    }

    let perfdata = vec![PerfData::new("used", usage.used_percent)
        .unit("%")
        .threshold(threshold)];
    CheckResult::new(status, summary, perfdata).ensure_finite()
}
