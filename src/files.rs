/// Open file descriptor counts from /proc/sys/fs/file-nr
use crate::constants::FILE_NR_PATH;
use crate::error::{ReadError, Result};
use crate::procfs::{parse_u64_fields, require_fields, ProcFs};
use crate::report::{push_status, CheckResult, PerfData};
use crate::threshold::{evaluate, Threshold};

/// `open free max` as reported by the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHandles {
    pub open: u64,
    pub free: u64,
    pub max: u64,
}

pub fn collect_file_handles(procfs: &ProcFs) -> std::result::Result<FileHandles, ReadError> {
    let path = procfs.path(FILE_NR_PATH);
    let line = procfs.read_first_line(FILE_NR_PATH)?;
    let fields = parse_u64_fields(line.split_whitespace(), &path)?;
    require_fields(&fields, 3, &path, "file-nr")?;
    Ok(FileHandles {
        open: fields[0],
        free: fields[1],
        max: fields[2],
    })
}

/// `files [warn crit]`: judged on allocated handles.
pub fn check_files(procfs: &ProcFs, threshold: Option<&Threshold>) -> Result<CheckResult> {
    let handles = collect_file_handles(procfs)?;

    let mut summary = format!("Open Files: {} (free: {})", handles.open, handles.free);
    let status = evaluate(handles.open as f64, threshold);
    let mut open = PerfData::new("open", handles.open as f64);
    if threshold.is_some() {
        push_status(&mut summary, status);
        open = open.threshold(threshold).range(0, handles.max);
    }

    let perfdata = vec![open, PerfData::new("free", handles.free as f64)];
    Ok(CheckResult::new(status, summary, perfdata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::ProcTree;
    use crate::threshold::Status;

    #[test]
    fn test_collect_file_handles() {
        let tree = ProcTree::new();
        tree.write("sys/fs/file-nr", "2848\t0\t9223372036854775807\n");
        let handles = collect_file_handles(&tree.procfs()).unwrap();
        assert_eq!(handles.open, 2848);
        assert_eq!(handles.free, 0);
        assert_eq!(handles.max, 9223372036854775807);
    }

    #[test]
    fn test_collect_file_handles_short_row() {
        let tree = ProcTree::new();
        tree.write("sys/fs/file-nr", "2848 0\n");
        assert!(matches!(
            collect_file_handles(&tree.procfs()),
            Err(ReadError::MalformedSource { .. })
        ));
    }

    #[test]
    fn test_check_files_report_only() {
        let tree = ProcTree::new();
        tree.write("sys/fs/file-nr", "1024 0 100000\n");
        let result = check_files(&tree.procfs(), None).unwrap();
        assert_eq!(result.status, Status::Ok);
        assert_eq!(
            result.to_string(),
            "Open Files: 1024 (free: 0) | open=1024.00 free=0.00"
        );
    }

    #[test]
    fn test_check_files_with_threshold_adds_range() {
        let tree = ProcTree::new();
        tree.write("sys/fs/file-nr", "1024 0 100000\n");
        let threshold = Threshold::new(Some(1000.0), Some(5000.0)).unwrap();
        let result = check_files(&tree.procfs(), Some(&threshold)).unwrap();
        assert_eq!(result.status, Status::Warning);
        assert_eq!(
            result.to_string(),
            "Open Files: 1024 (free: 0) (Warning) | open=1024.00;1000;5000;0;100000 free=0.00"
        );
    }

    #[test]
    fn test_check_files_unlimited_max_prints_exactly() {
        let tree = ProcTree::new();
        tree.write("sys/fs/file-nr", "2848\t0\t9223372036854775807\n");
        let threshold = Threshold::new(Some(1000.0), Some(5000.0)).unwrap();
        let result = check_files(&tree.procfs(), Some(&threshold)).unwrap();
        assert_eq!(
            result.to_string(),
            "Open Files: 2848 (free: 0) (Warning) | open=2848.00;1000;5000;0;9223372036854775807 free=0.00"
        );
    }
}
