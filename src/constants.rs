/// Default root of the kernel pseudo-filesystem
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Default directory block devices live under
pub const DEFAULT_DEV_ROOT: &str = "/dev";

/// Default directory holding one sample file per metric source
pub const DEFAULT_STATE_DIR: &str = "/var/tmp/linux_metrics";

/// stat file (relative to the proc root) for CPU jiffies and fork counter
pub const PROC_STAT_PATH: &str = "stat";

/// loadavg file for load averages and thread counts
pub const LOADAVG_PATH: &str = "loadavg";

/// meminfo file for memory and swap metrics
pub const MEMINFO_PATH: &str = "meminfo";

/// net/dev file for network interface counters
pub const NET_DEV_PATH: &str = "net/dev";

/// diskstats file for block device counters
pub const DISKSTATS_PATH: &str = "diskstats";

/// file-nr file for open file descriptor counts
pub const FILE_NR_PATH: &str = "sys/fs/file-nr";

/// Disk sector size in bytes, as the kernel accounts sectors in diskstats
pub const DISK_SECTOR_SIZE: u64 = 512;

/// Bytes per MiB
pub const BYTES_PER_MIB: f64 = 1_048_576.0;

/// Bytes per GiB
pub const BYTES_PER_GIB: f64 = 1_073_741_824.0;

/// KiB per MiB, meminfo reports in kB
pub const KIB_PER_MIB: f64 = 1024.0;

/// Environment variable overriding the log filter
pub const LOG_ENV: &str = "LINUX_METRICS_LOG";
