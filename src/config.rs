use std::path::PathBuf;

use crate::constants::{DEFAULT_DEV_ROOT, DEFAULT_PROC_ROOT, DEFAULT_STATE_DIR};

/// Where the probe reads kernel counters from and keeps its samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Root of the proc pseudo-filesystem
    pub proc_root: PathBuf,
    /// Directory block device selectors must resolve into
    pub dev_root: PathBuf,
    /// Sample store directory
    pub state_dir: PathBuf,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
            dev_root: PathBuf::from(DEFAULT_DEV_ROOT),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
        }
    }
}
