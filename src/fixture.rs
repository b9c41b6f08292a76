//! Fake proc trees and state directories for tests.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tempfile::{tempdir, TempDir};

use crate::config::ProbeConfig;
use crate::procfs::ProcFs;
use crate::store::{SampleStore, SourceKey};

pub struct ProcTree {
    dir: TempDir,
}

impl ProcTree {
    pub fn new() -> Self {
        let dir = tempdir().unwrap();
        for sub in ["proc", "dev", "state"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        ProcTree { dir }
    }

    pub fn base(&self) -> &Path {
        self.dir.path()
    }

    pub fn proc_root(&self) -> PathBuf {
        self.dir.path().join("proc")
    }

    pub fn dev_root(&self) -> PathBuf {
        self.dir.path().join("dev")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    pub fn config(&self) -> ProbeConfig {
        ProbeConfig {
            proc_root: self.proc_root(),
            dev_root: self.dev_root(),
            state_dir: self.state_dir(),
        }
    }

    /// Write a file below the proc root, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) {
        let path = self.proc_root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    pub fn procfs(&self) -> ProcFs {
        ProcFs::new(self.proc_root())
    }

    pub fn store(&self) -> SampleStore {
        SampleStore::open(self.state_dir()).unwrap()
    }

    /// Pretend the stored sample for `key` was taken `secs` seconds ago.
    pub fn backdate(&self, key: &SourceKey, secs: u64) {
        let path = self.store().slot_path(key);
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(secs))
            .unwrap();
    }
}
