//! Durable single-slot sample store.
//!
//! One JSON file per source key holds the most recent raw counters. The
//! capture time is the file's modification time, so the age seen by the
//! next invocation is real wall-clock time even if checks run irregularly.
//! Writes go to a temporary file that is renamed over the slot; concurrent
//! invocations are not coordinated and the last writer wins.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Metric family a stored sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Cpu,
    Forks,
    Disk,
    Net,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Cpu => "cpu",
            MetricKind::Forks => "forks",
            MetricKind::Disk => "disk",
            MetricKind::Net => "net",
        }
    }
}

/// Identifies one metric stream, e.g. `cpu` or `net:eth0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceKey(String);

impl SourceKey {
    pub fn aggregate(name: &str) -> Self {
        SourceKey(name.to_string())
    }

    pub fn keyed(name: &str, selector: &str) -> Self {
        SourceKey(format!("{name}:{selector}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name for this key. Anything outside `[A-Za-z0-9._-]` is
    /// percent-encoded, so distinct keys never map to the same file.
    pub fn file_name(&self) -> String {
        let mut name = String::with_capacity(self.0.len() + 5);
        for byte in self.0.bytes() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
                name.push(byte as char);
            } else {
                name.push_str(&format!("%{byte:02X}"));
            }
        }
        name.push_str(".json");
        name
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw counters of one metric source, positionally meaningful per kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSample {
    pub kind: MetricKind,
    pub counters: Vec<u64>,
}

/// A sample read back from the store together with its age.
#[derive(Debug, Clone)]
pub struct PreviousSample {
    pub sample: MetricSample,
    pub captured_at: SystemTime,
    pub age: Duration,
}

/// Filesystem-backed store, one slot per source key.
#[derive(Debug, Clone)]
pub struct SampleStore {
    root: PathBuf,
}

impl SampleStore {
    /// Open the store, creating its directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        // create_dir_all tolerates a racing creator
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(SampleStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn slot_path(&self, key: &SourceKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    /// Load the previous sample for `key`; `None` is the bootstrap signal.
    pub fn load(&self, key: &SourceKey) -> Result<Option<PreviousSample>, StoreError> {
        let path = self.slot_path(key);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(key = %key, "no stored sample");
                return Ok(None);
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let captured_at = fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
        let sample: MetricSample = serde_json::from_slice(&content)
            .map_err(|source| StoreError::Corrupt { path, source })?;

        // An mtime in the future yields a zero age, which the rate engine rejects
        let age = SystemTime::now()
            .duration_since(captured_at)
            .unwrap_or(Duration::ZERO);
        tracing::debug!(key = %key, age_secs = age.as_secs_f64(), "loaded stored sample");

        Ok(Some(PreviousSample {
            sample,
            captured_at,
            age,
        }))
    }

    /// Overwrite the slot for `key` with `sample`.
    pub fn save(&self, key: &SourceKey, sample: &MetricSample) -> Result<(), StoreError> {
        let path = self.slot_path(key);
        let tmp = self
            .root
            .join(format!(".{}.{}.tmp", key.file_name(), std::process::id()));
        let payload = serde_json::to_vec(sample).map_err(|source| StoreError::Corrupt {
            path: path.clone(),
            source,
        })?;

        fs::write(&tmp, payload).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(key = %key, path = %path.display(), "saved sample");
        Ok(())
    }
}
