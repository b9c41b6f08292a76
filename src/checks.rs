//! Dispatch of a validated request to its check.

use crate::cli::CheckRequest;
use crate::config::ProbeConfig;
use crate::error::Result;
use crate::procfs::ProcFs;
use crate::report::CheckResult;
use crate::store::SampleStore;
use crate::{cpu, disk, files, load, memory, network, procs};

/// One probe run: where to read from and where samples live.
#[derive(Debug, Clone)]
pub struct Probe {
    config: ProbeConfig,
    procfs: ProcFs,
}

impl Probe {
    pub fn new(config: ProbeConfig) -> Self {
        let procfs = ProcFs::new(config.proc_root.clone());
        Probe { config, procfs }
    }

    /// Opened on demand, gauges never create the state directory.
    fn store(&self) -> Result<SampleStore> {
        let store = SampleStore::open(&self.config.state_dir)?;
        tracing::debug!(state_dir = %store.root().display(), "sample store ready");
        Ok(store)
    }

    pub fn run(&self, request: &CheckRequest) -> Result<CheckResult> {
        tracing::debug!(
            ?request,
            proc_root = %self.procfs.root().display(),
            "running check"
        );
        match request {
            CheckRequest::Cpu(threshold) => {
                cpu::check_cpu(&self.procfs, &self.store()?, threshold.as_ref())
            }
            CheckRequest::Load(thresholds) => load::check_load(&self.procfs, thresholds),
            CheckRequest::Threads(threshold) => {
                load::check_threads(&self.procfs, threshold.as_ref())
            }
            CheckRequest::Files(threshold) => {
                files::check_files(&self.procfs, threshold.as_ref())
            }
            CheckRequest::Procs(thresholds) => {
                procs::check_procs(&self.procfs, &self.store()?, thresholds)
            }
            CheckRequest::DiskIo { device, thresholds } => disk::check_diskio(
                &self.procfs,
                &self.store()?,
                &self.config.dev_root,
                device,
                thresholds,
            ),
            CheckRequest::DiskUsage { mount, threshold } => {
                disk::check_disku(mount, threshold.as_ref())
            }
            CheckRequest::Memory(threshold) => {
                memory::check_memory(&self.procfs, threshold.as_ref())
            }
            CheckRequest::Swap(threshold) => memory::check_swap(&self.procfs, threshold.as_ref()),
            CheckRequest::Network {
                interface,
                thresholds,
            } => network::check_network(&self.procfs, &self.store()?, interface, thresholds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::error::ProbeError;
    use crate::fixture::ProcTree;
    use crate::store::SourceKey;
    use crate::threshold::Status;
    use clap::Parser;

    fn run(tree: &ProcTree, args: &[&str]) -> Result<CheckResult> {
        let mut argv = vec!["check_linux_metrics"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).unwrap();
        let request = cli.command.request()?;
        Probe::new(tree.config()).run(&request)
    }

    #[test]
    fn test_gauge_does_not_create_state_dir() {
        let tree = ProcTree::new();
        tree.write("loadavg", "0.10 0.20 0.30 1/100 5\n");
        std::fs::remove_dir(tree.state_dir()).unwrap();

        let result = run(&tree, &["load"]).unwrap();
        assert_eq!(result.status, Status::Ok);
        assert!(!tree.state_dir().exists());
    }

    #[test]
    fn test_invalid_thresholds_leave_no_sample() {
        let tree = ProcTree::new();
        tree.write("stat", "cpu  1 2 3 4 5 6 7 8\nprocesses 10\n");

        let err = run(&tree, &["cpu", "90", "10"]).unwrap_err();
        assert!(matches!(err, ProbeError::Argument(_)));
        assert!(!tree.store().slot_path(&SourceKey::aggregate("cpu")).exists());
    }

    #[test]
    fn test_network_end_to_end() {
        let tree = ProcTree::new();
        tree.write(
            "net/dev",
            "Inter-| Receive | Transmit\n face |bytes|bytes\n  eth0: 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0\n",
        );

        let first = run(&tree, &["network", "eth0", "5,5", "10,10"]).unwrap();
        assert_eq!(first.status, Status::Unknown);

        tree.backdate(&SourceKey::keyed("net", "eth0"), 10);
        tree.write(
            "net/dev",
            "Inter-| Receive | Transmit\n face |bytes|bytes\n  eth0: 1048576 100 0 0 0 0 0 0 0 0 0 0 0 0 0 0\n",
        );
        let second = run(&tree, &["network", "eth0", "5,5", "10,10"]).unwrap();
        assert_eq!(second.status, Status::Ok);
        assert!(second.to_string().contains(" | RX_MBps=0.10;5;10 RX_PKps=10.00 "));
    }

    #[test]
    fn test_missing_interface_is_error() {
        let tree = ProcTree::new();
        tree.write("net/dev", "h1\nh2\n  lo: 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0\n");
        let err = run(&tree, &["network", "eth9"]).unwrap_err();
        assert_eq!(err.to_string(), "Network device not found: (eth9)");
    }

    #[test]
    fn test_memory_end_to_end() {
        let tree = ProcTree::new();
        tree.write(
            "meminfo",
            "MemTotal: 1024000 kB\nMemFree: 512000 kB\nBuffers: 0 kB\nCached: 0 kB\nActive: 1024 kB\n",
        );
        let result = run(&tree, &["memory", "40", "60"]).unwrap();
        assert_eq!(result.status, Status::Warning);
        assert_eq!(result.summary, "Memory Used: 500.00MB / 1000.00MB (50.00%) (Warning)");
    }
}
