//! Command-line surface.
//!
//! One subcommand per check. Thresholds arrive as positional strings and are
//! validated against a small per-check schema before anything touches the
//! proc tree or the sample store.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};

use crate::config::ProbeConfig;
use crate::constants::LOG_ENV;
use crate::error::{ProbeError, Result};
use crate::threshold::{Status, Threshold};

/// Linux metrics check for Nagios-style supervisors
#[derive(Parser, Debug)]
#[command(name = "check_linux_metrics")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the previous samples of rate checks
    #[arg(long, global = true, env = "LINUX_METRICS_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Root of the proc filesystem
    #[arg(long, global = true, env = "LINUX_METRICS_PROC_ROOT")]
    pub proc_root: Option<PathBuf>,

    /// Directory block device paths must resolve into
    #[arg(long, global = true, env = "LINUX_METRICS_DEV_ROOT")]
    pub dev_root: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Optional `warn crit` pair; for list checks each is a comma list.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct Bounds {
    /// Warning threshold
    #[arg(requires = "crit", allow_hyphen_values = true)]
    pub warn: Option<String>,

    /// Critical threshold
    #[arg(allow_hyphen_values = true)]
    pub crit: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// CPU busy percentage since the previous run
    Cpu(Bounds),
    /// Load averages, thresholds as w1,w5,w15 c1,c5,c15
    Load(Bounds),
    /// Running threads
    Threads(Bounds),
    /// Allocated file handles
    Files(Bounds),
    /// Process states and fork rate, thresholds as total,running,waiting
    Procs(Bounds),
    /// Block device I/O in sectors per second, thresholds as read,write
    Diskio {
        /// Device name (sda) or path below the device directory
        device: String,
        #[command(flatten)]
        bounds: Bounds,
    },
    /// Filesystem usage percentage
    Disku {
        /// Mount point
        mount: PathBuf,
        #[command(flatten)]
        bounds: Bounds,
    },
    /// Memory usage percentage
    Memory(Bounds),
    /// Swap usage percentage
    Swap(Bounds),
    /// Interface throughput in MB/s, thresholds as rx,tx
    Network {
        /// Interface name as listed in /proc/net/dev
        interface: String,
        #[command(flatten)]
        bounds: Bounds,
    },
}

/// How a check's thresholds are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// One number each for warn and crit
    Scalar,
    /// Comma lists of `min..=max` entries; an empty entry skips that slot
    List { min: usize, max: usize },
}

/// A fully validated check invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckRequest {
    Cpu(Option<Threshold>),
    Load(Vec<Threshold>),
    Threads(Option<Threshold>),
    Files(Option<Threshold>),
    Procs(Vec<Threshold>),
    DiskIo {
        device: String,
        thresholds: Vec<Threshold>,
    },
    DiskUsage {
        mount: PathBuf,
        threshold: Option<Threshold>,
    },
    Memory(Option<Threshold>),
    Swap(Option<Threshold>),
    Network {
        interface: String,
        thresholds: Vec<Threshold>,
    },
}

impl Command {
    pub fn arity(&self) -> Arity {
        match self {
            Command::Load(_) | Command::Procs(_) => Arity::List { min: 1, max: 3 },
            Command::Diskio { .. } | Command::Network { .. } => Arity::List { min: 2, max: 2 },
            _ => Arity::Scalar,
        }
    }

    fn bounds(&self) -> &Bounds {
        match self {
            Command::Cpu(bounds)
            | Command::Load(bounds)
            | Command::Threads(bounds)
            | Command::Files(bounds)
            | Command::Procs(bounds)
            | Command::Memory(bounds)
            | Command::Swap(bounds)
            | Command::Diskio { bounds, .. }
            | Command::Disku { bounds, .. }
            | Command::Network { bounds, .. } => bounds,
        }
    }

    /// Validate thresholds and build the request.
    pub fn request(&self) -> Result<CheckRequest> {
        let bounds = self.bounds();
        let (scalar, list) = match self.arity() {
            Arity::Scalar => (parse_scalar(bounds)?, Vec::new()),
            Arity::List { min, max } => (None, parse_list(bounds, min, max)?),
        };

        Ok(match self {
            Command::Cpu(_) => CheckRequest::Cpu(scalar),
            Command::Load(_) => CheckRequest::Load(list),
            Command::Threads(_) => CheckRequest::Threads(scalar),
            Command::Files(_) => CheckRequest::Files(scalar),
            Command::Procs(_) => CheckRequest::Procs(list),
            Command::Diskio { device, .. } => CheckRequest::DiskIo {
                device: device.clone(),
                thresholds: list,
            },
            Command::Disku { mount, .. } => CheckRequest::DiskUsage {
                mount: mount.clone(),
                threshold: scalar,
            },
            Command::Memory(_) => CheckRequest::Memory(scalar),
            Command::Swap(_) => CheckRequest::Swap(scalar),
            Command::Network { interface, .. } => CheckRequest::Network {
                interface: interface.clone(),
                thresholds: list,
            },
        })
    }
}

fn parse_number(raw: &str) -> Result<f64> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ProbeError::argument(format!("Invalid threshold value: ({raw})"))),
    }
}

fn parse_scalar(bounds: &Bounds) -> Result<Option<Threshold>> {
    match (&bounds.warn, &bounds.crit) {
        (None, None) => Ok(None),
        (Some(warn), Some(crit)) => {
            Threshold::new(Some(parse_number(warn)?), Some(parse_number(crit)?))
                .map(Some)
                .map_err(ProbeError::Argument)
        }
        _ => Err(ProbeError::argument(
            "Warning and critical thresholds must be given together",
        )),
    }
}

fn parse_list(bounds: &Bounds, min: usize, max: usize) -> Result<Vec<Threshold>> {
    let (warn, crit) = match (&bounds.warn, &bounds.crit) {
        (None, None) => return Ok(Vec::new()),
        (Some(warn), Some(crit)) => (warn, crit),
        _ => {
            return Err(ProbeError::argument(
                "Warning and critical thresholds must be given together",
            ))
        }
    };

    let warns: Vec<&str> = warn.split(',').collect();
    let crits: Vec<&str> = crit.split(',').collect();
    if warns.len() != crits.len() {
        return Err(ProbeError::argument(format!(
            "Warning ({warn}) and critical ({crit}) lists differ in length"
        )));
    }
    if warns.len() < min || warns.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{min} to {max}")
        };
        return Err(ProbeError::argument(format!(
            "Expected {expected} comma separated thresholds, got {}",
            warns.len()
        )));
    }

    let entry = |raw: &str| -> Result<Option<f64>> {
        if raw.trim().is_empty() {
            Ok(None)
        } else {
            parse_number(raw).map(Some)
        }
    };
    warns
        .into_iter()
        .zip(crits)
        .map(|(w, c)| Threshold::new(entry(w)?, entry(c)?).map_err(ProbeError::Argument))
        .collect()
}

/// Output and status for a run that stops during argument parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EarlyExit {
    pub status: Status,
    /// Printed verbatim to stdout, newline included
    pub output: String,
}

/// The single `Plugin Error:` line every failed run prints.
pub fn plugin_error(message: impl fmt::Display) -> String {
    format!("Plugin Error: {message}")
}

impl From<clap::Error> for EarlyExit {
    fn from(err: clap::Error) -> Self {
        if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
            return EarlyExit {
                status: Status::Ok,
                output: err.to_string(),
            };
        }
        let rendered = err.to_string();
        let first = rendered.lines().next().unwrap_or("invalid arguments");
        EarlyExit {
            status: Status::Unknown,
            output: format!("{}\n", plugin_error(first.trim_start_matches("error: "))),
        }
    }
}

impl Cli {
    /// Parse `args`, turning help, version and usage errors into an [`EarlyExit`].
    pub fn parse_args<I, T>(args: I) -> std::result::Result<Self, EarlyExit>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Cli::try_parse_from(args).map_err(EarlyExit::from)
    }

    /// Defaults, overridden by flags or their environment variables.
    pub fn config(&self) -> ProbeConfig {
        let mut config = ProbeConfig::default();
        if let Some(dir) = &self.state_dir {
            config.state_dir = dir.clone();
        }
        if let Some(root) = &self.proc_root {
            config.proc_root = root.clone();
        }
        if let Some(root) = &self.dev_root {
            config.dev_root = root.clone();
        }
        config
    }

    /// Log to stderr so stdout stays a single status line.
    pub fn init_logging(&self) -> std::result::Result<(), tracing_subscriber::util::TryInitError> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let filter = if self.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_env(LOG_ENV)
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("warn"))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact();

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["check_linux_metrics"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn request(args: &[&str]) -> Result<CheckRequest> {
        parse(args).command.request()
    }

    fn pair(warn: f64, crit: f64) -> Threshold {
        Threshold::new(Some(warn), Some(crit)).unwrap()
    }

    #[test]
    fn test_scalar_thresholds() {
        assert_eq!(request(&["cpu"]).unwrap(), CheckRequest::Cpu(None));
        assert_eq!(
            request(&["memory", "80", "90.5"]).unwrap(),
            CheckRequest::Memory(Some(pair(80.0, 90.5)))
        );
    }

    #[test]
    fn test_warn_must_be_below_crit() {
        let err = request(&["cpu", "90", "80"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Warning(90) threshold should be less than critical(80)"
        );
        assert!(request(&["swap", "50", "50"]).is_err());
    }

    #[test]
    fn test_non_numeric_threshold() {
        let err = request(&["files", "lots", "more"]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid threshold value: (lots)");
        assert!(request(&["threads", "inf", "NaN"]).is_err());
    }

    #[test]
    fn test_warn_without_crit_is_rejected_by_parser() {
        assert!(Cli::try_parse_from(["check_linux_metrics", "cpu", "80"]).is_err());
    }

    #[test]
    fn test_load_list_with_skipped_entry() {
        let thresholds = match request(&["load", "1,,3", "2,,4"]).unwrap() {
            CheckRequest::Load(thresholds) => thresholds,
            other => panic!("unexpected request {other:?}"),
        };
        assert_eq!(thresholds, vec![pair(1.0, 2.0), Threshold::default(), pair(3.0, 4.0)]);
    }

    #[test]
    fn test_list_single_bound_slot() {
        let thresholds = match request(&["procs", "500,", "600,10"]).unwrap() {
            CheckRequest::Procs(thresholds) => thresholds,
            other => panic!("unexpected request {other:?}"),
        };
        assert_eq!(thresholds[1], Threshold::new(None, Some(10.0)).unwrap());
    }

    #[test]
    fn test_list_arity() {
        assert!(request(&["load", "1,2,3,4", "5,6,7,8"]).is_err());
        assert!(request(&["load", "1,2", "3"]).is_err());
        let err = request(&["network", "eth0", "10", "20"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Expected 2 comma separated thresholds, got 1"
        );
    }

    #[test]
    fn test_diskio_and_network_requests() {
        assert_eq!(
            request(&["diskio", "sda", "100,200", "300,400"]).unwrap(),
            CheckRequest::DiskIo {
                device: "sda".to_string(),
                thresholds: vec![pair(100.0, 300.0), pair(200.0, 400.0)],
            }
        );
        assert_eq!(
            request(&["network", "eth0"]).unwrap(),
            CheckRequest::Network {
                interface: "eth0".to_string(),
                thresholds: Vec::new(),
            }
        );
        assert_eq!(
            request(&["disku", "/", "80", "90"]).unwrap(),
            CheckRequest::DiskUsage {
                mount: PathBuf::from("/"),
                threshold: Some(pair(80.0, 90.0)),
            }
        );
    }

    #[test]
    fn test_config_overrides() {
        let cli = parse(&["--state-dir", "/tmp/s", "cpu", "--proc-root", "/tmp/p"]);
        let config = cli.config();
        assert_eq!(config.state_dir, PathBuf::from("/tmp/s"));
        assert_eq!(config.proc_root, PathBuf::from("/tmp/p"));
    }

    #[test]
    fn test_missing_subcommand_is_parse_error() {
        let exit = Cli::parse_args(["check_linux_metrics"]).unwrap_err();
        assert_eq!(exit.status, Status::Unknown);
        assert!(exit.output.starts_with("Plugin Error: "), "{}", exit.output);
    }

    #[test]
    fn test_unknown_subcommand_is_one_plugin_error_line() {
        let exit = Cli::parse_args(["check_linux_metrics", "bogus"]).unwrap_err();
        assert_eq!(exit.status, Status::Unknown);
        assert_eq!(exit.output, "Plugin Error: unrecognized subcommand 'bogus'\n");
    }

    #[test]
    fn test_help_and_version_exit_ok() {
        let help = Cli::parse_args(["check_linux_metrics", "--help"]).unwrap_err();
        assert_eq!(help.status, Status::Ok);
        assert!(help.output.contains("Usage:"), "{}", help.output);

        let version = Cli::parse_args(["check_linux_metrics", "--version"]).unwrap_err();
        assert_eq!(version.status, Status::Ok);
        assert!(version.output.starts_with("check_linux_metrics "));
    }

    #[test]
    fn test_negative_thresholds_are_values() {
        let cli = Cli::parse_args(["check_linux_metrics", "load", "-1,2", "3,4", "-v"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(
            cli.command.request().unwrap(),
            CheckRequest::Load(vec![pair(-1.0, 3.0), pair(2.0, 4.0)])
        );
        assert_eq!(
            request(&["cpu", "-10", "-5"]).unwrap(),
            CheckRequest::Cpu(Some(pair(-10.0, -5.0)))
        );
    }
}
