use std::process::ExitCode;

mod checks;
mod cli;
mod config;
mod constants;
mod cpu;
mod disk;
mod error;
mod files;
#[cfg(test)]
mod fixture;
mod load;
mod memory;
mod network;
mod procfs;
mod procs;
mod rate;
mod report;
mod store;
mod threshold;

use checks::Probe;
use cli::{plugin_error, Cli};
use threshold::Status;

/// Print one status line and map the status to the exit code.
fn finish(line: &str, status: Status) -> ExitCode {
    println!("{line}");
    ExitCode::from(status.code())
}

fn main() -> ExitCode {
    let cli = match Cli::parse_args(std::env::args_os()) {
        Ok(cli) => cli,
        Err(exit) => {
            print!("{}", exit.output);
            return ExitCode::from(exit.status.code());
        }
    };

    if let Err(err) = cli.init_logging() {
        eprintln!("logging disabled: {err}");
    }

    let request = match cli.command.request() {
        Ok(request) => request,
        Err(err) => return finish(&plugin_error(err), Status::Unknown),
    };

    let probe = Probe::new(cli.config());
    match probe.run(&request) {
        Ok(result) => {
            tracing::debug!(status = %result.status, "check finished");
            finish(&result.to_string(), result.status)
        }
        Err(err) => {
            tracing::debug!(error = ?err, "check failed");
            finish(&plugin_error(err), Status::Unknown)
        }
    }
}
