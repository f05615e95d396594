//! Command-line entry point for the Warden sandbox runner.
//!
//! Reads protocol records from standard input and writes them to standard
//! output. Diagnostics go to standard error.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use warden_runner::{StructuredLifecycleReporter, SystemConfigLoader, bootstrap_with};

fn main() -> ExitCode {
    let reporter = Arc::new(StructuredLifecycleReporter::new());
    let session = match bootstrap_with(&SystemConfigLoader, reporter) {
        Ok(session) => session,
        Err(error) => {
            let mut stderr = io::stderr().lock();
            drop(writeln!(stderr, "warden-runner: {error}"));
            return ExitCode::FAILURE;
        }
    };

    let status = session.run(io::stdin().lock(), io::stdout().lock());
    ExitCode::from(status)
}
