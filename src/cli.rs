//! Shared plumbing for the `deck-render` and `deck-ocr` binaries.
//!
//! Both binaries speak the same protocol: exactly one JSON object per run,
//! on stdout for success and stderr for failure, exit code 0 or 1. Logging
//! shares stderr with the failure object, so it is off unless asked for.

use crate::envelope::Envelope;
use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use serde::Serialize;
use std::ffi::OsString;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber. `RUST_LOG` wins over `--verbose`.
pub fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "off" };
    // A second init (e.g. in tests) is harmless; keep the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .with_ansi(false)
        .try_init();
}

/// Parse the process command line, reporting usage errors as a
/// `UsageError` object. See [`parse_args_from`].
pub fn parse_args<C: Parser>(detailed: bool) -> std::result::Result<C, ExitCode> {
    parse_args_from(std::env::args_os(), detailed)
}

/// Parse `args` (program name first).
///
/// `--help` and `--version` print normally and yield exit 0. Anything else
/// clap rejects is emitted as a failure object and yields exit 1.
pub fn parse_args_from<C, I, T>(args: I, detailed: bool) -> std::result::Result<C, ExitCode>
where
    C: Parser,
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    C::try_parse_from(args).map_err(|e| match usage_failure(&e, detailed) {
        None => {
            let _ = e.print();
            ExitCode::SUCCESS
        }
        Some(failure) => emit(&failure).unwrap_or(ExitCode::FAILURE),
    })
}

/// The failure object for a clap error, or `None` for help/version output.
///
/// With `detailed == false` the message is clap's generic description only,
/// so argument values never reach the output.
pub fn usage_failure(e: &clap::Error, detailed: bool) -> Option<Envelope<()>> {
    match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => None,
        kind => {
            let message = if detailed {
                e.to_string().trim().to_string()
            } else {
                kind.as_str().unwrap_or("invalid command line").to_string()
            };
            Some(Envelope::failure("UsageError", message))
        }
    }
}

/// Print `envelope` to the right stream and pick the exit code.
pub fn emit<T: Serialize>(envelope: &Envelope<T>) -> Result<ExitCode> {
    let json = envelope.to_json();
    if envelope.is_success() {
        let mut out = io::stdout().lock();
        writeln!(out, "{json}").context("Failed to write result to stdout")?;
        out.flush().context("Failed to flush stdout")?;
        Ok(ExitCode::SUCCESS)
    } else {
        let mut err = io::stderr().lock();
        writeln!(err, "{json}").context("Failed to write result to stderr")?;
        Ok(ExitCode::FAILURE)
    }
}
