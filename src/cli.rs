//! Process entry shared by both binaries.

use anyhow::Context;
use clap::Parser;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::process::ExitCode;
use tracing::{error, info};

use crate::config::BootstrapConfig;
use crate::extension::Extensions;
use crate::service::{Service, ServiceConfig};
use crate::{logging, SCHEME};

#[derive(Parser, Debug)]
#[command(version)]
#[command(about = "Receive OTLP data and re-express it as Splunk HEC events")]
#[command(after_help = "Without flags, reads the input configuration XML from stdin and runs until SIGINT/SIGTERM.")]
pub struct Cli {
    /// Print the modular-input scheme and exit
    #[arg(long)]
    pub scheme: bool,

    /// Accept the input configuration without validating it
    #[arg(long, conflicts_with = "scheme")]
    pub validate_arguments: bool,
}

/// Builds the pipeline for one binary from the bootstrap configuration.
pub type Wiring = fn(&BootstrapConfig) -> anyhow::Result<(ServiceConfig, Extensions)>;

/// Parses the command line and runs the pipeline. Fatal errors and panics
/// are logged and turn into exit code 1.
pub fn main(wiring: Wiring) -> ExitCode {
    let cli = Cli::parse();
    if cli.scheme {
        println!("{SCHEME}");
        return ExitCode::SUCCESS;
    }
    if cli.validate_arguments {
        return ExitCode::SUCCESS;
    }

    logging::init_tracing();

    match panic::catch_unwind(AssertUnwindSafe(|| run(wiring))) {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(e)) => {
            error!(error = ?e, "fatal error");
            ExitCode::FAILURE
        }
        Err(payload) => {
            error!(panic = panic_message(payload.as_ref()), "fatal panic");
            ExitCode::FAILURE
        }
    }
}

fn run(wiring: Wiring) -> anyhow::Result<()> {
    let bootstrap = BootstrapConfig::read_from(std::io::stdin().lock())
        .context("failed to read input configuration")?;
    info!(stanza = ?bootstrap.stanza_name, "Starting OTLP input");

    let (config, extensions) = wiring(&bootstrap)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(Service::build(config, extensions).run())
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse() {
        let cli = Cli::try_parse_from(["otlpinput", "--scheme"]).unwrap();
        assert!(cli.scheme);
        let cli = Cli::try_parse_from(["otlpinput", "--validate-arguments"]).unwrap();
        assert!(cli.validate_arguments);
        let cli = Cli::try_parse_from(["otlpinput"]).unwrap();
        assert!(!cli.scheme && !cli.validate_arguments);
    }

    #[test]
    fn unknown_flags_are_rejected() {
        assert!(Cli::try_parse_from(["otlpinput", "--bogus"]).is_err());
    }

    #[test]
    fn panic_payloads_are_readable() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
