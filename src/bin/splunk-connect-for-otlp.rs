// src/bin/splunk-connect-for-otlp.rs
//! Listens for OTLP data and writes every record to stdout as one line.

use std::process::ExitCode;

use splunk_connect_for_otlp::cli;
use splunk_connect_for_otlp::extension::Extensions;
use splunk_connect_for_otlp::{BootstrapConfig, ServiceConfig};

fn wiring(bootstrap: &BootstrapConfig) -> anyhow::Result<(ServiceConfig, Extensions)> {
    Ok((ServiceConfig::stdout(bootstrap)?, Extensions::new()))
}

fn main() -> ExitCode {
    cli::main(wiring)
}
