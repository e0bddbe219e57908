// src/bin/otlpinput.rs
//! Listens for OTLP data and forwards it to the local HTTP Event Collector,
//! authenticating with the caller's own `Authorization` header.

use std::process::ExitCode;
use std::sync::Arc;

use splunk_connect_for_otlp::cli;
use splunk_connect_for_otlp::extension::{Extensions, HeadersSetter};
use splunk_connect_for_otlp::{BootstrapConfig, ServiceConfig};

fn wiring(bootstrap: &BootstrapConfig) -> anyhow::Result<(ServiceConfig, Extensions)> {
    let mut extensions = Extensions::new();
    extensions.register(Arc::new(HeadersSetter::authorization_passthrough()));
    Ok((ServiceConfig::hec(bootstrap), extensions))
}

fn main() -> ExitCode {
    cli::main(wiring)
}
