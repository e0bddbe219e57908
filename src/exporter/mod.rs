// src/exporter/mod.rs
//! Terminal pipeline stages.

mod hec;
mod stdout;

pub use hec::{HecConfig, HecExporter, DEFAULT_HEC_ENDPOINT};
pub use stdout::StdoutExporter;
