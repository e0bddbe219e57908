// src/lib.rs
//! OTLP logs, traces and metrics re-expressed as Splunk HEC events.

pub mod cli;
pub mod component;
pub mod config;
pub mod decode;
pub mod encode;
pub mod error;
pub mod exporter;
pub mod extension;
pub mod hec;
pub mod host;
pub mod logging;
pub mod model;
pub mod receiver;
mod scheme;
pub mod service;
mod signal;

pub use config::BootstrapConfig;
pub use host::{HostState, PipelineHost};
pub use scheme::SCHEME;
pub use service::{Output, Service, ServiceConfig};
pub use signal::Signal;
