use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber: JSON lines on stderr, since stdout
/// carries the event stream. `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
