use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Console logging, `info` by default, overridable with `RUST_LOG`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "aria_flair=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}
