use tracing_subscriber::EnvFilter;

use crate::cli::LogFormat;

/// `RUST_LOG` (default `info`) selects verbosity; `--log-format` selects
/// the sink's rendering, matching this workspace's preference for
/// `tracing`/`tracing-subscriber` over a hand-rolled logger.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Pretty => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}
