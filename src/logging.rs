use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "spending_etl=info";

/// Initializes console logging.
///
/// `RUST_LOG` wins when set; otherwise `level` (a directive such as `debug`
/// or `spending_etl=trace`) or the crate-level default applies. Logs go to
/// stderr so stdout stays clean for `--json` summaries.
pub fn init_logging(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(level.unwrap_or(DEFAULT_DIRECTIVE))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
    });

    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    // A second call (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init();
}
