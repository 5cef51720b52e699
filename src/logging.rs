//! tracing subscriber setup: a log file always, stderr outside the TUI

use tracing::Subscriber;
use tracing_subscriber::{fmt, fmt::MakeWriter, layer::SubscriberExt, EnvFilter, Layer};

pub const LOG_FILE: &str = "mediatheque.log";
pub const DEFAULT_DIRECTIVES: &str = "mediatheque=info";

/// Filter directives from `RUST_LOG`, or the crate at INFO
pub fn directives_from_env() -> String {
    std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_DIRECTIVES.to_string())
}

/// Build the subscriber. The terminal UI owns the screen, so it passes
/// `to_stderr = false` and only logs to the file.
pub fn subscriber<W>(directives: &str, file_writer: W, to_stderr: bool) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_filter(EnvFilter::new(directives));

    let stderr_layer = to_stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(EnvFilter::new(directives))
    });

    tracing_subscriber::registry().with(file_layer).with(stderr_layer)
}
