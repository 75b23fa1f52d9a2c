//! Tracing setup for the bridge.

use std::path::Path;

use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter directive covering the bridge and core crates at `level`.
pub fn filter_directive(level: &str) -> String {
    format!("ctv_android={},ctv_core={}", level, level)
}

/// Append-only writer for `path`, never rotated.
pub fn file_writer(path: &Path) -> RollingFileAppender {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "ctv-bridge.log".into());
    rolling::never(dir, name)
}

/// Install the global subscriber, writing to `log_file` when given and to
/// stderr otherwise. The host may initialise the bridge more than once per
/// process, so an existing subscriber is left in place.
pub fn init(level: &str, log_file: Option<&Path>) {
    let filter = EnvFilter::try_new(filter_directive(level)).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let _ = match log_file {
        Some(path) => registry
            .with(fmt::layer().with_writer(file_writer(path)).with_ansi(false))
            .try_init(),
        None => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
            .try_init(),
    };
}
