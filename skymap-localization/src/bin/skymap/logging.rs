//! stderr logging for the skymap binary

use anyhow::Context;
use flexi_logger::{Logger, LoggerHandle};

/// Starts the logger. `RUST_LOG`, when set, takes precedence over `level`.
/// The returned handle must stay alive for the duration of the program.
pub fn init(level: &str) -> anyhow::Result<LoggerHandle> {
    Logger::try_with_env_or_str(level)
        .with_context(|| format!("invalid log specification `{}`", level))?
        .log_to_stderr()
        .format(flexi_logger::default_format)
        .start()
        .context("failed to start logger")
}
