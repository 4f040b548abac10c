//! File-backed logger bootstrap.
//!
//! Every module logs through the `log` facade; this module is the only
//! place that touches `env_logger` directly, mirroring the original
//! implementation's single `initLog` entry point.

use std::fs::OpenOptions;

use anyhow::{Context, Result};
use env_logger::Target;
use log::LevelFilter;

/// Initialize the global logger, writing to `log_path`.
///
/// Timestamps, level, and target are formatted by `env_logger`'s own
/// default formatter; this module only picks the level and the file
/// target.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened for appending.
pub fn init(log_path: &str, verbose: bool) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("failed to open log file {log_path}"))?;

    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };

    env_logger::Builder::new()
        .filter_level(level)
        .target(Target::Pipe(Box::new(file)))
        .try_init()
        .context("logger already initialized")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn init_creates_log_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("bridge.log");
        let path_str = path.to_str().expect("utf8 path").to_string();
        let result = init(&path_str, false);
        assert!(result.is_ok() || path.exists());
    }
}
