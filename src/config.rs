//! CLI surface and session configuration.
//!
//! There is no config file and nothing is persisted to disk: every run is
//! configured fresh from argv. `Config` is built once in `main` and handed
//! to [`crate::session::Session`].

use clap::Parser;

use crate::constants::{
    DEFAULT_BIND, DEFAULT_INBOX_FILENAME, DEFAULT_LOG_PATH, DEFAULT_OUTBOX_FILENAME, DEFAULT_PORT,
};

/// Command-line arguments for the bridge.
#[derive(Debug, Parser)]
#[command(name = "vim-async-beans", about = "NetBeans-protocol bridge to PTY processes")]
pub struct Args {
    /// Log file path.
    #[arg(short = 'l', long = "log", default_value_t = DEFAULT_LOG_PATH.to_string())]
    pub log: String,

    /// TCP port to listen on.
    #[arg(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Listen interface.
    #[arg(short = 'b', long = "bind", default_value_t = DEFAULT_BIND.to_string())]
    pub bind: String,

    /// Daemonize: fork, detach from the controlling terminal, and `setsid`.
    #[arg(short = 'g', long = "background")]
    pub background: bool,

    /// Raise the log level to debug.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Resolved session configuration, validated once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Log file path.
    pub log_path: String,
    /// TCP port to bind.
    pub port: u16,
    /// Listen interface.
    pub bind: String,
    /// Whether to daemonize after binding.
    pub background: bool,
    /// Whether debug-level logging was requested.
    pub verbose: bool,
    /// Filename registered with the editor for the inbox buffer.
    pub inbox_filename: String,
    /// Filename registered with the editor for the outbox buffer.
    pub outbox_filename: String,
}

impl Config {
    /// Build a `Config` from parsed CLI args, applying the defaults for the
    /// inbox/outbox filenames which are not user-configurable.
    #[must_use]
    pub fn from_args(args: Args) -> Self {
        Config {
            log_path: args.log,
            port: args.port,
            bind: args.bind,
            background: args.background,
            verbose: args.verbose,
            inbox_filename: DEFAULT_INBOX_FILENAME.to_string(),
            outbox_filename: DEFAULT_OUTBOX_FILENAME.to_string(),
        }
    }

    /// Parse `Config` directly from `std::env::args`.
    #[must_use]
    pub fn parse() -> Self {
        Self::from_args(Args::parse())
    }

    /// The socket address the bridge should bind, as a `host:port` string.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn defaults_match_spec() {
        let args = Args::parse_from(["vim-async-beans"]);
        let cfg = Config::from_args(args);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.bind, DEFAULT_BIND);
        assert_eq!(cfg.log_path, DEFAULT_LOG_PATH);
        assert!(!cfg.background);
        assert!(!cfg.verbose);
        assert_eq!(cfg.inbox_filename, DEFAULT_INBOX_FILENAME);
        assert_eq!(cfg.outbox_filename, DEFAULT_OUTBOX_FILENAME);
    }

    #[test]
    fn overrides_are_applied() {
        let args = Args::parse_from([
            "vim-async-beans",
            "-p",
            "7777",
            "-l",
            "/tmp/bridge.log",
            "-g",
            "-v",
        ]);
        let cfg = Config::from_args(args);
        assert_eq!(cfg.port, 7777);
        assert_eq!(cfg.log_path, "/tmp/bridge.log");
        assert!(cfg.background);
        assert!(cfg.verbose);
    }

    #[test]
    fn bind_addr_combines_host_and_port() {
        let args = Args::parse_from(["vim-async-beans", "-p", "1234", "-b", "0.0.0.0"]);
        let cfg = Config::from_args(args);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:1234");
    }

    #[test]
    fn rejects_non_numeric_port() {
        let result = Args::try_parse_from(["vim-async-beans", "-p", "notaport"]);
        assert!(result.is_err());
    }
}
