//! NetBeans-protocol bridge between a text editor and PTY-spawned child
//! processes.

use std::process::ExitCode;

use log::error;
use vim_async_beans::config::Config;
use vim_async_beans::session::Session;

fn main() -> ExitCode {
    let config = Config::parse();

    if let Err(e) = vim_async_beans::logging::init(&config.log_path, config.verbose) {
        eprintln!("failed to initialize logging at {}: {e}", config.log_path);
        return ExitCode::FAILURE;
    }

    if config.background {
        if let Err(e) = daemonize() {
            error!("failed to daemonize: {e}");
            return ExitCode::FAILURE;
        }
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(Session::new(config).run()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("session ended with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Fork, detach from the controlling terminal, and `setsid`, so the
/// bridge keeps running after the launching shell exits.
#[cfg(unix)]
fn daemonize() -> anyhow::Result<()> {
    use anyhow::bail;

    // SAFETY: fork() is safe to call here; the child immediately calls
    // setsid() and the parent immediately exits without touching any
    // shared state the child might also mutate.
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        bail!("fork() failed");
    }
    if pid > 0 {
        std::process::exit(0);
    }
    // SAFETY: called once, immediately after fork, in the child only.
    if unsafe { libc::setsid() } < 0 {
        bail!("setsid() failed");
    }
    Ok(())
}

#[cfg(not(unix))]
fn daemonize() -> anyhow::Result<()> {
    anyhow::bail!("daemonization is only supported on unix")
}
