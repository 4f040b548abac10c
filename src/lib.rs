// Library modules
pub mod app_protocol;
pub mod config;
pub mod constants;
pub mod error;
pub mod handler;
pub mod line_buffer;
pub mod logging;
pub mod netbeans;
pub mod proc_runner;
pub mod proxy;
pub mod pty;
pub mod session;

// Re-export commonly used types
pub use config::Config;
pub use error::BridgeError;
pub use session::Session;
