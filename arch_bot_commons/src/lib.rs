//! This create houses common for me functions, because some things
//! are just boilerplate and aaAAAAAAAAA

pub mod useful_methods;

mod retry;

use std::future::Future;

#[doc(hidden)]
pub mod __private {
    pub use log;
    pub use teloxide;
    pub use tokio;
}

/// Initialize logging and start the `closure` in an async runtime.
/// Logging is enabled on level `default_log_filter` unless overridden
/// by environment variable `RUST_LOG`. This uses the crate
/// [pretty_env_logger][] internally, see its documentation for more details.
///
/// # Panics
/// Panics if the tokio runtime fails to start.
///
/// [pretty_env_logger]: https://docs.rs/pretty_env_logger
pub fn start_everything(default_log_filter: &str, closure: impl Future<Output = ()>) {
    let log_level = std::env::var_os("RUST_LOG")
        .and_then(|x| x.into_string().ok())
        .unwrap_or_else(|| String::from(default_log_filter));

    let running_as_systemd_service = std::env::var_os("JOURNAL_STREAM").is_some();

    let mut builder = match running_as_systemd_service {
        true => pretty_env_logger::formatted_builder(),
        false => pretty_env_logger::formatted_timed_builder(),
    };

    builder.parse_filters(&log_level);

    if builder.try_init().is_err() {
        log::error!("Tried to init logger twice!");
    }

    log::info!("hi");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Could not start the tokio runtime!")
        .block_on(closure);
}

/// Read the bot's token from file `key`, or `key_debug` if this is a debug build.
///
/// # Errors
/// Errors if the file could not be read.
pub fn read_bot_key() -> std::io::Result<String> {
    let path = match cfg!(debug_assertions) {
        true => "key_debug",
        false => "key",
    };

    Ok(std::fs::read_to_string(path)?.trim().to_string())
}
