//! Tracing setup for the sidecar.
//!
//! stdout carries the JSON-lines protocol, so every log line goes to stderr.
//! - LOG_LEVEL holds `EnvFilter` directives (default "info").
//! - LOG_FORMAT selects "json" or pretty (default).

use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => {
            builder.json().init();
        }
        _ => {
            builder.init();
        }
    }
}
