//! Logging setup.
//!
//! Logs go to stderr so they never mix with command output. The filter comes
//! from `RICHNOTE_LOG`, then `RUST_LOG`, and defaults to `warn`.

use std::env;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

pub fn init() -> Result<()> {
    let filter = create_filter()?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("Failed to initialize logging: {err}"))
}

fn create_filter() -> Result<EnvFilter> {
    filter_from(env::var("RICHNOTE_LOG").ok(), env::var("RUST_LOG").ok())
}

fn filter_from(richnote_log: Option<String>, rust_log: Option<String>) -> Result<EnvFilter> {
    if let Some(directives) = richnote_log {
        return EnvFilter::try_new(&directives)
            .with_context(|| format!("Invalid RICHNOTE_LOG value: {directives}"));
    }
    if let Some(directives) = rust_log {
        return EnvFilter::try_new(&directives)
            .with_context(|| format!("Invalid RUST_LOG value: {directives}"));
    }
    Ok(EnvFilter::new("warn"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_priority() {
        let filter = filter_from(Some("richnote_core=trace".into()), Some("info".into())).unwrap();
        assert_eq!(filter.to_string(), "richnote_core=trace");

        let filter = filter_from(None, Some("debug".into())).unwrap();
        assert_eq!(filter.to_string(), "debug");

        let filter = filter_from(None, None).unwrap();
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn test_invalid_filter_is_reported() {
        let err = filter_from(Some("richnote_core=loud".into()), None).unwrap_err();
        assert!(err.to_string().contains("RICHNOTE_LOG"));
    }
}
