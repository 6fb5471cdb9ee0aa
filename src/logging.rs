use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "ABUSE_LOG";

/// Stderr subscriber for the command-line tools. Filter directives come from `ABUSE_LOG`.
pub fn init_cli_logging() {
    let raw = std::env::var(LOG_ENV).ok();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(cli_filter(raw.as_deref()))
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Falls back to `info` when the directives are missing or unparsable.
pub fn cli_filter(raw: Option<&str>) -> EnvFilter {
    raw.map(str::trim)
        .filter(|r| !r.is_empty())
        .and_then(|r| EnvFilter::try_new(r).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn filter_reads_directives_and_defaults_to_info() {
        assert_eq!(cli_filter(None).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(cli_filter(Some("  ")).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(
            cli_filter(Some("debug")).max_level_hint(),
            Some(LevelFilter::DEBUG)
        );
        assert_eq!(
            cli_filter(Some("warn,valo_abuse_terminal=trace")).max_level_hint(),
            Some(LevelFilter::TRACE)
        );
    }
}
