use clap::Parser;
use livelog::config::{ConfigError, DashboardConfig};
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
pub struct ChannelOpts {
    /// Event channel endpoint (e.g., tcp://localhost:5000, tcp6://[::1])
    #[arg(short = 'e', long = "endpoint", help = "Event channel endpoint")]
    pub endpoint: Option<String>,

    /// YAML dashboard configuration; flags given here take precedence
    #[arg(short = 'c', long = "config", help = "Dashboard configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long = "connect-timeout-ms", help = "Connect timeout in milliseconds")]
    pub connect_timeout_ms: Option<u64>,

    /// Diagnostics go here, filtered by RUST_LOG
    #[arg(long = "log-file", help = "Write diagnostics to this file")]
    pub log_file: Option<PathBuf>,
}

impl ChannelOpts {
    /// Loads the configuration file, if any, and applies the flags on top.
    pub fn load_config(&self) -> Result<DashboardConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => DashboardConfig::load(path)?,
            None => DashboardConfig::default(),
        };
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.connect_timeout_ms = ms;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Installs the global tracing subscriber. With no log file, diagnostics go
/// to stderr when `stderr` is set and are dropped otherwise.
pub fn init_tracing(log_file: Option<&Path>, stderr: bool) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let _ = builder.with_ansi(false).with_writer(Mutex::new(file)).try_init();
        }
        None if stderr => {
            let _ = builder.with_writer(io::stderr).try_init();
        }
        None => {}
    }
    Ok(())
}

/// Removes `<...>` tags and decodes the common character entities, for
/// showing free-text entries on a terminal.
pub fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    if !out.contains('&') {
        return out;
    }
    out.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Truncates `text` to at most `width` characters.
pub fn fit(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(args: &[&str]) -> ChannelOpts {
        ChannelOpts::parse_from(std::iter::once("test").chain(args.iter().copied()))
    }

    #[test]
    fn flags_override_defaults() {
        let config = opts(&["-e", "tcp://10.1.1.1:7000", "--connect-timeout-ms", "250"])
            .load_config()
            .unwrap();
        assert_eq!(config.endpoint, "tcp://10.1.1.1:7000");
        assert_eq!(config.connect_timeout_ms, 250);
        assert_eq!(config.max_rows, 100);
    }

    #[test]
    fn bad_endpoint_flag() {
        assert!(opts(&["--endpoint", "udp://x"]).load_config().is_err());
    }

    #[test]
    fn markup_is_stripped() {
        assert_eq!(strip_markup("<b>Thread</b> started"), "Thread started");
        assert_eq!(strip_markup("a &lt;b&gt; &amp;lt;"), "a <b> &lt;");
        assert_eq!(strip_markup("plain"), "plain");
    }

    #[test]
    fn fit_counts_chars() {
        assert_eq!(fit("héllo", 2), "hé");
        assert_eq!(fit("ab", 10), "ab");
    }
}
