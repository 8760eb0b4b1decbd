//! Server configuration, parsed from command-line flags with `RECS_*`
//! environment fallbacks.

use std::path::PathBuf;
use std::time::Duration;

use chrono::FixedOffset;
use clap::Parser;

/// Runtime configuration for recs4m-server.
///
/// Every field has a default so the server starts without any flags or
/// environment variables set.
#[derive(Parser, Debug, Clone)]
#[command(name = "recs4m-server", version, about = "Weekly scheduled stream recorder")]
pub struct Config {
    /// TCP address for the management API.
    #[arg(long = "bind", env = "RECS_BIND", default_value = "0.0.0.0:8080")]
    pub bind_address: String,

    /// sqlx SQLite URL of the reservation database.
    #[arg(long, env = "RECS_DATABASE_URL", default_value = "sqlite://recs4m.db")]
    pub database_url: String,

    /// MP3 stream to record from.
    #[arg(long = "stream", env = "RECS_STREAM_URL", default_value = "http://127.0.0.1:8000/audio")]
    pub stream_url: String,

    /// Program run as `<script> <artifact> <title> <occurrence>` after each capture.
    #[arg(long, env = "RECS_UPLOAD_SCRIPT", default_value = "./upload.sh")]
    pub upload_script: PathBuf,

    /// Directory for partial and finished recordings.
    #[arg(long, env = "RECS_CAPTURE_DIR", default_value_os_t = std::env::temp_dir())]
    pub capture_dir: PathBuf,

    /// UTC offset every weekday and start time is interpreted in.
    #[arg(
        long,
        env = "RECS_UTC_OFFSET",
        default_value = "+09:00",
        value_parser = parse_utc_offset,
        allow_hyphen_values = true
    )]
    pub utc_offset: FixedOffset,

    /// Seconds without stream data before a capture fails; 0 waits forever.
    #[arg(long, env = "RECS_READ_TIMEOUT_SECS", default_value_t = 30)]
    pub read_timeout_secs: u64,

    /// `tracing` filter string, e.g. `"info"` or `"debug,sqlx=warn"`.
    #[arg(long, env = "RECS_LOG", default_value = "info")]
    pub log_level: String,

    /// Emit log records as newline-delimited JSON.
    #[arg(long, env = "RECS_LOG_JSON")]
    pub log_json: bool,

    /// Shorthand for `--log-level debug`.
    #[arg(long)]
    pub debug: bool,

    /// Comma-separated allowed CORS origins; unset allows any.
    #[arg(long, env = "RECS_CORS_ORIGINS")]
    pub cors_allowed_origins: Option<String>,
}

impl Config {
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_secs > 0).then(|| Duration::from_secs(self.read_timeout_secs))
    }

    /// Filter used when `RUST_LOG` is not set.
    pub fn effective_log_level(&self) -> &str {
        if self.debug { "debug" } else { &self.log_level }
    }
}

/// Parse `+HH:MM` / `-HH:MM` (a bare `Z` means UTC).
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset, String> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0).ok_or_else(|| "invalid offset".to_owned());
    }
    let (sign, rest) = match raw.as_bytes().first() {
        Some(b'+') => (1, &raw[1..]),
        Some(b'-') => (-1, &raw[1..]),
        _ => return Err(format!("offset '{raw}' must start with '+' or '-'")),
    };
    let (h, m) = rest
        .split_once(':')
        .ok_or_else(|| format!("offset '{raw}' must look like +HH:MM"))?;
    let h: i32 = h.parse().map_err(|_| format!("bad hours in offset '{raw}'"))?;
    let m: i32 = m.parse().map_err(|_| format!("bad minutes in offset '{raw}'"))?;
    if h > 23 || m > 59 {
        return Err(format!("offset '{raw}' out of range"));
    }
    FixedOffset::east_opt(sign * (h * 3600 + m * 60)).ok_or_else(|| format!("offset '{raw}' out of range"))
}
