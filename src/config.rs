use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Mindwell";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// ═══════════════════════════════════════════
// Clinical constants
// ═══════════════════════════════════════════

/// Allowed session length in minutes, inclusive on both ends.
pub const MIN_SESSION_MINUTES: i32 = 30;
pub const MAX_SESSION_MINUTES: i32 = 180;

pub const MOOD_MIN: i32 = 1;
pub const MOOD_MAX: i32 = 10;

pub const DEFAULT_GROUP_CAPACITY: i32 = 12;
pub const DEFAULT_GROUP_SESSION_CAPACITY: i32 = 10;

/// Lifetime of a consent created through the emergency path.
pub const EMERGENCY_CONSENT_HOURS: i64 = 72;

/// Days until follow-up for a moderate assessment result.
pub const MODERATE_FOLLOW_UP_DAYS: i64 = 14;
/// Days until follow-up for severe results or any suicidal ideation.
pub const URGENT_FOLLOW_UP_DAYS: i64 = 7;

pub const AUDIT_RETENTION_DAYS: i64 = 90;

// ═══════════════════════════════════════════
// Runtime defaults
// ═══════════════════════════════════════════

pub const DEFAULT_ADDR: &str = "127.0.0.1:4010";
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;
const DB_FILE_NAME: &str = "mindwell.db";

/// Get the application data directory.
/// `MHS_DATA_DIR` wins; otherwise ~/Mindwell/ on all platforms.
pub fn app_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MHS_DATA_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// Path of the SQLite store inside a data directory.
pub fn db_path_in(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join(DB_FILE_NAME)
}

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "mindwell_lib=info,mindwell=info,tower_http=warn"
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub addr: SocketAddr,
    pub data_dir: PathBuf,
    pub sweep_interval: Duration,
    pub audit_retention_days: i64,
}

impl AppConfig {
    /// Read configuration from the process environment.
    /// A `.env` file in the working directory is loaded first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let addr_raw = lookup("MHS_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_raw.parse().map_err(|_| ConfigError::Invalid {
            key: "MHS_ADDR",
            value: addr_raw.clone(),
        })?;

        let data_dir = lookup("MHS_DATA_DIR")
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(app_data_dir);

        let sweep_secs = parse_or(&lookup, "MHS_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?;
        if sweep_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "MHS_SWEEP_INTERVAL_SECS",
                value: "0".into(),
            });
        }

        let audit_retention_days =
            parse_or(&lookup, "MHS_AUDIT_RETENTION_DAYS", AUDIT_RETENTION_DAYS)?;

        Ok(Self {
            addr,
            data_dir,
            sweep_interval: Duration::from_secs(sweep_secs),
            audit_retention_days,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        db_path_in(&self.data_dir)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = AppConfig::from_lookup(lookup_from(&[("MHS_DATA_DIR", "/tmp/mw")])).unwrap();
        assert_eq!(cfg.addr.to_string(), DEFAULT_ADDR);
        assert_eq!(cfg.sweep_interval, Duration::from_secs(3600));
        assert_eq!(cfg.audit_retention_days, 90);
        assert_eq!(cfg.db_path(), PathBuf::from("/tmp/mw/mindwell.db"));
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("MHS_ADDR", "0.0.0.0:9000"),
            ("MHS_SWEEP_INTERVAL_SECS", "60"),
            ("MHS_AUDIT_RETENTION_DAYS", "30"),
        ]))
        .unwrap();
        assert_eq!(cfg.addr.port(), 9000);
        assert_eq!(cfg.sweep_interval, Duration::from_secs(60));
        assert_eq!(cfg.audit_retention_days, 30);
    }

    #[test]
    fn bad_address_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("MHS_ADDR", "not-an-addr")])).unwrap_err();
        assert!(err.to_string().contains("MHS_ADDR"));
    }

    #[test]
    fn zero_sweep_interval_is_rejected() {
        assert!(AppConfig::from_lookup(lookup_from(&[("MHS_SWEEP_INTERVAL_SECS", "0")])).is_err());
    }

    #[test]
    fn app_name_is_mindwell() {
        assert_eq!(APP_NAME, "Mindwell");
    }

    #[test]
    fn session_bounds_are_ordered() {
        assert!(MIN_SESSION_MINUTES < MAX_SESSION_MINUTES);
        assert!(MOOD_MIN < MOOD_MAX);
    }
}
