use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the diagnosis service, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub port: u16,
    pub models_dir: PathBuf,
    /// `json` or `pretty`.
    pub log_format: String,
    /// `None` disables session expiry.
    pub session_ttl: Option<Duration>,
    pub session_sweep: Duration,
    pub conversation_config: Option<PathBuf>,
    pub disease_catalog_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            models_dir: PathBuf::from("ml_models"),
            log_format: "json".to_string(),
            session_ttl: Some(Duration::from_secs(3600)),
            session_sweep: Duration::from_secs(60),
            conversation_config: None,
            disease_catalog_path: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Unset or unparsable values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let secs = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let path = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        };

        let session_ttl = match secs("SESSION_TTL_SECS") {
            Some(0) => None,
            Some(ttl) => Some(Duration::from_secs(ttl)),
            None => defaults.session_ttl,
        };

        Self {
            port: lookup("PORT")
                .and_then(|v| v.trim().parse::<u16>().ok())
                .unwrap_or(defaults.port),
            models_dir: path("MODELS_DIR").unwrap_or(defaults.models_dir),
            log_format: lookup("LOG_FORMAT").unwrap_or(defaults.log_format),
            session_ttl,
            session_sweep: secs("SESSION_SWEEP_SECS")
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.session_sweep),
            conversation_config: path("CONVERSATION_CONFIG"),
            disease_catalog_path: path("DISEASE_CATALOG_PATH"),
        }
    }
}
