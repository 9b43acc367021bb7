use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origin allowed by CORS (the SPA dev server or its public URL)
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
    /// Directory with the built SPA; served with an index.html fallback when set
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            frontend_url: default_frontend_url(),
            static_dir: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_frontend_url() -> String {
    "http://localhost:5173".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite:./data/enigma.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for session tokens. Generated at startup when left empty.
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_session_hours")]
    pub session_hours: i64,
    /// Lifetime of a "remember me" session
    #[serde(default = "default_remember_days")]
    pub remember_days: i64,
    #[serde(default = "default_max_failed_logins")]
    pub max_failed_logins: i64,
    #[serde(default = "default_lockout_minutes")]
    pub lockout_minutes: i64,
    /// Seed administrator, created when no admin account exists
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            session_hours: default_session_hours(),
            remember_days: default_remember_days(),
            max_failed_logins: default_max_failed_logins(),
            lockout_minutes: default_lockout_minutes(),
            admin_username: default_admin_username(),
            admin_email: default_admin_email(),
            admin_password: default_admin_password(),
        }
    }
}

fn default_session_hours() -> i64 {
    24
}

fn default_remember_days() -> i64 {
    30
}

fn default_max_failed_logins() -> i64 {
    5
}

fn default_lockout_minutes() -> i64 {
    15
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_admin_email() -> String {
    "admin@enigmarp.com".to_string()
}

fn default_admin_password() -> String {
    "admin123".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Login attempts allowed per client per login window
    #[serde(default = "default_login_requests")]
    pub login_requests_per_window: u32,
    #[serde(default = "default_login_window")]
    pub login_window_seconds: u64,
    #[serde(default = "default_api_requests")]
    pub api_requests_per_window: u32,
    #[serde(default = "default_api_window")]
    pub api_window_seconds: u64,
    /// Seconds between sweeps of stale limiter entries
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
    /// Key clients by `X-Forwarded-For` / `X-Real-IP`. Only enable behind a
    /// reverse proxy that overwrites these headers.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            login_requests_per_window: default_login_requests(),
            login_window_seconds: default_login_window(),
            api_requests_per_window: default_api_requests(),
            api_window_seconds: default_api_window(),
            cleanup_interval: default_cleanup_interval(),
            trust_proxy_headers: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_login_requests() -> u32 {
    5
}

fn default_login_window() -> u64 {
    15 * 60
}

fn default_api_requests() -> u32 {
    300
}

fn default_api_window() -> u64 {
    60
}

fn default_cleanup_interval() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.ensure_jwt_secret();
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    /// Overlay `ENIGMA_*` variables on top of the file configuration.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup("ENIGMA_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(url) = lookup("ENIGMA_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(password) = lookup("ENIGMA_ADMIN_PASSWORD") {
            self.auth.admin_password = password;
        }
        if let Some(origin) = lookup("ENIGMA_FRONTEND_URL") {
            self.server.frontend_url = origin;
        }
        if let Some(port) = lookup("ENIGMA_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("ENIGMA_PORT is not a valid port: {}", port))?;
        }
        Ok(())
    }

    fn ensure_jwt_secret(&mut self) {
        if self.auth.jwt_secret.is_empty() {
            warn!("No JWT secret configured; generated an ephemeral one, sessions will not survive a restart");
            let bytes: [u8; 32] = rand::random();
            self.auth.jwt_secret = hex::encode(bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_policy() {
        let config = Config::default();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.auth.max_failed_logins, 5);
        assert_eq!(config.auth.lockout_minutes, 15);
        assert_eq!(config.auth.session_hours, 24);
        assert_eq!(config.auth.remember_days, 30);
        assert_eq!(config.rate_limit.login_requests_per_window, 5);
        assert_eq!(config.rate_limit.login_window_seconds, 900);
        assert!(!config.rate_limit.trust_proxy_headers);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            [server]
            port = 8088

            [auth]
            jwt_secret = "from-file"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.auth.jwt_secret, "from-file");
        assert_eq!(config.auth.lockout_minutes, 15);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env_overrides(|key| match key {
                "ENIGMA_JWT_SECRET" => Some("env-secret".to_string()),
                "ENIGMA_PORT" => Some("4000".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.auth.jwt_secret, "env-secret");
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn test_invalid_port_override_is_rejected() {
        let mut config = Config::default();
        let result = config.apply_env_overrides(|key| {
            (key == "ENIGMA_PORT").then(|| "not-a-port".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_secret_is_generated() {
        let mut config = Config::default();
        config.ensure_jwt_secret();
        assert_eq!(config.auth.jwt_secret.len(), 64);
    }
}
