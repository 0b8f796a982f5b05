use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Placeholder secrets that must never reach production.
const WEAK_SECRETS: &[&str] = &[
    "your-secret-key",
    "change-me",
    "secret",
    "password",
    "jwt-secret",
];

/// One year. Longer lifetimes are almost certainly a typo.
const MAX_JWT_TTL_HOURS: u64 = 24 * 365;

#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_app_env")]
    pub env: String,
    #[serde(default = "default_true")]
    pub debug: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_jwt_ttl_hours")]
    pub jwt_ttl_hours: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests")]
    pub requests: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Peers whose `X-Forwarded-For` / `X-Real-IP` headers are believed.
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated list of origins, or `*` for any.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            env: default_app_env(),
            debug: true,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_ttl_hours: default_jwt_ttl_hours(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: default_requests(),
            window_secs: default_window_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            trusted_proxies: Vec::new(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            app: AppConfig::default(),
            bind_addr: default_bind_addr(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cors: CorsConfig::default(),
            users: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_app_name() -> String {
    "GoMen".to_string()
}

fn default_app_env() -> String {
    "development".to_string()
}

fn default_jwt_ttl_hours() -> u64 {
    24
}

fn default_requests() -> u32 {
    100
}

fn default_window_secs() -> u64 {
    60
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_allowed_origins() -> String {
    "*".to_string()
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

impl AuthConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.jwt_ttl_hours.saturating_mul(3600))
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn trusts(&self, peer: IpAddr) -> bool {
        self.trusted_proxies.contains(&peer)
    }
}

impl CorsConfig {
    /// Configured origins, trimmed, empty entries dropped.
    pub fn origins(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn allows_any(&self) -> bool {
        self.origins().iter().any(|o| o == "*")
    }
}

impl ServerConfig {
    pub fn is_production(&self) -> bool {
        self.app.env == "production"
    }

    /// Reads the file named by `GOMEN_CONFIG` (if any) and applies `GOMEN_*`
    /// environment overrides. Call [`validate`](Self::validate) before use.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var("GOMEN_CONFIG").map(PathBuf::from) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => ServerConfig::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config {}: {e}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Overrides fields from environment variables looked up through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(name) = lookup("GOMEN_APP_NAME") {
            self.app.name = name;
        }
        if let Some(env) = lookup("GOMEN_APP_ENV") {
            self.app.env = env;
        }
        if let Some(debug) = lookup("GOMEN_DEBUG") {
            self.app.debug = matches!(debug.trim(), "1" | "true" | "TRUE" | "yes");
        }
        if let Some(addr) = lookup("GOMEN_BIND_ADDR") {
            self.bind_addr = addr
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid GOMEN_BIND_ADDR {addr:?}: {e}"))?;
        }
        if let Some(secret) = lookup("GOMEN_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(hours) = lookup("GOMEN_JWT_TTL_HOURS") {
            self.auth.jwt_ttl_hours = parse_env("GOMEN_JWT_TTL_HOURS", &hours)?;
        }
        if let Some(requests) = lookup("GOMEN_RATE_LIMIT") {
            self.rate_limit.requests = parse_env("GOMEN_RATE_LIMIT", &requests)?;
        }
        if let Some(secs) = lookup("GOMEN_RATE_WINDOW_SECS") {
            self.rate_limit.window_secs = parse_env("GOMEN_RATE_WINDOW_SECS", &secs)?;
        }
        if let Some(secs) = lookup("GOMEN_SWEEP_INTERVAL_SECS") {
            self.rate_limit.sweep_interval_secs = parse_env("GOMEN_SWEEP_INTERVAL_SECS", &secs)?;
        }
        if let Some(origins) = lookup("GOMEN_CORS_ALLOWED_ORIGINS") {
            self.cors.allowed_origins = origins;
        }
        if let Some(proxies) = lookup("GOMEN_TRUSTED_PROXIES") {
            self.rate_limit.trusted_proxies = proxies
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| parse_env("GOMEN_TRUSTED_PROXIES", p))
                .collect::<anyhow::Result<_>>()?;
        }
        Ok(())
    }

    /// Fills in a random secret when none is set and rejects unusable values.
    pub fn validate(&mut self) -> anyhow::Result<()> {
        if self.auth.jwt_secret.is_empty() {
            if self.is_production() {
                anyhow::bail!("GOMEN_JWT_SECRET must be set when app.env is production");
            }
            self.auth.jwt_secret = uuid::Uuid::new_v4().to_string();
            tracing::warn!(
                "No JWT secret configured. Generated random secret \
                 (issued tokens will not survive a restart)."
            );
        }

        if WEAK_SECRETS.iter().any(|&w| self.auth.jwt_secret == w) {
            anyhow::bail!(
                "JWT secret matches a known weak/placeholder value. \
                 Set a strong random secret via GOMEN_JWT_SECRET."
            );
        }
        if self.auth.jwt_secret.len() < 32 {
            tracing::warn!(
                "JWT secret is shorter than 32 characters. \
                 Consider using a stronger secret via GOMEN_JWT_SECRET."
            );
        }

        if self.auth.jwt_ttl_hours == 0 {
            anyhow::bail!("auth.jwt_ttl_hours must be greater than zero");
        }
        if self.auth.jwt_ttl_hours > MAX_JWT_TTL_HOURS {
            anyhow::bail!("auth.jwt_ttl_hours must be at most {MAX_JWT_TTL_HOURS}");
        }
        if self.rate_limit.requests == 0 {
            anyhow::bail!("rate_limit.requests must be greater than zero");
        }
        if self.rate_limit.window_secs == 0 {
            anyhow::bail!("rate_limit.window_secs must be greater than zero");
        }
        if self.rate_limit.sweep_interval_secs == 0 {
            anyhow::bail!("rate_limit.sweep_interval_secs must be greater than zero");
        }
        if self.cors.origins().is_empty() {
            anyhow::bail!("cors.allowed_origins must list at least one origin");
        }

        let mut ids = HashSet::new();
        let mut emails = HashSet::new();
        for user in &self.users {
            if !ids.insert(user.id) {
                anyhow::bail!("duplicate user id {} in [[users]]", user.id);
            }
            if !emails.insert(user.email.to_ascii_lowercase()) {
                anyhow::bail!("duplicate user email {} in [[users]]", user.email);
            }
        }

        Ok(())
    }
}

fn parse_env<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid {key} {value:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    const STRONG_SECRET: &str = "f3b1c9a7e2d84c6f9a0b1c2d3e4f5a6b";

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::default();

        assert_eq!(config.app.name, "GoMen");
        assert_eq!(config.app.env, "development");
        assert!(config.app.debug);
        assert_eq!(config.bind_addr, SocketAddr::from(([0, 0, 0, 0], 8080)));
        assert_eq!(config.auth.jwt_ttl_hours, 24);
        assert_eq!(config.rate_limit.requests, 100);
        assert_eq!(config.rate_limit.window(), Duration::from_secs(60));
        assert_eq!(config.rate_limit.sweep_interval(), Duration::from_secs(60));
        assert!(config.cors.allows_any());
        assert!(config.users.is_empty());
        assert!(config.rate_limit.trusted_proxies.is_empty());
    }

    #[test]
    fn load_full_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gomen.toml");
        fs::write(
            &path,
            r#"
bind_addr = "127.0.0.1:3000"

[app]
name = "Shop API"
env = "production"
debug = false

[auth]
jwt_secret = "f3b1c9a7e2d84c6f9a0b1c2d3e4f5a6b"
jwt_ttl_hours = 2

[rate_limit]
requests = 10
window_secs = 30
sweep_interval_secs = 15
trusted_proxies = ["10.0.0.1", "::1"]

[cors]
allowed_origins = "https://a.example, https://b.example,"

[[users]]
id = 1
name = "Admin"
email = "admin@example.com"
password_hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"

[[users]]
id = 2
name = "Dormant"
email = "dormant@example.com"
password_hash = "x"
is_active = false
"#,
        )
        .unwrap();

        let config = ServerConfig::from_file(&path).unwrap();

        assert_eq!(config.bind_addr, SocketAddr::from(([127, 0, 0, 1], 3000)));
        assert_eq!(config.app.name, "Shop API");
        assert!(config.is_production());
        assert!(!config.app.debug);
        assert_eq!(config.auth.token_ttl(), Duration::from_secs(7200));
        assert_eq!(config.rate_limit.requests, 10);
        assert_eq!(config.rate_limit.window(), Duration::from_secs(30));
        assert_eq!(config.rate_limit.sweep_interval(), Duration::from_secs(15));
        assert!(config.rate_limit.trusts("10.0.0.1".parse().unwrap()));
        assert!(config.rate_limit.trusts("::1".parse().unwrap()));
        assert!(!config.rate_limit.trusts("10.0.0.2".parse().unwrap()));
        assert_eq!(
            config.cors.origins(),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert!(!config.cors.allows_any());
        assert_eq!(config.users.len(), 2);
        assert!(config.users[0].is_active);
        assert!(!config.users[1].is_active);
    }

    #[test]
    fn missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let result = ServerConfig::from_file(&tmp.path().join("absent.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(ServerConfig::from_toml_str("[rate_limit\nrequests = 1").is_err());
    }

    #[test]
    fn validate_rejects_duplicate_users() {
        let user = |id: u64, email: &str| UserConfig {
            id,
            name: "Someone".to_string(),
            email: email.to_string(),
            password_hash: "x".to_string(),
            is_active: true,
        };

        let mut config = ServerConfig::default();
        config.auth.jwt_secret = STRONG_SECRET.to_string();
        config.users = vec![user(1, "a@example.com"), user(1, "b@example.com")];
        assert!(config.validate().is_err());

        config.users = vec![user(1, "a@example.com"), user(2, "A@example.com")];
        assert!(config.validate().is_err());

        config.users = vec![user(1, "a@example.com"), user(2, "b@example.com")];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = ServerConfig::default();
        config
            .apply_env(env(&[
                ("GOMEN_APP_NAME", "Env API"),
                ("GOMEN_APP_ENV", "production"),
                ("GOMEN_DEBUG", "false"),
                ("GOMEN_BIND_ADDR", "127.0.0.1:9000"),
                ("GOMEN_JWT_SECRET", STRONG_SECRET),
                ("GOMEN_JWT_TTL_HOURS", "1"),
                ("GOMEN_RATE_LIMIT", "5"),
                ("GOMEN_RATE_WINDOW_SECS", "10"),
                ("GOMEN_SWEEP_INTERVAL_SECS", "20"),
                ("GOMEN_CORS_ALLOWED_ORIGINS", "https://app.example"),
                ("GOMEN_TRUSTED_PROXIES", "10.0.0.1, 10.0.0.2"),
            ]))
            .unwrap();

        assert_eq!(config.app.name, "Env API");
        assert!(config.is_production());
        assert!(!config.app.debug);
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.auth.jwt_secret, STRONG_SECRET);
        assert_eq!(config.auth.jwt_ttl_hours, 1);
        assert_eq!(config.rate_limit.requests, 5);
        assert_eq!(config.rate_limit.window_secs, 10);
        assert_eq!(config.rate_limit.sweep_interval_secs, 20);
        assert_eq!(config.cors.origins(), vec!["https://app.example".to_string()]);
        assert_eq!(
            config.rate_limit.trusted_proxies,
            vec![
                "10.0.0.1".parse::<IpAddr>().unwrap(),
                "10.0.0.2".parse::<IpAddr>().unwrap()
            ]
        );
    }

    #[test]
    fn unparsable_env_value_is_an_error() {
        let mut config = ServerConfig::default();
        assert!(config.apply_env(env(&[("GOMEN_RATE_LIMIT", "lots")])).is_err());
        assert!(config.apply_env(env(&[("GOMEN_BIND_ADDR", "nowhere")])).is_err());
        assert!(config.apply_env(env(&[("GOMEN_TRUSTED_PROXIES", "proxy.local")])).is_err());
    }

    #[test]
    fn validate_generates_missing_secret() {
        let mut config = ServerConfig::default();
        config.validate().unwrap();
        assert!(!config.auth.jwt_secret.is_empty());
    }

    #[test]
    fn validate_requires_secret_in_production() {
        let mut config = ServerConfig::default();
        config.app.env = "production".to_string();
        assert!(config.validate().is_err());

        config.auth.jwt_secret = STRONG_SECRET.to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_placeholder_secret() {
        let mut config = ServerConfig::default();
        config.auth.jwt_secret = "your-secret-key".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_quota_and_window() {
        let mut config = ServerConfig::default();
        config.auth.jwt_secret = STRONG_SECRET.to_string();
        config.rate_limit.requests = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.auth.jwt_secret = STRONG_SECRET.to_string();
        config.rate_limit.window_secs = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.auth.jwt_secret = STRONG_SECRET.to_string();
        config.rate_limit.sweep_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn huge_ttl_saturates_and_is_rejected() {
        let mut config = ServerConfig::default();
        config.auth.jwt_secret = STRONG_SECRET.to_string();
        config
            .apply_env(env(&[("GOMEN_JWT_TTL_HOURS", "18446744073709551615")]))
            .unwrap();

        assert_eq!(config.auth.token_ttl(), Duration::from_secs(u64::MAX));
        assert!(config.validate().is_err());

        config.auth.jwt_ttl_hours = MAX_JWT_TTL_HOURS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_origin_list() {
        let mut config = ServerConfig::default();
        config.auth.jwt_secret = STRONG_SECRET.to_string();
        config.cors.allowed_origins = " , ".to_string();
        assert!(config.validate().is_err());
    }
}
