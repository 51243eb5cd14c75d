use anyhow::{Context, Result};
use config::{Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

// Serde helper module for Duration parsing from strings
mod serde_duration {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(s) => parse_duration(&s).map_err(D::Error::custom),
        }
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("Empty duration string".to_string());
        }

        // Pure number means seconds
        if let Ok(secs) = s.parse::<u64>() {
            return Ok(Duration::from_secs(secs));
        }

        if let Some(num_str) = s.strip_suffix("ms") {
            let num: u64 = num_str
                .parse()
                .map_err(|_| format!("Invalid number in duration: {num_str}"))?;
            return Ok(Duration::from_millis(num));
        }

        if s.len() < 2 {
            return Err(format!("Invalid duration format: {s}"));
        }

        let (num_str, suffix) = s.split_at(s.len() - 1);
        let num: u64 = num_str
            .parse()
            .map_err(|_| format!("Invalid number in duration: {num_str}"))?;

        match suffix {
            "s" => Ok(Duration::from_secs(num)),
            "m" => Ok(Duration::from_secs(num * 60)),
            "h" => Ok(Duration::from_secs(num * 3600)),
            "d" => Ok(Duration::from_secs(num * 86400)),
            _ => Err(format!("Invalid duration suffix: {suffix}. Use s, m, h, d, or ms")),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct IntakeConfig {
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }
}

/// Per-address admission budgets
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests per window across every `/api` route
    pub general_max: u32,
    /// Additional budget for case submissions
    pub form_max: u32,
    #[serde(with = "serde_duration")]
    pub window: Duration,
    /// How often expired windows are evicted
    #[serde(with = "serde_duration")]
    pub cleanup_interval: Duration,
    /// Reverse proxies in front of the service. The client address is the
    /// `X-Forwarded-For` entry this many places from the right; 0 ignores
    /// forwarding headers and uses the socket address.
    pub trusted_proxy_hops: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            general_max: 100,
            form_max: 5,
            window: Duration::from_secs(15 * 60),
            cleanup_interval: Duration::from_secs(60),
            trusted_proxy_hops: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    #[serde(with = "serde_duration")]
    pub acquire_timeout: Duration,
    pub run_migrations: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            database_url: None,
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            run_migrations: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of the human-readable format
    pub json: bool,
}

impl IntakeConfig {
    pub fn load() -> Result<Self> {
        let environment = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        let mut builder = config::Config::builder();

        // Load base configuration
        let base_config = Path::new(&config_dir).join("base.toml");
        if base_config.exists() {
            builder = builder.add_source(File::from(base_config));
        }

        // Load environment-specific configuration
        let env_config = Path::new(&config_dir).join(format!("{environment}.toml"));
        if env_config.exists() {
            builder = builder.add_source(File::from(env_config));
        }

        // Load local configuration (not committed to git)
        let local_config = Path::new(&config_dir).join("local.toml");
        if local_config.exists() {
            builder = builder.add_source(File::from(local_config));
        }

        // Override with environment variables
        builder = builder.add_source(
            Environment::with_prefix("INTAKE")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.rate_limit.general_max == 0 || self.rate_limit.form_max == 0 {
            anyhow::bail!("Rate limit budgets must be greater than 0");
        }

        if self.rate_limit.window.is_zero() {
            anyhow::bail!("Rate limit window must be greater than 0");
        }

        if self.rate_limit.cleanup_interval.is_zero() {
            anyhow::bail!("Rate limit cleanup interval must be greater than 0");
        }

        if self.storage.backend == StorageBackend::Postgres {
            match self.storage.database_url.as_deref() {
                Some(url) if !url.trim().is_empty() => {}
                _ => anyhow::bail!("storage.database_url is required for the postgres backend"),
            }
            if self.storage.max_connections == 0 {
                anyhow::bail!("Database max_connections must be greater than 0");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IntakeConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.rate_limit.general_max, 100);
        assert_eq!(config.rate_limit.form_max, 5);
        assert_eq!(config.rate_limit.window, Duration::from_secs(900));
        assert_eq!(config.rate_limit.trusted_proxy_hops, 1);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = IntakeConfig::default();

        config.rate_limit.form_max = 0;
        assert!(config.validate().is_err());
        config.rate_limit.form_max = 5;

        config.storage.backend = StorageBackend::Postgres;
        assert!(config.validate().is_err());

        config.storage.database_url = Some("postgres://localhost/intake".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_duration() {
        use serde_duration::parse_duration;
        assert_eq!(parse_duration("15m"), Ok(Duration::from_secs(900)));
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("900"), Ok(Duration::from_secs(900)));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: IntakeConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "[rate_limit]\nform_max = 3\nwindow = \"1m\"\ntrusted_proxy_hops = 0\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.rate_limit.form_max, 3);
        assert_eq!(config.rate_limit.window, Duration::from_secs(60));
        assert_eq!(config.rate_limit.trusted_proxy_hops, 0);
        assert_eq!(config.rate_limit.general_max, 100);
        assert_eq!(config.server.port, 5000);
    }
}
