//! Environment-sourced server configuration.
//!
//! Every knob has a default suitable for local development; production
//! deployments override via environment variables.

use std::env;
use std::path::PathBuf;

/// Full server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port serving both HTTP and the socket. `PORT`, default 3000.
    pub port: u16,
    /// Plaintext word list, one word per line. `DICT_PATH`.
    pub dict_path: PathBuf,
    /// Static admin token for `x-admin-token`. Empty means dev mode:
    /// admin endpoints are open. `ADMIN_TOKEN`.
    pub admin_token: String,
    /// Server-side secret peppering staff password hashes.
    /// `ANTISCRAPING_SECRET`.
    pub antiscraping_secret: String,
    /// Allowed CORS origins, comma-separated. `*` allows any (and warns
    /// in production). `CORS_ORIGIN`.
    pub cors_origins: Vec<String>,
    /// Per-(IP, path) request budget per minute. `RATE_LIMIT_MAX`.
    pub rate_limit_max: usize,
    /// Sample words retained per syllable. `SAMPLE_CAP`.
    pub sample_cap: usize,
    /// Seeds the `admin` staff account on first start. `ADMIN_PASSWORD`.
    pub admin_password: String,
    /// Directory for the JSON persistence backend. `DATA_DIR`.
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            dict_path: PathBuf::from("./dictionary.txt"),
            admin_token: String::new(),
            antiscraping_secret: String::new(),
            cors_origins: vec!["*".to_string()],
            rate_limit_max: 120,
            sample_cap: 30,
            admin_password: String::new(),
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl Config {
    /// Reads the configuration from the environment, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let config = Self {
            port: env_parse("PORT", defaults.port),
            dict_path: env::var("DICT_PATH").map(PathBuf::from).unwrap_or(defaults.dict_path),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_default(),
            antiscraping_secret: env::var("ANTISCRAPING_SECRET").unwrap_or_default(),
            cors_origins: env::var("CORS_ORIGIN")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_max: env_parse("RATE_LIMIT_MAX", defaults.rate_limit_max),
            sample_cap: env_parse("SAMPLE_CAP", defaults.sample_cap),
            admin_password: env::var("ADMIN_PASSWORD").unwrap_or_default(),
            data_dir: env::var("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
        };

        if config.admin_token.is_empty() {
            tracing::warn!("ADMIN_TOKEN is empty: admin endpoints are open (dev mode)");
        }
        if config.cors_origins.iter().any(|o| o == "*") {
            tracing::warn!("CORS_ORIGIN allows any origin; restrict this in production");
        }
        config
    }

    /// `true` when any origin is allowed.
    pub fn cors_any(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = Config::default();
        assert_eq!(c.port, 3000);
        assert_eq!(c.rate_limit_max, 120);
        assert_eq!(c.sample_cap, 30);
        assert!(c.cors_any());
        assert_eq!(c.dict_path, PathBuf::from("./dictionary.txt"));
    }
}
