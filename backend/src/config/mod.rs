//! Configuration module for the Crosscut admin service.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;

/// How the service authenticates against the DHIS2 instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dhis2Auth {
    /// HTTP basic auth with a DHIS2 user
    Basic { username: String, password: String },
    /// Personal access token sent as `ApiToken <token>`
    Token(String),
    /// No credentials (public demo instances, tests)
    None,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key protecting the admin API (optional in development)
    pub admin_psk: Option<String>,
    /// Base URL of the Crosscut catchment-job service
    pub crosscut_api_url: String,
    /// Base URL of the DHIS2 web API, including the `/api` suffix
    pub dhis2_base_url: String,
    /// Credentials for the DHIS2 instance
    pub dhis2_auth: Dhis2Auth,
    /// Boundary catalogue version requested from Crosscut
    pub boundary_version: String,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Configuration could not be loaded.
#[derive(Debug)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let admin_psk = env::var("CROSSCUT_ADMIN_PSK").ok();

        let crosscut_api_url = trim_base(
            env::var("CROSSCUT_API_URL").unwrap_or_else(|_| "https://api.crosscut.io".to_string()),
        );

        let dhis2_base_url = trim_base(
            env::var("DHIS2_BASE_URL").unwrap_or_else(|_| "http://localhost:8080/api".to_string()),
        );

        let dhis2_auth = match (env::var("DHIS2_USERNAME"), env::var("DHIS2_TOKEN")) {
            (Ok(username), _) => Dhis2Auth::Basic {
                username,
                password: env::var("DHIS2_PASSWORD").unwrap_or_default(),
            },
            (Err(_), Ok(token)) => Dhis2Auth::Token(token),
            _ => Dhis2Auth::None,
        };

        let boundary_version =
            env::var("CROSSCUT_BOUNDARY_VERSION").unwrap_or_else(|_| "v3".to_string());

        let raw_addr =
            env::var("CROSSCUT_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let bind_addr = raw_addr
            .parse()
            .map_err(|_| ConfigError(format!("invalid CROSSCUT_BIND_ADDR: {}", raw_addr)))?;

        let log_level = env::var("CROSSCUT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            admin_psk,
            crosscut_api_url,
            dhis2_base_url,
            dhis2_auth,
            boundary_version,
            bind_addr,
            log_level,
        })
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: &[&str] = &[
        "CROSSCUT_ADMIN_PSK",
        "CROSSCUT_API_URL",
        "DHIS2_BASE_URL",
        "DHIS2_USERNAME",
        "DHIS2_PASSWORD",
        "DHIS2_TOKEN",
        "CROSSCUT_BOUNDARY_VERSION",
        "CROSSCUT_BIND_ADDR",
        "CROSSCUT_LOG_LEVEL",
    ];

    // Env vars are process-global, so everything runs in one test.
    #[test]
    fn test_config_from_env() {
        for var in VARS {
            env::remove_var(var);
        }

        let config = Config::from_env().unwrap();
        assert!(config.admin_psk.is_none());
        assert_eq!(config.crosscut_api_url, "https://api.crosscut.io");
        assert_eq!(config.dhis2_base_url, "http://localhost:8080/api");
        assert_eq!(config.dhis2_auth, Dhis2Auth::None);
        assert_eq!(config.boundary_version, "v3");
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");

        env::set_var("DHIS2_BASE_URL", "https://play.dhis2.org/api/");
        env::set_var("DHIS2_TOKEN", "d2pat_abc");
        let config = Config::from_env().unwrap();
        assert_eq!(config.dhis2_base_url, "https://play.dhis2.org/api");
        assert_eq!(config.dhis2_auth, Dhis2Auth::Token("d2pat_abc".to_string()));

        env::set_var("DHIS2_USERNAME", "admin");
        env::set_var("DHIS2_PASSWORD", "district");
        let config = Config::from_env().unwrap();
        assert_eq!(
            config.dhis2_auth,
            Dhis2Auth::Basic {
                username: "admin".to_string(),
                password: "district".to_string()
            }
        );

        env::set_var("CROSSCUT_BIND_ADDR", "not-an-addr");
        assert!(Config::from_env().is_err());

        for var in VARS {
            env::remove_var(var);
        }
    }
}
