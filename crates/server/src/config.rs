use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub federated: FederatedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_hours: u64,
}

/// Federated sign-in goes through a provider page hosted by the web UI;
/// the CLI only sees a device code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederatedConfig {
    #[serde(default = "default_web_ui_url")]
    pub web_ui_url: String,
    #[serde(default = "default_device_code_ttl")]
    pub device_code_ttl_secs: u64,
    /// HS256 key the provider bridge signs ID tokens with
    #[serde(default = "default_id_token_secret")]
    pub id_token_secret: String,
    #[serde(default = "default_id_token_issuer")]
    pub id_token_issuer: String,
    #[serde(default = "default_id_token_audience")]
    pub id_token_audience: String,
}

fn default_web_ui_url() -> String {
    "http://localhost:5173".to_string()
}

fn default_device_code_ttl() -> u64 {
    600
}

fn default_id_token_secret() -> String {
    "change-me-provider-secret".to_string()
}

fn default_id_token_issuer() -> String {
    "https://accounts.google.com".to_string()
}

fn default_id_token_audience() -> String {
    "hub".to_string()
}

impl Default for FederatedConfig {
    fn default() -> Self {
        Self {
            web_ui_url: default_web_ui_url(),
            device_code_ttl_secs: default_device_code_ttl(),
            id_token_secret: default_id_token_secret(),
            id_token_issuer: default_id_token_issuer(),
            id_token_audience: default_id_token_audience(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                path: "./data/hub.db".to_string(),
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production".to_string(),
                token_expiry_hours: 24,
            },
            federated: FederatedConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("HUB_CONFIG") {
            return Self::load_from_path(&PathBuf::from(path));
        }

        let default_paths = [
            PathBuf::from("hub-server.toml"),
            PathBuf::from("config/hub-server.toml"),
            PathBuf::from("/etc/hub/server.toml"),
        ];

        for path in default_paths {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        tracing::warn!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}
