use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use shared::Session;
use std::path::{Path, PathBuf};

pub const DEFAULT_SERVER: &str = "http://localhost:8080";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Session as of the last command, restored on the next one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub server: Option<String>,
    pub token: Option<String>,
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "hub", "hub")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        let config_dir = proj_dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn server(&self) -> String {
        self.remote
            .server
            .clone()
            .unwrap_or_else(|| DEFAULT_SERVER.to_string())
    }

    /// Drop credentials and the cached session
    pub fn clear_login(&mut self) {
        self.remote.token = None;
        self.session = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{FederatedHints, Principal};

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert!(config.remote.token.is_none());
        assert_eq!(config.server(), DEFAULT_SERVER);
    }

    #[test]
    fn cached_session_survives_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.remote.server = Some("http://hub.test".to_string());
        config.remote.token = Some("tok".to_string());
        config.session = Some(Session::authenticated(Principal {
            id: "u1".to_string(),
            email: "u1@example.com".to_string(),
            federated: Some(FederatedHints {
                display_name: Some("U. One".to_string()),
                avatar_url: None,
            }),
        }));
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.server(), "http://hub.test");
        assert_eq!(loaded.session, config.session);

        let mut cleared = loaded;
        cleared.clear_login();
        cleared.save_to(&path).unwrap();
        let reloaded = Config::load_from(&path).unwrap();
        assert!(reloaded.session.is_none());
        assert!(reloaded.remote.token.is_none());
    }
}
