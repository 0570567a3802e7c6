use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Persisted preferences (`prefs.toml` in the platform config dir).
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
  pub server_url: Option<String>,
  pub user_id: Option<String>,
  pub access_token: Option<String>,
  pub theme_name: Option<String>,
}

/// Fully resolved settings needed to talk to the catalog server.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
  pub server_url: String,
  pub user_id: String,
  pub access_token: String,
}

fn config_file() -> Option<PathBuf> {
  ProjectDirs::from("", "", "emsearch").map(|dirs| dirs.config_dir().join("prefs.toml"))
}

impl Config {
  pub fn load() -> Self {
    if let Some(path) = config_file()
      && let Ok(content) = std::fs::read_to_string(path)
      && let Ok(config) = toml::from_str(&content)
    {
      return config;
    }
    Self::default()
  }

  /// Update only the stored theme, keeping everything else in the file.
  pub fn save_theme(name: &str) -> Result<PathBuf> {
    let config = Config { theme_name: Some(name.to_string()), ..Self::load() };
    config.save()
  }

  pub fn save(&self) -> Result<PathBuf> {
    let path = config_file().context("No config directory available on this platform")?;
    if let Some(dir) = path.parent() {
      std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let content = toml::to_string(self).context("Failed to serialize config")?;
    std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
  }

  /// Overlay `other`'s set fields on top of `self`.
  pub fn merged(self, other: Config) -> Config {
    Config {
      server_url: other.server_url.or(self.server_url),
      user_id: other.user_id.or(self.user_id),
      access_token: other.access_token.or(self.access_token),
      theme_name: other.theme_name.or(self.theme_name),
    }
  }

  /// Resolve into connection settings. Blank values count as missing.
  pub fn connection(&self) -> Result<ConnectionSettings> {
    fn required(value: &Option<String>, flag: &str) -> Result<String> {
      value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Missing {flag} (set it on the command line, via env, or in prefs.toml)"))
    }

    Ok(ConnectionSettings {
      server_url: required(&self.server_url, "--server")?,
      user_id: required(&self.user_id, "--user")?,
      access_token: required(&self.access_token, "--token")?,
    })
  }
}
