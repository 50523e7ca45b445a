//! 客户端配置和持久化
//!
//! 提供服务器地址、起始目录等设置的存储和读取。

use crate::error::{ClientError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// 客户端设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// 文件服务器地址
    pub server_url: String,
    /// 默认目录
    pub start_dir: String,
    /// 请求超时（秒），默认不设置
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// 会话令牌，作为 `access_token` Cookie 发送
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// 详细日志模式
    pub verbose: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost".to_string(),
            start_dir: "/".to_string(),
            timeout_secs: None,
            access_token: None,
            verbose: false,
        }
    }
}

impl ClientSettings {
    /// 获取默认配置文件路径
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("drivedeck");
        config_dir.join("settings.toml")
    }

    /// 从默认路径加载设置
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// 加载设置（如果文件不存在或无法解析则使用默认值）
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(settings) => {
                        debug!("Loaded settings from {:?}", path);
                        return settings;
                    }
                    Err(e) => {
                        log::warn!("Failed to parse settings: {}, using defaults", e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read settings file: {}, using defaults", e);
                }
            }
        }
        Self::default()
    }

    /// 保存设置到默认路径
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ClientError::Config(e.to_string()))?;
        fs::write(path, content)?;
        debug!("Saved settings to {:?}", path);
        Ok(())
    }

    /// 解析服务器地址
    pub fn server_url(&self) -> Result<Url> {
        let url = Url::parse(&self.server_url)?;
        if url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(format!(
                "{} cannot be used as a base URL",
                self.server_url
            )));
        }
        Ok(url)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = ClientSettings::default();
        assert_eq!(settings.start_dir, "/");
        assert!(settings.timeout().is_none());
        assert!(settings.server_url().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let settings = ClientSettings {
            server_url: "https://files.example.com".to_string(),
            start_dir: "/photos".to_string(),
            timeout_secs: Some(30),
            access_token: Some("s3cr3t".to_string()),
            verbose: true,
        };
        settings.save_to(&path).unwrap();

        let loaded = ClientSettings::load_from(&path);
        assert_eq!(loaded, settings);
        assert_eq!(loaded.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "server_url = [").unwrap();
        assert_eq!(ClientSettings::load_from(&path), ClientSettings::default());
    }

    #[test]
    fn test_partial_file_uses_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "server_url = \"http://nas.local:3000\"\n").unwrap();
        let loaded = ClientSettings::load_from(&path);
        assert_eq!(loaded.server_url, "http://nas.local:3000");
        assert_eq!(loaded.start_dir, "/");
    }

    #[test]
    fn test_rejects_non_base_url() {
        let settings = ClientSettings {
            server_url: "mailto:someone@example.com".to_string(),
            ..Default::default()
        };
        assert!(settings.server_url().is_err());
    }
}
