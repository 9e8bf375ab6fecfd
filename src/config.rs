use crate::error::{LabelOcrError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// アップロード先の既定値
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/api/upload/";

/// エンドポイントを上書きする環境変数
pub const ENDPOINT_ENV: &str = "LABEL_OCR_ENDPOINT";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoint: String,
    pub timeout_seconds: u64,
    pub user_name: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            // 0 はタイムアウトなし
            timeout_seconds: 0,
            user_name: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| LabelOcrError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("label-ocr").join("config.json"))
    }

    /// 環境変数を優先してエンドポイントを取得
    pub fn resolved_endpoint(&self) -> String {
        match std::env::var(ENDPOINT_ENV) {
            Ok(url) if !url.trim().is_empty() => url,
            _ => self.endpoint.clone(),
        }
    }

    pub fn set_endpoint(&mut self, endpoint: String) -> Result<()> {
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(LabelOcrError::Config(format!(
                "エンドポイントは http:// または https:// で始めてください: {}",
                endpoint
            )));
        }
        self.endpoint = endpoint;
        self.save()
    }

    pub fn set_user_name(&mut self, user: String) -> Result<()> {
        self.user_name = Some(user);
        self.save()
    }
}
