//! API キーの解決と保存
//!
//! 優先順位: 環境変数 `PERPLEXITY_API_KEY` → `config.json` の `api_key`。
//! `config.json` の他のキーは書き戻し時にそのまま保持する。

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{load_json, save_json};

/// API キーを読み取る環境変数名
pub const API_KEY_ENV: &str = "PERPLEXITY_API_KEY";

/// `config.json` を読み書きするストア
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn open() -> Self {
        Self::open_at(super::app_dir().join("config.json"))
    }

    pub fn open_at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// API キーを解決する。どこにも設定されていなければ `None`。
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            let key = key.trim();
            if !key.is_empty() {
                debug!(source = "env", "API key resolved");
                return Some(key.to_string());
            }
        }

        let key = self
            .load()
            .get("api_key")
            .map(value_to_key)
            .unwrap_or_default();
        if key.is_empty() {
            debug!("No API key configured");
            None
        } else {
            debug!(source = "config", "API key resolved");
            Some(key)
        }
    }

    /// API キーを保存する。
    pub fn set_api_key(&self, key: &str) -> Result<()> {
        let mut cfg = self.load();
        cfg.insert("api_key".to_string(), Value::String(key.trim().to_string()));
        save_json(&self.path, &cfg)?;
        info!(path = %self.path.display(), "API key stored");
        Ok(())
    }

    /// 保存済みの API キーを削除する。他のキーは残す。
    pub fn clear_api_key(&self) -> Result<()> {
        let mut cfg = self.load();
        cfg.remove("api_key");
        save_json(&self.path, &cfg)?;
        info!(path = %self.path.display(), "API key removed");
        Ok(())
    }

    /// オブジェクト以外・破損ファイルは空として扱う。
    fn load(&self) -> Map<String, Value> {
        load_json::<Map<String, Value>>(&self.path).unwrap_or_default()
    }
}

fn value_to_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string().trim().to_string(),
    }
}
