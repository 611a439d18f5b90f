//! 設定ファイル管理
//!
//! アプリケーションディレクトリの `settings.toml` から TOML 形式の設定を読み込む。
//! ファイルが存在しない場合はテンプレートを生成し、デフォルト値を使用する。
//! API キーはここではなく `config.json` で管理する（`storage::credential` を参照）。
//!
//! # 設定ファイル例
//!
//! ```toml
//! [ai]
//! model = "sonar-pro"
//!
//! [cmd]
//! context = 10
//! temperature = 0.0
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

/// 設定全体
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PplConfig {
    /// API 接続設定
    pub ai: AiConfig,
    /// chat モードの既定値
    pub chat: ModeDefaults,
    /// cmd モードの既定値
    pub cmd: ModeDefaults,
    /// script モードの既定値
    pub script: ModeDefaults,
}

/// API 接続の設定
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// 使用するモデル名
    pub model: String,
    /// OpenAI 互換 API のベース URL
    pub api_base: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: "sonar".to_string(),
            api_base: "https://api.perplexity.ai".to_string(),
        }
    }
}

/// モードごとの既定値。すべて省略可能で、省略時は組み込みの値を使う。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModeDefaults {
    /// 履歴から混ぜる直近メッセージ数 (0 = 全件)
    pub context: Option<usize>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl PplConfig {
    /// 設定ファイルを読み込む。
    ///
    /// 存在しなければテンプレートを生成してデフォルト値を返す。
    /// パースエラーの場合は警告を表示してデフォルト値を返す。
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// 指定パスから設定を読み込む。
    pub fn load_from(path: &Path) -> Self {
        debug!(path = %path.display(), "Loading settings file");

        if !path.exists() {
            Self::create_default_config(path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<PplConfig>(&content) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        model = %config.ai.model,
                        api_base = %config.ai.api_base,
                        "Settings loaded successfully"
                    );
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse settings file");
                    eprintln!("ppl: warning: failed to parse settings file: {e}");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read settings file");
                eprintln!("ppl: warning: failed to read settings file: {e}");
                Self::default()
            }
        }
    }

    /// 設定ファイルのパスを返す。
    pub fn config_path() -> PathBuf {
        crate::storage::app_dir().join("settings.toml")
    }

    /// 設定ファイルが存在しない場合にテンプレートから生成する。
    ///
    /// 生成に失敗した場合は警告を表示するが、処理は継続する。
    fn create_default_config(path: &Path) {
        const TEMPLATE: &str = r#"# ppl settings
#
# Command-line flags always win over the values below.

[ai]
# model = "sonar"
# api_base = "https://api.perplexity.ai"

[chat]
# context = 30
# temperature = 0.2
# max_tokens = 900

[cmd]
# context = 30
# temperature = 0.1
# max_tokens = 400

[script]
# context = 20
# temperature = 0.1
# max_tokens = 1200
"#;

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %e, "Failed to create settings directory");
                eprintln!("ppl: warning: failed to create settings directory: {e}");
                return;
            }
        }

        match std::fs::write(path, TEMPLATE) {
            Ok(()) => {
                info!(path = %path.display(), "Created default settings file");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to create default settings file");
                eprintln!("ppl: warning: failed to create settings file: {e}");
            }
        }
    }
}
