//! ローカル永続化
//!
//! 会話ログ (`history.json`) と認証情報 (`config.json`) はどちらも小さな JSON ファイルで、
//! 毎回まるごと読み込み、メモリ上で変更し、まるごと書き戻す。
//! 読み込み時の欠損・破損はすべて空のデフォルトで置き換え、呼び出し元にはエラーを返さない。

pub mod credential;
pub mod history;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

/// アプリケーションの設定ディレクトリを返す（なければ作成する）。
///
/// `directories` クレートでプラットフォームに応じたパスを決定し、
/// 決定できない場合は `$HOME/.config/ppl` にフォールバックする。
pub fn app_dir() -> PathBuf {
    let dir = ProjectDirs::from("", "", "ppl")
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(|| {
            std::env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".config")
                .join("ppl")
        });

    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!(path = %dir.display(), error = %e, "Failed to create app directory");
    }
    dir
}

/// JSON ファイルを読み込む。
///
/// ファイルが存在しない・読めない・パースできない場合は `None` を返す。
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "JSON file not readable");
            return None;
        }
    };

    match serde_json::from_str::<T>(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring malformed JSON file");
            None
        }
    }
}

/// JSON を整形して書き込む。
///
/// 同じディレクトリの一時ファイルに書いてから rename するため、
/// 他のプロセスから書きかけの内容が見えることはない。
pub fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory: {}", dir.display()))?;

    let mut body = serde_json::to_string_pretty(data).context("failed to serialize JSON")?;
    body.push('\n');

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    tmp.write_all(body.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    restrict_permissions(tmp.path());
    tmp.persist(path)
        .with_context(|| format!("failed to replace {}", path.display()))?;

    Ok(())
}

/// 所有者のみ読み書き可能 (0600) にする。非対応の環境では何もしない。
fn restrict_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
            debug!(path = %path.display(), error = %e, "chmod 600 not applied");
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}
