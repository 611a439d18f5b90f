//! ConversationStore — 単一のグローバル会話ログ
//!
//! すべてのモード (chat / cmd / script) の発話を 1 つの追記型ログに記録し、
//! 起動をまたいで会話を継続できるようにする。
//! 同時に複数プロセスが保存した場合は最後に書いたものが勝つ（ロックはしない）。

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{load_json, save_json};

/// 保存時にメッセージ本文を切り詰める最大文字数
pub const MAX_CONTENT_CHARS: usize = 4000;

/// 切り詰めたときに末尾へ付ける印
const TRUNCATION_MARKER: &str = "\n...[truncated]";

/// 現在のログフォーマットのバージョン
const LOG_VERSION: u32 = 1;

/// メッセージの送信者
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// 対話モード。ログの各メッセージがどのモードで生まれたかを記録する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Chat,
    Cmd,
    Script,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::Chat => "chat",
            Mode::Cmd => "cmd",
            Mode::Script => "script",
        };
        f.write_str(s)
    }
}

/// ログに記録される 1 メッセージ。追記後は変更しない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub mode: Mode,
}

/// ログの 1 エントリ。
///
/// 手で編集されたり古い形式だったりして `Message` として読めないエントリも
/// 捨てずに `Other` として保持し、書き戻し時にそのまま残す。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogEntry {
    Message(Message),
    Other(Value),
}

impl LogEntry {
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            LogEntry::Message(m) => Some(m),
            LogEntry::Other(_) => None,
        }
    }

    /// 送信者と本文を返す。`mode` が欠けていたり未知の値だったりしても読む。
    pub fn role_and_content(&self) -> Option<(Role, &str)> {
        match self {
            LogEntry::Message(m) => Some((m.role, m.content.as_str())),
            LogEntry::Other(value) => {
                let role = Role::deserialize(value.get("role")?).ok()?;
                let content = value.get("content")?.as_str()?;
                Some((role, content))
            }
        }
    }
}

/// 会話ログ全体。挿入順 = 時系列順。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationLog {
    #[serde(default = "default_version", deserialize_with = "lenient_version")]
    pub version: u32,
    pub messages: Vec<LogEntry>,
}

fn default_version() -> u32 {
    LOG_VERSION
}

/// 数値でも文字列でも受け付け、読めない値は現行バージョンとみなす。
/// バージョンが変でもメッセージは捨てない。
fn lenient_version<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let version = match &value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(version.unwrap_or(LOG_VERSION))
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self {
            version: LOG_VERSION,
            messages: Vec::new(),
        }
    }
}

impl ConversationLog {
    /// メッセージをメモリ上で追記する。永続化には `ConversationStore::save` が必要。
    ///
    /// 本文はトリムし、`MAX_CONTENT_CHARS` を超える部分は切り詰める。
    pub fn push(&mut self, role: Role, content: &str, mode: Mode) {
        self.messages.push(LogEntry::Message(Message {
            role,
            content: clip(content, MAX_CONTENT_CHARS),
            mode,
        }));
    }

    /// 正しい形式のメッセージだけを時系列順に返す。
    pub fn iter_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter_map(LogEntry::as_message)
    }
}

/// 本文をトリムし、`limit` 文字を超えていれば切り詰めて印を付ける。
pub fn clip(text: &str, limit: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= limit {
        return trimmed.to_string();
    }
    let mut clipped: String = trimmed.chars().take(limit).collect();
    clipped.push_str(TRUNCATION_MARKER);
    clipped
}

/// `history.json` を読み書きするストア
pub struct ConversationStore {
    path: PathBuf,
}

impl ConversationStore {
    /// アプリケーションディレクトリ上のストアを開く。
    pub fn open() -> Self {
        Self::open_at(super::app_dir().join("history.json"))
    }

    /// 指定したパスのストアを開く（テスト用にも使用）。
    pub fn open_at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// ログを読み込む。
    ///
    /// ファイルがない・読めない・構造が不正な場合は空のログ (version 1) を返す。
    pub fn load(&self) -> ConversationLog {
        match load_json::<ConversationLog>(&self.path) {
            Some(log) => {
                debug!(
                    path = %self.path.display(),
                    entries = log.messages.len(),
                    "Conversation log loaded"
                );
                log
            }
            None => ConversationLog::default(),
        }
    }

    /// ログ全体を書き戻す。
    pub fn save(&self, log: &ConversationLog) -> Result<()> {
        save_json(&self.path, log)
            .with_context(|| format!("failed to save history: {}", self.path.display()))?;
        debug!(
            path = %self.path.display(),
            entries = log.messages.len(),
            "Conversation log saved"
        );
        Ok(())
    }

    /// ログファイルを削除する。存在しなければ何もしない。
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Conversation log cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("failed to remove {}", self.path.display()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(tmp: &TempDir) -> ConversationStore {
        ConversationStore::open_at(tmp.path().join("history.json"))
    }

    #[test]
    fn load_missing_file_returns_empty_log() {
        let tmp = TempDir::new().unwrap();
        let log = store_in(&tmp).load();
        assert_eq!(log.version, 1);
        assert!(log.messages.is_empty());
    }

    #[test]
    fn load_structurally_invalid_returns_empty_log() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);

        for body in [
            "[]",
            "\"text\"",
            r#"{"version": 1}"#,
            r#"{"version": 1, "messages": {"role": "user"}}"#,
            "garbage",
        ] {
            std::fs::write(store.path(), body).unwrap();
            assert_eq!(store.load(), ConversationLog::default(), "body: {body}");
        }
    }

    #[test]
    fn load_defaults_missing_version() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        std::fs::write(
            store.path(),
            r#"{"messages": [{"role": "user", "content": "hi", "mode": "chat"}]}"#,
        )
        .unwrap();

        let log = store.load();
        assert_eq!(log.version, 1);
        assert_eq!(log.iter_messages().count(), 1);
    }

    #[test]
    fn load_keeps_messages_when_version_is_odd() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);

        for version in [r#""1""#, "-1", "null", "1.5"] {
            std::fs::write(
                store.path(),
                format!(
                    r#"{{"version": {version}, "messages": [{{"role": "user", "content": "hi", "mode": "chat"}}]}}"#
                ),
            )
            .unwrap();

            let log = store.load();
            assert_eq!(log.version, 1, "version: {version}");
            assert_eq!(log.iter_messages().count(), 1, "version: {version}");
        }
    }

    #[test]
    fn role_and_content_ignores_mode() {
        let entries: Vec<LogEntry> = serde_json::from_str(
            r#"[
                {"role": "user", "content": "no mode"},
                {"role": "assistant", "content": "odd mode", "mode": "shell"},
                {"role": "tool", "content": "x"},
                {"role": "user", "content": ["not", "text"]}
            ]"#,
        )
        .unwrap();

        assert!(entries.iter().all(|e| e.as_message().is_none()));
        let parts: Vec<_> = entries.iter().map(LogEntry::role_and_content).collect();
        assert_eq!(
            parts,
            vec![
                Some((Role::User, "no mode")),
                Some((Role::Assistant, "odd mode")),
                None,
                None,
            ]
        );
    }

    #[test]
    fn save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);

        let mut log = ConversationLog::default();
        log.push(Role::User, "[cmd] list files", Mode::Cmd);
        log.push(Role::Assistant, "[cmd]\nls -la", Mode::Cmd);
        log.push(Role::User, "こんにちは", Mode::Chat);
        store.save(&log).unwrap();

        assert_eq!(store.load(), log);
    }

    #[test]
    fn unknown_entries_survive_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        std::fs::write(
            store.path(),
            r#"{"version": 1, "messages": [
                {"role": "user", "content": "ok", "mode": "chat"},
                {"role": "tool", "content": 42},
                "stray"
            ]}"#,
        )
        .unwrap();

        let log = store.load();
        assert_eq!(log.messages.len(), 3);
        assert_eq!(log.iter_messages().count(), 1);

        store.save(&log).unwrap();
        assert_eq!(store.load(), log);
    }

    #[test]
    fn clear_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);

        let mut log = ConversationLog::default();
        log.push(Role::User, "hello", Mode::Chat);
        store.save(&log).unwrap();
        assert!(store.path().exists());

        store.clear().unwrap();
        assert!(!store.path().exists());
        store.clear().unwrap();
    }

    #[test]
    fn push_clips_long_content() {
        let mut log = ConversationLog::default();
        let long = "x".repeat(MAX_CONTENT_CHARS + 10);
        log.push(Role::Assistant, &long, Mode::Chat);

        let msg = log.iter_messages().next().unwrap();
        assert!(msg.content.ends_with("...[truncated]"));
        assert_eq!(
            msg.content.chars().count(),
            MAX_CONTENT_CHARS + TRUNCATION_MARKER.chars().count()
        );
    }

    #[test]
    fn clip_counts_characters_not_bytes() {
        let text = "é".repeat(5);
        assert_eq!(clip(&text, 5), text);
        assert_eq!(clip(&text, 3), format!("ééé{TRUNCATION_MARKER}"));
    }

    #[test]
    fn clip_trims_whitespace() {
        assert_eq!(clip("  hi \n", 10), "hi");
    }
}
