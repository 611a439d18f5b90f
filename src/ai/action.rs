//! 構造化出力の検証と正規化
//!
//! パース済みの JSON オブジェクトから cmd / script モードのアクションを組み立てる。
//! モデルには引用マーカー (`[1]` など) を出さないよう指示しているが、
//! 出てきた場合に備えて表示・実行するフィールドからはすべて取り除く。

use std::path::Path;
use std::sync::OnceLock;

use clap::ValueEnum;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

/// 必須フィールドが空だった場合のエラー
#[derive(Debug, Error, PartialEq, Eq)]
#[error("model returned an empty `{field}`")]
pub struct EmptyAction {
    pub field: &'static str,
}

/// スクリプトの言語
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScriptLanguage {
    Python,
    Bash,
}

impl ScriptLanguage {
    pub fn as_str(self) -> &'static str {
        match self {
            ScriptLanguage::Python => "python",
            ScriptLanguage::Bash => "bash",
        }
    }

    /// `filename` が返されなかったときのファイル名
    pub fn default_filename(self) -> &'static str {
        match self {
            ScriptLanguage::Python => "script.py",
            ScriptLanguage::Bash => "script.sh",
        }
    }
}

/// cmd モードのアクション
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandAction {
    pub command: String,
    pub notes: String,
}

/// script モードのアクション
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptAction {
    pub filename: String,
    pub language: ScriptLanguage,
    pub pip: Vec<String>,
    pub code: String,
    pub notes: String,
}

fn citation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\d+\]").expect("valid citation regex"))
}

fn trailing_ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+\n").expect("valid whitespace regex"))
}

/// 引用マーカーを取り除き、改行前の空白をつぶして前後をトリムする。
pub fn strip_citations(text: &str) -> String {
    let without = citation_re().replace_all(text, "");
    trailing_ws_re()
        .replace_all(&without, "\n")
        .trim()
        .to_string()
}

/// `pip` フィールドを重複のないパッケージ名リストに正規化する。
///
/// - `null` → 空
/// - 文字列 → 1 要素
/// - 配列 → 文字列要素のみトリムして採用、空文字列は捨て、初出順で重複排除
/// - それ以外 → 空
pub fn normalize_pip_list(value: Option<&Value>) -> Vec<String> {
    let items: Vec<&Value> = match value {
        Some(Value::String(_)) => value.into_iter().collect(),
        Some(Value::Array(arr)) => arr.iter().collect(),
        _ => return Vec::new(),
    };

    let mut out: Vec<String> = Vec::new();
    for item in items {
        if let Value::String(s) = item {
            let s = s.trim();
            if !s.is_empty() && !out.iter().any(|existing| existing == s) {
                out.push(s.to_string());
            }
        }
    }
    out
}

/// 文字列フィールドを取り出す。欠落・null・非文字列は空文字列。
fn text_field<'a>(data: &'a Map<String, Value>, key: &str) -> &'a str {
    data.get(key).and_then(Value::as_str).unwrap_or("")
}

/// `notes` を引用マーカー抜きで取り出す。アクションが不完全でも表示に使う。
pub fn notes_of(data: &Map<String, Value>) -> String {
    strip_citations(text_field(data, "notes"))
}

impl CommandAction {
    /// パース済みオブジェクトから cmd アクションを組み立てる。
    pub fn from_json(data: &Map<String, Value>) -> Result<Self, EmptyAction> {
        let notes = notes_of(data);
        let command = strip_citations(text_field(data, "command"));
        if command.is_empty() {
            return Err(EmptyAction { field: "command" });
        }
        Ok(Self { command, notes })
    }
}

impl ScriptAction {
    /// パース済みオブジェクトから script アクションを組み立てる。
    ///
    /// 言語はユーザーが指定したものを使い、モデルの `language` は参照しない。
    pub fn from_json(
        data: &Map<String, Value>,
        language: ScriptLanguage,
    ) -> Result<Self, EmptyAction> {
        let notes = notes_of(data);
        let code = strip_citations(text_field(data, "code"));
        if code.is_empty() {
            return Err(EmptyAction { field: "code" });
        }

        Ok(Self {
            filename: sanitize_filename(text_field(data, "filename"), language),
            language,
            pip: normalize_pip_list(data.get("pip")),
            code: format!("{code}\n"),
            notes,
        })
    }
}

/// ファイル名を最後のパス要素だけに絞る。空なら言語ごとの既定値。
fn sanitize_filename(raw: &str, language: ScriptLanguage) -> String {
    Path::new(raw.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| language.default_filename())
        .to_string()
}
