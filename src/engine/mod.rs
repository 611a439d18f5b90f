//! ローカル実行エンジン
//!
//! 生成されたコマンド・スクリプト・依存パッケージのインストールを実行する前の
//! 安全確認 (`safety`) と、実際のプロセス起動 (`exec`)、
//! およびユーザーに見えるエラーと終了コードの対応をまとめる。

pub mod exec;
pub mod safety;

use thiserror::Error;

use crate::ai::action::EmptyAction;
use crate::ai::parse::ParseError;

pub const EXIT_TRANSPORT_UNAVAILABLE: i32 = 1;
pub const EXIT_MALFORMED_RESPONSE: i32 = 2;
pub const EXIT_EMPTY_ACTION: i32 = 3;
pub const EXIT_DANGEROUS_COMMAND: i32 = 4;
pub const EXIT_MISSING_RUNTIME: i32 = 5;
pub const EXIT_INSTALL_COMMAND: i32 = 6;
pub const EXIT_SCRIPT_RUN: i32 = 7;
pub const EXIT_DEPENDENCY_INSTALL: i32 = 8;
pub const EXIT_TRANSPORT_FAILED: i32 = 9;

/// 各モードの実行を打ち切るエラー。すべて固定の終了コードに対応する。
#[derive(Debug, Error)]
pub enum ModeError {
    /// API キーが解決できない
    #[error("no API key configured (run `ppl key` or set PERPLEXITY_API_KEY)")]
    TransportUnavailable,

    /// API キーはあるがリクエストが失敗した
    #[error("model request failed: {0:#}")]
    Transport(anyhow::Error),

    /// モデル出力から JSON を取り出せなかった
    #[error("failed to parse model response: {0}")]
    MalformedResponse(#[from] ParseError),

    /// JSON は読めたが必須フィールドが空
    #[error(transparent)]
    EmptyAction(#[from] EmptyAction),

    /// 拒否リストに一致した
    #[error("refusing to run a command that looks dangerous (matched `{pattern}`)")]
    DangerousCommand { pattern: &'static str },

    /// ローカルにインタプリタがない
    #[error("{0} not found; install it and try again")]
    MissingRuntime(String),

    /// pip install コマンドを組み立てられない
    #[error("could not build the pip install command")]
    InstallCommand,

    /// インストーラを起動できなかった
    #[error("failed to start dependency installer: {0}")]
    DependencyInstall(#[source] std::io::Error),

    /// スクリプトの保存・起動に失敗した
    #[error("failed to run script: {0}")]
    ScriptRun(String),

    /// 子プロセスが非ゼロで終了した。終了コードをそのまま返す。
    #[error("process exited with code {0}")]
    SubprocessFailure(i32),
}

impl ModeError {
    /// このエラーでプロセスを終了するときの終了コード
    pub fn exit_code(&self) -> i32 {
        match self {
            ModeError::TransportUnavailable => EXIT_TRANSPORT_UNAVAILABLE,
            ModeError::Transport(_) => EXIT_TRANSPORT_FAILED,
            ModeError::MalformedResponse(_) => EXIT_MALFORMED_RESPONSE,
            ModeError::EmptyAction(_) => EXIT_EMPTY_ACTION,
            ModeError::DangerousCommand { .. } => EXIT_DANGEROUS_COMMAND,
            ModeError::MissingRuntime(_) => EXIT_MISSING_RUNTIME,
            ModeError::InstallCommand => EXIT_INSTALL_COMMAND,
            ModeError::DependencyInstall(_) => EXIT_DEPENDENCY_INSTALL,
            ModeError::ScriptRun(_) => EXIT_SCRIPT_RUN,
            ModeError::SubprocessFailure(code) => *code,
        }
    }
}
