//! 生成物のローカル実行
//!
//! - シェルコマンド: `bash -lc <command>`
//! - 依存パッケージ: `<python> -m pip install --user <pkgs...>`
//! - スクリプト: 一時ディレクトリに保存し、python / bash で実行
//!
//! いずれも子プロセスの標準入出力はターミナルにそのまま接続し、終了コードを返す。

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use tracing::{debug, info, warn};

use super::ModeError;
use crate::ai::action::{ScriptAction, ScriptLanguage};

/// スクリプトを実行できるインタプリタの呼び出し方
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    pub program: String,
    pub args: Vec<String>,
}

impl Interpreter {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// 呼び出しをトークン列で返す（表示・インストールコマンドの組み立て用）。
    pub fn argv(&self) -> Vec<String> {
        let mut argv = vec![self.program.clone()];
        argv.extend(self.args.iter().cloned());
        argv
    }
}

/// 生成物を実際に動かす境界。テストでは呼び出しを記録するだけの実装に差し替える。
pub trait Runner {
    /// 依存インストールに使う Python インタプリタ
    fn interpreter(&self) -> Option<Interpreter>;
    fn install(&mut self, argv: &[String]) -> Result<i32, ModeError>;
    fn run_command(&mut self, command: &str) -> Result<i32, ModeError>;
    fn run_script(&mut self, path: &Path, language: ScriptLanguage) -> Result<i32, ModeError>;
}

/// ホスト上で子プロセスを起動する `Runner`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl Runner for SystemRunner {
    fn interpreter(&self) -> Option<Interpreter> {
        resolve_system_interpreter()
    }

    fn install(&mut self, argv: &[String]) -> Result<i32, ModeError> {
        install_dependencies(argv)
    }

    fn run_command(&mut self, command: &str) -> Result<i32, ModeError> {
        run_command(command)
    }

    fn run_script(&mut self, path: &Path, language: ScriptLanguage) -> Result<i32, ModeError> {
        run_script(path, language)
    }
}

/// ホストで試すインタプリタ候補（優先順）
fn interpreter_candidates() -> Vec<Interpreter> {
    let mut candidates = Vec::new();
    if cfg!(windows) {
        candidates.push(Interpreter::new("py", &["-3"]));
    }
    candidates.push(Interpreter::new("python3", &[]));
    candidates.push(Interpreter::new("python", &[]));
    candidates
}

/// PATH 上で最初に見つかった Python インタプリタを返す。
pub fn resolve_system_interpreter() -> Option<Interpreter> {
    resolve_with(|program| which::which(program).is_ok())
}

fn resolve_with(exists: impl Fn(&str) -> bool) -> Option<Interpreter> {
    let found = interpreter_candidates()
        .into_iter()
        .find(|c| exists(&c.program));
    match found {
        Some(ref interp) => debug!(interpreter = ?interp.argv(), "System interpreter resolved"),
        None => warn!("No system Python interpreter found"),
    }
    found
}

/// ユーザー領域への pip install コマンドを組み立てる。
///
/// インタプリタが見つからない、またはパッケージが空なら `None`。
pub fn pip_install_command(interp: Option<&Interpreter>, pkgs: &[String]) -> Option<Vec<String>> {
    let interp = interp?;
    if pkgs.is_empty() {
        return None;
    }
    let mut argv = interp.argv();
    argv.extend(["-m", "pip", "install", "--user"].map(String::from));
    argv.extend(pkgs.iter().cloned());
    Some(argv)
}

/// 依存パッケージをインストールし、インストーラの終了コードを返す。
pub fn install_dependencies(argv: &[String]) -> Result<i32, ModeError> {
    let (program, args) = argv.split_first().ok_or(ModeError::InstallCommand)?;
    info!(command = ?argv, "Installing dependencies");

    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(ModeError::DependencyInstall)?;
    let code = exit_code(status);
    info!(exit_code = code, "Dependency installer finished");
    Ok(code)
}

/// シェルコマンドをログインシェルで実行し、終了コードを返す。
pub fn run_command(command: &str) -> Result<i32, ModeError> {
    let bash = resolve_bash()?;
    info!(command = %command, "Running generated command");

    let status = Command::new(bash)
        .arg("-lc")
        .arg(command)
        .status()
        .map_err(|e| ModeError::ScriptRun(e.to_string()))?;
    let code = exit_code(status);
    info!(exit_code = code, "Generated command finished");
    Ok(code)
}

/// スクリプトを新しい一時ディレクトリ (`ppl-*`) に保存し、そのパスを返す。
///
/// ディレクトリはプロセス終了後も残す。bash スクリプトには実行権限を付ける。
pub fn write_script(action: &ScriptAction) -> Result<PathBuf, ModeError> {
    let dir = tempfile::Builder::new()
        .prefix("ppl-")
        .tempdir()
        .map_err(|e| ModeError::ScriptRun(format!("failed to create temp dir: {e}")))?
        .keep();

    let path = dir.join(&action.filename);
    std::fs::write(&path, &action.code)
        .map_err(|e| ModeError::ScriptRun(format!("failed to write {}: {e}", path.display())))?;

    if action.language == ScriptLanguage::Bash {
        make_executable(&path);
    }

    info!(path = %path.display(), bytes = action.code.len(), "Script saved");
    Ok(path)
}

/// 保存済みスクリプトを実行し、終了コードを返す。
pub fn run_script(path: &Path, language: ScriptLanguage) -> Result<i32, ModeError> {
    let mut command = match language {
        ScriptLanguage::Python => {
            let interp = resolve_system_interpreter().ok_or_else(missing_python)?;
            let mut c = Command::new(&interp.program);
            c.args(&interp.args);
            c
        }
        ScriptLanguage::Bash => Command::new(resolve_bash()?),
    };

    info!(path = %path.display(), language = language.as_str(), "Running script");
    let status = command
        .arg(path)
        .status()
        .map_err(|e| ModeError::ScriptRun(e.to_string()))?;
    let code = exit_code(status);
    info!(exit_code = code, "Script finished");
    Ok(code)
}

pub fn missing_python() -> ModeError {
    ModeError::MissingRuntime("system Python (python3 / python or py -3)".to_string())
}

fn resolve_bash() -> Result<PathBuf, ModeError> {
    which::which("bash").map_err(|_| ModeError::MissingRuntime("bash".to_string()))
}

fn make_executable(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700)) {
            debug!(path = %path.display(), error = %e, "chmod 700 not applied");
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}

/// 終了コードを取り出す。シグナルで終了した場合はシェルと同じく 128 + シグナル番号。
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
