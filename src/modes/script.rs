//! script モード: スクリプトを生成・保存し、依存のインストールと実行を確認のうえ行う。
//!
//! 順序は固定: 依存インストール → 保存 → 履歴記録 → 実行。

use tracing::info;

use super::{parse_structured, ModeOptions, Session};
use crate::ai::action::{notes_of, ScriptAction, ScriptLanguage};
use crate::ai::prompts::script_prompt;
use crate::ai::ChatTransport;
use crate::cli::ui;
use crate::engine::exec::{self, Runner};
use crate::engine::safety::Confirm;
use crate::engine::ModeError;
use crate::storage::history::Mode;

impl<T: ChatTransport, C: Confirm, R: Runner> Session<'_, T, C, R> {
    /// script モードを実行する。
    ///
    /// 実行した場合はスクリプトの終了コードを、実行しなかった場合は 0 を返す。
    pub async fn script(
        &mut self,
        language: ScriptLanguage,
        query: &str,
        opts: &ModeOptions,
    ) -> Result<i32, ModeError> {
        let mut log = self.store.load();

        let text = self.ask(script_prompt(language), &log, query, opts).await?;
        let data = parse_structured(&text)?;

        let notes = notes_of(&data);
        if !notes.is_empty() {
            ui::panel("notes", &notes);
        }
        let action = ScriptAction::from_json(&data, language)?;
        info!(
            mode = "script",
            language = language.as_str(),
            filename = %action.filename,
            pip = ?action.pip,
            "Script generated"
        );

        if language == ScriptLanguage::Python && !action.pip.is_empty() {
            self.install_dependencies(&action.pip)?;
        }

        let path = exec::write_script(&action)?;
        ui::panel("saved to", &path.display().to_string());
        ui::panel("script", &action.code);

        let tag = format!("[script:{}]", language.as_str());
        let pip = serde_json::to_string(&action.pip).unwrap_or_default();
        self.record_turn(
            &mut log,
            Mode::Script,
            &format!("{tag} {query}"),
            &format!("{tag} pip={pip}\n{}\n\n{}", action.notes, action.code),
        );

        if !self.confirm.confirm("Run the script?", false) {
            return Ok(0);
        }
        self.runner.run_script(&path, language)
    }

    /// 宣言された依存パッケージを確認のうえユーザー領域にインストールする。
    ///
    /// 確認を断った場合はインストールせずに続行する。
    fn install_dependencies(&mut self, pkgs: &[String]) -> Result<(), ModeError> {
        let interp = self.runner.interpreter().ok_or_else(exec::missing_python)?;
        let argv =
            exec::pip_install_command(Some(&interp), pkgs).ok_or(ModeError::InstallCommand)?;

        ui::panel("Install deps (user-global)", &argv.join(" "));
        if !self.confirm.confirm("Install dependencies?", true) {
            info!(pip = ?pkgs, "Dependency install skipped by user");
            return Ok(());
        }

        match self.runner.install(&argv)? {
            0 => Ok(()),
            code => Err(ModeError::SubprocessFailure(code)),
        }
    }
}
