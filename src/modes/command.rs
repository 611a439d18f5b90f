//! cmd モード: シェルコマンドを 1 つ生成し、必要なら確認のうえ実行する。

use tracing::{info, warn};

use super::{parse_structured, ModeOptions, Session};
use crate::ai::action::{notes_of, CommandAction};
use crate::ai::prompts::cmd_prompt;
use crate::ai::ChatTransport;
use crate::cli::ui;
use crate::engine::exec::Runner;
use crate::engine::safety::{dangerous_pattern, Confirm};
use crate::engine::ModeError;
use crate::storage::history::Mode;

impl<T: ChatTransport, C: Confirm, R: Runner> Session<'_, T, C, R> {
    /// cmd モードを実行する。
    ///
    /// コマンドは実行の有無にかかわらず履歴に記録する。
    /// 実行した場合はその終了コードを、しなかった場合は 0 を返す。
    pub async fn command(
        &mut self,
        query: &str,
        short: bool,
        run: bool,
        opts: &ModeOptions,
    ) -> Result<i32, ModeError> {
        let mut log = self.store.load();

        let text = self.ask(cmd_prompt(short), &log, query, opts).await?;
        let data = parse_structured(&text)?;

        let notes = notes_of(&data);
        if !notes.is_empty() {
            ui::panel("notes", &notes);
        }
        let action = CommandAction::from_json(&data)?;
        ui::panel("command", &action.command);
        info!(mode = "cmd", command = %action.command, "Command generated");

        let assistant = format!("[cmd]\n{}\n\n{}", action.command, action.notes);
        self.record_turn(
            &mut log,
            Mode::Cmd,
            &format!("[cmd] {query}"),
            assistant.trim(),
        );

        if !run || !self.confirm.confirm("Run this command?", false) {
            return Ok(0);
        }

        if let Some(pattern) = dangerous_pattern(&action.command) {
            warn!(command = %action.command, pattern, "Refusing dangerous command");
            return Err(ModeError::DangerousCommand { pattern });
        }

        self.runner.run_command(&action.command)
    }
}
