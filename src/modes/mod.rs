//! モード別の処理パイプライン
//!
//! 1 回の起動につき、ログの読み込み → プロンプト組み立て → モデル呼び出し →
//! 抽出・パース・検証 → 安全確認 → 実行 → ログ保存 を順に一度だけ行う。
//! 会話ログはプロセス全体で 1 つの集約として読み込み、変更し、書き戻す。

mod chat;
mod command;
mod script;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::ai::context::build_context;
use crate::ai::extract::extract_text;
use crate::ai::parse::parse_json_object;
use crate::ai::{ChatMessage, ChatTransport, GenerateParams};
use crate::cli::args::Tuning;
use crate::cli::ui;
use crate::config::{ModeDefaults, PplConfig};
use crate::cli::ui::SpinnerStyle;
use crate::engine::exec::{Runner, SystemRunner};
use crate::engine::safety::Confirm;
use crate::engine::ModeError;
use crate::storage::history::{ConversationLog, ConversationStore, Mode, Role};

/// モードごとの組み込み既定値
struct Builtin {
    context: usize,
    temperature: f32,
    max_tokens: u32,
}

const CHAT_BUILTIN: Builtin = Builtin {
    context: 30,
    temperature: 0.2,
    max_tokens: 900,
};

const CMD_BUILTIN: Builtin = Builtin {
    context: 30,
    temperature: 0.1,
    max_tokens: 400,
};

const SCRIPT_BUILTIN: Builtin = Builtin {
    context: 20,
    temperature: 0.1,
    max_tokens: 1200,
};

/// 1 回の呼び出しで使う設定
#[derive(Debug, Clone)]
pub struct ModeOptions {
    /// コンテキストに含める直近メッセージ数 (0 = 全件)
    pub context: usize,
    pub params: GenerateParams,
    /// モデルの生テキストを表示する
    pub debug: bool,
    pub spinner: SpinnerStyle,
}

impl ModeOptions {
    /// コマンドライン → settings.toml → 組み込み既定値 の順に値を決める。
    pub fn resolve(mode: Mode, tuning: &Tuning, config: &PplConfig) -> Self {
        let (defaults, builtin): (&ModeDefaults, &Builtin) = match mode {
            Mode::Chat => (&config.chat, &CHAT_BUILTIN),
            Mode::Cmd => (&config.cmd, &CMD_BUILTIN),
            Mode::Script => (&config.script, &SCRIPT_BUILTIN),
        };

        Self {
            context: tuning
                .context
                .or(defaults.context)
                .unwrap_or(builtin.context),
            params: GenerateParams {
                model: tuning
                    .model
                    .clone()
                    .unwrap_or_else(|| config.ai.model.clone()),
                temperature: tuning
                    .temperature
                    .or(defaults.temperature)
                    .unwrap_or(builtin.temperature),
                max_tokens: tuning
                    .max_tokens
                    .or(defaults.max_tokens)
                    .unwrap_or(builtin.max_tokens),
            },
            debug: tuning.debug,
            spinner: tuning.spinner.unwrap_or_default(),
        }
    }
}

/// 1 回の起動で使う依存一式。
///
/// `transport` が `None` なのは API キーが解決できなかった場合で、
/// モデルを必要とするモードは通信を試みずに `TransportUnavailable` で終わる。
/// コマンド・スクリプト・インストーラの起動は `runner` を通す。
pub struct Session<'a, T, C, R = SystemRunner> {
    pub store: &'a ConversationStore,
    pub transport: Option<T>,
    pub confirm: C,
    pub runner: R,
}

impl<'a, T, C> Session<'a, T, C> {
    pub fn new(store: &'a ConversationStore, transport: Option<T>, confirm: C) -> Self {
        Self {
            store,
            transport,
            confirm,
            runner: SystemRunner,
        }
    }
}

#[cfg(test)]
impl<'a, T, C, R> Session<'a, T, C, R> {
    pub fn with_runner<R2: Runner>(self, runner: R2) -> Session<'a, T, C, R2> {
        Session {
            store: self.store,
            transport: self.transport,
            confirm: self.confirm,
            runner,
        }
    }
}

impl<T: ChatTransport, C: Confirm, R: Runner> Session<'_, T, C, R> {
    /// システムプロンプト・直近の履歴・今回の入力を送り、応答テキストを返す。
    async fn ask(
        &self,
        system_prompt: String,
        log: &ConversationLog,
        query: &str,
        opts: &ModeOptions,
    ) -> Result<String, ModeError> {
        let transport = self
            .transport
            .as_ref()
            .ok_or(ModeError::TransportUnavailable)?;

        let mut messages = vec![ChatMessage::new(Role::System, system_prompt)];
        messages.extend(build_context(log, opts.context));
        messages.push(ChatMessage::new(Role::User, query));

        debug!(
            message_count = messages.len(),
            context_limit = opts.context,
            model = %opts.params.model,
            "Prompt assembled"
        );

        let spinner = ui::spinner("Waiting for Perplexity...", opts.spinner);
        let result = transport.generate(&messages, &opts.params).await;
        spinner.finish_and_clear();

        let raw = result.map_err(ModeError::Transport)?;
        let text = extract_text(Some(&raw));
        if opts.debug {
            ui::panel("raw response", &text);
        }
        Ok(text)
    }

    /// 1 ターン (ユーザー発話 + アシスタント応答) を追記して保存する。
    /// 保存の失敗は警告にとどめ、処理結果には影響させない。
    fn record_turn(&self, log: &mut ConversationLog, mode: Mode, user: &str, assistant: &str) {
        log.push(Role::User, user, mode);
        log.push(Role::Assistant, assistant, mode);

        if let Err(e) = self.store.save(log) {
            warn!(error = %e, "Failed to record history");
            ui::warning(&format!("failed to record history: {e:#}"));
        }
    }
}

/// 構造化モードの応答を JSON として読む。失敗したら元のテキストを表示する。
fn parse_structured(text: &str) -> Result<Map<String, Value>, ModeError> {
    parse_json_object(text).map_err(|e| {
        warn!(reason = %e.reason, "Model response is not valid structured output");
        ui::panel("response text", &e.raw);
        ModeError::from(e)
    })
}


#[cfg(test)]
mod tests {
    use super::test_helpers::*;
    use super::*;
    use crate::engine::EXIT_TRANSPORT_UNAVAILABLE;

    #[test]
    fn resolve_uses_builtin_defaults() {
        let opts = ModeOptions::resolve(Mode::Script, &Tuning::default(), &PplConfig::default());
        assert_eq!(opts.context, 20);
        assert_eq!(opts.params.max_tokens, 1200);
        assert_eq!(opts.params.model, "sonar");
        assert!(!opts.debug);
        assert_eq!(opts.spinner, SpinnerStyle::Dots);
    }

    #[test]
    fn resolve_prefers_flags_over_settings() {
        let mut config = PplConfig::default();
        config.ai.model = "sonar-pro".to_string();
        config.cmd.context = Some(4);
        config.cmd.max_tokens = Some(100);

        let tuning = Tuning {
            max_tokens: Some(50),
            ..Tuning::default()
        };
        let opts = ModeOptions::resolve(Mode::Cmd, &tuning, &config);
        assert_eq!(opts.context, 4);
        assert_eq!(opts.params.max_tokens, 50);
        assert_eq!(opts.params.model, "sonar-pro");
        assert_eq!(opts.params.temperature, 0.1);
    }

    #[tokio::test]
    async fn missing_transport_fails_before_any_call() {
        let (_tmp, store) = temp_store();
        let mut session: Session<'_, FakeTransport, _> =
            Session::new(&store, None, ScriptedConfirm::default());

        let err = session
            .command("list files", false, true, &opts())
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), EXIT_TRANSPORT_UNAVAILABLE);
        assert!(session.confirm.asked.is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn context_window_is_sent_between_system_and_query() {
        let (_tmp, store) = temp_store();
        let mut log = ConversationLog::default();
        for i in 0..5 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            log.push(role, &format!("turn {i}"), Mode::Chat);
        }
        store.save(&log).unwrap();

        let session = Session::new(
            &store,
            Some(FakeTransport::replying("ok")),
            ScriptedConfirm::default(),
        );
        let mut o = opts();
        o.context = 2;
        session
            .ask("SYSTEM".to_string(), &store.load(), "now", &o)
            .await
            .unwrap();

        let calls = session.transport.as_ref().unwrap().calls.borrow();
        let sent: Vec<(Role, &str)> = calls[0]
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        assert_eq!(
            sent,
            vec![
                (Role::System, "SYSTEM"),
                (Role::Assistant, "turn 3"),
                (Role::User, "turn 4"),
                (Role::User, "now"),
            ]
        );
    }
}
