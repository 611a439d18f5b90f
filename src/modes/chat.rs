//! chat モード: 会話的な回答を返し、Markdown として表示する。

use tracing::info;

use super::{ModeOptions, Session};
use crate::ai::action::strip_citations;
use crate::ai::prompts::{chat_prompt, SHORT_CHAT_MAX_TOKENS};
use crate::ai::ChatTransport;
use crate::cli::ui;
use crate::engine::exec::Runner;
use crate::engine::safety::Confirm;
use crate::engine::ModeError;
use crate::storage::history::Mode;

impl<T: ChatTransport, C: Confirm, R: Runner> Session<'_, T, C, R> {
    /// chat モードを実行する。成功時の終了コードは常に 0。
    pub async fn chat(
        &mut self,
        query: &str,
        short: bool,
        opts: &ModeOptions,
    ) -> Result<i32, ModeError> {
        let mut log = self.store.load();

        let mut opts = opts.clone();
        if short {
            opts.params.max_tokens = opts.params.max_tokens.min(SHORT_CHAT_MAX_TOKENS);
        }

        let text = self.ask(chat_prompt(short), &log, query, &opts).await?;
        let answer = strip_citations(&text);
        info!(mode = "chat", answer_length = answer.len(), "Chat answer received");

        self.record_turn(&mut log, Mode::Chat, query, &answer);
        ui::markdown(&answer);
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_helpers::*;
    use super::*;
    use crate::storage::history::Role;

    #[tokio::test]
    async fn chat_records_turn_without_citations() {
        let (_tmp, store) = temp_store();
        let mut session = Session::new(
            &store,
            Some(FakeTransport::replying("Paris is the capital [1][2].")),
            ScriptedConfirm::default(),
        );

        let code = session
            .chat("capital of France?", false, &opts())
            .await
            .unwrap();
        assert_eq!(code, 0);

        let log = store.load();
        let msgs: Vec<_> = log.iter_messages().collect();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::User);
        assert_eq!(msgs[0].content, "capital of France?");
        assert_eq!(msgs[0].mode, Mode::Chat);
        assert_eq!(msgs[1].role, Role::Assistant);
        assert_eq!(msgs[1].content, "Paris is the capital .");
    }

    #[tokio::test]
    async fn chat_turns_accumulate_across_sessions() {
        let (_tmp, store) = temp_store();

        for reply in ["first", "second"] {
            let mut session = Session::new(
                &store,
                Some(FakeTransport::replying(reply)),
                ScriptedConfirm::default(),
            );
            session.chat("q", false, &opts()).await.unwrap();
        }

        assert_eq!(store.load().iter_messages().count(), 4);
    }

    #[tokio::test]
    async fn short_chat_uses_short_prompt() {
        let (_tmp, store) = temp_store();
        let mut session = Session::new(
            &store,
            Some(FakeTransport::replying("Yes.")),
            ScriptedConfirm::default(),
        );
        session.chat("is water wet?", true, &opts()).await.unwrap();

        let calls = session.transport.as_ref().unwrap().calls.borrow();
        assert!(calls[0][0].content.contains("1-2 short sentences"));
    }

    #[tokio::test]
    async fn transport_failure_is_not_recorded() {
        let (_tmp, store) = temp_store();
        let mut session = Session::new(
            &store,
            Some(FakeTransport::failing("connection reset")),
            ScriptedConfirm::default(),
        );

        let err = session.chat("hello", false, &opts()).await.unwrap_err();
        assert_eq!(err.exit_code(), crate::engine::EXIT_TRANSPORT_FAILED);
        assert!(err.to_string().contains("connection reset"));
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn empty_reply_is_recorded_as_empty() {
        let (_tmp, store) = temp_store();
        let mut session = Session::new(
            &store,
            Some(FakeTransport::replying("")),
            ScriptedConfirm::default(),
        );

        session.chat("anything?", false, &opts()).await.unwrap();

        let msgs: Vec<_> = store.load().iter_messages().cloned().collect();
        assert_eq!(msgs[1].role, Role::Assistant);
        assert_eq!(msgs[1].content, "");
    }
}
