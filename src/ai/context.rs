//! 会話ログから、モデルへ渡す直近のコンテキストを切り出す。

use super::client::ChatMessage;
use crate::storage::history::{ConversationLog, LogEntry, Role};

/// ログの末尾から user / assistant のメッセージを最大 `max_messages` 件返す。
///
/// system メッセージ・本文が文字列でないエントリ・空白だけの本文は除外する。
/// `mode` は見ない。`max_messages` が 0 なら件数を制限しない。
pub fn build_context(log: &ConversationLog, max_messages: usize) -> Vec<ChatMessage> {
    let mut msgs: Vec<ChatMessage> = log
        .messages
        .iter()
        .filter_map(LogEntry::role_and_content)
        .filter(|(role, _)| matches!(role, Role::User | Role::Assistant))
        .filter(|(_, content)| !content.trim().is_empty())
        .map(|(role, content)| ChatMessage::new(role, content))
        .collect();

    if max_messages > 0 && msgs.len() > max_messages {
        msgs.drain(..msgs.len() - max_messages);
    }
    msgs
}
