//! レスポンスからのテキスト抽出
//!
//! モデル側のレスポンス形状は保証されないため、決まった順序で候補の経路を試し、
//! どれも当たらなければレスポンス全体を文字列化して返す。ここでは決して失敗しない。

use async_openai::types::CreateChatCompletionResponse;
use serde_json::Value;
use tracing::debug;

/// トランスポートが返す生のレスポンス
#[derive(Debug, Clone)]
pub enum RawResponse {
    /// 型付きの chat completion レスポンス
    Completion(Box<CreateChatCompletionResponse>),
    /// 型の分からない JSON（テスト用トランスポートが返す形）
    #[cfg(test)]
    Json(Value),
}

/// 辞書形式のレスポンスで試す経路（優先順）
const JSON_PATHS: [&str; 3] = [
    "/choices/0/message/content",
    "/choices/0/delta/content",
    "/choices/0/content",
];

/// レスポンスからアシスタントのテキストを取り出す。`None` は空文字列。
pub fn extract_text(raw: Option<&RawResponse>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };

    match raw {
        RawResponse::Completion(resp) => {
            let content = resp
                .choices
                .first()
                .and_then(|c| c.message.content.as_deref())
                .filter(|c| !c.is_empty());
            if let Some(content) = content {
                return content.to_string();
            }
            debug!("Typed completion had no message content, trying JSON fallbacks");
            match serde_json::to_value(resp.as_ref()) {
                Ok(value) => extract_from_json(&value),
                Err(_) => format!("{resp:?}"),
            }
        }
        #[cfg(test)]
        RawResponse::Json(value) => extract_from_json(value),
    }
}

fn extract_from_json(value: &Value) -> String {
    for path in JSON_PATHS {
        match value.pointer(path) {
            Some(Value::String(s)) if !s.is_empty() => {
                debug!(path, "Extracted response text");
                return s.clone();
            }
            Some(Value::Null) | None => {}
            Some(Value::String(_)) => {}
            Some(other) => {
                debug!(path, "Non-string content, stringifying");
                return other.to_string();
            }
        }
    }

    // 辞書としての索引: 経路が文字列に解決すれば空でもそのまま返す
    if let Some(Value::String(s)) = value.pointer(JSON_PATHS[0]) {
        debug!("Message content is an empty string");
        return s.clone();
    }

    debug!("No known content path matched, stringifying whole response");
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
