//! モデル出力からの JSON オブジェクト抽出
//!
//! 構造化モード (cmd / script) ではモデルに JSON だけを返すよう指示しているが、
//! 実際には前後に説明文が付くことがある。テキスト中の最初の `{` から最後の `}` までを
//! 候補として取り出し（貪欲マッチ）、それが JSON として読めなければ
//! 文字列リテラルを考慮した括弧の対応で最初のオブジェクトを探し直す。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// JSON を見つけられなかった・読めなかった場合のエラー。元のテキストを保持する。
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct ParseError {
    pub reason: String,
    pub raw: String,
}

fn brace_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid brace regex"))
}

/// テキストから JSON オブジェクトを 1 つ取り出す。
pub fn parse_json_object(text: &str) -> Result<Map<String, Value>, ParseError> {
    let trimmed = text.trim();
    let fail = |reason: String| ParseError {
        reason,
        raw: text.to_string(),
    };

    if trimmed.starts_with('{') {
        return parse_object(trimmed).map_err(fail);
    }

    let Some(m) = brace_block_re().find(trimmed) else {
        return Err(fail("no JSON object found in model output".to_string()));
    };

    match parse_object(m.as_str()) {
        Ok(obj) => Ok(obj),
        Err(greedy_err) => {
            debug!(error = %greedy_err, "Greedy brace match is not valid JSON, scanning for balanced object");
            balanced_objects(trimmed)
                .find_map(|candidate| parse_object(candidate).ok())
                .ok_or_else(|| fail(greedy_err))
        }
    }
}

fn parse_object(candidate: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(obj)) => Ok(obj),
        Ok(_) => Err("model output is JSON but not an object".to_string()),
        Err(e) => Err(format!("invalid JSON in model output: {e}")),
    }
}

/// 文字列リテラル内の括弧を無視しながら、トップレベルの `{...}` ブロックを順に返す。
fn balanced_objects(text: &str) -> impl Iterator<Item = &str> {
    let mut blocks = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    blocks.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    blocks.into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_object() {
        let obj = parse_json_object(r#"  {"type":"command","command":"ls"}  "#).unwrap();
        assert_eq!(obj["command"], "ls");
    }

    #[test]
    fn extracts_object_from_prose() {
        let text = "Sure! Here you go:\n```json\n{\"type\":\"command\",\n \"command\":\"df -h\",\n \"notes\":\"disk usage\"}\n```\nHope this helps.";
        let obj = parse_json_object(text).unwrap();
        assert_eq!(obj["command"], "df -h");
        assert_eq!(obj["notes"], "disk usage");
    }

    #[test]
    fn extracts_script_contract_with_nested_braces() {
        let text = r#"Result: {"type":"script","language":"bash","filename":"a.sh","pip":[],"code":"f() { echo hi; }\nf","notes":""} done"#;
        let obj = parse_json_object(text).unwrap();
        assert_eq!(obj["filename"], "a.sh");
        assert_eq!(obj["code"], "f() { echo hi; }\nf");
    }

    #[test]
    fn prose_without_json_is_malformed() {
        let err = parse_json_object("I cannot help with that.").unwrap_err();
        assert!(err.reason.contains("no JSON object"));
        assert_eq!(err.raw, "I cannot help with that.");
    }

    #[test]
    fn leading_brace_with_invalid_json_is_malformed() {
        let err = parse_json_object("{command: ls}").unwrap_err();
        assert!(err.reason.contains("invalid JSON"));
    }

    #[test]
    fn balanced_scan_recovers_when_trailing_brace_follows() {
        let text = r#"Here: {"command":"ls"} and a stray } later"#;
        let obj = parse_json_object(text).unwrap();
        assert_eq!(obj["command"], "ls");
    }

    #[test]
    fn balanced_scan_ignores_braces_inside_strings() {
        let text = r#"x {"code":"echo \"}\"","notes":"n"} y }"#;
        let blocks: Vec<&str> = balanced_objects(text).collect();
        assert_eq!(blocks, vec![r#"{"code":"echo \"}\"","notes":"n"}"#]);
    }

    #[test]
    fn trailing_garbage_after_leading_object_is_malformed() {
        let err = parse_json_object("{}}").unwrap_err();
        assert!(err.reason.contains("invalid JSON"));
    }
}
