//! システムプロンプトと定数

use super::action::ScriptLanguage;

/// `--short` 指定時の chat モードの max_tokens 上限
pub const SHORT_CHAT_MAX_TOKENS: u32 = 220;

const NO_CITATIONS: &str = "IMPORTANT: Do NOT include citation markers like [1], [2], etc.\n";

const CHAT_PROMPT: &str = "You are a helpful chat assistant.
Write in the same language as the user.
Be natural and conversational.
Do not explain obvious words or give background unless the user asks.
Do not give lists of alternatives unless requested.
";

const CMD_PROMPT: &str = r#"You are a CLI assistant for Ubuntu/macOS/Windows (when using WSL or similar).
Return ONLY valid JSON.
Schema: {"type":"command","language":"bash","command":"...","notes":"..."}
"#;

const CMD_SAFETY: &str =
    "Avoid destructive commands. Prefer read-only diagnostics. No sudo unless necessary.\n";

const SCRIPT_PYTHON_PROMPT: &str = r#"You are a CLI assistant.
Return ONLY valid JSON.
Schema: {"type":"script","language":"python","filename":"script.py","pip":["pkg1","pkg2"],"code":"...","notes":"..."}
Rules:
- Generate a complete Python 3.12+ script, self-contained.
- If script uses third-party libs, list PyPI package names in pip.
- If only stdlib is used, pip must be an empty list.
- Do not include markdown fences.
"#;

const SCRIPT_BASH_PROMPT: &str = r#"You are a CLI assistant.
Return ONLY valid JSON.
Schema: {"type":"script","language":"bash","filename":"script.sh","pip":[],"code":"...","notes":"..."}
Rules:
- Generate a complete Bash script, self-contained.
- pip must be an empty list.
- Do not include markdown fences.
"#;

/// chat モードのシステムプロンプト
pub fn chat_prompt(short: bool) -> String {
    let length = if short {
        "Answer in 1-2 short sentences. No preface.\n"
    } else {
        "Answer directly. Keep it concise.\n"
    };
    format!("{CHAT_PROMPT}{NO_CITATIONS}{length}")
}

/// cmd モードのシステムプロンプト
pub fn cmd_prompt(short: bool) -> String {
    let extra = if short {
        "Return a single short command.\n"
    } else {
        "Return one safe command.\n"
    };
    format!("{CMD_PROMPT}{extra}{CMD_SAFETY}{NO_CITATIONS}")
}

/// script モードのシステムプロンプト
pub fn script_prompt(language: ScriptLanguage) -> String {
    let body = match language {
        ScriptLanguage::Python => SCRIPT_PYTHON_PROMPT,
        ScriptLanguage::Bash => SCRIPT_BASH_PROMPT,
    };
    format!("{body}{NO_CITATIONS}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_prompt_forbids_citations() {
        for prompt in [
            chat_prompt(false),
            chat_prompt(true),
            cmd_prompt(false),
            cmd_prompt(true),
            script_prompt(ScriptLanguage::Python),
            script_prompt(ScriptLanguage::Bash),
        ] {
            assert!(prompt.contains("Do NOT include citation markers"), "{prompt}");
        }
    }

    #[test]
    fn chat_short_limits_length() {
        assert!(chat_prompt(true).contains("1-2 short sentences"));
        assert!(!chat_prompt(false).contains("1-2 short sentences"));
        assert!(chat_prompt(false).contains("same language as the user"));
    }

    #[test]
    fn cmd_prompt_carries_schema_and_safety() {
        let prompt = cmd_prompt(false);
        assert!(prompt.contains(r#"{"type":"command","language":"bash","command":"...","notes":"..."}"#));
        assert!(prompt.contains("Prefer read-only diagnostics"));
        assert!(prompt.contains("No sudo unless necessary"));
        assert!(cmd_prompt(true).contains("single short command"));
    }

    #[test]
    fn python_script_prompt_requires_pip_declaration() {
        let prompt = script_prompt(ScriptLanguage::Python);
        assert!(prompt.contains(r#""language":"python""#));
        assert!(prompt.contains("list PyPI package names in pip"));
        assert!(prompt.contains("pip must be an empty list"));
        assert!(prompt.contains("Do not include markdown fences"));
    }

    #[test]
    fn bash_script_prompt_uses_bash_schema() {
        let prompt = script_prompt(ScriptLanguage::Bash);
        assert!(prompt.contains(r#""language":"bash","filename":"script.sh""#));
        assert!(!prompt.contains("PyPI"));
    }
}
