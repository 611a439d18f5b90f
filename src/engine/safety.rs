//! 実行前の安全確認
//!
//! 拒否リストはあくまで簡易的なヒューリスティックで、サンドボックスではない。
//! 実行・インストールはすべて `Confirm` による明示的な同意を経てから行う。

use tracing::warn;

/// 自動実行を拒否するパターン（小文字で部分一致）
pub const DENYLIST: &[&str] = &["rm -rf", "rm -fr", "mkfs", "dd if=", "> /dev/sd", ":(){"];

/// 拒否リストに一致したパターンを返す。大文字小文字は区別しない。
pub fn dangerous_pattern(command: &str) -> Option<&'static str> {
    let lowered = command.to_lowercase();
    let hit = DENYLIST.iter().copied().find(|p| lowered.contains(p));
    if let Some(pattern) = hit {
        warn!(command = %command, pattern, "Command matched denylist");
    }
    hit
}

/// ユーザーへの yes/no 確認
pub trait Confirm {
    /// `default` は空入力（Enter のみ）のときの答え。
    fn confirm(&mut self, question: &str, default: bool) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_dangerous(command: &str) -> bool {
        dangerous_pattern(command).is_some()
    }

    #[test]
    fn detects_destructive_commands() {
        assert!(is_dangerous("rm -rf /"));
        assert!(is_dangerous("sudo RM -RF ~/tmp"));
        assert!(is_dangerous("mkfs.ext4 /dev/sdb1"));
        assert!(is_dangerous("dd if=/dev/zero of=/dev/sda bs=1M"));
        assert!(is_dangerous("cat image > /dev/sda"));
        assert!(is_dangerous(":(){ :|:& };:"));
    }

    #[test]
    fn allows_read_only_diagnostics() {
        assert!(!is_dangerous("ls -la"));
        assert!(!is_dangerous("df -h"));
        assert!(!is_dangerous("rm file.txt"));
        assert!(!is_dangerous("grep -r 'dd' ."));
    }

    #[test]
    fn reports_matched_pattern() {
        assert_eq!(dangerous_pattern("echo hi && mkfs /dev/x"), Some("mkfs"));
        assert_eq!(dangerous_pattern("echo hi"), None);
    }
}
