//! ターミナル出力と対話入力
//!
//! パネル表示・スピナー・Markdown 表示と、yes/no 確認や API キーの非表示入力をまとめる。

use std::io::{self, BufRead, Write};
use std::time::Duration;

use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};
use nix::sys::termios::{self, LocalFlags, SetArg};

use super::color::{bold_cyan, bold_red, cyan, dim, yellow};
use crate::engine::safety::Confirm;

/// タイトル付きの枠で本文を表示する。
pub fn panel(title: &str, body: &str) {
    let width = body
        .lines()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0)
        .max(title.chars().count() + 2);

    let rule = "─".repeat(width.saturating_sub(title.chars().count() + 1));
    println!("{} {} {}", dim("╭─"), bold_cyan(title), dim(&format!("{rule}╮")));
    for line in body.lines() {
        println!("{} {}", dim("│"), line);
    }
    println!("{}", dim(&format!("╰{}╯", "─".repeat(width + 2))));
}

/// スピナーの見た目
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SpinnerStyle {
    #[default]
    Dots,
    Line,
    Arc,
    Bounce,
    SimpleDots,
}

impl SpinnerStyle {
    /// 各フレーム。indicatif の仕様で最後の 1 つは終了時の表示に使われる。
    fn ticks(self) -> &'static [&'static str] {
        match self {
            SpinnerStyle::Dots => &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✔"],
            SpinnerStyle::Line => &["-", "\\", "|", "/", "✔"],
            SpinnerStyle::Arc => &["◜", "◠", "◝", "◞", "◡", "◟", "✔"],
            SpinnerStyle::Bounce => &["⠁", "⠂", "⠄", "⠂", "✔"],
            SpinnerStyle::SimpleDots => &[".  ", ".. ", "...", "   ", "✔"],
        }
    }

    fn interval(self) -> Duration {
        match self {
            SpinnerStyle::Dots | SpinnerStyle::Arc => Duration::from_millis(80),
            SpinnerStyle::Line | SpinnerStyle::Bounce => Duration::from_millis(120),
            SpinnerStyle::SimpleDots => Duration::from_millis(400),
        }
    }
}

/// 応答待ちの間に表示するスピナーを生成・開始する。
pub fn spinner(message: &str, style: SpinnerStyle) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(template.tick_strings(style.ticks()));
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(style.interval());
    spinner
}

/// chat モードの回答を Markdown として表示する。
pub fn markdown(text: &str) {
    termimad::print_text(text);
}

pub fn error(message: &str) {
    eprintln!("{} {message}", bold_red("ppl: error:"));
}

pub fn warning(message: &str) {
    eprintln!("{} {message}", yellow("ppl: warning:"));
}

/// 標準入力から yes/no を読み取る確認プロンプト
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&mut self, question: &str, default: bool) -> bool {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        print!("{} {question} {} ", cyan("?"), dim(hint));
        let _ = io::stdout().flush();

        let mut input = String::new();
        match io::stdin().lock().read_line(&mut input) {
            // EOF や読み取り失敗は拒否として扱う
            Ok(0) | Err(_) => false,
            Ok(_) => parse_answer(&input, default),
        }
    }
}

/// 確認プロンプトへの入力を解釈する。空入力は `default`、認識できない入力は拒否。
fn parse_answer(input: &str, default: bool) -> bool {
    match input.trim().to_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        _ => false,
    }
}

/// エコーを止めて 1 行読み取る。ターミナルでなければ通常どおり読む。
pub fn prompt_hidden(question: &str) -> io::Result<String> {
    print!("{question}: ");
    io::stdout().flush()?;

    let stdin = io::stdin();
    let original = termios::tcgetattr(&stdin).ok();
    if let Some(ref attrs) = original {
        let mut silent = attrs.clone();
        silent.local_flags.remove(LocalFlags::ECHO);
        let _ = termios::tcsetattr(&stdin, SetArg::TCSANOW, &silent);
    }

    let mut input = String::new();
    let read = stdin.lock().read_line(&mut input);

    if let Some(ref attrs) = original {
        let _ = termios::tcsetattr(&stdin, SetArg::TCSANOW, attrs);
        println!();
    }

    read?;
    Ok(input.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_spinner_style_has_frames_and_a_finish_frame() {
        for style in SpinnerStyle::value_variants() {
            let ticks = style.ticks();
            assert!(ticks.len() >= 3, "{style:?}");
            assert_eq!(ticks.last(), Some(&"✔"), "{style:?}");
        }
    }

    #[test]
    fn spinner_style_names_are_kebab_case() {
        assert_eq!(
            SpinnerStyle::from_str("simple-dots", true),
            Ok(SpinnerStyle::SimpleDots)
        );
        assert!(SpinnerStyle::from_str("aesthetic", true).is_err());
    }

    #[test]
    fn empty_answer_uses_default() {
        assert!(parse_answer("\n", true));
        assert!(!parse_answer("  \n", false));
    }

    #[test]
    fn explicit_yes_is_accepted() {
        assert!(parse_answer("y\n", false));
        assert!(parse_answer("YES", false));
    }

    #[test]
    fn anything_else_is_declined() {
        assert!(!parse_answer("n", true));
        assert!(!parse_answer("sure", true));
    }
}
