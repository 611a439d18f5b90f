use clap::{Args, Parser, Subcommand};

use super::ui::SpinnerStyle;
use crate::ai::action::ScriptLanguage;

/// ppl — Perplexity from the command line (chat / cmd / script)
#[derive(Parser, Debug)]
#[command(name = "ppl", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chat with the model, keeping the shared conversation history
    Chat {
        /// Message to send
        query: String,
        /// Answer in 1-2 sentences
        #[arg(long)]
        short: bool,
        #[command(flatten)]
        tuning: Tuning,
    },
    /// Ask for a single shell command
    Cmd {
        /// Describe the task; a bash command is returned
        query: String,
        /// Ask for a short command
        #[arg(long)]
        short: bool,
        /// Offer to run the command after showing it
        #[arg(long)]
        run: bool,
        #[command(flatten)]
        tuning: Tuning,
    },
    /// Generate a runnable script
    Script {
        /// Script language
        #[arg(value_enum)]
        lang: ScriptLanguage,
        /// What the script should do
        query: String,
        #[command(flatten)]
        tuning: Tuning,
    },
    /// Store or remove the API key
    Key {
        /// Key to store (prompted for when omitted)
        key: Option<String>,
        /// Remove the stored key
        #[arg(long)]
        clear: bool,
    },
    /// Delete the conversation history
    Clear,
    /// Show the most recent history entries
    History {
        /// Number of entries to show (0 = all)
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
}

/// 生成パラメータの上書き。省略時は settings.toml → 組み込み既定値の順に使う。
#[derive(Args, Debug, Clone, Default)]
pub struct Tuning {
    /// How many recent history messages to include (0 = all)
    #[arg(long)]
    pub context: Option<usize>,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub temperature: Option<f32>,
    #[arg(long)]
    pub max_tokens: Option<u32>,
    /// Show the raw model response
    #[arg(long)]
    pub debug: bool,
    /// Spinner shown while waiting for the model
    #[arg(long, value_enum)]
    pub spinner: Option<SpinnerStyle>,
}
