mod ai;
mod cli;
mod config;
mod engine;
mod logging;
mod modes;
mod storage;

use clap::Parser;
use tracing::{info, warn};

use ai::PerplexityClient;
use cli::args::{Cli, Commands};
use cli::color::{cyan, dim};
use cli::ui::{self, TerminalConfirm};
use config::PplConfig;
use engine::ModeError;
use modes::{ModeOptions, Session};
use storage::credential::CredentialStore;
use storage::history::{ConversationStore, LogEntry, Mode};

#[tokio::main]
async fn main() {
    // .env ファイルから環境変数を読み込む
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // ガードは exit より前にドロップしてログを書き切る
    let code = {
        let _guard = logging::init_logging();
        info!(version = env!("CARGO_PKG_VERSION"), "ppl started");
        let code = run(cli.command).await;
        info!(exit_code = code, "ppl finished");
        code
    };

    std::process::exit(code);
}

async fn run(command: Commands) -> i32 {
    match command {
        Commands::Chat {
            query,
            short,
            tuning,
        } => {
            let config = PplConfig::load();
            let opts = ModeOptions::resolve(Mode::Chat, &tuning, &config);
            let store = ConversationStore::open();
            let mut session = open_session(&store, &config);
            finish(session.chat(&query, short, &opts).await)
        }
        Commands::Cmd {
            query,
            short,
            run,
            tuning,
        } => {
            let config = PplConfig::load();
            let opts = ModeOptions::resolve(Mode::Cmd, &tuning, &config);
            let store = ConversationStore::open();
            let mut session = open_session(&store, &config);
            finish(session.command(&query, short, run, &opts).await)
        }
        Commands::Script {
            lang,
            query,
            tuning,
        } => {
            let config = PplConfig::load();
            let opts = ModeOptions::resolve(Mode::Script, &tuning, &config);
            let store = ConversationStore::open();
            let mut session = open_session(&store, &config);
            finish(session.script(lang, &query, &opts).await)
        }
        Commands::Key { key, clear } => run_key(key, clear),
        Commands::Clear => run_clear(),
        Commands::History { count } => run_history(count),
    }
}

/// API キーが解決できた場合のみクライアントを作る。
fn open_session<'a>(
    store: &'a ConversationStore,
    config: &PplConfig,
) -> Session<'a, PerplexityClient, TerminalConfirm> {
    let transport = CredentialStore::open()
        .resolve_api_key()
        .map(|key| PerplexityClient::new(&key, &config.ai.api_base));
    if transport.is_none() {
        warn!("No API key available; model calls are disabled");
    }
    Session::new(store, transport, TerminalConfirm)
}

/// モードの結果をプロセスの終了コードに変換する。
fn finish(result: Result<i32, ModeError>) -> i32 {
    match result {
        Ok(code) => code,
        Err(e) => {
            let code = e.exit_code();
            warn!(error = %e, exit_code = code, "Mode failed");
            ui::error(&e.to_string());
            code
        }
    }
}

fn run_key(key: Option<String>, clear: bool) -> i32 {
    let store = CredentialStore::open();

    if clear {
        return match store.clear_api_key() {
            Ok(()) => {
                println!("Key removed from {}", store.path().display());
                0
            }
            Err(e) => {
                ui::error(&format!("{e:#}"));
                1
            }
        };
    }

    let key = match key {
        Some(k) => k,
        None => match ui::prompt_hidden("Perplexity API key") {
            Ok(k) => k,
            Err(e) => {
                ui::error(&format!("failed to read key: {e}"));
                return 1;
            }
        },
    };

    if key.trim().is_empty() {
        ui::error("no key given");
        return 1;
    }

    match store.set_api_key(&key) {
        Ok(()) => {
            println!("Key saved to {} (local to this user)", store.path().display());
            0
        }
        Err(e) => {
            ui::error(&format!("{e:#}"));
            1
        }
    }
}

fn run_clear() -> i32 {
    let store = ConversationStore::open();
    match store.clear() {
        Ok(()) => {
            println!("Cleared: {}", store.path().display());
            0
        }
        Err(e) => {
            ui::error(&format!("{e:#}"));
            1
        }
    }
}

/// 1 行表示の最大文字数
const HISTORY_PREVIEW_CHARS: usize = 100;

fn run_history(count: usize) -> i32 {
    let store = ConversationStore::open();
    let log = store.load();

    let skip = if count > 0 {
        log.messages.len().saturating_sub(count)
    } else {
        0
    };

    if log.messages.is_empty() {
        println!("{}", dim("(history is empty)"));
        return 0;
    }

    for entry in &log.messages[skip..] {
        match entry {
            LogEntry::Message(m) => {
                let first = m.content.lines().next().unwrap_or("");
                let mut preview: String = first.chars().take(HISTORY_PREVIEW_CHARS).collect();
                if first.chars().count() > HISTORY_PREVIEW_CHARS || m.content.lines().count() > 1 {
                    preview.push_str(" …");
                }
                println!(
                    "{} {} {preview}",
                    dim(&format!("[{}]", m.mode)),
                    cyan(&format!("{:>9}:", m.role.as_str()))
                );
            }
            LogEntry::Other(_) => println!("{}", dim("(unrecognized entry)")),
        }
    }
    0
}
