//! Binary entrypoint for the printbot CLI.
//!
//! Commands:
//! - `start [--trigger <word>] [--channel <name>]` - join the channel and print approved requests
//! - `init` - write a starter config file
//! - `badword add|remove|list` - administer the forbidden-word list
//! - `stats` - print persisted counters as JSON
//!
//! See the library crate docs for module‑level details: `printbot::`.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};

use printbot::bot::{PrintBot, ShutdownToken, StopReason};
use printbot::config::Config;
use printbot::printer::{PrintQueue, SpoolSink, TrueTypeFace};
use printbot::storage::SledModerationStore;
use printbot::twitch::ChatSession;

#[derive(Parser)]
#[command(name = "printbot")]
#[command(about = "A twitch bot that prints messages from a channel to a cat printer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "printbot.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Join the configured channel and start printing
    Start {
        /// Trigger word for printing (after !)
        #[arg(short, long)]
        trigger: Option<String>,

        /// IRC channel to join
        #[arg(long)]
        channel: Option<String>,
    },
    /// Write a default configuration file
    Init,
    /// Manage forbidden words
    Badword {
        #[command(subcommand)]
        action: BadwordAction,
    },
    /// Show persisted counters
    Stats,
}

#[derive(Subcommand)]
enum BadwordAction {
    /// Add a forbidden word
    Add { word: String },
    /// Remove a forbidden word
    Remove { word: String },
    /// List forbidden words
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        init_logging(None, cli.verbose);
        Config::create_default(&cli.config).await?;
        info!("Configuration file created at {}", cli.config);
        return Ok(());
    }

    let mut config = match Config::load(&cli.config).await {
        Ok(c) => c,
        Err(e) => {
            init_logging(None, cli.verbose);
            error!("{:#}", e);
            std::process::exit(1);
        }
    };
    init_logging(Some(&config), cli.verbose);

    match cli.command {
        Commands::Start { trigger, channel } => {
            if let Some(trigger) = trigger {
                config.bot.trigger = trigger;
            }
            if let Some(channel) = channel {
                config.twitch.channel = channel;
            }
            if let Err(e) = config.validate() {
                error!("invalid configuration: {:#}", e);
                std::process::exit(1);
            }
            info!("Starting printbot v{}", env!("CARGO_PKG_VERSION"));
            if let Err(e) = start(&config).await {
                error!("{:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Badword { action } => {
            let store = SledModerationStore::open(&config.storage.db_path)
                .with_context(|| format!("failed to open store {}", config.storage.db_path))?;
            match action {
                BadwordAction::Add { word } => {
                    if store.add_bad_word(&word)? {
                        println!("added '{}'", word.trim().to_lowercase());
                    } else {
                        println!("'{}' is already listed", word.trim().to_lowercase());
                    }
                }
                BadwordAction::Remove { word } => {
                    if store.remove_bad_word(&word)? {
                        println!("removed '{}'", word.trim().to_lowercase());
                    } else {
                        println!("'{}' was not listed", word.trim().to_lowercase());
                    }
                }
                BadwordAction::List => {
                    for record in store.list_bad_words()? {
                        println!("{}", record.word);
                    }
                }
            }
        }
        Commands::Stats => {
            let store = SledModerationStore::open(&config.storage.db_path)
                .with_context(|| format!("failed to open store {}", config.storage.db_path))?;
            let counters: serde_json::Map<String, serde_json::Value> = store
                .list_statistics()?
                .into_iter()
                .map(|s| (s.name, serde_json::Value::from(s.value)))
                .collect();
            let payload = serde_json::json!({
                "users": store.user_count(),
                "messages": store.message_count(),
                "counters": counters,
            });
            println!("{}", payload);
        }
        Commands::Init => unreachable!("handled before config load"),
    }

    Ok(())
}

/// Startup is fail-fast: any error before the loop starts aborts the process.
async fn start(config: &Config) -> Result<()> {
    info!("Connecting to store {}", config.storage.db_path);
    let store = SledModerationStore::open(&config.storage.db_path)
        .with_context(|| format!("failed to open store {}", config.storage.db_path))?;

    let face = TrueTypeFace::load(&config.printer.font_path, config.printer.font_size)
        .context("failed to load printer font")?;
    let sink = SpoolSink::new(&config.printer.spool_dir)
        .with_context(|| format!("failed to prepare spool dir {}", config.printer.spool_dir))?;
    let queue = PrintQueue::new(face, sink, &config.printer);

    info!("connect to {}:{}", config.twitch.server, config.twitch.port);
    let session = ChatSession::connect(&config.twitch)
        .await
        .context("failed to connect to twitch.tv")?;

    let shutdown = ShutdownToken::new();
    shutdown.cancel_on_ctrl_c();

    let mut bot = PrintBot::new(&config.bot.trigger, session, store, queue);
    match bot.run(shutdown).await {
        StopReason::Cancelled => info!("printbot stopped"),
        StopReason::PeerClosed => info!("printbot stopped: server closed the connection"),
    }
    Ok(())
}

fn init_logging(config: Option<&Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides config
    let base_level = match (verbosity, config) {
        (0, Some(cfg)) => cfg.logging.level_filter(),
        (0, None) => log::LevelFilter::Info,
        (1, _) => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    // sled is chatty at debug
    builder.filter_module("sled", log::LevelFilter::Warn);

    let log_file = config
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Foreground runs also echo to the console
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
