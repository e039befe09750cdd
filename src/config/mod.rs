//! # Configuration Management Module
//!
//! Printbot reads a single TOML file at startup. The resulting [`Config`] is validated once
//! and then treated as read-only for the lifetime of the process.
//!
//! ## Configuration Structure
//!
//! - [`TwitchConfig`] - IRC gateway address, login, token, and channel
//! - [`BotConfig`] - Trigger word that marks a chat message for printing
//! - [`StorageConfig`] - Location of the sled database
//! - [`PrinterConfig`] - Device name, canvas geometry, font, and spool directory
//! - [`LoggingConfig`] - Log level and optional log file
//!
//! ## Configuration File Format
//!
//! ```toml
//! [twitch]
//! server = "irc.chat.twitch.tv"
//! port = 6667
//! username = "printbot"
//! token = "oauth:xxxxxxxx"
//! channel = "mychannel"
//!
//! [bot]
//! trigger = "print"
//!
//! [storage]
//! db_path = "./data/printbot.db"
//!
//! [printer]
//! device_name = "GT01"
//! width = 384
//! height = 64
//! font_path = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"
//! font_size = 24.0
//! spool_dir = "./data/spool"
//!
//! [logging]
//! level = "info"
//! ```

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub twitch: TwitchConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub printer: PrinterConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitchConfig {
    #[serde(default = "default_server")]
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    /// OAuth token sent verbatim in the PASS line, usually `oauth:...`.
    pub token: String,
    /// Channel name without the leading `#`.
    pub channel: String,
}

fn default_server() -> String {
    "irc.chat.twitch.tv".to_string()
}

fn default_port() -> u16 {
    6667
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Word that must directly follow `!` at the start of a chat message to request a print.
    pub trigger: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            trigger: "print".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "./data/printbot.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterConfig {
    /// Identifier handed to the rendering sink alongside every bitmap.
    pub device_name: String,
    pub width: u32,
    pub height: u32,
    pub font_path: String,
    /// Glyph height in pixels.
    pub font_size: f32,
    pub spool_dir: String,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            device_name: "GT01".to_string(),
            width: crate::printer::DEFAULT_CANVAS_WIDTH,
            height: 64,
            font_path: "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string(),
            font_size: 24.0,
            spool_dir: "./data/spool".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Map the configured level name onto a filter. Unknown names fall back to `Info`.
    pub fn level_filter(&self) -> log::LevelFilter {
        match self.level.to_ascii_lowercase().as_str() {
            "off" => log::LevelFilter::Off,
            "error" | "critical" => log::LevelFilter::Error,
            "warn" | "warning" => log::LevelFilter::Warn,
            "debug" => log::LevelFilter::Debug,
            "trace" => log::LevelFilter::Trace,
            _ => log::LevelFilter::Info,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Check values the pipeline relies on and normalize the channel name.
    pub fn validate(&mut self) -> Result<()> {
        let trigger = self.bot.trigger.trim();
        if trigger.is_empty() {
            bail!("bot.trigger must not be empty");
        }
        if trigger.contains(char::is_whitespace) || trigger.contains('!') {
            bail!("bot.trigger must be a single word without '!'");
        }
        self.bot.trigger = trigger.to_string();

        if self.twitch.username.trim().is_empty() {
            bail!("twitch.username must not be empty");
        }
        if self.twitch.token.trim().is_empty() {
            bail!("twitch.token must not be empty");
        }
        let channel = self.twitch.channel.trim().trim_start_matches('#');
        if channel.is_empty() {
            bail!("twitch.channel must not be empty");
        }
        self.twitch.channel = channel.to_string();

        if self.printer.width == 0 || self.printer.height == 0 {
            bail!(
                "printer canvas must be non-empty (got {}x{})",
                self.printer.width,
                self.printer.height
            );
        }
        if !(self.printer.font_size > 0.0) {
            bail!("printer.font_size must be positive");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            twitch: TwitchConfig {
                server: default_server(),
                port: default_port(),
                username: "your_bot_account".to_string(),
                token: "oauth:changeme".to_string(),
                channel: "your_channel".to_string(),
            },
            bot: BotConfig::default(),
            storage: StorageConfig::default(),
            printer: PrinterConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
