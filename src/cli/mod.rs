//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod auth;
pub mod bootstrap;
pub mod chat;
pub mod personality_list;
pub mod say;
pub mod session_list;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::auth::{run_auth, run_deauth};
use crate::cli::chat::run_chat;
use crate::cli::personality_list::list_personalities;
use crate::cli::say::run_say;
use crate::cli::session_list::list_sessions;
use crate::core::config::Config;
use crate::core::personality::PersonalityRegistry;

#[derive(Parser)]
#[command(name = "obsidian")]
#[command(about = "Streaming terminal chat with personality-selected AI backends")]
#[command(
    long_about = "Obsidian routes each message to the AI backend chosen by the active \
personality (Gemini, DeepSeek, LM Studio or Ollama) and prints the reply as it streams in.\n\n\
Authentication:\n\
  Use 'obsidian auth <backend>' to store an API key in your system keyring.\n\n\
Environment Variables (fallback if no key is stored):\n\
  GEMINI_API_KEY     Gemini API key\n\
  DEEPSEEK_API_KEY   DeepSeek API key\n\
  LM_STUDIO_URL      LM Studio server URL (default http://127.0.0.1:1234)\n\
  OLLAMA_URL         Ollama base URL (default http://127.0.0.1:11434)\n\
  OBSIDIAN_LOG       Log filter, e.g. 'debug' or 'obsidian=trace'\n\n\
Chat commands:\n\
  /personality <id>  Switch personality (starts a new conversation)\n\
  /clear             Start a new conversation\n\
  /encrypt on|off    Stop or resume saving this conversation\n\
  /help              Show all chat commands"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Write diagnostic logs to this file instead of stderr
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Start an interactive chat (default)
    Chat {
        /// Personality to start with
        #[arg(short, long)]
        personality: Option<String>,
        /// Do not save this conversation
        #[arg(short, long)]
        encrypted: bool,
        /// Continue a saved session by id
        #[arg(short, long, value_name = "SESSION_ID")]
        resume: Option<String>,
    },
    /// Send one prompt and print the streamed reply
    Say {
        /// Personality that answers
        #[arg(short, long)]
        personality: Option<String>,
        /// Prompt text
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        prompt: Vec<String>,
    },
    /// List available personalities
    Personalities,
    /// List saved sessions, most recent first
    Sessions,
    /// Store an API key for a backend in the system keyring
    Auth {
        /// Backend id (e.g., gemini, deepseek)
        backend: String,
    },
    /// Remove a stored API key
    Deauth {
        /// Backend id (e.g., gemini, deepseek)
        backend: String,
    },
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: Option<String>,
        /// Value to set for the key
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Option<Vec<String>>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Chat {
            personality: None,
            encrypted: false,
            resume: None,
        }
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    crate::logging::init(args.log.as_deref())?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    match args.command.unwrap_or_default() {
        Commands::Chat {
            personality,
            encrypted,
            resume,
        } => run_chat(personality, encrypted, resume).await,
        Commands::Say {
            personality,
            prompt,
        } => run_say(prompt, personality).await,
        Commands::Personalities => list_personalities(),
        Commands::Sessions => list_sessions(),
        Commands::Auth { backend } => run_auth(&backend),
        Commands::Deauth { backend } => run_deauth(&backend),
        Commands::Set { key, value } => set_config_value(key, value),
        Commands::Unset { key } => unset_config_value(&key),
    }
}

fn set_config_value(key: Option<String>, value: Option<Vec<String>>) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load()?;
    let value = value.map(|parts| parts.join(" ")).filter(|v| !v.is_empty());
    let (Some(key), Some(value)) = (key, value) else {
        config.print_all();
        return Ok(());
    };

    match key.as_str() {
        "default-personality" => {
            let registry = PersonalityRegistry::with_overrides(&config.personalities);
            let Some(personality) = registry.find(&value) else {
                return Err(format!(
                    "Unknown personality: {value}. Available: {}",
                    registry.ids().join(", ")
                )
                .into());
            };
            config.default_personality = Some(personality.id.clone());
            config.save()?;
            println!("✅ Set default-personality to: {}", personality.id);
        }
        "encrypted" => {
            let enabled = parse_switch(&value)
                .ok_or_else(|| format!("Expected on or off for encrypted, got: {value}"))?;
            config.encrypted = Some(enabled);
            config.save()?;
            println!("✅ Set encrypted to: {}", if enabled { "on" } else { "off" });
        }
        "sessions-dir" => {
            config.sessions_dir = Some(PathBuf::from(&value));
            config.save()?;
            println!("✅ Set sessions-dir to: {value}");
        }
        _ => return Err(format!("Unknown config key: {key}").into()),
    }
    Ok(())
}

fn unset_config_value(key: &str) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load()?;
    match key {
        "default-personality" => config.default_personality = None,
        "encrypted" => config.encrypted = None,
        "sessions-dir" => config.sessions_dir = None,
        _ => return Err(format!("Unknown config key: {key}").into()),
    }
    config.save()?;
    println!("✅ Unset {key}");
    Ok(())
}

pub(crate) fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}
