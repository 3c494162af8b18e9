use std::error::Error;

use chrono::{DateTime, Local};

use crate::cli::bootstrap::session_store;
use crate::core::config::Config;
use crate::core::session_store::Session;

const PREVIEW_CHARS: usize = 48;

pub fn list_sessions() -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let sessions = session_store(&config)?.list()?;

    if sessions.is_empty() {
        println!("No saved sessions.");
        return Ok(());
    }

    for session in &sessions {
        println!("{}", format_session(session));
    }
    println!("\nResume with: obsidian chat --resume <id>");
    Ok(())
}

fn format_session(session: &Session) -> String {
    let when = DateTime::from_timestamp_millis(session.last_active)
        .map(|utc| utc.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let preview = session
        .conversation
        .iter()
        .find(|message| message.is_user())
        .map(|message| preview(&message.content))
        .unwrap_or_default();

    format!(
        "{}  {}  {:<8} {:>3} msgs  {}",
        session.id,
        when,
        session.personality_id,
        session.conversation.len(),
        preview
    )
}

fn preview(content: &str) -> String {
    let single_line = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= PREVIEW_CHARS {
        return single_line;
    }
    let truncated: String = single_line.chars().take(PREVIEW_CHARS - 1).collect();
    format!("{truncated}…")
}
