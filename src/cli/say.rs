//! One-shot "say" command

use std::error::Error;
use std::io::{self, Write};

use crate::cli::bootstrap::ChatContext;
use crate::cli::chat::render_delta;
use crate::core::chat_stream::SnapshotCallback;
use crate::core::message::Conversation;

/// Stream one reply to stdout. Nothing is saved.
pub async fn run_say(prompt: Vec<String>, personality: Option<String>) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        return Err("Usage: obsidian say <prompt>".into());
    }

    let context = ChatContext::load()?;
    let personality_id = match context.personality_or_default(personality.as_deref()) {
        Some(id) => id.to_string(),
        None => context
            .personalities
            .default_id()
            .ok_or("No personalities configured")?
            .to_string(),
    };

    let mut printed_len = 0;
    let mut print_snapshot = |snapshot: &str| {
        if let Some(delta) = render_delta(printed_len, snapshot) {
            print!("{delta}");
            let _ = io::stdout().flush();
            printed_len = snapshot.len();
        }
    };
    let callback: &mut SnapshotCallback<'_> = &mut print_snapshot;

    let text = context
        .orchestrator
        .send(
            prompt.trim(),
            &personality_id,
            &Conversation::new(),
            Some(callback),
        )
        .await?;

    // Placeholder text never arrives as a snapshot.
    if printed_len == 0 {
        print!("{text}");
    } else if let Some(rest) = render_delta(printed_len, &text) {
        print!("{rest}");
    }
    println!();
    Ok(())
}
