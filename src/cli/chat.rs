//! Line-oriented interactive chat.
//!
//! The controller lives on this task. Stdin lines and turn events are
//! multiplexed with `select!`; replies are printed incrementally as
//! snapshots grow.

use std::error::Error;
use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::bootstrap::{session_store, ChatContext};
use crate::cli::parse_switch;
use crate::core::controller::{ChatController, SubmitRejection};
use crate::core::message::Message;
use crate::core::turn::{TurnEvent, TurnRunner};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Message(String),
    Clear,
    /// `/personality` with no id lists the choices.
    Personality(Option<String>),
    Encrypt(bool),
    Status,
    Help,
    Quit,
    Unknown(String),
}

pub fn parse_chat_input(line: &str) -> ChatInput {
    let trimmed = line.trim();
    let Some(command) = trimmed.strip_prefix('/') else {
        return ChatInput::Message(line.to_string());
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default().to_ascii_lowercase();
    let arg = parts.next();

    match (name.as_str(), arg) {
        ("clear" | "new", _) => ChatInput::Clear,
        ("personality" | "p", id) => ChatInput::Personality(id.map(str::to_string)),
        ("personalities", _) => ChatInput::Personality(None),
        ("encrypt", Some(value)) => match parse_switch(value) {
            Some(on) => ChatInput::Encrypt(on),
            None => ChatInput::Unknown(trimmed.to_string()),
        },
        ("status", _) => ChatInput::Status,
        ("help" | "?", _) => ChatInput::Help,
        ("quit" | "exit" | "q", _) => ChatInput::Quit,
        _ => ChatInput::Unknown(trimmed.to_string()),
    }
}

/// The part of `snapshot` not yet printed, given that its first
/// `printed_len` bytes already were.
pub fn render_delta(printed_len: usize, snapshot: &str) -> Option<&str> {
    snapshot
        .get(printed_len..)
        .filter(|delta| !delta.is_empty())
}

/// Tracks what has been written for the reply in progress.
#[derive(Debug, Default)]
struct ReplyView {
    printed: String,
    started: bool,
}

impl ReplyView {
    fn write_snapshot(&mut self, label: &str, snapshot: &str) -> io::Result<()> {
        if !self.started {
            print!("{label}: ");
            self.started = true;
        }
        if let Some(delta) = render_delta(self.printed.len(), snapshot) {
            print!("{delta}");
            self.printed = snapshot.to_string();
        }
        io::stdout().flush()
    }

    fn finish(&mut self, label: &str, reply: &Message, failed: bool) -> io::Result<()> {
        if failed {
            if self.started {
                println!();
            }
            println!("❌ {}", reply.content);
        } else if self.started && reply.content.starts_with(&self.printed) {
            if let Some(delta) = render_delta(self.printed.len(), &reply.content) {
                print!("{delta}");
            }
            println!();
        } else {
            if self.started {
                println!();
            }
            println!("{label}: {}", reply.content);
        }
        *self = ReplyView::default();
        io::stdout().flush()
    }

    fn abandon(&mut self) {
        if self.started {
            println!();
        }
        *self = ReplyView::default();
    }
}

enum Flow {
    Continue,
    Quit,
}

pub async fn run_chat(
    personality: Option<String>,
    encrypted: bool,
    resume: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let context = ChatContext::load()?;
    let store = session_store(&context.config)?;
    let mut controller = ChatController::new(
        context.personalities.clone(),
        store,
        context.personality_or_default(personality.as_deref()),
        encrypted || context.config.starts_encrypted(),
    )?;

    if let Some(session_id) = resume {
        if !controller.restore(&session_id)? {
            return Err(format!("No saved session with id {session_id}").into());
        }
        if encrypted {
            controller.toggle_encrypted(true);
        }
    }

    print_status(&controller);
    for message in controller.conversation() {
        print_message(&controller, message);
    }
    println!("Type /help for commands.");

    let (runner, mut events) = TurnRunner::new(context.orchestrator.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut view = ReplyView::default();

    loop {
        if !stdin_open && !controller.is_awaiting_response() {
            break;
        }

        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                match line? {
                    Some(line) => {
                        let flow = handle_input(&mut controller, &runner, &mut view, parse_chat_input(&line))?;
                        if matches!(flow, Flow::Quit) {
                            break;
                        }
                    }
                    None => stdin_open = false,
                }
            }
            Some((event, generation)) = events.recv() => {
                let failed = matches!(event, TurnEvent::Failed(_));
                let terminal = event.is_terminal();
                if !controller.handle_event(generation, event) {
                    continue;
                }

                let label = controller.active_personality().display_name.clone();
                if terminal {
                    if let Some(reply) = controller.conversation().last() {
                        view.finish(&label, reply, failed)?;
                    }
                } else {
                    view.write_snapshot(&label, controller.current_text())?;
                }
            }
            else => break,
        }
    }

    Ok(())
}

fn handle_input(
    controller: &mut ChatController,
    runner: &TurnRunner,
    view: &mut ReplyView,
    input: ChatInput,
) -> Result<Flow, Box<dyn Error>> {
    match input {
        ChatInput::Message(text) => match controller.submit(&text) {
            Ok(ticket) => {
                runner.spawn_turn(ticket);
            }
            Err(SubmitRejection::Blank) => {}
            Err(SubmitRejection::Busy) => {
                eprintln!("⚠️  Still waiting for the previous response; message not sent.");
            }
        },
        ChatInput::Clear => {
            view.abandon();
            controller.clear();
            println!("Started a new conversation.");
        }
        ChatInput::Personality(None) => {
            let active = controller.active_personality().id.clone();
            for personality in controller.personalities().list() {
                let marker = if personality.id == active { "*" } else { " " };
                println!(
                    "{marker} {:<10} {} ({})",
                    personality.id, personality.description, personality.backend
                );
            }
        }
        ChatInput::Personality(Some(id)) => {
            let switched = controller.select_personality(&id);
            match switched {
                Ok(true) => {
                    view.abandon();
                    println!(
                        "Switched to {}. Started a new conversation.",
                        controller.active_personality().display_name
                    );
                }
                Ok(false) => println!(
                    "{} is already active.",
                    controller.active_personality().display_name
                ),
                Err(err) => eprintln!("❌ {err}"),
            }
        }
        ChatInput::Encrypt(on) => {
            controller.toggle_encrypted(on);
            if on {
                println!("🔒 Encrypted mode on: this conversation is not saved.");
            } else {
                println!("Encrypted mode off: this conversation is saved.");
            }
        }
        ChatInput::Status => print_status(controller),
        ChatInput::Help => print_help(),
        ChatInput::Quit => return Ok(Flow::Quit),
        ChatInput::Unknown(command) => {
            eprintln!("Unknown command: {command}. Type /help for commands.");
        }
    }
    Ok(Flow::Continue)
}

fn print_status(controller: &ChatController) {
    let personality = controller.active_personality();
    println!(
        "{} ({}) · session {}{}",
        personality.display_name,
        personality.backend,
        controller.session_id(),
        if controller.is_encrypted() {
            " · encrypted"
        } else {
            ""
        }
    );
}

fn print_message(controller: &ChatController, message: &Message) {
    if message.is_user() {
        println!("you: {}", message.content);
    } else {
        println!(
            "{}: {}",
            controller.active_personality().display_name,
            message.content
        );
    }
}

const HELP_LINES: &[(&str, &str)] = &[
    ("/personality, /p [id]", "Switch personality or list them"),
    ("/personalities", "List personalities"),
    ("/clear, /new", "Start a new conversation"),
    ("/encrypt on|off", "Stop or resume saving this conversation"),
    ("/status", "Show personality, session and mode"),
    ("/help, /?", "Show this help"),
    ("/quit, /exit, /q", "Exit"),
];

fn print_help() {
    println!("Commands:");
    for (usage, description) in HELP_LINES {
        println!("  {usage:<24} {description}");
    }
}
