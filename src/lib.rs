//! Obsidian is a terminal chat client that streams replies from
//! interchangeable AI backends, chosen per message by the active personality.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the stream decoder, backend adapters, completion routing,
//!   session persistence, and the chat controller's turn state machine.
//! - [`cli`] parses arguments and runs the interactive chat loop and the
//!   one-shot commands.
//! - [`api`] defines the request payloads sent to each provider family.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod logging;
pub mod utils;
