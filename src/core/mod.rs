pub mod backends;
pub mod chat_stream;
pub mod config;
pub mod controller;
pub mod credentials;
pub mod error;
pub mod keyring;
pub mod message;
pub mod orchestrator;
pub mod personality;
pub mod session_store;
pub mod turn;
