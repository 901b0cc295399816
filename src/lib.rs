//! Code Relay — delivers Gmail verification codes to Telegram.

pub mod config;
pub mod error;
pub mod extract;
pub mod gmail;
pub mod http;
pub mod poller;
pub mod scheduler;
pub mod store;
pub mod telegram;
