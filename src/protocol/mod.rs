//! # Protocol Layer
//!
//! Message framing and command handling on top of a [`Transport`](crate::transport::Transport).
//!
//! ## Components
//! - **Framer**: fragmentation into header-prefixed packets and reassembly
//! - **Dispatcher**: name-keyed routing of commands to handlers
//! - **Command**: envelope parsing, authentication, and the built-in commands
//!
//! ## Flow
//! ```text
//! ground envelope (JSON) -> PacketManager::send -> radio packets
//! radio packets -> PacketManager::listen -> CommandDataHandler -> Dispatcher
//! ```

pub mod command;
pub mod dispatcher;
pub mod framer;

#[cfg(test)]
mod tests;
