//! Command and data handling.
//!
//! Ground commands arrive as JSON envelopes over the packet framer:
//!
//! ```json
//! {"password": "<shared secret>", "name": "<satellite>", "command": "send_joke", "args": []}
//! ```
//!
//! An envelope with the wrong password or name is dropped without a reply so
//! an eavesdropper cannot tell it was heard. Every authenticated command is
//! acknowledged with `ACK` before it runs. Parse failures, missing commands
//! and unknown commands are answered with a human-readable text packet.

use crate::config::SatelliteConfig;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::framer::PacketManager;
use crate::transport::Transport;
use crate::utils::metrics::global_metrics;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::borrow::Cow;
use std::error::Error as StdError;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

pub const COMMAND_RESET: &str = "reset";
pub const COMMAND_CHANGE_RADIO_MODULATION: &str = "change_radio_modulation";
pub const COMMAND_SEND_JOKE: &str = "send_joke";

/// Characters of an error chain sent back to the ground
pub const ERROR_REPORT_LIMIT: usize = 200;

/// Restarts the flight computer into its normal run mode.
///
/// On hardware `reset` does not return; test and ground implementations
/// record the request instead.
pub trait ResetController {
    fn reset(&mut self);
}

/// Outbound command envelope, as built by a ground station
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub password: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl CommandEnvelope {
    pub fn new(
        password: impl Into<String>,
        name: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            password: password.into(),
            name: name.into(),
            command: Some(command.into()),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Serialize to the JSON bytes sent over the air
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Inbound command message.
///
/// Kept as raw JSON so envelopes with wrongly typed fields are judged by the
/// authentication rules rather than rejected by a parser.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandMessage {
    raw: JsonValue,
}

impl CommandMessage {
    /// Parse UTF-8 JSON that must hold an object
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data).map_err(|e| {
            ProtocolError::InvalidCommand(format!("{}: {e}", constants::ERR_NOT_UTF8))
        })?;
        let raw: JsonValue = serde_json::from_str(text)?;
        if !raw.is_object() {
            return Err(ProtocolError::InvalidCommand(
                constants::ERR_NOT_OBJECT.to_string(),
            ));
        }
        Ok(Self { raw })
    }

    fn text_field(&self, field: &str) -> Option<&str> {
        self.raw.get(field).and_then(JsonValue::as_str)
    }

    pub fn password(&self) -> Option<&str> {
        self.text_field("password")
    }

    pub fn name(&self) -> Option<&str> {
        self.text_field("name")
    }

    /// Command name; `None` only when the field is absent or null.
    /// Other non-string values are rendered as JSON text.
    pub fn command(&self) -> Option<String> {
        match self.raw.get("command")? {
            JsonValue::Null => None,
            value => Some(json_text(value)),
        }
    }

    /// Arguments in order, non-strings rendered as JSON text.
    /// Anything other than a list counts as no arguments.
    pub fn args(&self) -> Vec<String> {
        self.raw
            .get("args")
            .and_then(JsonValue::as_array)
            .map(|items| items.iter().map(json_text).collect())
            .unwrap_or_default()
    }

    pub fn raw(&self) -> &JsonValue {
        &self.raw
    }
}

/// What became of one received message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Wrong password or name; nothing was sent
    Rejected,
    /// Authenticated but carried no command
    MissingCommand,
    /// A handler ran
    Dispatched(String),
    /// No handler is registered for the command
    Unknown(String),
    /// Parsing or a handler failed; the error was reported to the ground
    Failed(String),
}

/// State a command handler may act on
pub struct CommandContext<'a, T: Transport> {
    pub packet_manager: &'a mut PacketManager<T>,
    pub config: &'a mut SatelliteConfig,
    pub rng: &'a mut StdRng,
    pub reset: &'a mut dyn ResetController,
}

/// Listens for, authenticates and executes ground commands
pub struct CommandDataHandler<T: Transport> {
    packet_manager: PacketManager<T>,
    config: SatelliteConfig,
    reset: Box<dyn ResetController>,
    rng: StdRng,
    dispatcher: Dispatcher<T>,
}

impl<T: Transport + 'static> CommandDataHandler<T> {
    pub fn new(
        packet_manager: PacketManager<T>,
        config: SatelliteConfig,
        reset: impl ResetController + 'static,
    ) -> Self {
        Self::with_rng(packet_manager, config, reset, StdRng::from_os_rng())
    }

    /// Create a handler with a caller-supplied RNG, e.g. a seeded one in tests
    pub fn with_rng(
        packet_manager: PacketManager<T>,
        config: SatelliteConfig,
        reset: impl ResetController + 'static,
        rng: StdRng,
    ) -> Self {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(COMMAND_RESET, reset_satellite::<T>);
        dispatcher.register(COMMAND_CHANGE_RADIO_MODULATION, change_radio_modulation::<T>);
        dispatcher.register(COMMAND_SEND_JOKE, send_joke::<T>);

        Self {
            packet_manager,
            config,
            reset: Box::new(reset),
            rng,
            dispatcher,
        }
    }

    /// Add or replace a command handler
    pub fn register_command<F>(&mut self, command: impl Into<Cow<'static, str>>, handler: F)
    where
        F: Fn(&mut CommandContext<'_, T>, &[String]) -> Result<()> + 'static,
    {
        self.dispatcher.register(command, handler);
    }

    pub fn packet_manager(&self) -> &PacketManager<T> {
        &self.packet_manager
    }

    pub fn packet_manager_mut(&mut self) -> &mut PacketManager<T> {
        &mut self.packet_manager
    }

    pub fn config(&self) -> &SatelliteConfig {
        &self.config
    }

    /// Listen for one command message and handle it.
    ///
    /// Returns `None` when nothing arrived. No error escapes: failures are
    /// logged and reported to the ground as text.
    #[instrument(skip(self))]
    pub fn listen_for_commands(&mut self, timeout: Option<Duration>) -> Option<CommandOutcome> {
        let timeout = timeout.unwrap_or(self.config.command.listen_timeout);
        debug!(timeout_ms = timeout.as_millis() as u64, "Listening for commands...");

        let data = self.packet_manager.listen(Some(timeout))?;

        match self.process_message(&data) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                global_metrics().command_error();
                error!(error = %e, "Failed to process command message");
                let report = format_error_report(&e);
                self.packet_manager
                    .send(format!("Failed to process command message: {report}").as_bytes());
                Some(CommandOutcome::Failed(report))
            }
        }
    }

    /// Authenticate and execute one reassembled message
    pub fn process_message(&mut self, data: &[u8]) -> Result<CommandOutcome> {
        let metrics = global_metrics();
        metrics.command_received();

        let message = CommandMessage::parse(data)?;

        if message.password() != Some(self.config.super_secret_code.as_str()) {
            debug!("Invalid password in message");
            metrics.command_rejected();
            return Ok(CommandOutcome::Rejected);
        }

        if message.name() != Some(self.config.cubesat_name.as_str()) {
            debug!(name = ?message.name(), "Satellite name mismatch in message");
            metrics.command_rejected();
            return Ok(CommandOutcome::Rejected);
        }

        let Some(command) = message.command() else {
            warn!(message = %message.raw(), "No command found in message");
            self.packet_manager
                .send(format!("No command found in message: {}", message.raw()).as_bytes());
            return Ok(CommandOutcome::MissingCommand);
        };
        let args = message.args();
        debug!(command = %command, ?args, "Received command message");

        // Give the ground station time to switch to receive
        if !self.config.command.ack_delay.is_zero() {
            thread::sleep(self.config.command.ack_delay);
        }
        self.packet_manager.send_acknowledgement();

        let mut ctx = CommandContext {
            packet_manager: &mut self.packet_manager,
            config: &mut self.config,
            rng: &mut self.rng,
            reset: &mut *self.reset,
        };

        match self.dispatcher.dispatch(&command, &mut ctx, &args) {
            Ok(()) => {
                metrics.command_dispatched();
                Ok(CommandOutcome::Dispatched(command))
            }
            Err(ProtocolError::UnknownCommand(command)) => {
                warn!(command = %command, "Unknown command received");
                self.packet_manager
                    .send(format!("Unknown command received: {command}").as_bytes());
                Ok(CommandOutcome::Unknown(command))
            }
            Err(e) => Err(e),
        }
    }
}

fn json_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Flatten an error and its sources into one line, cut to
/// [`ERROR_REPORT_LIMIT`] characters so the reply stays a few packets long.
pub fn format_error_report(err: &(dyn StdError + 'static)) -> String {
    let mut report = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        // thiserror's #[from] variants already print their source
        if !report.ends_with(&cause_text) {
            report.push_str(": ");
            report.push_str(&cause_text);
        }
        source = cause.source();
    }

    if let Some((cut, _)) = report.char_indices().nth(ERROR_REPORT_LIMIT) {
        report.truncate(cut);
    }
    report
}

fn reset_satellite<T: Transport>(ctx: &mut CommandContext<'_, T>, _args: &[String]) -> Result<()> {
    info!("Resetting satellite");
    ctx.packet_manager.send(b"Resetting satellite");
    ctx.reset.reset();
    Ok(())
}

fn change_radio_modulation<T: Transport>(
    ctx: &mut CommandContext<'_, T>,
    args: &[String],
) -> Result<()> {
    let Some(modulation) = args.first() else {
        warn!("No modulation specified");
        ctx.packet_manager
            .send(b"No modulation specified. Please provide a modulation type.");
        return Ok(());
    };

    let temporary = !ctx.config.command.persist_updates;
    match ctx.config.update_config(
        "modulation",
        JsonValue::String(modulation.clone()),
        temporary,
    ) {
        Ok(()) => {
            info!(modulation = %modulation, "Radio modulation changed");
            ctx.packet_manager
                .send(format!("Radio modulation changed: {modulation}").as_bytes());
        }
        Err(e) => {
            error!(error = %e, "Failed to change radio modulation");
            ctx.packet_manager
                .send(format!("Failed to change radio modulation: {e}").as_bytes());
        }
    }
    Ok(())
}

fn send_joke<T: Transport>(ctx: &mut CommandContext<'_, T>, _args: &[String]) -> Result<()> {
    match ctx.config.jokes.choose(&mut *ctx.rng) {
        Some(joke) => {
            info!(joke = %joke, "Sending joke");
            ctx.packet_manager.send(joke.as_bytes());
        }
        None => warn!("No jokes configured"),
    }
    Ok(())
}
