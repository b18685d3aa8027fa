use crate::error::{ProtocolError, Result};
use crate::protocol::command::CommandContext;
use crate::transport::Transport;
use std::borrow::Cow;
use std::collections::HashMap;

type HandlerFn<T> = dyn Fn(&mut CommandContext<'_, T>, &[String]) -> Result<()>;

/// Command router keyed by command name.
/// Uses Cow<'static, str> so built-in commands register without allocating.
///
/// Owned by a single command handler, so no interior locking is needed.
pub struct Dispatcher<T: Transport> {
    handlers: HashMap<Cow<'static, str>, Box<HandlerFn<T>>>,
}

impl<T: Transport> Default for Dispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> Dispatcher<T> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` for `command`, replacing any previous handler
    pub fn register<F>(&mut self, command: impl Into<Cow<'static, str>>, handler: F)
    where
        F: Fn(&mut CommandContext<'_, T>, &[String]) -> Result<()> + 'static,
    {
        self.handlers.insert(command.into(), Box::new(handler));
    }

    pub fn contains(&self, command: &str) -> bool {
        self.handlers.contains_key(command)
    }

    /// Registered command names, in no particular order
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(|name| name.as_ref())
    }

    /// Run the handler for `command`; `UnknownCommand` if none is registered
    pub fn dispatch(
        &self,
        command: &str,
        ctx: &mut CommandContext<'_, T>,
        args: &[String],
    ) -> Result<()> {
        self.handlers
            .get(command)
            .ok_or_else(|| ProtocolError::UnknownCommand(command.to_string()))
            .and_then(|handler| handler(ctx, args))
    }
}
