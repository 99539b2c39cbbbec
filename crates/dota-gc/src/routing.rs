//! Message routing: dispatch inbound GC messages to type-specific handlers.
//!
//! The [`HandlerRegistry`] maps message-type tags to [`GcHandler`]
//! implementations. Domain modules register into it during startup; the
//! registry is then moved into the client and never mutated again. A handler
//! that fails or panics is contained here and reported as a
//! [`RouteOutcome::Failed`].

use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::cache::SessionCaches;
use crate::correlator::{GcSender, PendingCallback};
use crate::error::{HandlerError, RegistryError, RequestError};
use crate::messages::is_reserved;

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Context provided to every message handler.
pub struct HandlerContext<'a> {
    /// Type of the message being handled.
    pub msg_type: u32,
    /// Session caches the handler may update.
    pub caches: &'a mut SessionCaches,
    ready: bool,
    sender: &'a GcSender,
}

impl<'a> HandlerContext<'a> {
    pub(crate) fn new(
        msg_type: u32,
        caches: &'a mut SessionCaches,
        ready: bool,
        sender: &'a GcSender,
    ) -> Self {
        Self {
            msg_type,
            caches,
            ready,
            sender,
        }
    }

    /// Whether the GC session is established.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Send a follow-up message to the GC.
    pub fn send_to_gc(&self, msg_type: u32, payload: Vec<u8>) -> Result<(), RequestError> {
        self.sender.send(self.ready, msg_type, payload)
    }

    /// Send a follow-up request whose reply goes to `pending`.
    pub fn request<T: 'static>(
        &self,
        msg_type: u32,
        payload: Vec<u8>,
        pending: PendingCallback<T>,
    ) -> Result<(), RequestError> {
        self.sender.request(self.ready, msg_type, payload, pending)
    }
}

/// Trait for message handlers. Implemented for closures.
pub trait GcHandler: Send + Sync {
    /// Process one inbound payload.
    fn handle(&self, ctx: &mut HandlerContext<'_>, payload: &[u8]) -> Result<(), HandlerError>;
}

/// Blanket implementation for closures.
impl<F> GcHandler for F
where
    F: Fn(&mut HandlerContext<'_>, &[u8]) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, ctx: &mut HandlerContext<'_>, payload: &[u8]) -> Result<(), HandlerError> {
        self(ctx, payload)
    }
}

/// Run `handler`, turning errors and panics into a message.
pub(crate) fn invoke_guarded(
    handler: &dyn GcHandler,
    ctx: &mut HandlerContext<'_>,
    payload: &[u8],
) -> Result<(), String> {
    match catch_unwind(AssertUnwindSafe(|| handler.handle(ctx, payload))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => Err(panic_message(panic.as_ref())),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("handler panicked: {s}")
    } else {
        "handler panicked".to_string()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// What happened to a routed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A handler ran to completion.
    Handled,
    /// A handler ran and failed.
    Failed(String),
    /// No handler is registered for the type.
    Unhandled,
}

/// Maps message types to handlers. Built once, before the client exists.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<u32, Box<dyn GcHandler>>,
    welcome_hook: Option<Box<dyn GcHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `msg_type`. The last registration wins.
    ///
    /// Welcome and connection-status messages belong to the session core
    /// and are refused.
    pub fn register<H: GcHandler + 'static>(
        &mut self,
        msg_type: u32,
        handler: H,
    ) -> Result<(), RegistryError> {
        if is_reserved(msg_type) {
            return Err(RegistryError::Reserved(msg_type));
        }
        if self.handlers.insert(msg_type, Box::new(handler)).is_some() {
            tracing::debug!(msg_type, "Replaced existing handler");
        }
        Ok(())
    }

    /// Install the collaborator that unpacks the caches bundled in a welcome.
    pub fn set_welcome_hook<H: GcHandler + 'static>(&mut self, handler: H) {
        self.welcome_hook = Some(Box::new(handler));
    }

    /// Whether a handler is registered for `msg_type`.
    pub fn contains(&self, msg_type: u32) -> bool {
        self.handlers.contains_key(&msg_type)
    }

    /// Return an iterator over registered types (useful for startup logging).
    pub fn registered_types(&self) -> impl Iterator<Item = u32> + '_ {
        self.handlers.keys().copied()
    }

    pub(crate) fn welcome_hook(&self) -> Option<&dyn GcHandler> {
        self.welcome_hook.as_deref()
    }

    /// Route one payload to its handler.
    pub fn route(&self, ctx: &mut HandlerContext<'_>, payload: &[u8]) -> RouteOutcome {
        let Some(handler) = self.handlers.get(&ctx.msg_type) else {
            return RouteOutcome::Unhandled;
        };
        match invoke_guarded(handler.as_ref(), ctx, payload) {
            Ok(()) => RouteOutcome::Handled,
            Err(e) => RouteOutcome::Failed(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
