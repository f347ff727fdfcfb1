//! Inbound event dispatch.
//!
//! One handler per event name. Handlers are typed: the payload is parsed
//! before the handler runs, so a malformed message is rejected whole and the
//! state never sees a partially shaped record.

use std::collections::HashMap;

use arena_shared::net::Envelope;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::SyncError;

type Handler<S> = Box<dyn FnMut(&mut S, &Envelope) -> Result<(), SyncError> + Send>;

/// Routes named events to handlers that receive the state explicitly.
pub struct Dispatcher<S> {
    handlers: HashMap<String, Handler<S>>,
}

impl<S> Default for Dispatcher<S> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<S> Dispatcher<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for `event`. A second registration is rejected.
    pub fn on<T, F>(&mut self, event: &str, mut handler: F) -> Result<(), SyncError>
    where
        S: 'static,
        T: DeserializeOwned + 'static,
        F: FnMut(&mut S, T) -> Result<(), SyncError> + Send + 'static,
    {
        if self.handlers.contains_key(event) {
            return Err(SyncError::DuplicateHandler(event.to_string()));
        }
        self.handlers.insert(
            event.to_string(),
            Box::new(move |state: &mut S, env: &Envelope| {
                let payload = env
                    .decode::<T>()
                    .map_err(|source| SyncError::MalformedPayload {
                        event: env.event.clone(),
                        source,
                    })?;
                handler(state, payload)
            }),
        );
        Ok(())
    }

    /// Runs the handler registered for the envelope's event.
    ///
    /// Returns `Ok(false)` when nothing is registered for it.
    pub fn dispatch(&mut self, state: &mut S, env: &Envelope) -> Result<bool, SyncError> {
        match self.handlers.get_mut(&env.event) {
            Some(handler) => handler(state, env).map(|()| true),
            None => {
                debug!(event = %env.event, "No handler for event");
                Ok(false)
            }
        }
    }

    pub fn handles(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }
}
