//! Callback registry
//!
//! Maps trigger keys to handlers. Owned by a mirror session, not global, so
//! two sessions in one process never see each other's triggers.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::MirrorError;
use crate::midi::{MidiEvent, MidiMessage};

/// What a trigger listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerSource {
    Note(u8),
    Control(u8),
}

/// Trigger number plus an optional required velocity/value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerKey {
    pub source: TriggerSource,
    pub qualifier: Option<u8>,
}

impl TriggerKey {
    pub fn note(note: u8, velocity: Option<u8>) -> Self {
        Self {
            source: TriggerSource::Note(note),
            qualifier: velocity,
        }
    }

    pub fn control(control: u8, value: Option<u8>) -> Self {
        Self {
            source: TriggerSource::Control(control),
            qualifier: value,
        }
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.source, self.qualifier) {
            (TriggerSource::Note(n), Some(v)) => write!(f, "note {} @ velocity {}", n, v),
            (TriggerSource::Note(n), None) => write!(f, "note {}", n),
            (TriggerSource::Control(c), Some(v)) => write!(f, "cc {} @ value {}", c, v),
            (TriggerSource::Control(c), None) => write!(f, "cc {}", c),
        }
    }
}

/// Something to run when a trigger matches
///
/// Handlers run inline in the mirror loop; forwarding of later events waits
/// until `handle` returns.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, event: &MidiEvent) -> Result<()>;
}

/// Adapter for plain closures
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(&MidiEvent) -> Result<()> + Send + Sync,
{
    async fn handle(&self, event: &MidiEvent) -> Result<()> {
        (self.0)(event)
    }
}

/// Result of dispatching one event
#[derive(Debug)]
pub enum Dispatch {
    /// No handler matched
    Unmatched,
    /// The handler for `key` ran and succeeded
    Handled(TriggerKey),
    /// The handler ran and failed; the failure has been logged
    Failed(MirrorError),
}

/// Trigger key -> handler table, safe to read while registering
#[derive(Default)]
pub struct CallbackRegistry {
    handlers: RwLock<HashMap<TriggerKey, Arc<dyn Handler>>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the handler for `key`, replacing any previous one
    pub fn register(&self, key: TriggerKey, handler: Arc<dyn Handler>) {
        if self.handlers.write().insert(key, handler).is_some() {
            info!("Replaced callback for {}", key);
        } else {
            info!("Callback added for {}", key);
        }
    }

    /// Remove the handler for `key`
    pub fn unregister(&self, key: &TriggerKey) -> bool {
        self.handlers.write().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Find the handler for an event
    ///
    /// Note keys fire on presses only; a release (note-off, or note-on with
    /// velocity 0) never matches, so one press runs a handler once. Notes are
    /// looked up before control numbers. Within a kind, a key with a qualifier
    /// equal to the event's velocity/value beats an unqualified key.
    pub fn lookup(&self, message: &MidiMessage) -> Option<(TriggerKey, Arc<dyn Handler>)> {
        let secondary = message.secondary();
        let pressed = match *message {
            MidiMessage::NoteOn { note, .. } => Some(TriggerSource::Note(note)),
            _ => None,
        };
        let candidates = pressed
            .into_iter()
            .chain(message.control().map(TriggerSource::Control));

        let handlers = self.handlers.read();
        for source in candidates {
            let qualified = secondary.map(|v| TriggerKey {
                source,
                qualifier: Some(v),
            });
            let keys = qualified.into_iter().chain(std::iter::once(TriggerKey {
                source,
                qualifier: None,
            }));
            for key in keys {
                if let Some(handler) = handlers.get(&key) {
                    return Some((key, Arc::clone(handler)));
                }
            }
        }
        None
    }

    /// Run at most one matching handler for `event`
    ///
    /// Handler failures are logged and reported, never propagated.
    pub async fn dispatch(&self, event: &MidiEvent) -> Dispatch {
        // Clone the handler out so the lock is not held across the await
        let Some((key, handler)) = self.lookup(&event.message) else {
            return Dispatch::Unmatched;
        };

        debug!("Executing callback for {} ({})", key, event);
        match handler.handle(event).await {
            Ok(()) => Dispatch::Handled(key),
            Err(source) => {
                let err = MirrorError::CallbackFailure { key, source };
                warn!("{:#}", err);
                Dispatch::Failed(err)
            }
        }
    }
}
