//! Transport session
//!
//! Owns the four ports of a mirror session. Each port is opened on its own so
//! one missing cable only disables the direction that needs it.

pub mod midir_backend;

#[cfg(test)]
pub(crate) mod memory;

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, trace, warn};

use crate::error::MirrorError;
use crate::midi::{format_hex, MidiEvent};
use crate::ports::{resolve_port, PortPrefixes, PortRole};

pub use midir_backend::MidirBackend;

/// An open input port that can be polled without blocking
pub trait InputPort: Send {
    fn name(&self) -> &str;

    /// Next queued message, `None` when nothing is pending
    fn try_recv(&mut self) -> Option<Vec<u8>>;
}

/// An open output port
pub trait OutputPort: Send {
    fn name(&self) -> &str;

    fn send(&mut self, data: &[u8]) -> Result<()>;
}

/// Port enumeration and opening
pub trait MidiBackend {
    fn input_names(&self) -> Result<Vec<String>>;
    fn output_names(&self) -> Result<Vec<String>>;
    fn open_input(&mut self, name: &str) -> Result<Box<dyn InputPort>>;
    fn open_output(&mut self, name: &str) -> Result<Box<dyn OutputPort>>;
}

/// Which ports came up when a session opened
#[derive(Debug, Default)]
pub struct OpenReport {
    pub opened: Vec<(PortRole, String)>,
    pub failures: Vec<MirrorError>,
}

impl OpenReport {
    pub fn is_open(&self, role: PortRole) -> bool {
        self.opened.iter().any(|(r, _)| *r == role)
    }

    /// Whether both ends of `input -> output` are open
    pub fn direction_active(&self, input: PortRole, output: PortRole) -> bool {
        self.is_open(input) && self.is_open(output)
    }
}

/// The open ports of one mirror session
pub struct TransportSession {
    inputs: HashMap<PortRole, Box<dyn InputPort>>,
    outputs: HashMap<PortRole, Box<dyn OutputPort>>,
    warned_missing: HashSet<PortRole>,
    closed: bool,
}

impl TransportSession {
    /// Resolve and open all four endpoints
    ///
    /// Never fails as a whole; per-endpoint failures are listed in the report.
    pub fn open(backend: &mut dyn MidiBackend, prefixes: &PortPrefixes) -> (Self, OpenReport) {
        let mut session = Self {
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            warned_missing: HashSet::new(),
            closed: false,
        };
        let mut report = OpenReport::default();

        // Port lists are fetched fresh for every open
        let input_names = backend.input_names();
        let output_names = backend.output_names();

        for role in PortRole::ALL {
            let names = if role.is_input() { &input_names } else { &output_names };
            let names = match names {
                Ok(names) => names,
                Err(e) => {
                    report.failures.push(MirrorError::Backend(format!("{:#}", e)));
                    continue;
                }
            };

            let prefix = prefixes.for_role(role);
            let name = match resolve_port(role, prefix, names) {
                Ok(name) => name,
                Err(e) => {
                    warn!("{} - {} direction disabled", e, role);
                    report.failures.push(e);
                    continue;
                }
            };

            let opened = if role.is_input() {
                backend.open_input(&name).map(|port| {
                    session.inputs.insert(role, port);
                })
            } else {
                backend.open_output(&name).map(|port| {
                    session.outputs.insert(role, port);
                })
            };

            match opened {
                Ok(()) => {
                    info!("Opened {} port: {}", role, name);
                    report.opened.push((role, name));
                }
                Err(e) => {
                    let err = MirrorError::PortOpen {
                        role,
                        name,
                        reason: format!("{:#}", e),
                    };
                    warn!("{}", err);
                    report.failures.push(err);
                }
            }
        }

        (session, report)
    }

    pub fn is_open(&self, role: PortRole) -> bool {
        self.inputs.contains_key(&role) || self.outputs.contains_key(&role)
    }

    /// Everything currently queued on `role`, without waiting
    ///
    /// Yields nothing for an output role or a port that never opened.
    pub fn drain_pending(&mut self, role: PortRole) -> impl Iterator<Item = MidiEvent> + '_ {
        let mut port = self.inputs.get_mut(&role);
        std::iter::from_fn(move || {
            let port = port.as_mut()?;
            loop {
                let data = port.try_recv()?;
                if let Some(event) = MidiEvent::from_raw(&data, role) {
                    return Some(event);
                }
            }
        })
    }

    /// Throw away anything already queued on the input ports
    pub fn flush_inputs(&mut self) -> usize {
        let mut dropped = 0;
        for role in [PortRole::PhysicalIn, PortRole::VirtualIn] {
            dropped += self.drain_pending(role).count();
        }
        if dropped > 0 {
            debug!("Flushed {} stale input messages", dropped);
        }
        dropped
    }

    /// Write one event to `role`, best effort
    ///
    /// A port that never opened is a no-op, warned about once.
    pub fn send(&mut self, role: PortRole, event: &MidiEvent) {
        let Some(port) = self.outputs.get_mut(&role) else {
            if self.warned_missing.insert(role) {
                warn!("{} port is not open, dropping output for it", role);
            } else {
                trace!("Dropped {} for closed {} port", event, role);
            }
            return;
        };

        match port.send(&event.raw) {
            Ok(()) => trace!("TX -> {}: {}", port.name(), format_hex(&event.raw)),
            Err(e) => warn!("Send to {} failed: {:#}", port.name(), e),
        }
    }

    /// Release every port
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.inputs.clear();
        self.outputs.clear();
        debug!("Transport session closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        self.close();
    }
}
