//! Port resolution
//!
//! The OS appends disambiguating suffixes to port names ("Launchpad MK2 1",
//! "Launchpad MK2 MIDI 1", ...), so endpoints are configured by prefix and
//! resolved against a fresh port listing each time a session opens.

use std::fmt;

use tracing::debug;

use crate::config::MidiConfig;
use crate::error::MirrorError;

/// Logical endpoint of a mirror session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortRole {
    PhysicalIn,
    PhysicalOut,
    VirtualIn,
    VirtualOut,
}

impl PortRole {
    pub const ALL: [PortRole; 4] = [
        PortRole::PhysicalIn,
        PortRole::PhysicalOut,
        PortRole::VirtualIn,
        PortRole::VirtualOut,
    ];

    pub fn is_input(self) -> bool {
        matches!(self, PortRole::PhysicalIn | PortRole::VirtualIn)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PortRole::PhysicalIn => "physical-in",
            PortRole::PhysicalOut => "physical-out",
            PortRole::VirtualIn => "virtual-in",
            PortRole::VirtualOut => "virtual-out",
        }
    }
}

impl fmt::Display for PortRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configured name prefix for each logical endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortPrefixes {
    pub physical: String,
    pub from_daw: String,
    pub to_daw: String,
}

impl PortPrefixes {
    /// Prefix used to resolve a given role
    ///
    /// The physical device exposes one input and one output under the same
    /// name; the DAW side uses two distinct virtual ports.
    pub fn for_role(&self, role: PortRole) -> &str {
        match role {
            PortRole::PhysicalIn | PortRole::PhysicalOut => &self.physical,
            PortRole::VirtualIn => &self.from_daw,
            PortRole::VirtualOut => &self.to_daw,
        }
    }
}

impl From<&MidiConfig> for PortPrefixes {
    fn from(config: &MidiConfig) -> Self {
        Self {
            physical: config.physical.clone(),
            from_daw: config.from_daw.clone(),
            to_daw: config.to_daw.clone(),
        }
    }
}

/// Return the first available port name starting with `prefix`
pub fn resolve_port(
    role: PortRole,
    prefix: &str,
    available: &[String],
) -> Result<String, MirrorError> {
    match available.iter().find(|name| name.starts_with(prefix)) {
        Some(name) => {
            debug!("Resolved {} '{}' -> '{}'", role, prefix, name);
            Ok(name.clone())
        }
        None => Err(MirrorError::PortNotFound {
            role,
            prefix: prefix.to_string(),
        }),
    }
}
