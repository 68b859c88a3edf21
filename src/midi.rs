//! MIDI message model
//!
//! Messages are parsed once when drained from a port. Only the kinds the
//! trigger registry cares about get their own variant; everything else is
//! carried as raw bytes so it can still be forwarded untouched.

use std::fmt;

use crate::ports::PortRole;

/// MIDI message types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note On: channel (0-15), note (0-127), velocity (1-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Control Change: channel (0-15), cc (0-127), value (0-127)
    ControlChange { channel: u8, cc: u8, value: u8 },

    /// Anything else (pitch bend, sysex, clock, ...)
    Other { data: Vec<u8> },
}

impl MidiMessage {
    /// Parse a MIDI message from raw bytes
    pub fn parse(data: &[u8]) -> Option<Self> {
        let status = *data.first()?;

        // Running status needs state we do not keep
        if status < 0x80 {
            return None;
        }

        let channel = status & 0x0F;
        match status & 0xF0 {
            0x80 if data.len() >= 3 => Some(MidiMessage::NoteOff {
                channel,
                note: data[1] & 0x7F,
                velocity: data[2] & 0x7F,
            }),
            0x90 if data.len() >= 3 => {
                let note = data[1] & 0x7F;
                let velocity = data[2] & 0x7F;

                // Note On with velocity 0 is a Note Off
                if velocity == 0 {
                    Some(MidiMessage::NoteOff { channel, note, velocity: 0 })
                } else {
                    Some(MidiMessage::NoteOn { channel, note, velocity })
                }
            }
            0xB0 if data.len() >= 3 => Some(MidiMessage::ControlChange {
                channel,
                cc: data[1] & 0x7F,
                value: data[2] & 0x7F,
            }),
            0x80 | 0x90 | 0xB0 => None,
            _ => Some(MidiMessage::Other { data: data.to_vec() }),
        }
    }

    /// Encode the message to MIDI bytes
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOn { channel, note, velocity } => {
                vec![0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::NoteOff { channel, note, velocity } => {
                vec![0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                vec![0xB0 | (channel & 0x0F), cc & 0x7F, value & 0x7F]
            }
            MidiMessage::Other { ref data } => data.clone(),
        }
    }

    /// Note number for note messages
    pub fn note(&self) -> Option<u8> {
        match *self {
            MidiMessage::NoteOn { note, .. } | MidiMessage::NoteOff { note, .. } => Some(note),
            _ => None,
        }
    }

    /// Controller number for control changes
    pub fn control(&self) -> Option<u8> {
        match *self {
            MidiMessage::ControlChange { cc, .. } => Some(cc),
            _ => None,
        }
    }

    /// Velocity for notes, value for control changes
    pub fn secondary(&self) -> Option<u8> {
        match *self {
            MidiMessage::NoteOn { velocity, .. } | MidiMessage::NoteOff { velocity, .. } => {
                Some(velocity)
            }
            MidiMessage::ControlChange { value, .. } => Some(value),
            MidiMessage::Other { .. } => None,
        }
    }

    /// Get the channel for channel messages (0-15)
    pub fn channel(&self) -> Option<u8> {
        match *self {
            MidiMessage::NoteOn { channel, .. }
            | MidiMessage::NoteOff { channel, .. }
            | MidiMessage::ControlChange { channel, .. } => Some(channel),
            MidiMessage::Other { ref data } => match data.first() {
                Some(&status) if (0x80..0xF0).contains(&status) => Some(status & 0x0F),
                _ => None,
            },
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel + 1, cc, value)
            }
            MidiMessage::Other { ref data } => write!(f, "Other [{}]", format_hex(data)),
        }
    }
}

/// One message observed on an input port
///
/// `raw` is what gets forwarded; `message` is what triggers look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiEvent {
    pub message: MidiMessage,
    pub raw: Vec<u8>,
    pub source: PortRole,
}

impl MidiEvent {
    /// Build an event from raw bytes, `None` only for empty data
    ///
    /// Bytes that do not parse are kept as `Other` so they still forward.
    pub fn from_raw(data: &[u8], source: PortRole) -> Option<Self> {
        if data.is_empty() {
            return None;
        }
        let message = MidiMessage::parse(data).unwrap_or_else(|| MidiMessage::Other {
            data: data.to_vec(),
        });
        Some(Self {
            message,
            raw: data.to_vec(),
            source,
        })
    }

    /// Build an event from a typed message
    pub fn new(message: MidiMessage, source: PortRole) -> Self {
        let raw = message.encode();
        Self { message, raw, source }
    }
}

impl fmt::Display for MidiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.source, self.message)
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
