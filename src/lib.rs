//! Launch Mirror
//!
//! Mirrors MIDI between a physical grid controller and a pair of DAW virtual
//! ports, and fires remote-control actions (clip duplication, tempo) from
//! chosen pads.

pub mod actions;
pub mod cli;
pub mod config;
pub mod error;
pub mod midi;
pub mod mirror;
pub mod ports;
pub mod registry;
pub mod remote;
pub mod transport;
pub mod workflow;

pub use error::{MirrorError, RemoteError};
