//! midir-backed ports
//!
//! midir hands incoming messages to a callback on its own thread. The
//! callback pushes them into a bounded channel that the mirror loop drains
//! with `try_recv`, so polling never blocks.

use anyhow::{anyhow, Context, Result};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{InputPort, MidiBackend, OutputPort};
use crate::midi::format_hex;

/// Messages buffered per input port between two drains
const INPUT_QUEUE_DEPTH: usize = 1024;

/// Opens system MIDI ports through midir
pub struct MidirBackend {
    client_name: String,
}

impl MidirBackend {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }

    fn midi_in(&self, suffix: &str) -> Result<MidiInput> {
        MidiInput::new(&format!("{}-{}", self.client_name, suffix))
            .context("Failed to create MIDI input")
    }

    fn midi_out(&self, suffix: &str) -> Result<MidiOutput> {
        MidiOutput::new(&format!("{}-{}", self.client_name, suffix))
            .context("Failed to create MIDI output")
    }
}

impl MidiBackend for MidirBackend {
    fn input_names(&self) -> Result<Vec<String>> {
        let midi_in = self.midi_in("Scanner")?;
        Ok(midi_in
            .ports()
            .iter()
            .filter_map(|port| midi_in.port_name(port).ok())
            .collect())
    }

    fn output_names(&self) -> Result<Vec<String>> {
        let midi_out = self.midi_out("Scanner")?;
        Ok(midi_out
            .ports()
            .iter()
            .filter_map(|port| midi_out.port_name(port).ok())
            .collect())
    }

    fn open_input(&mut self, name: &str) -> Result<Box<dyn InputPort>> {
        let mut midi_in = self.midi_in("In")?;
        // Launchpads talk SysEx; keep everything
        midi_in.ignore(Ignore::None);

        let port = midi_in
            .ports()
            .into_iter()
            .find(|p| midi_in.port_name(p).map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| anyhow!("Input port '{}' disappeared", name))?;

        let (tx, rx) = mpsc::channel(INPUT_QUEUE_DEPTH);
        let port_name = name.to_string();
        let conn = midi_in
            .connect(
                &port,
                &self.client_name,
                move |_timestamp, data, _| {
                    // Never block midir's thread; a full queue drops the message
                    if tx.try_send(data.to_vec()).is_err() {
                        warn!("Input queue full on '{}', dropped {}", port_name, format_hex(data));
                    }
                },
                (),
            )
            .map_err(|e| anyhow!("{}", e))?;

        debug!("MIDI IN connected: '{}'", name);
        Ok(Box::new(MidirInput {
            name: name.to_string(),
            _conn: conn,
            rx,
        }))
    }

    fn open_output(&mut self, name: &str) -> Result<Box<dyn OutputPort>> {
        let midi_out = self.midi_out("Out")?;

        let port = midi_out
            .ports()
            .into_iter()
            .find(|p| midi_out.port_name(p).map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| anyhow!("Output port '{}' disappeared", name))?;

        let conn = midi_out
            .connect(&port, &self.client_name)
            .map_err(|e| anyhow!("{}", e))?;

        debug!("MIDI OUT connected: '{}'", name);
        Ok(Box::new(MidirOutput {
            name: name.to_string(),
            conn,
        }))
    }
}

struct MidirInput {
    name: String,
    // Dropping the connection closes the port
    _conn: MidiInputConnection<()>,
    rx: mpsc::Receiver<Vec<u8>>,
}

impl InputPort for MidirInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }
}

struct MidirOutput {
    name: String,
    conn: MidiOutputConnection,
}

impl OutputPort for MidirOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.conn
            .send(data)
            .map_err(|e| anyhow!("MIDI send failed: {}", e))
    }
}
