//! In-memory MIDI backend for tests

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::{InputPort, MidiBackend, OutputPort};

/// Test-side handle that queues messages on an input port
#[derive(Clone, Default)]
pub struct Feed(Arc<Mutex<VecDeque<Vec<u8>>>>);

impl Feed {
    pub fn push(&self, data: &[u8]) {
        self.0.lock().push_back(data.to_vec());
    }
}

/// Test-side handle that records what an output port sent
#[derive(Clone, Default)]
pub struct Sink(Arc<Mutex<Vec<Vec<u8>>>>);

impl Sink {
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.0.lock().clone()
    }
}

pub struct MemoryBackend {
    inputs: Vec<String>,
    outputs: Vec<String>,
    feeds: HashMap<String, Feed>,
    sinks: HashMap<String, Sink>,
    failing: HashSet<String>,
}

impl MemoryBackend {
    pub fn new(inputs: &[&str], outputs: &[&str]) -> Self {
        Self {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            feeds: HashMap::new(),
            sinks: HashMap::new(),
            failing: HashSet::new(),
        }
    }

    /// A Launchpad plus the two loopMIDI-style virtual ports
    pub fn launchpad() -> Self {
        Self::new(
            &["Launchpad MK2 1", "Launchpad_VIn"],
            &["Launchpad MK2 1", "Launchpad_VOut"],
        )
    }

    pub fn feed(&mut self, name: &str) -> Feed {
        self.feeds.entry(name.to_string()).or_default().clone()
    }

    pub fn sink(&mut self, name: &str) -> Sink {
        self.sinks.entry(name.to_string()).or_default().clone()
    }

    pub fn fail_open(&mut self, name: &str) {
        self.failing.insert(name.to_string());
    }
}

impl MidiBackend for MemoryBackend {
    fn input_names(&self) -> Result<Vec<String>> {
        Ok(self.inputs.clone())
    }

    fn output_names(&self) -> Result<Vec<String>> {
        Ok(self.outputs.clone())
    }

    fn open_input(&mut self, name: &str) -> Result<Box<dyn InputPort>> {
        if self.failing.contains(name) {
            return Err(anyhow!("port busy"));
        }
        Ok(Box::new(MemoryInput {
            name: name.to_string(),
            feed: self.feed(name),
        }))
    }

    fn open_output(&mut self, name: &str) -> Result<Box<dyn OutputPort>> {
        if self.failing.contains(name) {
            return Err(anyhow!("port busy"));
        }
        Ok(Box::new(MemoryOutput {
            name: name.to_string(),
            sink: self.sink(name),
        }))
    }
}

struct MemoryInput {
    name: String,
    feed: Feed,
}

impl InputPort for MemoryInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.feed.0.lock().pop_front()
    }
}

struct MemoryOutput {
    name: String,
    sink: Sink,
}

impl OutputPort for MemoryOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.sink.0.lock().push(data.to_vec());
        Ok(())
    }
}
