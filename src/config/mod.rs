//! Configuration management for Launch Mirror
//!
//! Handles loading, parsing, and validation of the YAML configuration file.
//! Everything is read once at startup; a running session never re-reads it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::fs;

use crate::registry::TriggerKey;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub midi: MidiConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,
}

/// MIDI port prefixes and loop timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MidiConfig {
    /// Prefix of the physical device (used for both its input and output)
    pub physical: String,
    /// Prefix of the virtual port the DAW writes to
    pub from_daw: String,
    /// Prefix of the virtual port the DAW reads from
    pub to_daw: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_true")]
    pub flush_on_start: bool,
}

impl MidiConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// AbletonOSC endpoint
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RemoteConfig {
    #[serde(default = "default_remote_host")]
    pub host: String,
    #[serde(default = "default_remote_port")]
    pub port: u16,
    #[serde(default = "default_local_port")]
    pub local_port: u16,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: default_remote_host(),
            port: default_remote_port(),
            local_port: default_local_port(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// A trigger: which message fires it and what it does
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TriggerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control: Option<u8>,
    /// Required note velocity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<u8>,
    /// Required control value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<u8>,
    /// `duplicate_playing_clip` or `{ set_tempo: <bpm> }`
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub action: ActionConfig,
}

impl TriggerConfig {
    /// Registry key for this trigger (call after `validate`)
    pub fn key(&self) -> Result<TriggerKey> {
        match (self.note, self.control) {
            (Some(note), None) => Ok(TriggerKey::note(note, self.velocity)),
            (None, Some(control)) => Ok(TriggerKey::control(control, self.value)),
            _ => anyhow::bail!("trigger must set exactly one of 'note' or 'control'"),
        }
    }
}

/// Remote action bound to a trigger
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ActionConfig {
    /// Copy the playing clip of the first armed track into its first empty slot
    DuplicatePlayingClip,
    /// Set the song tempo in BPM
    SetTempo(f32),
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_yaml(&contents).with_context(|| format!("Invalid config file: {}", path))
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.midi.physical.is_empty() {
            anyhow::bail!("midi.physical cannot be empty");
        }
        if self.midi.from_daw.is_empty() {
            anyhow::bail!("midi.from_daw cannot be empty");
        }
        if self.midi.to_daw.is_empty() {
            anyhow::bail!("midi.to_daw cannot be empty");
        }
        if self.midi.poll_interval_ms == 0 || self.midi.poll_interval_ms > 1000 {
            anyhow::bail!(
                "midi.poll_interval_ms is {} (must be 1-1000)",
                self.midi.poll_interval_ms
            );
        }

        if self.remote.host.is_empty() {
            anyhow::bail!("remote.host cannot be empty");
        }
        if self.remote.timeout_ms == 0 {
            anyhow::bail!("remote.timeout_ms must be greater than 0");
        }

        for (idx, trigger) in self.triggers.iter().enumerate() {
            Self::validate_trigger(trigger).with_context(|| format!("Invalid trigger #{}", idx))?;
        }

        Ok(())
    }

    /// Validate a single trigger
    fn validate_trigger(trigger: &TriggerConfig) -> Result<()> {
        match (trigger.note, trigger.control) {
            (Some(_), Some(_)) => anyhow::bail!("trigger sets both 'note' and 'control'"),
            (None, None) => anyhow::bail!("trigger must set 'note' or 'control'"),
            (Some(_), None) if trigger.value.is_some() => {
                anyhow::bail!("'value' only applies to control triggers (use 'velocity')")
            }
            (None, Some(_)) if trigger.velocity.is_some() => {
                anyhow::bail!("'velocity' only applies to note triggers (use 'value')")
            }
            _ => {}
        }

        for (field, number) in [
            ("note", trigger.note),
            ("control", trigger.control),
            ("velocity", trigger.velocity),
            ("value", trigger.value),
        ] {
            if let Some(n) = number {
                if n > 127 {
                    anyhow::bail!("{} {} is invalid (must be 0-127)", field, n);
                }
            }
        }

        if let ActionConfig::SetTempo(bpm) = trigger.action {
            if !(20.0..=999.0).contains(&bpm) {
                anyhow::bail!("set_tempo {} is out of range (20-999 BPM)", bpm);
            }
        }

        Ok(())
    }
}

// Default value functions
fn default_true() -> bool { true }
fn default_poll_interval_ms() -> u64 { 1 }
fn default_remote_host() -> String { "127.0.0.1".to_string() }
fn default_remote_port() -> u16 { 11000 }
fn default_local_port() -> u16 { 11001 }
fn default_timeout_ms() -> u64 { 500 }
