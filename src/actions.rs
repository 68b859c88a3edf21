//! Trigger actions
//!
//! Turns the `triggers` section of the config into registry handlers that
//! drive the remote client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::{ActionConfig, TriggerConfig};
use crate::midi::MidiEvent;
use crate::registry::{CallbackRegistry, Handler};
use crate::remote::RemoteClient;
use crate::workflow::duplicate_playing_clip;

/// Duplicate the playing clip of the first armed track
pub struct DuplicateClipAction {
    remote: Arc<dyn RemoteClient>,
}

impl DuplicateClipAction {
    pub fn new(remote: Arc<dyn RemoteClient>) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl Handler for DuplicateClipAction {
    async fn handle(&self, event: &MidiEvent) -> Result<()> {
        info!("🎬 Duplicate triggered by {}", event);
        // Every outcome, remote errors included, is already logged by the workflow
        duplicate_playing_clip(self.remote.as_ref()).await;
        Ok(())
    }
}

/// Set the song tempo
pub struct SetTempoAction {
    remote: Arc<dyn RemoteClient>,
    bpm: f32,
}

impl SetTempoAction {
    pub fn new(remote: Arc<dyn RemoteClient>, bpm: f32) -> Self {
        Self { remote, bpm }
    }
}

#[async_trait]
impl Handler for SetTempoAction {
    async fn handle(&self, event: &MidiEvent) -> Result<()> {
        info!("Tempo {} BPM triggered by {}", self.bpm, event);
        self.remote
            .set_tempo(self.bpm)
            .await
            .context("Failed to set tempo")
    }
}

/// Build the handler for one configured action
pub fn build_handler(action: &ActionConfig, remote: Arc<dyn RemoteClient>) -> Arc<dyn Handler> {
    match *action {
        ActionConfig::DuplicatePlayingClip => Arc::new(DuplicateClipAction::new(remote)),
        ActionConfig::SetTempo(bpm) => Arc::new(SetTempoAction::new(remote, bpm)),
    }
}

/// Register every configured trigger, returning how many were installed
///
/// Later entries with the same key replace earlier ones.
pub fn register_triggers(
    registry: &CallbackRegistry,
    triggers: &[TriggerConfig],
    remote: Arc<dyn RemoteClient>,
) -> Result<usize> {
    for (idx, trigger) in triggers.iter().enumerate() {
        let key = trigger
            .key()
            .with_context(|| format!("Invalid trigger #{}", idx))?;
        registry.register(key, build_handler(&trigger.action, remote.clone()));
    }
    Ok(triggers.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::MidiMessage;
    use crate::ports::PortRole;
    use crate::registry::{Dispatch, TriggerKey};
    use crate::workflow::testing::ScriptedRemote;

    fn trigger(note: Option<u8>, control: Option<u8>, action: ActionConfig) -> TriggerConfig {
        TriggerConfig {
            note,
            control,
            velocity: None,
            value: None,
            action,
        }
    }

    #[tokio::test]
    async fn test_registered_duplicate_trigger_runs_workflow() {
        let remote = Arc::new(ScriptedRemote::with_tracks(vec![ScriptedRemote::track(
            0,
            true,
            Some(0),
            &[true, false],
        )]));
        let registry = CallbackRegistry::new();
        let triggers = vec![trigger(Some(107), None, ActionConfig::DuplicatePlayingClip)];

        let count = register_triggers(&registry, &triggers, remote.clone()).unwrap();
        assert_eq!(count, 1);

        let event = MidiEvent::new(
            MidiMessage::NoteOn {
                channel: 0,
                note: 107,
                velocity: 127,
            },
            PortRole::PhysicalIn,
        );
        assert!(matches!(
            registry.dispatch(&event).await,
            Dispatch::Handled(key) if key == TriggerKey::note(107, None)
        ));
        assert_eq!(remote.duplicated().len(), 1);
        assert_eq!(remote.duplicated()[0].dest_slot, 1);
    }

    #[tokio::test]
    async fn test_press_and_release_duplicates_once() {
        let remote = Arc::new(ScriptedRemote::with_tracks(vec![ScriptedRemote::track(
            0,
            true,
            Some(0),
            &[true, false, false],
        )]));
        let registry = CallbackRegistry::new();
        let triggers = vec![trigger(Some(107), None, ActionConfig::DuplicatePlayingClip)];
        register_triggers(&registry, &triggers, remote.clone()).unwrap();

        for raw in [[0x90, 107, 127], [0x90, 107, 0]] {
            let event = MidiEvent::from_raw(&raw, PortRole::PhysicalIn).unwrap();
            registry.dispatch(&event).await;
        }

        assert_eq!(remote.duplicated().len(), 1);
    }

    #[tokio::test]
    async fn test_tempo_trigger() {
        let remote = Arc::new(ScriptedRemote::default());
        let registry = CallbackRegistry::new();
        let triggers = vec![trigger(None, Some(104), ActionConfig::SetTempo(96.0))];
        register_triggers(&registry, &triggers, remote.clone()).unwrap();

        let event = MidiEvent::new(
            MidiMessage::ControlChange {
                channel: 0,
                cc: 104,
                value: 127,
            },
            PortRole::PhysicalIn,
        );
        registry.dispatch(&event).await;

        assert_eq!(*remote.tempos.lock(), vec![96.0]);
    }

    #[test]
    fn test_invalid_trigger_is_rejected() {
        let registry = CallbackRegistry::new();
        let triggers = vec![trigger(None, None, ActionConfig::DuplicatePlayingClip)];

        let remote = Arc::new(ScriptedRemote::default());

        assert!(register_triggers(&registry, &triggers, remote).is_err());
        assert!(registry.is_empty());
    }
}
