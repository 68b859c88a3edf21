//! Clip duplication workflow
//!
//! Copies the clip playing on the first armed track into that track's first
//! empty slot. Missing pieces (no armed track, nothing playing, no room) are
//! normal outcomes, not errors; only a failure to reach the DAW is reported as
//! [`DuplicationOutcome::RemoteError`].

use std::fmt;
use tracing::{error, info, warn};

use crate::error::RemoteError;
use crate::remote::{DuplicationRequest, RemoteClient, TrackSnapshot};

/// How a duplication attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicationOutcome {
    NoArmedTrack,
    NoPlayingClip { track: usize },
    NoEmptySlot { track: usize },
    Duplicated { source_slot: usize, dest_slot: usize },
    RemoteError(RemoteError),
}

impl fmt::Display for DuplicationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicationOutcome::NoArmedTrack => write!(f, "no armed track"),
            DuplicationOutcome::NoPlayingClip { track } => {
                write!(f, "no clip playing on armed track {}", track)
            }
            DuplicationOutcome::NoEmptySlot { track } => {
                write!(f, "no empty slot on track {}", track)
            }
            DuplicationOutcome::Duplicated { source_slot, dest_slot } => {
                write!(f, "duplicated slot {} to slot {}", source_slot, dest_slot)
            }
            DuplicationOutcome::RemoteError(e) => write!(f, "remote error: {}", e),
        }
    }
}

/// Run one duplication attempt against `client`
///
/// State is fetched fresh every call; arm and play state change under us.
pub async fn duplicate_playing_clip(client: &dyn RemoteClient) -> DuplicationOutcome {
    let outcome = match run(client).await {
        Ok(outcome) => outcome,
        Err(e) => DuplicationOutcome::RemoteError(e),
    };

    match &outcome {
        DuplicationOutcome::Duplicated { source_slot, dest_slot } => {
            info!("✅ Duplicated clip from slot {} to slot {}", source_slot, dest_slot)
        }
        DuplicationOutcome::RemoteError(e) if e.is_connection() => {
            warn!("Connection error with Ableton Live: {}", e)
        }
        DuplicationOutcome::RemoteError(e) => error!("Clip duplication failed: {}", e),
        other => info!("Nothing to duplicate: {}", other),
    }
    outcome
}

async fn run(client: &dyn RemoteClient) -> Result<DuplicationOutcome, RemoteError> {
    let tracks = client.tracks().await?;

    let Some(track) = tracks.into_iter().find(|t| t.armed) else {
        return Ok(DuplicationOutcome::NoArmedTrack);
    };
    info!("Armed track found: {} '{}'", track.index, track.name);

    let Some(source_slot) = track.playing_clip else {
        return Ok(DuplicationOutcome::NoPlayingClip { track: track.index });
    };

    let slots = client.clip_slots(track.index).await?;
    let snapshot = TrackSnapshot { track, slots };

    let Some(dest_slot) = snapshot.first_empty_slot() else {
        return Ok(DuplicationOutcome::NoEmptySlot {
            track: snapshot.track.index,
        });
    };

    let request = DuplicationRequest {
        source_track: snapshot.track.index,
        source_clip: source_slot,
        dest_track: snapshot.track.index,
        dest_slot,
    };
    info!("Duplicating {}", request);
    client.duplicate_clip(&request).await?;

    Ok(DuplicationOutcome::Duplicated {
        source_slot,
        dest_slot,
    })
}
