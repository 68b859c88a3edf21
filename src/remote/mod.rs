//! Remote control of the DAW
//!
//! The workflow only sees the [`RemoteClient`] trait. [`AbletonOscClient`]
//! implements it against AbletonOSC; tests use a scripted client.

pub mod ableton;
pub mod osc;

use async_trait::async_trait;
use std::fmt;

use crate::error::RemoteError;

pub use ableton::AbletonOscClient;

/// One mixer track as reported by the DAW
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub index: usize,
    pub name: String,
    pub armed: bool,
    /// Slot index of the clip currently playing, if any
    pub playing_clip: Option<usize>,
}

/// One clip slot of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipSlot {
    pub index: usize,
    pub occupied: bool,
}

/// A track plus its clip slots, fetched fresh for every workflow run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSnapshot {
    pub track: TrackInfo,
    pub slots: Vec<ClipSlot>,
}

impl TrackSnapshot {
    /// First slot without a clip
    pub fn first_empty_slot(&self) -> Option<usize> {
        self.slots.iter().find(|slot| !slot.occupied).map(|slot| slot.index)
    }
}

/// Fully resolved "copy this clip into that slot" command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicationRequest {
    pub source_track: usize,
    pub source_clip: usize,
    pub dest_track: usize,
    pub dest_slot: usize,
}

impl fmt::Display for DuplicationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "track {} slot {} -> track {} slot {}",
            self.source_track, self.source_clip, self.dest_track, self.dest_slot
        )
    }
}

/// Queries and commands the workflow needs from the DAW
///
/// Implementations manage their own connection; each call stands alone.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// All tracks in index order
    async fn tracks(&self) -> Result<Vec<TrackInfo>, RemoteError>;

    /// Clip slots of one track in index order
    async fn clip_slots(&self, track: usize) -> Result<Vec<ClipSlot>, RemoteError>;

    /// Fire-and-forget clip copy
    async fn duplicate_clip(&self, request: &DuplicationRequest) -> Result<(), RemoteError>;

    /// Fire-and-forget tempo change
    async fn set_tempo(&self, bpm: f32) -> Result<(), RemoteError>;
}
