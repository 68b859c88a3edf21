//! Mirror loop - forwards MIDI between the device and the DAW
//!
//! One task owns the transport session and polls both input ports in turn.
//! Every drained event is first offered to the callback registry, then
//! forwarded untouched to the paired output, whatever the callback did.
//!
//! State machine: `Idle -> Running -> Stopped`. Stop is cooperative; it is
//! checked once per iteration, so an in-flight callback always completes.


use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::ports::PortRole;
use crate::registry::{CallbackRegistry, Dispatch};
use crate::transport::TransportSession;

/// Lifecycle of a mirror loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoopState {
    Idle = 0,
    Running = 1,
    Stopped = 2,
}

impl LoopState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LoopState::Idle,
            1 => LoopState::Running,
            _ => LoopState::Stopped,
        }
    }
}

/// Cloneable, thread-safe stop signal for a mirror loop
#[derive(Debug, Clone)]
pub struct StopHandle {
    state: Arc<AtomicU8>,
}

impl StopHandle {
    /// Request the loop to stop after its current iteration
    pub fn stop(&self) {
        let previous = self.state.swap(LoopState::Stopped as u8, Ordering::SeqCst);
        if previous != LoopState::Stopped as u8 {
            debug!("Mirror loop stop requested");
        }
    }

    pub fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::SeqCst))
    }
}

/// An input port and the output it is mirrored to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Direction {
    pub input: PortRole,
    pub output: PortRole,
}

/// DAW feedback (LEDs) to the device
pub const DAW_TO_DEVICE: Direction = Direction {
    input: PortRole::VirtualIn,
    output: PortRole::PhysicalOut,
};

/// Device presses to the DAW
pub const DEVICE_TO_DAW: Direction = Direction {
    input: PortRole::PhysicalIn,
    output: PortRole::VirtualOut,
};

pub const DIRECTIONS: [Direction; 2] = [DAW_TO_DEVICE, DEVICE_TO_DAW];

/// Counters collected over a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorStats {
    pub iterations: u64,
    pub to_device: u64,
    pub to_daw: u64,
    pub callbacks: u64,
    pub callback_failures: u64,
}

impl MirrorStats {
    fn record_forward(&mut self, direction: Direction) {
        if direction == DAW_TO_DEVICE {
            self.to_device += 1;
        } else {
            self.to_daw += 1;
        }
    }
}

/// The forwarding loop of one session
pub struct MirrorLoop {
    session: TransportSession,
    registry: Arc<CallbackRegistry>,
    poll_interval: Duration,
    flush_on_start: bool,
    state: Arc<AtomicU8>,
    stats: MirrorStats,
}

impl MirrorLoop {
    pub fn new(
        session: TransportSession,
        registry: Arc<CallbackRegistry>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            session,
            registry,
            poll_interval,
            flush_on_start: false,
            state: Arc::new(AtomicU8::new(LoopState::Idle as u8)),
            stats: MirrorStats::default(),
        }
    }

    /// Drop messages queued before the loop starts
    pub fn flush_on_start(mut self, flush: bool) -> Self {
        self.flush_on_start = flush;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            state: self.state.clone(),
        }
    }

    pub fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn stats(&self) -> &MirrorStats {
        &self.stats
    }

    /// Drain both inputs once; returns how many events were processed
    pub async fn run_iteration(&mut self) -> usize {
        let mut processed = 0;

        for direction in DIRECTIONS {
            let events: Vec<_> = self.session.drain_pending(direction.input).collect();

            for event in events {
                debug!("{} Received: {}", direction.input, event);

                match self.registry.dispatch(&event).await {
                    Dispatch::Unmatched => {}
                    Dispatch::Handled(_) => self.stats.callbacks += 1,
                    Dispatch::Failed(_) => {
                        self.stats.callbacks += 1;
                        self.stats.callback_failures += 1;
                    }
                }

                self.session.send(direction.output, &event);
                self.stats.record_forward(direction);
                processed += 1;
            }
        }

        self.stats.iterations += 1;
        processed
    }

    /// Run until stopped, then hand back the session and the counters
    pub async fn run(mut self) -> (TransportSession, MirrorStats) {
        let started = self.state.compare_exchange(
            LoopState::Idle as u8,
            LoopState::Running as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        if started.is_err() {
            debug!("Mirror loop stopped before it started");
            return (self.session, self.stats);
        }

        if self.flush_on_start {
            self.session.flush_inputs();
        }

        info!("🎹 Listening for MIDI messages...");
        while self.state() == LoopState::Running {
            if self.run_iteration().await == 0 {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        info!("Mirror loop stopped");
        (self.session, self.stats)
    }

    /// Run on its own task
    pub fn spawn(self) -> MirrorHandle {
        let stop = self.stop_handle();
        let task = tokio::spawn(self.run());
        MirrorHandle { stop, task }
    }
}

/// Handle to a spawned mirror loop
pub struct MirrorHandle {
    stop: StopHandle,
    task: JoinHandle<(TransportSession, MirrorStats)>,
}

impl MirrorHandle {
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Stop the loop, wait for it, and release the ports
    pub async fn stop_and_join(self) -> Result<MirrorStats> {
        self.stop.stop();
        let (mut session, stats) = self.task.await.context("Mirror loop task failed")?;
        session.close();
        Ok(stats)
    }
}
