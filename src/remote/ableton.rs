//! AbletonOSC client
//!
//! Talks to the AbletonOSC remote script over UDP. Queries are
//! request/reply with a timeout; commands are fire-and-forget. The socket is
//! bound lazily and thrown away after a socket error so the next call starts
//! clean, which covers Live being restarted while we run.

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace, warn};

use rosc::{OscMessage, OscType};

use super::osc::{self, as_bool, as_int, as_str, describe};
use super::{ClipSlot, DuplicationRequest, RemoteClient, TrackInfo};
use crate::config::RemoteConfig;
use crate::error::RemoteError;

const ERROR_ADDRESS: &str = "/live/error";
const MAX_PACKET: usize = 8192;

/// Remote client for Ableton Live via AbletonOSC
pub struct AbletonOscClient {
    host: String,
    port: u16,
    local_port: u16,
    timeout: Duration,
    socket: Mutex<Option<UdpSocket>>,
}

impl AbletonOscClient {
    pub fn new(config: &RemoteConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            local_port: config.local_port,
            timeout: Duration::from_millis(config.timeout_ms),
            socket: Mutex::new(None),
        }
    }

    async fn bind(&self) -> Result<UdpSocket, RemoteError> {
        let socket = UdpSocket::bind(("0.0.0.0", self.local_port)).await?;
        socket.connect((self.host.as_str(), self.port)).await?;
        debug!(
            "🎛️ OSC socket {} -> {}:{}",
            socket.local_addr()?,
            self.host,
            self.port
        );
        Ok(socket)
    }

    /// Send a message without waiting for anything back
    async fn send(&self, message: OscMessage) -> Result<(), RemoteError> {
        let mut guard = self.socket.lock().await;
        if guard.is_none() {
            *guard = Some(self.bind().await?);
        }
        let Some(socket) = guard.as_ref() else {
            return Err(RemoteError::Connection("OSC socket unavailable".into()));
        };

        trace!("OSC TX {}", describe(&message));
        let sent = socket.send(&osc::encode(&message)?).await;
        if let Err(e) = sent {
            *guard = None;
            return Err(e.into());
        }
        Ok(())
    }

    /// Send a query and wait for the reply addressed the same way
    ///
    /// AbletonOSC echoes the query's leading arguments (track/slot ids) in
    /// its reply; those must match `echo` and are stripped from the result.
    async fn query(&self, address: &str, echo: Vec<OscType>) -> Result<Vec<OscType>, RemoteError> {
        let mut guard = self.socket.lock().await;
        if guard.is_none() {
            *guard = Some(self.bind().await?);
        }
        let Some(socket) = guard.as_ref() else {
            return Err(RemoteError::Connection("OSC socket unavailable".into()));
        };

        let request = osc::message(address, echo.clone());
        trace!("OSC TX {}", describe(&request));

        let result = exchange(socket, &request, &echo, self.timeout).await;
        if matches!(result, Err(RemoteError::Connection(_))) {
            *guard = None;
        }
        result
    }

    async fn query_int(&self, address: &str, echo: Vec<OscType>) -> Result<i32, RemoteError> {
        self.query(address, echo)
            .await?
            .first()
            .and_then(as_int)
            .ok_or_else(|| RemoteError::Protocol(format!("'{}' reply carried no integer", address)))
    }

    async fn query_bool(&self, address: &str, echo: Vec<OscType>) -> Result<bool, RemoteError> {
        self.query(address, echo)
            .await?
            .first()
            .and_then(as_bool)
            .ok_or_else(|| RemoteError::Protocol(format!("'{}' reply carried no flag", address)))
    }

    /// Number of tracks in the set; cheap reachability check
    pub async fn ping(&self) -> Result<usize, RemoteError> {
        let n = self.query_int("/live/song/get/num_tracks", vec![]).await?;
        Ok(n.max(0) as usize)
    }

    async fn track(&self, index: usize) -> Result<TrackInfo, RemoteError> {
        let id = index_arg(index)?;

        let name = self
            .query("/live/track/get/name", vec![id.clone()])
            .await?
            .first()
            .and_then(|a| as_str(a).map(str::to_string))
            .unwrap_or_default();

        // Group and return tracks have no arm property; Live answers with an error
        let armed = match self.query_bool("/live/track/get/arm", vec![id.clone()]).await {
            Ok(armed) => armed,
            Err(e) if e.is_connection() => return Err(e),
            Err(e) => {
                debug!("Track {} '{}' cannot be armed: {}", index, name, e);
                false
            }
        };

        let playing = self
            .query_int("/live/track/get/playing_slot_index", vec![id])
            .await?;

        Ok(TrackInfo {
            index,
            name,
            armed,
            playing_clip: usize::try_from(playing).ok(),
        })
    }
}

/// One request/reply round trip on a connected socket
async fn exchange(
    socket: &UdpSocket,
    request: &OscMessage,
    echo: &[OscType],
    timeout: Duration,
) -> Result<Vec<OscType>, RemoteError> {
    socket.send(&osc::encode(request)?).await?;

    let deadline = Instant::now() + timeout;
    let mut buf = vec![0u8; MAX_PACKET];
    loop {
        let len = match timeout_at(deadline, socket.recv(&mut buf)).await {
            Ok(received) => received?,
            Err(_) => {
                return Err(RemoteError::Timeout {
                    address: request.addr.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        };

        let reply = match osc::decode(&buf[..len]) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Ignoring undecodable OSC packet: {}", e);
                continue;
            }
        };
        trace!("OSC RX {}", describe(&reply));

        if reply.addr == ERROR_ADDRESS {
            let detail = reply
                .args
                .iter()
                .filter_map(as_str)
                .collect::<Vec<_>>()
                .join(" ");
            return Err(RemoteError::Protocol(format!(
                "Live rejected '{}': {}",
                request.addr, detail
            )));
        }

        // Stale replies from an earlier timed-out query are skipped
        if reply.addr == request.addr && reply.args.starts_with(echo) {
            return Ok(reply.args[echo.len()..].to_vec());
        }
        trace!("Skipping unrelated reply {}", describe(&reply));
    }
}

fn index_arg(index: usize) -> Result<OscType, RemoteError> {
    i32::try_from(index)
        .map(OscType::Int)
        .map_err(|_| RemoteError::Protocol(format!("index {} out of OSC range", index)))
}

#[async_trait]
impl RemoteClient for AbletonOscClient {
    async fn tracks(&self) -> Result<Vec<TrackInfo>, RemoteError> {
        let count = self.ping().await?;
        let mut tracks = Vec::with_capacity(count);
        for index in 0..count {
            tracks.push(self.track(index).await?);
        }
        Ok(tracks)
    }

    async fn clip_slots(&self, track: usize) -> Result<Vec<ClipSlot>, RemoteError> {
        let track_id = index_arg(track)?;
        let scenes = self.query_int("/live/song/get/num_scenes", vec![]).await?;

        let mut slots = Vec::with_capacity(scenes.max(0) as usize);
        for index in 0..scenes.max(0) as usize {
            let occupied = self
                .query_bool(
                    "/live/clip_slot/get/has_clip",
                    vec![track_id.clone(), index_arg(index)?],
                )
                .await?;
            slots.push(ClipSlot { index, occupied });
        }
        Ok(slots)
    }

    async fn duplicate_clip(&self, request: &DuplicationRequest) -> Result<(), RemoteError> {
        let args = vec![
            index_arg(request.source_track)?,
            index_arg(request.source_clip)?,
            index_arg(request.dest_track)?,
            index_arg(request.dest_slot)?,
        ];
        self.send(osc::message("/live/clip_slot/duplicate_clip_to", args))
            .await
    }

    async fn set_tempo(&self, bpm: f32) -> Result<(), RemoteError> {
        self.send(osc::message("/live/song/set/tempo", vec![OscType::Float(bpm)]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// One track as the fake Live script reports it
    struct FakeTrack {
        name: &'static str,
        /// `None` for tracks without an arm property
        armed: Option<bool>,
        /// Never answer the arm query for this track
        drop_arm_reply: bool,
        playing: i32,
        clips: Vec<bool>,
    }

    fn fake_track(
        name: &'static str,
        armed: Option<bool>,
        playing: i32,
        clips: &[bool],
    ) -> FakeTrack {
        FakeTrack {
            name,
            armed,
            drop_arm_reply: false,
            playing,
            clips: clips.to_vec(),
        }
    }

    /// Tiny stand-in for the AbletonOSC remote script
    struct FakeLive {
        tracks: Vec<FakeTrack>,
    }

    impl FakeLive {
        fn reply(&self, msg: &OscMessage) -> Option<OscMessage> {
            let int = |i: usize| msg.args.get(i).and_then(as_int).unwrap_or(0);
            let track = move |i: usize| &self.tracks[int(i) as usize];
            let args = match msg.addr.as_str() {
                "/live/song/get/num_tracks" => vec![OscType::Int(self.tracks.len() as i32)],
                "/live/song/get/num_scenes" => {
                    vec![OscType::Int(self.tracks[0].clips.len() as i32)]
                }
                "/live/track/get/name" => {
                    vec![OscType::Int(int(0)), OscType::String(track(0).name.into())]
                }
                "/live/track/get/arm" if track(0).drop_arm_reply => return None,
                "/live/track/get/arm" => match track(0).armed {
                    Some(armed) => vec![OscType::Int(int(0)), OscType::Bool(armed)],
                    None => {
                        return Some(osc::message(
                            ERROR_ADDRESS,
                            vec![OscType::String("Error handling OSC message: arm".into())],
                        ))
                    }
                },
                "/live/track/get/playing_slot_index" => {
                    vec![OscType::Int(int(0)), OscType::Int(track(0).playing)]
                }
                "/live/clip_slot/get/has_clip" => vec![
                    OscType::Int(int(0)),
                    OscType::Int(int(1)),
                    OscType::Bool(track(0).clips[int(1) as usize]),
                ],
                _ => return None,
            };
            Some(osc::message(&msg.addr, args))
        }
    }

    /// Spawn the fake; returns its port and a log of received messages
    async fn spawn_fake(live: FakeLive) -> (u16, Arc<parking_lot::Mutex<Vec<OscMessage>>>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let log_task = log.clone();

        tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_PACKET];
            while let Ok((len, peer)) = socket.recv_from(&mut buf).await {
                let Ok(msg) = osc::decode(&buf[..len]) else { continue };
                log_task.lock().push(msg.clone());
                if let Some(reply) = live.reply(&msg) {
                    let _ = socket.send_to(&osc::encode(&reply).unwrap(), peer).await;
                }
            }
        });

        (port, log)
    }

    fn client_for(port: u16, timeout_ms: u64) -> AbletonOscClient {
        AbletonOscClient::new(&RemoteConfig {
            host: "127.0.0.1".into(),
            port,
            local_port: 0,
            timeout_ms,
        })
    }

    #[tokio::test]
    async fn test_tracks_and_slots() {
        let (port, _log) = spawn_fake(FakeLive {
            tracks: vec![
                fake_track("Group", None, -2, &[false, false]),
                fake_track("Bass", Some(true), 1, &[true, true]),
            ],
        })
        .await;
        let client = client_for(port, 500);

        let tracks = client.tracks().await.unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].name, "Group");
        assert!(!tracks[0].armed);
        assert_eq!(tracks[0].playing_clip, None);
        assert!(tracks[1].armed);
        assert_eq!(tracks[1].playing_clip, Some(1));

        let slots = client.clip_slots(1).await.unwrap();
        assert_eq!(
            slots,
            vec![
                ClipSlot { index: 0, occupied: true },
                ClipSlot { index: 1, occupied: true },
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_arm_reply_is_an_error() {
        let mut first = fake_track("Keys", Some(true), 0, &[true, false]);
        first.drop_arm_reply = true;
        let (port, _log) = spawn_fake(FakeLive {
            tracks: vec![first, fake_track("Bass", Some(true), 0, &[true, false])],
        })
        .await;
        let client = client_for(port, 50);

        // Reading track 0 as unarmed would act on the wrong track
        let err = client.tracks().await.unwrap_err();
        match &err {
            RemoteError::Timeout { address, .. } => assert_eq!(address, "/live/track/get/arm"),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn test_duplicate_sends_command() {
        let (port, log) = spawn_fake(FakeLive { tracks: vec![] }).await;
        let client = client_for(port, 500);

        client
            .duplicate_clip(&DuplicationRequest {
                source_track: 0,
                source_clip: 2,
                dest_track: 0,
                dest_slot: 3,
            })
            .await
            .unwrap();

        // Fire-and-forget: give the fake a moment to receive it
        for _ in 0..50 {
            if !log.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let received = log.lock().clone();
        assert_eq!(
            received,
            vec![osc::message(
                "/live/clip_slot/duplicate_clip_to",
                vec![OscType::Int(0), OscType::Int(2), OscType::Int(0), OscType::Int(3)],
            )]
        );
    }

    #[tokio::test]
    async fn test_silent_endpoint_times_out() {
        // Bound but never answers
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = silent.local_addr().unwrap().port();
        let client = client_for(port, 50);

        let err = client.tracks().await.unwrap_err();
        assert!(err.is_connection(), "expected connection-level error, got {:?}", err);
    }
}
