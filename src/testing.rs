//! Скриптованный media engine для тестов сессии и relay.

use crate::error::{DescriptionStep, Error, Result};
use crate::peer::engine::{
    Capture, Connection, EngineEvent, EngineEvents, MediaEngine, RenderTarget, VideoFrame,
};
use crate::peer::state::{SessionState, VIDEO_TRACK_ID};
use crate::peer::types::{
    EndpointRole, IceCandidate, MediaKind, RemoteTrack, SdpType, SessionDescription,
};
use crate::session::SessionObserver;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub fn candidate(origin: EndpointRole, n: usize) -> IceCandidate {
    IceCandidate {
        candidate: format!("candidate:{n}"),
        sdp_mid: Some("0".into()),
        sdp_mline_index: Some(0),
        origin,
    }
}

/// Что видела одна fake-сторона
#[derive(Default)]
pub struct FakePeer {
    applied: Mutex<Vec<(String, bool)>>,
    local: Mutex<Option<SessionDescription>>,
    remote: Mutex<Option<SessionDescription>>,
    reject: Mutex<bool>,
    closes: AtomicUsize,
    tracks: AtomicUsize,
}

impl FakePeer {
    pub fn applied(&self) -> Vec<String> {
        self.applied.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    /// true, если кандидат пришёл уже после remote description
    pub fn applied_after_remote(&self) -> Vec<bool> {
        self.applied.lock().unwrap().iter().map(|(_, r)| *r).collect()
    }

    pub fn local_description(&self) -> Option<SessionDescription> {
        self.local.lock().unwrap().clone()
    }

    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.remote.lock().unwrap().clone()
    }

    pub fn reject_candidates(&self, reject: bool) {
        *self.reject.lock().unwrap() = reject;
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn attached_tracks(&self) -> usize {
        self.tracks.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct Plan {
    refuse: HashSet<EndpointRole>,
    fail: HashSet<(EndpointRole, DescriptionStep)>,
    gates: HashMap<(EndpointRole, DescriptionStep), Arc<Notify>>,
    candidates: HashMap<EndpointRole, usize>,
    fail_capture: bool,
    fail_capture_stop: bool,
}

pub struct FakeConnection {
    role: EndpointRole,
    peer: Arc<FakePeer>,
    plan: Arc<Plan>,
    events: Option<EngineEvents>,
    sink: Option<Arc<dyn RenderTarget>>,
}

impl FakeConnection {
    /// Соединение без движка и канала событий
    pub fn detached(role: EndpointRole) -> (Self, Arc<FakePeer>) {
        let peer = Arc::new(FakePeer::default());
        let connection = FakeConnection {
            role,
            peer: peer.clone(),
            plan: Arc::new(Plan::default()),
            events: None,
            sink: None,
        };
        (connection, peer)
    }

    async fn step(&self, step: DescriptionStep) -> Result<()> {
        if let Some(gate) = self.plan.gates.get(&(self.role, step)) {
            gate.notified().await;
        }
        if self.plan.fail.contains(&(self.role, step)) {
            return Err(Error::step_failed(self.role, step, "scripted failure"));
        }
        Ok(())
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

#[async_trait]
impl Connection for FakeConnection {
    async fn create_offer(&self) -> Result<SessionDescription> {
        self.step(DescriptionStep::CreateOffer).await?;
        Ok(SessionDescription::offer(format!("v=0 offer from {}", self.role)))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.step(DescriptionStep::CreateAnswer).await?;
        if self.peer.remote_description().is_none() {
            return Err(Error::step_failed(
                self.role,
                DescriptionStep::CreateAnswer,
                "no remote offer",
            ));
        }
        Ok(SessionDescription::answer(format!("v=0 answer from {}", self.role)))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.step(DescriptionStep::SetLocalDescription).await?;
        *self.peer.local.lock().unwrap() = Some(desc);
        // сбор кандидатов стартует вместе с local description
        let count = self.plan.candidates.get(&self.role).copied().unwrap_or(0);
        for n in 1..=count {
            self.emit(EngineEvent::IceCandidate(candidate(self.role, n)));
        }
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.step(DescriptionStep::SetRemoteDescription).await?;
        let is_offer = desc.sdp_type == SdpType::Offer;
        // как и настоящий peer connection: answer без своего offer недопустим
        if !is_offer && self.peer.local_description().is_none() {
            return Err(Error::step_failed(
                self.role,
                DescriptionStep::SetRemoteDescription,
                "answer in stable state",
            ));
        }
        *self.peer.remote.lock().unwrap() = Some(desc);
        if is_offer {
            self.emit(EngineEvent::RemoteTrack(RemoteTrack {
                endpoint: self.role,
                kind: MediaKind::Video,
                track_id: VIDEO_TRACK_ID.into(),
                stream_id: "102".into(),
            }));
            if let Some(sink) = &self.sink {
                sink.render(&VideoFrame {
                    track_id: VIDEO_TRACK_ID.into(),
                    sequence: 0,
                    data: Bytes::from_static(b"remote"),
                });
            }
        }
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        if *self.peer.reject.lock().unwrap() {
            return Err(Error::Candidate {
                endpoint: self.role,
                reason: "scripted rejection".into(),
            });
        }
        let has_remote = self.peer.remote_description().is_some();
        self.peer
            .applied
            .lock()
            .unwrap()
            .push((candidate.candidate, has_remote));
        Ok(())
    }

    async fn close(&self) {
        self.peer.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeCapture {
    stops: Arc<AtomicUsize>,
    fail_stop: bool,
}

#[async_trait]
impl Capture for FakeCapture {
    async fn stop(&mut self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            return Err(Error::Capture("stop interrupted".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeEngine {
    plan: Arc<Plan>,
    peers: Mutex<HashMap<EndpointRole, Arc<FakePeer>>>,
    capture_stops: Arc<AtomicUsize>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn plan_mut(&mut self) -> &mut Plan {
        Arc::get_mut(&mut self.plan).expect("plan is configured before use")
    }

    pub fn refuse(mut self, role: EndpointRole) -> Self {
        self.plan_mut().refuse.insert(role);
        self
    }

    pub fn fail(mut self, role: EndpointRole, step: DescriptionStep) -> Self {
        self.plan_mut().fail.insert((role, step));
        self
    }

    pub fn candidates(mut self, role: EndpointRole, count: usize) -> Self {
        self.plan_mut().candidates.insert(role, count);
        self
    }

    pub fn fail_capture(mut self) -> Self {
        self.plan_mut().fail_capture = true;
        self
    }

    pub fn fail_capture_stop(mut self) -> Self {
        self.plan_mut().fail_capture_stop = true;
        self
    }

    /// Шаг ждёт `notify_one()` на возвращённом Notify
    pub fn gate(mut self, role: EndpointRole, step: DescriptionStep) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.plan_mut().gates.insert((role, step), gate.clone());
        (self, gate)
    }

    pub fn peer(&self, role: EndpointRole) -> Arc<FakePeer> {
        self.peers
            .lock()
            .unwrap()
            .get(&role)
            .cloned()
            .expect("endpoint was created")
    }

    pub fn has_peer(&self, role: EndpointRole) -> bool {
        self.peers.lock().unwrap().contains_key(&role)
    }

    pub fn capture_stops(&self) -> usize {
        self.capture_stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaEngine for FakeEngine {
    type Connection = FakeConnection;
    type Capture = FakeCapture;

    async fn create_connection(
        &self,
        endpoint: EndpointRole,
        events: EngineEvents,
        sink: Option<Arc<dyn RenderTarget>>,
    ) -> Result<FakeConnection> {
        if self.plan.refuse.contains(&endpoint) {
            return Err(Error::EndpointCreation {
                endpoint,
                reason: "device busy".into(),
            });
        }
        let peer = Arc::new(FakePeer::default());
        self.peers.lock().unwrap().insert(endpoint, peer.clone());
        Ok(FakeConnection {
            role: endpoint,
            peer,
            plan: self.plan.clone(),
            events: Some(events),
            sink,
        })
    }

    async fn start_capture(&self, preview: Option<Arc<dyn RenderTarget>>) -> Result<FakeCapture> {
        if self.plan.fail_capture {
            return Err(Error::Capture("camera unavailable".into()));
        }
        if let Some(preview) = preview {
            preview.render(&VideoFrame {
                track_id: VIDEO_TRACK_ID.into(),
                sequence: 0,
                data: Bytes::from_static(b"preview"),
            });
        }
        Ok(FakeCapture {
            stops: self.capture_stops.clone(),
            fail_stop: self.plan.fail_capture_stop,
        })
    }

    async fn attach_media(&self, connection: &FakeConnection, _capture: &FakeCapture) -> Result<()> {
        connection.peer.tracks.fetch_add(2, Ordering::SeqCst);
        Ok(())
    }
}

/// View, считающая кадры и release
#[derive(Default)]
pub struct RecordingTarget {
    frames: AtomicUsize,
    releases: AtomicUsize,
}

impl RecordingTarget {
    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl RenderTarget for RecordingTarget {
    fn render(&self, _frame: &VideoFrame) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    states: Mutex<Vec<SessionState>>,
    failures: Mutex<Vec<Error>>,
    tracks: Mutex<Vec<RemoteTrack>>,
}

impl RecordingObserver {
    pub fn states(&self) -> Vec<SessionState> {
        self.states.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<Error> {
        self.failures.lock().unwrap().clone()
    }

    pub fn tracks(&self) -> Vec<RemoteTrack> {
        self.tracks.lock().unwrap().clone()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_state(&self, state: SessionState) {
        self.states.lock().unwrap().push(state);
    }

    fn on_failure(&self, error: &Error) {
        self.failures.lock().unwrap().push(error.clone());
    }

    fn on_remote_track(&self, track: &RemoteTrack) {
        self.tracks.lock().unwrap().push(track.clone());
    }
}
