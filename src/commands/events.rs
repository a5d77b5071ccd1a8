//! Мост сессии в события окна Tauri.

use crate::error::{DescriptionStep, Error};
use crate::peer::engine::{RenderTarget, VideoFrame};
use crate::peer::state::SessionState;
use crate::peer::types::RemoteTrack;
use crate::session::{failed_step, SessionObserver};
use log::warn;
use serde::Serialize;
use tauri::{AppHandle, Emitter};

pub const STATE_EVENT: &str = "demo-state";
pub const FAILED_EVENT: &str = "demo-failed";
pub const REMOTE_TRACK_EVENT: &str = "demo-remote-track";
pub const FRAME_EVENT: &str = "demo-frame";
pub const VIEW_RELEASED_EVENT: &str = "demo-view-released";

#[derive(Serialize, Clone)]
struct FailurePayload {
    message: String,
    step: Option<DescriptionStep>,
}

#[derive(Serialize, Clone)]
struct FramePayload<'a> {
    view: &'a str,
    track_id: &'a str,
    sequence: u64,
    len: usize,
}

fn emit<S: Serialize + Clone>(app: &AppHandle, event: &str, payload: S) {
    if let Err(e) = app.emit(event, payload) {
        warn!("failed to emit {event}: {e:?}");
    }
}

pub struct TauriObserver {
    app: AppHandle,
}

impl TauriObserver {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl SessionObserver for TauriObserver {
    fn on_state(&self, state: SessionState) {
        emit(&self.app, STATE_EVENT, state);
    }

    fn on_failure(&self, error: &Error) {
        emit(
            &self.app,
            FAILED_EVENT,
            FailurePayload {
                message: error.to_string(),
                step: failed_step(error),
            },
        );
    }

    fn on_remote_track(&self, track: &RemoteTrack) {
        emit(&self.app, REMOTE_TRACK_EVENT, track.clone());
    }
}

/// View в окне: кадры уходят событиями, сам рендер на стороне фронтенда
pub struct EventView {
    app: AppHandle,
    name: &'static str,
}

impl EventView {
    pub fn new(app: AppHandle, name: &'static str) -> Self {
        Self { app, name }
    }
}

impl RenderTarget for EventView {
    fn render(&self, frame: &VideoFrame) {
        emit(
            &self.app,
            FRAME_EVENT,
            FramePayload {
                view: self.name,
                track_id: &frame.track_id,
                sequence: frame.sequence,
                len: frame.data.len(),
            },
        );
    }

    fn release(&self) {
        emit(&self.app, VIEW_RELEASED_EVENT, self.name);
    }
}
