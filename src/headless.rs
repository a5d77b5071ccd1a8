//! Запуск loopback-звонка без UI: view пишут в лог, сессия живёт
//! `demo_duration_secs` после соединения.

use crate::config::SessionConfig;
use crate::error::Result;
use crate::peer::connection::WebRtcEngine;
use crate::peer::engine::{MediaEngine, RenderTarget, VideoFrame};
use crate::peer::state::SessionState;
use crate::session::{LogObserver, RenderTargets, Session, SessionObserver};
use log::{info, warn};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Каждый N-й кадр попадает в лог
const LOG_EVERY: u64 = 30;

/// View, которая только считает кадры
pub struct LoggingView {
    name: &'static str,
    frames: AtomicU64,
    bytes: AtomicU64,
    releases: AtomicUsize,
}

impl LoggingView {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            frames: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            releases: AtomicUsize::new(0),
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::Relaxed)
    }
}

impl RenderTarget for LoggingView {
    fn render(&self, frame: &VideoFrame) {
        let count = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        self.bytes.fetch_add(frame.data.len() as u64, Ordering::Relaxed);
        if count % LOG_EVERY == 0 {
            info!(
                "{}: {} frames, {} bytes ({})",
                self.name,
                count,
                self.bytes.load(Ordering::Relaxed),
                frame.track_id
            );
        }
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
        info!("{}: released after {} frames", self.name, self.frames());
    }
}

/// Итог одного прогона
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopbackReport {
    pub reached: SessionState,
    pub local_frames: u64,
    pub remote_frames: u64,
}

/// Один звонок на WebRTC-движке
pub async fn run_loopback(config: SessionConfig) -> Result<LoopbackReport> {
    let duration = Duration::from_secs(config.demo_duration_secs);
    let render_remote = config.render_remote;
    let engine = Arc::new(WebRtcEngine::new(config)?);
    Ok(run_with_engine(engine, render_remote, duration, Arc::new(LogObserver)).await)
}

pub async fn run_with_engine<E: MediaEngine>(
    engine: Arc<E>,
    render_remote: bool,
    duration: Duration,
    observer: Arc<dyn SessionObserver>,
) -> LoopbackReport {
    let local_view = Arc::new(LoggingView::new("local_view"));
    let remote_view = Arc::new(LoggingView::new("remote_view"));
    let targets = RenderTargets {
        local: Some(local_view.clone() as Arc<dyn RenderTarget>),
        remote: render_remote.then(|| remote_view.clone() as Arc<dyn RenderTarget>),
    };

    let session = Session::new(engine, targets, observer);
    info!("session {}: loopback demo", session.id());
    session.start();

    let reached = session
        .wait_for(|s| matches!(s, SessionState::Connected | SessionState::Closed))
        .await;
    if reached == SessionState::Connected {
        tokio::time::sleep(duration).await;
    } else {
        warn!("session {}: closed before connecting", session.id());
    }

    session.stop();
    session.wait_for(|s| s.is_closed()).await;

    LoopbackReport {
        reached,
        local_frames: local_view.frames(),
        remote_frames: remote_view.frames(),
    }
}
