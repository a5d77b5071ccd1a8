//! Граница с media engine: peer connection, захват и отрисовка.
//!
//! Сессия работает только через эти трейты, поэтому настоящий движок
//! (`webrtc`) и скриптованный движок в тестах взаимозаменяемы.

use crate::error::Result;
use crate::peer::types::{EndpointRole, IceCandidate, RemoteTrack, SessionDescription};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;

/// События, которые движок присылает из своих потоков
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Trickle ICE: локальный кандидат стороны `origin`
    IceCandidate(IceCandidate),
    RemoteTrack(RemoteTrack),
    ConnectionState {
        endpoint: EndpointRole,
        state: String,
    },
}

pub type EngineEvents = mpsc::UnboundedSender<EngineEvent>;

/// Кадр, отдаваемый в view
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub track_id: String,
    pub sequence: u64,
    pub data: Bytes,
}

/// Поверхность отрисовки (local preview или remote view)
pub trait RenderTarget: Send + Sync {
    fn render(&self, frame: &VideoFrame);

    /// clearImage + release: вызывается ровно один раз при закрытии сессии
    fn release(&self);
}

/// Запущенный пайплайн захвата камеры и микрофона
#[async_trait]
pub trait Capture: Send + Sync + 'static {
    async fn stop(&mut self) -> Result<()>;
}

/// Peer connection одной стороны
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Ошибки закрытия только логируются
    async fn close(&self);
}

#[async_trait]
pub trait MediaEngine: Send + Sync + 'static {
    type Connection: Connection;
    type Capture: Capture;

    /// `sink` получает принятое видео; при `None` remote view не нужен
    async fn create_connection(
        &self,
        endpoint: EndpointRole,
        events: EngineEvents,
        sink: Option<Arc<dyn RenderTarget>>,
    ) -> Result<Self::Connection>;

    async fn start_capture(&self, preview: Option<Arc<dyn RenderTarget>>) -> Result<Self::Capture>;

    /// Добавляет audio/video треки захвата в соединение
    async fn attach_media(&self, connection: &Self::Connection, capture: &Self::Capture) -> Result<()>;
}
