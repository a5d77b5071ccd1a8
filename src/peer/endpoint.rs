use crate::peer::engine::Connection;
use crate::peer::types::{EndpointRole, IceCandidate, SessionDescription};
use std::collections::VecDeque;
use std::sync::Arc;

/// Одна сторона loopback-соединения. Принадлежит только relay.
pub struct Endpoint<C: Connection> {
    pub(crate) role: EndpointRole,
    pub(crate) connection: Arc<C>,
    pub(crate) local_description: Option<SessionDescription>,
    pub(crate) remote_description: Option<SessionDescription>,
    /// Кандидаты, полученные до установки remote description
    pub(crate) pending: VecDeque<IceCandidate>,
}

impl<C: Connection> Endpoint<C> {
    pub(crate) fn new(role: EndpointRole, connection: Arc<C>) -> Self {
        Self {
            role,
            connection,
            local_description: None,
            remote_description: None,
            pending: VecDeque::new(),
        }
    }

    pub fn connection(&self) -> &Arc<C> {
        &self.connection
    }

    pub fn local_description(&self) -> Option<&SessionDescription> {
        self.local_description.as_ref()
    }

    pub fn remote_description(&self) -> Option<&SessionDescription> {
        self.remote_description.as_ref()
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending.len()
    }

    /// Обе стороны SDP установлены успешно
    pub fn is_negotiated(&self) -> bool {
        self.local_description.is_some() && self.remote_description.is_some()
    }

    /// Закрывает соединение и выбрасывает отложенные кандидаты
    pub(crate) async fn release(mut self) {
        let dropped = self.pending.len();
        self.pending.clear();
        if dropped > 0 {
            log::debug!("{}: dropping {} pending candidates", self.role, dropped);
        }
        self.connection.close().await;
        log::info!("{}: released", self.role);
    }
}
