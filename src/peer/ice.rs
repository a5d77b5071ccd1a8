use crate::peer::endpoint::Endpoint;
use crate::peer::engine::Connection;
use crate::peer::types::IceCandidate;
use log::{debug, warn};

/// Что relay сделал с кандидатом
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Remote description уже есть, кандидат отдан движку
    Applied,
    /// Отложен до установки remote description
    Buffered,
    /// Сессия закрыта или получателя нет
    Dropped,
}

impl<C: Connection> Endpoint<C> {
    /// Принимает кандидат от другой стороны
    pub(crate) async fn receive_candidate(&mut self, candidate: IceCandidate) -> Delivery {
        if self.remote_description.is_some() {
            self.apply_candidate(candidate).await;
            Delivery::Applied
        } else {
            debug!(
                "{}: remote description not set yet, queuing candidate ({} pending)",
                self.role,
                self.pending.len() + 1
            );
            self.pending.push_back(candidate);
            Delivery::Buffered
        }
    }

    /// Применяет все отложенные кандидаты в порядке поступления
    pub(crate) async fn apply_pending_candidates(&mut self) -> usize {
        let candidates: Vec<IceCandidate> = self.pending.drain(..).collect();
        let count = candidates.len();
        for candidate in candidates {
            debug!("{}: applying pending candidate {}", self.role, candidate.candidate);
            self.apply_candidate(candidate).await;
        }
        count
    }

    async fn apply_candidate(&self, candidate: IceCandidate) {
        if let Err(e) = self.connection.add_ice_candidate(candidate).await {
            warn!("{}: failed to add ICE candidate: {}", self.role, e);
        }
    }
}

/// Грубая классификация кандидатов для логов
pub fn analyze_candidates<'a>(candidates: impl IntoIterator<Item = &'a IceCandidate>) -> (usize, usize, usize) {
    let mut host_count = 0;
    let mut srflx_count = 0;
    let mut relay_count = 0;

    for candidate in candidates {
        if candidate.candidate.contains("typ host") {
            host_count += 1;
        } else if candidate.candidate.contains("typ srflx") {
            srflx_count += 1;
        } else if candidate.candidate.contains("typ relay") {
            relay_count += 1;
        }
    }

    (host_count, srflx_count, relay_count)
}
