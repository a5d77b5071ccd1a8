//! Внутрипроцессный signaling: две стороны, SDP и trickle ICE между ними
//! без сериализации и без сети.

use crate::error::{Error, Result};
use crate::logger::dump_candidate;
use crate::peer::endpoint::Endpoint;
use crate::peer::engine::{EngineEvents, MediaEngine, RenderTarget};
use crate::peer::ice::{analyze_candidates, Delivery};
use crate::peer::types::{EndpointRole, IceCandidate, SessionDescription};
use log::{debug, info};
use std::sync::Arc;

type EndpointOf<E> = Endpoint<<E as MediaEngine>::Connection>;

/// Счётчики типов relay-кандидатов за сессию
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CandidateStats {
    pub host: usize,
    pub srflx: usize,
    pub relay: usize,
}

pub struct SignalingRelay<E: MediaEngine> {
    engine: Arc<E>,
    events: EngineEvents,
    local: Option<EndpointOf<E>>,
    remote: Option<EndpointOf<E>>,
    stats: CandidateStats,
    closed: bool,
}

impl<E: MediaEngine> SignalingRelay<E> {
    /// `events` уходит в каждое создаваемое соединение
    pub fn new(engine: Arc<E>, events: EngineEvents) -> Self {
        Self {
            engine,
            events,
            local: None,
            remote: None,
            stats: CandidateStats::default(),
            closed: false,
        }
    }

    fn slot(&self, role: EndpointRole) -> &Option<EndpointOf<E>> {
        match role {
            EndpointRole::Local => &self.local,
            EndpointRole::Remote => &self.remote,
        }
    }

    fn slot_mut(&mut self, role: EndpointRole) -> &mut Option<EndpointOf<E>> {
        match role {
            EndpointRole::Local => &mut self.local,
            EndpointRole::Remote => &mut self.remote,
        }
    }

    pub async fn create_endpoint(
        &mut self,
        role: EndpointRole,
        sink: Option<Arc<dyn RenderTarget>>,
    ) -> Result<&EndpointOf<E>> {
        if self.closed {
            return Err(Error::EndpointCreation {
                endpoint: role,
                reason: "relay is closed".into(),
            });
        }
        if self.slot(role).is_some() {
            return Err(Error::EndpointCreation {
                endpoint: role,
                reason: "endpoint already exists".into(),
            });
        }

        let connection = self
            .engine
            .create_connection(role, self.events.clone(), sink)
            .await?;
        info!("{role}: peer connection created");

        let endpoint = self
            .slot_mut(role)
            .insert(Endpoint::new(role, Arc::new(connection)));
        Ok(&*endpoint)
    }

    pub fn endpoint(&self, role: EndpointRole) -> Option<&EndpointOf<E>> {
        self.slot(role).as_ref()
    }

    /// Хэндл соединения для асинхронных шагов вне relay
    pub fn connection(&self, role: EndpointRole) -> Result<Arc<E::Connection>> {
        self.endpoint(role)
            .map(|ep| ep.connection().clone())
            .ok_or(Error::EndpointUnavailable(role))
    }

    /// Кандидат стороны `from` уходит только её паре, ровно один раз
    pub async fn relay_ice_candidate(
        &mut self,
        from: EndpointRole,
        candidate: IceCandidate,
    ) -> Delivery {
        if self.closed {
            debug!("{from}: relay closed, dropping candidate");
            return Delivery::Dropped;
        }
        dump_candidate(from.label(), &candidate);

        let (host, srflx, relay) = analyze_candidates(std::iter::once(&candidate));
        self.stats.host += host;
        self.stats.srflx += srflx;
        self.stats.relay += relay;

        match self.slot_mut(from.peer()).as_mut() {
            Some(peer) => peer.receive_candidate(candidate).await,
            None => {
                debug!("{}: no endpoint to receive candidate", from.peer());
                Delivery::Dropped
            }
        }
    }

    pub fn local_description_applied(&mut self, role: EndpointRole, desc: SessionDescription) {
        if let Some(ep) = self.slot_mut(role).as_mut() {
            ep.local_description = Some(desc);
        }
    }

    /// Запоминает remote description и сразу применяет очередь кандидатов
    pub async fn remote_description_applied(
        &mut self,
        role: EndpointRole,
        desc: SessionDescription,
    ) -> usize {
        let Some(ep) = self.slot_mut(role).as_mut() else {
            return 0;
        };
        ep.remote_description = Some(desc);
        let flushed = ep.apply_pending_candidates().await;
        if flushed > 0 {
            info!("{role}: flushed {flushed} pending candidates");
        }
        flushed
    }

    /// Обе стороны имеют local и remote description
    pub fn is_negotiated(&self) -> bool {
        [EndpointRole::Local, EndpointRole::Remote]
            .into_iter()
            .all(|role| self.endpoint(role).is_some_and(|ep| ep.is_negotiated()))
    }

    pub fn stats(&self) -> CandidateStats {
        self.stats
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Освобождает обе стороны; повторный вызов ничего не делает
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for ep in [self.local.take(), self.remote.take()].into_iter().flatten() {
            ep.release().await;
        }
    }
}
