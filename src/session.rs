//! Одноразовый loopback-звонок: захват, две стороны, offer/answer, trickle ICE.
//!
//! Сессия живёт в одной задаче tokio (driver), которая владеет relay и всем
//! состоянием сторон. `start()`/`stop()` только кладут команду в канал.
//! Асинхронные шаги движка (create-offer, create-answer, set-*-description)
//! выполняются отдельными задачами и возвращают результат driver'у
//! сообщением, поэтому переходы состояний видны в одном месте.

use crate::error::{DescriptionStep, Error, Result};
use crate::logger::dump_description;
use crate::peer::engine::{Capture, Connection, EngineEvent, MediaEngine, RenderTarget};
use crate::peer::state::SessionState;
use crate::peer::types::{EndpointRole, RemoteTrack, SdpType, SessionDescription};
use crate::signaling::SignalingRelay;
use crate::utils::random_id;
use log::{debug, error, info, warn};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Уведомления для UI shell
pub trait SessionObserver: Send + Sync {
    fn on_state(&self, _state: SessionState) {}

    /// Единственное терминальное уведомление об ошибке сессии
    fn on_failure(&self, _error: &Error) {}

    fn on_remote_track(&self, _track: &RemoteTrack) {}
}

/// Наблюдатель, который только пишет в лог
pub struct LogObserver;

impl SessionObserver for LogObserver {
    fn on_state(&self, state: SessionState) {
        info!("session state: {state}");
    }

    fn on_failure(&self, error: &Error) {
        error!("session failed: {error}");
    }

    fn on_remote_track(&self, track: &RemoteTrack) {
        info!("{} receiving {:?} track {}", track.endpoint, track.kind, track.track_id);
    }
}

/// View для local preview и remote video; при `remote: None` принятое видео не рисуем
#[derive(Clone, Default)]
pub struct RenderTargets {
    pub local: Option<Arc<dyn RenderTarget>>,
    pub remote: Option<Arc<dyn RenderTarget>>,
}

impl RenderTargets {
    fn release(&self) {
        for target in [&self.local, &self.remote].into_iter().flatten() {
            target.release();
        }
    }
}

#[derive(Debug)]
enum Command {
    Start,
    Stop,
}

/// Результат асинхронного шага движка
#[derive(Debug)]
enum Step {
    OfferCreated(SessionDescription),
    AnswerCreated(SessionDescription),
    LocalDescriptionSet(EndpointRole, SessionDescription),
    RemoteDescriptionSet(EndpointRole, SessionDescription),
    Failed(Error),
}

/// Хэндл сессии. Drop хэндла закрывает сессию так же, как `stop()`.
pub struct Session {
    id: String,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionState>,
}

impl Session {
    /// Запускает driver; должен вызываться внутри tokio runtime
    pub fn new<E: MediaEngine>(
        engine: Arc<E>,
        targets: RenderTargets,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        let id = random_id();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::unbounded_channel();
        let (steps, step_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(SessionState::Idle);

        let driver = Driver {
            id: id.clone(),
            relay: SignalingRelay::new(engine.clone(), events),
            engine,
            capture: None,
            started: false,
            pending_answer: None,
            targets,
            observer,
            state: state_tx,
            steps,
        };
        tokio::spawn(driver.run(command_rx, event_rx, step_rx));

        Self {
            id,
            commands,
            state,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Не блокирует; повторный вызов вне Idle игнорируется
    pub fn start(&self) {
        self.send(Command::Start);
    }

    /// Не блокирует; в Closed ничего не делает
    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("session {}: already finished", self.id);
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Ждёт состояние, удовлетворяющее `predicate`; после завершения driver'а
    /// возвращает последнее состояние
    pub async fn wait_for(&self, predicate: impl FnMut(&SessionState) -> bool) -> SessionState {
        let mut state = self.state.clone();
        if let Ok(current) = state.wait_for(predicate).await {
            return *current;
        }
        let last = *state.borrow();
        last
    }
}

struct Driver<E: MediaEngine> {
    id: String,
    engine: Arc<E>,
    relay: SignalingRelay<E>,
    capture: Option<E::Capture>,
    /// view инициализированы, их нужно отпустить при закрытии
    started: bool,
    /// answer ждёт, пока у local не установится свой offer
    pending_answer: Option<SessionDescription>,
    targets: RenderTargets,
    observer: Arc<dyn SessionObserver>,
    state: watch::Sender<SessionState>,
    steps: mpsc::UnboundedSender<Step>,
}

impl<E: MediaEngine> Driver<E> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<EngineEvent>,
        mut steps: mpsc::UnboundedReceiver<Step>,
    ) {
        debug!("session {}: driver started", self.id);
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Start) => self.start().await,
                    Some(Command::Stop) => self.shutdown().await,
                    None => {
                        debug!("session {}: handle dropped", self.id);
                        self.shutdown().await;
                    }
                },
                Some(event) = events.recv() => self.on_engine_event(event).await,
                Some(step) = steps.recv() => self.on_step(step).await,
            }

            if self.current().is_closed() {
                break;
            }
        }
        debug!("session {}: driver finished", self.id);
    }

    fn current(&self) -> SessionState {
        *self.state.borrow()
    }

    fn transition(&mut self, next: SessionState) {
        let current = self.current();
        if !current.can_transition_to(next) {
            warn!("session {}: ignoring transition {current} -> {next}", self.id);
            return;
        }
        info!("session {}: {current} -> {next}", self.id);
        self.state.send_replace(next);
        self.observer.on_state(next);
    }

    async fn start(&mut self) {
        if self.current() != SessionState::Idle {
            debug!("session {}: start ignored in {}", self.id, self.current());
            return;
        }
        if let Err(e) = self.bootstrap().await {
            self.fail(e).await;
        }
    }

    /// Захват → две стороны → треки в local → create-offer
    async fn bootstrap(&mut self) -> Result<()> {
        info!("session {}: starting", self.id);
        self.started = true;
        let capture = self.engine.start_capture(self.targets.local.clone()).await?;
        let capture = self.capture.insert(capture);

        self.relay.create_endpoint(EndpointRole::Local, None).await?;
        self.relay
            .create_endpoint(EndpointRole::Remote, self.targets.remote.clone())
            .await?;

        let local = self.relay.connection(EndpointRole::Local)?;
        self.engine.attach_media(&local, capture).await?;

        self.transition(SessionState::Offering);
        self.spawn_step(async move {
            match local.create_offer().await {
                Ok(offer) => Step::OfferCreated(offer),
                Err(e) => Step::Failed(e),
            }
        });
        Ok(())
    }

    fn spawn_step<F>(&self, step: F)
    where
        F: Future<Output = Step> + Send + 'static,
    {
        let steps = self.steps.clone();
        tokio::spawn(async move {
            // driver мог уже завершиться: результат никому не нужен
            let _ = steps.send(step.await);
        });
    }

    fn set_local(&self, role: EndpointRole, desc: SessionDescription) -> Result<()> {
        let connection = self.relay.connection(role)?;
        self.spawn_step(async move {
            match connection.set_local_description(desc.clone()).await {
                Ok(()) => Step::LocalDescriptionSet(role, desc),
                Err(e) => Step::Failed(e),
            }
        });
        Ok(())
    }

    fn set_remote(&self, role: EndpointRole, desc: SessionDescription) -> Result<()> {
        let connection = self.relay.connection(role)?;
        self.spawn_step(async move {
            match connection.set_remote_description(desc.clone()).await {
                Ok(()) => Step::RemoteDescriptionSet(role, desc),
                Err(e) => Step::Failed(e),
            }
        });
        Ok(())
    }

    fn create_answer(&self) -> Result<()> {
        let remote = self.relay.connection(EndpointRole::Remote)?;
        self.spawn_step(async move {
            match remote.create_answer().await {
                Ok(answer) => Step::AnswerCreated(answer),
                Err(e) => Step::Failed(e),
            }
        });
        Ok(())
    }

    async fn on_step(&mut self, step: Step) {
        let state = self.current();
        if state.is_closed() {
            debug!("session {}: late {:?} ignored", self.id, step);
            return;
        }
        if let Err(e) = self.advance(state, step).await {
            self.fail(e).await;
        }
    }

    async fn advance(&mut self, state: SessionState, step: Step) -> Result<()> {
        match (state, step) {
            (_, Step::Failed(e)) => return Err(e),

            (SessionState::Offering, Step::OfferCreated(offer)) => {
                dump_description("offer", &offer);
                self.transition(SessionState::Answering);
                self.set_local(EndpointRole::Local, offer.clone())?;
                self.set_remote(EndpointRole::Remote, offer)?;
            }

            (SessionState::Answering, Step::LocalDescriptionSet(role, desc)) => {
                debug!("{role}: local description set ({:?})", desc.sdp_type);
                self.relay.local_description_applied(role, desc);
                if role == EndpointRole::Local {
                    if let Some(answer) = self.pending_answer.take() {
                        self.set_remote(EndpointRole::Local, answer)?;
                    }
                }
                self.check_connected();
            }

            (SessionState::Answering, Step::RemoteDescriptionSet(role, desc)) => {
                debug!("{role}: remote description set ({:?})", desc.sdp_type);
                let is_offer = desc.sdp_type == SdpType::Offer;
                self.relay.remote_description_applied(role, desc).await;
                if role == EndpointRole::Remote && is_offer {
                    // answer можно создавать только после remote offer
                    self.create_answer()?;
                }
                self.check_connected();
            }

            (SessionState::Answering, Step::AnswerCreated(answer)) => {
                dump_description("answer", &answer);
                self.set_local(EndpointRole::Remote, answer.clone())?;
                if self.local_offer_applied() {
                    self.set_remote(EndpointRole::Local, answer)?;
                } else {
                    debug!("session {}: answer held until local offer is set", self.id);
                    self.pending_answer = Some(answer);
                }
            }

            (state, step) => {
                warn!("session {}: unexpected {:?} in {state}", self.id, step);
            }
        }
        Ok(())
    }

    fn local_offer_applied(&self) -> bool {
        self.relay
            .endpoint(EndpointRole::Local)
            .is_some_and(|local| local.local_description().is_some())
    }

    fn check_connected(&mut self) {
        if self.current() == SessionState::Answering && self.relay.is_negotiated() {
            let stats = self.relay.stats();
            info!(
                "session {}: negotiated; candidates relayed: {} host, {} srflx, {} relay",
                self.id, stats.host, stats.srflx, stats.relay
            );
            self.transition(SessionState::Connected);
        }
    }

    async fn on_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::IceCandidate(candidate) => {
                let from = candidate.origin;
                let delivery = self.relay.relay_ice_candidate(from, candidate).await;
                debug!("{from}: candidate {:?}", delivery);
            }
            EngineEvent::RemoteTrack(track) => {
                if !self.current().is_closed() {
                    self.observer.on_remote_track(&track);
                }
            }
            EngineEvent::ConnectionState { endpoint, state } => {
                debug!("{endpoint}: peer connection state {state}");
            }
        }
    }

    async fn fail(&mut self, error: Error) {
        if self.current().is_closed() {
            return;
        }
        error!("session {}: {error}", self.id);
        self.observer.on_failure(&error);
        self.shutdown().await;
    }

    /// Освобождает стороны, захват и view ровно один раз
    async fn shutdown(&mut self) {
        if self.current().is_closed() {
            return;
        }
        info!("session {}: closing", self.id);
        self.pending_answer = None;
        self.relay.close().await;
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.stop().await {
                warn!("session {}: {e}", self.id);
            }
        }
        if self.started {
            self.targets.release();
        }
        self.transition(SessionState::Closed);
    }
}

/// Шаг, на котором оборвался handshake, для логов shell
pub fn failed_step(error: &Error) -> Option<DescriptionStep> {
    match error {
        Error::Description { step, .. } => Some(*step),
        _ => None,
    }
}
