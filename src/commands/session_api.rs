use crate::commands::events::{EventView, TauriObserver};
use crate::config::{validate_ice_servers, SessionConfig};
use crate::peer::connection::WebRtcEngine;
use crate::peer::engine::RenderTarget;
use crate::peer::state::SessionState;
use crate::peer::types::ServerConfig;
use crate::session::{RenderTargets, Session};
use log::info;
use std::sync::{Arc, Mutex};
use tauri::{command, AppHandle, State};

/// Состояние окна: текущая сессия и конфиг для следующей
pub struct ShellState {
    session: Mutex<Option<Session>>,
    config: Mutex<SessionConfig>,
}

impl ShellState {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            session: Mutex::new(None),
            config: Mutex::new(config),
        }
    }
}

fn poisoned<T>(_: T) -> String {
    "shell state poisoned".to_owned()
}

/// Запускает звонок; пока текущая сессия не закрыта, новая не создаётся
#[command]
pub async fn start_session(
    app: AppHandle,
    shell: State<'_, ShellState>,
) -> Result<SessionState, String> {
    let config = shell.config.lock().map_err(poisoned)?.clone();
    let mut slot = shell.session.lock().map_err(poisoned)?;
    if let Some(session) = slot.as_ref() {
        if !session.state().is_closed() {
            info!("session {} still running, start ignored", session.id());
            return Ok(session.state());
        }
    }

    let render_remote = config.render_remote;
    let engine = Arc::new(WebRtcEngine::new(config).map_err(|e| e.to_string())?);
    let targets = RenderTargets {
        local: Some(Arc::new(EventView::new(app.clone(), "local")) as Arc<dyn RenderTarget>),
        remote: render_remote
            .then(|| Arc::new(EventView::new(app.clone(), "remote")) as Arc<dyn RenderTarget>),
    };
    let session = Session::new(engine, targets, Arc::new(TauriObserver::new(app)));
    session.start();
    let state = session.state();
    *slot = Some(session);
    Ok(state)
}

#[command]
pub fn stop_session(shell: State<'_, ShellState>) -> Result<bool, String> {
    let slot = shell.session.lock().map_err(poisoned)?;
    match slot.as_ref() {
        Some(session) => {
            session.stop();
            Ok(true)
        }
        None => Ok(false),
    }
}

#[command]
pub fn session_state(shell: State<'_, ShellState>) -> Result<SessionState, String> {
    let slot = shell.session.lock().map_err(poisoned)?;
    Ok(slot
        .as_ref()
        .map(Session::state)
        .unwrap_or(SessionState::Idle))
}

#[command]
pub fn is_connected(shell: State<'_, ShellState>) -> Result<bool, String> {
    let slot = shell.session.lock().map_err(poisoned)?;
    Ok(slot.as_ref().is_some_and(Session::is_connected))
}

/// Применяется к следующей сессии
#[command]
pub fn set_ice_servers(
    shell: State<'_, ShellState>,
    servers: Vec<ServerConfig>,
) -> Result<(), String> {
    validate_ice_servers(&servers).map_err(|e| e.to_string())?;
    let mut config = shell.config.lock().map_err(poisoned)?;
    info!("ice servers updated: {}", servers.len());
    config.ice_servers = servers;
    Ok(())
}

#[command]
pub fn get_ice_servers(shell: State<'_, ShellState>) -> Result<Vec<ServerConfig>, String> {
    Ok(shell.config.lock().map_err(poisoned)?.ice_servers.clone())
}
