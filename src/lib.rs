pub mod config;
pub mod error;
pub mod headless;
pub mod logger;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod utils;

#[cfg(feature = "shell")]
pub mod commands;

#[cfg(test)]
mod testing;

pub use config::SessionConfig;
pub use error::{DescriptionStep, Error, Result};
pub use peer::{EndpointRole, MediaEngine, RenderTarget, SessionState, WebRtcEngine};
pub use session::{failed_step, LogObserver, RenderTargets, Session, SessionObserver};
pub use signaling::SignalingRelay;

#[cfg(feature = "shell")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    logger::init_logging();
    let config = match SessionConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}, using defaults");
            SessionConfig::default()
        }
    };

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .manage(commands::ShellState::new(config))
        .invoke_handler(tauri::generate_handler![
            commands::start_session,
            commands::stop_session,
            commands::session_state,
            commands::is_connected,
            commands::set_ice_servers,
            commands::get_ice_servers,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}

/// Без окна: один loopback-звонок с выводом в лог
#[cfg(not(feature = "shell"))]
pub fn run() {
    logger::init_logging();
    let config = match SessionConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("failed to start tokio runtime: {e}");
            return;
        }
    };
    match runtime.block_on(headless::run_loopback(config)) {
        Ok(report) => log::info!(
            "loopback finished: reached {}, {} local / {} remote frames",
            report.reached,
            report.local_frames,
            report.remote_frames
        ),
        Err(e) => log::error!("loopback failed: {e}"),
    }
}
