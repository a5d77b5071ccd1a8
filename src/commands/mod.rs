pub mod events;
pub mod session_api;

pub use session_api::{
    get_ice_servers, is_connected, session_state, set_ice_servers, start_session, stop_session,
    ShellState,
};
