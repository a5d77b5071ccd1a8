use serde::Serialize;
use std::fmt;

/// ========== CONSTANTS ==========

/// ID локального MediaStream
pub const LOCAL_STREAM_ID: &str = "102";

pub const VIDEO_TRACK_ID: &str = "VideoTrack";

pub const AUDIO_TRACK_ID: &str = "AudioTrack";

/// ========== SESSION STATE ==========

/// Состояние одноразового loopback-звонка
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Offering,
    Answering,
    Connected,
    Closed,
}

impl SessionState {
    pub fn is_closed(self) -> bool {
        self == SessionState::Closed
    }

    /// Разрешённые переходы: строго вперёд по handshake, в Closed из любого живого состояния
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Idle, Offering) | (Offering, Answering) | (Answering, Connected) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Offering => "offering",
            SessionState::Answering => "answering",
            SessionState::Connected => "connected",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}
