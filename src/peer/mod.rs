pub mod capture;
pub mod connection;
pub mod endpoint;
pub mod engine;
pub mod ice;
pub mod state;
pub mod types;

pub use capture::SyntheticCapture;
pub use connection::{WebRtcConnection, WebRtcEngine};
pub use endpoint::Endpoint;
pub use engine::{Capture, Connection, EngineEvent, EngineEvents, MediaEngine, RenderTarget, VideoFrame};
pub use ice::Delivery;
pub use state::{SessionState, AUDIO_TRACK_ID, LOCAL_STREAM_ID, VIDEO_TRACK_ID};
pub use types::{EndpointRole, IceCandidate, MediaKind, RemoteTrack, SdpType, ServerConfig, SessionDescription};
