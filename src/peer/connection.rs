use crate::config::{RtcSettings, SessionConfig};
use crate::error::{DescriptionStep, Error, Result};
use crate::peer::capture::SyntheticCapture;
use crate::peer::engine::{Connection, EngineEvent, EngineEvents, MediaEngine, RenderTarget, VideoFrame};
use crate::peer::types::{EndpointRole, IceCandidate, MediaKind, RemoteTrack, SdpType, ServerConfig, SessionDescription};
use crate::utils::add_ice_url_scheme;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine as CodecRegistry;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice::network_type::NetworkType;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Media engine на `webrtc`: общий API (кодеки, интерсепторы) на обе стороны
pub struct WebRtcEngine {
    api: API,
    config: SessionConfig,
}

impl WebRtcEngine {
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;

        let mut media = CodecRegistry::default();
        media
            .register_default_codecs()
            .map_err(|e| Error::Engine(e.to_string()))?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media)
            .map_err(|e| Error::Engine(e.to_string()))?;

        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .with_setting_engine(setting_engine(&config.rtc))
            .build();

        Ok(Self { api, config })
    }
}

/// TCP-кандидаты выключены, loopback по желанию (оба пира в одном процессе)
fn setting_engine(rtc: &RtcSettings) -> SettingEngine {
    let mut settings = SettingEngine::default();
    let mut network_types = vec![NetworkType::Udp4, NetworkType::Udp6];
    if rtc.tcp_candidates {
        network_types.extend([NetworkType::Tcp4, NetworkType::Tcp6]);
    }
    settings.set_network_types(network_types);
    settings.set_include_loopback_candidate(rtc.include_loopback);
    settings
}

/// Создает конфигурацию для peer connection
fn rtc_config(config: &SessionConfig) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: get_user_ice_servers(&config.ice_servers),
        bundle_policy: if config.rtc.bundle_max {
            RTCBundlePolicy::MaxBundle
        } else {
            RTCBundlePolicy::Balanced
        },
        rtcp_mux_policy: if config.rtc.rtcp_mux_require {
            RTCRtcpMuxPolicy::Require
        } else {
            RTCRtcpMuxPolicy::Negotiate
        },
        ..Default::default()
    }
}

/// Пользовательские STUN/TURN серверы в формате webrtc
pub fn get_user_ice_servers(servers: &[ServerConfig]) -> Vec<RTCIceServer> {
    servers
        .iter()
        .map(|config| RTCIceServer {
            urls: vec![add_ice_url_scheme(config)],
            username: config.username.clone().unwrap_or_default(),
            credential: config.credential.clone().unwrap_or_default(),
            ..Default::default()
        })
        .collect()
}

fn to_rtc(desc: SessionDescription) -> webrtc::error::Result<RTCSessionDescription> {
    match desc.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp),
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp),
    }
}

fn candidate_from(origin: EndpointRole, cand: &RTCIceCandidate) -> Option<IceCandidate> {
    match cand.to_json() {
        Ok(init) => Some(IceCandidate {
            candidate: init.candidate,
            sdp_mid: init.sdp_mid,
            sdp_mline_index: init.sdp_mline_index,
            origin,
        }),
        Err(e) => {
            warn!("{origin}: failed to serialize candidate: {e}");
            None
        }
    }
}

/// Peer connection одной стороны
pub struct WebRtcConnection {
    role: EndpointRole,
    pc: Arc<RTCPeerConnection>,
}

impl WebRtcConnection {
    fn step_error(&self, step: DescriptionStep) -> impl FnOnce(webrtc::Error) -> Error {
        let role = self.role;
        move |e| Error::step_failed(role, step, e)
    }
}

#[async_trait]
impl Connection for WebRtcConnection {
    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(self.step_error(DescriptionStep::CreateOffer))?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(self.step_error(DescriptionStep::CreateAnswer))?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        let step = DescriptionStep::SetLocalDescription;
        let desc = to_rtc(desc).map_err(self.step_error(step))?;
        self.pc
            .set_local_description(desc)
            .await
            .map_err(self.step_error(step))
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        let step = DescriptionStep::SetRemoteDescription;
        let desc = to_rtc(desc).map_err(self.step_error(step))?;
        self.pc
            .set_remote_description(desc)
            .await
            .map_err(self.step_error(step))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: None,
        };
        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| Error::Candidate {
                endpoint: self.role,
                reason: e.to_string(),
            })
    }

    async fn close(&self) {
        if let Err(e) = self.pc.close().await {
            warn!("{}: failed to close peer connection: {e}", self.role);
        }
    }
}

#[async_trait]
impl MediaEngine for WebRtcEngine {
    type Connection = WebRtcConnection;
    type Capture = SyntheticCapture;

    async fn create_connection(
        &self,
        endpoint: EndpointRole,
        events: EngineEvents,
        sink: Option<Arc<dyn RenderTarget>>,
    ) -> Result<WebRtcConnection> {
        let pc = self
            .api
            .new_peer_connection(rtc_config(&self.config))
            .await
            .map_err(|e| Error::EndpointCreation {
                endpoint,
                reason: e.to_string(),
            })?;
        let pc = Arc::new(pc);

        // Trickle ICE: каждый локальный кандидат уходит в relay
        let candidate_events = events.clone();
        pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
            match cand.as_ref().and_then(|c| candidate_from(endpoint, c)) {
                Some(candidate) => {
                    let _ = candidate_events.send(EngineEvent::IceCandidate(candidate));
                }
                None if cand.is_none() => {
                    debug!("{endpoint}: ICE candidate gathering completed");
                }
                None => {}
            }
            Box::pin(async {})
        }));

        let state_events = events.clone();
        pc.on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
            let _ = state_events.send(EngineEvent::ConnectionState {
                endpoint,
                state: st.to_string(),
            });
            Box::pin(async {})
        }));

        pc.on_track(Box::new(move |track: Arc<TrackRemote>, _receiver, _transceiver| {
            let kind = match track.kind() {
                RTPCodecType::Video => MediaKind::Video,
                _ => MediaKind::Audio,
            };
            let _ = events.send(EngineEvent::RemoteTrack(RemoteTrack {
                endpoint,
                kind,
                track_id: track.id(),
                stream_id: track.stream_id(),
            }));

            if kind == MediaKind::Video {
                if let Some(sink) = sink.clone() {
                    tokio::spawn(render_remote(endpoint, track, sink));
                }
            }
            Box::pin(async {})
        }));

        Ok(WebRtcConnection { role: endpoint, pc })
    }

    async fn start_capture(&self, preview: Option<Arc<dyn RenderTarget>>) -> Result<SyntheticCapture> {
        SyntheticCapture::start(self.config.capture, preview)
    }

    async fn attach_media(&self, connection: &WebRtcConnection, capture: &SyntheticCapture) -> Result<()> {
        for track in capture.tracks() {
            let id = track.id().to_owned();
            let rtp_sender = connection
                .pc
                .add_track(track as Arc<dyn TrackLocal + Send + Sync>)
                .await
                .map_err(|e| Error::Capture(format!("attach track {id}: {e}")))?;

            // RTCP нужно вычитывать, иначе интерсепторы (NACK и т.п.) не работают
            tokio::spawn(async move {
                let mut rtcp_buf = vec![0u8; 1500];
                while let Ok((_, _)) = rtp_sender.read(&mut rtcp_buf).await {}
            });
            info!("{}: attached track {id}", connection.role);
        }
        Ok(())
    }
}

/// Принятое видео → remote view, пока трек жив
async fn render_remote(endpoint: EndpointRole, track: Arc<TrackRemote>, sink: Arc<dyn RenderTarget>) {
    let track_id = track.id();
    let mut sequence = 0u64;
    while let Ok((packet, _)) = track.read_rtp().await {
        sink.render(&VideoFrame {
            track_id: track_id.clone(),
            sequence,
            data: packet.payload,
        });
        sequence += 1;
    }
    debug!("{endpoint}: remote track {track_id} ended after {sequence} packets");
}
