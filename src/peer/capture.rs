//! Захват для loopback-демо: тестовая картинка вместо камеры и тишина Opus
//! вместо микрофона. Кадры идут в треки с частотой захвата и дублируются в
//! local preview.

use crate::config::CaptureConfig;
use crate::error::{Error, Result};
use crate::peer::engine::{Capture, RenderTarget, VideoFrame};
use crate::peer::state::{AUDIO_TRACK_ID, LOCAL_STREAM_ID, VIDEO_TRACK_ID};
use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Длительность одного Opus-кадра
const AUDIO_FRAME: Duration = Duration::from_millis(20);

/// Opus DTX-кадр тишины
const OPUS_SILENCE: &[u8] = &[0xf8, 0xff, 0xfe];

/// Размер кадра тестовой картинки не зависит от разрешения
const PATTERN_FRAME_LEN: usize = 1200;

pub struct SyntheticCapture {
    video: Arc<TrackLocalStaticSample>,
    audio: Arc<TrackLocalStaticSample>,
    tasks: Vec<JoinHandle<()>>,
}

impl SyntheticCapture {
    pub fn start(config: CaptureConfig, preview: Option<Arc<dyn RenderTarget>>) -> Result<Self> {
        if config.fps == 0 {
            return Err(Error::Capture("capture fps must be positive".into()));
        }

        let video = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                ..Default::default()
            },
            VIDEO_TRACK_ID.to_owned(),
            LOCAL_STREAM_ID.to_owned(),
        ));
        let audio = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                ..Default::default()
            },
            AUDIO_TRACK_ID.to_owned(),
            LOCAL_STREAM_ID.to_owned(),
        ));

        info!(
            "capture started: {}x{}@{}",
            config.width, config.height, config.fps
        );
        let tasks = vec![
            tokio::spawn(run_video(video.clone(), config, preview)),
            tokio::spawn(run_audio(audio.clone())),
        ];

        Ok(Self { video, audio, tasks })
    }

    pub fn tracks(&self) -> Vec<Arc<TrackLocalStaticSample>> {
        vec![self.audio.clone(), self.video.clone()]
    }
}

#[async_trait]
impl Capture for SyntheticCapture {
    async fn stop(&mut self) -> Result<()> {
        let mut interrupted = false;
        for task in self.tasks.drain(..) {
            task.abort();
            if let Err(e) = task.await {
                if e.is_panic() {
                    warn!("capture task panicked: {e}");
                    interrupted = true;
                }
            }
        }
        info!("capture stopped");
        if interrupted {
            return Err(Error::Capture("capture interrupted while stopping".into()));
        }
        Ok(())
    }
}

impl Drop for SyntheticCapture {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Кадр тестовой картинки: байт-заполнитель меняется с каждым кадром
pub fn pattern_frame(sequence: u64) -> Bytes {
    Bytes::from(vec![(sequence % 256) as u8; PATTERN_FRAME_LEN])
}

async fn run_video(
    track: Arc<TrackLocalStaticSample>,
    config: CaptureConfig,
    preview: Option<Arc<dyn RenderTarget>>,
) {
    let frame_duration = Duration::from_secs(1) / config.fps;
    let mut ticker = tokio::time::interval(frame_duration);
    let mut sequence = 0u64;
    loop {
        ticker.tick().await;
        let data = pattern_frame(sequence);
        if let Some(preview) = &preview {
            preview.render(&VideoFrame {
                track_id: VIDEO_TRACK_ID.to_owned(),
                sequence,
                data: data.clone(),
            });
        }
        if let Err(e) = track
            .write_sample(&Sample {
                data,
                duration: frame_duration,
                ..Default::default()
            })
            .await
        {
            debug!("video sample dropped: {e}");
        }
        sequence += 1;
    }
}

async fn run_audio(track: Arc<TrackLocalStaticSample>) {
    let mut ticker = tokio::time::interval(AUDIO_FRAME);
    loop {
        ticker.tick().await;
        if let Err(e) = track
            .write_sample(&Sample {
                data: Bytes::from_static(OPUS_SILENCE),
                duration: AUDIO_FRAME,
                ..Default::default()
            })
            .await
        {
            debug!("audio sample dropped: {e}");
        }
    }
}
