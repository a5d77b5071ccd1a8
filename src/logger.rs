use crate::peer::types::{IceCandidate, SessionDescription};
use log::debug;
use std::io::Write;

/// Логирование с временными метками
///
/// Фильтр по умолчанию `demowebrtc_lib=debug,webrtc=warn`, переопределяется
/// через `RUST_LOG`. В release-сборке логирование выключено.
pub fn init_logging() {
    if !crate::config::LOGGING_ENABLED || !crate::config::dev::ENABLE_LOGGING {
        return;
    }

    let env = env_logger::Env::default().default_filter_or("demowebrtc_lib=debug,webrtc=warn");
    let _ = env_logger::Builder::from_env(env)
        .format(|buf, record| {
            writeln!(
                buf,
                "RUST: [{}] {:<5} {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .try_init();
}

/// Печать ICE-candidate при появлении (Trickle-ICE)
pub fn dump_candidate(label: &str, cand: &IceCandidate) {
    debug!(
        "Trickle {label}: candidate={} sdp_mid={:?} sdp_mline_index={:?}",
        cand.candidate, cand.sdp_mid, cand.sdp_mline_index
    );
}

/// Краткая сводка SDP: тип, число строк и m-секций
pub fn dump_description(label: &str, desc: &SessionDescription) {
    let lines = desc.sdp.lines().count();
    let media = desc.sdp.lines().filter(|l| l.starts_with("m=")).count();
    debug!(
        "SDP {label}: type={:?} lines={lines} media_sections={media}",
        desc.sdp_type
    );
}
