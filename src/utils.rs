use crate::peer::types::ServerConfig;
use rand::Rng;

/// Идентификатор сессии для логов: 8 случайных байт в hex
pub fn random_id() -> String {
    hex::encode(rand::rng().random::<[u8; 8]>())
}

/// URL сервера для `RTCIceServer`: без `stun:`/`turn:` схема берётся из типа
pub fn add_ice_url_scheme(config: &ServerConfig) -> String {
    if ["stun:", "turn:"].iter().any(|s| config.url.starts_with(s)) {
        return config.url.clone();
    }
    match config.r#type.as_str() {
        "turn" => format!("turn:{}", config.url),
        _ => format!("stun:{}", config.url),
    }
}
