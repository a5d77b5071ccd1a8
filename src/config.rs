// Конфигурация приложения
// Логирование можно отключить только в режиме разработки

use crate::error::{Error, Result};
use crate::peer::types::ServerConfig;
use serde::{Deserialize, Serialize};

#[cfg(debug_assertions)]
pub const LOGGING_ENABLED: bool = true;

#[cfg(not(debug_assertions))]
pub const LOGGING_ENABLED: bool = false;

#[cfg(debug_assertions)]
pub mod dev {
    // Для полного отключения логирования в режиме разработки
    // измените эту константу на false
    pub const ENABLE_LOGGING: bool = true;
}

#[cfg(not(debug_assertions))]
pub mod dev {
    pub const ENABLE_LOGGING: bool = false;
}

/// Переменная окружения с путём к JSON-конфигу
pub const CONFIG_ENV: &str = "DEMOWEBRTC_CONFIG";

/// Настройки сессии loopback-демо
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Пустой список: оба пира в одном процессе, STUN не нужен
    pub ice_servers: Vec<ServerConfig>,
    pub rtc: RtcSettings,
    pub capture: CaptureConfig,
    /// Рисовать ли принятое видео (remote view)
    pub render_remote: bool,
    /// Сколько секунд headless-режим гоняет медиа после соединения
    pub demo_duration_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ice_servers: Vec::new(),
            rtc: RtcSettings::default(),
            capture: CaptureConfig::default(),
            render_remote: true,
            demo_duration_secs: 5,
        }
    }
}

/// Политики peer connection. DTLS-сертификат всегда ECDSA P-256 (значение
/// `webrtc` по умолчанию), кандидаты собираются один раз на соединение.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RtcSettings {
    pub bundle_max: bool,
    pub rtcp_mux_require: bool,
    pub tcp_candidates: bool,
    pub include_loopback: bool,
}

impl Default for RtcSettings {
    fn default() -> Self {
        Self {
            bundle_max: true,
            rtcp_mux_require: true,
            tcp_candidates: false,
            include_loopback: true,
        }
    }
}

/// Формат захвата камеры
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 720,
            fps: 30,
        }
    }
}

impl SessionConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: SessionConfig =
            serde_json::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Читает конфиг из файла `DEMOWEBRTC_CONFIG`, иначе значения по умолчанию
    pub fn load() -> Result<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .map_err(|e| Error::Config(format!("{path}: {e}")))?;
                Self::from_json(&raw)
            }
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.capture.fps == 0 {
            return Err(Error::Config("capture fps must be positive".into()));
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(Error::Config("capture size must be positive".into()));
        }
        validate_ice_servers(&self.ice_servers)
    }
}

/// TURN без логина/пароля бесполезен, пустой URL тоже
pub fn validate_ice_servers(servers: &[ServerConfig]) -> Result<()> {
    for server in servers {
        if server.url.is_empty() {
            return Err(Error::Config(format!("server {} has empty url", server.id)));
        }
        if server.r#type == "turn" && (server.username.is_none() || server.credential.is_none()) {
            return Err(Error::Config(format!(
                "TURN server {} requires username and credential",
                server.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_demo_capture_format() {
        let config = SessionConfig::default();
        assert_eq!(config.capture.width, 1000);
        assert_eq!(config.capture.height, 720);
        assert_eq!(config.capture.fps, 30);
        assert!(config.ice_servers.is_empty());
        assert!(config.render_remote);
        assert!(!config.rtc.tcp_candidates);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            SessionConfig::from_json(r#"{ "render_remote": false, "capture": { "fps": 15 } }"#)
                .unwrap();
        assert!(!config.render_remote);
        assert_eq!(config.capture.fps, 15);
        assert_eq!(config.capture.width, 1000);
        assert!(config.rtc.bundle_max);
    }

    #[test]
    fn rejects_zero_fps() {
        let err = SessionConfig::from_json(r#"{ "capture": { "fps": 0 } }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_turn_without_credentials() {
        let raw = r#"{ "ice_servers": [
            { "id": "t1", "type": "turn", "url": "turn.example.org:3478",
              "username": null, "credential": null } ] }"#;
        let err = SessionConfig::from_json(raw).unwrap_err();
        assert!(err.to_string().contains("t1"));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            SessionConfig::from_json("{ not json"),
            Err(Error::Config(_))
        ));
    }
}
