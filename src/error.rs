use crate::peer::types::EndpointRole;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Шаг обмена SDP, на котором упал media engine
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum DescriptionStep {
    CreateOffer,
    CreateAnswer,
    SetLocalDescription,
    SetRemoteDescription,
}

impl fmt::Display for DescriptionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DescriptionStep::CreateOffer => "create-offer",
            DescriptionStep::CreateAnswer => "create-answer",
            DescriptionStep::SetLocalDescription => "set-local-description",
            DescriptionStep::SetRemoteDescription => "set-remote-description",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Media engine не смог выделить peer connection
    #[error("endpoint {endpoint} could not be created: {reason}")]
    EndpointCreation {
        endpoint: EndpointRole,
        reason: String,
    },

    /// create-offer / create-answer / set-*-description вернул ошибку
    #[error("{step} failed on {endpoint}: {reason}")]
    Description {
        endpoint: EndpointRole,
        step: DescriptionStep,
        reason: String,
    },

    /// Камера/микрофон недоступны или остановка захвата прервана
    #[error("capture error: {0}")]
    Capture(String),

    #[error("ice candidate rejected by {endpoint}: {reason}")]
    Candidate {
        endpoint: EndpointRole,
        reason: String,
    },

    #[error("endpoint {0} is no longer available")]
    EndpointUnavailable(EndpointRole),

    #[error("media engine unavailable: {0}")]
    Engine(String),

    #[error("invalid config: {0}")]
    Config(String),
}

impl Error {
    pub fn step_failed(endpoint: EndpointRole, step: DescriptionStep, reason: impl fmt::Display) -> Self {
        Error::Description {
            endpoint,
            step,
            reason: reason.to_string(),
        }
    }
}
