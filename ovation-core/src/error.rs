use thiserror::Error;

/// All errors produced by ovation-core.
#[derive(Debug, Error)]
pub enum OvationError {
    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default input device found")]
    NoDefaultInputDevice,

    #[error("capture source unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("failed to read audio block: {0}")]
    CaptureRead(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OvationError {
    /// Whether this error came from acquiring a capture resource (as opposed
    /// to reading from one that was already held).
    pub fn is_acquisition(&self) -> bool {
        matches!(
            self,
            OvationError::AudioDevice(_)
                | OvationError::AudioStream(_)
                | OvationError::NoDefaultInputDevice
                | OvationError::CaptureUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, OvationError>;
