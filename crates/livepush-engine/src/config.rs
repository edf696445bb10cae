//! Stream configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use livepush_encoder::{AudioEncoderConfig, VideoEncoderConfig};
use livepush_transport::{RtmpTarget, DEFAULT_CONNECT_TIMEOUT_SECS};

use crate::error::SessionError;
use crate::SessionResult;

/// Everything needed to start a push session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Publish URL, `rtmp://host[:port]/app/stream_key`.
    pub url: String,

    /// Bound on TCP connect, handshake and application connect.
    pub connect_timeout_secs: u64,

    /// Video track, if any.
    pub video: Option<VideoEncoderConfig>,

    /// Audio track, if any.
    pub audio: Option<AudioEncoderConfig>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            video: Some(VideoEncoderConfig::default()),
            audio: Some(AudioEncoderConfig::default()),
        }
    }
}

impl StreamConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> SessionResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading stream config");
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> SessionResult<()> {
        RtmpTarget::parse(&self.url)?;

        if self.connect_timeout_secs == 0 {
            return Err(SessionError::InvalidConfig(
                "connect_timeout_secs must be non-zero".to_string(),
            ));
        }
        if self.video.is_none() && self.audio.is_none() {
            return Err(SessionError::InvalidConfig(
                "at least one of video or audio must be configured".to_string(),
            ));
        }
        if let Some(video) = &self.video {
            video.validate()?;
        }
        if let Some(audio) = &self.audio {
            audio.validate()?;
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
