//! H.264 and AAC encoder collaborators.
//!
//! The streaming pipeline treats encoders as black boxes: open with a
//! configuration, feed raw frames, get encoded units back, close on drop.
//! The x264 and fdk-aac backends are compiled in with the `x264` and
//! `fdk-aac` features.

#[cfg(feature = "fdk-aac")]
mod aac;
mod error;
mod frame;
#[cfg(feature = "x264")]
mod x264;

#[cfg(feature = "fdk-aac")]
pub use aac::AacEncoder;
pub use error::EncoderError;
pub use frame::{EncodedVideoFrame, ParameterSets, RawVideoFrame};
#[cfg(feature = "x264")]
pub use x264::X264Encoder;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Result type for encoder operations.
pub type EncoderResult<T> = Result<T, EncoderError>;

/// AAC-LC frame length in samples per channel.
pub const AAC_FRAME_SAMPLES: usize = 1024;

/// Video encoding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoEncoderConfig {
    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// Target frames per second.
    pub fps: u32,

    /// Target bitrate in kbps.
    pub bitrate_kbps: u32,

    /// Keyframe interval in seconds.
    pub keyframe_interval_secs: u32,

    /// H.264 profile.
    pub profile: H264Profile,
}

impl Default for VideoEncoderConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 25,
            bitrate_kbps: 800,
            keyframe_interval_secs: 2,
            profile: H264Profile::Baseline,
        }
    }
}

impl VideoEncoderConfig {
    /// Check dimensions and rates.
    pub fn validate(&self) -> EncoderResult<()> {
        if self.width == 0 || self.height == 0 || self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(EncoderError::InvalidConfig(format!(
                "Dimensions must be non-zero and even, got {}x{}",
                self.width, self.height
            )));
        }
        if self.fps == 0 || self.bitrate_kbps == 0 {
            return Err(EncoderError::InvalidConfig(
                "fps and bitrate must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Keyframe interval in frames.
    pub fn keyframe_interval(&self) -> u32 {
        self.fps * self.keyframe_interval_secs.max(1)
    }
}

/// H.264 profile levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum H264Profile {
    Baseline,
    Main,
    High,
}

/// Audio encoding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEncoderConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,

    /// Number of channels (1 or 2).
    pub channels: u16,

    /// Target bitrate in kbps.
    pub bitrate_kbps: u32,
}

impl Default for AudioEncoderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            bitrate_kbps: 128,
        }
    }
}

impl AudioEncoderConfig {
    /// Check sample rate and channel count.
    pub fn validate(&self) -> EncoderResult<()> {
        if !matches!(self.channels, 1 | 2) {
            return Err(EncoderError::InvalidConfig(format!(
                "Channel count must be 1 or 2, got {}",
                self.channels
            )));
        }
        if self.sample_rate == 0 || self.bitrate_kbps == 0 {
            return Err(EncoderError::InvalidConfig(
                "sample rate and bitrate must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Interleaved 16-bit samples consumed by one encode call.
    pub fn input_samples(&self) -> usize {
        AAC_FRAME_SAMPLES * self.channels as usize
    }
}

/// Trait for video encoders. Dropping the encoder closes it.
pub trait VideoEncoder: Send {
    /// Encode one frame.
    ///
    /// Returns an empty frame while the encoder is still buffering.
    fn encode(&mut self, frame: &RawVideoFrame) -> EncoderResult<EncodedVideoFrame>;

    /// Get encoder name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Trait for audio encoders. Dropping the encoder closes it.
pub trait AudioEncoder: Send {
    /// Encode one frame of interleaved 16-bit PCM.
    ///
    /// Returns `None` while the encoder is still buffering.
    fn encode(&mut self, pcm: &[i16]) -> EncoderResult<Option<Bytes>>;

    /// AudioSpecificConfig describing the encoded stream.
    fn decoder_config(&self) -> Bytes;

    /// Interleaved samples expected per `encode` call.
    fn input_samples(&self) -> usize;

    /// Number of channels.
    fn channels(&self) -> u16;

    /// Get encoder name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Open the x264 video encoder.
#[cfg(feature = "x264")]
pub fn create_video_encoder(config: &VideoEncoderConfig) -> EncoderResult<Box<dyn VideoEncoder>> {
    let encoder = X264Encoder::new(config.clone())?;
    tracing::info!("Using x264 software encoder");
    Ok(Box::new(encoder))
}

/// Open a video encoder (stub without the `x264` feature).
#[cfg(not(feature = "x264"))]
pub fn create_video_encoder(_config: &VideoEncoderConfig) -> EncoderResult<Box<dyn VideoEncoder>> {
    Err(EncoderError::NotSupported(
        "Video encoding requires the x264 feature".into(),
    ))
}

/// Open the AAC audio encoder.
#[cfg(feature = "fdk-aac")]
pub fn create_audio_encoder(config: &AudioEncoderConfig) -> EncoderResult<Box<dyn AudioEncoder>> {
    let encoder = AacEncoder::new(config.clone())?;
    Ok(Box::new(encoder))
}

/// Open an audio encoder (stub without the `fdk-aac` feature).
#[cfg(not(feature = "fdk-aac"))]
pub fn create_audio_encoder(_config: &AudioEncoderConfig) -> EncoderResult<Box<dyn AudioEncoder>> {
    Err(EncoderError::NotSupported(
        "Audio encoding requires the fdk-aac feature".into(),
    ))
}
