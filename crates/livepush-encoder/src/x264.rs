//! x264 software video encoder.

use tracing::{debug, instrument, trace};

use crate::error::EncoderError;
use crate::frame::{EncodedVideoFrame, RawVideoFrame};
use crate::{EncoderResult, H264Profile, VideoEncoder, VideoEncoderConfig};

/// x264 software encoder wrapper.
///
/// Runs with the zero-latency tune, which turns off B-frames and lookahead:
/// frames come out in presentation order and carry a zero composition time.
pub struct X264Encoder {
    encoder: x264::Encoder,
    config: VideoEncoderConfig,
    frame_count: u64,
}

impl X264Encoder {
    /// Open a new x264 encoder.
    #[instrument(name = "x264_new", skip_all)]
    pub fn new(config: VideoEncoderConfig) -> EncoderResult<Self> {
        config.validate()?;

        debug!(
            width = config.width,
            height = config.height,
            fps = config.fps,
            bitrate_kbps = config.bitrate_kbps,
            "Initializing x264 encoder"
        );

        let mut setup = x264::Setup::preset(
            x264::Preset::Ultrafast,
            x264::Tune::None,
            false, // fast_decode
            true,  // zero_latency
        )
        .fps(config.fps, 1)
        .bitrate(config.bitrate_kbps as i32)
        .max_keyframe_interval(config.keyframe_interval() as i32)
        .scenecut_threshold(0);

        setup = match config.profile {
            H264Profile::Baseline => setup.baseline(),
            H264Profile::Main => setup.main(),
            H264Profile::High => setup.high(),
        };

        let encoder = setup
            .build(
                x264::Colorspace::I420,
                config.width as i32,
                config.height as i32,
            )
            .map_err(|e| EncoderError::X264InitFailed(format!("{:?}", e)))?;

        debug!("x264 encoder initialized");

        Ok(Self {
            encoder,
            config,
            frame_count: 0,
        })
    }
}

impl VideoEncoder for X264Encoder {
    #[instrument(name = "x264_encode", skip(self, frame))]
    fn encode(&mut self, frame: &RawVideoFrame) -> EncoderResult<EncodedVideoFrame> {
        if frame.width() != self.config.width || frame.height() != self.config.height {
            return Err(EncoderError::InvalidInput(format!(
                "Expected {}x{} frame, got {}x{}",
                self.config.width,
                self.config.height,
                frame.width(),
                frame.height()
            )));
        }

        let y_stride = self.config.width as i32;
        let chroma_stride = y_stride / 2;

        let image = x264::Image::new(
            x264::Colorspace::I420,
            self.config.width as i32,
            self.config.height as i32,
            &[
                x264::Plane {
                    data: frame.y_plane(),
                    stride: y_stride,
                },
                x264::Plane {
                    data: frame.u_plane(),
                    stride: chroma_stride,
                },
                x264::Plane {
                    data: frame.v_plane(),
                    stride: chroma_stride,
                },
            ],
        );

        trace!(frame = self.frame_count, "Encoding frame");

        let (data, picture) = self
            .encoder
            .encode(self.frame_count as i64, image)
            .map_err(|e| EncoderError::Encoding(format!("x264 encode failed: {:?}", e)))?;

        self.frame_count += 1;

        Ok(EncodedVideoFrame::from_annex_b(
            data.entirety(),
            picture.keyframe(),
        ))
    }

    fn name(&self) -> &'static str {
        "x264"
    }
}

impl Drop for X264Encoder {
    fn drop(&mut self) {
        debug!(frames = self.frame_count, "Closing x264 encoder");
    }
}

// SAFETY: x264::Encoder holds raw pointers but has no thread affinity. The
// adapter that owns it serializes every call behind `&mut self`.
unsafe impl Send for X264Encoder {}
