//! AAC audio encoder.

use bytes::Bytes;
use tracing::{debug, instrument, trace};

use crate::error::EncoderError;
use crate::{AudioEncoder, AudioEncoderConfig, EncoderResult};

/// AAC-LC audio encoder using fdk-aac, raw transport (no ADTS headers).
pub struct AacEncoder {
    encoder: fdk_aac::enc::Encoder,
    config: AudioEncoderConfig,
    decoder_config: Bytes,
    output_buffer: Vec<u8>,
    frame_count: u64,
}

impl AacEncoder {
    /// Open a new AAC encoder.
    #[instrument(name = "aac_new", skip_all)]
    pub fn new(config: AudioEncoderConfig) -> EncoderResult<Self> {
        config.validate()?;

        debug!(
            sample_rate = config.sample_rate,
            channels = config.channels,
            bitrate_kbps = config.bitrate_kbps,
            "Initializing AAC encoder"
        );

        let channel_mode = if config.channels == 1 {
            fdk_aac::enc::ChannelMode::Mono
        } else {
            fdk_aac::enc::ChannelMode::Stereo
        };

        let params = fdk_aac::enc::EncoderParams {
            bit_rate: fdk_aac::enc::BitRate::Cbr(config.bitrate_kbps * 1000),
            sample_rate: config.sample_rate,
            transport: fdk_aac::enc::Transport::Raw,
            channels: channel_mode,
        };

        let encoder = fdk_aac::enc::Encoder::new(params)
            .map_err(|e| EncoderError::AacInitFailed(format!("fdk-aac init failed: {:?}", e)))?;

        let info = encoder
            .info()
            .map_err(|e| EncoderError::AacInitFailed(format!("fdk-aac info failed: {:?}", e)))?;

        let conf_len = (info.confSize as usize).min(info.confBuf.len());
        let decoder_config = Bytes::copy_from_slice(&info.confBuf[..conf_len]);

        debug!(
            max_out_buf_bytes = info.maxOutBufBytes,
            frame_length = info.frameLength,
            asc_len = decoder_config.len(),
            "AAC encoder initialized"
        );

        Ok(Self {
            encoder,
            output_buffer: vec![0u8; info.maxOutBufBytes as usize],
            config,
            decoder_config,
            frame_count: 0,
        })
    }
}

impl AudioEncoder for AacEncoder {
    #[instrument(name = "aac_encode", skip(self, pcm))]
    fn encode(&mut self, pcm: &[i16]) -> EncoderResult<Option<Bytes>> {
        if pcm.len() != self.config.input_samples() {
            return Err(EncoderError::InvalidInput(format!(
                "Expected {} samples, got {}",
                self.config.input_samples(),
                pcm.len()
            )));
        }

        trace!(frame = self.frame_count, "Encoding AAC frame");

        let encode_info = self
            .encoder
            .encode(pcm, &mut self.output_buffer)
            .map_err(|e| EncoderError::Encoding(format!("AAC encode failed: {:?}", e)))?;

        self.frame_count += 1;

        if encode_info.output_size == 0 {
            return Ok(None);
        }

        Ok(Some(Bytes::copy_from_slice(
            &self.output_buffer[..encode_info.output_size],
        )))
    }

    fn decoder_config(&self) -> Bytes {
        self.decoder_config.clone()
    }

    fn input_samples(&self) -> usize {
        self.config.input_samples()
    }

    fn channels(&self) -> u16 {
        self.config.channels
    }

    fn name(&self) -> &'static str {
        "AAC-LC"
    }
}

impl Drop for AacEncoder {
    fn drop(&mut self) {
        debug!(frames = self.frame_count, "Closing AAC encoder");
    }
}
