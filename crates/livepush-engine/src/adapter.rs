//! Encoder adapters: drive an encoder and hand its output to a session.

use tracing::{debug, error, info, instrument, trace, warn};

use livepush_encoder::{
    create_audio_encoder, create_video_encoder, AudioEncoder, AudioEncoderConfig, EncoderError,
    EncoderResult, RawVideoFrame, VideoEncoder, VideoEncoderConfig,
};
use livepush_transport::flv;

use crate::sink::{ErrorCode, PacketSink};

/// Opens a video encoder for a configuration.
pub type VideoOpener =
    Box<dyn Fn(&VideoEncoderConfig) -> EncoderResult<Box<dyn VideoEncoder>> + Send>;

/// Opens an audio encoder for a configuration.
pub type AudioOpener =
    Box<dyn Fn(&AudioEncoderConfig) -> EncoderResult<Box<dyn AudioEncoder>> + Send>;

/// Feeds raw video frames through an H.264 encoder into a packet sink.
///
/// Only the first SPS/PPS pair seen after each `configure` becomes a
/// configuration packet; later parameter sets are ignored.
pub struct VideoAdapter<S: PacketSink> {
    sink: S,
    opener: VideoOpener,
    encoder: Option<Box<dyn VideoEncoder>>,
    config_sent: bool,
    frames_encoded: u64,
    frames_skipped: u64,
}

impl<S: PacketSink> VideoAdapter<S> {
    /// Create an adapter using the built-in video encoder.
    pub fn new(sink: S) -> Self {
        Self::with_opener(sink, Box::new(create_video_encoder))
    }

    pub fn with_opener(sink: S, opener: VideoOpener) -> Self {
        Self {
            sink,
            opener,
            encoder: None,
            config_sent: false,
            frames_encoded: 0,
            frames_skipped: 0,
        }
    }

    /// Open the encoder, closing any previous one first.
    ///
    /// Failure is also reported to the sink as `VideoEncoderOpen`.
    #[instrument(name = "video_configure", skip_all)]
    pub fn configure(&mut self, config: &VideoEncoderConfig) -> EncoderResult<()> {
        self.close();
        self.config_sent = false;

        match (self.opener)(config) {
            Ok(encoder) => {
                info!(
                    encoder = encoder.name(),
                    width = config.width,
                    height = config.height,
                    fps = config.fps,
                    bitrate_kbps = config.bitrate_kbps,
                    "Video encoder opened"
                );
                self.encoder = Some(encoder);
                Ok(())
            }
            Err(e) => {
                error!("Failed to open video encoder: {}", e);
                self.sink.report(ErrorCode::VideoEncoderOpen);
                Err(e)
            }
        }
    }

    /// Encode one frame and enqueue the resulting packets.
    ///
    /// Frames are skipped without encoding while the sink is not streaming.
    pub fn submit(&mut self, frame: &RawVideoFrame) -> EncoderResult<()> {
        if !self.sink.is_streaming() {
            self.frames_skipped += 1;
            trace!("Session not streaming, skipping video frame");
            return Ok(());
        }

        let encoder = self.encoder.as_mut().ok_or(EncoderError::NotInitialized)?;
        let encoded = match encoder.encode(frame) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Video encode error: {}", e);
                self.sink.report(ErrorCode::VideoEncode);
                return Err(e);
            }
        };
        self.frames_encoded += 1;

        if let Some(sets) = encoded.parameter_sets.as_ref().filter(|_| !self.config_sent) {
            match flv::video_config(&sets.sps, &sets.pps) {
                Some(packet) => {
                    debug!("Sending video configuration");
                    self.sink.enqueue(packet);
                    self.config_sent = true;
                }
                None => warn!("Ignoring unusable parameter sets"),
            }
        }

        for slice in &encoded.slices {
            self.sink
                .enqueue(flv::video_frame(slice, encoded.is_keyframe));
        }

        Ok(())
    }

    /// Close the encoder. Submitting afterwards fails until reconfigured.
    pub fn close(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            debug!(
                encoder = encoder.name(),
                frames = self.frames_encoded,
                "Closing video encoder"
            );
        }
    }

    pub fn is_open(&self) -> bool {
        self.encoder.is_some()
    }

    pub fn frames_encoded(&self) -> u64 {
        self.frames_encoded
    }

    /// Frames not encoded because the sink was not streaming.
    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }
}

/// Feeds interleaved PCM through an AAC encoder into a packet sink.
pub struct AudioAdapter<S: PacketSink> {
    sink: S,
    opener: AudioOpener,
    encoder: Option<Box<dyn AudioEncoder>>,
    frames_encoded: u64,
    frames_skipped: u64,
}

impl<S: PacketSink> AudioAdapter<S> {
    /// Create an adapter using the built-in audio encoder.
    pub fn new(sink: S) -> Self {
        Self::with_opener(sink, Box::new(create_audio_encoder))
    }

    pub fn with_opener(sink: S, opener: AudioOpener) -> Self {
        Self {
            sink,
            opener,
            encoder: None,
            frames_encoded: 0,
            frames_skipped: 0,
        }
    }

    /// Open the encoder, closing any previous one first, and register its
    /// configuration packet with the sink.
    ///
    /// Failure is also reported to the sink as `AudioEncoderOpen`.
    #[instrument(name = "audio_configure", skip_all)]
    pub fn configure(&mut self, config: &AudioEncoderConfig) -> EncoderResult<()> {
        self.close();

        let encoder = match (self.opener)(config) {
            Ok(encoder) => encoder,
            Err(e) => {
                error!("Failed to open audio encoder: {}", e);
                self.sink.report(ErrorCode::AudioEncoderOpen);
                return Err(e);
            }
        };

        info!(
            encoder = encoder.name(),
            sample_rate = config.sample_rate,
            channels = config.channels,
            bitrate_kbps = config.bitrate_kbps,
            "Audio encoder opened"
        );

        self.sink
            .set_audio_config(flv::audio_config(&encoder.decoder_config(), encoder.channels()));
        self.encoder = Some(encoder);
        Ok(())
    }

    /// Encode one buffer of interleaved 16-bit PCM and enqueue the result.
    ///
    /// Buffers are skipped without encoding while the sink is not streaming.
    pub fn submit(&mut self, pcm: &[i16]) -> EncoderResult<()> {
        if !self.sink.is_streaming() {
            self.frames_skipped += 1;
            trace!("Session not streaming, skipping audio buffer");
            return Ok(());
        }

        let encoder = self.encoder.as_mut().ok_or(EncoderError::NotInitialized)?;
        match encoder.encode(pcm) {
            Ok(Some(aac)) => {
                self.frames_encoded += 1;
                self.sink.enqueue(flv::audio_frame(&aac, encoder.channels()));
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                warn!("Audio encode error: {}", e);
                self.sink.report(ErrorCode::AudioEncode);
                Err(e)
            }
        }
    }

    /// Interleaved samples one `submit` call must carry, once configured.
    pub fn input_samples(&self) -> Option<usize> {
        self.encoder.as_ref().map(|encoder| encoder.input_samples())
    }

    /// Close the encoder and withdraw its pending configuration packet.
    /// Submitting afterwards fails until reconfigured.
    pub fn close(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            debug!(
                encoder = encoder.name(),
                frames = self.frames_encoded,
                "Closing audio encoder"
            );
            self.sink.clear_audio_config();
        }
    }

    pub fn is_open(&self) -> bool {
        self.encoder.is_some()
    }

    pub fn frames_encoded(&self) -> u64 {
        self.frames_encoded
    }

    /// Buffers not encoded because the sink was not streaming.
    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use bytes::Bytes;
    use livepush_encoder::{EncodedVideoFrame, ParameterSets};
    use livepush_transport::{PacketBuffer, PacketKind};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        streaming: AtomicBool,
        packets: Mutex<Vec<PacketBuffer>>,
        audio_config: Mutex<Option<PacketBuffer>>,
        codes: Mutex<Vec<ErrorCode>>,
    }

    impl RecordingSink {
        fn streaming() -> Arc<Self> {
            let sink = Arc::new(Self::default());
            sink.streaming.store(true, Ordering::SeqCst);
            sink
        }

        fn bodies(&self) -> Vec<(PacketKind, Vec<u8>)> {
            self.packets
                .lock()
                .iter()
                .map(|p| (p.kind(), p.body().to_vec()))
                .collect()
        }
    }

    impl PacketSink for RecordingSink {
        fn is_streaming(&self) -> bool {
            self.streaming.load(Ordering::SeqCst)
        }

        fn enqueue(&self, packet: PacketBuffer) {
            self.packets.lock().push(packet);
        }

        fn set_audio_config(&self, packet: PacketBuffer) {
            *self.audio_config.lock() = Some(packet);
        }

        fn clear_audio_config(&self) {
            *self.audio_config.lock() = None;
        }

        fn report(&self, code: ErrorCode) {
            self.codes.lock().push(code);
        }
    }

    #[derive(Default)]
    struct Lifecycle {
        opened: AtomicUsize,
        closed: AtomicUsize,
        encoded: AtomicUsize,
    }

    struct ScriptedVideoEncoder {
        outputs: VecDeque<EncoderResult<EncodedVideoFrame>>,
        lifecycle: Arc<Lifecycle>,
    }

    impl VideoEncoder for ScriptedVideoEncoder {
        fn encode(&mut self, _frame: &RawVideoFrame) -> EncoderResult<EncodedVideoFrame> {
            self.lifecycle.encoded.fetch_add(1, Ordering::SeqCst);
            self.outputs
                .pop_front()
                .unwrap_or_else(|| Ok(EncodedVideoFrame::default()))
        }

        fn name(&self) -> &'static str {
            "scripted-video"
        }
    }

    impl Drop for ScriptedVideoEncoder {
        fn drop(&mut self) {
            self.lifecycle.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn keyframe(sps: &[u8], pps: &[u8], slice: &[u8]) -> EncodedVideoFrame {
        EncodedVideoFrame {
            is_keyframe: true,
            parameter_sets: Some(ParameterSets {
                sps: Bytes::copy_from_slice(sps),
                pps: Bytes::copy_from_slice(pps),
            }),
            slices: vec![Bytes::copy_from_slice(slice)],
        }
    }

    fn video_opener(
        lifecycle: Arc<Lifecycle>,
        script: impl Fn() -> Vec<EncoderResult<EncodedVideoFrame>> + Send + 'static,
    ) -> VideoOpener {
        Box::new(
            move |_config: &VideoEncoderConfig| -> EncoderResult<Box<dyn VideoEncoder>> {
                lifecycle.opened.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(ScriptedVideoEncoder {
                    outputs: script().into(),
                    lifecycle: Arc::clone(&lifecycle),
                }))
            },
        )
    }

    fn frame() -> RawVideoFrame {
        RawVideoFrame::from_i420(2, 2, Bytes::from(vec![0u8; 6])).unwrap()
    }

    const SPS: [u8; 4] = [0x67, 0x42, 0x00, 0x1E];
    const PPS: [u8; 2] = [0x68, 0xCE];
    const IDR: [u8; 7] = [0x00, 0x00, 0x00, 0x01, 0x65, 0xAA, 0xBB];

    #[test]
    fn test_video_config_then_keyframe() {
        let sink = RecordingSink::streaming();
        let lifecycle = Arc::new(Lifecycle::default());
        let mut adapter = VideoAdapter::with_opener(
            Arc::clone(&sink),
            video_opener(Arc::clone(&lifecycle), || {
                vec![
                    Ok(keyframe(&SPS, &PPS, &IDR)),
                    Ok(keyframe(&SPS, &PPS, &[0x00, 0x00, 0x01, 0x65, 0xCC])),
                ]
            }),
        );

        adapter.configure(&VideoEncoderConfig::default()).unwrap();
        adapter.submit(&frame()).unwrap();
        adapter.submit(&frame()).unwrap();

        let bodies = sink.bodies();
        assert_eq!(bodies.len(), 3);
        assert_eq!(
            bodies[0],
            (
                PacketKind::VideoConfig,
                vec![
                    0x17, 0x00, 0x00, 0x00, 0x00, 0x01, 0x42, 0x00, 0x1E, 0xFF, 0xE1, 0x00, 0x04,
                    0x67, 0x42, 0x00, 0x1E, 0x01, 0x00, 0x02, 0x68, 0xCE
                ]
            )
        );
        assert_eq!(
            bodies[1],
            (
                PacketKind::VideoKeyFrame,
                vec![0x17, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x65, 0xAA, 0xBB]
            )
        );
        // Repeated parameter sets do not produce a second config packet
        assert_eq!(bodies[2].0, PacketKind::VideoKeyFrame);
        assert_eq!(adapter.frames_encoded(), 2);
        assert!(sink.codes.lock().is_empty());
    }

    #[test]
    fn test_video_interframe() {
        let sink = RecordingSink::streaming();
        let lifecycle = Arc::new(Lifecycle::default());
        let mut adapter = VideoAdapter::with_opener(
            Arc::clone(&sink),
            video_opener(lifecycle, || {
                vec![Ok(EncodedVideoFrame {
                    is_keyframe: false,
                    parameter_sets: None,
                    slices: vec![Bytes::from_static(&[0x00, 0x00, 0x01, 0x41, 0x9A])],
                })]
            }),
        );

        adapter.configure(&VideoEncoderConfig::default()).unwrap();
        adapter.submit(&frame()).unwrap();

        assert_eq!(
            sink.bodies(),
            vec![(
                PacketKind::VideoInterFrame,
                vec![0x27, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x41, 0x9A]
            )]
        );
    }

    #[test]
    fn test_video_reconfigure_closes_previous_and_resends_config() {
        let sink = RecordingSink::streaming();
        let lifecycle = Arc::new(Lifecycle::default());
        let mut adapter = VideoAdapter::with_opener(
            Arc::clone(&sink),
            video_opener(Arc::clone(&lifecycle), || vec![Ok(keyframe(&SPS, &PPS, &IDR))]),
        );

        adapter.configure(&VideoEncoderConfig::default()).unwrap();
        adapter.submit(&frame()).unwrap();
        adapter.configure(&VideoEncoderConfig::default()).unwrap();

        assert_eq!(lifecycle.opened.load(Ordering::SeqCst), 2);
        assert_eq!(lifecycle.closed.load(Ordering::SeqCst), 1);

        adapter.submit(&frame()).unwrap();
        let kinds: Vec<_> = sink.bodies().into_iter().map(|(kind, _)| kind).collect();
        assert_eq!(
            kinds,
            vec![
                PacketKind::VideoConfig,
                PacketKind::VideoKeyFrame,
                PacketKind::VideoConfig,
                PacketKind::VideoKeyFrame
            ]
        );

        drop(adapter);
        assert_eq!(lifecycle.closed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_video_skips_encoding_when_not_streaming() {
        let sink = Arc::new(RecordingSink::default());
        let lifecycle = Arc::new(Lifecycle::default());
        let mut adapter = VideoAdapter::with_opener(
            Arc::clone(&sink),
            video_opener(Arc::clone(&lifecycle), || vec![Ok(keyframe(&SPS, &PPS, &IDR))]),
        );

        adapter.configure(&VideoEncoderConfig::default()).unwrap();
        adapter.submit(&frame()).unwrap();

        assert_eq!(adapter.frames_skipped(), 1);
        assert_eq!(lifecycle.encoded.load(Ordering::SeqCst), 0);
        assert!(sink.bodies().is_empty());

        // The first parameter sets seen once streaming still become config
        sink.streaming.store(true, Ordering::SeqCst);
        adapter.submit(&frame()).unwrap();
        assert_eq!(sink.bodies()[0].0, PacketKind::VideoConfig);
    }

    #[test]
    fn test_video_open_failure_reported() {
        let sink = RecordingSink::streaming();
        let mut adapter = VideoAdapter::with_opener(
            Arc::clone(&sink),
            Box::new(
                |_config: &VideoEncoderConfig| -> EncoderResult<Box<dyn VideoEncoder>> {
                    Err(EncoderError::X264InitFailed("no encoder".to_string()))
                },
            ),
        );

        assert!(adapter.configure(&VideoEncoderConfig::default()).is_err());
        assert!(!adapter.is_open());
        assert_eq!(*sink.codes.lock(), vec![ErrorCode::VideoEncoderOpen]);

        assert!(matches!(
            adapter.submit(&frame()),
            Err(EncoderError::NotInitialized)
        ));
    }

    #[test]
    fn test_video_encode_failure_reported() {
        let sink = RecordingSink::streaming();
        let lifecycle = Arc::new(Lifecycle::default());
        let mut adapter = VideoAdapter::with_opener(
            Arc::clone(&sink),
            video_opener(lifecycle, || {
                vec![Err(EncoderError::Encoding("bad frame".to_string()))]
            }),
        );

        adapter.configure(&VideoEncoderConfig::default()).unwrap();
        assert!(adapter.submit(&frame()).is_err());
        assert_eq!(*sink.codes.lock(), vec![ErrorCode::VideoEncode]);
        assert!(sink.bodies().is_empty());
    }

    #[test]
    fn test_video_short_sps_is_ignored() {
        let sink = RecordingSink::streaming();
        let lifecycle = Arc::new(Lifecycle::default());
        let mut adapter = VideoAdapter::with_opener(
            Arc::clone(&sink),
            video_opener(lifecycle, || {
                vec![
                    Ok(keyframe(&[0x67, 0x42], &PPS, &IDR)),
                    Ok(keyframe(&SPS, &PPS, &IDR)),
                ]
            }),
        );

        adapter.configure(&VideoEncoderConfig::default()).unwrap();
        adapter.submit(&frame()).unwrap();
        adapter.submit(&frame()).unwrap();

        let kinds: Vec<_> = sink.bodies().into_iter().map(|(kind, _)| kind).collect();
        assert_eq!(
            kinds,
            vec![
                PacketKind::VideoKeyFrame,
                PacketKind::VideoConfig,
                PacketKind::VideoKeyFrame
            ]
        );
    }

    struct ScriptedAudioEncoder {
        channels: u16,
        outputs: VecDeque<EncoderResult<Option<Bytes>>>,
        lifecycle: Arc<Lifecycle>,
    }

    impl AudioEncoder for ScriptedAudioEncoder {
        fn encode(&mut self, _pcm: &[i16]) -> EncoderResult<Option<Bytes>> {
            self.lifecycle.encoded.fetch_add(1, Ordering::SeqCst);
            self.outputs.pop_front().unwrap_or(Ok(None))
        }

        fn decoder_config(&self) -> Bytes {
            if self.channels == 1 {
                Bytes::from_static(&[0x12, 0x08])
            } else {
                Bytes::from_static(&[0x12, 0x10])
            }
        }

        fn input_samples(&self) -> usize {
            1024 * self.channels as usize
        }

        fn channels(&self) -> u16 {
            self.channels
        }

        fn name(&self) -> &'static str {
            "scripted-audio"
        }
    }

    impl Drop for ScriptedAudioEncoder {
        fn drop(&mut self) {
            self.lifecycle.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn audio_opener(
        lifecycle: Arc<Lifecycle>,
        script: impl Fn() -> Vec<EncoderResult<Option<Bytes>>> + Send + 'static,
    ) -> AudioOpener {
        Box::new(
            move |config: &AudioEncoderConfig| -> EncoderResult<Box<dyn AudioEncoder>> {
                lifecycle.opened.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(ScriptedAudioEncoder {
                    channels: config.channels,
                    outputs: script().into(),
                    lifecycle: Arc::clone(&lifecycle),
                }))
            },
        )
    }

    #[test]
    fn test_audio_config_registered_on_configure() {
        let sink = Arc::new(RecordingSink::default());
        let lifecycle = Arc::new(Lifecycle::default());
        let mut adapter =
            AudioAdapter::with_opener(Arc::clone(&sink), audio_opener(lifecycle, Vec::new));

        assert_eq!(adapter.input_samples(), None);
        adapter.configure(&AudioEncoderConfig::default()).unwrap();

        assert_eq!(adapter.input_samples(), Some(2048));
        let config = sink.audio_config.lock().take().unwrap();
        assert_eq!(config.kind(), PacketKind::AudioConfig);
        assert_eq!(config.body().as_ref(), &[0xAF, 0x00, 0x12, 0x10]);
        assert!(sink.bodies().is_empty());
    }

    #[test]
    fn test_audio_mono_frame() {
        let sink = RecordingSink::streaming();
        let lifecycle = Arc::new(Lifecycle::default());
        let mut adapter = AudioAdapter::with_opener(
            Arc::clone(&sink),
            audio_opener(lifecycle, || {
                vec![Ok(None), Ok(Some(Bytes::from_static(&[0x21, 0x10, 0x04])))]
            }),
        );
        let config = AudioEncoderConfig {
            channels: 1,
            ..Default::default()
        };

        adapter.configure(&config).unwrap();
        let pcm = vec![0i16; 1024];
        adapter.submit(&pcm).unwrap();
        adapter.submit(&pcm).unwrap();

        assert_eq!(
            sink.audio_config.lock().as_ref().map(|p| p.body().to_vec()),
            Some(vec![0xAE, 0x00, 0x12, 0x08])
        );
        assert_eq!(
            sink.bodies(),
            vec![(PacketKind::AudioFrame, vec![0xAE, 0x01, 0x21, 0x10, 0x04])]
        );
        assert_eq!(adapter.frames_encoded(), 1);
    }

    #[test]
    fn test_audio_failures_reported() {
        let sink = RecordingSink::streaming();
        let mut adapter = AudioAdapter::with_opener(
            Arc::clone(&sink),
            Box::new(
                |_config: &AudioEncoderConfig| -> EncoderResult<Box<dyn AudioEncoder>> {
                    Err(EncoderError::AacInitFailed("no encoder".to_string()))
                },
            ),
        );
        assert!(adapter.configure(&AudioEncoderConfig::default()).is_err());

        let lifecycle = Arc::new(Lifecycle::default());
        let mut adapter = AudioAdapter::with_opener(
            Arc::clone(&sink),
            audio_opener(lifecycle, || {
                vec![Err(EncoderError::Encoding("bad buffer".to_string()))]
            }),
        );
        adapter.configure(&AudioEncoderConfig::default()).unwrap();
        assert!(adapter.submit(&[0i16; 2048]).is_err());

        assert_eq!(
            *sink.codes.lock(),
            vec![ErrorCode::AudioEncoderOpen, ErrorCode::AudioEncode]
        );
    }

    #[test]
    fn test_audio_reconfigure_closes_previous() {
        let sink = Arc::new(RecordingSink::default());
        let lifecycle = Arc::new(Lifecycle::default());
        let mut adapter = AudioAdapter::with_opener(
            Arc::clone(&sink),
            audio_opener(Arc::clone(&lifecycle), Vec::new),
        );

        adapter.configure(&AudioEncoderConfig::default()).unwrap();
        adapter.configure(&AudioEncoderConfig::default()).unwrap();
        assert_eq!(lifecycle.opened.load(Ordering::SeqCst), 2);
        assert_eq!(lifecycle.closed.load(Ordering::SeqCst), 1);

        adapter.submit(&[0i16; 2048]).unwrap();
        assert_eq!(adapter.frames_skipped(), 1);
        assert_eq!(lifecycle.encoded.load(Ordering::SeqCst), 0);

        adapter.close();
        assert_eq!(lifecycle.closed.load(Ordering::SeqCst), 2);
        assert!(!adapter.is_open());
        assert!(sink.audio_config.lock().is_none());
    }

    #[test]
    fn test_audio_failed_reconfigure_withdraws_config() {
        let sink = Arc::new(RecordingSink::default());
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let lifecycle = Arc::new(Lifecycle::default());
        let mut adapter = AudioAdapter::with_opener(
            Arc::clone(&sink),
            Box::new(
                move |config: &AudioEncoderConfig| -> EncoderResult<Box<dyn AudioEncoder>> {
                    if counter.fetch_add(1, Ordering::SeqCst) > 0 {
                        return Err(EncoderError::AacInitFailed("device lost".to_string()));
                    }
                    Ok(Box::new(ScriptedAudioEncoder {
                        channels: config.channels,
                        outputs: VecDeque::new(),
                        lifecycle: Arc::clone(&lifecycle),
                    }))
                },
            ),
        );

        adapter.configure(&AudioEncoderConfig::default()).unwrap();
        assert!(sink.audio_config.lock().is_some());

        assert!(adapter.configure(&AudioEncoderConfig::default()).is_err());
        assert!(!adapter.is_open());
        assert!(sink.audio_config.lock().is_none());
        assert_eq!(*sink.codes.lock(), vec![ErrorCode::AudioEncoderOpen]);
    }
}
