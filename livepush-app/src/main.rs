//! Command-line RTMP pusher.
//!
//! Usage: `livepush <config.json> [seconds]`
//!
//! Streams a generated test pattern and tone to the configured URL for the
//! given number of seconds (default 30), then stops and prints statistics.

use std::f32::consts::TAU;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use crossbeam_channel::RecvTimeoutError;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use livepush_encoder::{
    AudioEncoderConfig, EncoderResult, RawVideoFrame, VideoEncoderConfig, AAC_FRAME_SAMPLES,
};
use livepush_engine::{
    AudioAdapter, ErrorCode, SessionHandle, SessionPhase, StreamConfig, StreamSession,
    VideoAdapter,
};
use livepush_transport::{MonotonicClock, RtmpConnection};

const DEFAULT_DURATION_SECS: u64 = 30;
const TONE_HZ: f32 = 440.0;

fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "livepush=debug,livepush_engine=debug,livepush_encoder=debug,livepush_transport=debug"
                .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> Result<()> {
    init_logging();

    let mut args = std::env::args().skip(1);
    let Some(config_path) = args.next() else {
        bail!("usage: livepush <config.json> [seconds]");
    };
    let duration = match args.next() {
        Some(secs) => Duration::from_secs(
            secs.parse()
                .with_context(|| format!("invalid duration: {secs}"))?,
        ),
        None => Duration::from_secs(DEFAULT_DURATION_SECS),
    };

    let config = StreamConfig::load(&config_path)
        .with_context(|| format!("failed to load config from {config_path}"))?;
    info!(duration_secs = duration.as_secs(), "livepush starting");

    let (error_tx, error_rx) = crossbeam_channel::unbounded::<ErrorCode>();
    let connection = RtmpConnection::new().context("failed to create RTMP connection")?;
    let session = StreamSession::new(
        Box::new(connection),
        Arc::new(MonotonicClock::new()),
        Arc::new(error_tx),
    )
    .with_connect_timeout(config.connect_timeout());

    // Encoders open before connecting so the audio config is queued first.
    let mut producers = Vec::new();
    if let Some(video) = &config.video {
        let mut adapter = VideoAdapter::new(session.handle());
        adapter
            .configure(video)
            .context("failed to open video encoder")?;
        producers.push(spawn_video(adapter, session.handle(), video.clone())?);
    }
    if let Some(audio) = &config.audio {
        let mut adapter = AudioAdapter::new(session.handle());
        adapter
            .configure(audio)
            .context("failed to open audio encoder")?;
        producers.push(spawn_audio(adapter, session.handle(), audio.clone())?);
    }

    session.start(&config.url)?;

    let deadline = Instant::now() + duration;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match error_rx.recv_timeout(remaining) {
            Ok(code) if code.is_fatal() => {
                error!(code = code.code(), "Session failed: {}", code);
                break;
            }
            Ok(code) => warn!(code = code.code(), "{}", code),
            Err(RecvTimeoutError::Timeout) => break,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    session.stop();
    for producer in producers {
        if producer.join().is_err() {
            error!("Producer thread panicked");
        }
    }

    let stats = session.stats();
    info!(
        phase = %session.phase(),
        sent = stats.packets_sent,
        bytes = stats.bytes_sent,
        released = stats.packets_released,
        dropped = stats.packets_dropped,
        "livepush finished"
    );

    if session.phase() == SessionPhase::Failed {
        bail!("stream failed");
    }
    Ok(())
}

/// Run `tick` every `interval` until the session ends.
fn pace(handle: &SessionHandle, interval: Duration, mut tick: impl FnMut(u64)) {
    let mut next = Instant::now();
    let mut count = 0u64;
    while !handle.phase().is_terminal() {
        tick(count);
        count += 1;
        next += interval;
        if let Some(wait) = next.checked_duration_since(Instant::now()) {
            thread::sleep(wait);
        }
    }
}

fn spawn_video(
    mut adapter: VideoAdapter<SessionHandle>,
    handle: SessionHandle,
    config: VideoEncoderConfig,
) -> Result<JoinHandle<()>> {
    let interval = Duration::from_secs(1) / config.fps;
    thread::Builder::new()
        .name("livepush-video".to_string())
        .spawn(move || {
            pace(&handle, interval, |index| {
                match test_pattern(config.width, config.height, index) {
                    // Failures are already reported through the session's error sink
                    Ok(frame) => {
                        let _ = adapter.submit(&frame);
                    }
                    Err(e) => warn!("Failed to build test frame: {}", e),
                }
            });
            info!(
                encoded = adapter.frames_encoded(),
                skipped = adapter.frames_skipped(),
                "Video producer finished"
            );
        })
        .context("failed to spawn video thread")
}

fn spawn_audio(
    mut adapter: AudioAdapter<SessionHandle>,
    handle: SessionHandle,
    config: AudioEncoderConfig,
) -> Result<JoinHandle<()>> {
    let interval =
        Duration::from_secs_f64(AAC_FRAME_SAMPLES as f64 / config.sample_rate as f64);
    let samples = adapter
        .input_samples()
        .unwrap_or_else(|| config.input_samples());

    thread::Builder::new()
        .name("livepush-audio".to_string())
        .spawn(move || {
            pace(&handle, interval, |index| {
                let pcm = tone(&config, samples, index);
                let _ = adapter.submit(&pcm);
            });
            info!(
                encoded = adapter.frames_encoded(),
                skipped = adapter.frames_skipped(),
                "Audio producer finished"
            );
        })
        .context("failed to spawn audio thread")
}

/// Vertical luma bars scrolling one step per frame, neutral chroma.
fn test_pattern(width: u32, height: u32, index: u64) -> EncoderResult<RawVideoFrame> {
    let (w, h) = (width as usize, height as usize);
    let mut data = vec![128u8; RawVideoFrame::i420_buffer_size(width, height)];
    let offset = index as usize * 4;
    for (i, luma) in data[..w * h].iter_mut().enumerate() {
        *luma = ((((i % w) + offset) / 32 % 8) * 32) as u8;
    }
    RawVideoFrame::from_i420(width, height, data.into())
}

/// One buffer of a sine tone, interleaved across channels.
fn tone(config: &AudioEncoderConfig, samples: usize, index: u64) -> Vec<i16> {
    let channels = config.channels.max(1) as usize;
    let start = index as usize * (samples / channels);
    let step = TAU * TONE_HZ / config.sample_rate as f32;
    (0..samples)
        .map(|i| {
            let t = (start + i / channels) as f32;
            ((t * step).sin() * i16::MAX as f32 * 0.2) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_is_valid_i420() {
        let frame = test_pattern(64, 32, 3).unwrap();
        assert_eq!(frame.y_plane().len(), 64 * 32);
        assert!(frame.u_plane().iter().all(|&b| b == 128));
    }

    #[test]
    fn test_tone_is_interleaved() {
        let config = AudioEncoderConfig::default();
        let pcm = tone(&config, config.input_samples(), 1);
        assert_eq!(pcm.len(), 2048);
        assert!(pcm.chunks_exact(2).all(|pair| pair[0] == pair[1]));
    }
}
