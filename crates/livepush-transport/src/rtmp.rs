//! RTMP publishing connection.

use std::time::Duration;

use rml_rtmp::handshake::{Handshake, HandshakeProcessResult, PeerType};
use rml_rtmp::sessions::{
    ClientSession, ClientSessionConfig, ClientSessionEvent, ClientSessionResult,
    PublishRequestType,
};
use rml_rtmp::time::RtmpTimestamp;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, instrument, trace};
use url::Url;

use crate::connection::Connection;
use crate::error::TransportError;
use crate::packet::{Channel, PacketBuffer, PacketKind};
use crate::{TransportResult, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_RTMP_PORT};

/// Message stream the publish session writes to.
const PUBLISH_STREAM_ID: u32 = 1;

/// Publish target parsed from `rtmp://host[:port]/app/stream_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtmpTarget {
    pub host: String,
    pub port: u16,
    pub app: String,
    pub stream_key: String,
}

impl RtmpTarget {
    /// Parse a publish URL. The last path segment is the stream key, the
    /// segments before it name the application.
    pub fn parse(url: &str) -> TransportResult<Self> {
        if !url.starts_with("rtmp://") {
            return Err(TransportError::InvalidUrl(
                "URL must start with rtmp://".to_string(),
            ));
        }

        let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| TransportError::InvalidUrl("Missing host".to_string()))?
            .to_string();
        let port = parsed.port().unwrap_or(DEFAULT_RTMP_PORT);

        let segments: Vec<&str> = parsed
            .path()
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let Some((key, app)) = segments.split_last().filter(|(_, app)| !app.is_empty()) else {
            return Err(TransportError::InvalidUrl(
                "Expected rtmp://host/app/stream_key".to_string(),
            ));
        };

        let stream_key = match parsed.query() {
            Some(query) => format!("{key}?{query}"),
            None => key.to_string(),
        };

        Ok(Self {
            host,
            port,
            app: app.join("/"),
            stream_key,
        })
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Socket plus protocol session of an established connection.
struct Link {
    stream: TcpStream,
    session: ClientSession,
    read_buf: Vec<u8>,
}

/// Blocking RTMP publisher built on `rml_rtmp`.
///
/// Network I/O runs on a private current-thread tokio runtime, so every call
/// blocks the caller (the session's sender thread) until it completes. Each
/// call is bounded by the timeout given to `connect`.
///
/// `rml_rtmp` chooses chunk headers and chunk stream ids itself, so
/// [`PacketBuffer::header_compaction`] and the channel's chunk stream id are
/// not applied on the wire by this connection.
pub struct RtmpConnection {
    runtime: Runtime,
    link: Option<Link>,
    stream_key: String,
    timeout: Duration,
    publishing: bool,
}

impl RtmpConnection {
    /// Create an unconnected publisher.
    pub fn new() -> TransportResult<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;

        Ok(Self {
            runtime,
            link: None,
            stream_key: String::new(),
            timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            publishing: false,
        })
    }

    /// Check if the publish stream is open.
    pub fn is_publishing(&self) -> bool {
        self.publishing
    }
}

impl Connection for RtmpConnection {
    #[instrument(name = "rtmp_connect", skip(self))]
    fn connect(&mut self, url: &str, timeout: Duration) -> TransportResult<()> {
        if self.link.is_some() {
            return Err(TransportError::AlreadyConnected);
        }

        let target = RtmpTarget::parse(url)?;
        info!(host = %target.host, port = target.port, app = %target.app, "Connecting to RTMP server");

        let link = self.runtime.block_on(async {
            tokio::time::timeout(timeout, open_link(&target))
                .await
                .map_err(|_| TransportError::Timeout(timeout))?
        })?;

        self.link = Some(link);
        self.stream_key = target.stream_key;
        self.timeout = timeout;

        info!("RTMP connection established");
        Ok(())
    }

    #[instrument(name = "rtmp_connect_stream", skip(self))]
    fn connect_stream(&mut self) -> TransportResult<()> {
        let link = self.link.as_mut().ok_or(TransportError::NotConnected)?;
        let stream_key = self.stream_key.clone();
        let timeout = self.timeout;

        self.runtime.block_on(async move {
            tokio::time::timeout(timeout, request_publish(link, stream_key))
                .await
                .map_err(|_| TransportError::Timeout(timeout))?
        })?;

        self.publishing = true;
        info!("Publishing started");
        Ok(())
    }

    fn stream_id(&self) -> u32 {
        PUBLISH_STREAM_ID
    }

    fn send(&mut self, packet: &PacketBuffer) -> TransportResult<()> {
        if !self.publishing {
            return Err(TransportError::NotConnected);
        }
        let link = self.link.as_mut().ok_or(TransportError::NotConnected)?;

        let timestamp = RtmpTimestamp::new(packet.timestamp_ms());
        let data = packet.body().clone();

        let result = match packet.channel() {
            Channel::Video => link.session.publish_video_data(
                data,
                timestamp,
                packet.kind() == PacketKind::VideoInterFrame,
            ),
            Channel::Audio => link.session.publish_audio_data(data, timestamp, false),
        }
        .map_err(|e| TransportError::Send(format!("Failed to publish data: {:?}", e)))?;

        trace!(
            kind = ?packet.kind(),
            timestamp_ms = packet.timestamp_ms(),
            chunk_stream = packet.channel().chunk_stream_id(),
            len = packet.len(),
            "Publishing packet"
        );

        // A timed-out write leaves a partial message on the socket; the
        // caller must close the connection.
        if let ClientSessionResult::OutboundResponse(out) = result {
            let timeout = self.timeout;
            self.runtime.block_on(async {
                match tokio::time::timeout(timeout, link.stream.write_all(&out.bytes)).await {
                    Ok(written) => written.map_err(TransportError::from),
                    Err(_) => Err(TransportError::Timeout(timeout)),
                }
            })?;
        }

        Ok(())
    }

    fn close(&mut self) {
        self.publishing = false;
        if let Some(mut link) = self.link.take() {
            if let Err(e) = self.runtime.block_on(link.stream.shutdown()) {
                debug!("Socket shutdown failed: {}", e);
            }
            info!("RTMP connection closed");
        }
    }
}

impl Drop for RtmpConnection {
    fn drop(&mut self) {
        self.close();
    }
}

async fn open_link(target: &RtmpTarget) -> TransportResult<Link> {
    let mut stream = TcpStream::connect(target.address())
        .await
        .map_err(|e| TransportError::Connection(format!("TCP connect failed: {}", e)))?;

    debug!("TCP connection established, starting handshake");

    let mut handshake = Handshake::new(PeerType::Client);
    let p0_p1 = handshake
        .generate_outbound_p0_and_p1()
        .map_err(|e| TransportError::Connection(format!("Handshake generation failed: {:?}", e)))?;
    stream.write_all(&p0_p1).await?;

    let mut read_buf = vec![0u8; 4096];
    let leftover_bytes = loop {
        let n = stream.read(&mut read_buf).await?;
        if n == 0 {
            return Err(TransportError::Connection(
                "Connection closed during handshake".to_string(),
            ));
        }

        match handshake.process_bytes(&read_buf[..n]) {
            Ok(HandshakeProcessResult::InProgress { response_bytes }) => {
                if !response_bytes.is_empty() {
                    stream.write_all(&response_bytes).await?;
                }
            }
            Ok(HandshakeProcessResult::Completed {
                response_bytes,
                remaining_bytes,
            }) => {
                if !response_bytes.is_empty() {
                    stream.write_all(&response_bytes).await?;
                }
                break remaining_bytes;
            }
            Err(e) => {
                return Err(TransportError::Connection(format!(
                    "Handshake failed: {:?}",
                    e
                )));
            }
        }
    };

    debug!("Handshake complete, creating RTMP session");

    let (session, initial_results) = ClientSession::new(ClientSessionConfig::new())
        .map_err(|e| TransportError::Protocol(format!("Session creation failed: {:?}", e)))?;

    let mut link = Link {
        stream,
        session,
        read_buf,
    };
    write_outbound(&mut link.stream, initial_results).await?;

    if !leftover_bytes.is_empty() {
        let results = link
            .session
            .handle_input(&leftover_bytes)
            .map_err(|e| TransportError::Protocol(format!("Session input error: {:?}", e)))?;
        write_outbound(&mut link.stream, results).await?;
    }

    debug!(app = %target.app, "Requesting RTMP connection");
    let request = link
        .session
        .request_connection(target.app.clone())
        .map_err(|e| TransportError::Protocol(format!("Connection request failed: {:?}", e)))?;
    write_outbound(&mut link.stream, vec![request]).await?;

    pump_until(&mut link, |event| match event {
        ClientSessionEvent::ConnectionRequestAccepted => Some(Ok(())),
        ClientSessionEvent::ConnectionRequestRejected { description } => {
            Some(Err(TransportError::Rejected(description)))
        }
        _ => None,
    })
    .await?;

    debug!("Connection accepted by server");
    Ok(link)
}

async fn request_publish(link: &mut Link, stream_key: String) -> TransportResult<()> {
    debug!(stream_key = %stream_key, "Requesting publish");
    let request = link
        .session
        .request_publishing(stream_key, PublishRequestType::Live)
        .map_err(|e| TransportError::Protocol(format!("Publish request failed: {:?}", e)))?;
    write_outbound(&mut link.stream, vec![request]).await?;

    pump_until(link, |event| match event {
        ClientSessionEvent::PublishRequestAccepted => Some(Ok(())),
        _ => None,
    })
    .await
}

/// Read from the server, answering protocol traffic, until `done` decides.
async fn pump_until<F>(link: &mut Link, mut done: F) -> TransportResult<()>
where
    F: FnMut(ClientSessionEvent) -> Option<TransportResult<()>>,
{
    loop {
        let n = link.stream.read(&mut link.read_buf).await?;
        if n == 0 {
            return Err(TransportError::Connection("Connection closed".to_string()));
        }

        let results = link
            .session
            .handle_input(&link.read_buf[..n])
            .map_err(|e| TransportError::Protocol(format!("Session input error: {:?}", e)))?;

        let mut outcome = None;
        for result in results {
            match result {
                ClientSessionResult::OutboundResponse(packet) => {
                    link.stream.write_all(&packet.bytes).await?;
                }
                ClientSessionResult::RaisedEvent(event) => {
                    if outcome.is_none() {
                        trace!("Received event: {:?}", event);
                        outcome = done(event);
                    }
                }
                _ => {}
            }
        }

        if let Some(outcome) = outcome {
            return outcome;
        }
    }
}

async fn write_outbound(
    stream: &mut TcpStream,
    results: Vec<ClientSessionResult>,
) -> TransportResult<()> {
    for result in results {
        if let ClientSessionResult::OutboundResponse(packet) = result {
            stream.write_all(&packet.bytes).await?;
        }
    }
    Ok(())
}
