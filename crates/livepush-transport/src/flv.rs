//! FLV tag body packetizer.
//!
//! Builds the bodies RTMP expects for H.264 and AAC:
//!
//! | Kind | Byte 0 | Byte 1 | Rest |
//! |---|---|---|---|
//! | Audio config | `0xAF` stereo / `0xAE` mono | `0x00` | AudioSpecificConfig |
//! | Audio frame | same | `0x01` | raw AAC |
//! | Video config | `0x17` | `0x00` | `00 00 00` + AVC decoder configuration record |
//! | Video keyframe | `0x17` | `0x01` | `00 00 00` + u32 BE length + NAL payload |
//! | Video interframe | `0x27` | `0x01` | same as keyframe |
//!
//! Composition time is always zero: the encoders are set up without frame
//! reordering (no B-frames), so presentation order equals decode order.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{debug, warn};

use crate::nal::strip_start_code;
use crate::packet::{PacketBuffer, PacketKind};

const AVC_KEYFRAME: u8 = 0x17;
const AVC_INTERFRAME: u8 = 0x27;
const AVC_SEQUENCE_HEADER: u8 = 0x00;
const AVC_NALU: u8 = 0x01;

const AAC_STEREO: u8 = 0xAF;
const AAC_MONO: u8 = 0xAE;
const AAC_SEQUENCE_HEADER: u8 = 0x00;
const AAC_RAW: u8 = 0x01;

/// Build the video configuration packet from SPS and PPS.
///
/// Both parameter sets are raw units without start codes. Returns `None`
/// when the SPS is too short to carry profile, compatibility and level, or
/// when either set does not fit a 16-bit length.
pub fn video_config(sps: &[u8], pps: &[u8]) -> Option<PacketBuffer> {
    if sps.len() < 4 {
        warn!(sps_len = sps.len(), "SPS too short for decoder configuration");
        return None;
    }
    let (Ok(sps_len), Ok(pps_len)) = (u16::try_from(sps.len()), u16::try_from(pps.len())) else {
        warn!(
            sps_len = sps.len(),
            pps_len = pps.len(),
            "Parameter set too long for a 16-bit length field"
        );
        return None;
    };

    let mut buf = BytesMut::with_capacity(16 + sps.len() + pps.len());

    buf.put_u8(AVC_KEYFRAME);
    buf.put_u8(AVC_SEQUENCE_HEADER);
    // Composition time
    buf.put_slice(&[0x00, 0x00, 0x00]);

    // configurationVersion
    buf.put_u8(0x01);
    // AVCProfileIndication, profile_compatibility, AVCLevelIndication
    buf.put_slice(&sps[1..4]);
    // lengthSizeMinusOne: 4-byte NAL lengths, reserved bits set
    buf.put_u8(0xFF);
    // numOfSequenceParameterSets: one, reserved bits set
    buf.put_u8(0xE1);
    buf.put_u16(sps_len);
    buf.put_slice(sps);

    // numOfPictureParameterSets
    buf.put_u8(0x01);
    buf.put_u16(pps_len);
    buf.put_slice(pps);

    debug!(
        sps_len = sps.len(),
        pps_len = pps.len(),
        body_len = buf.len(),
        "Built video configuration packet"
    );

    Some(PacketBuffer::new(PacketKind::VideoConfig, buf.freeze()))
}

/// Build a video frame packet from one Annex B NAL unit.
pub fn video_frame(nal: &[u8], is_keyframe: bool) -> PacketBuffer {
    let payload = strip_start_code(nal);
    let mut buf = BytesMut::with_capacity(9 + payload.len());

    buf.put_u8(if is_keyframe { AVC_KEYFRAME } else { AVC_INTERFRAME });
    buf.put_u8(AVC_NALU);
    buf.put_slice(&[0x00, 0x00, 0x00]);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);

    let kind = if is_keyframe {
        PacketKind::VideoKeyFrame
    } else {
        PacketKind::VideoInterFrame
    };
    PacketBuffer::new(kind, buf.freeze())
}

/// Build the audio configuration packet from an AudioSpecificConfig.
pub fn audio_config(asc: &[u8], channels: u16) -> PacketBuffer {
    PacketBuffer::new(
        PacketKind::AudioConfig,
        audio_body(AAC_SEQUENCE_HEADER, asc, channels),
    )
}

/// Build an audio frame packet from raw AAC bytes.
pub fn audio_frame(aac: &[u8], channels: u16) -> PacketBuffer {
    PacketBuffer::new(PacketKind::AudioFrame, audio_body(AAC_RAW, aac, channels))
}

fn audio_body(packet_type: u8, data: &[u8], channels: u16) -> Bytes {
    let mut buf = BytesMut::with_capacity(2 + data.len());
    buf.put_u8(if channels == 1 { AAC_MONO } else { AAC_STEREO });
    buf.put_u8(packet_type);
    buf.put_slice(data);
    buf.freeze()
}

/// Recover SPS and PPS from a video configuration packet body.
pub fn parse_video_config(body: &[u8]) -> Option<(Bytes, Bytes)> {
    let mut buf = body;
    if buf.remaining() < 11 || buf.get_u8() != AVC_KEYFRAME || buf.get_u8() != AVC_SEQUENCE_HEADER
    {
        return None;
    }
    // Composition time, version, profile/compat/level, length size
    buf.advance(3 + 1 + 3 + 1);

    if buf.remaining() < 3 || buf.get_u8() & 0x1F != 1 {
        return None;
    }
    let sps_len = buf.get_u16() as usize;
    if buf.remaining() < sps_len {
        return None;
    }
    let sps = Bytes::copy_from_slice(&buf[..sps_len]);
    buf.advance(sps_len);

    if buf.remaining() < 3 || buf.get_u8() != 1 {
        return None;
    }
    let pps_len = buf.get_u16() as usize;
    if buf.remaining() < pps_len {
        return None;
    }
    let pps = Bytes::copy_from_slice(&buf[..pps_len]);

    Some((sps, pps))
}
