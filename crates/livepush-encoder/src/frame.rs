//! Raw and encoded frame types.

use bytes::{Bytes, BytesMut};
use livepush_transport::nal::{split_annex_b, NalUnitType};

use crate::error::EncoderError;
use crate::EncoderResult;

/// A raw video frame in planar I420 (Y, then U, then V).
#[derive(Debug, Clone)]
pub struct RawVideoFrame {
    width: u32,
    height: u32,
    data: Bytes,
}

impl RawVideoFrame {
    /// Calculate expected I420 buffer size for given dimensions.
    pub fn i420_buffer_size(width: u32, height: u32) -> usize {
        let y_size = (width * height) as usize;
        y_size + y_size / 2
    }

    /// Wrap an I420 buffer.
    pub fn from_i420(width: u32, height: u32, data: Bytes) -> EncoderResult<Self> {
        let expected = Self::i420_buffer_size(width, height);
        if data.len() != expected {
            return Err(EncoderError::InvalidInput(format!(
                "Expected {} bytes ({}x{} I420), got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Convert an NV21 camera buffer (Y plane, then interleaved V/U) to I420.
    pub fn from_nv21(width: u32, height: u32, nv21: &[u8]) -> EncoderResult<Self> {
        let expected = Self::i420_buffer_size(width, height);
        if nv21.len() != expected {
            return Err(EncoderError::InvalidInput(format!(
                "Expected {} bytes ({}x{} NV21), got {}",
                expected,
                width,
                height,
                nv21.len()
            )));
        }

        let y_size = (width * height) as usize;
        let chroma_size = y_size / 4;
        let (y_plane, vu_plane) = nv21.split_at(y_size);

        let mut buf = BytesMut::with_capacity(expected);
        buf.extend_from_slice(y_plane);
        buf.extend(vu_plane.chunks_exact(2).map(|vu| vu[1]).take(chroma_size));
        buf.extend(vu_plane.chunks_exact(2).map(|vu| vu[0]).take(chroma_size));

        Ok(Self {
            width,
            height,
            data: buf.freeze(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn y_plane(&self) -> &[u8] {
        &self.data[..self.y_size()]
    }

    pub fn u_plane(&self) -> &[u8] {
        let start = self.y_size();
        &self.data[start..start + self.y_size() / 4]
    }

    pub fn v_plane(&self) -> &[u8] {
        let start = self.y_size() + self.y_size() / 4;
        &self.data[start..]
    }

    fn y_size(&self) -> usize {
        (self.width * self.height) as usize
    }
}

/// SPS and PPS as raw units (no start code).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSets {
    pub sps: Bytes,
    pub pps: Bytes,
}

/// Output of one video encode call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedVideoFrame {
    /// Whether this frame is an IDR picture.
    pub is_keyframe: bool,

    /// Parameter sets emitted with this frame, if any.
    pub parameter_sets: Option<ParameterSets>,

    /// Picture NAL units in Annex B form, start codes included.
    pub slices: Vec<Bytes>,
}

impl EncodedVideoFrame {
    /// Sort an Annex B access unit into parameter sets and picture units.
    ///
    /// Access unit delimiters are dropped. Parameter sets are reported only
    /// when both SPS and PPS are present.
    pub fn from_annex_b(data: &[u8], is_keyframe: bool) -> Self {
        let mut sps = None;
        let mut pps = None;
        let mut slices = Vec::new();

        for nal in split_annex_b(data) {
            match nal.nal_type {
                NalUnitType::Sps => sps = Some(Bytes::copy_from_slice(nal.payload())),
                NalUnitType::Pps => pps = Some(Bytes::copy_from_slice(nal.payload())),
                NalUnitType::Aud => {}
                _ => slices.push(nal.annex_b),
            }
        }

        let parameter_sets = match (sps, pps) {
            (Some(sps), Some(pps)) => Some(ParameterSets { sps, pps }),
            _ => None,
        };

        Self {
            is_keyframe,
            parameter_sets,
            slices,
        }
    }

    /// Check if the encoder produced nothing (still buffering).
    pub fn is_empty(&self) -> bool {
        self.parameter_sets.is_none() && self.slices.is_empty()
    }
}
