//! Annex B NAL unit helpers.
//!
//! Encoders emit H.264 as an **Annex B** byte stream, where every NAL unit is
//! preceded by a 3-byte (`00 00 01`) or 4-byte (`00 00 00 01`) start code.
//! RTMP wants the raw units behind a length prefix instead, so the packetizer
//! strips start codes before framing.

use bytes::Bytes;

/// NAL unit types relevant for H.264.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NalUnitType {
    /// Non-IDR slice (P frame).
    NonIdrSlice = 1,
    /// IDR slice (keyframe).
    IdrSlice = 5,
    /// Supplemental Enhancement Information.
    Sei = 6,
    /// Sequence Parameter Set.
    Sps = 7,
    /// Picture Parameter Set.
    Pps = 8,
    /// Access Unit Delimiter.
    Aud = 9,
    /// Other/unknown NAL type.
    Other = 0,
}

impl From<u8> for NalUnitType {
    fn from(byte: u8) -> Self {
        match byte & 0x1F {
            1 => NalUnitType::NonIdrSlice,
            5 => NalUnitType::IdrSlice,
            6 => NalUnitType::Sei,
            7 => NalUnitType::Sps,
            8 => NalUnitType::Pps,
            9 => NalUnitType::Aud,
            _ => NalUnitType::Other,
        }
    }
}

/// A single NAL unit extracted from an Annex B stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NalUnit {
    /// The NAL unit type.
    pub nal_type: NalUnitType,
    /// Annex B representation, start code included.
    pub annex_b: Bytes,
    /// Length of the start code at the front of `annex_b`.
    pub start_code_len: usize,
}

impl NalUnit {
    /// Unit payload without the start code (NAL header byte first).
    pub fn payload(&self) -> &[u8] {
        &self.annex_b[self.start_code_len..]
    }
}

/// Length of the start code at the front of `data`.
///
/// The byte at offset 2 decides between the two forms: `00` means the 4-byte
/// code, anything else the 3-byte one. Data that does not begin with `00 00`
/// has no start code.
pub fn start_code_len(data: &[u8]) -> usize {
    if data.len() < 3 || data[0] != 0 || data[1] != 0 {
        return 0;
    }
    if data[2] == 0x00 {
        4.min(data.len())
    } else {
        3
    }
}

/// Strip a leading Annex B start code.
pub fn strip_start_code(data: &[u8]) -> &[u8] {
    &data[start_code_len(data)..]
}

/// Split an Annex B byte stream into NAL units, keeping each start code.
pub fn split_annex_b(data: &[u8]) -> Vec<NalUnit> {
    let mut starts = Vec::new();
    let len = data.len();
    let mut i = 0;

    while i + 2 < len {
        if data[i] == 0 && data[i + 1] == 0 {
            if data[i + 2] == 1 {
                starts.push((i, 3));
                i += 3;
                continue;
            }
            if i + 3 < len && data[i + 2] == 0 && data[i + 3] == 1 {
                starts.push((i, 4));
                i += 4;
                continue;
            }
        }
        i += 1;
    }

    let mut nals = Vec::with_capacity(starts.len());
    for (idx, &(start, code_len)) in starts.iter().enumerate() {
        let end = starts.get(idx + 1).map_or(len, |&(next, _)| next);
        let payload_start = start + code_len;
        if payload_start >= end {
            continue;
        }
        nals.push(NalUnit {
            nal_type: NalUnitType::from(data[payload_start]),
            annex_b: Bytes::copy_from_slice(&data[start..end]),
            start_code_len: code_len,
        });
    }

    nals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_code_length() {
        assert_eq!(start_code_len(&[0x00, 0x00, 0x00, 0x01, 0x65]), 4);
        assert_eq!(start_code_len(&[0x00, 0x00, 0x01, 0x65]), 3);
        assert_eq!(start_code_len(&[0x65, 0x88]), 0);
        assert_eq!(strip_start_code(&[0x00, 0x00, 0x01, 0x41, 0x9A]), &[0x41, 0x9A]);
    }

    #[test]
    fn test_split_annex_b_3byte_start_code() {
        let data = [0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1E];
        let nals = split_annex_b(&data);
        assert_eq!(nals.len(), 1);
        assert_eq!(nals[0].nal_type, NalUnitType::Sps);
        assert_eq!(nals[0].payload(), &[0x67, 0x42, 0x00, 0x1E]);
        assert_eq!(nals[0].annex_b.as_ref(), &data);
    }

    #[test]
    fn test_split_annex_b_mixed_units() {
        let data = [
            0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1E, // SPS
            0x00, 0x00, 0x00, 0x01, 0x68, 0xCE, 0x3C, 0x80, // PPS
            0x00, 0x00, 0x01, 0x65, 0x88, 0x84, // IDR
        ];
        let nals = split_annex_b(&data);
        assert_eq!(nals.len(), 3);
        assert_eq!(nals[0].nal_type, NalUnitType::Sps);
        assert_eq!(nals[1].nal_type, NalUnitType::Pps);
        assert_eq!(nals[1].payload(), &[0x68, 0xCE, 0x3C, 0x80]);
        assert_eq!(nals[2].nal_type, NalUnitType::IdrSlice);
        assert_eq!(nals[2].start_code_len, 3);
        assert_eq!(nals[2].annex_b.as_ref(), &[0x00, 0x00, 0x01, 0x65, 0x88, 0x84]);
    }

    #[test]
    fn test_split_annex_b_ignores_leading_garbage() {
        let data = [0xFF, 0x00, 0x00, 0x01, 0x41, 0x9A];
        let nals = split_annex_b(&data);
        assert_eq!(nals.len(), 1);
        assert_eq!(nals[0].nal_type, NalUnitType::NonIdrSlice);
    }
}
