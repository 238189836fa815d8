//! H.264 Annex-B pass-through codec
//!
//! Splits each chunk into NAL units and hands access units on as coded
//! frames. No pixel decoding happens here; keyframes carry the latest
//! parameter sets in front so that every keyframe is independently
//! decodable downstream.

use bytes::{BufMut, Bytes, BytesMut};
use contracts::{
    Codec, CodedPacket, ContractError, FrameFormat, HandshakeInfo, VideoFrame,
};

const NAL_TYPE_MASK: u8 = 0x1F;
const NAL_NON_IDR: u8 = 1;
const NAL_IDR: u8 = 5;
const NAL_SPS: u8 = 7;
const NAL_PPS: u8 = 8;
const START_CODE: [u8; 4] = [0, 0, 0, 1];

/// Split Annex-B data into NAL unit bodies (start codes removed)
pub fn split_nal_units(data: &[u8]) -> Vec<&[u8]> {
    let mut units = Vec::new();
    let mut cursor = 0usize;

    while let Some((start, start_code_len)) = find_start_code(data, cursor) {
        let nal_start = start + start_code_len;
        if nal_start >= data.len() {
            break;
        }
        let next = find_start_code(data, nal_start)
            .map(|(idx, _)| idx)
            .unwrap_or(data.len());

        let mut nal_end = next;
        while nal_end > nal_start && data[nal_end - 1] == 0 {
            nal_end -= 1;
        }
        if nal_end > nal_start {
            units.push(&data[nal_start..nal_end]);
        }
        cursor = next;
    }
    units
}

/// Position and length of the next 3- or 4-byte start code at or after `from`
fn find_start_code(data: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i + 3 <= data.len() {
        if data[i] == 0 && data[i + 1] == 0 {
            if data[i + 2] == 1 {
                return Some((i, 3));
            }
            if data[i + 2] == 0 && data.get(i + 3) == Some(&1) {
                return Some((i, 4));
            }
        }
        i += 1;
    }
    None
}

fn nal_type(unit: &[u8]) -> Option<u8> {
    unit.first().map(|header| header & NAL_TYPE_MASK)
}

fn is_vcl(nal: u8) -> bool {
    (NAL_NON_IDR..=NAL_IDR).contains(&nal)
}

/// Annex-B H.264 parser producing coded frames
#[derive(Debug, Default)]
pub struct AnnexBCodec {
    width: u32,
    height: u32,
    configured: bool,
    sps: Option<Bytes>,
    pps: Option<Bytes>,
}

impl AnnexBCodec {
    pub fn new() -> Self {
        Self::default()
    }

    fn remember_parameter_sets(&mut self, data: &[u8]) {
        for unit in split_nal_units(data) {
            match nal_type(unit) {
                Some(NAL_SPS) => self.sps = Some(Bytes::copy_from_slice(unit)),
                Some(NAL_PPS) => self.pps = Some(Bytes::copy_from_slice(unit)),
                _ => {}
            }
        }
    }

    fn with_parameter_sets(&self, data: &Bytes) -> Bytes {
        let mut out = BytesMut::new();
        for set in [&self.sps, &self.pps].into_iter().flatten() {
            out.put_slice(&START_CODE);
            out.put_slice(set);
        }
        out.put_slice(data);
        out.freeze()
    }
}

impl Codec for AnnexBCodec {
    fn name(&self) -> &str {
        "h264-annexb"
    }

    fn configure(&mut self, info: &HandshakeInfo) {
        self.width = u32::from(info.width);
        self.height = u32::from(info.height);
        self.configured = true;
    }

    fn parse(&mut self, data: &[u8]) -> Result<Vec<CodedPacket>, ContractError> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        let types: Vec<u8> = split_nal_units(data)
            .into_iter()
            .filter_map(nal_type)
            .collect();

        let keyframe = types.contains(&NAL_IDR);
        let nal = if keyframe {
            Some(NAL_IDR)
        } else {
            types
                .iter()
                .copied()
                .find(|t| is_vcl(*t))
                .or_else(|| types.first().copied())
        };
        Ok(vec![CodedPacket {
            data: Bytes::copy_from_slice(data),
            nal_type: nal,
            keyframe,
        }])
    }

    fn decode(&mut self, packet: &CodedPacket) -> Result<Vec<VideoFrame>, ContractError> {
        if !self.configured {
            return Err(ContractError::Other(
                "h264-annexb: decode before configure".to_string(),
            ));
        }
        match packet.nal_type {
            Some(NAL_SPS) | Some(NAL_PPS) => {
                self.remember_parameter_sets(&packet.data);
                Ok(Vec::new())
            }
            Some(t) if is_vcl(t) => {
                let data = if packet.keyframe {
                    self.remember_parameter_sets(&packet.data);
                    let inline_sps = split_nal_units(&packet.data)
                        .into_iter()
                        .any(|u| nal_type(u) == Some(NAL_SPS));
                    if inline_sps {
                        packet.data.clone()
                    } else {
                        self.with_parameter_sets(&packet.data)
                    }
                } else {
                    packet.data.clone()
                };
                Ok(vec![VideoFrame {
                    width: self.width,
                    height: self.height,
                    format: FrameFormat::Coded,
                    data,
                }])
            }
            _ => Ok(Vec::new()),
        }
    }
}
