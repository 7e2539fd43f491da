// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use crate::{MMAL_ES_TYPE_UNKNOWN, MMAL_TIME_UNKNOWN};

/// Rational number (frame rates, pixel aspect ratios).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

/// Rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub crop: Rect,
    pub frame_rate: Rational,
    pub par: Rational,
    pub color_space: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioFormat {
    pub channels: u32,
    pub sample_rate: u32,
    pub bits_per_sample: u32,
    pub block_align: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubpictureFormat {
    pub x_offset: u32,
    pub y_offset: u32,
}

/// Type-specific part of an elementary stream format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EsSpecificFormat {
    #[default]
    None,
    Audio(AudioFormat),
    Video(VideoFormat),
    Subpicture(SubpictureFormat),
}

/// Elementary stream format carried by a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsFormat {
    pub es_type: u32,
    pub encoding: u32,
    pub encoding_variant: u32,
    pub es: EsSpecificFormat,
    pub bitrate: u32,
    pub flags: u32,
    pub extradata: Vec<u8>,
}

impl Default for EsFormat {
    fn default() -> Self {
        Self {
            es_type: MMAL_ES_TYPE_UNKNOWN,
            encoding: 0,
            encoding_variant: 0,
            es: EsSpecificFormat::None,
            bitrate: 0,
            flags: 0,
            extradata: Vec::new(),
        }
    }
}

/// Buffer count and size a port needs for its current format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferRequirements {
    pub num_min: u32,
    pub num_recommended: u32,
    pub size_min: u32,
    pub size_recommended: u32,
    pub alignment_min: u32,
}

/// Identifies a port within a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortAddress {
    pub port_type: u32,
    pub index: u32,
}

/// Static description of a port as enumerated by the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct PortInfo {
    pub name: String,
    pub address: PortAddress,
    pub capabilities: u32,
    pub supported_encodings: Vec<u32>,
    pub format: EsFormat,
    pub requirements: BufferRequirements,
}

/// One unit of media data crossing the driver boundary.
///
/// `owner` and `slot` belong to whoever allocated the header; drivers pass
/// them through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferHeader {
    pub owner: u128,
    pub slot: u32,
    pub data: Vec<u8>,
    pub length: u32,
    pub offset: u32,
    pub flags: u32,
    pub cmd: u32,
    pub pts: i64,
    pub dts: i64,
}

impl BufferHeader {
    /// Allocates a zeroed header with `capacity` bytes of payload.
    pub fn with_capacity(owner: u128, slot: u32, capacity: usize) -> Self {
        Self {
            owner,
            slot,
            data: vec![0; capacity],
            length: 0,
            offset: 0,
            flags: 0,
            cmd: 0,
            pts: MMAL_TIME_UNKNOWN,
            dts: MMAL_TIME_UNKNOWN,
        }
    }

    /// Builds an event header owned by the driver.
    pub fn event(cmd: u32, payload: Vec<u8>) -> Self {
        let length = payload.len() as u32;
        Self {
            owner: 0,
            slot: 0,
            data: payload,
            length,
            offset: 0,
            flags: 0,
            cmd,
            pts: MMAL_TIME_UNKNOWN,
            dts: MMAL_TIME_UNKNOWN,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Clears everything but the allocation and the ownership tags.
    pub fn reset(&mut self) {
        self.length = 0;
        self.offset = 0;
        self.flags = 0;
        self.cmd = 0;
        self.pts = MMAL_TIME_UNKNOWN;
        self.dts = MMAL_TIME_UNKNOWN;
    }
}

/// Typed parameter payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Boolean(bool),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Rational(Rational),
    /// Fixed-size structure, serialized by the caller.
    Struct(Vec<u8>),
    /// Variable-length byte array.
    Bytes(Vec<u8>),
}
