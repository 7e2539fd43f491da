// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Port format types.
//!
//! A [`Format`] describes the *shape* of the data a port carries: stream type,
//! encoding and, for video, dimensions, crop and frame rate. Payload bytes are
//! never interpreted by the engine.

use std::{fmt, str::FromStr};

use mmal_sys::{AudioFormat, EsSpecificFormat, Rational, Rect, SubpictureFormat, VideoFormat};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// FourCC encoding identifier.
///
/// Serializes as its four-character code (`"JPEG"`, `"I420"`, ...).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Encoding(pub u32);

impl Encoding {
    pub const UNKNOWN: Encoding = Encoding(mmal_sys::MMAL_ENCODING_UNKNOWN);
    pub const H264: Encoding = Encoding(mmal_sys::MMAL_ENCODING_H264);
    pub const MJPEG: Encoding = Encoding(mmal_sys::MMAL_ENCODING_MJPEG);
    pub const JPEG: Encoding = Encoding(mmal_sys::MMAL_ENCODING_JPEG);
    pub const GIF: Encoding = Encoding(mmal_sys::MMAL_ENCODING_GIF);
    pub const PNG: Encoding = Encoding(mmal_sys::MMAL_ENCODING_PNG);
    pub const BMP: Encoding = Encoding(mmal_sys::MMAL_ENCODING_BMP);
    pub const I420: Encoding = Encoding(mmal_sys::MMAL_ENCODING_I420);
    pub const NV12: Encoding = Encoding(mmal_sys::MMAL_ENCODING_NV12);
    pub const YUYV: Encoding = Encoding(mmal_sys::MMAL_ENCODING_YUYV);
    pub const RGB24: Encoding = Encoding(mmal_sys::MMAL_ENCODING_RGB24);
    pub const BGR24: Encoding = Encoding(mmal_sys::MMAL_ENCODING_BGR24);
    pub const RGBA: Encoding = Encoding(mmal_sys::MMAL_ENCODING_RGBA);
    pub const OPAQUE: Encoding = Encoding(mmal_sys::MMAL_ENCODING_OPAQUE);
    pub const PCM_SIGNED: Encoding = Encoding(mmal_sys::MMAL_ENCODING_PCM_SIGNED);

    const KNOWN: [(Encoding, &'static str); 15] = [
        (Encoding::UNKNOWN, "unknown"),
        (Encoding::H264, "H.264"),
        (Encoding::MJPEG, "Motion JPEG"),
        (Encoding::JPEG, "JPEG"),
        (Encoding::GIF, "GIF"),
        (Encoding::PNG, "PNG"),
        (Encoding::BMP, "BMP"),
        (Encoding::I420, "I420"),
        (Encoding::NV12, "NV12"),
        (Encoding::YUYV, "YUYV"),
        (Encoding::RGB24, "RGB24"),
        (Encoding::BGR24, "BGR24"),
        (Encoding::RGBA, "RGBA"),
        (Encoding::OPAQUE, "opaque"),
        (Encoding::PCM_SIGNED, "signed PCM"),
    ];

    /// Builds an encoding from a four-character code.
    pub const fn from_fourcc(code: [u8; 4]) -> Self {
        Encoding(mmal_sys::fourcc(code[0], code[1], code[2], code[3]))
    }

    /// Returns the four-character code bytes.
    pub fn fourcc(&self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Returns a human-readable name, if the encoding is a known one.
    pub fn name(&self) -> Option<&'static str> {
        Self::KNOWN
            .iter()
            .find(|(encoding, _)| encoding == self)
            .map(|(_, name)| *name)
    }

    /// Returns `true` for compressed bitstream encodings.
    pub fn is_compressed(&self) -> bool {
        matches!(
            *self,
            Encoding::H264
                | Encoding::MJPEG
                | Encoding::JPEG
                | Encoding::GIF
                | Encoding::PNG
                | Encoding::BMP
        )
    }

    fn fourcc_string(&self) -> String {
        self.fourcc()
            .iter()
            .map(|b| if b.is_ascii_graphic() || *b == b' ' { *b as char } else { '?' })
            .collect()
    }
}

impl fmt::Debug for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Encoding({:?})", self.fourcc_string())
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => f.write_str(&self.fourcc_string()),
        }
    }
}

impl FromStr for Encoding {
    type Err = Error;

    /// Parses a FourCC (`"JPEG"`, `"GIF "`, `"GIF"`) or a known name (`"H.264"`).
    fn from_str(s: &str) -> Result<Self> {
        if let Some((encoding, _)) = Self::KNOWN
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(s))
        {
            return Ok(*encoding);
        }
        let bytes = s.as_bytes();
        if bytes.is_empty() || bytes.len() > 4 || !s.is_ascii() {
            return Err(Error::InvalidParameter(format!(
                "\"{s}\" is not a FourCC encoding"
            )));
        }
        let mut code = [b' '; 4];
        code[..bytes.len()].copy_from_slice(bytes);
        Ok(Encoding::from_fourcc(code))
    }
}

impl TryFrom<String> for Encoding {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Encoding> for String {
    fn from(value: Encoding) -> Self {
        value.fourcc_string()
    }
}

/// Elementary stream type of a port format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EsType {
    /// Type not specified or unknown.
    Unknown,
    /// Opaque control data (control ports).
    Control,
    Audio,
    Video,
    Subpicture,
}

impl From<u32> for EsType {
    fn from(value: u32) -> Self {
        match value {
            mmal_sys::MMAL_ES_TYPE_CONTROL => EsType::Control,
            mmal_sys::MMAL_ES_TYPE_AUDIO => EsType::Audio,
            mmal_sys::MMAL_ES_TYPE_VIDEO => EsType::Video,
            mmal_sys::MMAL_ES_TYPE_SUBPICTURE => EsType::Subpicture,
            _ => EsType::Unknown,
        }
    }
}

impl From<EsType> for u32 {
    fn from(value: EsType) -> Self {
        match value {
            EsType::Unknown => mmal_sys::MMAL_ES_TYPE_UNKNOWN,
            EsType::Control => mmal_sys::MMAL_ES_TYPE_CONTROL,
            EsType::Audio => mmal_sys::MMAL_ES_TYPE_AUDIO,
            EsType::Video => mmal_sys::MMAL_ES_TYPE_VIDEO,
            EsType::Subpicture => mmal_sys::MMAL_ES_TYPE_SUBPICTURE,
        }
    }
}

impl fmt::Display for EsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EsType::Unknown => "unknown",
            EsType::Control => "control",
            EsType::Audio => "audio",
            EsType::Video => "video",
            EsType::Subpicture => "subpicture",
        })
    }
}

/// Negotiated data description of a port.
///
/// # Examples
///
/// ```
/// use mmal::{Encoding, Format};
///
/// let format = Format::video(Encoding::I420, 1920, 1080).with_frame_rate(30, 1);
/// assert_eq!(format.video_params().unwrap().crop.height, 1080);
/// format.validate().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Format {
    pub(crate) value: mmal_sys::EsFormat,
}

impl Format {
    /// Returns an empty format of the given type.
    pub fn new(es_type: EsType, encoding: Encoding) -> Self {
        let es = match es_type {
            EsType::Video => EsSpecificFormat::Video(VideoFormat::default()),
            EsType::Audio => EsSpecificFormat::Audio(AudioFormat::default()),
            EsType::Subpicture => EsSpecificFormat::Subpicture(SubpictureFormat::default()),
            EsType::Control | EsType::Unknown => EsSpecificFormat::None,
        };
        Self {
            value: mmal_sys::EsFormat {
                es_type: es_type.into(),
                encoding: encoding.0,
                es,
                ..Default::default()
            },
        }
    }

    /// Returns a video format with a full-frame crop and square pixels.
    pub fn video(encoding: Encoding, width: u32, height: u32) -> Self {
        let mut format = Self::new(EsType::Video, encoding);
        format.value.es = EsSpecificFormat::Video(VideoFormat {
            width,
            height,
            crop: Rect {
                x: 0,
                y: 0,
                width: i32::try_from(width).unwrap_or(i32::MAX),
                height: i32::try_from(height).unwrap_or(i32::MAX),
            },
            frame_rate: Rational { num: 0, den: 1 },
            par: Rational { num: 1, den: 1 },
            color_space: 0,
        });
        format
    }

    /// Returns an audio format.
    pub fn audio(encoding: Encoding, channels: u32, sample_rate: u32, bits_per_sample: u32) -> Self {
        let mut format = Self::new(EsType::Audio, encoding);
        format.value.es = EsSpecificFormat::Audio(AudioFormat {
            channels,
            sample_rate,
            bits_per_sample,
            // Zero on overflow, which validation rejects.
            block_align: channels
                .checked_mul(bits_per_sample.div_ceil(8))
                .unwrap_or(0),
        });
        format
    }

    /// Returns the opaque format used by control ports.
    pub fn control() -> Self {
        Self::new(EsType::Control, Encoding::UNKNOWN)
    }

    pub(crate) fn from_raw(value: mmal_sys::EsFormat) -> Self {
        Self { value }
    }

    /// Returns the raw driver representation.
    pub fn as_raw(&self) -> &mmal_sys::EsFormat {
        &self.value
    }

    pub fn es_type(&self) -> EsType {
        EsType::from(self.value.es_type)
    }

    pub fn encoding(&self) -> Encoding {
        Encoding(self.value.encoding)
    }

    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.value.encoding = encoding.0;
    }

    /// Returns the encoding variant (only meaningful for opaque encodings).
    pub fn encoding_variant(&self) -> Encoding {
        Encoding(self.value.encoding_variant)
    }

    pub fn set_encoding_variant(&mut self, variant: Encoding) {
        self.value.encoding_variant = variant.0;
    }

    pub fn bitrate(&self) -> u32 {
        self.value.bitrate
    }

    pub fn set_bitrate(&mut self, bitrate: u32) {
        self.value.bitrate = bitrate;
    }

    pub fn extradata(&self) -> &[u8] {
        &self.value.extradata
    }

    pub fn set_extradata(&mut self, extradata: Vec<u8>) {
        self.value.extradata = extradata;
    }

    pub fn video_params(&self) -> Option<&VideoFormat> {
        match &self.value.es {
            EsSpecificFormat::Video(video) => Some(video),
            _ => None,
        }
    }

    pub fn video_params_mut(&mut self) -> Option<&mut VideoFormat> {
        match &mut self.value.es {
            EsSpecificFormat::Video(video) => Some(video),
            _ => None,
        }
    }

    pub fn audio_params(&self) -> Option<&AudioFormat> {
        match &self.value.es {
            EsSpecificFormat::Audio(audio) => Some(audio),
            _ => None,
        }
    }

    pub fn audio_params_mut(&mut self) -> Option<&mut AudioFormat> {
        match &mut self.value.es {
            EsSpecificFormat::Audio(audio) => Some(audio),
            _ => None,
        }
    }

    /// Sets the video frame rate. Has no effect on non-video formats.
    pub fn with_frame_rate(mut self, num: i32, den: i32) -> Self {
        if let Some(video) = self.video_params_mut() {
            video.frame_rate = Rational { num, den };
        }
        self
    }

    /// Sets the video crop rectangle. Has no effect on non-video formats.
    pub fn with_crop(mut self, crop: Rect) -> Self {
        if let Some(video) = self.video_params_mut() {
            video.crop = crop;
        }
        self
    }

    /// Checks the format is internally consistent.
    ///
    /// This does not check the encoding against what a port supports; that
    /// happens when the format is committed on a port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(Error::InvalidParameter(reason));
        match (self.es_type(), &self.value.es) {
            (EsType::Control, _) => Ok(()),
            (EsType::Unknown, _) => invalid("format has no stream type".to_string()),
            (_, _) if self.encoding() == Encoding::UNKNOWN => {
                invalid(format!("{} format has no encoding", self.es_type()))
            }
            (EsType::Video, EsSpecificFormat::Video(video)) => {
                if video.width == 0 || video.height == 0 {
                    return invalid(format!(
                        "video dimensions {}x{} are empty",
                        video.width, video.height
                    ));
                }
                let crop = video.crop;
                let right = i64::from(crop.x) + i64::from(crop.width);
                let bottom = i64::from(crop.y) + i64::from(crop.height);
                if crop.x < 0
                    || crop.y < 0
                    || crop.width < 0
                    || crop.height < 0
                    || right > i64::from(video.width)
                    || bottom > i64::from(video.height)
                {
                    return invalid(format!(
                        "crop {crop:?} exceeds frame {}x{}",
                        video.width, video.height
                    ));
                }
                if video.frame_rate.num != 0 && video.frame_rate.den == 0 {
                    return invalid("frame rate has a zero denominator".to_string());
                }
                Ok(())
            }
            (EsType::Audio, EsSpecificFormat::Audio(audio)) => {
                if audio.channels == 0 || audio.sample_rate == 0 {
                    return invalid(format!(
                        "audio format {} channel(s) at {} Hz is empty",
                        audio.channels, audio.sample_rate
                    ));
                }
                if audio.block_align == 0 && audio.bits_per_sample != 0 {
                    return invalid(format!(
                        "{} channel(s) of {} bit samples overflow the block alignment",
                        audio.channels, audio.bits_per_sample
                    ));
                }
                Ok(())
            }
            (EsType::Subpicture, EsSpecificFormat::Subpicture(_)) => Ok(()),
            (es_type, _) => invalid(format!("{es_type} format carries mismatched parameters")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_parses_fourcc_and_names() {
        assert_eq!("JPEG".parse::<Encoding>().unwrap(), Encoding::JPEG);
        assert_eq!("GIF".parse::<Encoding>().unwrap(), Encoding::GIF);
        assert_eq!("h.264".parse::<Encoding>().unwrap(), Encoding::H264);
        assert_eq!("RGB3".parse::<Encoding>().unwrap(), Encoding::RGB24);
        assert!("TOOLONG".parse::<Encoding>().is_err());
        assert_eq!(Encoding::OPAQUE.to_string(), "opaque");
        assert_eq!(Encoding::from_fourcc(*b"ABCD").to_string(), "ABCD");
    }

    #[test]
    fn encoding_serializes_as_fourcc() {
        let json = serde_json::to_string(&Encoding::I420).unwrap();
        assert_eq!(json, "\"I420\"");
        let back: Encoding = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Encoding::I420);
    }

    #[test]
    fn video_validation() {
        assert!(Format::video(Encoding::I420, 640, 480).validate().is_ok());
        assert!(matches!(
            Format::video(Encoding::I420, 0, 480).validate(),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            Format::video(Encoding::UNKNOWN, 640, 480).validate(),
            Err(Error::InvalidParameter(_))
        ));
        let cropped = Format::video(Encoding::I420, 640, 480).with_crop(Rect {
            x: 600,
            y: 0,
            width: 100,
            height: 480,
        });
        assert!(cropped.validate().is_err());
        let bad_rate = Format::video(Encoding::I420, 640, 480).with_frame_rate(30, 0);
        assert!(bad_rate.validate().is_err());
    }

    #[test]
    fn crop_near_integer_limits_is_rejected() {
        let wide = Format::video(Encoding::I420, 640, 480).with_crop(Rect {
            x: i32::MAX,
            y: 0,
            width: 1,
            height: 480,
        });
        assert!(matches!(wide.validate(), Err(Error::InvalidParameter(_))));
        let tall = Format::video(Encoding::I420, 640, 480).with_crop(Rect {
            x: 0,
            y: i32::MAX,
            width: 640,
            height: i32::MAX,
        });
        assert!(matches!(tall.validate(), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn control_format_is_always_valid() {
        assert!(Format::control().validate().is_ok());
        assert!(Format::default().validate().is_err());
    }

    #[test]
    fn audio_block_align() {
        let format = Format::audio(Encoding::PCM_SIGNED, 2, 48000, 16);
        assert_eq!(format.audio_params().unwrap().block_align, 4);
        assert!(format.validate().is_ok());
    }

    #[test]
    fn oversized_audio_blocks_are_rejected() {
        let format = Format::audio(Encoding::PCM_SIGNED, u32::MAX, 48000, 32);
        assert_eq!(format.audio_params().unwrap().block_align, 0);
        assert!(matches!(format.validate(), Err(Error::InvalidParameter(_))));
    }
}
