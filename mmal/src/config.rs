// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Still-capture settings.
//!
//! [`CaptureSettings`] is plain data loaded from JSON, with every field
//! optional. Missing fields take the values of [`CaptureSettings::default`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Encoding, Error, Result};

/// Parameters of one still capture, consumed by [`crate::StillCapture`].
///
/// # Examples
///
/// ```
/// use mmal::{Encoding, config::CaptureSettings};
///
/// # fn main() -> Result<(), mmal::Error> {
/// let settings = CaptureSettings::from_json_str(r#"{
///     "width": 1280,
///     "height": 720,
///     "encoding": "PNG ",
///     "quality": 90
/// }"#)?;
///
/// assert_eq!(settings.encoding, Encoding::PNG);
/// assert_eq!(settings.raw_encoding, Encoding::I420);
/// assert!(settings.use_encoder);
/// # Ok(())
/// # }
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CaptureSettings {
    /// Camera selected through the camera-number parameter.
    pub camera_num: i32,
    pub width: u32,
    pub height: u32,
    /// Encoding produced by the pipeline when the encoder is used.
    pub encoding: Encoding,
    /// Camera capture-port encoding.
    pub raw_encoding: Encoding,
    /// Route the capture port through the image encoder.
    pub use_encoder: bool,
    /// Render a preview while capturing (a null sink is used otherwise).
    pub preview: bool,
    /// JPEG quality factor, 1 to 100.
    pub quality: u32,
    pub frame_rate: u32,
    /// Per-buffer wait before the capture gives up.
    pub timeout_ms: u64,
    /// Buffers in the output pool; 0 uses the port recommendation.
    pub buffer_count: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            camera_num: 0,
            width: 640,
            height: 480,
            encoding: Encoding::JPEG,
            raw_encoding: Encoding::I420,
            use_encoder: true,
            preview: false,
            quality: 85,
            frame_rate: 30,
            timeout_ms: 5000,
            buffer_count: 0,
        }
    }
}

impl CaptureSettings {
    /// Parses settings from a JSON document and validates them.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the document does not parse
    /// - [`Error::InvalidParameter`] if a value is out of range
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads and validates a JSON settings file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Checks every value is in range.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidParameter(format!(
                "capture size {}x{} is empty",
                self.width, self.height
            )));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(Error::InvalidParameter(format!(
                "quality {} is outside 1..=100",
                self.quality
            )));
        }
        if self.frame_rate == 0 || i32::try_from(self.frame_rate).is_err() {
            return Err(Error::InvalidParameter(format!(
                "frame rate {} is outside 1..=i32::MAX",
                self.frame_rate
            )));
        }
        if self.timeout_ms == 0 {
            return Err(Error::InvalidParameter("timeout must be positive".to_string()));
        }
        if self.camera_num < 0 {
            return Err(Error::InvalidParameter(format!(
                "camera number {} is negative",
                self.camera_num
            )));
        }
        if self.raw_encoding.is_compressed() || self.raw_encoding == Encoding::UNKNOWN {
            return Err(Error::InvalidParameter(format!(
                "{} is not a raw encoding",
                self.raw_encoding
            )));
        }
        if self.use_encoder && !self.encoding.is_compressed() {
            return Err(Error::InvalidParameter(format!(
                "{} is not an encoder output",
                self.encoding
            )));
        }
        Ok(())
    }

    /// The per-buffer wait as a [`std::time::Duration`].
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = CaptureSettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.timeout(), std::time::Duration::from_secs(5));
    }

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(
            CaptureSettings::from_json_str("{}").unwrap(),
            CaptureSettings::default()
        );
    }

    #[test]
    fn encodings_parse_by_name() {
        let settings =
            CaptureSettings::from_json_str(r#"{"use_encoder": false, "raw_encoding": "RGB24"}"#)
                .unwrap();
        assert_eq!(settings.raw_encoding, Encoding::RGB24);
        assert!(!settings.use_encoder);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for json in [
            r#"{"quality": 0}"#,
            r#"{"quality": 101}"#,
            r#"{"width": 0}"#,
            r#"{"timeout_ms": 0}"#,
            r#"{"frame_rate": 0}"#,
            r#"{"frame_rate": 4294967295}"#,
            r#"{"raw_encoding": "JPEG"}"#,
            r#"{"encoding": "I420"}"#,
        ] {
            assert!(
                matches!(CaptureSettings::from_json_str(json), Err(Error::InvalidParameter(_))),
                "{json} should be rejected"
            );
        }
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        assert!(matches!(
            CaptureSettings::from_json_str("{"),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn settings_round_trip_through_json() {
        let settings = CaptureSettings {
            width: 320,
            height: 240,
            preview: true,
            ..Default::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains(r#""encoding":"JPEG""#));
        assert_eq!(CaptureSettings::from_json_str(&json).unwrap(), settings);
    }
}
