// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Parameter ids for [`crate::Port::set_parameter`] and friends.
//!
//! Camera parameters such as [`CAPTURE`] are set on the camera ports, encoder
//! parameters such as [`JPEG_Q_FACTOR`] on the encoder output.

pub use mmal_sys::ParamValue;

pub const SUPPORTED_ENCODINGS: u32 = mmal_sys::MMAL_PARAMETER_SUPPORTED_ENCODINGS;
pub const URI: u32 = mmal_sys::MMAL_PARAMETER_URI;
pub const CHANGE_EVENT_REQUEST: u32 = mmal_sys::MMAL_PARAMETER_CHANGE_EVENT_REQUEST;
pub const ZERO_COPY: u32 = mmal_sys::MMAL_PARAMETER_ZERO_COPY;
pub const BUFFER_REQUIREMENTS: u32 = mmal_sys::MMAL_PARAMETER_BUFFER_REQUIREMENTS;
pub const STATISTICS: u32 = mmal_sys::MMAL_PARAMETER_STATISTICS;

pub const CAMERA_NUM: u32 = mmal_sys::MMAL_PARAMETER_CAMERA_NUM;
/// Boolean trigger on a camera capture port.
pub const CAPTURE: u32 = mmal_sys::MMAL_PARAMETER_CAPTURE;
pub const CAMERA_CONFIG: u32 = mmal_sys::MMAL_PARAMETER_CAMERA_CONFIG;
pub const ROTATION: u32 = mmal_sys::MMAL_PARAMETER_ROTATION;
/// JPEG quality, 1 to 100.
pub const JPEG_Q_FACTOR: u32 = mmal_sys::MMAL_PARAMETER_JPEG_Q_FACTOR;
pub const EXIF_DISABLE: u32 = mmal_sys::MMAL_PARAMETER_EXIF_DISABLE;
pub const SHUTTER_SPEED: u32 = mmal_sys::MMAL_PARAMETER_SHUTTER_SPEED;
pub const ISO: u32 = mmal_sys::MMAL_PARAMETER_ISO;

pub const VIDEO_BIT_RATE: u32 = mmal_sys::MMAL_PARAMETER_VIDEO_BIT_RATE;
pub const FRAME_RATE: u32 = mmal_sys::MMAL_PARAMETER_VIDEO_FRAME_RATE;
pub const INTRAPERIOD: u32 = mmal_sys::MMAL_PARAMETER_VIDEO_INTRAPERIOD;

pub const AUDIO_VOLUME: u32 = mmal_sys::MMAL_PARAMETER_AUDIO_VOLUME;

pub const CLOCK_REFERENCE: u32 = mmal_sys::MMAL_PARAMETER_CLOCK_REFERENCE;
