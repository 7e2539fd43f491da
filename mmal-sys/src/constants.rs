// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

#![allow(missing_docs)]

/// Status code returned by every driver call.
pub type Status = u32;

pub const MMAL_SUCCESS: Status = 0;
pub const MMAL_ENOMEM: Status = 1;
pub const MMAL_ENOSPC: Status = 2;
pub const MMAL_EINVAL: Status = 3;
pub const MMAL_ENOSYS: Status = 4;
pub const MMAL_ENOENT: Status = 5;
pub const MMAL_ENXIO: Status = 6;
pub const MMAL_EIO: Status = 7;
pub const MMAL_ESPIPE: Status = 8;
pub const MMAL_ECORRUPT: Status = 9;
pub const MMAL_ENOTREADY: Status = 10;
pub const MMAL_ECONFIG: Status = 11;
pub const MMAL_EISCONN: Status = 12;
pub const MMAL_ENOTCONN: Status = 13;
pub const MMAL_EAGAIN: Status = 14;
pub const MMAL_EFAULT: Status = 15;

/// Returns the symbolic name of a status code.
pub fn status_name(status: Status) -> &'static str {
    match status {
        MMAL_SUCCESS => "MMAL_SUCCESS",
        MMAL_ENOMEM => "MMAL_ENOMEM",
        MMAL_ENOSPC => "MMAL_ENOSPC",
        MMAL_EINVAL => "MMAL_EINVAL",
        MMAL_ENOSYS => "MMAL_ENOSYS",
        MMAL_ENOENT => "MMAL_ENOENT",
        MMAL_ENXIO => "MMAL_ENXIO",
        MMAL_EIO => "MMAL_EIO",
        MMAL_ESPIPE => "MMAL_ESPIPE",
        MMAL_ECORRUPT => "MMAL_ECORRUPT",
        MMAL_ENOTREADY => "MMAL_ENOTREADY",
        MMAL_ECONFIG => "MMAL_ECONFIG",
        MMAL_EISCONN => "MMAL_EISCONN",
        MMAL_ENOTCONN => "MMAL_ENOTCONN",
        MMAL_EAGAIN => "MMAL_EAGAIN",
        MMAL_EFAULT => "MMAL_EFAULT",
        _ => "MMAL_UNKNOWN_STATUS",
    }
}

/// Packs four ASCII bytes into a little-endian FourCC code.
pub const fn fourcc(a: u8, b: u8, c: u8, d: u8) -> u32 {
    (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24)
}

pub const MMAL_ENCODING_UNKNOWN: u32 = 0;
pub const MMAL_ENCODING_H264: u32 = fourcc(b'H', b'2', b'6', b'4');
pub const MMAL_ENCODING_MJPEG: u32 = fourcc(b'M', b'J', b'P', b'G');
pub const MMAL_ENCODING_JPEG: u32 = fourcc(b'J', b'P', b'E', b'G');
pub const MMAL_ENCODING_GIF: u32 = fourcc(b'G', b'I', b'F', b' ');
pub const MMAL_ENCODING_PNG: u32 = fourcc(b'P', b'N', b'G', b' ');
pub const MMAL_ENCODING_BMP: u32 = fourcc(b'B', b'M', b'P', b' ');
pub const MMAL_ENCODING_I420: u32 = fourcc(b'I', b'4', b'2', b'0');
pub const MMAL_ENCODING_NV12: u32 = fourcc(b'N', b'V', b'1', b'2');
pub const MMAL_ENCODING_YUYV: u32 = fourcc(b'Y', b'U', b'Y', b'V');
pub const MMAL_ENCODING_RGB24: u32 = fourcc(b'R', b'G', b'B', b'3');
pub const MMAL_ENCODING_BGR24: u32 = fourcc(b'B', b'G', b'R', b'3');
pub const MMAL_ENCODING_RGBA: u32 = fourcc(b'R', b'G', b'B', b'A');
pub const MMAL_ENCODING_OPAQUE: u32 = fourcc(b'O', b'P', b'Q', b'V');
pub const MMAL_ENCODING_PCM_SIGNED: u32 = fourcc(b'P', b'C', b'M', b'S');

pub const MMAL_ES_TYPE_UNKNOWN: u32 = 0;
pub const MMAL_ES_TYPE_CONTROL: u32 = 1;
pub const MMAL_ES_TYPE_AUDIO: u32 = 2;
pub const MMAL_ES_TYPE_VIDEO: u32 = 3;
pub const MMAL_ES_TYPE_SUBPICTURE: u32 = 4;

pub const MMAL_PORT_TYPE_UNKNOWN: u32 = 0;
pub const MMAL_PORT_TYPE_CONTROL: u32 = 1;
pub const MMAL_PORT_TYPE_INPUT: u32 = 2;
pub const MMAL_PORT_TYPE_OUTPUT: u32 = 3;
pub const MMAL_PORT_TYPE_CLOCK: u32 = 4;

pub const MMAL_PORT_CAPABILITY_PASSTHROUGH: u32 = 0x01;
pub const MMAL_PORT_CAPABILITY_ALLOCATION: u32 = 0x02;
pub const MMAL_PORT_CAPABILITY_SUPPORTS_EVENT_FORMAT_CHANGE: u32 = 0x04;

pub const MMAL_BUFFER_HEADER_FLAG_EOS: u32 = 1 << 0;
pub const MMAL_BUFFER_HEADER_FLAG_FRAME_START: u32 = 1 << 1;
pub const MMAL_BUFFER_HEADER_FLAG_FRAME_END: u32 = 1 << 2;
pub const MMAL_BUFFER_HEADER_FLAG_KEYFRAME: u32 = 1 << 3;
pub const MMAL_BUFFER_HEADER_FLAG_DISCONTINUITY: u32 = 1 << 4;
pub const MMAL_BUFFER_HEADER_FLAG_CONFIG: u32 = 1 << 5;
pub const MMAL_BUFFER_HEADER_FLAG_ENCRYPTED: u32 = 1 << 6;
pub const MMAL_BUFFER_HEADER_FLAG_CODECSIDEINFO: u32 = 1 << 7;
pub const MMAL_BUFFER_HEADER_FLAG_SNAPSHOT: u32 = 1 << 8;
pub const MMAL_BUFFER_HEADER_FLAG_CORRUPTED: u32 = 1 << 9;
pub const MMAL_BUFFER_HEADER_FLAG_TRANSMISSION_FAILED: u32 = 1 << 10;
pub const MMAL_BUFFER_HEADER_FLAG_DECODEONLY: u32 = 1 << 11;
pub const MMAL_BUFFER_HEADER_FLAG_NAL_END: u32 = 1 << 12;

pub const MMAL_CONNECTION_FLAG_TUNNELLING: u32 = 0x01;
pub const MMAL_CONNECTION_FLAG_ALLOCATION_ON_INPUT: u32 = 0x02;
pub const MMAL_CONNECTION_FLAG_ALLOCATION_ON_OUTPUT: u32 = 0x04;
pub const MMAL_CONNECTION_FLAG_KEEP_BUFFER_REQUIREMENTS: u32 = 0x08;
pub const MMAL_CONNECTION_FLAG_DIRECT: u32 = 0x10;
pub const MMAL_CONNECTION_FLAG_KEEP_PORT_FORMATS: u32 = 0x20;

pub const MMAL_EVENT_ERROR: u32 = fourcc(b'E', b'R', b'R', b'O');
pub const MMAL_EVENT_EOS: u32 = fourcc(b'E', b'E', b'O', b'S');
pub const MMAL_EVENT_FORMAT_CHANGED: u32 = fourcc(b'E', b'F', b'C', b'H');
pub const MMAL_EVENT_PARAMETER_CHANGED: u32 = fourcc(b'E', b'P', b'C', b'H');

/// Timestamp value for "no timestamp".
pub const MMAL_TIME_UNKNOWN: i64 = i64::MIN;

pub const MMAL_PARAMETER_GROUP_COMMON: u32 = 0;
pub const MMAL_PARAMETER_GROUP_CAMERA: u32 = 1 << 16;
pub const MMAL_PARAMETER_GROUP_VIDEO: u32 = 2 << 16;
pub const MMAL_PARAMETER_GROUP_AUDIO: u32 = 3 << 16;
pub const MMAL_PARAMETER_GROUP_CLOCK: u32 = 4 << 16;

pub const MMAL_PARAMETER_SUPPORTED_ENCODINGS: u32 = MMAL_PARAMETER_GROUP_COMMON + 1;
pub const MMAL_PARAMETER_URI: u32 = MMAL_PARAMETER_GROUP_COMMON + 2;
pub const MMAL_PARAMETER_CHANGE_EVENT_REQUEST: u32 = MMAL_PARAMETER_GROUP_COMMON + 3;
pub const MMAL_PARAMETER_ZERO_COPY: u32 = MMAL_PARAMETER_GROUP_COMMON + 4;
pub const MMAL_PARAMETER_BUFFER_REQUIREMENTS: u32 = MMAL_PARAMETER_GROUP_COMMON + 5;
pub const MMAL_PARAMETER_STATISTICS: u32 = MMAL_PARAMETER_GROUP_COMMON + 6;

pub const MMAL_PARAMETER_CAMERA_NUM: u32 = MMAL_PARAMETER_GROUP_CAMERA;
pub const MMAL_PARAMETER_CAPTURE: u32 = MMAL_PARAMETER_GROUP_CAMERA + 1;
pub const MMAL_PARAMETER_CAMERA_CONFIG: u32 = MMAL_PARAMETER_GROUP_CAMERA + 2;
pub const MMAL_PARAMETER_ROTATION: u32 = MMAL_PARAMETER_GROUP_CAMERA + 3;
pub const MMAL_PARAMETER_JPEG_Q_FACTOR: u32 = MMAL_PARAMETER_GROUP_CAMERA + 4;
pub const MMAL_PARAMETER_EXIF_DISABLE: u32 = MMAL_PARAMETER_GROUP_CAMERA + 5;
pub const MMAL_PARAMETER_SHUTTER_SPEED: u32 = MMAL_PARAMETER_GROUP_CAMERA + 6;
pub const MMAL_PARAMETER_ISO: u32 = MMAL_PARAMETER_GROUP_CAMERA + 7;

pub const MMAL_PARAMETER_VIDEO_BIT_RATE: u32 = MMAL_PARAMETER_GROUP_VIDEO;
pub const MMAL_PARAMETER_VIDEO_FRAME_RATE: u32 = MMAL_PARAMETER_GROUP_VIDEO + 1;
pub const MMAL_PARAMETER_VIDEO_INTRAPERIOD: u32 = MMAL_PARAMETER_GROUP_VIDEO + 2;

pub const MMAL_PARAMETER_AUDIO_VOLUME: u32 = MMAL_PARAMETER_GROUP_AUDIO;

pub const MMAL_PARAMETER_CLOCK_REFERENCE: u32 = MMAL_PARAMETER_GROUP_CLOCK;

pub const MMAL_COMPONENT_DEFAULT_CAMERA: &str = "vc.ril.camera";
pub const MMAL_COMPONENT_DEFAULT_CAMERA_INFO: &str = "vc.camera_info";
pub const MMAL_COMPONENT_DEFAULT_IMAGE_ENCODER: &str = "vc.ril.image_encode";
pub const MMAL_COMPONENT_DEFAULT_VIDEO_ENCODER: &str = "vc.ril.video_encode";
pub const MMAL_COMPONENT_DEFAULT_VIDEO_RENDERER: &str = "vc.ril.video_render";
pub const MMAL_COMPONENT_DEFAULT_NULL_SINK: &str = "vc.null_sink";
pub const MMAL_COMPONENT_DEFAULT_CONTAINER_READER: &str = "container_reader";
pub const MMAL_COMPONENT_DEFAULT_CONTAINER_WRITER: &str = "container_writer";
