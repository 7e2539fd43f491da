// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Owned media buffers handed out by a [`Pool`].

use std::fmt;

use crate::{Error, Pool, Result};

bitflags::bitflags! {
    /// Flags carried by a buffer alongside its payload.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferFlags: u32 {
        /// No further data will follow on this port.
        const EOS = mmal_sys::MMAL_BUFFER_HEADER_FLAG_EOS;
        const FRAME_START = mmal_sys::MMAL_BUFFER_HEADER_FLAG_FRAME_START;
        const FRAME_END = mmal_sys::MMAL_BUFFER_HEADER_FLAG_FRAME_END;
        /// Complete frame (start and end).
        const FRAME = Self::FRAME_START.bits() | Self::FRAME_END.bits();
        const KEYFRAME = mmal_sys::MMAL_BUFFER_HEADER_FLAG_KEYFRAME;
        const DISCONTINUITY = mmal_sys::MMAL_BUFFER_HEADER_FLAG_DISCONTINUITY;
        /// Codec configuration data (e.g. SPS/PPS).
        const CONFIG = mmal_sys::MMAL_BUFFER_HEADER_FLAG_CONFIG;
        const ENCRYPTED = mmal_sys::MMAL_BUFFER_HEADER_FLAG_ENCRYPTED;
        const CODEC_SIDE_INFO = mmal_sys::MMAL_BUFFER_HEADER_FLAG_CODECSIDEINFO;
        const SNAPSHOT = mmal_sys::MMAL_BUFFER_HEADER_FLAG_SNAPSHOT;
        const CORRUPTED = mmal_sys::MMAL_BUFFER_HEADER_FLAG_CORRUPTED;
        const TRANSMISSION_FAILED = mmal_sys::MMAL_BUFFER_HEADER_FLAG_TRANSMISSION_FAILED;
        const DECODE_ONLY = mmal_sys::MMAL_BUFFER_HEADER_FLAG_DECODEONLY;
        const NAL_END = mmal_sys::MMAL_BUFFER_HEADER_FLAG_NAL_END;
    }
}

/// A buffer held by the caller.
///
/// Buffers can only be obtained from a [`Pool`] and are consumed by
/// [`crate::Port::send_buffer`] or [`Buffer::release`]. Dropping a buffer
/// releases it, so a buffer can never leak out of its pool nor be returned
/// twice.
///
/// # Examples
///
/// ```
/// # fn example(pool: mmal::Pool) -> Result<(), mmal::Error> {
/// let mut buffer = pool.acquire_empty()?;
/// buffer.fill(b"hello")?;
/// assert_eq!(buffer.data(), b"hello");
/// buffer.release();
/// # Ok(())
/// # }
/// ```
///
/// A released buffer is gone:
///
/// ```compile_fail
/// # fn example(pool: mmal::Pool) -> Result<(), mmal::Error> {
/// let buffer = pool.acquire_empty()?;
/// buffer.release();
/// let _ = buffer.length();
/// # Ok(())
/// # }
/// ```
pub struct Buffer {
    header: mmal_sys::BufferHeader,
    pool: Pool,
    /// Cleared once the header has been handed on.
    live: bool,
}

impl Buffer {
    pub(crate) fn new(header: mmal_sys::BufferHeader, pool: Pool) -> Self {
        Self {
            header,
            pool,
            live: true,
        }
    }

    /// Splits the buffer into its pool and raw header without releasing it.
    ///
    /// The caller takes over the held-count bookkeeping.
    pub(crate) fn into_parts(mut self) -> (Pool, mmal_sys::BufferHeader) {
        self.live = false;
        let header =
            std::mem::replace(&mut self.header, mmal_sys::BufferHeader::with_capacity(0, 0, 0));
        (self.pool.clone(), header)
    }

    fn header(&self) -> &mmal_sys::BufferHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut mmal_sys::BufferHeader {
        &mut self.header
    }

    /// Returns the pool this buffer belongs to.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Returns the total payload allocation in bytes.
    pub fn capacity(&self) -> usize {
        self.header().capacity()
    }

    /// Returns the number of valid payload bytes.
    pub fn length(&self) -> usize {
        self.header().length as usize
    }

    /// Returns the start of the valid payload within the allocation.
    pub fn offset(&self) -> usize {
        self.header().offset as usize
    }

    /// Returns `true` if the buffer carries no payload.
    pub fn is_empty(&self) -> bool {
        self.header().length == 0
    }

    /// Marks `offset..offset + length` as the valid payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the range exceeds the allocation.
    pub fn set_range(&mut self, offset: usize, length: usize) -> Result<()> {
        let capacity = self.capacity();
        match offset.checked_add(length) {
            Some(end) if end <= capacity => {
                let header = self.header_mut();
                header.offset = offset as u32;
                header.length = length as u32;
                Ok(())
            }
            _ => Err(Error::InvalidParameter(format!(
                "range {offset}+{length} exceeds buffer capacity {capacity}"
            ))),
        }
    }

    /// Sets the valid payload length, keeping the current offset.
    pub fn set_length(&mut self, length: usize) -> Result<()> {
        self.set_range(self.offset(), length)
    }

    /// Returns the valid payload bytes.
    pub fn data(&self) -> &[u8] {
        let header = self.header();
        let start = header.offset as usize;
        &header.data[start..start + header.length as usize]
    }

    /// Returns the whole allocation for writing.
    ///
    /// Call [`Self::set_range`] afterwards to mark what was written.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.header_mut().data
    }

    /// Copies `bytes` to the start of the allocation and marks them valid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if `bytes` is larger than the buffer.
    pub fn fill(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.capacity() {
            return Err(Error::InvalidParameter(format!(
                "{} bytes do not fit in a {} byte buffer",
                bytes.len(),
                self.capacity()
            )));
        }
        let header = self.header_mut();
        header.data[..bytes.len()].copy_from_slice(bytes);
        header.offset = 0;
        header.length = bytes.len() as u32;
        Ok(())
    }

    pub fn flags(&self) -> BufferFlags {
        BufferFlags::from_bits_retain(self.header().flags)
    }

    pub fn set_flags(&mut self, flags: BufferFlags) {
        self.header_mut().flags = flags.bits();
    }

    pub fn insert_flags(&mut self, flags: BufferFlags) {
        self.header_mut().flags |= flags.bits();
    }

    /// Returns `true` if the buffer carries the end-of-stream flag.
    pub fn is_eos(&self) -> bool {
        self.flags().contains(BufferFlags::EOS)
    }

    /// Returns the command tag. Non-zero means the buffer is an event.
    pub fn cmd(&self) -> u32 {
        self.header().cmd
    }

    /// Presentation timestamp in microseconds, if known.
    pub fn pts(&self) -> Option<i64> {
        known_time(self.header().pts)
    }

    pub fn set_pts(&mut self, pts: Option<i64>) {
        self.header_mut().pts = pts.unwrap_or(mmal_sys::MMAL_TIME_UNKNOWN);
    }

    /// Decode timestamp in microseconds, if known.
    pub fn dts(&self) -> Option<i64> {
        known_time(self.header().dts)
    }

    pub fn set_dts(&mut self, dts: Option<i64>) {
        self.header_mut().dts = dts.unwrap_or(mmal_sys::MMAL_TIME_UNKNOWN);
    }

    /// Clears length, offset, flags, command and timestamps.
    pub fn reset(&mut self) {
        self.header_mut().reset();
    }

    /// Returns the buffer to its pool's empty queue.
    pub fn release(self) {
        drop(self);
    }
}

fn known_time(value: i64) -> Option<i64> {
    (value != mmal_sys::MMAL_TIME_UNKNOWN).then_some(value)
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = &self.header;
        f.debug_struct("Buffer")
            .field("slot", &header.slot)
            .field("capacity", &header.capacity())
            .field("offset", &header.offset)
            .field("length", &header.length)
            .field("flags", &BufferFlags::from_bits_retain(header.flags))
            .field("cmd", &header.cmd)
            .finish()
    }
}

impl Drop for Buffer {
    /// Returns a buffer that was neither sent nor released to its pool.
    fn drop(&mut self) {
        if self.live {
            self.live = false;
            let header =
                std::mem::replace(&mut self.header, mmal_sys::BufferHeader::with_capacity(0, 0, 0));
            self.pool.put_back(header);
        }
    }
}
