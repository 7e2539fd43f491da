// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! # MMAL - Multi-Media Abstraction Layer pipeline engine
//!
//! Safe, idiomatic Rust pipeline engine for hardware multimedia components:
//! cameras, encoders, renderers and sinks linked into processing graphs.
//!
//! ## Overview
//!
//! Hardware access is abstracted by the [`mmal_sys::Driver`] trait. This crate
//! builds the component, port, connection and buffer-pool model on top of it
//! and enforces its ownership rules: a buffer belongs to exactly one party at a
//! time, formats only change on disabled ports, and pools are never resized
//! while buffers are out.
//!
//! ### Key Concepts
//!
//! - **Instance**: the composition root, owning the driver ([`MmalInstance`])
//! - **Component**: a processing stage such as a camera or encoder ([`Component`])
//! - **Port**: a typed endpoint of a component carrying one [`Format`] ([`Port`])
//! - **Connection**: a link from an output port to an input port, tunnelled or copy ([`Connection`])
//! - **Pool**: a fixed set of buffers with empty and full queues ([`Pool`], [`Buffer`])
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ MmalInstance │  (owns the driver)
//! └──────┬───────┘
//!        │
//!        ├─► Component ──► control / input / output / clock Ports
//!        │
//!        └─► Connection ──► output Port ──► Pool ──► input Port
//! ```
//!
//! Buffers complete on driver threads. A completed output buffer lands in the
//! full queue of its pool; a consumed input buffer lands in the empty queue.
//! Callers block on [`Pool::acquire_empty`] and [`Pool::acquire_full`].
//!
//! ## Examples
//!
//! ### Pumping an output port
//!
//! ```
//! use std::sync::Arc;
//! use mmal::{MmalInstance, mock::MockDriver};
//!
//! # fn main() -> Result<(), mmal::Error> {
//! let instance = MmalInstance::new(Arc::new(MockDriver::with_defaults()));
//! let source = instance.create_component("mock.source")?;
//! let output = source.output(0)?;
//!
//! let pool = output.create_pool(2, 1024)?;
//! output.set_enabled(true)?;
//!
//! output.send_buffer(pool.acquire_empty()?)?;
//! let frame = pool.acquire_full()?;
//! assert_eq!(frame.length(), 512);
//! frame.release();
//!
//! output.set_enabled(false)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Taking a still picture
//!
//! ```
//! use std::sync::Arc;
//! use mmal::{MmalInstance, StillCapture, config::CaptureSettings, mock::MockDriver};
//!
//! # fn main() -> Result<(), mmal::Error> {
//! let instance = MmalInstance::new(Arc::new(MockDriver::with_defaults()));
//! let mut capture = StillCapture::new(instance, CaptureSettings::default());
//!
//! let mut jpeg = Vec::new();
//! capture.capture_once(|buffer| {
//!     jpeg.extend_from_slice(buffer.data());
//!     Ok(())
//! })?;
//! assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! - [`MmalInstance`], [`Component`], [`Port`] and [`Pool`] are cheap clones
//!   and `Send + Sync`
//! - [`Buffer`] and [`Connection`] are `Send`; they have a single owner
//! - Control operations on one port are serialized; buffer traffic is not
//!   blocked by them

mod buffer;
mod component;
mod connection;
mod error;
mod format;
mod instance;
mod pool;
mod port;
mod queue;

pub mod capture;
pub mod config;
pub mod mock;
pub mod parameter;

pub use buffer::{Buffer, BufferFlags};
pub use capture::{CaptureLoop, CaptureState, CaptureStats, StillCapture};
pub use component::{Component, ComponentState};
pub use connection::{Connection, ConnectionFlags};
pub use error::{Error, Result};
pub use format::{Encoding, EsType, Format};
pub use instance::MmalInstance;
pub use mmal_sys::{BufferRequirements, Rational, Rect, VideoFormat};
pub use pool::{MAX_POOL_MEMORY, Pool, PoolStats};
pub use port::{Port, PortCapabilities, PortType};
