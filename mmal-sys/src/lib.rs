// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! # mmal-sys: Raw driver boundary for the MMAL pipeline engine
//!
//! This crate describes the interface between the pipeline engine and a
//! hardware back-end: the numeric codes both sides agree on, the plain-data
//! structures exchanged across the boundary, and the [`Driver`] /
//! [`DriverComponent`] traits a back-end implements.
//!
//! ## Overview
//!
//! `mmal-sys` exposes:
//! - Status codes (`MMAL_SUCCESS`, `MMAL_EINVAL`, ...) and [`status_name`]
//! - FourCC encodings, elementary stream and port type codes
//! - Port capability, buffer header and connection flag bits
//! - Event codes and parameter ids
//! - Raw structures ([`EsFormat`], [`PortInfo`], [`BufferHeader`], ...)
//! - The driver traits
//!
//! ## Usage
//!
//! **Most users should NOT use this crate directly.** Use the safe [`mmal`] crate
//! instead, which provides:
//! - Ownership-typed buffers that cannot be released twice
//! - Rust-idiomatic error handling with `Result`
//! - Port, connection and pool state tracking
//!
//! This crate is only needed for:
//! - Implementing a hardware back-end
//! - Reading raw codes not yet wrapped by the `mmal` crate
//!
//! ## Driver contract
//!
//! - Every method takes `&self`; drivers synchronise internally.
//! - Buffer callbacks run on a driver-owned execution context and must not be
//!   invoked while the driver holds a lock that another driver call could need.
//! - `port_disable` and `port_flush` return every buffer the port still holds
//!   through the port's callback before returning.
//! - A rejected `port_send_buffer` hands the buffer back in [`Rejected`].
//! - Drivers never change `BufferHeader::owner` or `BufferHeader::slot`.
//!
//! [`mmal`]: https://docs.rs/mmal

mod constants;
mod driver;
mod types;

pub use constants::*;
pub use driver::*;
pub use types::*;
