// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for pipeline operations.
//!
//! This module defines the error type returned by every engine call, mapping
//! driver status codes to the error kinds callers act upon.

/// Convenience result type using [`Error`] as the error variant.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur when building or running a pipeline.
///
/// This enum covers engine-level rule violations (wrong state, bad
/// arguments, connection misuse) as well as failures reported by the
/// hardware driver.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A malformed format, out-of-range index or otherwise bad argument.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The operation is not legal in the current component, port,
    /// connection or pipeline state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The port already participates in a connection.
    #[error("Port already connected")]
    AlreadyConnected,

    /// The operation requires a connection that does not exist.
    #[error("Port not connected")]
    NotConnected,

    /// The request is valid but cannot be served (e.g. tunnelling between
    /// ports without pass-through capability, or an encoding the port does
    /// not support).
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Pool creation or resize exceeds the available buffer memory.
    #[error("Resource exhausted")]
    ResourceExhausted,

    /// A blocking acquire exceeded its deadline.
    #[error("Timeout")]
    Timeout,

    /// A flush, disable or teardown interrupted a pending blocking call.
    #[error("Aborted")]
    Aborted,

    /// Lifecycle calls made in the wrong order (e.g. destroying a component twice).
    #[error("Out of order: {0}")]
    OutOfOrder(String),

    /// The driver does not know the requested component.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A driver status with no closer engine-level meaning.
    #[error("Driver error: {}", status_label(.0))]
    Driver(mmal_sys::Status),

    /// A generic error for failures not covered by the other variants.
    #[error("Other error: {0}")]
    Other(String),

    /// Failed to parse or serialize a JSON configuration.
    #[error("Configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// File system failure while loading configuration or writing output.
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
}

fn status_label(status: &mmal_sys::Status) -> &'static str {
    mmal_sys::status_name(*status)
}

impl Error {
    /// Converts a driver status code to a Rust [`Result`].
    ///
    /// # Returns
    ///
    /// - `Ok(())` if `status == MMAL_SUCCESS`
    /// - `Err(Error::...)` for any error status code
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let status = driver.port_enable(address, callback);
    /// Error::from_status(status)?; // Propagate error if status != MMAL_SUCCESS
    /// ```
    pub fn from_status(status: mmal_sys::Status) -> Result<()> {
        match status {
            mmal_sys::MMAL_SUCCESS => Ok(()),
            other => Err(Error::from_failure(other)),
        }
    }

    /// Maps a non-success status to an error kind.
    pub(crate) fn from_failure(status: mmal_sys::Status) -> Error {
        match status {
            mmal_sys::MMAL_EINVAL | mmal_sys::MMAL_ECONFIG => Error::InvalidParameter(format!(
                "driver rejected the request ({})",
                mmal_sys::status_name(status)
            )),
            mmal_sys::MMAL_ENOMEM | mmal_sys::MMAL_ENOSPC => Error::ResourceExhausted,
            mmal_sys::MMAL_ENOSYS => Error::Unsupported(format!(
                "driver does not implement the request ({})",
                mmal_sys::status_name(status)
            )),
            mmal_sys::MMAL_ENOENT => Error::NotFound("driver object not found".to_string()),
            mmal_sys::MMAL_EISCONN => Error::AlreadyConnected,
            mmal_sys::MMAL_ENOTCONN => Error::NotConnected,
            mmal_sys::MMAL_ENOTREADY => Error::InvalidState("driver is not ready".to_string()),
            other => Error::Driver(other),
        }
    }
}
