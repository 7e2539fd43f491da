// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use crate::{BufferHeader, BufferRequirements, EsFormat, ParamValue, PortAddress, PortInfo, Status};

/// Completion callback registered with `port_enable`.
pub type BufferCallback = Arc<dyn Fn(BufferHeader) + Send + Sync>;

/// A buffer the driver refused, handed back with the reason.
#[derive(Debug)]
pub struct Rejected {
    pub status: Status,
    pub buffer: BufferHeader,
}

/// Entry point of a hardware back-end.
pub trait Driver: Send + Sync {
    /// Instantiates the component registered under `name`.
    ///
    /// Returns `MMAL_ENOENT` for unknown names.
    fn create_component(&self, name: &str) -> Result<Arc<dyn DriverComponent>, Status>;
}

/// One hardware-backed processing stage.
pub trait DriverComponent: Send + Sync {
    fn id(&self) -> u32;

    fn name(&self) -> &str;

    /// Enumerates ports, control port first, then inputs, outputs and clocks
    /// in index order.
    fn ports(&self) -> Vec<PortInfo>;

    fn enable(&self) -> Status;

    fn disable(&self) -> Status;

    fn destroy(&self) -> Status;

    /// Validates and applies `format`, returning the resulting buffer needs.
    fn port_format_commit(
        &self,
        port: PortAddress,
        format: &EsFormat,
    ) -> Result<BufferRequirements, Status>;

    fn port_enable(&self, port: PortAddress, callback: BufferCallback) -> Status;

    /// Returns every held buffer through the callback before returning.
    fn port_disable(&self, port: PortAddress) -> Status;

    /// Returns every held buffer through the callback before returning.
    fn port_flush(&self, port: PortAddress) -> Status;

    fn port_send_buffer(&self, port: PortAddress, buffer: BufferHeader) -> Result<(), Rejected>;

    fn parameter_get(&self, port: PortAddress, id: u32) -> Result<ParamValue, Status>;

    fn parameter_set(&self, port: PortAddress, id: u32, value: &ParamValue) -> Status;
}
