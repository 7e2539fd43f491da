// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Links between an output port and an input port.

use std::fmt;

use parking_lot::MutexGuard;
use tracing::{debug, error, warn};

use crate::{Error, Pool, Port, PortCapabilities, PortType, Result};

bitflags::bitflags! {
    /// Options controlling how a [`Connection`] moves buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ConnectionFlags: u32 {
        /// Buffers move port to port without surfacing to the caller.
        const TUNNELLING = mmal_sys::MMAL_CONNECTION_FLAG_TUNNELLING;
        const ALLOCATION_ON_INPUT = mmal_sys::MMAL_CONNECTION_FLAG_ALLOCATION_ON_INPUT;
        const ALLOCATION_ON_OUTPUT = mmal_sys::MMAL_CONNECTION_FLAG_ALLOCATION_ON_OUTPUT;
        /// Leave each port's buffer count and size as they are.
        const KEEP_BUFFER_REQUIREMENTS = mmal_sys::MMAL_CONNECTION_FLAG_KEEP_BUFFER_REQUIREMENTS;
        const DIRECT = mmal_sys::MMAL_CONNECTION_FLAG_DIRECT;
        /// Do not propagate the output format to the input.
        const KEEP_PORT_FORMATS = mmal_sys::MMAL_CONNECTION_FLAG_KEEP_PORT_FORMATS;
    }
}

/// Takes the op locks of both ports in a stable order.
fn lock_pair<'a>(first: &'a Port, second: &'a Port) -> (MutexGuard<'a, ()>, MutexGuard<'a, ()>) {
    if first.lock_order() <= second.lock_order() {
        let a = first.op_lock();
        let b = second.op_lock();
        (a, b)
    } else {
        let b = second.op_lock();
        let a = first.op_lock();
        (a, b)
    }
}

/// A link between exactly one output port and one input port.
///
/// In *copy* mode the caller pumps buffers: it sends empties to the output,
/// takes completed buffers from [`Connection::pool`] and sends them on to the
/// input, which returns them to the empty queue once consumed. Both ports
/// share that pool.
///
/// In *tunnelled* mode ([`ConnectionFlags::TUNNELLING`]) buffers move between
/// the two ports without ever reaching the caller, and neither port accepts
/// buffers from the caller.
///
/// Dropping a connection closes it; errors during that implicit close are
/// logged.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use mmal::{ConnectionFlags, MmalInstance, mock::MockDriver};
///
/// # fn main() -> Result<(), mmal::Error> {
/// let instance = MmalInstance::new(Arc::new(MockDriver::with_defaults()));
/// let source = instance.create_component("mock.source")?;
/// let sink = instance.create_component("mock.sink")?;
///
/// let mut connection = instance.connect(sink.input(0)?, source.output(0)?, ConnectionFlags::empty())?;
/// let pool = connection.create_pool(4, 1024)?;
/// connection.set_enabled(true)?;
///
/// let buffer = pool.acquire_empty()?;
/// source.output(0)?.send_buffer(buffer)?;
/// let full = pool.acquire_full()?;
/// sink.input(0)?.send_buffer(full)?;
///
/// connection.close()?;
/// # Ok(())
/// # }
/// ```
pub struct Connection {
    id: u64,
    output: Port,
    input: Port,
    flags: ConnectionFlags,
    enabled: bool,
    pool: Option<Pool>,
    closed: bool,
}

impl Connection {
    /// Validates and links the two ports (internal use only).
    ///
    /// Both ports are left unchanged when a precondition fails.
    pub(crate) fn new(id: u64, input: &Port, output: &Port, flags: ConnectionFlags) -> Result<Self> {
        if input.port_type() != PortType::Input {
            return Err(Error::InvalidParameter(format!(
                "{} is not an input port",
                input.name()
            )));
        }
        if output.port_type() != PortType::Output {
            return Err(Error::InvalidParameter(format!(
                "{} is not an output port",
                output.name()
            )));
        }
        if std::sync::Arc::ptr_eq(input.component_shared(), output.component_shared()) {
            return Err(Error::InvalidParameter(format!(
                "{} and {} belong to the same component",
                output.name(),
                input.name()
            )));
        }
        if input.component_shared().is_destroyed() || output.component_shared().is_destroyed() {
            return Err(Error::InvalidState(
                "cannot connect ports of a destroyed component".to_string(),
            ));
        }

        let (_output_op, _input_op) = lock_pair(output, input);
        if input.is_connected() || output.is_connected() {
            return Err(Error::AlreadyConnected);
        }
        if let Some(port) = [input, output].into_iter().find(|p| p.is_enabled()) {
            return Err(Error::InvalidState(format!(
                "cannot connect enabled port {}",
                port.name()
            )));
        }
        if flags.contains(ConnectionFlags::TUNNELLING)
            && !(output.capabilities().contains(PortCapabilities::PASSTHROUGH)
                && input.capabilities().contains(PortCapabilities::PASSTHROUGH))
        {
            return Err(Error::Unsupported(format!(
                "tunnelling {} to {} needs pass-through on both ports",
                output.name(),
                input.name()
            )));
        }

        if !flags.contains(ConnectionFlags::KEEP_PORT_FORMATS) {
            let snapshot = input.format_snapshot();
            input.copy_format_from(output)?;
            if let Err(err) = input.commit_locked() {
                input.restore_format(snapshot);
                return Err(err);
            }
        }
        if !flags.contains(ConnectionFlags::KEEP_BUFFER_REQUIREMENTS) {
            let num = output.buffer_num().max(input.buffer_num());
            let size = output.buffer_size().max(input.buffer_size());
            output.raise_buffer_needs(num, size);
            input.raise_buffer_needs(num, size);
        }

        input.mark_connected(Some(id));
        output.mark_connected(Some(id));
        debug!(
            connection = id,
            output = %output,
            input = %input,
            ?flags,
            "Created connection"
        );
        Ok(Self {
            id,
            output: output.clone(),
            input: input.clone(),
            flags,
            enabled: false,
            pool: None,
            closed: false,
        })
    }

    pub fn output(&self) -> &Port {
        &self.output
    }

    pub fn input(&self) -> &Port {
        &self.input
    }

    pub fn flags(&self) -> ConnectionFlags {
        self.flags
    }

    pub fn is_tunnelled(&self) -> bool {
        self.flags.contains(ConnectionFlags::TUNNELLING)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the pool the caller pumps. Always `None` for tunnelled connections.
    pub fn pool(&self) -> Option<&Pool> {
        if self.is_tunnelled() {
            None
        } else {
            self.pool.as_ref()
        }
    }

    /// Allocates (or resizes) the pool shared by both ports.
    ///
    /// Without this call a pool sized from the connected ports' buffer count
    /// and size is created on the first enable.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if the connection is enabled or tunnelled
    /// - [`Error::ResourceExhausted`] / [`Error::InvalidParameter`] as for [`Pool::new`]
    pub fn create_pool(&mut self, count: usize, payload_size: usize) -> Result<Pool> {
        if self.enabled {
            return Err(Error::InvalidState(
                "cannot create a pool on an enabled connection".to_string(),
            ));
        }
        if self.is_tunnelled() {
            return Err(Error::InvalidState(
                "tunnelled connections manage their own buffers".to_string(),
            ));
        }
        match &self.pool {
            Some(pool) => pool.resize(count, payload_size)?,
            None => self.pool = Some(Pool::new(count, payload_size)?),
        }
        self.ensure_pool()
    }

    fn ensure_pool(&mut self) -> Result<Pool> {
        let pool = match &self.pool {
            Some(pool) => pool.clone(),
            None => {
                let count = self.output.buffer_num().max(self.input.buffer_num()).max(1);
                let size = self.output.buffer_size().max(self.input.buffer_size());
                let pool = Pool::new(count as usize, size as usize)?;
                self.pool = Some(pool.clone());
                pool
            }
        };
        self.output.attach_pool(pool.clone());
        self.input.attach_pool(pool.clone());
        Ok(pool)
    }

    /// Enables or disables both ports.
    ///
    /// The input is enabled strictly before the output so it can accept
    /// whatever the output produces; disabling runs in the reverse order.
    /// A tunnelled output is primed with every buffer of the hidden pool.
    ///
    /// # Errors
    ///
    /// Returns the first port failure. A failed enable leaves both ports disabled.
    pub fn set_enabled(&mut self, enable: bool) -> Result<()> {
        if self.closed {
            return Err(Error::NotConnected);
        }
        match (self.enabled, enable) {
            (false, true) => self.enable(),
            (true, false) => self.disable(),
            _ => Ok(()),
        }
    }

    fn enable(&mut self) -> Result<()> {
        let pool = self.ensure_pool()?;
        let (output, input) = (self.output.clone(), self.input.clone());
        let (_output_op, _input_op) = lock_pair(&output, &input);
        if self.is_tunnelled() {
            output.set_relay(Some(&input));
            input.set_relay(Some(&output));
        }

        if let Err(err) = input.enable_locked() {
            self.clear_relays();
            return Err(err);
        }
        if let Err(err) = output.enable_locked() {
            if let Err(rollback) = input.disable_locked() {
                error!(port = %input, error = %rollback, "Failed to roll back input enable");
            }
            self.clear_relays();
            return Err(err);
        }

        if self.is_tunnelled() {
            let headers = pool.take_all_empty();
            let count = headers.len();
            for header in headers {
                if let Err(rejected) = output.send_header(header) {
                    warn!(
                        port = %output,
                        status = mmal_sys::status_name(rejected.status),
                        "Tunnel output refused a priming buffer"
                    );
                    pool.complete_empty(rejected.buffer);
                }
            }
            debug!(connection = self.id, count, "Primed tunnel");
        }

        self.enabled = true;
        debug!(connection = self.id, output = %output, input = %input, "Enabled connection");
        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        let (output, input) = (self.output.clone(), self.input.clone());
        let (_output_op, _input_op) = lock_pair(&output, &input);
        output.disable_locked()?;
        input.disable_locked()?;
        self.clear_relays();
        self.enabled = false;
        debug!(connection = self.id, "Disabled connection");
        Ok(())
    }

    fn clear_relays(&self) {
        self.output.set_relay(None);
        self.input.set_relay(None);
    }

    /// Disables the connection if needed and unlinks both ports.
    ///
    /// Afterwards both ports can be used, reconnected or destroyed
    /// independently. A copy-mode pool stays usable through the handles the
    /// caller already holds.
    pub fn close(mut self) -> Result<()> {
        self.close_inner()
    }

    fn close_inner(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.enabled {
            self.disable()?;
        }
        for port in [&self.output, &self.input] {
            port.mark_connected(None);
            port.detach_pool();
        }
        self.closed = true;
        debug!(connection = self.id, "Closed connection");
        Ok(())
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("output", &self.output.name())
            .field("input", &self.input.name())
            .field("flags", &self.flags)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl Drop for Connection {
    /// Closes the connection if the caller did not.
    fn drop(&mut self) {
        if let Err(err) = self.close_inner() {
            error!(connection = self.id, error = %err, "Failed to close connection on drop");
        }
    }
}
