// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Component ports: format negotiation, enable/disable and buffer exchange.

use std::{
    fmt,
    sync::{Arc, Weak},
};

use mmal_sys::{BufferCallback, BufferHeader, BufferRequirements, ParamValue, PortAddress, Rational};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, error, trace, warn};

use crate::{Buffer, Encoding, Error, Format, Pool, Result, component::ComponentShared};

/// Role of a port within its component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortType {
    Unknown,
    Control,
    Input,
    Output,
    Clock,
}

impl From<u32> for PortType {
    fn from(value: u32) -> Self {
        match value {
            mmal_sys::MMAL_PORT_TYPE_CONTROL => PortType::Control,
            mmal_sys::MMAL_PORT_TYPE_INPUT => PortType::Input,
            mmal_sys::MMAL_PORT_TYPE_OUTPUT => PortType::Output,
            mmal_sys::MMAL_PORT_TYPE_CLOCK => PortType::Clock,
            _ => PortType::Unknown,
        }
    }
}

impl From<PortType> for u32 {
    fn from(value: PortType) -> Self {
        match value {
            PortType::Unknown => mmal_sys::MMAL_PORT_TYPE_UNKNOWN,
            PortType::Control => mmal_sys::MMAL_PORT_TYPE_CONTROL,
            PortType::Input => mmal_sys::MMAL_PORT_TYPE_INPUT,
            PortType::Output => mmal_sys::MMAL_PORT_TYPE_OUTPUT,
            PortType::Clock => mmal_sys::MMAL_PORT_TYPE_CLOCK,
        }
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PortType::Unknown => "unknown",
            PortType::Control => "ctr",
            PortType::Input => "in",
            PortType::Output => "out",
            PortType::Clock => "clk",
        })
    }
}

bitflags::bitflags! {
    /// What a port can do beyond plain buffer exchange.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PortCapabilities: u32 {
        /// Buffers can be passed straight to another component (tunnelling).
        const PASSTHROUGH = mmal_sys::MMAL_PORT_CAPABILITY_PASSTHROUGH;
        /// The port can allocate its own payload memory.
        const ALLOCATION = mmal_sys::MMAL_PORT_CAPABILITY_ALLOCATION;
        const SUPPORTS_EVENT_FORMAT_CHANGE = mmal_sys::MMAL_PORT_CAPABILITY_SUPPORTS_EVENT_FORMAT_CHANGE;
    }
}

pub(crate) struct PortState {
    format: Format,
    pending: Option<Format>,
    requirements: BufferRequirements,
    buffer_num: u32,
    buffer_size: u32,
    enabled: bool,
    connection: Option<u64>,
    pool: Option<Pool>,
    /// Set while disable or flush is returning buffers; completions go to the empty queue.
    flushing: bool,
    /// Tunnel peer completions are forwarded to.
    relay: Option<Weak<PortShared>>,
}

pub(crate) struct PortShared {
    component: Arc<ComponentShared>,
    address: PortAddress,
    name: String,
    port_type: PortType,
    capabilities: PortCapabilities,
    supported: Vec<Encoding>,
    state: Mutex<PortState>,
    /// Serialises control operations; never taken on the callback path.
    op: Mutex<()>,
}

impl PortShared {
    pub(crate) fn pool(&self) -> Option<Pool> {
        self.state.lock().pool.clone()
    }
}

fn negotiated(requirements: &BufferRequirements) -> (u32, u32) {
    (
        requirements.num_recommended.max(requirements.num_min),
        requirements.size_recommended.max(requirements.size_min),
    )
}

/// An endpoint on a [`crate::Component`].
///
/// `Port` is a cheap handle; clones refer to the same port.
///
/// # Format negotiation
///
/// Formats are staged with [`Port::set_format`] and applied with
/// [`Port::commit_format_change`], which also recomputes the buffer count and
/// size the port needs. Both require the port to be disabled.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use mmal::{Encoding, Format, MmalInstance, mock::MockDriver};
///
/// # fn main() -> Result<(), mmal::Error> {
/// let instance = MmalInstance::new(Arc::new(MockDriver::with_defaults()));
/// let camera = instance.create_component(mmal_sys::MMAL_COMPONENT_DEFAULT_CAMERA)?;
/// let capture = camera.output(2)?;
///
/// capture.set_format(Format::video(Encoding::I420, 320, 240))?;
/// capture.commit_format_change()?;
/// assert!(capture.buffer_size() >= 320 * 240 * 3 / 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Port {
    shared: Arc<PortShared>,
}

impl Port {
    pub(crate) fn new(component: Arc<ComponentShared>, info: mmal_sys::PortInfo) -> Result<Self> {
        let port_type = PortType::from(info.address.port_type);
        if port_type == PortType::Unknown {
            return Err(Error::Other(format!(
                "port {} has unknown type {}",
                info.name, info.address.port_type
            )));
        }
        let (buffer_num, buffer_size) = negotiated(&info.requirements);
        Ok(Self {
            shared: Arc::new(PortShared {
                component,
                address: info.address,
                name: info.name,
                port_type,
                capabilities: PortCapabilities::from_bits_retain(info.capabilities),
                supported: info.supported_encodings.into_iter().map(Encoding).collect(),
                state: Mutex::new(PortState {
                    format: Format::from_raw(info.format),
                    pending: None,
                    requirements: info.requirements,
                    buffer_num,
                    buffer_size,
                    enabled: false,
                    connection: None,
                    pool: None,
                    flushing: false,
                    relay: None,
                }),
                op: Mutex::new(()),
            }),
        })
    }

    pub(crate) fn downgrade(&self) -> Weak<PortShared> {
        Arc::downgrade(&self.shared)
    }

    pub(crate) fn component_shared(&self) -> &Arc<ComponentShared> {
        &self.shared.component
    }

    pub(crate) fn op_lock(&self) -> MutexGuard<'_, ()> {
        self.shared.op.lock()
    }

    /// Ordering key used to take two op locks without deadlocking.
    pub(crate) fn lock_order(&self) -> usize {
        Arc::as_ptr(&self.shared) as usize
    }

    /// Full port name, e.g. `vc.ril.camera:out:2`.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn port_type(&self) -> PortType {
        self.shared.port_type
    }

    pub fn index(&self) -> u32 {
        self.shared.address.index
    }

    pub fn address(&self) -> PortAddress {
        self.shared.address
    }

    pub fn component_name(&self) -> &str {
        &self.shared.component.name
    }

    pub fn capabilities(&self) -> PortCapabilities {
        self.shared.capabilities
    }

    /// Encodings the port accepts. Empty means any.
    pub fn supported_encodings(&self) -> &[Encoding] {
        &self.shared.supported
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.state.lock().enabled
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state.lock().connection.is_some()
    }

    /// Returns the committed format.
    pub fn format(&self) -> Format {
        self.shared.state.lock().format.clone()
    }

    /// Returns the staged format awaiting [`Port::commit_format_change`].
    pub fn pending_format(&self) -> Option<Format> {
        self.shared.state.lock().pending.clone()
    }

    /// Returns what the driver asked for when the format was last committed.
    pub fn buffer_requirements(&self) -> BufferRequirements {
        self.shared.state.lock().requirements
    }

    pub fn buffer_num(&self) -> u32 {
        self.shared.state.lock().buffer_num
    }

    pub fn buffer_size(&self) -> u32 {
        self.shared.state.lock().buffer_size
    }

    /// Returns the pool attached to this port, if any.
    pub fn pool(&self) -> Option<Pool> {
        self.shared.pool()
    }

    fn check_alive(&self) -> Result<()> {
        if self.shared.component.is_destroyed() {
            return Err(Error::InvalidState(format!(
                "component of port {} is destroyed",
                self.shared.name
            )));
        }
        Ok(())
    }

    fn check_disabled(&self, state: &PortState, what: &str) -> Result<()> {
        if state.enabled {
            return Err(Error::InvalidState(format!(
                "cannot {what} while port {} is enabled",
                self.shared.name
            )));
        }
        Ok(())
    }

    /// Sets the number of buffers to allocate for this port.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidParameter`] if `num` is below the driver minimum
    /// - [`Error::InvalidState`] if the port is enabled
    pub fn set_buffer_num(&self, num: u32) -> Result<()> {
        let mut state = self.shared.state.lock();
        self.check_disabled(&state, "change the buffer count")?;
        if num < state.requirements.num_min.max(1) {
            return Err(Error::InvalidParameter(format!(
                "{} needs at least {} buffers, got {num}",
                self.shared.name,
                state.requirements.num_min.max(1)
            )));
        }
        state.buffer_num = num;
        Ok(())
    }

    /// Sets the payload size of each buffer allocated for this port.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidParameter`] if `size` is below the driver minimum
    /// - [`Error::InvalidState`] if the port is enabled
    pub fn set_buffer_size(&self, size: u32) -> Result<()> {
        let mut state = self.shared.state.lock();
        self.check_disabled(&state, "change the buffer size")?;
        if size < state.requirements.size_min {
            return Err(Error::InvalidParameter(format!(
                "{} needs buffers of at least {} bytes, got {size}",
                self.shared.name, state.requirements.size_min
            )));
        }
        state.buffer_size = size;
        Ok(())
    }

    /// Raises buffer count and size to at least the given values.
    pub(crate) fn raise_buffer_needs(&self, num: u32, size: u32) {
        let mut state = self.shared.state.lock();
        state.buffer_num = state.buffer_num.max(num);
        state.buffer_size = state.buffer_size.max(size);
    }

    /// Stages `format`; it takes effect on [`Port::commit_format_change`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the port is enabled or its component destroyed.
    pub fn set_format(&self, format: Format) -> Result<()> {
        self.check_alive()?;
        let mut state = self.shared.state.lock();
        self.check_disabled(&state, "change the format")?;
        state.pending = Some(format);
        Ok(())
    }

    /// Stages the committed format of `source` onto this port.
    pub fn copy_format_from(&self, source: &Port) -> Result<()> {
        self.set_format(source.format())
    }

    /// Validates and applies the staged format.
    ///
    /// Without a staged format the committed one is re-applied, so committing
    /// twice yields the same buffer count and size. On success the buffer
    /// count and size are reset to the driver's recommendation (never below
    /// its minimum). Control ports carry no format; committing them is a no-op.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if the port is enabled
    /// - [`Error::InvalidParameter`] if the format is malformed
    /// - [`Error::Unsupported`] if the port does not accept the encoding
    /// - the driver failure otherwise; the staged format is kept
    pub fn commit_format_change(&self) -> Result<()> {
        let _op = self.op_lock();
        self.commit_locked()
    }

    pub(crate) fn commit_locked(&self) -> Result<()> {
        self.check_alive()?;
        let format = {
            let mut state = self.shared.state.lock();
            self.check_disabled(&state, "commit a format")?;
            if self.shared.port_type == PortType::Control {
                state.pending = None;
                return Ok(());
            }
            state.pending.clone().unwrap_or_else(|| state.format.clone())
        };
        format.validate()?;
        if !self.shared.supported.is_empty() && !self.shared.supported.contains(&format.encoding()) {
            return Err(Error::Unsupported(format!(
                "{} does not accept {} buffers",
                self.shared.name,
                format.encoding()
            )));
        }
        let requirements = self
            .shared
            .component
            .driver
            .port_format_commit(self.shared.address, format.as_raw())
            .map_err(Error::from_failure)?;

        let (buffer_num, buffer_size) = negotiated(&requirements);
        let mut state = self.shared.state.lock();
        state.format = format;
        state.pending = None;
        state.requirements = requirements;
        state.buffer_num = buffer_num;
        state.buffer_size = buffer_size;
        debug!(
            port = %self.shared.name,
            encoding = %state.format.encoding(),
            buffer_num,
            buffer_size,
            "Committed port format"
        );
        Ok(())
    }

    /// Returns the staged format and the committed one so a failed commit can be undone.
    pub(crate) fn format_snapshot(&self) -> (Format, Option<Format>) {
        let state = self.shared.state.lock();
        (state.format.clone(), state.pending.clone())
    }

    pub(crate) fn restore_format(&self, snapshot: (Format, Option<Format>)) {
        let mut state = self.shared.state.lock();
        state.format = snapshot.0;
        state.pending = snapshot.1;
    }

    /// Enables or disables the port.
    ///
    /// Connected ports are enabled and disabled through their
    /// [`crate::Connection`]. Disabling returns every buffer the driver holds:
    /// output buffers are discarded to the empty queue and blocked
    /// [`Pool::acquire_full`] callers wake up with [`Error::Aborted`].
    /// Disabling a disabled port does nothing.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if a format change is still pending, the port
    ///   is already enabled, connected, or its component destroyed
    /// - the driver failure otherwise
    pub fn set_enabled(&self, enable: bool) -> Result<()> {
        let _op = self.op_lock();
        if self.is_connected() {
            return Err(Error::InvalidState(format!(
                "port {} is managed by its connection",
                self.shared.name
            )));
        }
        if enable {
            self.enable_locked()
        } else {
            self.disable_locked()
        }
    }

    /// Enables the port, taking its op lock.
    pub(crate) fn enable_internal(&self) -> Result<()> {
        let _op = self.op_lock();
        self.enable_locked()
    }

    pub(crate) fn disable_internal(&self) -> Result<()> {
        let _op = self.op_lock();
        self.disable_locked()
    }

    pub(crate) fn enable_locked(&self) -> Result<()> {
        self.check_alive()?;
        let pool = {
            let mut state = self.shared.state.lock();
            if state.enabled {
                return Err(Error::InvalidState(format!(
                    "port {} is already enabled",
                    self.shared.name
                )));
            }
            if state.pending.is_some() {
                return Err(Error::InvalidState(format!(
                    "port {} has an uncommitted format change",
                    self.shared.name
                )));
            }
            state.flushing = false;
            state.pool.clone()
        };

        let weak = self.downgrade();
        let callback: BufferCallback = Arc::new(move |header| on_buffer(&weak, header));
        Error::from_status(
            self.shared
                .component
                .driver
                .port_enable(self.shared.address, callback),
        )?;

        self.shared.state.lock().enabled = true;
        if let Some(pool) = &pool {
            pool.port_enabled(self.port_type() == PortType::Output);
        }
        debug!(port = %self.shared.name, pooled = pool.is_some(), "Enabled port");
        Ok(())
    }

    pub(crate) fn disable_locked(&self) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            if !state.enabled {
                return Ok(());
            }
            state.flushing = true;
        }
        let status = self
            .shared
            .component
            .driver
            .port_disable(self.shared.address);
        let pool = {
            let mut state = self.shared.state.lock();
            state.flushing = false;
            if status != mmal_sys::MMAL_SUCCESS {
                return Error::from_status(status);
            }
            state.enabled = false;
            state.pool.clone()
        };
        if let Some(pool) = &pool {
            pool.port_disabled(self.port_type() == PortType::Output);
        }
        debug!(port = %self.shared.name, "Disabled port");
        Ok(())
    }

    /// Returns every buffer held by the driver to the empty queue.
    ///
    /// Content not yet consumed is lost, blocked [`Pool::acquire_full`]
    /// callers wake up with [`Error::Aborted`], and a failure reported by the
    /// component is cleared.
    pub fn flush(&self) -> Result<()> {
        let _op = self.op_lock();
        self.check_alive()?;
        self.shared.state.lock().flushing = true;
        let status = self.shared.component.driver.port_flush(self.shared.address);
        let pool = {
            let mut state = self.shared.state.lock();
            state.flushing = false;
            state.pool.clone()
        };
        if let Some(pool) = &pool {
            pool.flush();
        }
        debug!(port = %self.shared.name, "Flushed port");
        Error::from_status(status)
    }

    /// Hands `buffer` to the port; ownership moves to the driver.
    ///
    /// Output ports fill the buffer and complete it to the pool's full queue.
    /// Input ports consume it and return it to the empty queue.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if the port is not enabled, is being flushed
    ///   or is tunnelled
    /// - [`Error::InvalidParameter`] if the buffer is not from the port's pool
    /// - the pending component failure, or the driver's reason for rejecting
    ///   the buffer
    ///
    /// In every error case the buffer goes back to its pool's empty queue.
    pub fn send_buffer(&self, buffer: Buffer) -> Result<()> {
        {
            let state = self.shared.state.lock();
            if !state.enabled || state.flushing {
                return Err(Error::InvalidState(format!(
                    "port {} is not ready for buffers",
                    self.shared.name
                )));
            }
            if state.relay.is_some() {
                return Err(Error::InvalidState(format!(
                    "port {} is tunnelled",
                    self.shared.name
                )));
            }
            match &state.pool {
                Some(pool) if pool.id() == buffer.pool().id() => pool.check_error()?,
                _ => {
                    return Err(Error::InvalidParameter(format!(
                        "buffer is not from the pool of port {}",
                        self.shared.name
                    )));
                }
            }
        }

        let (pool, header) = buffer.into_parts();
        pool.mark_in_flight();
        trace!(port = %self.shared.name, slot = header.slot, length = header.length, "Sending buffer");
        match self
            .shared
            .component
            .driver
            .port_send_buffer(self.shared.address, header)
        {
            Ok(()) => Ok(()),
            Err(rejected) => {
                pool.complete_empty(rejected.buffer);
                Err(Error::from_failure(rejected.status))
            }
        }
    }

    /// Allocates (or resizes) the pool attached to this port.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if the port is enabled or connected
    /// - [`Error::ResourceExhausted`] / [`Error::InvalidParameter`] as for [`Pool::new`]
    pub fn create_pool(&self, count: usize, payload_size: usize) -> Result<Pool> {
        let _op = self.op_lock();
        self.check_alive()?;
        let mut state = self.shared.state.lock();
        self.check_disabled(&state, "create a pool")?;
        if state.connection.is_some() {
            return Err(Error::InvalidState(format!(
                "port {} is connected; use the connection pool",
                self.shared.name
            )));
        }
        match &state.pool {
            Some(pool) => {
                pool.resize(count, payload_size)?;
                Ok(pool.clone())
            }
            None => {
                let pool = Pool::new(count, payload_size)?;
                state.pool = Some(pool.clone());
                Ok(pool)
            }
        }
    }

    /// Allocates a pool sized from [`Port::buffer_num`] and [`Port::buffer_size`].
    pub fn create_default_pool(&self) -> Result<Pool> {
        let (num, size) = {
            let state = self.shared.state.lock();
            (state.buffer_num.max(1), state.buffer_size)
        };
        self.create_pool(num as usize, size as usize)
    }

    pub(crate) fn attach_pool(&self, pool: Pool) {
        self.shared.state.lock().pool = Some(pool);
    }

    pub(crate) fn detach_pool(&self) {
        self.shared.state.lock().pool = None;
    }

    pub(crate) fn mark_connected(&self, connection: Option<u64>) {
        self.shared.state.lock().connection = connection;
    }

    pub(crate) fn set_relay(&self, peer: Option<&Port>) {
        self.shared.state.lock().relay = peer.map(Port::downgrade);
    }

    pub(crate) fn send_header(&self, header: BufferHeader) -> std::result::Result<(), mmal_sys::Rejected> {
        self.shared
            .component
            .driver
            .port_send_buffer(self.shared.address, header)
    }

    /// Sets a parameter on this port.
    pub fn set_parameter(&self, id: u32, value: &ParamValue) -> Result<()> {
        self.check_alive()?;
        trace!(port = %self.shared.name, id, ?value, "Setting parameter");
        Error::from_status(
            self.shared
                .component
                .driver
                .parameter_set(self.shared.address, id, value),
        )
    }

    /// Reads a parameter from this port.
    pub fn get_parameter(&self, id: u32) -> Result<ParamValue> {
        self.check_alive()?;
        self.shared
            .component
            .driver
            .parameter_get(self.shared.address, id)
            .map_err(Error::from_failure)
    }

    pub fn set_parameter_bool(&self, id: u32, value: bool) -> Result<()> {
        self.set_parameter(id, &ParamValue::Boolean(value))
    }

    pub fn get_parameter_bool(&self, id: u32) -> Result<bool> {
        match self.get_parameter(id)? {
            ParamValue::Boolean(value) => Ok(value),
            other => Err(mismatch(id, "boolean", &other)),
        }
    }

    pub fn set_parameter_i32(&self, id: u32, value: i32) -> Result<()> {
        self.set_parameter(id, &ParamValue::Int32(value))
    }

    pub fn get_parameter_i32(&self, id: u32) -> Result<i32> {
        match self.get_parameter(id)? {
            ParamValue::Int32(value) => Ok(value),
            other => Err(mismatch(id, "int32", &other)),
        }
    }

    pub fn set_parameter_u32(&self, id: u32, value: u32) -> Result<()> {
        self.set_parameter(id, &ParamValue::UInt32(value))
    }

    pub fn get_parameter_u32(&self, id: u32) -> Result<u32> {
        match self.get_parameter(id)? {
            ParamValue::UInt32(value) => Ok(value),
            other => Err(mismatch(id, "uint32", &other)),
        }
    }

    pub fn set_parameter_i64(&self, id: u32, value: i64) -> Result<()> {
        self.set_parameter(id, &ParamValue::Int64(value))
    }

    pub fn get_parameter_i64(&self, id: u32) -> Result<i64> {
        match self.get_parameter(id)? {
            ParamValue::Int64(value) => Ok(value),
            other => Err(mismatch(id, "int64", &other)),
        }
    }

    pub fn set_parameter_rational(&self, id: u32, value: Rational) -> Result<()> {
        self.set_parameter(id, &ParamValue::Rational(value))
    }

    pub fn get_parameter_rational(&self, id: u32) -> Result<Rational> {
        match self.get_parameter(id)? {
            ParamValue::Rational(value) => Ok(value),
            other => Err(mismatch(id, "rational", &other)),
        }
    }
}

fn mismatch(id: u32, expected: &str, got: &ParamValue) -> Error {
    Error::InvalidParameter(format!(
        "parameter {id:#x} holds {got:?}, not a {expected}"
    ))
}

/// Routes a buffer or event completed by the driver.
fn on_buffer(weak: &Weak<PortShared>, header: BufferHeader) {
    let Some(port) = weak.upgrade() else {
        warn!(slot = header.slot, "Buffer completed on a dropped port");
        return;
    };
    if header.cmd != 0 {
        on_event(&port, header);
        return;
    }

    let (pool, flushing, relay) = {
        let state = port.state.lock();
        (state.pool.clone(), state.flushing, state.relay.clone())
    };
    let Some(pool) = pool.filter(|pool| pool.owns(&header)) else {
        warn!(port = %port.name, slot = header.slot, "Buffer returned to a port with no matching pool");
        return;
    };

    if !flushing && let Some(peer) = relay.and_then(|peer| peer.upgrade()) {
        let mut header = header;
        if port.port_type == PortType::Input {
            header.reset();
        }
        trace!(from = %port.name, to = %peer.name, slot = header.slot, "Relaying buffer");
        if let Err(rejected) = peer.component.driver.port_send_buffer(peer.address, header) {
            trace!(
                port = %peer.name,
                status = mmal_sys::status_name(rejected.status),
                "Tunnel peer refused buffer"
            );
            pool.complete_empty(rejected.buffer);
        }
        return;
    }

    if port.port_type == PortType::Output && !flushing {
        trace!(port = %port.name, slot = header.slot, length = header.length, "Buffer completed");
        pool.complete_full(header);
    } else {
        pool.complete_empty(header);
    }
}

fn on_event(port: &PortShared, header: BufferHeader) {
    match header.cmd {
        mmal_sys::MMAL_EVENT_ERROR => {
            let status = header
                .data
                .get(..4)
                .and_then(|bytes| <[u8; 4]>::try_from(bytes).ok())
                .map(u32::from_le_bytes)
                .unwrap_or(mmal_sys::MMAL_EIO);
            error!(
                component = %port.component.name,
                port = %port.name,
                status = mmal_sys::status_name(status),
                "Hardware error event"
            );
            port.component.fail_pools(status);
        }
        mmal_sys::MMAL_EVENT_EOS => debug!(port = %port.name, "End-of-stream event"),
        mmal_sys::MMAL_EVENT_FORMAT_CHANGED => debug!(port = %port.name, "Format changed event"),
        cmd => trace!(port = %port.name, cmd = %Encoding(cmd), "Ignoring event"),
    }
}

impl PartialEq for Port {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for Port {}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Port")
            .field("name", &self.shared.name)
            .field("enabled", &state.enabled)
            .field("connected", &state.connection.is_some())
            .field("encoding", &state.format.encoding())
            .finish()
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.shared.name)
    }
}
