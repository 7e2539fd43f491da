// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Hardware-backed processing stages.

use std::{
    fmt,
    sync::{Arc, Weak},
};

use mmal_sys::DriverComponent;
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::{
    Error, PortType, Result,
    instance::InstanceContext,
    port::{Port, PortShared},
};

/// Lifecycle state of a [`Component`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    Created,
    Enabled,
    Disabled,
    Destroyed,
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ComponentState::Created => "created",
            ComponentState::Enabled => "enabled",
            ComponentState::Disabled => "disabled",
            ComponentState::Destroyed => "destroyed",
        })
    }
}

/// State shared by a component and all of its ports.
pub(crate) struct ComponentShared {
    pub(crate) driver: Arc<dyn DriverComponent>,
    pub(crate) name: String,
    pub(crate) id: u32,
    pub(crate) state: Mutex<ComponentState>,
    /// Serialises enable, disable and destroy.
    op: Mutex<()>,
    ports: Mutex<Vec<Weak<PortShared>>>,
    instance: Weak<InstanceContext>,
}

impl ComponentShared {
    pub(crate) fn state(&self) -> ComponentState {
        *self.state.lock()
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.state() == ComponentState::Destroyed
    }

    /// Marks the pool of every port as failed with `status`.
    pub(crate) fn fail_pools(&self, status: mmal_sys::Status) {
        let ports: Vec<_> = self.ports.lock().iter().filter_map(Weak::upgrade).collect();
        for port in ports {
            if let Some(pool) = port.pool() {
                pool.set_error(status);
            }
        }
    }
}

/// A named processing stage (camera, encoder, renderer, ...).
///
/// A component owns exactly one control port plus ordered lists of input,
/// output and clock ports. Handles are cheap to clone; every clone refers to
/// the same component, and using one after [`Component::destroy`] fails with
/// [`Error::InvalidState`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use mmal::{MmalInstance, mock::MockDriver};
///
/// # fn main() -> Result<(), mmal::Error> {
/// let instance = MmalInstance::new(Arc::new(MockDriver::with_defaults()));
/// let camera = instance.create_component(mmal_sys::MMAL_COMPONENT_DEFAULT_CAMERA)?;
/// assert_eq!(camera.outputs().len(), 3);
/// camera.set_enabled(true)?;
/// camera.set_enabled(false)?;
/// camera.destroy()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Component {
    shared: Arc<ComponentShared>,
    control: Port,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
    clocks: Vec<Port>,
}

impl Component {
    /// Wraps a freshly created driver component (internal use only).
    pub(crate) fn new(
        driver: Arc<dyn DriverComponent>,
        instance: Weak<InstanceContext>,
    ) -> Result<Self> {
        let shared = Arc::new(ComponentShared {
            name: driver.name().to_string(),
            id: driver.id(),
            driver: driver.clone(),
            state: Mutex::new(ComponentState::Created),
            op: Mutex::new(()),
            ports: Mutex::new(Vec::new()),
            instance,
        });

        let mut control = None;
        let (mut inputs, mut outputs, mut clocks) = (Vec::new(), Vec::new(), Vec::new());
        for info in driver.ports() {
            let port = Port::new(shared.clone(), info)?;
            match port.port_type() {
                PortType::Control if control.is_none() => control = Some(port.clone()),
                PortType::Input => inputs.push(port.clone()),
                PortType::Output => outputs.push(port.clone()),
                PortType::Clock => clocks.push(port.clone()),
                other => {
                    return Err(Error::Other(format!(
                        "component {} enumerated an unexpected {other} port",
                        shared.name
                    )));
                }
            }
            shared.ports.lock().push(port.downgrade());
        }
        let Some(control) = control else {
            return Err(Error::Other(format!(
                "component {} has no control port",
                shared.name
            )));
        };

        debug!(
            component = %shared.name,
            id = shared.id,
            inputs = inputs.len(),
            outputs = outputs.len(),
            clocks = clocks.len(),
            "Created component"
        );
        Ok(Self {
            shared,
            control,
            inputs,
            outputs,
            clocks,
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Driver-assigned component id.
    pub fn id(&self) -> u32 {
        self.shared.id
    }

    pub fn state(&self) -> ComponentState {
        self.shared.state()
    }

    pub fn is_enabled(&self) -> bool {
        self.state() == ComponentState::Enabled
    }

    pub fn control(&self) -> &Port {
        &self.control
    }

    pub fn inputs(&self) -> &[Port] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Port] {
        &self.outputs
    }

    pub fn clocks(&self) -> &[Port] {
        &self.clocks
    }

    /// Returns input port `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the component has no such port.
    pub fn input(&self, index: usize) -> Result<&Port> {
        self.port_at(&self.inputs, PortType::Input, index)
    }

    /// Returns output port `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the component has no such port.
    pub fn output(&self, index: usize) -> Result<&Port> {
        self.port_at(&self.outputs, PortType::Output, index)
    }

    pub fn clock(&self, index: usize) -> Result<&Port> {
        self.port_at(&self.clocks, PortType::Clock, index)
    }

    fn port_at<'a>(&self, ports: &'a [Port], port_type: PortType, index: usize) -> Result<&'a Port> {
        ports.get(index).ok_or_else(|| {
            Error::InvalidParameter(format!(
                "{} has {} {port_type} port(s), no index {index}",
                self.shared.name,
                ports.len()
            ))
        })
    }

    fn all_ports(&self) -> impl Iterator<Item = &Port> {
        std::iter::once(&self.control)
            .chain(&self.inputs)
            .chain(&self.outputs)
            .chain(&self.clocks)
    }

    /// Enables or disables the component together with its control port.
    ///
    /// Enabling is atomic: if the control port cannot be enabled the driver
    /// component is disabled again and the state is unchanged. Both
    /// directions are no-ops when the component is already in the requested
    /// state.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if the component was destroyed
    /// - the driver failure otherwise
    pub fn set_enabled(&self, enable: bool) -> Result<()> {
        let _op = self.shared.op.lock();
        match (self.state(), enable) {
            (ComponentState::Destroyed, _) => Err(Error::InvalidState(format!(
                "component {} is destroyed",
                self.shared.name
            ))),
            (ComponentState::Enabled, true) => Ok(()),
            (_, true) => self.enable_locked(),
            (ComponentState::Enabled, false) => self.disable_locked(),
            (_, false) => Ok(()),
        }
    }

    fn enable_locked(&self) -> Result<()> {
        Error::from_status(self.shared.driver.enable())?;
        if !self.control.is_enabled()
            && let Err(err) = self.control.enable_internal()
        {
            let status = self.shared.driver.disable();
            if status != mmal_sys::MMAL_SUCCESS {
                error!(
                    component = %self.shared.name,
                    status = mmal_sys::status_name(status),
                    "Failed to roll back component enable"
                );
            }
            return Err(err);
        }
        *self.shared.state.lock() = ComponentState::Enabled;
        debug!(component = %self.shared.name, "Enabled component");
        Ok(())
    }

    fn disable_locked(&self) -> Result<()> {
        self.control.disable_internal()?;
        Error::from_status(self.shared.driver.disable())?;
        *self.shared.state.lock() = ComponentState::Disabled;
        debug!(component = %self.shared.name, "Disabled component");
        Ok(())
    }

    /// Destroys the component and invalidates all of its ports.
    ///
    /// Every connection involving the component must be closed and every
    /// input, output and clock port disabled first. An enabled component is
    /// disabled as part of destruction.
    ///
    /// # Errors
    ///
    /// - [`Error::OutOfOrder`] if the component was already destroyed
    /// - [`Error::InvalidState`] if a port is still connected or enabled
    pub fn destroy(self) -> Result<()> {
        let _op = self.shared.op.lock();
        if self.state() == ComponentState::Destroyed {
            return Err(Error::OutOfOrder(format!(
                "component {} is already destroyed",
                self.shared.name
            )));
        }
        if let Some(port) = self
            .all_ports()
            .find(|p| p.is_connected() || (p.port_type() != PortType::Control && p.is_enabled()))
        {
            return Err(Error::InvalidState(format!(
                "port {} is still {}",
                port.name(),
                if port.is_connected() { "connected" } else { "enabled" }
            )));
        }
        if self.state() == ComponentState::Enabled {
            self.disable_locked()?;
        } else if self.control.is_enabled() {
            self.control.disable_internal()?;
        }

        let status = self.shared.driver.destroy();
        *self.shared.state.lock() = ComponentState::Destroyed;
        for port in self.all_ports() {
            port.detach_pool();
        }
        if let Some(instance) = self.shared.instance.upgrade() {
            instance.forget(self.shared.id);
        }
        debug!(component = %self.shared.name, "Destroyed component");
        Error::from_status(status)
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for Component {}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.shared.name)
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .finish()
    }
}
