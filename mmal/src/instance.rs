// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Engine instance management.
//!
//! This module provides [`MmalInstance`], the composition root of the engine.
//! An instance wraps one injected [`mmal_sys::Driver`] and keeps the registry
//! of components created through it.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use mmal_sys::Driver;
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::{Component, ComponentState, Connection, ConnectionFlags, Error, Port, Result};

/// Internal shared context for an engine instance.
///
/// Components keep a weak reference to it so destroying a component removes
/// it from the registry, while the instance itself never keeps a component
/// alive past [`MmalInstance::destroy`].
pub(crate) struct InstanceContext {
    pub(crate) driver: Arc<dyn Driver>,
    components: Mutex<Vec<Component>>,
    next_connection: AtomicU64,
}

impl InstanceContext {
    /// Drops a destroyed component from the registry.
    pub(crate) fn forget(&self, id: u32) {
        self.components.lock().retain(|component| component.id() != id);
    }

    pub(crate) fn next_connection_id(&self) -> u64 {
        self.next_connection.fetch_add(1, Ordering::Relaxed)
    }
}

/// Main entry point of the pipeline engine.
///
/// The instance is cheaply cloneable and thread-safe (`Send + Sync`). All
/// hardware access goes through the driver passed to [`MmalInstance::new`];
/// there is no global registry.
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
/// let connection = instance.connect(sink.input(0)?, source.output(0)?, ConnectionFlags::empty())?;
/// connection.close()?;
/// instance.destroy()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MmalInstance {
    context: Arc<InstanceContext>,
}

impl MmalInstance {
    /// Creates an engine instance on top of `driver`.
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            context: Arc::new(InstanceContext {
                driver,
                components: Mutex::new(Vec::new()),
                next_connection: AtomicU64::new(1),
            }),
        }
    }

    /// Creates the component registered under `name`.
    ///
    /// Creation is idempotent: asking for a name that is already alive in
    /// this instance returns the existing component.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the driver does not know `name`
    /// - the driver failure otherwise
    pub fn create_component(&self, name: &str) -> Result<Component> {
        let mut components = self.context.components.lock();
        if let Some(existing) = components
            .iter()
            .find(|c| c.name() == name && c.state() != ComponentState::Destroyed)
        {
            return Ok(existing.clone());
        }

        let driver_component = self
            .context
            .driver
            .create_component(name)
            .map_err(|status| match status {
                mmal_sys::MMAL_ENOENT => Error::NotFound(format!("no component named {name}")),
                other => Error::from_failure(other),
            })?;
        let component = Component::new(driver_component, Arc::downgrade(&self.context))?;
        components.push(component.clone());
        Ok(component)
    }

    /// Returns the live component named `name`, if any.
    pub fn component(&self, name: &str) -> Option<Component> {
        self.context
            .components
            .lock()
            .iter()
            .find(|c| c.name() == name)
            .cloned()
    }

    /// Returns the names of live components in creation order.
    pub fn component_names(&self) -> Vec<String> {
        self.context
            .components
            .lock()
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Connects `output` to `input`.
    ///
    /// See [`Connection`] for the preconditions and what each flag changes.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidParameter`] if the ports have the wrong types or
    ///   belong to the same component
    /// - [`Error::AlreadyConnected`] if either port is already connected
    /// - [`Error::InvalidState`] if either port is enabled or its component destroyed
    /// - [`Error::Unsupported`] if tunnelling is requested between ports that
    ///   cannot pass buffers through
    pub fn connect(&self, input: &Port, output: &Port, flags: ConnectionFlags) -> Result<Connection> {
        Connection::new(self.context.next_connection_id(), input, output, flags)
    }

    /// Destroys every component still alive, newest first.
    ///
    /// Components with enabled or connected ports are left alone and stay
    /// registered, so other clones of the instance still find them. The first
    /// failure is returned after all others were attempted.
    pub fn destroy(self) -> Result<()> {
        let components = self.context.components.lock().clone();
        let mut first_error = None;
        for component in components.into_iter().rev() {
            let name = component.name().to_string();
            if let Err(err) = component.destroy() {
                error!(component = %name, error = %err, "Failed to destroy component");
                first_error.get_or_insert(err);
            }
        }
        debug!("Destroyed engine instance");
        first_error.map_or(Ok(()), Err)
    }
}
