// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Producer/consumer capture loop and the still-capture pipeline.
//!
//! [`CaptureLoop`] pumps one output port until it delivers an end-of-stream
//! buffer. [`StillCapture`] builds the usual camera pipeline around it:
//!
//! ```text
//!  camera --preview (tunnel)--> renderer / null sink
//!         --capture (tunnel)--> image encoder --output (copy)--> caller
//! ```
//!
//! Without an encoder the caller pumps the camera capture port directly.

use std::{fmt, time::Duration};

use tracing::{debug, error, info, trace, warn};

use crate::{
    Buffer, Component, Connection, ConnectionFlags, Error, Format, MmalInstance, Pool, Port,
    Result, config::CaptureSettings, parameter,
};

/// Camera output carrying the preview stream.
pub const CAMERA_PREVIEW_PORT: usize = 0;
/// Camera output carrying the video stream.
pub const CAMERA_VIDEO_PORT: usize = 1;
/// Camera output carrying still captures.
pub const CAMERA_CAPTURE_PORT: usize = 2;

/// Counters reported by [`CaptureLoop::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Buffers handed to the sink, the end-of-stream buffer included.
    pub buffers: u64,
    /// Payload bytes handed to the sink.
    pub bytes: u64,
    /// Zero-length buffers without end-of-stream that were retried.
    pub empty_buffers: u64,
    /// Whether the loop stopped on end-of-stream.
    pub eos: bool,
}

/// Acquire/send/acquire/release loop over one output port.
///
/// Every iteration takes an empty buffer from `pool`, sends it to the port,
/// waits for it to come back full and hands it to the sink. The loop ends
/// after the sink has seen a buffer flagged end-of-stream.
///
/// A zero-length buffer without end-of-stream is logged and retried; it is
/// never passed to the sink.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use mmal::{CaptureLoop, MmalInstance, mock::{MockComponentSpec, MockDriver, MockPortSpec}};
/// use mmal::{Encoding, Format};
///
/// # fn main() -> Result<(), mmal::Error> {
/// let driver = MockDriver::new();
/// driver.register(
///     "source",
///     MockComponentSpec::new()
///         .with_output(MockPortSpec::new(Format::video(Encoding::I420, 64, 48)).frame_bytes(100).eos_after(3)),
/// );
/// let instance = MmalInstance::new(Arc::new(driver));
/// let source = instance.create_component("source")?;
/// let output = source.output(0)?;
/// let pool = output.create_pool(2, 256)?;
/// output.set_enabled(true)?;
///
/// let mut received = Vec::new();
/// let stats = CaptureLoop::new(output, &pool).run(|buffer| {
///     received.extend_from_slice(buffer.data());
///     Ok(())
/// })?;
///
/// assert_eq!(stats.buffers, 3);
/// assert_eq!(received.len(), 300);
/// # Ok(())
/// # }
/// ```
pub struct CaptureLoop<'a> {
    port: &'a Port,
    pool: &'a Pool,
    forward: Option<&'a Port>,
    timeout: Option<Duration>,
}

impl<'a> CaptureLoop<'a> {
    pub fn new(port: &'a Port, pool: &'a Pool) -> Self {
        Self {
            port,
            pool,
            forward: None,
            timeout: None,
        }
    }

    /// Sends every captured buffer on to `input` instead of releasing it.
    ///
    /// This is the caller's half of a copy-mode connection: `input` returns
    /// the buffers to the empty queue once it has consumed them.
    pub fn forward_to(mut self, input: &'a Port) -> Self {
        self.forward = Some(input);
        self
    }

    /// Bounds every wait for a buffer; [`Error::Timeout`] is returned when it expires.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn acquire_empty(&self) -> Result<Buffer> {
        match self.timeout {
            Some(timeout) => self.pool.acquire_empty_timeout(timeout),
            None => self.pool.acquire_empty(),
        }
    }

    fn acquire_full(&self) -> Result<Buffer> {
        match self.timeout {
            Some(timeout) => self.pool.acquire_full_timeout(timeout),
            None => self.pool.acquire_full(),
        }
    }

    /// Runs until end-of-stream.
    ///
    /// # Errors
    ///
    /// The first failure of an acquire, a send or the sink ends the loop.
    /// Buffers held by the loop at that point go back to the pool.
    pub fn run<F>(&self, mut sink: F) -> Result<CaptureStats>
    where
        F: FnMut(&Buffer) -> Result<()>,
    {
        let mut stats = CaptureStats::default();
        loop {
            let empty = self.acquire_empty()?;
            self.port.send_buffer(empty)?;
            let full = self.acquire_full()?;

            if full.is_empty() && !full.is_eos() {
                stats.empty_buffers += 1;
                warn!(port = %self.port, "Zero-length buffer without EOS, retrying");
                full.release();
                continue;
            }

            stats.buffers += 1;
            stats.bytes += full.length() as u64;
            let eos = full.is_eos();
            trace!(port = %self.port, length = full.length(), eos, "Captured buffer");
            sink(&full)?;
            match self.forward {
                Some(input) => input.send_buffer(full)?,
                None => full.release(),
            }
            if eos {
                stats.eos = true;
                break;
            }
        }
        debug!(
            port = %self.port,
            buffers = stats.buffers,
            bytes = stats.bytes,
            "Capture loop reached end of stream"
        );
        Ok(stats)
    }
}

/// Lifecycle of a [`StillCapture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    /// Components created, ports formatted and committed.
    Configured,
    /// Connections enabled, output port ready.
    Connected,
    /// Capture trigger set.
    Capturing,
    /// End-of-stream seen, output port flushed and disabled.
    Draining,
    TornDown,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CaptureState::Idle => "idle",
            CaptureState::Configured => "configured",
            CaptureState::Connected => "connected",
            CaptureState::Capturing => "capturing",
            CaptureState::Draining => "draining",
            CaptureState::TornDown => "torn down",
        })
    }
}

fn keep_first(first: &mut Option<Error>, step: &str, result: Result<()>) {
    if let Err(err) = result {
        error!(step, error = %err, "Still capture teardown step failed");
        first.get_or_insert(err);
    }
}

/// Camera still-capture pipeline.
///
/// Drives `Idle → Configured → Connected → Capturing → Draining → TornDown`.
/// A failed transition leaves the pipeline in the state it was in;
/// [`StillCapture::teardown`] is valid from every state and releases
/// whatever was built so far. Dropping the pipeline tears it down.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use mmal::{CaptureState, MmalInstance, StillCapture, config::CaptureSettings, mock::MockDriver};
///
/// # fn main() -> Result<(), mmal::Error> {
/// let instance = MmalInstance::new(Arc::new(MockDriver::with_defaults()));
/// let mut capture = StillCapture::new(instance, CaptureSettings::default());
/// capture.configure()?;
/// capture.connect()?;
/// capture.start()?;
///
/// let mut image = Vec::new();
/// capture.capture(|buffer| {
///     image.extend_from_slice(buffer.data());
///     Ok(())
/// })?;
/// capture.teardown()?;
///
/// assert_eq!(capture.state(), CaptureState::TornDown);
/// assert_eq!(&image[..2], &[0xFF, 0xD8]);
/// # Ok(())
/// # }
/// ```
pub struct StillCapture {
    instance: MmalInstance,
    settings: CaptureSettings,
    state: CaptureState,
    /// In creation order.
    components: Vec<Component>,
    camera: Option<Component>,
    encoder: Option<Component>,
    output: Option<Port>,
    connections: Vec<Connection>,
    output_pool: Option<Pool>,
}

impl StillCapture {
    pub fn new(instance: MmalInstance, settings: CaptureSettings) -> Self {
        Self {
            instance,
            settings,
            state: CaptureState::Idle,
            components: Vec::new(),
            camera: None,
            encoder: None,
            output: None,
            connections: Vec::new(),
            output_pool: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub fn camera(&self) -> Option<&Component> {
        self.camera.as_ref()
    }

    pub fn encoder(&self) -> Option<&Component> {
        self.encoder.as_ref()
    }

    /// The port the caller pumps: the encoder output, or the camera capture port.
    pub fn output_port(&self) -> Option<&Port> {
        self.output.as_ref()
    }

    pub fn output_pool(&self) -> Option<&Pool> {
        self.output_pool.as_ref()
    }

    fn expect_state(&self, expected: CaptureState, action: &str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "cannot {action} a still capture that is {}",
                self.state
            )))
        }
    }

    fn camera_ready(&self) -> Result<&Component> {
        self.camera
            .as_ref()
            .ok_or_else(|| Error::InvalidState("still capture has no camera".to_string()))
    }

    fn output_ready(&self) -> Result<(&Port, &Pool)> {
        match (&self.output, &self.output_pool) {
            (Some(port), Some(pool)) => Ok((port, pool)),
            _ => Err(Error::InvalidState(
                "still capture output is not set up".to_string(),
            )),
        }
    }

    fn create(&mut self, name: &str) -> Result<Component> {
        let component = self.instance.create_component(name)?;
        if !self.components.contains(&component) {
            self.components.push(component.clone());
        }
        Ok(component)
    }

    /// Destroys the components of a failed configure, newest first.
    ///
    /// A component that cannot be destroyed stays listed for
    /// [`StillCapture::teardown`].
    fn discard_components(&mut self) {
        let mut kept = Vec::new();
        while let Some(component) = self.components.pop() {
            let name = component.name().to_string();
            if let Err(err) = component.clone().destroy() {
                warn!(component = %name, error = %err, "Failed to discard component");
                kept.push(component);
            }
        }
        kept.reverse();
        self.components = kept;
        self.camera = None;
        self.encoder = None;
        self.output = None;
    }

    /// Creates the components and commits every port format.
    ///
    /// On failure the components created so far are destroyed again and the
    /// pipeline stays idle, so `configure` can be retried.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] unless the pipeline is idle
    /// - [`Error::InvalidParameter`] for invalid settings
    /// - any component creation, format or parameter failure
    pub fn configure(&mut self) -> Result<()> {
        self.expect_state(CaptureState::Idle, "configure")?;
        self.settings.validate()?;
        if let Err(err) = self.build() {
            self.discard_components();
            return Err(err);
        }
        Ok(())
    }

    fn build(&mut self) -> Result<()> {
        let settings = self.settings.clone();

        let camera = self.create(mmal_sys::MMAL_COMPONENT_DEFAULT_CAMERA)?;
        self.camera = Some(camera.clone());
        camera
            .control()
            .set_parameter_i32(parameter::CAMERA_NUM, settings.camera_num)?;

        let frame_rate = i32::try_from(settings.frame_rate).map_err(|_| {
            Error::InvalidParameter(format!("frame rate {} is too large", settings.frame_rate))
        })?;
        let preview_port = camera.output(CAMERA_PREVIEW_PORT)?;
        preview_port.set_format(
            Format::video(crate::Encoding::I420, settings.width, settings.height)
                .with_frame_rate(frame_rate, 1),
        )?;
        preview_port.commit_format_change()?;

        let capture_port = camera.output(CAMERA_CAPTURE_PORT)?;
        capture_port.set_format(
            Format::video(settings.raw_encoding, settings.width, settings.height)
                .with_frame_rate(frame_rate, 1),
        )?;
        capture_port.commit_format_change()?;

        let output = if settings.use_encoder {
            let encoder = self.create(mmal_sys::MMAL_COMPONENT_DEFAULT_IMAGE_ENCODER)?;
            self.encoder = Some(encoder.clone());
            let input = encoder.input(0)?;
            input.copy_format_from(capture_port)?;
            input.commit_format_change()?;

            let output = encoder.output(0)?;
            let mut format = input.format();
            format.set_encoding(settings.encoding);
            output.set_format(format)?;
            output.commit_format_change()?;
            if settings.encoding == crate::Encoding::JPEG {
                output.set_parameter_u32(parameter::JPEG_Q_FACTOR, settings.quality)?;
            }
            output.clone()
        } else {
            capture_port.clone()
        };

        let preview = if settings.preview {
            mmal_sys::MMAL_COMPONENT_DEFAULT_VIDEO_RENDERER
        } else {
            mmal_sys::MMAL_COMPONENT_DEFAULT_NULL_SINK
        };
        self.create(preview)?;

        let encoding = output.format().encoding();
        self.output = Some(output);
        self.state = CaptureState::Configured;
        info!(
            width = settings.width,
            height = settings.height,
            %encoding,
            "Configured still capture"
        );
        Ok(())
    }

    /// Enables the components, then the preview tunnel, then the capture
    /// path, then the caller-facing output port with its pool.
    ///
    /// On failure every connection opened by this call is closed again and
    /// the components it enabled are disabled.
    pub fn connect(&mut self) -> Result<()> {
        self.expect_state(CaptureState::Configured, "connect")?;
        let mut enabled = Vec::new();
        if let Err(err) = self.link(&mut enabled) {
            for component in enabled.iter().rev() {
                if let Err(disable) = component.set_enabled(false) {
                    warn!(component = %component.name(), error = %disable, "Failed to disable component");
                }
            }
            return Err(err);
        }
        Ok(())
    }

    fn link(&mut self, enabled: &mut Vec<Component>) -> Result<()> {
        for component in &self.components {
            if !component.is_enabled() {
                component.set_enabled(true)?;
                enabled.push(component.clone());
            }
        }

        let camera = self.camera_ready()?.clone();
        let Some(output) = self.output.clone() else {
            return Err(Error::InvalidState(
                "still capture output is not set up".to_string(),
            ));
        };
        let preview = self
            .components
            .last()
            .cloned()
            .ok_or_else(|| Error::InvalidState("still capture has no preview".to_string()))?;
        let tunnel = ConnectionFlags::TUNNELLING | ConnectionFlags::ALLOCATION_ON_INPUT;

        let mut connections = Vec::new();
        let mut preview_link = self.instance.connect(
            preview.input(0)?,
            camera.output(CAMERA_PREVIEW_PORT)?,
            tunnel,
        )?;
        preview_link.set_enabled(true)?;
        connections.push(preview_link);

        if let Some(encoder) = &self.encoder {
            let mut capture_link = self.instance.connect(
                encoder.input(0)?,
                camera.output(CAMERA_CAPTURE_PORT)?,
                tunnel,
            )?;
            capture_link.set_enabled(true)?;
            connections.push(capture_link);
        }

        if self.settings.buffer_count > 0 {
            output.set_buffer_num(self.settings.buffer_count)?;
        }
        let pool = output.create_default_pool()?;
        output.set_enabled(true)?;

        debug!(
            connections = connections.len(),
            pool_size = pool.capacity(),
            payload_size = pool.payload_size(),
            "Connected still capture"
        );
        self.connections = connections;
        self.output_pool = Some(pool);
        self.state = CaptureState::Connected;
        Ok(())
    }

    fn set_trigger(&self, capture: bool) -> Result<()> {
        self.camera_ready()?
            .output(CAMERA_CAPTURE_PORT)?
            .set_parameter_bool(parameter::CAPTURE, capture)
    }

    /// Sets the camera capture trigger.
    pub fn start(&mut self) -> Result<()> {
        self.expect_state(CaptureState::Connected, "start")?;
        self.set_trigger(true)?;
        self.state = CaptureState::Capturing;
        debug!("Still capture triggered");
        Ok(())
    }

    /// Clears the capture trigger; the connections stay up.
    pub fn stop(&mut self) -> Result<()> {
        self.expect_state(CaptureState::Capturing, "stop")?;
        self.set_trigger(false)?;
        self.state = CaptureState::Connected;
        Ok(())
    }

    /// Pumps the output until end-of-stream, then flushes and disables it.
    ///
    /// The sink sees every non-empty buffer of the image in order. Each wait
    /// for a buffer is bounded by the configured timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] unless the pipeline is capturing
    /// - [`Error::Timeout`] if the camera stops delivering
    /// - any pool, port or sink failure; the pipeline stays capturing and
    ///   should be torn down
    pub fn capture<F>(&mut self, sink: F) -> Result<CaptureStats>
    where
        F: FnMut(&Buffer) -> Result<()>,
    {
        self.expect_state(CaptureState::Capturing, "capture with")?;
        let (port, pool) = self.output_ready()?;
        let stats = CaptureLoop::new(port, pool)
            .timeout(self.settings.timeout())
            .run(sink)?;
        port.flush()?;
        port.set_enabled(false)?;
        self.state = CaptureState::Draining;
        info!(buffers = stats.buffers, bytes = stats.bytes, "Still captured");
        Ok(stats)
    }

    /// Releases everything built so far, from any state.
    ///
    /// Clears the trigger, disables the output port, closes the connections
    /// in reverse order, then disables and destroys the components in
    /// reverse creation order. Every step is attempted; the first failure is
    /// returned. Tearing down twice does nothing.
    pub fn teardown(&mut self) -> Result<()> {
        if self.state == CaptureState::TornDown {
            return Ok(());
        }
        let mut first = None;
        if self.state == CaptureState::Capturing {
            keep_first(&mut first, "clear trigger", self.set_trigger(false));
        }
        if let Some(port) = &self.output
            && port.is_enabled()
        {
            keep_first(&mut first, "disable output", port.set_enabled(false));
        }
        while let Some(connection) = self.connections.pop() {
            keep_first(&mut first, "close connection", connection.close());
        }
        for component in self.components.iter().rev() {
            keep_first(&mut first, "disable component", component.set_enabled(false));
        }
        while let Some(component) = self.components.pop() {
            keep_first(&mut first, "destroy component", component.destroy());
        }
        self.camera = None;
        self.encoder = None;
        self.output = None;
        self.output_pool = None;
        self.state = CaptureState::TornDown;
        debug!("Tore down still capture");
        first.map_or(Ok(()), Err)
    }

    /// Runs a whole capture: configure, connect, trigger, capture, tear down.
    ///
    /// The pipeline is torn down even when a step fails; the step's error is
    /// returned in that case.
    pub fn capture_once<F>(&mut self, sink: F) -> Result<CaptureStats>
    where
        F: FnMut(&Buffer) -> Result<()>,
    {
        let result = self
            .configure()
            .and_then(|()| self.connect())
            .and_then(|()| self.start())
            .and_then(|()| self.capture(sink));
        let teardown = self.teardown();
        let stats = result?;
        teardown?;
        Ok(stats)
    }
}

impl fmt::Debug for StillCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StillCapture")
            .field("state", &self.state)
            .field("components", &self.components)
            .field("connections", &self.connections)
            .finish()
    }
}

impl Drop for StillCapture {
    fn drop(&mut self) {
        if self.state != CaptureState::TornDown
            && let Err(err) = self.teardown()
        {
            error!(error = %err, "Failed to tear down still capture on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tracing_test::traced_test;

    use super::*;
    use crate::{
        Encoding,
        mock::{MockComponentSpec, MockDriver, MockPortSpec},
    };

    #[traced_test]
    #[test]
    fn zero_length_buffers_are_retried() {
        let driver = MockDriver::new();
        driver.register(
            "flaky",
            MockComponentSpec::new().with_output(
                MockPortSpec::new(Format::video(Encoding::I420, 64, 48))
                    .frame_bytes(32)
                    .zero_length_frames(2)
                    .eos_after(1),
            ),
        );
        let instance = MmalInstance::new(Arc::new(driver));
        let source = instance.create_component("flaky").unwrap();
        let output = source.output(0).unwrap();
        let pool = output.create_pool(1, 64).unwrap();
        output.set_enabled(true).unwrap();

        let mut sizes = Vec::new();
        let stats = CaptureLoop::new(output, &pool)
            .timeout(Duration::from_secs(5))
            .run(|buffer| {
                sizes.push(buffer.length());
                Ok(())
            })
            .unwrap();

        assert_eq!(sizes, [32]);
        assert_eq!(stats.empty_buffers, 2);
        assert_eq!(stats.buffers, 1);
        assert!(stats.eos);
        assert!(logs_contain("Zero-length buffer without EOS, retrying"));
        output.set_enabled(false).unwrap();
    }

    #[test]
    fn state_names() {
        assert_eq!(CaptureState::TornDown.to_string(), "torn down");
        assert_eq!(CaptureState::Capturing.to_string(), "capturing");
    }
}
