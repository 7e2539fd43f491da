// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Software driver for tests, demos and development without hardware.
//!
//! [`MockDriver`] implements [`mmal_sys::Driver`] with components built from
//! [`MockComponentSpec`] templates. Every enabled input or output port runs
//! its own worker thread which completes buffers asynchronously through the
//! port callback, the way hardware completes them from interrupt context.
//!
//! - Output ports fill each buffer sent to them with a frame, optionally only
//!   after the [`crate::parameter::CAPTURE`] trigger is set.
//! - Input ports consume buffers and hand them back. An input that *feeds* an
//!   output turns every consumed frame into a number of output chunks, which
//!   is how the encoder templates behave.
//! - Lifecycle calls are recorded in a journal ([`MockDriver::events`]) so the
//!   order of enables and disables can be checked.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use mmal::{MmalInstance, mock::{MockDriver, MockEvent}};
//!
//! # fn main() -> Result<(), mmal::Error> {
//! let driver = Arc::new(MockDriver::with_defaults());
//! let instance = MmalInstance::new(driver.clone());
//! let sink = instance.create_component("mock.sink")?;
//! sink.set_enabled(true)?;
//!
//! assert!(driver.events().contains(&MockEvent::ComponentEnabled("mock.sink".to_string())));
//! # Ok(())
//! # }
//! ```

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use mmal_sys::{
    BufferCallback, BufferHeader, BufferRequirements, Driver, DriverComponent, EsFormat,
    EsSpecificFormat, ParamValue, PortAddress, PortInfo, Rejected, Status,
};
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace, warn};

use crate::{Encoding, Format, PortCapabilities, PortType};

/// Payload size recommended for compressed outputs.
const COMPRESSED_BUFFER_SIZE: u32 = 80 * 1024;
const COMPRESSED_BUFFER_MIN: u32 = 2048;
const OPAQUE_BUFFER_SIZE: u32 = 128;
const AUDIO_BUFFER_SIZE: u32 = 4096;
/// Chunk size of fed outputs without an explicit frame size.
const DEFAULT_CHUNK_BYTES: usize = 4096;
/// Timestamp step between frames, in microseconds (30 fps).
const FRAME_DURATION_US: i64 = 33_333;

fn align(value: u32, to: u32) -> usize {
    value.div_ceil(to) as usize * to as usize
}

/// Bytes of one frame of `format`, or the recommended buffer size for
/// compressed encodings.
fn frame_size(format: &EsFormat) -> usize {
    match format.es {
        EsSpecificFormat::Video(video) => {
            let pixels = align(video.width, 32) * align(video.height, 16);
            match Encoding(format.encoding) {
                Encoding::I420 | Encoding::NV12 => pixels * 3 / 2,
                Encoding::RGB24 | Encoding::BGR24 => pixels * 3,
                Encoding::RGBA => pixels * 4,
                Encoding::YUYV => pixels * 2,
                Encoding::OPAQUE => OPAQUE_BUFFER_SIZE as usize,
                _ => COMPRESSED_BUFFER_SIZE as usize,
            }
        }
        EsSpecificFormat::Audio(_) => AUDIO_BUFFER_SIZE as usize,
        _ => 0,
    }
}

fn requirements(spec: &MockPortSpec, format: &EsFormat) -> BufferRequirements {
    let (size_min, size_recommended) = if Encoding(format.encoding).is_compressed() {
        (COMPRESSED_BUFFER_MIN, COMPRESSED_BUFFER_SIZE)
    } else {
        let size = frame_size(format) as u32;
        (size, size)
    };
    BufferRequirements {
        num_min: spec.num_min,
        num_recommended: spec.num_recommended,
        size_min,
        size_recommended,
        alignment_min: 16,
    }
}

/// One journal entry. Components are named by component name, ports by full port name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    ComponentCreated(String),
    ComponentEnabled(String),
    ComponentDisabled(String),
    ComponentDestroyed(String),
    FormatCommitted(String),
    PortEnabled(String),
    PortDisabled(String),
    PortFlushed(String),
    ParameterSet { port: String, id: u32 },
}

type Journal = Arc<Mutex<Vec<MockEvent>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MockFeed {
    output: u32,
    chunks_per_frame: u32,
}

/// Template for one port of a mock component.
#[derive(Debug, Clone)]
pub struct MockPortSpec {
    capabilities: PortCapabilities,
    encodings: Vec<Encoding>,
    format: Format,
    num_min: u32,
    num_recommended: u32,
    frame_bytes: Option<usize>,
    frame_interval: Duration,
    eos_after: Option<u64>,
    zero_length_frames: u32,
    requires_trigger: bool,
    feeds: Option<MockFeed>,
}

impl MockPortSpec {
    /// A port carrying `format`, accepting any encoding, needing one buffer.
    pub fn new(format: Format) -> Self {
        Self {
            capabilities: PortCapabilities::empty(),
            encodings: Vec::new(),
            format,
            num_min: 1,
            num_recommended: 1,
            frame_bytes: None,
            frame_interval: Duration::ZERO,
            eos_after: None,
            zero_length_frames: 0,
            requires_trigger: false,
            feeds: None,
        }
    }

    pub fn capabilities(mut self, capabilities: PortCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Restricts the encodings the port accepts.
    pub fn encodings(mut self, encodings: impl Into<Vec<Encoding>>) -> Self {
        self.encodings = encodings.into();
        self
    }

    pub fn buffers(mut self, num_min: u32, num_recommended: u32) -> Self {
        self.num_min = num_min;
        self.num_recommended = num_recommended;
        self
    }

    /// Payload bytes per produced frame (per chunk on fed outputs).
    ///
    /// Defaults to the frame size of the committed format. Always capped at
    /// the buffer capacity.
    pub fn frame_bytes(mut self, bytes: usize) -> Self {
        self.frame_bytes = Some(bytes);
        self
    }

    /// Minimum time between two produced frames.
    pub fn frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Flags the `count`-th frame with EOS and stops producing afterwards.
    ///
    /// On triggered ports this is the burst length per trigger instead.
    pub fn eos_after(mut self, count: u64) -> Self {
        self.eos_after = Some(count);
        self
    }

    /// Completes `count` empty, non-EOS buffers before the first real frame.
    pub fn zero_length_frames(mut self, count: u32) -> Self {
        self.zero_length_frames = count;
        self
    }

    /// Produces nothing until the capture parameter is set. Each trigger
    /// yields one burst ending in EOS, after which the trigger clears itself.
    pub fn requires_trigger(mut self) -> Self {
        self.requires_trigger = true;
        self
    }

    /// Input only: every consumed frame becomes `chunks_per_frame` chunks on output `output`.
    pub fn feeds(mut self, output: u32, chunks_per_frame: u32) -> Self {
        self.feeds = Some(MockFeed {
            output,
            chunks_per_frame: chunks_per_frame.max(1),
        });
        self
    }
}

/// Template for a mock component.
#[derive(Debug, Clone, Default)]
pub struct MockComponentSpec {
    inputs: Vec<MockPortSpec>,
    outputs: Vec<MockPortSpec>,
    clocks: usize,
    fail_control_enable: bool,
}

fn raw_encodings() -> Vec<Encoding> {
    vec![
        Encoding::I420,
        Encoding::NV12,
        Encoding::YUYV,
        Encoding::RGB24,
        Encoding::BGR24,
        Encoding::RGBA,
        Encoding::OPAQUE,
    ]
}

impl MockComponentSpec {
    /// A component with only a control port.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, port: MockPortSpec) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn with_output(mut self, port: MockPortSpec) -> Self {
        self.outputs.push(port);
        self
    }

    pub fn with_clocks(mut self, count: usize) -> Self {
        self.clocks = count;
        self
    }

    /// Makes enabling the control port fail with `MMAL_EIO`.
    pub fn fail_control_enable(mut self) -> Self {
        self.fail_control_enable = true;
        self
    }

    /// One free-running output producing 512-byte frames; no pass-through.
    pub fn source() -> Self {
        Self::new().with_output(
            MockPortSpec::new(Format::video(Encoding::I420, 64, 48))
                .buffers(1, 4)
                .frame_bytes(512),
        )
    }

    /// One input consuming anything; no pass-through.
    pub fn sink() -> Self {
        Self::new().with_input(MockPortSpec::new(Format::video(Encoding::I420, 64, 48)).buffers(1, 4))
    }

    /// Preview (0), video (1) and triggered still capture (2) outputs.
    pub fn camera() -> Self {
        let raw = |interval: Duration| {
            MockPortSpec::new(Format::video(Encoding::I420, 640, 480).with_frame_rate(30, 1))
                .capabilities(
                    PortCapabilities::PASSTHROUGH
                        | PortCapabilities::ALLOCATION
                        | PortCapabilities::SUPPORTS_EVENT_FORMAT_CHANGE,
                )
                .encodings(raw_encodings())
                .frame_interval(interval)
        };
        let frame = Duration::from_micros(FRAME_DURATION_US as u64);
        Self::new()
            .with_output(raw(frame).buffers(2, 3))
            .with_output(raw(frame).buffers(1, 3))
            .with_output(raw(Duration::ZERO).buffers(1, 1).requires_trigger())
            .with_clocks(1)
    }

    /// Raw input feeding a compressed still-image output (two chunks per image).
    pub fn image_encoder() -> Self {
        Self::new()
            .with_input(
                MockPortSpec::new(Format::video(Encoding::I420, 640, 480))
                    .capabilities(PortCapabilities::PASSTHROUGH)
                    .encodings(raw_encodings())
                    .feeds(0, 2),
            )
            .with_output(
                MockPortSpec::new(Format::video(Encoding::JPEG, 640, 480))
                    .capabilities(PortCapabilities::ALLOCATION)
                    .encodings([Encoding::JPEG, Encoding::GIF, Encoding::PNG, Encoding::BMP])
                    .buffers(1, 3)
                    .frame_bytes(DEFAULT_CHUNK_BYTES),
            )
    }

    /// Raw input feeding a compressed video output (one chunk per frame).
    pub fn video_encoder() -> Self {
        Self::new()
            .with_input(
                MockPortSpec::new(Format::video(Encoding::I420, 640, 480))
                    .capabilities(PortCapabilities::PASSTHROUGH)
                    .encodings(raw_encodings())
                    .buffers(1, 3)
                    .feeds(0, 1),
            )
            .with_output(
                MockPortSpec::new(Format::video(Encoding::H264, 640, 480))
                    .capabilities(PortCapabilities::ALLOCATION)
                    .encodings([Encoding::H264, Encoding::MJPEG])
                    .buffers(1, 3)
                    .frame_bytes(2048),
            )
    }

    /// Raw input with pass-through, for renderers and null sinks.
    pub fn renderer(encodings: Vec<Encoding>) -> Self {
        Self::new().with_input(
            MockPortSpec::new(Format::video(Encoding::I420, 640, 480))
                .capabilities(PortCapabilities::PASSTHROUGH)
                .encodings(encodings)
                .buffers(1, 2),
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct Credit {
    first: bool,
    last: bool,
    eos: bool,
    frame: u64,
}

enum Job {
    Produce {
        header: BufferHeader,
        length: usize,
        eos: bool,
        sequence: u64,
    },
    Chunk {
        header: BufferHeader,
        credit: Credit,
        markers: bool,
    },
    Consume {
        header: BufferHeader,
    },
}

enum Next {
    Run(Job),
    Wait(Option<Instant>),
}

struct MockPortState {
    enabled: bool,
    stop: bool,
    flushing: bool,
    busy: usize,
    callback: Option<BufferCallback>,
    pending: VecDeque<BufferHeader>,
    credits: VecDeque<Credit>,
    triggered: bool,
    finished: bool,
    burst_frames: u64,
    sequence: u64,
    frames_fed: u64,
    zero_left: u32,
    next_frame_at: Option<Instant>,
    format: EsFormat,
    requirements: BufferRequirements,
    params: HashMap<u32, ParamValue>,
}

struct MockPort {
    name: String,
    address: PortAddress,
    port_type: PortType,
    spec: MockPortSpec,
    /// Output driven by an input's `feeds`.
    fed: bool,
    state: Mutex<MockPortState>,
    ready: Condvar,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MockPort {
    fn new(component: &str, port_type: PortType, index: u32, spec: MockPortSpec, fed: bool) -> Self {
        let format = match port_type {
            PortType::Control => Format::control().as_raw().clone(),
            _ => spec.format.as_raw().clone(),
        };
        let requirements = match port_type {
            PortType::Control | PortType::Clock => BufferRequirements::default(),
            _ => requirements(&spec, &format),
        };
        Self {
            name: format!("{component}:{port_type}:{index}"),
            address: PortAddress {
                port_type: port_type.into(),
                index,
            },
            port_type,
            fed,
            state: Mutex::new(MockPortState {
                enabled: false,
                stop: false,
                flushing: false,
                busy: 0,
                callback: None,
                pending: VecDeque::new(),
                credits: VecDeque::new(),
                triggered: false,
                finished: false,
                burst_frames: 0,
                sequence: 0,
                frames_fed: 0,
                zero_left: spec.zero_length_frames,
                next_frame_at: None,
                format,
                requirements,
                params: HashMap::new(),
            }),
            spec,
            ready: Condvar::new(),
            worker: Mutex::new(None),
        }
    }

    fn info(&self) -> PortInfo {
        let state = self.state.lock();
        PortInfo {
            name: self.name.clone(),
            address: self.address,
            capabilities: self.spec.capabilities.bits(),
            supported_encodings: self.spec.encodings.iter().map(|e| e.0).collect(),
            format: state.format.clone(),
            requirements: state.requirements,
        }
    }

    fn next_job(&self, state: &mut MockPortState) -> Next {
        if state.flushing || state.pending.is_empty() {
            return Next::Wait(None);
        }
        match self.port_type {
            PortType::Input => match state.pending.pop_front() {
                Some(header) => Next::Run(Job::Consume { header }),
                None => Next::Wait(None),
            },
            PortType::Output if self.fed => {
                if state.credits.is_empty() {
                    return Next::Wait(None);
                }
                match (state.pending.pop_front(), state.credits.pop_front()) {
                    (Some(header), Some(credit)) => Next::Run(Job::Chunk {
                        header,
                        credit,
                        markers: Encoding(state.format.encoding) == Encoding::JPEG,
                    }),
                    _ => Next::Wait(None),
                }
            }
            PortType::Output => self.next_frame(state),
            _ => Next::Wait(None),
        }
    }

    fn next_frame(&self, state: &mut MockPortState) -> Next {
        if state.finished || (self.spec.requires_trigger && !state.triggered) {
            return Next::Wait(None);
        }
        let now = Instant::now();
        if let Some(at) = state.next_frame_at
            && now < at
        {
            return Next::Wait(Some(at));
        }
        let Some(header) = state.pending.pop_front() else {
            return Next::Wait(None);
        };
        if !self.spec.frame_interval.is_zero() {
            state.next_frame_at = Some(now + self.spec.frame_interval);
        }
        if state.zero_left > 0 {
            state.zero_left -= 1;
            return Next::Run(Job::Produce {
                header,
                length: 0,
                eos: false,
                sequence: state.sequence,
            });
        }

        state.burst_frames += 1;
        state.sequence += 1;
        let burst = self
            .spec
            .eos_after
            .or(self.spec.requires_trigger.then_some(1));
        let eos = burst.is_some_and(|n| state.burst_frames >= n);
        if eos {
            state.burst_frames = 0;
            if self.spec.requires_trigger {
                state.triggered = false;
                state.zero_left = self.spec.zero_length_frames;
                state
                    .params
                    .insert(mmal_sys::MMAL_PARAMETER_CAPTURE, ParamValue::Boolean(false));
            } else {
                state.finished = true;
            }
        }
        let length = self
            .spec
            .frame_bytes
            .unwrap_or_else(|| frame_size(&state.format));
        Next::Run(Job::Produce {
            header,
            length,
            eos,
            sequence: state.sequence,
        })
    }

    fn execute(&self, job: Job, fed: Option<&MockPort>) -> BufferHeader {
        match job {
            Job::Produce {
                mut header,
                length,
                eos,
                sequence,
            } => {
                let length = length.min(header.capacity());
                header.data[..length].fill(sequence as u8);
                header.offset = 0;
                header.length = length as u32;
                header.flags = 0;
                if length > 0 {
                    header.flags |= mmal_sys::MMAL_BUFFER_HEADER_FLAG_FRAME_END
                        | mmal_sys::MMAL_BUFFER_HEADER_FLAG_KEYFRAME;
                    header.pts = sequence as i64 * FRAME_DURATION_US;
                    header.dts = header.pts;
                }
                if eos {
                    header.flags |= mmal_sys::MMAL_BUFFER_HEADER_FLAG_EOS;
                }
                trace!(port = %self.name, sequence, length, eos, "Produced frame");
                header
            }
            Job::Chunk {
                mut header,
                credit,
                markers,
            } => {
                let length = self
                    .spec
                    .frame_bytes
                    .unwrap_or(DEFAULT_CHUNK_BYTES)
                    .min(header.capacity());
                let payload = &mut header.data[..length];
                payload.fill(credit.frame as u8);
                if markers && length >= 2 {
                    if credit.first {
                        payload[..2].copy_from_slice(&[0xFF, 0xD8]);
                    }
                    if credit.last {
                        payload[length - 2..].copy_from_slice(&[0xFF, 0xD9]);
                    }
                }
                header.offset = 0;
                header.length = length as u32;
                header.flags = 0;
                if credit.first {
                    header.flags |= mmal_sys::MMAL_BUFFER_HEADER_FLAG_FRAME_START;
                }
                if credit.last {
                    header.flags |= mmal_sys::MMAL_BUFFER_HEADER_FLAG_FRAME_END;
                }
                if credit.eos {
                    header.flags |= mmal_sys::MMAL_BUFFER_HEADER_FLAG_EOS;
                }
                header.pts = credit.frame as i64 * FRAME_DURATION_US;
                header.dts = header.pts;
                trace!(port = %self.name, frame = credit.frame, length, eos = credit.eos, "Produced chunk");
                header
            }
            Job::Consume { header } => {
                if let (Some(feed), Some(fed)) = (self.spec.feeds, fed) {
                    let eos = header.flags & mmal_sys::MMAL_BUFFER_HEADER_FLAG_EOS != 0;
                    let chunks = match (header.length, eos) {
                        (0, true) => 1,
                        (0, false) => 0,
                        _ => feed.chunks_per_frame,
                    };
                    fed.push_credits(chunks, eos);
                }
                trace!(port = %self.name, length = header.length, "Consumed buffer");
                header
            }
        }
    }

    fn push_credits(&self, count: u32, eos: bool) {
        if count == 0 {
            return;
        }
        let mut state = self.state.lock();
        if !state.enabled || state.stop {
            return;
        }
        state.frames_fed += 1;
        let frame = state.frames_fed;
        for chunk in 0..count {
            let last = chunk + 1 == count;
            state.credits.push_back(Credit {
                first: chunk == 0,
                last,
                eos: eos && last,
                frame,
            });
        }
        self.ready.notify_all();
    }
}

fn run_worker(port: Arc<MockPort>, fed: Option<Arc<MockPort>>) {
    let mut state = port.state.lock();
    loop {
        if state.stop {
            break;
        }
        match port.next_job(&mut state) {
            Next::Run(job) => {
                state.busy += 1;
                let callback = state.callback.clone();
                MutexGuard::unlocked(&mut state, || {
                    let header = port.execute(job, fed.as_deref());
                    if let Some(callback) = callback {
                        callback(header);
                    }
                });
                state.busy -= 1;
                port.ready.notify_all();
            }
            Next::Wait(Some(deadline)) => {
                port.ready.wait_until(&mut state, deadline);
            }
            Next::Wait(None) => port.ready.wait(&mut state),
        }
    }
}

/// A component instantiated by [`MockDriver`].
pub struct MockComponent {
    id: u32,
    name: String,
    fail_control_enable: bool,
    journal: Journal,
    enabled: Mutex<bool>,
    ports: Vec<Arc<MockPort>>,
}

impl MockComponent {
    fn new(id: u32, name: &str, spec: MockComponentSpec, journal: Journal) -> Self {
        let fed: Vec<u32> = spec
            .inputs
            .iter()
            .filter_map(|input| input.feeds.map(|feed| feed.output))
            .collect();
        let mut ports = vec![Arc::new(MockPort::new(
            name,
            PortType::Control,
            0,
            MockPortSpec::new(Format::control()),
            false,
        ))];
        for (index, input) in spec.inputs.into_iter().enumerate() {
            ports.push(Arc::new(MockPort::new(name, PortType::Input, index as u32, input, false)));
        }
        for (index, output) in spec.outputs.into_iter().enumerate() {
            let index = index as u32;
            ports.push(Arc::new(MockPort::new(
                name,
                PortType::Output,
                index,
                output,
                fed.contains(&index),
            )));
        }
        for index in 0..spec.clocks {
            ports.push(Arc::new(MockPort::new(
                name,
                PortType::Clock,
                index as u32,
                MockPortSpec::new(Format::control()),
                false,
            )));
        }
        Self {
            id,
            name: name.to_string(),
            fail_control_enable: spec.fail_control_enable,
            journal,
            enabled: Mutex::new(false),
            ports,
        }
    }

    fn port(&self, address: PortAddress) -> Option<&Arc<MockPort>> {
        self.ports.iter().find(|port| port.address == address)
    }

    fn record(&self, event: MockEvent) {
        self.journal.lock().push(event);
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.lock()
    }

    /// Delivers an `MMAL_EVENT_ERROR` carrying `status` on the control port.
    ///
    /// Returns `false` if the control port is not enabled.
    pub fn raise_error(&self, status: Status) -> bool {
        let callback = {
            let state = self.ports[0].state.lock();
            if !state.enabled {
                return false;
            }
            state.callback.clone()
        };
        match callback {
            Some(callback) => {
                callback(BufferHeader::event(
                    mmal_sys::MMAL_EVENT_ERROR,
                    status.to_le_bytes().to_vec(),
                ));
                true
            }
            None => false,
        }
    }

    /// Returns the last value set for parameter `id` on `port`.
    pub fn parameter(&self, port: PortAddress, id: u32) -> Option<ParamValue> {
        self.port(port)?.state.lock().params.get(&id).cloned()
    }

    /// Returns the number of buffers `port` holds and has not completed yet.
    pub fn pending_buffers(&self, port: PortAddress) -> usize {
        self.port(port).map_or(0, |port| port.state.lock().pending.len())
    }
}

impl DriverComponent for MockComponent {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> Vec<PortInfo> {
        self.ports.iter().map(|port| port.info()).collect()
    }

    fn enable(&self) -> Status {
        *self.enabled.lock() = true;
        self.record(MockEvent::ComponentEnabled(self.name.clone()));
        mmal_sys::MMAL_SUCCESS
    }

    fn disable(&self) -> Status {
        *self.enabled.lock() = false;
        self.record(MockEvent::ComponentDisabled(self.name.clone()));
        mmal_sys::MMAL_SUCCESS
    }

    fn destroy(&self) -> Status {
        for port in &self.ports {
            if port.state.lock().enabled {
                self.port_disable(port.address);
            }
        }
        self.record(MockEvent::ComponentDestroyed(self.name.clone()));
        mmal_sys::MMAL_SUCCESS
    }

    fn port_format_commit(
        &self,
        address: PortAddress,
        format: &EsFormat,
    ) -> Result<BufferRequirements, Status> {
        let port = self.port(address).ok_or(mmal_sys::MMAL_EINVAL)?;
        if port.port_type == PortType::Control {
            return Ok(BufferRequirements::default());
        }
        if !port.spec.encodings.is_empty()
            && !port.spec.encodings.contains(&Encoding(format.encoding))
        {
            return Err(mmal_sys::MMAL_EINVAL);
        }
        if format.es_type != port.spec.format.as_raw().es_type {
            return Err(mmal_sys::MMAL_EINVAL);
        }
        let mut state = port.state.lock();
        if state.enabled {
            return Err(mmal_sys::MMAL_ENOTREADY);
        }
        state.format = format.clone();
        state.requirements = requirements(&port.spec, format);
        let requirements = state.requirements;
        drop(state);
        self.record(MockEvent::FormatCommitted(port.name.clone()));
        Ok(requirements)
    }

    fn port_enable(&self, address: PortAddress, callback: BufferCallback) -> Status {
        let Some(port) = self.port(address) else {
            return mmal_sys::MMAL_EINVAL;
        };
        if port.port_type == PortType::Control && self.fail_control_enable {
            return mmal_sys::MMAL_EIO;
        }
        {
            let mut state = port.state.lock();
            if state.enabled {
                return mmal_sys::MMAL_EINVAL;
            }
            state.enabled = true;
            state.stop = false;
            state.flushing = false;
            state.callback = Some(callback);
            state.finished = false;
            state.burst_frames = 0;
            state.zero_left = port.spec.zero_length_frames;
            state.next_frame_at = None;
            state.credits.clear();
        }

        if matches!(port.port_type, PortType::Input | PortType::Output) {
            let fed = port.spec.feeds.and_then(|feed| {
                self.port(PortAddress {
                    port_type: mmal_sys::MMAL_PORT_TYPE_OUTPUT,
                    index: feed.output,
                })
                .cloned()
            });
            let worker_port = port.clone();
            let spawned = thread::Builder::new()
                .name(format!("mock {}", port.name))
                .spawn(move || run_worker(worker_port, fed));
            match spawned {
                Ok(handle) => *port.worker.lock() = Some(handle),
                Err(err) => {
                    warn!(port = %port.name, error = %err, "Failed to spawn mock port worker");
                    let mut state = port.state.lock();
                    state.enabled = false;
                    state.callback = None;
                    return mmal_sys::MMAL_ENOMEM;
                }
            }
        }
        debug!(port = %port.name, "Mock port enabled");
        self.record(MockEvent::PortEnabled(port.name.clone()));
        mmal_sys::MMAL_SUCCESS
    }

    fn port_disable(&self, address: PortAddress) -> Status {
        let Some(port) = self.port(address) else {
            return mmal_sys::MMAL_EINVAL;
        };
        {
            let mut state = port.state.lock();
            if !state.enabled {
                return mmal_sys::MMAL_SUCCESS;
            }
            state.stop = true;
            port.ready.notify_all();
        }
        let handle = port.worker.lock().take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            warn!(port = %port.name, "Mock port worker panicked");
        }
        let (callback, returned) = {
            let mut state = port.state.lock();
            state.enabled = false;
            state.credits.clear();
            let returned: Vec<_> = state.pending.drain(..).collect();
            (state.callback.take(), returned)
        };
        if let Some(callback) = callback {
            for header in returned {
                callback(header);
            }
        }
        debug!(port = %port.name, "Mock port disabled");
        self.record(MockEvent::PortDisabled(port.name.clone()));
        mmal_sys::MMAL_SUCCESS
    }

    fn port_flush(&self, address: PortAddress) -> Status {
        let Some(port) = self.port(address) else {
            return mmal_sys::MMAL_EINVAL;
        };
        let (callback, returned) = {
            let mut state = port.state.lock();
            state.flushing = true;
            while state.busy > 0 {
                port.ready.wait(&mut state);
            }
            let returned: Vec<_> = state.pending.drain(..).collect();
            state.credits.clear();
            state.flushing = false;
            port.ready.notify_all();
            (state.callback.clone(), returned)
        };
        if let Some(callback) = callback {
            for header in returned {
                callback(header);
            }
        }
        self.record(MockEvent::PortFlushed(port.name.clone()));
        mmal_sys::MMAL_SUCCESS
    }

    fn port_send_buffer(&self, address: PortAddress, buffer: BufferHeader) -> Result<(), Rejected> {
        let Some(port) = self
            .port(address)
            .filter(|port| matches!(port.port_type, PortType::Input | PortType::Output))
        else {
            return Err(Rejected {
                status: mmal_sys::MMAL_EINVAL,
                buffer,
            });
        };
        let mut state = port.state.lock();
        if !state.enabled || state.stop || state.flushing {
            return Err(Rejected {
                status: mmal_sys::MMAL_ENOTREADY,
                buffer,
            });
        }
        state.pending.push_back(buffer);
        port.ready.notify_all();
        Ok(())
    }

    fn parameter_get(&self, address: PortAddress, id: u32) -> Result<ParamValue, Status> {
        let port = self.port(address).ok_or(mmal_sys::MMAL_EINVAL)?;
        if id == mmal_sys::MMAL_PARAMETER_SUPPORTED_ENCODINGS {
            let bytes = port
                .spec
                .encodings
                .iter()
                .flat_map(|encoding| encoding.0.to_le_bytes())
                .collect();
            return Ok(ParamValue::Bytes(bytes));
        }
        port.state
            .lock()
            .params
            .get(&id)
            .cloned()
            .ok_or(mmal_sys::MMAL_ENOENT)
    }

    fn parameter_set(&self, address: PortAddress, id: u32, value: &ParamValue) -> Status {
        let Some(port) = self.port(address) else {
            return mmal_sys::MMAL_EINVAL;
        };
        {
            let mut state = port.state.lock();
            if id == mmal_sys::MMAL_PARAMETER_CAPTURE {
                let ParamValue::Boolean(trigger) = value else {
                    return mmal_sys::MMAL_EINVAL;
                };
                state.triggered = *trigger;
                port.ready.notify_all();
            }
            state.params.insert(id, value.clone());
        }
        self.record(MockEvent::ParameterSet {
            port: port.name.clone(),
            id,
        });
        mmal_sys::MMAL_SUCCESS
    }
}

/// Software implementation of [`mmal_sys::Driver`].
///
/// [`MockDriver::with_defaults`] registers templates for the standard
/// component names (`vc.ril.camera`, `vc.ril.image_encode`, ...) plus
/// `mock.source` and `mock.sink`. Further templates can be added with
/// [`MockDriver::register`].
pub struct MockDriver {
    templates: Mutex<HashMap<String, MockComponentSpec>>,
    components: Mutex<Vec<Arc<MockComponent>>>,
    journal: Journal,
    next_id: AtomicU32,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// A driver without any registered component.
    pub fn new() -> Self {
        Self {
            templates: Mutex::new(HashMap::new()),
            components: Mutex::new(Vec::new()),
            journal: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU32::new(1),
        }
    }

    /// A driver with the standard templates registered.
    pub fn with_defaults() -> Self {
        let driver = Self::new();
        driver.register(mmal_sys::MMAL_COMPONENT_DEFAULT_CAMERA, MockComponentSpec::camera());
        driver.register(
            mmal_sys::MMAL_COMPONENT_DEFAULT_IMAGE_ENCODER,
            MockComponentSpec::image_encoder(),
        );
        driver.register(
            mmal_sys::MMAL_COMPONENT_DEFAULT_VIDEO_ENCODER,
            MockComponentSpec::video_encoder(),
        );
        driver.register(
            mmal_sys::MMAL_COMPONENT_DEFAULT_VIDEO_RENDERER,
            MockComponentSpec::renderer(raw_encodings()),
        );
        driver.register(
            mmal_sys::MMAL_COMPONENT_DEFAULT_NULL_SINK,
            MockComponentSpec::renderer(Vec::new()),
        );
        driver.register("mock.source", MockComponentSpec::source());
        driver.register("mock.sink", MockComponentSpec::sink());
        driver
    }

    /// Registers (or replaces) the template used for `name`.
    pub fn register(&self, name: impl Into<String>, spec: MockComponentSpec) {
        self.templates.lock().insert(name.into(), spec);
    }

    /// Returns a copy of the journal.
    pub fn events(&self) -> Vec<MockEvent> {
        self.journal.lock().clone()
    }

    pub fn clear_events(&self) {
        self.journal.lock().clear();
    }

    /// Returns the most recently created component named `name`.
    pub fn component(&self, name: &str) -> Option<Arc<MockComponent>> {
        self.components
            .lock()
            .iter()
            .rev()
            .find(|component| component.name == name)
            .cloned()
    }
}

impl Driver for MockDriver {
    fn create_component(&self, name: &str) -> Result<Arc<dyn DriverComponent>, Status> {
        let spec = self
            .templates
            .lock()
            .get(name)
            .cloned()
            .ok_or(mmal_sys::MMAL_ENOENT)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let component = Arc::new(MockComponent::new(id, name, spec, self.journal.clone()));
        self.components.lock().push(component.clone());
        self.journal
            .lock()
            .push(MockEvent::ComponentCreated(name.to_string()));
        debug!(component = name, id, "Mock component created");
        Ok(component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_sizes_follow_format() {
        let i420 = Format::video(Encoding::I420, 100, 50);
        assert_eq!(frame_size(i420.as_raw()), 128 * 64 * 3 / 2);
        let rgba = Format::video(Encoding::RGBA, 64, 64);
        assert_eq!(frame_size(rgba.as_raw()), 64 * 64 * 4);
        let jpeg = Format::video(Encoding::JPEG, 64, 64);
        assert_eq!(frame_size(jpeg.as_raw()), COMPRESSED_BUFFER_SIZE as usize);
        let opaque = Format::video(Encoding::OPAQUE, 1920, 1080);
        assert_eq!(frame_size(opaque.as_raw()), 128);
    }

    #[test]
    fn unknown_component_is_enoent() {
        let driver = MockDriver::new();
        assert_eq!(driver.create_component("nope").err(), Some(mmal_sys::MMAL_ENOENT));
    }

    #[test]
    fn port_layout_and_names() {
        let driver = MockDriver::with_defaults();
        let camera = driver
            .create_component(mmal_sys::MMAL_COMPONENT_DEFAULT_CAMERA)
            .unwrap();
        let names: Vec<_> = camera.ports().into_iter().map(|p| p.name).collect();
        assert_eq!(
            names,
            [
                "vc.ril.camera:ctr:0",
                "vc.ril.camera:out:0",
                "vc.ril.camera:out:1",
                "vc.ril.camera:out:2",
                "vc.ril.camera:clk:0",
            ]
        );
    }

    #[test]
    fn send_to_disabled_port_is_rejected() {
        let driver = MockDriver::with_defaults();
        let sink = driver.create_component("mock.sink").unwrap();
        let address = PortAddress {
            port_type: mmal_sys::MMAL_PORT_TYPE_INPUT,
            index: 0,
        };
        let rejected = sink
            .port_send_buffer(address, BufferHeader::with_capacity(1, 0, 16))
            .unwrap_err();
        assert_eq!(rejected.status, mmal_sys::MMAL_ENOTREADY);
        assert_eq!(rejected.buffer.capacity(), 16);
    }
}
