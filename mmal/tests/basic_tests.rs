// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Basic integration tests for the MMAL pipeline engine.
//!
//! These tests exercise components, ports and pools on their own, without
//! connections. Every test builds an isolated engine instance on top of a
//! fresh mock driver.
//!
//! # Test Coverage
//!
//! - Component creation, lookup and destruction
//! - Format staging, commit and buffer sizing
//! - Port enable/disable and buffer exchange
//! - Pool accounting and limits
//! - Parameters

use std::{sync::Arc, thread, time::Duration};

use mmal::{
    ComponentState, Encoding, Error, Format, MmalInstance, Pool, PortType,
    mock::{MockComponentSpec, MockDriver, MockEvent, MockPortSpec},
    parameter,
};
use tracing::info;

/// Ensures logging is initialized only once across all tests.
static LOG_ONCE: std::sync::Once = std::sync::Once::new();

const CAMERA: &str = mmal_sys::MMAL_COMPONENT_DEFAULT_CAMERA;

/// Sets up a test by initializing logging and creating an engine on a mock driver.
///
/// Returns the instance together with the driver so tests can inspect the
/// driver journal.
fn setup_test() -> (MmalInstance, Arc<MockDriver>) {
    // Initialize logging once (respects RUST_LOG environment variable)
    LOG_ONCE.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::builder()
                    .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .init();
    });

    let driver = Arc::new(MockDriver::with_defaults());
    (MmalInstance::new(driver.clone()), driver)
}

#[test]
fn component_creation_is_idempotent() {
    let (instance, _driver) = setup_test();
    let sink = instance.create_component("mock.sink").unwrap();
    let again = instance.create_component("mock.sink").unwrap();
    assert_eq!(sink, again);
    assert_eq!(instance.component_names(), ["mock.sink"]);
    assert_eq!(instance.component("mock.sink"), Some(sink.clone()));

    sink.destroy().unwrap();
    assert!(instance.component_names().is_empty());
    let fresh = instance.create_component("mock.sink").unwrap();
    assert_ne!(fresh, again);
    instance.destroy().unwrap();
}

#[test]
fn unknown_component_is_not_found() {
    let (instance, _driver) = setup_test();
    assert!(matches!(
        instance.create_component("vc.does_not_exist"),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn camera_port_layout() {
    let (instance, _driver) = setup_test();
    let camera = instance.create_component(CAMERA).unwrap();
    assert_eq!(camera.control().port_type(), PortType::Control);
    assert!(camera.inputs().is_empty());
    assert_eq!(camera.outputs().len(), 3);
    assert_eq!(camera.clocks().len(), 1);
    assert_eq!(camera.output(2).unwrap().name(), "vc.ril.camera:out:2");
    assert!(matches!(camera.output(3), Err(Error::InvalidParameter(_))));
    assert!(matches!(camera.input(0), Err(Error::InvalidParameter(_))));
}

#[test]
fn destroying_twice_is_out_of_order() {
    let (instance, _driver) = setup_test();
    let sink = instance.create_component("mock.sink").unwrap();
    let stale = sink.clone();
    sink.destroy().unwrap();
    assert_eq!(stale.state(), ComponentState::Destroyed);
    assert!(matches!(stale.clone().destroy(), Err(Error::OutOfOrder(_))));

    // Every other use of a stale handle fails at runtime.
    assert!(matches!(stale.set_enabled(true), Err(Error::InvalidState(_))));
    let input = stale.input(0).unwrap();
    assert!(matches!(
        input.set_format(Format::video(Encoding::I420, 64, 48)),
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(input.create_pool(1, 64), Err(Error::InvalidState(_))));
}

#[test]
fn destroying_with_an_enabled_port_is_invalid_state() {
    let (instance, _driver) = setup_test();
    let source = instance.create_component("mock.source").unwrap();
    let output = source.output(0).unwrap();
    output.create_default_pool().unwrap();
    output.set_enabled(true).unwrap();

    assert!(matches!(source.clone().destroy(), Err(Error::InvalidState(_))));
    assert_ne!(source.state(), ComponentState::Destroyed);

    output.set_enabled(false).unwrap();
    source.destroy().unwrap();
}

#[test]
fn enabling_is_atomic() {
    let (instance, driver) = setup_test();
    driver.register("broken", MockComponentSpec::new().fail_control_enable());
    let broken = instance.create_component("broken").unwrap();

    assert!(broken.set_enabled(true).is_err());
    assert_eq!(broken.state(), ComponentState::Created);
    assert!(!broken.control().is_enabled());
    assert!(!driver.component("broken").unwrap().is_enabled());

    let events = driver.events();
    let enabled = events
        .iter()
        .position(|e| *e == MockEvent::ComponentEnabled("broken".to_string()))
        .unwrap();
    let disabled = events
        .iter()
        .position(|e| *e == MockEvent::ComponentDisabled("broken".to_string()))
        .unwrap();
    assert!(enabled < disabled);
}

#[test]
fn component_enable_toggles_control_port() {
    let (instance, _driver) = setup_test();
    let camera = instance.create_component(CAMERA).unwrap();
    camera.set_enabled(true).unwrap();
    assert!(camera.is_enabled());
    assert!(camera.control().is_enabled());
    camera.set_enabled(true).unwrap();

    camera.set_enabled(false).unwrap();
    assert_eq!(camera.state(), ComponentState::Disabled);
    assert!(!camera.control().is_enabled());
}

#[test]
fn format_commit_is_idempotent() {
    let (instance, _driver) = setup_test();
    let camera = instance.create_component(CAMERA).unwrap();
    let port = camera.output(2).unwrap();

    port.set_format(Format::video(Encoding::I420, 1280, 720)).unwrap();
    assert!(port.pending_format().is_some());
    port.commit_format_change().unwrap();
    assert!(port.pending_format().is_none());
    let first = (port.buffer_num(), port.buffer_size());
    assert_eq!(first.1, 1280 * 720 * 3 / 2);

    port.commit_format_change().unwrap();
    assert_eq!((port.buffer_num(), port.buffer_size()), first);
    assert_eq!(port.format().video_params().unwrap().width, 1280);
}

#[test]
fn unsupported_encoding_keeps_committed_format() {
    let (instance, _driver) = setup_test();
    let camera = instance.create_component(CAMERA).unwrap();
    let port = camera.output(0).unwrap();
    let before = port.format();

    port.set_format(Format::video(Encoding::JPEG, 640, 480)).unwrap();
    assert!(matches!(port.commit_format_change(), Err(Error::Unsupported(_))));
    assert_eq!(port.format(), before);

    port.set_format(Format::video(Encoding::I420, 0, 480)).unwrap();
    assert!(matches!(
        port.commit_format_change(),
        Err(Error::InvalidParameter(_))
    ));
    assert_eq!(port.format(), before);
}

#[test]
fn pending_format_blocks_enable() {
    let (instance, _driver) = setup_test();
    let sink = instance.create_component("mock.sink").unwrap();
    let input = sink.input(0).unwrap();
    input.set_format(Format::video(Encoding::I420, 32, 32)).unwrap();
    assert!(matches!(input.set_enabled(true), Err(Error::InvalidState(_))));

    input.commit_format_change().unwrap();
    input.set_enabled(true).unwrap();
    assert!(matches!(
        input.set_format(Format::video(Encoding::I420, 64, 64)),
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(input.set_enabled(true), Err(Error::InvalidState(_))));
    input.set_enabled(false).unwrap();
    input.set_enabled(false).unwrap();
}

#[test]
fn buffer_sizing_respects_minimums() {
    let (instance, _driver) = setup_test();
    let sink = instance.create_component("mock.sink").unwrap();
    let input = sink.input(0).unwrap();
    let requirements = input.buffer_requirements();
    assert_eq!(input.buffer_num(), requirements.num_recommended);

    assert!(matches!(input.set_buffer_num(0), Err(Error::InvalidParameter(_))));
    assert!(matches!(
        input.set_buffer_size(requirements.size_min - 1),
        Err(Error::InvalidParameter(_))
    ));
    input.set_buffer_num(6).unwrap();
    input.set_buffer_size(requirements.size_min * 2).unwrap();

    let pool = input.create_default_pool().unwrap();
    assert_eq!(pool.capacity(), 6);
    assert_eq!(pool.payload_size(), requirements.size_min as usize * 2);
}

#[test]
fn output_port_round_trip() {
    let (instance, _driver) = setup_test();
    let source = instance.create_component("mock.source").unwrap();
    let output = source.output(0).unwrap();
    let pool = output.create_pool(2, 1024).unwrap();
    output.set_enabled(true).unwrap();

    for _ in 0..5 {
        output.send_buffer(pool.acquire_empty().unwrap()).unwrap();
        let frame = pool.acquire_full().unwrap();
        assert_eq!(frame.length(), 512);
        assert!(frame.pts().is_some());
        assert!(!frame.is_eos());
        let stats = pool.stats();
        assert_eq!(stats.total(), 2);
        assert_eq!(stats.held, 1);
        frame.release();
    }

    output.set_enabled(false).unwrap();
    let stats = pool.stats();
    assert_eq!((stats.empty, stats.held, stats.in_flight), (2, 0, 0));
    info!(?stats, "Pool after round trip");
}

#[test]
fn acquisition_fails_closed_on_unready_ports() {
    let (instance, _driver) = setup_test();
    let source = instance.create_component("mock.source").unwrap();
    let output = source.output(0).unwrap();
    let pool = output.create_pool(2, 1024).unwrap();

    let buffer = pool.acquire_empty().unwrap();
    assert!(matches!(output.send_buffer(buffer), Err(Error::InvalidState(_))));
    assert_eq!(pool.stats().empty, 2);
    assert!(matches!(pool.acquire_full(), Err(Error::InvalidState(_))));
    assert!(matches!(pool.try_acquire_full(), Err(Error::InvalidState(_))));
}

#[test]
fn foreign_buffers_are_rejected() {
    let (instance, _driver) = setup_test();
    let source = instance.create_component("mock.source").unwrap();
    let output = source.output(0).unwrap();
    let pool = output.create_pool(2, 1024).unwrap();
    output.set_enabled(true).unwrap();

    let other = Pool::new(1, 1024).unwrap();
    let stranger = other.acquire_empty().unwrap();
    assert!(matches!(output.send_buffer(stranger), Err(Error::InvalidParameter(_))));
    assert_eq!(other.stats().empty, 1);

    let stranger = other.acquire_empty().unwrap();
    assert!(matches!(pool.release(stranger), Err(Error::InvalidParameter(_))));
    assert_eq!(other.stats().empty, 1);
    output.set_enabled(false).unwrap();
}

#[test]
fn pools_refuse_oversized_and_busy_resizes() {
    let (_instance, _driver) = setup_test();
    assert!(matches!(
        Pool::new(1024, 1024 * 1024),
        Err(Error::ResourceExhausted)
    ));
    assert!(matches!(Pool::new(0, 16), Err(Error::InvalidParameter(_))));

    let pool = Pool::new(2, 16).unwrap();
    let held = pool.acquire_empty().unwrap();
    assert!(matches!(pool.resize(4, 16), Err(Error::InvalidState(_))));
    drop(held);
    pool.resize(4, 32).unwrap();
    assert_eq!((pool.capacity(), pool.payload_size()), (4, 32));
    assert_eq!(pool.acquire_empty().unwrap().capacity(), 32);
}

#[test]
fn untriggered_capture_port_times_out() {
    let (instance, _driver) = setup_test();
    let camera = instance.create_component(CAMERA).unwrap();
    let capture = camera.output(2).unwrap();
    let pool = capture.create_default_pool().unwrap();
    capture.set_enabled(true).unwrap();

    capture.send_buffer(pool.acquire_empty().unwrap()).unwrap();
    assert!(matches!(
        pool.acquire_full_timeout(Duration::from_millis(100)),
        Err(Error::Timeout)
    ));

    capture.set_parameter_bool(parameter::CAPTURE, true).unwrap();
    let frame = pool.acquire_full_timeout(Duration::from_secs(5)).unwrap();
    assert!(frame.is_eos());
    assert_eq!(frame.length(), 640 * 480 * 3 / 2);
    assert!(!capture.get_parameter_bool(parameter::CAPTURE).unwrap());
    frame.release();
    capture.set_enabled(false).unwrap();
}

#[test]
fn flush_wakes_blocked_acquire() {
    let (instance, _driver) = setup_test();
    let camera = instance.create_component(CAMERA).unwrap();
    let capture = camera.output(2).unwrap();
    let pool = capture.create_default_pool().unwrap();
    capture.set_enabled(true).unwrap();
    capture.send_buffer(pool.acquire_empty().unwrap()).unwrap();

    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || pool.acquire_full_timeout(Duration::from_secs(5)).map(|_| ()))
    };
    thread::sleep(Duration::from_millis(200));
    capture.flush().unwrap();
    assert!(matches!(waiter.join().unwrap(), Err(Error::Aborted)));
    assert_eq!(pool.stats().empty, pool.capacity());

    capture.send_buffer(pool.acquire_empty().unwrap()).unwrap();
    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || pool.acquire_full_timeout(Duration::from_secs(5)).map(|_| ()))
    };
    thread::sleep(Duration::from_millis(200));
    capture.set_enabled(false).unwrap();
    assert!(matches!(waiter.join().unwrap(), Err(Error::Aborted)));
    assert_eq!(pool.stats().empty, pool.capacity());
}

#[test]
fn zero_length_frames_are_delivered_as_empty() {
    let (instance, driver) = setup_test();
    driver.register(
        "flaky.source",
        MockComponentSpec::new().with_output(
            MockPortSpec::new(Format::video(Encoding::I420, 64, 48))
                .frame_bytes(64)
                .zero_length_frames(1),
        ),
    );
    let source = instance.create_component("flaky.source").unwrap();
    let output = source.output(0).unwrap();
    let pool = output.create_pool(1, 128).unwrap();
    output.set_enabled(true).unwrap();

    output.send_buffer(pool.acquire_empty().unwrap()).unwrap();
    let first = pool.acquire_full().unwrap();
    assert!(first.is_empty());
    assert!(!first.is_eos());
    first.release();

    output.send_buffer(pool.acquire_empty().unwrap()).unwrap();
    assert_eq!(pool.acquire_full().unwrap().length(), 64);
    output.set_enabled(false).unwrap();
}

#[test]
fn parameters_are_typed() {
    let (instance, driver) = setup_test();
    let camera = instance.create_component(CAMERA).unwrap();
    let control = camera.control();

    control.set_parameter_i32(parameter::CAMERA_NUM, 1).unwrap();
    assert_eq!(control.get_parameter_i32(parameter::CAMERA_NUM).unwrap(), 1);
    assert!(matches!(
        control.get_parameter_bool(parameter::CAMERA_NUM),
        Err(Error::InvalidParameter(_))
    ));
    assert!(matches!(
        control.get_parameter(parameter::ROTATION),
        Err(Error::NotFound(_))
    ));
    assert!(driver.events().contains(&MockEvent::ParameterSet {
        port: "vc.ril.camera:ctr:0".to_string(),
        id: parameter::CAMERA_NUM,
    }));

    let rate = mmal::Rational { num: 30, den: 1 };
    let video = camera.output(1).unwrap();
    video.set_parameter_rational(parameter::FRAME_RATE, rate).unwrap();
    assert_eq!(video.get_parameter_rational(parameter::FRAME_RATE).unwrap(), rate);

    match video.get_parameter(parameter::SUPPORTED_ENCODINGS).unwrap() {
        parameter::ParamValue::Bytes(bytes) => {
            let encodings: Vec<_> = bytes
                .chunks_exact(4)
                .map(|code| Encoding(u32::from_le_bytes([code[0], code[1], code[2], code[3]])))
                .collect();
            assert_eq!(encodings, video.supported_encodings());
        }
        other => panic!("unexpected payload {other:?}"),
    }
}

#[test]
fn hardware_error_surfaces_until_flushed() {
    let (instance, driver) = setup_test();
    let source = instance.create_component("mock.source").unwrap();
    source.set_enabled(true).unwrap();
    let output = source.output(0).unwrap();
    let pool = output.create_pool(2, 1024).unwrap();
    output.set_enabled(true).unwrap();

    assert!(driver.component("mock.source").unwrap().raise_error(mmal_sys::MMAL_EIO));
    assert!(matches!(pool.acquire_full(), Err(Error::Driver(mmal_sys::MMAL_EIO))));
    assert!(matches!(
        output.send_buffer(pool.acquire_empty().unwrap()),
        Err(Error::Driver(mmal_sys::MMAL_EIO))
    ));
    assert_eq!(pool.stats().empty, 2);

    output.flush().unwrap();
    output.send_buffer(pool.acquire_empty().unwrap()).unwrap();
    assert_eq!(pool.acquire_full().unwrap().length(), 512);
    output.set_enabled(false).unwrap();
}

#[test]
fn sample_settings_file_loads() {
    let (_instance, _driver) = setup_test();
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/examples/capture.json");
    let settings = mmal::config::CaptureSettings::from_path(path).unwrap();
    assert_eq!((settings.width, settings.height), (1280, 720));
    assert_eq!(settings.encoding, Encoding::JPEG);
    assert!(settings.preview);

    assert!(matches!(
        mmal::config::CaptureSettings::from_path("/nonexistent/capture.json"),
        Err(Error::Io(_))
    ));
}
