// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Pipeline integration tests: connections, the capture loop and the
//! still-capture state machine, all running on the mock driver.

use std::{sync::Arc, thread, time::Duration};

use mmal::{
    CaptureLoop, CaptureState, ConnectionFlags, Encoding, Error, Format, MmalInstance,
    StillCapture,
    config::CaptureSettings,
    mock::{MockComponentSpec, MockDriver, MockEvent, MockPortSpec},
    parameter,
};
use tracing::info;

/// Ensures logging is initialized only once across all tests.
static LOG_ONCE: std::sync::Once = std::sync::Once::new();

fn setup_test() -> (MmalInstance, Arc<MockDriver>) {
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
    driver.register(
        "counted.source",
        MockComponentSpec::new().with_output(
            MockPortSpec::new(Format::video(Encoding::I420, 64, 48))
                .buffers(1, 4)
                .frame_bytes(512)
                .eos_after(10),
        ),
    );
    driver.register("second.sink", MockComponentSpec::sink());
    (MmalInstance::new(driver.clone()), driver)
}

fn position(events: &[MockEvent], wanted: &MockEvent) -> usize {
    events
        .iter()
        .position(|event| event == wanted)
        .unwrap_or_else(|| panic!("{wanted:?} not in journal {events:?}"))
}

#[test]
fn copy_connection_runs_to_end_of_stream() {
    let (instance, driver) = setup_test();
    let source = instance.create_component("counted.source").unwrap();
    let sink = instance.create_component("mock.sink").unwrap();
    let output = source.output(0).unwrap();
    let input = sink.input(0).unwrap();

    let mut connection = instance
        .connect(input, output, ConnectionFlags::empty())
        .unwrap();
    assert!(output.is_connected() && input.is_connected());
    assert_eq!(input.format(), output.format());

    let pool = connection.create_pool(4, 1024).unwrap();
    connection.set_enabled(true).unwrap();
    assert!(matches!(output.set_enabled(false), Err(Error::InvalidState(_))));

    let mut acquired = 0;
    let stats = CaptureLoop::new(output, &pool)
        .forward_to(input)
        .run(|buffer| {
            acquired += 1;
            assert_eq!(buffer.length(), 512);
            Ok(())
        })
        .unwrap();
    assert_eq!(acquired, 10);
    assert_eq!(stats.buffers, 10);
    assert_eq!(stats.bytes, 10 * 512);
    assert!(stats.eos);

    connection.close().unwrap();
    assert!(!output.is_connected() && !input.is_connected());
    let pool_stats = pool.stats();
    assert_eq!(pool_stats.empty, 4, "{pool_stats:?}");

    let events = driver.events();
    let input_on = position(&events, &MockEvent::PortEnabled("mock.sink:in:0".to_string()));
    let output_on = position(&events, &MockEvent::PortEnabled("counted.source:out:0".to_string()));
    let output_off = position(&events, &MockEvent::PortDisabled("counted.source:out:0".to_string()));
    let input_off = position(&events, &MockEvent::PortDisabled("mock.sink:in:0".to_string()));
    assert!(input_on < output_on);
    assert!(output_off < input_off);
}

#[test]
fn connection_pool_is_created_on_enable() {
    let (instance, _driver) = setup_test();
    let source = instance.create_component("mock.source").unwrap();
    let sink = instance.create_component("mock.sink").unwrap();
    let mut connection = instance
        .connect(sink.input(0).unwrap(), source.output(0).unwrap(), ConnectionFlags::empty())
        .unwrap();
    assert!(connection.pool().is_none());

    connection.set_enabled(true).unwrap();
    let pool = connection.pool().unwrap().clone();
    assert_eq!(pool.capacity(), 4);
    assert_eq!(source.output(0).unwrap().pool().unwrap().id(), pool.id());
    assert_eq!(sink.input(0).unwrap().pool().unwrap().id(), pool.id());
    assert!(matches!(connection.create_pool(2, 64), Err(Error::InvalidState(_))));

    connection.set_enabled(false).unwrap();
    assert!(!source.output(0).unwrap().is_enabled());
    drop(connection);
    assert!(!sink.input(0).unwrap().is_connected());
}

#[test]
fn tunnelling_needs_pass_through() {
    let (instance, _driver) = setup_test();
    let source = instance.create_component("mock.source").unwrap();
    let sink = instance.create_component("mock.sink").unwrap();
    let input = sink.input(0).unwrap();
    let before = input.format();

    let result = instance.connect(input, source.output(0).unwrap(), ConnectionFlags::TUNNELLING);
    assert!(matches!(result, Err(Error::Unsupported(_))));
    assert!(!input.is_connected());
    assert!(!source.output(0).unwrap().is_connected());
    assert_eq!(input.format(), before);
}

#[test]
fn connecting_an_enabled_port_is_invalid_state() {
    let (instance, _driver) = setup_test();
    let source = instance.create_component("mock.source").unwrap();
    let sink = instance.create_component("mock.sink").unwrap();
    let output = source.output(0).unwrap();
    output.create_default_pool().unwrap();
    output.set_enabled(true).unwrap();

    let result = instance.connect(sink.input(0).unwrap(), output, ConnectionFlags::empty());
    assert!(matches!(result, Err(Error::InvalidState(_))));
    assert!(!sink.input(0).unwrap().is_connected());
    assert!(!output.is_connected());
    output.set_enabled(false).unwrap();
}

#[test]
fn connect_checks_port_roles() {
    let (instance, _driver) = setup_test();
    let source = instance.create_component("mock.source").unwrap();
    let sink = instance.create_component("mock.sink").unwrap();
    let other = instance.create_component("second.sink").unwrap();
    let encoder = instance
        .create_component(mmal_sys::MMAL_COMPONENT_DEFAULT_IMAGE_ENCODER)
        .unwrap();

    assert!(matches!(
        instance.connect(source.output(0).unwrap(), sink.input(0).unwrap(), ConnectionFlags::empty()),
        Err(Error::InvalidParameter(_))
    ));
    assert!(matches!(
        instance.connect(encoder.input(0).unwrap(), encoder.output(0).unwrap(), ConnectionFlags::empty()),
        Err(Error::InvalidParameter(_))
    ));

    let connection = instance
        .connect(sink.input(0).unwrap(), source.output(0).unwrap(), ConnectionFlags::empty())
        .unwrap();
    assert!(matches!(
        instance.connect(other.input(0).unwrap(), source.output(0).unwrap(), ConnectionFlags::empty()),
        Err(Error::AlreadyConnected)
    ));
    assert!(!other.input(0).unwrap().is_connected());

    // Connected ports block destruction until the connection is closed.
    assert!(matches!(sink.clone().destroy(), Err(Error::InvalidState(_))));
    connection.close().unwrap();
    sink.destroy().unwrap();
}

#[test]
fn enabled_connections_block_component_destruction() {
    let (instance, _driver) = setup_test();
    let source = instance.create_component("mock.source").unwrap();
    let sink = instance.create_component("mock.sink").unwrap();
    let mut connection = instance
        .connect(sink.input(0).unwrap(), source.output(0).unwrap(), ConnectionFlags::empty())
        .unwrap();
    connection.set_enabled(true).unwrap();

    assert!(matches!(sink.clone().destroy(), Err(Error::InvalidState(_))));
    assert!(matches!(source.clone().destroy(), Err(Error::InvalidState(_))));
    assert!(connection.is_enabled());

    // Components that survive a failed instance teardown stay registered.
    assert!(instance.clone().destroy().is_err());
    assert_eq!(instance.component_names(), ["mock.source", "mock.sink"]);
    assert_eq!(instance.create_component("mock.sink").unwrap(), sink);

    connection.set_enabled(false).unwrap();
    connection.close().unwrap();
    instance.clone().destroy().unwrap();
    assert!(instance.component_names().is_empty());
}

#[test]
fn keep_port_formats_leaves_the_input_alone() {
    let (instance, _driver) = setup_test();
    let camera = instance
        .create_component(mmal_sys::MMAL_COMPONENT_DEFAULT_CAMERA)
        .unwrap();
    let sink = instance.create_component("mock.sink").unwrap();
    let input = sink.input(0).unwrap();
    let before = (input.format(), input.buffer_num(), input.buffer_size());

    let connection = instance
        .connect(
            input,
            camera.output(1).unwrap(),
            ConnectionFlags::KEEP_PORT_FORMATS | ConnectionFlags::KEEP_BUFFER_REQUIREMENTS,
        )
        .unwrap();
    assert_eq!((input.format(), input.buffer_num(), input.buffer_size()), before);
    connection.close().unwrap();

    let connection = instance
        .connect(input, camera.output(1).unwrap(), ConnectionFlags::empty())
        .unwrap();
    assert_eq!(input.format(), camera.output(1).unwrap().format());
    assert_eq!(input.buffer_size(), camera.output(1).unwrap().buffer_size());
    connection.close().unwrap();
}

#[test]
fn tunnel_moves_buffers_without_the_caller() {
    let (instance, _driver) = setup_test();
    let camera = instance
        .create_component(mmal_sys::MMAL_COMPONENT_DEFAULT_CAMERA)
        .unwrap();
    let sink = instance
        .create_component(mmal_sys::MMAL_COMPONENT_DEFAULT_NULL_SINK)
        .unwrap();
    let preview = camera.output(0).unwrap();
    let mut connection = instance
        .connect(
            sink.input(0).unwrap(),
            preview,
            ConnectionFlags::TUNNELLING | ConnectionFlags::ALLOCATION_ON_INPUT,
        )
        .unwrap();
    assert!(connection.is_tunnelled());
    assert!(matches!(connection.create_pool(2, 64), Err(Error::InvalidState(_))));

    connection.set_enabled(true).unwrap();
    assert!(connection.pool().is_none());
    let hidden = preview.pool().unwrap();
    assert_eq!(hidden.stats().empty, 0);

    let stray = mmal::Pool::new(1, 64).unwrap();
    assert!(matches!(
        preview.send_buffer(stray.acquire_empty().unwrap()),
        Err(Error::InvalidState(_))
    ));

    thread::sleep(Duration::from_millis(150));
    let stats = hidden.stats();
    assert_eq!(stats.total(), stats.capacity);
    assert_eq!(stats.full, 0);
    info!(?stats, "Tunnel pool while streaming");

    connection.close().unwrap();
    assert_eq!(hidden.stats().empty, hidden.capacity());
}

#[test]
fn hardware_error_reaches_the_capture_loop() {
    let (instance, driver) = setup_test();
    let camera = instance
        .create_component(mmal_sys::MMAL_COMPONENT_DEFAULT_CAMERA)
        .unwrap();
    camera.set_enabled(true).unwrap();
    let capture = camera.output(2).unwrap();
    let pool = capture.create_default_pool().unwrap();
    capture.set_enabled(true).unwrap();

    let camera_driver = driver.component(mmal_sys::MMAL_COMPONENT_DEFAULT_CAMERA).unwrap();
    let injector = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        camera_driver.raise_error(mmal_sys::MMAL_ENOSPC)
    });
    let result = CaptureLoop::new(capture, &pool)
        .timeout(Duration::from_secs(5))
        .run(|_| Ok(()));
    assert!(injector.join().unwrap());
    assert!(matches!(result, Err(Error::ResourceExhausted)));

    capture.flush().unwrap();
    capture.set_enabled(false).unwrap();
    assert_eq!(pool.stats().empty, pool.capacity());
}

#[test]
fn sink_errors_stop_the_loop() {
    let (instance, _driver) = setup_test();
    let source = instance.create_component("counted.source").unwrap();
    let output = source.output(0).unwrap();
    let pool = output.create_pool(2, 1024).unwrap();
    output.set_enabled(true).unwrap();

    let mut seen = 0;
    let result = CaptureLoop::new(output, &pool).run(|_| {
        seen += 1;
        if seen == 3 {
            Err(Error::Other("disk full".to_string()))
        } else {
            Ok(())
        }
    });
    assert!(matches!(result, Err(Error::Other(_))));
    assert_eq!(seen, 3);
    assert_eq!(pool.stats().held, 0);
    output.set_enabled(false).unwrap();
}

#[test]
fn still_capture_with_encoder_produces_jpeg() {
    let (instance, driver) = setup_test();
    let mut capture = StillCapture::new(instance.clone(), CaptureSettings::default());

    let mut image = Vec::new();
    let stats = capture
        .capture_once(|buffer| {
            image.extend_from_slice(buffer.data());
            Ok(())
        })
        .unwrap();
    assert_eq!(capture.state(), CaptureState::TornDown);
    assert_eq!(stats.buffers, 2);
    assert_eq!(image.len(), 2 * 4096);
    assert_eq!(&image[..2], &[0xFF, 0xD8]);
    assert_eq!(&image[image.len() - 2..], &[0xFF, 0xD9]);
    assert!(instance.component_names().is_empty());

    let events = driver.events();
    position(
        &events,
        &MockEvent::ParameterSet {
            port: "vc.ril.camera:out:2".to_string(),
            id: parameter::CAPTURE,
        },
    );
    position(
        &events,
        &MockEvent::ParameterSet {
            port: "vc.ril.image_encode:out:0".to_string(),
            id: parameter::JPEG_Q_FACTOR,
        },
    );
    let preview_on = position(&events, &MockEvent::PortEnabled("vc.null_sink:in:0".to_string()));
    let capture_on = position(&events, &MockEvent::PortEnabled("vc.ril.image_encode:in:0".to_string()));
    assert!(preview_on < capture_on);

    let sink_gone = position(&events, &MockEvent::ComponentDestroyed("vc.null_sink".to_string()));
    let encoder_gone = position(
        &events,
        &MockEvent::ComponentDestroyed("vc.ril.image_encode".to_string()),
    );
    let camera_gone = position(&events, &MockEvent::ComponentDestroyed("vc.ril.camera".to_string()));
    assert!(sink_gone < encoder_gone && encoder_gone < camera_gone);
}

#[test]
fn still_capture_without_encoder_returns_raw_frame() {
    let (instance, _driver) = setup_test();
    let settings = CaptureSettings {
        width: 320,
        height: 240,
        raw_encoding: Encoding::RGB24,
        use_encoder: false,
        preview: true,
        ..Default::default()
    };
    let mut capture = StillCapture::new(instance.clone(), settings);
    capture.configure().unwrap();
    assert!(capture.encoder().is_none());
    assert_eq!(
        capture.output_port().unwrap().name(),
        "vc.ril.camera:out:2"
    );
    assert_eq!(
        instance.component_names(),
        ["vc.ril.camera", "vc.ril.video_render"]
    );

    capture.connect().unwrap();
    capture.start().unwrap();
    let stats = capture.capture(|_| Ok(())).unwrap();
    assert_eq!(capture.state(), CaptureState::Draining);
    assert_eq!(stats.buffers, 1);
    assert_eq!(stats.bytes, 320 * 240 * 3);

    capture.teardown().unwrap();
    assert!(instance.component_names().is_empty());
}

#[test]
fn still_capture_transitions_are_checked() {
    let (instance, _driver) = setup_test();
    let mut capture = StillCapture::new(instance.clone(), CaptureSettings::default());

    assert!(matches!(capture.connect(), Err(Error::InvalidState(_))));
    assert!(matches!(capture.capture(|_| Ok(())), Err(Error::InvalidState(_))));
    assert_eq!(capture.state(), CaptureState::Idle);

    capture.configure().unwrap();
    assert!(matches!(capture.configure(), Err(Error::InvalidState(_))));
    assert!(matches!(capture.start(), Err(Error::InvalidState(_))));
    assert_eq!(capture.state(), CaptureState::Configured);

    capture.connect().unwrap();
    capture.start().unwrap();
    capture.stop().unwrap();
    assert_eq!(capture.state(), CaptureState::Connected);
    let camera = capture.camera().unwrap().clone();
    assert!(!camera
        .output(2)
        .unwrap()
        .get_parameter_bool(parameter::CAPTURE)
        .unwrap());

    capture.teardown().unwrap();
    capture.teardown().unwrap();
    assert_eq!(capture.state(), CaptureState::TornDown);
    assert!(instance.component_names().is_empty());
}

#[test]
fn still_capture_rejects_invalid_settings() {
    let (instance, _driver) = setup_test();
    let settings = CaptureSettings {
        quality: 0,
        ..Default::default()
    };
    let mut capture = StillCapture::new(instance.clone(), settings);
    assert!(matches!(capture.configure(), Err(Error::InvalidParameter(_))));
    assert_eq!(capture.state(), CaptureState::Idle);
    assert!(instance.component_names().is_empty());
}

#[test]
fn failed_configure_can_be_retried() {
    let (instance, driver) = setup_test();
    // A camera without the still capture port.
    driver.register(mmal_sys::MMAL_COMPONENT_DEFAULT_CAMERA, MockComponentSpec::source());
    let mut capture = StillCapture::new(instance.clone(), CaptureSettings::default());

    for _ in 0..2 {
        assert!(matches!(capture.configure(), Err(Error::InvalidParameter(_))));
        assert_eq!(capture.state(), CaptureState::Idle);
        assert!(capture.camera().is_none());
        assert!(instance.component_names().is_empty());
    }

    driver.register(mmal_sys::MMAL_COMPONENT_DEFAULT_CAMERA, MockComponentSpec::camera());
    capture.configure().unwrap();
    assert_eq!(capture.state(), CaptureState::Configured);
    capture.teardown().unwrap();
    assert!(instance.component_names().is_empty());
}

#[test]
fn failed_connect_disables_the_components() {
    let (instance, driver) = setup_test();
    // A preview sink that cannot take a tunnel.
    driver.register(mmal_sys::MMAL_COMPONENT_DEFAULT_NULL_SINK, MockComponentSpec::sink());
    let mut capture = StillCapture::new(instance.clone(), CaptureSettings::default());
    capture.configure().unwrap();

    assert!(matches!(capture.connect(), Err(Error::Unsupported(_))));
    assert_eq!(capture.state(), CaptureState::Configured);
    let names = instance.component_names();
    assert_eq!(names.len(), 3);
    for name in &names {
        let component = instance.component(name).unwrap();
        assert!(!component.is_enabled(), "{name} left enabled");
        assert!(!driver.component(name).unwrap().is_enabled());
    }
    assert!(!capture.camera().unwrap().output(0).unwrap().is_connected());

    capture.teardown().unwrap();
    assert!(instance.component_names().is_empty());
}

#[test]
fn dropping_a_still_capture_tears_it_down() {
    let (instance, _driver) = setup_test();
    {
        let mut capture = StillCapture::new(instance.clone(), CaptureSettings::default());
        capture.configure().unwrap();
        capture.connect().unwrap();
        capture.start().unwrap();
    }
    assert!(instance.component_names().is_empty());
}
