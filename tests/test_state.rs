// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod common;

use common::wait_until;
use edgefirst_evs::{
    camera::CameraEnumerator,
    config::{CameraInfo, Config, ViewMap},
    display::{Display, DisplayState, TargetBuffer},
    image::{self, Image},
    render::RendererKind,
    sim::{ScriptedVehicle, SimDisplay, SimEnumerator},
    state::{Command, StateController, ViewState},
    vehicle::{Gear, StatusCode, TurnSignal},
    Error as EvsError,
};
use serial_test::serial;
use std::{
    error::Error,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

const TIMEOUT: Duration = Duration::from_secs(10);

fn config(cameras: &[(&str, &str)]) -> Config {
    Config {
        cameras: cameras
            .iter()
            .map(|(id, function)| CameraInfo {
                camera_id: id.to_string(),
                function: function.to_string(),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

fn sim_cameras(ids: &[&str]) -> Arc<SimEnumerator> {
    Arc::new(SimEnumerator::new(ids.iter().copied(), 100).with_resolution(64, 48))
}

#[test]
fn test_vehicle_sequence_selects_views() -> Result<(), Box<dyn Error>> {
    let vehicle = Arc::new(ScriptedVehicle::new(Gear::Park, TurnSignal::None));
    let mut controller = StateController::with_views(
        vehicle.clone(),
        sim_cameras(&[]),
        Arc::new(SimDisplay::new(64, 48)),
        || true,
        ViewMap::default(),
    );

    let sequence = [
        ((Gear::Park, TurnSignal::None), ViewState::Parking),
        ((Gear::Reverse, TurnSignal::None), ViewState::Reverse),
        ((Gear::Drive, TurnSignal::Left), ViewState::Left),
        ((Gear::Drive, TurnSignal::None), ViewState::Off),
        ((Gear::Reverse, TurnSignal::Left), ViewState::Reverse),
        ((Gear::Park, TurnSignal::Right), ViewState::Right),
    ];
    for ((gear, signal), expected) in sequence {
        vehicle.set(gear, signal);
        assert_eq!(controller.select_state_for_current_conditions()?, expected);
        assert_eq!(controller.current_state(), expected);
        // No cameras are mapped, so nothing is ever rendered.
        assert_eq!(controller.current_renderer_kind(), None);
    }
    Ok(())
}

#[test]
fn test_parking_with_three_cameras_uses_top_view() -> Result<(), Box<dyn Error>> {
    let cameras = sim_cameras(&["cam0", "cam1", "cam2"]);
    let display = Arc::new(SimDisplay::new(64, 48));
    let mut controller = StateController::new(
        Arc::new(ScriptedVehicle::new(Gear::Park, TurnSignal::None)),
        cameras.clone(),
        display.clone(),
        || true,
        &config(&[("cam0", "park"), ("cam1", "park"), ("cam2", "park")]),
    )?;
    assert_eq!(controller.views().cameras(ViewState::Parking).len(), 3);

    controller.configure_view(ViewState::Parking)?;
    assert_eq!(controller.current_state(), ViewState::Parking);
    assert_eq!(controller.current_renderer_kind(), Some(RendererKind::TopView));
    assert_eq!(cameras.open_cameras().len(), 3);
    assert_eq!(display.state(), DisplayState::VisibleOnNextFrame);

    controller.configure_view(ViewState::Off)?;
    assert_eq!(controller.current_renderer_kind(), None);
    assert!(cameras.open_cameras().is_empty());
    assert_eq!(display.state(), DisplayState::NotVisible);
    Ok(())
}

#[test]
fn test_single_parking_camera_still_uses_top_view() -> Result<(), Box<dyn Error>> {
    let mut controller = StateController::new(
        Arc::new(ScriptedVehicle::new(Gear::Park, TurnSignal::None)),
        sim_cameras(&["rear"]),
        Arc::new(SimDisplay::new(64, 48)),
        || true,
        &config(&[("rear", "reverse,park")]),
    )?;
    controller.configure_view(ViewState::Parking)?;
    assert_eq!(controller.current_renderer_kind(), Some(RendererKind::TopView));
    Ok(())
}

#[test]
fn test_reverse_renderer_depends_on_gpu() -> Result<(), Box<dyn Error>> {
    for (gpu, expected) in [
        (true, RendererKind::DirectView),
        (false, RendererKind::PixelCopy),
    ] {
        let cameras = sim_cameras(&["rear"]);
        let mut controller = StateController::new(
            Arc::new(ScriptedVehicle::new(Gear::Reverse, TurnSignal::None)),
            cameras.clone(),
            Arc::new(SimDisplay::new(64, 48)),
            move || gpu,
            &config(&[("rear", "reverse")]),
        )?;
        controller.configure_view(ViewState::Reverse)?;
        assert_eq!(controller.current_renderer_kind(), Some(expected));
        assert_eq!(cameras.open_cameras().len(), 1);
    }
    Ok(())
}

#[test]
fn test_unmapped_view_turns_display_off() -> Result<(), Box<dyn Error>> {
    let display = Arc::new(SimDisplay::new(64, 48));
    let mut controller = StateController::new(
        Arc::new(ScriptedVehicle::new(Gear::Drive, TurnSignal::Left)),
        sim_cameras(&["rear"]),
        display.clone(),
        || true,
        &config(&[("rear", "reverse")]),
    )?;
    controller.configure_view(ViewState::Reverse)?;
    controller.configure_view(ViewState::Left)?;
    assert_eq!(controller.current_state(), ViewState::Left);
    assert_eq!(controller.current_renderer_kind(), None);
    assert_eq!(display.state(), DisplayState::NotVisible);
    Ok(())
}

#[test]
fn test_gpu_readiness_is_latched() -> Result<(), Box<dyn Error>> {
    let ready = Arc::new(AtomicBool::new(false));
    let probe = {
        let ready = ready.clone();
        move || ready.load(Ordering::SeqCst)
    };
    let mut controller = StateController::new(
        Arc::new(ScriptedVehicle::new(Gear::Reverse, TurnSignal::None)),
        sim_cameras(&["rear"]),
        Arc::new(SimDisplay::new(64, 48)),
        probe,
        &config(&[("rear", "reverse")]),
    )?;

    controller.configure_view(ViewState::Reverse)?;
    assert_eq!(controller.current_renderer_kind(), Some(RendererKind::PixelCopy));

    ready.store(true, Ordering::SeqCst);
    controller.configure_view(ViewState::Off)?;
    controller.configure_view(ViewState::Reverse)?;
    assert_eq!(controller.current_renderer_kind(), Some(RendererKind::DirectView));

    ready.store(false, Ordering::SeqCst);
    controller.configure_view(ViewState::Off)?;
    controller.configure_view(ViewState::Reverse)?;
    assert_eq!(controller.current_renderer_kind(), Some(RendererKind::DirectView));
    Ok(())
}

#[test]
fn test_activation_failure_is_not_fatal() -> Result<(), Box<dyn Error>> {
    let cameras = sim_cameras(&["rear"]);
    let display = Arc::new(SimDisplay::new(64, 48));
    let vehicle = Arc::new(ScriptedVehicle::new(Gear::Reverse, TurnSignal::None));
    let mut controller = StateController::new(
        vehicle.clone(),
        cameras.clone(),
        display.clone(),
        || true,
        &config(&[("rear", "reverse")]),
    )?;

    // Somebody else owns the camera.
    let squatter = cameras.open_camera("rear", None)?;
    let desired = controller.select_state_for_current_conditions()?;
    assert_eq!(desired, ViewState::Reverse);
    assert_eq!(controller.current_state(), ViewState::Reverse);
    assert_eq!(controller.current_renderer_kind(), None);
    assert_eq!(display.state(), DisplayState::NotVisible);

    let err = controller.configure_view(ViewState::Off).and_then(|_| {
        controller.configure_view(ViewState::Reverse)
    });
    assert!(matches!(err, Err(EvsError::Camera(_))));

    cameras.close_camera(squatter);
    vehicle.set(Gear::Drive, TurnSignal::None);
    controller.select_state_for_current_conditions()?;
    vehicle.set(Gear::Reverse, TurnSignal::None);
    controller.select_state_for_current_conditions()?;
    assert_eq!(controller.current_renderer_kind(), Some(RendererKind::DirectView));
    Ok(())
}

#[test]
fn test_turn_signal_failure_is_latched() -> Result<(), Box<dyn Error>> {
    let vehicle = Arc::new(ScriptedVehicle::new(Gear::Drive, TurnSignal::None));
    vehicle.fail_turn_signal(StatusCode::NotAvailable);
    let mut controller = StateController::with_views(
        vehicle.clone(),
        sim_cameras(&[]),
        Arc::new(SimDisplay::new(64, 48)),
        || true,
        ViewMap::default(),
    );

    assert_eq!(controller.select_state_for_current_conditions()?, ViewState::Off);
    vehicle.set(Gear::Drive, TurnSignal::Left);
    assert_eq!(controller.select_state_for_current_conditions()?, ViewState::Off);
    assert_eq!(controller.select_state_for_current_conditions()?, ViewState::Off);
    assert_eq!(vehicle.turn_signal_reads(), 1);

    // Gear still drives the view.
    vehicle.set(Gear::Reverse, TurnSignal::None);
    assert_eq!(controller.select_state_for_current_conditions()?, ViewState::Reverse);
    Ok(())
}

#[test]
fn test_gear_failure_is_fatal() -> Result<(), Box<dyn Error>> {
    let vehicle = Arc::new(ScriptedVehicle::new(Gear::Drive, TurnSignal::None));
    vehicle.fail_gear(StatusCode::TryAgain);
    let mut controller = StateController::with_views(
        vehicle,
        sim_cameras(&[]),
        Arc::new(SimDisplay::new(64, 48)),
        || true,
        ViewMap::default(),
    );
    let err = controller
        .select_state_for_current_conditions()
        .expect_err("gear read should fail");
    assert!(err.is_fatal());
    assert!(controller.run().is_err());
    Ok(())
}

#[test]
#[serial]
fn test_exit_while_idle() -> Result<(), Box<dyn Error>> {
    let controller = StateController::with_views(
        Arc::new(ScriptedVehicle::new(Gear::Drive, TurnSignal::None)),
        sim_cameras(&[]),
        Arc::new(SimDisplay::new(64, 48)),
        || true,
        ViewMap::default(),
    );
    let commands = controller.command_sender();
    let handle = controller.start_update_loop()?;

    std::thread::sleep(Duration::from_millis(50));
    assert!(!handle.is_finished());
    assert!(commands.post_command(Command::CheckVehicleState));
    assert!(commands.post_command(Command::TouchEvent { x: 10, y: 20 }));
    assert!(commands.post_command(Command::Exit));

    assert!(wait_until(Duration::from_secs(1), || handle.is_finished()));
    handle.join().expect("control loop panicked")?;
    assert!(!commands.post_command(Command::CheckVehicleState));
    Ok(())
}

#[test]
#[serial]
fn test_render_loop_end_to_end() -> Result<(), Box<dyn Error>> {
    let cameras = sim_cameras(&["rear"]);
    let display = Arc::new(SimDisplay::new(64, 48));
    let vehicle = Arc::new(ScriptedVehicle::new(Gear::Reverse, TurnSignal::None));
    let controller = StateController::new(
        vehicle.clone(),
        cameras.clone(),
        display.clone(),
        || true,
        &config(&[("rear", "reverse")]),
    )?;
    let commands = controller.command_sender();
    let handle = controller.start_update_loop()?;

    assert!(wait_until(TIMEOUT, || display.frames_shown() > 5));
    assert_eq!(display.state(), DisplayState::Visible);
    let frame = display.last_frame().ok_or("no frame shown")?;
    assert_eq!((frame.width(), frame.height()), (64, 48));

    vehicle.set(Gear::Drive, TurnSignal::None);
    assert!(wait_until(TIMEOUT, || display.state() == DisplayState::NotVisible));
    assert!(wait_until(TIMEOUT, || cameras.open_cameras().is_empty()));

    commands.post_command(Command::Exit);
    handle.join().expect("control loop panicked")?;
    Ok(())
}

#[test]
#[serial]
fn test_unexpected_stream_stop_restarts_view() -> Result<(), Box<dyn Error>> {
    let cameras = sim_cameras(&["rear"]);
    let controller = StateController::new(
        Arc::new(ScriptedVehicle::new(Gear::Reverse, TurnSignal::None)),
        cameras.clone(),
        Arc::new(SimDisplay::new(64, 48)),
        || true,
        &config(&[("rear", "reverse")]),
    )?;
    let commands = controller.command_sender();
    let handle = controller.start_update_loop()?;

    assert!(wait_until(TIMEOUT, || cameras
        .open_cameras()
        .first()
        .is_some_and(|c| c.is_streaming())));
    assert_eq!(cameras.open_count(), 1);

    cameras.open_cameras()[0].disconnect();
    assert!(wait_until(TIMEOUT, || cameras.open_count() == 2));
    assert!(wait_until(TIMEOUT, || cameras
        .open_cameras()
        .first()
        .is_some_and(|c| c.is_streaming())));

    // Only one restart per view: a second loss releases the camera for good.
    cameras.open_cameras()[0].disconnect();
    assert!(wait_until(TIMEOUT, || cameras.open_cameras().is_empty()));
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(cameras.open_count(), 2);
    assert!(!handle.is_finished());

    commands.post_command(Command::Exit);
    handle.join().expect("control loop panicked")?;
    assert!(cameras.open_cameras().is_empty());
    Ok(())
}

#[test]
#[serial]
fn test_odd_width_camera_does_not_panic() -> Result<(), Box<dyn Error>> {
    // YUYV needs an even width, so this camera fails on its first frame.
    let cameras = Arc::new(SimEnumerator::new(["rear"], 100).with_resolution(63, 48));
    let display = Arc::new(SimDisplay::new(64, 48));
    let controller = StateController::new(
        Arc::new(ScriptedVehicle::new(Gear::Reverse, TurnSignal::None)),
        cameras.clone(),
        display.clone(),
        || false,
        &config(&[("rear", "reverse")]),
    )?;
    let commands = controller.command_sender();
    let handle = controller.start_update_loop()?;

    assert!(wait_until(TIMEOUT, || cameras.open_count() == 2
        && cameras.open_cameras().is_empty()));
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(cameras.open_count(), 2);
    assert!(!handle.is_finished());
    assert_eq!(display.state(), DisplayState::NotVisible);

    commands.post_command(Command::Exit);
    handle.join().expect("control loop panicked")?;
    Ok(())
}

/// Display that lends buffers the renderers cannot draw into.
struct YuvDisplay;

impl Display for YuvDisplay {
    fn get_target_buffer(&self) -> Option<TargetBuffer> {
        Image::new(64, 48, image::YUYV)
            .ok()
            .map(|image| TargetBuffer::new(0, image))
    }

    fn return_target_buffer_for_display(&self, _buffer: TargetBuffer) -> edgefirst_evs::Result<()> {
        Ok(())
    }

    fn set_display_state(&self, _state: DisplayState) -> edgefirst_evs::Result<()> {
        Ok(())
    }
}

#[test]
#[serial]
fn test_draw_failure_is_fatal() -> Result<(), Box<dyn Error>> {
    let cameras = sim_cameras(&["rear"]);
    let controller = StateController::new(
        Arc::new(ScriptedVehicle::new(Gear::Reverse, TurnSignal::None)),
        cameras.clone(),
        Arc::new(YuvDisplay),
        || true,
        &config(&[("rear", "reverse")]),
    )?;
    let handle = controller.start_update_loop()?;

    let err = handle
        .join()
        .expect("control loop panicked")
        .expect_err("draw into YUYV should fail");
    assert!(matches!(err, EvsError::Render(_)));
    assert!(err.is_fatal());
    assert!(cameras.open_cameras().is_empty());
    Ok(())
}

/// Display whose buffer handles are never valid.
#[derive(Default)]
struct BrokenDisplay {
    requests: AtomicUsize,
    returned: AtomicUsize,
}

impl Display for BrokenDisplay {
    fn get_target_buffer(&self) -> Option<TargetBuffer> {
        let id = self.requests.fetch_add(1, Ordering::SeqCst) as u32;
        Some(TargetBuffer {
            buffer_id: id,
            image: None,
        })
    }

    fn return_target_buffer_for_display(&self, buffer: TargetBuffer) -> edgefirst_evs::Result<()> {
        assert!(buffer.image.is_none());
        self.returned.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_display_state(&self, _state: DisplayState) -> edgefirst_evs::Result<()> {
        Ok(())
    }
}

#[test]
#[serial]
fn test_invalid_target_buffer_is_skipped() -> Result<(), Box<dyn Error>> {
    let display = Arc::new(BrokenDisplay::default());
    let controller = StateController::new(
        Arc::new(ScriptedVehicle::new(Gear::Reverse, TurnSignal::None)),
        sim_cameras(&["rear"]),
        display.clone(),
        || true,
        &config(&[("rear", "reverse")]),
    )?;
    let commands = controller.command_sender();
    let handle = controller.start_update_loop()?;

    assert!(wait_until(TIMEOUT, || display.requests.load(Ordering::SeqCst) > 5));
    assert!(!handle.is_finished());

    commands.post_command(Command::Exit);
    handle.join().expect("control loop panicked")?;
    // Every buffer lent out was handed back, drawn or not.
    assert_eq!(
        display.returned.load(Ordering::SeqCst),
        display.requests.load(Ordering::SeqCst)
    );
    Ok(())
}
