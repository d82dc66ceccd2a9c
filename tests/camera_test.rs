use vitrine::camera::{OrbitCamera, OrbitController, OrbitSettings, Projection};

mod common;
use common::test_utils::assert_close;

#[test]
fn default_camera_sits_on_positive_z() {
    let camera = OrbitCamera::looking_at_origin(5.0);
    let eye = camera.eye();
    assert_close(eye.x, 0.0);
    assert_close(eye.y, 0.0);
    assert_close(eye.z, 5.0);
}

#[test]
fn pitch_never_flips_over_the_pole() {
    let mut camera = OrbitCamera::looking_at_origin(5.0);
    camera.add_pitch(10.0);
    assert!(camera.pitch < std::f32::consts::FRAC_PI_2);
    // still in front of the target, not upside down behind it
    assert!(camera.eye().z > 0.0);
}

#[test]
fn undamped_drag_is_applied_in_one_update() {
    let mut camera = OrbitCamera::looking_at_origin(5.0);
    let mut controller = OrbitController::new(OrbitSettings::default(), 100);
    // a quarter of the viewport height is a quarter turn
    controller.rotate(-25.0, 0.0);
    controller.update(&mut camera, 1.0 / 60.0);
    assert_close(camera.yaw, std::f32::consts::FRAC_PI_2);
    assert!(!controller.is_settling());

    controller.update(&mut camera, 1.0 / 60.0);
    assert_close(camera.yaw, std::f32::consts::FRAC_PI_2);
}

#[test]
fn damped_drag_eases_out() {
    let mut camera = OrbitCamera::looking_at_origin(5.0);
    let settings = OrbitSettings {
        damping: Some(0.25),
        ..Default::default()
    };
    let mut controller = OrbitController::new(settings, 100);
    controller.rotate(-25.0, 0.0);

    controller.update(&mut camera, 1.0 / 60.0);
    let first = camera.yaw;
    assert_close(first, std::f32::consts::FRAC_PI_2 * 0.25);
    assert!(controller.is_settling());

    controller.update(&mut camera, 1.0 / 60.0);
    let second = camera.yaw - first;
    assert!(second > 0.0 && second < first);
}

#[test]
fn auto_rotate_advances_with_time() {
    let mut camera = OrbitCamera::looking_at_origin(5.0);
    let settings = OrbitSettings {
        auto_rotate: Some(0.5),
        ..Default::default()
    };
    let mut controller = OrbitController::new(settings, 100);
    controller.update(&mut camera, 2.0);
    assert_close(camera.yaw, 1.0);
    assert_close(camera.distance, 5.0);
}

#[test]
fn wheel_zooms_towards_target() {
    let mut camera = OrbitCamera::looking_at_origin(5.0);
    let mut controller = OrbitController::new(OrbitSettings::default(), 100);
    controller.zoom(1.0);
    controller.update(&mut camera, 0.0);
    assert_close(camera.distance, 4.75);

    // consumed by the update
    controller.update(&mut camera, 0.0);
    assert_close(camera.distance, 4.75);
}

#[test]
fn drag_needs_the_left_button() {
    use winit::event::DeviceEvent;

    let mut camera = OrbitCamera::looking_at_origin(5.0);
    let mut controller = OrbitController::new(OrbitSettings::default(), 100);
    controller.process_device_event(&DeviceEvent::MouseMotion { delta: (-25.0, 0.0) });
    controller.update(&mut camera, 0.0);
    assert_close(camera.yaw, 0.0);
    assert!(!controller.is_dragging());
}

#[test]
fn projection_tracks_aspect() {
    let mut projection = Projection::new(800, 600, cgmath::Deg(75.0), 0.1, 1000.0);
    assert_close(projection.aspect(), 800.0 / 600.0);
    projection.resize(1920, 1080);
    assert_close(projection.aspect(), 1920.0 / 1080.0);
}
