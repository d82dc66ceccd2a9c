//! Orbit camera, its input controller and the perspective projection.
//!
//! The camera circles a target point on a sphere described by `yaw`, `pitch`
//! and `distance`, with +Y up. [`OrbitController`] turns pointer input into
//! rotation and zoom and applies it on [`OrbitController::update`], optionally
//! damped so the motion eases out over the following frames.

use cgmath::{EuclideanSpace, Matrix4, Point3, Rad, Vector3, perspective};
use winit::{
    dpi::PhysicalPosition,
    event::{DeviceEvent, ElementState, MouseButton, MouseScrollDelta, WindowEvent},
};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.5,
    0.0, 0.0, 0.0, 1.0,
);

const SAFE_PITCH: f32 = std::f32::consts::FRAC_PI_2 - 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    pub distance: f32,
    /// Elevation above the horizontal plane through the target.
    pub pitch: f32,
    /// Angle around +Y, zero looking down -Z.
    pub yaw: f32,
    pub target: Vector3<f32>,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl OrbitCamera {
    pub fn new(distance: f32, pitch: f32, yaw: f32, target: Vector3<f32>) -> Self {
        Self {
            distance,
            pitch: pitch.clamp(-SAFE_PITCH, SAFE_PITCH),
            yaw,
            target,
            min_distance: 0.01,
            max_distance: f32::MAX,
        }
    }

    /// Camera on the +Z axis looking at the origin.
    pub fn looking_at_origin(distance: f32) -> Self {
        Self::new(distance, 0.0, 0.0, Vector3::new(0.0, 0.0, 0.0))
    }

    pub fn eye(&self) -> Vector3<f32> {
        Vector3::new(
            self.distance * self.yaw.sin() * self.pitch.cos(),
            self.distance * self.pitch.sin(),
            self.distance * self.yaw.cos() * self.pitch.cos(),
        ) + self.target
    }

    pub fn add_yaw(&mut self, delta: f32) {
        self.yaw = (self.yaw + delta) % std::f32::consts::TAU;
    }

    pub fn add_pitch(&mut self, delta: f32) {
        self.pitch = (self.pitch + delta).clamp(-SAFE_PITCH, SAFE_PITCH);
    }

    pub fn set_distance(&mut self, distance: f32) {
        self.distance = distance.clamp(self.min_distance, self.max_distance);
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(
            Point3::from_vec(self.eye()),
            Point3::from_vec(self.target),
            Vector3::unit_y(),
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// How the controller reacts to input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitSettings {
    /// Fraction of the pending motion applied per update; `None` applies it at once.
    pub damping: Option<f32>,
    /// Radians per second of continuous rotation around the target.
    pub auto_rotate: Option<f32>,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self {
            damping: None,
            auto_rotate: None,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
        }
    }
}

/// Left-drag orbits, the wheel zooms.
#[derive(Debug)]
pub struct OrbitController {
    pub settings: OrbitSettings,
    viewport_height: f32,
    dragging: bool,
    yaw_delta: f32,
    pitch_delta: f32,
    zoom_scale: f32,
}

impl OrbitController {
    pub fn new(settings: OrbitSettings, viewport_height: u32) -> Self {
        Self {
            settings,
            viewport_height: viewport_height.max(1) as f32,
            dragging: false,
            yaw_delta: 0.0,
            pitch_delta: 0.0,
            zoom_scale: 1.0,
        }
    }

    /// Dragging across the full viewport height turns the camera once around.
    pub fn resize(&mut self, viewport_height: u32) {
        self.viewport_height = viewport_height.max(1) as f32;
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Returns `true` if the event was consumed.
    pub fn process_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state,
                ..
            } => {
                self.dragging = *state == ElementState::Pressed;
                true
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, scroll) => *scroll,
                    MouseScrollDelta::PixelDelta(PhysicalPosition { y, .. }) => *y as f32 / 50.0,
                };
                self.zoom(scroll);
                true
            }
            _ => false,
        }
    }

    pub fn process_device_event(&mut self, event: &DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.dragging {
                self.rotate(delta.0 as f32, delta.1 as f32);
            }
        }
    }

    /// Queues a rotation for a pointer movement of `dx`, `dy` pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        let per_pixel = std::f32::consts::TAU / self.viewport_height * self.settings.rotate_speed;
        self.yaw_delta -= dx * per_pixel;
        self.pitch_delta += dy * per_pixel;
    }

    /// Positive `steps` move the camera closer.
    pub fn zoom(&mut self, steps: f32) {
        self.zoom_scale *= 0.95f32.powf(self.settings.zoom_speed * steps);
    }

    /// Applies queued input and auto-rotation to `camera`.
    pub fn update(&mut self, camera: &mut OrbitCamera, dt: f32) {
        if let Some(speed) = self.settings.auto_rotate {
            camera.add_yaw(speed * dt);
        }

        let factor = self.settings.damping.map_or(1.0, |d| d.clamp(0.0, 1.0));
        camera.add_yaw(self.yaw_delta * factor);
        camera.add_pitch(self.pitch_delta * factor);
        camera.set_distance(camera.distance * self.zoom_scale);

        if self.settings.damping.is_some() {
            self.yaw_delta *= 1.0 - factor;
            self.pitch_delta *= 1.0 - factor;
        } else {
            self.yaw_delta = 0.0;
            self.pitch_delta = 0.0;
        }
        self.zoom_scale = 1.0;
    }

    /// Whether motion from earlier input is still being applied.
    pub fn is_settling(&self) -> bool {
        self.yaw_delta.abs() > 1e-5 || self.pitch_delta.abs() > 1e-5
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_position: [f32; 4],
    pub view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: cgmath::Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &OrbitCamera, projection: &Projection) {
        self.view_position = camera.eye().extend(1.0).into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// The camera together with the GPU objects that carry it to the shaders.
#[derive(Debug)]
pub struct CameraResources {
    pub camera: OrbitCamera,
    pub controller: OrbitController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}
