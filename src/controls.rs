use std::f32::consts::{PI, TAU};

use glam::Vec3;

use crate::camera::PerspectiveCamera;
use crate::config::ControlsConfig;

const POLAR_EPSILON: f32 = 1e-4;
const ZOOM_STEP: f32 = 0.95;

/// Damped orbit controls: drag to rotate around the target, wheel to dolly.
///
/// Input only accumulates pending deltas; [`OrbitControls::update`] applies a
/// `damping_factor` share of them each frame and decays the rest.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Vec3,
    damping_factor: f32,
    rotate_speed: f32,
    zoom_speed: f32,
    min_distance: f32,
    max_distance: f32,
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
}

impl OrbitControls {
    pub fn new(config: &ControlsConfig, camera: &PerspectiveCamera) -> Self {
        Self {
            target: camera.target,
            damping_factor: config.damping_factor.clamp(0.0, 1.0),
            rotate_speed: config.rotate_speed,
            zoom_speed: config.zoom_speed,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
        }
    }

    /// Pointer drag of `(dx, dy)` pixels on a viewport `viewport_height` pixels tall.
    pub fn rotate_by_pixels(&mut self, dx: f32, dy: f32, viewport_height: f32) {
        let height = viewport_height.max(1.0);
        self.rotate_left(TAU * dx / height * self.rotate_speed);
        self.rotate_up(TAU * dy / height * self.rotate_speed);
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.delta_theta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.delta_phi -= angle;
    }

    /// Wheel input; positive `delta_y` moves the camera away.
    pub fn zoom(&mut self, delta_y: f32) {
        if delta_y == 0.0 {
            return;
        }
        let step = ZOOM_STEP.powf(self.zoom_speed);
        if delta_y > 0.0 {
            self.scale /= step;
        } else {
            self.scale *= step;
        }
    }

    pub fn is_settled(&self) -> bool {
        self.delta_theta.abs() < 1e-6 && self.delta_phi.abs() < 1e-6 && self.scale == 1.0
    }

    /// Advances damping and moves the camera. Returns true when the camera moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        if self.is_settled() {
            camera.look_at(self.target);
            return false;
        }
        let offset = camera.position - self.target;
        let mut radius = offset.length();
        if radius <= f32::EPSILON {
            return false;
        }
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

        theta += self.delta_theta * self.damping_factor;
        phi += self.delta_phi * self.damping_factor;
        phi = phi.clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
        radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);

        let sin_phi = phi.sin();
        let new_offset = Vec3::new(
            radius * sin_phi * theta.sin(),
            radius * phi.cos(),
            radius * sin_phi * theta.cos(),
        );
        let previous = camera.position;
        camera.position = self.target + new_offset;
        camera.look_at(self.target);

        let decay = 1.0 - self.damping_factor;
        self.delta_theta *= decay;
        self.delta_phi *= decay;
        self.scale = 1.0;

        previous.distance_squared(camera.position) > 1e-12
    }
}
