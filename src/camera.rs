// cellfluid - GPU Cellular Fluid Automaton
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

use glam::{Mat4, Quat, Vec3};

use crate::grid::GridLayout;

const MIN_PITCH: f32 = -1.45;
const MAX_PITCH: f32 = 1.45;

/// Orbit camera around the grid centre. World units are macro-cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 10.0,
            yaw: std::f32::consts::FRAC_PI_4,
            pitch: 0.5,
            fov_y: 45.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.05,
            far: 500.0,
        }
    }
}

impl OrbitCamera {
    /// Looks at the centre of the grid from far enough to see all of it.
    pub fn framing(layout: &GridLayout) -> Self {
        let size = Vec3::new(layout.dims.x as f32, layout.dims.y as f32, layout.dims.z as f32);
        let radius = size.length() * 0.5;
        Self {
            target: size * 0.5,
            distance: (radius / (Self::default().fov_y * 0.5).tan()).max(1.0) * 1.1,
            far: (radius * 8.0).max(100.0),
            ..Self::default()
        }
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(-self.pitch)
    }

    pub fn eye(&self) -> Vec3 {
        self.target + self.rotation() * (Vec3::Z * self.distance)
    }

    pub fn view_proj(&self) -> Mat4 {
        let view = Mat4::look_at_rh(self.eye(), self.target, Vec3::Y);
        let proj = Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far);
        proj * view
    }

    pub fn orbit(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw = (self.yaw + delta_yaw).rem_euclid(std::f32::consts::TAU);
        self.pitch = (self.pitch + delta_pitch).clamp(MIN_PITCH, MAX_PITCH);
    }

    /// Positive steps move closer.
    pub fn zoom(&mut self, steps: f32) {
        self.distance = (self.distance * 0.9_f32.powf(steps)).clamp(self.near * 4.0, self.far * 0.5);
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }
}
