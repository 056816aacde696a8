//! Perspective camera used for screen-space projection
//!
//! The camera never moves; the world scrolls underneath it by shifting the
//! render origin. Projection is only used for presentation signals.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    /// Vertical field of view (degrees)
    pub fov_y_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov_y_deg: 75.0,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
            position: Vec3::new(0.0, 1.0, 5.0),
            target: Vec3::new(0.0, 1.0, 0.0),
        }
    }
}

impl Camera {
    pub fn new(aspect: f32) -> Self {
        Self {
            aspect,
            ..Default::default()
        }
    }

    /// Update aspect on canvas resize
    pub fn set_aspect(&mut self, width: f32, height: f32) {
        if width > 0.0 && height > 0.0 {
            self.aspect = width / height;
        }
    }

    pub fn view_proj(&self) -> Mat4 {
        let proj = Mat4::perspective_rh(
            self.fov_y_deg.to_radians(),
            self.aspect,
            self.near,
            self.far,
        );
        let view = Mat4::look_at_rh(self.position, self.target, Vec3::Y);
        proj * view
    }

    /// Project a render-space point to normalized device coordinates
    pub fn project(&self, point: Vec3) -> Vec3 {
        self.view_proj().project_point3(point)
    }

    /// Horizontal extent visible on the z = 0 plane
    pub fn visible_width(&self) -> f32 {
        let distance = (self.position.z).abs().max(self.near);
        2.0 * distance * (self.fov_y_deg.to_radians() * 0.5).tan() * self.aspect
    }

    /// Map a render-space x on the track to [0, 1] across the screen
    pub fn screen_progress(&self, render_x: f32) -> f32 {
        let ndc = self.project(Vec3::new(render_x, 0.0, 0.0));
        (ndc.x * 0.5 + 0.5).clamp(0.0, 1.0)
    }
}
