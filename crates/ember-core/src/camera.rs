//! 2D camera state
//!
//! Each scene owns one camera; entities receive it at draw time to position
//! themselves relative to the current view.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// A 2D camera with position, zoom, and rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// World-space position the camera is centered on
    pub position: Vec2,
    /// Zoom factor (1.0 = no zoom, 2.0 = double size)
    pub zoom: f32,
    /// Rotation in radians, counter-clockwise
    pub rotation: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            zoom: 1.0,
            rotation: 0.0,
        }
    }
}

impl Camera {
    /// Create a camera centered on the given world position.
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Transform a world-space point into view space.
    pub fn world_to_view(&self, point: Vec2) -> Vec2 {
        let translated = point - self.position;
        let (sin, cos) = (-self.rotation).sin_cos();
        let rotated = Vec2::new(
            translated.x * cos - translated.y * sin,
            translated.x * sin + translated.y * cos,
        );
        rotated * self.zoom
    }

    /// Move the camera by the given world-space offset.
    pub fn translate(&mut self, offset: Vec2) {
        self.position += offset;
    }
}
