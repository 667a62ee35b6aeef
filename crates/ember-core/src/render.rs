//! The render seam
//!
//! The engine core owns no GPU resources. Entities describe what to draw as
//! [`DrawCall`]s and submit them to a [`RenderTarget`]; the backend that
//! turns those calls into pixels lives outside this workspace.

use glam::Vec2;

use crate::types::{Color, Rect};

/// One draw submission: where and how to render something.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    /// View-space position
    pub position: Vec2,
    /// Rotation in radians
    pub rotation: f32,
    /// Scale factor per axis
    pub scale: Vec2,
    /// Draw layer the submitting entity lives on
    pub layer: i32,
    /// Optional clip region in source coordinates
    pub clip: Option<Rect>,
    /// Tint color applied to the whole submission
    pub tint: Color,
}

impl DrawCall {
    /// Create a draw call at the given view-space position.
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            rotation: 0.0,
            scale: Vec2::ONE,
            layer: 0,
            clip: None,
            tint: Color::WHITE,
        }
    }

    /// Set the draw layer.
    pub fn with_layer(mut self, layer: i32) -> Self {
        self.layer = layer;
        self
    }

    /// Set the clip region.
    pub fn with_clip(mut self, clip: Rect) -> Self {
        self.clip = Some(clip);
        self
    }
}

/// Sink for draw submissions. Implemented by render backends.
pub trait RenderTarget {
    /// Submit one draw call.
    fn draw(&mut self, call: &DrawCall);
}

/// A render target that discards everything. Useful for headless runs and
/// tests that only exercise update logic.
#[derive(Debug, Default)]
pub struct NullRenderTarget;

impl RenderTarget for NullRenderTarget {
    fn draw(&mut self, _call: &DrawCall) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_call_builder() {
        let call = DrawCall::at(Vec2::new(1.0, 2.0))
            .with_layer(3)
            .with_clip(Rect::from_xywh(0.0, 0.0, 16.0, 16.0));
        assert_eq!(call.layer, 3);
        assert!(call.clip.is_some());
        assert_eq!(call.tint, Color::WHITE);
    }
}
