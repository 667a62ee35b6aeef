//! Ember Core - Core types and utilities for the Ember engine
//!
//! This crate provides the foundational types used throughout the engine:
//! - Mathematical primitives (re-exported from glam)
//! - 2D camera state
//! - Frame clock for per-frame delta time
//! - The render seam (`RenderTarget`) the engine draws through

pub mod camera;
pub mod render;
pub mod time;
pub mod types;

pub use camera::Camera;
pub use glam::Vec2;
pub use render::{DrawCall, NullRenderTarget, RenderTarget};
pub use time::{GameTime, TimeConfig};
pub use types::{Color, Rect};
