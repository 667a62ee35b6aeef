//! Ember Game - the frame driver
//!
//! Owns the stage and a stack of scenes, and runs the per-frame cycle:
//! clock, events, update, draw — once per tick, in that order.

mod game;

pub use game::Game;
