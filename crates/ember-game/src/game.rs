use ember_core::{GameTime, RenderTarget, TimeConfig};
use ember_scene::{Scene, SceneError, SceneId, Stage};
use tracing::info;

/// The game driver. Owns every scene through its [`Stage`] and keeps a stack
/// of them; the top of the stack is the active scene and receives one
/// `update` and one `draw` per frame, in that order, never concurrently.
pub struct Game {
    stage: Stage,
    scene_stack: Vec<SceneId>,
    time: GameTime,
}

impl Game {
    pub fn new() -> Self {
        Self::with_time_config(TimeConfig::default())
    }

    /// Create a game with a custom frame clock configuration.
    pub fn with_time_config(config: TimeConfig) -> Self {
        Self {
            stage: Stage::new(),
            scene_stack: Vec::new(),
            time: GameTime::new(config),
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut Stage {
        &mut self.stage
    }

    pub fn time(&self) -> &GameTime {
        &self.time
    }

    pub fn time_mut(&mut self) -> &mut GameTime {
        &mut self.time
    }

    /// Create a new scene and make it the active one.
    pub fn push_scene(&mut self) -> SceneId {
        let id = self.stage.add_scene();
        self.scene_stack.push(id);
        info!(scene = %id, "scene pushed");
        id
    }

    /// Remove the active scene, returning it. The scene below it (if any)
    /// becomes active.
    pub fn pop_scene(&mut self) -> Option<Scene> {
        let id = self.scene_stack.pop()?;
        info!(scene = %id, "scene popped");
        self.stage.remove_scene(id)
    }

    /// The scene currently on top of the stack.
    pub fn active_scene(&self) -> Option<SceneId> {
        self.scene_stack.last().copied()
    }

    /// Run one frame: advance the clock, propagate the active scene's
    /// events, update it, then draw it. A frame with no active scene only
    /// advances the clock.
    pub fn frame(
        &mut self,
        raw_delta: f32,
        target: &mut dyn RenderTarget,
    ) -> Result<(), SceneError> {
        self.time.update(raw_delta);

        let Some(active) = self.active_scene() else {
            return Ok(());
        };
        if let Some(scene) = self.stage.scene_mut(active) {
            scene.events_mut().propagate();
        }
        self.stage.update(active)?;
        self.stage.draw(active, target)?;
        Ok(())
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}
