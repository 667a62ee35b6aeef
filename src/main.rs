//! Ember - a small 2D engine built around safe scene/entity lifecycles
//!
//! Headless demo: a handful of drifting sparks cross from one scene into
//! another and burn out, exercising insert, move, and removal mid-frame.

use anyhow::Result;
use ember_core::{Camera, DrawCall, RenderTarget, Vec2};
use ember_game::Game;
use ember_scene::{Entity, EntityBase, SceneId, UpdateContext};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Render target that just logs submissions.
struct ConsoleTarget;

impl RenderTarget for ConsoleTarget {
    fn draw(&mut self, call: &DrawCall) {
        info!(
            x = call.position.x,
            y = call.position.y,
            layer = call.layer,
            "draw"
        );
    }
}

/// A spark drifts right; past x = 3 it crosses into the far scene, and past
/// x = 6 it burns out.
struct Spark {
    base: EntityBase,
    position: Vec2,
    far_scene: SceneId,
}

impl Spark {
    fn new(layer: i32, position: Vec2, far_scene: SceneId) -> Self {
        Self {
            base: EntityBase::new(layer),
            position,
            far_scene,
        }
    }
}

impl Entity for Spark {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn update(&mut self, ctx: &mut UpdateContext) {
        self.position.x += 1.0;
        if self.position.x > 6.0 {
            self.base.mark_removed();
        } else if self.position.x > 3.0 && ctx.scene() != self.far_scene {
            let id = self.base.id();
            ctx.move_entity(self.far_scene, id);
        }
    }

    fn draw(&self, camera: &Camera, target: &mut dyn RenderTarget) {
        let call = DrawCall::at(camera.world_to_view(self.position)).with_layer(self.layer());
        target.draw(&call);
    }

    fn on_added(&mut self) {
        info!(spark = %self.base.id(), scene = ?self.base.scene(), "spark added");
    }

    fn on_removed(&mut self) {
        info!(spark = %self.base.id(), "spark removed");
    }
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut game = Game::new();
    let far = game.push_scene();
    let near = game.push_scene();

    game.stage_mut()
        .scene_mut(far)
        .ok_or_else(|| anyhow::anyhow!("far scene missing"))?
        .camera_mut()
        .position = Vec2::new(5.0, 0.0);

    for n in 0..3 {
        let spark = Spark::new(n, Vec2::new(n as f32, 0.0), far);
        game.stage_mut().insert(near, Box::new(spark))?;
    }

    let mut target = ConsoleTarget;
    for _ in 0..8 {
        game.frame(1.0 / 60.0, &mut target)?;
        // Sparks that crossed over still need their frames driven.
        game.stage_mut().update(far)?;
        game.stage_mut().draw(far, &mut target)?;
    }

    info!(
        near = game.stage().scene(near).map(|s| s.len()).unwrap_or(0),
        far = game.stage().scene(far).map(|s| s.len()).unwrap_or(0),
        frames = game.time().frame_count,
        "demo finished"
    );
    Ok(())
}
