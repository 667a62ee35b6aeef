use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use ember_core::{Camera, RenderTarget};

use crate::scene::UpdateContext;
use crate::stage::SceneId;

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for an entity, assigned when its [`EntityBase`] is
/// constructed and stable for the entity's whole life.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(u64);

impl EntityId {
    fn next() -> Self {
        Self(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Create an entity id from a raw value (mainly for testing).
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw value of this id.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The state every entity carries: identity, draw layer, removal flag, and
/// the non-owning back-reference to the scene that currently owns it.
///
/// Entity types embed one of these and hand it out through
/// [`Entity::base`]/[`Entity::base_mut`].
#[derive(Debug)]
pub struct EntityBase {
    id: EntityId,
    layer: i32,
    removed: bool,
    scene: Option<SceneId>,
}

impl EntityBase {
    /// Create a base on the given draw layer with a freshly allocated id.
    pub fn new(layer: i32) -> Self {
        Self {
            id: EntityId::next(),
            layer,
            removed: false,
            scene: None,
        }
    }

    /// Create a base with an explicit id (mainly for testing).
    pub fn with_id(id: EntityId, layer: i32) -> Self {
        Self {
            id,
            layer,
            removed: false,
            scene: None,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The draw-order key. Lower layers draw first.
    pub fn layer(&self) -> i32 {
        self.layer
    }

    /// Change the draw layer. Takes effect at the next draw, which re-sorts.
    pub fn set_layer(&mut self, layer: i32) {
        self.layer = layer;
    }

    /// Whether this entity has been flagged for removal.
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Flag this entity for removal. Idempotent; the flag never resets, and
    /// a flagged entity receives no further update or draw calls before its
    /// owning scene purges it at the end of the frame.
    pub fn mark_removed(&mut self) {
        self.removed = true;
    }

    /// The scene that currently owns this entity, if any.
    pub fn scene(&self) -> Option<SceneId> {
        self.scene
    }

    pub(crate) fn attach(&mut self, scene: SceneId) {
        self.scene = Some(scene);
    }

    pub(crate) fn detach(&mut self) {
        self.scene = None;
    }
}

/// A polymorphic game object owned by a scene.
///
/// Implementors embed an [`EntityBase`] and override the hooks they need.
/// `update` runs inside the owning scene's frame cycle and may request
/// structural changes through the [`UpdateContext`]; `draw` is a pure side
/// effect through the render seam and must not touch membership.
pub trait Entity: 'static {
    fn base(&self) -> &EntityBase;
    fn base_mut(&mut self) -> &mut EntityBase;

    /// Advance one frame of logic. May insert entities, request moves, or
    /// mark this entity removed via its base.
    fn update(&mut self, _ctx: &mut UpdateContext) {}

    /// Render through the current camera.
    fn draw(&self, _camera: &Camera, _target: &mut dyn RenderTarget) {}

    /// Called exactly once, synchronously, whenever ownership transfers into
    /// a scene; the owning scene is readable from the base at this point.
    fn on_added(&mut self) {}

    /// Called exactly once, synchronously, whenever ownership transfers out
    /// of a scene (explicit release, purge, or the release half of a move).
    fn on_removed(&mut self) {}

    fn id(&self) -> EntityId {
        self.base().id()
    }

    fn layer(&self) -> i32 {
        self.base().layer()
    }

    fn is_removed(&self) -> bool {
        self.base().is_removed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy {
        base: EntityBase,
    }

    impl Entity for Dummy {
        fn base(&self) -> &EntityBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut EntityBase {
            &mut self.base
        }
    }

    #[test]
    fn ids_are_unique() {
        let a = EntityBase::new(0);
        let b = EntityBase::new(0);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn removal_flag_is_monotonic() {
        let mut base = EntityBase::new(0);
        assert!(!base.is_removed());
        base.mark_removed();
        base.mark_removed();
        assert!(base.is_removed());
    }

    #[test]
    fn trait_helpers_read_base() {
        let mut dummy = Dummy {
            base: EntityBase::new(3),
        };
        assert_eq!(dummy.layer(), 3);
        assert!(!dummy.is_removed());
        dummy.base_mut().mark_removed();
        assert!(dummy.is_removed());
    }

    #[test]
    fn fresh_base_is_unowned() {
        let base = EntityBase::new(0);
        assert_eq!(base.scene(), None);
    }
}
