//! The stage: owner and driver of all scenes
//!
//! Scenes are stored behind generational [`SceneId`] handles so that code may
//! hold a reference to a scene (as a move destination, or an entity's owner)
//! without owning it; a handle to a removed scene simply resolves to nothing.
//! The stage also drives the frame cycle, because reconciling a cross-scene
//! move needs both ends of the transfer at once.

use std::fmt;

use ember_core::RenderTarget;
use tracing::{debug, error, warn};

use crate::entity::{Entity, EntityId};
use crate::error::SceneError;
use crate::scene::{Scene, UpdateContext};

/// A generational scene handle. Compact index + generation so a slot can be
/// reused without old handles resolving to the new occupant.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneId {
    index: u32,
    generation: u32,
}

impl SceneId {
    /// Create a scene id from raw parts (mainly for testing).
    pub fn from_raw(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// The slot index of this scene.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The generation of this scene (incremented on slot reuse).
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SceneId({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

struct Slot {
    generation: u32,
    scene: Option<Scene>,
}

/// Owns every scene and drives their update/draw cycles.
pub struct Stage {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl Stage {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    // ---- Scene management ----

    /// Create a new empty scene and return its handle.
    pub fn add_scene(&mut self) -> SceneId {
        let id = if let Some(index) = self.free.pop() {
            let generation = self.slots[index as usize].generation;
            let id = SceneId { index, generation };
            self.slots[index as usize].scene = Some(Scene::new(id));
            id
        } else {
            let index = self.slots.len() as u32;
            let id = SceneId {
                index,
                generation: 0,
            };
            self.slots.push(Slot {
                generation: 0,
                scene: Some(Scene::new(id)),
            });
            id
        };
        self.len += 1;
        debug!(scene = %id, "scene added");
        id
    }

    /// Remove a scene, returning it (entities and subscriptions included).
    /// Stale handles return `None`.
    pub fn remove_scene(&mut self, id: SceneId) -> Option<Scene> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let scene = slot.scene.take()?;
        slot.generation += 1;
        self.free.push(id.index);
        self.len -= 1;
        debug!(scene = %id, "scene removed");
        Some(scene)
    }

    /// Whether the handle resolves to a live scene.
    pub fn contains_scene(&self, id: SceneId) -> bool {
        self.scene(id).is_some()
    }

    /// Borrow a scene by handle.
    pub fn scene(&self, id: SceneId) -> Option<&Scene> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.scene.as_ref()
    }

    /// Mutably borrow a scene by handle.
    pub fn scene_mut(&mut self, id: SceneId) -> Option<&mut Scene> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.scene.as_mut()
    }

    /// Number of live scenes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // ---- Entity operations ----

    /// Insert an entity into the given scene. See [`Scene::insert`].
    pub fn insert(
        &mut self,
        scene: SceneId,
        entity: Box<dyn Entity>,
    ) -> Result<EntityId, SceneError> {
        match self.scene_mut(scene) {
            Some(s) => s.insert(entity),
            None => Err(SceneError::SceneNotFound(scene)),
        }
    }

    /// Release an entity from the given scene to the caller. See
    /// [`Scene::release`].
    pub fn release(&mut self, scene: SceneId, entity: EntityId) -> Option<Box<dyn Entity>> {
        self.scene_mut(scene)?.release(entity)
    }

    /// Request relocation of a live entity from `source` to `destination`.
    ///
    /// Defensive no-op (with a warning) when either handle is stale, the
    /// entity is not owned by `source`, or the entity is already flagged for
    /// removal — a doomed entity must never escape deletion through a move.
    /// When `source` is not mid-update the request is reconciled right away
    /// instead of waiting for the next frame.
    pub fn move_entity(&mut self, source: SceneId, destination: SceneId, entity: EntityId) {
        if !self.contains_scene(destination) {
            warn!(scene = %destination, "attempted to move entity to a missing scene");
            return;
        }
        let Some(scene) = self.scene_mut(source) else {
            warn!(scene = %source, "attempted to move entity from a missing scene");
            return;
        };
        match scene.entity(entity) {
            None => {
                warn!(entity = %entity, "attempted to move an entity the scene does not own");
                return;
            }
            Some(e) if e.is_removed() => {
                warn!(entity = %entity, "entity flagged for removal, move ignored");
                return;
            }
            Some(_) => {}
        }
        scene.pending_moves.push((destination, entity));
        if !scene.updating {
            if let Err(err) = self.drain_moves(source) {
                error!(%err, "move reconciliation failed");
            }
        }
    }

    // ---- Frame cycle ----

    /// Run one frame of entity logic for the given scene, in four strict
    /// phases:
    ///
    /// 1. active iteration over the live collection as it stood on entry,
    ///    skipping entities already flagged removed;
    /// 2. insert reconciliation — pending entities join the live collection
    ///    in queued order;
    /// 3. move reconciliation — pending moves drain last-requested-first,
    ///    each a release from this scene plus an insert at the destination;
    /// 4. delete reconciliation — flagged entities are purged with
    ///    `on_removed`.
    ///
    /// The live collection is never resized during phase 1; entity logic
    /// stages changes through its [`UpdateContext`] instead.
    pub fn update(&mut self, scene: SceneId) -> Result<(), SceneError> {
        let Some(state) = self.scene_mut(scene) else {
            return Err(SceneError::SceneNotFound(scene));
        };
        state.updating = true;

        // Phase 1: active iteration, snapshot length.
        let mut ctx = UpdateContext::new(scene, state.live_ids());
        let live = state.entities.len();
        for index in 0..live {
            if state.entities[index].is_removed() {
                continue;
            }
            state.entities[index].update(&mut ctx);
        }
        state.pending_new.append(&mut ctx.inserted);
        state.pending_moves.append(&mut ctx.moves);

        // Phase 2: insert reconciliation.
        let mut incoming = std::mem::take(&mut state.pending_new);
        state.entities.append(&mut incoming);

        // Phase 3: move reconciliation.
        let moved = self.drain_moves(scene);

        // Phase 4: delete reconciliation. Runs even when a move failed so a
        // flagged entity never outlives the frame that marked it.
        if let Some(state) = self.scene_mut(scene) {
            state.purge_removed();
            state.updating = false;
        }
        moved
    }

    /// Draw the given scene. See [`Scene::draw`].
    pub fn draw(
        &mut self,
        scene: SceneId,
        target: &mut dyn RenderTarget,
    ) -> Result<(), SceneError> {
        let state = self
            .scene_mut(scene)
            .ok_or(SceneError::SceneNotFound(scene))?;
        state.draw(target);
        Ok(())
    }

    /// Drain the scene's pending moves, last-requested-first. Each request
    /// is a release from the source plus an insert at the destination; a
    /// request whose entity is gone or flagged removed is logged and
    /// skipped, the rest of the pass continues.
    fn drain_moves(&mut self, scene: SceneId) -> Result<(), SceneError> {
        loop {
            let Some(source) = self.scene_mut(scene) else {
                return Ok(());
            };
            let Some((destination, entity_id)) = source.pending_moves.pop() else {
                return Ok(());
            };

            match source.entity(entity_id) {
                None => {
                    warn!(entity = %entity_id, "entity not found in move operation");
                    continue;
                }
                Some(e) if e.is_removed() => {
                    warn!(entity = %entity_id, "entity flagged for removal, move skipped");
                    continue;
                }
                Some(_) => {}
            }
            let Some(entity) = source.release(entity_id) else {
                continue;
            };

            let collides = match self.scene(destination) {
                None => {
                    warn!(scene = %destination, entity = %entity_id, "move destination no longer exists");
                    if let Some(source) = self.scene_mut(scene) {
                        let _ = source.insert(entity);
                    }
                    continue;
                }
                Some(dest) => dest.would_collide(entity.as_ref()),
            };

            if collides {
                // Fatal. The entity is handed back to its source so it is
                // owned by exactly one scene, and the remaining requests are
                // dropped with the aborted frame.
                if let Some(source) = self.scene_mut(scene) {
                    let _ = source.insert(entity);
                    source.pending_moves.clear();
                }
                return Err(SceneError::DuplicateEntity(entity_id));
            }

            if let Some(dest) = self.scene_mut(destination) {
                let _ = dest.insert(entity);
            }
        }
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityBase;
    use std::cell::Cell;
    use std::rc::Rc;

    type Behavior = Box<dyn FnMut(&mut EntityBase, &mut UpdateContext)>;

    /// Test entity that counts its hooks and runs an optional behavior
    /// closure each update.
    struct Probe {
        base: EntityBase,
        updates: Rc<Cell<u32>>,
        added: Rc<Cell<u32>>,
        removed: Rc<Cell<u32>>,
        behavior: Option<Behavior>,
    }

    struct Counters {
        updates: Rc<Cell<u32>>,
        added: Rc<Cell<u32>>,
        removed: Rc<Cell<u32>>,
    }

    impl Probe {
        fn new(layer: i32) -> (Box<Self>, Counters) {
            Self::with_base(EntityBase::new(layer))
        }

        fn with_base(base: EntityBase) -> (Box<Self>, Counters) {
            let updates = Rc::new(Cell::new(0));
            let added = Rc::new(Cell::new(0));
            let removed = Rc::new(Cell::new(0));
            let counters = Counters {
                updates: updates.clone(),
                added: added.clone(),
                removed: removed.clone(),
            };
            (
                Box::new(Self {
                    base,
                    updates,
                    added,
                    removed,
                    behavior: None,
                }),
                counters,
            )
        }

        fn with_behavior(
            layer: i32,
            behavior: impl FnMut(&mut EntityBase, &mut UpdateContext) + 'static,
        ) -> (Box<Self>, Counters) {
            let (mut probe, counters) = Self::new(layer);
            probe.behavior = Some(Box::new(behavior));
            (probe, counters)
        }
    }

    impl Entity for Probe {
        fn base(&self) -> &EntityBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut EntityBase {
            &mut self.base
        }
        fn update(&mut self, ctx: &mut UpdateContext) {
            self.updates.set(self.updates.get() + 1);
            if let Some(behavior) = &mut self.behavior {
                behavior(&mut self.base, ctx);
            }
        }
        fn on_added(&mut self) {
            self.added.set(self.added.get() + 1);
        }
        fn on_removed(&mut self) {
            self.removed.set(self.removed.get() + 1);
        }
    }

    #[test]
    fn duplicate_insert_same_scene_is_fatal_and_harmless() {
        let mut stage = Stage::new();
        let scene = stage.add_scene();

        let (probe, _c) = Probe::new(0);
        let id = stage.insert(scene, probe).unwrap();

        let (clash, _c2) = Probe::with_base(EntityBase::with_id(id, 0));
        assert_eq!(
            stage.insert(scene, clash),
            Err(SceneError::DuplicateEntity(id))
        );

        // The original owning relationship is untouched.
        assert_eq!(stage.scene(scene).unwrap().len(), 1);
        assert!(stage.scene(scene).unwrap().contains(id));
    }

    #[test]
    fn entity_owned_elsewhere_is_rejected() {
        let mut stage = Stage::new();
        let a = stage.add_scene();
        let b = stage.add_scene();

        let (probe, _c) = Probe::new(0);
        let id = probe.id();
        // Simulate a caller re-inserting something a scene still owns.
        let mut probe = probe;
        probe.base_mut().attach(a);

        assert_eq!(
            stage.insert(b, probe),
            Err(SceneError::DuplicateEntity(id))
        );
    }

    #[test]
    fn insert_during_update_is_deferred_one_frame() {
        let mut stage = Stage::new();
        let scene = stage.add_scene();

        let spawned_counters: Rc<Cell<Option<Counters>>> = Rc::new(Cell::new(None));
        let sc = spawned_counters.clone();
        let mut spawned = false;
        let (spawner, _c) = Probe::with_behavior(0, move |_base, ctx| {
            if !spawned {
                spawned = true;
                let (child, counters) = Probe::new(0);
                ctx.insert(child).unwrap();
                sc.set(Some(counters));
            }
        });
        stage.insert(scene, spawner).unwrap();

        stage.update(scene).unwrap();
        let counters = spawned_counters.take().unwrap();

        // on_added fired synchronously inside the frame that spawned it, but
        // the child is not updated until the following frame.
        assert_eq!(counters.added.get(), 1);
        assert_eq!(counters.updates.get(), 0);
        assert_eq!(stage.scene(scene).unwrap().len(), 2);

        stage.update(scene).unwrap();
        assert_eq!(counters.updates.get(), 1);
    }

    #[test]
    fn self_move_during_update_lands_in_destination() {
        let mut stage = Stage::new();
        let a = stage.add_scene();
        let b = stage.add_scene();

        let (mover, counters) = Probe::with_behavior(0, move |base, ctx| {
            let id = base.id();
            ctx.move_entity(b, id);
        });
        let id = stage.insert(a, mover).unwrap();
        assert_eq!(counters.added.get(), 1);

        stage.update(a).unwrap();

        assert!(!stage.scene(a).unwrap().contains(id));
        assert!(stage.scene(b).unwrap().contains(id));
        assert_eq!(counters.added.get(), 2);
        assert_eq!(counters.removed.get(), 1);
        assert_eq!(stage.scene(b).unwrap().entity(id).unwrap().base().scene(), Some(b));
    }

    #[test]
    fn moved_entity_is_owned_by_exactly_one_scene() {
        let mut stage = Stage::new();
        let a = stage.add_scene();
        let b = stage.add_scene();

        let (probe, counters) = Probe::new(0);
        let id = stage.insert(a, probe).unwrap();

        stage.move_entity(a, b, id);
        stage.update(a).unwrap();
        stage.update(b).unwrap();

        let in_a = stage.scene(a).unwrap().contains(id);
        let in_b = stage.scene(b).unwrap().contains(id);
        assert!(in_b && !in_a);
        assert_eq!(counters.added.get(), 2);
        assert_eq!(counters.removed.get(), 1);
    }

    #[test]
    fn move_outside_update_reconciles_immediately() {
        let mut stage = Stage::new();
        let a = stage.add_scene();
        let b = stage.add_scene();

        let (probe, _c) = Probe::new(0);
        let id = stage.insert(a, probe).unwrap();

        // No update() call needed: the stage is idle, so the request drains
        // synchronously.
        stage.move_entity(a, b, id);
        assert!(!stage.scene(a).unwrap().contains(id));
        assert!(stage.scene(b).unwrap().contains(id));
    }

    #[test]
    fn pending_moves_drain_last_requested_first() {
        let mut stage = Stage::new();
        let a = stage.add_scene();
        let b = stage.add_scene();

        let (first, _c1) = Probe::with_behavior(0, move |base, ctx| {
            let id = base.id();
            ctx.move_entity(b, id);
        });
        let (second, _c2) = Probe::with_behavior(0, move |base, ctx| {
            let id = base.id();
            ctx.move_entity(b, id);
        });
        let first_id = stage.insert(a, first).unwrap();
        let second_id = stage.insert(a, second).unwrap();

        stage.update(a).unwrap();

        // Requests were queued [first, second]; the drain pops the stack, so
        // the second request is applied first.
        let order: Vec<EntityId> = stage
            .scene(b)
            .unwrap()
            .entities()
            .map(|e| e.id())
            .collect();
        assert_eq!(order, vec![second_id, first_id]);
    }

    #[test]
    fn removed_entity_is_purged_within_the_frame() {
        let mut stage = Stage::new();
        let scene = stage.add_scene();

        let (probe, counters) = Probe::with_behavior(0, |base, _ctx| {
            base.mark_removed();
        });
        let id = stage.insert(scene, probe).unwrap();

        stage.update(scene).unwrap();
        assert!(!stage.scene(scene).unwrap().contains(id));
        assert_eq!(counters.updates.get(), 1);
        assert_eq!(counters.removed.get(), 1);

        stage.update(scene).unwrap();
        assert_eq!(counters.updates.get(), 1);
        assert_eq!(counters.removed.get(), 1);
    }

    #[test]
    fn removed_entity_cannot_be_moved() {
        let mut stage = Stage::new();
        let a = stage.add_scene();
        let b = stage.add_scene();

        let (probe, counters) = Probe::new(0);
        let id = stage.insert(a, probe).unwrap();
        stage
            .scene_mut(a)
            .unwrap()
            .entity_mut(id)
            .unwrap()
            .base_mut()
            .mark_removed();

        stage.move_entity(a, b, id);
        assert!(stage.scene(a).unwrap().contains(id));
        assert!(!stage.scene(b).unwrap().contains(id));

        stage.update(a).unwrap();
        assert!(!stage.scene(a).unwrap().contains(id));
        assert!(!stage.scene(b).unwrap().contains(id));
        assert_eq!(counters.removed.get(), 1);
    }

    #[test]
    fn mark_removed_during_update_beats_queued_move() {
        let mut stage = Stage::new();
        let a = stage.add_scene();
        let b = stage.add_scene();

        // Requests a move, then flags itself: deletion wins.
        let (probe, counters) = Probe::with_behavior(0, move |base, ctx| {
            let id = base.id();
            ctx.move_entity(b, id);
            base.mark_removed();
        });
        let id = stage.insert(a, probe).unwrap();

        stage.update(a).unwrap();
        assert!(!stage.scene(a).unwrap().contains(id));
        assert!(!stage.scene(b).unwrap().contains(id));
        assert_eq!(counters.removed.get(), 1);
        assert_eq!(counters.added.get(), 1);
    }

    #[test]
    fn stale_scene_handle_does_not_resolve_after_reuse() {
        let mut stage = Stage::new();
        let old = stage.add_scene();
        assert!(stage.remove_scene(old).is_some());

        let reused = stage.add_scene();
        assert_eq!(old.index(), reused.index());
        assert_ne!(old, reused);

        assert!(stage.scene(old).is_none());
        let (probe, _c) = Probe::new(0);
        assert_eq!(
            stage.insert(old, probe),
            Err(SceneError::SceneNotFound(old))
        );
        assert_eq!(stage.update(old), Err(SceneError::SceneNotFound(old)));
    }

    #[test]
    fn move_to_stale_destination_is_a_logged_noop() {
        let mut stage = Stage::new();
        let a = stage.add_scene();
        let dead = stage.add_scene();
        stage.remove_scene(dead);

        let (probe, _c) = Probe::new(0);
        let id = stage.insert(a, probe).unwrap();

        stage.move_entity(a, dead, id);
        assert!(stage.scene(a).unwrap().contains(id));
    }

    #[test]
    fn destination_removed_between_request_and_drain() {
        let mut stage = Stage::new();
        let a = stage.add_scene();
        let doomed = stage.add_scene();

        let (mover, _c) = Probe::with_behavior(0, move |base, ctx| {
            let id = base.id();
            ctx.move_entity(doomed, id);
        });
        let id = stage.insert(a, mover).unwrap();

        stage.remove_scene(doomed);
        stage.update(a).unwrap();

        // The request went stale; the entity stays owned by its source.
        assert!(stage.scene(a).unwrap().contains(id));
    }

    #[test]
    fn colliding_move_destination_aborts_the_frame() {
        let mut stage = Stage::new();
        let a = stage.add_scene();
        let b = stage.add_scene();

        let (mover, _c) = Probe::new(0);
        let id = stage.insert(a, mover).unwrap();
        let (squatter, _c2) = Probe::with_base(EntityBase::with_id(id, 0));
        stage.scene_mut(b).unwrap().insert(squatter).unwrap();

        stage
            .scene_mut(a)
            .unwrap()
            .pending_moves
            .push((b, id));
        assert_eq!(
            stage.update(a),
            Err(SceneError::DuplicateEntity(id))
        );

        // Owned by exactly one scene on both ends of the failed transfer.
        assert!(stage.scene(a).unwrap().contains(id));
        assert_eq!(stage.scene(b).unwrap().len(), 1);
        assert!(stage.scene(a).unwrap().pending_moves.is_empty());
        assert!(!stage.scene(a).unwrap().updating);
    }

    #[test]
    fn release_then_reinsert_elsewhere() {
        let mut stage = Stage::new();
        let a = stage.add_scene();
        let b = stage.add_scene();

        let (probe, counters) = Probe::new(0);
        let id = stage.insert(a, probe).unwrap();

        let released = stage.release(a, id).unwrap();
        assert_eq!(counters.removed.get(), 1);

        stage.insert(b, released).unwrap();
        assert_eq!(counters.added.get(), 2);
        assert!(stage.scene(b).unwrap().contains(id));
    }
}
