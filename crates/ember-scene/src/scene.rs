//! The scene container
//!
//! A [`Scene`] exclusively owns an ordered collection of entities and the
//! per-scene camera and event subscriptions. Structural changes requested
//! while the scene is mid-update are staged in pending buffers and applied
//! at the reconciliation phases of [`Stage::update`](crate::Stage::update),
//! never to the collection being iterated.

use ember_core::{Camera, RenderTarget};
use tracing::debug;

use crate::entity::{Entity, EntityId};
use crate::error::SceneError;
use crate::event::{Condition, Connection, Effect, EventHandler};
use crate::stage::SceneId;

/// Mediates what entity logic may do to its owning scene during the active
/// phase of an update: insert fresh entities and request cross-scene moves.
///
/// Requests are buffered here and reconciled after the iteration finishes,
/// so the live collection is never resized under the iterator. An entity
/// removes itself by flagging its own base instead.
pub struct UpdateContext {
    scene: SceneId,
    live: Vec<EntityId>,
    pub(crate) inserted: Vec<Box<dyn Entity>>,
    pub(crate) moves: Vec<(SceneId, EntityId)>,
}

impl UpdateContext {
    pub(crate) fn new(scene: SceneId, live: Vec<EntityId>) -> Self {
        Self {
            scene,
            live,
            inserted: Vec::new(),
            moves: Vec::new(),
        }
    }

    /// The scene whose update this context belongs to.
    pub fn scene(&self) -> SceneId {
        self.scene
    }

    /// Insert a new entity into the updating scene. Ownership transfers in
    /// and `on_added` fires immediately, but the entity joins the live
    /// collection only at the insert-reconciliation phase, so it is not
    /// updated until the next frame.
    ///
    /// Fails with [`SceneError::DuplicateEntity`] if the entity is already
    /// owned by a scene or its id collides with a live or pending entity.
    pub fn insert(&mut self, mut entity: Box<dyn Entity>) -> Result<EntityId, SceneError> {
        let id = entity.id();
        if entity.base().scene().is_some()
            || self.live.contains(&id)
            || self.inserted.iter().any(|e| e.id() == id)
        {
            return Err(SceneError::DuplicateEntity(id));
        }
        entity.base_mut().attach(self.scene);
        entity.on_added();
        self.inserted.push(entity);
        Ok(id)
    }

    /// Request that an entity of this scene be relocated to `destination`.
    /// Applied at the move-reconciliation phase; stale requests (entity gone
    /// or flagged removed by then) are logged and skipped.
    pub fn move_entity(&mut self, destination: SceneId, entity: EntityId) {
        self.moves.push((destination, entity));
    }
}

/// An ordered collection of exclusively-owned entities with a camera, event
/// subscriptions, and the pending buffers structural changes stage through.
///
/// Scenes live inside a [`Stage`](crate::Stage) and are addressed by
/// [`SceneId`]; the stage drives the frame cycle because cross-scene moves
/// need access to both ends of the transfer.
pub struct Scene {
    pub(crate) id: SceneId,
    pub(crate) entities: Vec<Box<dyn Entity>>,
    pub(crate) pending_new: Vec<Box<dyn Entity>>,
    pub(crate) pending_moves: Vec<(SceneId, EntityId)>,
    pub(crate) events: EventHandler,
    pub(crate) camera: Camera,
    pub(crate) updating: bool,
}

impl Scene {
    pub(crate) fn new(id: SceneId) -> Self {
        Self {
            id,
            entities: Vec::new(),
            pending_new: Vec::new(),
            pending_moves: Vec::new(),
            events: EventHandler::new(),
            camera: Camera::default(),
            updating: false,
        }
    }

    /// The handle this scene is addressed by.
    pub fn id(&self) -> SceneId {
        self.id
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// The scene's event subscriptions.
    pub fn events(&self) -> &EventHandler {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventHandler {
        &mut self.events
    }

    /// Register a condition→effect subscription scoped to this scene.
    pub fn connect(&mut self, condition: Condition, effect: Effect) -> Connection {
        self.events.connect(condition, effect)
    }

    /// Remove a subscription. Returns `true` if it was registered.
    pub fn disconnect(&mut self, connection: Connection) -> bool {
        self.events.disconnect(connection)
    }

    /// Number of entities owned by this scene, live and pending.
    pub fn len(&self) -> usize {
        self.entities.len() + self.pending_new.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.pending_new.is_empty()
    }

    /// Whether this scene owns the entity, live or pending.
    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.iter().any(|e| e.id() == entity)
            || self.pending_new.iter().any(|e| e.id() == entity)
    }

    /// Borrow a live entity by id.
    pub fn entity(&self, entity: EntityId) -> Option<&dyn Entity> {
        self.entities
            .iter()
            .find(|e| e.id() == entity)
            .map(|e| e.as_ref())
    }

    /// Iterate the live entities in their current order.
    pub fn entities(&self) -> impl Iterator<Item = &dyn Entity> {
        self.entities.iter().map(|e| e.as_ref())
    }

    /// Mutably borrow a live entity by id.
    pub fn entity_mut(&mut self, entity: EntityId) -> Option<&mut (dyn Entity + 'static)> {
        self.entities
            .iter_mut()
            .find(|e| e.id() == entity)
            .map(|e| e.as_mut())
    }

    /// Transfer ownership of an entity into this scene.
    ///
    /// Sets the entity's back-reference and fires `on_added` synchronously.
    /// Outside an update the entity joins the live collection immediately;
    /// mid-update it is staged in the pending buffer and joins at the next
    /// insert-reconciliation phase.
    ///
    /// Fails with [`SceneError::DuplicateEntity`] if the entity is already
    /// owned by a scene or its id collides with an entity already here.
    pub fn insert(&mut self, mut entity: Box<dyn Entity>) -> Result<EntityId, SceneError> {
        let id = entity.id();
        if self.would_collide(entity.as_ref()) {
            return Err(SceneError::DuplicateEntity(id));
        }
        entity.base_mut().attach(self.id);
        entity.on_added();
        if self.updating {
            self.pending_new.push(entity);
        } else {
            self.entities.push(entity);
        }
        Ok(id)
    }

    /// Transfer ownership of a live entity out to the caller.
    ///
    /// The single primitive explicit removal and move reconciliation build
    /// on: the entity leaves the live collection (order preserved), its
    /// back-reference is cleared, and `on_removed` fires. Returns `None`
    /// if no live entity has this id.
    pub fn release(&mut self, entity: EntityId) -> Option<Box<dyn Entity>> {
        let index = self.entities.iter().position(|e| e.id() == entity)?;
        let mut released = self.entities.remove(index);
        released.base_mut().detach();
        released.on_removed();
        Some(released)
    }

    /// Stable-sort the live collection by layer ascending (ties keep their
    /// relative order) and draw every non-removed entity through the
    /// scene's camera. Reorders only; membership is untouched.
    pub fn draw(&mut self, target: &mut dyn RenderTarget) {
        self.entities.sort_by_key(|e| e.layer());
        let camera = self.camera;
        for entity in &self.entities {
            if entity.is_removed() {
                continue;
            }
            entity.draw(&camera, target);
        }
    }

    pub(crate) fn would_collide(&self, entity: &dyn Entity) -> bool {
        entity.base().scene().is_some() || self.contains(entity.id())
    }

    pub(crate) fn live_ids(&self) -> Vec<EntityId> {
        self.entities.iter().map(|e| e.id()).collect()
    }

    /// Delete-reconciliation: purge every flagged entity in order, firing
    /// `on_removed` and clearing the back-reference as each leaves.
    pub(crate) fn purge_removed(&mut self) {
        self.entities.retain_mut(|entity| {
            if entity.is_removed() {
                entity.base_mut().detach();
                entity.on_removed();
                false
            } else {
                true
            }
        });
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        debug!(scene = %self.id, entities = self.len(), "scene dropped");
    }
}
