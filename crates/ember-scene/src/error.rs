use crate::entity::EntityId;
use crate::stage::SceneId;

/// Errors that can occur in the scene system.
///
/// These are the fatal conditions: they signal an ownership-tracking bug in
/// the caller and propagate out of the frame. Recoverable conditions (stale
/// handles, dangling move requests) are logged and skipped instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    #[error("entity {0} already added")]
    DuplicateEntity(EntityId),

    #[error("scene {0} does not exist")]
    SceneNotFound(SceneId),
}
