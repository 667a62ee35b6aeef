//! Condition/effect event subscriptions
//!
//! Each scene owns an [`EventHandler`]. Subscriptions pair a condition with
//! an effect; the driver propagates the handler once per frame, running every
//! effect whose condition currently holds. Subscriptions live no longer than
//! the scene that owns them.

/// Predicate deciding whether an effect should fire this frame.
pub type Condition = Box<dyn Fn() -> bool>;

/// Action run when its paired condition holds.
pub type Effect = Box<dyn FnMut()>;

/// Handle to a registered subscription, usable to disconnect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Connection(u64);

struct Subscription {
    id: u64,
    condition: Condition,
    effect: Effect,
}

/// Registry of condition→effect subscriptions.
#[derive(Default)]
pub struct EventHandler {
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl EventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription and return its handle.
    pub fn connect(&mut self, condition: Condition, effect: Effect) -> Connection {
        let id = self.next_id;
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            condition,
            effect,
        });
        Connection(id)
    }

    /// Remove a subscription. Returns `true` if it was registered.
    pub fn disconnect(&mut self, connection: Connection) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|sub| sub.id != connection.0);
        self.subscriptions.len() != before
    }

    /// Run every effect whose condition holds, in registration order.
    pub fn propagate(&mut self) {
        for sub in &mut self.subscriptions {
            if (sub.condition)() {
                (sub.effect)();
            }
        }
    }

    /// Number of registered subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
