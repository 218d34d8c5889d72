//! Scene lifecycle events.
//!
//! Components push [`SceneEvent`]s into an [`EventBuffer`]; the frame loop
//! drains it once per frame, so every event is observed exactly once.

use crate::id::EntityId;
use crate::mesh::Layer;

/// Notable changes to the scene's content.
#[derive(Clone, Debug, PartialEq)]
pub enum SceneEvent {
    /// An entity gained a mesh on the given layer.
    EntityCreated { id: EntityId, layer: Layer },
    /// An entity's mesh on the given layer was disposed.
    EntityRemoved { id: EntityId, layer: Layer },
    /// Fallback-map mode was entered (`true`) or left (`false`).
    DegradedModeChanged { active: bool },
}

/// Queue of events awaiting the next drain.
pub struct EventBuffer<E> {
    pending: Vec<E>,
}

impl<E> EventBuffer<E> {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    pub fn send(&mut self, event: E) {
        self.pending.push(event);
    }

    /// Pending events, oldest first.
    pub fn read(&self) -> impl Iterator<Item = &E> {
        self.pending.iter()
    }

    /// Take every pending event.
    pub fn drain(&mut self) -> Vec<E> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl<E> Default for EventBuffer<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(id: &str) -> SceneEvent {
        SceneEvent::EntityCreated {
            id: EntityId::new(id),
            layer: Layer::Entity,
        }
    }

    #[test]
    fn test_read_order_is_oldest_first() {
        let mut buf = EventBuffer::new();
        buf.send(created("a"));
        buf.send(SceneEvent::DegradedModeChanged { active: true });

        let events: Vec<_> = buf.read().cloned().collect();
        assert_eq!(events[0], created("a"));
        assert_eq!(events[1], SceneEvent::DegradedModeChanged { active: true });
        assert_eq!(buf.len(), 2, "reading does not consume");
    }

    #[test]
    fn test_drain_observes_each_event_once() {
        let mut buf = EventBuffer::new();
        buf.send(created("a"));
        buf.send(created("b"));
        assert_eq!(buf.drain().len(), 2);
        assert!(buf.is_empty());

        buf.send(created("c"));
        assert_eq!(buf.drain(), vec![created("c")]);
    }
}
