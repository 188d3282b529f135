//! Discrete things that happened during a tick.
//!
//! Events are purely observational: nothing in the simulation depends on anyone consuming them.
//! Hosts either read the list returned from each tick or register callbacks.

use glam::Vec2;

use crate::{connections::EdgeId, forces::ForceId, forces::ForceKind, particle::ParticleId};

/// Everything the simulation reports back to its host.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Event {
    /// An emitter spawned a particle.
    ParticleEmitted {
        /// The new particle
        id: ParticleId,
        /// Index of the emitter in the config
        emitter: usize,
    },
    /// A particle was created by a click.
    ParticleCreated {
        /// The new particle
        id: ParticleId,
    },
    /// A particle was removed by a click.
    ParticleRemoved {
        /// The removed particle
        id: ParticleId,
    },
    /// A particle ran out of life (or was absorbed by the boundary).
    ParticleExpired {
        /// The removed particle
        id: ParticleId,
    },
    /// The oldest particle was dropped to stay under the particle cap.
    ParticleEvicted {
        /// The removed particle
        id: ParticleId,
    },
    /// An edge exists this tick that didn't exist last tick.
    ConnectionFormed {
        /// The new edge
        edge: EdgeId,
    },
    /// An edge from last tick doesn't exist anymore.
    ConnectionBroken {
        /// The old edge
        edge: EdgeId,
    },
    /// A pointer started an interaction force.
    InteractionStarted {
        /// The new force
        force: ForceId,
        /// Where the force is anchored
        position: Vec2,
        /// What sort of force it is
        kind: ForceKind,
    },
    /// An interaction force decayed away.
    InteractionEnded {
        /// The spent force
        force: ForceId,
    },
}

/// A callback that receives every event.
pub type Listener = Box<dyn FnMut(&Event)>;

/// Explicitly registered event callbacks.
#[derive(Default)]
pub struct Listeners {
    /// All the callbacks, called in registration order.
    callbacks: Vec<Listener>,
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Listeners")
            .field("count", &self.callbacks.len())
            .finish()
    }
}

impl Listeners {
    /// Add a callback.
    pub fn subscribe<F: FnMut(&Event) + 'static>(&mut self, callback: F) {
        self.callbacks.push(Box::new(callback));
    }

    /// Remove all callbacks.
    pub fn clear(&mut self) {
        self.callbacks.clear();
    }

    /// Send events to every callback.
    pub fn dispatch(&mut self, events: &[Event]) {
        for callback in &mut self.callbacks {
            for event in events {
                callback(event);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    #[test]
    fn every_listener_sees_every_event() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut listeners = Listeners::default();

        let first = Rc::clone(&seen);
        listeners.subscribe(move |event| first.borrow_mut().push(("first", event.clone())));
        let second = Rc::clone(&seen);
        listeners.subscribe(move |event| second.borrow_mut().push(("second", event.clone())));

        listeners.dispatch(&[
            Event::ParticleCreated { id: 1 },
            Event::ParticleRemoved { id: 1 },
        ]);

        assert_eq!(seen.borrow().len(), 4);
        assert_eq!(seen.borrow()[0], ("first", Event::ParticleCreated { id: 1 }));
        assert_eq!(seen.borrow()[3], ("second", Event::ParticleRemoved { id: 1 }));
    }

    #[test]
    fn events_serialise_with_snake_case_tags() {
        let json = serde_json::to_value(Event::ParticleEmitted { id: 3, emitter: 0 }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"particle_emitted": {"id": 3, "emitter": 0}})
        );
    }
}
