//! Transient forces that come from the user pressing and dragging.
//!
//! A force is anchored where the pointer went down and follows drags. Its `decay` starts at 1.0
//! and falls linearly to 0.0 over `decay_time` seconds, at which point it's removed. The field is
//! also the only way, apart from emitters, that particles get added to or removed from the store
//! from outside the simulation: clicks.

use glam::Vec2;

use crate::{
    events::Event,
    particle::{Particle, ParticleId},
    store::ParticleStore,
};

/// Decay values below this are treated as zero. Absorbs the float error of summing many small
/// time steps.
const DECAY_EPSILON: f32 = 1e-4;

/// The unique ID of an interaction force.
pub type ForceId = u64;

/// How an interaction force pushes particles around.
#[derive(serde::Serialize, serde::Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ForceKind {
    /// Push away from the pointer
    #[default]
    Repel,
    /// Pull toward the pointer, linear falloff
    Attract,
    /// Pull toward the pointer, sharper quadratic falloff
    Magnetic,
    /// Pull toward the pointer, softened inverse-square falloff
    Gravity,
    /// Swirl around the pointer
    Orbit,
    /// Push in a random direction
    Scatter,
}

/// A single decaying force.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct InteractionForce {
    /// Unique ID
    pub id: ForceId,
    /// Where the force is anchored
    pub position: Vec2,
    /// Strength at the anchor when fully charged
    pub strength: f32,
    /// How far the force reaches
    pub radius: f32,
    /// What the force does
    pub kind: ForceKind,
    /// 1.0 when new, 0.0 when spent
    pub decay: f32,
    /// Whether the pointer that made the force is still down
    pub is_held: bool,
}

impl InteractionForce {
    /// The magnitude of the force at a normalised distance from the anchor, before shaping by
    /// kind.
    #[must_use]
    pub fn magnitude_at(&self, normalised_distance: f32) -> f32 {
        self.strength * self.decay * (1.0 - normalised_distance)
    }
}

/// All the config for pointer interactions.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
#[non_exhaustive]
pub struct Config {
    /// Seconds for a force to decay from 1.0 to 0.0
    pub decay_time: f32,
    /// Strength used when an input doesn't say
    pub default_strength: f32,
    /// Radius used when an input doesn't say
    pub default_radius: f32,
    /// How close a click must be to a particle to remove it
    pub pick_radius: f32,
    /// Whether clicking empty space creates particles
    pub click_to_create: bool,
    /// Whether clicking a particle removes it
    pub click_to_remove: bool,
    /// The particle created by clicks. Its position is replaced by the click's.
    pub template: crate::emitter::Config,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            decay_time: 1.0,
            default_strength: 400.0,
            default_radius: 120.0,
            pick_radius: 30.0,
            click_to_create: true,
            click_to_remove: true,
            template: crate::emitter::Config {
                velocity: Vec2::ZERO,
                velocity_randomness: 40.0,
                ..crate::emitter::Config::default()
            },
        }
    }
}

impl Config {
    /// Clamp every value into a safe range.
    #[must_use]
    pub fn sanitised(mut self) -> Self {
        use crate::config::at_least;

        let defaults = Self::default();
        self.decay_time = at_least(
            "interaction.decay_time",
            self.decay_time,
            f32::EPSILON,
            defaults.decay_time,
        );
        self.default_radius = at_least(
            "interaction.default_radius",
            self.default_radius,
            0.0,
            defaults.default_radius,
        );
        self.default_strength = crate::config::within(
            "interaction.default_strength",
            self.default_strength,
            f32::MIN,
            f32::MAX,
            defaults.default_strength,
        );
        self.pick_radius = at_least(
            "interaction.pick_radius",
            self.pick_radius,
            0.0,
            defaults.pick_radius,
        );
        self.template = self.template.sanitised();
        self
    }
}

/// Holds every active interaction force.
#[derive(Debug, Clone)]
pub struct InteractionForceField {
    /// Active forces, oldest first
    forces: Vec<InteractionForce>,
    /// The ID the next force gets
    next_id: ForceId,
    /// Seconds for a force to fully decay
    decay_time: f32,
}

impl Default for InteractionForceField {
    fn default() -> Self {
        Self::new(Config::default().decay_time)
    }
}

impl InteractionForceField {
    /// An empty field.
    #[must_use]
    pub const fn new(decay_time: f32) -> Self {
        Self {
            forces: Vec::new(),
            next_id: 1,
            decay_time,
        }
    }

    /// Anchor a new force. Radius and strength aren't validated, a negative radius just never
    /// reaches anything.
    pub fn add_force(
        &mut self,
        position: Vec2,
        kind: ForceKind,
        strength: f32,
        radius: f32,
    ) -> (ForceId, Event) {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.forces.push(InteractionForce {
            id,
            position,
            strength,
            radius,
            kind,
            decay: 1.0,
            is_held: true,
        });
        tracing::trace!("Interaction force {id} ({kind:?}) started at {position}");
        (
            id,
            Event::InteractionStarted {
                force: id,
                position,
                kind,
            },
        )
    }

    /// Follow a drag.
    pub fn move_force(&mut self, id: ForceId, position: Vec2) -> bool {
        match self.forces.iter_mut().find(|force| force.id == id) {
            Some(force) => {
                force.position = position;
                true
            }
            None => false,
        }
    }

    /// The pointer was lifted. The force carries on decaying until it's spent.
    pub fn release(&mut self, id: ForceId) -> bool {
        match self.forces.iter_mut().find(|force| force.id == id) {
            Some(force) => {
                force.is_held = false;
                true
            }
            None => false,
        }
    }

    /// Decay every force and remove the spent ones.
    pub fn tick(&mut self, dt: f32) -> Vec<Event> {
        let step = dt.max(0.0) / self.decay_time;
        let mut ended = Vec::new();
        self.forces.retain_mut(|force| {
            force.decay -= step;
            if force.decay <= DECAY_EPSILON {
                force.decay = 0.0;
                tracing::trace!("Interaction force {} ended", force.id);
                ended.push(Event::InteractionEnded { force: force.id });
                return false;
            }
            true
        });
        ended
    }

    /// All the active forces.
    #[must_use]
    pub fn forces(&self) -> &[InteractionForce] {
        &self.forces
    }

    /// Look up a force.
    #[must_use]
    pub fn get(&self, id: ForceId) -> Option<&InteractionForce> {
        self.forces.iter().find(|force| force.id == id)
    }

    /// Drop every force without firing events.
    pub fn clear(&mut self) {
        self.forces.clear();
    }

    /// Add a particle where the user clicked, if there's room.
    pub fn click_create(
        store: &mut ParticleStore,
        position: Vec2,
        mut particle: Particle,
    ) -> Option<(ParticleId, Event)> {
        if !store.has_room() {
            tracing::trace!("Ignoring click-create, the store is full");
            return None;
        }
        particle.position = position;
        let (id, _evicted) = store.insert(particle);
        Some((id, Event::ParticleCreated { id }))
    }

    /// Remove the particle nearest to where the user clicked, if there's one close enough.
    pub fn click_remove(
        store: &mut ParticleStore,
        position: Vec2,
        pick_radius: f32,
    ) -> Option<(Particle, Event)> {
        let id = store.nearest_within(position, pick_radius)?;
        let particle = store.remove(id)?;
        Some((particle, Event::ParticleRemoved { id }))
    }
}
