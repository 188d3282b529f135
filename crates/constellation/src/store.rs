//! The canonical collection of live particles.

use glam::Vec2;

use crate::particle::{Particle, ParticleId};

/// Owns every live particle. The oldest particle is always at the front.
#[derive(Debug, Clone)]
pub struct ParticleStore {
    /// All the particles, in insertion order.
    particles: Vec<Particle>,
    /// The ID that the next inserted particle gets.
    next_id: ParticleId,
    /// Hard cap on the number of live particles.
    max_particles: usize,
}

impl Default for ParticleStore {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_PARTICLES)
    }
}

impl ParticleStore {
    /// An empty store. The cap is never less than one.
    #[must_use]
    pub const fn new(max_particles: usize) -> Self {
        Self {
            particles: Vec::new(),
            next_id: 1,
            max_particles: if max_particles == 0 { 1 } else { max_particles },
        }
    }

    /// The particle cap.
    #[must_use]
    pub const fn max_particles(&self) -> usize {
        self.max_particles
    }

    /// Change the particle cap. Doesn't evict anything until the next insert.
    pub fn set_max_particles(&mut self, max_particles: usize) {
        self.max_particles = max_particles.max(1);
    }

    /// Whether another particle fits without evicting anything.
    #[must_use]
    pub fn has_room(&self) -> bool {
        self.particles.len() < self.max_particles
    }

    /// Add a particle, giving it a fresh ID. If the store is full the oldest particles are evicted
    /// and returned.
    pub fn insert(&mut self, mut particle: Particle) -> (ParticleId, Vec<Particle>) {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        particle.id = id;
        self.particles.push(particle);
        (id, self.evict_overflow())
    }

    /// Drop the oldest particles until we're under the cap.
    fn evict_overflow(&mut self) -> Vec<Particle> {
        let overflow = self.particles.len().saturating_sub(self.max_particles);
        if overflow == 0 {
            return Vec::new();
        }
        tracing::trace!("Evicting {overflow} particles to stay under the cap");
        self.particles.drain(..overflow).collect()
    }

    /// Remove a specific particle.
    pub fn remove(&mut self, id: ParticleId) -> Option<Particle> {
        let index = self.particles.iter().position(|particle| particle.id == id)?;
        Some(self.particles.remove(index))
    }

    /// Remove and return every particle whose life has run out.
    pub fn remove_dead(&mut self) -> Vec<Particle> {
        let mut dead = Vec::new();
        self.particles.retain(|particle| {
            if particle.is_dead() {
                dead.push(particle.clone());
                false
            } else {
                true
            }
        });
        dead
    }

    /// Age every particle by `dt` seconds.
    pub fn age(&mut self, dt: f32, fade_with_age: bool) {
        for particle in &mut self.particles {
            particle.age(dt, fade_with_age);
        }
    }

    /// The nearest particle to `position` that is within `radius` of it.
    #[must_use]
    pub fn nearest_within(&self, position: Vec2, radius: f32) -> Option<ParticleId> {
        let radius_squared = radius * radius;
        self.particles
            .iter()
            .map(|particle| (particle.id, particle.position.distance_squared(position)))
            .filter(|(_, distance_squared)| *distance_squared <= radius_squared)
            .min_by(|left, right| left.1.total_cmp(&right.1))
            .map(|(id, _)| id)
    }

    /// Look up a particle.
    #[must_use]
    pub fn get(&self, id: ParticleId) -> Option<&Particle> {
        self.particles.iter().find(|particle| particle.id == id)
    }

    /// All the particles, oldest first.
    #[must_use]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Replace every particle with a new snapshot, as produced by physics.
    pub fn commit(&mut self, particles: Vec<Particle>) {
        self.particles = particles;
    }

    /// Number of live particles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Whether there are no particles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Remove every particle. IDs keep counting up.
    pub fn clear(&mut self) {
        self.particles.clear();
    }
}

#[cfg(test)]
#[expect(clippy::indexing_slicing, reason = "Tests aren't so strict")]
mod test {
    use super::*;

    fn particle_at(x: f32, y: f32) -> Particle {
        Particle::builder().position(Vec2::new(x, y)).build()
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let mut store = ParticleStore::new(10);
        let (first, _) = store.insert(particle_at(0.0, 0.0));
        let (second, _) = store.insert(particle_at(0.0, 0.0));
        assert!(second > first);
        assert_eq!(store.particles()[1].id, second);
    }

    #[test]
    fn oldest_particles_are_evicted() {
        let mut store = ParticleStore::new(2);
        let (oldest, _) = store.insert(particle_at(0.0, 0.0));
        store.insert(particle_at(1.0, 0.0));
        let (newest, evicted) = store.insert(particle_at(2.0, 0.0));

        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, oldest);
        assert_eq!(store.len(), 2);
        assert_eq!(store.particles()[1].id, newest);
    }

    #[test]
    fn a_zero_cap_still_keeps_the_newest_particle() {
        let mut store = ParticleStore::new(0);
        let (id, evicted) = store.insert(particle_at(0.0, 0.0));
        assert!(evicted.is_empty());
        assert_eq!(store.particles()[0].id, id);

        store.set_max_particles(0);
        let (newest, evicted) = store.insert(particle_at(1.0, 0.0));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, id);
        assert_eq!(store.particles()[0].id, newest);
    }

    #[test]
    fn dead_particles_are_removed() {
        let mut store = ParticleStore::new(10);
        store.insert(Particle::builder().life(0.5).max_life(1.0).build());
        let (survivor, _) = store.insert(Particle::builder().life(2.0).max_life(2.0).build());

        store.age(0.5, false);
        let dead = store.remove_dead();

        assert_eq!(dead.len(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.particles()[0].id, survivor);
    }

    #[test]
    fn nearest_within_picks_the_closest() {
        let mut store = ParticleStore::new(10);
        store.insert(particle_at(10.0, 0.0));
        let (close, _) = store.insert(particle_at(3.0, 0.0));
        store.insert(particle_at(100.0, 0.0));

        assert_eq!(store.nearest_within(Vec2::ZERO, 20.0), Some(close));
        assert_eq!(store.nearest_within(Vec2::new(500.0, 0.0), 20.0), None);
    }
}
