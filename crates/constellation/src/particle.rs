//! The simulated point entity and its visual attributes.

use glam::Vec2;

/// An RGBA colour. The simulation never looks inside it, it is just carried through to the
/// drawing backend.
pub type Colour = (f32, f32, f32, f32);

/// A default pure white.
pub const WHITE: Colour = (1.0, 1.0, 1.0, 1.0);

/// The unique ID of a particle. IDs are allocated by the [`crate::store::ParticleStore`] and are
/// never reused within one simulation.
pub type ParticleId = u64;

/// The visual variant of a particle. Only the drawing backend cares about this.
#[derive(serde::Serialize, serde::Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ParticleKind {
    /// A filled circle
    #[default]
    Circle,
    /// A filled square
    Square,
    /// A filled triangle
    Triangle,
    /// A five-pointed star
    Star,
}

/// A single particle.
#[derive(serde::Serialize, serde::Deserialize, bon::Builder, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct Particle {
    /// The ID, assigned when the particle is inserted into the store.
    #[builder(default)]
    pub id: ParticleId,
    /// Position in simulation space. [0, 0] is the top-left of the bounds.
    #[builder(default)]
    pub position: Vec2,
    /// Velocity in units per second.
    #[builder(default)]
    pub velocity: Vec2,
    /// The radius of the particle. Also used as its mass in collisions.
    #[builder(default = 2.0)]
    pub size: f32,
    /// Opaque colour token.
    #[builder(default = WHITE)]
    pub colour: Colour,
    /// Current opacity, 0.0 to 1.0.
    #[builder(default = 1.0)]
    pub opacity: f32,
    /// The opacity the particle was born with. Ageing fades relative to this.
    #[builder(default = 1.0)]
    pub base_opacity: f32,
    /// Remaining life in seconds.
    #[builder(default = 5.0)]
    pub life: f32,
    /// The life the particle started with.
    #[builder(default = 5.0)]
    pub max_life: f32,
    /// The visual variant.
    #[builder(default)]
    pub kind: ParticleKind,
}

impl Particle {
    /// A particle whose life has run out. It gets removed before the next render.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.life <= 0.0
    }

    /// How far through its life the particle is, 0.0 for newborn, 1.0 for dead.
    #[must_use]
    pub fn age_ratio(&self) -> f32 {
        if self.max_life <= 0.0 {
            return 1.0;
        }
        (1.0 - self.life / self.max_life).clamp(0.0, 1.0)
    }

    /// Reduce the particle's life by `dt` seconds. Life never increases.
    pub fn age(&mut self, dt: f32, fade_with_age: bool) {
        self.life -= dt.max(0.0);
        if fade_with_age {
            self.opacity = (self.base_opacity * (1.0 - self.age_ratio())).clamp(0.0, 1.0);
        }
    }

    /// Kill the particle and make it invisible. Used by the absorbing boundary.
    pub fn absorb(&mut self) {
        self.opacity = 0.0;
        self.life = 0.0;
    }

    /// Whether the particle's physical state is made of real numbers.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite()
    }

    /// Mass used in collisions. Particles must have some mass, even if their size is broken.
    #[must_use]
    pub fn mass(&self) -> f32 {
        self.size.max(f32::EPSILON)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ageing_never_increases_life() {
        let mut particle = Particle::builder().life(1.0).max_life(1.0).build();
        particle.age(-5.0, false);
        assert!((particle.life - 1.0).abs() < f32::EPSILON);
        particle.age(0.25, false);
        assert!((particle.life - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn fading_follows_life() {
        let mut particle = Particle::builder()
            .life(2.0)
            .max_life(2.0)
            .base_opacity(0.8)
            .build();
        particle.age(1.0, true);
        assert!((particle.opacity - 0.4).abs() < 1e-6);
        particle.age(5.0, true);
        assert!(particle.opacity.abs() < f32::EPSILON);
        assert!(particle.is_dead());
    }

    #[test]
    fn absorbed_particles_are_dead_and_invisible() {
        let mut particle = Particle::builder().build();
        particle.absorb();
        assert!(particle.is_dead());
        assert!(particle.opacity.abs() < f32::EPSILON);
    }
}
