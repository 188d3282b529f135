//! All the maths of moving particles.
//!
//! Every tick, for every particle:
//! 1. Accumulate forces: gravity, wind, drag, orbital gravity, pairwise attraction/repulsion and
//!    the user's interaction forces. They're simply summed, so order doesn't matter.
//! 2. Integrate: `v += F * dt`, `v *= friction`, `p += v * dt`. Under the wrap policy a particle
//!    that starts the tick past an edge is wrapped instead, and not integrated.
//! 3. Resolve collisions between overlapping particles.
//! 4. Apply the boundary policy.
//!
//! Forces are all read from the snapshot as it was at the start of the tick, and collisions from
//! the snapshot as it was straight after integration. Nothing ever reads a half-updated particle.
//! The step can't fail: degenerate geometry gives zero force, and anything that still manages to
//! become `NaN` is absorbed.

use glam::Vec2;

use crate::{
    config::Bounds,
    forces::{ForceKind, InteractionForce},
    particle::Particle,
    rng::SimulationRng,
    spatial::Neighbours,
};

/// Distances shorter than this are treated as zero, so they never end up as a denominator.
pub const MIN_DISTANCE: f32 = 1e-3;

/// What happens to a particle when it reaches the edge of the bounds.
#[derive(serde::Serialize, serde::Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum BoundaryPolicy {
    /// Reflect off the edge, losing some speed.
    #[default]
    Bounce,
    /// Reappear on the opposite edge.
    Wrap,
    /// Die at the edge.
    Absorb,
    /// Carry on out of the bounds.
    #[serde(rename = "none")]
    Open,
}

/// Attraction or repulsion between every pair of nearby particles.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
#[non_exhaustive]
pub struct PairForce {
    /// Whether the force is applied
    pub enabled: bool,
    /// How far the force reaches
    pub radius: f32,
    /// The force between two particles that are touching
    pub strength: f32,
}

impl Default for PairForce {
    fn default() -> Self {
        Self {
            enabled: false,
            radius: 80.0,
            strength: 20.0,
        }
    }
}

/// A heavy body that everything orbits.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
#[non_exhaustive]
pub struct CentralMass {
    /// Whether the central mass pulls on particles
    pub enabled: bool,
    /// Where it is
    pub position: Vec2,
    /// How heavy it is
    pub mass: f32,
}

impl Default for CentralMass {
    fn default() -> Self {
        Self {
            enabled: false,
            position: Vec2::new(400.0, 300.0),
            mass: 5000.0,
        }
    }
}

/// All the config for the physics.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
#[non_exhaustive]
pub struct Config {
    /// Constant acceleration, units per second per second
    pub gravity: Vec2,
    /// Constant push
    pub wind: Vec2,
    /// Force against the direction of travel, proportional to speed
    pub drag: f32,
    /// Velocity multiplier applied every tick, 1.0 is frictionless
    pub friction: f32,
    /// How much speed is kept when bouncing off the edges
    pub bounce: f32,
    /// What happens at the edges
    pub boundary: BoundaryPolicy,
    /// Whether particles collide with each other
    pub collisions: bool,
    /// How much speed is kept in a collision, 1.0 is perfectly elastic
    pub restitution: f32,
    /// Nearby particles pull on each other
    pub attraction: PairForce,
    /// Nearby particles push each other away
    pub repulsion: PairForce,
    /// Orbital gravity
    pub central_mass: CentralMass,
    /// Speed limit, zero means no limit
    pub max_speed: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gravity: Vec2::ZERO,
            wind: Vec2::ZERO,
            drag: 0.0,
            friction: 0.99,
            bounce: 0.8,
            boundary: BoundaryPolicy::default(),
            collisions: false,
            restitution: 0.9,
            attraction: PairForce::default(),
            repulsion: PairForce {
                radius: 30.0,
                ..PairForce::default()
            },
            central_mass: CentralMass::default(),
            max_speed: 0.0,
        }
    }
}

impl Config {
    /// Clamp every value into a safe range.
    #[must_use]
    pub fn sanitised(mut self) -> Self {
        use crate::config::{at_least, finite_vector, within};

        let defaults = Self::default();
        self.gravity = finite_vector("physics.gravity", self.gravity, Vec2::ZERO);
        self.wind = finite_vector("physics.wind", self.wind, Vec2::ZERO);
        self.drag = at_least("physics.drag", self.drag, 0.0, 0.0);
        self.friction = within("physics.friction", self.friction, 0.0, 1.0, defaults.friction);
        self.bounce = within("physics.bounce", self.bounce, 0.0, 1.0, defaults.bounce);
        self.restitution = within(
            "physics.restitution",
            self.restitution,
            0.0,
            1.0,
            defaults.restitution,
        );
        self.max_speed = at_least("physics.max_speed", self.max_speed, 0.0, 0.0);
        for (name, pair) in [
            ("physics.attraction", &mut self.attraction),
            ("physics.repulsion", &mut self.repulsion),
        ] {
            pair.radius = at_least(name, pair.radius, 0.0, 0.0);
            pair.strength = at_least(name, pair.strength, 0.0, 0.0);
        }
        self.central_mass.position = finite_vector(
            "physics.central_mass.position",
            self.central_mass.position,
            defaults.central_mass.position,
        );
        self.central_mass.mass = at_least(
            "physics.central_mass.mass",
            self.central_mass.mass,
            0.0,
            0.0,
        );
        self
    }

    /// Whether any force depends on other particles.
    #[must_use]
    pub const fn has_pair_forces(&self) -> bool {
        self.attraction.enabled || self.repulsion.enabled
    }
}

/// Moves particles.
#[derive(Debug, Clone)]
pub struct PhysicsEngine {
    /// Physics config
    pub config: Config,
    /// The simulated area
    pub bounds: Bounds,
    /// Particle count above which neighbour queries use a spatial index
    pub spatial_index_threshold: usize,
}

#[expect(
    clippy::indexing_slicing,
    reason = "Indices always come from iterating the same snapshot"
)]
impl PhysicsEngine {
    /// A physics engine for the given bounds.
    #[must_use]
    pub const fn new(config: Config, bounds: Bounds, spatial_index_threshold: usize) -> Self {
        Self {
            config,
            bounds,
            spatial_index_threshold,
        }
    }

    /// Advance every particle by `dt` seconds, returning the new snapshot.
    pub fn step(
        &self,
        particles: &[Particle],
        forces: &[InteractionForce],
        dt: f32,
        rng: &mut SimulationRng,
    ) -> Vec<Particle> {
        let neighbours = self
            .config
            .has_pair_forces()
            .then(|| Neighbours::new(particles, self.spatial_index_threshold));

        let mut next: Vec<Particle> = particles
            .iter()
            .enumerate()
            .map(|(index, particle)| {
                let force = self.accumulate(index, particles, forces, neighbours.as_ref(), rng);
                let mut particle = particle.clone();
                if self.config.boundary == BoundaryPolicy::Wrap && self.wrap(&mut particle) {
                    return particle;
                }
                self.integrate(particle, force, dt)
            })
            .collect();

        if self.config.collisions {
            resolve_collisions(
                &mut next,
                self.config.restitution,
                self.spatial_index_threshold,
            );
        }

        for particle in &mut next {
            self.apply_boundary(particle);
            if !particle.is_finite() {
                tracing::trace!("Particle {} went non-finite, absorbing it", particle.id);
                particle.position = Vec2::ZERO;
                particle.velocity = Vec2::ZERO;
                particle.absorb();
            }
        }

        next
    }

    /// The sum of every force acting on one particle.
    fn accumulate(
        &self,
        index: usize,
        particles: &[Particle],
        forces: &[InteractionForce],
        neighbours: Option<&Neighbours>,
        rng: &mut SimulationRng,
    ) -> Vec2 {
        let particle = &particles[index];
        let mut total = self.config.gravity + self.config.wind;
        total -= particle.velocity * self.config.drag;
        total += self.orbital_force(particle);
        if let Some(neighbours) = neighbours {
            total += self.pair_force(index, particles, neighbours);
        }
        for force in forces {
            total += interaction_force(force, particle, rng);
        }
        total
    }

    /// Pull toward the central mass: `mass * size / distance²`.
    fn orbital_force(&self, particle: &Particle) -> Vec2 {
        let central = &self.config.central_mass;
        if !central.enabled {
            return Vec2::ZERO;
        }
        let to_centre = central.position - particle.position;
        let distance_squared = to_centre.length_squared();
        if distance_squared <= MIN_DISTANCE * MIN_DISTANCE {
            return Vec2::ZERO;
        }
        let distance = distance_squared.sqrt();
        to_centre / distance * (central.mass * particle.size / distance_squared)
    }

    /// Attraction and repulsion from every nearby particle.
    fn pair_force(&self, index: usize, particles: &[Particle], neighbours: &Neighbours) -> Vec2 {
        let attraction = &self.config.attraction;
        let repulsion = &self.config.repulsion;
        let particle = &particles[index];

        let mut reach: f32 = 0.0;
        if attraction.enabled {
            reach = reach.max(attraction.radius);
        }
        if repulsion.enabled {
            reach = reach.max(repulsion.radius);
        }

        let mut total = Vec2::ZERO;
        for other_index in neighbours.within(particle.position, reach) {
            if other_index == index {
                continue;
            }
            let delta = particles[other_index].position - particle.position;
            let distance = delta.length();
            if distance <= MIN_DISTANCE {
                continue;
            }
            let direction = delta / distance;

            if attraction.enabled && distance < attraction.radius {
                total += direction * attraction.strength * (1.0 - distance / attraction.radius);
            }
            if repulsion.enabled && distance < repulsion.radius {
                total -= direction * repulsion.strength * (1.0 - distance / repulsion.radius);
            }
        }
        total
    }

    /// Semi-implicit Euler with friction and an optional speed limit.
    fn integrate(&self, mut particle: Particle, force: Vec2, dt: f32) -> Particle {
        particle.velocity += force * dt;
        particle.velocity *= self.config.friction;
        if self.config.max_speed > 0.0 {
            particle.velocity = particle.velocity.clamp_length_max(self.config.max_speed);
        }
        particle.position += particle.velocity * dt;
        particle
    }

    /// Keep a particle inside the bounds according to the boundary policy.
    pub fn apply_boundary(&self, particle: &mut Particle) {
        let size = particle.size;
        let width = self.bounds.width;
        let height = self.bounds.height;

        match self.config.boundary {
            BoundaryPolicy::Bounce => {
                let bounce = self.config.bounce;
                if particle.position.x < size {
                    particle.position.x = size;
                    particle.velocity.x = particle.velocity.x.abs() * bounce;
                } else if particle.position.x > width - size {
                    particle.position.x = width - size;
                    particle.velocity.x = -particle.velocity.x.abs() * bounce;
                }
                if particle.position.y < size {
                    particle.position.y = size;
                    particle.velocity.y = particle.velocity.y.abs() * bounce;
                } else if particle.position.y > height - size {
                    particle.position.y = height - size;
                    particle.velocity.y = -particle.velocity.y.abs() * bounce;
                }
            }
            BoundaryPolicy::Wrap => {
                self.wrap(particle);
            }
            BoundaryPolicy::Absorb => {
                let position = particle.position;
                let is_outside = position.x < size
                    || position.x > width - size
                    || position.y < size
                    || position.y > height - size;
                if is_outside {
                    particle.absorb();
                }
            }
            BoundaryPolicy::Open => (),
        }
    }

    /// Teleport a particle that is past an edge to just beyond the opposite edge. True if it moved.
    ///
    /// Runs on the incoming position as well as after integration, so a particle that starts a
    /// tick outside the bounds always wraps, whichever way it's heading. A particle wrapped on
    /// the way in isn't moved again that tick.
    fn wrap(&self, particle: &mut Particle) -> bool {
        let size = particle.size;
        let width = self.bounds.width;
        let height = self.bounds.height;
        let before = particle.position;

        if particle.position.x > width + size {
            particle.position.x = -size;
        } else if particle.position.x < -size {
            particle.position.x = width + size;
        }
        if particle.position.y > height + size {
            particle.position.y = -size;
        } else if particle.position.y < -size {
            particle.position.y = height + size;
        }

        particle.position != before
    }
}

/// The force a single interaction force exerts on a particle.
///
/// The base magnitude is `strength * decay * (1 - distance / radius)`, which is then shaped by
/// the force's kind. Particles outside the radius, or sitting exactly on the anchor, feel
/// nothing.
pub fn interaction_force(
    force: &InteractionForce,
    particle: &Particle,
    rng: &mut SimulationRng,
) -> Vec2 {
    if force.radius <= 0.0 {
        return Vec2::ZERO;
    }
    let to_source = force.position - particle.position;
    let distance = to_source.length();
    if distance >= force.radius || distance <= MIN_DISTANCE {
        return Vec2::ZERO;
    }

    let normalised = distance / force.radius;
    let magnitude = force.magnitude_at(normalised);
    let toward = to_source / distance;

    match force.kind {
        ForceKind::Repel => -toward * magnitude,
        ForceKind::Attract => toward * magnitude,
        ForceKind::Magnetic => toward * magnitude * (1.0 - normalised),
        ForceKind::Gravity => toward * magnitude * (0.25 / normalised.mul_add(normalised, 0.25)),
        ForceKind::Orbit => toward.perp() * magnitude,
        ForceKind::Scatter => rng.direction() * magnitude,
    }
}

/// Push overlapping particles apart and bounce them off each other.
///
/// Every pair is visited once, in ascending index order. All corrections are calculated from the
/// particles as they were before this pass and then applied together, so the outcome doesn't
/// depend on which pair happened to be resolved first. `size` doubles as mass.
#[expect(
    clippy::indexing_slicing,
    reason = "Indices always come from iterating the same snapshot"
)]
pub fn resolve_collisions(
    particles: &mut [Particle],
    restitution: f32,
    spatial_index_threshold: usize,
) {
    let count = particles.len();
    if count < 2 {
        return;
    }

    let neighbours = Neighbours::new(particles, spatial_index_threshold);
    let largest = particles
        .iter()
        .map(|particle| particle.size)
        .filter(|size| size.is_finite())
        .fold(0.0_f32, f32::max);

    let mut position_corrections = vec![Vec2::ZERO; count];
    let mut velocity_corrections = vec![Vec2::ZERO; count];

    for first_index in 0..count {
        let first = &particles[first_index];
        for second_index in neighbours.within(first.position, first.size + largest) {
            if second_index <= first_index {
                continue;
            }
            let second = &particles[second_index];

            let delta = second.position - first.position;
            let distance = delta.length();
            let touching_distance = first.size + second.size;
            if distance >= touching_distance {
                continue;
            }

            let normal = if distance > MIN_DISTANCE {
                delta / distance
            } else {
                Vec2::X
            };
            let first_mass = first.mass();
            let second_mass = second.mass();
            let total_mass = first_mass + second_mass;

            let overlap = touching_distance - distance;
            position_corrections[first_index] -= normal * overlap * (second_mass / total_mass);
            position_corrections[second_index] += normal * overlap * (first_mass / total_mass);

            let velocity_along_normal = (second.velocity - first.velocity).dot(normal);
            if velocity_along_normal > 0.0 {
                continue;
            }
            let impulse = -(1.0 + restitution) * velocity_along_normal
                / (1.0 / first_mass + 1.0 / second_mass);
            velocity_corrections[first_index] -= normal * (impulse / first_mass);
            velocity_corrections[second_index] += normal * (impulse / second_mass);
        }
    }

    for (index, particle) in particles.iter_mut().enumerate() {
        particle.position += position_corrections[index];
        particle.velocity += velocity_corrections[index];
    }
}

#[cfg(test)]
#[expect(clippy::indexing_slicing, reason = "Tests aren't so strict")]
mod test {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn engine(config: Config) -> PhysicsEngine {
        PhysicsEngine::new(config, Bounds::new(100.0, 100.0), 256)
    }

    fn frictionless() -> Config {
        Config {
            friction: 1.0,
            ..Config::default()
        }
    }

    fn particle(position: Vec2, velocity: Vec2, size: f32) -> Particle {
        Particle::builder()
            .position(position)
            .velocity(velocity)
            .size(size)
            .build()
    }

    fn force(kind: ForceKind) -> InteractionForce {
        InteractionForce {
            id: 1,
            position: Vec2::ZERO,
            strength: 10.0,
            radius: 10.0,
            kind,
            decay: 1.0,
            is_held: true,
        }
    }

    #[test]
    fn head_on_elastic_collision_swaps_velocities() {
        let mut particles = vec![
            particle(Vec2::new(0.0, 0.0), Vec2::new(3.0, 0.0), 5.0),
            particle(Vec2::new(8.0, 0.0), Vec2::new(-3.0, 0.0), 5.0),
        ];

        resolve_collisions(&mut particles, 1.0, 256);

        assert!(particles[0].velocity.abs_diff_eq(Vec2::new(-3.0, 0.0), 1e-5));
        assert!(particles[1].velocity.abs_diff_eq(Vec2::new(3.0, 0.0), 1e-5));
        let distance = particles[0].position.distance(particles[1].position);
        assert!(distance >= 10.0 - 1e-5, "still overlapping at {distance}");
    }

    #[test]
    fn separating_pairs_get_no_impulse() {
        let mut particles = vec![
            particle(Vec2::new(0.0, 0.0), Vec2::new(-3.0, 0.0), 5.0),
            particle(Vec2::new(8.0, 0.0), Vec2::new(3.0, 0.0), 5.0),
        ];

        resolve_collisions(&mut particles, 1.0, 256);

        assert_eq!(particles[0].velocity, Vec2::new(-3.0, 0.0));
        assert_eq!(particles[1].velocity, Vec2::new(3.0, 0.0));
    }

    #[test]
    fn collisions_are_the_same_with_the_spatial_index() {
        let make = || {
            vec![
                particle(Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.5), 4.0),
                particle(Vec2::new(5.0, 1.0), Vec2::new(-2.0, 0.0), 3.0),
                particle(Vec2::new(9.0, -1.0), Vec2::new(0.0, 1.0), 2.0),
                particle(Vec2::new(50.0, 50.0), Vec2::ZERO, 2.0),
            ]
        };
        let mut brute = make();
        let mut indexed = make();
        resolve_collisions(&mut brute, 0.7, usize::MAX);
        resolve_collisions(&mut indexed, 0.7, 0);
        assert_eq!(brute, indexed);
    }

    #[test]
    fn coincident_particles_are_pushed_apart_without_nans() {
        let mut particles = vec![
            particle(Vec2::new(5.0, 5.0), Vec2::ZERO, 1.0),
            particle(Vec2::new(5.0, 5.0), Vec2::ZERO, 1.0),
        ];
        resolve_collisions(&mut particles, 1.0, 256);
        assert!(particles.iter().all(Particle::is_finite));
        assert!(particles[0].position.distance(particles[1].position) > 1.0);
    }

    #[test]
    fn wrap_teleports_to_the_opposite_edge() {
        let physics = engine(Config {
            boundary: BoundaryPolicy::Wrap,
            ..frictionless()
        });
        for velocity_x in [-120.0, -30.0, 0.0, 30.0, 600.0] {
            let velocity = Vec2::new(velocity_x, 12.0);
            let particles = vec![particle(Vec2::new(100.0 + 2.0 + 1.0, 50.0), velocity, 2.0)];

            let next = physics.step(&particles, &[], DT, &mut SimulationRng::seeded(1));

            assert!(
                (next[0].position.x - -2.0).abs() < f32::EPSILON,
                "vx {velocity_x} ended at {}",
                next[0].position.x
            );
            assert_eq!(next[0].velocity, velocity);
        }
    }

    #[test]
    fn wrap_catches_particles_crossing_an_edge_during_the_tick() {
        let physics = engine(Config {
            boundary: BoundaryPolicy::Wrap,
            ..frictionless()
        });
        let particles = vec![particle(Vec2::new(1.0, 50.0), Vec2::new(-300.0, 0.0), 2.0)];

        let next = physics.step(&particles, &[], DT, &mut SimulationRng::seeded(1));

        assert!((next[0].position.x - 102.0).abs() < f32::EPSILON);
    }

    #[test]
    fn bounce_reflects_and_clamps() {
        let physics = engine(Config {
            boundary: BoundaryPolicy::Bounce,
            bounce: 0.5,
            ..frictionless()
        });
        let particles = vec![particle(Vec2::new(97.0, 50.0), Vec2::new(120.0, 0.0), 2.0)];

        let next = physics.step(&particles, &[], DT, &mut SimulationRng::seeded(1));

        assert!((next[0].position.x - 98.0).abs() < f32::EPSILON);
        assert!((next[0].velocity.x - -60.0).abs() < 1e-4);
    }

    #[test]
    fn absorb_kills_particles_at_the_edge() {
        let physics = engine(Config {
            boundary: BoundaryPolicy::Absorb,
            ..frictionless()
        });
        let particles = vec![
            particle(Vec2::new(99.0, 50.0), Vec2::new(120.0, 0.0), 2.0),
            particle(Vec2::new(50.0, 50.0), Vec2::ZERO, 2.0),
        ];

        let next = physics.step(&particles, &[], DT, &mut SimulationRng::seeded(1));

        assert!(next[0].is_dead());
        assert!(next[0].opacity.abs() < f32::EPSILON);
        assert!(!next[1].is_dead());
    }

    #[test]
    fn open_boundaries_let_particles_leave() {
        let physics = engine(Config {
            boundary: BoundaryPolicy::Open,
            ..frictionless()
        });
        let particles = vec![particle(Vec2::new(99.0, 50.0), Vec2::new(600.0, 0.0), 2.0)];
        let next = physics.step(&particles, &[], DT, &mut SimulationRng::seeded(1));
        assert!((next[0].position.x - 109.0).abs() < 1e-4);
    }

    #[test]
    fn gravity_wind_and_friction_integrate() {
        let physics = engine(Config {
            gravity: Vec2::new(0.0, 60.0),
            wind: Vec2::new(60.0, 0.0),
            friction: 0.5,
            boundary: BoundaryPolicy::Open,
            ..Config::default()
        });
        let particles = vec![particle(Vec2::new(50.0, 50.0), Vec2::ZERO, 1.0)];

        let next = physics.step(&particles, &[], DT, &mut SimulationRng::seeded(1));

        assert!(next[0].velocity.abs_diff_eq(Vec2::new(0.5, 0.5), 1e-5));
        assert!(next[0]
            .position
            .abs_diff_eq(Vec2::new(50.0 + 0.5 * DT, 50.0 + 0.5 * DT), 1e-5));
    }

    #[test]
    fn drag_opposes_velocity() {
        let physics = engine(Config {
            drag: 6.0,
            boundary: BoundaryPolicy::Open,
            ..frictionless()
        });
        let particles = vec![particle(Vec2::new(50.0, 50.0), Vec2::new(10.0, 0.0), 1.0)];
        let next = physics.step(&particles, &[], DT, &mut SimulationRng::seeded(1));
        assert!((next[0].velocity.x - 9.0).abs() < 1e-4);
    }

    #[test]
    fn speed_limit_is_respected() {
        let physics = engine(Config {
            max_speed: 5.0,
            boundary: BoundaryPolicy::Open,
            ..frictionless()
        });
        let particles = vec![particle(Vec2::new(50.0, 50.0), Vec2::new(100.0, 0.0), 1.0)];
        let next = physics.step(&particles, &[], DT, &mut SimulationRng::seeded(1));
        assert!((next[0].velocity.length() - 5.0).abs() < 1e-4);
    }

    #[test]
    fn orbital_gravity_pulls_toward_the_centre() {
        let physics = engine(Config {
            central_mass: CentralMass {
                enabled: true,
                position: Vec2::new(50.0, 50.0),
                mass: 100.0,
            },
            boundary: BoundaryPolicy::Open,
            ..frictionless()
        });
        let particles = vec![
            particle(Vec2::new(40.0, 50.0), Vec2::ZERO, 2.0),
            particle(Vec2::new(50.0, 50.0), Vec2::ZERO, 2.0),
        ];

        let next = physics.step(&particles, &[], DT, &mut SimulationRng::seeded(1));

        // 100 * 2 / 10² = 2 units per second per second, toward +x.
        assert!(next[0].velocity.abs_diff_eq(Vec2::new(2.0 * DT, 0.0), 1e-6));
        assert_eq!(next[1].velocity, Vec2::ZERO);
    }

    #[test]
    fn pair_forces_attract_and_repel() {
        let attracting = engine(Config {
            attraction: PairForce {
                enabled: true,
                radius: 20.0,
                strength: 60.0,
            },
            boundary: BoundaryPolicy::Open,
            ..frictionless()
        });
        let particles = vec![
            particle(Vec2::new(40.0, 50.0), Vec2::ZERO, 1.0),
            particle(Vec2::new(50.0, 50.0), Vec2::ZERO, 1.0),
        ];
        let next = attracting.step(&particles, &[], DT, &mut SimulationRng::seeded(1));
        // 60 * (1 - 10/20) = 30, times dt
        assert!(next[0].velocity.abs_diff_eq(Vec2::new(0.5, 0.0), 1e-5));
        assert!(next[1].velocity.abs_diff_eq(Vec2::new(-0.5, 0.0), 1e-5));

        let repelling = engine(Config {
            repulsion: PairForce {
                enabled: true,
                radius: 20.0,
                strength: 60.0,
            },
            boundary: BoundaryPolicy::Open,
            ..frictionless()
        });
        let next = repelling.step(&particles, &[], DT, &mut SimulationRng::seeded(1));
        assert!(next[0].velocity.abs_diff_eq(Vec2::new(-0.5, 0.0), 1e-5));
    }

    #[test]
    fn interaction_force_shapes() {
        let mut rng = SimulationRng::seeded(1);
        let target = particle(Vec2::new(5.0, 0.0), Vec2::ZERO, 1.0);

        // Base magnitude: 10 * 1 * (1 - 0.5) = 5
        let repel = interaction_force(&force(ForceKind::Repel), &target, &mut rng);
        assert!(repel.abs_diff_eq(Vec2::new(5.0, 0.0), 1e-5));

        let attract = interaction_force(&force(ForceKind::Attract), &target, &mut rng);
        assert!(attract.abs_diff_eq(Vec2::new(-5.0, 0.0), 1e-5));

        let magnetic = interaction_force(&force(ForceKind::Magnetic), &target, &mut rng);
        assert!(magnetic.abs_diff_eq(Vec2::new(-2.5, 0.0), 1e-5));

        let gravity = interaction_force(&force(ForceKind::Gravity), &target, &mut rng);
        assert!(gravity.abs_diff_eq(Vec2::new(-2.5, 0.0), 1e-5));

        let orbit = interaction_force(&force(ForceKind::Orbit), &target, &mut rng);
        assert!(orbit.dot(Vec2::X).abs() < 1e-5);
        assert!((orbit.length() - 5.0).abs() < 1e-5);

        let scatter = interaction_force(&force(ForceKind::Scatter), &target, &mut rng);
        assert!((scatter.length() - 5.0).abs() < 1e-4);
    }

    #[test]
    fn interaction_forces_have_limited_reach() {
        let mut rng = SimulationRng::seeded(1);
        let far = particle(Vec2::new(50.0, 0.0), Vec2::ZERO, 1.0);
        let on_top = particle(Vec2::ZERO, Vec2::ZERO, 1.0);
        let mut decayed = force(ForceKind::Attract);
        decayed.decay = 0.0;

        assert_eq!(interaction_force(&force(ForceKind::Repel), &far, &mut rng), Vec2::ZERO);
        assert_eq!(interaction_force(&force(ForceKind::Repel), &on_top, &mut rng), Vec2::ZERO);
        let near = particle(Vec2::new(1.0, 0.0), Vec2::ZERO, 1.0);
        assert_eq!(interaction_force(&decayed, &near, &mut rng), Vec2::ZERO);
    }

    #[test]
    fn broken_config_never_produces_nans() {
        let physics = engine(Config {
            gravity: Vec2::new(f32::MAX, f32::MAX),
            ..Config::default()
        });
        let particles = vec![particle(Vec2::new(50.0, 50.0), Vec2::ZERO, 1.0)];
        let next = physics.step(&particles, &[], 1.0, &mut SimulationRng::seeded(1));
        assert!(next[0].is_finite());
    }
}
