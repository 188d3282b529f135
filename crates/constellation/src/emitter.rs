//! Emitters introduce new particles over time.
//!
//! An emitter either runs continuously, spawning a particle every `1 / rate` seconds, or in
//! bursts, spawning `count` particles at once and then again every `interval` seconds. Time is
//! accumulated across ticks, so a slow host still gets the right number of particles, up to
//! [`MAX_SPAWNS_PER_TICK`].

use glam::Vec2;

use crate::{
    particle::{Colour, Particle, ParticleKind, WHITE},
    rng::SimulationRng,
};

/// A ceiling on how many particles one emitter may spawn in a single tick. Protects the tick from
/// a huge `dt` or a silly rate.
pub const MAX_SPAWNS_PER_TICK: usize = 1000;

/// How an emitter decides when to spawn.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "mode")]
#[non_exhaustive]
pub enum Emission {
    /// A steady stream of particles.
    Continuous {
        /// Particles per second
        rate: f32,
    },
    /// Groups of particles at once.
    Burst {
        /// Particles per burst
        count: u32,
        /// Seconds between bursts. Zero means only the first burst happens.
        interval: f32,
    },
}

/// All the config for a single emitter.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
#[non_exhaustive]
pub struct Config {
    /// Whether the emitter starts enabled
    pub enabled: bool,
    /// Where particles are spawned
    pub position: Vec2,
    /// Continuous or burst
    pub emission: Emission,
    /// The initial velocity. Its length is the base speed and its direction is the emission
    /// angle, unless `angle` is set.
    pub velocity: Vec2,
    /// The base speed is randomised by plus or minus half of this.
    pub velocity_randomness: f32,
    /// Overrides the direction of `velocity`, in radians.
    pub angle: Option<f32>,
    /// The width of the emission cone, in radians, centred on the angle.
    pub spread: f32,
    /// Range of particle sizes
    pub size: (f32, f32),
    /// Range of particle lifetimes in seconds
    pub lifetime: (f32, f32),
    /// The opacity of new particles
    pub opacity: f32,
    /// Colours to pick from. Defaults to white when empty.
    pub colours: Vec<Colour>,
    /// Visual variants to pick from. Defaults to circles when empty.
    pub kinds: Vec<ParticleKind>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            position: Vec2::new(400.0, 300.0),
            emission: Emission::Continuous { rate: 10.0 },
            velocity: Vec2::new(0.0, -60.0),
            velocity_randomness: 20.0,
            angle: None,
            spread: std::f32::consts::TAU,
            size: (2.0, 5.0),
            lifetime: (3.0, 6.0),
            opacity: 1.0,
            colours: vec![WHITE],
            kinds: vec![ParticleKind::Circle],
        }
    }
}

impl Config {
    /// Clamp every value into a safe range.
    #[must_use]
    pub fn sanitised(mut self) -> Self {
        use crate::config::{at_least, finite_vector, ordered_range, within};

        let defaults = Self::default();
        self.position = finite_vector("emitter.position", self.position, defaults.position);
        self.velocity = finite_vector("emitter.velocity", self.velocity, Vec2::ZERO);
        self.velocity_randomness = at_least(
            "emitter.velocity_randomness",
            self.velocity_randomness,
            0.0,
            0.0,
        );
        self.angle = self.angle.filter(|angle| angle.is_finite());
        self.spread = within(
            "emitter.spread",
            self.spread,
            0.0,
            std::f32::consts::TAU,
            defaults.spread,
        );
        self.size = ordered_range("emitter.size", self.size, 0.01, defaults.size);
        self.lifetime = ordered_range("emitter.lifetime", self.lifetime, 0.0, defaults.lifetime);
        self.opacity = within("emitter.opacity", self.opacity, 0.0, 1.0, 1.0);
        self.emission = match self.emission {
            Emission::Continuous { rate } => Emission::Continuous {
                rate: at_least("emitter.emission.rate", rate, 0.0, 0.0),
            },
            Emission::Burst { count, interval } => Emission::Burst {
                count,
                interval: at_least("emitter.emission.interval", interval, 0.0, 0.0),
            },
        };
        self
    }

    /// The centre of the emission cone, in radians.
    #[must_use]
    pub fn base_angle(&self) -> f32 {
        match self.angle {
            Some(angle) => angle,
            None => {
                if self.velocity.length_squared() > 0.0 {
                    self.velocity.to_angle()
                } else {
                    0.0
                }
            }
        }
    }
}

/// Make one new particle according to an emitter's config. The returned particle has no ID yet,
/// the store gives it one.
#[must_use]
pub fn spawn(config: &Config, rng: &mut SimulationRng) -> Particle {
    let angle = config.base_angle() + rng.jitter(config.spread);
    let speed = (config.velocity.length() + rng.jitter(config.velocity_randomness)).max(0.0);
    let size = rng.range(config.size.0, config.size.1);
    let lifetime = rng.range(config.lifetime.0, config.lifetime.1);
    let colour = rng.pick(&config.colours).copied().unwrap_or(WHITE);
    let kind = rng.pick(&config.kinds).copied().unwrap_or_default();

    Particle::builder()
        .position(config.position)
        .velocity(Vec2::new(angle.cos(), angle.sin()) * speed)
        .size(size)
        .colour(colour)
        .opacity(config.opacity)
        .base_opacity(config.opacity)
        .life(lifetime)
        .max_life(lifetime)
        .kind(kind)
        .build()
}

/// A running emitter, with the timing state that carries between ticks.
#[derive(Debug, Clone)]
pub struct Emitter {
    /// The emitter's config
    config: Config,
    /// Whether the emitter is currently spawning
    enabled: bool,
    /// Seconds accumulated towards the next continuous spawn
    accumulator: f32,
    /// Seconds since the last burst
    since_burst: f32,
    /// Whether the initial burst has happened
    has_burst: bool,
}

impl Emitter {
    /// Start an emitter.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        let enabled = config.enabled;
        Self {
            config,
            enabled,
            accumulator: 0.0,
            since_burst: 0.0,
            has_burst: false,
        }
    }

    /// The emitter's config.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Whether the emitter is spawning.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Stop or resume spawning. Already live particles aren't affected.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            tracing::debug!("Emitter at {} enabled: {enabled}", self.config.position);
        }
        self.enabled = enabled;
    }

    /// Move the emitter.
    pub fn set_position(&mut self, position: Vec2) {
        if position.is_finite() {
            self.config.position = position;
        }
    }

    /// Advance the emitter's clock and return any particles that are due.
    pub fn update(&mut self, dt: f32, rng: &mut SimulationRng) -> Vec<Particle> {
        if !self.enabled {
            return Vec::new();
        }

        let due = match self.config.emission {
            Emission::Continuous { rate } => self.continuous_due(rate, dt),
            Emission::Burst { count, interval } => self.burst_due(count, interval, dt),
        };

        (0..due).map(|_| spawn(&self.config, rng)).collect()
    }

    /// How many particles a continuous emitter owes after `dt` seconds.
    fn continuous_due(&mut self, rate: f32, dt: f32) -> usize {
        if rate <= 0.0 {
            return 0;
        }
        let interval = 1.0 / rate;
        self.accumulator += dt;

        let mut due: usize = 0;
        while self.accumulator >= interval {
            if due >= MAX_SPAWNS_PER_TICK {
                self.accumulator %= interval;
                break;
            }
            self.accumulator -= interval;
            due += 1;
        }
        due
    }

    /// How many particles a burst emitter owes after `dt` seconds.
    fn burst_due(&mut self, count: u32, interval: f32, dt: f32) -> usize {
        let burst = usize::try_from(count)
            .unwrap_or(MAX_SPAWNS_PER_TICK)
            .min(MAX_SPAWNS_PER_TICK);

        if !self.has_burst {
            self.has_burst = true;
            self.since_burst = 0.0;
            return burst;
        }

        if interval <= 0.0 || burst == 0 {
            return 0;
        }

        self.since_burst += dt;
        let mut due: usize = 0;
        while self.since_burst >= interval {
            if due.saturating_add(burst) > MAX_SPAWNS_PER_TICK {
                self.since_burst = self.since_burst.rem_euclid(interval);
                break;
            }
            self.since_burst -= interval;
            due = due.saturating_add(burst);
        }
        due
    }
}
