//! All the variables that can be configured for the simulation.
//!
//! Every field is optional in a config file. Values are not trusted: [`Config::sanitised`] clamps
//! anything out of range back to something safe, because a broken config should only ever make
//! the effect look worse, never stop it.

/// The default cap on live particles.
pub const DEFAULT_MAX_PARTICLES: usize = 500;

/// The default duration of a tick, 60Hz.
pub const DEFAULT_TIME_STEP: f32 = 1.0 / 60.0;

/// The size of the simulated area. [0, 0] is the top-left.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
#[non_exhaustive]
pub struct Bounds {
    /// Width in simulation units
    pub width: f32,
    /// Height in simulation units
    pub height: f32,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

impl Bounds {
    /// Bounds of a specific size.
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// All the config for a simulation.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
#[non_exhaustive]
pub struct Config {
    /// Seed for the random source. Without one every run is different.
    pub seed: Option<u64>,
    /// The simulated area.
    pub bounds: Bounds,
    /// The maximum number of live particles. The oldest are dropped beyond this.
    pub max_particles: usize,
    /// The tick duration used when the host doesn't provide one.
    pub time_step: f32,
    /// The longest tick that is simulated. Longer ticks (eg. after the host was suspended) are
    /// shortened to this.
    pub max_time_step: f32,
    /// Fade particles out as they age.
    pub fade_with_age: bool,
    /// Above this many particles, neighbour queries go through a spatial index rather than
    /// checking every pair.
    pub spatial_index_threshold: usize,
    /// The particle emitters.
    pub emitters: Vec<crate::emitter::Config>,
    /// Physics
    pub physics: crate::physics::Config,
    /// Connections between particles
    pub connections: crate::connections::Config,
    /// Culling and trails
    pub render: crate::render::Config,
    /// Pointer interactions
    pub interaction: crate::forces::Config,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: None,
            bounds: Bounds::default(),
            max_particles: DEFAULT_MAX_PARTICLES,
            time_step: DEFAULT_TIME_STEP,
            max_time_step: 0.1,
            fade_with_age: true,
            spatial_index_threshold: 256,
            emitters: vec![crate::emitter::Config::default()],
            physics: crate::physics::Config::default(),
            connections: crate::connections::Config::default(),
            render: crate::render::Config::default(),
            interaction: crate::forces::Config::default(),
        }
    }
}

impl Config {
    /// Clamp every value into a safe range.
    #[must_use]
    pub fn sanitised(mut self) -> Self {
        let defaults = Self::default();
        self.bounds.width = at_least("bounds.width", self.bounds.width, 1.0, defaults.bounds.width);
        self.bounds.height = at_least(
            "bounds.height",
            self.bounds.height,
            1.0,
            defaults.bounds.height,
        );
        if self.max_particles == 0 {
            tracing::warn!("Config `max_particles` can't be 0, using 1");
            self.max_particles = 1;
        }
        self.time_step = within(
            "time_step",
            self.time_step,
            0.0,
            1.0,
            defaults.time_step,
        );
        self.max_time_step = within(
            "max_time_step",
            self.max_time_step,
            self.time_step,
            1.0,
            defaults.max_time_step.max(self.time_step),
        );
        self.emitters = self
            .emitters
            .into_iter()
            .map(crate::emitter::Config::sanitised)
            .collect();
        self.physics = self.physics.sanitised();
        self.connections = self.connections.sanitised();
        self.render = self.render.sanitised();
        self.interaction = self.interaction.sanitised();
        self
    }

    /// Make a tick duration from the host safe to simulate: never negative, never `NaN`, never
    /// longer than `max_time_step`.
    #[must_use]
    pub fn clamp_time_step(&self, dt: f32) -> f32 {
        if !dt.is_finite() || dt <= 0.0 {
            return 0.0;
        }
        dt.min(self.max_time_step)
    }
}

/// Keep a value inside `[min, max]`, replacing non-finite values with `default`.
pub(crate) fn within(name: &str, value: f32, min: f32, max: f32, default: f32) -> f32 {
    if !value.is_finite() {
        tracing::warn!("Config `{name}` isn't a finite number, using {default}");
        return default;
    }
    let clamped = value.clamp(min, max);
    if (clamped - value).abs() > f32::EPSILON {
        tracing::warn!("Config `{name}` = {value} is out of range, clamped to {clamped}");
    }
    clamped
}

/// Keep a value at or above `min`, replacing non-finite values with `default`.
pub(crate) fn at_least(name: &str, value: f32, min: f32, default: f32) -> f32 {
    within(name, value, min, f32::MAX, default)
}

/// Make sure a `(min, max)` range is ordered and finite.
pub(crate) fn ordered_range(
    name: &str,
    range: (f32, f32),
    floor: f32,
    default: (f32, f32),
) -> (f32, f32) {
    let min = at_least(name, range.0, floor, default.0);
    let max = at_least(name, range.1, floor, default.1);
    if min > max {
        tracing::warn!("Config `{name}` has min > max, swapping them");
        return (max, min);
    }
    (min, max)
}

/// A vector made only of finite numbers, or `default`.
pub(crate) fn finite_vector(name: &str, value: glam::Vec2, default: glam::Vec2) -> glam::Vec2 {
    if value.is_finite() {
        value
    } else {
        tracing::warn!("Config `{name}` isn't finite, using {default}");
        default
    }
}
