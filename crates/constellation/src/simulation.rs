//! One simulation: all of its state, the tick that advances it, and a handle for hosts to drive it.
//!
//! The heart of it is [`step`], a pure function from one state to the next. It never panics and
//! never does I/O. [`SimulationContext`] wraps it with the little bit of mutable host-facing state:
//! whether the simulation is running and who's listening for events.
//!
//! The order of work in a tick:
//! 1. Apply host input: pointer forces, clicks, emitter toggles, resizes.
//! 2. Emit new particles.
//! 3. Decay interaction forces.
//! 4. Age particles.
//! 5. Physics, including collisions and boundaries, committed as a new snapshot.
//! 6. Remove dead particles.
//! 7. Rebuild connections.
//! 8. Record trails and, if a frame is due, filter for rendering.

use glam::Vec2;

use crate::{
    config::{Bounds, Config},
    connections::{ConnectionBuilder, Edge},
    emitter::Emitter,
    events::{Event, Listeners},
    forces::{ForceId, ForceKind, InteractionForceField},
    particle::Particle,
    physics::PhysicsEngine,
    render::{Rect, RenderFilter, RenderSnapshot},
    rng::SimulationRng,
    store::ParticleStore,
};

/// Something the host wants to happen at the start of the next tick.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum InputEvent {
    /// The pointer went down: start an interaction force.
    PointerDown {
        /// Where
        position: Vec2,
        /// What sort of force
        #[serde(default)]
        kind: ForceKind,
        /// Overrides the configured default strength
        #[serde(default)]
        strength: Option<f32>,
        /// Overrides the configured default radius
        #[serde(default)]
        radius: Option<f32>,
    },
    /// The pointer was dragged: move an interaction force.
    PointerMove {
        /// The force, from its `InteractionStarted` event
        id: ForceId,
        /// Where it is now
        position: Vec2,
    },
    /// The pointer was lifted. The force decays away on its own.
    PointerUp {
        /// The force, from its `InteractionStarted` event
        id: ForceId,
    },
    /// Add a particle at a point.
    ClickCreate {
        /// Where
        position: Vec2,
    },
    /// Remove the particle nearest a point.
    ClickRemove {
        /// Where
        position: Vec2,
    },
    /// Stop or resume an emitter.
    SetEmitterEnabled {
        /// Index of the emitter in the config
        index: usize,
        /// Whether it should spawn
        enabled: bool,
    },
    /// Move an emitter.
    MoveEmitter {
        /// Index of the emitter in the config
        index: usize,
        /// Where it should spawn from
        position: Vec2,
    },
    /// The simulated area changed size.
    Resize {
        /// New width
        width: f32,
        /// New height
        height: f32,
    },
    /// Remove every particle and force.
    Clear,
}

/// Everything the host passes into a tick.
#[derive(Debug, Clone, Default, PartialEq)]
#[non_exhaustive]
pub struct TickInput {
    /// Seconds since the last tick. Uses the configured time step when not given.
    pub dt: Option<f32>,
    /// Input that happened since the last tick, applied in order
    pub events: Vec<InputEvent>,
}

impl TickInput {
    /// A tick of a specific duration with no input.
    #[must_use]
    pub const fn with_dt(dt: f32) -> Self {
        Self {
            dt: Some(dt),
            events: Vec::new(),
        }
    }

    /// Add an input event.
    #[must_use]
    pub fn and(mut self, event: InputEvent) -> Self {
        self.events.push(event);
        self
    }
}

/// Everything a tick produces.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq)]
#[non_exhaustive]
pub struct TickOutput {
    /// The tick number, starting at 1
    pub tick: u64,
    /// What to draw, if the frame rate limit let a frame through
    pub snapshot: Option<RenderSnapshot>,
    /// Everything that happened, in the order it happened
    pub events: Vec<Event>,
}

/// The complete state of one simulation. Nothing is shared between simulations.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct SimulationState {
    /// Number of ticks simulated so far
    pub tick: u64,
    /// The simulated area
    pub bounds: Bounds,
    /// Live particles
    pub store: ParticleStore,
    /// Particle sources, in config order
    pub emitters: Vec<Emitter>,
    /// User interaction forces
    pub field: InteractionForceField,
    /// Connection graph and its history
    pub connections: ConnectionBuilder,
    /// The edges from the last tick
    pub edges: Vec<Edge>,
    /// Trails and frame limiting
    pub render: RenderFilter,
    /// The only source of randomness
    pub rng: SimulationRng,
}

impl Default for SimulationState {
    fn default() -> Self {
        Self {
            tick: 0,
            bounds: Bounds::default(),
            store: ParticleStore::default(),
            emitters: Vec::new(),
            field: InteractionForceField::default(),
            connections: ConnectionBuilder::new(),
            edges: Vec::new(),
            render: RenderFilter::default(),
            rng: SimulationRng::seeded(0),
        }
    }
}

impl SimulationState {
    /// A fresh, empty simulation ready to run with `config`.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            tick: 0,
            bounds: config.bounds,
            store: ParticleStore::new(config.max_particles),
            emitters: config.emitters.iter().cloned().map(Emitter::new).collect(),
            field: InteractionForceField::new(config.interaction.decay_time),
            connections: ConnectionBuilder::new(),
            edges: Vec::new(),
            render: RenderFilter::default(),
            rng: SimulationRng::new(config.seed),
        }
    }

    /// All the live particles, oldest first.
    #[must_use]
    pub fn particles(&self) -> &[Particle] {
        self.store.particles()
    }

    /// The visible area when the config doesn't set one.
    #[must_use]
    pub const fn viewport(&self) -> Rect {
        Rect::new(0.0, 0.0, self.bounds.width, self.bounds.height)
    }

    /// Remove every particle, force and remembered edge.
    pub fn clear(&mut self) {
        self.store.clear();
        self.field.clear();
        self.connections.clear();
        self.edges.clear();
    }

    /// Insert particles, reporting each as emitted by `emitter` and reporting any evictions.
    fn insert_emitted(
        &mut self,
        particles: Vec<Particle>,
        emitter: usize,
        events: &mut Vec<Event>,
    ) {
        for particle in particles {
            let (id, evicted) = self.store.insert(particle);
            events.push(Event::ParticleEmitted { id, emitter });
            events.extend(
                evicted
                    .into_iter()
                    .map(|particle| Event::ParticleEvicted { id: particle.id }),
            );
        }
    }

    /// Apply a single host input.
    fn apply_input(&mut self, input: &InputEvent, config: &Config, events: &mut Vec<Event>) {
        match input {
            InputEvent::PointerDown {
                position,
                kind,
                strength,
                radius,
            } => {
                if !position.is_finite() {
                    tracing::debug!("Ignoring pointer down at {position}");
                    return;
                }
                let strength = strength
                    .filter(|value| value.is_finite())
                    .unwrap_or(config.interaction.default_strength);
                let radius = radius
                    .filter(|value| value.is_finite())
                    .unwrap_or(config.interaction.default_radius);
                let (_, started) = self.field.add_force(*position, *kind, strength, radius);
                events.push(started);
            }
            InputEvent::PointerMove { id, position } => {
                if position.is_finite() && !self.field.move_force(*id, *position) {
                    tracing::trace!("Pointer moved for unknown force {id}");
                }
            }
            InputEvent::PointerUp { id } => {
                self.field.release(*id);
            }
            InputEvent::ClickCreate { position } => {
                if !config.interaction.click_to_create || !position.is_finite() {
                    return;
                }
                let particle = crate::emitter::spawn(&config.interaction.template, &mut self.rng);
                if let Some((_, created)) =
                    InteractionForceField::click_create(&mut self.store, *position, particle)
                {
                    events.push(created);
                }
            }
            InputEvent::ClickRemove { position } => {
                if !config.interaction.click_to_remove {
                    return;
                }
                if let Some((_, removed)) = InteractionForceField::click_remove(
                    &mut self.store,
                    *position,
                    config.interaction.pick_radius,
                ) {
                    events.push(removed);
                }
            }
            InputEvent::SetEmitterEnabled { index, enabled } => {
                match self.emitters.get_mut(*index) {
                    Some(emitter) => emitter.set_enabled(*enabled),
                    None => tracing::debug!("No emitter at index {index}"),
                }
            }
            InputEvent::MoveEmitter { index, position } => match self.emitters.get_mut(*index) {
                Some(emitter) => emitter.set_position(*position),
                None => tracing::debug!("No emitter at index {index}"),
            },
            InputEvent::Resize { width, height } => {
                if width.is_finite() && height.is_finite() && *width >= 1.0 && *height >= 1.0 {
                    tracing::debug!("Resizing simulation to {width}x{height}");
                    self.bounds = Bounds::new(*width, *height);
                } else {
                    tracing::warn!("Ignoring resize to {width}x{height}");
                }
            }
            InputEvent::Clear => {
                tracing::debug!("Clearing simulation");
                self.clear();
            }
        }
    }
}

/// Advance a simulation by one tick.
///
/// `config` should already be sanitised, see [`Config::sanitised`]. The same state, config and
/// input always produce the same output, bit for bit, as long as the config has a seed.
#[must_use]
pub fn step(
    mut state: SimulationState,
    config: &Config,
    input: &TickInput,
) -> (SimulationState, TickOutput) {
    let dt = config.clamp_time_step(input.dt.unwrap_or(config.time_step));
    state.tick = state.tick.wrapping_add(1);
    state.store.set_max_particles(config.max_particles);
    let mut events = Vec::new();

    for event in &input.events {
        state.apply_input(event, config, &mut events);
    }

    for index in 0..state.emitters.len() {
        let spawned = match state.emitters.get_mut(index) {
            Some(emitter) => emitter.update(dt, &mut state.rng),
            None => continue,
        };
        state.insert_emitted(spawned, index, &mut events);
    }

    events.extend(state.field.tick(dt));
    state.store.age(dt, config.fade_with_age);

    let physics = PhysicsEngine::new(
        config.physics.clone(),
        state.bounds,
        config.spatial_index_threshold,
    );
    let next = physics.step(
        state.store.particles(),
        state.field.forces(),
        dt,
        &mut state.rng,
    );
    state.store.commit(next);
    events.extend(
        state
            .store
            .remove_dead()
            .into_iter()
            .map(|particle| Event::ParticleExpired { id: particle.id }),
    );

    let (edges, changes) = state.connections.update(
        state.store.particles(),
        &config.connections,
        dt,
        config.spatial_index_threshold,
    );
    events.extend(
        changes
            .formed
            .into_iter()
            .map(|edge| Event::ConnectionFormed { edge }),
    );
    events.extend(
        changes
            .broken
            .into_iter()
            .map(|edge| Event::ConnectionBroken { edge }),
    );
    state.edges = edges;

    let viewport = config.render.viewport.unwrap_or_else(|| state.viewport());
    let snapshot = state.render.update(
        state.tick,
        state.store.particles(),
        &state.edges,
        &config.render,
        Some(viewport),
        dt,
    );

    let output = TickOutput {
        tick: state.tick,
        snapshot,
        events,
    };
    (state, output)
}

/// A running simulation, owned by one host.
#[derive(Debug)]
pub struct SimulationContext {
    /// The sanitised config
    config: Config,
    /// The simulation itself
    state: SimulationState,
    /// Whether ticks do anything
    is_running: bool,
    /// Registered event callbacks
    listeners: Listeners,
}

impl SimulationContext {
    /// Start a simulation. The config is sanitised first.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let config = config.sanitised();
        tracing::debug!(
            "Starting simulation with {} emitters, seed: {:?}",
            config.emitters.len(),
            config.seed
        );
        let state = SimulationState::new(&config);
        Self {
            config,
            state,
            is_running: true,
            listeners: Listeners::default(),
        }
    }

    /// Advance by one tick and tell every listener what happened. Does nothing while stopped.
    pub fn tick(&mut self, input: &TickInput) -> TickOutput {
        if !self.is_running {
            return TickOutput {
                tick: self.state.tick,
                ..TickOutput::default()
            };
        }

        let state = std::mem::take(&mut self.state);
        let (state, output) = step(state, &self.config, input);
        self.state = state;
        self.listeners.dispatch(&output.events);
        output
    }

    /// Halt all future mutation. Nothing is cleared.
    pub fn stop(&mut self) {
        if self.is_running {
            tracing::debug!("Simulation stopped at tick {}", self.state.tick);
        }
        self.is_running = false;
    }

    /// Carry on from where the simulation stopped.
    pub fn start(&mut self) {
        if !self.is_running {
            tracing::debug!("Simulation resumed at tick {}", self.state.tick);
        }
        self.is_running = true;
    }

    /// Whether ticks do anything.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.is_running
    }

    /// Register a callback for every future event.
    pub fn subscribe<F: FnMut(&Event) + 'static>(&mut self, callback: F) {
        self.listeners.subscribe(callback);
    }

    /// Remove every callback.
    pub fn clear_listeners(&mut self) {
        self.listeners.clear();
    }

    /// The simulation's current state.
    #[must_use]
    pub const fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Direct access to the state, eg. to seed particles.
    pub const fn state_mut(&mut self) -> &mut SimulationState {
        &mut self.state
    }

    /// The sanitised config.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }
}
