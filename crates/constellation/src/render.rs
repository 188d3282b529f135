//! Turning the simulation into something a drawing backend can use.
//!
//! Nothing here changes the simulation. The filter only decides which particles and edges are
//! worth drawing this frame, and how often frames are produced at all.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use glam::Vec2;

use crate::{
    connections::Edge,
    particle::{Particle, ParticleId, ParticleKind},
};

/// The longest trail, in points, that a particle can leave.
pub const MAX_TRAIL_LENGTH: usize = 1000;

/// An axis-aligned rectangle, [0, 0] is the top-left.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub struct Rect {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl Rect {
    /// A rectangle.
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether a square of half-width `extent` around `centre` touches the rectangle.
    #[must_use]
    pub fn overlaps(&self, centre: Vec2, extent: f32) -> bool {
        centre.x + extent >= self.x
            && centre.x - extent <= self.x + self.width
            && centre.y + extent >= self.y
            && centre.y - extent <= self.y + self.height
    }
}

/// Config for the trails left behind particles.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
#[non_exhaustive]
pub struct TrailConfig {
    /// Whether to record and render trails
    pub enabled: bool,
    /// How many past positions are remembered per particle
    pub length: usize,
    /// Opacity of the newest point of a trail
    pub opacity: f32,
    /// Line width of the trail
    pub width: f32,
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            length: 10,
            opacity: 0.5,
            width: 1.0,
        }
    }
}

/// All the config for rendering.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
#[non_exhaustive]
pub struct Config {
    /// Particles this transparent, or more, aren't drawn
    pub alpha_threshold: f32,
    /// The most particles drawn in one frame. The most opaque win.
    pub max_render_count: usize,
    /// The visible area. Defaults to the simulation bounds.
    pub viewport: Option<Rect>,
    /// Trails
    pub trails: TrailConfig,
    /// Most frames per second to produce, zero means a frame every tick
    pub frame_rate_limit: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            alpha_threshold: 0.01,
            max_render_count: 1000,
            viewport: None,
            trails: TrailConfig::default(),
            frame_rate_limit: 0.0,
        }
    }
}

impl Config {
    /// Clamp every value into a safe range.
    #[must_use]
    pub fn sanitised(mut self) -> Self {
        use crate::config::{at_least, within};

        let defaults = Self::default();
        self.alpha_threshold = within(
            "render.alpha_threshold",
            self.alpha_threshold,
            0.0,
            1.0,
            defaults.alpha_threshold,
        );
        self.frame_rate_limit = at_least(
            "render.frame_rate_limit",
            self.frame_rate_limit,
            0.0,
            0.0,
        );
        self.trails.opacity = within("render.trails.opacity", self.trails.opacity, 0.0, 1.0, 0.5);
        self.trails.width = at_least("render.trails.width", self.trails.width, 0.0, 1.0);
        if self.trails.length > MAX_TRAIL_LENGTH {
            tracing::warn!(
                "Config `render.trails.length` = {} is too long, clamped to {MAX_TRAIL_LENGTH}",
                self.trails.length
            );
            self.trails.length = MAX_TRAIL_LENGTH;
        }
        self.viewport = self.viewport.filter(|viewport| {
            let is_usable = [viewport.x, viewport.y, viewport.width, viewport.height]
                .iter()
                .all(|value| value.is_finite())
                && viewport.width >= 0.0
                && viewport.height >= 0.0;
            if !is_usable {
                tracing::warn!("Config `render.viewport` is unusable, using the bounds instead");
            }
            is_usable
        });
        self
    }
}

/// Indices of all the visible particles of one kind, so a backend can draw them together.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct RenderBatch {
    /// The visual variant
    pub kind: ParticleKind,
    /// Indices into [`RenderSnapshot::particles`]
    pub indices: Vec<usize>,
}

/// One point of a trail.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub struct TrailPoint {
    /// Where the particle was
    pub position: Vec2,
    /// How opaque to draw this point
    pub opacity: f32,
}

/// The recent path of a particle, newest point first.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct Trail {
    /// The particle
    pub particle: ParticleId,
    /// The path, newest first
    pub points: Vec<TrailPoint>,
    /// Line width
    pub width: f32,
}

/// Everything a drawing backend needs for one frame.
#[derive(serde::Serialize, serde::Deserialize, Debug, Default, Clone, PartialEq)]
#[non_exhaustive]
pub struct RenderSnapshot {
    /// The tick the frame was made on
    pub tick: u64,
    /// Visible particles, in store order
    pub particles: Vec<Particle>,
    /// Edges between visible particles
    pub edges: Vec<Edge>,
    /// Visible particles grouped by kind
    pub batches: Vec<RenderBatch>,
    /// Trails of visible particles
    pub trails: Vec<Trail>,
}

/// Cull particles and edges down to what is worth drawing.
///
/// 1. Drop particles at or below the alpha threshold.
/// 2. Drop particles whose box, expanded by their size, misses the viewport.
/// 3. Keep only the most opaque particles if there are still too many.
///
/// Edges survive only if both of their particles do.
#[must_use]
pub fn filter(
    particles: &[Particle],
    edges: &[Edge],
    config: &Config,
    viewport: Option<Rect>,
) -> RenderSnapshot {
    let mut visible: Vec<(usize, &Particle)> = particles
        .iter()
        .enumerate()
        .filter(|(_, particle)| particle.opacity > config.alpha_threshold)
        .filter(|(_, particle)| {
            viewport.is_none_or(|rect| rect.overlaps(particle.position, particle.size * 2.0))
        })
        .collect();

    if visible.len() > config.max_render_count {
        visible.sort_by(|left, right| {
            right
                .1
                .opacity
                .total_cmp(&left.1.opacity)
                .then(left.0.cmp(&right.0))
        });
        visible.truncate(config.max_render_count);
        visible.sort_by_key(|(index, _)| *index);
    }

    let particles: Vec<Particle> = visible
        .into_iter()
        .map(|(_, particle)| particle.clone())
        .collect();
    let survivors: BTreeSet<ParticleId> = particles.iter().map(|particle| particle.id).collect();
    let edges = edges
        .iter()
        .filter(|edge| survivors.contains(&edge.particle1) && survivors.contains(&edge.particle2))
        .cloned()
        .collect();

    RenderSnapshot {
        tick: 0,
        batches: batch(&particles),
        particles,
        edges,
        trails: Vec::new(),
    }
}

/// Group particles by kind, in order of each kind's first appearance.
fn batch(particles: &[Particle]) -> Vec<RenderBatch> {
    let mut batches: Vec<RenderBatch> = Vec::new();
    for (index, particle) in particles.iter().enumerate() {
        match batches.iter_mut().find(|batch| batch.kind == particle.kind) {
            Some(batch) => batch.indices.push(index),
            None => batches.push(RenderBatch {
                kind: particle.kind,
                indices: vec![index],
            }),
        }
    }
    batches
}

/// The recent positions of every live particle.
#[derive(Debug, Clone, Default)]
pub struct TrailHistory {
    /// Positions, oldest first
    histories: BTreeMap<ParticleId, VecDeque<Vec2>>,
}

impl TrailHistory {
    /// Remember where every particle is now, and forget particles that are gone.
    pub fn record(&mut self, particles: &[Particle], length: usize) {
        let live: BTreeSet<ParticleId> = particles.iter().map(|particle| particle.id).collect();
        self.histories.retain(|id, _| live.contains(id));
        if length == 0 {
            self.histories.clear();
            return;
        }

        for particle in particles {
            let history = self.histories.entry(particle.id).or_default();
            history.push_back(particle.position);
            while history.len() > length {
                history.pop_front();
            }
        }
    }

    /// The trails of the given particles, newest point first.
    #[must_use]
    pub fn trails(&self, particles: &[Particle], config: &TrailConfig) -> Vec<Trail> {
        #[expect(
            clippy::as_conversions,
            clippy::cast_precision_loss,
            reason = "Trail lengths are clamped to `MAX_TRAIL_LENGTH`"
        )]
        let length = config.length.max(1) as f32;

        particles
            .iter()
            .filter_map(|particle| {
                let history = self.histories.get(&particle.id)?;
                let points = history
                    .iter()
                    .rev()
                    .enumerate()
                    .map(|(age, position)| {
                        #[expect(
                            clippy::as_conversions,
                            clippy::cast_precision_loss,
                            reason = "A history is never longer than its trail length"
                        )]
                        let age = age as f32;
                        TrailPoint {
                            position: *position,
                            opacity: config.opacity * (1.0 - age / length),
                        }
                    })
                    .collect();
                Some(Trail {
                    particle: particle.id,
                    points,
                    width: config.width,
                })
            })
            .collect()
    }

    /// How many particles have a history.
    #[must_use]
    pub fn len(&self) -> usize {
        self.histories.len()
    }

    /// Whether no particle has a history.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.histories.clear();
    }
}

/// Lets frames through at most `frame_rate_limit` times a second of simulated time.
#[derive(Debug, Clone, Default)]
pub struct FrameLimiter {
    /// Simulated seconds since the last frame, `None` before the first frame.
    elapsed: Option<f32>,
}

impl FrameLimiter {
    /// Whether a frame is due after another `dt` seconds.
    pub fn is_due(&mut self, dt: f32, frame_rate_limit: f32) -> bool {
        if frame_rate_limit <= 0.0 {
            return true;
        }
        let Some(elapsed) = self.elapsed.as_mut() else {
            self.elapsed = Some(0.0);
            return true;
        };

        let interval = 1.0 / frame_rate_limit;
        *elapsed += dt.max(0.0);
        if *elapsed >= interval {
            *elapsed %= interval;
            return true;
        }
        false
    }
}

/// Filtering plus the state that has to live between frames.
#[derive(Debug, Clone, Default)]
pub struct RenderFilter {
    /// Particle trails
    trails: TrailHistory,
    /// Frame rate limiting
    limiter: FrameLimiter,
}

impl RenderFilter {
    /// Record trails and, if a frame is due, make one.
    pub fn update(
        &mut self,
        tick: u64,
        particles: &[Particle],
        edges: &[Edge],
        config: &Config,
        viewport: Option<Rect>,
        dt: f32,
    ) -> Option<RenderSnapshot> {
        if config.trails.enabled {
            self.trails.record(particles, config.trails.length);
        } else if !self.trails.is_empty() {
            self.trails.clear();
        }

        if !self.limiter.is_due(dt, config.frame_rate_limit) {
            return None;
        }

        let mut snapshot = filter(particles, edges, config, viewport);
        snapshot.tick = tick;
        if config.trails.enabled {
            snapshot.trails = self.trails.trails(&snapshot.particles, &config.trails);
        }
        Some(snapshot)
    }

    /// Trails recorded so far.
    #[must_use]
    pub const fn trails(&self) -> &TrailHistory {
        &self.trails
    }
}

#[cfg(test)]
#[expect(clippy::indexing_slicing, reason = "Tests aren't so strict")]
mod test {
    use super::*;
    use crate::connections::EdgeId;

    fn particle(id: ParticleId, x: f32, opacity: f32) -> Particle {
        Particle::builder()
            .id(id)
            .position(Vec2::new(x, 10.0))
            .opacity(opacity)
            .size(1.0)
            .build()
    }

    fn edge(first: ParticleId, second: ParticleId) -> Edge {
        let id = EdgeId::new(first, second);
        Edge {
            id,
            particle1: id.low,
            particle2: id.high,
            distance: 1.0,
            strength: 1.0,
            opacity: 1.0,
            width: 1.0,
        }
    }

    fn ids(snapshot: &RenderSnapshot) -> Vec<ParticleId> {
        snapshot.particles.iter().map(|particle| particle.id).collect()
    }

    #[test]
    fn transparent_particles_are_culled() {
        let particles = vec![
            particle(1, 10.0, 0.0),
            particle(2, 10.0, 0.01),
            particle(3, 10.0, 0.5),
        ];
        let snapshot = filter(&particles, &[], &Config::default(), None);
        assert_eq!(ids(&snapshot), vec![3]);
    }

    #[test]
    fn offscreen_particles_are_culled() {
        let viewport = Some(Rect::new(0.0, 0.0, 100.0, 100.0));
        let particles = vec![
            particle(1, -1.5, 1.0),
            particle(2, -2.5, 1.0),
            particle(3, 50.0, 1.0),
            particle(4, 101.5, 1.0),
            particle(5, 150.0, 1.0),
        ];
        let snapshot = filter(&particles, &[], &Config::default(), viewport);
        assert_eq!(ids(&snapshot), vec![1, 3, 4]);
    }

    #[test]
    fn capping_keeps_the_most_opaque_in_order() {
        let config = Config {
            max_render_count: 2,
            ..Config::default()
        };
        let particles = vec![
            particle(1, 10.0, 0.2),
            particle(2, 10.0, 0.9),
            particle(3, 10.0, 0.5),
            particle(4, 10.0, 0.9),
        ];
        let snapshot = filter(&particles, &[], &config, None);
        assert_eq!(ids(&snapshot), vec![2, 4]);
    }

    #[test]
    fn edges_need_both_ends_visible() {
        let particles = vec![
            particle(1, 10.0, 1.0),
            particle(2, 10.0, 0.0),
            particle(3, 10.0, 1.0),
        ];
        let edges = vec![edge(1, 2), edge(1, 3), edge(2, 3)];
        let snapshot = filter(&particles, &edges, &Config::default(), None);
        assert_eq!(snapshot.edges, vec![edge(1, 3)]);
    }

    #[test]
    fn particles_are_batched_by_kind() {
        let mut particles = vec![
            particle(1, 10.0, 1.0),
            particle(2, 10.0, 1.0),
            particle(3, 10.0, 1.0),
        ];
        particles[1].kind = ParticleKind::Star;
        let snapshot = filter(&particles, &[], &Config::default(), None);
        assert_eq!(
            snapshot.batches,
            vec![
                RenderBatch {
                    kind: ParticleKind::Circle,
                    indices: vec![0, 2]
                },
                RenderBatch {
                    kind: ParticleKind::Star,
                    indices: vec![1]
                },
            ]
        );
    }

    #[test]
    fn trails_fade_and_are_pruned() {
        let mut history = TrailHistory::default();
        let config = TrailConfig {
            enabled: true,
            length: 4,
            opacity: 0.8,
            width: 2.0,
        };

        let mut particles = vec![particle(1, 0.0, 1.0), particle(2, 0.0, 1.0)];
        for step in 0..6_u8 {
            particles[0].position.x = f32::from(step);
            history.record(&particles, config.length);
        }

        let trails = history.trails(&particles[..1], &config);
        let xs: Vec<f32> = trails[0].points.iter().map(|point| point.position.x).collect();
        assert_eq!(xs, vec![5.0, 4.0, 3.0, 2.0]);
        assert!((trails[0].points[0].opacity - 0.8).abs() < 1e-6);
        assert!((trails[0].points[2].opacity - 0.4).abs() < 1e-6);
        assert!((trails[0].width - 2.0).abs() < f32::EPSILON);

        particles.remove(1);
        history.record(&particles, config.length);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn long_trails_keep_every_point() {
        let config = Config {
            trails: TrailConfig {
                enabled: true,
                length: usize::MAX,
                ..TrailConfig::default()
            },
            ..Config::default()
        }
        .sanitised();
        assert_eq!(config.trails.length, MAX_TRAIL_LENGTH);

        let mut history = TrailHistory::default();
        let mut particles = vec![particle(1, 0.0, 1.0)];
        for step in 0..MAX_TRAIL_LENGTH + 10 {
            particles[0].position.x = f32::from(u16::try_from(step).unwrap());
            history.record(&particles, config.trails.length);
        }

        let trails = history.trails(&particles, &config.trails);
        let points = &trails[0].points;
        assert_eq!(points.len(), MAX_TRAIL_LENGTH);
        assert!(points.windows(2).all(|pair| pair[0].opacity > pair[1].opacity));
        assert!(points[MAX_TRAIL_LENGTH - 1].opacity > 0.0);
    }

    #[test]
    fn frame_limiter_skips_ticks() {
        let mut limiter = FrameLimiter::default();
        let frames: Vec<bool> = (0..6).map(|_| limiter.is_due(0.25, 2.0)).collect();
        assert_eq!(frames, vec![true, false, true, false, true, false]);

        let mut unlimited = FrameLimiter::default();
        assert!((0..3).all(|_| unlimited.is_due(0.25, 0.0)));
    }

    #[test]
    fn render_filter_attaches_tick_and_trails() {
        let mut filter = RenderFilter::default();
        let config = Config {
            trails: TrailConfig {
                enabled: true,
                ..TrailConfig::default()
            },
            ..Config::default()
        };
        let particles = vec![particle(1, 10.0, 1.0)];

        filter.update(1, &particles, &[], &config, None, 0.1);
        let snapshot = filter.update(2, &particles, &[], &config, None, 0.1).unwrap();

        assert_eq!(snapshot.tick, 2);
        assert_eq!(snapshot.trails.len(), 1);
        assert_eq!(snapshot.trails[0].points.len(), 2);
    }
}
