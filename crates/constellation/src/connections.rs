//! The proximity graph drawn between particles.
//!
//! Edges are rebuilt from scratch every tick. The previous tick's edges are only kept so that we
//! can report which connections formed or broke, and so that each edge's opacity and width can
//! ease toward their targets rather than popping in.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    particle::{Particle, ParticleId},
    spatial::Neighbours,
};

/// The ID of an edge. Made from the pair of particle IDs with the lower one first, so `(a, b)` and
/// `(b, a)` are the same edge.
#[derive(
    serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[non_exhaustive]
pub struct EdgeId {
    /// The lower particle ID
    pub low: ParticleId,
    /// The higher particle ID
    pub high: ParticleId,
}

impl EdgeId {
    /// The canonical ID for a pair of particles, in either order.
    #[must_use]
    pub const fn new(first: ParticleId, second: ParticleId) -> Self {
        if first <= second {
            Self {
                low: first,
                high: second,
            }
        } else {
            Self {
                low: second,
                high: first,
            }
        }
    }
}

/// A connection between two particles.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct Edge {
    /// Canonical ID
    pub id: EdgeId,
    /// The particle with the lower ID
    pub particle1: ParticleId,
    /// The particle with the higher ID
    pub particle2: ParticleId,
    /// Distance between the two particles
    pub distance: f32,
    /// 1.0 for touching particles, falling to `min_strength` at the connection distance
    pub strength: f32,
    /// Eased opacity, for drawing
    pub opacity: f32,
    /// Eased line width, for drawing
    pub width: f32,
}

/// How the graph is built.
#[derive(serde::Serialize, serde::Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Algorithm {
    /// Each particle connects to its nearest neighbours.
    #[default]
    Nearest,
    /// Every pair within range is connected.
    Distance,
    /// A tree grown greedily from the first particle, shortest candidate edges first. Particles
    /// that can't be reached from the first particle in one pass stay unconnected.
    Mst,
    /// A true minimum spanning forest, one tree per cluster.
    Kruskal,
}

/// All the config for connections.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
#[non_exhaustive]
pub struct Config {
    /// Whether to build connections at all
    pub enabled: bool,
    /// How to build the graph
    pub algorithm: Algorithm,
    /// Particles further apart than this are never connected
    pub connection_distance: f32,
    /// The most neighbours a particle picks with the nearest algorithm
    pub max_connections: usize,
    /// The weakest an edge can be
    pub min_strength: f32,
    /// Width of a full strength edge
    pub line_width: f32,
    /// Seconds for an edge to ease to its target opacity and width. Zero means instantly.
    pub animation_duration: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            algorithm: Algorithm::default(),
            connection_distance: 100.0,
            max_connections: 3,
            min_strength: 0.1,
            line_width: 1.0,
            animation_duration: 0.3,
        }
    }
}

impl Config {
    /// Clamp every value into a safe range.
    #[must_use]
    pub fn sanitised(mut self) -> Self {
        use crate::config::{at_least, within};

        let defaults = Self::default();
        self.connection_distance = at_least(
            "connections.connection_distance",
            self.connection_distance,
            0.0,
            defaults.connection_distance,
        );
        self.min_strength = within(
            "connections.min_strength",
            self.min_strength,
            0.0,
            1.0,
            defaults.min_strength,
        );
        self.line_width = at_least(
            "connections.line_width",
            self.line_width,
            0.0,
            defaults.line_width,
        );
        self.animation_duration = at_least(
            "connections.animation_duration",
            self.animation_duration,
            0.0,
            0.0,
        );
        self
    }

    /// The strength of an edge of a given length.
    #[must_use]
    pub fn strength(&self, distance: f32) -> f32 {
        (1.0 - distance / self.connection_distance).max(self.min_strength)
    }
}

/// What changed between two consecutive builds.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ConnectionDiff {
    /// Edges that are new
    pub formed: Vec<EdgeId>,
    /// Edges that are gone
    pub broken: Vec<EdgeId>,
}

/// A candidate edge, by particle index.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    /// Index of the first particle
    first: usize,
    /// Index of the second particle
    second: usize,
    /// Distance between them
    distance: f32,
}

/// Build the edges for a snapshot of particles. Edges come back sorted by ID, with their opacity
/// and width already at their targets.
#[must_use]
pub fn build(particles: &[Particle], config: &Config, spatial_index_threshold: usize) -> Vec<Edge> {
    if !config.enabled || particles.len() < 2 || config.connection_distance <= 0.0 {
        return Vec::new();
    }

    let neighbours = Neighbours::new(particles, spatial_index_threshold);
    let chosen = match config.algorithm {
        Algorithm::Nearest => nearest(particles, &neighbours, config),
        Algorithm::Distance => candidates(particles, &neighbours, config.connection_distance),
        Algorithm::Mst => {
            let mut candidates = candidates(particles, &neighbours, config.connection_distance);
            sort_by_distance(&mut candidates);
            greedy_tree(particles.len(), candidates)
        }
        Algorithm::Kruskal => {
            let mut candidates = candidates(particles, &neighbours, config.connection_distance);
            sort_by_distance(&mut candidates);
            spanning_forest(particles.len(), candidates)
        }
    };

    let mut edges: Vec<Edge> = chosen
        .into_iter()
        .filter_map(|candidate| {
            let first = particles.get(candidate.first)?;
            let second = particles.get(candidate.second)?;
            let id = EdgeId::new(first.id, second.id);
            let strength = config.strength(candidate.distance);
            Some(Edge {
                id,
                particle1: id.low,
                particle2: id.high,
                distance: candidate.distance,
                strength,
                opacity: strength,
                width: config.line_width * strength,
            })
        })
        .collect();
    edges.sort_by_key(|edge| edge.id);
    edges.dedup_by_key(|edge| edge.id);
    edges
}

/// Which edges formed and which broke between two builds.
#[must_use]
pub fn diff(previous: &BTreeSet<EdgeId>, next: &BTreeSet<EdgeId>) -> ConnectionDiff {
    ConnectionDiff {
        formed: next.difference(previous).copied().collect(),
        broken: previous.difference(next).copied().collect(),
    }
}

/// Every pair, lower index first, whose distance is within range. Ascending by index.
fn candidates(particles: &[Particle], neighbours: &Neighbours, range: f32) -> Vec<Candidate> {
    let mut found = Vec::new();
    for (first, particle) in particles.iter().enumerate() {
        for second in neighbours.within(particle.position, range) {
            if second <= first {
                continue;
            }
            let Some(other) = particles.get(second) else {
                continue;
            };
            found.push(Candidate {
                first,
                second,
                distance: particle.position.distance(other.position),
            });
        }
    }
    found
}

/// Shortest first, ties broken by index so the order is always the same.
fn sort_by_distance(candidates: &mut [Candidate]) {
    candidates.sort_by(|left, right| {
        left.distance
            .total_cmp(&right.distance)
            .then(left.first.cmp(&right.first))
            .then(left.second.cmp(&right.second))
    });
}

/// Each particle picks up to `max_connections` of its closest neighbours.
fn nearest(particles: &[Particle], neighbours: &Neighbours, config: &Config) -> Vec<Candidate> {
    let mut chosen = Vec::new();
    for (index, particle) in particles.iter().enumerate() {
        let mut closest: Vec<(usize, f32)> = neighbours
            .within(particle.position, config.connection_distance)
            .into_iter()
            .filter(|other| *other != index)
            .filter_map(|other| {
                let distance = particle.position.distance(particles.get(other)?.position);
                Some((other, distance))
            })
            .collect();
        closest.sort_by(|left, right| left.1.total_cmp(&right.1).then(left.0.cmp(&right.0)));
        chosen.extend(
            closest
                .into_iter()
                .take(config.max_connections)
                .map(|(other, distance)| Candidate {
                    first: index.min(other),
                    second: index.max(other),
                    distance,
                }),
        );
    }
    chosen
}

/// One pass over the sorted candidates, keeping an edge only when exactly one of its ends has
/// already been reached from the first particle.
fn greedy_tree(count: usize, candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut visited = vec![false; count];
    if let Some(first) = visited.first_mut() {
        *first = true;
    }

    let mut tree = Vec::new();
    for candidate in candidates {
        let first_visited = visited.get(candidate.first).copied().unwrap_or(false);
        let second_visited = visited.get(candidate.second).copied().unwrap_or(false);
        if first_visited == second_visited {
            continue;
        }
        for index in [candidate.first, candidate.second] {
            if let Some(seen) = visited.get_mut(index) {
                *seen = true;
            }
        }
        tree.push(candidate);
    }
    tree
}

/// Kruskal's algorithm: the shortest candidates that don't make a cycle.
fn spanning_forest(count: usize, candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut sets = DisjointSets::new(count);
    candidates
        .into_iter()
        .filter(|candidate| sets.union(candidate.first, candidate.second))
        .collect()
}

/// Union-find over particle indices.
struct DisjointSets {
    /// Each element's parent, roots point at themselves
    parents: Vec<usize>,
    /// Upper bound on each root's tree height
    ranks: Vec<u8>,
}

impl DisjointSets {
    /// Every element in its own set.
    fn new(count: usize) -> Self {
        Self {
            parents: (0..count).collect(),
            ranks: vec![0; count],
        }
    }

    /// The root of an element's set, flattening the path on the way.
    fn find(&mut self, element: usize) -> usize {
        let mut root = element;
        while let Some(&parent) = self.parents.get(root) {
            if parent == root {
                break;
            }
            root = parent;
        }

        let mut current = element;
        while current != root {
            let Some(parent) = self.parents.get_mut(current) else {
                break;
            };
            current = std::mem::replace(parent, root);
        }
        root
    }

    /// Merge two sets. False if they were already the same set.
    fn union(&mut self, first: usize, second: usize) -> bool {
        let first_root = self.find(first);
        let second_root = self.find(second);
        if first_root == second_root {
            return false;
        }

        let first_rank = self.ranks.get(first_root).copied().unwrap_or(0);
        let second_rank = self.ranks.get(second_root).copied().unwrap_or(0);
        let (child, parent) = if first_rank < second_rank {
            (first_root, second_root)
        } else {
            (second_root, first_root)
        };
        if let Some(slot) = self.parents.get_mut(child) {
            *slot = parent;
        }
        if first_rank == second_rank {
            if let Some(rank) = self.ranks.get_mut(parent) {
                *rank = rank.saturating_add(1);
            }
        }
        true
    }
}

/// Rebuilds the graph every tick, remembering the last one.
#[derive(Debug, Clone, Default)]
pub struct ConnectionBuilder {
    /// The edges from the previous tick
    previous: BTreeMap<EdgeId, Edge>,
}

impl ConnectionBuilder {
    /// A builder that has never built anything.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            previous: BTreeMap::new(),
        }
    }

    /// Build this tick's edges, ease their visual state and diff them against last tick's.
    pub fn update(
        &mut self,
        particles: &[Particle],
        config: &Config,
        dt: f32,
        spatial_index_threshold: usize,
    ) -> (Vec<Edge>, ConnectionDiff) {
        let ease = if config.animation_duration > 0.0 {
            (dt.max(0.0) / config.animation_duration).min(1.0)
        } else {
            1.0
        };

        let mut edges = build(particles, config, spatial_index_threshold);
        for edge in &mut edges {
            let (opacity, width) = self
                .previous
                .get(&edge.id)
                .map_or((0.0, 0.0), |previous| (previous.opacity, previous.width));
            edge.opacity = (edge.opacity - opacity).mul_add(ease, opacity);
            edge.width = (edge.width - width).mul_add(ease, width);
        }

        let previous_ids: BTreeSet<EdgeId> = self.previous.keys().copied().collect();
        let next_ids: BTreeSet<EdgeId> = edges.iter().map(|edge| edge.id).collect();
        let changes = diff(&previous_ids, &next_ids);
        if !changes.formed.is_empty() || !changes.broken.is_empty() {
            tracing::trace!(
                "Connections: {} formed, {} broken",
                changes.formed.len(),
                changes.broken.len()
            );
        }

        self.previous = edges.iter().map(|edge| (edge.id, edge.clone())).collect();
        (edges, changes)
    }

    /// The edges from the last update.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.previous.values()
    }

    /// Forget the previous tick, so every edge is new again.
    pub fn clear(&mut self) {
        self.previous.clear();
    }
}
