//! Neighbour queries.
//!
//! Small simulations just check every particle. Once there are more than
//! `spatial_index_threshold` particles an R-tree is built once per pass instead. Either way the
//! answer is the same list of indices, in ascending order, so swapping strategies never changes
//! what the physics or the connections see.

use glam::Vec2;
use rstar::primitives::GeomWithData;

use crate::particle::Particle;

/// A particle's position tagged with its index in the snapshot.
type IndexedPoint = GeomWithData<[f32; 2], usize>;

/// Answers "which particles are within `radius` of here?".
#[derive(Debug)]
pub enum Neighbours {
    /// Check every particle.
    AllPairs {
        /// Copies of all the positions, by index
        positions: Vec<Vec2>,
    },
    /// Use an R-tree.
    Indexed {
        /// The tree of all positions
        tree: rstar::RTree<IndexedPoint>,
    },
}

impl Neighbours {
    /// Prepare neighbour queries over a snapshot of particles.
    #[must_use]
    pub fn new(particles: &[Particle], threshold: usize) -> Self {
        if particles.len() <= threshold {
            return Self::AllPairs {
                positions: particles.iter().map(|particle| particle.position).collect(),
            };
        }

        let points = particles
            .iter()
            .enumerate()
            .filter(|(_, particle)| particle.position.is_finite())
            .map(|(index, particle)| {
                GeomWithData::new([particle.position.x, particle.position.y], index)
            })
            .collect();
        tracing::trace!("Building spatial index for {} particles", particles.len());
        Self::Indexed {
            tree: rstar::RTree::bulk_load(points),
        }
    }

    /// Indices of every particle within `radius` of `position` (inclusive), ascending.
    #[must_use]
    pub fn within(&self, position: Vec2, radius: f32) -> Vec<usize> {
        if !radius.is_finite() || radius < 0.0 || !position.is_finite() {
            return Vec::new();
        }
        let radius_squared = radius * radius;

        match self {
            Self::AllPairs { positions } => positions
                .iter()
                .enumerate()
                .filter(|(_, other)| other.distance_squared(position) <= radius_squared)
                .map(|(index, _)| index)
                .collect(),
            Self::Indexed { tree } => {
                let mut found: Vec<usize> = tree
                    .locate_within_distance([position.x, position.y], radius_squared)
                    .map(|point| point.data)
                    .collect();
                found.sort_unstable();
                found
            }
        }
    }
}
