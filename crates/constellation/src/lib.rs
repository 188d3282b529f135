//! # Constellation
//! A host-agnostic particle simulation that draws connections between nearby particles.
//!
//! Particles are emitted, pushed around by physics and by the user's pointer, connected into a
//! proximity graph and finally culled down to what is worth drawing. The crate does no drawing,
//! no I/O and no threading: a host calls [`simulation::SimulationContext::tick`] (or the pure
//! [`simulation::step`]) on its own timer and hands the returned
//! [`render::RenderSnapshot`] to whatever draws things.
//!
//! Everything random goes through one seedable [`rng::SimulationRng`], so a seeded simulation
//! replays exactly.

#![expect(clippy::pub_use, reason = "Hosts need the same `glam` as us")]

pub use glam;

pub mod config;
pub mod connections;
pub mod emitter;
pub mod events;
pub mod forces;
pub mod particle;
pub mod physics;
pub mod render;
pub mod rng;
pub mod simulation;
pub mod spatial;
pub mod store;
