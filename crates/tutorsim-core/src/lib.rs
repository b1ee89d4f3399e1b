//! Actor runtime and tutoring roles for tutorsim.
//!
//! Layering, bottom to top: the actor runtime and event bus, the generation
//! collaborator, conversation tracking, the role actors, and the
//! [`simulation::Simulation`] harness that wires them together for one
//! conversation. Storage and network implementations live in tutorsim-infra
//! behind the traits in [`repository`] and [`llm`].

pub mod actor;
pub mod conversation;
pub mod llm;
pub mod message;
pub mod repository;
pub mod roles;
pub mod simulation;

#[cfg(test)]
pub(crate) mod testing;

pub use simulation::{Simulation, SimulationError, SimulationOutcome};
