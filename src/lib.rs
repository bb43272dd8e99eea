//! ksolve-x - deterministic spatial reaction-diffusion solver
//!
//! A cylindrical compartment is cut into voxels along its axis. Each voxel
//! holds one pool per species; pools change by mass-action reactions
//! within a voxel and by diffusion between neighbouring voxels. The
//! resulting ODE system is integrated with fixed-step RK4.

// Allow non-snake-case for unit suffixes in field names (mM, etc.)
// This follows the project convention of including units in names.
#![allow(non_snake_case)]

pub mod config;
pub mod error;
pub mod geometry;
pub mod kinetics;
pub mod sim;

pub use config::{
    GeometryParameters, ModelConfig, ReactionParameters, SolverParameters, SpeciesParameters,
    StepPolicy,
};
pub use error::{KsolveError, Result};
pub use geometry::CylMesh;
pub use kinetics::{Model, PoolState, SteadyStateConfig, SteadyStateReport, AVOGADRO};
pub use sim::{
    CancelToken, RecordField, RunOutcome, SimDiagnostics, SimState, Simulation, Trajectory,
    WatchHandle,
};
