//! Reaction-diffusion kinetics.
//!
//! This module holds the numerical core:
//! - Pool state (per-voxel concentrations)
//! - Stoichiometry compilation and mass-action rates
//! - Diffusion coupling across voxel junctions
//! - RK4 integration with clamping and a stability bound
//! - Steady-state settling
//!
//! The ODE for species s in voxel i is
//!
//! dCₛᵢ/dt = Σᵣ νₛᵣ·vᵣ(Cᵢ) + Σⱼ Dₛ·Aᵢⱼ/dᵢⱼ·(Cₛⱼ − Cₛᵢ)/Vᵢ

pub mod diffusion;
pub mod integrator;
pub mod model;
pub mod pool;
pub mod steady_state;
pub mod stoich;

pub use diffusion::Diffusion;
pub use integrator::{safe_step, RK4Integrator, RK4_STABILITY_LIMIT};
pub use model::Model;
pub use pool::{PoolState, AVOGADRO};
pub use steady_state::{SteadyStateConfig, SteadyStateReport, SteadyStateSolver, SteadyStateStatus};
pub use stoich::{mass_action_term, CompiledReaction, Stoichiometry};
