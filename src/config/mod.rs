//! Configuration module for model and solver parameters.
//!
//! Models can be built in code or loaded from JSON.

mod parameters;

pub use parameters::{
    GeometryParameters, ModelConfig, ReactionParameters, SolverParameters, SpeciesParameters,
    StepPolicy, StoichTerm,
};
