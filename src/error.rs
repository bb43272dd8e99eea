//! Error types for model compilation and simulation runs.
//!
//! Build-time failures (`InvalidGeometry`, `UnknownSpecies`, `InvalidRate`, ...)
//! are raised by [`crate::Model::compile`], so a [`crate::Simulation`] never
//! exists for a malformed model. Apart from argument checks, the only error
//! a run can produce is `UnstableStepSize`: under [`crate::StepPolicy::Strict`]
//! when the step exceeds the stability bound, and under
//! [`crate::StepPolicy::Adaptive`] when it would need more than `max_substeps`.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, KsolveError>;

/// Unified error type for all ksolve operations.
#[derive(Error, Debug)]
pub enum KsolveError {
    /// Bad mesh parameters (non-positive length, radius or voxel length)
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Species with a negative or non-finite parameter
    #[error("Invalid species '{species}': {message}")]
    InvalidSpecies { species: String, message: String },

    /// Two species share a name
    #[error("Duplicate species '{0}'")]
    DuplicateSpecies(String),

    /// A reaction or watch refers to a species that is not in the model
    #[error("Unknown species '{species}' referenced by {context}")]
    UnknownSpecies { context: String, species: String },

    /// Rate constant negative or non-finite
    #[error("Invalid rate in reaction '{reaction}': {message}")]
    InvalidRate { reaction: String, message: String },

    /// Zero coefficient, or a reaction with neither substrates nor products
    #[error("Invalid stoichiometry in reaction '{reaction}': {message}")]
    InvalidStoichiometry { reaction: String, message: String },

    /// Solver or record interval unusable
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Voxel index beyond the mesh
    #[error("Voxel {voxel} out of range (mesh has {num_voxels} voxels)")]
    InvalidVoxel { voxel: usize, num_voxels: usize },

    /// Watch handle not issued by this simulation
    #[error("Unknown watch handle {0}")]
    UnknownWatch(usize),

    /// Negative or non-finite run duration
    #[error("Invalid run duration: {0}")]
    InvalidDuration(f64),

    /// Fixed step exceeds the stability bound by more than the allowed margin
    #[error("Unstable step size: dt = {dt_sec:e} s exceeds safe bound {safe_dt_sec:e} s at t = {time_sec} s")]
    UnstableStepSize {
        dt_sec: f64,
        safe_dt_sec: f64,
        time_sec: f64,
    },

    /// I/O errors (config file reading)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config deserialization errors
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KsolveError {
    /// Creates a geometry error.
    pub fn geometry(message: impl Into<String>) -> Self {
        KsolveError::InvalidGeometry(message.into())
    }

    /// Creates a schedule error.
    pub fn schedule(message: impl Into<String>) -> Self {
        KsolveError::InvalidSchedule(message.into())
    }

    /// Creates an unknown-species error.
    pub fn unknown_species(context: impl Into<String>, species: impl Into<String>) -> Self {
        KsolveError::UnknownSpecies {
            context: context.into(),
            species: species.into(),
        }
    }
}
