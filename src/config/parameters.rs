//! Model parameter structures.
//!
//! A [`ModelConfig`] carries everything needed to compile a model: the
//! compartment geometry, the species universe, the reaction list and the
//! integration settings. Units are SI with concentrations in mM (= mol/m³).

use std::path::Path;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level model description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Compartment geometry
    pub geometry: GeometryParameters,
    /// Chemical species (pools)
    pub species: Vec<SpeciesParameters>,
    /// Reaction network
    #[serde(default)]
    pub reactions: Vec<ReactionParameters>,
    /// Integration and recording settings
    #[serde(default)]
    pub solver: SolverParameters,
}

impl ModelConfig {
    /// Load a model from a JSON file, failing on any read or parse error
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&contents)?;
        log::info!("Loaded model config from {:?}", path.as_ref());
        Ok(config)
    }

    /// Load from JSON file or return the default model
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("Loaded model config from {:?}", path.as_ref());
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse model config: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("Model config file not found, using defaults");
                Self::default()
            }
        }
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for ModelConfig {
    /// Two independent reversible reactions A0 ⇌ C0 and A1 ⇌ C1 in a
    /// 1 m long, 1 mm radius cylinder cut into 1000 voxels.
    fn default() -> Self {
        let mut species = Vec::new();
        let mut reactions = Vec::new();
        for i in 0..2 {
            let a = format!("A{}", i);
            let c = format!("C{}", i);
            species.push(SpeciesParameters::new(&a, 1.0));
            species.push(SpeciesParameters::new(&c, 0.1));
            reactions.push(ReactionParameters::new(
                &format!("r{}", i),
                &[(a.as_str(), 1)],
                &[(c.as_str(), 1)],
                1.0,
                0.1,
            ));
        }

        Self {
            geometry: GeometryParameters::default(),
            species,
            reactions,
            solver: SolverParameters::default(),
        }
    }
}

/// Cylindrical compartment geometry
///
/// The axis runs from `x0` to `x1`. Radius varies linearly from `r0_m` at
/// the first face to `r1_m` at the last.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryParameters {
    /// Start of the cylinder axis (m)
    pub x0: DVec3,
    /// End of the cylinder axis (m)
    pub x1: DVec3,
    /// Radius at `x0` (m)
    pub r0_m: f64,
    /// Radius at `x1` (m)
    pub r1_m: f64,
    /// Target voxel length along the axis (m)
    pub diff_length_m: f64,
}

impl GeometryParameters {
    /// Straight cylinder of the given length along +x
    pub fn cylinder(length_m: f64, radius_m: f64, diff_length_m: f64) -> Self {
        Self {
            x0: DVec3::ZERO,
            x1: DVec3::new(length_m, 0.0, 0.0),
            r0_m: radius_m,
            r1_m: radius_m,
            diff_length_m,
        }
    }

    /// Axial length (m)
    pub fn length_m(&self) -> f64 {
        self.x0.distance(self.x1)
    }
}

impl Default for GeometryParameters {
    fn default() -> Self {
        // 1000 voxels of 1 mm
        Self::cylinder(1.0, 1e-3, 1e-3)
    }
}

/// A chemical species tracked in every voxel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesParameters {
    /// Unique species name
    pub name: String,
    /// Diffusion constant (m²/s)
    #[serde(default)]
    pub diff_const_m2_per_sec: f64,
    /// Initial concentration in every voxel (mM)
    #[serde(default)]
    pub conc_init_mM: f64,
}

impl SpeciesParameters {
    /// Non-diffusing species with a uniform initial concentration
    pub fn new(name: &str, conc_init_mM: f64) -> Self {
        Self {
            name: name.to_string(),
            diff_const_m2_per_sec: 0.0,
            conc_init_mM,
        }
    }

    /// Set the diffusion constant
    pub fn with_diffusion(mut self, diff_const_m2_per_sec: f64) -> Self {
        self.diff_const_m2_per_sec = diff_const_m2_per_sec;
        self
    }
}

/// One side of a reaction: species name and stoichiometric coefficient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoichTerm {
    pub species: String,
    #[serde(default = "default_coefficient")]
    pub coefficient: u32,
}

fn default_coefficient() -> u32 {
    1
}

/// Mass-action reaction: substrates ⇌ products
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionParameters {
    /// Reaction name (used in error messages and diagnostics)
    pub name: String,
    /// Substrates, in order
    pub substrates: Vec<StoichTerm>,
    /// Products, in order
    pub products: Vec<StoichTerm>,
    /// Forward rate constant (mM^(1-order)/s)
    pub kf: f64,
    /// Backward rate constant (mM^(1-order)/s)
    pub kb: f64,
}

impl ReactionParameters {
    /// Build a reaction from `(species, coefficient)` pairs
    pub fn new(
        name: &str,
        substrates: &[(&str, u32)],
        products: &[(&str, u32)],
        kf: f64,
        kb: f64,
    ) -> Self {
        let terms = |side: &[(&str, u32)]| {
            side.iter()
                .map(|&(species, coefficient)| StoichTerm {
                    species: species.to_string(),
                    coefficient,
                })
                .collect()
        };
        Self {
            name: name.to_string(),
            substrates: terms(substrates),
            products: terms(products),
            kf,
            kb,
        }
    }
}

/// How the solver reacts to a step that exceeds the stability bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StepPolicy {
    /// Abort the run with `UnstableStepSize`
    Strict,
    /// Take the step anyway, clamp negatives and count the violation
    Lenient,
    /// Split the tick into enough sub-steps to stay stable
    #[default]
    Adaptive,
}

/// Integration and recording settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverParameters {
    /// Solver tick (s)
    pub dt_sec: f64,
    /// Recording tick (s); must not be shorter than `dt_sec`
    pub record_dt_sec: f64,
    /// Behaviour on stability-bound violation
    #[serde(default)]
    pub step_policy: StepPolicy,
    /// Fractional tolerance above the safe step before a violation counts
    #[serde(default = "default_stability_margin")]
    pub stability_margin: f64,
    /// Most sub-steps the adaptive policy may split one tick into
    #[serde(default = "default_max_substeps")]
    pub max_substeps: u64,
}

fn default_stability_margin() -> f64 {
    0.1
}

fn default_max_substeps() -> u64 {
    10_000
}

impl Default for SolverParameters {
    fn default() -> Self {
        Self {
            dt_sec: 0.01,
            record_dt_sec: 0.1,
            step_policy: StepPolicy::Adaptive,
            stability_margin: default_stability_margin(),
            max_substeps: default_max_substeps(),
        }
    }
}
