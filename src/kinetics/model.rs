//! Compiled reaction-diffusion model.
//!
//! Geometry, species, reactions and solver settings are validated and
//! compiled together. A [`Model`] is immutable; every run-time object
//! borrows or clones from it.

use crate::config::{ModelConfig, SolverParameters};
use crate::error::{KsolveError, Result};
use crate::geometry::CylMesh;

use super::diffusion::Diffusion;
use super::pool::PoolState;
use super::stoich::Stoichiometry;

/// Immutable compiled model
#[derive(Debug, Clone)]
pub struct Model {
    mesh: CylMesh,
    stoich: Stoichiometry,
    diffusion: Diffusion,
    conc_init_mM: Vec<f64>,
    volumes_m3: Vec<f64>,
    solver: SolverParameters,
}

impl Model {
    /// Validate and compile a model description
    pub fn compile(config: &ModelConfig) -> Result<Self> {
        let mesh = CylMesh::new(&config.geometry)?;

        for s in &config.species {
            let invalid = |message: String| KsolveError::InvalidSpecies {
                species: s.name.clone(),
                message,
            };
            if !s.diff_const_m2_per_sec.is_finite() || s.diff_const_m2_per_sec < 0.0 {
                return Err(invalid(format!(
                    "diffusion constant must be finite and >= 0, got {}",
                    s.diff_const_m2_per_sec
                )));
            }
            if !s.conc_init_mM.is_finite() || s.conc_init_mM < 0.0 {
                return Err(invalid(format!(
                    "initial concentration must be finite and >= 0, got {}",
                    s.conc_init_mM
                )));
            }
        }

        let stoich = Stoichiometry::compile(&config.species, &config.reactions)?;
        validate_solver(&config.solver)?;

        let diffusion = Diffusion::new(
            &mesh,
            config.species.iter().map(|s| s.diff_const_m2_per_sec).collect(),
        );
        let conc_init_mM = config.species.iter().map(|s| s.conc_init_mM).collect();
        let volumes_m3 = mesh.volumes();

        log::info!(
            "Compiled model: {} species, {} reactions, {} voxels, stoichiometry rank {}",
            stoich.n_species(),
            stoich.n_reactions(),
            mesh.num_voxels(),
            stoich.rank()
        );

        Ok(Self {
            mesh,
            stoich,
            diffusion,
            conc_init_mM,
            volumes_m3,
            solver: config.solver.clone(),
        })
    }

    /// Voxel mesh
    pub fn mesh(&self) -> &CylMesh {
        &self.mesh
    }

    /// Compiled reaction network
    pub fn stoichiometry(&self) -> &Stoichiometry {
        &self.stoich
    }

    /// Diffusion coupling
    pub fn diffusion(&self) -> &Diffusion {
        &self.diffusion
    }

    /// Solver settings
    pub fn solver(&self) -> &SolverParameters {
        &self.solver
    }

    /// Initial concentration per species (mM)
    pub fn conc_init(&self) -> &[f64] {
        &self.conc_init_mM
    }

    /// Voxel volumes (m³)
    pub fn volumes(&self) -> &[f64] {
        &self.volumes_m3
    }

    /// Number of species
    pub fn n_species(&self) -> usize {
        self.stoich.n_species()
    }

    /// Number of voxels
    pub fn n_voxels(&self) -> usize {
        self.mesh.num_voxels()
    }

    /// Species index by name
    pub fn species_index(&self, name: &str) -> Option<usize> {
        self.stoich.species_index(name)
    }

    /// Pool state at the initial concentrations
    pub fn initial_state(&self) -> PoolState {
        PoolState::uniform(&self.conc_init_mM, self.n_voxels())
    }

    /// Right-hand side of the ODE system: reactions plus diffusion
    ///
    /// `conc` and `dydt` are voxel-major; `dydt` must arrive zeroed.
    pub fn derivatives(&self, conc: &[f64], dydt: &mut [f64]) {
        let n = self.n_species();
        if self.stoich.n_reactions() > 0 {
            for (c, d) in conc.chunks(n).zip(dydt.chunks_mut(n)) {
                self.stoich.add_rates_of_change(c, d);
            }
        }
        self.diffusion.add_flux(conc, dydt);
    }

    /// Bound on the Jacobian spectral radius over all voxels (1/s)
    pub fn stiffness_bound(&self, conc: &[f64], scratch: &mut Vec<f64>) -> f64 {
        let n = self.n_species();
        if n == 0 {
            return 0.0;
        }
        conc.chunks(n)
            .enumerate()
            .map(|(voxel, c)| {
                self.stoich.reaction_jacobian_bound(c, scratch) + self.diffusion.stiffness_bound(voxel)
            })
            .fold(0.0, f64::max)
    }
}

fn validate_solver(solver: &SolverParameters) -> Result<()> {
    if !solver.dt_sec.is_finite() || solver.dt_sec <= 0.0 {
        return Err(KsolveError::schedule(format!(
            "solver dt must be positive, got {}",
            solver.dt_sec
        )));
    }
    if !solver.record_dt_sec.is_finite() || solver.record_dt_sec < solver.dt_sec {
        return Err(KsolveError::schedule(format!(
            "record dt {} must be finite and >= solver dt {}",
            solver.record_dt_sec, solver.dt_sec
        )));
    }
    if !solver.stability_margin.is_finite() || solver.stability_margin < 0.0 {
        return Err(KsolveError::schedule(format!(
            "stability margin must be >= 0, got {}",
            solver.stability_margin
        )));
    }
    if solver.max_substeps == 0 {
        return Err(KsolveError::schedule("max sub-steps must be at least 1"));
    }
    Ok(())
}
