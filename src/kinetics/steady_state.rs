//! Steady-state settling.
//!
//! Relaxes a pool state to a fixed point of the reaction-diffusion
//! right-hand side by pseudo-time RK4 steps at half the stable step size,
//! capped at ten model steps. Relaxation keeps every conservation law of
//! the stoichiometry, so the fixed point reached is the one on the
//! initial state's conservation manifold. Simulated time is not advanced.

use serde::{Deserialize, Serialize};

use super::integrator::{safe_step, RK4Integrator};
use super::model::Model;
use super::pool::PoolState;

/// Cap on the pseudo-time step, in units of the model step
const MAX_STEP_FACTOR: f64 = 10.0;

/// Settling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteadyStateConfig {
    /// Converged when max |dC/dt| (mM/s) falls to this value
    pub convergence_criterion: f64,
    /// Iteration cap
    pub max_iter: usize,
}

impl Default for SteadyStateConfig {
    fn default() -> Self {
        Self {
            convergence_criterion: 1e-9,
            max_iter: 100_000,
        }
    }
}

/// Outcome of a settle attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SteadyStateStatus {
    /// Residual reached the convergence criterion
    Converged,
    /// Gave up after `max_iter` pseudo-time steps
    IterationLimit,
}

/// Result of settling
#[derive(Debug, Clone, Serialize)]
pub struct SteadyStateReport {
    pub status: SteadyStateStatus,
    /// Pseudo-time steps taken
    pub n_iter: usize,
    /// Final max |dC/dt| (mM/s)
    pub residual: f64,
    /// Rank of the net stoichiometry matrix
    pub rank: usize,
    /// Species count minus rank
    pub num_conservation_laws: usize,
    /// Values clamped to zero while settling
    pub clamp_events: u64,
}

impl SteadyStateReport {
    /// True when the residual reached the criterion
    pub fn converged(&self) -> bool {
        self.status == SteadyStateStatus::Converged
    }
}

/// Pseudo-time relaxation solver
pub struct SteadyStateSolver {
    pub config: SteadyStateConfig,
    integrator: RK4Integrator,
    dydt: Vec<f64>,
    jacobian_scratch: Vec<f64>,
}

impl SteadyStateSolver {
    pub fn new(config: SteadyStateConfig) -> Self {
        Self {
            config,
            integrator: RK4Integrator::new(0),
            dydt: Vec::new(),
            jacobian_scratch: Vec::new(),
        }
    }

    fn residual(&mut self, model: &Model, conc: &[f64]) -> f64 {
        self.dydt.clear();
        self.dydt.resize(conc.len(), 0.0);
        model.derivatives(conc, &mut self.dydt);
        self.dydt.iter().fold(0.0, |acc, d| acc.max(d.abs()))
    }

    /// Relax `pool` towards steady state in place
    pub fn settle(&mut self, model: &Model, pool: &mut PoolState) -> SteadyStateReport {
        let stoich = model.stoichiometry();
        let rank = stoich.rank();
        let num_conservation_laws = stoich.n_species() - rank;
        let clamps_before = self.integrator.clamp_count;

        let mut n_iter = 0;
        let mut residual = self.residual(model, pool.as_slice());
        while residual > self.config.convergence_criterion && n_iter < self.config.max_iter {
            let lambda = model.stiffness_bound(pool.as_slice(), &mut self.jacobian_scratch);
            let safe = safe_step(lambda);
            let h = (0.5 * safe).min(MAX_STEP_FACTOR * model.solver().dt_sec);
            self.integrator
                .step(pool.as_mut_slice(), h, |y, dydt| model.derivatives(y, dydt));
            n_iter += 1;
            residual = self.residual(model, pool.as_slice());
        }

        let status = if residual <= self.config.convergence_criterion {
            SteadyStateStatus::Converged
        } else {
            SteadyStateStatus::IterationLimit
        };
        let clamp_events = self.integrator.clamp_count - clamps_before;

        match status {
            SteadyStateStatus::Converged => {
                log::info!("Steady state reached after {} iterations (residual {:e})", n_iter, residual)
            }
            SteadyStateStatus::IterationLimit => log::warn!(
                "Steady state not reached after {} iterations (residual {:e})",
                n_iter,
                residual
            ),
        }

        SteadyStateReport {
            status,
            n_iter,
            residual,
            rank,
            num_conservation_laws,
            clamp_events,
        }
    }
}

impl Default for SteadyStateSolver {
    fn default() -> Self {
        Self::new(SteadyStateConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GeometryParameters, ModelConfig, ReactionParameters, SolverParameters, SpeciesParameters};

    fn single_voxel(species: Vec<SpeciesParameters>, reactions: Vec<ReactionParameters>) -> Model {
        Model::compile(&ModelConfig {
            geometry: GeometryParameters::cylinder(1e-6, 1e-6, 1e-6),
            species,
            reactions,
            solver: SolverParameters::default(),
        })
        .unwrap()
    }

    #[test]
    fn test_settle_detailed_balance() {
        let model = single_voxel(
            vec![SpeciesParameters::new("A", 1.0), SpeciesParameters::new("C", 0.1)],
            vec![ReactionParameters::new("r", &[("A", 1)], &[("C", 1)], 1.0, 0.1)],
        );
        let mut pool = model.initial_state();
        let report = SteadyStateSolver::default().settle(&model, &mut pool);

        assert!(report.converged(), "{:?}", report);
        assert_eq!(report.rank, 1);
        assert_eq!(report.num_conservation_laws, 1);
        let a = pool.get(0, 0);
        let c = pool.get(1, 0);
        assert!((1.0 * a - 0.1 * c).abs() < 1e-8, "Kf·A = {}, Kb·C = {}", a, 0.1 * c);
        assert!((a + c - 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_settle_dimerization() {
        // 2A ⇌ B, kf = 1, kb = 1: at steady state A² = B, A + 2B = 1
        let model = single_voxel(
            vec![SpeciesParameters::new("A", 1.0), SpeciesParameters::new("B", 0.0)],
            vec![ReactionParameters::new("dimer", &[("A", 2)], &[("B", 1)], 1.0, 1.0)],
        );
        let mut pool = model.initial_state();
        let report = SteadyStateSolver::default().settle(&model, &mut pool);

        assert!(report.converged());
        let a = pool.get(0, 0);
        let b = pool.get(1, 0);
        assert!((a * a - b).abs() < 1e-8);
        assert!((a + 2.0 * b - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_already_steady() {
        let model = single_voxel(vec![SpeciesParameters::new("A", 1.0)], vec![]);
        let mut pool = model.initial_state();
        let report = SteadyStateSolver::default().settle(&model, &mut pool);
        assert!(report.converged());
        assert_eq!(report.n_iter, 0);
        assert_eq!(pool.get(0, 0), 1.0);
    }

    #[test]
    fn test_iteration_limit() {
        // Constant production never settles
        let model = single_voxel(
            vec![SpeciesParameters::new("P", 0.0)],
            vec![ReactionParameters::new("source", &[], &[("P", 1)], 1.0, 0.0)],
        );
        let mut pool = model.initial_state();
        let mut solver = SteadyStateSolver::new(SteadyStateConfig {
            convergence_criterion: 1e-9,
            max_iter: 10,
        });
        let report = solver.settle(&model, &mut pool);
        assert_eq!(report.status, SteadyStateStatus::IterationLimit);
        assert_eq!(report.n_iter, 10);
    }
}
