//! Simulation context: the single owner of all run-time state.
//!
//! A [`Simulation`] wraps one compiled [`Model`] together with its pool
//! state, integrator, scheduler and recorder. Every run command goes
//! through it; nothing is global.
//!
//! ## Lifecycle
//! ```text
//! Uninitialized ──reinit──► Built ──start(T)──► Running ──T reached──► Paused
//!                             ▲                    │                      │
//!                             └──────reinit────────┴──cancelled──► Stopped┘
//! ```
//! Paused and Stopped both resume with another `start`.
//!
//! ## Usage
//! ```ignore
//! let mut sim = Simulation::from_config(&ModelConfig::default())?;
//! let a0 = sim.watch("A0", 0, RecordField::Concentration)?;
//! sim.reinit();
//! sim.start(10.0)?;
//! let last = sim.trajectory(a0)?.last();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::config::{ModelConfig, StepPolicy};
use crate::error::{KsolveError, Result};
use crate::kinetics::{
    safe_step, Model, PoolState, RK4Integrator, SteadyStateConfig, SteadyStateReport,
    SteadyStateSolver,
};

use super::recorder::{RecordField, Recorder, Trajectory, WatchHandle};
use super::scheduler::Scheduler;

/// Run state of a simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SimState {
    /// Pools not yet set to initial values
    Uninitialized,
    /// Reset to initial values at t = 0
    Built,
    /// Inside `start`
    Running,
    /// Requested time reached
    Paused,
    /// Cancelled between ticks
    Stopped,
}

/// How a `start` call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Ran for the full requested time
    Completed,
    /// Interrupted through the cancel token
    Cancelled,
}

/// Cooperative cancellation flag, checked between solver ticks
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Request that the running `start` return after the current tick
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True if a cancel is pending
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Consume a pending cancel
    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Diagnostic counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimDiagnostics {
    /// Current simulated time (s)
    pub time_sec: f64,
    /// Solver ticks since reinit
    pub steps: u64,
    /// RK4 steps since reinit (more than `steps` under adaptive splitting)
    pub substeps: u64,
    /// Concentrations clamped to zero
    pub clamp_events: u64,
    /// Ticks whose step exceeded the stability bound
    pub stability_violations: u64,
    /// Safe step computed for the last tick (s)
    pub last_safe_dt_sec: f64,
}

impl SimDiagnostics {
    /// Print a formatted summary
    pub fn print_summary(&self) {
        println!("=== Solver State (t = {:.3} s) ===", self.time_sec);
        println!("  Solver ticks:          {}", self.steps);
        println!("  RK4 steps:             {}", self.substeps);
        println!("  Clamp events:          {}", self.clamp_events);
        println!("  Stability violations:  {}", self.stability_violations);
        println!("  Last safe dt:          {:e} s", self.last_safe_dt_sec);
    }
}

/// Owned simulation context
pub struct Simulation {
    model: Model,
    pool: PoolState,
    integrator: RK4Integrator,
    scheduler: Scheduler,
    recorder: Recorder,
    state: SimState,
    cancel: CancelToken,
    diagnostics: SimDiagnostics,
    jacobian_scratch: Vec<f64>,
    warned_this_run: bool,
}

impl Simulation {
    /// Wrap a compiled model; pools stay at zero until `reinit`
    pub fn new(model: Model) -> Self {
        let pool = PoolState::new(model.n_species(), model.n_voxels());
        let integrator = RK4Integrator::new(pool.len());
        let scheduler = Scheduler::new(model.solver().dt_sec, model.solver().record_dt_sec);
        Self {
            model,
            pool,
            integrator,
            scheduler,
            recorder: Recorder::new(),
            state: SimState::Uninitialized,
            cancel: CancelToken::default(),
            diagnostics: SimDiagnostics::default(),
            jacobian_scratch: Vec::new(),
            warned_this_run: false,
        }
    }

    /// Compile a model description and wrap it
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        Ok(Self::new(Model::compile(config)?))
    }

    /// Compiled model
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Current run state
    pub fn state(&self) -> SimState {
        self.state
    }

    /// Current simulated time (s)
    pub fn time(&self) -> f64 {
        self.scheduler.time()
    }

    /// Read-only view of the pool state
    pub fn pool(&self) -> &PoolState {
        &self.pool
    }

    /// Diagnostic counters
    pub fn diagnostics(&self) -> &SimDiagnostics {
        &self.diagnostics
    }

    /// Token another thread can use to cancel a running `start`
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Reset pools to initial concentrations, time to zero, and clear samples
    ///
    /// Watch registrations survive; the t = 0 sample is recorded.
    pub fn reinit(&mut self) {
        self.pool = self.model.initial_state();
        self.integrator.reset();
        self.scheduler.reset();
        self.recorder.clear();
        self.diagnostics = SimDiagnostics::default();
        self.cancel.take();
        self.state = SimState::Built;
        self.fire_record_ticks();
        log::debug!("Reinit: {} state variables", self.pool.len());
    }

    fn species(&self, name: &str, context: &str) -> Result<usize> {
        self.model
            .species_index(name)
            .ok_or_else(|| KsolveError::unknown_species(context, name))
    }

    fn check_voxel(&self, voxel: usize) -> Result<()> {
        let num_voxels = self.model.n_voxels();
        if voxel >= num_voxels {
            return Err(KsolveError::InvalidVoxel { voxel, num_voxels });
        }
        Ok(())
    }

    /// Monitor a species in one voxel from the next record tick on
    pub fn watch(&mut self, species: &str, voxel: usize, field: RecordField) -> Result<WatchHandle> {
        let idx = self.species(species, "watch")?;
        self.check_voxel(voxel)?;
        Ok(self.recorder.add(species, idx, voxel, field))
    }

    /// Recorded samples for a watch
    pub fn trajectory(&self, handle: WatchHandle) -> Result<&Trajectory> {
        self.recorder
            .trajectory(handle)
            .ok_or(KsolveError::UnknownWatch(handle.index()))
    }

    /// All trajectories in registration order
    pub fn trajectories(&self) -> impl Iterator<Item = (WatchHandle, &Trajectory)> {
        self.recorder.trajectories()
    }

    /// Current concentration (mM)
    pub fn concentration(&self, species: &str, voxel: usize) -> Result<f64> {
        let idx = self.species(species, "concentration query")?;
        self.check_voxel(voxel)?;
        Ok(self.pool.get(idx, voxel))
    }

    /// Current molecule count in a voxel
    pub fn molecule_count(&self, species: &str, voxel: usize) -> Result<f64> {
        let idx = self.species(species, "molecule count query")?;
        self.check_voxel(voxel)?;
        Ok(self
            .pool
            .molecule_count(idx, voxel, self.model.volumes()[voxel]))
    }

    /// Amount of a species summed over the compartment (mmol)
    pub fn total_amount(&self, species: &str) -> Result<f64> {
        let idx = self.species(species, "amount query")?;
        Ok(self.pool.total_amount(idx, self.model.volumes()))
    }

    /// Overwrite one concentration between runs
    pub fn set_concentration(&mut self, species: &str, voxel: usize, value_mM: f64) -> Result<()> {
        let idx = self.species(species, "concentration update")?;
        self.check_voxel(voxel)?;
        if !value_mM.is_finite() || value_mM < 0.0 {
            return Err(KsolveError::InvalidSpecies {
                species: species.to_string(),
                message: format!("concentration must be finite and >= 0, got {}", value_mM),
            });
        }
        if self.state == SimState::Uninitialized {
            self.reinit();
        }
        self.pool.set(idx, voxel, value_mM);
        Ok(())
    }

    /// Advance simulated time by `duration_sec`
    ///
    /// Continues from wherever the previous run left off. Returns
    /// `Cancelled` if the cancel token fired; the state is then consistent
    /// and resumable. Under [`StepPolicy::Strict`] an unstable step aborts
    /// the call before the offending tick touches the pools, as does
    /// [`StepPolicy::Adaptive`] when a tick would need more than
    /// `max_substeps` sub-steps.
    pub fn start(&mut self, duration_sec: f64) -> Result<RunOutcome> {
        if !duration_sec.is_finite() || duration_sec < 0.0 {
            return Err(KsolveError::InvalidDuration(duration_sec));
        }
        if self.state == SimState::Uninitialized {
            self.reinit();
        }

        self.state = SimState::Running;
        self.warned_this_run = false;
        self.scheduler.extend(duration_sec);
        log::info!(
            "Running {} s (t = {} s, dt = {} s)",
            duration_sec,
            self.scheduler.time(),
            self.scheduler.dt_solve()
        );

        while self.scheduler.has_pending_step() {
            if self.cancel.take() {
                self.scheduler.hold();
                self.state = SimState::Stopped;
                log::info!("Run cancelled at t = {} s", self.scheduler.time());
                return Ok(RunOutcome::Cancelled);
            }
            if let Err(e) = self.solver_tick() {
                self.scheduler.hold();
                self.state = SimState::Paused;
                return Err(e);
            }
            self.scheduler.advance();
            self.diagnostics.time_sec = self.scheduler.time();
            self.fire_record_ticks();
        }

        self.state = SimState::Paused;
        Ok(RunOutcome::Completed)
    }

    /// Advance the pools by one solver tick
    fn solver_tick(&mut self) -> Result<()> {
        let solver = self.model.solver();
        let dt = solver.dt_sec;
        let lambda = self
            .model
            .stiffness_bound(self.pool.as_slice(), &mut self.jacobian_scratch);
        let safe_dt = safe_step(lambda);
        self.diagnostics.last_safe_dt_sec = safe_dt;

        let mut substeps = 1u64;
        if dt > safe_dt * (1.0 + solver.stability_margin) {
            self.diagnostics.stability_violations += 1;
            match solver.step_policy {
                StepPolicy::Strict => {
                    log::warn!("Step {:e} s exceeds stability bound {:e} s", dt, safe_dt);
                    return Err(KsolveError::UnstableStepSize {
                        dt_sec: dt,
                        safe_dt_sec: safe_dt,
                        time_sec: self.scheduler.time(),
                    });
                }
                StepPolicy::Lenient => {
                    if !self.warned_this_run {
                        log::warn!(
                            "Step {:e} s exceeds stability bound {:e} s; continuing with clamping",
                            dt,
                            safe_dt
                        );
                        self.warned_this_run = true;
                    }
                }
                StepPolicy::Adaptive => {
                    let needed = (dt / safe_dt).ceil();
                    if !needed.is_finite() || needed > solver.max_substeps as f64 {
                        log::warn!(
                            "Step {:e} s needs {:e} sub-steps of {:e} s, limit is {}",
                            dt,
                            needed,
                            safe_dt,
                            solver.max_substeps
                        );
                        return Err(KsolveError::UnstableStepSize {
                            dt_sec: dt,
                            safe_dt_sec: safe_dt,
                            time_sec: self.scheduler.time(),
                        });
                    }
                    substeps = needed as u64;
                    log::debug!("Splitting step {:e} s into {} sub-steps", dt, substeps);
                }
            }
        }

        let h = dt / substeps as f64;
        let model = &self.model;
        for _ in 0..substeps {
            let clamped = self
                .integrator
                .step(self.pool.as_mut_slice(), h, |y, dydt| model.derivatives(y, dydt));
            if clamped > 0 {
                log::debug!(
                    "Clamped {} negative concentrations at t = {} s",
                    clamped,
                    self.scheduler.time()
                );
                self.diagnostics.clamp_events += clamped;
            }
        }

        self.diagnostics.steps += 1;
        self.diagnostics.substeps += substeps;
        Ok(())
    }

    fn fire_record_ticks(&mut self) {
        while self.scheduler.record_due() {
            self.recorder
                .sample(self.scheduler.time(), &self.pool, self.model.volumes());
            self.scheduler.mark_recorded();
        }
    }

    /// Relax the pools to steady state without advancing time or recording
    pub fn settle(&mut self, config: &SteadyStateConfig) -> Result<SteadyStateReport> {
        if self.state == SimState::Uninitialized {
            self.reinit();
        }
        let mut solver = SteadyStateSolver::new(config.clone());
        let report = solver.settle(&self.model, &mut self.pool);
        self.diagnostics.clamp_events += report.clamp_events;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GeometryParameters, ReactionParameters, SolverParameters, SpeciesParameters};

    fn decay_config() -> ModelConfig {
        ModelConfig {
            geometry: GeometryParameters::cylinder(1e-6, 1e-6, 1e-6),
            species: vec![SpeciesParameters::new("A", 1.0), SpeciesParameters::new("B", 0.0)],
            reactions: vec![ReactionParameters::new("decay", &[("A", 1)], &[("B", 1)], 1.0, 0.0)],
            solver: SolverParameters {
                dt_sec: 0.01,
                record_dt_sec: 0.1,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_state_machine() {
        let mut sim = Simulation::from_config(&decay_config()).unwrap();
        assert_eq!(sim.state(), SimState::Uninitialized);
        assert_eq!(sim.concentration("A", 0).unwrap(), 0.0);

        sim.reinit();
        assert_eq!(sim.state(), SimState::Built);
        assert_eq!(sim.concentration("A", 0).unwrap(), 1.0);

        assert_eq!(sim.start(0.5).unwrap(), RunOutcome::Completed);
        assert_eq!(sim.state(), SimState::Paused);
        assert!((sim.time() - 0.5).abs() < 1e-12);

        sim.start(0.5).unwrap();
        assert!((sim.time() - 1.0).abs() < 1e-12);

        sim.reinit();
        assert_eq!(sim.state(), SimState::Built);
        assert_eq!(sim.time(), 0.0);
    }

    #[test]
    fn test_start_without_reinit() {
        let mut sim = Simulation::from_config(&decay_config()).unwrap();
        sim.start(1.0).unwrap();
        let a = sim.concentration("A", 0).unwrap();
        assert!((a - (-1.0_f64).exp()).abs() < 1e-8);
    }

    #[test]
    fn test_recording_schedule() {
        let mut sim = Simulation::from_config(&decay_config()).unwrap();
        let h = sim.watch("A", 0, RecordField::Concentration).unwrap();
        sim.reinit();
        sim.start(1.0).unwrap();

        let traj = sim.trajectory(h).unwrap();
        assert_eq!(traj.len(), 11);
        assert_eq!(traj.samples()[0].value, 1.0);
        for (k, s) in traj.samples().iter().enumerate() {
            assert!((s.time_sec - k as f64 * 0.1).abs() < 1e-9);
            assert!((s.value - (-s.time_sec).exp()).abs() < 1e-8);
        }
    }

    #[test]
    fn test_watch_errors() {
        let mut sim = Simulation::from_config(&decay_config()).unwrap();
        assert!(matches!(
            sim.watch("Z", 0, RecordField::Concentration),
            Err(KsolveError::UnknownSpecies { .. })
        ));
        assert!(matches!(
            sim.watch("A", 5, RecordField::Concentration),
            Err(KsolveError::InvalidVoxel { voxel: 5, num_voxels: 1 })
        ));
        assert!(matches!(
            sim.trajectory(WatchHandle(7)),
            Err(KsolveError::UnknownWatch(7))
        ));
    }

    #[test]
    fn test_invalid_duration() {
        let mut sim = Simulation::from_config(&decay_config()).unwrap();
        assert!(matches!(sim.start(-1.0), Err(KsolveError::InvalidDuration(_))));
        assert!(matches!(sim.start(f64::NAN), Err(KsolveError::InvalidDuration(_))));
    }

    #[test]
    fn test_cancel_before_first_tick() {
        let mut sim = Simulation::from_config(&decay_config()).unwrap();
        let h = sim.watch("A", 0, RecordField::Concentration).unwrap();
        sim.reinit();

        let token = sim.cancel_token();
        token.cancel();
        assert_eq!(sim.start(1.0).unwrap(), RunOutcome::Cancelled);
        assert_eq!(sim.state(), SimState::Stopped);
        assert_eq!(sim.time(), 0.0);
        assert_eq!(sim.trajectory(h).unwrap().len(), 1);
        assert!(!token.is_cancelled());

        // Resumes from where it stopped
        assert_eq!(sim.start(1.0).unwrap(), RunOutcome::Completed);
        assert!((sim.time() - 1.0).abs() < 1e-12);
        assert_eq!(sim.trajectory(h).unwrap().len(), 11);
    }

    #[test]
    fn test_set_concentration() {
        let mut sim = Simulation::from_config(&decay_config()).unwrap();
        sim.set_concentration("B", 0, 3.0).unwrap();
        assert_eq!(sim.state(), SimState::Built);
        assert_eq!(sim.concentration("B", 0).unwrap(), 3.0);
        assert!(sim.set_concentration("B", 0, -1.0).is_err());
    }
}
