//! Solver and recording clocks.
//!
//! Both clocks are integer tick counters; simulated time is always
//! `ticks × dt`, never a running sum, so long runs do not drift. Requested
//! run time is converted to whole ticks as it arrives, with the fraction
//! of a tick carried into the next request, so a run split into pieces
//! executes exactly the ticks of the unsplit run.

/// Tolerance on tick boundaries, as a fraction of the solver step
const TICK_TOLERANCE: f64 = 1e-9;

/// Interleaved solver and record ticks
#[derive(Debug, Clone)]
pub struct Scheduler {
    dt_solve_sec: f64,
    dt_record_sec: f64,
    step_index: u64,
    record_index: u64,
    /// Solver tick at which the requested run ends
    target_step: u64,
    /// Requested time not yet covered by a whole tick (s)
    remainder_sec: f64,
}

impl Scheduler {
    /// Create a scheduler; intervals are validated at model compile time
    pub fn new(dt_solve_sec: f64, dt_record_sec: f64) -> Self {
        Self {
            dt_solve_sec,
            dt_record_sec,
            step_index: 0,
            record_index: 0,
            target_step: 0,
            remainder_sec: 0.0,
        }
    }

    /// Back to t = 0 with the t = 0 record tick pending
    pub fn reset(&mut self) {
        self.step_index = 0;
        self.record_index = 0;
        self.target_step = 0;
        self.remainder_sec = 0.0;
    }

    /// Record-tick comparison slack at time `t`: a fixed fraction of the
    /// step plus a few ulps of `t` for long runs
    #[inline]
    fn slack(&self, t: f64) -> f64 {
        TICK_TOLERANCE * self.dt_solve_sec + 4.0 * f64::EPSILON * t.abs()
    }

    /// Solver tick (s)
    pub fn dt_solve(&self) -> f64 {
        self.dt_solve_sec
    }

    /// Record tick (s)
    pub fn dt_record(&self) -> f64 {
        self.dt_record_sec
    }

    /// Current simulated time (s)
    pub fn time(&self) -> f64 {
        self.step_index as f64 * self.dt_solve_sec
    }

    /// Solver ticks executed since reset
    pub fn step_index(&self) -> u64 {
        self.step_index
    }

    /// Record ticks fired since reset
    pub fn record_index(&self) -> u64 {
        self.record_index
    }

    /// Time at which the run requested so far ends (s)
    pub fn target_time(&self) -> f64 {
        self.target_step as f64 * self.dt_solve_sec
    }

    /// Solver tick at which the requested run ends
    pub fn target_step(&self) -> u64 {
        self.target_step
    }

    /// Time of the next record tick (s)
    pub fn next_record_time(&self) -> f64 {
        self.record_index as f64 * self.dt_record_sec
    }

    /// Request `duration_sec` more simulated time
    ///
    /// A request within `TICK_TOLERANCE` of a whole number of ticks counts
    /// as that number; anything short of a tick is carried forward.
    pub fn extend(&mut self, duration_sec: f64) {
        let total_sec = self.remainder_sec + duration_sec;
        let ticks = (total_sec / self.dt_solve_sec + TICK_TOLERANCE).floor().max(0.0);
        self.target_step = self.target_step.saturating_add(ticks as u64);
        self.remainder_sec = (total_sec - ticks * self.dt_solve_sec).max(0.0);
    }

    /// Drop whatever remains of the requested run
    pub fn hold(&mut self) {
        self.target_step = self.step_index;
        self.remainder_sec = 0.0;
    }

    /// True while another solver tick is owed to the requested run
    pub fn has_pending_step(&self) -> bool {
        self.step_index < self.target_step
    }

    /// Mark one solver tick as done
    pub fn advance(&mut self) {
        self.step_index += 1;
    }

    /// True when the current time has reached the next record tick
    pub fn record_due(&self) -> bool {
        let now = self.time();
        self.next_record_time() <= now + self.slack(now)
    }

    /// Mark the pending record tick as fired
    pub fn mark_recorded(&mut self) {
        self.record_index += 1;
    }
}
