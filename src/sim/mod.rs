//! Simulation runtime: clocks, recording and the run-control context.

mod recorder;
mod scheduler;
mod simulation;

pub use recorder::{RecordField, Recorder, Sample, Trajectory, WatchHandle};
pub use scheduler::Scheduler;
pub use simulation::{CancelToken, RunOutcome, SimDiagnostics, SimState, Simulation};
