//! Trajectory recording for watched pools.

use serde::{Deserialize, Serialize};

use crate::kinetics::PoolState;

/// Quantity sampled from a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RecordField {
    /// Concentration (mM)
    #[default]
    Concentration,
    /// Number of molecules in the voxel
    MoleculeCount,
}

/// Opaque reference to one watched (species, voxel, field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle(pub(crate) usize);

impl WatchHandle {
    /// Position in registration order
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One recorded value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    /// Simulated time (s)
    pub time_sec: f64,
    pub value: f64,
}

/// Append-only time series for one watch
#[derive(Debug, Clone, Serialize)]
pub struct Trajectory {
    /// Watched species name
    pub species: String,
    /// Watched voxel index
    pub voxel: usize,
    /// Sampled quantity
    pub field: RecordField,
    samples: Vec<Sample>,
}

impl Trajectory {
    fn new(species: String, voxel: usize, field: RecordField) -> Self {
        Self {
            species,
            voxel,
            field,
            samples: Vec::new(),
        }
    }

    fn push(&mut self, time_sec: f64, value: f64) {
        debug_assert!(
            self.samples.last().map_or(true, |s| s.time_sec <= time_sec),
            "trajectory time went backwards"
        );
        self.samples.push(Sample { time_sec, value });
    }

    /// All samples in time order
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Sample times (s)
    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.time_sec).collect()
    }

    /// Sample values
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    /// Most recent sample
    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

struct Watch {
    species: usize,
    voxel: usize,
    field: RecordField,
}

/// Samples every watch on each record tick
#[derive(Default)]
pub struct Recorder {
    watches: Vec<Watch>,
    trajectories: Vec<Trajectory>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a watch; indices are validated by the caller
    pub fn add(
        &mut self,
        species_name: &str,
        species: usize,
        voxel: usize,
        field: RecordField,
    ) -> WatchHandle {
        let handle = WatchHandle(self.watches.len());
        self.watches.push(Watch {
            species,
            voxel,
            field,
        });
        self.trajectories
            .push(Trajectory::new(species_name.to_string(), voxel, field));
        handle
    }

    /// Append the current value of every watch
    ///
    /// Reads `pool` only; nothing is retained past the call.
    pub fn sample(&mut self, time_sec: f64, pool: &PoolState, volumes_m3: &[f64]) {
        for (watch, trajectory) in self.watches.iter().zip(self.trajectories.iter_mut()) {
            let value = match watch.field {
                RecordField::Concentration => pool.get(watch.species, watch.voxel),
                RecordField::MoleculeCount => {
                    pool.molecule_count(watch.species, watch.voxel, volumes_m3[watch.voxel])
                }
            };
            trajectory.push(time_sec, value);
        }
    }

    /// Drop all samples, keeping registrations
    pub fn clear(&mut self) {
        for trajectory in &mut self.trajectories {
            trajectory.samples.clear();
        }
    }

    /// Trajectory for a handle
    pub fn trajectory(&self, handle: WatchHandle) -> Option<&Trajectory> {
        self.trajectories.get(handle.0)
    }

    /// All trajectories with their handles, in registration order
    pub fn trajectories(&self) -> impl Iterator<Item = (WatchHandle, &Trajectory)> {
        self.trajectories
            .iter()
            .enumerate()
            .map(|(i, t)| (WatchHandle(i), t))
    }

    /// Number of watches
    pub fn len(&self) -> usize {
        self.watches.len()
    }

    /// Check if no watches are registered
    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }
}
