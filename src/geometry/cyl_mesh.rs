//! Cylindrical compartment voxelization.
//!
//! Cuts a (possibly tapered) cylinder into equal-length voxels along its
//! axis. Each voxel is a conical frustum; adjacent voxels share a circular
//! face through which species diffuse.

use std::f64::consts::PI;

use glam::DVec3;

use crate::config::GeometryParameters;
use crate::error::{KsolveError, Result};

/// Round-off allowance, in ulps of the length / voxel-length ratio, within
/// which the ratio snaps to the nearest whole voxel count.
const VOXEL_COUNT_ULPS: f64 = 64.0;

/// Largest voxel count a mesh may have
pub const MAX_VOXELS: usize = 10_000_000;

/// Shared face between two adjacent voxels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelJunction {
    /// Index of the neighbouring voxel
    pub neighbor: usize,
    /// Cross-section area of the shared face (m²)
    pub area_m2: f64,
    /// Centre-to-centre distance (m)
    pub distance_m: f64,
}

impl VoxelJunction {
    /// Diffusive conductance area/distance (m)
    #[inline]
    pub fn conductance_m(&self) -> f64 {
        self.area_m2 / self.distance_m
    }
}

/// One voxel of the compartment
#[derive(Debug, Clone)]
pub struct Voxel {
    /// Position in the mesh
    pub index: usize,
    /// Volume (m³)
    pub volume_m3: f64,
    /// Axial centre point (m)
    pub center: DVec3,
    /// Radius at the face nearer `x0` (m)
    pub r_start_m: f64,
    /// Radius at the face nearer `x1` (m)
    pub r_end_m: f64,
    /// Neighbours, lower index first
    pub junctions: Vec<VoxelJunction>,
}

/// Voxelized cylinder
#[derive(Debug, Clone)]
pub struct CylMesh {
    voxels: Vec<Voxel>,
    length_m: f64,
    voxel_length_m: f64,
}

impl CylMesh {
    /// Build the voxel sequence from geometry parameters
    ///
    /// Voxel count is `ceil(length / diff_length)`, except that a ratio within
    /// round-off of a whole number is taken as that number; every voxel gets
    /// the same axial length `length / count`. More than [`MAX_VOXELS`]
    /// voxels is an `InvalidGeometry` error.
    pub fn new(params: &GeometryParameters) -> Result<Self> {
        let length_m = params.length_m();
        let finite = params.x0.is_finite()
            && params.x1.is_finite()
            && params.r0_m.is_finite()
            && params.r1_m.is_finite()
            && params.diff_length_m.is_finite();
        if !finite {
            return Err(KsolveError::geometry("parameters must be finite"));
        }
        if length_m <= 0.0 {
            return Err(KsolveError::geometry(format!(
                "length must be positive, got {} m",
                length_m
            )));
        }
        if params.r0_m <= 0.0 || params.r1_m <= 0.0 {
            return Err(KsolveError::geometry(format!(
                "radii must be positive, got r0 = {} m, r1 = {} m",
                params.r0_m, params.r1_m
            )));
        }
        if params.diff_length_m <= 0.0 {
            return Err(KsolveError::geometry(format!(
                "voxel length must be positive, got {} m",
                params.diff_length_m
            )));
        }

        let ratio = length_m / params.diff_length_m;
        if !ratio.is_finite() || ratio > MAX_VOXELS as f64 {
            return Err(KsolveError::geometry(format!(
                "length {} m / voxel length {} m exceeds {} voxels",
                length_m, params.diff_length_m, MAX_VOXELS
            )));
        }
        let nearest = ratio.round();
        let snapped = if (ratio - nearest).abs() <= VOXEL_COUNT_ULPS * f64::EPSILON * ratio.max(1.0) {
            nearest
        } else {
            ratio.ceil()
        };
        let num_voxels = (snapped as usize).clamp(1, MAX_VOXELS);
        let voxel_length_m = length_m / num_voxels as f64;
        let axis = (params.x1 - params.x0) / length_m;

        let radius_at = |face: usize| {
            let frac = face as f64 / num_voxels as f64;
            params.r0_m + (params.r1_m - params.r0_m) * frac
        };

        let mut voxels = Vec::with_capacity(num_voxels);
        for i in 0..num_voxels {
            let ra = radius_at(i);
            let rb = radius_at(i + 1);
            let volume_m3 = PI * voxel_length_m / 3.0 * (ra * ra + ra * rb + rb * rb);
            let center = params.x0 + axis * (voxel_length_m * (i as f64 + 0.5));

            let mut junctions = Vec::with_capacity(2);
            if i > 0 {
                junctions.push(VoxelJunction {
                    neighbor: i - 1,
                    area_m2: PI * ra * ra,
                    distance_m: voxel_length_m,
                });
            }
            if i + 1 < num_voxels {
                junctions.push(VoxelJunction {
                    neighbor: i + 1,
                    area_m2: PI * rb * rb,
                    distance_m: voxel_length_m,
                });
            }

            voxels.push(Voxel {
                index: i,
                volume_m3,
                center,
                r_start_m: ra,
                r_end_m: rb,
                junctions,
            });
        }

        log::debug!(
            "Built cylinder mesh: {} voxels of {:e} m, total volume {:e} m³",
            num_voxels,
            voxel_length_m,
            voxels.iter().map(|v| v.volume_m3).sum::<f64>()
        );

        Ok(Self {
            voxels,
            length_m,
            voxel_length_m,
        })
    }

    /// Number of voxels
    pub fn num_voxels(&self) -> usize {
        self.voxels.len()
    }

    /// Voxel by index
    pub fn voxel(&self, index: usize) -> Option<&Voxel> {
        self.voxels.get(index)
    }

    /// All voxels in axial order
    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    /// Voxel volumes in axial order (m³)
    pub fn volumes(&self) -> Vec<f64> {
        self.voxels.iter().map(|v| v.volume_m3).collect()
    }

    /// Sum of voxel volumes (m³)
    pub fn total_volume(&self) -> f64 {
        self.voxels.iter().map(|v| v.volume_m3).sum()
    }

    /// Compartment length (m)
    pub fn length(&self) -> f64 {
        self.length_m
    }

    /// Actual axial voxel length (m)
    pub fn voxel_length(&self) -> f64 {
        self.voxel_length_m
    }
}
