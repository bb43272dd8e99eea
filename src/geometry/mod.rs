//! Geometry module for compartment voxelization.
//!
//! Only 1-D voxel chains are supported: a cylinder cut along its axis.

mod cyl_mesh;

pub use cyl_mesh::{CylMesh, Voxel, VoxelJunction, MAX_VOXELS};
