//! Diffusive coupling between adjacent voxels.
//!
//! Discretized Fick's law over every junction:
//!
//! dCᵢ/dt += Σⱼ D · Aᵢⱼ / dᵢⱼ · (Cⱼ − Cᵢ) / Vᵢ
//!
//! The flux across a junction is identical in magnitude on both sides, so
//! Σ C·V per species is conserved up to round-off.

use crate::geometry::CylMesh;

/// Precomputed junction conductances for one mesh
#[derive(Debug, Clone)]
pub struct Diffusion {
    /// Diffusion constant per species (m²/s)
    diff_consts: Vec<f64>,
    /// Per voxel: (neighbour, area/distance / own volume) in 1/m²
    couplings: Vec<Vec<(usize, f64)>>,
    /// Per voxel: Σ area/distance / volume (1/m²)
    coupling_sums: Vec<f64>,
    /// Largest diffusion constant (m²/s)
    max_diff_const: f64,
}

impl Diffusion {
    /// Build from a mesh and per-species diffusion constants
    pub fn new(mesh: &CylMesh, diff_consts: Vec<f64>) -> Self {
        let couplings: Vec<Vec<(usize, f64)>> = mesh
            .voxels()
            .iter()
            .map(|v| {
                v.junctions
                    .iter()
                    .map(|j| (j.neighbor, j.conductance_m() / v.volume_m3))
                    .collect()
            })
            .collect();
        let coupling_sums = couplings
            .iter()
            .map(|c| c.iter().map(|&(_, g)| g).sum())
            .collect();
        let max_diff_const = diff_consts.iter().copied().fold(0.0, f64::max);

        Self {
            diff_consts,
            couplings,
            coupling_sums,
            max_diff_const,
        }
    }

    /// True when no species diffuses or the mesh has a single voxel
    pub fn is_inert(&self) -> bool {
        self.max_diff_const == 0.0 || self.couplings.iter().all(|c| c.is_empty())
    }

    /// Diffusion constant per species (m²/s)
    pub fn diff_consts(&self) -> &[f64] {
        &self.diff_consts
    }

    /// Add the diffusive term to a voxel-major derivatives vector
    pub fn add_flux(&self, conc: &[f64], dydt: &mut [f64]) {
        if self.is_inert() {
            return;
        }
        let n_species = self.diff_consts.len();
        for (voxel, couplings) in self.couplings.iter().enumerate() {
            let own = voxel * n_species;
            for &(neighbor, g) in couplings {
                let other = neighbor * n_species;
                for (s, &d) in self.diff_consts.iter().enumerate() {
                    if d > 0.0 {
                        dydt[own + s] += d * g * (conc[other + s] - conc[own + s]);
                    }
                }
            }
        }
    }

    /// Gershgorin bound of the diffusion operator for one voxel (1/s)
    ///
    /// Diagonal and off-diagonal contributions are equal, hence the factor 2.
    pub fn stiffness_bound(&self, voxel: usize) -> f64 {
        2.0 * self.max_diff_const * self.coupling_sums.get(voxel).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeometryParameters;

    fn three_voxel_mesh() -> CylMesh {
        CylMesh::new(&GeometryParameters::cylinder(3.0, 1.0, 1.0)).unwrap()
    }

    #[test]
    fn test_flux_direction_and_conservation() {
        let mesh = three_voxel_mesh();
        let diffusion = Diffusion::new(&mesh, vec![0.5]);
        let conc = [3.0, 0.0, 0.0];
        let mut dydt = [0.0; 3];
        diffusion.add_flux(&conc, &mut dydt);

        assert!(dydt[0] < 0.0);
        assert!(dydt[1] > 0.0);
        assert_eq!(dydt[2], 0.0);

        // D·A/d·ΔC / V with A = π, d = 1, V = π
        assert!((dydt[0] + 0.5 * 3.0).abs() < 1e-12);

        let volumes = mesh.volumes();
        let net: f64 = dydt.iter().zip(&volumes).map(|(d, v)| d * v).sum();
        assert!(net.abs() < 1e-12);
    }

    #[test]
    fn test_zero_diffusion_is_inert() {
        let mesh = three_voxel_mesh();
        let diffusion = Diffusion::new(&mesh, vec![0.0, 0.0]);
        assert!(diffusion.is_inert());
        let conc = [1.0, 0.0, 5.0, 0.0, 0.0, 2.0];
        let mut dydt = [0.0; 6];
        diffusion.add_flux(&conc, &mut dydt);
        assert!(dydt.iter().all(|d| *d == 0.0));
        assert_eq!(diffusion.stiffness_bound(1), 0.0);
    }

    #[test]
    fn test_only_diffusing_species_move() {
        let mesh = three_voxel_mesh();
        let diffusion = Diffusion::new(&mesh, vec![1.0, 0.0]);
        // voxel-major: [s0 v0, s1 v0, s0 v1, s1 v1, ...]
        let conc = [1.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        let mut dydt = [0.0; 6];
        diffusion.add_flux(&conc, &mut dydt);
        assert!(dydt[0] < 0.0 && dydt[2] > 0.0);
        assert_eq!(dydt[1], 0.0);
        assert_eq!(dydt[3], 0.0);
    }

    #[test]
    fn test_stiffness_bound_middle_voxel() {
        let mesh = three_voxel_mesh();
        let diffusion = Diffusion::new(&mesh, vec![0.25]);
        // Two junctions, each A/d/V = 1
        assert!((diffusion.stiffness_bound(1) - 2.0 * 0.25 * 2.0).abs() < 1e-12);
    }
}
