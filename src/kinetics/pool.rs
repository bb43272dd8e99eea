//! Per-voxel species concentrations.

/// Avogadro's number (1/mol)
pub const AVOGADRO: f64 = 6.022_140_76e23;

/// Concentration pool for every (species, voxel) pair
///
/// Stored voxel-major as one contiguous vector so a voxel's species are
/// adjacent for reaction evaluation and the whole state can be handed to
/// the integrator as a single slice.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolState {
    /// Concentrations in mM, index `voxel * n_species + species`
    concentrations_mM: Vec<f64>,
    n_species: usize,
    n_voxels: usize,
}

impl PoolState {
    /// Create a zeroed pool
    pub fn new(n_species: usize, n_voxels: usize) -> Self {
        Self {
            concentrations_mM: vec![0.0; n_species * n_voxels],
            n_species,
            n_voxels,
        }
    }

    /// Create a pool with the same initial concentration for a species in every voxel
    pub fn uniform(conc_init_mM: &[f64], n_voxels: usize) -> Self {
        let n_species = conc_init_mM.len();
        let mut pool = Self::new(n_species, n_voxels);
        for voxel in 0..n_voxels {
            pool.voxel_mut(voxel).copy_from_slice(conc_init_mM);
        }
        pool
    }

    #[inline]
    fn index(&self, species: usize, voxel: usize) -> usize {
        voxel * self.n_species + species
    }

    /// Concentration of a species in a voxel (0 when out of range)
    #[inline]
    pub fn get(&self, species: usize, voxel: usize) -> f64 {
        if species >= self.n_species || voxel >= self.n_voxels {
            return 0.0;
        }
        self.concentrations_mM[self.index(species, voxel)]
    }

    /// Set a concentration; negative values are stored as zero
    #[inline]
    pub fn set(&mut self, species: usize, voxel: usize, value_mM: f64) {
        if species < self.n_species && voxel < self.n_voxels {
            let idx = self.index(species, voxel);
            self.concentrations_mM[idx] = value_mM.max(0.0);
        }
    }

    /// All species in one voxel
    pub fn voxel(&self, voxel: usize) -> &[f64] {
        let start = voxel * self.n_species;
        &self.concentrations_mM[start..start + self.n_species]
    }

    fn voxel_mut(&mut self, voxel: usize) -> &mut [f64] {
        let start = voxel * self.n_species;
        &mut self.concentrations_mM[start..start + self.n_species]
    }

    /// Amount of a species summed over voxels (mmol), given voxel volumes in m³
    ///
    /// mM × m³ = mmol.
    pub fn total_amount(&self, species: usize, volumes_m3: &[f64]) -> f64 {
        volumes_m3
            .iter()
            .enumerate()
            .map(|(voxel, v)| self.get(species, voxel) * v)
            .sum()
    }

    /// Number of molecules of a species in a voxel of the given volume
    pub fn molecule_count(&self, species: usize, voxel: usize, volume_m3: f64) -> f64 {
        // mM = mol/m³
        self.get(species, voxel) * volume_m3 * AVOGADRO
    }

    /// Get mutable reference to concentrations for integration
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.concentrations_mM
    }

    /// Get reference to concentrations
    pub fn as_slice(&self) -> &[f64] {
        &self.concentrations_mM
    }

    /// Number of species per voxel
    pub fn n_species(&self) -> usize {
        self.n_species
    }

    /// Number of voxels
    pub fn n_voxels(&self) -> usize {
        self.n_voxels
    }

    /// Total number of state variables
    pub fn len(&self) -> usize {
        self.concentrations_mM.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.concentrations_mM.is_empty()
    }

    /// True when every concentration is finite and non-negative
    pub fn is_valid(&self) -> bool {
        self.concentrations_mM.iter().all(|c| c.is_finite() && *c >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_layout() {
        let pool = PoolState::uniform(&[1.0, 0.1, 2.0], 4);
        assert_eq!(pool.len(), 12);
        assert_eq!(pool.n_species(), 3);
        assert_eq!(pool.n_voxels(), 4);
        for voxel in 0..4 {
            assert_eq!(pool.voxel(voxel), &[1.0, 0.1, 2.0]);
        }
        assert_eq!(pool.as_slice()[4], 0.1);
    }

    #[test]
    fn test_set_clamps_negative() {
        let mut pool = PoolState::new(2, 2);
        pool.set(1, 1, -5.0);
        assert_eq!(pool.get(1, 1), 0.0);
        pool.set(1, 1, 3.0);
        assert_eq!(pool.get(1, 1), 3.0);
        // Out of range is ignored
        pool.set(5, 0, 1.0);
        assert_eq!(pool.get(5, 0), 0.0);
        assert!(pool.is_valid());
    }

    #[test]
    fn test_amounts() {
        let mut pool = PoolState::new(1, 2);
        pool.set(0, 0, 1.0);
        pool.set(0, 1, 3.0);
        let volumes = [2.0, 0.5];
        assert!((pool.total_amount(0, &volumes) - 3.5).abs() < 1e-12);

        // 1 mM in 1 fL (1e-18 m³) ≈ 602 molecules
        let n = PoolState::uniform(&[1.0], 1).molecule_count(0, 0, 1e-18);
        assert!((n - 602.214076).abs() < 1e-6);
    }
}
