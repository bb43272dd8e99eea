//! Reaction network compilation and mass-action kinetics.
//!
//! Reactions are compiled once into index form plus a dense net
//! stoichiometry matrix (species × reactions). Rate evaluation works on one
//! voxel's concentration slice at a time.
//!
//! For a reaction Σ nₛ·S ⇌ Σ nₚ·P the net rate is
//!
//! v = Kf · Π [S]^nₛ − Kb · Π [P]^nₚ
//!
//! and each species changes by (nₚ − nₛ)·v.

use std::collections::HashMap;

use crate::config::{ReactionParameters, SpeciesParameters, StoichTerm};
use crate::error::{KsolveError, Result};

/// Pivot threshold, relative to the largest matrix entry, for rank computation
const RANK_TOLERANCE: f64 = 1e-9;

/// A reaction in index form
#[derive(Debug, Clone)]
pub struct CompiledReaction {
    /// Reaction name
    pub name: String,
    /// Substrates consumed (species index, stoichiometric coefficient)
    pub substrates: Vec<(usize, u32)>,
    /// Products produced (species index, stoichiometric coefficient)
    pub products: Vec<(usize, u32)>,
    /// Forward rate constant
    pub kf: f64,
    /// Backward rate constant
    pub kb: f64,
}

impl CompiledReaction {
    /// Net rate v = Kf·Π[S]^n − Kb·Π[P]^n for one voxel
    #[inline]
    pub fn rate(&self, conc: &[f64]) -> f64 {
        self.kf * mass_action_term(&self.substrates, conc)
            - self.kb * mass_action_term(&self.products, conc)
    }

    /// Apply the reaction to a derivatives vector given a reaction rate
    pub fn apply(&self, dydt: &mut [f64], rate: f64) {
        for &(idx, coeff) in &self.substrates {
            dydt[idx] -= coeff as f64 * rate;
        }
        for &(idx, coeff) in &self.products {
            dydt[idx] += coeff as f64 * rate;
        }
    }

    /// Largest kinetic order on either side
    pub fn max_order(&self) -> u32 {
        let order = |side: &[(usize, u32)]| side.iter().map(|&(_, n)| n).sum::<u32>();
        order(&self.substrates).max(order(&self.products))
    }
}

/// Π C^n over one side of a reaction
#[inline]
pub fn mass_action_term(terms: &[(usize, u32)], conc: &[f64]) -> f64 {
    terms
        .iter()
        .map(|&(idx, n)| conc[idx].max(0.0).powi(n as i32))
        .product()
}

/// ∂(Π C^n)/∂C_j for one side of a reaction
fn mass_action_partial(terms: &[(usize, u32)], conc: &[f64], j: usize) -> f64 {
    let mut partial = 0.0;
    for (pos, &(idx, n)) in terms.iter().enumerate() {
        if idx != j {
            continue;
        }
        let c = conc[idx].max(0.0);
        let mut value = n as f64 * c.powi(n as i32 - 1);
        for (other_pos, &(other, m)) in terms.iter().enumerate() {
            if other_pos != pos {
                value *= conc[other].max(0.0).powi(m as i32);
            }
        }
        partial += value;
    }
    partial
}

/// Compiled reaction network
#[derive(Debug, Clone)]
pub struct Stoichiometry {
    species_names: Vec<String>,
    species_index: HashMap<String, usize>,
    reactions: Vec<CompiledReaction>,
    /// Net coefficients, row-major: `net[species * n_reactions + reaction]`
    net: Vec<f64>,
    kf: Vec<f64>,
    kb: Vec<f64>,
}

impl Stoichiometry {
    /// Compile a reaction list against a species universe
    ///
    /// Fails on duplicate species names, references to unknown species,
    /// negative or non-finite rate constants, zero coefficients and empty
    /// reactions. Repeated mentions of a species on one side are merged.
    pub fn compile(species: &[SpeciesParameters], reactions: &[ReactionParameters]) -> Result<Self> {
        let mut species_index = HashMap::with_capacity(species.len());
        let mut species_names = Vec::with_capacity(species.len());
        for (i, s) in species.iter().enumerate() {
            if species_index.insert(s.name.clone(), i).is_some() {
                return Err(KsolveError::DuplicateSpecies(s.name.clone()));
            }
            species_names.push(s.name.clone());
        }

        let n_species = species.len();
        let n_reactions = reactions.len();
        let mut compiled = Vec::with_capacity(n_reactions);
        let mut net = vec![0.0; n_species * n_reactions];

        for (r, reac) in reactions.iter().enumerate() {
            for (label, k) in [("kf", reac.kf), ("kb", reac.kb)] {
                if !k.is_finite() || k < 0.0 {
                    return Err(KsolveError::InvalidRate {
                        reaction: reac.name.clone(),
                        message: format!("{} must be finite and >= 0, got {}", label, k),
                    });
                }
            }
            if reac.substrates.is_empty() && reac.products.is_empty() {
                return Err(KsolveError::InvalidStoichiometry {
                    reaction: reac.name.clone(),
                    message: "no substrates or products".to_string(),
                });
            }

            let substrates = resolve_side(&reac.name, &reac.substrates, &species_index)?;
            let products = resolve_side(&reac.name, &reac.products, &species_index)?;

            for &(idx, n) in &substrates {
                net[idx * n_reactions + r] -= n as f64;
            }
            for &(idx, n) in &products {
                net[idx * n_reactions + r] += n as f64;
            }

            compiled.push(CompiledReaction {
                name: reac.name.clone(),
                substrates,
                products,
                kf: reac.kf,
                kb: reac.kb,
            });
        }

        let kf = compiled.iter().map(|r| r.kf).collect();
        let kb = compiled.iter().map(|r| r.kb).collect();

        Ok(Self {
            species_names,
            species_index,
            reactions: compiled,
            net,
            kf,
            kb,
        })
    }

    /// Number of species
    pub fn n_species(&self) -> usize {
        self.species_names.len()
    }

    /// Number of reactions
    pub fn n_reactions(&self) -> usize {
        self.reactions.len()
    }

    /// Species index by name
    pub fn species_index(&self, name: &str) -> Option<usize> {
        self.species_index.get(name).copied()
    }

    /// Species names in index order
    pub fn species_names(&self) -> &[String] {
        &self.species_names
    }

    /// Compiled reactions in declaration order
    pub fn reactions(&self) -> &[CompiledReaction] {
        &self.reactions
    }

    /// Net stoichiometric coefficient of `species` in `reaction`
    pub fn entry(&self, species: usize, reaction: usize) -> f64 {
        self.net[species * self.n_reactions() + reaction]
    }

    /// Forward rate constants per reaction
    pub fn kf(&self) -> &[f64] {
        &self.kf
    }

    /// Backward rate constants per reaction
    pub fn kb(&self) -> &[f64] {
        &self.kb
    }

    /// Per-reaction net rates for one voxel
    pub fn reaction_rates(&self, conc: &[f64], rates: &mut [f64]) {
        for (rate, reac) in rates.iter_mut().zip(&self.reactions) {
            *rate = reac.rate(conc);
        }
    }

    /// Add the reaction contribution to dC/dt for one voxel
    ///
    /// Reactions are summed in declaration order so the result is
    /// reproducible bit for bit.
    pub fn add_rates_of_change(&self, conc: &[f64], dydt: &mut [f64]) {
        for reac in &self.reactions {
            let rate = reac.rate(conc);
            if rate != 0.0 {
                reac.apply(dydt, rate);
            }
        }
    }

    /// Net dC/dt per species for one voxel
    pub fn rates_of_change(&self, conc: &[f64]) -> Vec<f64> {
        let mut dydt = vec![0.0; self.n_species()];
        self.add_rates_of_change(conc, &mut dydt);
        dydt
    }

    /// Gershgorin bound on the spectral radius of the reaction Jacobian
    ///
    /// Returns max over species i of Σⱼ |∂(dCᵢ/dt)/∂Cⱼ| at `conc`.
    /// `scratch` is resized to hold the n × n Jacobian.
    pub fn reaction_jacobian_bound(&self, conc: &[f64], scratch: &mut Vec<f64>) -> f64 {
        let n = self.n_species();
        if n == 0 || self.reactions.is_empty() {
            return 0.0;
        }
        scratch.clear();
        scratch.resize(n * n, 0.0);

        let mut touched: Vec<usize> = Vec::new();
        for (r, reac) in self.reactions.iter().enumerate() {
            touched.clear();
            touched.extend(reac.substrates.iter().chain(&reac.products).map(|&(j, _)| j));
            touched.sort_unstable();
            touched.dedup();
            for &j in &touched {
                let dv = reac.kf * mass_action_partial(&reac.substrates, conc, j)
                    - reac.kb * mass_action_partial(&reac.products, conc, j);
                if dv == 0.0 {
                    continue;
                }
                for i in 0..n {
                    let nu = self.entry(i, r);
                    if nu != 0.0 {
                        scratch[i * n + j] += nu * dv;
                    }
                }
            }
        }

        scratch
            .chunks(n)
            .map(|row| row.iter().map(|v| v.abs()).sum::<f64>())
            .fold(0.0, f64::max)
    }

    /// Numerical rank of the net stoichiometry matrix
    pub fn rank(&self) -> usize {
        let rows = self.n_species();
        let cols = self.n_reactions();
        if rows == 0 || cols == 0 {
            return 0;
        }
        let mut m = self.net.clone();
        let scale = m.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        if scale == 0.0 {
            return 0;
        }
        let tol = scale * RANK_TOLERANCE;

        let mut rank = 0;
        for col in 0..cols {
            if rank == rows {
                break;
            }
            // Partial pivot
            let (pivot_row, pivot_val) = (rank..rows)
                .map(|row| (row, m[row * cols + col].abs()))
                .fold((rank, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });
            if pivot_val <= tol {
                continue;
            }
            if pivot_row != rank {
                for c in 0..cols {
                    m.swap(rank * cols + c, pivot_row * cols + c);
                }
            }
            let pivot = m[rank * cols + col];
            for row in (rank + 1)..rows {
                let factor = m[row * cols + col] / pivot;
                if factor != 0.0 {
                    for c in col..cols {
                        m[row * cols + c] -= factor * m[rank * cols + c];
                    }
                }
            }
            rank += 1;
        }
        rank
    }

    /// Number of independent conservation laws (species − rank)
    pub fn num_conservation_laws(&self) -> usize {
        self.n_species() - self.rank()
    }
}

fn resolve_side(
    reaction: &str,
    terms: &[StoichTerm],
    species_index: &HashMap<String, usize>,
) -> Result<Vec<(usize, u32)>> {
    let mut resolved: Vec<(usize, u32)> = Vec::with_capacity(terms.len());
    for term in terms {
        if term.coefficient == 0 {
            return Err(KsolveError::InvalidStoichiometry {
                reaction: reaction.to_string(),
                message: format!("zero coefficient for '{}'", term.species),
            });
        }
        let idx = species_index
            .get(&term.species)
            .copied()
            .ok_or_else(|| {
                KsolveError::unknown_species(format!("reaction '{}'", reaction), &term.species)
            })?;
        match resolved.iter_mut().find(|(i, _)| *i == idx) {
            Some((_, n)) => *n += term.coefficient,
            None => resolved.push((idx, term.coefficient)),
        }
    }
    Ok(resolved)
}
