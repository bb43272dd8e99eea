//! ODE integration for reaction-diffusion systems.
//!
//! Implements classical 4th-order Runge-Kutta (RK4): local truncation error
//! O(dt⁵), global error O(dt⁴). The method is explicit, so the step must
//! respect a stability bound; on the negative real axis RK4 is stable for
//! |λ·dt| ≤ 2.785.
//!
//! Concentrations that come out of a step below zero are clamped to zero
//! and counted rather than treated as fatal.
//!
//! Reference: Press et al., Numerical Recipes, 3rd ed., Cambridge University Press 2007

/// Stability limit of RK4 on the negative real axis, rounded down
pub const RK4_STABILITY_LIMIT: f64 = 2.78;

/// Largest stable step for a system whose Jacobian spectral radius is
/// bounded by `lambda` (1/s). Unbounded when `lambda` is zero; zero when
/// `lambda` is NaN or infinite.
#[inline]
pub fn safe_step(lambda: f64) -> f64 {
    if lambda.is_nan() {
        0.0
    } else if lambda > 0.0 {
        RK4_STABILITY_LIMIT / lambda
    } else {
        f64::INFINITY
    }
}

/// 4th-order Runge-Kutta integrator for ODE systems
///
/// Solves dy/dt = f(y) where y is the flat vector of concentrations.
#[derive(Debug, Clone)]
pub struct RK4Integrator {
    /// Number of steps taken
    pub step_count: u64,
    /// Number of values clamped to zero
    pub clamp_count: u64,
    /// Scratch vectors for intermediate calculations
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    y_temp: Vec<f64>,
}

impl RK4Integrator {
    /// Create a new RK4 integrator for a system with n variables
    pub fn new(n_variables: usize) -> Self {
        Self {
            step_count: 0,
            clamp_count: 0,
            k1: vec![0.0; n_variables],
            k2: vec![0.0; n_variables],
            k3: vec![0.0; n_variables],
            k4: vec![0.0; n_variables],
            y_temp: vec![0.0; n_variables],
        }
    }

    /// Resize internal buffers if system size changes
    pub fn resize(&mut self, n_variables: usize) {
        if self.k1.len() != n_variables {
            self.k1.resize(n_variables, 0.0);
            self.k2.resize(n_variables, 0.0);
            self.k3.resize(n_variables, 0.0);
            self.k4.resize(n_variables, 0.0);
            self.y_temp.resize(n_variables, 0.0);
        }
    }

    /// Perform one RK4 integration step of length `dt`
    ///
    /// # Arguments
    /// * `y` - Current state vector (concentrations in mM), modified in place
    /// * `dt` - Step length (s)
    /// * `derivatives` - Computes dy/dt into a zeroed output buffer
    ///
    /// # Returns
    /// Number of values clamped to zero in this step.
    ///
    /// # RK4 Algorithm
    /// k1 = f(y)
    /// k2 = f(y + dt/2 * k1)
    /// k3 = f(y + dt/2 * k2)
    /// k4 = f(y + dt * k3)
    /// y_new = y + dt/6 * (k1 + 2*k2 + 2*k3 + k4)
    pub fn step<F>(&mut self, y: &mut [f64], dt: f64, derivatives: F) -> u64
    where
        F: Fn(&[f64], &mut [f64]),
    {
        let n = y.len();
        self.resize(n);

        // k1 = f(y)
        self.k1.fill(0.0);
        derivatives(y, &mut self.k1);

        // k2 = f(y + dt/2 * k1)
        for i in 0..n {
            self.y_temp[i] = y[i] + 0.5 * dt * self.k1[i];
        }
        self.k2.fill(0.0);
        derivatives(&self.y_temp, &mut self.k2);

        // k3 = f(y + dt/2 * k2)
        for i in 0..n {
            self.y_temp[i] = y[i] + 0.5 * dt * self.k2[i];
        }
        self.k3.fill(0.0);
        derivatives(&self.y_temp, &mut self.k3);

        // k4 = f(y + dt * k3)
        for i in 0..n {
            self.y_temp[i] = y[i] + dt * self.k3[i];
        }
        self.k4.fill(0.0);
        derivatives(&self.y_temp, &mut self.k4);

        // Update: y_new = y + dt/6 * (k1 + 2*k2 + 2*k3 + k4)
        let dt_6 = dt / 6.0;
        let mut clamped = 0;
        for i in 0..n {
            y[i] += dt_6 * (self.k1[i] + 2.0 * self.k2[i] + 2.0 * self.k3[i] + self.k4[i]);

            // Ensure non-negative concentrations
            if y[i].is_nan() || y[i] < 0.0 {
                y[i] = 0.0;
                clamped += 1;
            }
        }

        self.step_count += 1;
        self.clamp_count += clamped;
        clamped
    }

    /// Reset integrator counters
    pub fn reset(&mut self) {
        self.step_count = 0;
        self.clamp_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rk4_exponential_decay() {
        // Test: dy/dt = -y with y(0) = 1
        // Analytical solution: y(t) = exp(-t)
        let mut integrator = RK4Integrator::new(1);

        let mut y = vec![1.0];
        let derivatives = |state: &[f64], dydt: &mut [f64]| {
            dydt[0] = -state[0];
        };

        for _ in 0..100 {
            integrator.step(&mut y, 0.01, derivatives);
        }

        let expected = (-1.0_f64).exp();
        let error = (y[0] - expected).abs();
        assert!(error < 1e-8, "RK4 error too large: {} vs expected {}", y[0], expected);
        assert_eq!(integrator.clamp_count, 0);
    }

    #[test]
    fn test_rk4_reversible_pair() {
        // A ⇌ C, kf = 1, kb = 0.1: A + C conserved, A/C → 0.1
        let mut integrator = RK4Integrator::new(2);
        let mut y = vec![1.0, 0.1];
        let derivatives = |state: &[f64], dydt: &mut [f64]| {
            let v = state[0] - 0.1 * state[1];
            dydt[0] -= v;
            dydt[1] += v;
        };

        for _ in 0..2000 {
            integrator.step(&mut y, 0.01, derivatives);
        }

        assert!((y[0] + y[1] - 1.1).abs() < 1e-10);
        assert!((y[0] / y[1] - 0.1).abs() < 1e-6, "ratio {}", y[0] / y[1]);
    }

    #[test]
    fn test_non_negative_concentrations() {
        let mut integrator = RK4Integrator::new(1);

        let mut y = vec![0.001]; // Small initial concentration
        let derivatives = |_: &[f64], dydt: &mut [f64]| {
            dydt[0] = -1000.0; // Large negative derivative
        };

        let clamped = integrator.step(&mut y, 0.001, derivatives);

        // Should be clamped to zero, not negative
        assert_eq!(y[0], 0.0);
        assert_eq!(clamped, 1);
        assert_eq!(integrator.clamp_count, 1);
    }

    #[test]
    fn test_step_count() {
        let mut integrator = RK4Integrator::new(1);
        let mut y = vec![1.0];
        let derivatives = |_: &[f64], dydt: &mut [f64]| {
            dydt[0] = 0.0;
        };

        assert_eq!(integrator.step_count, 0);
        integrator.step(&mut y, 0.1, derivatives);
        assert_eq!(integrator.step_count, 1);
        integrator.step(&mut y, 0.1, derivatives);
        assert_eq!(integrator.step_count, 2);
        assert_eq!(y[0], 1.0);

        integrator.reset();
        assert_eq!(integrator.step_count, 0);
    }

    #[test]
    fn test_safe_step() {
        assert!(safe_step(0.0).is_infinite());
        assert!((safe_step(1.1) - 2.78 / 1.1).abs() < 1e-12);
        assert_eq!(safe_step(f64::INFINITY), 0.0);
        assert_eq!(safe_step(f64::NAN), 0.0);
    }
}
