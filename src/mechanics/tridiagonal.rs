//! Tridiagonal linear solves (Thomas algorithm).
//!
//! Filament chains produce symmetric positive-definite tridiagonal systems,
//! so the forward sweep never pivots. The solver owns its scratch buffers;
//! a single instance is reused across every filament and iteration of the
//! equilibrium solve.

/// Reusable Thomas-algorithm solver.
#[derive(Debug, Clone)]
pub struct TridiagonalSolver {
    c_prime: Vec<f64>,
    d_prime: Vec<f64>,
}

impl TridiagonalSolver {
    pub fn new(capacity: usize) -> Self {
        Self {
            c_prime: vec![0.0; capacity],
            d_prime: vec![0.0; capacity],
        }
    }

    /// Solve `A x = rhs` for a tridiagonal `A`.
    ///
    /// `lower[i]` multiplies `x[i-1]` (entry 0 unused), `diag[i]` multiplies
    /// `x[i]`, `upper[i]` multiplies `x[i+1]` (last entry unused). All slices
    /// and `x` share one length.
    pub fn solve(&mut self, lower: &[f64], diag: &[f64], upper: &[f64], rhs: &[f64], x: &mut [f64]) {
        let n = diag.len();
        debug_assert!(lower.len() == n && upper.len() == n && rhs.len() == n && x.len() == n);
        if n == 0 {
            return;
        }
        if self.c_prime.len() < n {
            self.c_prime.resize(n, 0.0);
            self.d_prime.resize(n, 0.0);
        }

        self.c_prime[0] = upper[0] / diag[0];
        self.d_prime[0] = rhs[0] / diag[0];
        for i in 1..n {
            let denom = diag[i] - lower[i] * self.c_prime[i - 1];
            self.c_prime[i] = upper[i] / denom;
            self.d_prime[i] = (rhs[i] - lower[i] * self.d_prime[i - 1]) / denom;
        }

        x[n - 1] = self.d_prime[n - 1];
        for i in (0..n - 1).rev() {
            x[i] = self.d_prime[i] - self.c_prime[i] * x[i + 1];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity() {
        let mut solver = TridiagonalSolver::new(4);
        let mut x = [0.0; 3];
        solver.solve(
            &[0.0, 0.0, 0.0],
            &[1.0, 1.0, 1.0],
            &[0.0, 0.0, 0.0],
            &[3.0, -1.0, 7.0],
            &mut x,
        );
        assert_relative_eq!(x[0], 3.0);
        assert_relative_eq!(x[1], -1.0);
        assert_relative_eq!(x[2], 7.0);
    }

    #[test]
    fn test_chain_stiffness_system() {
        // 3-node chain anchored at zero: K = [[2k,-k,0],[-k,2k,-k],[0,-k,k]],
        // rhs = [0, 0, k*s] has the rest solution x = [s, 2s, 3s].
        let k = 2000.0;
        let s = 12.0;
        let mut solver = TridiagonalSolver::new(3);
        let mut x = [0.0; 3];
        solver.solve(
            &[0.0, -k, -k],
            &[2.0 * k, 2.0 * k, k],
            &[-k, -k, 0.0],
            &[0.0, 0.0, k * s],
            &mut x,
        );
        assert_relative_eq!(x[0], s, max_relative = 1e-12);
        assert_relative_eq!(x[1], 2.0 * s, max_relative = 1e-12);
        assert_relative_eq!(x[2], 3.0 * s, max_relative = 1e-12);
    }

    #[test]
    fn test_matches_dense_product() {
        let lower = [0.0, -1.5, -2.0, -0.5];
        let diag = [4.0, 5.0, 6.0, 3.0];
        let upper = [-1.0, -2.5, -1.0, 0.0];
        let expected = [1.0, -2.0, 3.0, 0.5];

        // rhs = A * expected
        let mut rhs = [0.0; 4];
        for i in 0..4 {
            rhs[i] = diag[i] * expected[i];
            if i > 0 {
                rhs[i] += lower[i] * expected[i - 1];
            }
            if i < 3 {
                rhs[i] += upper[i] * expected[i + 1];
            }
        }

        let mut solver = TridiagonalSolver::new(4);
        let mut x = [0.0; 4];
        solver.solve(&lower, &diag, &upper, &rhs, &mut x);
        for i in 0..4 {
            assert_relative_eq!(x[i], expected[i], max_relative = 1e-10);
        }
    }
}
