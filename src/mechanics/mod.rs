//! Lattice mechanics: backbone stiffness assembly, equilibrium solves, and
//! passive force laws.

pub mod equilibrium;
pub mod forces;
pub mod tridiagonal;

pub use equilibrium::EquilibriumSolver;
pub use tridiagonal::TridiagonalSolver;
