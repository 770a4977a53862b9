//! Spatially explicit half-sarcomere mechanochemistry.
//!
//! Simulates a striated-muscle half-sarcomere as a hexagonal lattice of
//! thick and thin filaments whose nodes are coupled by springs, with
//! cross-bridges, MyBP-C molecules, and regulatory units switching between
//! discrete kinetic states that rewire the mechanical network. Given an
//! imposed length- or force-control protocol the engine predicts force and
//! state occupancies over time.
//!
//! Structure:
//! - `config`: model parameters, solver options, protocols (JSON in/out)
//! - `kinetics`: rate laws, kinetic schemes, stochastic event engine
//! - `geometry`: filament lattice and per-filament structural state
//! - `mechanics`: tridiagonal equilibrium solves and passive force laws
//! - `sarcomere`: half-sarcomere orchestration and force control
//! - `myofibril`: half-sarcomeres in series with a series elastic element

pub mod config;
pub mod error;
pub mod geometry;
pub mod kinetics;
pub mod mechanics;
pub mod myofibril;
pub mod sarcomere;

pub use error::{Result, SarcomereError};
pub use myofibril::{Myofibril, SeriesElastic};
pub use sarcomere::{HalfSarcomere, HalfSarcomereMetrics};
