//! Error types for half-sarcomere construction.
//!
//! Only construction-time structural problems are represented here. Per-step
//! numeric non-convergence is reported through returned iteration counts and
//! best-effort state, never as an error.

use thiserror::Error;

/// Errors that can occur while building a half-sarcomere or myofibril.
#[derive(Debug, Error)]
pub enum SarcomereError {
    /// Invalid lattice geometry (e.g., thick-filament count not a perfect square).
    #[error("Invalid lattice geometry: {0}")]
    LatticeGeometry(String),

    /// Cross-bridge dimer pairing violated (odd head count on a filament).
    #[error("Invalid dimer pairing: {0}")]
    DimerPairing(String),

    /// Malformed kinetic scheme (bad state index, empty scheme, bad isotype table).
    #[error("Invalid kinetic scheme: {0}")]
    InvalidScheme(String),

    /// Configuration error (non-positive stiffness, empty protocol, etc.).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SarcomereError {
    /// Create a lattice geometry error.
    pub fn lattice_geometry(msg: impl Into<String>) -> Self {
        Self::LatticeGeometry(msg.into())
    }

    /// Create a dimer pairing error.
    pub fn dimer_pairing(msg: impl Into<String>) -> Self {
        Self::DimerPairing(msg.into())
    }

    /// Create an invalid scheme error.
    pub fn invalid_scheme(msg: impl Into<String>) -> Self {
        Self::InvalidScheme(msg.into())
    }

    /// Create an invalid config error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Result type for half-sarcomere construction.
pub type Result<T> = std::result::Result<T, SarcomereError>;
