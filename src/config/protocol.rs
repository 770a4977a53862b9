//! Time-series protocols: per-step timestep, length increment, control mode,
//! and calcium level.
//!
//! The engine is format-agnostic; this module only provides the resolved
//! in-memory form plus the same JSON load-or-default convenience the other
//! parameter files use, and builders for common experimental maneuvers.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Control mode for one protocol step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ControlMode {
    /// Impose the step's length increment directly.
    Length,
    /// Solve for the length change that produces the target force.
    Force {
        /// Target force (kN/m²)
        target_kN_per_m2: f64,
    },
}

/// One step of an imposed protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolStep {
    /// Timestep (s)
    pub dt_sec: f64,
    /// Imposed length increment under length control (nm)
    pub delta_hsl_nm: f64,
    /// Length or force control
    pub control: ControlMode,
    /// Calcium level as pCa = −log₁₀[Ca²⁺]
    pub pca: f64,
}

/// A resolved protocol: the full step sequence for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Protocol {
    /// Steps executed in order
    pub steps: Vec<ProtocolStep>,
}

impl Protocol {
    /// Load from a JSON file or return a default isometric activation.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(protocol) => {
                    log::info!("Loaded protocol from {:?}", path.as_ref());
                    protocol
                }
                Err(e) => {
                    log::warn!("Failed to parse protocol: {}, using default activation", e);
                    Self::default_activation()
                }
            },
            Err(_) => {
                log::info!("Protocol file not found, using default activation");
                Self::default_activation()
            }
        }
    }

    /// Isometric hold at fixed length and calcium.
    pub fn length_hold(n_steps: usize, dt_sec: f64, pca: f64) -> Self {
        let steps = (0..n_steps)
            .map(|_| ProtocolStep {
                dt_sec,
                delta_hsl_nm: 0.0,
                control: ControlMode::Length,
                pca,
            })
            .collect();
        Self { steps }
    }

    /// Isometric hold at a constant target force.
    pub fn force_hold(n_steps: usize, dt_sec: f64, pca: f64, target_kN_per_m2: f64) -> Self {
        let steps = (0..n_steps)
            .map(|_| ProtocolStep {
                dt_sec,
                delta_hsl_nm: 0.0,
                control: ControlMode::Force { target_kN_per_m2 },
                pca,
            })
            .collect();
        Self { steps }
    }

    /// Default demo: relaxed hold (pCa 9), full activation (pCa 4.5), then a
    /// quick length step and recovery. 1 ms steps.
    pub fn default_activation() -> Self {
        let dt_sec = 1e-3;
        let mut steps = Vec::new();

        for _ in 0..50 {
            steps.push(ProtocolStep {
                dt_sec,
                delta_hsl_nm: 0.0,
                control: ControlMode::Length,
                pca: 9.0,
            });
        }
        for _ in 0..300 {
            steps.push(ProtocolStep {
                dt_sec,
                delta_hsl_nm: 0.0,
                control: ControlMode::Length,
                pca: 4.5,
            });
        }
        // 5 nm release over 5 ms
        for _ in 0..5 {
            steps.push(ProtocolStep {
                dt_sec,
                delta_hsl_nm: -1.0,
                control: ControlMode::Length,
                pca: 4.5,
            });
        }
        for _ in 0..150 {
            steps.push(ProtocolStep {
                dt_sec,
                delta_hsl_nm: 0.0,
                control: ControlMode::Length,
                pca: 4.5,
            });
        }

        Self { steps }
    }

    /// Total simulated duration (s).
    pub fn duration_sec(&self) -> f64 {
        self.steps.iter().map(|s| s.dt_sec).sum()
    }
}

/// Convert pCa to molar calcium concentration.
pub fn pca_to_molar(pca: f64) -> f64 {
    10f64.powf(-pca)
}
