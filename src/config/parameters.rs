//! Model parameter structures with citation metadata.
//!
//! All structural and mechanical parameters carry their units in the field
//! name and literature sources in the doc comment, and load from JSON with a
//! logged fallback to defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::kinetics::scheme::KineticScheme;

/// Top-level model description consumed by half-sarcomere construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParameters {
    /// Filament lattice layout
    pub lattice: LatticeParameters,
    /// Thick filament structure
    pub thick: ThickParameters,
    /// Thin filament structure and regulation
    pub thin: ThinParameters,
    /// Titin spring law
    pub titin: TitinParameters,
    /// Extracellular parallel element
    pub extracellular: ExtracellularParameters,
    /// Force normalization and viscous drag
    pub force_scaling: ForceScalingParameters,
    /// Myosin isotypes (proportion + kinetic scheme each)
    pub myosin_isotypes: Vec<IsotypeDefinition>,
    /// MyBP-C isotypes (proportion + kinetic scheme each)
    pub accessory_isotypes: Vec<IsotypeDefinition>,
    /// MyBP-C placement on the thick filament
    pub accessory: AccessoryParameters,
    /// Optional per-half-sarcomere rate multipliers.
    /// Entry `i` scales every kinetic rate of half-sarcomere `i` through a
    /// derived scheme copy; missing entries default to 1.0.
    #[serde(default)]
    pub rate_variation: Vec<f64>,
}

impl ModelParameters {
    /// Load from a JSON file or return defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(mut params) => {
                    log::info!("Loaded model parameters from {:?}", path.as_ref());
                    // Transition classes are skipped in the file format
                    for iso in params
                        .myosin_isotypes
                        .iter_mut()
                        .chain(params.accessory_isotypes.iter_mut())
                    {
                        if let Err(e) = iso.scheme.finalize() {
                            log::warn!("Invalid scheme in model file: {}, using defaults", e);
                            return Self::default();
                        }
                    }
                    params
                }
                Err(e) => {
                    log::warn!("Failed to parse model parameters: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("Model parameters file not found, using defaults");
                Self::default()
            }
        }
    }

    /// Rate multiplier for half-sarcomere `hs_index` (1.0 when unspecified).
    pub fn rate_scale_for(&self, hs_index: usize) -> f64 {
        self.rate_variation.get(hs_index).copied().unwrap_or(1.0)
    }
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            lattice: LatticeParameters::default(),
            thick: ThickParameters::default(),
            thin: ThinParameters::default(),
            titin: TitinParameters::default(),
            extracellular: ExtracellularParameters::default(),
            force_scaling: ForceScalingParameters::default(),
            myosin_isotypes: vec![IsotypeDefinition {
                proportion: 1.0,
                scheme: KineticScheme::default_myosin(),
            }],
            accessory_isotypes: vec![IsotypeDefinition {
                proportion: 1.0,
                scheme: KineticScheme::default_accessory(),
            }],
            accessory: AccessoryParameters::default(),
            rate_variation: Vec::new(),
        }
    }
}

/// One isotype: its proportion of the population and its kinetic scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsotypeDefinition {
    /// Fraction of molecules carrying this isotype (proportions are
    /// normalized over the table at construction)
    pub proportion: f64,
    /// Kinetic scheme governing molecules of this isotype
    pub scheme: KineticScheme,
}

/// Filament lattice layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatticeParameters {
    /// Number of thick filaments; must be a perfect square
    pub thick_filament_count: usize,
    /// Center-to-center thick filament spacing (nm)
    /// Reference: ~37 nm lattice spacing in vertebrate muscle
    /// Source: Millman, Physiol Rev 1998
    pub thick_spacing_nm: f64,
    /// Initial half-sarcomere length (nm)
    pub initial_hs_length_nm: f64,
}

impl Default for LatticeParameters {
    fn default() -> Self {
        Self {
            thick_filament_count: 4,
            // Millman 1998
            thick_spacing_nm: 37.0,
            initial_hs_length_nm: 1100.0,
        }
    }
}

/// Thick filament structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThickParameters {
    /// Myosin crowns per filament
    /// Reference: 49-54 crowns per half thick filament
    /// Source: Luther et al., J Mol Biol 2008
    pub crowns_per_filament: usize,
    /// Cross-bridges per crown (paired into dimers)
    pub cbs_per_crown: usize,
    /// Inter-crown spacing (nm)
    /// Reference: 14.3 nm axial repeat (13.5 in compact lattice models)
    /// Source: Huxley & Brown, J Mol Biol 1967
    pub crown_spacing_nm: f64,
    /// Bare-zone length between M-line and first crown (nm)
    pub bare_zone_nm: f64,
    /// Backbone spring stiffness between crowns (pN/nm)
    /// Source: thick filament compliance, Kojima et al., PNAS 1994
    pub backbone_stiffness_pN_per_nm: f64,
    /// Helical twist between successive crowns (degrees)
    pub crown_twist_deg: f64,
    /// Cross-bridge spring stiffness (pN/nm)
    /// Reference: ~2 pN/nm per head
    /// Source: Kaya & Higuchi, Science 2010
    pub cb_stiffness_pN_per_nm: f64,
}

impl Default for ThickParameters {
    fn default() -> Self {
        Self {
            // Luther et al. 2008
            crowns_per_filament: 54,
            cbs_per_crown: 6,
            // Huxley & Brown 1967
            crown_spacing_nm: 13.5,
            bare_zone_nm: 80.0,
            // Kojima et al. 1994
            backbone_stiffness_pN_per_nm: 2000.0,
            crown_twist_deg: 40.0,
            // Kaya & Higuchi 2010
            cb_stiffness_pN_per_nm: 2.0,
        }
    }
}

/// Thin filament structure and regulatory-unit kinetics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinParameters {
    /// Axial nodes per filament (one regulatory unit per node)
    pub nodes_per_filament: usize,
    /// Strands per filament (one binding site per strand per node)
    pub strands_per_filament: usize,
    /// Inter-node spacing (nm)
    pub node_spacing_nm: f64,
    /// Backbone spring stiffness between nodes (pN/nm)
    /// Source: actin filament compliance, Kojima et al., PNAS 1994
    pub backbone_stiffness_pN_per_nm: f64,
    /// Helical twist between successive nodes (degrees)
    pub node_twist_deg: f64,
    /// Base unit activation rate per molar calcium (M⁻¹·s⁻¹)
    /// Source: thin-filament Ca²⁺ regulation, McKillop & Geeves, Biophys J 1993
    pub unit_on_rate_per_M_per_sec: f64,
    /// Base unit deactivation rate (s⁻¹)
    pub unit_off_rate_per_sec: f64,
    /// Cooperativity coefficient applied to active-neighbor counts
    pub cooperativity: f64,
}

impl Default for ThinParameters {
    fn default() -> Self {
        Self {
            nodes_per_filament: 90,
            strands_per_filament: 2,
            node_spacing_nm: 12.0,
            // Kojima et al. 1994
            backbone_stiffness_pN_per_nm: 2000.0,
            node_twist_deg: 120.0,
            // McKillop & Geeves 1993 (order of magnitude)
            unit_on_rate_per_M_per_sec: 5.0e7,
            unit_off_rate_per_sec: 100.0,
            cooperativity: 5.0,
        }
    }
}

/// Titin spring law: linear up to a limit, optional exponential tail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitinParameters {
    /// Thick-filament node index titin attaches to (counted from the M-line)
    pub thick_attach_node: usize,
    /// Thin-filament node index titin attaches to (counted from the Z-disc)
    pub thin_attach_node: usize,
    /// Linear stiffness (pN/nm)
    /// Source: single-titin stiffness, Linke et al., Biophys J 1998
    pub stiffness_pN_per_nm: f64,
    /// Extension offset subtracted before the spring law (nm)
    pub offset_nm: f64,
    /// Extension beyond which the exponential tail engages (nm);
    /// very large values keep the law purely linear
    pub linear_limit_nm: f64,
    /// Exponential tail amplitude (pN)
    pub exp_amplitude_pN: f64,
    /// Exponential tail length scale (nm)
    pub exp_length_nm: f64,
}

impl Default for TitinParameters {
    fn default() -> Self {
        Self {
            thick_attach_node: 53,
            thin_attach_node: 60,
            // Linke et al. 1998
            stiffness_pN_per_nm: 0.0025,
            offset_nm: 0.0,
            linear_limit_nm: 1.0e6,
            exp_amplitude_pN: 0.1,
            exp_length_nm: 75.0,
        }
    }
}

/// Extracellular parallel element (collagen / fibrosis).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtracellularParameters {
    /// Slack half-sarcomere length below which the element bears no load (nm)
    pub slack_length_nm: f64,
    /// Linear stiffness (kN·m⁻²·nm⁻¹)
    pub stiffness_kN_per_m2_per_nm: f64,
    /// Use an exponential force-extension law instead of linear
    pub exponential: bool,
    /// Exponential amplitude (kN/m²)
    pub exp_amplitude_kN_per_m2: f64,
    /// Exponential length scale (nm)
    pub exp_length_nm: f64,
}

impl Default for ExtracellularParameters {
    fn default() -> Self {
        Self {
            slack_length_nm: 1000.0,
            stiffness_kN_per_m2_per_nm: 0.005,
            exponential: false,
            exp_amplitude_kN_per_m2: 0.05,
            exp_length_nm: 75.0,
        }
    }
}

/// Force normalization and viscous drag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceScalingParameters {
    /// Thick filaments per square meter of cross-section
    /// Reference: 0.407e15 m⁻² in skinned fibers
    /// Source: Linari et al., Biophys J 1998
    pub filament_density_per_m2: f64,
    /// Fraction of cross-section occupied by fibrosis (bears extracellular
    /// load only)
    pub prop_fibrosis: f64,
    /// Fraction of the non-fibrotic cross-section that is myofilament
    pub prop_myofilaments: f64,
    /// Viscous drag coefficient (kN·m⁻²·s·nm⁻¹)
    pub viscosity_kN_s_per_m2_per_nm: f64,
}

impl Default for ForceScalingParameters {
    fn default() -> Self {
        Self {
            // Linari et al. 1998
            filament_density_per_m2: 0.407e15,
            prop_fibrosis: 0.0,
            prop_myofilaments: 0.5,
            viscosity_kN_s_per_m2_per_nm: 0.0,
        }
    }
}

/// MyBP-C placement on the thick filament (C-zone).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessoryParameters {
    /// First crown carrying a MyBP-C molecule (from the M-line)
    pub first_crown: usize,
    /// Crown stride between successive MyBP-C molecules
    pub crown_stride: usize,
    /// MyBP-C molecules per filament
    /// Reference: 9 C-zone stripes per half filament
    /// Source: Luther et al., PNAS 2011
    pub molecules_per_filament: usize,
    /// Angular offset from the host crown angle (degrees)
    pub angle_offset_deg: f64,
    /// MyBP-C link stiffness (pN/nm)
    pub stiffness_pN_per_nm: f64,
    /// Axial range within which a MyBP-C molecule can control a
    /// cross-bridge (nm)
    pub control_range_nm: f64,
}

impl Default for AccessoryParameters {
    fn default() -> Self {
        Self {
            first_crown: 8,
            crown_stride: 3,
            // Luther et al. 2011
            molecules_per_filament: 9,
            angle_offset_deg: 20.0,
            stiffness_pN_per_nm: 1.0,
            control_range_nm: 10.0,
        }
    }
}
