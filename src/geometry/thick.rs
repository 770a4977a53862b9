//! Thick (myosin) filament state: crowns, cross-bridge dimers, and MyBP-C.
//!
//! A filament is a chain of crown nodes anchored at the M-line. Each crown
//! carries a fixed number of cross-bridges paired into dimers (heads 2k and
//! 2k+1); super-relaxed transitions act on whole dimers, so the pairing is
//! validated at construction. MyBP-C molecules occupy a stripe of crowns in
//! the C-zone.

use glam::DVec2;

use crate::config::{AccessoryParameters, ThickParameters};
use crate::error::{Result, SarcomereError};
use crate::geometry::lattice::N_NEIGHBORS;

/// Reference to a thin-filament binding site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundSite {
    /// Thin filament id
    pub thin_id: usize,
    /// Site index on that filament
    pub site: usize,
}

/// One myosin head.
#[derive(Debug, Clone)]
pub struct CrossBridge {
    /// Host crown index (0 is nearest the M-line)
    pub crown: usize,
    /// Azimuthal orientation (degrees); dimer partners share it
    pub angle_deg: f64,
    /// Current kinetic state (index into the isotype's scheme)
    pub state: usize,
    /// Isotype index; dimer partners share it
    pub isotype: usize,
    /// Bound site while attached
    pub bound: Option<BoundSite>,
    /// Best-facing thin filament, refreshed whenever geometry moves
    pub nearest_thin_id: usize,
    /// Candidate site window on that filament, refreshed with it
    pub candidate_sites: Vec<usize>,
    /// MyBP-C molecule (index on this filament) whose axial range covers this
    /// head, if any. Bookkeeping for rate-modulation schemes; none of the
    /// built-in rate laws consult it.
    pub controlling_accessory: Option<usize>,
}

/// One MyBP-C molecule.
#[derive(Debug, Clone)]
pub struct AccessoryMolecule {
    /// Host crown index
    pub crown: usize,
    /// Azimuthal orientation (degrees)
    pub angle_deg: f64,
    /// Current kinetic state (index into the isotype's scheme)
    pub state: usize,
    /// Isotype index
    pub isotype: usize,
    /// Bound site while attached
    pub bound: Option<BoundSite>,
    /// Best-facing thin filament, refreshed with geometry
    pub nearest_thin_id: usize,
    /// Candidate site window on that filament
    pub candidate_sites: Vec<usize>,
}

/// A thick filament: M-line anchored crown chain with its molecules.
#[derive(Debug, Clone)]
pub struct ThickFilament {
    /// Filament id within the lattice
    pub id: usize,
    /// Transverse lattice coordinates (nm)
    pub lattice_position: DVec2,
    /// Surrounding thin filament ids, one per 60° angular bin
    pub nearest_thin: [usize; N_NEIGHBORS],
    /// Current crown positions (nm from the Z-disc), descending from the
    /// M-line side; refreshed from the equilibrium solution
    pub node_positions_nm: Vec<f64>,
    /// Heads indexed as `crown * cbs_per_crown + head`
    pub cross_bridges: Vec<CrossBridge>,
    /// MyBP-C molecules in crown order
    pub accessories: Vec<AccessoryMolecule>,
    /// Heads per crown (even)
    pub cbs_per_crown: usize,
}

impl ThickFilament {
    /// Build a filament at rest with every molecule in state 0 of its scheme.
    ///
    /// `cb_isotypes` has one entry per dimer; both heads of a dimer inherit
    /// it so super-relaxed gating always compares like with like.
    pub fn new(
        id: usize,
        params: &ThickParameters,
        accessory: &AccessoryParameters,
        lattice_position: DVec2,
        nearest_thin: [usize; N_NEIGHBORS],
        hs_length_nm: f64,
        cb_isotypes: &[usize],
        accessory_isotypes: &[usize],
    ) -> Result<Self> {
        if params.cbs_per_crown == 0 || params.cbs_per_crown % 2 != 0 {
            return Err(SarcomereError::dimer_pairing(format!(
                "cbs_per_crown must be a positive even number, got {}",
                params.cbs_per_crown
            )));
        }
        let dimers_per_crown = params.cbs_per_crown / 2;
        let n_dimers = params.crowns_per_filament * dimers_per_crown;
        if cb_isotypes.len() != n_dimers {
            return Err(SarcomereError::dimer_pairing(format!(
                "expected {} dimer isotypes, got {}",
                n_dimers,
                cb_isotypes.len()
            )));
        }

        let node_positions_nm: Vec<f64> = (0..params.crowns_per_filament)
            .map(|crown| hs_length_nm - params.bare_zone_nm - crown as f64 * params.crown_spacing_nm)
            .collect();

        let mut cross_bridges = Vec::with_capacity(params.crowns_per_filament * params.cbs_per_crown);
        for crown in 0..params.crowns_per_filament {
            let crown_angle = crown as f64 * params.crown_twist_deg;
            for head in 0..params.cbs_per_crown {
                let dimer = crown * dimers_per_crown + head / 2;
                cross_bridges.push(CrossBridge {
                    crown,
                    angle_deg: (crown_angle + (head / 2) as f64 * 360.0 / dimers_per_crown as f64)
                        .rem_euclid(360.0),
                    state: 0,
                    isotype: cb_isotypes[dimer],
                    bound: None,
                    nearest_thin_id: 0,
                    candidate_sites: Vec::new(),
                    controlling_accessory: None,
                });
            }
        }

        let mut accessories = Vec::with_capacity(accessory.molecules_per_filament);
        for (index, &isotype) in accessory_isotypes
            .iter()
            .enumerate()
            .take(accessory.molecules_per_filament)
        {
            let crown = accessory.first_crown + index * accessory.crown_stride;
            if crown >= params.crowns_per_filament {
                return Err(SarcomereError::invalid_config(format!(
                    "accessory molecule {} lands on crown {} of a {}-crown filament",
                    index, crown, params.crowns_per_filament
                )));
            }
            accessories.push(AccessoryMolecule {
                crown,
                angle_deg: (crown as f64 * params.crown_twist_deg + accessory.angle_offset_deg)
                    .rem_euclid(360.0),
                state: 0,
                isotype,
                bound: None,
                nearest_thin_id: 0,
                candidate_sites: Vec::new(),
            });
        }

        Ok(Self {
            id,
            lattice_position,
            nearest_thin,
            node_positions_nm,
            cross_bridges,
            accessories,
            cbs_per_crown: params.cbs_per_crown,
        })
    }

    /// Number of crowns.
    pub fn n_crowns(&self) -> usize {
        self.node_positions_nm.len()
    }

    /// Number of heads.
    pub fn n_cross_bridges(&self) -> usize {
        self.cross_bridges.len()
    }

    /// The other head of a dimer.
    pub fn dimer_partner(cb_index: usize) -> usize {
        cb_index ^ 1
    }

    /// Axial position of a head (nm from the Z-disc).
    pub fn cb_position_nm(&self, cb_index: usize) -> f64 {
        self.node_positions_nm[self.cross_bridges[cb_index].crown]
    }

    /// Axial position of a MyBP-C molecule (nm from the Z-disc).
    pub fn accessory_position_nm(&self, index: usize) -> f64 {
        self.node_positions_nm[self.accessories[index].crown]
    }
}

/// Deterministic isotype assignment from a proportion table.
///
/// Molecule `i` samples the normalized cumulative distribution at
/// `(i + 0.5) / count`, so the realized mix tracks the requested proportions
/// without drawing random numbers.
pub fn assign_isotypes(count: usize, proportions: &[f64]) -> Vec<usize> {
    let total: f64 = proportions.iter().filter(|p| p.is_finite() && **p > 0.0).sum();
    if proportions.is_empty() || total <= 0.0 {
        return vec![0; count];
    }

    (0..count)
        .map(|i| {
            let target = (i as f64 + 0.5) / count as f64;
            let mut cumulative = 0.0;
            let mut chosen = 0;
            for (isotype, &p) in proportions.iter().enumerate() {
                if p.is_finite() && p > 0.0 {
                    cumulative += p / total;
                    chosen = isotype;
                    if target <= cumulative {
                        break;
                    }
                }
            }
            chosen
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn filament() -> ThickFilament {
        let params = ThickParameters::default();
        let accessory = AccessoryParameters::default();
        let n_dimers = params.crowns_per_filament * params.cbs_per_crown / 2;
        ThickFilament::new(
            0,
            &params,
            &accessory,
            DVec2::ZERO,
            [0, 1, 2, 3, 4, 5],
            1100.0,
            &vec![0; n_dimers],
            &vec![0; accessory.molecules_per_filament],
        )
        .unwrap()
    }

    #[test]
    fn test_rest_geometry() {
        let f = filament();
        assert_eq!(f.n_crowns(), 54);
        assert_eq!(f.n_cross_bridges(), 54 * 6);
        // Crown 0 sits one bare zone in from the M-line
        assert_relative_eq!(f.node_positions_nm[0], 1100.0 - 80.0);
        assert_relative_eq!(f.node_positions_nm[1], 1100.0 - 80.0 - 13.5);
        assert!(f.node_positions_nm[53] < f.node_positions_nm[0]);
    }

    #[test]
    fn test_odd_heads_per_crown_rejected() {
        let params = ThickParameters {
            cbs_per_crown: 5,
            ..ThickParameters::default()
        };
        let result = ThickFilament::new(
            0,
            &params,
            &AccessoryParameters::default(),
            DVec2::ZERO,
            [0; 6],
            1100.0,
            &[],
            &[],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_dimer_partners_share_angle_and_isotype() {
        let params = ThickParameters::default();
        let n_dimers = params.crowns_per_filament * params.cbs_per_crown / 2;
        let isotypes: Vec<usize> = (0..n_dimers).map(|d| d % 2).collect();
        let f = ThickFilament::new(
            0,
            &params,
            &AccessoryParameters::default(),
            DVec2::ZERO,
            [0; 6],
            1100.0,
            &isotypes,
            &vec![0; 9],
        )
        .unwrap();

        for cb in (0..f.n_cross_bridges()).step_by(2) {
            let partner = ThickFilament::dimer_partner(cb);
            assert_eq!(partner, cb + 1);
            assert_relative_eq!(
                f.cross_bridges[cb].angle_deg,
                f.cross_bridges[partner].angle_deg
            );
            assert_eq!(f.cross_bridges[cb].isotype, f.cross_bridges[partner].isotype);
        }
        // Dimers within a crown are evenly spread: 3 dimers, 120° apart
        assert_relative_eq!(
            (f.cross_bridges[2].angle_deg - f.cross_bridges[0].angle_deg).rem_euclid(360.0),
            120.0
        );
    }

    #[test]
    fn test_accessory_stripe() {
        let f = filament();
        assert_eq!(f.accessories.len(), 9);
        assert_eq!(f.accessories[0].crown, 8);
        assert_eq!(f.accessories[1].crown, 11);
        assert_eq!(f.accessories[8].crown, 8 + 8 * 3);
    }

    #[test]
    fn test_accessory_beyond_filament_rejected() {
        let params = ThickParameters {
            crowns_per_filament: 20,
            ..ThickParameters::default()
        };
        let n_dimers = 20 * params.cbs_per_crown / 2;
        let result = ThickFilament::new(
            0,
            &params,
            &AccessoryParameters::default(),
            DVec2::ZERO,
            [0; 6],
            1100.0,
            &vec![0; n_dimers],
            &vec![0; 9],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_isotype_assignment_tracks_proportions() {
        let assigned = assign_isotypes(100, &[0.75, 0.25]);
        let first = assigned.iter().filter(|&&i| i == 0).count();
        assert_eq!(first, 75);
        // Degenerate tables fall back to isotype 0
        assert_eq!(assign_isotypes(4, &[]), vec![0; 4]);
        assert_eq!(assign_isotypes(4, &[0.0, 0.0]), vec![0; 4]);
        // Single-isotype table
        assert_eq!(assign_isotypes(3, &[1.0]), vec![0; 3]);
    }
}
