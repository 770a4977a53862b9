//! Hexagonal filament lattice topology.
//!
//! Thick filaments sit on a triangular grid; thin filaments occupy the
//! trigonal interstices (two per thick filament), giving the 2:1 thin:thick
//! ratio of vertebrate muscle. Every thick filament sees six surrounding thin
//! filaments in fixed 60° angular bins. Grid edges are mirrored so the finite
//! patch behaves like an infinite lattice.
//!
//! The builder runs once at construction; its only failure mode is a
//! thick-filament count that is not a perfect square.
//!
//! Reference: Millman, Physiol Rev 1998 (filament lattice geometry).

use glam::DVec2;

use crate::config::LatticeParameters;
use crate::error::{Result, SarcomereError};

/// Number of thin-filament neighbors per thick filament.
pub const N_NEIGHBORS: usize = 6;

/// Filament lattice: 2-D coordinates plus the thick→thin adjacency.
#[derive(Debug, Clone)]
pub struct Lattice {
    /// Grid edge length (thick filaments per row/column)
    pub grid_size: usize,
    /// Thick filament coordinates (nm), indexed by filament id
    pub thick_positions: Vec<DVec2>,
    /// Thin filament coordinates (nm), indexed by filament id
    pub thin_positions: Vec<DVec2>,
    /// Per thick filament, the six surrounding thin filament ids ordered by
    /// angular bin (0°, 60°, …, 300°)
    pub nearest_thin: Vec<[usize; N_NEIGHBORS]>,
}

impl Lattice {
    /// Build the lattice for a perfect-square thick filament count.
    pub fn build(params: &LatticeParameters) -> Result<Self> {
        let n_thick = params.thick_filament_count;
        let grid_size = (n_thick as f64).sqrt().round() as usize;
        if grid_size * grid_size != n_thick || n_thick == 0 {
            return Err(SarcomereError::lattice_geometry(format!(
                "thick filament count {} is not a perfect square",
                n_thick
            )));
        }

        let d = params.thick_spacing_nm;
        // Triangular lattice basis; the whole frame is rotated by −30° so the
        // six trigonal neighbors land exactly on the 0°..300° bins.
        let a1 = rotate_m30(DVec2::new(d, 0.0));
        let a2 = rotate_m30(DVec2::new(0.5 * d, 0.5 * d * 3f64.sqrt()));
        // Trigonal points (up/down triangle centroids) within one cell
        let t1 = rotate_m30(DVec2::new(0.5 * d, 0.5 * d / 3f64.sqrt()));
        let t2 = rotate_m30(DVec2::new(d, d / 3f64.sqrt()));

        let mut thick_positions = Vec::with_capacity(n_thick);
        let mut thin_positions = Vec::with_capacity(2 * n_thick);
        for row in 0..grid_size {
            for col in 0..grid_size {
                let base = a1 * col as f64 + a2 * row as f64;
                thick_positions.push(base);
                thin_positions.push(base + t1);
                thin_positions.push(base + t2);
            }
        }

        // Six incident trigonal points of thick (row, col), one per 60° bin:
        // (row offset, col offset, which trigonal point of that cell).
        const BIN_OFFSETS: [(i64, i64, usize); N_NEIGHBORS] = [
            (0, 0, 0),   // 0°
            (0, -1, 1),  // 60°
            (0, -1, 0),  // 120°
            (-1, -1, 1), // 180°
            (-1, 0, 0),  // 240°
            (-1, 0, 1),  // 300°
        ];

        let mut nearest_thin = Vec::with_capacity(n_thick);
        for row in 0..grid_size {
            for col in 0..grid_size {
                let mut neighbors = [0usize; N_NEIGHBORS];
                for (bin, &(dr, dc, which)) in BIN_OFFSETS.iter().enumerate() {
                    let r = mirror(row as i64 + dr, grid_size);
                    let c = mirror(col as i64 + dc, grid_size);
                    neighbors[bin] = 2 * (r * grid_size + c) + which;
                }
                nearest_thin.push(neighbors);
            }
        }

        log::info!(
            "Lattice built: {} thick, {} thin filaments ({}x{} grid)",
            n_thick,
            thin_positions.len(),
            grid_size,
            grid_size
        );

        Ok(Self {
            grid_size,
            thick_positions,
            thin_positions,
            nearest_thin,
        })
    }

    /// Number of thick filaments.
    pub fn n_thick(&self) -> usize {
        self.thick_positions.len()
    }

    /// Number of thin filaments.
    pub fn n_thin(&self) -> usize {
        self.thin_positions.len()
    }

    /// Angular bin (0..6) a molecule angle falls into.
    pub fn angle_bin(angle_deg: f64) -> usize {
        let wrapped = (angle_deg + 30.0).rem_euclid(360.0);
        ((wrapped / 60.0).floor() as usize) % N_NEIGHBORS
    }
}

/// Rotate a vector by −30°.
fn rotate_m30(v: DVec2) -> DVec2 {
    let (sin, cos) = (-30f64).to_radians().sin_cos();
    DVec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Reflect an out-of-range grid index back into `[0, n)`.
fn mirror(i: i64, n: usize) -> usize {
    let n = n as i64;
    let m = if i < 0 {
        -i - 1
    } else if i >= n {
        2 * n - 1 - i
    } else {
        i
    };
    m.clamp(0, n - 1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params(n: usize) -> LatticeParameters {
        LatticeParameters {
            thick_filament_count: n,
            thick_spacing_nm: 37.0,
            initial_hs_length_nm: 1100.0,
        }
    }

    #[test]
    fn test_non_square_count_is_fatal() {
        assert!(Lattice::build(&params(5)).is_err());
        assert!(Lattice::build(&params(0)).is_err());
        assert!(Lattice::build(&params(9)).is_ok());
    }

    #[test]
    fn test_thin_count_is_twice_thick() {
        let lattice = Lattice::build(&params(16)).unwrap();
        assert_eq!(lattice.n_thick(), 16);
        assert_eq!(lattice.n_thin(), 32);
    }

    #[test]
    fn test_interior_neighbors_sit_on_bins() {
        let lattice = Lattice::build(&params(16)).unwrap();
        // Interior filament: row 2, col 2 of the 4x4 grid
        let thick_id = 2 * 4 + 2;
        let center = lattice.thick_positions[thick_id];
        let radius = 37.0 / 3f64.sqrt();

        for (bin, &thin_id) in lattice.nearest_thin[thick_id].iter().enumerate() {
            let offset = lattice.thin_positions[thin_id] - center;
            assert_relative_eq!(offset.length(), radius, max_relative = 1e-9);
            let angle = offset.y.atan2(offset.x).to_degrees().rem_euclid(360.0);
            assert_relative_eq!(angle, 60.0 * bin as f64, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_edge_neighbors_are_mirrored_in_range() {
        let lattice = Lattice::build(&params(4)).unwrap();
        for neighbors in &lattice.nearest_thin {
            for &thin_id in neighbors {
                assert!(thin_id < lattice.n_thin());
            }
        }
        // Corner filament still sees six (possibly repeated) neighbors
        assert_eq!(lattice.nearest_thin[0].len(), N_NEIGHBORS);
    }

    #[test]
    fn test_angle_bins() {
        assert_eq!(Lattice::angle_bin(0.0), 0);
        assert_eq!(Lattice::angle_bin(59.0), 1);
        assert_eq!(Lattice::angle_bin(61.0), 1);
        assert_eq!(Lattice::angle_bin(300.0), 5);
        assert_eq!(Lattice::angle_bin(359.0), 0);
        assert_eq!(Lattice::angle_bin(-60.0), 5);
    }
}
