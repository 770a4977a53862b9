//! Thin (actin) filament state: binding sites and regulatory units.
//!
//! A filament is a chain of axial nodes anchored at the Z-disc. Every node
//! carries one binding site per strand and one calcium-regulated unit that
//! switches all of its sites on or off together. Site occupancy is tracked
//! with explicit back-references to the occupying molecule so attach and
//! detach events stay symmetric.

use glam::DVec2;

use crate::config::ThinParameters;

/// Back-reference from an occupied binding site to the bound molecule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteOccupant {
    /// Myosin head `index` on thick filament `thick_id`
    CrossBridge { thick_id: usize, index: usize },
    /// MyBP-C molecule `index` on thick filament `thick_id`
    Accessory { thick_id: usize, index: usize },
}

/// One myosin binding site.
#[derive(Debug, Clone)]
pub struct BindingSite {
    /// Azimuthal orientation (degrees); follows the node helix, strands 180°
    /// apart
    pub angle_deg: f64,
    /// Mirrors the owning regulatory unit's status
    pub active: bool,
    /// Bound molecule, if any
    pub occupant: Option<SiteOccupant>,
}

/// One calcium-regulated unit (one per node).
#[derive(Debug, Clone)]
pub struct RegulatoryUnit {
    /// Whether the unit currently exposes its sites
    pub active: bool,
    /// Active count among the axial neighbor units, snapshotted at the start
    /// of each kinetic sub-step
    pub active_neighbors: u32,
}

/// A thin filament: Z-disc anchored node chain with sites and units.
#[derive(Debug, Clone)]
pub struct ThinFilament {
    /// Filament id within the lattice
    pub id: usize,
    /// Transverse lattice coordinates (nm)
    pub lattice_position: DVec2,
    /// Current axial node positions (nm from the Z-disc), ascending;
    /// refreshed from the equilibrium solution after every solve
    pub node_positions_nm: Vec<f64>,
    /// Sites indexed as `node * strands + strand`
    pub sites: Vec<BindingSite>,
    /// One unit per node
    pub units: Vec<RegulatoryUnit>,
    /// Strands per filament
    pub strands: usize,
}

impl ThinFilament {
    /// Build a filament at rest: evenly spaced nodes, all units off, all
    /// sites free.
    pub fn new(id: usize, params: &ThinParameters, lattice_position: DVec2) -> Self {
        let n_nodes = params.nodes_per_filament;
        let strands = params.strands_per_filament;

        let node_positions_nm = (0..n_nodes)
            .map(|node| (node + 1) as f64 * params.node_spacing_nm)
            .collect();

        let mut sites = Vec::with_capacity(n_nodes * strands);
        for node in 0..n_nodes {
            let node_angle = node as f64 * params.node_twist_deg;
            for strand in 0..strands {
                sites.push(BindingSite {
                    angle_deg: (node_angle + strand as f64 * 360.0 / strands as f64)
                        .rem_euclid(360.0),
                    active: false,
                    occupant: None,
                });
            }
        }

        let units = (0..n_nodes)
            .map(|_| RegulatoryUnit {
                active: false,
                active_neighbors: 0,
            })
            .collect();

        Self {
            id,
            lattice_position,
            node_positions_nm,
            sites,
            units,
            strands,
        }
    }

    /// Number of axial nodes.
    pub fn n_nodes(&self) -> usize {
        self.node_positions_nm.len()
    }

    /// Number of binding sites.
    pub fn n_sites(&self) -> usize {
        self.sites.len()
    }

    /// Node owning a site.
    pub fn node_of_site(&self, site: usize) -> usize {
        site / self.strands
    }

    /// Site index range of a node.
    pub fn sites_of_node(&self, node: usize) -> std::ops::Range<usize> {
        node * self.strands..(node + 1) * self.strands
    }

    /// Axial position of a site (nm from the Z-disc).
    pub fn site_position_nm(&self, site: usize) -> f64 {
        self.node_positions_nm[self.node_of_site(site)]
    }

    /// True when no site of the unit is occupied. A unit may not switch off
    /// while any of its sites holds a molecule.
    pub fn unit_is_unoccupied(&self, node: usize) -> bool {
        self.sites[self.sites_of_node(node)]
            .iter()
            .all(|s| s.occupant.is_none())
    }

    /// Switch a unit and mirror the status onto all of its sites.
    pub fn set_unit_active(&mut self, node: usize, active: bool) {
        self.units[node].active = active;
        let range = self.sites_of_node(node);
        for site in &mut self.sites[range] {
            site.active = active;
        }
    }

    /// Snapshot active-neighbor counts for every unit from the current unit
    /// states. Called once per kinetic sub-step so updates within a sub-step
    /// see a consistent neighborhood.
    pub fn refresh_neighbor_counts(&mut self) {
        let n = self.units.len();
        for node in 0..n {
            let mut count = 0;
            if node > 0 && self.units[node - 1].active {
                count += 1;
            }
            if node + 1 < n && self.units[node + 1].active {
                count += 1;
            }
            self.units[node].active_neighbors = count;
        }
    }

    /// Index of the site on this filament nearest to an axial position.
    /// Ties resolve to the lower node.
    pub fn nearest_site(&self, position_nm: f64, strand: usize) -> usize {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (node, &x) in self.node_positions_nm.iter().enumerate() {
            let dist = (x - position_nm).abs();
            if dist < best_dist {
                best_dist = dist;
                best = node;
            }
        }
        best * self.strands + strand.min(self.strands - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn filament() -> ThinFilament {
        ThinFilament::new(0, &ThinParameters::default(), DVec2::ZERO)
    }

    #[test]
    fn test_rest_geometry() {
        let f = filament();
        assert_eq!(f.n_nodes(), 90);
        assert_eq!(f.n_sites(), 180);
        assert_relative_eq!(f.node_positions_nm[0], 12.0);
        assert_relative_eq!(f.node_positions_nm[89], 90.0 * 12.0);
        // Strands are half a turn apart
        assert_relative_eq!(
            (f.sites[1].angle_deg - f.sites[0].angle_deg).rem_euclid(360.0),
            180.0
        );
    }

    #[test]
    fn test_unit_status_mirrors_to_sites() {
        let mut f = filament();
        f.set_unit_active(10, true);
        for site in f.sites_of_node(10) {
            assert!(f.sites[site].active);
        }
        assert!(!f.sites[f.sites_of_node(9).start].active);
        f.set_unit_active(10, false);
        assert!(!f.sites[f.sites_of_node(10).start].active);
    }

    #[test]
    fn test_neighbor_counts() {
        let mut f = filament();
        f.set_unit_active(5, true);
        f.refresh_neighbor_counts();
        assert_eq!(f.units[4].active_neighbors, 1);
        assert_eq!(f.units[6].active_neighbors, 1);
        assert_eq!(f.units[5].active_neighbors, 0);
        // Chain ends see only one neighbor
        f.set_unit_active(1, true);
        f.refresh_neighbor_counts();
        assert_eq!(f.units[0].active_neighbors, 1);
    }

    #[test]
    fn test_unit_occupancy_guard() {
        let mut f = filament();
        assert!(f.unit_is_unoccupied(3));
        let site = f.sites_of_node(3).start;
        f.sites[site].occupant = Some(SiteOccupant::CrossBridge {
            thick_id: 0,
            index: 7,
        });
        assert!(!f.unit_is_unoccupied(3));
        assert!(f.unit_is_unoccupied(4));
    }

    #[test]
    fn test_nearest_site() {
        let f = filament();
        // 12 nm spacing: 30 nm is nearer node 2 (36 nm) than node 1 (24 nm)?
        // |24-30| = 6, |36-30| = 6: tie resolves to the lower node.
        assert_eq!(f.node_of_site(f.nearest_site(30.0, 0)), 1);
        assert_eq!(f.node_of_site(f.nearest_site(35.0, 0)), 2);
        assert_eq!(f.nearest_site(35.0, 1) % 2, 1);
    }
}
