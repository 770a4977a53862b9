//! Filament lattice geometry and per-filament structural state.

pub mod lattice;
pub mod thick;
pub mod thin;

pub use lattice::{Lattice, N_NEIGHBORS};
pub use thick::{assign_isotypes, AccessoryMolecule, BoundSite, CrossBridge, ThickFilament};
pub use thin::{BindingSite, RegulatoryUnit, SiteOccupant, ThinFilament};
