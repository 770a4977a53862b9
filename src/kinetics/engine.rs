//! Stochastic kinetics: thin-filament regulation, cross-bridge cycling, and
//! MyBP-C binding.
//!
//! Each outer timestep is divided into equal sub-steps because regulatory-unit
//! kinetics are fast relative to cross-bridge kinetics. Within a sub-step the
//! three processes run in a fixed order: unit regulation first (with
//! active-neighbor counts snapshotted from the previous sub-step), then
//! cross-bridges, then accessory molecules.
//!
//! Event selection is one uniform draw per molecule over the cumulative
//! distribution of all competing transition probabilities; at most one event
//! fires per molecule per sub-step. Super-relaxed transitions are gated at the
//! dimer level: both heads must share a state, the event applies to both
//! atomically, and the partner is barred for the rest of the sub-step.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::Rng;

use crate::config::{Options, ThickParameters, ThinParameters};
use crate::geometry::{BoundSite, SiteOccupant, ThickFilament, ThinFilament};
use crate::kinetics::scheme::{KineticScheme, TransitionClass};

/// Run-wide log guard for the probability-rescale warning. Every engine keeps
/// its own `rescale_warned` flag for metrics, but a myofibril of N members
/// logs the warning once, not N times.
static RESCALE_LOGGED: AtomicBool = AtomicBool::new(false);

/// What an accepted event does to the lattice.
#[derive(Debug, Clone, Copy)]
enum EventKind {
    /// Bind the given site on the molecule's nearest thin filament.
    Attach { site: usize },
    /// Release the currently bound site.
    Detach,
    /// Pure state change; `dimer` events apply to both heads of a pair.
    StateChange { dimer: bool },
}

/// One competing transition with its sub-step probability.
#[derive(Debug, Clone, Copy)]
struct CandidateEvent {
    target: usize,
    kind: EventKind,
    probability: f64,
}

/// Stochastic kinetics driver for one half-sarcomere.
///
/// Owns the per-isotype schemes (possibly rate-scaled derived copies) and the
/// event-selection scratch. Randomness comes from the caller's stream so the
/// draw sequence per half-sarcomere is fixed regardless of threading.
#[derive(Debug, Clone)]
pub struct KineticsEngine {
    myosin_schemes: Vec<Arc<KineticScheme>>,
    accessory_schemes: Vec<Arc<KineticScheme>>,
    unit_on_rate_per_M_per_sec: f64,
    unit_off_rate_per_sec: f64,
    cooperativity: f64,
    cb_stiffness_pN_per_nm: f64,
    accessory_stiffness_pN_per_nm: f64,
    substeps: usize,
    rescale_warned: bool,
    candidates: Vec<CandidateEvent>,
    barred: Vec<bool>,
}

impl KineticsEngine {
    pub fn new(
        options: &Options,
        thin: &ThinParameters,
        thick: &ThickParameters,
        accessory_stiffness_pN_per_nm: f64,
        myosin_schemes: Vec<Arc<KineticScheme>>,
        accessory_schemes: Vec<Arc<KineticScheme>>,
    ) -> Self {
        Self {
            myosin_schemes,
            accessory_schemes,
            unit_on_rate_per_M_per_sec: thin.unit_on_rate_per_M_per_sec,
            unit_off_rate_per_sec: thin.unit_off_rate_per_sec,
            cooperativity: thin.cooperativity,
            cb_stiffness_pN_per_nm: thick.cb_stiffness_pN_per_nm,
            accessory_stiffness_pN_per_nm,
            substeps: options.kinetic_substeps.max(1),
            rescale_warned: false,
            candidates: Vec::new(),
            barred: Vec::new(),
        }
    }

    /// Whether any probability vector has been rescaled this run.
    pub fn rescale_warned(&self) -> bool {
        self.rescale_warned
    }

    /// Advance all three processes by one outer timestep.
    pub fn step(
        &mut self,
        thin: &mut [ThinFilament],
        thick: &mut [ThickFilament],
        ca_molar: f64,
        dt_sec: f64,
        rng: &mut StdRng,
    ) {
        let dt_sub = dt_sec / self.substeps as f64;
        for _ in 0..self.substeps {
            for filament in thin.iter_mut() {
                filament.refresh_neighbor_counts();
            }
            for filament in thin.iter_mut() {
                self.advance_units(filament, ca_molar, dt_sub, rng);
            }
            for t in 0..thick.len() {
                self.advance_cross_bridges(t, thick, thin, dt_sub, rng);
                self.advance_accessories(t, thick, thin, dt_sub, rng);
            }
        }
    }

    /// Regulatory-unit on/off kinetics for one filament.
    ///
    /// Neighbor counts were snapshotted before this sub-step, so flips made
    /// here do not feed back until the next sub-step.
    fn advance_units(
        &mut self,
        filament: &mut ThinFilament,
        ca_molar: f64,
        dt_sub: f64,
        rng: &mut StdRng,
    ) {
        for node in 0..filament.units.len() {
            let unit = &filament.units[node];
            let neighbors = unit.active_neighbors as f64;

            let probability = if !unit.active {
                let rate = self.unit_on_rate_per_M_per_sec
                    * ca_molar
                    * (1.0 + self.cooperativity * neighbors);
                1.0 - (-rate * dt_sub).exp()
            } else if filament.unit_is_unoccupied(node) {
                let rate =
                    self.unit_off_rate_per_sec * (1.0 + self.cooperativity * (2.0 - neighbors));
                1.0 - (-rate * dt_sub).exp()
            } else {
                // Occupied units may not switch off
                0.0
            };

            let flip = rng.gen::<f64>() < probability;
            if flip {
                let active = filament.units[node].active;
                filament.set_unit_active(node, !active);
            }
        }
    }

    /// Cross-bridge event selection and application for one thick filament.
    fn advance_cross_bridges(
        &mut self,
        t: usize,
        thick: &mut [ThickFilament],
        thin: &mut [ThinFilament],
        dt_sub: f64,
        rng: &mut StdRng,
    ) {
        let n_cbs = thick[t].n_cross_bridges();
        self.barred.clear();
        self.barred.resize(n_cbs, false);

        for cb_idx in 0..n_cbs {
            if self.barred[cb_idx] {
                continue;
            }

            let chosen = {
                let filament = &thick[t];
                let cb = &filament.cross_bridges[cb_idx];
                let scheme = Arc::clone(&self.myosin_schemes[cb.isotype]);
                let state = scheme.state(cb.state);
                let cb_x = filament.cb_position_nm(cb_idx);

                // Bound mechanical context: spring stretch and force; zero
                // when detached.
                let (stretch, force) = match cb.bound {
                    Some(bound) => {
                        let site_x = thin[bound.thin_id].site_position_nm(bound.site);
                        let s = cb_x + state.extension_nm - site_x;
                        (s, self.cb_stiffness_pN_per_nm * s)
                    }
                    None => (0.0, 0.0),
                };

                self.candidates.clear();
                for transition in &state.transitions {
                    match transition.class {
                        TransitionClass::Attach => {
                            if cb.bound.is_some() {
                                continue;
                            }
                            let target = &thin[cb.nearest_thin_id];
                            for &site in &cb.candidate_sites {
                                let s = &target.sites[site];
                                if !s.active || s.occupant.is_some() {
                                    continue;
                                }
                                let alignment =
                                    -(s.angle_deg - cb.angle_deg).to_radians().cos();
                                if alignment <= 0.0 {
                                    continue;
                                }
                                let d = target.site_position_nm(site) - cb_x;
                                let rate = transition.rate_law.evaluate(
                                    d,
                                    0.0,
                                    scheme.max_rate_per_sec,
                                );
                                self.candidates.push(CandidateEvent {
                                    target: transition.target,
                                    kind: EventKind::Attach { site },
                                    probability: alignment * (1.0 - (-rate * dt_sub).exp()),
                                });
                            }
                        }
                        TransitionClass::Detach => {
                            if cb.bound.is_none() {
                                continue;
                            }
                            let rate = transition.rate_law.evaluate(
                                stretch,
                                force,
                                scheme.max_rate_per_sec,
                            );
                            self.candidates.push(CandidateEvent {
                                target: transition.target,
                                kind: EventKind::Detach,
                                probability: 1.0 - (-rate * dt_sub).exp(),
                            });
                        }
                        TransitionClass::Neutral => {
                            let dimer = scheme.involves_super_relaxed(cb.state, transition);
                            if dimer {
                                let partner = ThickFilament::dimer_partner(cb_idx);
                                // Both heads must agree on state for a
                                // dimer-level event
                                if filament.cross_bridges[partner].state != cb.state {
                                    continue;
                                }
                            }
                            let rate = transition.rate_law.evaluate(
                                stretch,
                                force,
                                scheme.max_rate_per_sec,
                            );
                            self.candidates.push(CandidateEvent {
                                target: transition.target,
                                kind: EventKind::StateChange { dimer },
                                probability: 1.0 - (-rate * dt_sub).exp(),
                            });
                        }
                    }
                }

                self.select_event(rng)
            };

            if let Some(event) = chosen {
                self.apply_cb_event(thick, thin, t, cb_idx, event);
            }
        }
    }

    /// MyBP-C kinetics: the same event-selection machinery without dimers.
    fn advance_accessories(
        &mut self,
        t: usize,
        thick: &mut [ThickFilament],
        thin: &mut [ThinFilament],
        dt_sub: f64,
        rng: &mut StdRng,
    ) {
        let n_acc = thick[t].accessories.len();
        for acc_idx in 0..n_acc {
            let chosen = {
                let filament = &thick[t];
                let molecule = &filament.accessories[acc_idx];
                let scheme = Arc::clone(&self.accessory_schemes[molecule.isotype]);
                let state = scheme.state(molecule.state);
                let acc_x = filament.accessory_position_nm(acc_idx);

                let (stretch, force) = match molecule.bound {
                    Some(bound) => {
                        let site_x = thin[bound.thin_id].site_position_nm(bound.site);
                        let s = acc_x + state.extension_nm - site_x;
                        (s, self.accessory_stiffness_pN_per_nm * s)
                    }
                    None => (0.0, 0.0),
                };

                self.candidates.clear();
                for transition in &state.transitions {
                    match transition.class {
                        TransitionClass::Attach => {
                            if molecule.bound.is_some() {
                                continue;
                            }
                            let target = &thin[molecule.nearest_thin_id];
                            for &site in &molecule.candidate_sites {
                                let s = &target.sites[site];
                                if !s.active || s.occupant.is_some() {
                                    continue;
                                }
                                let alignment =
                                    -(s.angle_deg - molecule.angle_deg).to_radians().cos();
                                if alignment <= 0.0 {
                                    continue;
                                }
                                let d = target.site_position_nm(site) - acc_x;
                                let rate = transition.rate_law.evaluate(
                                    d,
                                    0.0,
                                    scheme.max_rate_per_sec,
                                );
                                self.candidates.push(CandidateEvent {
                                    target: transition.target,
                                    kind: EventKind::Attach { site },
                                    probability: alignment * (1.0 - (-rate * dt_sub).exp()),
                                });
                            }
                        }
                        TransitionClass::Detach => {
                            if molecule.bound.is_none() {
                                continue;
                            }
                            let rate = transition.rate_law.evaluate(
                                stretch,
                                force,
                                scheme.max_rate_per_sec,
                            );
                            self.candidates.push(CandidateEvent {
                                target: transition.target,
                                kind: EventKind::Detach,
                                probability: 1.0 - (-rate * dt_sub).exp(),
                            });
                        }
                        TransitionClass::Neutral => {
                            let rate = transition.rate_law.evaluate(
                                stretch,
                                force,
                                scheme.max_rate_per_sec,
                            );
                            self.candidates.push(CandidateEvent {
                                target: transition.target,
                                kind: EventKind::StateChange { dimer: false },
                                probability: 1.0 - (-rate * dt_sub).exp(),
                            });
                        }
                    }
                }

                self.select_event(rng)
            };

            if let Some(event) = chosen {
                self.apply_accessory_event(thick, thin, t, acc_idx, event);
            }
        }
    }

    /// One uniform draw over the cumulative candidate distribution.
    ///
    /// Probability sums above 1 are rescaled in place to exactly 1 and a
    /// warning is logged once per run.
    fn select_event(&mut self, rng: &mut StdRng) -> Option<CandidateEvent> {
        if self.candidates.is_empty() {
            return None;
        }

        let total: f64 = self.candidates.iter().map(|c| c.probability).sum();
        if total > 1.0 {
            for candidate in &mut self.candidates {
                candidate.probability /= total;
            }
            if !self.rescale_warned {
                self.rescale_warned = true;
                if !RESCALE_LOGGED.swap(true, Ordering::Relaxed) {
                    log::warn!(
                        "competing event probabilities summed to {:.3}; vector rescaled \
                         (consider a smaller timestep or more kinetic sub-steps)",
                        total
                    );
                }
            }
        }

        let draw = rng.gen::<f64>();
        let mut cumulative = 0.0;
        for candidate in &self.candidates {
            cumulative += candidate.probability;
            if draw < cumulative {
                return Some(*candidate);
            }
        }
        None
    }

    /// Apply an accepted cross-bridge event, keeping the thick→thin and
    /// thin→thick references synchronized. This is the only place those
    /// cross-references change.
    fn apply_cb_event(
        &mut self,
        thick: &mut [ThickFilament],
        thin: &mut [ThinFilament],
        t: usize,
        cb_idx: usize,
        event: CandidateEvent,
    ) {
        match event.kind {
            EventKind::Attach { site } => {
                let thin_id = thick[t].cross_bridges[cb_idx].nearest_thin_id;
                thick[t].cross_bridges[cb_idx].bound = Some(BoundSite { thin_id, site });
                thin[thin_id].sites[site].occupant = Some(SiteOccupant::CrossBridge {
                    thick_id: t,
                    index: cb_idx,
                });
                thick[t].cross_bridges[cb_idx].state = event.target;
            }
            EventKind::Detach => {
                if let Some(bound) = thick[t].cross_bridges[cb_idx].bound.take() {
                    thin[bound.thin_id].sites[bound.site].occupant = None;
                }
                thick[t].cross_bridges[cb_idx].state = event.target;
            }
            EventKind::StateChange { dimer } => {
                thick[t].cross_bridges[cb_idx].state = event.target;
                if dimer {
                    let partner = ThickFilament::dimer_partner(cb_idx);
                    thick[t].cross_bridges[partner].state = event.target;
                    self.barred[partner] = true;
                }
            }
        }
    }

    /// Apply an accepted MyBP-C event symmetrically.
    fn apply_accessory_event(
        &mut self,
        thick: &mut [ThickFilament],
        thin: &mut [ThinFilament],
        t: usize,
        acc_idx: usize,
        event: CandidateEvent,
    ) {
        match event.kind {
            EventKind::Attach { site } => {
                let thin_id = thick[t].accessories[acc_idx].nearest_thin_id;
                thick[t].accessories[acc_idx].bound = Some(BoundSite { thin_id, site });
                thin[thin_id].sites[site].occupant = Some(SiteOccupant::Accessory {
                    thick_id: t,
                    index: acc_idx,
                });
                thick[t].accessories[acc_idx].state = event.target;
            }
            EventKind::Detach => {
                if let Some(bound) = thick[t].accessories[acc_idx].bound.take() {
                    thin[bound.thin_id].sites[bound.site].occupant = None;
                }
                thick[t].accessories[acc_idx].state = event.target;
            }
            EventKind::StateChange { .. } => {
                thick[t].accessories[acc_idx].state = event.target;
            }
        }
    }
}
