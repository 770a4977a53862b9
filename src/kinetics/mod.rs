//! Discrete-state kinetics: rate laws, schemes, and the stochastic engine.

pub mod engine;
pub mod rates;
pub mod scheme;

pub use engine::KineticsEngine;
pub use rates::{RateLaw, KBT_PN_NM};
pub use scheme::{KineticScheme, KineticState, StateType, Transition, TransitionClass};
