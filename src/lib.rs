//! On-the-fly nonadiabatic molecular dynamics: a velocity-verlet propagator
//! with stochastic surface hopping (Landau-Zener and Tully fewest switches),
//! backed by an interpolation cache that decides per step whether a surface
//! evaluation can be served from a fitted model over previously computed
//! points or has to go to the exact evaluator.

pub mod cache;
pub mod constants;
pub mod defaults;
pub mod dynamics;
pub mod error;
pub mod initialization;
pub mod interface;
pub mod output;
