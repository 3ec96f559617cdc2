use crate::initialization::io::HoppingConfiguration;
use ndarray::prelude::*;
use ndarray_linalg::c64;
use serde::{Deserialize, Serialize};

pub mod fewest_switches;
pub mod landau_zener;

pub use fewest_switches::FewestSwitches;
pub use landau_zener::LandauZener;

/// Hop-selection algorithm choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HopMethod {
    LandauZener,
    Tully,
}

/// Everything a selector may inspect during one step. Energy history views
/// are ordered newest first: current, previous, two steps back.
pub struct HopContext<'a> {
    pub active_state: usize,
    pub energies: ArrayView1<'a, f64>,
    pub energies_last: Option<ArrayView1<'a, f64>>,
    pub energies_last2: Option<ArrayView1<'a, f64>>,
    /// `vk[i, j] = velocity · coupling_vector[i, j]`, present when the
    /// couplings were computed this step.
    pub coupling_action: Option<ArrayView2<'a, f64>>,
    pub coefficients: ArrayView1<'a, c64>,
    pub stepsize: f64,
    pub random_draw: f64,
}

/// A proposed switch of the active surface.
#[derive(Debug, Clone, Copy)]
pub struct HopDecision {
    pub target_state: usize,
    pub probability: f64,
}

/// Result of one hop-selection pass: at most one proposed hop, plus the
/// propagated electronic amplitudes for the algorithms that carry them.
pub struct HopOutcome {
    pub hop: Option<HopDecision>,
    pub coefficients: Option<Array1<c64>>,
}

impl HopOutcome {
    pub fn none() -> Self {
        HopOutcome {
            hop: None,
            coefficients: None,
        }
    }
}

/// Capability of every hop-selection algorithm. The backend is resolved once
/// at configuration time and dispatched through `Box<dyn HopSelector>`.
pub trait HopSelector {
    fn name(&self) -> &'static str;

    /// Number of energy snapshots (current step included) the selector needs
    /// before it produces candidates.
    fn required_history(&self) -> usize;

    /// Whether the surface request of each step must include the
    /// nonadiabatic coupling vectors.
    fn needs_couplings(&self) -> bool;

    /// Probabilistic selectors carry electronic amplitudes and are subject
    /// to decoherence correction.
    fn is_probabilistic(&self) -> bool;

    fn select_hop(&mut self, context: &HopContext) -> HopOutcome;
}

pub fn build_hop_selector(config: &HoppingConfiguration) -> Box<dyn HopSelector> {
    match config.method {
        HopMethod::LandauZener => Box::new(LandauZener::new()),
        HopMethod::Tully => Box::new(FewestSwitches::new(config.substeps)),
    }
}
