use crate::dynamics::hopping::{HopContext, HopDecision, HopOutcome, HopSelector};
use crate::dynamics::schroedinger_integration::propagate_amplitudes;
use log::{debug, warn};
use ndarray::prelude::*;
use ndarray_linalg::c64;

const POPULATION_FLOOR: f64 = 1.0e-12;

/// Tully fewest-switches hop selection. The electronic density matrix
/// `rho = c c†` is propagated through the sub-stepped unitary propagator and
/// the switching probabilities out of the active state are compared,
/// cumulatively, against a single uniform draw.
pub struct FewestSwitches {
    substeps: usize,
}

impl FewestSwitches {
    pub fn new(substeps: usize) -> Self {
        FewestSwitches { substeps }
    }
}

impl HopSelector for FewestSwitches {
    fn name(&self) -> &'static str {
        "fewest_switches"
    }

    fn required_history(&self) -> usize {
        1
    }

    fn needs_couplings(&self) -> bool {
        true
    }

    fn is_probabilistic(&self) -> bool {
        true
    }

    fn select_hop(&mut self, context: &HopContext) -> HopOutcome {
        let nstates: usize = context.energies.len();
        let coupling_action: ArrayView2<f64> = match context.coupling_action {
            Some(action) => action,
            None => {
                warn!("fewest switches selected but no couplings were computed this step");
                return HopOutcome::none();
            }
        };

        let coefficients: Array1<c64> = match propagate_amplitudes(
            context.energies,
            coupling_action,
            context.coefficients,
            context.stepsize,
            self.substeps,
        ) {
            Ok(coefficients) => coefficients,
            Err(err) => {
                warn!("electronic propagation failed, skipping hop selection: {}", err);
                return HopOutcome::none();
            }
        };

        let active: usize = context.active_state;
        let population: f64 = coefficients[active].norm_sqr();
        if population < POPULATION_FLOOR {
            // vanishing active population makes the switching formula
            // indeterminate; no candidates this step
            debug!("active-state population below {:e}", POPULATION_FLOOR);
            return HopOutcome {
                hop: None,
                coefficients: Some(coefficients),
            };
        }

        // P_{i->j} = max(0, 2 Im(rho_ij H_ji) dt / Re(rho_ii)) with
        // H_ji = E_j delta_ji - i vk[j, i]
        let mut hop: Option<HopDecision> = None;
        let mut cumulative: f64 = 0.0;
        for state in 0..nstates {
            if state == active {
                continue;
            }
            let rho_ij: c64 = coefficients[active] * coefficients[state].conj();
            let h_ji: c64 = c64::new(0.0, -coupling_action[[state, active]]);
            let probability: f64 =
                (2.0 * (rho_ij * h_ji).im * context.stepsize / population).max(0.0);
            if probability <= 0.0 {
                continue;
            }
            cumulative += probability;
            if context.random_draw < cumulative {
                hop = Some(HopDecision {
                    target_state: state,
                    probability,
                });
                break;
            }
        }

        HopOutcome {
            hop,
            coefficients: Some(coefficients),
        }
    }
}
