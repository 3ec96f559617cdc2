use crate::dynamics::hopping::{HopContext, HopDecision, HopOutcome, HopSelector};
use log::debug;
use std::f64::consts::PI;

const CURVATURE_FLOOR: f64 = 1.0e-12;

/// Landau-Zener hop selection on the adiabatic energy-gap history. A state is
/// a candidate when the gap to it passed through a local minimum one step
/// ago; the transition probability follows from the gap at the minimum and
/// its curvature in time.
pub struct LandauZener;

impl LandauZener {
    pub fn new() -> Self {
        LandauZener
    }
}

impl Default for LandauZener {
    fn default() -> Self {
        Self::new()
    }
}

impl HopSelector for LandauZener {
    fn name(&self) -> &'static str {
        "landau_zener"
    }

    fn required_history(&self) -> usize {
        3
    }

    fn needs_couplings(&self) -> bool {
        false
    }

    fn is_probabilistic(&self) -> bool {
        false
    }

    fn select_hop(&mut self, context: &HopContext) -> HopOutcome {
        let (energies_last, energies_last2) =
            match (context.energies_last, context.energies_last2) {
                (Some(last), Some(last2)) => (last, last2),
                _ => return HopOutcome::none(),
            };

        let active: usize = context.active_state;
        let dt: f64 = context.stepsize;
        let mut best: Option<HopDecision> = None;

        for state in 0..context.energies.len() {
            if state == active {
                continue;
            }
            let gap_now: f64 = (context.energies[state] - context.energies[active]).abs();
            let gap_prev: f64 = (energies_last[state] - energies_last[active]).abs();
            let gap_prev2: f64 = (energies_last2[state] - energies_last2[active]).abs();

            // the gap must have passed through a local minimum one step ago,
            // i.e. the trajectory approached a crossing and is receding again
            if !(gap_now > gap_prev && gap_prev2 > gap_prev) {
                continue;
            }

            // three-point central finite difference of the gap in time
            let curvature: f64 = (gap_now - 2.0 * gap_prev + gap_prev2) / dt.powi(2);
            if curvature.abs() < CURVATURE_FLOOR {
                debug!(
                    "vanishing gap curvature between states {} and {}, no candidate",
                    active, state
                );
                continue;
            }

            let probability: f64 = (-PI / 2.0 * (gap_prev.powi(3) / curvature.abs()).sqrt()).exp();
            match best {
                Some(decision) if decision.probability >= probability => {}
                _ => {
                    best = Some(HopDecision {
                        target_state: state,
                        probability,
                    })
                }
            }
        }

        let hop: Option<HopDecision> = best.filter(|decision| {
            debug!(
                "landau-zener candidate {} with probability {:.6e}",
                decision.target_state, decision.probability
            );
            context.random_draw < decision.probability
        });
        HopOutcome {
            hop,
            coefficients: None,
        }
    }
}
