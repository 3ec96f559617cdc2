use crate::initialization::Simulation;
use log::debug;
use ndarray::prelude::*;
use ndarray_linalg::c64;
use serde::{Deserialize, Serialize};

const ENERGY_FLOOR: f64 = 1.0e-12;

/// Decoherence correction applied to the electronic amplitudes of the
/// probabilistic hop-selection algorithms, counteracting the unphysical
/// persistence of coherence between wavepackets on different surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoherencePolicy {
    None,
    Instantaneous,
    EnergyBased,
}

impl Simulation {
    /// Apply the configured decoherence policy after the hop selection of one
    /// step. `hop_attempted` covers accepted and frustrated hops alike.
    pub fn apply_decoherence(&mut self, hop_attempted: bool) {
        match self.config.hopping.decoherence {
            DecoherencePolicy::None => {}
            DecoherencePolicy::Instantaneous => {
                if hop_attempted {
                    self.coefficients = self.collapsed_coefficients();
                }
            }
            DecoherencePolicy::EnergyBased => {
                if let Some(coefficients) = self.energy_based_decoherence() {
                    self.coefficients = coefficients;
                }
            }
        }
    }

    /// Collapse the amplitudes onto the active state.
    pub fn collapsed_coefficients(&self) -> Array1<c64> {
        let mut coefficients: Array1<c64> = Array1::zeros(self.config.nstates);
        coefficients[self.state] = c64::from(1.0);
        coefficients
    }

    /// Exponential damping of the inactive-state amplitudes with a decay
    /// depending on the energy gap to the active state and the kinetic
    /// energy; the active amplitude is renormalized so the total population
    /// stays one. Degenerate gaps and vanishing kinetic energy leave the
    /// corresponding amplitudes untouched.
    pub fn energy_based_decoherence(&self) -> Option<Array1<c64>> {
        if self.kinetic_energy < ENERGY_FLOOR {
            debug!("kinetic energy too small for the energy-based decoherence correction");
            return None;
        }
        let constant: f64 = self.config.hopping.decoherence_constant;
        let mut inactive_population: f64 = 0.0;
        let mut new_coefficients: Array1<c64> = self.coefficients.clone();
        for state in 0..self.config.nstates {
            if state == self.state {
                continue;
            }
            let gap: f64 = (self.energies[state] - self.energies[self.state]).abs();
            if gap < ENERGY_FLOOR {
                inactive_population += new_coefficients[state].norm_sqr();
                continue;
            }
            let damping: f64 =
                (-0.5 * self.stepsize * (1.0 + constant / self.kinetic_energy) / gap).exp();
            new_coefficients[state] *= c64::from(damping);
            inactive_population += new_coefficients[state].norm_sqr();
        }
        let active_population: f64 = new_coefficients[self.state].norm_sqr();
        if active_population < ENERGY_FLOOR {
            debug!("active-state amplitude too small to renormalize after damping");
            return None;
        }
        new_coefficients[self.state] *=
            c64::from(((1.0 - inactive_population) / active_population).sqrt());
        Some(new_coefficients)
    }
}
