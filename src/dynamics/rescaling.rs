use crate::error::{DynamicsError, Result};
use crate::initialization::Simulation;
use log::debug;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

const DENOMINATOR_FLOOR: f64 = 1.0e-12;

/// Direction along which the velocities are rescaled after an accepted hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescaleDirection {
    Momentum,
    CouplingDirection,
}

/// What happens to the velocities when a hop is frustrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrustratedPolicy {
    Keep,
    Reflect,
}

/// Outcome of the rescaling step: either the velocities that conserve total
/// energy on the new surface, or a frustrated hop with optionally reflected
/// velocities. The active state never changes on a frustrated hop.
pub enum RescaleOutcome {
    Accepted(Array1<f64>),
    Frustrated(Option<Array1<f64>>),
}

impl Simulation {
    /// Rescale the velocities for a hop from `old_state` to `new_state` so
    /// that kinetic plus potential energy is conserved across the switch.
    pub fn rescale_for_hop(&self, old_state: usize, new_state: usize) -> Result<RescaleOutcome> {
        match self.config.hopping.velocity_rescale {
            RescaleDirection::Momentum => Ok(self.uniformly_rescaled_velocities(old_state, new_state)),
            RescaleDirection::CouplingDirection => {
                self.rescaled_along_coupling(old_state, new_state)
            }
        }
    }

    /// Uniform rescaling along the momentum direction. An up-hop whose energy
    /// cost exceeds the available kinetic energy is frustrated.
    fn uniformly_rescaled_velocities(&self, old_state: usize, new_state: usize) -> RescaleOutcome {
        let energy_gap: f64 = self.energies[new_state] - self.energies[old_state];
        if energy_gap > self.kinetic_energy || self.kinetic_energy < DENOMINATOR_FLOOR {
            return RescaleOutcome::Frustrated(self.frustrated_velocities_momentum());
        }
        let vel_scale: f64 = ((self.kinetic_energy - energy_gap) / self.kinetic_energy).sqrt();
        RescaleOutcome::Accepted(vel_scale * &self.velocities)
    }

    /// Rescaling along the nonadiabatic coupling vector of the state pair,
    /// solving the quadratic `a gamma^2 - b gamma - dE = 0` in the scaling
    /// factor. A negative discriminant means no energetically allowed hop
    /// exists.
    fn rescaled_along_coupling(&self, old_state: usize, new_state: usize) -> Result<RescaleOutcome> {
        let couplings = self.couplings.as_ref().ok_or_else(|| {
            DynamicsError::Configuration(
                "coupling-direction rescaling requested but no couplings were computed".to_string(),
            )
        })?;
        let key: (usize, usize) = if old_state < new_state {
            (old_state, new_state)
        } else {
            (new_state, old_state)
        };
        let direction: &Array1<f64> = couplings.get(&key).ok_or_else(|| {
            DynamicsError::Evaluation(format!(
                "no coupling vector available for state pair ({}, {})",
                key.0, key.1
            ))
        })?;

        let a: f64 = 0.5 * (&direction.mapv(|val| val.powi(2)) / &self.masses).sum();
        if a.abs() < DENOMINATOR_FLOOR {
            debug!("vanishing coupling direction, hop treated as frustrated");
            return Ok(RescaleOutcome::Frustrated(None));
        }
        let b: f64 = self.velocities.dot(direction);
        let delta_e: f64 = self.energies[old_state] - self.energies[new_state];
        let discriminant: f64 = b.powi(2) + 4.0 * a * delta_e;

        if discriminant < 0.0 {
            let reflected: Option<Array1<f64>> = match self.config.hopping.frustrated {
                FrustratedPolicy::Keep => None,
                FrustratedPolicy::Reflect => {
                    // full reversal of the velocity component along the
                    // coupling direction
                    let gamma: f64 = b / a;
                    Some(&self.velocities - &(gamma * direction / &self.masses))
                }
            };
            return Ok(RescaleOutcome::Frustrated(reflected));
        }

        let gamma: f64 = if b < 0.0 {
            (b + discriminant.sqrt()) / (2.0 * a)
        } else {
            (b - discriminant.sqrt()) / (2.0 * a)
        };
        Ok(RescaleOutcome::Accepted(
            &self.velocities - &(gamma * direction / &self.masses),
        ))
    }

    fn frustrated_velocities_momentum(&self) -> Option<Array1<f64>> {
        match self.config.hopping.frustrated {
            FrustratedPolicy::Keep => None,
            // reflecting along the momentum direction reverses the velocities
            FrustratedPolicy::Reflect => Some(-1.0 * &self.velocities),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initialization::io::DynamicConfiguration;
    use crate::initialization::SystemData;
    use crate::interface::InitialCondition;
    use approx::assert_abs_diff_eq;
    use hashbrown::HashMap;

    fn two_state_simulation(config_input: &str) -> Simulation {
        let system: SystemData = SystemData::new(array![1.0], array![0.0]).unwrap();
        let config: DynamicConfiguration =
            DynamicConfiguration::from_toml_str(config_input).unwrap();
        let condition: InitialCondition = InitialCondition {
            coordinates: array![0.0],
            velocities: array![1.0],
            active_state: 0,
        };
        let mut simulation: Simulation = Simulation::new(&system, condition, config).unwrap();
        simulation.energies = array![0.0, 0.1];
        simulation.kinetic_energy = simulation.get_kinetic_energy();
        simulation
    }

    #[test]
    fn uniform_down_hop_conserves_total_energy() {
        let mut simulation: Simulation = two_state_simulation(
            "nstates = 2\n[cache]\nenabled = false\n",
        );
        simulation.state = 1;
        let total_before: f64 = simulation.kinetic_energy + simulation.energies[1];
        match simulation.rescale_for_hop(1, 0).unwrap() {
            RescaleOutcome::Accepted(velocities) => {
                let kinetic_after: f64 = 0.5 * velocities[0].powi(2);
                assert_abs_diff_eq!(
                    kinetic_after + simulation.energies[0],
                    total_before,
                    epsilon = 1e-12
                );
            }
            RescaleOutcome::Frustrated(_) => panic!("down hops are never frustrated"),
        }
    }

    #[test]
    fn uniform_up_hop_beyond_kinetic_energy_is_frustrated() {
        let mut simulation: Simulation = two_state_simulation(
            "nstates = 2\n[cache]\nenabled = false\n",
        );
        simulation.energies = array![0.0, 5.0];
        match simulation.rescale_for_hop(0, 1).unwrap() {
            RescaleOutcome::Frustrated(velocities) => assert!(velocities.is_none()),
            RescaleOutcome::Accepted(_) => panic!("the energy gap exceeds the kinetic energy"),
        }
    }

    #[test]
    fn frustrated_reflection_reverses_the_momentum() {
        let mut simulation: Simulation = two_state_simulation(
            "nstates = 2\n[hopping]\nfrustrated = \"reflect\"\n[cache]\nenabled = false\n",
        );
        simulation.energies = array![0.0, 5.0];
        match simulation.rescale_for_hop(0, 1).unwrap() {
            RescaleOutcome::Frustrated(velocities) => {
                assert_eq!(velocities.unwrap()[0], -1.0);
            }
            RescaleOutcome::Accepted(_) => panic!("the energy gap exceeds the kinetic energy"),
        }
    }

    #[test]
    fn coupling_direction_rescaling_conserves_total_energy() {
        let mut simulation: Simulation = two_state_simulation(
            "nstates = 2\n[hopping]\nmethod = \"tully\"\nvelocity_rescale = \"coupling_direction\"\n[cache]\nenabled = false\n",
        );
        let mut couplings: HashMap<(usize, usize), Array1<f64>> = HashMap::new();
        couplings.insert((0, 1), array![1.0]);
        simulation.couplings = Some(couplings);
        simulation.state = 1;
        simulation.energies = array![0.0, 0.1];
        let total_before: f64 = simulation.kinetic_energy + simulation.energies[1];
        match simulation.rescale_for_hop(1, 0).unwrap() {
            RescaleOutcome::Accepted(velocities) => {
                let kinetic_after: f64 = 0.5 * velocities[0].powi(2);
                assert_abs_diff_eq!(
                    kinetic_after + simulation.energies[0],
                    total_before,
                    epsilon = 1e-12
                );
            }
            RescaleOutcome::Frustrated(_) => panic!("down hops along a coupling never frustrate"),
        }
    }

    #[test]
    fn negative_discriminant_frustrates_the_coupling_hop() {
        let mut simulation: Simulation = two_state_simulation(
            "nstates = 2\n[hopping]\nmethod = \"tully\"\nvelocity_rescale = \"coupling_direction\"\n[cache]\nenabled = false\n",
        );
        let mut couplings: HashMap<(usize, usize), Array1<f64>> = HashMap::new();
        couplings.insert((0, 1), array![1.0]);
        simulation.couplings = Some(couplings);
        simulation.energies = array![0.0, 5.0];
        match simulation.rescale_for_hop(0, 1).unwrap() {
            RescaleOutcome::Frustrated(velocities) => assert!(velocities.is_none()),
            RescaleOutcome::Accepted(_) => panic!("the discriminant is negative"),
        }
    }
}
