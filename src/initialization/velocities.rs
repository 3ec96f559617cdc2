use crate::constants;
use crate::error::{DynamicsError, Result};
use crate::initialization::SystemData;
use crate::interface::{InitialCondition, InitialConditionSource};
use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Draw velocities from the Boltzmann distribution at the given temperature,
/// one normal deviate of width `sqrt(kT/m)` per coordinate.
pub fn initialize_velocities(
    system: &SystemData,
    temperature: f64,
    rng: &mut StdRng,
) -> Array1<f64> {
    let mut velocities: Array1<f64> = Array1::zeros(system.n_coords);
    for index in 0..system.n_coords {
        let sigma: f64 = (constants::K_BOLTZMANN * temperature / system.masses[index]).sqrt();
        let normal = Normal::new(0.0, sigma).unwrap();
        velocities[index] = normal.sample(rng);
    }
    velocities
}

/// Initial-condition source shipped with the crate: the reference geometry at
/// rest for index 0, Boltzmann-sampled velocities at the reference geometry
/// for every other index. Sampling is seeded per index, so conditions are
/// reproducible and independent of the order they are requested in.
pub struct BoltzmannSource {
    system: SystemData,
    temperature: f64,
    seed: u64,
    active_state: usize,
}

impl BoltzmannSource {
    pub fn new(system: SystemData, temperature: f64, seed: u64, active_state: usize) -> Self {
        BoltzmannSource {
            system,
            temperature,
            seed,
            active_state,
        }
    }
}

impl InitialConditionSource for BoltzmannSource {
    fn get_condition(&mut self, index: usize) -> Result<InitialCondition> {
        if self.temperature < 0.0 {
            return Err(DynamicsError::Configuration(format!(
                "negative sampling temperature {}",
                self.temperature
            )));
        }
        let velocities: Array1<f64> = if index == 0 {
            // index 0 is the equilibrium/reference geometry at rest
            Array1::zeros(self.system.n_coords)
        } else {
            let mut rng: StdRng = StdRng::seed_from_u64(self.seed.wrapping_add(index as u64));
            initialize_velocities(&self.system, self.temperature, &mut rng)
        };
        Ok(InitialCondition {
            coordinates: self.system.reference_geometry.clone(),
            velocities,
            active_state: self.active_state,
        })
    }
}
