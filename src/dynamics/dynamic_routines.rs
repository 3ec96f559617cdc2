use crate::error::{DynamicsError, Result};
use crate::initialization::Simulation;
use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

impl Simulation {
    // Velocity Verlet routines
    pub fn get_coord_verlet(&self) -> Array1<f64> {
        &self.coordinates
            + &(self.stepsize * &self.velocities
                + 0.5 * self.stepsize.powi(2) * &self.accelerations)
    }

    pub fn get_velocities_verlet(&self, old_accelerations: ArrayView1<f64>) -> Array1<f64> {
        &self.velocities + &(self.stepsize * 0.5 * &(&old_accelerations + &self.accelerations))
    }

    pub fn get_kinetic_energy(&self) -> f64 {
        0.5 * (&self.masses * &self.velocities.mapv(|val| val.powi(2))).sum()
    }

    /// Element-wise `a = -gradient / mass`. A gradient whose shape does not
    /// broadcast over the mass vector is malformed evaluator output.
    pub fn accelerations_from_gradient(&self, gradient: ArrayView1<f64>) -> Result<Array1<f64>> {
        if gradient.len() != self.masses.len() {
            return Err(DynamicsError::Evaluation(format!(
                "gradient of length {} does not broadcast over the {} mass entries",
                gradient.len(),
                self.masses.len()
            )));
        }
        Ok(-1.0 * &gradient / &self.masses)
    }

    /// The uniform draw of one step. Derived from the trajectory seed and the
    /// step index, so a resumed trajectory consumes the identical stream an
    /// uninterrupted run would have seen.
    pub fn step_random(&self, step: usize) -> f64 {
        let seed: u64 = self
            .config
            .seed
            .wrapping_add((step as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        StdRng::seed_from_u64(seed).gen::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initialization::io::DynamicConfiguration;
    use crate::initialization::SystemData;
    use crate::interface::InitialCondition;
    use approx::assert_abs_diff_eq;

    fn free_particle() -> Simulation {
        let system: SystemData = SystemData::new(array![2.0], array![0.0]).unwrap();
        let config: DynamicConfiguration = DynamicConfiguration::from_toml_str(
            "stepsize = 0.5\n[hopping]\nuse_surface_hopping = false\n[cache]\nenabled = false\n",
        )
        .unwrap();
        let condition: InitialCondition = InitialCondition {
            coordinates: array![1.0],
            velocities: array![2.0],
            active_state: 0,
        };
        Simulation::new(&system, condition, config).unwrap()
    }

    #[test]
    fn verlet_position_update_without_forces_is_linear_motion() {
        let simulation: Simulation = free_particle();
        let coords: Array1<f64> = simulation.get_coord_verlet();
        assert_abs_diff_eq!(coords[0], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn kinetic_energy_is_half_m_v_squared() {
        let simulation: Simulation = free_particle();
        assert_abs_diff_eq!(simulation.get_kinetic_energy(), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn gradient_shape_mismatch_is_rejected() {
        let simulation: Simulation = free_particle();
        assert!(simulation
            .accelerations_from_gradient(array![1.0, 2.0].view())
            .is_err());
    }

    #[test]
    fn step_draws_are_deterministic_per_step() {
        let simulation: Simulation = free_particle();
        assert_eq!(simulation.step_random(7), simulation.step_random(7));
        assert_ne!(simulation.step_random(7), simulation.step_random(8));
    }
}
