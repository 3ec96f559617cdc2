use crate::constants;
use crate::defaults;
use crate::dynamics::hopping::HopContext;
use crate::dynamics::rescaling::RescaleOutcome;
use crate::error::{DynamicsError, Result};
use crate::initialization::restart::read_restart_point;
use crate::initialization::{Phase, Simulation};
use crate::interface::{Property, PropertyRequest, PropertyResult, SurfaceEvaluator};
use crate::output::{StepRecord, TrajectoryRecorder};
use log::{debug, info, warn};
use ndarray::prelude::*;

impl Simulation {
    /// Velocity-verlet dynamics of the trajectory: initialize (or resume)
    /// and advance until the configured number of steps is reached.
    pub fn run(
        &mut self,
        evaluator: &mut dyn SurfaceEvaluator,
        recorder: &mut dyn TrajectoryRecorder,
    ) -> Result<()> {
        self.initialize(evaluator, recorder)?;
        while !self.is_finished() {
            self.advance_step(evaluator, recorder)?;
        }
        Ok(())
    }

    /// Prepare the trajectory: resume from the recorded tail when configured
    /// and possible, otherwise evaluate the surface at the initial geometry
    /// and record step zero.
    pub fn initialize(
        &mut self,
        evaluator: &mut dyn SurfaceEvaluator,
        recorder: &mut dyn TrajectoryRecorder,
    ) -> Result<()> {
        if self.config.restart {
            match self.try_resume(evaluator, recorder) {
                Ok(()) => return Ok(()),
                Err(DynamicsError::Restart(reason)) => {
                    warn!(
                        "discarding the partial record, restarting from t = 0: {}",
                        reason
                    );
                    recorder.truncate()?;
                }
                Err(other) => return Err(other),
            }
        }

        let result: PropertyResult = self.fetch_surface(evaluator)?;
        self.energies = result.energies.clone();
        self.store_couplings(&result);
        self.accelerations =
            self.accelerations_from_gradient(result.gradient_of(self.state)?)?;
        self.kinetic_energy = self.get_kinetic_energy();
        self.step = 0;
        self.actual_time = 0.0;
        self.phase = Phase::Warmup(0);

        let record: StepRecord = self.step_record();
        recorder.append(&record)?;
        self.log_step(&record);
        Ok(())
    }

    /// One step of the velocity-verlet dynamics: position update, surface
    /// evaluation through the cache, velocity update, hop selection with
    /// rescaling and decoherence, and one appended record.
    pub fn advance_step(
        &mut self,
        evaluator: &mut dyn SurfaceEvaluator,
        recorder: &mut dyn TrajectoryRecorder,
    ) -> Result<()> {
        match self.phase {
            Phase::Uninitialized => {
                return Err(DynamicsError::Configuration(
                    "advance_step called before initialize".to_string(),
                ))
            }
            Phase::Terminated => return Ok(()),
            _ => {}
        }

        // position update
        self.coordinates = self.get_coord_verlet();

        // surface properties at the new geometry
        let result: PropertyResult = self.fetch_surface(evaluator)?;

        // shift the energy history: two-back <- previous <- current <- new
        self.energies_last2 = self.energies_last.take();
        self.energies_last = Some(std::mem::replace(
            &mut self.energies,
            result.energies.clone(),
        ));
        self.store_couplings(&result);

        // acceleration and velocity updates
        let new_accelerations: Array1<f64> =
            self.accelerations_from_gradient(result.gradient_of(self.state)?)?;
        let old_accelerations: Array1<f64> =
            std::mem::replace(&mut self.accelerations, new_accelerations);
        self.velocities = self.get_velocities_verlet(old_accelerations.view());
        self.kinetic_energy = self.get_kinetic_energy();
        self.update_coupling_action();

        let next_step: usize = self.step + 1;
        if self.config.hopping.use_surface_hopping && self.phase == Phase::Running {
            self.surface_hopping_step(next_step, evaluator)?;
        }

        self.step = next_step;
        self.actual_time += self.stepsize;
        let record: StepRecord = self.step_record();
        recorder.append(&record)?;
        self.log_step(&record);

        self.phase = match self.phase {
            Phase::Warmup(count) if count + 1 >= defaults::WARMUP_STEPS => Phase::Running,
            Phase::Warmup(count) => Phase::Warmup(count + 1),
            other => other,
        };
        if self.step >= self.config.nstep {
            self.phase = Phase::Terminated;
        }
        Ok(())
    }

    /// Hop selection, velocity rescaling and decoherence of one step. At most
    /// one hop per step.
    fn surface_hopping_step(
        &mut self,
        step_index: usize,
        evaluator: &mut dyn SurfaceEvaluator,
    ) -> Result<()> {
        let random_draw: f64 = self.step_random(step_index);
        let outcome = self.hop_selector.select_hop(&HopContext {
            active_state: self.state,
            energies: self.energies.view(),
            energies_last: self.energies_last.as_ref().map(|energies| energies.view()),
            energies_last2: self.energies_last2.as_ref().map(|energies| energies.view()),
            coupling_action: self.coupling_action.as_ref().map(|action| action.view()),
            coefficients: self.coefficients.view(),
            stepsize: self.stepsize,
            random_draw,
        });
        if let Some(coefficients) = outcome.coefficients {
            self.coefficients = coefficients;
        }

        let mut hop_attempted: bool = false;
        if let Some(decision) = outcome.hop {
            hop_attempted = true;
            let old_state: usize = self.state;
            match self.rescale_for_hop(old_state, decision.target_state)? {
                RescaleOutcome::Accepted(velocities) => {
                    self.velocities = velocities;
                    self.state = decision.target_state;
                    self.kinetic_energy = self.get_kinetic_energy();
                    info!(
                        "surface hop {} -> {}, the pot. diff is {:.5} eV",
                        old_state,
                        self.state,
                        (self.energies[old_state] - self.energies[self.state])
                            * constants::HARTREE_TO_EV
                    );
                    // the nuclear motion continues on the new surface
                    self.refresh_active_gradient(evaluator)?;
                }
                RescaleOutcome::Frustrated(reflected) => {
                    info!("frustrated hop towards state {}", decision.target_state);
                    if let Some(velocities) = reflected {
                        self.velocities = velocities;
                        self.kinetic_energy = self.get_kinetic_energy();
                    }
                }
            }
        }

        if self.hop_selector.is_probabilistic() {
            self.apply_decoherence(hop_attempted);
        }
        Ok(())
    }

    /// Resume the trajectory purely from the recorded tail.
    fn try_resume(
        &mut self,
        evaluator: &mut dyn SurfaceEvaluator,
        recorder: &mut dyn TrajectoryRecorder,
    ) -> Result<()> {
        let point = read_restart_point(recorder)?;
        if point.coordinates.len() != self.n_coords {
            return Err(DynamicsError::Restart(format!(
                "recorded geometry of length {} does not match the {} system coordinates",
                point.coordinates.len(),
                self.n_coords
            )));
        }
        if point
            .energy_history
            .iter()
            .any(|energies| energies.len() != self.config.nstates)
        {
            return Err(DynamicsError::Restart(
                "recorded energy vectors do not match the configured state count".to_string(),
            ));
        }
        if point.active_state >= self.config.nstates {
            return Err(DynamicsError::Restart(format!(
                "recorded active state {} does not index one of the {} states",
                point.active_state, self.config.nstates
            )));
        }

        self.coordinates = point.coordinates;
        self.velocities = point.velocities;
        self.state = point.active_state;
        let mut history: Vec<Array1<f64>> = point.energy_history;
        self.energies = history.pop().ok_or_else(|| {
            DynamicsError::Restart("empty energy history in the record tail".to_string())
        })?;
        self.energies_last = history.pop();
        self.energies_last2 = history.pop();
        self.coefficients = match point.coefficients {
            Some(coefficients) if coefficients.len() == self.config.nstates => coefficients,
            _ => self.collapsed_coefficients(),
        };
        self.step = point.step;
        self.actual_time = point.time;

        // gradient and couplings at the restored geometry
        let result: PropertyResult = self.fetch_surface(evaluator)?;
        self.accelerations =
            self.accelerations_from_gradient(result.gradient_of(self.state)?)?;
        self.store_couplings(&result);
        self.kinetic_energy = self.get_kinetic_energy();
        self.phase = if self.step >= self.config.nstep {
            Phase::Terminated
        } else {
            Phase::Running
        };
        info!(
            "resumed trajectory at step {} (t = {:.4})",
            self.step, self.actual_time
        );
        Ok(())
    }

    /// Surface properties at the current geometry, served by the cache when
    /// one is configured.
    fn fetch_surface(&mut self, evaluator: &mut dyn SurfaceEvaluator) -> Result<PropertyResult> {
        let request: PropertyRequest = self.surface_request();
        let result: PropertyResult = match self.cache {
            Some(ref mut cache) => {
                let (result, trust) = cache.get(&request, evaluator)?;
                debug!(
                    "surface request served, nearest sample at {:.4e}, trusted: {}",
                    trust.distance_to_nearest_sample, trust.is_trustworthy
                );
                result
            }
            None => evaluator.evaluate(&request)?,
        };
        if result.energies.len() != self.config.nstates {
            return Err(DynamicsError::Evaluation(format!(
                "evaluator returned {} energies for {} configured states",
                result.energies.len(),
                self.config.nstates
            )));
        }
        Ok(result)
    }

    fn surface_request(&self) -> PropertyRequest {
        let mut properties: Vec<Property> = vec![Property::Energy, Property::Gradient];
        if self.config.hopping.use_surface_hopping && self.hop_selector.needs_couplings() {
            properties.push(Property::Coupling);
        }
        PropertyRequest::new(self.coordinates.clone(), properties, vec![self.state])
    }

    fn store_couplings(&mut self, result: &PropertyResult) {
        self.couplings = result.couplings.clone();
    }

    /// `vk[i, j] = velocity · coupling_vector[i, j]`, antisymmetric.
    fn update_coupling_action(&mut self) {
        let nstates: usize = self.config.nstates;
        self.coupling_action = self.couplings.as_ref().map(|couplings| {
            let mut action: Array2<f64> = Array2::zeros((nstates, nstates));
            for ((i, j), vector) in couplings.iter() {
                let value: f64 = self.velocities.dot(vector);
                action[[*i, *j]] = value;
                action[[*j, *i]] = -value;
            }
            action
        });
    }

    /// Re-fetch the gradient of the (new) active state after an accepted hop.
    /// The cache serves this from the sample appended moments earlier.
    fn refresh_active_gradient(&mut self, evaluator: &mut dyn SurfaceEvaluator) -> Result<()> {
        let result: PropertyResult = self.fetch_surface(evaluator)?;
        self.accelerations =
            self.accelerations_from_gradient(result.gradient_of(self.state)?)?;
        Ok(())
    }

    fn step_record(&self) -> StepRecord {
        let record: StepRecord = StepRecord {
            step: self.step,
            time: self.actual_time,
            coordinates: self.coordinates.clone(),
            velocities: self.velocities.clone(),
            active_state: self.state,
            energies: self.energies.clone(),
            kinetic_energy: self.kinetic_energy,
            potential_energy: self.potential_energy(),
            total_energy: self.total_energy(),
            coefficients_real: None,
            coefficients_imag: None,
        };
        if self.hop_selector.is_probabilistic() {
            record.with_coefficients(self.coefficients.view())
        } else {
            record
        }
    }
}
