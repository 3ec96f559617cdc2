use crate::initialization::Simulation;
use crate::output::StepRecord;
use log::{debug, info};

impl Simulation {
    /// Log the state of one completed step according to the print settings.
    pub fn log_step(&self, record: &StepRecord) {
        if self.config.print.print_trajectory {
            info!(
                "step {:6}  t = {:10.4}  state {}  epot = {:14.8}  ekin = {:12.8}  etot = {:14.8}",
                record.step,
                record.time,
                record.active_state,
                record.potential_energy,
                record.kinetic_energy,
                record.total_energy
            );
        }
        if self.config.print.print_hopping {
            let populations: Vec<f64> = self
                .coefficients
                .iter()
                .map(|val| val.norm_sqr())
                .collect();
            debug!("state populations: {:?}", populations);
        }
    }
}
