use crate::defaults;
use crate::error::{DynamicsError, Result};
use crate::output::{StepRecord, TrajectoryRecorder};
use ndarray::prelude::*;
use ndarray_linalg::c64;

/// In-memory state re-derived from the tail of a trajectory record.
pub struct RestartPoint {
    pub step: usize,
    pub time: f64,
    pub coordinates: Array1<f64>,
    pub velocities: Array1<f64>,
    pub active_state: usize,
    /// Up to three energy vectors, oldest first; the last entry belongs to
    /// the restored step.
    pub energy_history: Vec<Array1<f64>>,
    pub coefficients: Option<Array1<c64>>,
}

/// Rebuild the dynamical state from the last recorded steps. A record with
/// fewer steps than the warm-up needs cannot seed the gap-history hop
/// selection and is rejected; the caller discards it and restarts from t = 0.
pub fn read_restart_point(recorder: &dyn TrajectoryRecorder) -> Result<RestartPoint> {
    let present: usize = recorder.n_steps();
    if present < defaults::MIN_RESTART_RECORDS {
        return Err(DynamicsError::Restart(format!(
            "only {} recorded steps, {} required to resume",
            present,
            defaults::MIN_RESTART_RECORDS
        )));
    }
    let tail: Vec<StepRecord> = recorder.tail(defaults::MIN_RESTART_RECORDS)?;
    let last: &StepRecord = tail.last().ok_or_else(|| {
        DynamicsError::Restart("trajectory record reported steps but returned none".to_string())
    })?;

    Ok(RestartPoint {
        step: last.step,
        time: last.time,
        coordinates: last.coordinates.clone(),
        velocities: last.velocities.clone(),
        active_state: last.active_state,
        energy_history: tail.iter().map(|record| record.energies.clone()).collect(),
        coefficients: last.coefficients(),
    })
}
