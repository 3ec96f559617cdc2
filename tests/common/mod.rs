#![allow(dead_code)]

use ndarray::prelude::*;
use surfhop::error::Result;
use surfhop::interface::{PropertyRequest, PropertyResult, SurfaceEvaluator};

/// Analytic one-dimensional harmonic surfaces,
/// `E_s(x) = 0.5 k (x - x_s)^2 + e_s`. Counts its invocations so cache tests
/// can observe which requests reached the exact evaluator.
pub struct HarmonicEvaluator {
    pub force_constant: f64,
    pub centers: Vec<f64>,
    pub offsets: Vec<f64>,
    pub calls: usize,
}

impl HarmonicEvaluator {
    pub fn single_state() -> Self {
        HarmonicEvaluator {
            force_constant: 1.0,
            centers: vec![0.0],
            offsets: vec![0.0],
            calls: 0,
        }
    }

    pub fn two_states(gap: f64) -> Self {
        HarmonicEvaluator {
            force_constant: 1.0,
            centers: vec![0.0, 0.0],
            offsets: vec![0.0, gap],
            calls: 0,
        }
    }
}

impl SurfaceEvaluator for HarmonicEvaluator {
    fn evaluate(&mut self, request: &PropertyRequest) -> Result<PropertyResult> {
        self.calls += 1;
        let x: f64 = request.geometry[0];
        let nstates: usize = self.centers.len();
        let energies: Array1<f64> = (0..nstates)
            .map(|state| {
                0.5 * self.force_constant * (x - self.centers[state]).powi(2)
                    + self.offsets[state]
            })
            .collect();
        let mut result: PropertyResult = PropertyResult::new(energies);
        for state in 0..nstates {
            result.gradients.insert(
                state,
                array![self.force_constant * (x - self.centers[state])],
            );
        }
        Ok(result)
    }
}

/// Two states crossing at `center`: a flat lower surface and an upper surface
/// `E_1(x) = min_gap + alpha (x - center)^2`, so a trajectory moving freely on
/// the lower state samples an exactly quadratic gap in time.
pub struct CrossingEvaluator {
    pub alpha: f64,
    pub min_gap: f64,
    pub center: f64,
    pub calls: usize,
}

impl SurfaceEvaluator for CrossingEvaluator {
    fn evaluate(&mut self, request: &PropertyRequest) -> Result<PropertyResult> {
        self.calls += 1;
        let x: f64 = request.geometry[0];
        let energies: Array1<f64> =
            array![0.0, self.min_gap + self.alpha * (x - self.center).powi(2)];
        let mut result: PropertyResult = PropertyResult::new(energies);
        result.gradients.insert(0, array![0.0]);
        result
            .gradients
            .insert(1, array![2.0 * self.alpha * (x - self.center)]);
        Ok(result)
    }
}
