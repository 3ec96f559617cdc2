use crate::cache::sample::SampleSet;
use crate::error::Result;
use crate::interface::PropertyResult;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

pub mod nearest;
pub mod polynomial;
pub mod rbf;
pub mod shepard;

pub use nearest::NearestNeighborModel;
pub use polynomial::PolynomialModel;
pub use rbf::RbfModel;
pub use shepard::ShepardModel;

/// Distance norm used by the sample index and the distance-based backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceNorm {
    L1,
    L2,
    LInf,
}

impl DistanceNorm {
    pub fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self {
            DistanceNorm::L1 => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).abs())
                .sum::<f64>(),
            DistanceNorm::L2 => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f64>()
                .sqrt(),
            DistanceNorm::LInf => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).abs())
                .fold(0.0, f64::max),
        }
    }
}

/// Fitted-model backend choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Rbf,
    Nearest,
    Shepard,
    Polynomial,
}

/// Capability of every fitted-model backend: batch retraining from the full
/// current sample set and evaluation at a query descriptor. Backends are
/// chosen once at configuration time and dispatched through `Box<dyn
/// SurfaceModel>`.
pub trait SurfaceModel {
    fn name(&self) -> &'static str;

    /// Rebuild the fitted artifact from the current sample set.
    fn retrain(&mut self, samples: &SampleSet) -> Result<()>;

    /// Best estimate of the surface properties at the query descriptor.
    fn predict(&self, descriptor: ArrayView1<f64>) -> Result<PropertyResult>;

    /// Persist the fitted weights so a restarted process can skip retraining.
    /// Backends without a useful weight artifact ignore this.
    fn save_weights(&self, _path: &std::path::Path) -> Result<()> {
        Ok(())
    }

    fn load_weights(&mut self, _path: &std::path::Path) -> Result<()> {
        Ok(())
    }
}

/// Central finite-difference estimate of the per-state gradients of a fitted
/// energy surface. Used by backends whose sample table carries energies only.
pub fn finite_difference_gradients<F>(
    energies_at: F,
    descriptor: ArrayView1<f64>,
    n_states: usize,
    stepsize: f64,
) -> Result<Vec<Array1<f64>>>
where
    F: Fn(ArrayView1<f64>) -> Result<Array1<f64>>,
{
    let n_coords: usize = descriptor.len();
    let mut gradients: Vec<Array1<f64>> = vec![Array1::zeros(n_coords); n_states];
    for index in 0..n_coords {
        let mut plus: Array1<f64> = descriptor.to_owned();
        let mut minus: Array1<f64> = descriptor.to_owned();
        plus[index] += stepsize;
        minus[index] -= stepsize;
        let energies_plus: Array1<f64> = energies_at(plus.view())?;
        let energies_minus: Array1<f64> = energies_at(minus.view())?;
        for state in 0..n_states {
            gradients[state][index] =
                (energies_plus[state] - energies_minus[state]) / (2.0 * stepsize);
        }
    }
    Ok(gradients)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn norms_agree_on_axis_aligned_displacement() {
        let a: Array1<f64> = array![0.0, 0.0];
        let b: Array1<f64> = array![0.0, 2.0];
        assert_eq!(DistanceNorm::L1.distance(a.view(), b.view()), 2.0);
        assert_eq!(DistanceNorm::L2.distance(a.view(), b.view()), 2.0);
        assert_eq!(DistanceNorm::LInf.distance(a.view(), b.view()), 2.0);
    }

    #[test]
    fn norms_differ_on_diagonal_displacement() {
        let a: Array1<f64> = array![0.0, 0.0];
        let b: Array1<f64> = array![1.0, 1.0];
        assert_eq!(DistanceNorm::L1.distance(a.view(), b.view()), 2.0);
        assert!((DistanceNorm::L2.distance(a.view(), b.view()) - 2.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(DistanceNorm::LInf.distance(a.view(), b.view()), 1.0);
    }

    #[test]
    fn finite_differences_recover_quadratic_gradient() {
        let energies = |x: ArrayView1<f64>| -> Result<Array1<f64>> {
            Ok(array![x[0] * x[0] + 3.0 * x[1]])
        };
        let gradients: Vec<Array1<f64>> =
            finite_difference_gradients(energies, array![1.0, 0.5].view(), 1, 1.0e-5).unwrap();
        assert!((gradients[0][0] - 2.0).abs() < 1e-6);
        assert!((gradients[0][1] - 3.0).abs() < 1e-6);
    }
}
