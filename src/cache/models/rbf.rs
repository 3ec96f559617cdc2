use crate::cache::models::{finite_difference_gradients, SurfaceModel};
use crate::cache::sample::{DatasetLayout, SampleSet};
use crate::error::{DynamicsError, Result};
use crate::interface::PropertyResult;
use ndarray::prelude::*;
use ndarray_linalg::{Factorize, Solve};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Radial-basis-function interpolation over the sample descriptors with a
/// Gaussian kernel. The symmetric kernel matrix is factorized once by LU
/// decomposition and the factorization is reused to solve for the weights of
/// every property column.
pub struct RbfModel {
    epsilon: f64,
    regularization: f64,
    fd_stepsize: f64,
    layout: DatasetLayout,
    centers: Array2<f64>,
    weights: Array2<f64>,
    trained: bool,
}

/// Serialized fitted weights, written to skip retraining across restarts.
#[derive(Serialize, Deserialize)]
struct RbfWeights {
    epsilon: f64,
    centers: Array2<f64>,
    weights: Array2<f64>,
}

impl RbfModel {
    pub fn new(epsilon: f64, regularization: f64, fd_stepsize: f64, layout: DatasetLayout) -> Self {
        RbfModel {
            epsilon,
            regularization,
            fd_stepsize,
            layout,
            centers: Array2::zeros((0, 0)),
            weights: Array2::zeros((0, 0)),
            trained: false,
        }
    }

    fn kernel(&self, distance: f64) -> f64 {
        (-(distance / self.epsilon).powi(2)).exp()
    }

    fn kernel_vector(&self, descriptor: ArrayView1<f64>) -> Array1<f64> {
        let n: usize = self.centers.dim().0;
        let mut k: Array1<f64> = Array1::zeros(n);
        for index in 0..n {
            let diff: Array1<f64> = &descriptor - &self.centers.slice(s![index, ..]);
            let distance: f64 = diff.mapv(|val| val.powi(2)).sum().sqrt();
            k[index] = self.kernel(distance);
        }
        k
    }

    fn check_trained(&self) -> Result<()> {
        if !self.trained {
            return Err(DynamicsError::Evaluation(
                "radial basis model queried before any retraining".to_string(),
            ));
        }
        Ok(())
    }

    fn predict_energies(&self, descriptor: ArrayView1<f64>) -> Result<Array1<f64>> {
        self.check_trained()?;
        let k: Array1<f64> = self.kernel_vector(descriptor);
        let mut energies: Array1<f64> = Array1::zeros(self.layout.n_states);
        for state in 0..self.layout.n_states {
            energies[state] = k.dot(&self.weights.slice(s![.., state]));
        }
        Ok(energies)
    }
}

impl SurfaceModel for RbfModel {
    fn name(&self) -> &'static str {
        "rbf"
    }

    fn retrain(&mut self, samples: &SampleSet) -> Result<()> {
        let n: usize = samples.len();
        if n == 0 {
            return Err(DynamicsError::Evaluation(
                "cannot train a radial basis model on an empty sample set".to_string(),
            ));
        }
        let centers: Array2<f64> = samples.descriptor_matrix();
        let outputs: Array2<f64> = samples.output_matrix()?;

        let mut kernel: Array2<f64> = Array2::zeros((n, n));
        for i in 0..n {
            for j in i..n {
                let diff: Array1<f64> = &centers.slice(s![i, ..]) - &centers.slice(s![j, ..]);
                let distance: f64 = diff.mapv(|val| val.powi(2)).sum().sqrt();
                let value: f64 = self.kernel(distance);
                kernel[[i, j]] = value;
                kernel[[j, i]] = value;
            }
            kernel[[i, i]] += self.regularization;
        }

        // one LU factorization, one triangular solve per property column
        let factorized = kernel.factorize()?;
        let n_outputs: usize = self.layout.n_outputs();
        let mut weights: Array2<f64> = Array2::zeros((n, n_outputs));
        for column in 0..n_outputs {
            let rhs: Array1<f64> = outputs.slice(s![.., column]).to_owned();
            let solution: Array1<f64> = factorized.solve(&rhs)?;
            weights.slice_mut(s![.., column]).assign(&solution);
        }

        self.centers = centers;
        self.weights = weights;
        self.trained = true;
        Ok(())
    }

    fn predict(&self, descriptor: ArrayView1<f64>) -> Result<PropertyResult> {
        self.check_trained()?;
        let k: Array1<f64> = self.kernel_vector(descriptor);
        let row: Array1<f64> = k.dot(&self.weights);
        let mut result: PropertyResult = self.layout.unpack(row.view());
        if !self.layout.store_gradients {
            let gradients: Vec<Array1<f64>> = finite_difference_gradients(
                |query| self.predict_energies(query),
                descriptor,
                self.layout.n_states,
                self.fd_stepsize,
            )?;
            for (state, gradient) in gradients.into_iter().enumerate() {
                result.gradients.insert(state, gradient);
            }
        }
        Ok(result)
    }

    fn save_weights(&self, path: &Path) -> Result<()> {
        self.check_trained()?;
        let artifact: RbfWeights = RbfWeights {
            epsilon: self.epsilon,
            centers: self.centers.clone(),
            weights: self.weights.clone(),
        };
        fs::write(path, serde_json::to_string(&artifact)?)?;
        Ok(())
    }

    fn load_weights(&mut self, path: &Path) -> Result<()> {
        let artifact: RbfWeights = serde_json::from_str(&fs::read_to_string(path)?)?;
        self.epsilon = artifact.epsilon;
        self.centers = artifact.centers;
        self.weights = artifact.weights;
        self.trained = true;
        Ok(())
    }
}
