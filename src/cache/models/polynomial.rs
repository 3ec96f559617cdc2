use crate::cache::models::{finite_difference_gradients, SurfaceModel};
use crate::cache::sample::{DatasetLayout, SampleSet};
use crate::error::{DynamicsError, Result};
use crate::interface::PropertyResult;
use ndarray::prelude::*;
use ndarray_linalg::LeastSquaresSvd;

/// Low-order polynomial regression over the sample descriptors. Degree 1 or 2;
/// all property columns are solved in one least-squares pass.
pub struct PolynomialModel {
    degree: usize,
    fd_stepsize: f64,
    layout: DatasetLayout,
    coefficients: Array2<f64>,
    descriptor_len: usize,
    trained: bool,
}

impl PolynomialModel {
    pub fn new(degree: usize, fd_stepsize: f64, layout: DatasetLayout) -> Self {
        PolynomialModel {
            degree,
            fd_stepsize,
            layout,
            coefficients: Array2::zeros((0, 0)),
            descriptor_len: 0,
            trained: false,
        }
    }

    fn n_terms(&self, d: usize) -> usize {
        // constant + linear (+ quadratic incl. cross terms)
        let mut n: usize = 1 + d;
        if self.degree >= 2 {
            n += d * (d + 1) / 2;
        }
        n
    }

    fn design_row(&self, descriptor: ArrayView1<f64>) -> Array1<f64> {
        let d: usize = descriptor.len();
        let mut row: Array1<f64> = Array1::zeros(self.n_terms(d));
        row[0] = 1.0;
        for i in 0..d {
            row[1 + i] = descriptor[i];
        }
        if self.degree >= 2 {
            let mut offset: usize = 1 + d;
            for i in 0..d {
                for j in i..d {
                    row[offset] = descriptor[i] * descriptor[j];
                    offset += 1;
                }
            }
        }
        row
    }

    fn predict_row(&self, descriptor: ArrayView1<f64>) -> Result<Array1<f64>> {
        if !self.trained {
            return Err(DynamicsError::Evaluation(
                "polynomial model queried before any retraining".to_string(),
            ));
        }
        let row: Array1<f64> = self.design_row(descriptor);
        Ok(row.dot(&self.coefficients))
    }

    fn predict_energies(&self, descriptor: ArrayView1<f64>) -> Result<Array1<f64>> {
        let row: Array1<f64> = self.predict_row(descriptor)?;
        Ok(row.slice(s![..self.layout.n_states]).to_owned())
    }
}

impl SurfaceModel for PolynomialModel {
    fn name(&self) -> &'static str {
        "polynomial"
    }

    fn retrain(&mut self, samples: &SampleSet) -> Result<()> {
        let descriptors: Array2<f64> = samples.descriptor_matrix();
        let n: usize = descriptors.dim().0;
        let d: usize = descriptors.dim().1;
        let n_terms: usize = self.n_terms(d);
        if n < n_terms {
            return Err(DynamicsError::Evaluation(format!(
                "polynomial fit of degree {} needs at least {} samples, have {}",
                self.degree, n_terms, n
            )));
        }
        let outputs: Array2<f64> = samples.output_matrix()?;
        let mut design: Array2<f64> = Array2::zeros((n, n_terms));
        for index in 0..n {
            design
                .slice_mut(s![index, ..])
                .assign(&self.design_row(descriptors.slice(s![index, ..])));
        }
        let solution = design.least_squares(&outputs)?;
        self.coefficients = solution.solution;
        self.descriptor_len = d;
        self.trained = true;
        Ok(())
    }

    fn predict(&self, descriptor: ArrayView1<f64>) -> Result<PropertyResult> {
        let row: Array1<f64> = self.predict_row(descriptor)?;
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
}
