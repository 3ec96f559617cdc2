use crate::cache::models::{DistanceNorm, SurfaceModel};
use crate::cache::sample::{DatasetLayout, SampleSet};
use crate::defaults;
use crate::error::{DynamicsError, Result};
use crate::interface::PropertyResult;
use ndarray::prelude::*;

/// Inverse-distance (Shepard) weighting over the stored samples,
/// `w_i = 1 / d_i^p`. A query that lands on a stored sample returns that
/// sample exactly; the weights would diverge there.
pub struct ShepardModel {
    power: f64,
    norm: DistanceNorm,
    layout: DatasetLayout,
    descriptors: Array2<f64>,
    outputs: Array2<f64>,
    trained: bool,
}

impl ShepardModel {
    pub fn new(power: f64, norm: DistanceNorm, layout: DatasetLayout) -> Self {
        ShepardModel {
            power,
            norm,
            layout,
            descriptors: Array2::zeros((0, 0)),
            outputs: Array2::zeros((0, 0)),
            trained: false,
        }
    }
}

impl SurfaceModel for ShepardModel {
    fn name(&self) -> &'static str {
        "shepard"
    }

    fn retrain(&mut self, samples: &SampleSet) -> Result<()> {
        if samples.is_empty() {
            return Err(DynamicsError::Evaluation(
                "cannot weight an empty sample set".to_string(),
            ));
        }
        self.descriptors = samples.descriptor_matrix();
        self.outputs = samples.output_matrix()?;
        self.trained = true;
        Ok(())
    }

    fn predict(&self, descriptor: ArrayView1<f64>) -> Result<PropertyResult> {
        if !self.trained {
            return Err(DynamicsError::Evaluation(
                "inverse-distance model queried before any retraining".to_string(),
            ));
        }
        let n: usize = self.descriptors.dim().0;
        let mut weights: Array1<f64> = Array1::zeros(n);
        for index in 0..n {
            let distance: f64 = self
                .norm
                .distance(descriptor, self.descriptors.slice(s![index, ..]));
            if distance < defaults::DEGENERATE_DISTANCE {
                return Ok(self.layout.unpack(self.outputs.slice(s![index, ..])));
            }
            weights[index] = distance.powf(-self.power);
        }
        let total: f64 = weights.sum();
        let row: Array1<f64> = weights.dot(&self.outputs) / total;
        Ok(self.layout.unpack(row.view()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::sample::{DatasetMetadata, Sample};
    use approx::assert_abs_diff_eq;

    fn stored_set() -> (DatasetLayout, SampleSet) {
        let layout: DatasetLayout = DatasetLayout {
            n_coords: 1,
            n_states: 1,
            store_gradients: false,
            store_couplings: false,
        };
        let metadata: DatasetMetadata = DatasetMetadata {
            reference_geometry: array![0.0],
            masses: array![1.0],
        };
        let mut set: SampleSet = SampleSet::new(layout, metadata);
        for x in [0.0_f64, 1.0] {
            let geometry: Array1<f64> = array![x];
            set.append(Sample {
                descriptor: geometry.clone(),
                geometry,
                result: PropertyResult::new(array![x]),
            });
        }
        (layout, set)
    }

    #[test]
    fn degenerate_distance_returns_the_sample_itself() {
        let (layout, set) = stored_set();
        let mut model: ShepardModel = ShepardModel::new(2.0, DistanceNorm::L2, layout);
        model.retrain(&set).unwrap();
        let result: PropertyResult = model.predict(array![1.0].view()).unwrap();
        assert_eq!(result.energies[0], 1.0);
    }

    #[test]
    fn midpoint_is_the_symmetric_blend() {
        let (layout, set) = stored_set();
        let mut model: ShepardModel = ShepardModel::new(2.0, DistanceNorm::L2, layout);
        model.retrain(&set).unwrap();
        let result: PropertyResult = model.predict(array![0.5].view()).unwrap();
        assert_abs_diff_eq!(result.energies[0], 0.5, epsilon = 1e-12);
    }
}
