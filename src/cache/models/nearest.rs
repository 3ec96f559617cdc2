use crate::cache::models::{DistanceNorm, SurfaceModel};
use crate::cache::sample::{DatasetLayout, SampleSet};
use crate::error::{DynamicsError, Result};
use crate::interface::PropertyResult;
use ndarray::prelude::*;
use ndarray_stats::QuantileExt;

/// Nearest-neighbour lookup over the sample descriptors. The stored index is
/// queried with a selectable distance norm; a query that coincides with a
/// stored sample returns that sample's value exactly instead of any blend.
pub struct NearestNeighborModel {
    norm: DistanceNorm,
    layout: DatasetLayout,
    descriptors: Array2<f64>,
    outputs: Array2<f64>,
    trained: bool,
}

impl NearestNeighborModel {
    pub fn new(norm: DistanceNorm, layout: DatasetLayout) -> Self {
        NearestNeighborModel {
            norm,
            layout,
            descriptors: Array2::zeros((0, 0)),
            outputs: Array2::zeros((0, 0)),
            trained: false,
        }
    }

    fn distances(&self, descriptor: ArrayView1<f64>) -> Array1<f64> {
        let n: usize = self.descriptors.dim().0;
        let mut distances: Array1<f64> = Array1::zeros(n);
        for index in 0..n {
            distances[index] = self
                .norm
                .distance(descriptor, self.descriptors.slice(s![index, ..]));
        }
        distances
    }
}

impl SurfaceModel for NearestNeighborModel {
    fn name(&self) -> &'static str {
        "nearest"
    }

    fn retrain(&mut self, samples: &SampleSet) -> Result<()> {
        if samples.is_empty() {
            return Err(DynamicsError::Evaluation(
                "cannot index an empty sample set".to_string(),
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
                "nearest-neighbour model queried before any retraining".to_string(),
            ));
        }
        let distances: Array1<f64> = self.distances(descriptor);
        let nearest: usize = distances
            .argmin()
            .map_err(|err| DynamicsError::Evaluation(err.to_string()))?;
        Ok(self.layout.unpack(self.outputs.slice(s![nearest, ..])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::sample::{DatasetMetadata, Sample};

    fn stored_set() -> (DatasetLayout, SampleSet) {
        let layout: DatasetLayout = DatasetLayout {
            n_coords: 1,
            n_states: 1,
            store_gradients: true,
            store_couplings: false,
        };
        let metadata: DatasetMetadata = DatasetMetadata {
            reference_geometry: array![0.0],
            masses: array![1.0],
        };
        let mut set: SampleSet = SampleSet::new(layout, metadata);
        for x in [0.0_f64, 1.0, 2.0] {
            let geometry: Array1<f64> = array![x];
            let mut result: PropertyResult = PropertyResult::new(array![10.0 * x]);
            result.gradients.insert(0, array![x]);
            set.append(Sample {
                descriptor: geometry.clone(),
                geometry,
                result,
            });
        }
        (layout, set)
    }

    #[test]
    fn returns_stored_value_exactly_at_a_sample() {
        let (layout, set) = stored_set();
        let mut model: NearestNeighborModel = NearestNeighborModel::new(DistanceNorm::L2, layout);
        model.retrain(&set).unwrap();
        let result: PropertyResult = model.predict(array![1.0].view()).unwrap();
        assert_eq!(result.energies[0], 10.0);
        assert_eq!(result.gradient_of(0).unwrap()[0], 1.0);
    }

    #[test]
    fn picks_the_closest_sample_between_nodes() {
        let (layout, set) = stored_set();
        let mut model: NearestNeighborModel = NearestNeighborModel::new(DistanceNorm::L2, layout);
        model.retrain(&set).unwrap();
        let result: PropertyResult = model.predict(array![1.7].view()).unwrap();
        assert_eq!(result.energies[0], 20.0);
    }
}
