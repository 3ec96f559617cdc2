use crate::cache::coordinates::CoordinateMode;
use crate::cache::models::{
    ModelKind, NearestNeighborModel, PolynomialModel, RbfModel, ShepardModel, SurfaceModel,
};
use crate::cache::sample::{DatasetLayout, DatasetMetadata, Sample, SampleSet};
use crate::error::{DynamicsError, Result};
use crate::initialization::io::CacheConfiguration;
use crate::initialization::SystemData;
use crate::interface::{Property, PropertyRequest, PropertyResult, SurfaceEvaluator};
use log::{debug, info};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod coordinates;
pub mod models;
pub mod sample;

/// Operating mode of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Always evaluate exactly and append the result. Bootstraps a dataset.
    WriteOnly,
    /// Never evaluate exactly; serve the fitted estimate regardless of trust.
    FitOnly,
    /// Serve the fitted estimate when trustworthy, fall back to the exact
    /// evaluator otherwise and grow the dataset.
    Adaptive,
}

/// Per-request trust verdict. Never persisted.
#[derive(Debug, Clone, Copy)]
pub struct TrustAssessment {
    pub distance_to_nearest_sample: f64,
    pub is_trustworthy: bool,
}

/// Wraps the exact surface evaluator with a growing set of known samples and
/// a fitted model over them; decides per request whether the model estimate
/// can be served or an exact evaluation is due.
pub struct InterpolationCache {
    mode: CacheMode,
    coordinate_mode: CoordinateMode,
    norm: models::DistanceNorm,
    trust_radius_general: f64,
    trust_radius_ci: f64,
    energy_threshold: f64,
    layout: DatasetLayout,
    samples: SampleSet,
    model: Box<dyn SurfaceModel>,
    stale: bool,
    dataset_path: Option<PathBuf>,
    weights_path: Option<PathBuf>,
}

impl InterpolationCache {
    pub fn new(config: &CacheConfiguration, n_states: usize, system: &SystemData) -> Result<Self> {
        let layout: DatasetLayout = DatasetLayout {
            n_coords: system.n_coords,
            n_states,
            store_gradients: config.store_gradients,
            store_couplings: config.fit_couplings,
        };
        let metadata: DatasetMetadata = DatasetMetadata {
            reference_geometry: system.reference_geometry.clone(),
            masses: system.masses.clone(),
        };

        let dataset_path: Option<PathBuf> = config.dataset_path.as_ref().map(PathBuf::from);
        let samples: SampleSet = match dataset_path.as_deref() {
            Some(path) if path.exists() => {
                let set: SampleSet = SampleSet::load(path, config.coordinate_mode)?;
                if *set.layout() != layout {
                    return Err(DynamicsError::Configuration(format!(
                        "stored dataset {} does not match the configured table layout",
                        path.display()
                    )));
                }
                info!(
                    "reopened surface dataset {} with {} samples",
                    path.display(),
                    set.len()
                );
                set
            }
            _ => SampleSet::new(layout, metadata),
        };

        let mut model: Box<dyn SurfaceModel> = build_model(config, layout);
        let weights_path: Option<PathBuf> = config.weights_path.as_ref().map(PathBuf::from);
        let mut stale: bool = !samples.is_empty();
        if let Some(path) = weights_path.as_deref() {
            if path.exists() {
                model.load_weights(path)?;
                stale = false;
            }
        }

        Ok(InterpolationCache {
            mode: config.mode,
            coordinate_mode: config.coordinate_mode,
            norm: config.norm,
            trust_radius_general: config.trust_radius_general,
            trust_radius_ci: config.trust_radius_ci,
            energy_threshold: config.energy_threshold,
            layout,
            samples,
            model,
            stale,
            dataset_path,
            weights_path,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    /// Serve one property request: from the fitted model when the sample set
    /// supports it, from the exact evaluator otherwise, per the configured
    /// mode.
    pub fn get(
        &mut self,
        request: &PropertyRequest,
        evaluator: &mut dyn SurfaceEvaluator,
    ) -> Result<(PropertyResult, TrustAssessment)> {
        let descriptor: Array1<f64> = self.coordinate_mode.descriptor(request.geometry.view())?;
        let distance: f64 = self.samples.nearest_distance(descriptor.view(), self.norm);

        match self.mode {
            CacheMode::WriteOnly => {
                let exact: PropertyResult = self.evaluate_exact(&request.geometry, evaluator)?;
                let assessment: TrustAssessment = TrustAssessment {
                    distance_to_nearest_sample: distance,
                    is_trustworthy: false,
                };
                Ok((restrict(&exact, request), assessment))
            }
            CacheMode::FitOnly => {
                let fitted: PropertyResult = self.fitted(descriptor.view())?;
                let radius: f64 = self.effective_radius(&fitted);
                let assessment: TrustAssessment = TrustAssessment {
                    distance_to_nearest_sample: distance,
                    is_trustworthy: !self.samples.is_empty() && distance <= radius,
                };
                Ok((restrict(&fitted, request), assessment))
            }
            CacheMode::Adaptive => {
                // an empty sample set is never trustworthy
                if !self.samples.is_empty() {
                    match self.fitted(descriptor.view()) {
                        Ok(fitted) => {
                            let radius: f64 = self.effective_radius(&fitted);
                            if distance <= radius {
                                let assessment: TrustAssessment = TrustAssessment {
                                    distance_to_nearest_sample: distance,
                                    is_trustworthy: true,
                                };
                                return Ok((restrict(&fitted, request), assessment));
                            }
                        }
                        Err(err) => {
                            debug!("fitted estimate unavailable, evaluating exactly: {}", err);
                        }
                    }
                }
                let exact: PropertyResult = self.evaluate_exact(&request.geometry, evaluator)?;
                let assessment: TrustAssessment = TrustAssessment {
                    distance_to_nearest_sample: distance,
                    is_trustworthy: false,
                };
                Ok((restrict(&exact, request), assessment))
            }
        }
    }

    /// The full-property request issued for every exact evaluation, keeping
    /// the sample table rectangular regardless of what the caller asked for.
    fn canonical_request(&self, geometry: &Array1<f64>) -> PropertyRequest {
        let mut properties: Vec<Property> = vec![Property::Energy];
        if self.layout.store_gradients {
            properties.push(Property::Gradient);
        }
        if self.layout.store_couplings {
            properties.push(Property::Coupling);
        }
        PropertyRequest::new(
            geometry.clone(),
            properties,
            (0..self.layout.n_states).collect(),
        )
    }

    fn evaluate_exact(
        &mut self,
        geometry: &Array1<f64>,
        evaluator: &mut dyn SurfaceEvaluator,
    ) -> Result<PropertyResult> {
        let request: PropertyRequest = self.canonical_request(geometry);
        let result: PropertyResult = evaluator.evaluate(&request)?;
        if result.energies.len() != self.layout.n_states {
            return Err(DynamicsError::Evaluation(format!(
                "evaluator returned {} energies for {} configured states",
                result.energies.len(),
                self.layout.n_states
            )));
        }
        let descriptor: Array1<f64> = self.coordinate_mode.descriptor(geometry.view())?;
        self.samples.append(Sample {
            geometry: geometry.clone(),
            descriptor,
            result: result.clone(),
        });
        self.stale = true;
        if let Some(path) = self.dataset_path.clone() {
            self.samples.save(&path)?;
        }
        Ok(result)
    }

    /// Fitted estimate at the descriptor, retraining lazily after appends.
    fn fitted(&mut self, descriptor: ArrayView1<f64>) -> Result<PropertyResult> {
        if self.stale {
            self.model.retrain(&self.samples)?;
            self.stale = false;
            if let Some(path) = self.weights_path.clone() {
                self.model.save_weights(&path)?;
            }
        }
        self.model.predict(descriptor)
    }

    /// The trust radius applied to this request: the strict one near
    /// degeneracies of the fitted estimate, the general one elsewhere.
    fn effective_radius(&self, fitted: &PropertyResult) -> f64 {
        if fitted.min_adjacent_gap() < self.energy_threshold {
            self.trust_radius_ci
        } else {
            self.trust_radius_general
        }
    }

    pub fn save_dataset(&self, path: &Path) -> Result<()> {
        self.samples.save(path)
    }
}

fn build_model(config: &CacheConfiguration, layout: DatasetLayout) -> Box<dyn SurfaceModel> {
    match config.model {
        ModelKind::Rbf => Box::new(RbfModel::new(
            config.rbf_epsilon,
            config.rbf_regularization,
            config.fd_stepsize,
            layout,
        )),
        ModelKind::Nearest => Box::new(NearestNeighborModel::new(config.norm, layout)),
        ModelKind::Shepard => Box::new(ShepardModel::new(config.shepard_power, config.norm, layout)),
        ModelKind::Polynomial => Box::new(PolynomialModel::new(
            config.polynomial_degree,
            config.fd_stepsize,
            layout,
        )),
    }
}

/// Cut a full-property result down to what the request asked for; gradient
/// entries are present only for requested states.
fn restrict(result: &PropertyResult, request: &PropertyRequest) -> PropertyResult {
    let mut restricted: PropertyResult = PropertyResult::new(result.energies.clone());
    if request.wants(Property::Gradient) {
        for state in &request.states {
            if let Some(gradient) = result.gradients.get(state) {
                restricted.gradients.insert(*state, gradient.clone());
            }
        }
    }
    if request.wants(Property::Coupling) {
        restricted.couplings = result.couplings.clone();
    }
    restricted
}
