use crate::cache::coordinates::CoordinateMode;
use crate::cache::models::{DistanceNorm, ModelKind};
use crate::cache::CacheMode;
use crate::defaults::*;
use crate::dynamics::decoherence::DecoherencePolicy;
use crate::dynamics::hopping::HopMethod;
use crate::dynamics::rescaling::{FrustratedPolicy, RescaleDirection};
use crate::error::{DynamicsError, Result};
use crate::initialization::SystemData;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_nstep() -> usize {
    NSTEP
}
fn default_stepsize() -> f64 {
    STEPSIZE
}
fn default_nstates() -> usize {
    NSTATES
}
fn default_initial_state() -> usize {
    INITIAL_STATE
}
fn default_seed() -> u64 {
    SEED
}
fn default_restart() -> bool {
    RESTART
}
fn default_temperature() -> f64 {
    TEMPERATURE
}
fn default_use_surface_hopping() -> bool {
    USE_SURFACE_HOPPING
}
fn default_hop_method() -> HopMethod {
    HopMethod::LandauZener
}
fn default_decoherence() -> DecoherencePolicy {
    DecoherencePolicy::None
}
fn default_decoherence_constant() -> f64 {
    DECOHERENCE_CONSTANT
}
fn default_velocity_rescale() -> RescaleDirection {
    RescaleDirection::Momentum
}
fn default_frustrated() -> FrustratedPolicy {
    FrustratedPolicy::Keep
}
fn default_substeps() -> usize {
    INTEGRATION_SUBSTEPS
}
fn default_use_cache() -> bool {
    USE_CACHE
}
fn default_cache_mode() -> CacheMode {
    CacheMode::Adaptive
}
fn default_trust_radius_general() -> f64 {
    TRUST_RADIUS_GENERAL
}
fn default_trust_radius_ci() -> f64 {
    TRUST_RADIUS_CI
}
fn default_energy_threshold() -> f64 {
    ENERGY_THRESHOLD
}
fn default_coordinate_mode() -> CoordinateMode {
    CoordinateMode::Cartesian
}
fn default_model() -> ModelKind {
    ModelKind::Rbf
}
fn default_norm() -> DistanceNorm {
    DistanceNorm::L2
}
fn default_rbf_epsilon() -> f64 {
    RBF_EPSILON
}
fn default_rbf_regularization() -> f64 {
    RBF_REGULARIZATION
}
fn default_shepard_power() -> f64 {
    SHEPARD_POWER
}
fn default_polynomial_degree() -> usize {
    POLYNOMIAL_DEGREE
}
fn default_fd_stepsize() -> f64 {
    FD_STEPSIZE
}
fn default_store_gradients() -> bool {
    true
}
fn default_fit_couplings() -> bool {
    FIT_COUPLINGS
}
fn default_dataset_path() -> Option<String> {
    None
}
fn default_weights_path() -> Option<String> {
    None
}
fn default_print_trajectory() -> bool {
    PRINT_TRAJECTORY
}
fn default_print_hopping() -> bool {
    PRINT_HOPPING
}
fn default_hopping_config() -> HoppingConfiguration {
    toml::from_str("").unwrap()
}
fn default_cache_config() -> CacheConfiguration {
    toml::from_str("").unwrap()
}
fn default_print_config() -> PrintConfiguration {
    toml::from_str("").unwrap()
}

/// Global configuration of one trajectory, loaded from "surfhop.toml".
#[derive(Serialize, Deserialize, Clone)]
pub struct DynamicConfiguration {
    #[serde(default = "default_nstep")]
    pub nstep: usize,
    #[serde(default = "default_stepsize")]
    pub stepsize: f64,
    #[serde(default = "default_nstates")]
    pub nstates: usize,
    #[serde(default = "default_initial_state")]
    pub initial_state: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_restart")]
    pub restart: bool,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_hopping_config")]
    pub hopping: HoppingConfiguration,
    #[serde(default = "default_cache_config")]
    pub cache: CacheConfiguration,
    #[serde(default = "default_print_config")]
    pub print: PrintConfiguration,
}

/// Parameters of the surface hopping procedure.
#[derive(Serialize, Deserialize, Clone)]
pub struct HoppingConfiguration {
    #[serde(default = "default_use_surface_hopping")]
    pub use_surface_hopping: bool,
    #[serde(default = "default_hop_method")]
    pub method: HopMethod,
    #[serde(default = "default_decoherence")]
    pub decoherence: DecoherencePolicy,
    #[serde(default = "default_decoherence_constant")]
    pub decoherence_constant: f64,
    #[serde(default = "default_velocity_rescale")]
    pub velocity_rescale: RescaleDirection,
    #[serde(default = "default_frustrated")]
    pub frustrated: FrustratedPolicy,
    #[serde(default = "default_substeps")]
    pub substeps: usize,
}

/// Parameters of the interpolation cache.
#[derive(Serialize, Deserialize, Clone)]
pub struct CacheConfiguration {
    #[serde(default = "default_use_cache")]
    pub enabled: bool,
    #[serde(default = "default_cache_mode")]
    pub mode: CacheMode,
    #[serde(default = "default_trust_radius_general")]
    pub trust_radius_general: f64,
    #[serde(default = "default_trust_radius_ci")]
    pub trust_radius_ci: f64,
    #[serde(default = "default_energy_threshold")]
    pub energy_threshold: f64,
    #[serde(default = "default_coordinate_mode")]
    pub coordinate_mode: CoordinateMode,
    #[serde(default = "default_model")]
    pub model: ModelKind,
    #[serde(default = "default_norm")]
    pub norm: DistanceNorm,
    #[serde(default = "default_rbf_epsilon")]
    pub rbf_epsilon: f64,
    #[serde(default = "default_rbf_regularization")]
    pub rbf_regularization: f64,
    #[serde(default = "default_shepard_power")]
    pub shepard_power: f64,
    #[serde(default = "default_polynomial_degree")]
    pub polynomial_degree: usize,
    #[serde(default = "default_fd_stepsize")]
    pub fd_stepsize: f64,
    #[serde(default = "default_store_gradients")]
    pub store_gradients: bool,
    #[serde(default = "default_fit_couplings")]
    pub fit_couplings: bool,
    #[serde(default = "default_dataset_path", skip_serializing_if = "Option::is_none")]
    pub dataset_path: Option<String>,
    #[serde(default = "default_weights_path", skip_serializing_if = "Option::is_none")]
    pub weights_path: Option<String>,
}

/// Controls the per-step output.
#[derive(Serialize, Deserialize, Clone)]
pub struct PrintConfiguration {
    #[serde(default = "default_print_trajectory")]
    pub print_trajectory: bool,
    #[serde(default = "default_print_hopping")]
    pub print_hopping: bool,
}

impl DynamicConfiguration {
    /// Read the configuration file; if it does not exist the defaults are
    /// used and written back to the directory.
    pub fn new() -> Self {
        let config_file_path: &Path = Path::new(CONFIG_FILE_NAME);
        let mut config_string: String = if config_file_path.exists() {
            fs::read_to_string(config_file_path).expect("Unable to read config file")
        } else {
            String::from("")
        };
        let config: Self = toml::from_str(&config_string).unwrap();
        if !config_file_path.exists() {
            config_string = toml::to_string(&config).unwrap();
            fs::write(config_file_path, config_string).expect("Unable to write config file");
        }
        config
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|err| DynamicsError::Configuration(err.to_string()))
    }

    /// Check the configuration against the system before any simulation work
    /// begins. Every violation here is fatal.
    pub fn validate(&self, system: &SystemData) -> Result<()> {
        if self.nstates == 0 {
            return Err(DynamicsError::Configuration(
                "at least one electronic state is required".to_string(),
            ));
        }
        if self.initial_state >= self.nstates {
            return Err(DynamicsError::Configuration(format!(
                "initial state {} does not index one of the {} states",
                self.initial_state, self.nstates
            )));
        }
        if self.stepsize <= 0.0 {
            return Err(DynamicsError::Configuration(format!(
                "stepsize must be positive, got {}",
                self.stepsize
            )));
        }
        if system.masses.len() != system.n_coords {
            return Err(DynamicsError::Configuration(format!(
                "mass vector of length {} does not broadcast over {} coordinates",
                system.masses.len(),
                system.n_coords
            )));
        }
        if system.masses.iter().any(|mass| *mass <= 0.0) {
            return Err(DynamicsError::Configuration(
                "all masses must be positive".to_string(),
            ));
        }
        if self.hopping.use_surface_hopping
            && self.hopping.method == HopMethod::LandauZener
            && self.hopping.velocity_rescale == RescaleDirection::CouplingDirection
        {
            return Err(DynamicsError::Configuration(
                "rescaling along the coupling direction requires a hop method \
                 that computes couplings (tully)"
                    .to_string(),
            ));
        }
        if self.hopping.use_surface_hopping
            && self.hopping.method == HopMethod::Tully
            && self.hopping.substeps == 0
        {
            return Err(DynamicsError::Configuration(
                "the electronic propagation needs at least one substep".to_string(),
            ));
        }
        if self.cache.enabled {
            // the descriptor must be constructible for this system at all
            self.cache
                .coordinate_mode
                .descriptor_len(system.n_coords)?;
            if !self.cache.store_gradients {
                match self.cache.model {
                    ModelKind::Nearest | ModelKind::Shepard => {
                        return Err(DynamicsError::Configuration(format!(
                            "the {:?} backend cannot estimate gradients from an \
                             energy-only sample table",
                            self.cache.model
                        )));
                    }
                    ModelKind::Rbf | ModelKind::Polynomial => {
                        if self.cache.coordinate_mode == CoordinateMode::Internal {
                            return Err(DynamicsError::Configuration(
                                "finite-difference gradient estimation works on \
                                 cartesian descriptors only"
                                    .to_string(),
                            ));
                        }
                    }
                }
            }
            if self.hopping.use_surface_hopping
                && self.hopping.method == HopMethod::Tully
                && self.cache.mode == CacheMode::FitOnly
                && !self.cache.fit_couplings
            {
                return Err(DynamicsError::Configuration(
                    "tully hopping in fit-only cache mode requires fitted couplings".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::prelude::*;

    fn harmonic_system() -> SystemData {
        SystemData::new(array![1.0], array![0.0]).unwrap()
    }

    #[test]
    fn empty_input_yields_defaults() {
        let config: DynamicConfiguration = DynamicConfiguration::from_toml_str("").unwrap();
        assert_eq!(config.nstep, NSTEP);
        assert_eq!(config.hopping.method, HopMethod::LandauZener);
        assert_eq!(config.cache.mode, CacheMode::Adaptive);
    }

    #[test]
    fn nested_tables_override_defaults() {
        let input: &str = r#"
            nstates = 2
            [hopping]
            method = "tully"
            velocity_rescale = "coupling_direction"
            [cache]
            mode = "write_only"
        "#;
        let config: DynamicConfiguration = DynamicConfiguration::from_toml_str(input).unwrap();
        assert_eq!(config.nstates, 2);
        assert_eq!(config.hopping.method, HopMethod::Tully);
        assert_eq!(config.cache.mode, CacheMode::WriteOnly);
        assert!(config.validate(&harmonic_system()).is_ok());
    }

    #[test]
    fn landau_zener_with_coupling_rescaling_is_rejected() {
        let input: &str = r#"
            nstates = 2
            [hopping]
            method = "landau_zener"
            velocity_rescale = "coupling_direction"
        "#;
        let config: DynamicConfiguration = DynamicConfiguration::from_toml_str(input).unwrap();
        assert!(config.validate(&harmonic_system()).is_err());
    }

    #[test]
    fn mass_shape_mismatch_is_fatal() {
        let config: DynamicConfiguration = DynamicConfiguration::from_toml_str("").unwrap();
        let system: SystemData = SystemData {
            n_coords: 2,
            masses: array![1.0],
            reference_geometry: array![0.0, 0.0],
        };
        assert!(config.validate(&system).is_err());
    }
}
