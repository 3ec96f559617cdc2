use crate::cache::InterpolationCache;
use crate::dynamics::hopping::{build_hop_selector, HopSelector};
use crate::error::{DynamicsError, Result};
use crate::initialization::io::DynamicConfiguration;
use crate::initialization::SystemData;
use crate::interface::InitialCondition;
use hashbrown::HashMap;
use ndarray::prelude::*;
use ndarray_linalg::c64;

/// Phase of the propagator state machine. Two warm-up steps are completed
/// before hop selection becomes active, so that the gap-history algorithms
/// have three energy snapshots available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Warmup(usize),
    Running,
    Terminated,
}

/// Holds the [DynamicConfiguration] and the complete dynamical state of one
/// trajectory: positions, velocities, the active surface, the electronic
/// amplitudes and the energy history of the last three steps.
pub struct Simulation {
    pub config: DynamicConfiguration,
    pub stepsize: f64,
    pub actual_time: f64,
    pub step: usize,
    pub phase: Phase,
    pub n_coords: usize,
    pub masses: Array1<f64>,
    pub coordinates: Array1<f64>,
    pub velocities: Array1<f64>,
    pub accelerations: Array1<f64>,
    pub state: usize,
    pub coefficients: Array1<c64>,
    pub energies: Array1<f64>,
    pub energies_last: Option<Array1<f64>>,
    pub energies_last2: Option<Array1<f64>>,
    pub couplings: Option<HashMap<(usize, usize), Array1<f64>>>,
    pub coupling_action: Option<Array2<f64>>,
    pub kinetic_energy: f64,
    pub hop_selector: Box<dyn HopSelector>,
    pub cache: Option<InterpolationCache>,
}

impl Simulation {
    /// Build a trajectory from the system data, one initial condition and the
    /// configuration. Every configuration violation is raised here, before
    /// any simulation work begins.
    pub fn new(
        system: &SystemData,
        condition: InitialCondition,
        config: DynamicConfiguration,
    ) -> Result<Simulation> {
        config.validate(system)?;
        if condition.coordinates.len() != system.n_coords {
            return Err(DynamicsError::Configuration(format!(
                "initial coordinates of length {} do not match the {} system coordinates",
                condition.coordinates.len(),
                system.n_coords
            )));
        }
        if condition.velocities.len() != system.n_coords {
            return Err(DynamicsError::Configuration(format!(
                "initial velocities of length {} do not match the {} system coordinates",
                condition.velocities.len(),
                system.n_coords
            )));
        }
        if condition.active_state >= config.nstates {
            return Err(DynamicsError::Configuration(format!(
                "initial active state {} does not index one of the {} states",
                condition.active_state, config.nstates
            )));
        }

        let mut coefficients: Array1<c64> = Array1::zeros(config.nstates);
        coefficients[condition.active_state] = c64::from(1.0);

        let cache: Option<InterpolationCache> = if config.cache.enabled {
            Some(InterpolationCache::new(
                &config.cache,
                config.nstates,
                system,
            )?)
        } else {
            None
        };
        let hop_selector: Box<dyn HopSelector> = build_hop_selector(&config.hopping);

        Ok(Simulation {
            stepsize: config.stepsize,
            actual_time: 0.0,
            step: 0,
            phase: Phase::Uninitialized,
            n_coords: system.n_coords,
            masses: system.masses.clone(),
            coordinates: condition.coordinates,
            velocities: condition.velocities,
            accelerations: Array1::zeros(system.n_coords),
            state: condition.active_state,
            coefficients,
            energies: Array1::zeros(config.nstates),
            energies_last: None,
            energies_last2: None,
            couplings: None,
            coupling_action: None,
            kinetic_energy: 0.0,
            hop_selector,
            cache,
            config,
        })
    }

    pub fn potential_energy(&self) -> f64 {
        self.energies[self.state]
    }

    pub fn total_energy(&self) -> f64 {
        self.kinetic_energy + self.potential_energy()
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Terminated)
    }
}
