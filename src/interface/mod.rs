use crate::error::{DynamicsError, Result};
use hashbrown::HashMap;
use ndarray::prelude::*;

/// Property kinds a [PropertyRequest] can ask an evaluator for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Energy,
    Gradient,
    Coupling,
}

/// Immutable request for surface properties at a single geometry.
/// Issued once per evaluation call.
#[derive(Debug, Clone)]
pub struct PropertyRequest {
    pub geometry: Array1<f64>,
    pub properties: Vec<Property>,
    pub states: Vec<usize>,
}

impl PropertyRequest {
    pub fn new(geometry: Array1<f64>, properties: Vec<Property>, states: Vec<usize>) -> Self {
        PropertyRequest {
            geometry,
            properties,
            states,
        }
    }

    pub fn wants(&self, property: Property) -> bool {
        self.properties.contains(&property)
    }
}

/// Surface properties at a single geometry. The energy vector always spans
/// all electronic states of the request; gradient entries are present only
/// for the requested states and coupling vectors only for pairs `i < j`.
#[derive(Debug, Clone)]
pub struct PropertyResult {
    pub energies: Array1<f64>,
    pub gradients: HashMap<usize, Array1<f64>>,
    pub couplings: Option<HashMap<(usize, usize), Array1<f64>>>,
}

impl PropertyResult {
    pub fn new(energies: Array1<f64>) -> Self {
        PropertyResult {
            energies,
            gradients: HashMap::new(),
            couplings: None,
        }
    }

    pub fn nstates(&self) -> usize {
        self.energies.len()
    }

    /// Gradient of one state, or an evaluation error naming the missing state.
    pub fn gradient_of(&self, state: usize) -> Result<ArrayView1<f64>> {
        self.gradients
            .get(&state)
            .map(|grad| grad.view())
            .ok_or_else(|| {
                DynamicsError::Evaluation(format!("no gradient available for state {}", state))
            })
    }

    /// Coupling vector for the unordered state pair, with the sign convention
    /// of the stored `i < j` entry.
    pub fn coupling_of(&self, state_i: usize, state_j: usize) -> Option<ArrayView1<f64>> {
        let key = if state_i < state_j {
            (state_i, state_j)
        } else {
            (state_j, state_i)
        };
        self.couplings
            .as_ref()
            .and_then(|map| map.get(&key))
            .map(|vec| vec.view())
    }

    /// Smallest energy gap between adjacent states of the vector.
    pub fn min_adjacent_gap(&self) -> f64 {
        let mut min_gap: f64 = f64::INFINITY;
        for state in 1..self.energies.len() {
            let gap: f64 = (self.energies[state] - self.energies[state - 1]).abs();
            if gap < min_gap {
                min_gap = gap;
            }
        }
        min_gap
    }
}

/// Interface to the exact surface evaluator. Implementations are expected to
/// be deterministic for a given geometry and may be slow; failures must be
/// reported as [DynamicsError::Evaluation] instead of silently returning
/// zeroed data. No shared mutable global state, so that a crashed process can
/// be relaunched and resume from its last recorded step.
pub trait SurfaceEvaluator {
    fn evaluate(&mut self, request: &PropertyRequest) -> Result<PropertyResult>;
}

/// Starting point of a trajectory.
#[derive(Debug, Clone)]
pub struct InitialCondition {
    pub coordinates: Array1<f64>,
    pub velocities: Array1<f64>,
    pub active_state: usize,
}

/// Source of initial conditions. Indices are ordinal; index 0 is reserved for
/// the equilibrium/reference geometry.
pub trait InitialConditionSource {
    fn get_condition(&mut self, index: usize) -> Result<InitialCondition>;
}
