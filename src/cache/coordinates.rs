use crate::error::{DynamicsError, Result};
use itertools::Itertools;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

/// Coordinate representation used for sample distances and model inputs.
/// `Cartesian` passes the geometry through unchanged; `Internal` maps it to
/// the vector of pairwise inter-atomic distances, which is invariant under
/// rigid translation and rotation of the geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateMode {
    Cartesian,
    Internal,
}

impl CoordinateMode {
    /// Number of descriptor components for a geometry of `n_coords` entries.
    pub fn descriptor_len(&self, n_coords: usize) -> Result<usize> {
        match self {
            CoordinateMode::Cartesian => Ok(n_coords),
            CoordinateMode::Internal => {
                let n_atoms: usize = check_atomwise(n_coords)?;
                Ok(n_atoms * (n_atoms - 1) / 2)
            }
        }
    }

    /// Map a geometry to the descriptor the cache measures distances in.
    pub fn descriptor(&self, geometry: ArrayView1<f64>) -> Result<Array1<f64>> {
        match self {
            CoordinateMode::Cartesian => Ok(geometry.to_owned()),
            CoordinateMode::Internal => {
                let n_atoms: usize = check_atomwise(geometry.len())?;
                let mut distances: Vec<f64> = Vec::with_capacity(n_atoms * (n_atoms - 1) / 2);
                for (i, j) in (0..n_atoms).tuple_combinations() {
                    let mut dist_sq: f64 = 0.0;
                    for k in 0..3 {
                        dist_sq += (geometry[3 * i + k] - geometry[3 * j + k]).powi(2);
                    }
                    distances.push(dist_sq.sqrt());
                }
                Ok(Array1::from(distances))
            }
        }
    }
}

fn check_atomwise(n_coords: usize) -> Result<usize> {
    if n_coords % 3 != 0 || n_coords < 6 {
        return Err(DynamicsError::Configuration(format!(
            "internal coordinates require at least two atoms with 3 cartesian \
             components each, got a geometry of length {}",
            n_coords
        )));
    }
    Ok(n_coords / 3)
}
