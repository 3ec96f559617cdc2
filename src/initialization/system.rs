use crate::constants;
use crate::error::{DynamicsError, Result};
use ndarray::prelude::*;

/// Static data of the propagated system: the coordinate dimension, the mass
/// of every coordinate and the reference geometry. Coordinates are an
/// abstract vector; for an atomistic system they are the flattened cartesian
/// components and every atomic mass appears three times.
#[derive(Debug, Clone)]
pub struct SystemData {
    pub n_coords: usize,
    pub masses: Array1<f64>,
    pub reference_geometry: Array1<f64>,
}

impl SystemData {
    pub fn new(masses: Array1<f64>, reference_geometry: Array1<f64>) -> Result<Self> {
        if masses.len() != reference_geometry.len() {
            return Err(DynamicsError::Configuration(format!(
                "mass vector of length {} does not broadcast over the reference \
                 geometry of length {}",
                masses.len(),
                reference_geometry.len()
            )));
        }
        Ok(SystemData {
            n_coords: masses.len(),
            masses,
            reference_geometry,
        })
    }
}

impl TryFrom<(Vec<u8>, Array1<f64>)> for SystemData {
    type Error = DynamicsError;

    /// Build the system from atomic numbers and a flattened cartesian
    /// geometry; masses are looked up per element and repeated for the three
    /// components of each atom.
    fn try_from(molecule: (Vec<u8>, Array1<f64>)) -> Result<Self> {
        let (numbers, coordinates) = molecule;
        if coordinates.len() != 3 * numbers.len() {
            return Err(DynamicsError::Configuration(format!(
                "{} atoms require a geometry of length {}, got {}",
                numbers.len(),
                3 * numbers.len(),
                coordinates.len()
            )));
        }
        let mut masses: Vec<f64> = Vec::with_capacity(coordinates.len());
        for number in &numbers {
            let mass: f64 = *constants::ATOMIC_MASSES.get(number).ok_or_else(|| {
                DynamicsError::Configuration(format!("no tabulated mass for element {}", number))
            })?;
            masses.extend_from_slice(&[mass, mass, mass]);
        }
        SystemData::new(Array1::from(masses), coordinates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomwise_masses_are_repeated_per_component() {
        let system: SystemData =
            SystemData::try_from((vec![1u8, 8u8], Array1::zeros(6))).unwrap();
        assert_eq!(system.n_coords, 6);
        assert_eq!(system.masses[0], system.masses[2]);
        assert!(system.masses[3] > system.masses[0]);
    }

    #[test]
    fn unknown_element_is_a_configuration_error() {
        assert!(SystemData::try_from((vec![92u8], Array1::zeros(3))).is_err());
    }
}
