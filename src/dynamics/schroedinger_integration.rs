use crate::error::Result;
use ndarray::prelude::*;
use ndarray_linalg::{c64, Eig, Inverse};

/// Propagate the electronic amplitudes over one nuclear step under the
/// effective Hamiltonian `H = diag(E) - i·vk`, where `vk` is the action of
/// the nonadiabatic couplings on the nuclear velocity. The propagator is the
/// matrix exponential of `-i·H·dt/n`, built once from the eigendecomposition
/// and applied over `n` sub-intervals.
pub fn propagate_amplitudes(
    energies: ArrayView1<f64>,
    coupling_action: ArrayView2<f64>,
    coefficients: ArrayView1<c64>,
    stepsize: f64,
    substeps: usize,
) -> Result<Array1<c64>> {
    let dt_sub: f64 = stepsize / substeps as f64;

    // d/dt c = (-i·diag(E) - vk) c
    let mut mat: Array2<c64> = Array::from_diag(&energies.map(|val| val * c64::new(0.0, -1.0)))
        - coupling_action.mapv(c64::from);
    mat = mat * c64::from(dt_sub);

    let (eig, eig_vec): (Array1<c64>, Array2<c64>) = mat.eig()?;
    let diag: Array1<c64> = eig.mapv(|val| val.exp());
    let propagator: Array2<c64> = eig_vec.dot(&Array::from_diag(&diag).dot(&eig_vec.inv()?));

    let mut new_coefficients: Array1<c64> = coefficients.to_owned();
    for _ in 0..substeps {
        new_coefficients = propagator.dot(&new_coefficients);
    }
    Ok(new_coefficients)
}

/// Normalize the state amplitudes of the system.
pub fn normalize_coefficients(coefficients: ArrayView1<c64>) -> Array1<c64> {
    let norm: f64 = coefficients.map(|val| val.norm_sqr()).sum();
    coefficients.to_owned() / c64::from(norm.sqrt())
}
