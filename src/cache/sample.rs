use crate::cache::coordinates::CoordinateMode;
use crate::cache::models::DistanceNorm;
use crate::error::{DynamicsError, Result};
use crate::interface::PropertyResult;
use hashbrown::HashMap;
use ndarray::prelude::*;
use ndarray_npy::{NpzReader, NpzWriter};
use std::fs::File;
use std::path::Path;

/// Column layout of the sample table. All stored results are rectangular:
/// energies of every state, optionally gradients of every state and coupling
/// vectors of every pair `i < j`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetLayout {
    pub n_coords: usize,
    pub n_states: usize,
    pub store_gradients: bool,
    pub store_couplings: bool,
}

impl DatasetLayout {
    pub fn n_pairs(&self) -> usize {
        self.n_states * (self.n_states.saturating_sub(1)) / 2
    }

    /// Flattened width of one stored property row.
    pub fn n_outputs(&self) -> usize {
        let mut n: usize = self.n_states;
        if self.store_gradients {
            n += self.n_states * self.n_coords;
        }
        if self.store_couplings {
            n += self.n_pairs() * self.n_coords;
        }
        n
    }

    /// Index of the pair `(i, j)` with `i < j` in lexicographic order.
    pub fn pair_index(&self, state_i: usize, state_j: usize) -> usize {
        let (i, j) = if state_i < state_j {
            (state_i, state_j)
        } else {
            (state_j, state_i)
        };
        let mut count: usize = 0;
        for a in 0..self.n_states {
            for b in (a + 1)..self.n_states {
                if a == i && b == j {
                    return count;
                }
                count += 1;
            }
        }
        unreachable!("pair index out of range");
    }

    pub fn pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs: Vec<(usize, usize)> = Vec::with_capacity(self.n_pairs());
        for i in 0..self.n_states {
            for j in (i + 1)..self.n_states {
                pairs.push((i, j));
            }
        }
        pairs
    }

    /// Flatten a [PropertyResult] into one row of the sample table. The result
    /// must carry every column the layout stores; anything else is malformed
    /// evaluator output.
    pub fn pack(&self, result: &PropertyResult) -> Result<Array1<f64>> {
        if result.energies.len() != self.n_states {
            return Err(DynamicsError::Evaluation(format!(
                "energy vector of length {} does not match the {} configured states",
                result.energies.len(),
                self.n_states
            )));
        }
        let mut row: Array1<f64> = Array1::zeros(self.n_outputs());
        row.slice_mut(s![..self.n_states]).assign(&result.energies);
        let mut offset: usize = self.n_states;
        if self.store_gradients {
            for state in 0..self.n_states {
                let gradient: ArrayView1<f64> = result.gradient_of(state)?;
                if gradient.len() != self.n_coords {
                    return Err(DynamicsError::Evaluation(format!(
                        "gradient of state {} has length {}, expected {}",
                        state,
                        gradient.len(),
                        self.n_coords
                    )));
                }
                row.slice_mut(s![offset..offset + self.n_coords])
                    .assign(&gradient);
                offset += self.n_coords;
            }
        }
        if self.store_couplings {
            for (i, j) in self.pairs() {
                let coupling = result.coupling_of(i, j).ok_or_else(|| {
                    DynamicsError::Evaluation(format!(
                        "missing coupling vector for state pair ({}, {})",
                        i, j
                    ))
                })?;
                row.slice_mut(s![offset..offset + self.n_coords])
                    .assign(&coupling);
                offset += self.n_coords;
            }
        }
        Ok(row)
    }

    /// Rebuild a [PropertyResult] from one stored or predicted row.
    pub fn unpack(&self, row: ArrayView1<f64>) -> PropertyResult {
        let energies: Array1<f64> = row.slice(s![..self.n_states]).to_owned();
        let mut result: PropertyResult = PropertyResult::new(energies);
        let mut offset: usize = self.n_states;
        if self.store_gradients {
            for state in 0..self.n_states {
                result.gradients.insert(
                    state,
                    row.slice(s![offset..offset + self.n_coords]).to_owned(),
                );
                offset += self.n_coords;
            }
        }
        if self.store_couplings {
            let mut couplings: HashMap<(usize, usize), Array1<f64>> = HashMap::new();
            for (i, j) in self.pairs() {
                couplings.insert(
                    (i, j),
                    row.slice(s![offset..offset + self.n_coords]).to_owned(),
                );
                offset += self.n_coords;
            }
            result.couplings = Some(couplings);
        }
        result
    }
}

/// Fixed-size metadata of a sample table, written once at creation.
#[derive(Debug, Clone)]
pub struct DatasetMetadata {
    pub reference_geometry: Array1<f64>,
    pub masses: Array1<f64>,
}

/// One exactly evaluated point of the surface. Never mutated after insertion.
#[derive(Debug, Clone)]
pub struct Sample {
    pub geometry: Array1<f64>,
    pub descriptor: Array1<f64>,
    pub result: PropertyResult,
}

/// Append-only, insertion-ordered set of exactly evaluated surface points.
pub struct SampleSet {
    layout: DatasetLayout,
    metadata: DatasetMetadata,
    samples: Vec<Sample>,
}

impl SampleSet {
    pub fn new(layout: DatasetLayout, metadata: DatasetMetadata) -> Self {
        SampleSet {
            layout,
            metadata,
            samples: Vec::new(),
        }
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn append(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    /// Index and distance of the sample closest to the query descriptor.
    pub fn nearest(&self, descriptor: ArrayView1<f64>, norm: DistanceNorm) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (index, sample) in self.samples.iter().enumerate() {
            let distance: f64 = norm.distance(descriptor, sample.descriptor.view());
            match best {
                Some((_, d)) if d <= distance => {}
                _ => best = Some((index, distance)),
            }
        }
        best
    }

    pub fn nearest_distance(&self, descriptor: ArrayView1<f64>, norm: DistanceNorm) -> f64 {
        self.nearest(descriptor, norm)
            .map(|(_, distance)| distance)
            .unwrap_or(f64::INFINITY)
    }

    /// Descriptors of all samples as one `(n_samples, d)` matrix.
    pub fn descriptor_matrix(&self) -> Array2<f64> {
        let d: usize = self
            .samples
            .first()
            .map(|sample| sample.descriptor.len())
            .unwrap_or(0);
        let mut matrix: Array2<f64> = Array2::zeros((self.samples.len(), d));
        for (index, sample) in self.samples.iter().enumerate() {
            matrix.slice_mut(s![index, ..]).assign(&sample.descriptor);
        }
        matrix
    }

    /// Packed property rows of all samples as one `(n_samples, n_outputs)` matrix.
    pub fn output_matrix(&self) -> Result<Array2<f64>> {
        let mut matrix: Array2<f64> = Array2::zeros((self.samples.len(), self.layout.n_outputs()));
        for (index, sample) in self.samples.iter().enumerate() {
            let row: Array1<f64> = self.layout.pack(&sample.result)?;
            matrix.slice_mut(s![index, ..]).assign(&row);
        }
        Ok(matrix)
    }

    /// Write the table to an npz archive: a `geometry` block keyed by the
    /// growing frame dimension, one block per stored property, and the
    /// creation-time metadata.
    pub fn save(&self, path: &Path) -> Result<()> {
        let n: usize = self.samples.len();
        let mut geometry: Array2<f64> = Array2::zeros((n, self.layout.n_coords));
        let mut energy: Array2<f64> = Array2::zeros((n, self.layout.n_states));
        let mut gradient: Array3<f64> =
            Array3::zeros((n, self.layout.n_states, self.layout.n_coords));
        let mut coupling: Array3<f64> =
            Array3::zeros((n, self.layout.n_pairs(), self.layout.n_coords));

        for (index, sample) in self.samples.iter().enumerate() {
            geometry.slice_mut(s![index, ..]).assign(&sample.geometry);
            energy
                .slice_mut(s![index, ..])
                .assign(&sample.result.energies);
            if self.layout.store_gradients {
                for state in 0..self.layout.n_states {
                    gradient
                        .slice_mut(s![index, state, ..])
                        .assign(&sample.result.gradient_of(state)?);
                }
            }
            if self.layout.store_couplings {
                for (i, j) in self.layout.pairs() {
                    let pair: usize = self.layout.pair_index(i, j);
                    let vector = sample.result.coupling_of(i, j).ok_or_else(|| {
                        DynamicsError::Evaluation(format!(
                            "missing coupling vector for state pair ({}, {})",
                            i, j
                        ))
                    })?;
                    coupling.slice_mut(s![index, pair, ..]).assign(&vector);
                }
            }
        }

        let shape: Array1<i64> = array![
            self.layout.n_coords as i64,
            self.layout.n_states as i64,
            self.layout.store_gradients as i64,
            self.layout.store_couplings as i64
        ];

        let mut npz = NpzWriter::new(File::create(path)?);
        npz.add_array("shape", &shape)
            .map_err(|err| DynamicsError::Serialization(err.to_string()))?;
        npz.add_array("geometry", &geometry)
            .map_err(|err| DynamicsError::Serialization(err.to_string()))?;
        npz.add_array("energy", &energy)
            .map_err(|err| DynamicsError::Serialization(err.to_string()))?;
        if self.layout.store_gradients {
            npz.add_array("gradient", &gradient)
                .map_err(|err| DynamicsError::Serialization(err.to_string()))?;
        }
        if self.layout.store_couplings {
            npz.add_array("coupling", &coupling)
                .map_err(|err| DynamicsError::Serialization(err.to_string()))?;
        }
        npz.add_array("reference_geometry", &self.metadata.reference_geometry)
            .map_err(|err| DynamicsError::Serialization(err.to_string()))?;
        npz.add_array("masses", &self.metadata.masses)
            .map_err(|err| DynamicsError::Serialization(err.to_string()))?;
        npz.finish()
            .map_err(|err| DynamicsError::Serialization(err.to_string()))?;
        Ok(())
    }

    /// Reopen a stored table. Descriptors are recomputed from the stored
    /// geometries so the set can be reopened under a different coordinate
    /// representation.
    pub fn load(path: &Path, mode: CoordinateMode) -> Result<Self> {
        let mut npz = NpzReader::new(File::open(path)?)
            .map_err(|err| DynamicsError::Serialization(err.to_string()))?;

        let shape: Array1<i64> = read_npz_1d_i64(&mut npz, "shape")?;
        let layout: DatasetLayout = DatasetLayout {
            n_coords: shape[0] as usize,
            n_states: shape[1] as usize,
            store_gradients: shape[2] != 0,
            store_couplings: shape[3] != 0,
        };

        let geometry: Array2<f64> = read_npz_2d(&mut npz, "geometry")?;
        let energy: Array2<f64> = read_npz_2d(&mut npz, "energy")?;
        let gradient: Option<Array3<f64>> = if layout.store_gradients {
            Some(read_npz_3d(&mut npz, "gradient")?)
        } else {
            None
        };
        let coupling: Option<Array3<f64>> = if layout.store_couplings {
            Some(read_npz_3d(&mut npz, "coupling")?)
        } else {
            None
        };
        let reference_geometry: Array1<f64> = read_npz_1d(&mut npz, "reference_geometry")?;
        let masses: Array1<f64> = read_npz_1d(&mut npz, "masses")?;

        let metadata: DatasetMetadata = DatasetMetadata {
            reference_geometry,
            masses,
        };
        let mut set: SampleSet = SampleSet::new(layout, metadata);
        for index in 0..geometry.dim().0 {
            let point: Array1<f64> = geometry.slice(s![index, ..]).to_owned();
            let descriptor: Array1<f64> = mode.descriptor(point.view())?;
            let mut result: PropertyResult =
                PropertyResult::new(energy.slice(s![index, ..]).to_owned());
            if let Some(ref gradients) = gradient {
                for state in 0..layout.n_states {
                    result
                        .gradients
                        .insert(state, gradients.slice(s![index, state, ..]).to_owned());
                }
            }
            if let Some(ref couplings) = coupling {
                let mut map: HashMap<(usize, usize), Array1<f64>> = HashMap::new();
                for (i, j) in layout.pairs() {
                    let pair: usize = layout.pair_index(i, j);
                    map.insert((i, j), couplings.slice(s![index, pair, ..]).to_owned());
                }
                result.couplings = Some(map);
            }
            set.append(Sample {
                geometry: point,
                descriptor,
                result,
            });
        }
        Ok(set)
    }
}

// npz entry names differ by a ".npy" suffix depending on the writer; try both.
fn read_npz_1d(npz: &mut NpzReader<File>, name: &str) -> Result<Array1<f64>> {
    npz.by_name(name)
        .or_else(|_| npz.by_name(&format!("{}.npy", name)))
        .map_err(|err| DynamicsError::Serialization(format!("{}: {}", name, err)))
}

fn read_npz_1d_i64(npz: &mut NpzReader<File>, name: &str) -> Result<Array1<i64>> {
    npz.by_name(name)
        .or_else(|_| npz.by_name(&format!("{}.npy", name)))
        .map_err(|err| DynamicsError::Serialization(format!("{}: {}", name, err)))
}

fn read_npz_2d(npz: &mut NpzReader<File>, name: &str) -> Result<Array2<f64>> {
    npz.by_name(name)
        .or_else(|_| npz.by_name(&format!("{}.npy", name)))
        .map_err(|err| DynamicsError::Serialization(format!("{}: {}", name, err)))
}

fn read_npz_3d(npz: &mut NpzReader<File>, name: &str) -> Result<Array3<f64>> {
    npz.by_name(name)
        .or_else(|_| npz.by_name(&format!("{}.npy", name)))
        .map_err(|err| DynamicsError::Serialization(format!("{}: {}", name, err)))
}
