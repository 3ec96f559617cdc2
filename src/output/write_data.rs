use crate::error::{DynamicsError, Result};
use ndarray::prelude::*;
use ndarray_linalg::c64;
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// One fully completed integration step. The amplitude fields are optional
/// supplements: recorders that omit them restart probabilistic trajectories
/// with a collapsed amplitude vector.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StepRecord {
    pub step: usize,
    pub time: f64,
    pub coordinates: Array1<f64>,
    pub velocities: Array1<f64>,
    pub active_state: usize,
    pub energies: Array1<f64>,
    pub kinetic_energy: f64,
    pub potential_energy: f64,
    pub total_energy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coefficients_real: Option<Array1<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coefficients_imag: Option<Array1<f64>>,
}

impl StepRecord {
    pub fn with_coefficients(mut self, coefficients: ArrayView1<c64>) -> StepRecord {
        self.coefficients_real = Some(coefficients.map(|val| val.re));
        self.coefficients_imag = Some(coefficients.map(|val| val.im));
        self
    }

    /// Reassemble the complex amplitudes, when both parts were recorded.
    pub fn coefficients(&self) -> Option<Array1<c64>> {
        match (&self.coefficients_real, &self.coefficients_imag) {
            (Some(re), Some(im)) => Some(
                re.iter()
                    .zip(im.iter())
                    .map(|(r, i)| c64::new(*r, *i))
                    .collect(),
            ),
            _ => None,
        }
    }
}

/// Append-only store of the per-step records of one trajectory. One record
/// per fully completed step; reopening an existing store reports how many
/// steps are already present, which is what the restart logic builds on.
pub trait TrajectoryRecorder {
    fn append(&mut self, record: &StepRecord) -> Result<()>;

    /// Number of records already present.
    fn n_steps(&self) -> usize;

    /// The last `n` records, oldest first.
    fn tail(&self, n: usize) -> Result<Vec<StepRecord>>;

    /// Discard every record, e.g. when a partial record cannot seed a
    /// restart.
    fn truncate(&mut self) -> Result<()>;
}

/// File-backed recorder writing one yaml document per step, separated by
/// document markers so an existing file can be reopened and counted.
pub struct YamlTrajectoryRecorder {
    path: PathBuf,
    count: usize,
}

impl YamlTrajectoryRecorder {
    /// Open the record store at its default location in the working
    /// directory.
    pub fn open_default() -> Result<Self> {
        Self::open(Path::new(crate::defaults::TRAJECTORY_FILE_NAME))
    }

    pub fn open(path: &Path) -> Result<Self> {
        let count: usize = if path.exists() {
            read_documents(path)?.len()
        } else {
            0
        };
        Ok(YamlTrajectoryRecorder {
            path: path.to_path_buf(),
            count,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TrajectoryRecorder for YamlTrajectoryRecorder {
    fn append(&mut self, record: &StepRecord) -> Result<()> {
        let mut document: String = String::from("---\n");
        document.push_str(&serde_yaml::to_string(record)?);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut stream = BufWriter::new(file);
        stream.write_all(document.as_bytes())?;
        stream.flush()?;
        self.count += 1;
        Ok(())
    }

    fn n_steps(&self) -> usize {
        self.count
    }

    fn tail(&self, n: usize) -> Result<Vec<StepRecord>> {
        let records: Vec<StepRecord> = read_documents(&self.path)?;
        let skip: usize = records.len().saturating_sub(n);
        Ok(records.into_iter().skip(skip).collect())
    }

    fn truncate(&mut self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        self.count = 0;
        Ok(())
    }
}

fn read_documents(path: &Path) -> Result<Vec<StepRecord>> {
    let contents: String = fs::read_to_string(path)?;
    let mut records: Vec<StepRecord> = Vec::new();
    for document in contents.split("---\n") {
        if document.trim().is_empty() {
            continue;
        }
        let record: StepRecord = serde_yaml::from_str(document).map_err(|err| {
            DynamicsError::Restart(format!("corrupt trajectory record: {}", err))
        })?;
        records.push(record);
    }
    Ok(records)
}

/// In-memory recorder, mainly for tests and embedding callers.
#[derive(Default)]
pub struct MemoryRecorder {
    pub records: Vec<StepRecord>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        MemoryRecorder {
            records: Vec::new(),
        }
    }
}

impl TrajectoryRecorder for MemoryRecorder {
    fn append(&mut self, record: &StepRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn n_steps(&self) -> usize {
        self.records.len()
    }

    fn tail(&self, n: usize) -> Result<Vec<StepRecord>> {
        let skip: usize = self.records.len().saturating_sub(n);
        Ok(self.records[skip..].to_vec())
    }

    fn truncate(&mut self) -> Result<()> {
        self.records.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(step: usize) -> StepRecord {
        StepRecord {
            step,
            time: step as f64 * 0.1,
            coordinates: array![1.0, 2.0],
            velocities: array![0.0, -1.0],
            active_state: 1,
            energies: array![0.0, 0.5],
            kinetic_energy: 0.5,
            potential_energy: 0.5,
            total_energy: 1.0,
            coefficients_real: None,
            coefficients_imag: None,
        }
    }

    #[test]
    fn yaml_recorder_counts_records_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trajectory.yaml");
        {
            let mut recorder: YamlTrajectoryRecorder =
                YamlTrajectoryRecorder::open(&path).unwrap();
            recorder.append(&record(0)).unwrap();
            recorder.append(&record(1)).unwrap();
            recorder.append(&record(2)).unwrap();
            assert_eq!(recorder.n_steps(), 3);
        }
        let reopened: YamlTrajectoryRecorder = YamlTrajectoryRecorder::open(&path).unwrap();
        assert_eq!(reopened.n_steps(), 3);
        let tail: Vec<StepRecord> = reopened.tail(2).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].step, 1);
        assert_eq!(tail[1].step, 2);
    }

    #[test]
    fn truncate_discards_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trajectory.yaml");
        let mut recorder: YamlTrajectoryRecorder = YamlTrajectoryRecorder::open(&path).unwrap();
        recorder.append(&record(0)).unwrap();
        recorder.truncate().unwrap();
        assert_eq!(recorder.n_steps(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn coefficients_round_trip_through_split_parts() {
        let coefficients: Array1<c64> = array![c64::new(0.6, 0.0), c64::new(0.0, -0.8)];
        let stored: StepRecord = record(0).with_coefficients(coefficients.view());
        let restored: Array1<c64> = stored.coefficients().unwrap();
        assert_eq!(restored[0], c64::new(0.6, 0.0));
        assert_eq!(restored[1], c64::new(0.0, -0.8));
    }
}
