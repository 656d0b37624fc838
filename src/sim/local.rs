/// Local, file-backed collaborators for running without a server.
///
///   LocalProvisioner   : generates a mixed drill from a `RandomSource`
///   FileGridStore      : grid.dat, key-value lines (`lit=`, `capacity=`)
///   FileObservationLog : observations.toml, one `[[observation]]` per record
///
/// The observation log is append-only. Session ids continue from the
/// highest id already in the log, so ids stay unique across runs.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::exercise::{Exercise, Operation, SubmissionRecord};
use crate::domain::grid;
use crate::domain::random::RandomSource;
use crate::error::{GridFetchError, LogFlushError, ProvisioningError};
use super::ports::{GridState, GridStateSource, ObservationSink, SessionProvisioner};
use super::session::Provisioned;

pub const GRID_FILE: &str = "grid.dat";
pub const OBSERVATION_FILE: &str = "observations.toml";

// ══════════════════════════════════════════════════════════════
// Provisioning
// ══════════════════════════════════════════════════════════════

pub struct LocalProvisioner {
    rng: Box<dyn RandomSource + Send>,
    next_session_id: u64,
    next_exercise_id: u64,
}

impl LocalProvisioner {
    pub fn new(rng: Box<dyn RandomSource + Send>, first_session_id: u64) -> Self {
        LocalProvisioner { rng, next_session_id: first_session_id.max(1), next_exercise_id: 1 }
    }

    fn generate(&mut self) -> Exercise {
        let id = self.next_exercise_id;
        self.next_exercise_id += 1;
        match self.rng.next_int(0, 2) {
            0 => {
                let a = self.rng.next_int(1, 99) as i64;
                let b = self.rng.next_int(1, 99) as i64;
                Exercise::new(id, a, b, Operation::Addition)
            }
            1 => {
                let a = self.rng.next_int(1, 99) as i64;
                let b = self.rng.next_int(1, 99) as i64;
                // Larger operand first: results are never negative.
                Exercise::new(id, a.max(b), a.min(b), Operation::Subtraction)
            }
            _ => {
                let a = self.rng.next_int(2, 12) as i64;
                let b = self.rng.next_int(2, 12) as i64;
                Exercise::new(id, a, b, Operation::Multiplication)
            }
        }
    }
}

impl SessionProvisioner for LocalProvisioner {
    async fn provision_session(&mut self, volume: u32) -> Result<Provisioned, ProvisioningError> {
        if volume == 0 {
            return Err(ProvisioningError::EmptyExerciseList);
        }
        let session_id = self.next_session_id;
        self.next_session_id += 1;
        let exercises = (0..volume).map(|_| self.generate()).collect();
        debug!(session_id, volume, "provisioned local session");
        Ok(Provisioned { session_id: Some(session_id), exercises })
    }
}

// ══════════════════════════════════════════════════════════════
// Grid state
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct FileGridStore {
    path: PathBuf,
    capacity: u32,
}

impl FileGridStore {
    /// `capacity` is used until a file records its own.
    pub fn new(data_dir: &Path, capacity: u32) -> Self {
        FileGridStore { path: data_dir.join(GRID_FILE), capacity }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored state. A missing file is a fresh, empty grid.
    pub fn load(&self) -> Result<GridState, GridFetchError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => parse_grid(&content, self.capacity),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(GridState { lit_count: 0, capacity: self.capacity })
            }
            Err(e) => Err(GridFetchError(format!("{}: {e}", self.path.display()))),
        }
    }

    /// Write the lit count, clamped to capacity.
    pub fn persist(&self, lit_count: u32) -> std::io::Result<()> {
        let lit = lit_count.min(self.capacity);
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, format!("lit={}\ncapacity={}\n", lit, self.capacity))?;
        debug!(lit, path = %self.path.display(), "grid state saved");
        Ok(())
    }
}

fn parse_grid(content: &str, default_capacity: u32) -> Result<GridState, GridFetchError> {
    let mut lit = None;
    let mut capacity = default_capacity;
    for line in content.lines() {
        let line = line.trim();
        if let Some(val) = line.strip_prefix("lit=") {
            lit = Some(val.trim().parse::<u32>().map_err(|e| GridFetchError(format!("lit: {e}")))?);
        } else if let Some(val) = line.strip_prefix("capacity=") {
            capacity = val.trim().parse::<u32>().map_err(|e| GridFetchError(format!("capacity: {e}")))?;
        }
    }
    let lit = lit.ok_or_else(|| GridFetchError("missing lit=".into()))?;
    if capacity == 0 || capacity > grid::MAX_CAPACITY {
        return Err(GridFetchError(format!("capacity {capacity} out of range")));
    }
    Ok(GridState { lit_count: lit.min(capacity), capacity })
}

impl GridStateSource for FileGridStore {
    async fn fetch_grid_state(&mut self) -> Result<GridState, GridFetchError> {
        self.load()
    }
}

// ══════════════════════════════════════════════════════════════
// Observation log
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationRow {
    pub session_id: u64,
    pub exercise_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_answer: Option<i64>,
    pub elapsed_seconds: u64,
    pub is_correct: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ObservationBatch {
    #[serde(default)]
    observation: Vec<ObservationRow>,
}

#[derive(Clone, Debug)]
pub struct FileObservationLog {
    path: PathBuf,
}

impl FileObservationLog {
    pub fn new(data_dir: &Path) -> Self {
        FileObservationLog { path: data_dir.join(OBSERVATION_FILE) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every row logged so far. A missing file is an empty log.
    pub fn read_all(&self) -> Result<Vec<ObservationRow>, LogFlushError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(LogFlushError::Sink(e.to_string())),
        };
        let batch: ObservationBatch =
            toml::from_str(&content).map_err(|e| LogFlushError::Sink(e.to_string()))?;
        Ok(batch.observation)
    }

    /// One past the highest session id in the log.
    pub fn next_session_id(&self) -> u64 {
        self.read_all()
            .ok()
            .and_then(|rows| rows.iter().map(|r| r.session_id).max())
            .map_or(1, |max| max + 1)
    }

    pub fn append(&self, session_id: u64, records: &[SubmissionRecord]) -> Result<(), LogFlushError> {
        if records.is_empty() {
            return Ok(());
        }
        let batch = ObservationBatch {
            observation: records
                .iter()
                .map(|r| ObservationRow {
                    session_id,
                    exercise_id: r.exercise_id,
                    proposed_answer: r.proposed_answer,
                    elapsed_seconds: r.elapsed_seconds,
                    is_correct: r.is_correct,
                })
                .collect(),
        };
        let text = toml::to_string(&batch).map_err(|e| LogFlushError::Sink(e.to_string()))?;

        let sink_err = |e: std::io::Error| LogFlushError::Sink(format!("{}: {e}", self.path.display()));
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(sink_err)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).map_err(sink_err)?;
        file.write_all(text.as_bytes()).map_err(sink_err)?;
        file.write_all(b"\n").map_err(sink_err)?;
        Ok(())
    }
}

impl ObservationSink for FileObservationLog {
    async fn flush_observations(&mut self, session_id: u64, records: Vec<SubmissionRecord>) -> Result<(), LogFlushError> {
        self.append(session_id, &records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::random::{RngSource, ScriptedRandom};

    fn record(id: u64, answer: Option<i64>, ok: bool) -> SubmissionRecord {
        SubmissionRecord { exercise_id: id, proposed_answer: answer, elapsed_seconds: 3, is_correct: ok }
    }

    #[tokio::test]
    async fn provisioner_builds_each_operation_from_draws() {
        let rng = ScriptedRandom::new().ints(&[0, 12, 30, 1, 7, 40, 2, 6, 9]);
        let mut p = LocalProvisioner::new(Box::new(rng), 5);
        let out = p.provision_session(3).await.unwrap();
        assert_eq!(out.session_id, Some(5));
        let ex = &out.exercises;
        assert_eq!((ex[0].operation, ex[0].expected_solution), (Operation::Addition, 42));
        assert_eq!((ex[1].operator_left, ex[1].operator_right, ex[1].expected_solution), (40, 7, 33));
        assert_eq!((ex[2].operation, ex[2].expected_solution), (Operation::Multiplication, 54));
        assert_eq!(ex.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn provisioner_ids_are_sequential_and_results_non_negative() {
        let mut p = LocalProvisioner::new(Box::new(RngSource::seeded(11)), 1);
        let a = p.provision_session(50).await.unwrap();
        let b = p.provision_session(50).await.unwrap();
        assert_eq!((a.session_id, b.session_id), (Some(1), Some(2)));
        assert!(a.exercises.iter().chain(&b.exercises).all(|e| e.expected_solution >= 0));
        assert_eq!(b.exercises[0].id, 51);
    }

    #[tokio::test]
    async fn zero_volume_is_rejected() {
        let mut p = LocalProvisioner::new(Box::new(ScriptedRandom::new()), 1);
        assert_eq!(p.provision_session(0).await.unwrap_err(), ProvisioningError::EmptyExerciseList);
    }

    #[tokio::test]
    async fn grid_store_defaults_then_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileGridStore::new(dir.path(), 500);
        assert_eq!(store.fetch_grid_state().await.unwrap(), GridState { lit_count: 0, capacity: 500 });

        store.persist(812).unwrap();
        assert_eq!(store.fetch_grid_state().await.unwrap(), GridState { lit_count: 500, capacity: 500 });
        store.persist(42).unwrap();
        assert_eq!(store.load().unwrap().lit_count, 42);
    }

    #[test]
    fn corrupt_grid_file_is_a_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileGridStore::new(dir.path(), 500);
        std::fs::write(store.path(), "lit=lots\n").unwrap();
        assert!(store.load().is_err());
        std::fs::write(store.path(), "capacity=9\n").unwrap();
        assert!(store.load().is_err());
    }

    #[test]
    fn out_of_range_capacity_is_a_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileGridStore::new(dir.path(), 500);
        std::fs::write(store.path(), "lit=3\ncapacity=4294967295\n").unwrap();
        assert!(store.load().is_err());
        std::fs::write(store.path(), "lit=0\ncapacity=0\n").unwrap();
        assert!(store.load().is_err());
        std::fs::write(store.path(), "lit=3\ncapacity=9\n").unwrap();
        assert_eq!(store.load().unwrap(), GridState { lit_count: 3, capacity: 9 });
    }

    #[tokio::test]
    async fn observation_log_appends_batches() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = FileObservationLog::new(dir.path());
        assert_eq!(log.next_session_id(), 1);

        log.flush_observations(3, vec![record(1, Some(4), true), record(2, None, false)]).await.unwrap();
        log.flush_observations(4, vec![record(7, Some(-2), false)]).await.unwrap();

        let rows = log.read_all().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].proposed_answer, None);
        assert_eq!(rows[2].session_id, 4);
        assert_eq!(rows[2].proposed_answer, Some(-2));
        assert_eq!(log.next_session_id(), 5);

        let text = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(text.matches("[[observation]]").count(), 3);
    }

    #[tokio::test]
    async fn empty_batch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = FileObservationLog::new(dir.path());
        log.flush_observations(1, Vec::new()).await.unwrap();
        assert!(!log.path().exists());
    }
}
