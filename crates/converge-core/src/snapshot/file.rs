//! Directory-backed snapshot store
//!
//! Layout:
//!
//! ```text
//! <root>/
//!   run.lock                 exclusive advisory lock, holds the writer's pid
//!   generations/
//!     00000001.json
//!     00000002.json
//! ```

use super::{Generation, RunLock, SnapshotStore, VerifyReport};
use crate::{ConcurrentRunError, Error, Result};
use converge_fs::RunLockFile;
use converge_fs::io::{read_text, write_atomic_new};
use converge_model::ConfigTree;
use std::path::{Path, PathBuf};

const GENERATIONS_DIR: &str = "generations";
const LOCK_FILE: &str = "run.lock";

/// Stores one JSON file per generation under a state directory.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    root: PathBuf,
}

impl FileSnapshotStore {
    /// Open the store at `root`, creating the directory layout if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let generations = root.join(GENERATIONS_DIR);
        std::fs::create_dir_all(&generations).map_err(|e| converge_fs::Error::io(&generations, e))?;
        tracing::debug!(root = %root.display(), "snapshot store opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generations_dir(&self) -> PathBuf {
        self.root.join(GENERATIONS_DIR)
    }

    fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    fn generation_path(&self, id: u64) -> PathBuf {
        self.generations_dir().join(format!("{id:08}.json"))
    }

    /// Ids of stored generations, ascending. Files that are not named like
    /// generations are ignored.
    fn ids(&self) -> Result<Vec<u64>> {
        let dir = self.generations_dir();
        let entries = std::fs::read_dir(&dir).map_err(|e| converge_fs::Error::io(&dir, e))?;

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| converge_fs::Error::io(&dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
            {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    fn read(&self, id: u64) -> Result<Generation> {
        let path = self.generation_path(id);
        if !path.exists() {
            return Err(Error::GenerationNotFound { id });
        }

        let content = read_text(&path)?;
        let generation: Generation =
            serde_json::from_str(&content).map_err(|e| Error::CorruptGeneration {
                id,
                message: format!("unreadable record: {e}"),
            })?;
        if generation.id() != id {
            return Err(Error::CorruptGeneration {
                id,
                message: format!("file holds generation {}", generation.id()),
            });
        }
        generation.verify()?;
        Ok(generation)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn latest(&self) -> Result<Option<Generation>> {
        match self.ids()?.last() {
            Some(&id) => self.read(id).map(Some),
            None => Ok(None),
        }
    }

    fn get(&self, id: u64) -> Result<Generation> {
        self.read(id)
    }

    fn list(&self) -> Result<Vec<Generation>> {
        self.ids()?.into_iter().map(|id| self.read(id)).collect()
    }

    fn lock(&self) -> Result<RunLock> {
        match RunLockFile::try_acquire(&self.lock_path()) {
            Ok(lock) => Ok(RunLock::file(lock)),
            Err(converge_fs::Error::LockHeld { path, holder }) => Err(ConcurrentRunError {
                resource: path.display().to_string(),
                holder,
            }
            .into()),
            Err(e) => Err(e.into()),
        }
    }

    fn record_locked(&self, lock: &RunLock, tree: ConfigTree) -> Result<Generation> {
        let lock_path = self.lock_path();
        if !lock.holds_file(&lock_path) {
            return Err(Error::ForeignLock {
                resource: lock_path.display().to_string(),
            });
        }
        let id = self.ids()?.last().map_or(1, |last| last + 1);
        let generation = Generation::new(id, tree)?;
        let content = serde_json::to_vec_pretty(&generation)?;
        write_atomic_new(&self.generation_path(id), &content)?;
        tracing::info!(id, checksum = %generation.checksum(), "generation recorded");
        Ok(generation)
    }

    /// Unlike [`SnapshotStore::list`], keeps going past a bad generation
    /// and also reports gaps in the id sequence.
    fn verify(&self) -> Result<VerifyReport> {
        let mut report = VerifyReport::default();
        let mut expected = 1;

        for id in self.ids()? {
            match id - expected {
                0 => {}
                1 => report.problems.push(format!("Generation {expected} is missing")),
                _ => report
                    .problems
                    .push(format!("Generations {expected} to {} are missing", id - 1)),
            }
            expected = id + 1;

            report.checked += 1;
            if let Err(e) = self.read(id) {
                tracing::warn!(id, error = %e, "generation failed verification");
                report.problems.push(e.to_string());
            }
        }
        Ok(report)
    }
}
