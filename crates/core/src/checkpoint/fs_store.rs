//! File-backed checkpoint store.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::unit::{RunId, UnitResult};

use super::store::{decode, encode, CheckpointError, CheckpointStore, PutOutcome};

const FILE_PREFIX: &str = "unit-";
const FILE_SUFFIX: &str = ".json";

/// Stores one JSON file per unit under `<root>/<run id>/`.
///
/// A record is written to a temporary file, synced, and renamed into place,
/// so a reader sees either no record or a complete one, even if the
/// process dies mid-write.
#[derive(Debug)]
pub struct FsCheckpointStore {
    dir: PathBuf,
    run_id: RunId,
    write_lock: Mutex<()>,
}

impl FsCheckpointStore {
    /// Opens (creating if needed) the checkpoint directory for `run_id`.
    pub fn new(root: impl AsRef<Path>, run_id: &RunId) -> Result<Self, CheckpointError> {
        let dir = root.as_ref().join(run_id.as_str());
        fs::create_dir_all(&dir)?;
        debug!("Checkpoint directory: {}", dir.display());
        Ok(Self {
            dir,
            run_id: run_id.clone(),
            write_lock: Mutex::new(()),
        })
    }

    /// Directory holding this run's records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, index: usize) -> PathBuf {
        self.dir
            .join(format!("{}{:06}{}", FILE_PREFIX, index, FILE_SUFFIX))
    }

    fn read_record(&self, index: usize) -> Result<Option<Vec<u8>>, CheckpointError> {
        match fs::read(self.record_path(index)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_record(&self, index: usize, bytes: &[u8]) -> Result<(), CheckpointError> {
        let final_path = self.record_path(index);
        let tmp_path = self
            .dir
            .join(format!(".{}{:06}{}.tmp", FILE_PREFIX, index, FILE_SUFFIX));

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &final_path)?;
        sync_dir(&self.dir)?;
        Ok(())
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

fn parse_index(file_name: &str) -> Option<usize> {
    file_name
        .strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?
        .parse()
        .ok()
}

impl CheckpointStore for FsCheckpointStore {
    fn has(&self, index: usize) -> Result<bool, CheckpointError> {
        Ok(self.record_path(index).try_exists()?)
    }

    fn get(&self, index: usize) -> Result<Option<UnitResult>, CheckpointError> {
        self.read_record(index)?
            .map(|bytes| decode(index, &bytes))
            .transpose()
    }

    fn put(&self, result: &UnitResult) -> Result<PutOutcome, CheckpointError> {
        let bytes = encode(result)?;
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        match self.read_record(result.index)? {
            Some(existing) if existing == bytes => Ok(PutOutcome::Unchanged),
            Some(_) => Err(CheckpointError::Conflict {
                index: result.index,
            }),
            None => {
                self.write_record(result.index, &bytes)?;
                Ok(PutOutcome::Written)
            }
        }
    }

    fn indices(&self) -> Result<Vec<usize>, CheckpointError> {
        let mut indices = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(index) = entry.file_name().to_str().and_then(parse_index) {
                indices.push(index);
            }
        }
        indices.sort_unstable();
        Ok(indices)
    }

    fn run_id(&self) -> Option<&RunId> {
        Some(&self.run_id)
    }
}
