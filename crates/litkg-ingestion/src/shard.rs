//! Shard files: one `<index>.json` per worker in a shared directory.

use std::fs;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use litkg_common::Shard;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone)]
pub struct ShardStore {
    dir: PathBuf,
}

impl ShardStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{index}.json"))
    }

    /// Replace every shard file in the directory with `shards`.
    pub fn write_all(&self, shards: &[Shard]) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| self.io(&self.dir, e))?;
        let removed = self.clear()?;
        if removed > 0 {
            debug!(removed, dir = %self.dir.display(), "Removed previous shard files");
        }

        for shard in shards {
            let path = self.path(shard.index);
            let file = fs::File::create(&path).map_err(|e| self.io(&path, e))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, shard)
                .map_err(|e| PipelineError::ShardFormat { path: path.clone(), source: e })?;
            writer.flush().map_err(|e| self.io(&path, e))?;
        }
        info!(shards = shards.len(), dir = %self.dir.display(), "Shard files written");
        Ok(())
    }

    /// Load the shard for one worker. A missing file is an error.
    pub fn load(&self, index: usize) -> Result<Shard> {
        let path = self.path(index);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PipelineError::ShardMissing { index, path });
            }
            Err(e) => return Err(self.io(&path, e)),
        };
        let shard: Shard = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| PipelineError::ShardFormat { path: path.clone(), source: e })?;
        debug!(index, documents = shard.len(), "Shard loaded");
        Ok(shard)
    }

    fn clear(&self) -> Result<usize> {
        let entries = fs::read_dir(&self.dir).map_err(|e| self.io(&self.dir, e))?;
        let mut removed = 0;
        for entry in entries {
            let path = entry.map_err(|e| self.io(&self.dir, e))?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path).map_err(|e| self.io(&path, e))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn io(&self, path: &Path, source: std::io::Error) -> PipelineError {
        PipelineError::ShardIo { path: path.to_path_buf(), source }
    }
}
