use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use time::OffsetDateTime;

use crate::domain::StorageHostChunkList;
use crate::error::{ChunkdecError, Result};

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Meta {
    pub created: i64,
    pub tool: String,
}

impl Meta {
    /// Stamped with the current time, or zero when `deterministic`.
    pub fn new(tool: &str, deterministic: bool) -> Self {
        let created = if deterministic {
            0
        } else {
            OffsetDateTime::now_utc().unix_timestamp()
        };
        Self {
            created,
            tool: tool.to_string(),
        }
    }
}

/// Chunk metadata for one retrieval: the containers in stream-fetch order.
/// A container's position here is its `container_index`.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub containers: Vec<StorageHostChunkList>,
    pub meta: Meta,
}

impl Manifest {
    pub fn container(&self, index: usize) -> Result<&StorageHostChunkList> {
        self.containers.get(index).ok_or_else(|| {
            ChunkdecError::Format(format!(
                "container {index} out of range ({} containers)",
                self.containers.len()
            ))
        })
    }

    pub fn read_from(r: impl Read) -> Result<Self> {
        ciborium::de::from_reader(r)
            .map_err(|e| ChunkdecError::Format(format!("manifest decode: {e}")))
    }

    pub fn write_to(&self, w: impl Write) -> Result<()> {
        ciborium::ser::into_writer(self, w)
            .map_err(|e| ChunkdecError::Format(format!("manifest encode: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::read_from(BufReader::new(File::open(path)?))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        self.write_to(&mut w)?;
        w.flush()?;
        Ok(())
    }
}
