use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use walkdir::WalkDir;

use super::{ChunkSink, ChunkStore};
use crate::domain::{Checksum, Chunk};
use crate::error::Result;
use crate::stats::{Stats, StoreCounters};

const TMP_DIR: &str = "tmp";

/// One file per chunk under `root/<first hex byte>/<hex checksum>`.
/// Writers stage into `root/tmp` and publish with a no-clobber rename, so
/// several processes may share one root.
pub struct DiskChunkStore {
    root: PathBuf,
    counters: StoreCounters,
}

impl DiskChunkStore {
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root.join(TMP_DIR))?;
        Ok(Self {
            root: root.to_path_buf(),
            counters: StoreCounters::default(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, checksum: &Checksum) -> PathBuf {
        let name = checksum.to_hex();
        let fan = name.get(..2).unwrap_or("00");
        self.root.join(fan).join(&name)
    }

    /// All stored checksums, sorted.
    pub fn checksums(&self) -> Result<Vec<Checksum>> {
        let mut out = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|e| std::io::Error::new(ErrorKind::Other, e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let parent = entry.path().parent().and_then(|p| p.file_name());
            if parent == Some(OsStr::new(TMP_DIR)) {
                continue;
            }
            if let Some(bytes) = entry.file_name().to_str().and_then(|n| hex::decode(n).ok()) {
                out.push(Checksum(bytes));
            }
        }
        out.sort();
        Ok(out)
    }
}

impl ChunkStore for DiskChunkStore {
    fn chunk(&self, checksum: &Checksum) -> Result<Option<Chunk>> {
        match fs::metadata(self.path_for(checksum)) {
            Ok(md) => {
                self.counters.lookup(true);
                Ok(Some(Chunk {
                    checksum: checksum.clone(),
                    len: md.len(),
                }))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.counters.lookup(false);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn writer(&self, checksum: &Checksum) -> Result<Option<Box<dyn ChunkSink + '_>>> {
        let dest = self.path_for(checksum);
        if dest.exists() {
            self.counters.writer(false);
            return Ok(None);
        }
        let tmp = NamedTempFile::new_in(self.root.join(TMP_DIR))?;
        self.counters.writer(true);
        Ok(Some(Box::new(DiskSink {
            counters: &self.counters,
            out: BufWriter::new(tmp),
            dest,
        })))
    }

    fn open(&self, chunk: &Chunk) -> Result<Box<dyn Read + Send + '_>> {
        Ok(Box::new(File::open(self.path_for(&chunk.checksum))?))
    }

    fn stats(&self) -> Stats {
        self.counters.snapshot()
    }
}

struct DiskSink<'a> {
    counters: &'a StoreCounters,
    out: BufWriter<NamedTempFile>,
    dest: PathBuf,
}

impl Write for DiskSink<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.out.write(buf).inspect_err(|_| self.counters.write_failure())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.out.flush()
    }
}

impl ChunkSink for DiskSink<'_> {
    fn commit(self: Box<Self>) -> Result<()> {
        let DiskSink {
            counters,
            out,
            dest,
        } = *self;
        publish(out, &dest).inspect_err(|_| counters.write_failure())?;
        counters.commit();
        Ok(())
    }
}

fn publish(out: BufWriter<NamedTempFile>, dest: &Path) -> Result<()> {
    let tmp = out.into_inner().map_err(|e| e.into_error())?;
    tmp.as_file().sync_all()?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    match tmp.persist_noclobber(dest) {
        Ok(_) => Ok(()),
        // lost a race against another writer of the same checksum
        Err(_) if dest.exists() => Ok(()),
        Err(e) => Err(e.error.into()),
    }
}
