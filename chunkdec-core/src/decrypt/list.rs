use std::collections::HashMap;
use std::io::{ErrorKind, Read};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::container::walker::{OffsetWalker, Step};
use crate::crypto::cfb::CfbReader;
use crate::crypto::key::ChunkKey;
use crate::domain::{Checksum, Chunk, ChunkInfo, ChunkReference, StorageHostChunkList};
use crate::error::Result;
use crate::store::{ChunkSink, ChunkStore};
use crate::util::bounded::Bounded;

#[derive(Clone, Debug)]
pub struct DecryptOptions {
    /// Copy buffer for decrypting into the store and for draining skipped bytes.
    pub buf_size: usize,
}

impl Default for DecryptOptions {
    fn default() -> Self {
        Self {
            buf_size: 64 * 1024,
        }
    }
}

/// Decrypts one storage host stream, a concatenation of chunks encrypted
/// with wrapped `0x01` keys, into a chunk store.
///
/// Infos may repeat an offset with a different wrapped key. Those keys
/// unwrap to the same raw key, so the first info at an offset stands for
/// all of them and later ones are skipped without touching the stream.
pub struct ChunkListDecrypter {
    store: Arc<dyn ChunkStore>,
    container: StorageHostChunkList,
    container_index: u64,
    opts: DecryptOptions,
}

impl ChunkListDecrypter {
    pub fn new(
        store: Arc<dyn ChunkStore>,
        container: StorageHostChunkList,
        container_index: u64,
    ) -> Self {
        Self::with_options(store, container, container_index, DecryptOptions::default())
    }

    pub fn with_options(
        store: Arc<dyn ChunkStore>,
        container: StorageHostChunkList,
        container_index: u64,
        opts: DecryptOptions,
    ) -> Self {
        Self {
            store,
            container,
            container_index,
            opts,
        }
    }

    /// Consume `stream` and return every chunk it resolved. The stream is
    /// dropped before this returns, on success and on error alike.
    ///
    /// A chunk whose offset runs ahead of the stream ends the walk; the
    /// chunks resolved up to that point are still returned.
    pub fn apply<R: Read>(&self, mut stream: R) -> Result<HashMap<ChunkReference, Chunk>> {
        trace!(
            container = self.container_index,
            infos = self.container.chunk_infos.len(),
            "<< apply()"
        );

        let mut buf = vec![0u8; self.opts.buf_size.max(1)];
        let mut chunks = HashMap::new();
        for step in OffsetWalker::new(&self.container, self.container_index) {
            match step {
                Step::Kept { reference, info } => {
                    if let Some(chunk) = self.chunk(&mut stream, info, &mut buf)? {
                        chunks.insert(reference, chunk);
                    }
                }
                Step::Duplicate { reference, info } => {
                    debug!(
                        %reference,
                        offset = info.chunk_offset,
                        "-- apply() - duplicate offset chunk info"
                    );
                }
                Step::Misordered {
                    reference,
                    info,
                    expected,
                } => {
                    warn!(
                        %reference,
                        offset = info.chunk_offset,
                        expected,
                        "-- apply() - bad offset, abandoning rest of container"
                    );
                }
            }
        }

        trace!(chunks = chunks.len(), ">> apply()");
        Ok(chunks)
    }

    /// Resolve one kept chunk. Its `chunk_length` bytes are consumed from
    /// `stream` whatever the outcome, so the next chunk starts aligned.
    fn chunk<R: Read>(
        &self,
        stream: &mut R,
        info: &ChunkInfo,
        buf: &mut [u8],
    ) -> Result<Option<Chunk>> {
        let mut bounded = Bounded::new(stream, info.chunk_length as u64);
        let chunk = self.resolve(&mut bounded, info, buf);
        let drained = bounded.drain(buf);
        let chunk = chunk?;
        drained?;
        Ok(chunk)
    }

    fn resolve<R: Read>(
        &self,
        bounded: &mut Bounded<'_, R>,
        info: &ChunkInfo,
        buf: &mut [u8],
    ) -> Result<Option<Chunk>> {
        let checksum = Checksum::from(info.chunk_checksum.as_slice());
        if let Some(chunk) = self.store.chunk(&checksum)? {
            debug!(%checksum, "-- chunk() - chunk present in store");
            return Ok(Some(chunk));
        }
        debug!(%checksum, "-- chunk() - chunk not present in store");

        match ChunkKey::unwrap_key(&info.chunk_encryption_key) {
            Ok(key) => {
                let len = info.chunk_length as u64;
                self.store_chunk(CfbReader::new(bounded, &key), len, &checksum, buf)?
            }
            Err(e) => warn!(
                %checksum,
                key = %hex::encode(&info.chunk_encryption_key),
                "-- decrypt() - {e}"
            ),
        }
        self.store.chunk(&checksum)
    }

    fn store_chunk(
        &self,
        mut src: impl Read,
        len: u64,
        checksum: &Checksum,
        buf: &mut [u8],
    ) -> Result<()> {
        let sink = match self.store.writer(checksum) {
            Ok(Some(sink)) => sink,
            Ok(None) => {
                debug!(%checksum, "-- store() - store now already contains chunk");
                return Ok(());
            }
            Err(e) => {
                warn!(%checksum, "-- store() - store refused writer: {e}");
                return Ok(());
            }
        };
        debug!(%checksum, "-- store() - copying chunk into store");
        copy_into_sink(&mut src, sink, len, checksum, buf)
    }
}

/// Stream `src` into `sink` and commit once exactly `len` bytes went through.
/// Failures of the sink are logged and the sink abandoned, but `src` is read
/// to the end either way; only read failures are returned.
fn copy_into_sink(
    src: &mut impl Read,
    sink: Box<dyn ChunkSink + '_>,
    len: u64,
    checksum: &Checksum,
    buf: &mut [u8],
) -> Result<()> {
    let mut sink = Some(sink);
    let mut copied = 0u64;
    loop {
        let n = match src.read(buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        copied += n as u64;
        if let Some(w) = sink.as_mut() {
            if let Err(e) = w.write_all(&buf[..n]) {
                warn!(%checksum, "-- copy() - chunk store write failed: {e}");
                sink = None;
            }
        }
    }
    if copied < len {
        // stream ended inside the chunk; the caller's drain reports it
        return Ok(());
    }
    if let Some(w) = sink {
        if let Err(e) = w.commit() {
            warn!(%checksum, "-- copy() - chunk store commit failed: {e}");
        }
    }
    Ok(())
}

/// One-shot form of [`ChunkListDecrypter::apply`].
pub fn decrypt_chunk_list<R: Read>(
    store: Arc<dyn ChunkStore>,
    stream: R,
    container: StorageHostChunkList,
    container_index: u64,
) -> Result<HashMap<ChunkReference, Chunk>> {
    ChunkListDecrypter::new(store, container, container_index).apply(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChunkdecError;
    use crate::pack::sealer::{SealOptions, seal_all};
    use crate::stats::Stats;
    use crate::store::memory::MemoryChunkStore;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Reader that records when it is dropped and can fail after `fail_after` bytes.
    struct Tracked<'a> {
        data: &'a [u8],
        pos: usize,
        fail_after: Option<usize>,
        closed: Arc<AtomicBool>,
    }

    impl<'a> Tracked<'a> {
        fn new(data: &'a [u8]) -> (Self, Arc<AtomicBool>) {
            let closed = Arc::new(AtomicBool::new(false));
            let r = Self {
                data,
                pos: 0,
                fail_after: None,
                closed: closed.clone(),
            };
            (r, closed)
        }
    }

    impl Read for Tracked<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let mut end = self.data.len();
            if let Some(limit) = self.fail_after {
                if self.pos >= limit {
                    return Err(std::io::Error::new(ErrorKind::ConnectionReset, "peer gone"));
                }
                end = end.min(limit);
            }
            let n = buf.len().min(end - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    impl Drop for Tracked<'_> {
        fn drop(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn info(offset: u32, length: u32, checksum: u8, key: Vec<u8>) -> ChunkInfo {
        ChunkInfo {
            chunk_offset: offset,
            chunk_length: length,
            chunk_checksum: vec![checksum; 20],
            chunk_encryption_key: key,
        }
    }

    fn raw_key(b: u8) -> Vec<u8> {
        ChunkKey([b; 16]).wrap()
    }

    fn list(infos: Vec<ChunkInfo>) -> StorageHostChunkList {
        StorageHostChunkList {
            host: None,
            chunk_infos: infos,
        }
    }

    fn stored(store: &MemoryChunkStore, checksum: &[u8]) -> Vec<u8> {
        store.get(&Checksum::from(checksum)).expect("chunk stored").to_vec()
    }

    // small buffer so chunks span several reads
    fn decrypter(
        store: &Arc<MemoryChunkStore>,
        container: StorageHostChunkList,
    ) -> ChunkListDecrypter {
        ChunkListDecrypter::with_options(
            store.clone(),
            container,
            0,
            DecryptOptions { buf_size: 7 },
        )
    }

    #[test]
    fn known_ciphertext_decrypts_to_zero_block() {
        // AES-128 zero key applied to the zero IV; with CFB this is the
        // ciphertext of sixteen zero bytes.
        let ct = hex::decode("66e94bd4ef8a2c3b884cfa59ca342b2e").unwrap();
        let store = Arc::new(MemoryChunkStore::new());
        let container = list(vec![info(0, 16, 0xaa, raw_key(0))]);

        let chunks = decrypter(&store, container).apply(&ct[..]).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(stored(&store, &[0xaa; 20]), vec![0u8; 16]);
    }

    #[test]
    fn two_chunks_each_under_their_own_key() {
        let pt0 = b"0123456789abcdef";
        let pt1 = b"fedcba9876543210";
        let (container, stream) = seal_all([pt0, pt1], SealOptions::default()).unwrap();
        assert_eq!(stream.len(), 32);
        let store = Arc::new(MemoryChunkStore::new());

        let chunks = ChunkListDecrypter::new(store.clone(), container.clone(), 4)
            .apply(&stream[..])
            .unwrap();

        assert_eq!(chunks.len(), 2);
        for (i, (pt, ci)) in [pt0, pt1].iter().zip(&container.chunk_infos).enumerate() {
            let chunk = &chunks[&ChunkReference::new(4, i as u64)];
            assert_eq!(chunk.checksum.as_bytes(), ci.chunk_checksum.as_slice());
            assert_eq!(chunk.len, 16);
            assert_eq!(stored(&store, &ci.chunk_checksum), pt.to_vec());
        }
    }

    #[test]
    fn duplicate_offset_consumes_stream_once() {
        let (mut container, mut stream) =
            seal_all(["duplicated chunk"], SealOptions::default()).unwrap();
        let mut dup = container.chunk_infos[0].clone();
        dup.chunk_encryption_key = raw_key(0x55);
        container.chunk_infos.push(dup);
        stream.extend_from_slice(b"TRAILER");

        let store = Arc::new(MemoryChunkStore::new());
        let mut src = &stream[..];
        let chunks = decrypter(&store, container).apply(&mut src).unwrap();

        assert_eq!(chunks.len(), 1);
        assert!(chunks.contains_key(&ChunkReference::new(0, 0)));
        assert_eq!(src, b"TRAILER");
    }

    #[test]
    fn overlapping_offset_is_skipped_without_overrun() {
        let (container, mut stream) = seal_all(["ten bytes!"], SealOptions::default()).unwrap();
        let mut infos = container.chunk_infos;
        infos.push(info(5, 10, 0xbb, raw_key(1)));
        stream.extend_from_slice(b"rest");

        let store = Arc::new(MemoryChunkStore::new());
        let mut src = &stream[..];
        let chunks = decrypter(&store, list(infos)).apply(&mut src).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(src, b"rest");
        assert!(store.get(&Checksum(vec![0xbb; 20])).is_none());
    }

    #[test]
    fn first_entry_past_zero_yields_nothing_and_closes_stream() {
        let stream = [0u8; 32];
        let (reader, closed) = Tracked::new(&stream);
        let store = Arc::new(MemoryChunkStore::new());

        let chunks = decrypter(&store, list(vec![info(5, 16, 1, raw_key(1))]))
            .apply(reader)
            .unwrap();

        assert!(chunks.is_empty());
        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(store.stats(), Stats::default());
    }

    #[test]
    fn gap_truncates_the_rest_of_the_container() {
        let (container, stream) =
            seal_all(["aaaa", "bbbb", "cccc"], SealOptions::default()).unwrap();
        let mut infos = container.chunk_infos.clone();
        // chunk 1 claims to start at 8; the walk stops there even though
        // chunk 2 would line up with it.
        infos[1].chunk_offset = 8;
        infos[2].chunk_offset = 12;

        let store = Arc::new(MemoryChunkStore::new());
        let mut src = &stream[..];
        let chunks = decrypter(&store, list(infos)).apply(&mut src).unwrap();

        let refs: Vec<_> = chunks.keys().copied().collect();
        assert_eq!(refs, vec![ChunkReference::new(0, 0)]);
        assert_eq!(src.len(), 8);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unsupported_keys_skip_chunk_but_keep_alignment() {
        let (container, stream) =
            seal_all(["short key", "wrong tag", "good key!"], SealOptions::default()).unwrap();
        let mut infos = container.chunk_infos.clone();
        infos[0].chunk_encryption_key = vec![0x01; 16];
        let mut tagged = vec![0x02];
        tagged.extend([0x11; 16]);
        infos[1].chunk_encryption_key = tagged;

        let store = Arc::new(MemoryChunkStore::new());
        let chunks = decrypter(&store, list(infos.clone())).apply(&stream[..]).unwrap();

        assert_eq!(chunks.len(), 1);
        let good = &chunks[&ChunkReference::new(0, 2)];
        assert_eq!(good.checksum.as_bytes(), infos[2].chunk_checksum.as_slice());
        assert_eq!(stored(&store, &infos[2].chunk_checksum), b"good key!");
        assert_eq!(store.stats().writers_opened, 1);
    }

    #[test]
    fn second_run_resolves_from_store_without_writing() {
        let (container, stream) =
            seal_all(["one", "two", "three"], SealOptions::default()).unwrap();
        let store = Arc::new(MemoryChunkStore::new());
        let d = decrypter(&store, container);

        let first = d.apply(&stream[..]).unwrap();
        let after_first = store.stats();
        assert_eq!(after_first.commits, 3);
        assert_eq!(after_first.hits, 3);

        let (reader, closed) = Tracked::new(&stream);
        let second = d.apply(reader).unwrap();
        let after_second = store.stats();

        assert_eq!(first, second);
        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(after_second.commits, 3);
        assert_eq!(after_second.writers_opened, 3);
        assert_eq!(after_second.hits - after_first.hits, 3);
    }

    #[test]
    fn store_hit_still_drains_its_bytes() {
        let (container, stream) = seal_all(["cached", "fresh!"], SealOptions::default()).unwrap();
        let store = Arc::new(MemoryChunkStore::new());
        let cached = Checksum::from(container.chunk_infos[0].chunk_checksum.as_slice());
        store.insert(cached.clone(), b"from an earlier run").unwrap();

        let chunks = decrypter(&store, container.clone()).apply(&stream[..]).unwrap();

        assert_eq!(chunks[&ChunkReference::new(0, 0)].len, 19);
        assert_eq!(stored(&store, &container.chunk_infos[1].chunk_checksum), b"fresh!");
    }

    #[test]
    fn read_failure_is_fatal_and_still_closes() {
        let (container, stream) = seal_all(["first", "second"], SealOptions::default()).unwrap();
        let (mut reader, closed) = Tracked::new(&stream);
        reader.fail_after = Some(7);
        let store = Arc::new(MemoryChunkStore::new());

        let err = decrypter(&store, container.clone()).apply(reader).unwrap_err();

        match err {
            ChunkdecError::Io(e) => assert_eq!(e.kind(), ErrorKind::ConnectionReset),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(closed.load(Ordering::SeqCst));
        // the chunk that was fully read made it, the broken one did not
        assert_eq!(store.len(), 1);
        let broken = Checksum::from(container.chunk_infos[1].chunk_checksum.as_slice());
        assert!(store.get(&broken).is_none());
    }

    #[test]
    fn short_stream_is_an_error_and_commits_nothing_partial() {
        let (container, stream) =
            seal_all(["complete", "cut short"], SealOptions::default()).unwrap();
        let store = Arc::new(MemoryChunkStore::new());

        let err = decrypter(&store, container)
            .apply(&stream[..stream.len() - 3])
            .unwrap_err();

        assert!(matches!(err, ChunkdecError::Io(ref e) if e.kind() == ErrorKind::UnexpectedEof));
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().commits, 1);
    }

    /// Memory store whose sinks fail for one checksum, or that lets another
    /// writer win the race for it.
    struct Unruly {
        inner: MemoryChunkStore,
        target: Checksum,
        mode: Mode,
    }

    enum Mode {
        FailWrites,
        LoseRace,
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl ChunkSink for BrokenSink {
        fn commit(self: Box<Self>) -> Result<()> {
            panic!("a failed sink is never committed");
        }
    }

    impl ChunkStore for Unruly {
        fn chunk(&self, checksum: &Checksum) -> Result<Option<Chunk>> {
            self.inner.chunk(checksum)
        }

        fn writer(&self, checksum: &Checksum) -> Result<Option<Box<dyn ChunkSink + '_>>> {
            if *checksum != self.target {
                return self.inner.writer(checksum);
            }
            match self.mode {
                Mode::FailWrites => Ok(Some(Box::new(BrokenSink))),
                Mode::LoseRace => {
                    self.inner.insert(checksum.clone(), b"written elsewhere")?;
                    Ok(None)
                }
            }
        }

        fn open(&self, chunk: &Chunk) -> Result<Box<dyn Read + Send + '_>> {
            self.inner.open(chunk)
        }

        fn stats(&self) -> Stats {
            self.inner.stats()
        }
    }

    #[test]
    fn failing_sink_is_swallowed() {
        let (container, stream) = seal_all(["doomed", "healthy"], SealOptions::default()).unwrap();
        let store = Arc::new(Unruly {
            inner: MemoryChunkStore::new(),
            target: Checksum::from(container.chunk_infos[0].chunk_checksum.as_slice()),
            mode: Mode::FailWrites,
        });

        let chunks = decrypt_chunk_list(store.clone(), &stream[..], container.clone(), 0).unwrap();

        assert_eq!(chunks.len(), 1);
        assert!(chunks.contains_key(&ChunkReference::new(0, 1)));
        assert_eq!(
            &*store
                .inner
                .get(&Checksum::from(container.chunk_infos[1].chunk_checksum.as_slice()))
                .unwrap(),
            b"healthy"
        );
    }

    #[test]
    fn declined_writer_resolves_to_the_winning_copy() {
        let (container, stream) = seal_all(["raced", "after"], SealOptions::default()).unwrap();
        let store = Arc::new(Unruly {
            inner: MemoryChunkStore::new(),
            target: Checksum::from(container.chunk_infos[0].chunk_checksum.as_slice()),
            mode: Mode::LoseRace,
        });

        let chunks = decrypt_chunk_list(store.clone(), &stream[..], container, 2).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[&ChunkReference::new(2, 0)].len, 17);
        assert_eq!(chunks[&ChunkReference::new(2, 1)].len, 5);
    }

    #[test]
    fn decrypter_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ChunkListDecrypter>();

        let (container, stream) = seal_all(["shared", "store"], SealOptions::default()).unwrap();
        let store = Arc::new(MemoryChunkStore::new());
        std::thread::scope(|s| {
            for _ in 0..4 {
                let d = decrypter(&store, container.clone());
                let stream = &stream;
                s.spawn(move || assert_eq!(d.apply(&stream[..]).unwrap().len(), 2));
            }
        });
        assert_eq!(store.len(), 2);
    }
}
