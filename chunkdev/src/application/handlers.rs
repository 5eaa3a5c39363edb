use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use chunkdec_core::container::manifest::{Manifest, Meta};
use chunkdec_core::container::walker::{OffsetWalker, Step};
use chunkdec_core::crypto::hex::{parse_hex, parse_hex_array};
use chunkdec_core::error::Result;
use chunkdec_core::store::disk::DiskChunkStore;
use chunkdec_core::store_factory::{Backend, open_store};
use chunkdec_core::{
    Checksum, ChunkListDecrypter, ChunkSealer, ChunkStore, DecryptOptions, SealOptions,
};
use tracing::info;

pub fn handle_seal(
    stream_out: PathBuf,
    manifest_out: PathBuf,
    inputs: Vec<PathBuf>,
    key_hex: Option<String>,
    host: Option<String>,
    deterministic: bool,
) -> Result<()> {
    let key = key_hex.map(|h| parse_hex_array::<16>(&h)).transpose()?;
    let opts = SealOptions { key, host };

    let mut sealer = ChunkSealer::new(BufWriter::new(File::create(&stream_out)?), opts);
    for input in &inputs {
        let info = sealer.push(BufReader::new(File::open(input)?))?;
        println!(
            "{}  off={} len={} checksum={}",
            input.display(),
            info.chunk_offset,
            info.chunk_length,
            Checksum::from(info.chunk_checksum.as_slice()).to_hex()
        );
    }
    let (container, _) = sealer.finish()?;

    let manifest = Manifest {
        containers: vec![container],
        meta: Meta::new("chunkdev", deterministic),
    };
    manifest.save(&manifest_out)
}

pub fn handle_plan(manifest: PathBuf, container: usize) -> Result<()> {
    let manifest = Manifest::load(&manifest)?;
    let list = manifest.container(container)?;
    let mut walker = OffsetWalker::new(list, container as u64);
    for step in walker.by_ref() {
        let info = step.info();
        let verdict = match step {
            Step::Kept { .. } => "kept".to_string(),
            Step::Duplicate { .. } => "duplicate".to_string(),
            Step::Misordered { expected, .. } => {
                format!("misordered (expected {expected}), stop")
            }
        };
        println!(
            "#{:<5} off={:<10} len={:<10} {}",
            step.reference().chunk_index,
            info.chunk_offset,
            info.chunk_length,
            verdict
        );
    }
    println!("stream bytes: {}", walker.expected_offset());
    Ok(())
}

pub fn handle_decrypt(
    stream: PathBuf,
    manifest: PathBuf,
    store: PathBuf,
    container: usize,
    buf_size: usize,
) -> Result<()> {
    let manifest = Manifest::load(&manifest)?;
    let list = manifest.container(container)?.clone();
    info!(root = %store.display(), container, "decrypting");
    let store = open_store(Backend::Disk(store))?;

    let decrypter = ChunkListDecrypter::with_options(
        store.clone(),
        list,
        container as u64,
        DecryptOptions { buf_size },
    );
    let chunks = decrypter.apply(BufReader::new(File::open(&stream)?))?;

    let mut refs: Vec<_> = chunks.keys().copied().collect();
    refs.sort();
    for r in refs {
        let c = &chunks[&r];
        println!("{r} -> {} ({} bytes)", c.checksum.to_hex(), c.len);
    }
    let s = store.stats();
    eprintln!(
        "decrypt: {} chunks, {} store hits, {} written, {} write failures",
        chunks.len(),
        s.hits,
        s.commits,
        s.write_failures
    );
    Ok(())
}

pub fn handle_ls(store: PathBuf) -> Result<()> {
    let store = DiskChunkStore::open(&store)?;
    for checksum in store.checksums()? {
        if let Some(c) = store.chunk(&checksum)? {
            println!("{}  {} bytes", checksum.to_hex(), c.len);
        }
    }
    Ok(())
}

pub fn handle_cat(store: PathBuf, checksum_hex: String) -> Result<()> {
    let store = DiskChunkStore::open(&store)?;
    let checksum = Checksum(parse_hex(&checksum_hex)?);
    let chunk = store.chunk(&checksum)?.ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no such chunk: {checksum}"),
        )
    })?;
    let mut reader = store.open(&chunk)?;
    let mut out = std::io::stdout().lock();
    std::io::copy(&mut reader, &mut out)?;
    out.flush()?;
    Ok(())
}
