use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "chunkdev CLI (alpha)", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Encrypt input files into a storage host stream plus its CBOR manifest
    Seal {
        stream_out: PathBuf,
        manifest_out: PathBuf,
        inputs: Vec<PathBuf>,

        /// 16-byte hex AES key for every chunk (default: random per chunk)
        #[arg(long = "key")]
        key_hex: Option<String>,

        /// host label recorded on the container
        #[arg(long)]
        host: Option<String>,

        /// zero the manifest timestamp
        #[arg(long)]
        deterministic: bool,
    },

    /// Show how a container's chunk infos map onto its stream
    Plan {
        manifest: PathBuf,

        #[arg(long, default_value_t = 0)]
        container: usize,
    },

    /// Decrypt a storage host stream into a chunk store directory
    Decrypt {
        stream: PathBuf,
        manifest: PathBuf,

        /// chunk store root (created if missing)
        #[arg(long)]
        store: PathBuf,

        /// index of the stream's container in the manifest
        #[arg(long, default_value_t = 0)]
        container: usize,

        /// copy buffer size in bytes
        #[arg(long, default_value_t = 64 * 1024)]
        buf_size: usize,
    },

    /// List chunks held by a store
    Ls {
        #[arg(long)]
        store: PathBuf,
    },

    /// Write one stored chunk to stdout
    Cat {
        #[arg(long)]
        store: PathBuf,

        /// chunk checksum (hex)
        checksum: String,
    },
}
