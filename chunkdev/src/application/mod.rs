pub mod handlers;

use crate::presentation::cli::{Cli, Commands};
use chunkdec_core::error::Result;
use clap::Parser;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Seal {
            stream_out,
            manifest_out,
            inputs,
            key_hex,
            host,
            deterministic,
        } => handlers::handle_seal(stream_out, manifest_out, inputs, key_hex, host, deterministic),
        Commands::Plan {
            manifest,
            container,
        } => handlers::handle_plan(manifest, container),
        Commands::Decrypt {
            stream,
            manifest,
            store,
            container,
            buf_size,
        } => handlers::handle_decrypt(stream, manifest, store, container, buf_size),
        Commands::Ls { store } => handlers::handle_ls(store),
        Commands::Cat { store, checksum } => handlers::handle_cat(store, checksum),
    }
}
