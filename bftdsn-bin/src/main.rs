mod errors;
mod handlers;
mod providers;
mod utils;

use bftdsn_lib::{BFTDSN_DEFAULT_DATA_SHARDS, BFTDSN_DEFAULT_PARITY_SHARDS};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bftdsn", version, about, long_about = None)]
struct BftDsnCLI {
    #[command(subcommand)]
    command: BftDsnCommand,
}

#[derive(Subcommand)]
enum BftDsnCommand {
    /// EC encode file into data+parity shards with homomorphic digest commitments
    Encode {
        /// Path of source file
        input_path: PathBuf,
        /// Parameter K of the RS code
        #[arg(long = "k", default_value_t = BFTDSN_DEFAULT_DATA_SHARDS)]
        data_shards: usize,
        /// Parameter M of the RS code
        #[arg(long = "m", default_value_t = BFTDSN_DEFAULT_PARITY_SHARDS)]
        parity_shards: usize,
    },
    /// EC decode shard files back into the original file, repairing as needed
    Decode {
        /// Path the shards were encoded from (shard files live at <path>.<index>)
        input_path: PathBuf,
        /// Parameter K of the RS code (ignored when a manifest is present)
        #[arg(long = "k", default_value_t = BFTDSN_DEFAULT_DATA_SHARDS)]
        data_shards: usize,
        /// Parameter M of the RS code (ignored when a manifest is present)
        #[arg(long = "m", default_value_t = BFTDSN_DEFAULT_PARITY_SHARDS)]
        parity_shards: usize,
        /// Alternative output path
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Encode a file and place its shards with storage providers round-robin
    Deal {
        /// Path of source file
        input_path: PathBuf,
        /// Parameter K of the RS code
        #[arg(long = "k", default_value_t = BFTDSN_DEFAULT_DATA_SHARDS)]
        data_shards: usize,
        /// Parameter M of the RS code
        #[arg(long = "m", default_value_t = BFTDSN_DEFAULT_PARITY_SHARDS)]
        parity_shards: usize,
        /// Directory holding per-provider shard stores
        #[arg(long, default_value = "providers")]
        store_dir: PathBuf,
        /// Number of providers to spread shards over
        #[arg(long, default_value_t = 3)]
        providers: usize,
    },
    /// Retrieve shards from storage providers, verify and reassemble the file
    Retrieve {
        /// Path the shards were dealt from (manifest lives at <path>.manifest)
        input_path: PathBuf,
        /// Path to write the reassembled file to
        output_path: PathBuf,
        /// Directory holding per-provider shard stores
        #[arg(long, default_value = "providers")]
        store_dir: PathBuf,
        /// Per-shard retrieval deadline in seconds
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = BftDsnCLI::parse();
    match &cli.command {
        BftDsnCommand::Encode {
            input_path,
            data_shards,
            parity_shards,
        } => handlers::handle_encode_command(input_path, *data_shards, *parity_shards),
        BftDsnCommand::Decode {
            input_path,
            data_shards,
            parity_shards,
            out,
        } => handlers::handle_decode_command(input_path, *data_shards, *parity_shards, out),
        BftDsnCommand::Deal {
            input_path,
            data_shards,
            parity_shards,
            store_dir,
            providers,
        } => handlers::handle_deal_command(input_path, *data_shards, *parity_shards, store_dir, *providers),
        BftDsnCommand::Retrieve {
            input_path,
            output_path,
            store_dir,
            timeout_secs,
        } => handlers::handle_retrieve_command(input_path, output_path, store_dir, *timeout_secs).await,
    }
}
