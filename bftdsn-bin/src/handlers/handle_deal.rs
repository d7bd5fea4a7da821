use super::handle_encode::encode_and_store;
use crate::{providers::DirectoryProviderStore, utils::file_name_of};
use bftdsn_lib::{ProviderDirectory, ShardHandle};
use std::{path::PathBuf, process::exit};

pub fn handle_deal_command(input_path: &PathBuf, data_shards: usize, parity_shards: usize, store_dir: &PathBuf, providers: usize) {
    if providers == 0 {
        eprintln!("Error: at least one provider is required");
        exit(1);
    }

    let (set, _) = encode_and_store(input_path, data_shards, parity_shards);

    let store = match DirectoryProviderStore::create(store_dir, providers) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };
    let provider_ids = store.list_providers();
    let file_name = file_name_of(input_path);

    for index in 0..set.total_shards() {
        let provider = &provider_ids[index % provider_ids.len()];
        let handle = ShardHandle {
            index,
            name: format!("{}.{}", file_name, index),
        };

        match set.get_shard(index) {
            Ok(Some(bytes)) => {
                if let Err(e) = store.store_shard(provider, &handle, bytes) {
                    eprintln!("Error: {}", e);
                    exit(1);
                }
                println!("Shard {} placed with {}", index, provider);
            }
            _ => {
                eprintln!("Error: shard {} is absent after encoding", index);
                exit(1);
            }
        }
    }

    println!("Dealt {} shards to {} providers under {:?}", set.total_shards(), provider_ids.len(), store_dir);
}
