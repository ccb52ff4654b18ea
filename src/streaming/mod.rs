//! Chunk replication and persistence

pub mod wire;
pub mod disk_io;

pub use wire::{decode, encode, WireError};
pub use disk_io::{
    compress_chunk, decompress_chunk,
    save_chunk, load_chunk, delete_chunk, chunk_exists,
    chunk_path,
};
