//! Chunk persistence: LZ4-compressed wire payload in a versioned envelope
//!
//! File layout: `b"VXCK"`, `u16` version (big-endian), then the wire encoding
//! compressed with `lz4_flex::compress_prepend_size`.

use std::path::{Path, PathBuf};

use crate::core::Result;
use crate::streaming::wire::{self, WireError};
use crate::voxel::chunk::{Chunk, ChunkCoord};

pub const CHUNK_FILE_MAGIC: [u8; 4] = *b"VXCK";
pub const CHUNK_FILE_VERSION: u16 = 1;
const ENVELOPE_SIZE: usize = 6;

/// Compress a chunk's cells into envelope bytes
pub fn compress_chunk(chunk: &Chunk) -> Vec<u8> {
    let payload = lz4_flex::compress_prepend_size(&wire::encode(chunk));
    let mut out = Vec::with_capacity(ENVELOPE_SIZE + payload.len());
    out.extend_from_slice(&CHUNK_FILE_MAGIC);
    out.extend_from_slice(&CHUNK_FILE_VERSION.to_be_bytes());
    out.extend_from_slice(&payload);
    out
}

/// Check the envelope, decompress and decode
pub fn decompress_chunk(data: &[u8]) -> std::result::Result<Chunk, WireError> {
    if data.len() < ENVELOPE_SIZE {
        return Err(WireError::Truncated { needed: ENVELOPE_SIZE, available: data.len() });
    }
    if data[..4] != CHUNK_FILE_MAGIC {
        return Err(WireError::BadMagic);
    }
    let version = u16::from_be_bytes([data[4], data[5]]);
    if version != CHUNK_FILE_VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }
    let decompressed = lz4_flex::decompress_size_prepended(&data[ENVELOPE_SIZE..])
        .map_err(|e| WireError::Compression(e.to_string()))?;
    wire::decode(&decompressed)
}

/// Get the file path for a chunk
pub fn chunk_path(base_dir: &Path, coord: ChunkCoord) -> PathBuf {
    // Subdirectories by Y keep directory sizes bounded
    base_dir
        .join(format!("y_{}", coord.y))
        .join(format!("chunk_{}_{}_{}.vxc", coord.x, coord.y, coord.z))
}

/// Save a chunk to disk (compressed)
pub async fn save_chunk(base_dir: &Path, chunk: &Chunk) -> Result<()> {
    let path = chunk_path(base_dir, chunk.coord());

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    tokio::fs::write(&path, compress_chunk(chunk)).await?;
    log::debug!("Saved chunk {:?} to {}", chunk.coord(), path.display());
    Ok(())
}

/// Load a chunk from disk, `None` if no file exists. The chunk comes back dirty.
pub async fn load_chunk(base_dir: &Path, coord: ChunkCoord) -> Result<Option<Chunk>> {
    let path = chunk_path(base_dir, coord);

    if !tokio::fs::try_exists(&path).await? {
        return Ok(None);
    }

    let compressed = tokio::fs::read(&path).await?;
    let chunk = decompress_chunk(&compressed)?;
    if chunk.coord() != coord {
        log::warn!("Chunk file {} holds {:?}, expected {:?}", path.display(), chunk.coord(), coord);
    }
    Ok(Some(chunk))
}

/// Delete a chunk from disk
pub async fn delete_chunk(base_dir: &Path, coord: ChunkCoord) -> Result<()> {
    let path = chunk_path(base_dir, coord);

    if tokio::fs::try_exists(&path).await? {
        tokio::fs::remove_file(&path).await?;
    }

    Ok(())
}

/// Check if a chunk exists on disk
pub async fn chunk_exists(base_dir: &Path, coord: ChunkCoord) -> bool {
    tokio::fs::try_exists(chunk_path(base_dir, coord)).await.unwrap_or(false)
}
