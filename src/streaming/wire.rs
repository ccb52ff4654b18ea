//! Chunk wire format for replication
//!
//! Layout, all big-endian:
//! `[i32 kx][i32 ky][i32 kz][i32 cell_count][cell_count x u16 cell]`

use thiserror::Error;

use crate::voxel::cell::VoxelCell;
use crate::voxel::chunk::{Chunk, ChunkCoord, CHUNK_VOLUME};

/// Bytes before the cell array
pub const HEADER_SIZE: usize = 16;

/// Size of an encoded full chunk
pub const ENCODED_CHUNK_SIZE: usize = HEADER_SIZE + CHUNK_VOLUME * 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("truncated chunk data: needed {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },

    #[error("invalid cell count {0}, expected {CHUNK_VOLUME}")]
    InvalidCellCount(i32),

    #[error("{0} trailing bytes after chunk data")]
    TrailingBytes(usize),

    #[error("bad chunk file magic")]
    BadMagic,

    #[error("unsupported chunk file version {0}")]
    UnsupportedVersion(u16),

    #[error("decompression failed: {0}")]
    Compression(String),
}

/// Encode a chunk's key and cells
pub fn encode(chunk: &Chunk) -> Vec<u8> {
    encode_parts(chunk.coord(), chunk.cells())
}

pub fn encode_parts(coord: ChunkCoord, cells: &[VoxelCell]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE + cells.len() * 2);
    out.extend_from_slice(&coord.x.to_be_bytes());
    out.extend_from_slice(&coord.y.to_be_bytes());
    out.extend_from_slice(&coord.z.to_be_bytes());
    out.extend_from_slice(&(cells.len() as i32).to_be_bytes());
    for cell in cells {
        out.extend_from_slice(&cell.raw().to_be_bytes());
    }
    out
}

#[inline]
fn read_i32(bytes: &[u8], at: usize) -> i32 {
    i32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Decode a chunk. The result carries only key and cells and is dirty.
pub fn decode(bytes: &[u8]) -> Result<Chunk, WireError> {
    if bytes.len() < HEADER_SIZE {
        return Err(WireError::Truncated { needed: HEADER_SIZE, available: bytes.len() });
    }
    let coord = ChunkCoord::new(read_i32(bytes, 0), read_i32(bytes, 4), read_i32(bytes, 8));
    let count = read_i32(bytes, 12);
    if count < 0 || count as usize != CHUNK_VOLUME {
        return Err(WireError::InvalidCellCount(count));
    }

    let needed = HEADER_SIZE + count as usize * 2;
    if bytes.len() < needed {
        return Err(WireError::Truncated { needed, available: bytes.len() });
    }
    if bytes.len() > needed {
        return Err(WireError::TrailingBytes(bytes.len() - needed));
    }

    let cells = bytes[HEADER_SIZE..]
        .chunks_exact(2)
        .map(|pair| VoxelCell(u16::from_be_bytes([pair[0], pair[1]])))
        .collect();
    Chunk::from_cells(coord, cells).ok_or(WireError::InvalidCellCount(count))
}
