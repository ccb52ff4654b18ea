//! Read-only voxel query capability
//!
//! Jobs never hold a pointer back to the world. Whatever they need from outside
//! their own chunk (the 1-cell halo) is read through this trait while the job
//! is being prepared on the main thread.

use crate::core::types::IVec3;
use crate::voxel::cell::VoxelCell;
use crate::voxel::chunk::ChunkCoord;

/// Voxel lookup in world cell coordinates
pub trait WorldQuery {
    /// Cell at a world position. Unloaded space reads as air.
    fn read_voxel_at(&self, world_pos: IVec3) -> VoxelCell;

    /// Key of the chunk owning a world position
    fn world_pos_to_chunk_key(&self, world_pos: IVec3) -> ChunkCoord {
        ChunkCoord::from_voxel_pos(world_pos)
    }
}

/// World with nothing loaded; every read is air
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyWorld;

impl WorldQuery for EmptyWorld {
    fn read_voxel_at(&self, _world_pos: IVec3) -> VoxelCell {
        VoxelCell::AIR
    }
}

/// World filled with one cell value everywhere
#[derive(Clone, Copy, Debug)]
pub struct UniformWorld(pub VoxelCell);

impl WorldQuery for UniformWorld {
    fn read_voxel_at(&self, _world_pos: IVec3) -> VoxelCell {
        self.0
    }
}

impl<F> WorldQuery for F
where
    F: Fn(IVec3) -> VoxelCell,
{
    fn read_voxel_at(&self, world_pos: IVec3) -> VoxelCell {
        self(world_pos)
    }
}
