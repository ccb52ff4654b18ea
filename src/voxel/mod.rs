//! Voxel data structures and operations

pub mod cell;
pub mod face;
pub mod block;
pub mod query;
pub mod chunk;
pub mod collision;
pub mod config;
pub mod world;

pub use block::{BlockDefinition, BlockRegistry, BlockShape};
pub use cell::{BlockId, VoxelCell};
pub use chunk::{Chunk, ChunkCoord, ChunkState, CHUNK_SIDE, CHUNK_VOLUME};
pub use collision::{generate_collision_boxes, SolidMask};
pub use config::WorldConfig;
pub use face::Face;
pub use query::WorldQuery;
pub use world::{TickStats, World};
