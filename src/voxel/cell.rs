//! Packed 16-bit voxel cell
//!
//! Layout (LSB first):
//! - bits 0..12: block type id (0 = air, up to 4096 types)
//! - bits 12..15: rotation index (0..8)
//! - bit 15: solid flag (participates in face culling and collision)
//!
//! Every bit pattern is a valid cell, so encode/decode are total.

use bytemuck::{Pod, Zeroable};

/// Number of distinct block type ids
pub const BLOCK_ID_COUNT: u16 = 1 << BLOCK_ID_BITS;
/// Number of distinct rotation indices
pub const ROTATION_COUNT: u8 = 1 << ROTATION_BITS;

const BLOCK_ID_BITS: u16 = 12;
const ROTATION_BITS: u16 = 3;
const BLOCK_ID_MASK: u16 = (1 << BLOCK_ID_BITS) - 1;
const ROTATION_SHIFT: u16 = BLOCK_ID_BITS;
const ROTATION_MASK: u16 = (1 << ROTATION_BITS) - 1;
const SOLID_BIT: u16 = 1 << 15;

/// Block type identifier (12 bits)
pub type BlockId = u16;

/// Single voxel cell - exactly 2 bytes
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct VoxelCell(pub u16);

impl VoxelCell {
    /// Empty/air cell
    pub const AIR: VoxelCell = VoxelCell(0);

    /// Pack block id, rotation and solid flag. Out-of-range bits are masked off.
    pub const fn encode(block_id: BlockId, rotation: u8, solid: bool) -> Self {
        let mut raw = block_id & BLOCK_ID_MASK;
        raw |= ((rotation as u16) & ROTATION_MASK) << ROTATION_SHIFT;
        if solid {
            raw |= SOLID_BIT;
        }
        VoxelCell(raw)
    }

    /// Convenience constructor for an unrotated solid block
    pub const fn solid(block_id: BlockId) -> Self {
        Self::encode(block_id, 0, true)
    }

    /// Convenience constructor for an unrotated non-solid block (glass, foliage)
    pub const fn non_solid(block_id: BlockId) -> Self {
        Self::encode(block_id, 0, false)
    }

    /// Unpack into (block id, rotation, solid)
    pub const fn decode(self) -> (BlockId, u8, bool) {
        (self.block_id(), self.rotation(), self.is_solid())
    }

    /// Block type id
    #[inline]
    pub const fn block_id(self) -> BlockId {
        self.0 & BLOCK_ID_MASK
    }

    /// Rotation index (0..8)
    #[inline]
    pub const fn rotation(self) -> u8 {
        ((self.0 >> ROTATION_SHIFT) & ROTATION_MASK) as u8
    }

    /// Solid flag. Air is never solid regardless of the raw bit.
    #[inline]
    pub const fn is_solid(self) -> bool {
        self.0 & SOLID_BIT != 0 && !self.is_air()
    }

    /// Check if cell is air (block id 0, other bits ignored)
    #[inline]
    pub const fn is_air(self) -> bool {
        self.block_id() == 0
    }

    /// Raw packed value
    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl From<u16> for VoxelCell {
    fn from(raw: u16) -> Self {
        VoxelCell(raw)
    }
}

impl From<VoxelCell> for u16 {
    fn from(cell: VoxelCell) -> Self {
        cell.0
    }
}

/// Pack (block id, rotation, solid) into a cell
pub fn encode(block_id: BlockId, rotation: u8, solid: bool) -> VoxelCell {
    VoxelCell::encode(block_id, rotation, solid)
}

/// Unpack a cell into (block id, rotation, solid)
pub fn decode(cell: VoxelCell) -> (BlockId, u8, bool) {
    cell.decode()
}
