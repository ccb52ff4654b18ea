//! Greedy box merging of solid cells into collision volumes

use bitvec::prelude::*;
use glam::{IVec3, UVec3, Vec3};

use crate::math::Aabb;
use crate::voxel::cell::VoxelCell;
use crate::voxel::chunk::{cell_index, CHUNK_SIDE, CHUNK_VOLUME};

/// Dense solid/empty bitmap, x-major like chunk cells
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolidMask {
    dims: IVec3,
    bits: BitVec,
}

impl SolidMask {
    pub fn new(dims: UVec3) -> Self {
        let dims = dims.as_ivec3();
        Self { dims, bits: bitvec![0; (dims.x * dims.y * dims.z) as usize] }
    }

    pub fn from_fn(dims: UVec3, f: impl Fn(IVec3) -> bool) -> Self {
        let mut mask = Self::new(dims);
        for x in 0..mask.dims.x {
            for y in 0..mask.dims.y {
                for z in 0..mask.dims.z {
                    let p = IVec3::new(x, y, z);
                    if f(p) {
                        let i = mask.index(p);
                        mask.bits.set(i, true);
                    }
                }
            }
        }
        mask
    }

    /// Solid mask of one chunk's cells
    pub fn from_chunk_cells(cells: &[VoxelCell]) -> Self {
        debug_assert_eq!(cells.len(), CHUNK_VOLUME);
        Self::from_fn(UVec3::splat(CHUNK_SIDE as u32), |p| {
            cells.get(cell_index(p)).is_some_and(|c| c.is_solid())
        })
    }

    pub fn dims(&self) -> IVec3 {
        self.dims
    }

    #[inline]
    fn index(&self, p: IVec3) -> usize {
        ((p.x * self.dims.y + p.y) * self.dims.z + p.z) as usize
    }

    #[inline]
    fn contains(&self, p: IVec3) -> bool {
        p.cmpge(IVec3::ZERO).all() && p.cmplt(self.dims).all()
    }

    /// Solid test; outside the mask is empty
    #[inline]
    pub fn get(&self, p: IVec3) -> bool {
        self.contains(p) && self.bits[self.index(p)]
    }

    pub fn set(&mut self, p: IVec3, solid: bool) {
        if self.contains(p) {
            let i = self.index(p);
            self.bits.set(i, solid);
        }
    }

    pub fn count_solid(&self) -> usize {
        self.bits.count_ones()
    }
}

/// Cover every solid cell with non-overlapping boxes.
///
/// Cells are visited in x, y, z order. Each unconsumed solid cell seeds a box
/// that grows one layer at a time along Y, then X, then Z, for as long as the
/// new layer is entirely solid and unconsumed. Boxes are offset by `origin`.
pub fn generate_collision_boxes(mask: &SolidMask, origin: Vec3) -> Vec<Aabb> {
    let dims = mask.dims();
    let mut consumed: BitVec = bitvec![0; mask.bits.len()];
    let mut boxes = Vec::new();

    let free = |consumed: &BitVec, min: IVec3, max: IVec3| -> bool {
        for x in min.x..=max.x {
            for y in min.y..=max.y {
                for z in min.z..=max.z {
                    let p = IVec3::new(x, y, z);
                    if !mask.get(p) || consumed[mask.index(p)] {
                        return false;
                    }
                }
            }
        }
        true
    };

    for x in 0..dims.x {
        for y in 0..dims.y {
            for z in 0..dims.z {
                let start = IVec3::new(x, y, z);
                if !mask.get(start) || consumed[mask.index(start)] {
                    continue;
                }

                let mut end = start;
                while end.y + 1 < dims.y
                    && free(&consumed, IVec3::new(start.x, end.y + 1, start.z), IVec3::new(end.x, end.y + 1, end.z))
                {
                    end.y += 1;
                }
                while end.x + 1 < dims.x
                    && free(&consumed, IVec3::new(end.x + 1, start.y, start.z), IVec3::new(end.x + 1, end.y, end.z))
                {
                    end.x += 1;
                }
                while end.z + 1 < dims.z
                    && free(&consumed, IVec3::new(start.x, start.y, end.z + 1), IVec3::new(end.x, end.y, end.z + 1))
                {
                    end.z += 1;
                }

                for cx in start.x..=end.x {
                    for cy in start.y..=end.y {
                        for cz in start.z..=end.z {
                            consumed.set(mask.index(IVec3::new(cx, cy, cz)), true);
                        }
                    }
                }
                boxes.push(Aabb::from_cells(start, end + IVec3::ONE).translated(origin));
            }
        }
    }
    boxes
}
