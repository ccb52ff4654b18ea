//! Padded voxel snapshot: one chunk's cells plus a 1-cell halo
//!
//! Captured on the main thread and moved into the job, so the job never reads
//! live world state. Interior coordinates run `0..dims`; the halo sits at `-1`
//! and `dims` on each axis.

use glam::{IVec3, UVec3};

use crate::voxel::cell::VoxelCell;
use crate::voxel::chunk::{cell_index, CHUNK_SIDE};
use crate::voxel::query::WorldQuery;

#[derive(Clone, Debug)]
pub struct PaddedSnapshot {
    dims: IVec3,
    padded: IVec3,
    /// World cell coordinate of interior (0,0,0)
    origin: IVec3,
    cells: Vec<VoxelCell>,
}

impl PaddedSnapshot {
    /// All-air snapshot with the given interior size
    pub fn new(dims: UVec3, origin: IVec3) -> Self {
        let dims = dims.as_ivec3();
        let padded = dims + IVec3::splat(2);
        Self {
            dims,
            padded,
            origin,
            cells: vec![VoxelCell::AIR; (padded.x * padded.y * padded.z) as usize],
        }
    }

    /// Build from a function of local coordinates (halo included)
    pub fn from_fn(dims: UVec3, origin: IVec3, f: impl Fn(IVec3) -> VoxelCell) -> Self {
        let mut snapshot = Self::new(dims, origin);
        for x in -1..=snapshot.dims.x {
            for y in -1..=snapshot.dims.y {
                for z in -1..=snapshot.dims.z {
                    let local = IVec3::new(x, y, z);
                    let i = snapshot.index(local);
                    snapshot.cells[i] = f(local);
                }
            }
        }
        snapshot
    }

    /// Capture a full chunk: interior from `cells`, halo from `halo`
    pub fn capture(cells: &[VoxelCell], origin: IVec3, halo: &dyn WorldQuery) -> Self {
        let side = CHUNK_SIDE as u32;
        Self::from_fn(UVec3::splat(side), origin, |local| {
            if local.cmpge(IVec3::ZERO).all() && local.cmplt(IVec3::splat(CHUNK_SIDE)).all() {
                cells[cell_index(local)]
            } else {
                halo.read_voxel_at(origin + local)
            }
        })
    }

    /// Interior size
    pub fn dims(&self) -> IVec3 {
        self.dims
    }

    pub fn origin(&self) -> IVec3 {
        self.origin
    }

    #[inline]
    fn index(&self, local: IVec3) -> usize {
        let p = local + IVec3::ONE;
        ((p.x * self.padded.y + p.y) * self.padded.z + p.z) as usize
    }

    /// Whether `local` lies in the interior (not the halo)
    #[inline]
    pub fn in_interior(&self, local: IVec3) -> bool {
        local.cmpge(IVec3::ZERO).all() && local.cmplt(self.dims).all()
    }

    /// Whether `local` lies in the interior or the halo
    #[inline]
    pub fn in_padded(&self, local: IVec3) -> bool {
        local.cmpge(IVec3::NEG_ONE).all() && local.cmple(self.dims).all()
    }

    /// Cell at a local position; outside the padded region reads as air
    #[inline]
    pub fn get(&self, local: IVec3) -> VoxelCell {
        if self.in_padded(local) {
            self.cells[self.index(local)]
        } else {
            VoxelCell::AIR
        }
    }

    /// Overwrite a cell (interior or halo). Out-of-range writes are ignored.
    pub fn set(&mut self, local: IVec3, cell: VoxelCell) {
        if self.in_padded(local) {
            let i = self.index(local);
            self.cells[i] = cell;
        }
    }

    /// Solid test at a local position
    #[inline]
    pub fn is_solid(&self, local: IVec3) -> bool {
        self.get(local).is_solid()
    }
}
