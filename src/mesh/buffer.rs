//! Growable vertex buffers, material-grouped surfaces and the scratch pool
//!
//! Jobs write into per-chunk scratch builders that keep their allocations
//! between jobs. When a job finishes, the scratch is copied into exact-size
//! [`Surface`]s and handed back to the [`ScratchPool`].

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use bitvec::prelude::BitVec;
use glam::{Vec2, Vec3, Vec4};

use crate::voxel::cell::BlockId;
use crate::voxel::chunk::ChunkCoord;

/// Initial capacity (in elements) of an empty scratch buffer
const MIN_CAPACITY: usize = 64;

/// Grow `buf` by doubling until `additional` more elements fit.
/// Returns true if a reallocation happened.
fn ensure_capacity<T>(buf: &mut Vec<T>, additional: usize) -> bool {
    let needed = buf.len() + additional;
    if needed <= buf.capacity() {
        return false;
    }
    let mut capacity = buf.capacity().max(MIN_CAPACITY);
    while capacity < needed {
        capacity *= 2;
    }
    buf.reserve_exact(capacity - buf.len());
    true
}

/// Vertex attribute streams for one material group
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VertexBuffers {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    /// RGB = tint x ambient occlusion, A = 1
    pub colors: Vec<Vec4>,
    pub indices: Vec<u32>,
    /// Baked light channel A: (r, g)
    pub light_a: Vec<Vec2>,
    /// Baked light channel B: (b, 0)
    pub light_b: Vec<Vec2>,
}

impl VertexBuffers {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Make room for `vertices` more vertices and `indices` more indices.
    /// Returns true if any stream had to grow.
    pub fn reserve(&mut self, vertices: usize, indices: usize) -> bool {
        let mut grew = ensure_capacity(&mut self.positions, vertices);
        grew |= ensure_capacity(&mut self.normals, vertices);
        grew |= ensure_capacity(&mut self.uvs, vertices);
        grew |= ensure_capacity(&mut self.colors, vertices);
        grew |= ensure_capacity(&mut self.indices, indices);
        grew
    }

    /// Append one vertex, returning its index
    pub fn push_vertex(&mut self, position: Vec3, normal: Vec3, uv: Vec2, color: Vec4) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(position);
        self.normals.push(normal);
        self.uvs.push(uv);
        self.colors.push(color);
        index
    }

    /// Clear all streams, keeping their capacity
    pub fn clear(&mut self) {
        self.positions.clear();
        self.normals.clear();
        self.uvs.clear();
        self.colors.clear();
        self.indices.clear();
        self.light_a.clear();
        self.light_b.clear();
    }

    /// Exact-size copy
    pub fn to_compact(&self) -> VertexBuffers {
        VertexBuffers {
            positions: self.positions.to_vec(),
            normals: self.normals.to_vec(),
            uvs: self.uvs.to_vec(),
            colors: self.colors.to_vec(),
            indices: self.indices.to_vec(),
            light_a: self.light_a.to_vec(),
            light_b: self.light_b.to_vec(),
        }
    }
}

/// Triangles sharing one material
#[derive(Clone, Debug, PartialEq)]
pub struct MeshGroup {
    pub material: String,
    pub buffers: VertexBuffers,
}

/// Which of a chunk's surfaces a mesh goes to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    /// Opaque geometry (cubes, tiles, custom meshes)
    Main,
    /// Full-detail foliage and other alpha-blended content
    DetailLod0,
    /// Reduced detail mesh cross-faded in at distance
    DetailLod1,
}

impl SurfaceKind {
    pub const ALL: [SurfaceKind; 3] = [SurfaceKind::Main, SurfaceKind::DetailLod0, SurfaceKind::DetailLod1];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A renderable surface, one group per material
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Surface {
    pub groups: Vec<MeshGroup>,
}

impl Surface {
    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.buffers.is_empty())
    }

    pub fn vertex_count(&self) -> usize {
        self.groups.iter().map(|g| g.buffers.vertex_count()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.groups.iter().map(|g| g.buffers.triangle_count()).sum()
    }

    pub fn group(&self, material: &str) -> Option<&MeshGroup> {
        self.groups.iter().find(|g| g.material == material)
    }
}

/// Everything the renderer draws for one chunk, in chunk-local space
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkSurfaces {
    pub main: Surface,
    pub detail: [Surface; 2],
}

impl ChunkSurfaces {
    pub fn surface(&self, kind: SurfaceKind) -> &Surface {
        match kind {
            SurfaceKind::Main => &self.main,
            SurfaceKind::DetailLod0 => &self.detail[0],
            SurfaceKind::DetailLod1 => &self.detail[1],
        }
    }

    pub fn surface_mut(&mut self, kind: SurfaceKind) -> &mut Surface {
        match kind {
            SurfaceKind::Main => &mut self.main,
            SurfaceKind::DetailLod0 => &mut self.detail[0],
            SurfaceKind::DetailLod1 => &mut self.detail[1],
        }
    }

    pub fn is_empty(&self) -> bool {
        SurfaceKind::ALL.iter().all(|k| self.surface(*k).is_empty())
    }

    pub fn vertex_count(&self) -> usize {
        SurfaceKind::ALL.iter().map(|k| self.surface(*k).vertex_count()).sum()
    }

    /// Distinct material names across all surfaces, in first-seen order
    pub fn materials(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for kind in SurfaceKind::ALL {
            for group in &self.surface(kind).groups {
                if !seen.contains(&group.material.as_str()) {
                    seen.push(group.material.as_str());
                }
            }
        }
        seen
    }
}

/// Cross-fade weights for the two detail LODs at a camera distance.
///
/// LOD0 is fully visible before `fade_start`, LOD1 fully after `fade_end`.
pub fn detail_lod_weights(distance: f32, fade_start: f32, fade_end: f32) -> [f32; 2] {
    if fade_end <= fade_start {
        return if distance < fade_start { [1.0, 0.0] } else { [0.0, 1.0] };
    }
    let t = ((distance - fade_start) / (fade_end - fade_start)).clamp(0.0, 1.0);
    [1.0 - t, t]
}

/// Scratch builder for one surface
#[derive(Debug, Default)]
pub struct MeshBuilder {
    groups: Vec<MeshGroup>,
    lookup: HashMap<String, usize>,
    grow_events: usize,
}

impl MeshBuilder {
    /// Buffers for `material`, creating the group on first use
    pub fn group_mut(&mut self, material: &str) -> &mut VertexBuffers {
        let index = match self.lookup.get(material) {
            Some(&i) => i,
            None => {
                self.groups.push(MeshGroup { material: material.to_string(), buffers: VertexBuffers::default() });
                let i = self.groups.len() - 1;
                self.lookup.insert(material.to_string(), i);
                i
            }
        };
        &mut self.groups[index].buffers
    }

    /// Reserve space in a group, counting reallocations
    pub fn reserve(&mut self, material: &str, vertices: usize, indices: usize) -> &mut VertexBuffers {
        let grew = self.group_mut(material).reserve(vertices, indices);
        if grew {
            self.grow_events += 1;
        }
        self.group_mut(material)
    }

    /// Mutable access to every non-empty group
    pub fn groups_mut(&mut self) -> impl Iterator<Item = &mut MeshGroup> {
        self.groups.iter_mut().filter(|g| !g.buffers.is_empty())
    }

    /// Number of buffer reallocations since creation
    pub fn grow_events(&self) -> usize {
        self.grow_events
    }

    /// Clear every group, keeping allocations and material slots
    pub fn reset(&mut self) {
        for group in &mut self.groups {
            group.buffers.clear();
        }
    }

    /// Exact-size surface from the non-empty groups
    pub fn finish(&self) -> Surface {
        Surface {
            groups: self
                .groups
                .iter()
                .filter(|g| !g.buffers.is_empty())
                .map(|g| MeshGroup { material: g.material.clone(), buffers: g.buffers.to_compact() })
                .collect(),
        }
    }
}

/// Per-chunk scratch state reused across jobs
#[derive(Debug, Default)]
pub struct MeshScratch {
    pub builders: [MeshBuilder; 3],
    /// Cells already covered by a tile footprint
    pub consumed: BitVec,
    /// Missing block ids already reported during this job
    pub warned: HashSet<BlockId>,
}

impl MeshScratch {
    pub fn builder(&mut self, kind: SurfaceKind) -> &mut MeshBuilder {
        &mut self.builders[kind.index()]
    }

    /// Prepare for a new job over `cell_count` interior cells
    pub fn reset(&mut self, cell_count: usize) {
        for builder in &mut self.builders {
            builder.reset();
        }
        self.consumed.clear();
        self.consumed.resize(cell_count, false);
        self.warned.clear();
    }

    pub fn finish(&self) -> ChunkSurfaces {
        ChunkSurfaces {
            main: self.builders[0].finish(),
            detail: [self.builders[1].finish(), self.builders[2].finish()],
        }
    }
}

/// Pool key: chunk coordinate plus chunk instance
pub type ScratchKey = (ChunkCoord, u64);

#[derive(Debug, Default)]
struct PoolState {
    idle: HashMap<ScratchKey, MeshScratch>,
    /// Keys whose scratch is held by a running job
    checked_out: HashSet<ScratchKey>,
    /// Checked-out keys evicted while their job was running
    evicted: HashSet<ScratchKey>,
}

/// Scratch buffers keyed by chunk instance, shared by the worker pool
#[derive(Debug, Default)]
pub struct ScratchPool {
    state: Mutex<PoolState>,
}

impl ScratchPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the chunk's scratch (or a fresh one) for the duration of a job
    pub fn acquire(&self, key: ScratchKey) -> MeshScratch {
        let mut state = self.lock();
        state.checked_out.insert(key);
        state.idle.remove(&key).unwrap_or_default()
    }

    /// Return scratch after a job. Scratch of an evicted chunk is dropped.
    pub fn release(&self, key: ScratchKey, scratch: MeshScratch) {
        let mut state = self.lock();
        state.checked_out.remove(&key);
        if state.evicted.remove(&key) {
            return;
        }
        state.idle.insert(key, scratch);
    }

    /// Drop the scratch of an evicted chunk, now or when its job releases it
    pub fn evict(&self, key: ScratchKey) {
        let mut state = self.lock();
        state.idle.remove(&key);
        if state.checked_out.contains(&key) {
            state.evicted.insert(key);
        }
    }

    /// Number of chunks with pooled scratch
    pub fn len(&self) -> usize {
        self.lock().idle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of scratch sets held by running jobs
    pub fn checked_out(&self) -> usize {
        self.lock().checked_out.len()
    }
}
