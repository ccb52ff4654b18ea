//! Block definitions and the read-only block registry
//!
//! The registry maps a block type id to everything the mesher needs: per-face
//! materials, the resolved [`BlockShape`], and the occlusion/fake flags. It is
//! built once, wrapped in an `Arc`, and never mutated afterwards, so worker
//! threads read it without locking.

use std::path::Path;

use glam::{IVec3, UVec3, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::core::{Color, Error, Result};
use crate::voxel::cell::{BlockId, BLOCK_ID_COUNT};
use crate::voxel::face::Face;

/// Material name used for the substitute of missing definitions
pub const PLACEHOLDER_MATERIAL: &str = "placeholder";

/// Texture rectangle in atlas UV space
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UvRect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Default for UvRect {
    fn default() -> Self {
        Self { min: Vec2::ZERO, max: Vec2::ONE }
    }
}

impl UvRect {
    /// Map a unit-square coordinate into this rectangle
    pub fn lerp(&self, t: Vec2) -> Vec2 {
        self.min + (self.max - self.min) * t
    }
}

/// Material and texture region for one cube face
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceMaterial {
    pub material: String,
    #[serde(default)]
    pub uv: UvRect,
}

impl FaceMaterial {
    pub fn new(material: impl Into<String>) -> Self {
        Self { material: material.into(), uv: UvRect::default() }
    }
}

/// Authored triangle mesh in cell-local space (unit cube at the origin)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub material: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    #[serde(default)]
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Check attribute lengths and index bounds
    pub fn validate(&self) -> std::result::Result<(), String> {
        let n = self.positions.len();
        if self.normals.len() != n {
            return Err(format!("mesh '{}': {} normals for {} positions", self.material, self.normals.len(), n));
        }
        if !self.uvs.is_empty() && self.uvs.len() != n {
            return Err(format!("mesh '{}': {} uvs for {} positions", self.material, self.uvs.len(), n));
        }
        if self.indices.len() % 3 != 0 {
            return Err(format!("mesh '{}': index count {} is not a multiple of 3", self.material, self.indices.len()));
        }
        if let Some(bad) = self.indices.iter().find(|&&i| i as usize >= n) {
            return Err(format!("mesh '{}': index {} out of range", self.material, bad));
        }
        Ok(())
    }

    /// Axis-aligned box mesh covering `[0, size]`, used for tiles without authored geometry
    pub fn block(material: impl Into<String>, size: Vec3) -> Self {
        let mut mesh = MeshData { material: material.into(), ..Default::default() };
        for face in Face::ALL {
            let n = face.normal();
            let corners = face_corners(face);
            let base = mesh.positions.len() as u32;
            for (i, c) in corners.iter().enumerate() {
                mesh.positions.push(*c * size);
                mesh.normals.push(n);
                mesh.uvs.push(UNIT_UVS[i]);
            }
            mesh.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        mesh
    }
}

const UNIT_UVS: [Vec2; 4] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(0.0, 1.0),
];

/// Counter-clockwise (seen from outside) unit-cube corners of a face
pub(crate) fn face_corners(face: Face) -> [Vec3; 4] {
    match face {
        Face::PosX => [
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 1.0),
        ],
        Face::NegX => [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
            Vec3::new(0.0, 1.0, 0.0),
        ],
        Face::PosY => [
            Vec3::new(0.0, 1.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ],
        Face::NegY => [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, 1.0),
        ],
        Face::PosZ => [
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
        ],
        Face::NegZ => [
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        ],
    }
}

/// Multi-cell merge footprint for tiled blocks
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileFootprint {
    /// Footprint size in cells
    pub size: UVec3,
    /// Offset of the footprint's minimum corner relative to the scanned cell
    #[serde(default)]
    pub offset: IVec3,
    /// Geometry emitted once per matched footprint (footprint-local space)
    pub mesh: MeshData,
}

impl TileFootprint {
    pub fn cell_count(&self) -> u32 {
        self.size.x * self.size.y * self.size.z
    }

    pub fn is_unit(&self) -> bool {
        self.size == UVec3::ONE
    }
}

/// Geometry kind, resolved once per definition
#[derive(Clone, Debug, PartialEq)]
pub enum BlockShape {
    /// Plain cube with per-face culling and ambient occlusion
    Cube,
    /// Multi-cell merge; footprints sorted largest first
    Tiled { tiles: Vec<TileFootprint> },
    /// Authored mesh drawn into the main surface
    CustomMesh { mesh: MeshData },
    /// Authored mesh drawn into the detail surfaces (LOD0, optional LOD1)
    DetailMesh { mesh: MeshData, lod: Option<MeshData> },
}

/// Metadata for one block type
#[derive(Clone, Debug, PartialEq)]
pub struct BlockDefinition {
    pub id: BlockId,
    pub name: String,
    /// Per-face materials, indexed by [`Face::index`]
    pub faces: [FaceMaterial; 6],
    pub shape: BlockShape,
    /// Non-visual placeholder (e.g. trigger volumes); never meshed
    pub fake: bool,
    /// Whether cube faces receive per-corner ambient occlusion
    pub do_occlusion: bool,
    /// Vertex tint multiplied with ambient occlusion
    pub tint: Color,
}

impl BlockDefinition {
    /// Plain cube using one material on every face
    pub fn cube(id: BlockId, name: impl Into<String>, material: &str) -> Self {
        Self {
            id,
            name: name.into(),
            faces: std::array::from_fn(|_| FaceMaterial::new(material)),
            shape: BlockShape::Cube,
            fake: false,
            do_occlusion: true,
            tint: Color::ONE,
        }
    }

    /// Replace the shape, returning the definition
    pub fn with_shape(mut self, shape: BlockShape) -> Self {
        self.shape = match shape {
            BlockShape::Tiled { mut tiles } => {
                sort_tiles(&mut tiles);
                BlockShape::Tiled { tiles }
            }
            other => other,
        };
        self
    }

    /// Copy of this definition with ambient occlusion toggled
    pub fn with_occlusion(mut self, do_occlusion: bool) -> Self {
        self.do_occlusion = do_occlusion;
        self
    }

    pub fn face(&self, face: Face) -> &FaceMaterial {
        &self.faces[face.index()]
    }

    fn placeholder() -> Self {
        Self::cube(0, "placeholder", PLACEHOLDER_MATERIAL).with_occlusion(false)
    }
}

fn sort_tiles(tiles: &mut [TileFootprint]) {
    // largest footprint first; stable so equal sizes keep authoring order
    tiles.sort_by(|a, b| b.cell_count().cmp(&a.cell_count()));
}

/// Serialized form of a block definition
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockDesc {
    pub id: BlockId,
    pub name: String,
    /// Material used on faces not listed in `faces`
    #[serde(default)]
    pub material: Option<String>,
    /// Explicit per-face materials in [`Face::ALL`] order (6 entries)
    #[serde(default)]
    pub faces: Option<Vec<FaceMaterial>>,
    #[serde(default)]
    pub mesh: Option<MeshData>,
    #[serde(default)]
    pub lod_mesh: Option<MeshData>,
    #[serde(default)]
    pub tiles: Vec<TileFootprint>,
    #[serde(default)]
    pub detail: bool,
    #[serde(default)]
    pub fake: bool,
    #[serde(default = "default_true")]
    pub do_occlusion: bool,
    #[serde(default)]
    pub tint: Option<[f32; 3]>,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct RegistryDesc {
    blocks: Vec<BlockDesc>,
}

impl BlockDesc {
    /// Resolve the description into a definition, picking the shape variant once
    pub fn resolve(self) -> Result<BlockDefinition> {
        let fallback = self.material.clone().unwrap_or_else(|| self.name.clone());
        let faces: [FaceMaterial; 6] = match self.faces {
            Some(list) => list.try_into().map_err(|list: Vec<FaceMaterial>| {
                Error::Registry(format!("block {} '{}': expected 6 faces, got {}", self.id, self.name, list.len()))
            })?,
            None => std::array::from_fn(|_| FaceMaterial::new(fallback.clone())),
        };

        for mesh in self.mesh.iter().chain(self.lod_mesh.iter()).chain(self.tiles.iter().map(|t| &t.mesh)) {
            mesh.validate().map_err(|e| Error::Registry(format!("block {} '{}': {}", self.id, self.name, e)))?;
        }
        if let Some(t) = self.tiles.iter().find(|t| t.cell_count() == 0) {
            return Err(Error::Registry(format!("block {} '{}': empty tile footprint {:?}", self.id, self.name, t.size)));
        }

        let shape = match (self.mesh, self.tiles.is_empty()) {
            (Some(mesh), _) if self.detail => BlockShape::DetailMesh { mesh, lod: self.lod_mesh },
            (Some(mesh), _) => BlockShape::CustomMesh { mesh },
            (None, false) => {
                let mut tiles = self.tiles;
                sort_tiles(&mut tiles);
                BlockShape::Tiled { tiles }
            }
            (None, true) => BlockShape::Cube,
        };

        Ok(BlockDefinition {
            id: self.id,
            name: self.name,
            faces,
            shape,
            fake: self.fake,
            do_occlusion: self.do_occlusion,
            tint: self.tint.map(Color::from).unwrap_or(Color::ONE),
        })
    }
}

/// Immutable lookup from block id to definition
#[derive(Clone, Debug)]
pub struct BlockRegistry {
    definitions: Vec<Option<BlockDefinition>>,
    placeholder: BlockDefinition,
}

impl BlockRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            definitions: vec![None; BLOCK_ID_COUNT as usize],
            placeholder: BlockDefinition::placeholder(),
        }
    }

    /// Add a definition. Id 0 is reserved for air; ids must be unique.
    pub fn register(&mut self, definition: BlockDefinition) -> Result<()> {
        let id = definition.id;
        if id == 0 {
            return Err(Error::Registry(format!("block '{}' uses reserved air id 0", definition.name)));
        }
        let slot = self
            .definitions
            .get_mut(id as usize)
            .ok_or_else(|| Error::Registry(format!("block id {} exceeds {}", id, BLOCK_ID_COUNT - 1)))?;
        if let Some(existing) = slot {
            return Err(Error::Registry(format!(
                "block id {} registered twice ('{}' and '{}')",
                id, existing.name, definition.name
            )));
        }
        *slot = Some(definition);
        Ok(())
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, definition: BlockDefinition) -> Result<Self> {
        self.register(definition)?;
        Ok(self)
    }

    /// Look up a definition by id
    pub fn get(&self, id: BlockId) -> Option<&BlockDefinition> {
        self.definitions.get(id as usize).and_then(Option::as_ref)
    }

    /// Solid default cube substituted for missing definitions
    pub fn placeholder(&self) -> &BlockDefinition {
        &self.placeholder
    }

    /// Number of registered definitions
    pub fn len(&self) -> usize {
        self.definitions.iter().filter(|d| d.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parse a registry from JSON (`{ "blocks": [ ... ] }`)
    pub fn from_json(json: &str) -> Result<Self> {
        let desc: RegistryDesc = serde_json::from_str(json)
            .map_err(|e| Error::Registry(format!("invalid registry JSON: {}", e)))?;
        let mut registry = Self::new();
        for block in desc.blocks {
            registry.register(block.resolve()?)?;
        }
        log::info!("Block registry loaded: {} definitions", registry.len());
        Ok(registry)
    }

    /// Load a registry from a JSON file (sync)
    pub fn load_sync(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}
