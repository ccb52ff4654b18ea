//! Chunk meshing: padded snapshots, face culling, AO and baked light channels

pub mod snapshot;
pub mod tables;
pub mod ao;
pub mod buffer;
pub mod config;
pub mod lighting;
pub mod processor;

pub use buffer::{ChunkSurfaces, MeshGroup, ScratchKey, ScratchPool, Surface, SurfaceKind, VertexBuffers};
pub use config::LightingConfig;
pub use lighting::{HeroLightUniform, LightClass, LightSet, MaterialUniforms, PointLight};
pub use processor::{build_surfaces, JobContext, JobKind, JobResult, JobTicket, MeshJob};
pub use snapshot::PaddedSnapshot;
pub use tables::MeshTables;
