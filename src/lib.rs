//! Voxbake - chunked voxel world core
//!
//! Cells live in 16³ chunks. Dirty chunks are meshed on a worker pool into
//! per-material surfaces with ambient occlusion and baked light channels,
//! collision is rebuilt as merged boxes, and a grid of radiosity probes per
//! chunk converges progressively over many frames.

pub mod core;
pub mod config;
pub mod math;
pub mod voxel;
pub mod mesh;
pub mod lighting;
pub mod streaming;

pub use config::EngineConfig;
