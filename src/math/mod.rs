//! Mathematical utilities and data structures

pub mod aabb;
pub mod ray;
pub mod traversal;

pub use aabb::Aabb;
pub use ray::Ray;
pub use traversal::VoxelTraversal;
