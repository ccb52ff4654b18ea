//! Error types for the voxel core

use thiserror::Error;

use crate::streaming::wire::WireError;

/// Main error type for the crate
///
/// Simulation paths (meshing, lighting, collision) never fail; they degrade
/// locally and log. Only I/O, decoding and setup surface errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Wire format error: {0}")]
    Wire(#[from] WireError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Block registry error: {0}")]
    Registry(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_error_converts() {
        let err: Error = WireError::Truncated { needed: 16, available: 3 }.into();
        assert!(matches!(err, Error::Wire(_)));
        assert!(err.to_string().contains("Wire format error"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
