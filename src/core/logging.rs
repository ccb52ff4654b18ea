//! Logging initialization

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable, e.g.
/// `RUST_LOG=voxbake::voxel::world=debug` for per-frame scheduler stats.
///
/// # Example
/// ```
/// voxbake::core::logging::init();
/// log::info!("World started");
/// ```
pub fn init() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).try_init();
}
