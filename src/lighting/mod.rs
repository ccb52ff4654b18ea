//! Progressive radiosity probes

pub mod config;
pub mod query;
pub mod directions;
pub mod probe;
pub mod field;

pub use config::RadiosityConfig;
pub use directions::SampleDirections;
pub use field::{ProbeBatch, ProbeBatchResult, ProbeField, ProbeLight};
pub use probe::RadiosityProbe;
pub use query::{ConstantLight, IncidentLight, LightQuery, SkyDome};
