//! JSON configuration for the three binaries.

mod batch_loader;
mod ingester;
mod reflector;

pub use batch_loader::BatchLoaderConfig;
pub use ingester::IngesterConfig;
pub use reflector::{Destination, ReflectorConfig};
