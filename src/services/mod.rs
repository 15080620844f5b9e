pub mod agent;
pub mod cache;
pub mod host_resolver;
pub mod orchestrator;
pub mod registry;

pub use agent::*;
pub use cache::*;
pub use orchestrator::*;
pub use registry::*;
