//! Synchronization primitives exposed to simulated processes

pub mod resource;

pub use resource::{ResourceManager, ResourceStatus};
