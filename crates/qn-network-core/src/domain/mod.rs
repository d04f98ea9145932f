//! # Domain Layer
//!
//! Pure network logic with no I/O: value objects, entities, configuration,
//! the physical model, the topology registries, health scoring and routing.

pub mod alerts;
pub mod config;
pub mod entities;
pub mod errors;
pub mod health;
pub mod physics;
pub mod router;
pub mod topology;
pub mod value_objects;

pub use alerts::*;
pub use config::*;
pub use entities::*;
pub use errors::*;
pub use health::*;
pub use physics::{assess_link, LinkProfile};
pub use router::*;
pub use topology::*;
pub use value_objects::*;
