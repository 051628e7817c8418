//! Core types for the mnemos memory engine
//!
//! Domain types shared by every other crate in the workspace:
//!
//! - **Facts**: atomic units of remembered knowledge with category paths,
//!   confidence and mention tracking
//! - **Entities & links**: the nodes and typed, weighted edges of the
//!   per-user knowledge graph
//! - **Category hierarchy**: the closed nine-domain taxonomy every fact is
//!   tagged with
//! - **Errors**: the unified error taxonomy for providers, stores and
//!   caller input

pub mod category;
pub mod entity;
pub mod error;
pub mod fact;
pub mod id;

pub use category::{CategoryHierarchy, CategoryPath, Domain};
pub use entity::{Entity, EntityLink, LinkType};
pub use error::{Error, Result};
pub use fact::{Fact, FactSource};
pub use id::{EntityId, FactId, JobId, LinkId};
