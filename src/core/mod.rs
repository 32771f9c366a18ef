//! # Core Module
//!
//! This module provides the shared-resource primitives used throughout the pipeline
//! and the entity/component registry collaborator.
//!
//! ## Key Components
//! - `MtResource`: Thread-safe reference-counted resource with read-write locking
//! - `StResource`: Single-threaded reference-counted resource with interior mutability
//! - `ComponentRegistry`: Type-keyed entity/component store
//!
//! ## Usage
//! ```rust
//! use voxel_streaming::core::{MtResource, StResource};
//!
//! // Thread-safe resource
//! let counter = MtResource::new(0);
//! *counter.get_mut() += 1;
//! assert_eq!(*counter.get(), 1);
//!
//! // Main-thread resource
//! let names = StResource::new(Vec::<String>::new());
//! names.get_mut().push("chunk".to_string());
//! assert_eq!(names.get().len(), 1);
//! ```

pub mod component_registry;
pub mod mt_resource;
pub mod st_resource;

pub use component_registry::{ComponentRegistry, EntityId};
pub use mt_resource::MtResource;
pub use st_resource::StResource;
