//! # Component Registry
//!
//! A type-keyed component store shared by the chunk pipeline and its collaborators.
//! The pipeline only ever talks to it through `add_component`, `get_component`,
//! `get_components` and `remove_entity`; nothing in the pipeline depends on how the
//! components are laid out in memory.
//!
//! ## Usage
//! ```rust
//! use voxel_streaming::core::ComponentRegistry;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Health(u32);
//!
//! let registry = ComponentRegistry::new();
//! let entity = registry.create_entity();
//! registry.add_component(entity, Health(10));
//! assert_eq!(registry.get_component::<Health>(entity), Some(Health(10)));
//! ```

use super::MtResource;
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

/// Opaque handle identifying an entity in a [`ComponentRegistry`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

type ComponentColumn = HashMap<EntityId, Box<dyn Any + Send + Sync>>;

/// A thread-safe container mapping `(component type, entity)` to a component value.
///
/// Components are grouped into one column per `TypeId`, the same way services are
/// grouped by type in an injection container. Reads clone the component out so no
/// lock is ever held by the caller.
pub struct ComponentRegistry {
    columns: MtResource<HashMap<TypeId, ComponentColumn>>,
    next_entity: AtomicU64,
}

impl ComponentRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self {
            columns: MtResource::new(HashMap::new()),
            next_entity: AtomicU64::new(1),
        }
    }

    /// Allocates a fresh entity id. Ids are never reused within one registry.
    pub fn create_entity(&self) -> EntityId {
        EntityId(self.next_entity.fetch_add(1, Ordering::Relaxed))
    }

    /// Attaches `component` to `entity`, replacing any component of the same type.
    pub fn add_component<T: Send + Sync + 'static>(&self, entity: EntityId, component: T) {
        self.columns
            .get_mut()
            .entry(TypeId::of::<T>())
            .or_default()
            .insert(entity, Box::new(component));
    }

    /// Returns a copy of the component of type `T` attached to `entity`.
    pub fn get_component<T: Clone + Send + Sync + 'static>(&self, entity: EntityId) -> Option<T> {
        self.columns
            .get()
            .get(&TypeId::of::<T>())
            .and_then(|column| column.get(&entity))
            .and_then(|component| component.downcast_ref::<T>())
            .cloned()
    }

    /// Returns a copy of every component of type `T`, keyed by entity.
    pub fn get_components<T: Clone + Send + Sync + 'static>(&self) -> HashMap<EntityId, T> {
        self.columns
            .get()
            .get(&TypeId::of::<T>())
            .map(|column| {
                column
                    .iter()
                    .filter_map(|(entity, component)| {
                        component.downcast_ref::<T>().map(|c| (*entity, c.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Detaches and returns the component of type `T` from `entity`.
    pub fn remove_component<T: Send + Sync + 'static>(&self, entity: EntityId) -> Option<T> {
        self.columns
            .get_mut()
            .get_mut(&TypeId::of::<T>())
            .and_then(|column| column.remove(&entity))
            .and_then(|component| component.downcast::<T>().ok())
            .map(|component| *component)
    }

    /// Removes every component attached to `entity`.
    pub fn remove_entity(&self, entity: EntityId) {
        for column in self.columns.get_mut().values_mut() {
            column.remove(&entity);
        }
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
