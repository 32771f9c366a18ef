//! # Persisted Entities
//!
//! Entities that live inside chunks (dropped items and the like) are saved with
//! the chunk that contains them. Each record on disk is
//! `[i32 tag][f32 x][f32 y][f32 z][payload]`, big-endian; the tag selects the
//! payload codec from an [`EntityKinds`] table.

use std::{
    collections::HashMap,
    io::{Read, Write},
    path::Path,
};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use cgmath::Point3;

use crate::{
    core::{ComponentRegistry, EntityId},
    error::{PipelineError, Result},
};

use super::{block::BlockType, chunk::ChunkCoordinate};

/// World-space position of an entity.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    pub position: Point3<f32>,
}

impl Transform {
    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Transform {
            position: Point3::new(x, y, z),
        }
    }

    /// The chunk this entity belongs to.
    pub fn chunk(&self) -> ChunkCoordinate {
        ChunkCoordinate::from_world_position(self.position)
    }
}

/// Marks an entity as persistent and names its codec.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntityTag(pub i32);

/// A stack of blocks lying in the world.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DroppedItem {
    pub block: BlockType,
    pub count: u8,
}

/// Tag of [`DroppedItem`] records.
pub const DROPPED_ITEM_TAG: i32 = 1;

/// Writes an entity's payload.
pub type EncodeFn = fn(&ComponentRegistry, EntityId, &mut dyn Write) -> Result<()>;
/// Reads a payload and attaches the resulting components to an entity.
pub type DecodeFn = fn(&mut dyn Read, &ComponentRegistry, EntityId) -> Result<()>;

/// Codec pair for one entity type.
#[derive(Copy, Clone)]
pub struct EntityKind {
    pub name: &'static str,
    pub encode: EncodeFn,
    pub decode: DecodeFn,
}

/// Dispatch table from entity tag to codec.
#[derive(Clone, Default)]
pub struct EntityKinds {
    kinds: HashMap<i32, EntityKind>,
}

impl EntityKinds {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// A table with every built-in kind registered.
    pub fn with_builtin() -> Self {
        let mut kinds = Self::new();
        kinds.register(
            DROPPED_ITEM_TAG,
            EntityKind {
                name: "dropped_item",
                encode: encode_dropped_item,
                decode: decode_dropped_item,
            },
        );
        kinds
    }

    pub fn register(&mut self, tag: i32, kind: EntityKind) {
        self.kinds.insert(tag, kind);
    }

    pub fn get(&self, tag: i32) -> Option<&EntityKind> {
        self.kinds.get(&tag)
    }

    /// Writes one entity record.
    ///
    /// Entities without a `Transform`, without an `EntityTag`, or with an
    /// unregistered tag are skipped.
    ///
    /// # Returns
    /// `true` if a record was written.
    pub fn write_entity(
        &self,
        components: &ComponentRegistry,
        entity: EntityId,
        out: &mut dyn Write,
    ) -> Result<bool> {
        let (Some(tag), Some(transform)) = (
            components.get_component::<EntityTag>(entity),
            components.get_component::<Transform>(entity),
        ) else {
            return Ok(false);
        };
        let Some(kind) = self.get(tag.0) else {
            log::warn!("Entity {:?} has unregistered tag {}, not saved", entity, tag.0);
            return Ok(false);
        };

        out.write_i32::<BigEndian>(tag.0)?;
        out.write_f32::<BigEndian>(transform.position.x)?;
        out.write_f32::<BigEndian>(transform.position.y)?;
        out.write_f32::<BigEndian>(transform.position.z)?;
        (kind.encode)(components, entity, out)?;
        Ok(true)
    }

    /// Reads records until `input` is exhausted, creating an entity for each.
    ///
    /// Stops at the first unknown tag: without its codec the length of the
    /// payload is unknown, so nothing after it can be read.
    ///
    /// # Returns
    /// The entities created.
    pub fn read_entities(
        &self,
        input: &[u8],
        components: &ComponentRegistry,
        path: &Path,
    ) -> Result<Vec<EntityId>> {
        let mut reader = input;
        let mut created = Vec::new();

        while !reader.is_empty() {
            let tag = reader.read_i32::<BigEndian>().map_err(|e| corrupt(path, e))?;
            let kind = self.get(tag).ok_or_else(|| PipelineError::UnknownEntityTag {
                tag,
                path: path.to_path_buf(),
            })?;

            let x = reader.read_f32::<BigEndian>().map_err(|e| corrupt(path, e))?;
            let y = reader.read_f32::<BigEndian>().map_err(|e| corrupt(path, e))?;
            let z = reader.read_f32::<BigEndian>().map_err(|e| corrupt(path, e))?;

            let entity = components.create_entity();
            components.add_component(entity, EntityTag(tag));
            components.add_component(entity, Transform::at(x, y, z));
            if let Err(e) = (kind.decode)(&mut reader, components, entity) {
                components.remove_entity(entity);
                return Err(e);
            }
            created.push(entity);
        }

        Ok(created)
    }
}

fn corrupt(path: &Path, error: std::io::Error) -> PipelineError {
    PipelineError::CorruptChunkFile {
        path: path.to_path_buf(),
        reason: format!("truncated entity record: {error}"),
    }
}

fn encode_dropped_item(components: &ComponentRegistry, entity: EntityId, out: &mut dyn Write) -> Result<()> {
    let item = components
        .get_component::<DroppedItem>(entity)
        .unwrap_or(DroppedItem {
            block: BlockType::AIR,
            count: 0,
        });
    out.write_u8(item.block.to_storage())?;
    out.write_u8(item.count)?;
    Ok(())
}

fn decode_dropped_item(input: &mut dyn Read, components: &ComponentRegistry, entity: EntityId) -> Result<()> {
    let block = BlockType::from_storage(input.read_u8()?);
    let count = input.read_u8()?;
    components.add_component(entity, DroppedItem { block, count });
    Ok(())
}

/// Creates a dropped item entity.
pub fn spawn_dropped_item(components: &ComponentRegistry, position: Point3<f32>, item: DroppedItem) -> EntityId {
    let entity = components.create_entity();
    components.add_component(entity, EntityTag(DROPPED_ITEM_TAG));
    components.add_component(entity, Transform { position });
    components.add_component(entity, item);
    entity
}

/// Persistent entities whose position lies inside `coordinate`.
pub fn entities_in_chunk(components: &ComponentRegistry, coordinate: ChunkCoordinate) -> Vec<EntityId> {
    let tagged = components.get_components::<EntityTag>();
    let mut entities: Vec<EntityId> = components
        .get_components::<Transform>()
        .into_iter()
        .filter(|(entity, transform)| tagged.contains_key(entity) && transform.chunk() == coordinate)
        .map(|(entity, _)| entity)
        .collect();
    entities.sort();
    entities
}

/// Every persistent entity currently alive.
pub fn persistent_entities(components: &ComponentRegistry) -> Vec<EntityId> {
    let mut entities: Vec<EntityId> = components.get_components::<EntityTag>().into_keys().collect();
    entities.sort();
    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_recreate_equivalent_entities() {
        let source = ComponentRegistry::new();
        let kinds = EntityKinds::with_builtin();
        let item = DroppedItem {
            block: BlockType::IRON_ORE,
            count: 12,
        };
        let entity = spawn_dropped_item(&source, Point3::new(1.5, -3.0, 40.25), item);

        let mut bytes = Vec::new();
        assert!(kinds.write_entity(&source, entity, &mut bytes).unwrap());

        let target = ComponentRegistry::new();
        let created = kinds.read_entities(&bytes, &target, Path::new("test")).unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(target.get_component::<DroppedItem>(created[0]), Some(item));
        assert_eq!(
            target.get_component::<Transform>(created[0]),
            Some(Transform::at(1.5, -3.0, 40.25))
        );
    }

    #[test]
    fn unknown_tags_stop_decoding() {
        let mut bytes = Vec::new();
        bytes.write_i32::<BigEndian>(99).unwrap();
        bytes.extend_from_slice(&[0; 16]);

        let result = EntityKinds::with_builtin().read_entities(&bytes, &ComponentRegistry::new(), Path::new("x"));
        assert!(matches!(result, Err(PipelineError::UnknownEntityTag { tag: 99, .. })));
    }

    #[test]
    fn chunk_membership_follows_position() {
        let components = ComponentRegistry::new();
        let inside = spawn_dropped_item(
            &components,
            Point3::new(-0.5, 3.0, 3.0),
            DroppedItem { block: BlockType::DIRT, count: 1 },
        );
        spawn_dropped_item(
            &components,
            Point3::new(0.5, 3.0, 3.0),
            DroppedItem { block: BlockType::DIRT, count: 1 },
        );

        assert_eq!(entities_in_chunk(&components, ChunkCoordinate::new(-1, 0, 0)), vec![inside]);
        assert_eq!(persistent_entities(&components).len(), 2);
    }
}
