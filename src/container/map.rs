use std::{collections::BTreeMap, fmt, sync::Arc};

use log::trace;
use serde::{Serialize, Serializer};

use super::{
    error::{ContainerError, Result},
    export::{ExportMap, ExportOptions, Exported},
    schema::ContainerSchema,
    value::MapKey,
    Container,
};

/// Records of one type, keyed by an identifier (usually a telescope ID).
///
/// [`ContainerMap::get_or_create`] creates and stores a fresh record for a
/// key that hasn't been seen yet; plain lookups never create anything.
#[derive(Clone)]
pub struct ContainerMap {
    schema: Arc<ContainerSchema>,
    entries: BTreeMap<MapKey, Container>,
}

impl ContainerMap {
    pub fn new(schema: Arc<ContainerSchema>) -> ContainerMap {
        ContainerMap {
            schema,
            entries: BTreeMap::new(),
        }
    }

    /// The record type of the entries.
    pub fn schema(&self) -> &Arc<ContainerSchema> {
        &self.schema
    }

    pub fn get_or_create(&mut self, key: impl Into<MapKey>) -> &mut Container {
        let schema = &self.schema;
        self.entries.entry(key.into()).or_insert_with_key(|key| {
            trace!("Creating a {} for key {key}", schema.name());
            Container::new(Arc::clone(schema))
        })
    }

    pub fn get(&self, key: impl Into<MapKey>) -> Option<&Container> {
        self.entries.get(&key.into())
    }

    pub fn get_mut(&mut self, key: impl Into<MapKey>) -> Option<&mut Container> {
        self.entries.get_mut(&key.into())
    }

    /// Store a record under `key`, returning whatever was there before. The
    /// record must be of this map's type.
    pub fn insert(
        &mut self,
        key: impl Into<MapKey>,
        container: Container,
    ) -> Result<Option<Container>> {
        if container.schema().name() != self.schema.name() {
            return Err(ContainerError::SchemaMismatch {
                expected: self.schema.name().to_string(),
                found: container.schema().name().to_string(),
            });
        }
        Ok(self.entries.insert(key.into(), container))
    }

    pub fn remove(&mut self, key: impl Into<MapKey>) -> Option<Container> {
        self.entries.remove(&key.into())
    }

    pub fn contains_key(&self, key: impl Into<MapKey>) -> bool {
        self.entries.contains_key(&key.into())
    }

    pub fn keys(&self) -> impl Iterator<Item = &MapKey> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MapKey, &Container)> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&MapKey, &mut Container)> {
        self.entries.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Each entry exported with `options`, keyed by the entry's key.
    pub fn export(&self, options: ExportOptions) -> ExportMap {
        self.entries
            .iter()
            .map(|(key, c)| (key.to_string(), Exported::Nested(c.export(options))))
            .collect()
    }
}

impl PartialEq for ContainerMap {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name() && self.entries == other.entries
    }
}

impl fmt::Debug for ContainerMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerMap")
            .field("type", &self.schema.name())
            .field("entries", &self.entries)
            .finish()
    }
}

impl Serialize for ContainerMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter())
    }
}
