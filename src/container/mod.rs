//! Typed records ("containers") that carry event data through a processing
//! pipeline.
//!
//! A record type is declared once as a [`ContainerSchema`]: an ordered list of
//! [`Field`]s, each with a default value (or a factory producing one), an
//! optional unit and a description. A [`Container`] is an instance of such a
//! type, holding one [`Value`] per declared field and a prefix used to name
//! its columns when it is flattened into a table row.
//!
//! Field values are not validated on assignment; only the existence of the
//! field is checked.

mod error;
mod export;
mod map;
mod schema;
mod value;

#[cfg(test)]
mod tests;

pub use error::{ContainerError, Result};
pub use export::{ExportMap, ExportOptions, Exported};
pub use map::ContainerMap;
pub use schema::{ContainerSchema, ContainerSchemaBuilder, DefaultFactory, Field, FieldDefault};
pub use value::{MapKey, SharedValue, Value};

use std::{fmt, sync::Arc};

use log::trace;
use serde::{Serialize, Serializer};

/// An instance of a record type.
#[derive(Clone)]
pub struct Container {
    schema: Arc<ContainerSchema>,

    /// Prepended to column names in prefixed exports. Defaults to the
    /// schema's default prefix.
    prefix: String,

    /// One value per schema field, in declaration order.
    values: Vec<Value>,
}

impl Container {
    /// A record with every field set to its default.
    pub fn new(schema: Arc<ContainerSchema>) -> Container {
        let prefix = schema.default_prefix().to_string();
        Container::with_prefix(schema, prefix)
    }

    /// A record with every field set to its default, bound to a custom
    /// prefix.
    pub fn with_prefix(schema: Arc<ContainerSchema>, prefix: impl Into<String>) -> Container {
        let values = schema.fields().iter().map(|f| f.default().produce()).collect();
        Container {
            schema,
            prefix: prefix.into(),
            values,
        }
    }

    /// A record with the given fields set and the rest defaulted. Fails if
    /// any of the names isn't a field of `schema`.
    pub fn from_overrides<I, K, V>(
        schema: Arc<ContainerSchema>,
        prefix: Option<&str>,
        overrides: I,
    ) -> Result<Container>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut container = match prefix {
            Some(prefix) => Container::with_prefix(schema, prefix),
            None => Container::new(schema),
        };
        container.update(overrides)?;
        Ok(container)
    }

    pub fn schema(&self) -> &Arc<ContainerSchema> {
        &self.schema
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn set_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = prefix.into();
    }

    fn index_of(&self, field: &str) -> Result<usize> {
        self.schema
            .index_of(field)
            .ok_or_else(|| ContainerError::UnknownField {
                container: self.schema.name().to_string(),
                field: field.to_string(),
            })
    }

    pub fn get(&self, field: &str) -> Result<&Value> {
        let i = self.index_of(field)?;
        Ok(&self.values[i])
    }

    pub fn get_mut(&mut self, field: &str) -> Result<&mut Value> {
        let i = self.index_of(field)?;
        Ok(&mut self.values[i])
    }

    /// Assign a field. The value isn't checked against the field's default
    /// or unit.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        *self.get_mut(field)? = value.into();
        Ok(())
    }

    /// Assign several fields at once. If any name is unknown, nothing is
    /// assigned.
    pub fn update<I, K, V>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let resolved = values
            .into_iter()
            .map(|(k, v)| Ok((self.index_of(k.as_ref())?, v.into())))
            .collect::<Result<Vec<(usize, Value)>>>()?;
        for (i, v) in resolved {
            self.values[i] = v;
        }
        Ok(())
    }

    /// The sub-record held by `field`.
    pub fn container(&self, field: &str) -> Result<&Container> {
        match self.get(field)? {
            Value::Container(c) => Ok(&**c),
            other => Err(wrong_kind(field, "container", other)),
        }
    }

    pub fn container_mut(&mut self, field: &str) -> Result<&mut Container> {
        match self.get_mut(field)? {
            Value::Container(c) => Ok(&mut **c),
            other => Err(wrong_kind(field, "container", other)),
        }
    }

    /// The keyed collection held by `field`.
    pub fn map(&self, field: &str) -> Result<&ContainerMap> {
        match self.get(field)? {
            Value::Map(m) => Ok(m),
            other => Err(wrong_kind(field, "map", other)),
        }
    }

    pub fn map_mut(&mut self, field: &str) -> Result<&mut ContainerMap> {
        match self.get_mut(field)? {
            Value::Map(m) => Ok(m),
            other => Err(wrong_kind(field, "map", other)),
        }
    }

    pub fn fields(&self) -> &[Field] {
        self.schema.fields()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.schema.fields().iter().map(Field::name)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Field descriptors paired with their current values.
    pub fn items(&self) -> impl Iterator<Item = (&Field, &Value)> {
        self.schema.fields().iter().zip(self.values.iter())
    }

    /// Put every field back to a freshly produced default. Factories are
    /// called again; fields with a shared default get their own copy of it,
    /// so the record no longer aliases anything.
    pub fn reset(&mut self) {
        trace!("Resetting {} '{}'", self.schema.name(), self.prefix);
        for (value, field) in self.values.iter_mut().zip(self.schema.fields()) {
            *value = field.default().produce_detached();
        }
    }
}

fn wrong_kind(field: &str, expected: &'static str, found: &Value) -> ContainerError {
    ContainerError::WrongKind {
        field: field.to_string(),
        expected,
        found: found.kind(),
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name()
            && self.prefix == other.prefix
            && self.values == other.values
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.schema.name());
        s.field("prefix", &self.prefix);
        for (field, value) in self.items() {
            s.field(field.name(), value);
        }
        s.finish()
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (prefix '{}'):", self.schema.name(), self.prefix)?;
        let width = self.keys().map(str::len).max().unwrap_or(0);
        for (field, value) in self.items() {
            let unit = field.unit().map(|u| format!(" [{u}]")).unwrap_or_default();
            write!(f, "    {:width$}: {value}{unit}", field.name())?;
            if !field.description().is_empty() {
                write!(f, "  # {}", field.description())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Serialize for Container {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.export(ExportOptions::nested()).serialize(serializer)
    }
}
