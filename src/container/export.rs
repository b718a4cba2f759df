//! Turning records into mappings: opaque, nested, or flattened into a single
//! table row.

use indexmap::IndexMap;
use log::warn;
use serde::{Serialize, Serializer};

use super::{schema::Field, value::Value, Container};

/// The shape of an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Descend into sub-records and maps. Without this, sub-records are
    /// passed through as opaque values and maps are skipped.
    pub recursive: bool,

    /// Only meaningful with `recursive`: merge every leaf of the sub-tree
    /// into one level.
    pub flatten: bool,

    /// Prepend the owning record's prefix to each key. Two instances of the
    /// same type with different prefixes then produce disjoint keys.
    pub add_prefix: bool,
}

impl ExportOptions {
    /// Only this record's own fields; sub-records stay opaque.
    pub fn shallow() -> ExportOptions {
        ExportOptions::default()
    }

    pub fn nested() -> ExportOptions {
        ExportOptions {
            recursive: true,
            flatten: false,
            add_prefix: false,
        }
    }

    /// One leaf per key, suitable for a table row.
    pub fn flat() -> ExportOptions {
        ExportOptions {
            recursive: true,
            flatten: true,
            add_prefix: false,
        }
    }

    pub fn with_prefix(mut self, add_prefix: bool) -> ExportOptions {
        self.add_prefix = add_prefix;
        self
    }
}

/// One entry of an export.
#[derive(Debug, Clone, PartialEq)]
pub enum Exported {
    Value(Value),
    Nested(ExportMap),
}

impl Exported {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Exported::Value(v) => Some(v),
            Exported::Nested(_) => None,
        }
    }

    pub fn as_nested(&self) -> Option<&ExportMap> {
        match self {
            Exported::Value(_) => None,
            Exported::Nested(m) => Some(m),
        }
    }
}

impl Serialize for Exported {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Exported::Value(v) => v.serialize(serializer),
            Exported::Nested(m) => m.serialize(serializer),
        }
    }
}

/// Keys are in field declaration order.
pub type ExportMap = IndexMap<String, Exported>;

/// How a leaf's key is built while walking a record tree.
#[derive(Clone, Copy)]
enum KeyStyle {
    /// `parent.child.field`; map keys are path segments.
    Path,
    /// `{prefix}_{field}` with the prefix of the record owning the field,
    /// preceded by the prefixes of the enclosing records and any map keys
    /// on the way down (`event_1_hillas_intensity`).
    Prefix,
}

impl Container {
    /// Export this record as a mapping from field name to value.
    ///
    /// * non-recursive: this record's fields only; sub-records are passed
    ///   through as opaque values and maps are skipped.
    /// * recursive: sub-records and maps are expanded into nested mappings.
    /// * recursive and flat: every leaf of the sub-tree in one mapping.
    ///
    /// [`Value::Shared`] cells are resolved to a snapshot of their contents.
    pub fn export(&self, options: ExportOptions) -> ExportMap {
        if options.recursive && options.flatten {
            return self
                .to_row(options.add_prefix)
                .into_iter()
                .map(|(k, v)| (k, Exported::Value(v)))
                .collect();
        }

        let mut out = ExportMap::with_capacity(self.schema().len());
        for (field, value) in self.items() {
            let key = self.column_name(field.name(), options.add_prefix);
            let value = value.resolved();
            let exported = match value.as_ref() {
                Value::Map(_) if !options.recursive => continue,
                Value::Map(map) => Exported::Nested(map.export(options)),
                Value::Container(c) if options.recursive => Exported::Nested(c.export(options)),
                other => Exported::Value(other.clone()),
            };
            out.insert(key, exported);
        }
        out
    }

    /// Every leaf of the record tree as a single-level row; the mapping a
    /// tabular writer consumes. Without `add_prefix`, keys are dotted paths
    /// (`index.event_id`, `dl1.1.hillas.intensity`); with it, keys are
    /// prefixed column names qualified by every enclosing prefix
    /// (`event_hillas_intensity`, `event_1_dl1_hillas_intensity`), so
    /// records bound to different prefixes never share a column.
    ///
    /// Key collisions keep the later value.
    pub fn to_row(&self, add_prefix: bool) -> IndexMap<String, Value> {
        let style = if add_prefix {
            KeyStyle::Prefix
        } else {
            KeyStyle::Path
        };
        let mut row = IndexMap::new();
        self.visit_leaves("", style, &mut |key, _, value| {
            if row.insert(key.clone(), value).is_some() {
                warn!("Column '{key}' appears more than once; keeping the last value");
            }
        });
        row
    }

    /// The unit of every leaf column that declares one, keyed the same way as
    /// [`Container::to_row`].
    pub fn column_units(&self, add_prefix: bool) -> IndexMap<String, String> {
        let style = if add_prefix {
            KeyStyle::Prefix
        } else {
            KeyStyle::Path
        };
        let mut units = IndexMap::new();
        self.visit_leaves("", style, &mut |key, field, _| {
            if let Some(unit) = field.unit() {
                units.insert(key, unit.to_string());
            }
        });
        units
    }

    pub(crate) fn column_name(&self, field: &str, add_prefix: bool) -> String {
        if add_prefix && !self.prefix().is_empty() {
            format!("{}_{field}", self.prefix())
        } else {
            field.to_string()
        }
    }

    /// This record's prefix followed by `_`, or nothing without a prefix.
    fn prefix_scope(&self) -> String {
        if self.prefix().is_empty() {
            String::new()
        } else {
            format!("{}_", self.prefix())
        }
    }

    /// Walk the leaves depth-first in declaration order. `path` is what
    /// precedes this record's keys: a dotted path for [`KeyStyle::Path`], the
    /// enclosing prefixes and map keys each followed by `_` for
    /// [`KeyStyle::Prefix`].
    fn visit_leaves(
        &self,
        path: &str,
        style: KeyStyle,
        visit: &mut dyn FnMut(String, &Field, Value),
    ) {
        for (field, value) in self.items() {
            let value = value.resolved();
            match value.as_ref() {
                Value::Container(c) => {
                    let child_path = match style {
                        KeyStyle::Path => join_path(path, field.name()),
                        KeyStyle::Prefix => format!("{path}{}", self.prefix_scope()),
                    };
                    c.visit_leaves(&child_path, style, visit);
                }
                Value::Map(map) => {
                    for (key, c) in map.iter() {
                        let child_path = match style {
                            KeyStyle::Path => {
                                join_path(&join_path(path, field.name()), &key.to_string())
                            }
                            KeyStyle::Prefix => format!("{path}{}{key}_", self.prefix_scope()),
                        };
                        c.visit_leaves(&child_path, style, visit);
                    }
                }
                leaf => {
                    let key = match style {
                        KeyStyle::Path => join_path(path, field.name()),
                        KeyStyle::Prefix => {
                            format!("{path}{}", self.column_name(field.name(), true))
                        }
                    };
                    visit(key, field, leaf.clone());
                }
            }
        }
    }
}

fn join_path(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}.{segment}")
    }
}
