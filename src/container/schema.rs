//! Record types: an ordered list of field descriptors with a name and a
//! default column prefix.

use std::{collections::HashSet, fmt, sync::Arc};

use log::{debug, trace};

use super::{
    error::{ContainerError, Result},
    map::ContainerMap,
    value::{SharedValue, Value},
    Container,
};

/// A zero-argument producer of a field's default value.
pub type DefaultFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// How a field's value is initialised on construction and on reset.
#[derive(Clone)]
pub enum FieldDefault {
    /// An immutable literal, cloned into each instance.
    Value(Value),

    /// Called once per instance (and again on every reset), so that no two
    /// instances share a mutable value.
    Factory(DefaultFactory),

    /// A mutable literal. Every instance aliases the same object; see
    /// [`SharedValue`].
    Shared(SharedValue),
}

impl FieldDefault {
    /// The value a freshly constructed instance gets.
    pub fn produce(&self) -> Value {
        match self {
            FieldDefault::Value(v) => v.clone(),
            FieldDefault::Factory(f) => f(),
            FieldDefault::Shared(s) => Value::Shared(s.clone()),
        }
    }

    /// The value a reset instance gets. Unlike [`FieldDefault::produce`],
    /// shared defaults are deep-copied rather than aliased.
    pub(crate) fn produce_detached(&self) -> Value {
        match self {
            FieldDefault::Shared(s) => s.get(),
            other => other.produce(),
        }
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDefault::Value(v) => f.debug_tuple("Value").field(v).finish(),
            FieldDefault::Factory(_) => f.write_str("Factory(..)"),
            FieldDefault::Shared(s) => f.debug_tuple("Shared").field(s).finish(),
        }
    }
}

/// A field descriptor.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    default: FieldDefault,
    unit: Option<String>,
    description: String,
}

impl Field {
    /// A field with a literal default. If the literal is mutable (a list, an
    /// array, a record, ...), it is shared between all instances of the
    /// record type. Use [`Field::with_factory`] to avoid that.
    pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Field {
        let default = default.into();
        let default = match default {
            Value::Shared(s) => FieldDefault::Shared(s),
            v if v.is_mutable() => FieldDefault::Shared(SharedValue::new(v)),
            v => FieldDefault::Value(v),
        };
        Field {
            name: name.into(),
            default,
            unit: None,
            description: String::new(),
        }
    }

    pub fn with_factory<F>(name: impl Into<String>, factory: F) -> Field
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Field {
            name: name.into(),
            default: FieldDefault::Factory(Arc::new(factory)),
            unit: None,
            description: String::new(),
        }
    }

    /// A nested record field; each instance gets its own fresh sub-record.
    pub fn container(name: impl Into<String>, schema: &Arc<ContainerSchema>) -> Field {
        let schema = Arc::clone(schema);
        let description = format!("{} sub-record", schema.name());
        Field::with_factory(name, move || Container::new(Arc::clone(&schema)).into())
            .with_description(description)
    }

    /// A keyed collection of `schema` records, empty on construction.
    pub fn map(name: impl Into<String>, schema: &Arc<ContainerSchema>) -> Field {
        let schema = Arc::clone(schema);
        let description = format!("map of {} records", schema.name());
        Field::with_factory(name, move || ContainerMap::new(Arc::clone(&schema)).into())
            .with_description(description)
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Field {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Field {
        self.description = description.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default(&self) -> &FieldDefault {
        &self.default
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// A named record type with a fixed, ordered set of fields.
#[derive(Debug)]
pub struct ContainerSchema {
    name: String,
    default_prefix: String,
    fields: Vec<Field>,
}

impl ContainerSchema {
    pub fn builder(name: impl Into<String>) -> ContainerSchemaBuilder {
        ContainerSchemaBuilder {
            name: name.into(),
            prefix: None,
            fields: vec![],
            deny_shared_defaults: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The prefix instances are bound to unless another is given.
    pub fn default_prefix(&self) -> &str {
        &self.default_prefix
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.index_of(name).map(|i| &self.fields[i])
    }

    pub(crate) fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

pub struct ContainerSchemaBuilder {
    name: String,
    prefix: Option<String>,
    fields: Vec<Field>,
    deny_shared_defaults: bool,
}

impl ContainerSchemaBuilder {
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Reject fields with plain mutable defaults when building, rather than
    /// letting their instances alias one object.
    pub fn deny_shared_defaults(mut self) -> Self {
        self.deny_shared_defaults = true;
        self
    }

    pub fn build(self) -> Result<Arc<ContainerSchema>> {
        let mut seen = HashSet::with_capacity(self.fields.len());
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(ContainerError::DuplicateField {
                    container: self.name,
                    field: field.name.clone(),
                });
            }
            if let FieldDefault::Shared(_) = field.default {
                if self.deny_shared_defaults {
                    return Err(ContainerError::SharedDefault {
                        container: self.name,
                        field: field.name.clone(),
                    });
                }
                trace!(
                    "{} field '{}' has a shared mutable default",
                    self.name,
                    field.name
                );
            }
        }

        let default_prefix = self
            .prefix
            .unwrap_or_else(|| prefix_from_type_name(&self.name));
        debug!(
            "Declared record type {} (prefix '{default_prefix}', {} fields)",
            self.name,
            self.fields.len()
        );
        Ok(Arc::new(ContainerSchema {
            name: self.name,
            default_prefix,
            fields: self.fields,
        }))
    }
}

/// "HillasParametersContainer" -> "hillas_parameters".
pub(crate) fn prefix_from_type_name(name: &str) -> String {
    let stem = name.strip_suffix("Container").unwrap_or(name);
    let mut prefix = String::with_capacity(stem.len() + 4);
    let mut prev_lower = false;
    for c in stem.chars() {
        if c.is_uppercase() {
            if prev_lower {
                prefix.push('_');
            }
            prefix.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            prefix.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    prefix
}
