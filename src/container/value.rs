//! Field values held by [`Container`]s.

use std::{
    borrow::Cow,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use hifitime::Epoch;
use itertools::Itertools;
use ndarray::{Array1, ArrayD, ArrayViewD};
use serde::{Serialize, Serializer};

use super::{map::ContainerMap, Container};

/// A value stored in a container field.
///
/// Assignment is unchecked; a field declared with a float default may be
/// handed a string later on.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A time stamp. Serialised as an ISO-8601 UTC string.
    Time(Epoch),
    /// An N-dimensional array, e.g. a camera image.
    Array(ArrayD<f64>),
    List(Vec<Value>),
    /// A nested record.
    Container(Box<Container>),
    /// Records keyed by an identifier (e.g. a telescope ID).
    Map(ContainerMap),
    /// A value aliased by every holder of the same [`SharedValue`]. This is
    /// what a plain (non-factory) mutable default turns into.
    Shared(SharedValue),
}

impl Value {
    /// Is this a kind of value that can be changed in place? Plain defaults
    /// of these kinds are shared between container instances.
    pub fn is_mutable(&self) -> bool {
        matches!(
            self,
            Value::Array(_) | Value::List(_) | Value::Container(_) | Value::Map(_) | Value::Shared(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Time(_) => "time",
            Value::Array(_) => "array",
            Value::List(_) => "list",
            Value::Container(_) => "container",
            Value::Map(_) => "map",
            Value::Shared(_) => "shared",
        }
    }

    /// Look through a [`Value::Shared`] cell, taking a snapshot of its
    /// current contents. Other values are borrowed as they are.
    pub fn resolved(&self) -> Cow<'_, Value> {
        match self {
            Value::Shared(shared) => Cow::Owned(shared.get().resolved().into_owned()),
            other => Cow::Borrowed(other),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Floats, and integers widened to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_epoch(&self) -> Option<Epoch> {
        match self {
            Value::Time(e) => Some(*e),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayD<f64>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Value::Container(c) => Some(&**c),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ContainerMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_shared(&self) -> Option<&SharedValue> {
        match self {
            Value::Shared(s) => Some(s),
            _ => None,
        }
    }
}

/// NaN placeholders compare equal to each other, so that "unset" float
/// fields survive comparisons of whole records.
fn floats_eq(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => floats_eq(*a, *b),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.shape() == b.shape() && a.iter().zip(b.iter()).all(|(x, y)| floats_eq(*x, *y))
            }
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Container(a), Value::Container(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Shared(a), Value::Shared(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Time(e) => write!(f, "{e}"),
            Value::Array(a) => write!(f, "array(shape={:?})", a.shape()),
            Value::List(l) => write!(f, "[{}]", l.iter().join(", ")),
            Value::Container(c) => write!(f, "{}(prefix={:?})", c.schema().name(), c.prefix()),
            Value::Map(m) => write!(f, "Map[{}]({} entries)", m.schema().name(), m.len()),
            Value::Shared(s) => write!(f, "{}", s.get()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::None => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Time(e) => serializer.collect_str(e),
            Value::Array(a) => NestedArray(a.view()).serialize(serializer),
            Value::List(l) => serializer.collect_seq(l),
            Value::Container(c) => c.serialize(serializer),
            Value::Map(m) => m.serialize(serializer),
            Value::Shared(s) => s.lock().serialize(serializer),
        }
    }
}

/// Serialises an array as nested lists, one level per dimension.
struct NestedArray<'a>(ArrayViewD<'a, f64>);

impl Serialize for NestedArray<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.ndim() == 0 {
            let scalar = self.0.iter().next().copied().unwrap_or(f64::NAN);
            return serializer.serialize_f64(scalar);
        }
        serializer.collect_seq(self.0.outer_iter().map(NestedArray))
    }
}

/// A value cell aliased by everything that clones it.
///
/// Container fields declared with a plain mutable default (a list, an array,
/// a record) hold one of these; every instance of the record type then sees
/// the same object, and a change made through one instance is visible in all
/// others.
#[derive(Clone, Default)]
pub struct SharedValue(Arc<Mutex<Value>>);

impl SharedValue {
    pub fn new(value: Value) -> SharedValue {
        SharedValue(Arc::new(Mutex::new(value)))
    }

    /// Do both handles point at the same cell?
    pub fn ptr_eq(&self, other: &SharedValue) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// A snapshot of the current contents.
    pub fn get(&self) -> Value {
        self.lock().clone()
    }

    pub fn set(&self, value: impl Into<Value>) {
        *self.lock() = value.into();
    }

    /// Mutate the contents in place. The change is seen by every holder.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        f(&mut self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Value> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for SharedValue {
    fn eq(&self, other: &Self) -> bool {
        // Locking the same mutex twice would deadlock.
        self.ptr_eq(other) || *self.lock() == *other.lock()
    }
}

impl fmt::Debug for SharedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedValue").field(&*self.lock()).finish()
    }
}

/// The key of a [`ContainerMap`] entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    /// A numeric identifier, e.g. a telescope ID.
    Id(u64),
    Name(String),
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Id(id) => write!(f, "{id}"),
            MapKey::Name(name) => write!(f, "{name}"),
        }
    }
}

impl Serialize for MapKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<u64> for MapKey {
    fn from(id: u64) -> Self {
        MapKey::Id(id)
    }
}

impl From<u32> for MapKey {
    fn from(id: u32) -> Self {
        MapKey::Id(u64::from(id))
    }
}

impl From<u16> for MapKey {
    fn from(id: u16) -> Self {
        MapKey::Id(u64::from(id))
    }
}

impl From<&str> for MapKey {
    fn from(name: &str) -> Self {
        MapKey::Name(name.to_string())
    }
}

impl From<String> for MapKey {
    fn from(name: String) -> Self {
        MapKey::Name(name)
    }
}

macro_rules! impl_from_for_value {
    ($($t:ty => $variant:ident via $conv:expr),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant($conv(v))
                }
            }
        )*
    };
}

impl_from_for_value!(
    bool => Bool via std::convert::identity,
    i64 => Int via std::convert::identity,
    i32 => Int via i64::from,
    u32 => Int via i64::from,
    f64 => Float via std::convert::identity,
    f32 => Float via f64::from,
    String => Str via std::convert::identity,
    &str => Str via str::to_string,
    Epoch => Time via std::convert::identity,
    ArrayD<f64> => Array via std::convert::identity,
    Array1<f64> => Array via Array1::into_dyn,
    Vec<Value> => List via std::convert::identity,
    SharedValue => Shared via std::convert::identity,
    ContainerMap => Map via std::convert::identity,
);

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Array(Array1::from(v).into_dyn())
    }
}

impl From<Container> for Value {
    fn from(c: Container) -> Self {
        Value::Container(Box::new(c))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::None, Into::into)
    }
}
