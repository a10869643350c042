//! In-memory attribute values and instance slots.

use crate::store::ObjectId;
use crate::workbook::Cell;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt::{Display, Formatter};

/// Canonical in-memory value of a non-relationship attribute.
///
/// Raw, loosely-typed input (cells, user strings) is also carried as a
/// `Value` until `clean` coerces it into the attribute's canonical variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// Enum member, stored by member name.
    Enum(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) | Self::Enum(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Bool(true) => write!(f, "True"),
            Self::Bool(false) => write!(f, "False"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::String(value) | Self::Enum(value) => write!(f, "{value}"),
            Self::Date(value) => write!(f, "{value}"),
            Self::Time(value) => write!(f, "{value}"),
            Self::DateTime(value) => write!(f, "{value}"),
        }
    }
}

impl From<Cell> for Value {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Empty => Self::None,
            Cell::Bool(value) => Self::Bool(value),
            Cell::Number(value) => Self::Float(value),
            Cell::Text(value) => Self::String(value),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<NaiveTime> for Value {
    fn from(value: NaiveTime) -> Self {
        Self::Time(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

/// Content of one instance slot, and the input shape accepted by setters.
///
/// Scalar attributes hold `Value`; single-valued relationship sides hold
/// `Object`; collection sides hold `Objects`.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Value(Value),
    Object(Option<ObjectId>),
    Objects(Vec<ObjectId>),
}

impl Field {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<Option<ObjectId>> {
        match self {
            Self::Object(object) => Some(*object),
            _ => None,
        }
    }

    pub fn as_objects(&self) -> Option<&[ObjectId]> {
        match self {
            Self::Objects(objects) => Some(objects.as_slice()),
            _ => None,
        }
    }

    /// Every object referenced by this slot.
    pub fn linked(&self) -> Vec<ObjectId> {
        match self {
            Self::Value(_) => Vec::new(),
            Self::Object(object) => object.iter().copied().collect(),
            Self::Objects(objects) => objects.clone(),
        }
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<ObjectId> for Field {
    fn from(value: ObjectId) -> Self {
        Self::Object(Some(value))
    }
}

impl From<Option<ObjectId>> for Field {
    fn from(value: Option<ObjectId>) -> Self {
        Self::Object(value)
    }
}

impl From<Vec<ObjectId>> for Field {
    fn from(value: Vec<ObjectId>) -> Self {
        Self::Objects(value)
    }
}

impl From<&[ObjectId]> for Field {
    fn from(value: &[ObjectId]) -> Self {
        Self::Objects(value.to_vec())
    }
}

macro_rules! field_from_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Field {
                fn from(value: $ty) -> Self {
                    Self::Value(Value::from(value))
                }
            }
        )*
    };
}

field_from_value!(&str, String, bool, i64, f64, NaiveDate, NaiveTime, NaiveDateTime);
