//! Dynamic row model shared by generation and persistence.
//!
//! Populated records are schema-driven rather than statically typed: a
//! [`Record`] is a property-name to [`Value`] map, and the shape of each
//! record type lives in the [`SchemaRegistry`](crate::schema::SchemaRegistry).

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

/// Shape of a property as declared in the schema.
///
/// Leaf kinds are generated through the value-generation boundary; `Record`
/// marks a nested composite type built recursively, and `List` is the
/// handled-collection shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
	/// Boolean column.
	Bool,
	/// Signed integer column.
	Int,
	/// Floating-point column.
	Float,
	/// Text column.
	Text,
	/// Timestamp column (naive, no offset).
	DateTime,
	/// UUID column.
	Uuid,
	/// Nested composite record, named by its registered type.
	Record(String),
	/// Homogeneous list of the given element kind.
	List(Box<ValueKind>),
}

impl ValueKind {
	/// Returns true for kinds the leaf value generator can produce directly.
	pub fn is_leaf(&self) -> bool {
		!matches!(self, ValueKind::Record(_) | ValueKind::List(_))
	}
}

impl fmt::Display for ValueKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ValueKind::Bool => write!(f, "bool"),
			ValueKind::Int => write!(f, "int"),
			ValueKind::Float => write!(f, "float"),
			ValueKind::Text => write!(f, "text"),
			ValueKind::DateTime => write!(f, "datetime"),
			ValueKind::Uuid => write!(f, "uuid"),
			ValueKind::Record(name) => write!(f, "record<{name}>"),
			ValueKind::List(elem) => write!(f, "list<{elem}>"),
		}
	}
}

/// A dynamically typed cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
	/// Absent value; also the degraded fallback for unbuildable branches.
	Null,
	/// Boolean value.
	Bool(bool),
	/// Signed integer value.
	Int(i64),
	/// Floating-point value.
	Float(f64),
	/// Text value.
	Text(String),
	/// Timestamp value.
	DateTime(NaiveDateTime),
	/// UUID value.
	Uuid(Uuid),
	/// Nested composite record.
	Record(Record),
	/// List of values.
	List(Vec<Value>),
}

impl Value {
	/// Short name of this value's runtime kind, for diagnostics.
	pub fn kind_name(&self) -> &'static str {
		match self {
			Value::Null => "null",
			Value::Bool(_) => "bool",
			Value::Int(_) => "int",
			Value::Float(_) => "float",
			Value::Text(_) => "text",
			Value::DateTime(_) => "datetime",
			Value::Uuid(_) => "uuid",
			Value::Record(_) => "record",
			Value::List(_) => "list",
		}
	}

	/// Returns true when the value is structurally acceptable for `kind`.
	///
	/// `Null` matches any kind: generation degrades to null on cut branches
	/// and writes carry it as a SQL NULL.
	pub fn matches_kind(&self, kind: &ValueKind) -> bool {
		match (self, kind) {
			(Value::Null, _) => true,
			(Value::Bool(_), ValueKind::Bool) => true,
			(Value::Int(_), ValueKind::Int) => true,
			(Value::Float(_), ValueKind::Float) => true,
			(Value::Text(_), ValueKind::Text) => true,
			(Value::DateTime(_), ValueKind::DateTime) => true,
			(Value::Uuid(_), ValueKind::Uuid) => true,
			(Value::Record(_), ValueKind::Record(_)) => true,
			(Value::List(items), ValueKind::List(elem)) => {
				items.iter().all(|v| v.matches_kind(elem))
			}
			_ => false,
		}
	}

	/// Returns the integer payload, if this is an `Int`.
	pub fn as_int(&self) -> Option<i64> {
		match self {
			Value::Int(n) => Some(*n),
			_ => None,
		}
	}

	/// Returns the text payload, if this is a `Text`.
	pub fn as_text(&self) -> Option<&str> {
		match self {
			Value::Text(s) => Some(s),
			_ => None,
		}
	}

	/// Returns true for `Null`.
	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}
}

impl From<i64> for Value {
	fn from(n: i64) -> Self {
		Value::Int(n)
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Value::Text(s.to_string())
	}
}

impl From<String> for Value {
	fn from(s: String) -> Self {
		Value::Text(s)
	}
}

impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Value::Bool(b)
	}
}

/// One in-memory row: property name to value.
///
/// Property order for statement building comes from the schema, not from
/// this map.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
	#[serde(flatten)]
	values: HashMap<String, Value>,
}

impl Record {
	/// Creates an empty record.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the value of `property`, if set.
	pub fn get(&self, property: &str) -> Option<&Value> {
		self.values.get(property)
	}

	/// Sets `property` to `value`, replacing any previous value.
	pub fn set(&mut self, property: &str, value: Value) {
		self.values.insert(property.to_string(), value);
	}

	/// Returns true when `property` has been set.
	pub fn contains(&self, property: &str) -> bool {
		self.values.contains_key(property)
	}

	/// Number of set properties.
	pub fn len(&self) -> usize {
		self.values.len()
	}

	/// Returns true when no property has been set.
	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	/// Iterates over the set properties in arbitrary order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.values.iter().map(|(k, v)| (k.as_str(), v))
	}
}

/// Builds a record from `(property, value)` pairs.
impl<S: Into<String>, V: Into<Value>> FromIterator<(S, V)> for Record {
	fn from_iter<I: IntoIterator<Item = (S, V)>>(iter: I) -> Self {
		let mut record = Record::new();
		for (name, value) in iter {
			record.values.insert(name.into(), value.into());
		}
		record
	}
}
