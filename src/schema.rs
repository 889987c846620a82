//! Record type metadata: the read-only schema consumed by generation and
//! persistence.
//!
//! The registry is built programmatically at startup with a fluent builder
//! and never mutated afterwards. It answers the three questions the core
//! asks of any record type: what are its properties, which property is its
//! primary key (and who assigns it), and which properties are foreign keys
//! into other registered types.

use std::collections::HashMap;

use crate::value::ValueKind;

/// Primary-key strategy for a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryKey {
	/// No primary key; the type is written without identity handling.
	None,
	/// Client-assigned key on the named property; a unique value is
	/// generated on the deferred ledger before the batch is written.
	Manual(String),
	/// Store-assigned identity on the named property; the value is read
	/// back after the batch executes.
	Auto(String),
}

impl PrimaryKey {
	/// The key property name, if the type has one.
	pub fn property(&self) -> Option<&str> {
		match self {
			PrimaryKey::None => None,
			PrimaryKey::Manual(name) | PrimaryKey::Auto(name) => Some(name),
		}
	}

	/// Returns true when the named property is a store-assigned key.
	pub fn is_auto_property(&self, name: &str) -> bool {
		matches!(self, PrimaryKey::Auto(prop) if prop == name)
	}
}

/// Value constraints attached to a property.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraints {
	/// Maximum text length; also the width of unique letter encodings.
	pub max_length: Option<usize>,
	/// Upper bound for generated numeric values.
	pub max_value: Option<i64>,
	/// Decimal places for generated floating-point values.
	pub precision: Option<u8>,
}

impl Constraints {
	/// No constraints.
	pub fn none() -> Self {
		Self::default()
	}

	/// Constraint set with only a maximum length.
	pub fn max_length(length: usize) -> Self {
		Self {
			max_length: Some(length),
			..Self::default()
		}
	}

	/// Constraint set with only an upper numeric bound.
	pub fn max_value(value: i64) -> Self {
		Self {
			max_value: Some(value),
			..Self::default()
		}
	}
}

/// One declared property of a record type.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySpec {
	name: String,
	kind: ValueKind,
	constraints: Constraints,
	unique: bool,
}

impl PropertySpec {
	/// Creates an unconstrained, non-unique property.
	pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
		Self {
			name: name.into(),
			kind,
			constraints: Constraints::none(),
			unique: false,
		}
	}

	/// Creates a constrained, non-unique property.
	pub fn with_constraints(
		name: impl Into<String>,
		kind: ValueKind,
		constraints: Constraints,
	) -> Self {
		Self {
			constraints,
			..Self::new(name, kind)
		}
	}

	/// Property name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Property kind.
	pub fn kind(&self) -> &ValueKind {
		&self.kind
	}

	/// Declared constraints.
	pub fn constraints(&self) -> &Constraints {
		&self.constraints
	}

	/// True when the property carries a deferred unique value, mirroring
	/// the generation strategy of a manual primary key.
	pub fn unique(&self) -> bool {
		self.unique
	}
}

/// Foreign-key declaration: a property referencing the key of another type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
	/// Property on the declaring type that holds the referenced key.
	pub property: String,
	/// Registered name of the referenced (primary-table) type.
	pub target_type: String,
	/// Key property on the referenced type.
	pub target_property: String,
}

/// Metadata for one registered record type.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
	name: String,
	table: String,
	properties: Vec<PropertySpec>,
	primary_key: PrimaryKey,
	foreign_keys: Vec<ForeignKey>,
}

impl RecordSchema {
	/// Starts a schema for the given type name.
	///
	/// The table name defaults to the lowercased last dotted segment of the
	/// type name (`"crm.Customer"` → `"customer"`).
	pub fn new(name: impl Into<String>) -> Self {
		let name = name.into();
		let table = name
			.rsplit('.')
			.next()
			.unwrap_or(name.as_str())
			.to_lowercase();
		Self {
			name,
			table,
			properties: Vec::new(),
			primary_key: PrimaryKey::None,
			foreign_keys: Vec::new(),
		}
	}

	/// Overrides the table name used for insert statements.
	pub fn table(mut self, table: impl Into<String>) -> Self {
		self.table = table.into();
		self
	}

	/// Adds an unconstrained property.
	pub fn property(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
		self.properties.push(PropertySpec::new(name, kind));
		self
	}

	/// Adds a property with constraints.
	pub fn constrained_property(
		mut self,
		name: impl Into<String>,
		kind: ValueKind,
		constraints: Constraints,
	) -> Self {
		let mut spec = PropertySpec::new(name, kind);
		spec.constraints = constraints;
		self.properties.push(spec);
		self
	}

	/// Adds a property whose value is drawn from the deferred unique-value
	/// ledger instead of the plain generator.
	pub fn unique_property(
		mut self,
		name: impl Into<String>,
		kind: ValueKind,
		constraints: Constraints,
	) -> Self {
		let mut spec = PropertySpec::new(name, kind);
		spec.constraints = constraints;
		spec.unique = true;
		self.properties.push(spec);
		self
	}

	/// Declares a store-assigned integer identity on `name` and adds the
	/// backing property.
	pub fn auto_key(mut self, name: impl Into<String>) -> Self {
		let name = name.into();
		self.properties
			.push(PropertySpec::new(name.clone(), ValueKind::Int));
		self.primary_key = PrimaryKey::Auto(name);
		self
	}

	/// Declares a client-assigned key on `name` and adds the backing
	/// property; the value is generated uniquely before the batch writes.
	pub fn manual_key(
		mut self,
		name: impl Into<String>,
		kind: ValueKind,
		constraints: Constraints,
	) -> Self {
		let name = name.into();
		let mut spec = PropertySpec::new(name.clone(), kind);
		spec.constraints = constraints;
		self.properties.push(spec);
		self.primary_key = PrimaryKey::Manual(name);
		self
	}

	/// Declares a foreign key: `property` holds the value of
	/// `target_type.target_property`. The backing property is added as an
	/// integer column.
	pub fn foreign_key(
		mut self,
		property: impl Into<String>,
		target_type: impl Into<String>,
		target_property: impl Into<String>,
	) -> Self {
		let property = property.into();
		self.properties
			.push(PropertySpec::new(property.clone(), ValueKind::Int));
		self.foreign_keys.push(ForeignKey {
			property,
			target_type: target_type.into(),
			target_property: target_property.into(),
		});
		self
	}

	/// Registered type name.
	pub fn type_name(&self) -> &str {
		&self.name
	}

	/// Table written by insert statements.
	pub fn table_name(&self) -> &str {
		&self.table
	}

	/// Declared properties, in declaration order.
	pub fn properties(&self) -> &[PropertySpec] {
		&self.properties
	}

	/// Looks up a property by name.
	pub fn find_property(&self, name: &str) -> Option<&PropertySpec> {
		self.properties.iter().find(|p| p.name() == name)
	}

	/// Primary-key strategy.
	pub fn primary_key(&self) -> &PrimaryKey {
		&self.primary_key
	}

	/// Declared foreign keys.
	pub fn foreign_keys(&self) -> &[ForeignKey] {
		&self.foreign_keys
	}
}

/// Read-only registry of record schemas, keyed by type name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
	types: HashMap<String, RecordSchema>,
}

impl SchemaRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a schema, replacing any previous schema of the same name.
	pub fn register(mut self, schema: RecordSchema) -> Self {
		self.types.insert(schema.type_name().to_string(), schema);
		self
	}

	/// Looks up a type by registered name.
	pub fn get(&self, type_name: &str) -> Option<&RecordSchema> {
		self.types.get(type_name)
	}

	/// Returns true when `type_name` is registered.
	pub fn contains(&self, type_name: &str) -> bool {
		self.types.contains_key(type_name)
	}

	/// Primary-key strategy for a type, `PrimaryKey::None` when unknown.
	pub fn primary_key(&self, type_name: &str) -> PrimaryKey {
		self.get(type_name)
			.map(|s| s.primary_key().clone())
			.unwrap_or(PrimaryKey::None)
	}

	/// Foreign keys declared on a type, empty when unknown.
	pub fn foreign_keys(&self, type_name: &str) -> &[ForeignKey] {
		self.get(type_name).map(|s| s.foreign_keys()).unwrap_or(&[])
	}

	/// Constraints for a property, defaults when unknown.
	pub fn constraints(&self, type_name: &str, property: &str) -> Constraints {
		self.get(type_name)
			.and_then(|s| s.find_property(property))
			.map(|p| p.constraints().clone())
			.unwrap_or_default()
	}

	/// Number of registered types.
	pub fn len(&self) -> usize {
		self.types.len()
	}

	/// Returns true when no type is registered.
	pub fn is_empty(&self) -> bool {
		self.types.is_empty()
	}
}
