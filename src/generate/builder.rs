//! Recursive graph builder: constructs populated record instances.

use tracing::warn;

use crate::error::PopulateResult;
use crate::generate::guard::RecursionGuard;
use crate::generate::ValueGenerator;
use crate::reference::{PropertyOverrides, PropertyPath};
use crate::schema::SchemaRegistry;
use crate::value::{Record, Value, ValueKind};

/// Builds one populated instance of a registered type, recursing into
/// nested composite properties.
///
/// Two conditions degrade to `Value::Null` instead of failing the whole
/// graph: a nested type that is not in the registry (there is no way to
/// construct it), and a recursive type entered again without an explicit
/// override for the branch. Both are logged on the warning channel.
pub struct TypeGenerator<'a, G: ValueGenerator> {
	schema: &'a SchemaRegistry,
	generator: &'a mut G,
	guard: RecursionGuard,
}

impl<'a, G: ValueGenerator> TypeGenerator<'a, G> {
	/// Creates a builder over the given registry and generation boundary.
	pub fn new(schema: &'a SchemaRegistry, generator: &'a mut G) -> Self {
		Self {
			schema,
			generator,
			guard: RecursionGuard::new(),
		}
	}

	/// Builds a populated record of `type_name`, consulting `overrides`
	/// for explicit per-path values.
	pub fn build(
		&mut self,
		type_name: &str,
		overrides: &PropertyOverrides,
	) -> PopulateResult<Record> {
		match self.build_at(type_name, &PropertyPath::root(), overrides)? {
			Value::Record(record) => Ok(record),
			_ => {
				warn!(type_name, "top-level type could not be constructed");
				Ok(Record::new())
			}
		}
	}

	fn build_at(
		&mut self,
		type_name: &str,
		path: &PropertyPath,
		overrides: &PropertyOverrides,
	) -> PopulateResult<Value> {
		let registry = self.schema;
		let Some(spec) = registry.get(type_name) else {
			warn!(type_name, %path, "type not registered; defaulting to null");
			return Ok(Value::Null);
		};
		if !self.guard.push(type_name, overrides, path) {
			warn!(
				type_name,
				%path,
				"recursive type without an override; cutting the branch"
			);
			return Ok(Value::Null);
		}
		let mut record = Record::new();
		for property in spec.properties() {
			// store-assigned keys stay unset until results bind back
			if spec.primary_key().is_auto_property(property.name()) {
				continue;
			}
			let child = path.child(property.name());
			let value = if let Some(factory) = overrides.get(&child) {
				factory()
			} else {
				match property.kind() {
					ValueKind::Record(inner) => self.build_at(inner, &child, overrides)?,
					ValueKind::List(_) => self
						.generator
						.collection(property.kind())
						.unwrap_or_else(|| Value::List(Vec::new())),
					_ => self.generator.generate(property),
				}
			};
			record.set(property.name(), value);
		}
		self.guard.pop()?;
		Ok(Value::Record(record))
	}
}
