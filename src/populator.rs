//! The populator session: the public entry point of the pipeline.
//!
//! One `Populator` owns all mutable pipeline state for a run — the record
//! arena, the unique-value counters, the deferred ledger, and the RNG —
//! so parallel runs and tests never share state through globals. A
//! persist batch is processed start to finish on the calling thread; the
//! single blocking point is the one `execute()` round trip on the write
//! boundary.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, warn};

use crate::error::{PopulateError, PopulateResult};
use crate::generate::deferred::{DeferredTarget, DeferredValueLedger};
use crate::generate::unique::{PropertyKey, ValueAccumulator};
use crate::generate::{StandardValueGenerator, TypeGenerator, ValueGenerator};
use crate::guarantee::{GuaranteedValues, ValueGuaranteePopulator};
use crate::persist::{OperationGraph, WritePrimitives};
use crate::reference::{
	ForeignKeyLink, PropertyOverrides, RecordArena, RecordReference, RefHandle,
};
use crate::schema::{PrimaryKey, SchemaRegistry};
use crate::value::{Record, Value};

/// Session object generating and persisting record graphs.
pub struct Populator<G: ValueGenerator = StandardValueGenerator> {
	schema: SchemaRegistry,
	generator: G,
	arena: RecordArena,
	accumulator: ValueAccumulator,
	ledger: DeferredValueLedger,
	overrides: HashMap<RefHandle, PropertyOverrides>,
	rng: StdRng,
}

impl Populator<StandardValueGenerator> {
	/// Creates a populator with the default random generator.
	pub fn new(schema: SchemaRegistry) -> Self {
		Self::with_generator(schema, StandardValueGenerator::new())
	}

	/// Creates a fully deterministic populator from a fixed seed.
	pub fn seeded(schema: SchemaRegistry, seed: u64) -> Self {
		let mut populator =
			Self::with_generator(schema, StandardValueGenerator::seeded(seed));
		populator.rng = StdRng::seed_from_u64(seed);
		populator
	}
}

impl<G: ValueGenerator> Populator<G> {
	/// Creates a populator over a custom value-generation boundary.
	pub fn with_generator(schema: SchemaRegistry, generator: G) -> Self {
		Self {
			schema,
			generator,
			arena: RecordArena::new(),
			accumulator: ValueAccumulator::new(),
			ledger: DeferredValueLedger::new(),
			overrides: HashMap::new(),
			rng: StdRng::from_entropy(),
		}
	}

	/// Requests `count` records of a registered type.
	///
	/// Foreign keys are linked to the most recently added reference of
	/// their target type, when one exists; use
	/// [`Populator::add_anchored`] or [`Populator::link`] to wire them
	/// explicitly.
	pub fn add(&mut self, type_name: &str, count: usize) -> PopulateResult<Vec<RefHandle>> {
		self.add_records(type_name, count, &[], None)
	}

	/// Requests `count` records anchored to existing primary references:
	/// each foreign key whose target type matches an anchor links to that
	/// anchor instead of being resolved from the arena.
	pub fn add_anchored(
		&mut self,
		type_name: &str,
		count: usize,
		anchors: &[RefHandle],
	) -> PopulateResult<Vec<RefHandle>> {
		self.add_records(type_name, count, anchors, None)
	}

	/// Requests `count` records with explicit per-path property overrides
	/// applied during graph building.
	pub fn add_with(
		&mut self,
		type_name: &str,
		count: usize,
		overrides: PropertyOverrides,
	) -> PopulateResult<Vec<RefHandle>> {
		self.add_records(type_name, count, &[], Some(overrides))
	}

	fn add_records(
		&mut self,
		type_name: &str,
		count: usize,
		anchors: &[RefHandle],
		overrides: Option<PropertyOverrides>,
	) -> PopulateResult<Vec<RefHandle>> {
		let spec = self
			.schema
			.get(type_name)
			.ok_or_else(|| PopulateError::UnknownType(type_name.to_string()))?;
		let foreign_keys = spec.foreign_keys().to_vec();
		let mut handles = Vec::with_capacity(count);
		for _ in 0..count {
			let mut reference = RecordReference::new(type_name);
			for fk in &foreign_keys {
				let owner = anchors
					.iter()
					.copied()
					.find(|&a| self.arena.get(a).type_name() == fk.target_type)
					.or_else(|| self.arena.latest_of_type(&fk.target_type));
				if let Some(owner) = owner {
					if reference.primary_key_reference().is_none() {
						reference.set_primary_key_reference(owner);
					}
					reference.set_foreign_link(ForeignKeyLink {
						property: fk.property.clone(),
						owner,
						owner_property: fk.target_property.clone(),
					});
				}
			}
			let handle = self.arena.push(reference);
			if let Some(overrides) = &overrides {
				self.overrides.insert(handle, overrides.clone());
			}
			handles.push(handle);
		}
		debug!(type_name, count, "references added");
		Ok(handles)
	}

	/// Wires the foreign key of `record` whose target type matches
	/// `owner`'s type to that owner, replacing any earlier link on the
	/// same property.
	pub fn link(&mut self, record: RefHandle, owner: RefHandle) -> PopulateResult<()> {
		let record_type = self.arena.get(record).type_name().to_string();
		let owner_type = self.arena.get(owner).type_name().to_string();
		let fk = self
			.schema
			.foreign_keys(&record_type)
			.iter()
			.find(|fk| fk.target_type == owner_type)
			.cloned()
			.ok_or_else(|| {
				PopulateError::InvalidState(format!(
					"{record_type} declares no foreign key into {owner_type}"
				))
			})?;
		let reference = self.arena.get_mut(record);
		if reference.primary_key_reference().is_none() {
			reference.set_primary_key_reference(owner);
		}
		reference.set_foreign_link(ForeignKeyLink {
			property: fk.property,
			owner,
			owner_property: fk.target_property,
		});
		Ok(())
	}

	/// Applies guarantee sets to a pool of references. Must run before
	/// [`Populator::persist`] builds those records.
	pub fn guarantee(
		&mut self,
		pool: &[RefHandle],
		sets: &[GuaranteedValues],
	) -> PopulateResult<()> {
		ValueGuaranteePopulator::apply(&mut self.arena, pool, sets, &self.schema, &mut self.rng)
	}

	/// Builds and persists every unpersisted reference in one batch.
	///
	/// Graph building fills each record (pre-bound factories win over
	/// generation), the deferred ledger assigns client-side unique keys,
	/// the operation graph emits dependency-ordered inserts, the boundary
	/// executes once, and the returned identities are bound back onto the
	/// owning records and their dependents. An empty batch is a no-op and
	/// never calls execute.
	pub fn persist(&mut self, writer: &mut dyn WritePrimitives) -> PopulateResult<()> {
		let pending: Vec<RefHandle> = self
			.arena
			.handles()
			.filter(|&h| !self.arena.get(h).is_persisted())
			.collect();
		if pending.is_empty() {
			return Ok(());
		}

		for &handle in &pending {
			self.build_reference(handle)?;
		}
		self.ledger.execute(&mut self.arena, &mut self.accumulator)?;

		let mut graph = OperationGraph::new(&self.schema, &pending);
		graph.write_all(&mut self.arena, writer)?;
		if graph.statements_written() > 0 {
			let results = writer.execute()?;
			graph.bind_results(&mut self.arena, results)?;
		}

		for &handle in &pending {
			self.arena.get_mut(handle).mark_persisted();
		}
		debug!(batch = pending.len(), "batch persisted");
		Ok(())
	}

	/// Constructs one reference's record and registers its deferred
	/// unique values.
	fn build_reference(&mut self, handle: RefHandle) -> PopulateResult<()> {
		if self.arena.get(handle).is_built() {
			return Ok(());
		}
		let type_name = self.arena.get(handle).type_name().to_string();
		let forced = self.arena.get(handle).pre_bound().is_some();
		let record = if let Some(factory) = self.arena.get(handle).pre_bound() {
			match factory() {
				Value::Record(record) => record,
				other => {
					warn!(
						%type_name,
						kind = other.kind_name(),
						"pre-bound factory produced a non-record; using an empty row"
					);
					Record::new()
				}
			}
		} else {
			let overrides = self
				.overrides
				.get(&handle)
				.cloned()
				.unwrap_or_default();
			let mut builder = TypeGenerator::new(&self.schema, &mut self.generator);
			builder.build(&type_name, &overrides)?
		};
		self.arena.get_mut(handle).set_record(record);
		self.register_deferred(handle, &type_name, forced);
		Ok(())
	}

	/// Queues deferred unique values: the manual primary key, plus every
	/// property flagged unique. Linked foreign-key properties, explicitly
	/// overridden properties, and properties a forced row already supplies
	/// are left alone.
	fn register_deferred(&mut self, handle: RefHandle, type_name: &str, forced: bool) {
		let Some(spec) = self.schema.get(type_name) else {
			return;
		};
		let manual_key = match spec.primary_key() {
			PrimaryKey::Manual(name) => Some(name.clone()),
			_ => None,
		};
		let linked: Vec<String> = self
			.arena
			.get(handle)
			.foreign_links()
			.iter()
			.map(|l| l.property.clone())
			.collect();
		for property in spec.properties() {
			let wanted = property.unique() || manual_key.as_deref() == Some(property.name());
			if !wanted || linked.iter().any(|p| p == property.name()) {
				continue;
			}
			// a forced value always wins for the record it was bound to
			if forced && self.arena.get(handle).record().contains(property.name()) {
				continue;
			}
			if let Some(overrides) = self.overrides.get(&handle) {
				if overrides.contains(&property.name().into()) {
					continue;
				}
			}
			let key = PropertyKey::new(type_name, property.name());
			let kind = property.kind().clone();
			let constraints = property.constraints().clone();
			self.ledger.register(
				DeferredTarget {
					record: handle,
					property: property.name().to_string(),
				},
				Box::new(move |accumulator| {
					accumulator.next_value(&key, &kind, &constraints, 0)
				}),
			);
		}
	}

	/// The built (and, after persist, bound) record behind a handle.
	pub fn record(&self, handle: RefHandle) -> &Record {
		self.arena.get(handle).record()
	}

	/// Convenience lookup of one property value.
	pub fn value(&self, handle: RefHandle, property: &str) -> Option<&Value> {
		self.arena.get(handle).record().get(property)
	}

	/// Read access to the reference arena.
	pub fn arena(&self) -> &RecordArena {
		&self.arena
	}

	/// Read access to the schema registry this session was built with.
	pub fn schema(&self) -> &SchemaRegistry {
		&self.schema
	}
}

impl<G: ValueGenerator> std::fmt::Debug for Populator<G> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Populator")
			.field("types", &self.schema.len())
			.field("references", &self.arena.len())
			.field("pending_deferred", &self.ledger.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::persist::MemoryWriter;
	use crate::schema::{Constraints, RecordSchema};
	use crate::value::ValueKind;
	use rstest::rstest;

	fn schema() -> SchemaRegistry {
		SchemaRegistry::new()
			.register(
				RecordSchema::new("app.Tenant")
					.auto_key("id")
					.constrained_property("name", ValueKind::Text, Constraints::max_length(12)),
			)
			.register(
				RecordSchema::new("app.Project")
					.manual_key("code", ValueKind::Text, Constraints::max_length(4))
					.foreign_key("tenant_id", "app.Tenant", "id"),
			)
	}

	#[rstest]
	fn unknown_type_is_rejected_up_front() {
		let mut populator = Populator::seeded(schema(), 1);
		assert!(matches!(
			populator.add("app.Missing", 1).unwrap_err(),
			PopulateError::UnknownType(_)
		));
	}

	#[rstest]
	fn adding_links_to_the_latest_owner_of_the_target_type() {
		let mut populator = Populator::seeded(schema(), 1);
		let tenants = populator.add("app.Tenant", 2).unwrap();
		let projects = populator.add("app.Project", 1).unwrap();
		let links = populator.arena().get(projects[0]).foreign_links();
		assert_eq!(links.len(), 1);
		assert_eq!(links[0].owner, tenants[1]);
	}

	#[rstest]
	fn anchoring_overrides_latest_of_type() {
		let mut populator = Populator::seeded(schema(), 1);
		let tenants = populator.add("app.Tenant", 2).unwrap();
		let projects = populator
			.add_anchored("app.Project", 1, &[tenants[0]])
			.unwrap();
		let links = populator.arena().get(projects[0]).foreign_links();
		assert_eq!(links[0].owner, tenants[0]);
	}

	#[rstest]
	fn manual_keys_are_assigned_uniquely_from_the_ledger() {
		let mut populator = Populator::seeded(schema(), 1);
		populator.add("app.Tenant", 1).unwrap();
		let projects = populator.add("app.Project", 3).unwrap();
		let mut writer = MemoryWriter::new();
		populator.persist(&mut writer).unwrap();
		let codes: Vec<&str> = projects
			.iter()
			.map(|&p| populator.value(p, "code").unwrap().as_text().unwrap())
			.collect();
		assert_eq!(codes, ["AAAA", "AAAB", "AAAC"]);
	}

	#[rstest]
	fn empty_batch_never_touches_the_writer() {
		let mut populator = Populator::seeded(schema(), 1);
		let mut writer = MemoryWriter::new();
		populator.persist(&mut writer).unwrap();
		assert!(!writer.executed());
		assert!(writer.statements().is_empty());
	}

	#[rstest]
	fn persist_is_idempotent_per_reference() {
		let mut populator = Populator::seeded(schema(), 1);
		populator.add("app.Tenant", 1).unwrap();
		let mut writer = MemoryWriter::new();
		populator.persist(&mut writer).unwrap();
		let written = writer.statements().len();
		// a second persist has nothing pending
		let mut second = MemoryWriter::new();
		populator.persist(&mut second).unwrap();
		assert_eq!(written, 1);
		assert!(!second.executed());
	}

	#[rstest]
	fn overrides_flow_into_generation() {
		let mut populator = Populator::seeded(schema(), 1);
		let overrides = PropertyOverrides::new().set_value("name", "fixed");
		let tenants = populator.add_with("app.Tenant", 2, overrides).unwrap();
		let mut writer = MemoryWriter::new();
		populator.persist(&mut writer).unwrap();
		for &tenant in &tenants {
			assert_eq!(
				populator.value(tenant, "name"),
				Some(&Value::Text("fixed".into()))
			);
		}
	}

	#[rstest]
	fn linking_without_a_matching_foreign_key_is_invalid() {
		let mut populator = Populator::seeded(schema(), 1);
		let tenants = populator.add("app.Tenant", 2).unwrap();
		assert!(matches!(
			populator.link(tenants[0], tenants[1]).unwrap_err(),
			PopulateError::InvalidState(_)
		));
	}
}
