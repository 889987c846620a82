//! Dependency-ordered write pipeline: operation graph, cycle breaker, and
//! the execute-then-bind protocol.
//!
//! Ordering is depth-first dependency resolution rather than a global
//! topological sort: the caller's composition of references may contain
//! cycles, and those must surface as a diagnosable configuration error,
//! not as a hang or a silently dropped edge.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{PopulateError, PopulateResult};
use crate::persist::{ColumnValue, Placeholder, WritePrimitives};
use crate::reference::{ForeignKeyLink, RecordArena, RefHandle};
use crate::schema::{PrimaryKey, SchemaRegistry};
use crate::value::Value;

/// Lifecycle of one write/read unit. Terminal state is `Read`; operations
/// are never reused across batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
	/// Created, not yet visited.
	Unwritten,
	/// On the current depth-first descent.
	Writing,
	/// Insert statement emitted.
	Written,
	/// Deferred results consumed (or no results were pending).
	Read,
}

/// Per-record write operation node.
#[derive(Debug)]
pub struct InsertOperation {
	reference: RefHandle,
	state: OperationState,
	order: Option<usize>,
	identity: Option<Placeholder>,
}

impl InsertOperation {
	fn new(reference: RefHandle) -> Self {
		Self {
			reference,
			state: OperationState::Unwritten,
			order: None,
			identity: None,
		}
	}

	/// Reference this operation writes.
	pub fn reference(&self) -> RefHandle {
		self.reference
	}

	/// Current lifecycle state.
	pub fn state(&self) -> OperationState {
		self.state
	}

	/// Assigned execution order index, once written.
	pub fn order(&self) -> Option<usize> {
		self.order
	}

	/// Placeholder for this operation's pending identity, if its primary
	/// key is store-assigned.
	pub fn identity(&self) -> Option<Placeholder> {
		self.identity
	}
}

/// Cycle-detecting call stack scoped to one top-level write invocation.
#[derive(Debug, Default)]
pub struct CircularReferenceBreaker {
	stack: Vec<usize>,
}

impl CircularReferenceBreaker {
	/// Creates a breaker with an empty stack.
	pub fn new() -> Self {
		Self::default()
	}

	/// Records entry into an operation. Returns false when the operation
	/// is already on the stack — the dependency chain has come back around.
	pub fn push(&mut self, operation: usize) -> bool {
		if self.stack.contains(&operation) {
			return false;
		}
		self.stack.push(operation);
		true
	}

	/// Leaves the most recently entered operation.
	pub fn pop(&mut self) -> PopulateResult<()> {
		self.stack.pop().map(|_| ()).ok_or_else(|| {
			PopulateError::InvalidState(
				"circular-reference breaker popped with an empty stack".into(),
			)
		})
	}

	/// Operations on the current descent, oldest first.
	pub fn stack(&self) -> &[usize] {
		&self.stack
	}

	/// Renders the chain from the first occurrence of `repeated` to the
	/// top of the stack, closing with `repeated` again.
	fn describe_cycle(
		&self,
		repeated: usize,
		type_of: impl Fn(usize) -> String,
	) -> PopulateResult<String> {
		let Some(head) = self.stack.iter().position(|&op| op == repeated) else {
			return Err(PopulateError::InvalidState(
				"cycle reported for an operation that is not on the stack".into(),
			));
		};
		if self.stack[head + 1..].contains(&repeated) {
			return Err(PopulateError::InvalidState(
				"cycle head encountered twice while describing the cycle".into(),
			));
		}
		let mut chain: Vec<String> = self.stack[head..].iter().map(|&op| type_of(op)).collect();
		chain.push(type_of(repeated));
		Ok(chain.join(" -> "))
	}
}

/// Operation graph for one persist batch.
///
/// Wraps every reference of the batch in an [`InsertOperation`], writes
/// them depth-first honoring foreign-key dependencies, and binds the
/// deferred results of the single execute round trip back onto the
/// records.
pub struct OperationGraph<'a> {
	schema: &'a SchemaRegistry,
	operations: Vec<InsertOperation>,
	by_reference: HashMap<RefHandle, usize>,
	order_counter: usize,
	read_order: Vec<usize>,
}

impl<'a> OperationGraph<'a> {
	/// Creates one operation per reference in the batch.
	pub fn new(schema: &'a SchemaRegistry, batch: &[RefHandle]) -> Self {
		let operations: Vec<InsertOperation> =
			batch.iter().map(|&handle| InsertOperation::new(handle)).collect();
		let by_reference = operations
			.iter()
			.enumerate()
			.map(|(index, op)| (op.reference(), index))
			.collect();
		Self {
			schema,
			operations,
			by_reference,
			order_counter: 0,
			read_order: Vec::new(),
		}
	}

	/// Writes every operation, each top-level invocation with a fresh
	/// breaker.
	pub fn write_all(
		&mut self,
		arena: &mut RecordArena,
		writer: &mut dyn WritePrimitives,
	) -> PopulateResult<()> {
		for index in 0..self.operations.len() {
			let mut breaker = CircularReferenceBreaker::new();
			self.write(index, arena, writer, &mut breaker)?;
		}
		Ok(())
	}

	fn write(
		&mut self,
		index: usize,
		arena: &mut RecordArena,
		writer: &mut dyn WritePrimitives,
		breaker: &mut CircularReferenceBreaker,
	) -> PopulateResult<()> {
		// already written on an earlier descent: checked, not reasserted
		if matches!(
			self.operations[index].state,
			OperationState::Written | OperationState::Read
		) {
			return Ok(());
		}
		if !breaker.push(index) {
			return Err(self.cycle_error(breaker, index, arena));
		}
		self.operations[index].state = OperationState::Writing;
		let handle = self.operations[index].reference;
		let links: Vec<ForeignKeyLink> = arena.get(handle).foreign_links().to_vec();

		// depth-first: every dependency inside the batch writes first
		for link in &links {
			if let Some(&dependency) = self.by_reference.get(&link.owner) {
				self.write(dependency, arena, writer, breaker)?;
			}
		}

		let registry = self.schema;
		let type_name = arena.get(handle).type_name().to_string();
		let spec = registry
			.get(&type_name)
			.ok_or_else(|| PopulateError::UnknownType(type_name.clone()))?;

		let mut columns = Vec::with_capacity(spec.properties().len());
		for property in spec.properties() {
			if spec.primary_key().is_auto_property(property.name()) {
				continue;
			}
			let column = if let Some(link) = links.iter().find(|l| l.property == property.name()) {
				match self.pending_identity(arena, link) {
					Some(placeholder) => ColumnValue::Deferred(placeholder),
					None => {
						let value = arena
							.get(link.owner)
							.record()
							.get(&link.owner_property)
							.cloned()
							.unwrap_or(Value::Null);
						// known key values bind onto the dependent now;
						// pending ones bind after execute
						arena
							.get_mut(handle)
							.record_mut()
							.set(property.name(), value.clone());
						ColumnValue::Literal(value)
					}
				}
			} else {
				ColumnValue::Literal(
					arena
						.get(handle)
						.record()
						.get(property.name())
						.cloned()
						.unwrap_or(Value::Null),
				)
			};
			columns.push((property.name().to_string(), column));
		}

		writer.insert(spec.table_name(), columns);
		if let PrimaryKey::Auto(key_column) = spec.primary_key() {
			let placeholder = writer.request_deferred_identity(key_column);
			self.operations[index].identity = Some(placeholder);
			self.read_order.push(index);
		}
		self.operations[index].order = Some(self.order_counter);
		self.order_counter += 1;
		self.operations[index].state = OperationState::Written;
		debug!(%type_name, order = self.order_counter - 1, "insert accumulated");
		breaker.pop()?;
		Ok(())
	}

	/// Placeholder of the owner's pending identity, when the link targets
	/// the owner's store-assigned key and that key has not been read back
	/// yet. Links into any other owner property always copy the literal
	/// already on the owner's record.
	fn pending_identity(&self, arena: &RecordArena, link: &ForeignKeyLink) -> Option<Placeholder> {
		let owner_type = arena.get(link.owner).type_name();
		let spec = self.schema.get(owner_type)?;
		if !spec.primary_key().is_auto_property(&link.owner_property) {
			return None;
		}
		self.by_reference
			.get(&link.owner)
			.and_then(|&index| self.operations[index].identity)
	}

	fn cycle_error(
		&self,
		breaker: &CircularReferenceBreaker,
		repeated: usize,
		arena: &RecordArena,
	) -> PopulateError {
		let type_of =
			|op: usize| arena.get(self.operations[op].reference).type_name().to_string();
		match breaker.describe_cycle(repeated, type_of) {
			Ok(chain) => PopulateError::CircularForeignKeyReference { chain },
			Err(invariant) => invariant,
		}
	}

	/// Number of insert statements accumulated so far.
	pub fn statements_written(&self) -> usize {
		self.order_counter
	}

	/// References in assigned execution order.
	pub fn execution_order(&self) -> Vec<RefHandle> {
		let mut ordered: Vec<&InsertOperation> =
			self.operations.iter().filter(|op| op.order.is_some()).collect();
		ordered.sort_by_key(|op| op.order);
		ordered.iter().map(|op| op.reference).collect()
	}

	/// Operation nodes, in batch order.
	pub fn operations(&self) -> &[InsertOperation] {
		&self.operations
	}

	/// Consumes the flat execute results positionally: each value lands on
	/// the owning record's key property and on every dependent whose
	/// foreign key was linked to that owner.
	pub fn bind_results(
		&mut self,
		arena: &mut RecordArena,
		results: Vec<Value>,
	) -> PopulateResult<()> {
		if results.len() != self.read_order.len() {
			return Err(PopulateError::InvalidState(format!(
				"execute returned {} values for {} deferred reads",
				results.len(),
				self.read_order.len()
			)));
		}
		let registry = self.schema;
		for (value, &index) in results.into_iter().zip(&self.read_order) {
			let owner = self.operations[index].reference;
			let type_name = arena.get(owner).type_name().to_string();
			let Some(PrimaryKey::Auto(key_column)) =
				registry.get(&type_name).map(|s| s.primary_key().clone())
			else {
				return Err(PopulateError::InvalidState(format!(
					"deferred read recorded for {type_name}, which has no auto key"
				)));
			};
			arena.get_mut(owner).record_mut().set(&key_column, value.clone());
			let dependents: Vec<RefHandle> =
				self.operations.iter().map(|op| op.reference).collect();
			for dependent in dependents {
				let properties: Vec<String> = arena
					.get(dependent)
					.foreign_links()
					.iter()
					.filter(|link| link.owner == owner && link.owner_property == key_column)
					.map(|link| link.property.clone())
					.collect();
				for property in properties {
					arena
						.get_mut(dependent)
						.record_mut()
						.set(&property, value.clone());
				}
			}
		}
		for operation in &mut self.operations {
			operation.state = OperationState::Read;
		}
		Ok(())
	}
}
