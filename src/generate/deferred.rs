//! Deferred unique-value ledger: two-phase value assignment.
//!
//! During graph construction the populator only knows *that* a property
//! needs a unique value and under which constraints; the actual value must
//! be assigned once per unique-value scope, after every candidate in the
//! batch is known. Registration stores `(target, resolver)` pairs; the
//! drain runs every resolver against the shared accumulator in
//! registration order, immediately before write statements are built.

use std::fmt;

use crate::error::PopulateResult;
use crate::generate::unique::ValueAccumulator;
use crate::reference::{RecordArena, RefHandle};
use crate::value::Value;

/// One-shot resolver computing the final value from the shared counters.
pub type DeferredResolver = Box<dyn FnOnce(&mut ValueAccumulator) -> PopulateResult<Value>>;

/// Property slot a deferred value will be assigned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredTarget {
	/// Reference owning the property.
	pub record: RefHandle,
	/// Property the resolved value lands on.
	pub property: String,
}

/// Write-once-then-drain collection of deferred value assignments for one
/// batch.
#[derive(Default)]
pub struct DeferredValueLedger {
	entries: Vec<(DeferredTarget, DeferredResolver)>,
}

impl DeferredValueLedger {
	/// Creates an empty ledger.
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores a resolver for later execution; nothing is computed yet.
	pub fn register(&mut self, target: DeferredTarget, resolver: DeferredResolver) {
		self.entries.push((target, resolver));
	}

	/// Runs every registered resolver in registration order, assigning the
	/// produced values onto their target records, and leaves the ledger
	/// empty.
	pub fn execute(
		&mut self,
		arena: &mut RecordArena,
		accumulator: &mut ValueAccumulator,
	) -> PopulateResult<()> {
		for (target, resolver) in self.entries.drain(..) {
			let value = resolver(accumulator)?;
			arena
				.get_mut(target.record)
				.record_mut()
				.set(&target.property, value);
		}
		Ok(())
	}

	/// Number of pending assignments.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// True when nothing is registered.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl fmt::Debug for DeferredValueLedger {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DeferredValueLedger")
			.field("pending", &self.entries.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::generate::unique::PropertyKey;
	use crate::reference::RecordReference;
	use crate::schema::Constraints;
	use crate::value::ValueKind;
	use rstest::rstest;

	#[rstest]
	fn resolvers_run_in_registration_order_against_shared_counters() {
		let mut arena = RecordArena::new();
		let first = arena.push(RecordReference::new("t.Thing"));
		let second = arena.push(RecordReference::new("t.Thing"));

		let mut ledger = DeferredValueLedger::new();
		for handle in [first, second] {
			let key = PropertyKey::new("t.Thing", "code");
			ledger.register(
				DeferredTarget {
					record: handle,
					property: "code".into(),
				},
				Box::new(move |accumulator| {
					accumulator.next_value(&key, &ValueKind::Int, &Constraints::none(), 0)
				}),
			);
		}
		assert_eq!(ledger.len(), 2);

		let mut accumulator = ValueAccumulator::new();
		ledger.execute(&mut arena, &mut accumulator).unwrap();

		assert!(ledger.is_empty());
		assert_eq!(arena.get(first).record().get("code"), Some(&Value::Int(0)));
		assert_eq!(arena.get(second).record().get("code"), Some(&Value::Int(1)));
	}

	#[rstest]
	fn failing_resolver_aborts_the_drain() {
		let mut arena = RecordArena::new();
		let handle = arena.push(RecordReference::new("t.Thing"));
		let mut ledger = DeferredValueLedger::new();
		let key = PropertyKey::new("t.Thing", "flag");
		ledger.register(
			DeferredTarget {
				record: handle,
				property: "flag".into(),
			},
			// booleans have no unique encoding, so this resolver fails
			Box::new(move |accumulator| {
				accumulator.next_value(&key, &ValueKind::Bool, &Constraints::none(), 0)
			}),
		);
		let mut accumulator = ValueAccumulator::new();
		assert!(ledger.execute(&mut arena, &mut accumulator).is_err());
		assert!(arena.get(handle).record().get("flag").is_none());
	}
}
