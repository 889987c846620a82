//! Value guarantees: forcing specific values into a generated collection.
//!
//! A guarantee set names candidate rows (or factories producing rows) and
//! how many of a generated pool must carry them, as a fixed count or as a
//! percentage of the pool. Injection runs strictly before graph building,
//! binding each forced row as its reference's pre-bound factory so it
//! always wins over generated values.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::Rng;
use tracing::warn;

use crate::error::{PopulateError, PopulateResult};
use crate::reference::{RecordArena, RefHandle, ValueFactory};
use crate::schema::SchemaRegistry;
use crate::value::{Record, Value};

/// What to do when the pool is smaller than the requested quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountRequestPolicy {
	/// Raise [`PopulateError::TooFewReferencesForValueGuarantee`].
	#[default]
	ThrowIfTooSmall,
	/// Force as many records as the pool allows and stop.
	DoNotThrow,
}

/// A candidate row: a plain value or a zero-argument factory.
#[derive(Clone)]
enum Candidate {
	Value(Value),
	Factory(ValueFactory),
}

impl Candidate {
	fn produce(&self) -> Value {
		match self {
			Candidate::Value(value) => value.clone(),
			Candidate::Factory(factory) => factory(),
		}
	}

	fn as_factory(&self) -> ValueFactory {
		match self {
			Candidate::Value(value) => {
				let value = value.clone();
				Arc::new(move || value.clone())
			}
			Candidate::Factory(factory) => factory.clone(),
		}
	}
}

/// One guarantee set: candidates plus an exclusive quantity.
///
/// `total` and `percentage` are mutually exclusive; setting one clears the
/// other, and applying a set with neither is a configuration error.
#[derive(Clone)]
pub struct GuaranteedValues {
	candidates: Vec<Candidate>,
	total: Option<usize>,
	percentage: Option<u8>,
	policy: CountRequestPolicy,
}

impl GuaranteedValues {
	/// Creates a set with no candidates and no quantity.
	pub fn new() -> Self {
		Self {
			candidates: Vec::new(),
			total: None,
			percentage: None,
			policy: CountRequestPolicy::default(),
		}
	}

	/// Adds a candidate record value.
	pub fn value(mut self, record: Record) -> Self {
		self.candidates.push(Candidate::Value(Value::Record(record)));
		self
	}

	/// Adds a raw candidate value. Non-record values fail the type check
	/// at apply time; this exists so misconfigurations surface with a
	/// descriptive error instead of being unrepresentable silently.
	pub fn raw_value(mut self, value: Value) -> Self {
		self.candidates.push(Candidate::Value(value));
		self
	}

	/// Adds a candidate factory.
	pub fn factory(mut self, factory: ValueFactory) -> Self {
		self.candidates.push(Candidate::Factory(factory));
		self
	}

	/// Requests a fixed number of forced records, clearing any percentage.
	pub fn total(mut self, count: usize) -> Self {
		self.total = Some(count);
		self.percentage = None;
		self
	}

	/// Requests a percentage of the pool, clearing any fixed total.
	/// Resolves to `floor(pool * percentage / 100)`, minimum 1.
	pub fn percentage(mut self, percentage: u8) -> Self {
		self.percentage = Some(percentage);
		self.total = None;
		self
	}

	/// Sets the too-small-pool policy.
	pub fn policy(mut self, policy: CountRequestPolicy) -> Self {
		self.policy = policy;
		self
	}

	fn resolved_quantity(&self, pool_size: usize) -> PopulateResult<usize> {
		match (self.total, self.percentage) {
			(Some(total), None) => Ok(total),
			(None, Some(percentage)) => {
				Ok((pool_size * percentage as usize / 100).max(1))
			}
			_ => Err(PopulateError::NeitherPercentageNorTotalGiven),
		}
	}
}

impl Default for GuaranteedValues {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for GuaranteedValues {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("GuaranteedValues")
			.field("candidates", &self.candidates.len())
			.field("total", &self.total)
			.field("percentage", &self.percentage)
			.field("policy", &self.policy)
			.finish()
	}
}

/// Applies guarantee sets to a pool of record references.
pub struct ValueGuaranteePopulator;

impl ValueGuaranteePopulator {
	/// Forces each set's candidates onto randomly chosen pool members.
	///
	/// Quantities resolve against the original pool size, independently
	/// per set. Each chosen record leaves the working pool, so no record
	/// receives two forced values in one application pass. Candidates
	/// cycle round-robin within their set; every produced value is
	/// type-checked against the pool record's schema before binding.
	pub fn apply(
		arena: &mut RecordArena,
		pool: &[RefHandle],
		sets: &[GuaranteedValues],
		schema: &SchemaRegistry,
		rng: &mut StdRng,
	) -> PopulateResult<()> {
		let quantities: Vec<usize> = sets
			.iter()
			.map(|set| set.resolved_quantity(pool.len()))
			.collect::<PopulateResult<_>>()?;
		let requested: usize = quantities.iter().sum();
		let strict = sets
			.iter()
			.any(|set| set.policy == CountRequestPolicy::ThrowIfTooSmall);
		if requested > pool.len() && strict {
			return Err(PopulateError::TooFewReferencesForValueGuarantee {
				requested,
				available: pool.len(),
			});
		}

		let mut working: Vec<usize> = (0..pool.len()).collect();
		for (set, quantity) in sets.iter().zip(quantities) {
			if set.candidates.is_empty() {
				warn!(quantity, "guarantee set has no candidates; skipping");
				continue;
			}
			for turn in 0..quantity {
				if working.is_empty() {
					// only reachable with DoNotThrow sets; strict sets
					// were rejected up front
					break;
				}
				let chosen = working.swap_remove(rng.gen_range(0..working.len()));
				let handle = pool[chosen];
				let candidate = &set.candidates[turn % set.candidates.len()];
				Self::check_candidate(arena, schema, handle, candidate)?;
				arena.get_mut(handle).set_pre_bound(candidate.as_factory());
			}
		}
		Ok(())
	}

	/// Validates that a candidate's produced value fits the record type of
	/// the pool member it is about to be bound to.
	fn check_candidate(
		arena: &RecordArena,
		schema: &SchemaRegistry,
		handle: RefHandle,
		candidate: &Candidate,
	) -> PopulateResult<()> {
		let expected = arena.get(handle).type_name().to_string();
		let probe = candidate.produce();
		let Value::Record(record) = &probe else {
			return Err(PopulateError::ValueGuarantee {
				expected,
				actual: probe.kind_name().to_string(),
				value: format!("{probe:?}"),
			});
		};
		let Some(spec) = schema.get(&expected) else {
			return Err(PopulateError::UnknownType(expected));
		};
		for (name, value) in record.iter() {
			let Some(property) = spec.find_property(name) else {
				return Err(PopulateError::ValueGuarantee {
					expected,
					actual: format!("record with unknown property `{name}`"),
					value: format!("{probe:?}"),
				});
			};
			if !value.matches_kind(property.kind()) {
				return Err(PopulateError::ValueGuarantee {
					expected,
					actual: format!("{} for property `{name}`", value.kind_name()),
					value: format!("{value:?}"),
				});
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::reference::RecordReference;
	use crate::schema::RecordSchema;
	use crate::value::ValueKind;
	use rand::SeedableRng;
	use rstest::rstest;

	fn schema() -> SchemaRegistry {
		SchemaRegistry::new().register(
			RecordSchema::new("shop.Order")
				.auto_key("id")
				.property("status", ValueKind::Text)
				.property("amount", ValueKind::Int),
		)
	}

	fn pool(arena: &mut RecordArena, size: usize) -> Vec<RefHandle> {
		(0..size)
			.map(|_| arena.push(RecordReference::new("shop.Order")))
			.collect()
	}

	fn status(text: &str) -> Record {
		[("status", Value::from(text))].into_iter().collect()
	}

	#[rstest]
	fn fixed_quantity_forces_exactly_that_many() {
		let registry = schema();
		let mut arena = RecordArena::new();
		let handles = pool(&mut arena, 10);
		let mut rng = StdRng::seed_from_u64(5);
		let sets = [GuaranteedValues::new().value(status("VIP")).total(4)];
		ValueGuaranteePopulator::apply(&mut arena, &handles, &sets, &registry, &mut rng)
			.unwrap();
		let forced = handles
			.iter()
			.filter(|&&h| arena.get(h).pre_bound().is_some())
			.count();
		assert_eq!(forced, 4);
	}

	#[rstest]
	#[case(15, 60, 9)]
	#[case(1, 60, 1)] // floor would be 0; minimum is 1
	#[case(50, 10, 5)]
	fn percentage_resolves_against_the_original_pool(
		#[case] percentage: u8,
		#[case] size: usize,
		#[case] expected: usize,
	) {
		let set = GuaranteedValues::new().percentage(percentage);
		assert_eq!(set.resolved_quantity(size).unwrap(), expected);
	}

	#[rstest]
	fn candidates_cycle_round_robin() {
		let registry = schema();
		let mut arena = RecordArena::new();
		let handles = pool(&mut arena, 9);
		let mut rng = StdRng::seed_from_u64(5);
		let sets = [GuaranteedValues::new()
			.value(status("VIP"))
			.value(status("STAFF"))
			.total(9)];
		ValueGuaranteePopulator::apply(&mut arena, &handles, &sets, &registry, &mut rng)
			.unwrap();
		let mut vip = 0;
		let mut staff = 0;
		for &handle in &handles {
			let factory = arena.get(handle).pre_bound().expect("all 9 forced");
			match factory() {
				Value::Record(r) if r.get("status") == Some(&Value::Text("VIP".into())) => {
					vip += 1;
				}
				_ => staff += 1,
			}
		}
		assert_eq!((vip, staff), (5, 4));
	}

	#[rstest]
	fn over_quota_with_strict_policy_is_rejected() {
		let registry = schema();
		let mut arena = RecordArena::new();
		let handles = pool(&mut arena, 5);
		let mut rng = StdRng::seed_from_u64(5);
		let sets = [GuaranteedValues::new().value(status("VIP")).total(6)];
		let error =
			ValueGuaranteePopulator::apply(&mut arena, &handles, &sets, &registry, &mut rng)
				.unwrap_err();
		assert!(matches!(
			error,
			PopulateError::TooFewReferencesForValueGuarantee {
				requested: 6,
				available: 5,
			}
		));
	}

	#[rstest]
	fn over_quota_with_do_not_throw_clamps_to_the_pool() {
		let registry = schema();
		let mut arena = RecordArena::new();
		let handles = pool(&mut arena, 3);
		let mut rng = StdRng::seed_from_u64(5);
		let sets = [GuaranteedValues::new()
			.value(status("VIP"))
			.total(6)
			.policy(CountRequestPolicy::DoNotThrow)];
		ValueGuaranteePopulator::apply(&mut arena, &handles, &sets, &registry, &mut rng)
			.unwrap();
		let forced = handles
			.iter()
			.filter(|&&h| arena.get(h).pre_bound().is_some())
			.count();
		assert_eq!(forced, 3);
	}

	#[rstest]
	fn neither_total_nor_percentage_is_a_configuration_error() {
		let registry = schema();
		let mut arena = RecordArena::new();
		let handles = pool(&mut arena, 3);
		let mut rng = StdRng::seed_from_u64(5);
		let sets = [GuaranteedValues::new().value(status("VIP"))];
		let error =
			ValueGuaranteePopulator::apply(&mut arena, &handles, &sets, &registry, &mut rng)
				.unwrap_err();
		assert!(matches!(error, PopulateError::NeitherPercentageNorTotalGiven));
	}

	#[rstest]
	fn setting_total_clears_percentage_and_back() {
		let set = GuaranteedValues::new().percentage(20).total(3);
		assert_eq!(set.resolved_quantity(100).unwrap(), 3);
		let set = GuaranteedValues::new().total(3).percentage(20);
		assert_eq!(set.resolved_quantity(100).unwrap(), 20);
	}

	#[rstest]
	fn non_record_candidates_fail_the_type_check() {
		let registry = schema();
		let mut arena = RecordArena::new();
		let handles = pool(&mut arena, 3);
		let mut rng = StdRng::seed_from_u64(5);
		let sets = [GuaranteedValues::new().raw_value(Value::Int(3)).total(1)];
		let error =
			ValueGuaranteePopulator::apply(&mut arena, &handles, &sets, &registry, &mut rng)
				.unwrap_err();
		let PopulateError::ValueGuarantee { expected, actual, .. } = error else {
			panic!("expected a guarantee type error");
		};
		assert_eq!(expected, "shop.Order");
		assert_eq!(actual, "int");
	}

	#[rstest]
	fn mistyped_property_fails_the_type_check() {
		let registry = schema();
		let mut arena = RecordArena::new();
		let handles = pool(&mut arena, 3);
		let mut rng = StdRng::seed_from_u64(5);
		let bad: Record = [("amount", Value::from("not a number"))].into_iter().collect();
		let sets = [GuaranteedValues::new().value(bad).total(1)];
		let error =
			ValueGuaranteePopulator::apply(&mut arena, &handles, &sets, &registry, &mut rng)
				.unwrap_err();
		assert!(matches!(error, PopulateError::ValueGuarantee { .. }));
	}
}
