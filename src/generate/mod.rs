//! Graph construction: the recursive type generator, its recursion guard,
//! unique-value counters, and the deferred-value ledger.

pub mod builder;
pub mod deferred;
pub mod guard;
pub mod unique;

pub use builder::TypeGenerator;
pub use deferred::{DeferredResolver, DeferredTarget, DeferredValueLedger};
pub use guard::RecursionGuard;
pub use unique::{PropertyKey, ValueAccumulator, DEFAULT_STRING_WIDTH};

use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use crate::schema::PropertySpec;
use crate::value::{Value, ValueKind};

/// Value-generation boundary: produces primitive values and recognized
/// container shapes. The graph builder consults it for every leaf property
/// and for every collection-shaped property before falling back to
/// composite recursion.
pub trait ValueGenerator {
	/// Generates a value for a leaf property, honoring its constraints.
	fn generate(&mut self, property: &PropertySpec) -> Value;

	/// Produces a value for a recognized container shape, or `None` when
	/// the shape is not handled (the builder then substitutes an empty
	/// collection).
	fn collection(&mut self, kind: &ValueKind) -> Option<Value>;
}

/// Default random generator backed by a seedable RNG.
///
/// Leaf lists of up to three elements are handled; lists of records are
/// left to the builder.
#[derive(Debug)]
pub struct StandardValueGenerator {
	rng: StdRng,
}

impl StandardValueGenerator {
	/// Creates a generator seeded from OS entropy.
	pub fn new() -> Self {
		Self {
			rng: StdRng::from_entropy(),
		}
	}

	/// Creates a deterministic generator from a fixed seed.
	pub fn seeded(seed: u64) -> Self {
		Self {
			rng: StdRng::seed_from_u64(seed),
		}
	}

	fn leaf(&mut self, kind: &ValueKind, property: &PropertySpec) -> Value {
		let constraints = property.constraints();
		match kind {
			ValueKind::Bool => Value::Bool(self.rng.gen_bool(0.5)),
			ValueKind::Int => {
				let bound = constraints.max_value.unwrap_or(i32::MAX as i64).max(0);
				Value::Int(self.rng.gen_range(0..=bound))
			}
			ValueKind::Float => {
				let bound = constraints.max_value.unwrap_or(1_000_000) as f64;
				let raw = self.rng.gen_range(0.0..bound.max(f64::MIN_POSITIVE));
				match constraints.precision {
					Some(places) => {
						let scale = 10f64.powi(i32::from(places));
						Value::Float((raw * scale).round() / scale)
					}
					None => Value::Float(raw),
				}
			}
			ValueKind::Text => {
				let length = constraints.max_length.unwrap_or(10);
				let text: String = (&mut self.rng)
					.sample_iter(Alphanumeric)
					.take(length)
					.map(char::from)
					.collect();
				Value::Text(text)
			}
			ValueKind::DateTime => {
				// Up to a year in the past, second granularity.
				let offset = self.rng.gen_range(0..=365 * 24 * 60 * 60);
				Value::DateTime(Utc::now().naive_utc() - Duration::seconds(offset))
			}
			ValueKind::Uuid => Value::Uuid(Uuid::new_v4()),
			ValueKind::Record(_) | ValueKind::List(_) => Value::Null,
		}
	}
}

impl Default for StandardValueGenerator {
	fn default() -> Self {
		Self::new()
	}
}

impl ValueGenerator for StandardValueGenerator {
	fn generate(&mut self, property: &PropertySpec) -> Value {
		self.leaf(property.kind(), property)
	}

	fn collection(&mut self, kind: &ValueKind) -> Option<Value> {
		let ValueKind::List(element) = kind else {
			return None;
		};
		if !element.is_leaf() {
			return None;
		}
		let length = self.rng.gen_range(0..=3);
		let probe = PropertySpec::new("element", (**element).clone());
		let items = (0..length).map(|_| self.leaf(element, &probe)).collect();
		Some(Value::List(items))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::schema::Constraints;
	use rstest::rstest;

	fn text_property(max_length: Option<usize>) -> PropertySpec {
		match max_length {
			Some(n) => {
				PropertySpec::with_constraints("p", ValueKind::Text, Constraints::max_length(n))
			}
			None => PropertySpec::new("p", ValueKind::Text),
		}
	}

	#[rstest]
	fn text_respects_max_length() {
		let mut generator = StandardValueGenerator::seeded(7);
		let value = generator.generate(&text_property(Some(4)));
		assert_eq!(value.as_text().unwrap().len(), 4);
	}

	#[rstest]
	fn int_respects_max_value() {
		let mut generator = StandardValueGenerator::seeded(7);
		let spec = PropertySpec::with_constraints("p", ValueKind::Int, Constraints::max_value(5));
		for _ in 0..50 {
			let n = generator.generate(&spec).as_int().unwrap();
			assert!((0..=5).contains(&n));
		}
	}

	#[rstest]
	fn seeded_generators_agree() {
		let spec = text_property(None);
		let mut first = StandardValueGenerator::seeded(99);
		let mut second = StandardValueGenerator::seeded(99);
		assert_eq!(first.generate(&spec), second.generate(&spec));
	}

	#[rstest]
	fn leaf_lists_are_handled_record_lists_are_not() {
		let mut generator = StandardValueGenerator::seeded(3);
		let leaf = ValueKind::List(Box::new(ValueKind::Int));
		assert!(generator.collection(&leaf).is_some());
		let nested = ValueKind::List(Box::new(ValueKind::Record("t.X".into())));
		assert!(generator.collection(&nested).is_none());
		assert!(generator.collection(&ValueKind::Int).is_none());
	}
}
