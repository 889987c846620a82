//! Per-property counters deriving deterministic unique values.

use std::collections::HashMap;
use std::fmt;

use crate::error::{PopulateError, PopulateResult};
use crate::schema::Constraints;
use crate::value::{Value, ValueKind};

/// Letter-encoding width used when a text property declares no maximum
/// length.
pub const DEFAULT_STRING_WIDTH: usize = 10;

/// Identity of a counter: one counter per `(type, property)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyKey {
	/// Registered type name.
	pub type_name: String,
	/// Property name on that type.
	pub property: String,
}

impl PropertyKey {
	/// Creates a key for `type_name.property`.
	pub fn new(type_name: impl Into<String>, property: impl Into<String>) -> Self {
		Self {
			type_name: type_name.into(),
			property: property.into(),
		}
	}
}

impl fmt::Display for PropertyKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}", self.type_name, self.property)
	}
}

/// Monotonically increasing per-property counters, converted to the
/// property's value kind on demand.
///
/// Counters are `u128`: wide enough for any supported auto-increment
/// column, with overflow checked and fatal rather than wrapping. Two
/// properties never share counter state.
#[derive(Debug, Default)]
pub struct ValueAccumulator {
	counters: HashMap<PropertyKey, u128>,
}

impl ValueAccumulator {
	/// Creates an accumulator with no counters.
	pub fn new() -> Self {
		Self::default()
	}

	/// Produces the next unique value for the property.
	///
	/// The first call for a key uses `initial`; every following call
	/// returns a strictly larger encoding. Text kinds encode the counter
	/// base-26 over `A..Z`, left-padded to the property's maximum length
	/// (or [`DEFAULT_STRING_WIDTH`]); a counter that needs more digits
	/// than the width is a fatal overflow.
	pub fn next_value(
		&mut self,
		key: &PropertyKey,
		kind: &ValueKind,
		constraints: &Constraints,
		initial: u128,
	) -> PopulateResult<Value> {
		let counter = *self.counters.get(key).unwrap_or(&initial);
		let value = match kind {
			ValueKind::Int => {
				if counter > i64::MAX as u128 {
					return Err(PopulateError::UniqueValueOverflow {
						property: key.to_string(),
						width: 19,
						counter,
					});
				}
				Value::Int(counter as i64)
			}
			ValueKind::Float => Value::Float(counter as f64),
			ValueKind::Text => {
				let width = constraints.max_length.unwrap_or(DEFAULT_STRING_WIDTH);
				Value::Text(encode_letters(counter, width, key)?)
			}
			other => {
				return Err(PopulateError::InvalidState(format!(
					"unique values are not defined for {other} ({key})"
				)));
			}
		};
		self.counters.insert(key.clone(), counter + 1);
		Ok(value)
	}

	/// Current counter for a key, if one has been started.
	pub fn current(&self, key: &PropertyKey) -> Option<u128> {
		self.counters.get(key).copied()
	}
}

/// Encodes `counter` as a fixed-width base-26 string over `A..Z`,
/// left-padded with `A`.
fn encode_letters(counter: u128, width: usize, key: &PropertyKey) -> PopulateResult<String> {
	// 26^28 exceeds u128, so widths past 27 can never overflow
	if let Some(limit) = 26u128.checked_pow(width as u32) {
		if counter >= limit {
			return Err(PopulateError::UniqueValueOverflow {
				property: key.to_string(),
				width,
				counter,
			});
		}
	}
	let mut digits = vec![b'A'; width];
	let mut remaining = counter;
	let mut position = width;
	while remaining > 0 {
		position -= 1;
		digits[position] = b'A' + (remaining % 26) as u8;
		remaining /= 26;
	}
	Ok(String::from_utf8(digits).expect("letter digits are ASCII"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn key(property: &str) -> PropertyKey {
		PropertyKey::new("t.Thing", property)
	}

	#[rstest]
	fn counters_are_strictly_increasing() {
		let mut accumulator = ValueAccumulator::new();
		let k = key("n");
		let mut last = -1i64;
		for _ in 0..5 {
			let value = accumulator
				.next_value(&k, &ValueKind::Int, &Constraints::none(), 0)
				.unwrap();
			let n = value.as_int().unwrap();
			assert!(n > last);
			last = n;
		}
	}

	#[rstest]
	fn first_call_uses_the_initial_counter() {
		let mut accumulator = ValueAccumulator::new();
		let value = accumulator
			.next_value(&key("n"), &ValueKind::Int, &Constraints::none(), 41)
			.unwrap();
		assert_eq!(value, Value::Int(41));
	}

	#[rstest]
	fn properties_never_share_counter_state() {
		let mut accumulator = ValueAccumulator::new();
		let first = key("a");
		let second = key("b");
		accumulator
			.next_value(&first, &ValueKind::Int, &Constraints::none(), 0)
			.unwrap();
		accumulator
			.next_value(&first, &ValueKind::Int, &Constraints::none(), 0)
			.unwrap();
		let fresh = accumulator
			.next_value(&second, &ValueKind::Int, &Constraints::none(), 0)
			.unwrap();
		assert_eq!(fresh, Value::Int(0));
		assert_eq!(accumulator.current(&first), Some(2));
	}

	#[rstest]
	#[case(0, "AAA")]
	#[case(1, "AAB")]
	#[case(25, "AAZ")]
	#[case(26, "ABA")]
	#[case(26 * 26 * 26 - 1, "ZZZ")]
	fn letter_encoding(#[case] counter: u128, #[case] expected: &str) {
		let encoded = encode_letters(counter, 3, &key("code")).unwrap();
		assert_eq!(encoded, expected);
	}

	#[rstest]
	fn encoding_past_the_width_overflows() {
		let mut accumulator = ValueAccumulator::new();
		let k = key("code");
		let constraints = Constraints::max_length(2);
		let last = accumulator
			.next_value(&k, &ValueKind::Text, &constraints, 675)
			.unwrap();
		assert_eq!(last, Value::Text("ZZ".into()));
		let error = accumulator
			.next_value(&k, &ValueKind::Text, &constraints, 0)
			.unwrap_err();
		assert!(matches!(
			error,
			PopulateError::UniqueValueOverflow { counter: 676, width: 2, .. }
		));
	}

	#[rstest]
	fn unique_values_reject_non_encodable_kinds() {
		let mut accumulator = ValueAccumulator::new();
		let error = accumulator
			.next_value(&key("flag"), &ValueKind::Bool, &Constraints::none(), 0)
			.unwrap_err();
		assert!(matches!(error, PopulateError::InvalidState(_)));
	}
}
