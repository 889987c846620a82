//! Error types for the population pipeline.

use thiserror::Error;

/// Errors raised while building, guaranteeing, or persisting record graphs.
///
/// Configuration mistakes and internal invariant violations are both fatal
/// to the batch; no retries or partial-success bookkeeping happen here.
/// Degraded-but-continues conditions (a recursion cut off without an
/// override, an unregistered nested type) are not errors: they log a
/// warning and substitute a null value.
#[derive(Debug, Error)]
pub enum PopulateError {
	/// The caller composed record references whose foreign keys form a
	/// cycle that no insert order can satisfy. The chain lists every type
	/// traversed, first repeated entry last.
	#[error("circular foreign-key reference cannot be ordered: {chain}")]
	CircularForeignKeyReference {
		/// Type chain of the cycle, rendered as `A -> B -> A`.
		chain: String,
	},

	/// The summed guarantee quantities exceed the generated pool.
	#[error(
		"value guarantees request {requested} records but only {available} are available"
	)]
	TooFewReferencesForValueGuarantee {
		/// Total records the guarantee sets asked for.
		requested: usize,
		/// Size of the pool the guarantees were applied to.
		available: usize,
	},

	/// A guarantee set declared neither a fixed total nor a percentage.
	#[error("a value guarantee must specify either a fixed total or a percentage")]
	NeitherPercentageNorTotalGiven,

	/// A guaranteed value does not fit the pool's record type.
	#[error("value guarantee for {expected} received a {actual} value: {value}")]
	ValueGuarantee {
		/// Registered type name of the pool's records.
		expected: String,
		/// Runtime kind of the offending value.
		actual: String,
		/// Rendering of the offending value.
		value: String,
	},

	/// A unique-value counter no longer fits its property's width.
	#[error("unique value for {property} overflowed: counter {counter} does not fit width {width}")]
	UniqueValueOverflow {
		/// Property whose counter overflowed, as `Type.property`.
		property: String,
		/// Width the value had to fit (letter digits for text, decimal
		/// digits for integers).
		width: usize,
		/// Counter value that could not be encoded.
		counter: u128,
	},

	/// A top-level request named a type that is not in the schema registry.
	#[error("record type is not registered: {0}")]
	UnknownType(String),

	/// A programming-contract violation inside the pipeline.
	#[error("invalid state: {0}")]
	InvalidState(String),

	/// The write boundary failed to execute the accumulated batch.
	#[error("write boundary error: {0}")]
	Write(String),
}

/// Result type alias for population operations.
pub type PopulateResult<T> = Result<T, PopulateError>;
