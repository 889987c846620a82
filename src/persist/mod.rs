//! Persistence pipeline: the write-primitives boundary and the
//! dependency-ordered operation graph.

pub mod operations;

pub use operations::{CircularReferenceBreaker, OperationGraph, OperationState};

use crate::error::PopulateResult;
use crate::value::Value;

/// Opaque stand-in for a value that is unknown until the batch executes
/// (a store-assigned identity). Issued by the write boundary; the index
/// ties it to the matching entry of the execute result array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placeholder(pub(crate) usize);

impl Placeholder {
	/// Position of this placeholder in deferred-read order.
	pub fn index(&self) -> usize {
		self.0
	}
}

/// A column value in an insert statement: either a literal or a deferred
/// placeholder resolved by the boundary at execute time.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
	/// Concrete value known at statement-build time.
	Literal(Value),
	/// Value pending a deferred identity read.
	Deferred(Placeholder),
}

/// One accumulated insert statement.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
	/// Target table.
	pub table: String,
	/// Column name and value pairs, in schema property order.
	pub columns: Vec<(String, ColumnValue)>,
}

/// Statement-accumulation boundary for one batch.
///
/// Implementations accumulate inserts and deferred identity reads, then
/// execute everything in one round trip. The result array must contain
/// one scalar per requested identity, in request order.
pub trait WritePrimitives {
	/// Appends an insert statement to the batch.
	fn insert(&mut self, table: &str, columns: Vec<(String, ColumnValue)>);

	/// Requests a read of the identity assigned to `column` by the most
	/// recent insert, returning a placeholder other statements may embed.
	fn request_deferred_identity(&mut self, column: &str) -> Placeholder;

	/// Executes the accumulated batch and returns the deferred-read
	/// results in request order. Called at most once per batch, and never
	/// with zero accumulated statements.
	fn execute(&mut self) -> PopulateResult<Vec<Value>>;
}

/// In-memory write boundary: collects statements and hands out sequential
/// integer identities on execute.
///
/// Serves tests and dry runs; a SQL-dialect boundary is an external
/// collaborator implementing the same trait.
#[derive(Debug)]
pub struct MemoryWriter {
	statements: Vec<InsertStatement>,
	identity_columns: Vec<String>,
	next_identity: i64,
	executed: bool,
}

impl MemoryWriter {
	/// Creates a writer whose identities start at 1.
	pub fn new() -> Self {
		Self::starting_at(1)
	}

	/// Creates a writer whose identities start at the given value.
	pub fn starting_at(first_identity: i64) -> Self {
		Self {
			statements: Vec::new(),
			identity_columns: Vec::new(),
			next_identity: first_identity,
			executed: false,
		}
	}

	/// Accumulated statements. After execute, embedded placeholders have
	/// been substituted with the identities they resolved to.
	pub fn statements(&self) -> &[InsertStatement] {
		&self.statements
	}

	/// True once the batch has executed.
	pub fn executed(&self) -> bool {
		self.executed
	}
}

impl Default for MemoryWriter {
	fn default() -> Self {
		Self::new()
	}
}

impl WritePrimitives for MemoryWriter {
	fn insert(&mut self, table: &str, columns: Vec<(String, ColumnValue)>) {
		self.statements.push(InsertStatement {
			table: table.to_string(),
			columns,
		});
	}

	fn request_deferred_identity(&mut self, column: &str) -> Placeholder {
		let placeholder = Placeholder(self.identity_columns.len());
		self.identity_columns.push(column.to_string());
		placeholder
	}

	fn execute(&mut self) -> PopulateResult<Vec<Value>> {
		self.executed = true;
		let identities: Vec<Value> = (0..self.identity_columns.len())
			.map(|offset| Value::Int(self.next_identity + offset as i64))
			.collect();
		self.next_identity += identities.len() as i64;
		// resolve embedded placeholders the way a real boundary would
		for statement in &mut self.statements {
			for (_, column) in &mut statement.columns {
				if let ColumnValue::Deferred(placeholder) = column {
					*column = ColumnValue::Literal(identities[placeholder.0].clone());
				}
			}
		}
		Ok(identities)
	}
}
