//! Convenient glob-import surface.
//!
//! ```
//! use rowforge::prelude::*;
//! ```

pub use crate::error::{PopulateError, PopulateResult};
pub use crate::generate::{
	StandardValueGenerator, TypeGenerator, ValueAccumulator, ValueGenerator,
};
pub use crate::guarantee::{CountRequestPolicy, GuaranteedValues};
pub use crate::persist::{
	ColumnValue, InsertStatement, MemoryWriter, OperationGraph, Placeholder, WritePrimitives,
};
pub use crate::populator::Populator;
pub use crate::reference::{
	PropertyOverrides, PropertyPath, RecordArena, RecordReference, RefHandle, ValueFactory,
};
pub use crate::schema::{
	Constraints, ForeignKey, PrimaryKey, PropertySpec, RecordSchema, SchemaRegistry,
};
pub use crate::value::{Record, Value, ValueKind};
