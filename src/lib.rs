//! Dependency-aware synthetic data population for relational stores.
//!
//! `rowforge` generates object graphs for testing and persists them while
//! honoring primary-key/foreign-key dependencies it does not control at
//! call time: store-assigned identity values, circular type graphs, and
//! partially specified rows. The pipeline:
//!
//! - **Graph building** — recursively constructs populated records from a
//!   [`SchemaRegistry`](schema::SchemaRegistry), with a recursion guard
//!   bounding self- and mutually-referential types.
//! - **Value guarantees** — forces a fixed count or percentage of a
//!   generated pool to carry specific rows.
//! - **Deferred unique values** — client-assigned keys are resolved in one
//!   pass against shared per-property counters, right before writing.
//! - **Dependency-ordered writes** — one operation node per record, written
//!   depth-first so every foreign-key owner inserts before its dependents;
//!   caller-composed cycles surface as a configuration error naming the
//!   full type chain.
//! - **Execute-then-bind** — the whole batch executes in a single round
//!   trip; store-assigned identities are then bound back onto the owning
//!   records and every dependent that referenced them.
//!
//! # Quick start
//!
//! ```
//! use rowforge::prelude::*;
//!
//! let schema = SchemaRegistry::new()
//! 	.register(
//! 		RecordSchema::new("crm.Customer")
//! 			.auto_key("id")
//! 			.constrained_property("name", ValueKind::Text, Constraints::max_length(20)),
//! 	)
//! 	.register(
//! 		RecordSchema::new("crm.Order")
//! 			.auto_key("id")
//! 			.foreign_key("customer_id", "crm.Customer", "id"),
//! 	);
//!
//! let mut populator = Populator::seeded(schema, 42);
//! let customers = populator.add("crm.Customer", 1)?;
//! let orders = populator.add("crm.Order", 2)?;
//!
//! let mut writer = MemoryWriter::new();
//! populator.persist(&mut writer)?;
//!
//! // the customer inserted first and received identity 1,
//! // which both orders now reference
//! assert_eq!(populator.value(customers[0], "id"), Some(&Value::Int(1)));
//! assert_eq!(populator.value(orders[0], "customer_id"), Some(&Value::Int(1)));
//! assert_eq!(populator.value(orders[1], "customer_id"), Some(&Value::Int(1)));
//! # Ok::<(), rowforge::PopulateError>(())
//! ```
//!
//! # Scope
//!
//! This is not a query engine and not an ORM: the only store interaction
//! is the batched insert pipeline behind the
//! [`WritePrimitives`](persist::WritePrimitives) boundary. Everything runs
//! single-threaded and synchronously; one populator session must not be
//! shared across threads.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod generate;
pub mod guarantee;
pub mod persist;
pub mod populator;
pub mod prelude;
pub mod reference;
pub mod schema;
pub mod value;

pub use error::{PopulateError, PopulateResult};
pub use populator::Populator;
