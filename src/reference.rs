//! Record references: the unit of work of the persistence pipeline.
//!
//! A [`RecordReference`] wraps one row-to-be-written together with its
//! foreign-key links to other references. References live in a
//! [`RecordArena`] and address each other through copyable [`RefHandle`]
//! indices, so dependency edges never alias the records they point at.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::value::{Record, Value};

/// Arena index of a record reference. Cheap to copy and hash; only valid
/// for the arena that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefHandle(pub(crate) usize);

impl RefHandle {
	/// Raw arena index.
	pub fn index(&self) -> usize {
		self.0
	}
}

/// Normalized property chain used to match explicit overrides during
/// recursive graph construction.
///
/// Paths compare by segment equality, not by graph-node identity:
/// `"billing.customer.id"` names the `id` property of the `customer`
/// property of the `billing` property of the root record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PropertyPath(Vec<String>);

impl PropertyPath {
	/// The empty path, naming the root record itself.
	pub fn root() -> Self {
		Self::default()
	}

	/// Parses a dotted path such as `"customer.name"`.
	pub fn parse(path: &str) -> Self {
		if path.is_empty() {
			return Self::root();
		}
		Self(path.split('.').map(str::to_string).collect())
	}

	/// Returns this path extended by one segment.
	pub fn child(&self, segment: &str) -> Self {
		let mut segments = self.0.clone();
		segments.push(segment.to_string());
		Self(segments)
	}

	/// Path segments in order.
	pub fn segments(&self) -> &[String] {
		&self.0
	}

	/// True for the root path.
	pub fn is_root(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Display for PropertyPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.join("."))
	}
}

impl From<&str> for PropertyPath {
	fn from(path: &str) -> Self {
		Self::parse(path)
	}
}

/// Zero-argument factory producing a value on demand.
///
/// Shared (`Arc`) so one factory can be bound to several records, as the
/// guarantee injector does when cycling candidates round-robin.
pub type ValueFactory = Arc<dyn Fn() -> Value>;

/// Explicit per-property overrides, keyed by normalized path.
///
/// An override always wins over generated values for its exact path, and
/// registering one is the only way to re-enter a recursive type during
/// graph construction.
#[derive(Clone, Default)]
pub struct PropertyOverrides {
	map: HashMap<PropertyPath, ValueFactory>,
}

impl PropertyOverrides {
	/// Creates an empty override set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a factory for the given path.
	pub fn set(mut self, path: impl Into<PropertyPath>, factory: ValueFactory) -> Self {
		self.map.insert(path.into(), factory);
		self
	}

	/// Registers a constant value for the given path.
	pub fn set_value(self, path: impl Into<PropertyPath>, value: impl Into<Value>) -> Self {
		let value = value.into();
		self.set(path, Arc::new(move || value.clone()))
	}

	/// Looks up the factory registered for an exact path.
	pub fn get(&self, path: &PropertyPath) -> Option<&ValueFactory> {
		self.map.get(path)
	}

	/// Returns true when an override is registered for the exact path.
	pub fn contains(&self, path: &PropertyPath) -> bool {
		self.map.contains_key(path)
	}

	/// Returns true when no override is registered.
	pub fn is_empty(&self) -> bool {
		self.map.is_empty()
	}
}

impl fmt::Debug for PropertyOverrides {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_set().entries(self.map.keys()).finish()
	}
}

/// Resolved foreign-key edge: `property` on the dependent record carries
/// the value of `owner_property` on the `owner` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyLink {
	/// Foreign-key property on the dependent record.
	pub property: String,
	/// Reference supplying the key value.
	pub owner: RefHandle,
	/// Key property on the owner.
	pub owner_property: String,
}

/// In-memory handle to one logical row and its dependency links.
///
/// Created when a caller requests records of a type, mutated while the
/// graph is built and while results are bound, and read-only once the
/// batch that owns it has persisted.
pub struct RecordReference {
	type_name: String,
	record: Record,
	built: bool,
	primary_key_reference: Option<RefHandle>,
	foreign_links: Vec<ForeignKeyLink>,
	pre_bound: Option<ValueFactory>,
	persisted: bool,
}

impl RecordReference {
	/// Creates an unbuilt reference of the given registered type.
	pub fn new(type_name: impl Into<String>) -> Self {
		Self {
			type_name: type_name.into(),
			record: Record::new(),
			built: false,
			primary_key_reference: None,
			foreign_links: Vec::new(),
			pre_bound: None,
			persisted: false,
		}
	}

	/// Registered type name of the row.
	pub fn type_name(&self) -> &str {
		&self.type_name
	}

	/// The constructed row. Empty until the populator builds it.
	pub fn record(&self) -> &Record {
		&self.record
	}

	/// Mutable access to the row. Callers must not mutate after persist.
	pub(crate) fn record_mut(&mut self) -> &mut Record {
		&mut self.record
	}

	/// Replaces the row wholesale and marks the reference built.
	pub(crate) fn set_record(&mut self, record: Record) {
		self.record = record;
		self.built = true;
	}

	/// True once the row has been constructed (generated or pre-bound).
	pub fn is_built(&self) -> bool {
		self.built
	}

	/// The first owner this reference was anchored to, if any.
	///
	/// Informational for callers inspecting how a batch was composed;
	/// write ordering and key propagation derive from
	/// [`RecordReference::foreign_links`], not from this field.
	pub fn primary_key_reference(&self) -> Option<RefHandle> {
		self.primary_key_reference
	}

	pub(crate) fn set_primary_key_reference(&mut self, owner: RefHandle) {
		self.primary_key_reference = Some(owner);
	}

	/// Resolved foreign-key links, one per linked foreign-key property.
	pub fn foreign_links(&self) -> &[ForeignKeyLink] {
		&self.foreign_links
	}

	/// Adds or replaces the link for `link.property`. One chain per
	/// foreign-key attribute: linking the same property twice keeps only
	/// the newest owner.
	pub(crate) fn set_foreign_link(&mut self, link: ForeignKeyLink) {
		self.foreign_links.retain(|l| l.property != link.property);
		self.foreign_links.push(link);
	}

	/// Pre-made row factory bound by guarantee injection; wins over
	/// generation when present.
	pub fn pre_bound(&self) -> Option<&ValueFactory> {
		self.pre_bound.as_ref()
	}

	pub(crate) fn set_pre_bound(&mut self, factory: ValueFactory) {
		self.pre_bound = Some(factory);
	}

	/// True once the batch containing this reference has persisted.
	pub fn is_persisted(&self) -> bool {
		self.persisted
	}

	pub(crate) fn mark_persisted(&mut self) {
		self.persisted = true;
	}
}

impl fmt::Debug for RecordReference {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RecordReference")
			.field("type_name", &self.type_name)
			.field("built", &self.built)
			.field("persisted", &self.persisted)
			.field("primary_key_reference", &self.primary_key_reference)
			.field("foreign_links", &self.foreign_links)
			.field("pre_bound", &self.pre_bound.is_some())
			.field("record", &self.record)
			.finish()
	}
}

/// Owning arena of record references for one populator session.
#[derive(Debug, Default)]
pub struct RecordArena {
	references: Vec<RecordReference>,
}

impl RecordArena {
	/// Creates an empty arena.
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores a reference and returns its handle.
	pub fn push(&mut self, reference: RecordReference) -> RefHandle {
		let handle = RefHandle(self.references.len());
		self.references.push(reference);
		handle
	}

	/// Immutable access by handle.
	///
	/// # Panics
	///
	/// Panics on a handle from another arena; handles are only ever minted
	/// by [`RecordArena::push`] on this arena.
	pub fn get(&self, handle: RefHandle) -> &RecordReference {
		&self.references[handle.0]
	}

	/// Mutable access by handle.
	pub(crate) fn get_mut(&mut self, handle: RefHandle) -> &mut RecordReference {
		&mut self.references[handle.0]
	}

	/// Handles of all stored references, in insertion order.
	pub fn handles(&self) -> impl Iterator<Item = RefHandle> + '_ {
		(0..self.references.len()).map(RefHandle)
	}

	/// Most recently added reference of the given type, if any.
	pub fn latest_of_type(&self, type_name: &str) -> Option<RefHandle> {
		self.references
			.iter()
			.rposition(|r| r.type_name() == type_name)
			.map(RefHandle)
	}

	/// Number of stored references.
	pub fn len(&self) -> usize {
		self.references.len()
	}

	/// True when the arena holds no references.
	pub fn is_empty(&self) -> bool {
		self.references.is_empty()
	}
}
