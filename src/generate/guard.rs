//! Stack-based cycle detector for recursive graph construction.

use crate::error::{PopulateError, PopulateResult};
use crate::reference::{PropertyOverrides, PropertyPath};

/// Tracks the types entered on the current recursive descent so that
/// self-referential and mutually-referential type graphs terminate.
///
/// Re-entering a type already on the stack is refused unless an explicit
/// override is registered for the exact path of the current graph node —
/// in that case the caller short-circuits recursion with the override
/// value, so allowing re-entry is safe.
#[derive(Debug, Default)]
pub struct RecursionGuard {
	stack: Vec<String>,
}

impl RecursionGuard {
	/// Creates a guard with an empty stack.
	pub fn new() -> Self {
		Self::default()
	}

	/// Attempts to enter `type_name` at `path`.
	///
	/// Returns false when the type is already on the stack and no override
	/// matches the current path; the caller must stop recursing and
	/// substitute a default value for that branch. Returns true otherwise,
	/// with the type pushed — every successful push must be paired with a
	/// [`RecursionGuard::pop`].
	pub fn push(
		&mut self,
		type_name: &str,
		overrides: &PropertyOverrides,
		path: &PropertyPath,
	) -> bool {
		if self.stack.iter().any(|entered| entered == type_name) && !overrides.contains(path) {
			return false;
		}
		self.stack.push(type_name.to_string());
		true
	}

	/// Leaves the most recently entered type.
	///
	/// Popping an empty stack is a programming-contract violation, not a
	/// recoverable condition.
	pub fn pop(&mut self) -> PopulateResult<()> {
		self.stack
			.pop()
			.map(|_| ())
			.ok_or_else(|| {
				PopulateError::InvalidState("recursion guard popped with an empty stack".into())
			})
	}

	/// Current descent depth.
	pub fn depth(&self) -> usize {
		self.stack.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn distinct_types_stack_freely() {
		let mut guard = RecursionGuard::new();
		let overrides = PropertyOverrides::new();
		assert!(guard.push("t.A", &overrides, &PropertyPath::root()));
		assert!(guard.push("t.B", &overrides, &"child".into()));
		assert_eq!(guard.depth(), 2);
		guard.pop().unwrap();
		guard.pop().unwrap();
	}

	#[rstest]
	fn re_entry_without_override_is_refused() {
		let mut guard = RecursionGuard::new();
		let overrides = PropertyOverrides::new();
		assert!(guard.push("t.A", &overrides, &PropertyPath::root()));
		assert!(!guard.push("t.A", &overrides, &"child".into()));
		// the refused push did not grow the stack
		assert_eq!(guard.depth(), 1);
	}

	#[rstest]
	fn re_entry_with_exact_path_override_is_allowed() {
		let mut guard = RecursionGuard::new();
		let overrides = PropertyOverrides::new().set_value("child", 1i64);
		assert!(guard.push("t.A", &overrides, &PropertyPath::root()));
		assert!(guard.push("t.A", &overrides, &"child".into()));
		// a deeper, non-matching path is still refused
		assert!(!guard.push("t.A", &overrides, &"child.other".into()));
	}

	#[rstest]
	fn pop_on_empty_stack_is_invalid_state() {
		let mut guard = RecursionGuard::new();
		let error = guard.pop().unwrap_err();
		assert!(matches!(
			error,
			crate::error::PopulateError::InvalidState(_)
		));
	}

	#[rstest]
	fn pop_after_leaving_is_balanced() {
		let mut guard = RecursionGuard::new();
		let overrides = PropertyOverrides::new();
		assert!(guard.push("t.A", &overrides, &PropertyPath::root()));
		guard.pop().unwrap();
		// the type can be entered again on a fresh descent
		assert!(guard.push("t.A", &overrides, &PropertyPath::root()));
	}
}
