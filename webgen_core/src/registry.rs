use std::collections::BTreeMap;
use std::sync::Arc;

use crate::TagProcessor;

/// Name of the processor used for tags without a processor of their own.
pub const DEFAULT_TAG: &str = "default";

/// Maps tag names to processors.
///
/// Build it once while loading extensions and share it (usually behind an
/// `Arc`) with every engine. Lookups never mutate it.
#[derive(Clone, Default)]
pub struct TagRegistry {
	processors: BTreeMap<String, Arc<dyn TagProcessor>>,
}

impl TagRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register `processor` under each of `names`. A name that already has a
	/// processor is taken over by the new one.
	pub fn register<I, S>(&mut self, names: I, processor: Arc<dyn TagProcessor>)
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		for name in names {
			let name = name.into();
			if self
				.processors
				.insert(name.clone(), Arc::clone(&processor))
				.is_some()
			{
				tracing::warn!(tag = %name, "replacing previously registered tag processor");
			} else {
				tracing::debug!(tag = %name, "registered tag processor");
			}
		}
	}

	/// Register the processor used for unknown tag names.
	pub fn register_default(&mut self, processor: Arc<dyn TagProcessor>) {
		self.register([DEFAULT_TAG], processor);
	}

	/// The processor for `name`, falling back to the `default` processor.
	pub fn resolve(&self, name: &str) -> Option<&Arc<dyn TagProcessor>> {
		self.processors
			.get(name)
			.or_else(|| self.processors.get(DEFAULT_TAG))
	}

	pub fn contains(&self, name: &str) -> bool {
		self.processors.contains_key(name)
	}

	/// Registered names in sorted order, including `default` if present.
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.processors.keys().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.processors.len()
	}

	pub fn is_empty(&self) -> bool {
		self.processors.is_empty()
	}
}

impl std::fmt::Debug for TagRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TagRegistry")
			.field("tags", &self.processors.keys().collect::<Vec<_>>())
			.finish()
	}
}
