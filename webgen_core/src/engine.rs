use std::sync::Arc;

use crate::ArtifactId;
use crate::ItemTracker;
use crate::TagCall;
use crate::TagRegistry;
use crate::TagScanner;
use crate::TrackedItem;
use crate::WebgenConfig;
use crate::WebgenResult;
use crate::Website;
use crate::config::DEFAULT_MAX_REPROCESS_DEPTH;

/// Options for expanding tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagOptions {
	/// Text required between `{` and the tag name.
	pub prefix: String,
	/// How many times the output of a tag may be rescanned for further tags
	/// before reprocessing is abandoned.
	pub max_reprocess_depth: usize,
}

impl Default for TagOptions {
	fn default() -> Self {
		Self {
			prefix: String::new(),
			max_reprocess_depth: DEFAULT_MAX_REPROCESS_DEPTH,
		}
	}
}

impl TagOptions {
	pub fn from_config(config: Option<&WebgenConfig>) -> Self {
		let Some(config) = config else {
			return Self::default();
		};

		Self {
			prefix: config.tags.prefix.clone(),
			max_reprocess_depth: config.tags.max_reprocess_depth,
		}
	}
}

/// Everything a tag processor may need while one artifact is rendered.
pub struct RenderContext<'a> {
	website: &'a dyn Website,
	tracker: &'a mut ItemTracker,
	chain: Vec<ArtifactId>,
}

impl<'a> RenderContext<'a> {
	/// `chain` lists the artifacts being rendered from the destination (the
	/// artifact written to disk) down to the artifact whose content is being
	/// expanded, e.g. `[page, template]` while the page's template renders.
	pub fn new(website: &'a dyn Website, tracker: &'a mut ItemTracker, chain: Vec<ArtifactId>) -> Self {
		Self {
			website,
			tracker,
			chain,
		}
	}

	pub fn website(&self) -> &'a dyn Website {
		self.website
	}

	pub fn chain(&self) -> &[ArtifactId] {
		&self.chain
	}

	/// The artifact whose output is being produced.
	pub fn dest_node(&self) -> Option<&ArtifactId> {
		self.chain.first()
	}

	/// The artifact whose content is currently being expanded.
	pub fn content_node(&self) -> Option<&ArtifactId> {
		self.chain.last()
	}

	/// Record that the destination artifact depends on `item`.
	pub fn track(&mut self, item: TrackedItem) {
		let Some(dest) = self.chain.first() else {
			tracing::warn!(kind = %item.kind(), "cannot track item without an artifact being rendered");
			return;
		};

		self.tracker.register(dest, item, self.website);
	}

	pub fn tracker(&mut self) -> &mut ItemTracker {
		&mut *self.tracker
	}
}

/// Expands tags with the processors of a registry.
#[derive(Debug, Clone)]
pub struct TagEngine {
	registry: Arc<TagRegistry>,
	scanner: TagScanner,
	options: TagOptions,
}

impl TagEngine {
	pub fn new(registry: Arc<TagRegistry>, options: TagOptions) -> Self {
		Self {
			registry,
			scanner: TagScanner::new(options.prefix.clone()),
			options,
		}
	}

	pub fn registry(&self) -> &TagRegistry {
		&self.registry
	}

	pub fn options(&self) -> &TagOptions {
		&self.options
	}

	/// Replace every tag in `content`. Scan faults and unknown tags are
	/// logged and do not fail the render; errors raised by processors do.
	pub fn render(&self, content: &str, ctx: &mut RenderContext<'_>) -> WebgenResult<String> {
		self.render_at_depth(content, ctx, 0)
	}

	fn render_at_depth(
		&self,
		content: &str,
		ctx: &mut RenderContext<'_>,
		depth: usize,
	) -> WebgenResult<String> {
		self.scanner.try_replace_tags(content, |tag, params, body| {
			self.process_tag(tag, params, body, ctx, depth)
		})
	}

	fn process_tag(
		&self,
		tag: &str,
		param_text: &str,
		body: &str,
		ctx: &mut RenderContext<'_>,
		depth: usize,
	) -> WebgenResult<String> {
		let Some(processor) = self.registry.resolve(tag) else {
			tracing::error!(tag, "no processor for tag");
			return Ok(String::new());
		};

		let params = processor.signature().parse_params(tag, param_text);
		let call = TagCall {
			tag,
			params: &params,
			body,
		};
		let output = processor.process(&call, ctx)?;

		if !output.reprocess {
			return Ok(output.content);
		}

		if depth >= self.options.max_reprocess_depth {
			tracing::error!(
				tag,
				depth,
				"maximum tag reprocessing depth reached, leaving output unprocessed"
			);
			return Ok(output.content);
		}

		self.render_at_depth(&output.content, ctx, depth + 1)
	}
}
