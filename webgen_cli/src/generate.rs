//! Renders the pages of a [`FsWebsite`], skipping pages whose recorded
//! dependencies did not change.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::RwLock;

use serde::Serialize;
use serde_json::Value;
use webgen_core::ArtifactId;
use webgen_core::ItemTracker;
use webgen_core::ParamSpec;
use webgen_core::RenderContext;
use webgen_core::TagCall;
use webgen_core::TagEngine;
use webgen_core::TagOptions;
use webgen_core::TagOutput;
use webgen_core::TagProcessor;
use webgen_core::TagRegistry;
use webgen_core::TagSignature;
use webgen_core::TrackedItem;
use webgen_core::TrackingMode;
use webgen_core::WebgenError;
use webgen_core::WebgenResult;
use webgen_core::Website;
use webgen_core::builtin_registry;

use crate::site::FsWebsite;
use crate::site::SourceContent;

/// Upper bound for generation passes in one run.
pub const MAX_PASSES: usize = 8;

/// Why a page needs rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleReason {
	Forced,
	OutputMissing,
	NeverRendered,
	DependenciesChanged,
}

impl fmt::Display for StaleReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let reason = match self {
			Self::Forced => "forced",
			Self::OutputMissing => "output missing",
			Self::NeverRendered => "never rendered",
			Self::DependenciesChanged => "dependencies changed",
		};
		f.write_str(reason)
	}
}

#[derive(Debug, Default)]
pub struct GenerationSummary {
	/// Pages rendered in this run, in render order.
	pub rendered: Vec<ArtifactId>,
	pub unchanged: usize,
	pub passes: usize,
}

/// The built-in processors plus the site-specific `links` and `embed` tags.
pub fn site_registry(site: &FsWebsite) -> TagRegistry {
	let mut registry = builtin_registry();
	registry.register(["links"], Arc::new(LinksTag));
	registry.register(
		["embed"],
		Arc::new(EmbedTag {
			out_dir: site.out_dir().to_path_buf(),
		}),
	);
	registry
}

pub struct Generator<'a> {
	site: &'a FsWebsite,
	engine: TagEngine,
	/// The page engine plus `content`, which prints `wrapped`.
	template_engine: TagEngine,
	wrapped: Arc<RwLock<String>>,
	tracker: ItemTracker,
	force: bool,
}

impl<'a> Generator<'a> {
	pub fn new(site: &'a FsWebsite, options: TagOptions, tracker: ItemTracker) -> Self {
		let registry = site_registry(site);
		let wrapped = Arc::new(RwLock::new(String::new()));
		let mut template_registry = registry.clone();
		template_registry.register(["content"], Arc::new(ContentTag(Arc::clone(&wrapped))));

		Self {
			site,
			engine: TagEngine::new(Arc::new(registry), options.clone()),
			template_engine: TagEngine::new(Arc::new(template_registry), options),
			wrapped,
			tracker,
			force: false,
		}
	}

	#[must_use]
	pub fn force(mut self, force: bool) -> Self {
		self.force = force;
		self
	}

	pub fn into_tracker(self) -> ItemTracker {
		self.tracker
	}

	/// Every page a render would regenerate, without rendering anything.
	pub fn stale_pages(&mut self) -> Vec<(ArtifactId, StaleReason)> {
		self.tracker.begin_generation();
		self.tracker.begin_pass();
		let site = self.site;
		site.pages()
			.filter_map(|page| {
				self.stale_reason(page, false)
					.map(|reason| (page.clone(), reason))
			})
			.collect()
	}

	/// Run generation passes until a pass renders nothing. Missing
	/// references stop causing renders once the latch settles.
	pub fn generate(&mut self) -> WebgenResult<GenerationSummary> {
		let site = self.site;
		let pages: Vec<&ArtifactId> = site.pages().collect();
		let mut rendered = BTreeSet::new();
		let mut summary = GenerationSummary::default();

		self.tracker.begin_generation();
		while summary.passes < MAX_PASSES {
			summary.passes += 1;
			self.tracker.begin_pass();
			let mut rendered_in_pass = 0;

			for page in &pages {
				let Some(reason) = self.stale_reason(page, rendered.contains(*page)) else {
					continue;
				};

				tracing::info!(%page, %reason, pass = summary.passes, "rendering page");
				if self.write_page(page)? {
					self.tracker.artifact_created();
				}
				rendered_in_pass += 1;
				if rendered.insert((*page).clone()) {
					summary.rendered.push((*page).clone());
				}
			}

			self.tracker.end_pass();
			if rendered_in_pass == 0 {
				break;
			}
		}

		summary.unchanged = pages.len() - summary.rendered.len();
		Ok(summary)
	}

	fn stale_reason(&mut self, page: &ArtifactId, rendered_this_run: bool) -> Option<StaleReason> {
		if !rendered_this_run {
			if self.force {
				return Some(StaleReason::Forced);
			}
			if !self.site.output_path(page).exists() {
				return Some(StaleReason::OutputMissing);
			}
		}

		if !self.tracker.has_dependencies(page) {
			return Some(StaleReason::NeverRendered);
		}

		self.tracker
			.has_any_changed(page, self.site)
			.then_some(StaleReason::DependenciesChanged)
	}

	/// Render `page` into the output directory. Returns whether the output
	/// file was newly created.
	fn write_page(&mut self, page: &ArtifactId) -> WebgenResult<bool> {
		let output = self.site.output_path(page);
		let created = !output.exists();
		if let Some(parent) = output.parent() {
			std::fs::create_dir_all(parent)?;
		}

		match self.render_page(page)? {
			Some(content) => std::fs::write(&output, content)?,
			None => {
				let source = self
					.site
					.node(page)
					.map(|node| self.site.root().join(&node.source))
					.ok_or_else(|| WebgenError::UnknownArtifact(page.to_string()))?;
				std::fs::copy(source, &output)?;
			}
		}

		Ok(created)
	}

	/// Expand the tags of `page` and wrap it in its templates, recording its
	/// dependencies. Binary pages yield `None`.
	pub fn render_page(&mut self, page: &ArtifactId) -> WebgenResult<Option<String>> {
		let site = self.site;
		let node = site
			.node(page)
			.ok_or_else(|| WebgenError::UnknownArtifact(page.to_string()))?;

		self.tracker.reset_dependencies(page);
		self.tracker
			.register(page, TrackedItem::file(node.source.clone()), site);

		let SourceContent::Text(text) = &node.content else {
			return Ok(None);
		};

		self.tracker
			.register(page, TrackedItem::template_chain(page.clone()), site);
		let mut content = {
			let mut ctx = RenderContext::new(site, &mut self.tracker, vec![page.clone()]);
			self.engine.render(text, &mut ctx)?
		};

		let chain = site.template_chain(page).unwrap_or_default();
		for template in chain.iter().rev() {
			let Some(template_node) = site.node(template) else {
				continue;
			};
			self.tracker
				.register(page, TrackedItem::file(template_node.source.clone()), site);
			let SourceContent::Text(template_text) = &template_node.content else {
				tracing::warn!(%page, %template, "binary template ignored");
				continue;
			};

			match self.wrapped.write() {
				Ok(mut wrapped) => *wrapped = content,
				Err(poisoned) => *poisoned.into_inner() = content,
			}
			let mut ctx = RenderContext::new(
				site,
				&mut self.tracker,
				vec![page.clone(), template.clone()],
			);
			content = self.template_engine.render(template_text, &mut ctx)?;
		}

		Ok(Some(content))
	}
}

/// Prints the rendered page inside one of its templates: `{content:}`.
struct ContentTag(Arc<RwLock<String>>);

impl TagProcessor for ContentTag {
	fn signature(&self) -> TagSignature {
		TagSignature::new()
	}

	fn process(&self, _call: &TagCall<'_>, _ctx: &mut RenderContext<'_>) -> WebgenResult<TagOutput> {
		let content = match self.0.read() {
			Ok(content) => content.clone(),
			Err(poisoned) => poisoned.into_inner().clone(),
		};
		Ok(TagOutput::new(content))
	}
}

/// Prints the rendered output of another page: `{embed: ../news.html}`.
/// The page is regenerated whenever the embedded page is.
#[derive(Debug)]
pub struct EmbedTag {
	out_dir: PathBuf,
}

impl TagProcessor for EmbedTag {
	fn signature(&self) -> TagSignature {
		TagSignature::new()
			.param(ParamSpec::mandatory("path"))
			.default_param("path")
	}

	fn process(&self, call: &TagCall<'_>, ctx: &mut RenderContext<'_>) -> WebgenResult<TagOutput> {
		let (Some(path), Some(content_node)) = (call.params.str("path"), ctx.content_node().cloned())
		else {
			return Err(WebgenError::TagProcessing {
				tag: call.tag.to_string(),
				reason: "no page to embed".to_string(),
			});
		};

		let absolute = content_node.join(&path);
		let Some(target) = ctx.website().resolve(&absolute, None) else {
			tracing::warn!(path = %absolute, "could not resolve embedded page");
			ctx.track(TrackedItem::missing_node(absolute, None));
			return Ok(TagOutput::new(String::new()));
		};

		ctx.track(TrackedItem::node_content(target.clone()));
		let output = self.out_dir.join(target.trim_start_matches('/'));
		match std::fs::read_to_string(&output) {
			Ok(content) => Ok(TagOutput::new(content)),
			Err(error) => {
				tracing::debug!(%target, %error, "embedded page not rendered yet");
				Ok(TagOutput::new(String::new()))
			}
		}
	}
}

/// Prints a link to every page of a node list, e.g. `{links:}` for the pages
/// next to the current one, `{links: {dir: blog/}}` or
/// `{links: {prefix: /blog/}}`. Link texts are the pages' titles.
#[derive(Debug, Default)]
pub struct LinksTag;

impl TagProcessor for LinksTag {
	fn signature(&self) -> TagSignature {
		TagSignature::new()
			.param(ParamSpec::optional("lookup", Value::String("children".into())))
			.param(ParamSpec::optional("dir", Value::Null))
			.param(ParamSpec::optional("prefix", Value::Null))
			.default_param("dir")
	}

	fn process(&self, call: &TagCall<'_>, ctx: &mut RenderContext<'_>) -> WebgenResult<TagOutput> {
		let (Some(dest), Some(content_node)) = (ctx.dest_node().cloned(), ctx.content_node().cloned())
		else {
			return Err(WebgenError::TagProcessing {
				tag: call.tag.to_string(),
				reason: "no artifact is being rendered".to_string(),
			});
		};
		let website = ctx.website();

		let nodes = if let Some(prefix) = call.params.str("prefix") {
			let options = serde_json::json!({ "prefix": prefix });
			ctx.track(TrackedItem::node_finder(
				&options,
				content_node.clone(),
				TrackingMode::MetaInfo,
			));
			website.find_nodes(&options, &content_node)?
		} else {
			let lookup = call
				.params
				.str("lookup")
				.unwrap_or_else(|| "children".to_string());
			let dir = call.params.str("dir").unwrap_or_else(|| "./".to_string());
			let options = serde_json::json!({ "dir": content_node.join(&dir) });
			ctx.track(TrackedItem::nodes(
				lookup.clone(),
				&options,
				TrackingMode::MetaInfo,
			));
			website.lookup_nodes(&lookup, &options)?
		};

		let links: Vec<String> = nodes
			.flatten()
			.into_iter()
			.map(|node| {
				let title = website
					.meta_info(node)
					.and_then(|meta_info| {
						meta_info
							.get("title")
							.and_then(Value::as_str)
							.map(ToString::to_string)
					})
					.unwrap_or_else(|| node.to_string());
				format!("<a href=\"{}\">{title}</a>", website.url_for(&dest, node))
			})
			.collect();

		Ok(TagOutput::new(links.join("\n")))
	}
}
