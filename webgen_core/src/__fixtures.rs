use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::SystemTime;

use serde_json::Value;
use serde_json::json;

use crate::*;

/// An in-memory website. Every field can be changed between renders to
/// simulate edits to the site.
#[derive(Debug, Default)]
pub(crate) struct FakeWebsite {
	pub root: PathBuf,
	pub nodes: BTreeMap<ArtifactId, MetaInfo>,
	pub templates: BTreeMap<ArtifactId, Vec<ArtifactId>>,
	pub lookups: BTreeMap<String, NodeList>,
	pub finder_results: BTreeMap<OptionBag, NodeList>,
}

impl FakeWebsite {
	pub fn new(root: &Path) -> Self {
		Self {
			root: root.to_path_buf(),
			..Self::default()
		}
	}

	pub fn with_node(mut self, node: &str, meta_info: Value) -> Self {
		self.insert_node(node, meta_info);
		self
	}

	pub fn insert_node(&mut self, node: &str, meta_info: Value) {
		let meta_info = match meta_info {
			Value::Object(map) => map.into_iter().collect(),
			_ => MetaInfo::new(),
		};
		self.nodes.insert(ArtifactId::new(node), meta_info);
	}

	pub fn set_meta(&mut self, node: &str, key: &str, value: Value) {
		self.nodes
			.entry(ArtifactId::new(node))
			.or_default()
			.insert(key.to_string(), value);
	}

	pub fn remove_node(&mut self, node: &str) {
		self.nodes.remove(&ArtifactId::new(node));
	}

	pub fn set_lookup(&mut self, lookup: &str, nodes: &[&str]) {
		self.lookups.insert(lookup.to_string(), node_list(nodes));
	}

	pub fn set_finder(&mut self, options: &Value, nodes: &[&str]) {
		self.finder_results
			.insert(OptionBag::new(options), node_list(nodes));
	}

	pub fn set_templates(&mut self, node: &str, chain: &[&str]) {
		self.templates.insert(
			ArtifactId::new(node),
			chain.iter().copied().map(ArtifactId::new).collect(),
		);
	}
}

impl Website for FakeWebsite {
	fn root(&self) -> &Path {
		&self.root
	}

	fn contains(&self, node: &ArtifactId) -> bool {
		self.nodes.contains_key(node)
	}

	fn meta_info(&self, node: &ArtifactId) -> Option<MetaInfo> {
		self.nodes.get(node).cloned()
	}

	fn resolve(&self, path: &str, lang: Option<&str>) -> Option<ArtifactId> {
		if let Some(lang) = lang {
			let localized = ArtifactId::new(format!("{path}.{lang}"));
			if self.nodes.contains_key(&localized) {
				return Some(localized);
			}
		}

		let node = ArtifactId::new(path);
		self.nodes.contains_key(&node).then_some(node)
	}

	fn template_chain(&self, node: &ArtifactId) -> Option<Vec<ArtifactId>> {
		if !self.contains(node) {
			return None;
		}
		Some(self.templates.get(node).cloned().unwrap_or_default())
	}

	fn lookup_nodes(&self, lookup: &str, _options: &Value) -> WebgenResult<NodeList> {
		self.lookups
			.get(lookup)
			.cloned()
			.ok_or_else(|| WebgenError::NodeLookup {
				lookup: lookup.to_string(),
				reason: "unknown lookup".to_string(),
			})
	}

	fn find_nodes(&self, options: &Value, _reference: &ArtifactId) -> WebgenResult<NodeList> {
		Ok(self
			.finder_results
			.get(&OptionBag::new(options))
			.cloned()
			.unwrap_or_default())
	}

	fn url_for(&self, from: &ArtifactId, to: &ArtifactId) -> String {
		to.relative_from(from)
	}
}

pub(crate) fn node_list(nodes: &[&str]) -> NodeList {
	NodeList::from(nodes.iter().copied().map(ArtifactId::new).collect::<Vec<_>>())
}

pub(crate) fn page_site(root: &Path) -> FakeWebsite {
	FakeWebsite::new(root)
		.with_node("/index.html", json!({ "title": "Home", "order": 1 }))
		.with_node("/about/index.html", json!({ "title": "About" }))
		.with_node("/blog/post.html", json!({ "title": "Post", "tags": ["a", "b"] }))
}

pub(crate) fn write_file(root: &Path, name: &str, content: &str) -> PathBuf {
	let path = root.join(name);
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("create dir: {e}"));
	}
	std::fs::write(&path, content).unwrap_or_else(|e| panic!("write {name}: {e}"));
	path
}

/// Move the modification time of `path` a minute into the future.
pub(crate) fn touch_later(path: &Path) {
	let file = std::fs::File::options()
		.write(true)
		.open(path)
		.unwrap_or_else(|e| panic!("open {}: {e}", path.display()));
	file.set_modified(SystemTime::now() + Duration::from_secs(60))
		.unwrap_or_else(|e| panic!("set mtime: {e}"));
}

pub(crate) fn artifact(name: &str) -> ArtifactId {
	ArtifactId::new(name)
}

/// One call seen by a [`RecordingTag`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedCall {
	pub tag: String,
	pub params: TagParams,
	pub body: String,
}

/// Records every call and answers with a fixed output.
#[derive(Debug)]
pub(crate) struct RecordingTag {
	pub signature: TagSignature,
	pub output: TagOutput,
	pub calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingTag {
	pub fn new(output: TagOutput) -> Self {
		Self {
			signature: TagSignature::new()
				.param(ParamSpec::optional("value", Value::Null))
				.default_param("value"),
			output,
			calls: Mutex::new(Vec::new()),
		}
	}

	pub fn calls(&self) -> Vec<RecordedCall> {
		self.calls
			.lock()
			.unwrap_or_else(|e| panic!("poisoned: {e}"))
			.clone()
	}
}

impl TagProcessor for RecordingTag {
	fn signature(&self) -> TagSignature {
		self.signature.clone()
	}

	fn process(&self, call: &TagCall<'_>, _ctx: &mut RenderContext<'_>) -> WebgenResult<TagOutput> {
		self.calls
			.lock()
			.unwrap_or_else(|e| panic!("poisoned: {e}"))
			.push(RecordedCall {
				tag: call.tag.to_string(),
				params: call.params.clone(),
				body: call.body.to_string(),
			});
		Ok(self.output.clone())
	}
}

/// Always asks for its own tag to be processed again.
#[derive(Debug, Default)]
pub(crate) struct LoopingTag {
	pub calls: AtomicUsize,
}

impl LoopingTag {
	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

impl TagProcessor for LoopingTag {
	fn signature(&self) -> TagSignature {
		TagSignature::new()
	}

	fn process(&self, _call: &TagCall<'_>, _ctx: &mut RenderContext<'_>) -> WebgenResult<TagOutput> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		Ok(TagOutput::reprocessed("{loop: }"))
	}
}

#[derive(Debug, Default)]
pub(crate) struct FailingTag;

impl TagProcessor for FailingTag {
	fn signature(&self) -> TagSignature {
		TagSignature::new()
	}

	fn process(&self, call: &TagCall<'_>, _ctx: &mut RenderContext<'_>) -> WebgenResult<TagOutput> {
		Err(WebgenError::TagProcessing {
			tag: call.tag.to_string(),
			reason: "always fails".to_string(),
		})
	}
}

/// Tracks a fixed item and prints nothing.
#[derive(Debug)]
pub(crate) struct TrackingTag(pub TrackedItem);

impl TagProcessor for TrackingTag {
	fn signature(&self) -> TagSignature {
		TagSignature::new()
	}

	fn process(&self, _call: &TagCall<'_>, ctx: &mut RenderContext<'_>) -> WebgenResult<TagOutput> {
		ctx.track(self.0.clone());
		Ok(TagOutput::default())
	}
}
