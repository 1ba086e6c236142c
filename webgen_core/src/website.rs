use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use derive_more::Deref;
use serde::Deserialize;
use serde::Serialize;

use crate::WebgenResult;

/// Meta information attached to an artifact, e.g. `title` or `template`.
pub type MetaInfo = BTreeMap<String, serde_json::Value>;

/// The absolute canonical name of a rendered artifact, e.g. `/about/index.html`.
#[derive(
	Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Deref,
)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
	pub fn new(name: impl Into<String>) -> Self {
		Self(name.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Resolve `path` against this artifact. Absolute paths are normalized,
	/// relative ones are taken relative to the directory containing this
	/// artifact. `.` and `..` segments are collapsed; `..` never climbs above
	/// the root.
	pub fn join(&self, path: &str) -> String {
		let mut segments: Vec<&str> = if path.starts_with('/') {
			Vec::new()
		} else {
			let mut parent: Vec<&str> = self.0.split('/').filter(|s| !s.is_empty()).collect();
			parent.pop();
			parent
		};

		for segment in path.split('/') {
			match segment {
				"" | "." => {}
				".." => {
					segments.pop();
				}
				other => segments.push(other),
			}
		}

		let mut joined = String::from("/");
		joined.push_str(&segments.join("/"));
		if path.ends_with('/') && joined.len() > 1 {
			joined.push('/');
		}
		joined
	}

	/// The path of `self` relative to the directory containing `from`, e.g.
	/// `../blog/post.html` from `/about/index.html` to `/blog/post.html`.
	pub fn relative_from(&self, from: &ArtifactId) -> String {
		let from_segments: Vec<&str> = from.0.split('/').filter(|s| !s.is_empty()).collect();
		let to_segments: Vec<&str> = self.0.split('/').filter(|s| !s.is_empty()).collect();
		let from_dir = &from_segments[..from_segments.len().saturating_sub(1)];
		let to_dir_len = to_segments.len().saturating_sub(1);

		let common = from_dir
			.iter()
			.zip(&to_segments[..to_dir_len])
			.take_while(|(a, b)| a == b)
			.count();

		let mut parts: Vec<&str> = vec![".."; from_dir.len() - common];
		parts.extend_from_slice(&to_segments[common..]);
		let mut route = parts.join("/");
		if self.0.ends_with('/') && !route.is_empty() {
			route.push('/');
		}
		if route.is_empty() {
			route.push_str("./");
		}
		route
	}
}

impl fmt::Display for ArtifactId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for ArtifactId {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

impl From<String> for ArtifactId {
	fn from(value: String) -> Self {
		Self(value)
	}
}

/// A possibly nested list of artifacts as returned by node lookups, e.g. a
/// menu where sub-lists hold the children of the preceding entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeList {
	Node(ArtifactId),
	List(Vec<NodeList>),
}

impl NodeList {
	pub fn empty() -> Self {
		Self::List(Vec::new())
	}

	/// All artifacts in depth-first order.
	pub fn flatten(&self) -> Vec<&ArtifactId> {
		let mut nodes = Vec::new();
		self.collect_into(&mut nodes);
		nodes
	}

	fn collect_into<'a>(&'a self, nodes: &mut Vec<&'a ArtifactId>) {
		match self {
			Self::Node(node) => nodes.push(node),
			Self::List(items) => {
				for item in items {
					item.collect_into(nodes);
				}
			}
		}
	}
}

impl Default for NodeList {
	fn default() -> Self {
		Self::empty()
	}
}

impl From<Vec<ArtifactId>> for NodeList {
	fn from(nodes: Vec<ArtifactId>) -> Self {
		Self::List(nodes.into_iter().map(NodeList::Node).collect())
	}
}

/// What to watch on every artifact of a node list besides the list itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
	Content,
	MetaInfo,
}

/// An option bag in canonical JSON form so that it can take part in item
/// identities. Object keys are sorted recursively, so two bags with the same
/// entries always compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionBag(String);

impl OptionBag {
	pub fn new(value: &serde_json::Value) -> Self {
		Self(canonicalize(value).to_string())
	}

	/// The option bag as a JSON value. A bag always holds valid JSON, the
	/// fallback only guards against hand-edited caches.
	pub fn value(&self) -> serde_json::Value {
		serde_json::from_str(&self.0).unwrap_or(serde_json::Value::Null)
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl Default for OptionBag {
	fn default() -> Self {
		Self::new(&serde_json::Value::Object(serde_json::Map::new()))
	}
}

fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
	match value {
		serde_json::Value::Object(map) => {
			let sorted: BTreeMap<&String, serde_json::Value> = map
				.iter()
				.map(|(key, value)| (key, canonicalize(value)))
				.collect();
			serde_json::Value::Object(
				sorted
					.into_iter()
					.map(|(key, value)| (key.clone(), value))
					.collect(),
			)
		}
		serde_json::Value::Array(items) => {
			serde_json::Value::Array(items.iter().map(canonicalize).collect())
		}
		other => other.clone(),
	}
}

/// The website being rendered, as seen by tag processors and tracked items.
///
/// Implementations own the artifact tree; this crate only queries it. Every
/// method must answer for artifacts that no longer exist without panicking.
pub trait Website {
	/// Directory that relative file paths (`include_file`, `execute_cmd`) are
	/// resolved against.
	fn root(&self) -> &Path;

	fn contains(&self, node: &ArtifactId) -> bool;

	fn meta_info(&self, node: &ArtifactId) -> Option<MetaInfo>;

	/// Resolve an absolute artifact path, optionally in a specific language.
	fn resolve(&self, path: &str, lang: Option<&str>) -> Option<ArtifactId>;

	/// Ancestor templates of `node`, outermost first. `None` if the node is
	/// gone.
	fn template_chain(&self, node: &ArtifactId) -> Option<Vec<ArtifactId>>;

	/// Run the named lookup, e.g. `children`, with its option bag.
	fn lookup_nodes(&self, lookup: &str, options: &serde_json::Value) -> WebgenResult<NodeList>;

	/// Find all artifacts matching an option set, relative to `reference`.
	fn find_nodes(
		&self,
		options: &serde_json::Value,
		reference: &ArtifactId,
	) -> WebgenResult<NodeList>;

	/// URL of `to` as seen from the output location of `from`.
	fn url_for(&self, from: &ArtifactId, to: &ArtifactId) -> String;
}
