use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

use crate::ArtifactId;
use crate::ChangeCheck;
use crate::NodeList;
use crate::OptionBag;
use crate::TrackingMode;
use crate::Website;

/// The kind of a tracked item, which selects how its state is computed and
/// compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ItemKind {
	File,
	NodeContent,
	NodeMetaInfo,
	MissingNode,
	Nodes,
	TemplateChain,
	NodeFinderOptionSet,
}

impl ItemKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::File => "file",
			Self::NodeContent => "node_content",
			Self::NodeMetaInfo => "node_meta_info",
			Self::MissingNode => "missing_node",
			Self::Nodes => "nodes",
			Self::TemplateChain => "template_chain",
			Self::NodeFinderOptionSet => "node_finder_option_set",
		}
	}
}

impl fmt::Display for ItemKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Something a rendered artifact depends on. The value itself is the item's
/// identity: registering an equal item twice refers to the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackedItem {
	/// A file on disk, relative paths are taken relative to the site root.
	File { path: PathBuf },
	/// The rendered content of another artifact.
	NodeContent { node: ArtifactId },
	/// The meta information of an artifact, or a single key of it.
	NodeMetaInfo {
		node: ArtifactId,
		key: Option<String>,
	},
	/// A path that did not resolve to an artifact when it was referenced.
	MissingNode { path: String, lang: Option<String> },
	/// The result of a named node lookup.
	Nodes {
		lookup: String,
		options: OptionBag,
		mode: TrackingMode,
	},
	/// The ordered templates an artifact is wrapped in.
	TemplateChain { node: ArtifactId },
	/// The artifacts matching a node finder option set.
	NodeFinderOptionSet {
		options: OptionBag,
		reference: ArtifactId,
		mode: TrackingMode,
	},
}

/// The snapshot of a tracked item taken when it was registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ItemState {
	/// Modification time in unix milliseconds, `None` if the file is gone.
	Modified(Option<u64>),
	/// Nothing is stored, the item is checked through other items.
	Untracked,
	/// A copy of the meta information, or of one value of it. `Null` if the
	/// artifact is gone or the key is absent.
	MetaInfo(serde_json::Value),
	/// Whether the path was unresolved.
	Missing(bool),
	NodeList(NodeList),
	/// `None` if the artifact is gone.
	TemplateChain(Option<Vec<ArtifactId>>),
}

impl TrackedItem {
	pub fn file(path: impl Into<PathBuf>) -> Self {
		Self::File { path: path.into() }
	}

	pub fn node_content(node: impl Into<ArtifactId>) -> Self {
		Self::NodeContent { node: node.into() }
	}

	pub fn node_meta_info(node: impl Into<ArtifactId>, key: Option<&str>) -> Self {
		Self::NodeMetaInfo {
			node: node.into(),
			key: key.map(ToString::to_string),
		}
	}

	pub fn missing_node(path: impl Into<String>, lang: Option<&str>) -> Self {
		Self::MissingNode {
			path: path.into(),
			lang: lang.map(ToString::to_string),
		}
	}

	pub fn nodes(lookup: impl Into<String>, options: &serde_json::Value, mode: TrackingMode) -> Self {
		Self::Nodes {
			lookup: lookup.into(),
			options: OptionBag::new(options),
			mode,
		}
	}

	pub fn template_chain(node: impl Into<ArtifactId>) -> Self {
		Self::TemplateChain { node: node.into() }
	}

	pub fn node_finder(
		options: &serde_json::Value,
		reference: impl Into<ArtifactId>,
		mode: TrackingMode,
	) -> Self {
		Self::NodeFinderOptionSet {
			options: OptionBag::new(options),
			reference: reference.into(),
			mode,
		}
	}

	pub fn kind(&self) -> ItemKind {
		match self {
			Self::File { .. } => ItemKind::File,
			Self::NodeContent { .. } => ItemKind::NodeContent,
			Self::NodeMetaInfo { .. } => ItemKind::NodeMetaInfo,
			Self::MissingNode { .. } => ItemKind::MissingNode,
			Self::Nodes { .. } => ItemKind::Nodes,
			Self::TemplateChain { .. } => ItemKind::TemplateChain,
			Self::NodeFinderOptionSet { .. } => ItemKind::NodeFinderOptionSet,
		}
	}

	/// The tracking mode of node list items.
	pub fn tracking_mode(&self) -> Option<TrackingMode> {
		match self {
			Self::Nodes { mode, .. } | Self::NodeFinderOptionSet { mode, .. } => Some(*mode),
			_ => None,
		}
	}

	/// Compute the item's state right now. Entities that no longer exist
	/// produce a state that compares as changed, never an error.
	pub fn current_state(&self, website: &dyn Website) -> ItemState {
		match self {
			Self::File { path } => ItemState::Modified(modified_unix_ms(&website.root().join(path))),
			Self::NodeContent { .. } => ItemState::Untracked,
			Self::NodeMetaInfo { node, key } => {
				ItemState::MetaInfo(meta_info_value(website, node, key.as_deref()))
			}
			Self::MissingNode { path, lang } => {
				ItemState::Missing(website.resolve(path, lang.as_deref()).is_none())
			}
			Self::Nodes {
				lookup, options, ..
			} => {
				let nodes = website
					.lookup_nodes(lookup, &options.value())
					.unwrap_or_else(|error| {
						tracing::warn!(lookup, %error, "node lookup failed, tracking an empty list");
						NodeList::empty()
					});
				ItemState::NodeList(nodes)
			}
			Self::TemplateChain { node } => ItemState::TemplateChain(website.template_chain(node)),
			Self::NodeFinderOptionSet {
				options,
				reference,
				..
			} => {
				let nodes = website
					.find_nodes(&options.value(), reference)
					.unwrap_or_else(|error| {
						tracing::warn!(%reference, %error, "node finder failed, tracking an empty list");
						NodeList::empty()
					});
				ItemState::NodeList(nodes)
			}
		}
	}

	/// Whether the item changed compared to `stored`. Checks that depend on
	/// other artifacts go back through the tracker via `check`.
	pub fn has_changed(&self, stored: &ItemState, check: &mut ChangeCheck<'_>) -> bool {
		let website = check.website();
		match self {
			Self::File { .. } => {
				let ItemState::Modified(previous) = stored else {
					return true;
				};
				let ItemState::Modified(current) = self.current_state(website) else {
					return true;
				};
				match (current, previous) {
					(Some(current), Some(previous)) => current > *previous,
					(Some(_), None) | (None, _) => true,
				}
			}
			Self::NodeContent { node } => !website.contains(node) || check.node_changed(node),
			Self::NodeMetaInfo { node, .. } => {
				!website.contains(node) || self.current_state(website) != *stored
			}
			Self::MissingNode { .. } => {
				if !check.reports_missing_nodes() {
					return false;
				}
				let current = self.current_state(website);
				matches!(current, ItemState::Missing(true)) || current != *stored
			}
			Self::Nodes { mode, .. } | Self::NodeFinderOptionSet { mode, .. } => {
				let current = self.current_state(website);
				if current != *stored {
					return true;
				}
				let ItemState::NodeList(nodes) = current else {
					return true;
				};
				nodes.flatten().into_iter().any(|node| {
					match mode {
						TrackingMode::Content => !website.contains(node) || check.node_changed(node),
						TrackingMode::MetaInfo => check.meta_info_changed(node),
					}
				})
			}
			Self::TemplateChain { .. } => {
				match self.current_state(website) {
					ItemState::TemplateChain(None) => true,
					current => current != *stored,
				}
			}
		}
	}

	/// The artifacts this item concretely points to, given its stored state.
	pub fn referenced_artifacts(&self, stored: &ItemState) -> BTreeSet<ArtifactId> {
		match (self, stored) {
			(Self::NodeContent { node } | Self::NodeMetaInfo { node, .. }, _) => {
				BTreeSet::from([node.clone()])
			}
			(
				Self::Nodes { .. } | Self::NodeFinderOptionSet { .. },
				ItemState::NodeList(nodes),
			) => nodes.flatten().into_iter().cloned().collect(),
			(Self::TemplateChain { .. }, ItemState::TemplateChain(Some(chain))) => {
				chain.iter().cloned().collect()
			}
			_ => BTreeSet::new(),
		}
	}
}

impl fmt::Display for TrackedItem {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::File { path } => write!(f, "file {}", path.display()),
			Self::NodeContent { node } => write!(f, "node_content {node}"),
			Self::NodeMetaInfo { node, key: None } => write!(f, "node_meta_info {node}"),
			Self::NodeMetaInfo {
				node,
				key: Some(key),
			} => write!(f, "node_meta_info {node} [{key}]"),
			Self::MissingNode { path, lang: None } => write!(f, "missing_node {path}"),
			Self::MissingNode {
				path,
				lang: Some(lang),
			} => write!(f, "missing_node {path} ({lang})"),
			Self::Nodes {
				lookup,
				options,
				mode,
			} => write!(f, "nodes {lookup} {} ({mode:?})", options.as_str()),
			Self::TemplateChain { node } => write!(f, "template_chain {node}"),
			Self::NodeFinderOptionSet {
				options,
				reference,
				mode,
			} => {
				write!(
					f,
					"node_finder_option_set {} from {reference} ({mode:?})",
					options.as_str()
				)
			}
		}
	}
}

fn meta_info_value(website: &dyn Website, node: &ArtifactId, key: Option<&str>) -> serde_json::Value {
	let Some(meta_info) = website.meta_info(node) else {
		return serde_json::Value::Null;
	};
	match key {
		Some(key) => meta_info.get(key).cloned().unwrap_or(serde_json::Value::Null),
		None => serde_json::Value::Object(meta_info.into_iter().collect()),
	}
}

pub(crate) fn modified_unix_ms(path: &Path) -> Option<u64> {
	std::fs::metadata(path)
		.ok()?
		.modified()
		.ok()?
		.duration_since(UNIX_EPOCH)
		.ok()?
		.as_millis()
		.try_into()
		.ok()
}
