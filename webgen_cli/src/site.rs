//! A website read from a source directory.
//!
//! Every file below the source directory is an artifact named by its path,
//! e.g. `src/blog/post.html` is `/blog/post.html`. Text files may start with
//! YAML front matter, which becomes the artifact's meta information:
//!
//! ```text
//! ---
//! title: First post
//! template: ../default.template
//! ---
//! <h1>{title:}</h1>
//! ```
//!
//! Files ending in `.template` wrap other pages and are not written to the
//! output directory themselves.

use std::collections::BTreeMap;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use ignore::WalkBuilder;
use serde_json::Value;
use webgen_core::ArtifactId;
use webgen_core::MetaInfo;
use webgen_core::NodeList;
use webgen_core::WebgenConfig;
use webgen_core::WebgenError;
use webgen_core::WebgenResult;
use webgen_core::Website;

/// Extension of source files that wrap pages instead of being rendered.
pub const TEMPLATE_EXTENSION: &str = ".template";

/// Meta information key naming the template an artifact is wrapped in.
pub const TEMPLATE_KEY: &str = "template";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceContent {
	/// Text with front matter removed.
	Text(String),
	/// Anything that is not UTF-8, copied verbatim.
	Binary,
}

/// One source file.
#[derive(Debug, Clone)]
pub struct SourceNode {
	/// Path relative to the site root.
	pub source: PathBuf,
	pub meta_info: MetaInfo,
	pub content: SourceContent,
}

#[derive(Debug)]
pub struct FsWebsite {
	root: PathBuf,
	out_dir: PathBuf,
	nodes: BTreeMap<ArtifactId, SourceNode>,
}

impl FsWebsite {
	/// Read every file below the configured source directory. Hidden files
	/// and files excluded by `.ignore`/`.gitignore` files are skipped.
	pub fn load(root: &Path, config: &WebgenConfig) -> WebgenResult<Self> {
		let source_dir = root.join(&config.source.dir);
		let mut nodes = BTreeMap::new();

		if source_dir.is_dir() {
			for entry in WalkBuilder::new(&source_dir)
				.sort_by_file_name(|a, b| a.cmp(b))
				.build()
			{
				let entry = match entry {
					Ok(entry) => entry,
					Err(error) => {
						tracing::warn!(%error, "skipping unreadable source entry");
						continue;
					}
				};
				if !entry.file_type().is_some_and(|kind| kind.is_file()) {
					continue;
				}

				let path = entry.path();
				let Ok(relative) = path.strip_prefix(&source_dir) else {
					continue;
				};
				let name = artifact_name(relative);
				let node = read_source(root, path, &name)?;
				nodes.insert(name, node);
			}
		} else {
			tracing::warn!(dir = %source_dir.display(), "source directory does not exist");
		}

		tracing::debug!(count = nodes.len(), "loaded source files");

		Ok(Self {
			root: root.to_path_buf(),
			out_dir: root.join(&config.source.out),
			nodes,
		})
	}

	pub fn node(&self, node: &ArtifactId) -> Option<&SourceNode> {
		self.nodes.get(node)
	}

	/// All artifacts that are written to the output directory, sorted.
	pub fn pages(&self) -> impl Iterator<Item = &ArtifactId> {
		self.nodes.keys().filter(|node| is_page(node))
	}

	pub fn out_dir(&self) -> &Path {
		&self.out_dir
	}

	pub fn output_path(&self, node: &ArtifactId) -> PathBuf {
		self.out_dir.join(node.trim_start_matches('/'))
	}

	fn children(&self, dir: &str) -> NodeList {
		let nodes = self
			.pages()
			.filter(|node| {
				node.strip_prefix(dir)
					.is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
			})
			.cloned()
			.collect::<Vec<_>>();
		NodeList::from(nodes)
	}
}

impl Website for FsWebsite {
	fn root(&self) -> &Path {
		&self.root
	}

	fn contains(&self, node: &ArtifactId) -> bool {
		self.nodes.contains_key(node)
	}

	fn meta_info(&self, node: &ArtifactId) -> Option<MetaInfo> {
		self.nodes.get(node).map(|source| source.meta_info.clone())
	}

	fn resolve(&self, path: &str, lang: Option<&str>) -> Option<ArtifactId> {
		let path = if path.ends_with('/') {
			format!("{path}index.html")
		} else {
			path.to_string()
		};

		if let Some(lang) = lang {
			let localized = ArtifactId::new(localized_name(&path, lang));
			if self.nodes.contains_key(&localized) {
				return Some(localized);
			}
		}

		let node = ArtifactId::new(path);
		self.nodes.contains_key(&node).then_some(node)
	}

	fn template_chain(&self, node: &ArtifactId) -> Option<Vec<ArtifactId>> {
		let mut current = node.clone();
		let mut source = self.nodes.get(node)?;
		let mut chain: Vec<ArtifactId> = Vec::new();

		while let Some(Value::String(template)) = source.meta_info.get(TEMPLATE_KEY) {
			let template = ArtifactId::new(current.join(template));
			if template == *node || chain.contains(&template) {
				tracing::warn!(%node, %template, "template chain loops, stopping");
				break;
			}
			let Some(next) = self.nodes.get(&template) else {
				tracing::warn!(%node, %template, "template does not exist");
				break;
			};

			chain.push(template.clone());
			current = template;
			source = next;
		}

		chain.reverse();
		Some(chain)
	}

	fn lookup_nodes(&self, lookup: &str, options: &Value) -> WebgenResult<NodeList> {
		match lookup {
			"children" => {
				let dir = options.get("dir").and_then(Value::as_str).unwrap_or("/");
				let dir = if dir.ends_with('/') {
					dir.to_string()
				} else {
					format!("{dir}/")
				};
				Ok(self.children(&dir))
			}
			"all" => Ok(NodeList::from(self.pages().cloned().collect::<Vec<_>>())),
			other => {
				Err(WebgenError::NodeLookup {
					lookup: other.to_string(),
					reason: "unknown lookup".to_string(),
				})
			}
		}
	}

	fn find_nodes(&self, options: &Value, reference: &ArtifactId) -> WebgenResult<NodeList> {
		let prefix = options.get("prefix").and_then(Value::as_str).unwrap_or("/");
		let prefix = reference.join(prefix);
		let nodes = self
			.pages()
			.filter(|node| node.starts_with(&prefix))
			.cloned()
			.collect::<Vec<_>>();
		Ok(NodeList::from(nodes))
	}

	fn url_for(&self, from: &ArtifactId, to: &ArtifactId) -> String {
		to.relative_from(from)
	}
}

pub fn is_page(node: &ArtifactId) -> bool {
	!node.ends_with(TEMPLATE_EXTENSION)
}

fn artifact_name(relative: &Path) -> ArtifactId {
	let segments: Vec<String> = relative
		.components()
		.filter_map(|component| {
			match component {
				Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
				_ => None,
			}
		})
		.collect();
	ArtifactId::new(format!("/{}", segments.join("/")))
}

fn read_source(root: &Path, path: &Path, name: &ArtifactId) -> WebgenResult<SourceNode> {
	let source = path.strip_prefix(root).unwrap_or(path).to_path_buf();
	let bytes = std::fs::read(path)?;

	let Ok(text) = String::from_utf8(bytes) else {
		return Ok(SourceNode {
			source,
			meta_info: MetaInfo::new(),
			content: SourceContent::Binary,
		});
	};

	let (meta_info, content) = split_front_matter(name, &text);
	Ok(SourceNode {
		source,
		meta_info,
		content: SourceContent::Text(content),
	})
}

/// Split a leading `---` delimited YAML block off `text`. Malformed front
/// matter is logged and the text is used as is.
pub fn split_front_matter(name: &ArtifactId, text: &str) -> (MetaInfo, String) {
	let Some(rest) = text
		.strip_prefix("---\n")
		.or_else(|| text.strip_prefix("---\r\n"))
	else {
		return (MetaInfo::new(), text.to_string());
	};

	let mut offset = 0;
	for line in rest.split_inclusive('\n') {
		if line.trim_end() == "---" {
			let yaml = &rest[..offset];
			let content = &rest[offset + line.len()..];
			let meta_info = match serde_yaml_ng::from_str::<Option<MetaInfo>>(yaml) {
				Ok(meta_info) => meta_info.unwrap_or_default(),
				Err(error) => {
					tracing::warn!(%name, %error, "ignoring malformed front matter");
					MetaInfo::new()
				}
			};
			return (meta_info, content.to_string());
		}
		offset += line.len();
	}

	tracing::warn!(%name, "front matter is never closed, treating it as content");
	(MetaInfo::new(), text.to_string())
}

/// `/about/index.html` in German is `/about/index.de.html`.
fn localized_name(path: &str, lang: &str) -> String {
	let file_start = path.rfind('/').map_or(0, |slash| slash + 1);
	match path[file_start..].rfind('.') {
		Some(dot) => {
			let dot = file_start + dot;
			format!("{}.{lang}{}", &path[..dot], &path[dot..])
		}
		None => format!("{path}.{lang}"),
	}
}
