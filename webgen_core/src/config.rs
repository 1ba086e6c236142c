use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::WebgenError;
use crate::WebgenResult;

/// Default limit for rescanning tag output, see
/// [`TagOptions::max_reprocess_depth`](crate::TagOptions::max_reprocess_depth).
pub const DEFAULT_MAX_REPROCESS_DEPTH: usize = 64;

/// Default location of the tracker cache, relative to the site root.
pub const DEFAULT_CACHE_PATH: &str = ".webgen/cache/tracker-v1.json";

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] =
	["webgen.toml", ".webgen.toml", ".config/webgen.toml"];

/// Configuration loaded from a `webgen.toml` file.
///
/// ```toml
/// [tags]
/// prefix = ""
/// max_reprocess_depth = 64
///
/// [cache]
/// path = ".webgen/cache/tracker-v1.json"
///
/// [source]
/// dir = "src"
/// out = "out"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct WebgenConfig {
	#[serde(default)]
	pub tags: TagsConfig,
	#[serde(default)]
	pub cache: CacheConfig,
	#[serde(default)]
	pub source: SourceConfig,
}

/// Tag syntax settings.
#[derive(Debug, Deserialize)]
pub struct TagsConfig {
	/// Text required between the opening `{` and the tag name. Empty by
	/// default, so `{date: }` is a tag. With `prefix = "wg:"` only
	/// `{wg:date: }` is.
	#[serde(default)]
	pub prefix: String,
	/// How often tag output may be rescanned for further tags.
	#[serde(default = "default_max_reprocess_depth")]
	pub max_reprocess_depth: usize,
}

impl Default for TagsConfig {
	fn default() -> Self {
		Self {
			prefix: String::new(),
			max_reprocess_depth: DEFAULT_MAX_REPROCESS_DEPTH,
		}
	}
}

fn default_max_reprocess_depth() -> usize {
	DEFAULT_MAX_REPROCESS_DEPTH
}

/// Where tracked item state is persisted between runs.
#[derive(Debug, Deserialize)]
pub struct CacheConfig {
	#[serde(default = "default_cache_path")]
	pub path: PathBuf,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			path: default_cache_path(),
		}
	}
}

fn default_cache_path() -> PathBuf {
	PathBuf::from(DEFAULT_CACHE_PATH)
}

/// Source and output directories, relative to the site root.
#[derive(Debug, Deserialize)]
pub struct SourceConfig {
	#[serde(default = "default_source_dir")]
	pub dir: PathBuf,
	#[serde(default = "default_out_dir")]
	pub out: PathBuf,
}

impl Default for SourceConfig {
	fn default() -> Self {
		Self {
			dir: default_source_dir(),
			out: default_out_dir(),
		}
	}
}

fn default_source_dir() -> PathBuf {
	PathBuf::from("src")
}

fn default_out_dir() -> PathBuf {
	PathBuf::from("out")
}

impl WebgenConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if there is no config file.
	pub fn load(root: &Path) -> WebgenResult<Option<WebgenConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path)?;
		let config = Self::parse(&content)?;
		tracing::debug!(path = %config_path.display(), "loaded config");

		Ok(Some(config))
	}

	pub fn parse(content: &str) -> WebgenResult<WebgenConfig> {
		toml::from_str(content).map_err(|e| WebgenError::ConfigParse(e.to_string()))
	}

	/// Absolute path of the tracker cache for the site at `root`.
	pub fn cache_path(&self, root: &Path) -> PathBuf {
		root.join(&self.cache.path)
	}
}
