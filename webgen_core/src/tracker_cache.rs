use std::collections::BTreeMap;
use std::path::Path;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

use crate::ArtifactId;
use crate::ItemState;
use crate::TrackedItem;
use crate::WebgenError;
use crate::WebgenResult;

pub(crate) const CACHE_SCHEMA_VERSION: u32 = 2;

/// A tracked item together with its stored state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedItem {
	pub item: TrackedItem,
	pub state: ItemState,
}

/// Tracked item data persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerCache {
	pub schema_version: u32,
	/// The items each artifact depended on when it was last rendered.
	pub dependencies: BTreeMap<ArtifactId, Vec<TrackedItem>>,
	pub items: Vec<CachedItem>,
	/// Position of each artifact in the order artifacts were rendered,
	/// counted across runs.
	#[serde(default)]
	pub render_order: BTreeMap<ArtifactId, u64>,
}

impl Default for TrackerCache {
	fn default() -> Self {
		Self {
			schema_version: CACHE_SCHEMA_VERSION,
			dependencies: BTreeMap::new(),
			items: Vec::new(),
			render_order: BTreeMap::new(),
		}
	}
}

impl TrackerCache {
	/// Load the cache at `path`. A missing, unreadable or outdated cache
	/// yields `None` and everything is treated as never rendered.
	pub fn load(path: &Path) -> Option<TrackerCache> {
		let bytes = std::fs::read(path).ok()?;
		let cache: TrackerCache = match serde_json::from_slice(&bytes) {
			Ok(cache) => cache,
			Err(error) => {
				tracing::warn!(path = %path.display(), %error, "ignoring unreadable tracker cache");
				return None;
			}
		};

		if cache.schema_version != CACHE_SCHEMA_VERSION {
			tracing::debug!(
				found = cache.schema_version,
				expected = CACHE_SCHEMA_VERSION,
				"ignoring tracker cache with another schema version"
			);
			return None;
		}

		Some(cache)
	}

	/// Write the cache to `path`. The file is replaced atomically so a crash
	/// never leaves a truncated cache behind.
	pub fn save(&self, path: &Path) -> WebgenResult<()> {
		if let Some(cache_dir) = path.parent() {
			std::fs::create_dir_all(cache_dir)?;
		}

		let payload =
			serde_json::to_vec_pretty(self).map_err(|e| WebgenError::CachePersist(e.to_string()))?;

		let temp_path = path.with_extension(format!(
			"json.tmp-{}-{}",
			std::process::id(),
			SystemTime::now()
				.duration_since(UNIX_EPOCH)
				.map_or(0, |duration| duration.as_nanos())
		));

		std::fs::write(&temp_path, payload)?;
		if let Err(error) = std::fs::rename(&temp_path, path) {
			let _ = std::fs::remove_file(&temp_path);
			return Err(WebgenError::CachePersist(error.to_string()));
		}

		Ok(())
	}
}
