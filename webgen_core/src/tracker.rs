use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::HashSet;

use crate::ArtifactId;
use crate::CachedItem;
use crate::ItemState;
use crate::TrackedItem;
use crate::TrackerCache;
use crate::TrackingMode;
use crate::Website;

/// Whether missing-node items may still report changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchState {
	/// Missing nodes are reported as changed while they are missing.
	Reporting,
	/// A generation pass created no artifacts, so a missing path will not
	/// appear by regenerating again. Missing nodes report no change.
	Settled,
}

/// Stops paths that never resolve from triggering regeneration forever.
///
/// Transitions:
///
/// - `begin_generation`: any state → `Reporting`
/// - `begin_pass`: forget whether artifacts were created
/// - `artifact_created`: remember that the current pass created one
/// - `end_pass`: `Reporting` → `Settled` if the pass created no artifact
#[derive(Debug, Clone)]
pub struct ConvergenceLatch {
	state: LatchState,
	created_in_pass: bool,
}

impl Default for ConvergenceLatch {
	fn default() -> Self {
		Self {
			state: LatchState::Reporting,
			created_in_pass: true,
		}
	}
}

impl ConvergenceLatch {
	pub fn state(&self) -> LatchState {
		self.state
	}

	pub fn is_reporting(&self) -> bool {
		self.state == LatchState::Reporting
	}

	pub fn begin_generation(&mut self) {
		self.state = LatchState::Reporting;
		self.created_in_pass = true;
	}

	pub fn begin_pass(&mut self) {
		self.created_in_pass = false;
	}

	pub fn artifact_created(&mut self) {
		self.created_in_pass = true;
	}

	pub fn end_pass(&mut self) {
		if !self.created_in_pass && self.state == LatchState::Reporting {
			tracing::debug!("no artifacts created during pass, missing nodes settled");
			self.state = LatchState::Settled;
		}
	}
}

/// Which run's data an owner's dependencies were recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Snapshot {
	Previous,
	Current,
}

/// What an owner's dependencies are compared against: the run they were
/// recorded in and the owner's position in the render order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Baseline {
	snapshot: Snapshot,
	rendered_at: Option<u64>,
}

#[derive(Debug, Clone, Default)]
struct DependencyData {
	dependencies: BTreeMap<ArtifactId, BTreeSet<TrackedItem>>,
	items: HashMap<TrackedItem, ItemState>,
}

/// Records which items each rendered artifact depends on and answers whether
/// any of them changed since.
///
/// Data recorded in earlier runs is loaded with [`ItemTracker::from_cache`].
/// An artifact rendered during the current run is checked against what it
/// registered in this run, every other artifact against the previous run.
/// An artifact rendered after an artifact depending on its content counts
/// as changed for that dependent, unless they depend on each other's
/// content.
#[derive(Debug, Default)]
pub struct ItemTracker {
	previous: DependencyData,
	current: DependencyData,
	/// Position of each artifact in the render order, across runs.
	render_order: HashMap<ArtifactId, u64>,
	last_position: u64,
	/// The last position handed out before this run started.
	run_start: u64,
	item_results: HashMap<(Baseline, TrackedItem), bool>,
	node_results: HashMap<ArtifactId, bool>,
	checking: HashSet<ArtifactId>,
	latch: ConvergenceLatch,
}

impl ItemTracker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Start from the data persisted by an earlier run.
	pub fn from_cache(cache: TrackerCache) -> Self {
		let dependencies = cache
			.dependencies
			.into_iter()
			.map(|(owner, items)| (owner, items.into_iter().collect()))
			.collect();
		let items = cache
			.items
			.into_iter()
			.map(|cached| (cached.item, cached.state))
			.collect();

		let run_start = cache.render_order.values().copied().max().unwrap_or_default();

		Self {
			previous: DependencyData {
				dependencies,
				items,
			},
			render_order: cache.render_order.into_iter().collect(),
			last_position: run_start,
			run_start,
			..Self::default()
		}
	}

	/// The data to persist: this run's registrations merged over the
	/// previous run's.
	pub fn to_cache(&self) -> TrackerCache {
		let merged = self.merged();
		let mut items: Vec<CachedItem> = merged
			.items
			.into_iter()
			.map(|(item, state)| CachedItem { item, state })
			.collect();
		items.sort_by(|a, b| a.item.cmp(&b.item));

		TrackerCache {
			dependencies: merged
				.dependencies
				.into_iter()
				.map(|(owner, items)| (owner, items.into_iter().collect()))
				.collect(),
			items,
			render_order: self
				.render_order
				.iter()
				.map(|(owner, &position)| (owner.clone(), position))
				.collect(),
			..TrackerCache::default()
		}
	}

	/// Make this run's registrations the baseline, as if the tracker had been
	/// saved and loaded again.
	pub fn commit(&mut self) {
		self.previous = self.merged();
		self.current = DependencyData::default();
		self.run_start = self.last_position;
		self.clear_results();
	}

	fn merged(&self) -> DependencyData {
		let mut merged = self.previous.clone();
		for (owner, items) in &self.current.dependencies {
			merged.dependencies.insert(owner.clone(), items.clone());
		}
		for (item, state) in &self.current.items {
			merged.items.insert(item.clone(), state.clone());
		}
		merged
	}

	/// Record that `owner` depends on `item`. The item's state is captured
	/// the first time it is registered in this run.
	pub fn register(&mut self, owner: &ArtifactId, item: TrackedItem, website: &dyn Website) {
		tracing::trace!(%owner, %item, "registering tracked item");
		if !self.current.dependencies.contains_key(owner) {
			self.last_position += 1;
			self.render_order.insert(owner.clone(), self.last_position);
		}
		self.current
			.dependencies
			.entry(owner.clone())
			.or_default()
			.insert(item.clone());
		self.node_results.clear();

		if self.current.items.contains_key(&item) {
			return;
		}

		let state = item.current_state(website);
		if let (Some(TrackingMode::MetaInfo), ItemState::NodeList(nodes)) =
			(item.tracking_mode(), &state)
		{
			for node in nodes.flatten() {
				self.capture(TrackedItem::node_meta_info(node.clone(), None), website);
			}
		}
		self.current.items.insert(item, state);
		self.item_results.clear();
	}

	fn capture(&mut self, item: TrackedItem, website: &dyn Website) {
		if !self.current.items.contains_key(&item) {
			let state = item.current_state(website);
			self.current.items.insert(item, state);
		}
	}

	/// Forget what `owner` registered in this run, before rendering it again.
	pub fn reset_dependencies(&mut self, owner: &ArtifactId) {
		self.current.dependencies.remove(owner);
		self.node_results.clear();
	}

	fn baseline_of(&self, owner: &ArtifactId) -> Option<Baseline> {
		let snapshot = if self.current.dependencies.contains_key(owner) {
			Snapshot::Current
		} else if self.previous.dependencies.contains_key(owner) {
			Snapshot::Previous
		} else {
			return None;
		};

		Some(Baseline {
			snapshot,
			rendered_at: self.render_order.get(owner).copied(),
		})
	}

	/// Whether `node` was rendered after the owner of `baseline`, so the
	/// owner saw an older version of it. Without a known owner position,
	/// any rendering in this run counts.
	fn rendered_after(&self, node: &ArtifactId, baseline: Baseline) -> bool {
		let Some(&rendered) = self.render_order.get(node) else {
			return false;
		};
		rendered > baseline.rendered_at.unwrap_or(self.run_start)
	}

	/// Whether the latest dependencies of `node` include the content of
	/// `other`.
	fn depends_on_content_of(&self, node: &ArtifactId, other: &ArtifactId) -> bool {
		self.dependencies(node).into_iter().any(|item| {
			match item {
				TrackedItem::NodeContent { node } => node == other,
				_ => {
					item.tracking_mode() == Some(TrackingMode::Content)
						&& self.referenced_artifacts(item).contains(other)
				}
			}
		})
	}

	fn snapshot(&self, snapshot: Snapshot) -> &DependencyData {
		match snapshot {
			Snapshot::Previous => &self.previous,
			Snapshot::Current => &self.current,
		}
	}

	/// Whether `owner` has any recorded dependencies at all.
	pub fn has_dependencies(&self, owner: &ArtifactId) -> bool {
		self.baseline_of(owner).is_some()
	}

	/// The items `owner` depends on, from this run if it was rendered in it.
	pub fn dependencies(&self, owner: &ArtifactId) -> Vec<&TrackedItem> {
		self.baseline_of(owner)
			.and_then(|baseline| self.snapshot(baseline.snapshot).dependencies.get(owner))
			.map(|items| items.iter().collect())
			.unwrap_or_default()
	}

	/// Whether any item `owner` depends on changed. Stops at the first
	/// changed item. An artifact without recorded dependencies is reported
	/// unchanged; the caller decides whether it needs rendering at all.
	pub fn has_any_changed(&mut self, owner: &ArtifactId, website: &dyn Website) -> bool {
		self.begin_check();
		if let Some(&changed) = self.node_results.get(owner) {
			return changed;
		}

		let Some(baseline) = self.baseline_of(owner) else {
			tracing::debug!(%owner, "no recorded dependencies");
			return false;
		};

		if !self.checking.insert(owner.clone()) {
			tracing::trace!(%owner, "dependency cycle, treating artifact as unchanged");
			return false;
		}

		let items: Vec<TrackedItem> = self
			.snapshot(baseline.snapshot)
			.dependencies
			.get(owner)
			.map(|items| items.iter().cloned().collect())
			.unwrap_or_default();
		let changed = items
			.iter()
			.any(|item| self.item_changed_in(baseline, Some(owner), item, website));

		self.checking.remove(owner);
		// A negative answer reached while another artifact is still being
		// checked may rest on the cycle assumption above.
		if changed || self.checking.is_empty() {
			self.node_results.insert(owner.clone(), changed);
		}

		tracing::debug!(%owner, changed, "checked artifact dependencies");
		changed
	}

	/// Whether `item` changed since it was recorded, preferring the previous
	/// run's state.
	pub fn item_changed(&mut self, item: &TrackedItem, website: &dyn Website) -> bool {
		self.begin_check();
		let snapshot = if self.previous.items.contains_key(item) {
			Snapshot::Previous
		} else {
			Snapshot::Current
		};
		let baseline = Baseline {
			snapshot,
			rendered_at: None,
		};
		self.item_changed_in(baseline, None, item, website)
	}

	/// Results are only reused within one top-level check, the site may
	/// change between two of them.
	fn begin_check(&mut self) {
		if self.checking.is_empty() {
			self.item_results.clear();
			self.node_results.clear();
		}
	}

	fn item_changed_in(
		&mut self,
		baseline: Baseline,
		owner: Option<&ArtifactId>,
		item: &TrackedItem,
		website: &dyn Website,
	) -> bool {
		let key = (baseline, item.clone());
		if let Some(&changed) = self.item_results.get(&key) {
			return changed;
		}

		let Some(stored) = self.snapshot(baseline.snapshot).items.get(item).cloned() else {
			tracing::debug!(%item, "no stored state, treating item as changed");
			return true;
		};

		let changed = {
			let mut check = ChangeCheck {
				tracker: self,
				website,
				baseline,
				owner,
			};
			item.has_changed(&stored, &mut check)
		};

		if changed {
			tracing::debug!(%item, "tracked item changed");
		}
		self.item_results.insert(key, changed);
		changed
	}

	fn stored_state(&self, item: &TrackedItem) -> Option<&ItemState> {
		self.current
			.items
			.get(item)
			.or_else(|| self.previous.items.get(item))
	}

	/// The artifacts `item` points to, based on its latest stored state.
	pub fn referenced_artifacts(&self, item: &TrackedItem) -> BTreeSet<ArtifactId> {
		self.stored_state(item)
			.map(|state| item.referenced_artifacts(state))
			.unwrap_or_default()
	}

	/// All artifacts referenced by the items `owner` depends on.
	pub fn artifact_references(&self, owner: &ArtifactId) -> BTreeSet<ArtifactId> {
		self.dependencies(owner)
			.into_iter()
			.flat_map(|item| self.referenced_artifacts(item))
			.collect()
	}

	fn owners(&self) -> BTreeSet<&ArtifactId> {
		self.current
			.dependencies
			.keys()
			.chain(self.previous.dependencies.keys())
			.collect()
	}

	/// Every artifact that depends on `item`, e.g. all pages including a file.
	pub fn dependents_of(&self, item: &TrackedItem) -> BTreeSet<ArtifactId> {
		self.owners()
			.into_iter()
			.filter(|owner| self.dependencies(owner).contains(&item))
			.cloned()
			.collect()
	}

	/// Every artifact with a tracked item referencing `node`.
	pub fn dependents_of_artifact(&self, node: &ArtifactId) -> BTreeSet<ArtifactId> {
		self.owners()
			.into_iter()
			.filter(|owner| self.artifact_references(owner).contains(node))
			.cloned()
			.collect()
	}

	pub fn latch(&self) -> &ConvergenceLatch {
		&self.latch
	}

	/// Start a top-level generation: missing nodes report changes again.
	pub fn begin_generation(&mut self) {
		self.latch.begin_generation();
		self.clear_results();
	}

	/// Start a generation pass over all artifacts.
	pub fn begin_pass(&mut self) {
		self.latch.begin_pass();
		self.clear_results();
	}

	/// An artifact was created during the current pass.
	pub fn artifact_created(&mut self) {
		self.latch.artifact_created();
	}

	pub fn end_pass(&mut self) {
		self.latch.end_pass();
	}

	fn clear_results(&mut self) {
		self.item_results.clear();
		self.node_results.clear();
		self.checking.clear();
	}
}

/// Access to the tracker while one item is compared with its stored state.
pub struct ChangeCheck<'a> {
	tracker: &'a mut ItemTracker,
	website: &'a dyn Website,
	baseline: Baseline,
	owner: Option<&'a ArtifactId>,
}

impl<'a> ChangeCheck<'a> {
	pub fn website(&self) -> &'a dyn Website {
		self.website
	}

	/// Whether the content of `node` changed: it was regenerated after the
	/// artifact being checked was rendered, or any of its dependencies
	/// changed.
	pub fn node_changed(&mut self, node: &ArtifactId) -> bool {
		let in_cycle = self
			.owner
			.is_some_and(|owner| self.tracker.depends_on_content_of(node, owner));
		if !in_cycle && self.tracker.rendered_after(node, self.baseline) {
			tracing::debug!(%node, "artifact was rendered after its dependent");
			return true;
		}
		self.tracker.has_any_changed(node, self.website)
	}

	/// Whether the meta information of `node` changed, compared with the
	/// snapshot taken alongside the item being checked.
	pub fn meta_info_changed(&mut self, node: &ArtifactId) -> bool {
		let item = TrackedItem::node_meta_info(node.clone(), None);
		self.tracker
			.item_changed_in(self.baseline, self.owner, &item, self.website)
	}

	pub fn reports_missing_nodes(&self) -> bool {
		self.tracker.latch.is_reporting()
	}
}
