//! `webgen_core` is the rendering core of the webgen static site generator.
//! It expands the tags embedded in page content and tracks what every
//! generated page depends on, so a later run only regenerates what changed.
//!
//! ## Tag Syntax
//!
//! ```text
//! {name: params}              simple tag
//! {name:: params}body{name}   body tag
//! \{name: params}             escaped, printed as `{name: params}`
//! ```
//!
//! Parameters are YAML: either a mapping (`{include_file: {filename: a.txt}}`)
//! or a single value for the processor's default parameter
//! (`{include_file: a.txt}`). Curly braces inside parameters must balance.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Page content
//!   → TagScanner (finds tag occurrences, handles escaping and nesting)
//!   → TagRegistry (tag name → processor, falling back to `default`)
//!   → TagProcessor (parameters + body → replacement, optionally rescanned)
//!   → RenderContext::track (records tracked items for the page)
//!   → ItemTracker (next run: has anything the page depends on changed?)
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading from `webgen.toml`.
//! - [`builtin`]: The `meta_info`, `include_file`, `relocatable` and
//!   `execute_cmd` processors.
//!
//! ## Key Types
//!
//! - [`TagScanner`]: Finds and replaces tags in a text buffer.
//! - [`TagEngine`]: Expands tags with the processors of a [`TagRegistry`].
//! - [`TagProcessor`]: Implemented by everything that expands a tag.
//! - [`ItemTracker`]: Records dependencies and detects changes.
//! - [`TrackedItem`]: One dependency: a file, another page's content or meta
//!   information, a node list, a missing path or a template chain.
//! - [`Website`]: The site being rendered, implemented by the caller.
//!
//! ## Quick Start
//!
//! ```rust
//! use webgen_core::TagScanner;
//!
//! let scanner = TagScanner::default();
//! let output = scanner.replace_tags("Hello {name: }!", |_tag, _params, _body| {
//! 	"world".to_string()
//! });
//! assert_eq!(output, "Hello world!");
//! ```

pub use builtin::builtin_registry;
pub use engine::*;
pub use error::*;
pub use items::*;
pub use processor::*;
pub use registry::*;
pub use scanner::*;
pub use tracker::*;
pub use tracker_cache::*;
pub use website::*;

pub mod builtin;
pub mod config;
mod engine;
#[allow(unused_assignments)]
mod error;
mod items;
mod processor;
mod registry;
mod scanner;
mod tracker;
mod tracker_cache;
mod website;

pub use config::WebgenConfig;

#[cfg(test)]
mod __fixtures;
