//! Tag processors available to every site.
//!
//! - `meta_info`: prints a meta information value of the rendered artifact.
//!   It is also the `default` processor, so `{title:}` prints the `title`.
//! - `include_file`: includes a file relative to the site root.
//! - `relocatable`: turns an artifact path into a URL relative to the output.
//! - `execute_cmd`: includes the output of a shell command.

use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use serde_json::Value;

use crate::ParamSpec;
use crate::RenderContext;
use crate::TagCall;
use crate::TagOutput;
use crate::TagProcessor;
use crate::TagRegistry;
use crate::TagSignature;
use crate::TrackedItem;
use crate::WebgenError;
use crate::WebgenResult;

/// A registry with all built-in processors.
pub fn builtin_registry() -> TagRegistry {
	let mut registry = TagRegistry::new();
	let meta_info: Arc<dyn TagProcessor> = Arc::new(MetaInfoTag);
	registry.register(["meta_info"], Arc::clone(&meta_info));
	registry.register_default(meta_info);
	registry.register(["include_file"], Arc::new(IncludeFileTag));
	registry.register(["relocatable"], Arc::new(RelocatableTag));
	registry.register(["execute_cmd"], Arc::new(ExecuteCmdTag));
	registry
}

/// Prints the meta information value named by the tag, or by `key` when
/// invoked as `{meta_info: title}`.
#[derive(Debug, Default)]
pub struct MetaInfoTag;

impl TagProcessor for MetaInfoTag {
	fn signature(&self) -> TagSignature {
		TagSignature::new()
			.param(ParamSpec::optional("key", Value::Null))
			.default_param("key")
	}

	fn process(&self, call: &TagCall<'_>, ctx: &mut RenderContext<'_>) -> WebgenResult<TagOutput> {
		let key = if call.tag == "meta_info" {
			call.params
				.str("key")
				.ok_or_else(|| tag_error(call.tag, "no meta information key given"))?
		} else {
			call.tag.to_string()
		};

		let Some(node) = ctx.content_node().cloned() else {
			return Err(tag_error(call.tag, "no artifact is being rendered"));
		};

		ctx.track(TrackedItem::node_meta_info(node.clone(), Some(&key)));
		let value = ctx
			.website()
			.meta_info(&node)
			.and_then(|meta_info| meta_info.get(&key).cloned());

		let content = match value {
			None | Some(Value::Null) => String::new(),
			Some(Value::String(text)) => text,
			Some(other) => other.to_string(),
		};

		Ok(TagOutput::new(content))
	}
}

/// Includes a file, optionally scanning it for further tags.
#[derive(Debug, Default)]
pub struct IncludeFileTag;

impl TagProcessor for IncludeFileTag {
	fn signature(&self) -> TagSignature {
		TagSignature::new()
			.param(ParamSpec::mandatory("filename"))
			.param(ParamSpec::optional("process_output", Value::Bool(false)))
			.default_param("filename")
	}

	fn process(&self, call: &TagCall<'_>, ctx: &mut RenderContext<'_>) -> WebgenResult<TagOutput> {
		let filename = call
			.params
			.str("filename")
			.ok_or_else(|| tag_error(call.tag, "no filename given"))?;
		let relative = PathBuf::from(&filename);
		ctx.track(TrackedItem::file(relative.clone()));

		let path = ctx.website().root().join(&relative);
		let content = std::fs::read_to_string(&path).map_err(|e| {
			WebgenError::IncludeFile {
				path: filename.clone(),
				reason: e.to_string(),
			}
		})?;

		Ok(TagOutput {
			content,
			reprocess: call.params.bool("process_output").unwrap_or(false),
		})
	}
}

/// Resolves an artifact path and prints its URL relative to the artifact
/// being written. Unresolved paths are printed as given and tracked so the
/// page is regenerated once the target exists.
#[derive(Debug, Default)]
pub struct RelocatableTag;

impl TagProcessor for RelocatableTag {
	fn signature(&self) -> TagSignature {
		TagSignature::new()
			.param(ParamSpec::mandatory("path"))
			.param(ParamSpec::optional("lang", Value::Null))
			.default_param("path")
	}

	fn process(&self, call: &TagCall<'_>, ctx: &mut RenderContext<'_>) -> WebgenResult<TagOutput> {
		let path = call
			.params
			.str("path")
			.ok_or_else(|| tag_error(call.tag, "no path given"))?;

		if is_external_reference(&path) {
			return Ok(TagOutput::new(path));
		}

		let (Some(dest), Some(content_node)) = (ctx.dest_node().cloned(), ctx.content_node().cloned())
		else {
			return Err(tag_error(call.tag, "no artifact is being rendered"));
		};

		let lang = call.params.str("lang");
		let absolute = content_node.join(&path);
		let website = ctx.website();

		match website.resolve(&absolute, lang.as_deref()) {
			Some(target) => Ok(TagOutput::new(website.url_for(&dest, &target))),
			None => {
				tracing::warn!(%dest, path = %absolute, "could not resolve path");
				ctx.track(TrackedItem::missing_node(absolute, lang.as_deref()));
				Ok(TagOutput::new(path))
			}
		}
	}
}

fn is_external_reference(path: &str) -> bool {
	path.contains("://") || path.starts_with('#') || path.starts_with("mailto:")
}

/// Runs a shell command in the site root and includes its standard output.
#[derive(Debug, Default)]
pub struct ExecuteCmdTag;

impl TagProcessor for ExecuteCmdTag {
	fn signature(&self) -> TagSignature {
		TagSignature::new()
			.param(ParamSpec::mandatory("command"))
			.param(ParamSpec::optional("process_output", Value::Bool(true)))
			.default_param("command")
	}

	fn process(&self, call: &TagCall<'_>, ctx: &mut RenderContext<'_>) -> WebgenResult<TagOutput> {
		let command = call
			.params
			.str("command")
			.ok_or_else(|| tag_error(call.tag, "no command given"))?;
		let stdout = execute_command(ctx.website().root(), &command)?;

		Ok(TagOutput {
			content: stdout,
			reprocess: call.params.bool("process_output").unwrap_or(true),
		})
	}
}

fn execute_command(root: &Path, command: &str) -> WebgenResult<String> {
	let output = if cfg!(windows) {
		Command::new("cmd")
			.arg("/C")
			.arg(command)
			.current_dir(root)
			.output()?
	} else {
		Command::new("sh")
			.arg("-c")
			.arg(command)
			.current_dir(root)
			.output()?
	};

	if !output.status.success() {
		let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
		let reason = if stderr.is_empty() {
			format!(
				"command exited with status {}",
				output
					.status
					.code()
					.map_or_else(|| "unknown".to_string(), |code| code.to_string())
			)
		} else {
			stderr
		};

		return Err(WebgenError::Command {
			command: command.to_string(),
			reason,
		});
	}

	Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn tag_error(tag: &str, reason: &str) -> WebgenError {
	WebgenError::TagProcessing {
		tag: tag.to_string(),
		reason: reason.to_string(),
	}
}
