use std::collections::BTreeMap;

use serde_json::Value;

use crate::RenderContext;
use crate::WebgenResult;

/// A tag processor turns one tag occurrence into replacement text.
///
/// Processors are registered once in a [`TagRegistry`](crate::TagRegistry)
/// and shared between renders, so they must not hold per-render state. Use
/// the [`RenderContext`] for anything that depends on the artifact being
/// rendered.
pub trait TagProcessor: Send + Sync {
	/// The parameters this processor accepts.
	fn signature(&self) -> TagSignature;

	fn process(&self, call: &TagCall<'_>, ctx: &mut RenderContext<'_>) -> WebgenResult<TagOutput>;
}

/// One tag occurrence handed to a processor.
#[derive(Debug)]
pub struct TagCall<'a> {
	/// The tag name as written, which differs from the registered name when
	/// the processor was resolved as the `default` processor.
	pub tag: &'a str,
	pub params: &'a TagParams,
	pub body: &'a str,
}

/// The result of processing a tag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagOutput {
	pub content: String,
	/// Scan `content` for tags again before it is substituted.
	pub reprocess: bool,
}

impl TagOutput {
	pub fn new(content: impl Into<String>) -> Self {
		Self {
			content: content.into(),
			reprocess: false,
		}
	}

	pub fn reprocessed(content: impl Into<String>) -> Self {
		Self {
			content: content.into(),
			reprocess: true,
		}
	}
}

/// A declared tag parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
	pub name: String,
	/// Used when the parameter is absent. `Null` means "no default".
	pub default: Value,
	pub mandatory: bool,
}

impl ParamSpec {
	pub fn optional(name: impl Into<String>, default: Value) -> Self {
		Self {
			name: name.into(),
			default,
			mandatory: false,
		}
	}

	pub fn mandatory(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			default: Value::Null,
			mandatory: true,
		}
	}
}

/// The parameters a processor accepts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TagSignature {
	pub params: Vec<ParamSpec>,
	/// The parameter that receives the whole parameter text when it is not a
	/// mapping, e.g. `filename` for `{include_file: notes.txt}`.
	pub default_param: Option<String>,
}

impl TagSignature {
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn param(mut self, spec: ParamSpec) -> Self {
		self.params.push(spec);
		self
	}

	#[must_use]
	pub fn default_param(mut self, name: impl Into<String>) -> Self {
		self.default_param = Some(name.into());
		self
	}

	/// Parse the raw parameter text of a tag.
	///
	/// Nothing in here is fatal: malformed text, unknown keys and missing
	/// mandatory parameters are logged and parsing carries on with whatever
	/// could be recovered.
	pub fn parse_params(&self, tag: &str, param_text: &str) -> TagParams {
		let mut values = BTreeMap::new();

		match parse_param_value(param_text) {
			Ok(Value::Null) => {}
			Ok(Value::Object(map)) => {
				for (key, value) in map {
					if self.params.iter().any(|spec| spec.name == key) {
						values.insert(key, value);
					} else {
						tracing::warn!(tag, param = %key, "ignoring unknown tag parameter");
					}
				}
			}
			Ok(value) => {
				if let Some(name) = &self.default_param {
					values.insert(name.clone(), value);
				} else {
					tracing::error!(
						tag,
						"tag parameters must be a mapping, no default parameter is declared"
					);
				}
			}
			Err(reason) => {
				tracing::error!(tag, %reason, "could not parse tag parameters");
			}
		}

		for spec in &self.params {
			if values.contains_key(&spec.name) {
				continue;
			}

			if spec.mandatory {
				tracing::warn!(tag, param = %spec.name, "mandatory tag parameter is missing");
			} else if !spec.default.is_null() {
				values.insert(spec.name.clone(), spec.default.clone());
			}
		}

		TagParams { values }
	}
}

fn parse_param_value(param_text: &str) -> Result<Value, String> {
	if param_text.trim().is_empty() {
		return Ok(Value::Null);
	}

	serde_yaml_ng::from_str(param_text).map_err(|e| e.to_string())
}

/// Parsed tag parameters, with declared defaults filled in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TagParams {
	values: BTreeMap<String, Value>,
}

impl TagParams {
	pub fn get(&self, name: &str) -> Option<&Value> {
		self.values.get(name)
	}

	/// The parameter as text. Scalars other than strings are rendered as JSON,
	/// so `{include_file: 2024}` still names the file `2024`.
	pub fn str(&self, name: &str) -> Option<String> {
		match self.values.get(name)? {
			Value::String(value) => Some(value.clone()),
			Value::Null => None,
			other => Some(other.to_string()),
		}
	}

	pub fn bool(&self, name: &str) -> Option<bool> {
		match self.values.get(name)? {
			Value::Bool(value) => Some(*value),
			Value::String(value) => Some(value == "true"),
			_ => None,
		}
	}

	pub fn contains(&self, name: &str) -> bool {
		self.values.contains_key(name)
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}
}

impl FromIterator<(String, Value)> for TagParams {
	fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
		Self {
			values: iter.into_iter().collect(),
		}
	}
}
