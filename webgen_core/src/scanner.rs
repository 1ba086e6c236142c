use std::convert::Infallible;

/// A scan fault. The scan of the affected buffer stops at the fault and the
/// remainder is returned unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScanDiagnostic {
	/// The parameter text of a start tag never balanced its curly braces.
	UnbalancedBraces {
		tag: String,
		line: usize,
		column: usize,
	},
	/// A body tag was opened but no matching end tag was found.
	MissingEndTag {
		tag: String,
		line: usize,
		column: usize,
	},
}

impl ScanDiagnostic {
	pub fn message(&self) -> String {
		match self {
			Self::UnbalancedBraces { tag, line, column } => {
				format!("unbalanced curly braces for tag `{tag}` at {line}:{column}")
			}
			Self::MissingEndTag { tag, line, column } => {
				format!("no end tag found for body tag `{tag}` at {line}:{column}")
			}
		}
	}
}

/// Finds `{name: params}` and `{name:: params}body{name}` tags in text and
/// replaces each of them with the output of a resolver.
///
/// A run of `k` backslashes in front of a tag escapes it when `k` is odd. The
/// scan emits `k / 2` literal backslashes in either case.
#[derive(Debug, Clone, Default)]
pub struct TagScanner {
	prefix: String,
}

impl TagScanner {
	/// Create a scanner for tags whose name is preceded by `prefix`, e.g.
	/// `{wg:date: }` for the prefix `wg:`.
	pub fn new(prefix: impl Into<String>) -> Self {
		Self {
			prefix: prefix.into(),
		}
	}

	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	/// Replace all tags in `content` with the output of `resolver`, which
	/// receives the tag name, the raw parameter text and the body (empty for
	/// simple tags). The output itself is not rescanned.
	pub fn replace_tags<F>(&self, content: &str, mut resolver: F) -> String
	where
		F: FnMut(&str, &str, &str) -> String,
	{
		let mut diagnostics = Vec::new();
		let result = self.scan(
			content,
			|name, params, body| Ok::<_, Infallible>(resolver(name, params, body)),
			&mut diagnostics,
		);

		match result {
			Ok(replaced) => replaced,
			Err(never) => match never {},
		}
	}

	/// Like [`TagScanner::replace_tags`] but the resolver may fail. The first
	/// error aborts the scan and is returned.
	pub fn try_replace_tags<F, E>(&self, content: &str, resolver: F) -> Result<String, E>
	where
		F: FnMut(&str, &str, &str) -> Result<String, E>,
	{
		let mut diagnostics = Vec::new();
		self.scan(content, resolver, &mut diagnostics)
	}

	/// Like [`TagScanner::replace_tags`], additionally returning the scan
	/// faults that were logged.
	pub fn replace_tags_with_diagnostics<F>(
		&self,
		content: &str,
		mut resolver: F,
	) -> (String, Vec<ScanDiagnostic>)
	where
		F: FnMut(&str, &str, &str) -> String,
	{
		let mut diagnostics = Vec::new();
		let result = self.scan(
			content,
			|name, params, body| Ok::<_, Infallible>(resolver(name, params, body)),
			&mut diagnostics,
		);

		match result {
			Ok(replaced) => (replaced, diagnostics),
			Err(never) => match never {},
		}
	}

	fn scan<F, E>(
		&self,
		content: &str,
		mut resolver: F,
		diagnostics: &mut Vec<ScanDiagnostic>,
	) -> Result<String, E>
	where
		F: FnMut(&str, &str, &str) -> Result<String, E>,
	{
		let mut buffer = content.to_string();
		let mut pos = 0;
		let mut state = ScanState::BeforeTag;
		let mut tag = Occurrence::default();

		loop {
			match state {
				ScanState::BeforeTag => {
					let Some(marker) = find_marker(&buffer, pos, &self.prefix, MarkerKind::Start)
					else {
						state = ScanState::Done;
						continue;
					};

					tag = Occurrence {
						name: marker.name,
						simple: !marker.double_colon,
						backslashes: marker.backslashes,
						start: marker.start,
						params_start: marker.end,
						..Occurrence::default()
					};
					pos = marker.end;
					state = ScanState::InStartTag;
				}
				ScanState::InStartTag => {
					let mut depth = 1_usize;
					while depth != 0 {
						let Some(offset) = buffer.as_bytes()[pos..]
							.iter()
							.position(|byte| matches!(*byte, b'{' | b'}'))
						else {
							break;
						};
						let index = pos + offset;
						if buffer.as_bytes()[index] == b'{' {
							depth += 1;
						} else {
							depth -= 1;
						}
						pos = index + 1;
					}

					if depth != 0 {
						let (line, column) = line_column(&buffer, tag.brace_offset());
						tracing::error!(tag = %tag.name, line, column, "unbalanced curly braces for tag");
						diagnostics.push(ScanDiagnostic::UnbalancedBraces {
							tag: tag.name.clone(),
							line,
							column,
						});
						state = ScanState::Done;
						continue;
					}

					tag.params_end = pos - 1;
					tag.body_end = tag.params_end;
					tag.end = tag.params_end;
					state = if tag.simple {
						ScanState::Process
					} else {
						ScanState::InBody
					};
				}
				ScanState::InBody => {
					let mut found = false;
					while let Some(marker) = find_marker(&buffer, pos, &self.prefix, MarkerKind::End) {
						pos = marker.end;
						if marker.name != tag.name {
							continue;
						}

						if marker.backslashes % 2 == 1 {
							let removed = 1 + marker.backslashes / 2;
							buffer.replace_range(marker.start..marker.start + removed, "");
							pos -= removed;
							continue;
						}

						tag.end = marker.end - 1;
						tag.body_end = marker.start + marker.backslashes / 2;
						found = true;
						break;
					}

					if found {
						state = ScanState::Process;
					} else {
						let (line, column) = line_column(&buffer, tag.brace_offset());
						tracing::error!(tag = %tag.name, line, column, "no end tag found for body tag");
						diagnostics.push(ScanDiagnostic::MissingEndTag {
							tag: tag.name.clone(),
							line,
							column,
						});
						state = ScanState::Done;
					}
				}
				ScanState::Process => {
					if tag.backslashes % 2 == 0 {
						let params = &buffer[tag.params_start..tag.params_end];
						let body = if tag.simple {
							""
						} else {
							&buffer[tag.params_end + 1..tag.body_end]
						};
						tracing::trace!(tag = %tag.name, params, "resolving tag");
						let result = resolver(&tag.name, params, body)?;

						let mut replacement = "\\".repeat(tag.backslashes / 2);
						replacement.push_str(&result);
						buffer.replace_range(tag.start..=tag.end, &replacement);
						pos = tag.start + replacement.len();
					} else {
						let removed = 1 + tag.backslashes / 2;
						buffer.replace_range(tag.start..tag.start + removed, "");
						pos -= removed;
					}
					state = ScanState::BeforeTag;
				}
				ScanState::Done => break,
			}
		}

		Ok(buffer)
	}
}

enum ScanState {
	BeforeTag,
	InStartTag,
	InBody,
	Process,
	Done,
}

/// Byte offsets of a tag occurrence in the scan buffer. `start` points at the
/// first escaping backslash, `end` at the closing brace of the whole
/// occurrence (inclusive).
#[derive(Debug, Default)]
struct Occurrence {
	name: String,
	simple: bool,
	backslashes: usize,
	start: usize,
	params_start: usize,
	params_end: usize,
	body_end: usize,
	end: usize,
}

impl Occurrence {
	fn brace_offset(&self) -> usize {
		self.start + self.backslashes
	}
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum MarkerKind {
	/// `{<prefix>name:` or `{<prefix>name::`
	Start,
	/// `{<prefix>name}`
	End,
}

struct Marker {
	name: String,
	backslashes: usize,
	double_colon: bool,
	/// Offset of the first backslash, or of the brace if there are none.
	start: usize,
	/// Offset just past the marker.
	end: usize,
}

/// Find the leftmost marker at or after `from`. Backslashes before `from` are
/// not counted.
fn find_marker(buffer: &str, from: usize, prefix: &str, kind: MarkerKind) -> Option<Marker> {
	let bytes = buffer.as_bytes();
	let mut cursor = from;

	while let Some(offset) = bytes.get(cursor..)?.iter().position(|byte| *byte == b'{') {
		let brace = cursor + offset;
		if let Some((name, end, double_colon)) = match_marker_at(bytes, brace + 1, prefix, kind) {
			let mut start = brace;
			while start > from && bytes[start - 1] == b'\\' {
				start -= 1;
			}

			return Some(Marker {
				name,
				backslashes: brace - start,
				double_colon,
				start,
				end,
			});
		}
		cursor = brace + 1;
	}

	None
}

fn match_marker_at(
	bytes: &[u8],
	index: usize,
	prefix: &str,
	kind: MarkerKind,
) -> Option<(String, usize, bool)> {
	let rest = bytes.get(index..)?;
	let rest = rest.strip_prefix(prefix.as_bytes())?;
	let name_len = rest.iter().take_while(|byte| is_word_byte(**byte)).count();
	if name_len == 0 {
		return None;
	}

	let name = String::from_utf8_lossy(&rest[..name_len]).into_owned();
	let after_name = index + prefix.len() + name_len;

	match kind {
		MarkerKind::Start => {
			if rest.get(name_len) != Some(&b':') {
				return None;
			}
			let double_colon = rest.get(name_len + 1) == Some(&b':');
			let end = after_name + if double_colon { 2 } else { 1 };
			Some((name, end, double_colon))
		}
		MarkerKind::End => {
			if rest.get(name_len) != Some(&b'}') {
				return None;
			}
			Some((name, after_name + 1, false))
		}
	}
}

fn is_word_byte(byte: u8) -> bool {
	byte.is_ascii_alphanumeric() || byte == b'_'
}

/// 1-indexed line and column of a byte offset.
pub(crate) fn line_column(content: &str, offset: usize) -> (usize, usize) {
	let before = &content[..offset.min(content.len())];
	let line = before.matches('\n').count() + 1;
	let column = before
		.rfind('\n')
		.map_or(before, |newline| &before[newline + 1..])
		.chars()
		.count() + 1;
	(line, column)
}
