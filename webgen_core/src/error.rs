use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum WebgenError {
	#[error(transparent)]
	#[diagnostic(code(webgen::io_error))]
	Io(#[from] std::io::Error),

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(webgen::config_parse),
		help("check that webgen.toml is valid TOML with [tags], [cache] and/or [source] sections")
	)]
	ConfigParse(String),

	#[error("tag `{tag}` failed: {reason}")]
	#[diagnostic(code(webgen::tag_processing))]
	TagProcessing { tag: String, reason: String },

	#[error("failed to include file `{path}`: {reason}")]
	#[diagnostic(
		code(webgen::include_file),
		help("paths given to `include_file` are relative to the site root")
	)]
	IncludeFile { path: String, reason: String },

	#[error("failed to execute command `{command}`: {reason}")]
	#[diagnostic(code(webgen::command))]
	Command { command: String, reason: String },

	#[error("node lookup `{lookup}` failed: {reason}")]
	#[diagnostic(
		code(webgen::node_lookup),
		help("available lookups: children, all")
	)]
	NodeLookup { lookup: String, reason: String },

	#[error("failed to persist tracker cache: {0}")]
	#[diagnostic(code(webgen::cache_persist))]
	CachePersist(String),

	#[error("unknown artifact: `{0}`")]
	#[diagnostic(
		code(webgen::unknown_artifact),
		help("artifact names are source paths relative to the source directory, e.g. `/index.html`")
	)]
	UnknownArtifact(String),
}

pub type WebgenResult<T> = Result<T, WebgenError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
