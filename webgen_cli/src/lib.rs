use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

pub mod generate;
pub mod site;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Render a static site from tagged sources, regenerating only what changed.",
	long_about = "webgen renders every file below the source directory into the output \
	              directory, expanding tags such as {title:} or {include_file: footer.html} \
	              along the way.\n\nEach rendered page remembers what it depended on, so the \
	              next run only regenerates pages whose sources, included files, templates or \
	              referenced pages changed.\n\nQuick start:\n  webgen render  Render the site\n  \
	              webgen check   List pages that need regenerating\n  webgen deps    Show what a \
	              page depends on"
)]
pub struct WebgenCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the site root directory.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Render all pages that are out of date.
	///
	/// Loads the dependencies recorded by the previous run and renders every
	/// page whose output is missing or whose dependencies changed. The
	/// recorded dependencies are saved again afterwards.
	Render {
		/// Render every page, whether or not it changed.
		#[arg(long, default_value_t = false)]
		force: bool,
	},
	/// List the pages a render would regenerate.
	///
	/// Exits with a non-zero status code if any page is out of date, which
	/// makes it usable in CI to ensure the committed output is current.
	Check {
		/// Output format for check results.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
	/// Print what a page depended on when it was last rendered.
	Deps {
		/// The page, e.g. `/index.html`.
		artifact: String,

		/// Output format for the dependency listing.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text output with colors and formatting.
	Text,
	/// JSON output for programmatic consumption.
	Json,
}
