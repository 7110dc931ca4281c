use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Regenerate the MD+ blocks embedded in your documentation.",
	long_about = "mdplus scans a directory tree for `MD+:<command>` ... `MD+FIN:<command>` comment \
	              blocks and replaces the content between the tags with freshly generated \
	              text.\n\nQuick start:\n  mdplus parse       Regenerate every document\n  mdplus \
	              check       Verify every document is up to date\n  mdplus list        Show the \
	              blocks found in each document\n  mdplus generators  Show the available generators"
)]
pub struct MdpCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Root directory of the workspace. Defaults to the current directory.
	#[arg(long, short = 'R', global = true)]
	pub root: Option<PathBuf>,

	/// Print debug logs.
	#[arg(long, short, global = true, default_value_t = false, conflicts_with = "quiet")]
	pub verbose: bool,

	/// Only print warnings and errors.
	#[arg(long, short, global = true, default_value_t = false)]
	pub quiet: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Regenerate the MD+ blocks of the workspace's documents.
	///
	/// Without arguments every markdown document below the root is
	/// processed. A single directory argument becomes the root. File
	/// arguments restrict processing to those documents.
	#[command(visible_alias = "p")]
	Parse {
		/// Documents to regenerate, or a single directory to use as root.
		paths: Vec<PathBuf>,

		/// Report which documents would change without writing them.
		#[arg(long, default_value_t = false)]
		dry_run: bool,
	},
	/// Check that every document is up to date.
	///
	/// Regenerates documents in memory and compares them with the files on
	/// disk. Exits with status 1 if any document would change and with
	/// status 2 if a document could not be processed.
	Check {
		/// Documents to check, or a single directory to use as root.
		paths: Vec<PathBuf>,

		/// Show a unified diff for each stale document.
		#[arg(long, default_value_t = false)]
		diff: bool,

		/// Output format for check results.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
	/// List the generatable documents and the blocks found in each.
	List {
		/// Output format for the listing.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
	/// List the registered generators and their arguments.
	Generators,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text output with colors and formatting.
	Text,
	/// JSON output for programmatic consumption.
	Json,
}
