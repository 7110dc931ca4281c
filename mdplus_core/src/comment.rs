use std::fmt;
use std::path::Path;

use serde::Serialize;

/// The named comment presets a document can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStyle {
	Markdown,
	Python,
	C,
}

impl fmt::Display for CommentStyle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Markdown => "markdown",
			Self::Python => "python",
			Self::C => "c",
		};
		f.write_str(name)
	}
}

/// The comment delimiters used to embed MD+ tags in a file.
///
/// Start and end delimiters are listed in preference order. The first entry
/// of each list is used when a tag is written back into the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentGrammar {
	pub style: CommentStyle,
	pub start: &'static [&'static str],
	pub end: &'static [&'static str],
	pub single_line: Option<&'static str>,
}

/// `<!-- ... -->`
pub const MARKDOWN: CommentGrammar = CommentGrammar {
	style: CommentStyle::Markdown,
	start: &["<!--"],
	end: &["-->"],
	single_line: None,
};

/// `""" ... """` or `''' ... '''`, with `#` line comments.
pub const PYTHON: CommentGrammar = CommentGrammar {
	style: CommentStyle::Python,
	start: &["\"\"\"", "'''"],
	end: &["\"\"\"", "'''"],
	single_line: Some("#"),
};

/// `/* ... */`, with `//` line comments.
pub const C_STYLE: CommentGrammar = CommentGrammar {
	style: CommentStyle::C,
	start: &["/*"],
	end: &["*/"],
	single_line: Some("//"),
};

/// File extensions treated as markdown.
pub const MARKDOWN_EXTENSIONS: [&str; 3] = ["md", "mdx", "markdown"];

impl CommentGrammar {
	/// Select the grammar for a file from its extension. Anything that is
	/// neither markdown nor python falls back to c-style comments.
	pub fn for_path(path: &Path) -> &'static CommentGrammar {
		let ext = path
			.extension()
			.and_then(|e| e.to_str())
			.map(str::to_ascii_lowercase)
			.unwrap_or_default();

		if MARKDOWN_EXTENSIONS.contains(&ext.as_str()) {
			&MARKDOWN
		} else if ext == "py" {
			&PYTHON
		} else {
			&C_STYLE
		}
	}

	/// The delimiter used to open a written tag.
	pub fn open(&self) -> &'static str {
		self.start[0]
	}

	/// The delimiter used to close a written tag.
	pub fn close(&self) -> &'static str {
		self.end[0]
	}

	/// Find the earliest start delimiter at or after `from`.
	pub fn find_start(&self, text: &str, from: usize) -> Option<(usize, &'static str)> {
		earliest(text, from, self.start)
	}

	/// Find the earliest end delimiter at or after `from`.
	pub fn find_end(&self, text: &str, from: usize) -> Option<(usize, &'static str)> {
		earliest(text, from, self.end)
	}

	/// The end delimiter beginning exactly at `at`, if any.
	pub fn end_at(&self, text: &str, at: usize) -> Option<&'static str> {
		let rest = text.get(at..)?;
		self.end.iter().copied().find(|delim| rest.starts_with(delim))
	}

	/// The start delimiter a line begins with, ignoring leading whitespace.
	pub fn line_starts_comment(&self, line: &str) -> Option<&'static str> {
		let line = line.trim_start();
		self.start.iter().copied().find(|delim| line.starts_with(delim))
	}

	/// Whether a line ends with one of the end delimiters, ignoring trailing
	/// whitespace.
	pub fn line_ends_comment(&self, line: &str) -> bool {
		let line = line.trim_end();
		self.end.iter().any(|delim| line.ends_with(delim))
	}
}

fn earliest(
	text: &str,
	from: usize,
	delimiters: &[&'static str],
) -> Option<(usize, &'static str)> {
	let haystack = text.get(from..)?.as_bytes();
	delimiters
		.iter()
		.filter_map(|delim| memstr(haystack, delim.as_bytes()).map(|pos| (from + pos, *delim)))
		.min_by_key(|(pos, _)| *pos)
}

/// Byte-level substring search.
pub(crate) fn memstr(haystack: &[u8], needle: &[u8]) -> Option<usize> {
	if needle.is_empty() {
		return Some(0);
	}
	haystack
		.windows(needle.len())
		.position(|window| window == needle)
}
