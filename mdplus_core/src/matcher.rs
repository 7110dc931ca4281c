use std::ops::Range;

use serde::Serialize;

use crate::CommentGrammar;
use crate::LineTable;
use crate::MdpError;
use crate::Position;

/// Marker that introduces an opening tag.
pub const OPEN_MARKER: &str = "MD+:";
/// Marker that introduces a closing tag.
pub const CLOSE_MARKER: &str = "MD+FIN:";
/// Commands that are matched but never resolved to a generator.
pub const RESERVED_COMMANDS: [&str; 3] = ["META", "TODO", "TODO:"];

/// An opening `MD+:` tag on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opening {
	pub command: String,
	pub arguments: String,
	pub position: Position,
}

/// A matched `MD+` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
	/// The command name, e.g. `generate.content`.
	pub command: String,
	/// Raw text between the command and the end delimiter of the opening
	/// tag.
	pub arguments: String,
	/// Position of the opening tag.
	pub opening: Position,
	/// Position of the closing tag, when one was found.
	pub closing: Option<Position>,
	/// The full original text this block covers: the opening tag through the
	/// closing tag, the rest of the document for an unclosed block, or just
	/// the opening tag for a standalone reserved block.
	pub span: Position,
}

impl Block {
	/// `META` and `TODO` blocks carry metadata and are never generated.
	pub fn is_reserved(&self) -> bool {
		is_reserved_command(&self.command)
	}

	/// Whether this block passes through untouched.
	pub fn is_literal(&self) -> bool {
		self.is_reserved() || self.closing.is_none()
	}

	/// Byte range of the generated body between the two tags.
	pub fn body(&self) -> Option<Range<usize>> {
		self.closing
			.map(|closing| self.opening.end.offset..closing.start.offset)
	}
}

pub fn is_reserved_command(command: &str) -> bool {
	let upper = command.to_ascii_uppercase();
	RESERVED_COMMANDS.contains(&upper.as_str())
}

/// Lazily scans a text for `MD+` blocks from left to right.
///
/// Blocks never overlap: once a block is matched, scanning resumes after its
/// closing tag, so openings inside a generated body are not visited.
pub struct BlockScanner<'a> {
	text: &'a str,
	grammar: &'a CommentGrammar,
	lines: LineTable,
	cursor: usize,
}

impl<'a> BlockScanner<'a> {
	pub fn new(text: &'a str, grammar: &'a CommentGrammar) -> Self {
		Self::from_offset(text, grammar, 0)
	}

	/// Start scanning at a byte offset instead of the beginning of the text.
	pub fn from_offset(text: &'a str, grammar: &'a CommentGrammar, offset: usize) -> Self {
		Self {
			text,
			grammar,
			lines: LineTable::new(text),
			cursor: offset.min(text.len()),
		}
	}

	/// The offset the next search begins at.
	pub fn offset(&self) -> usize {
		self.cursor
	}

	/// Try to match an opening tag whose start delimiter sits at `start`.
	/// Returns the command, the argument range and the end of the tag.
	fn opening_at(&self, start: usize, delim: &str) -> Option<(String, Range<usize>, usize)> {
		let text = self.text;
		let mut index = skip_whitespace(text, start + delim.len());

		if !text[index..].starts_with(OPEN_MARKER) {
			return None;
		}
		index += OPEN_MARKER.len();

		let command_start = index;
		for (offset, ch) in text[command_start..].char_indices() {
			let at = command_start + offset;
			if ch.is_whitespace() || ch == '-' || self.grammar.end_at(text, at).is_some() {
				break;
			}
			index = at + ch.len_utf8();
		}

		if index == command_start {
			return None;
		}

		let command = text[command_start..index].to_string();
		let (end, end_delim) = self.grammar.find_end(text, index)?;

		Some((command, index..end, end + end_delim.len()))
	}

	/// Advance to the next opening tag without searching for its closing
	/// tag.
	pub fn next_opening(&mut self) -> Option<Opening> {
		loop {
			let (start, delim) = self.grammar.find_start(self.text, self.cursor)?;
			let Some((command, arguments, end)) = self.opening_at(start, delim) else {
				self.cursor = start + delim.len();
				continue;
			};

			self.cursor = end;

			return Some(Opening {
				command,
				arguments: self.text[arguments].to_string(),
				position: self.lines.position(start..end),
			});
		}
	}

	/// Find the closing tag for `command` at or after `from`.
	fn closing_for(&self, command: &str, from: usize) -> Option<Range<usize>> {
		let text = self.text;
		let mut search = from;

		while let Some((start, delim)) = self.grammar.find_start(text, search) {
			search = start + delim.len();

			let mut index = skip_whitespace(text, search);
			if !text[index..].starts_with(CLOSE_MARKER) {
				continue;
			}
			index += CLOSE_MARKER.len();

			if !text[index..].starts_with(command) {
				continue;
			}
			index += command.len();

			let after = skip_whitespace(text, index);
			if after == index && self.grammar.end_at(text, index).is_none() {
				// `MD+FIN:foo` must not match the longer command `foobar`.
				continue;
			}

			if let Some(end_delim) = self.grammar.end_at(text, after) {
				return Some(start..after + end_delim.len());
			}
		}

		None
	}
}

impl Iterator for BlockScanner<'_> {
	type Item = Block;

	fn next(&mut self) -> Option<Self::Item> {
		let Opening {
			command,
			arguments,
			position: opening,
		} = self.next_opening()?;

		let closing = self.closing_for(&command, opening.end.offset);
		let span_end = match &closing {
			Some(range) => range.end,
			None if is_reserved_command(&command) => opening.end.offset,
			None => {
				let error = MdpError::MissingClosingTag {
					command: command.clone(),
					line: opening.start.line,
				};
				tracing::warn!("{error}, leaving the rest of the document untouched");
				self.text.len()
			}
		};

		self.cursor = span_end;

		Some(Block {
			command,
			arguments,
			opening,
			closing: closing.map(|range| self.lines.position(range)),
			span: self.lines.position(opening.start.offset..span_end),
		})
	}
}

/// Collect every block in `text`.
pub fn find_blocks(text: &str, grammar: &CommentGrammar) -> Vec<Block> {
	BlockScanner::new(text, grammar).collect()
}

fn skip_whitespace(text: &str, from: usize) -> usize {
	let rest = &text[from..];
	from + (rest.len() - rest.trim_start().len())
}
