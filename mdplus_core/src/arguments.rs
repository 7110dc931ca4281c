use derive_more::Deref;
use serde::Serialize;

use crate::ExpressionError;
use crate::Value;
use crate::expression::evaluate;
use crate::expression::parse_tokens;
use crate::lexer::tokenize;
use crate::tokens::Token;

/// An insertion-ordered mapping from argument name to value.
#[derive(Debug, Clone, Default, PartialEq, Deref, Serialize)]
pub struct Arguments(Vec<(String, Value)>);

/// A statement that could not be bound.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentError {
	/// The trimmed statement source.
	pub statement: String,
	/// 1-indexed line of the statement within the argument text.
	pub line: usize,
	/// The name the statement assigns to, when it has one. That name is
	/// bound to null.
	pub name: Option<String>,
	pub error: ExpressionError,
}

impl Arguments {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, name: &str) -> Option<&Value> {
		self.0.iter().find(|(key, _)| key == name).map(|(_, value)| value)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.get(name).is_some()
	}

	/// Bind `name`, replacing an earlier binding in place.
	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
		let name = name.into();
		let value = value.into();
		match self.0.iter_mut().find(|(key, _)| *key == name) {
			Some(slot) => slot.1 = value,
			None => self.0.push((name, value)),
		}
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(|(name, _)| name.as_str())
	}

	/// Parse argument text, logging every statement that fails.
	pub fn parse(source: &str) -> Self {
		let (arguments, errors) = Self::parse_with_errors(source);
		for failure in errors {
			tracing::error!(
				statement = %failure.statement,
				line = failure.line,
				"failed to parse argument: {}",
				failure.error
			);
		}
		arguments
	}

	/// Parse argument text and return the failed statements alongside the
	/// bound arguments.
	///
	/// Statements are evaluated in order and may refer to names bound by
	/// earlier statements. A statement that fails to evaluate binds its name
	/// to null. A statement that is not a plain `name = expr` assignment is
	/// skipped.
	pub fn parse_with_errors(source: &str) -> (Self, Vec<ArgumentError>) {
		let mut arguments = Self::new();
		let mut errors = vec![];

		if source.trim().is_empty() {
			return (arguments, errors);
		}

		let source = dedent(source);
		for statement in split_statements(&source) {
			let text = statement.text.trim();
			if text.is_empty() {
				continue;
			}

			match bind_statement(text, &arguments) {
				Ok(None) => {}
				Ok(Some((name, value))) => arguments.insert(name, value),
				Err((name, error)) => {
					if let Some(name) = &name {
						arguments.insert(name.clone(), Value::Null);
					}
					errors.push(ArgumentError {
						statement: text.to_string(),
						line: statement.line,
						name,
						error,
					});
				}
			}
		}

		(arguments, errors)
	}

	/// Serialize as `name = literal` lines that parse back to equal
	/// arguments.
	pub fn to_source(&self) -> String {
		self.0
			.iter()
			.map(|(name, value)| format!("{name} = {}\n", value.to_literal()))
			.collect()
	}
}

impl FromIterator<(String, Value)> for Arguments {
	fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
		let mut arguments = Self::new();
		for (name, value) in iter {
			arguments.insert(name, value);
		}
		arguments
	}
}

impl IntoIterator for Arguments {
	type IntoIter = std::vec::IntoIter<(String, Value)>;
	type Item = (String, Value);

	fn into_iter(self) -> Self::IntoIter {
		self.0.into_iter()
	}
}

type BindResult = Result<Option<(String, Value)>, (Option<String>, ExpressionError)>;

fn bind_statement(text: &str, scope: &Arguments) -> BindResult {
	let tokens = tokenize(text).map_err(|error| (None, error))?;
	let tokens: Vec<_> = tokens
		.into_iter()
		.filter(|token| token.token != Token::Newline)
		.collect();

	if tokens.is_empty() {
		return Ok(None);
	}

	let name = match (tokens.first().map(|t| &t.token), tokens.get(1).map(|t| &t.token)) {
		(Some(Token::Ident(name)), Some(Token::Assign)) => name.clone(),
		_ => {
			let target = text.split('=').next().unwrap_or(text).trim().to_string();
			return Err((None, ExpressionError::InvalidTarget(target)));
		}
	};

	let value = parse_tokens(&tokens[2..])
		.and_then(|expr| evaluate(&expr, scope))
		.map_err(|error| (Some(name.clone()), error))?;

	Ok(Some((name, value)))
}

/// Remove the indentation of the first non-blank line from every line.
/// Only spaces and tabs count as indentation.
pub fn dedent(source: &str) -> String {
	let indent = source
		.lines()
		.find(|line| !line.trim().is_empty())
		.map_or(0, indentation);

	source
		.lines()
		.map(|line| &line[indent.min(indentation(line))..])
		.collect::<Vec<_>>()
		.join("\n")
}

fn indentation(line: &str) -> usize {
	line.bytes().take_while(|byte| matches!(byte, b' ' | b'\t')).count()
}

struct Statement {
	text: String,
	line: usize,
}

/// Split source into statements at newlines and `;` outside of brackets,
/// strings and comments.
fn split_statements(source: &str) -> Vec<Statement> {
	let mut statements = vec![];
	let mut current = String::new();
	let mut start_line = 1;
	let mut line = 1;
	let mut depth = 0usize;
	let mut quote: Option<char> = None;
	let mut in_comment = false;
	let mut chars = source.chars().peekable();

	while let Some(ch) = chars.next() {
		if ch == '\n' {
			line += 1;
			in_comment = false;
			quote = None;
			if depth == 0 {
				statements.push(Statement {
					text: std::mem::take(&mut current),
					line: start_line,
				});
				start_line = line;
				continue;
			}
			current.push(ch);
			continue;
		}

		if in_comment {
			current.push(ch);
			continue;
		}

		if let Some(open) = quote {
			current.push(ch);
			if ch == '\\' {
				if let Some(escaped) = chars.next_if(|next| *next != '\n') {
					current.push(escaped);
				}
			} else if ch == open {
				quote = None;
			}
			continue;
		}

		match ch {
			'"' | '\'' => quote = Some(ch),
			'#' => in_comment = true,
			'(' | '[' | '{' => depth += 1,
			')' | ']' | '}' => depth = depth.saturating_sub(1),
			'\\' if chars.peek() == Some(&'\n') => {
				// An escaped line break continues the statement.
				chars.next();
				line += 1;
				current.push(' ');
				continue;
			}
			';' if depth == 0 => {
				statements.push(Statement {
					text: std::mem::take(&mut current),
					line: start_line,
				});
				start_line = line;
				continue;
			}
			_ => {}
		}

		current.push(ch);
	}

	statements.push(Statement {
		text: current,
		line: start_line,
	});

	statements
}
