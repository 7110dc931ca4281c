use logos::Logos;
use snailquote::unescape;

use crate::ExpressionError;
use crate::OrderedFloat;
use crate::tokens::SpannedToken;
use crate::tokens::Token;

/// Raw tokens produced by logos for the argument language.
#[derive(Logos, Debug, PartialEq)]
enum RawToken {
	#[regex(r"[ \t\r]+")]
	Whitespace,
	#[regex(r"\\\r?\n")]
	LineContinuation,
	#[regex(r"#[^\n]*", allow_greedy = true)]
	Comment,
	#[token("\n")]
	Newline,
	#[token(";")]
	Semicolon,
	#[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
	Ident,
	#[regex(r#"[fF]"([^"\\\n]|\\.)*""#)]
	DoubleQuotedFString,
	#[regex(r"[fF]'([^'\\\n]|\\.)*'")]
	SingleQuotedFString,
	#[regex(r#""([^"\\\n]|\\.)*""#)]
	DoubleQuotedString,
	#[regex(r"'([^'\\\n]|\\.)*'")]
	SingleQuotedString,
	#[regex(r"[0-9]+")]
	Int,
	#[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?|[0-9]+[eE][+-]?[0-9]+")]
	Float,
	#[token("==")]
	EqEq,
	#[token("!=")]
	NotEq,
	#[token("<=")]
	Le,
	#[token(">=")]
	Ge,
	#[token("<")]
	Lt,
	#[token(">")]
	Gt,
	#[token("=")]
	Assign,
	#[token("**")]
	DoubleStar,
	#[token("//")]
	DoubleSlash,
	#[token("+")]
	Plus,
	#[token("-")]
	Minus,
	#[token("*")]
	Star,
	#[token("/")]
	Slash,
	#[token("%")]
	Percent,
	#[token("(")]
	ParenOpen,
	#[token(")")]
	ParenClose,
	#[token("[")]
	BracketOpen,
	#[token("]")]
	BracketClose,
	#[token("{")]
	BraceOpen,
	#[token("}")]
	BraceClose,
	#[token(",")]
	Comma,
	#[token(":")]
	Colon,
	#[token(".")]
	Dot,
}

/// Tokenize argument source. Whitespace, comments and escaped line breaks
/// are dropped.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, ExpressionError> {
	let mut tokens = vec![];

	for (raw, span) in RawToken::lexer(source).spanned() {
		let slice = &source[span.clone()];
		let Ok(raw) = raw else {
			return Err(ExpressionError::InvalidToken {
				offset: span.start,
				text: slice.to_string(),
			});
		};

		let token = match raw {
			RawToken::Whitespace | RawToken::LineContinuation | RawToken::Comment => continue,
			RawToken::Newline => Token::Newline,
			RawToken::Semicolon => Token::Semicolon,
			RawToken::Ident => Token::Ident(slice.to_string()),
			RawToken::DoubleQuotedString => Token::String(unescape_double(slice)?),
			RawToken::SingleQuotedString => Token::String(unescape_single(slice)?),
			RawToken::DoubleQuotedFString => Token::FString(unescape_double(&slice[1..])?),
			RawToken::SingleQuotedFString => Token::FString(unescape_single(&slice[1..])?),
			RawToken::Int => {
				Token::Int(
					slice
						.parse()
						.map_err(|_| ExpressionError::InvalidNumber(slice.to_string()))?,
				)
			}
			RawToken::Float => {
				Token::Float(OrderedFloat(
					slice
						.parse()
						.map_err(|_| ExpressionError::InvalidNumber(slice.to_string()))?,
				))
			}
			RawToken::EqEq => Token::EqEq,
			RawToken::NotEq => Token::NotEq,
			RawToken::Le => Token::Le,
			RawToken::Ge => Token::Ge,
			RawToken::Lt => Token::Lt,
			RawToken::Gt => Token::Gt,
			RawToken::Assign => Token::Assign,
			RawToken::DoubleStar => Token::DoubleStar,
			RawToken::DoubleSlash => Token::DoubleSlash,
			RawToken::Plus => Token::Plus,
			RawToken::Minus => Token::Minus,
			RawToken::Star => Token::Star,
			RawToken::Slash => Token::Slash,
			RawToken::Percent => Token::Percent,
			RawToken::ParenOpen => Token::ParenOpen,
			RawToken::ParenClose => Token::ParenClose,
			RawToken::BracketOpen => Token::BracketOpen,
			RawToken::BracketClose => Token::BracketClose,
			RawToken::BraceOpen => Token::BraceOpen,
			RawToken::BraceClose => Token::BraceClose,
			RawToken::Comma => Token::Comma,
			RawToken::Colon => Token::Colon,
			RawToken::Dot => Token::Dot,
		};

		tokens.push(SpannedToken { token, span });
	}

	Ok(tokens)
}

fn unescape_double(slice: &str) -> Result<String, ExpressionError> {
	unescape(slice).map_err(|e| ExpressionError::InvalidString(e.to_string()))
}

/// Single-quoted literals accept the same escapes as double-quoted ones, so
/// they are rewritten into double-quoted form before unescaping.
fn unescape_single(slice: &str) -> Result<String, ExpressionError> {
	let inner = &slice[1..slice.len() - 1];
	let mut converted = String::with_capacity(inner.len() + 2);
	converted.push('"');

	let mut chars = inner.chars();
	while let Some(ch) = chars.next() {
		match ch {
			'\\' => {
				match chars.next() {
					Some('\'') => converted.push('\''),
					Some(next) => {
						converted.push('\\');
						converted.push(next);
					}
					None => converted.push_str("\\\\"),
				}
			}
			'"' => converted.push_str("\\\""),
			ch => converted.push(ch),
		}
	}

	converted.push('"');
	unescape_double(&converted)
}
