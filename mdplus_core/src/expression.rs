use crate::Arguments;
use crate::ExpressionError;
use crate::OrderedFloat;
use crate::Value;
use crate::lexer::tokenize;
use crate::tokens::SpannedToken;
use crate::tokens::Token;

type ExprResult<T> = Result<T, ExpressionError>;

/// A parsed argument expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
	Literal(Value),
	Name(String),
	FString(Vec<FStringPart>),
	List(Vec<Expr>),
	Map(Vec<(Expr, Expr)>),
	Unary(UnaryOp, Box<Expr>),
	Binary(BinaryOp, Box<Expr>, Box<Expr>),
	/// A comparison chain such as `a < b <= c`.
	Compare(Box<Expr>, Vec<(CompareOp, Expr)>),
	And(Box<Expr>, Box<Expr>),
	Or(Box<Expr>, Box<Expr>),
	Index(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FStringPart {
	Text(String),
	Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
	Neg,
	Pos,
	Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
	Add,
	Sub,
	Mul,
	Div,
	FloorDiv,
	Mod,
	Pow,
}

impl BinaryOp {
	fn symbol(self) -> &'static str {
		match self {
			Self::Add => "+",
			Self::Sub => "-",
			Self::Mul => "*",
			Self::Div => "/",
			Self::FloorDiv => "//",
			Self::Mod => "%",
			Self::Pow => "**",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
	Eq,
	NotEq,
	Lt,
	Le,
	Gt,
	Ge,
}

impl CompareOp {
	fn symbol(self) -> &'static str {
		match self {
			Self::Eq => "==",
			Self::NotEq => "!=",
			Self::Lt => "<",
			Self::Le => "<=",
			Self::Gt => ">",
			Self::Ge => ">=",
		}
	}
}

/// Parse a complete expression from source text.
pub fn parse_expression(source: &str) -> ExprResult<Expr> {
	let tokens = tokenize(source)?;
	parse_tokens(&tokens)
}

/// Parse a complete expression from tokens. Every token must be consumed.
pub(crate) fn parse_tokens(tokens: &[SpannedToken]) -> ExprResult<Expr> {
	let mut parser = Parser { tokens, cursor: 0 };
	let expr = parser.or()?;

	if let Some(token) = parser.peek() {
		return Err(ExpressionError::UnexpectedToken {
			found: token.to_string(),
			expected: "end of expression",
		});
	}

	Ok(expr)
}

/// Recursive descent parser, one method per precedence level from lowest
/// (`or`) to highest (atoms).
struct Parser<'t> {
	tokens: &'t [SpannedToken],
	cursor: usize,
}

impl Parser<'_> {
	fn peek(&self) -> Option<&Token> {
		self.tokens.get(self.cursor).map(|t| &t.token)
	}

	fn advance(&mut self) -> Option<&Token> {
		let token = self.tokens.get(self.cursor).map(|t| &t.token);
		self.cursor += 1;
		token
	}

	fn eat(&mut self, expected: &Token) -> bool {
		if self.peek() == Some(expected) {
			self.cursor += 1;
			true
		} else {
			false
		}
	}

	fn eat_keyword(&mut self, keyword: &str) -> bool {
		if matches!(self.peek(), Some(Token::Ident(ident)) if ident == keyword) {
			self.cursor += 1;
			true
		} else {
			false
		}
	}

	fn expect(&mut self, expected: &Token, description: &'static str) -> ExprResult<()> {
		match self.advance() {
			Some(token) if token == expected => Ok(()),
			Some(token) => {
				Err(ExpressionError::UnexpectedToken {
					found: token.to_string(),
					expected: description,
				})
			}
			None => Err(ExpressionError::UnexpectedEnd(description)),
		}
	}

	fn or(&mut self) -> ExprResult<Expr> {
		let mut left = self.and()?;
		while self.eat_keyword("or") {
			let right = self.and()?;
			left = Expr::Or(Box::new(left), Box::new(right));
		}
		Ok(left)
	}

	fn and(&mut self) -> ExprResult<Expr> {
		let mut left = self.not()?;
		while self.eat_keyword("and") {
			let right = self.not()?;
			left = Expr::And(Box::new(left), Box::new(right));
		}
		Ok(left)
	}

	fn not(&mut self) -> ExprResult<Expr> {
		if self.eat_keyword("not") {
			let operand = self.not()?;
			return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
		}
		self.comparison()
	}

	fn comparison(&mut self) -> ExprResult<Expr> {
		let first = self.additive()?;
		let mut chain = vec![];

		loop {
			let op = match self.peek() {
				Some(Token::EqEq) => CompareOp::Eq,
				Some(Token::NotEq) => CompareOp::NotEq,
				Some(Token::Lt) => CompareOp::Lt,
				Some(Token::Le) => CompareOp::Le,
				Some(Token::Gt) => CompareOp::Gt,
				Some(Token::Ge) => CompareOp::Ge,
				_ => break,
			};
			self.cursor += 1;
			chain.push((op, self.additive()?));
		}

		if chain.is_empty() {
			Ok(first)
		} else {
			Ok(Expr::Compare(Box::new(first), chain))
		}
	}

	fn additive(&mut self) -> ExprResult<Expr> {
		let mut left = self.multiplicative()?;
		loop {
			let op = match self.peek() {
				Some(Token::Plus) => BinaryOp::Add,
				Some(Token::Minus) => BinaryOp::Sub,
				_ => break,
			};
			self.cursor += 1;
			let right = self.multiplicative()?;
			left = Expr::Binary(op, Box::new(left), Box::new(right));
		}
		Ok(left)
	}

	fn multiplicative(&mut self) -> ExprResult<Expr> {
		let mut left = self.unary()?;
		loop {
			let op = match self.peek() {
				Some(Token::Star) => BinaryOp::Mul,
				Some(Token::Slash) => BinaryOp::Div,
				Some(Token::DoubleSlash) => BinaryOp::FloorDiv,
				Some(Token::Percent) => BinaryOp::Mod,
				_ => break,
			};
			self.cursor += 1;
			let right = self.unary()?;
			left = Expr::Binary(op, Box::new(left), Box::new(right));
		}
		Ok(left)
	}

	fn unary(&mut self) -> ExprResult<Expr> {
		if self.eat(&Token::Minus) {
			return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)));
		}
		if self.eat(&Token::Plus) {
			return Ok(Expr::Unary(UnaryOp::Pos, Box::new(self.unary()?)));
		}
		self.power()
	}

	/// `**` is right associative and binds tighter than a unary operator on
	/// its left, so `-2 ** 2` is `-4`.
	fn power(&mut self) -> ExprResult<Expr> {
		let base = self.postfix()?;
		if self.eat(&Token::DoubleStar) {
			let exponent = self.unary()?;
			return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
		}
		Ok(base)
	}

	fn postfix(&mut self) -> ExprResult<Expr> {
		let mut expr = self.atom()?;
		loop {
			match self.peek() {
				Some(Token::BracketOpen) => {
					self.cursor += 1;
					let index = self.or()?;
					self.expect(&Token::BracketClose, "`]`")?;
					expr = Expr::Index(Box::new(expr), Box::new(index));
				}
				Some(Token::ParenOpen) => return Err(ExpressionError::Unsupported("function call")),
				Some(Token::Dot) => return Err(ExpressionError::Unsupported("attribute access")),
				_ => return Ok(expr),
			}
		}
	}

	fn atom(&mut self) -> ExprResult<Expr> {
		let Some(token) = self.advance().cloned() else {
			return Err(ExpressionError::UnexpectedEnd("an expression"));
		};

		let expr = match token {
			Token::Int(value) => Expr::Literal(Value::Int(value)),
			Token::Float(value) => Expr::Literal(Value::Float(value)),
			Token::String(value) => {
				// Adjacent string literals are concatenated.
				let mut value = value;
				while let Some(Token::String(next)) = self.peek().cloned() {
					value.push_str(&next);
					self.cursor += 1;
				}
				Expr::Literal(Value::String(value))
			}
			Token::FString(template) => Expr::FString(parse_fstring(&template)?),
			Token::Ident(ident) => {
				match ident.as_str() {
					"true" | "True" => Expr::Literal(Value::Bool(true)),
					"false" | "False" => Expr::Literal(Value::Bool(false)),
					"null" | "None" => Expr::Literal(Value::Null),
					"and" | "or" | "not" => {
						return Err(ExpressionError::UnexpectedToken {
							found: ident,
							expected: "an expression",
						});
					}
					_ => Expr::Name(ident),
				}
			}
			Token::ParenOpen => {
				let inner = self.or()?;
				self.expect(&Token::ParenClose, "`)`")?;
				inner
			}
			Token::BracketOpen => Expr::List(self.list()?),
			Token::BraceOpen => Expr::Map(self.map()?),
			other => {
				return Err(ExpressionError::UnexpectedToken {
					found: other.to_string(),
					expected: "an expression",
				});
			}
		};

		Ok(expr)
	}

	fn list(&mut self) -> ExprResult<Vec<Expr>> {
		let mut items = vec![];
		loop {
			if self.eat(&Token::BracketClose) {
				return Ok(items);
			}
			items.push(self.or()?);
			if !self.eat(&Token::Comma) {
				self.expect(&Token::BracketClose, "`,` or `]`")?;
				return Ok(items);
			}
		}
	}

	fn map(&mut self) -> ExprResult<Vec<(Expr, Expr)>> {
		let mut entries = vec![];
		loop {
			if self.eat(&Token::BraceClose) {
				return Ok(entries);
			}
			let key = self.or()?;
			self.expect(&Token::Colon, "`:`")?;
			let value = self.or()?;
			entries.push((key, value));
			if !self.eat(&Token::Comma) {
				self.expect(&Token::BraceClose, "`,` or `}`")?;
				return Ok(entries);
			}
		}
	}
}

/// Split an f-string template into text and embedded expressions. `{{` and
/// `}}` escape literal braces.
fn parse_fstring(template: &str) -> ExprResult<Vec<FStringPart>> {
	let mut parts = vec![];
	let mut text = String::new();
	let mut chars = template.char_indices().peekable();

	while let Some((index, ch)) = chars.next() {
		match ch {
			'{' if chars.peek().is_some_and(|(_, next)| *next == '{') => {
				chars.next();
				text.push('{');
			}
			'}' if chars.peek().is_some_and(|(_, next)| *next == '}') => {
				chars.next();
				text.push('}');
			}
			'{' => {
				let start = index + 1;
				let mut depth = 0usize;
				let mut end = None;
				for (inner_index, inner) in chars.by_ref() {
					match inner {
						'{' | '[' | '(' => depth += 1,
						'}' if depth == 0 => {
							end = Some(inner_index);
							break;
						}
						'}' | ']' | ')' => depth = depth.saturating_sub(1),
						_ => {}
					}
				}
				let Some(end) = end else {
					return Err(ExpressionError::UnexpectedEnd("`}` in f-string"));
				};
				if !text.is_empty() {
					parts.push(FStringPart::Text(std::mem::take(&mut text)));
				}
				parts.push(FStringPart::Expr(parse_expression(&template[start..end])?));
			}
			'}' => {
				return Err(ExpressionError::UnexpectedToken {
					found: "}".to_string(),
					expected: "`}}` in f-string",
				});
			}
			ch => text.push(ch),
		}
	}

	if !text.is_empty() {
		parts.push(FStringPart::Text(text));
	}

	Ok(parts)
}

/// Evaluate an expression with the names bound so far in scope.
pub fn evaluate(expr: &Expr, scope: &Arguments) -> ExprResult<Value> {
	match expr {
		Expr::Literal(value) => Ok(value.clone()),
		Expr::Name(name) => {
			scope
				.get(name)
				.cloned()
				.ok_or_else(|| ExpressionError::UnknownName(name.clone()))
		}
		Expr::FString(parts) => {
			let mut out = String::new();
			for part in parts {
				match part {
					FStringPart::Text(text) => out.push_str(text),
					FStringPart::Expr(expr) => out.push_str(&evaluate(expr, scope)?.to_string()),
				}
			}
			Ok(Value::String(out))
		}
		Expr::List(items) => {
			items
				.iter()
				.map(|item| evaluate(item, scope))
				.collect::<ExprResult<Vec<_>>>()
				.map(Value::List)
		}
		Expr::Map(entries) => {
			let mut map: Vec<(String, Value)> = Vec::with_capacity(entries.len());
			for (key, value) in entries {
				let key = match evaluate(key, scope)? {
					Value::String(key) => key,
					other => {
						return Err(ExpressionError::OperandTypes {
							operator: "{}",
							left: "mapping key",
							right: other.type_name(),
						});
					}
				};
				let value = evaluate(value, scope)?;
				if let Some(slot) = map.iter_mut().find(|(k, _)| *k == key) {
					slot.1 = value;
				} else {
					map.push((key, value));
				}
			}
			Ok(Value::Map(map))
		}
		Expr::Unary(op, operand) => unary(*op, evaluate(operand, scope)?),
		Expr::Binary(op, left, right) => {
			binary(*op, evaluate(left, scope)?, evaluate(right, scope)?)
		}
		Expr::Compare(first, chain) => {
			let mut left = evaluate(first, scope)?;
			for (op, right) in chain {
				let right = evaluate(right, scope)?;
				if !compare(*op, &left, &right)? {
					return Ok(Value::Bool(false));
				}
				left = right;
			}
			Ok(Value::Bool(true))
		}
		Expr::And(left, right) => {
			let left = evaluate(left, scope)?;
			if left.is_truthy() {
				evaluate(right, scope)
			} else {
				Ok(left)
			}
		}
		Expr::Or(left, right) => {
			let left = evaluate(left, scope)?;
			if left.is_truthy() {
				Ok(left)
			} else {
				evaluate(right, scope)
			}
		}
		Expr::Index(target, index) => {
			let target = evaluate(target, scope)?;
			let index = evaluate(index, scope)?;
			subscript(&target, &index)
		}
	}
}

fn unary(op: UnaryOp, operand: Value) -> ExprResult<Value> {
	match (op, operand) {
		(UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
		(UnaryOp::Neg, Value::Int(i)) => i.checked_neg().map(Value::Int).ok_or(ExpressionError::Overflow),
		(UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(OrderedFloat(-f.0))),
		(UnaryOp::Pos, value @ (Value::Int(_) | Value::Float(_))) => Ok(value),
		(op, value) => {
			Err(ExpressionError::UnaryOperandType {
				operator: if op == UnaryOp::Neg { "-" } else { "+" },
				operand: value.type_name(),
			})
		}
	}
}

fn as_float(value: &Value) -> Option<f64> {
	match value {
		Value::Int(i) => Some(*i as f64),
		Value::Float(f) => Some(f.0),
		_ => None,
	}
}

/// Largest string (in bytes) or list (in items) a repetition may produce.
const MAX_REPEAT_LEN: usize = crate::DEFAULT_MAX_FILE_SIZE as usize;

/// Number of repetitions after checking that `len * times` stays within
/// [`MAX_REPEAT_LEN`]. Negative counts repeat zero times.
fn repeat_count(len: usize, times: i64) -> ExprResult<usize> {
	let times = usize::try_from(times).unwrap_or(0);
	match len.checked_mul(times) {
		Some(total) if total <= MAX_REPEAT_LEN => Ok(times),
		_ => Err(ExpressionError::Overflow),
	}
}

fn repeat<T: Clone>(items: &[T], times: i64) -> ExprResult<Vec<T>> {
	let times = repeat_count(items.len(), times)?;
	let mut out = Vec::with_capacity(items.len() * times);
	for _ in 0..times {
		out.extend_from_slice(items);
	}
	Ok(out)
}

fn binary(op: BinaryOp, left: Value, right: Value) -> ExprResult<Value> {
	let type_error = |left: &Value, right: &Value| {
		ExpressionError::OperandTypes {
			operator: op.symbol(),
			left: left.type_name(),
			right: right.type_name(),
		}
	};

	match (op, &left, &right) {
		(BinaryOp::Add, Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
		(BinaryOp::Add, Value::List(a), Value::List(b)) => {
			Ok(Value::List(a.iter().chain(b).cloned().collect()))
		}
		(BinaryOp::Mul, Value::String(s), Value::Int(n))
		| (BinaryOp::Mul, Value::Int(n), Value::String(s)) => {
			Ok(Value::String(s.repeat(repeat_count(s.len(), *n)?)))
		}
		(BinaryOp::Mul, Value::List(items), Value::Int(n))
		| (BinaryOp::Mul, Value::Int(n), Value::List(items)) => Ok(Value::List(repeat(items, *n)?)),
		(_, Value::Int(a), Value::Int(b)) => integer_arithmetic(op, *a, *b),
		_ => {
			let (Some(a), Some(b)) = (as_float(&left), as_float(&right)) else {
				return Err(type_error(&left, &right));
			};
			float_arithmetic(op, a, b)
		}
	}
}

fn integer_arithmetic(op: BinaryOp, a: i64, b: i64) -> ExprResult<Value> {
	let result = match op {
		BinaryOp::Add => a.checked_add(b),
		BinaryOp::Sub => a.checked_sub(b),
		BinaryOp::Mul => a.checked_mul(b),
		BinaryOp::Div => return float_arithmetic(op, a as f64, b as f64),
		BinaryOp::FloorDiv => {
			if b == 0 {
				return Err(ExpressionError::DivisionByZero);
			}
			a.checked_div(b).map(|quotient| {
				if a % b != 0 && ((a < 0) != (b < 0)) {
					quotient - 1
				} else {
					quotient
				}
			})
		}
		BinaryOp::Mod => {
			if b == 0 {
				return Err(ExpressionError::DivisionByZero);
			}
			a.checked_rem(b).map(|rem| {
				if rem != 0 && ((rem < 0) != (b < 0)) {
					rem + b
				} else {
					rem
				}
			})
		}
		BinaryOp::Pow => {
			let Ok(exponent) = u32::try_from(b) else {
				if b < 0 {
					return float_arithmetic(op, a as f64, b as f64);
				}
				return Err(ExpressionError::Overflow);
			};
			a.checked_pow(exponent)
		}
	};

	result.map(Value::Int).ok_or(ExpressionError::Overflow)
}

fn float_arithmetic(op: BinaryOp, a: f64, b: f64) -> ExprResult<Value> {
	let divides = matches!(op, BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod);
	if divides && b == 0.0 {
		return Err(ExpressionError::DivisionByZero);
	}

	let result = match op {
		BinaryOp::Add => a + b,
		BinaryOp::Sub => a - b,
		BinaryOp::Mul => a * b,
		BinaryOp::Div => a / b,
		BinaryOp::FloorDiv => (a / b).floor(),
		BinaryOp::Mod => a - b * (a / b).floor(),
		BinaryOp::Pow => a.powf(b),
	};

	Ok(Value::Float(OrderedFloat(result)))
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> ExprResult<bool> {
	use std::cmp::Ordering;

	let ordering = match (left, right) {
		(Value::String(a), Value::String(b)) => Some(a.cmp(b)),
		_ => {
			match (as_float(left), as_float(right)) {
				(Some(a), Some(b)) => a.partial_cmp(&b),
				_ => None,
			}
		}
	};

	match (op, ordering) {
		(CompareOp::Eq, None) => Ok(left == right),
		(CompareOp::NotEq, None) => Ok(left != right),
		(CompareOp::Eq, Some(ordering)) => Ok(ordering == Ordering::Equal),
		(CompareOp::NotEq, Some(ordering)) => Ok(ordering != Ordering::Equal),
		(CompareOp::Lt, Some(ordering)) => Ok(ordering == Ordering::Less),
		(CompareOp::Le, Some(ordering)) => Ok(ordering != Ordering::Greater),
		(CompareOp::Gt, Some(ordering)) => Ok(ordering == Ordering::Greater),
		(CompareOp::Ge, Some(ordering)) => Ok(ordering != Ordering::Less),
		(op, None) => {
			Err(ExpressionError::OperandTypes {
				operator: op.symbol(),
				left: left.type_name(),
				right: right.type_name(),
			})
		}
	}
}

fn subscript(target: &Value, index: &Value) -> ExprResult<Value> {
	let position = |len: usize, index: i64| -> ExprResult<usize> {
		let len_i = len as i64;
		let resolved = if index < 0 { index + len_i } else { index };
		if (0..len_i).contains(&resolved) {
			Ok(resolved as usize)
		} else {
			Err(ExpressionError::Index(format!("index {index} out of range")))
		}
	};

	match (target, index) {
		(Value::List(items), Value::Int(i)) => Ok(items[position(items.len(), *i)?].clone()),
		(Value::String(s), Value::Int(i)) => {
			let chars: Vec<char> = s.chars().collect();
			Ok(Value::String(chars[position(chars.len(), *i)?].to_string()))
		}
		(Value::Map(_), Value::String(key)) => {
			target
				.get(key)
				.cloned()
				.ok_or_else(|| ExpressionError::Index(format!("key {key:?} not found")))
		}
		_ => {
			Err(ExpressionError::OperandTypes {
				operator: "[]",
				left: target.type_name(),
				right: index.type_name(),
			})
		}
	}
}
