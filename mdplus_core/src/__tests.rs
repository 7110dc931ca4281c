use std::path::Path;
use std::path::PathBuf;

use rstest::rstest;
use similar_asserts::assert_eq;
use tracing_test::traced_test;

use super::*;

// --- Test generators ---

/// Renders its `text` argument.
struct Echo;

struct EchoGenerator {
	text: String,
}

impl GeneratorPlugin for Echo {
	fn meta(&self) -> GeneratorMeta {
		GeneratorMeta {
			command: "test.echo",
			description: "Echo the `text` argument",
			arguments: &[ArgumentMeta {
				name: "text",
				description: "Text to render",
				default: Some("\"hello\""),
			}],
		}
	}

	fn bind(&self, binder: &mut ArgumentBinder<'_>) -> MdpResult<Box<dyn Generator>> {
		let text = binder.get("text", "hello")?;
		Ok(Box::new(EchoGenerator { text }))
	}
}

impl Generator for EchoGenerator {
	fn render(&self, _context: &GeneratorContext<'_>) -> MdpResult<String> {
		Ok(self.text.clone())
	}
}

/// Always fails to render.
struct Broken;

struct BrokenGenerator;

impl GeneratorPlugin for Broken {
	fn meta(&self) -> GeneratorMeta {
		GeneratorMeta {
			command: "test.broken",
			description: "Fails every render",
			arguments: &[],
		}
	}

	fn bind(&self, _binder: &mut ArgumentBinder<'_>) -> MdpResult<Box<dyn Generator>> {
		Ok(Box::new(BrokenGenerator))
	}
}

impl Generator for BrokenGenerator {
	fn render(&self, _context: &GeneratorContext<'_>) -> MdpResult<String> {
		Err(MdpError::generator("test.broken", "out of ink"))
	}
}

/// Lists the file names of the document's directory.
struct Siblings;

struct SiblingsGenerator {
	header: String,
}

impl GeneratorPlugin for Siblings {
	fn meta(&self) -> GeneratorMeta {
		GeneratorMeta {
			command: "test.siblings",
			description: "List sibling files",
			arguments: &[],
		}
	}

	fn bind(&self, binder: &mut ArgumentBinder<'_>) -> MdpResult<Box<dyn Generator>> {
		let header = binder.header("## Files")?;
		Ok(Box::new(SiblingsGenerator { header }))
	}
}

impl Generator for SiblingsGenerator {
	fn render(&self, context: &GeneratorContext<'_>) -> MdpResult<String> {
		let directory = context
			.workspace
			.directory(context.document_dir())
			.ok_or_else(|| MdpError::generator("test.siblings", "unknown directory"))?;
		let mut lines = vec![self.header.clone()];
		for path in &directory.documents {
			if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
				lines.push(format!("- {name}"));
			}
		}
		Ok(lines.join("\n"))
	}
}

fn registry() -> GeneratorRegistry {
	GeneratorRegistry::new()
		.with_generator(Echo)
		.with_generator(Broken)
		.with_generator(Siblings)
}

fn write(path: &Path, content: &str) {
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("mkdir: {e}"));
	}
	std::fs::write(path, content).unwrap_or_else(|e| panic!("write: {e}"));
}

fn read(path: &Path) -> String {
	std::fs::read_to_string(path).unwrap_or_else(|e| panic!("read: {e}"))
}

fn empty_workspace() -> (tempfile::TempDir, Workspace) {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let workspace = Workspace::scan_with_options(tmp.path(), ScanOptions::default())
		.unwrap_or_else(|e| panic!("scan: {e}"));
	(tmp, workspace)
}

fn process(text: &str) -> DocumentPass {
	let (tmp, workspace) = empty_workspace();
	let document = Document::new(tmp.path().join("readme.md"));
	document.process_text(text, &workspace, &registry())
}

// --- Comment grammar ---

#[rstest]
#[case::markdown("readme.md", CommentStyle::Markdown)]
#[case::mdx("page.MDX", CommentStyle::Markdown)]
#[case::python("setup.py", CommentStyle::Python)]
#[case::cpp("main.cpp", CommentStyle::C)]
#[case::launch("robot.launch.xml", CommentStyle::C)]
#[case::no_extension("LICENSE", CommentStyle::C)]
fn grammar_is_selected_by_extension(#[case] name: &str, #[case] expected: CommentStyle) {
	assert_eq!(CommentGrammar::for_path(Path::new(name)).style, expected);
}

#[test]
fn grammar_finds_earliest_delimiter() {
	let text = "x ''' y \"\"\" z";
	assert_eq!(PYTHON.find_start(text, 0), Some((2, "'''")));
	assert_eq!(PYTHON.find_start(text, 3), Some((8, "\"\"\"")));
	assert_eq!(MARKDOWN.find_start(text, 0), None);
}

// --- Block matcher ---

#[test]
fn matches_single_block() {
	let text = "# Title\n<!-- MD+:test.echo text = \"hi\" -->\nold\n<!-- MD+FIN:test.echo -->\ntail\n";
	let blocks = find_blocks(text, &MARKDOWN);

	assert_eq!(blocks.len(), 1);
	let block = &blocks[0];
	assert_eq!(block.command, "test.echo");
	assert_eq!(block.arguments, " text = \"hi\" ");
	assert_eq!(block.opening.start, Point::new(2, 1, 8));
	assert_eq!(
		&text[block.span.range()],
		"<!-- MD+:test.echo text = \"hi\" -->\nold\n<!-- MD+FIN:test.echo -->"
	);
	let closing = block.closing.unwrap_or_else(|| panic!("expected closing tag"));
	assert_eq!(closing.start.line, 4);
	assert_eq!(block.body().map(|range| &text[range]), Some("\nold\n"));
	assert!(!block.is_literal());
}

#[test]
fn matches_multi_line_arguments() {
	let text = "<!--\nMD+:generate.content\nheader = \"# Dirs\"\npath = \"docs\"\n-->\n<!-- \
	            MD+FIN:generate.content -->";
	let blocks = find_blocks(text, &MARKDOWN);

	assert_eq!(blocks.len(), 1);
	assert_eq!(blocks[0].command, "generate.content");
	assert_eq!(blocks[0].arguments, "\nheader = \"# Dirs\"\npath = \"docs\"\n");
}

#[test]
fn command_stops_at_end_delimiter() {
	let text = "<!-- MD+:test.echo-->\n<!-- MD+FIN:test.echo-->";
	let blocks = find_blocks(text, &MARKDOWN);

	assert_eq!(blocks.len(), 1);
	assert_eq!(blocks[0].command, "test.echo");
	assert_eq!(blocks[0].arguments, "");
	assert!(blocks[0].closing.is_some());
}

#[rstest]
#[case::python(&PYTHON, "\"\"\" MD+:test.echo \"\"\"\nold\n\"\"\" MD+FIN:test.echo \"\"\"\n")]
#[case::python_single(&PYTHON, "''' MD+:test.echo '''\nold\n''' MD+FIN:test.echo '''\n")]
#[case::c_style(&C_STYLE, "/* MD+:test.echo */\nold\n/* MD+FIN:test.echo */\n")]
fn matches_other_grammars(#[case] grammar: &CommentGrammar, #[case] text: &str) {
	let blocks = find_blocks(text, grammar);

	assert_eq!(blocks.len(), 1);
	assert_eq!(blocks[0].command, "test.echo");
	assert!(blocks[0].closing.is_some());
}

#[test]
fn closing_tag_must_match_whole_command() {
	let text = "<!-- MD+:foo -->\n<!-- MD+FIN:foobar -->\n<!-- MD+FIN:foo -->";
	let blocks = find_blocks(text, &MARKDOWN);

	assert_eq!(blocks.len(), 1);
	assert_eq!(blocks[0].closing.map(|closing| closing.start.line), Some(3));
}

#[test]
fn closing_tag_is_case_sensitive() {
	let text = "<!-- MD+:foo -->\n<!-- MD+FIN:FOO -->";
	let blocks = find_blocks(text, &MARKDOWN);

	assert_eq!(blocks.len(), 1);
	assert!(blocks[0].closing.is_none());
}

#[test]
fn nested_openings_are_not_matched() {
	let text = "<!-- MD+:outer -->\n<!-- MD+:inner -->\n<!-- MD+FIN:inner -->\n<!-- MD+FIN:outer \
	            -->\n<!-- MD+:after -->\n<!-- MD+FIN:after -->";
	let commands: Vec<String> = find_blocks(text, &MARKDOWN)
		.into_iter()
		.map(|block| block.command)
		.collect();

	assert_eq!(commands, vec!["outer".to_string(), "after".to_string()]);
}

#[test]
#[traced_test]
fn unclosed_block_spans_rest_of_document() {
	let text = "intro\n<!-- MD+:lonely -->\nrest\n<!-- MD+:other -->\n<!-- MD+FIN:other -->";
	let blocks = find_blocks(text, &MARKDOWN);

	assert_eq!(blocks.len(), 1);
	assert!(blocks[0].closing.is_none());
	assert!(blocks[0].is_literal());
	assert_eq!(blocks[0].span.end.offset, text.len());
	assert!(logs_contain("missing closing tag"));
}

#[test]
fn reserved_blocks_without_closing_cover_opening_only() {
	let text = "<!-- MD+:META title = \"x\" -->\n<!-- MD+:test.echo -->\n<!-- MD+FIN:test.echo -->";
	let blocks = find_blocks(text, &MARKDOWN);

	assert_eq!(blocks.len(), 2);
	assert!(blocks[0].is_reserved());
	assert!(blocks[0].closing.is_none());
	assert_eq!(&text[blocks[0].span.range()], "<!-- MD+:META title = \"x\" -->");
	assert_eq!(blocks[1].command, "test.echo");
}

#[rstest]
#[case("META")]
#[case("meta")]
#[case("TODO")]
#[case("todo")]
#[case("TODO:")]
fn reserved_commands(#[case] command: &str) {
	assert!(is_reserved_command(command));
}

#[test]
fn reserved_block_with_closing_spans_both_tags() {
	let text = "<!-- MD+:TODO -->\nnote\n<!-- MD+FIN:TODO -->\n";
	let blocks = find_blocks(text, &MARKDOWN);

	assert_eq!(blocks.len(), 1);
	assert!(blocks[0].closing.is_some());
	assert!(blocks[0].is_literal());
}

#[test]
fn plain_comments_are_ignored() {
	let text = "<!-- just a comment -->\n<!-- MD+: -->\n<!-- MD+FIN:x -->";
	assert!(find_blocks(text, &MARKDOWN).is_empty());
}

#[test]
fn scanner_restarts_from_offset() {
	let text = "<!-- MD+:a -->\n<!-- MD+FIN:a -->\n<!-- MD+:b -->\n<!-- MD+FIN:b -->";
	let mut scanner = BlockScanner::new(text, &MARKDOWN);
	let first = scanner.next().unwrap_or_else(|| panic!("expected block"));
	assert_eq!(scanner.offset(), first.span.end.offset);

	let rest: Vec<Block> = BlockScanner::from_offset(text, &MARKDOWN, first.span.end.offset).collect();
	assert_eq!(rest.len(), 1);
	assert_eq!(rest[0].command, "b");
	assert_eq!(rest[0].opening.start.line, 3);
}

// --- Argument evaluator ---

#[test]
fn arguments_refer_to_earlier_names() {
	let arguments = Arguments::parse("x = 1\ny = \"a\"\nz = x + 1");

	assert_eq!(arguments.names().collect::<Vec<_>>(), vec!["x", "y", "z"]);
	assert_eq!(arguments.get("x"), Some(&Value::Int(1)));
	assert_eq!(arguments.get("y"), Some(&Value::from("a")));
	assert_eq!(arguments.get("z"), Some(&Value::Int(2)));
}

#[rstest]
#[case::empty("")]
#[case::whitespace("  \n\t \n")]
#[case::comment_only("# nothing here")]
fn empty_arguments(#[case] source: &str) {
	assert!(Arguments::parse(source).is_empty());
}

#[test]
fn arguments_are_dedented_and_span_lines_inside_brackets() {
	let source = "\n    title = 'Docs'\n    items = [\n        1,\n        2,  # trailing\n    ]\n";
	let arguments = Arguments::parse(source);

	assert_eq!(arguments.get("title"), Some(&Value::from("Docs")));
	assert_eq!(
		arguments.get("items"),
		Some(&Value::List(vec![Value::Int(1), Value::Int(2)]))
	);
}

#[test]
fn arguments_split_on_semicolons() {
	let arguments = Arguments::parse("x = 1; y = x * 2  # double");

	assert_eq!(arguments.get("x"), Some(&Value::Int(1)));
	assert_eq!(arguments.get("y"), Some(&Value::Int(2)));
}

#[test]
fn later_assignment_replaces_earlier_in_place() {
	let arguments = Arguments::parse("a = 1\nb = 2\na = a + 10");

	assert_eq!(arguments.names().collect::<Vec<_>>(), vec!["a", "b"]);
	assert_eq!(arguments.get("a"), Some(&Value::Int(11)));
}

#[test]
#[traced_test]
fn failing_statement_binds_null_and_continues() {
	let (arguments, errors) = Arguments::parse_with_errors("a = 1 / 0\nb = a\nc = \"ok\"");

	assert_eq!(arguments.get("a"), Some(&Value::Null));
	assert_eq!(arguments.get("b"), Some(&Value::Null));
	assert_eq!(arguments.get("c"), Some(&Value::from("ok")));
	assert_eq!(errors.len(), 1);
	assert_eq!(errors[0].line, 1);
	assert_eq!(errors[0].name.as_deref(), Some("a"));
	assert_eq!(errors[0].error, ExpressionError::DivisionByZero);

	Arguments::parse("broken = [1, 2");
	assert!(logs_contain("failed to parse argument"));
}

#[test]
fn non_name_target_is_skipped() {
	let (arguments, errors) = Arguments::parse_with_errors("1 = 2\nx[0] = 3\nc = 3");

	assert_eq!(arguments.names().collect::<Vec<_>>(), vec!["c"]);
	assert_eq!(errors.len(), 2);
	assert!(errors.iter().all(|error| error.name.is_none()));
	assert!(matches!(errors[0].error, ExpressionError::InvalidTarget(_)));
}

#[test]
fn arguments_round_trip_through_source() {
	let mut arguments = Arguments::new();
	arguments.insert("header", "# Say \"hi\"\n\tnow \\ later");
	arguments.insert("count", 3_i64);
	arguments.insert("ratio", 0.5);
	arguments.insert("whole", 2.0);
	arguments.insert("enabled", false);
	arguments.insert("missing", Value::Null);
	arguments.insert("tags", vec!["a", "b"]);
	arguments.insert(
		"nested",
		Value::Map(vec![
			("k".to_string(), Value::Int(-1)),
			("l".to_string(), Value::List(vec![])),
		]),
	);

	let source = arguments.to_source();
	assert!(source.starts_with("header = \"# Say \\\"hi\\\"\\n\\tnow \\\\ later\"\n"));
	assert!(source.contains("whole = 2.0\n"));

	let (parsed, errors) = Arguments::parse_with_errors(&source);
	assert!(errors.is_empty(), "{errors:?}");
	assert_eq!(parsed, arguments);
}

#[test]
fn extreme_integers_round_trip() {
	let mut arguments = Arguments::new();
	arguments.insert("low", i64::MIN);
	arguments.insert("high", i64::MAX);

	let source = arguments.to_source();
	assert!(source.starts_with("low = (-9223372036854775807 - 1)\n"));

	let (parsed, errors) = Arguments::parse_with_errors(&source);
	assert!(errors.is_empty(), "{errors:?}");
	assert_eq!(parsed, arguments);
}

#[rstest]
#[case::precedence("1 + 2 * 3", Value::Int(7))]
#[case::parentheses("(1 + 2) * 3", Value::Int(9))]
#[case::power_right_assoc("2 ** 3 ** 2", Value::Int(512))]
#[case::power_binds_tighter("-2 ** 2", Value::Int(-4))]
#[case::negative_power("2 ** -1", Value::from(0.5))]
#[case::floor_div("7 // 2", Value::Int(3))]
#[case::floor_div_negative("-7 // 2", Value::Int(-4))]
#[case::modulo_negative("-7 % 3", Value::Int(2))]
#[case::true_div("7 / 2", Value::from(3.5))]
#[case::mixed("1 + 0.5", Value::from(1.5))]
#[case::string_concat("\"ab\" + 'cd'", Value::from("abcd"))]
#[case::string_repeat("\"ab\" * 3", Value::from("ababab"))]
#[case::negative_repeat("3 * -1 * \"ab\"", Value::from(""))]
#[case::adjacent_strings("\"a\" \"b\"", Value::from("ab"))]
#[case::list_concat("[1] + [2, 3]", Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))]
#[case::chained_comparison("1 < 2 <= 2", Value::Bool(true))]
#[case::numeric_equality("1 == 1.0", Value::Bool(true))]
#[case::string_order("\"a\" < \"b\"", Value::Bool(true))]
#[case::and_returns_operand("not 0 and 'x'", Value::from("x"))]
#[case::or_returns_operand("None or \"fallback\"", Value::from("fallback"))]
#[case::python_literals("True != False", Value::Bool(true))]
#[case::negative_index("[10, 20, 30][-1]", Value::Int(30))]
#[case::string_index("\"abc\"[1]", Value::from("b"))]
#[case::map_index("{\"a\": 1}[\"a\"]", Value::Int(1))]
#[case::fstring("f\"v{1 + 1}!\"", Value::from("v2!"))]
#[case::fstring_braces("f'{{literal}}'", Value::from("{literal}"))]
#[case::escapes("\"tab\\there\"", Value::from("tab\there"))]
fn evaluates_expressions(#[case] source: &str, #[case] expected: Value) -> Result<(), ExpressionError> {
	let expr = parse_expression(source)?;
	assert_eq!(evaluate(&expr, &Arguments::new())?, expected);

	Ok(())
}

#[rstest]
#[case::division_by_zero("1 / 0", ExpressionError::DivisionByZero)]
#[case::modulo_by_zero("1 % 0", ExpressionError::DivisionByZero)]
#[case::overflow("9223372036854775807 + 1", ExpressionError::Overflow)]
#[case::function_call("len(x)", ExpressionError::Unsupported("function call"))]
#[case::attribute("a.b", ExpressionError::Unsupported("attribute access"))]
#[case::unknown_name("missing", ExpressionError::UnknownName("missing".to_string()))]
#[case::bad_operands("\"a\" - 1", ExpressionError::OperandTypes { operator: "-", left: "string", right: "integer" })]
#[case::unterminated("[1, 2", ExpressionError::UnexpectedEnd("`,` or `]`"))]
#[case::out_of_range("[1][3]", ExpressionError::Index("index 3 out of range".to_string()))]
#[case::huge_string_repeat("\"ab\" * 9223372036854775807", ExpressionError::Overflow)]
#[case::huge_list_repeat("[1, 2] * 9223372036854775807", ExpressionError::Overflow)]
#[case::repeat_beyond_limit("\"a\" * 20000000", ExpressionError::Overflow)]
fn rejects_expressions(#[case] source: &str, #[case] expected: ExpressionError) {
	let result = parse_expression(source).and_then(|expr| evaluate(&expr, &Arguments::new()));
	assert_eq!(result, Err(expected));
}

#[test]
fn names_resolve_from_scope() -> Result<(), ExpressionError> {
	let scope = Arguments::parse("base = \"docs\"\ndepth = 2");
	let expr = parse_expression("f\"{base}/{depth * 2}\"")?;
	assert_eq!(evaluate(&expr, &scope)?, Value::from("docs/4"));

	Ok(())
}

#[test]
fn dedent_uses_first_non_blank_line() {
	assert_eq!(dedent("\n  a = 1\n    b = 2\nc = 3"), "\na = 1\n  b = 2\nc = 3");
}

#[test]
fn dedent_only_strips_spaces_and_tabs() {
	assert_eq!(dedent("\t a = 1\n\t  b = 2"), "a = 1\n b = 2");
	assert_eq!(dedent(" a = 1\n\u{a0}b = 2"), "a = 1\n\u{a0}b = 2");
	assert_eq!(dedent("\u{a0}a = 1\n b = 2"), "\u{a0}a = 1\n b = 2");
}

#[test]
fn huge_repetition_binds_null() {
	let (arguments, errors) =
		Arguments::parse_with_errors("x = \"ab\" * 9223372036854775807\ny = 1");
	assert_eq!(arguments.get("x"), Some(&Value::Null));
	assert_eq!(arguments.get("y"), Some(&Value::Int(1)));
	assert_eq!(errors.len(), 1);
}

#[test]
fn non_ascii_indentation_does_not_abort_parsing() {
	let arguments = Arguments::parse(" a = 1\n\u{a0}b = 2");
	assert_eq!(arguments.get("a"), Some(&Value::Int(1)));
	assert_eq!(arguments.get("b"), Some(&Value::Int(2)));
}

// --- Registry ---

#[test]
fn registry_resolves_registered_command() -> MdpResult<()> {
	let registry = registry();
	let plugin = registry.resolve("test.echo")?;

	assert_eq!(plugin.meta().command, "test.echo");
	assert_eq!(registry.commands(), vec!["test.broken", "test.echo", "test.siblings"]);
	assert_eq!(registry.len(), 3);

	Ok(())
}

#[test]
#[traced_test]
fn registry_reports_unknown_command_once() {
	let registry = registry();

	assert!(matches!(
		registry.resolve("test.missing"),
		Err(MdpError::UnknownGenerator(_))
	));
	assert!(matches!(
		registry.resolve("test.missing"),
		Err(MdpError::UnknownGenerator(_))
	));
	logs_assert(|lines: &[&str]| {
		let count = lines
			.iter()
			.filter(|line| line.contains("no generator registered for command `test.missing`"))
			.count();
		if count == 1 {
			Ok(())
		} else {
			Err(format!("expected one report, found {count}"))
		}
	});
}

#[test]
fn registry_rejects_ambiguous_command() {
	let registry = GeneratorRegistry::new().with_generator(Echo).with_generator(Echo);

	assert!(matches!(
		registry.resolve("test.echo"),
		Err(MdpError::AmbiguousGenerator { count: 2, .. })
	));
}

#[rstest]
#[case("generate.content", true)]
#[case("generate.getting_started.pakk", true)]
#[case("_private", true)]
#[case("", false)]
#[case("generate.", false)]
#[case("1st.command", false)]
#[case("has space", false)]
#[case("TODO:", false)]
fn validates_commands(#[case] command: &str, #[case] expected: bool) {
	assert_eq!(is_valid_command(command), expected);
}

#[test]
fn registry_rejects_invalid_command_lookup() {
	assert!(matches!(
		registry().resolve("bad command!"),
		Err(MdpError::InvalidCommand(_))
	));
}

// --- Argument binder ---

#[test]
fn binder_declares_header_eagerly() -> MdpResult<()> {
	let supplied = Arguments::parse("header = \"# Top\"\ntext = \"hi\"\nunused = 1");
	let mut binder = ArgumentBinder::new("test.echo", &supplied);

	assert_eq!(binder.declared().names().collect::<Vec<_>>(), vec!["header"]);
	let text: String = binder.get("text", "default")?;
	assert_eq!(text, "hi");
	assert_eq!(binder.unused(), vec!["unused"]);
	assert_eq!(
		binder.into_declared().names().collect::<Vec<_>>(),
		vec!["header", "text"]
	);

	Ok(())
}

#[test]
fn binder_uses_defaults_for_missing_and_null() -> MdpResult<()> {
	let supplied = Arguments::parse("header = None\nflag = null");
	let mut binder = ArgumentBinder::new("test.echo", &supplied);

	assert!(binder.declared().is_empty());
	assert_eq!(binder.header("# Default")?, "# Default");
	assert!(binder.get::<bool>("flag", true)?);
	assert_eq!(binder.get::<i64>("count", 4_i64)?, 4);
	assert_eq!(binder.optional::<String>("absent")?, None);
	assert_eq!(binder.declared().get("header"), Some(&Value::from("# Default")));

	Ok(())
}

#[test]
fn binder_rejects_wrong_type() {
	let supplied = Arguments::parse("text = 5");
	let mut binder = ArgumentBinder::new("test.echo", &supplied);

	let result = binder.get::<String>("text", "x");
	assert!(matches!(result, Err(MdpError::ArgumentType { ref found, .. }) if found == "integer"));
}

// --- Document reassembly ---

#[test]
fn regenerates_block_and_rebuilds_tags() {
	let text = "# Title\n<!-- MD+:test.echo text = \"hi\" -->\nold\n<!-- MD+FIN:test.echo -->\ntail\n";
	let pass = process(text);

	assert_eq!(
		pass.text,
		"# Title\n<!-- MD+:test.echo \ntext = \"hi\"\n-->\nhi\n<!-- MD+FIN:test.echo -->\ntail\n"
	);
	assert!(pass.is_changed());
	assert_eq!(pass.blocks.len(), 1);
	assert_eq!(pass.blocks[0].status, BlockStatus::Generated);
}

#[test]
fn regeneration_is_idempotent() {
	let text = "<!-- MD+:test.echo\nheader = \"# H\"\ntext = f\"{header}!\"\n-->\n<!-- \
	            MD+FIN:test.echo -->\n<!-- MD+:test.echo -->\n<!-- MD+FIN:test.echo -->";
	let first = process(text);
	let second = process(&first.text);

	assert_eq!(second.text, first.text);
	assert!(!second.is_changed());
	assert!(first.text.contains("\ntext = \"# H!\"\n"));
}

#[test]
fn declared_arguments_replace_supplied_ones() {
	let pass = process("<!-- MD+:test.echo header = \"# Top\"\nextra = 1 -->\n<!-- MD+FIN:test.echo -->");

	assert_eq!(
		pass.text,
		"<!-- MD+:test.echo \nheader = \"# Top\"\ntext = \"hello\"\n-->\nhello\n<!-- \
		 MD+FIN:test.echo -->"
	);
}

#[rstest]
#[case::unresolved("a\n<!-- MD+:test.unknown -->\nkeep\n<!-- MD+FIN:test.unknown -->\nb")]
#[case::reserved("<!-- MD+:META title = \"x\" -->\nbody")]
#[case::reserved_closed("<!-- MD+:TODO -->\nfix me\n<!-- MD+FIN:TODO -->")]
#[case::unclosed("<!-- MD+:test.echo -->\nnever closed")]
#[case::render_failure("<!-- MD+:test.broken -->\nkeep me\n<!-- MD+FIN:test.broken -->\n")]
#[case::bind_failure("<!-- MD+:test.echo text = 5 -->\nkeep\n<!-- MD+FIN:test.echo -->")]
#[case::no_blocks("just text\n")]
fn leaves_text_untouched(#[case] text: &str) {
	let pass = process(text);

	assert_eq!(pass.text, text);
	assert!(!pass.is_changed());
}

#[test]
#[traced_test]
fn failures_are_reported_per_block() {
	let text = "<!-- MD+:test.broken -->\n<!-- MD+FIN:test.broken -->\n<!-- MD+:test.echo -->\n<!-- \
	            MD+FIN:test.echo -->\n<!-- MD+:test.nope -->\n<!-- MD+FIN:test.nope -->";
	let pass = process(text);

	let statuses: Vec<&BlockStatus> = pass.blocks.iter().map(|block| &block.status).collect();
	assert!(matches!(statuses[0], BlockStatus::Failed(reason) if reason.contains("out of ink")));
	assert_eq!(statuses[1], &BlockStatus::Generated);
	assert!(matches!(statuses[2], BlockStatus::Unresolved(_)));
	assert!(pass.text.contains("\ntext = \"hello\"\n-->\nhello\n<!-- MD+FIN:test.echo -->"));
	assert!(pass.text.starts_with("<!-- MD+:test.broken -->\n<!-- MD+FIN:test.broken -->\n"));
	assert!(pass.text.ends_with("\n<!-- MD+:test.nope -->\n<!-- MD+FIN:test.nope -->"));
	assert!(logs_contain("generator failed, keeping the original block"));
}

#[test]
fn leading_arguments_come_from_first_comment() {
	let text = "\n\n<!-- MD+:META\ntitle = \"Docs\"\n-->\n# Heading\n";
	assert_eq!(
		leading_arguments(text, &MARKDOWN).get("title"),
		Some(&Value::from("Docs"))
	);

	let single = "<!-- MD+:META title = 'One line' -->\n<!-- MD+:META title = 'ignored' -->";
	assert_eq!(
		leading_arguments(single, &MARKDOWN).get("title"),
		Some(&Value::from("One line"))
	);

	let python = "\"\"\"\nMD+:META\ntitle = 'Py'\n\"\"\"\nimport os\n";
	assert_eq!(
		leading_arguments(python, &PYTHON).get("title"),
		Some(&Value::from("Py"))
	);
}

#[rstest]
#[case::text_first("# Heading\n<!-- MD+:META title = \"x\" -->")]
#[case::plain_comment("<!-- no command -->\n")]
#[case::empty("")]
fn leading_arguments_absent(#[case] text: &str) {
	assert!(leading_arguments(text, &MARKDOWN).is_empty());
}

#[rstest]
#[case("README.md", true)]
#[case("readme.md", true)]
#[case("README", true)]
#[case("readme.txt", false)]
#[case("guide.md", false)]
fn detects_readme(#[case] name: &str, #[case] expected: bool) {
	assert_eq!(Document::new(PathBuf::from("/tmp").join(name)).is_readme(), expected);
}

// --- Workspace ---

fn sample_tree(root: &Path) {
	write(
		&root.join("readme.md"),
		"<!-- MD+:test.siblings -->\n<!-- MD+FIN:test.siblings -->\n",
	);
	write(
		&root.join("docs/README.md"),
		"<!-- MD+:META title = \"Documentation\" -->\n# Docs\n",
	);
	write(&root.join("docs/guide.md"), "# Guide\n");
	write(&root.join(".hidden/secret.md"), "# Hidden\n");
	write(&root.join("skipped/MDP_IGNORE"), "");
	write(&root.join("skipped/notes.md"), "# Skipped\n");
	write(&root.join("src/main.py"), "print('hi')\n");
}

#[test]
fn scans_tree_in_sorted_order() -> MdpResult<()> {
	let tmp = tempfile::tempdir()?;
	sample_tree(tmp.path());

	let workspace = Workspace::scan(tmp.path())?;
	let root = workspace.root().to_path_buf();
	let generatable: Vec<PathBuf> = workspace
		.generatable()
		.map(|document| document.path().to_path_buf())
		.collect();

	assert_eq!(
		generatable,
		vec![
			root.join("docs/README.md"),
			root.join("docs/guide.md"),
			root.join("readme.md"),
		]
	);
	assert!(workspace.directory(&root.join("skipped")).is_none());
	assert!(workspace.document(&root.join(".hidden/secret.md")).is_none());

	let python = workspace
		.document(&root.join("src/main.py"))
		.unwrap_or_else(|| panic!("python document missing"));
	assert_eq!(python.grammar().style, CommentStyle::Python);
	assert!(!python.is_generatable());

	let root_dir = workspace
		.directory(&root)
		.unwrap_or_else(|| panic!("root directory missing"));
	assert_eq!(root_dir.directories, vec![root.join("docs"), root.join("src")]);
	assert_eq!(root_dir.readme, Some(root.join("readme.md")));

	let readme = workspace
		.readme(&root.join("docs/./"))
		.unwrap_or_else(|| panic!("docs readme missing"));
	assert_eq!(readme.arguments().get("title"), Some(&Value::from("Documentation")));

	Ok(())
}

#[cfg(unix)]
#[test]
fn directory_reached_twice_is_scanned_once() -> MdpResult<()> {
	let tmp = tempfile::tempdir()?;
	write(&tmp.path().join("a/readme.md"), "# A\n");
	std::os::unix::fs::symlink(tmp.path().join("a"), tmp.path().join("b"))?;

	let workspace = Workspace::scan(tmp.path())?;
	let root = workspace.root().to_path_buf();

	assert!(workspace.document(&root.join("a/readme.md")).is_some());
	assert!(workspace.document(&root.join("b/readme.md")).is_none());
	assert_eq!(workspace.generatable().count(), 1);

	Ok(())
}

#[cfg(unix)]
#[test]
fn symlink_to_ancestor_is_a_cycle() -> MdpResult<()> {
	let tmp = tempfile::tempdir()?;
	write(&tmp.path().join("a/readme.md"), "# A\n");
	std::os::unix::fs::symlink(tmp.path(), tmp.path().join("a/up"))?;

	let result = Workspace::scan(tmp.path());
	assert!(matches!(result, Err(MdpError::SymlinkCycle { .. })));

	Ok(())
}

#[test]
fn missing_root_is_fatal() {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let result = Workspace::scan(&tmp.path().join("nope"));

	assert!(matches!(result, Err(MdpError::RootNotFound(_))));
}

#[test]
fn respects_config_and_gitignore() -> MdpResult<()> {
	let tmp = tempfile::tempdir()?;
	write(
		&tmp.path().join("mdplus.toml"),
		"ignore_marker = \"SKIP\"\n\n[exclude]\npatterns = [\"drafts/\"]\n",
	);
	write(&tmp.path().join(".gitignore"), "build/\n");
	write(&tmp.path().join("drafts/a.md"), "# Draft\n");
	write(&tmp.path().join("build/b.md"), "# Build\n");
	write(&tmp.path().join("custom/SKIP"), "");
	write(&tmp.path().join("custom/c.md"), "# Custom\n");
	write(&tmp.path().join("legacy/MDP_IGNORE"), "");
	write(&tmp.path().join("legacy/d.md"), "# Legacy\n");

	let workspace = Workspace::scan(tmp.path())?;
	let names: Vec<&str> = workspace
		.generatable()
		.map(Document::file_name)
		.collect();

	assert_eq!(names, vec!["d.md"]);
	assert_eq!(workspace.options().ignore_marker, "SKIP");

	Ok(())
}

#[test]
fn invalid_config_is_fatal() -> MdpResult<()> {
	let tmp = tempfile::tempdir()?;
	write(&tmp.path().join("mdplus.toml"), "exclude = [\n");

	assert!(matches!(
		Workspace::scan(tmp.path()),
		Err(MdpError::ConfigParse(_))
	));

	Ok(())
}

#[test]
fn processes_and_writes_workspace() -> MdpResult<()> {
	let tmp = tempfile::tempdir()?;
	sample_tree(tmp.path());
	let registry = registry();

	let workspace = Workspace::scan(tmp.path())?;
	let result = workspace.process(&registry);
	assert!(result.errors.is_empty());
	assert_eq!(result.changed().count(), 1);
	assert!(!result.is_ok());
	assert_eq!(result.write_updates()?, 1);

	assert_eq!(
		read(&tmp.path().join("readme.md")),
		"<!-- MD+:test.siblings \nheader = \"## Files\"\n-->\n## Files\n- readme.md\n<!-- \
		 MD+FIN:test.siblings -->\n"
	);

	let rescanned = Workspace::scan(tmp.path())?;
	let second = rescanned.process(&registry);
	assert!(second.is_ok());
	assert_eq!(second.write_updates()?, 0);

	Ok(())
}

#[test]
fn oversized_documents_are_skipped() -> MdpResult<()> {
	let tmp = tempfile::tempdir()?;
	write(&tmp.path().join("big.md"), &"x".repeat(64));
	write(&tmp.path().join("small.md"), "ok");

	let options = ScanOptions {
		max_file_size: 16,
		..ScanOptions::default()
	};
	let workspace = Workspace::scan_with_options(tmp.path(), options)?;
	let result = workspace.process(&registry());

	assert_eq!(result.passes.len(), 1);
	assert_eq!(result.errors.len(), 1);
	assert!(result.errors[0].message.contains("file too large"));

	Ok(())
}

#[test]
fn processes_selected_paths_only() -> MdpResult<()> {
	let tmp = tempfile::tempdir()?;
	sample_tree(tmp.path());

	let workspace = Workspace::scan(tmp.path())?;
	let root = workspace.root().to_path_buf();
	let result = workspace.process_paths(
		&[root.join("docs/guide.md"), root.join("src/main.py"), root.join("missing.md")],
		&registry(),
	);

	assert_eq!(result.passes.len(), 1);
	assert_eq!(result.passes[0].path, root.join("docs/guide.md"));
	assert_eq!(result.errors.len(), 2);

	Ok(())
}

#[test]
fn writes_to_explicit_target() -> MdpResult<()> {
	let tmp = tempfile::tempdir()?;
	let pass = process("<!-- MD+:test.echo -->\n<!-- MD+FIN:test.echo -->");
	let target = tmp.path().join("out.md");
	pass.write_to(&target)?;

	assert_eq!(read(&target), pass.text);

	Ok(())
}

#[cfg(unix)]
#[test]
fn writing_keeps_permissions_and_symlinks() -> MdpResult<()> {
	use std::os::unix::fs::PermissionsExt;

	let tmp = tempfile::tempdir()?;
	let real = tmp.path().join("real.md");
	let link = tmp.path().join("link.md");
	write(&real, "old\n");
	std::fs::set_permissions(&real, std::fs::Permissions::from_mode(0o640))?;
	std::os::unix::fs::symlink(&real, &link)?;

	let pass = process("<!-- MD+:test.echo -->\n<!-- MD+FIN:test.echo -->");
	pass.write_to(&link)?;

	assert!(std::fs::symlink_metadata(&link)?.file_type().is_symlink());
	assert_eq!(read(&real), pass.text);
	assert_eq!(std::fs::metadata(&real)?.permissions().mode() & 0o777, 0o640);

	Ok(())
}

#[test]
fn normalizes_paths_lexically() {
	assert_eq!(
		normalize_path(Path::new("/a/b/./c/../d")),
		PathBuf::from("/a/b/d")
	);
}
