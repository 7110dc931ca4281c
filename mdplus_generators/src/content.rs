use markdown::ParseOptions;
use markdown::mdast::Node;
use markdown::to_mdast;
use mdplus_core::ArgumentBinder;
use mdplus_core::ArgumentMeta;
use mdplus_core::Directory;
use mdplus_core::Generator;
use mdplus_core::GeneratorContext;
use mdplus_core::GeneratorMeta;
use mdplus_core::GeneratorPlugin;
use mdplus_core::MdpError;
use mdplus_core::MdpResult;
use mdplus_core::Value;
use mdplus_core::Workspace;

pub const CONTENT_COMMAND: &str = "generate.content";
pub const DEFAULT_CONTENT_HEADER: &str = "# Contents of this Repository";

/// Renders a table of the subdirectories of a directory, described by their
/// READMEs.
pub struct ContentPlugin;

impl GeneratorPlugin for ContentPlugin {
	fn meta(&self) -> GeneratorMeta {
		GeneratorMeta {
			command: CONTENT_COMMAND,
			description: "Table of the subdirectories of a directory",
			arguments: &[
				ArgumentMeta {
					name: "header",
					description: "Heading placed above the table",
					default: Some("\"# Contents of this Repository\""),
				},
				ArgumentMeta {
					name: "path",
					description: "Directory to list, relative to the document",
					default: Some("\".\""),
				},
			],
		}
	}

	fn bind(&self, binder: &mut ArgumentBinder<'_>) -> MdpResult<Box<dyn Generator>> {
		let header = binder.header(DEFAULT_CONTENT_HEADER)?;
		let path = binder.get("path", ".")?;
		Ok(Box::new(ContentGenerator { header, path }))
	}
}

struct ContentGenerator {
	header: String,
	path: String,
}

impl Generator for ContentGenerator {
	fn render(&self, context: &GeneratorContext<'_>) -> MdpResult<String> {
		let dir = context.resolve(&self.path);
		let Some(directory) = context.workspace.directory(&dir) else {
			return Err(MdpError::generator(
				CONTENT_COMMAND,
				format!("directory `{}` is not part of the workspace", dir.display()),
			));
		};

		tracing::debug!(path = %dir.display(), "listing directory contents");

		let mut rows = vec![];
		for subdir in &directory.directories {
			let Some(subdir) = context.workspace.directory(subdir) else {
				continue;
			};
			let name = subdir.name();
			if name.starts_with('.') || name.starts_with('_') {
				continue;
			}
			rows.push([
				format!("[`{name}`]({name})"),
				describe(context.workspace, subdir)?,
			]);
		}

		Ok(format!(
			"{}\n\n{}",
			self.header,
			markdown_table(["Dir", "Content"], &rows)
		))
	}
}

/// The description of a directory: its README's `title` argument, else the
/// README's first paragraph line, else its first heading, else its name.
fn describe(workspace: &Workspace, directory: &Directory) -> MdpResult<String> {
	let Some(readme) = workspace.readme(&directory.path) else {
		return Ok(directory.name().to_string());
	};

	match readme.arguments().get("title") {
		Some(Value::Null) | None => {}
		Some(title) => return Ok(title.to_string()),
	}

	let text = readme.read()?;
	Ok(readme_summary(&text)?.unwrap_or_else(|| directory.name().to_string()))
}

/// The first line of the first paragraph, falling back to the text of the
/// first heading.
pub fn readme_summary(text: &str) -> MdpResult<Option<String>> {
	let mdast = to_mdast(text, &ParseOptions::gfm()).map_err(|e| MdpError::Markdown(e.to_string()))?;
	let Some(children) = mdast.children() else {
		return Ok(None);
	};

	let first_line = |node: &Node| {
		node.to_string()
			.lines()
			.map(str::trim)
			.find(|line| !line.is_empty())
			.map(str::to_string)
	};

	let paragraph = children
		.iter()
		.filter(|node| matches!(node, Node::Paragraph(_)))
		.find_map(first_line);
	if paragraph.is_some() {
		return Ok(paragraph);
	}

	Ok(children
		.iter()
		.filter(|node| matches!(node, Node::Heading(_)))
		.find_map(first_line))
}

/// Render rows as a Markdown table with padded columns. Pipes inside cells
/// are escaped.
pub fn markdown_table<const N: usize>(headers: [&str; N], rows: &[[String; N]]) -> String {
	let escape = |cell: &str| cell.replace('|', "\\|");
	let rows: Vec<[String; N]> = rows
		.iter()
		.map(|row| std::array::from_fn(|index| escape(&row[index])))
		.collect();

	let mut widths = headers.map(|header| header.chars().count().max(3));
	for row in &rows {
		for (width, cell) in widths.iter_mut().zip(row) {
			*width = (*width).max(cell.chars().count());
		}
	}

	let line = |cells: Vec<String>| format!("| {} |", cells.join(" | "));
	let pad = |cell: &str, width: usize| format!("{cell:<width$}");

	let mut lines = vec![
		line(headers.iter().zip(widths).map(|(cell, width)| pad(cell, width)).collect()),
		line(widths.iter().map(|width| "-".repeat(*width)).collect()),
	];
	for row in &rows {
		lines.push(line(row.iter().zip(widths).map(|(cell, width)| pad(cell, width)).collect()));
	}

	lines.join("\n")
}
