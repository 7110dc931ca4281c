use std::path::Path;
use std::path::PathBuf;

use mdplus_core::ArgumentBinder;
use mdplus_core::ArgumentMeta;
use mdplus_core::Generator;
use mdplus_core::GeneratorContext;
use mdplus_core::GeneratorMeta;
use mdplus_core::GeneratorPlugin;
use mdplus_core::MdpError;
use mdplus_core::MdpResult;
use serde::Deserialize;

pub const PAKK_COMMAND: &str = "generate.getting_started.pakk";
pub const PAKK_CONFIG_FILE: &str = "pakk.cfg";
pub const DEFAULT_PAKK_HEADER: &str =
	"# Getting Started using [pakk](https://github.com/iCampus-Wildau/pakk)";

/// The parts of `pakk.cfg` the generator reads.
#[derive(Debug, Clone, Deserialize)]
pub struct PakkConfig {
	pub info: PakkInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PakkInfo {
	/// The package id, e.g. `iCampus-Wildau/ros-demo`.
	pub id: String,
}

impl PakkConfig {
	pub fn load(path: &Path) -> MdpResult<Self> {
		let content = std::fs::read_to_string(path)?;
		serde_ini::from_str(&content).map_err(|e| {
			MdpError::generator(
				PAKK_COMMAND,
				format!("invalid {}: {e}", path.display()),
			)
		})
	}

	/// The package name without its namespace.
	pub fn short_name(&self) -> &str {
		self.info.id.rsplit('/').next().unwrap_or(&self.info.id)
	}
}

/// Renders installation and usage instructions for a pakk package.
pub struct PakkPlugin;

impl GeneratorPlugin for PakkPlugin {
	fn meta(&self) -> GeneratorMeta {
		GeneratorMeta {
			command: PAKK_COMMAND,
			description: "Getting started instructions for a pakk package",
			arguments: &[
				ArgumentMeta {
					name: "header",
					description: "Heading placed above the instructions",
					default: Some(
						"\"# Getting Started using [pakk](https://github.com/iCampus-Wildau/pakk)\"",
					),
				},
				ArgumentMeta {
					name: "installation",
					description: "Include the installation command",
					default: Some("True"),
				},
				ArgumentMeta {
					name: "usage",
					description: "Include the start and enable commands",
					default: Some("True"),
				},
			],
		}
	}

	fn bind(&self, binder: &mut ArgumentBinder<'_>) -> MdpResult<Box<dyn Generator>> {
		Ok(Box::new(PakkGenerator {
			header: binder.header(DEFAULT_PAKK_HEADER)?,
			installation: binder.get("installation", true)?,
			usage: binder.get("usage", true)?,
		}))
	}
}

struct PakkGenerator {
	header: String,
	installation: bool,
	usage: bool,
}

impl PakkGenerator {
	/// `pakk.cfg` next to the document, else at the workspace root.
	fn find_config(context: &GeneratorContext<'_>) -> Option<PathBuf> {
		[context.document_dir(), context.workspace.root()]
			.into_iter()
			.map(|dir| dir.join(PAKK_CONFIG_FILE))
			.find(|path| path.is_file())
	}
}

impl Generator for PakkGenerator {
	fn render(&self, context: &GeneratorContext<'_>) -> MdpResult<String> {
		let Some(path) = Self::find_config(context) else {
			return Err(MdpError::generator(
				PAKK_COMMAND,
				format!("no {PAKK_CONFIG_FILE} found next to the document or at the workspace root"),
			));
		};
		let config = PakkConfig::load(&path)?;
		let id = &config.info.id;
		let short_name = config.short_name();

		tracing::debug!(config = %path.display(), id = %id, "rendering pakk instructions");

		let mut lines = vec![
			self.header.clone(),
			"Using [pakk](https://github.com/iCampus-Wildau/pakk) package manager is recommended for \
			 automating the installation and management of ROS 2 packages.\n"
				.to_string(),
		];

		if self.installation {
			lines.push("Installation with pakk:".to_string());
			lines.push("```bash".to_string());
			lines.push(format!("pakk install {id}"));
			lines.push("```\n".to_string());
		}

		if self.usage {
			lines.push(format!(
				"After the installation completes, start the {short_name} package:"
			));
			lines.push("```bash".to_string());
			lines.push(format!(
				"pakk start {short_name}  # Start the package until being stopped or system reboot, or ..."
			));
			lines.push(format!(
				"pakk enable {short_name}  # ... start it now and on every system boot."
			));
			lines.push("```\n".to_string());
		}

		Ok(lines.join("\n"))
	}
}
