use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::MdpError;
use crate::MdpResult;

/// Default maximum file size in bytes (10 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Name of the sentinel file that excludes a directory from the workspace.
pub const DEFAULT_IGNORE_MARKER: &str = "MDP_IGNORE";

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] =
	["mdplus.toml", ".mdplus.toml", ".config/mdplus.toml"];

/// Configuration loaded from an `mdplus.toml` file.
///
/// ```toml
/// ignore_marker = "MDP_IGNORE"
/// disable_gitignore = false
/// max_file_size = 10485760
///
/// [exclude]
/// patterns = ["vendor/", "*.generated.md"]
/// ```
#[derive(Debug, Deserialize)]
pub struct MdpConfig {
	/// Exclusion configuration using gitignore-style patterns.
	#[serde(default)]
	pub exclude: ExcludeConfig,
	/// Directories containing a file with this name are skipped entirely.
	#[serde(default = "default_ignore_marker")]
	pub ignore_marker: String,
	/// When true, `.gitignore` is not used for filtering.
	#[serde(default)]
	pub disable_gitignore: bool,
	/// Generatable documents larger than this many bytes are skipped.
	#[serde(default = "default_max_file_size")]
	pub max_file_size: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExcludeConfig {
	/// Gitignore-style patterns matched relative to the workspace root.
	#[serde(default)]
	pub patterns: Vec<String>,
}

fn default_ignore_marker() -> String {
	DEFAULT_IGNORE_MARKER.to_string()
}

fn default_max_file_size() -> u64 {
	DEFAULT_MAX_FILE_SIZE
}

impl Default for MdpConfig {
	fn default() -> Self {
		Self {
			exclude: ExcludeConfig::default(),
			ignore_marker: default_ignore_marker(),
			disable_gitignore: false,
			max_file_size: DEFAULT_MAX_FILE_SIZE,
		}
	}
}

impl MdpConfig {
	/// The first config file that exists under `root`.
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if there is none.
	pub fn load(root: &Path) -> MdpResult<Option<MdpConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path)?;
		let config: MdpConfig =
			toml::from_str(&content).map_err(|e| MdpError::ConfigParse(e.to_string()))?;

		tracing::debug!(path = %config_path.display(), "loaded config");

		Ok(Some(config))
	}
}
