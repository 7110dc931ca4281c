#![allow(dead_code)]

use std::path::Path;

use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub fn mdplus_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("mdplus"));
	cmd.env("NO_COLOR", "1");
	cmd.env_remove("MDPLUS_LOG");
	cmd
}

pub fn write(path: &Path, content: &str) {
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("mkdir: {e}"));
	}
	std::fs::write(path, content).unwrap_or_else(|e| panic!("write: {e}"));
}

pub const CONTENT_BLOCK: &str =
	"# Repo\n\n<!-- MD+:generate.content -->\nstale\n<!-- MD+FIN:generate.content -->\n";

/// A workspace with one package directory and a README whose content table
/// is stale.
pub fn stale_workspace(root: &Path) {
	write(&root.join("alpha/README.md"), "# Alpha\n\nFirst package.\n");
	write(&root.join("readme.md"), CONTENT_BLOCK);
}
