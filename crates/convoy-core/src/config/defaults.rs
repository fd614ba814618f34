//! Default configuration values

/// Default configuration file name
pub const DEFAULT_CONFIG_TOML: &str = "convoy.toml";

/// Alternative configuration file name
pub const ALT_CONFIG_FILE: &str = ".convoy.toml";

/// Dist-tag used while a multi-package release is in flight
pub const TEMP_DIST_TAG: &str = "convoy-temp";

/// Get list of config file names to search for
pub fn config_file_names() -> Vec<&'static str> {
    vec![DEFAULT_CONFIG_TOML, ALT_CONFIG_FILE]
}

/// Default configuration template
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# convoy configuration
version = "0.0.0"
packages = ["packages/*"]

[versioning]
mode = "fixed"
tag_prefix = "v"
exact = false

[git]
remote = "origin"
allow_branches = ["main"]
require_clean = true
commit = true
tag = true
push = true
reset = true
commit_message = "chore(release): publish {version}"

[publish]
dist_tag = "latest"
temp_tag = false
concurrency = 4
registry = "https://registry.npmjs.org"
graph_type = "all"
reject_cycles = false
include_private = false
ignore_changes = ["**/*.md", "**/__tests__/**"]
"#;
