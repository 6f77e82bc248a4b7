pub mod parse;
pub mod probe;
pub mod types;
pub mod validate;

use regex::Regex;
use std::path::{Path, PathBuf};

pub use parse::{apply_overrides, load_properties, parse_properties, ConfigError};
pub use probe::{FilesystemProbe, ProbeError, ResourceProbe};
pub use types::{Properties, RuntimeProperties, SinkSettings, SourceSettings, StreamPosition};
pub use validate::{PropertyValidator, ValidationReport};

const PROPERTIES_FILE: &str = "properties.yml";

/// Replace `$env{NAME}` references with the variable's value.
/// Unset variables are left in place so the loader can report them.
pub fn expand_env_vars(text: &str) -> String {
    let Ok(pattern) = Regex::new(r"\$env\{(?P<name>[A-Za-z_][A-Za-z0-9_]*)\}") else {
        return text.to_string();
    };

    pattern
        .replace_all(text, |caps: &regex::Captures| match std::env::var(&caps["name"]) {
            Ok(value) => value,
            Err(_) => caps[0].to_string(),
        })
        .into_owned()
}

/// Resolve a leading `~` component against the home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

/// Locations searched for the properties file, most specific first
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(2);
    if let Some(config_dir) = dirs::home_dir().map(|home| home.join(".config")) {
        paths.push(config_dir.join("eventcount").join(PROPERTIES_FILE));
    }
    paths.push(Path::new("/etc/eventcount").join(PROPERTIES_FILE));
    paths
}

/// An explicit path always wins; otherwise the first default location that exists.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(expand_tilde(path)),
        None => default_config_paths().into_iter().find(|p| p.exists()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars_single() {
        std::env::set_var("EVENTCOUNT_MOD_TEST_VAR", "test_value");
        let result = expand_env_vars("path/$env{EVENTCOUNT_MOD_TEST_VAR}/file");
        assert_eq!(result, "path/test_value/file");
        std::env::remove_var("EVENTCOUNT_MOD_TEST_VAR");
    }

    #[test]
    fn test_expand_env_vars_unset() {
        let result = expand_env_vars("path/$env{EVENTCOUNT_NONEXISTENT_VAR}/file");
        assert_eq!(result, "path/$env{EVENTCOUNT_NONEXISTENT_VAR}/file");
    }

    #[test]
    fn test_expand_env_vars_no_expansion() {
        assert_eq!(expand_env_vars("plain/path"), "plain/path");
    }

    #[test]
    fn test_expand_tilde_with_path() {
        let expanded = expand_tilde(Path::new("~/out/counters"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("out/counters"));
        }
    }

    #[test]
    fn test_expand_tilde_no_expansion() {
        assert_eq!(expand_tilde(Path::new("/absolute/path")), Path::new("/absolute/path"));
        assert_eq!(expand_tilde(Path::new("relative/path")), Path::new("relative/path"));
    }

    #[test]
    fn test_expand_tilde_bare_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~")), home);
        }
    }

    #[test]
    fn test_default_config_paths_end_with_system_location() {
        let paths = default_config_paths();
        assert_eq!(paths.last(), Some(&PathBuf::from("/etc/eventcount/properties.yml")));
    }

    #[test]
    fn test_resolve_config_path_explicit() {
        assert_eq!(
            resolve_config_path(Some(Path::new("/tmp/props.yml"))),
            Some(PathBuf::from("/tmp/props.yml"))
        );
    }
}
