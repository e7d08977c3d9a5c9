//! Configuration schema for debugweave.
//!
//! A config decides which logs are inserted and how they are spelled. It is
//! read from YAML and can be overridden from the command line.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::logging::{LogBackend, DEFAULT_DEVICE};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Logging function family.
    #[serde(default = "default_backend")]
    pub backend: LogBackend,
    /// Device expression passed to `dev_dbg`.
    #[serde(default = "default_device")]
    pub device: String,
    /// Source is kernel code.
    #[serde(default)]
    pub kernel: bool,
    /// Log function entry and exit.
    #[serde(default = "default_true")]
    pub entry_exit: bool,
    /// Log exit before every unguarded `return`.
    #[serde(default = "default_true")]
    pub exit_before_return: bool,
    /// Log simple return values next to the exit log.
    #[serde(default = "default_true")]
    pub return_values: bool,
    /// Log parameter values after entry.
    #[serde(default = "default_true")]
    pub params: bool,
    /// Log initialized declarations.
    #[serde(default = "default_true")]
    pub decls: bool,
    /// Log assigned values.
    #[serde(default = "default_true")]
    pub assigns: bool,
    /// Log the names of called functions.
    #[serde(default = "default_true")]
    pub calls: bool,
    /// Log entry into control-flow branches.
    #[serde(default)]
    pub control: bool,
    /// Guarantee an exit log at the end of every function.
    #[serde(default = "default_true")]
    pub final_exit_always: bool,
    /// Add missing kernel headers in kernel mode.
    #[serde(default = "default_true")]
    pub kernel_includes: bool,
    /// File extensions processed in directory mode.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Glob patterns for paths to leave alone (e.g., "**/vendor/**").
    #[serde(default)]
    pub excluded_paths: Vec<String>,
    /// Functions never instrumented.
    #[serde(default)]
    pub skip_functions: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_backend() -> LogBackend {
    LogBackend::Printf
}

fn default_device() -> String {
    DEFAULT_DEVICE.to_string()
}

fn default_extensions() -> Vec<String> {
    ["c", "h", "cpp", "hpp", "cc", "cxx"]
        .iter()
        .map(|e| e.to_string())
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            device: default_device(),
            kernel: false,
            entry_exit: true,
            exit_before_return: true,
            return_values: true,
            params: true,
            decls: true,
            assigns: true,
            calls: true,
            control: false,
            final_exit_always: true,
            kernel_includes: true,
            extensions: default_extensions(),
            excluded_paths: Vec::new(),
            skip_functions: Vec::new(),
        }
    }
}

/// A toggleable kind of inserted log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Feature {
    EntryExit,
    ExitBeforeReturn,
    ReturnValues,
    Params,
    Decls,
    Assigns,
    Calls,
    Control,
    FinalExitAlways,
    KernelIncludes,
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a config from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// The backend emitted after kernel/user-space resolution.
    pub fn effective_backend(&self) -> LogBackend {
        self.backend.resolve(self.kernel)
    }

    pub fn set_feature(&mut self, feature: Feature, enabled: bool) {
        let flag = match feature {
            Feature::EntryExit => &mut self.entry_exit,
            Feature::ExitBeforeReturn => &mut self.exit_before_return,
            Feature::ReturnValues => &mut self.return_values,
            Feature::Params => &mut self.params,
            Feature::Decls => &mut self.decls,
            Feature::Assigns => &mut self.assigns,
            Feature::Calls => &mut self.calls,
            Feature::Control => &mut self.control,
            Feature::FinalExitAlways => &mut self.final_exit_always,
            Feature::KernelIncludes => &mut self.kernel_includes,
        };
        *flag = enabled;
    }

    /// Whether the function should never be instrumented.
    pub fn is_function_skipped(&self, name: &str) -> bool {
        self.skip_functions.iter().any(|s| s == name)
    }

    /// Check if a path should be excluded based on excluded_paths patterns.
    /// Uses globset for matching, which supports `**` for recursive directory matching.
    pub fn is_path_excluded(&self, path: &Path) -> bool {
        if self.excluded_paths.is_empty() {
            return false;
        }

        let path_str = path.to_string_lossy();

        for pattern in &self.excluded_paths {
            if let Ok(glob) = globset::Glob::new(pattern) {
                let matcher = glob.compile_matcher();
                if matcher.is_match(&*path_str) {
                    return true;
                }
            }
        }
        false
    }

    /// Whether the file extension is one we process.
    pub fn has_source_extension(&self, path: &Path) -> bool {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        self.extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

/// Validate a config.
pub fn validate(config: &Config) -> Result<()> {
    let device = config.device.trim();
    if device.is_empty() {
        return Err(Error::InvalidConfig("device expression is empty".into()));
    }
    if device.contains(['{', '}', ';', '\n', '"']) {
        return Err(Error::InvalidConfig(format!(
            "device expression {:?} must not contain braces, semicolons, quotes or newlines",
            config.device
        )));
    }

    if config.extensions.is_empty() {
        return Err(Error::InvalidConfig("at least one extension is required".into()));
    }

    // Validate excluded_paths glob patterns compile
    for pattern in &config.excluded_paths {
        globset::Glob::new(pattern).map_err(|e| {
            Error::InvalidConfig(format!("invalid excluded_paths pattern {:?}: {}", pattern, e))
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
backend: dev_dbg
device: "&pdev->dev"
kernel: true
control: true
calls: false
skip_functions:
  - hot_path
excluded_paths:
  - "**/generated/**"
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.backend, LogBackend::DevDbg);
        assert_eq!(config.device, "&pdev->dev");
        assert!(config.kernel);
        assert!(config.control);
        assert!(!config.calls);
        assert!(config.entry_exit);
        assert!(config.final_exit_always);
        assert!(config.is_function_skipped("hot_path"));
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        let defaults = Config::default();
        assert_eq!(config.backend, defaults.backend);
        assert_eq!(config.extensions, defaults.extensions);
        assert!(!config.control);
        assert!(config.return_values);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(Config::from_yaml("backend: syslog").is_err());
    }

    #[test]
    fn test_validate_device() {
        let mut config = Config::default();
        config.device = "dev; evil()".to_string();
        assert!(validate(&config).is_err());
        config.device = "{".to_string();
        assert!(validate(&config).is_err());
        config.device = "  ".to_string();
        assert!(validate(&config).is_err());
        config.device = "&client->dev".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_globs_and_extensions() {
        let mut config = Config::default();
        config.excluded_paths = vec!["[unclosed".to_string()];
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.extensions.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_effective_backend() {
        let mut config = Config::default();
        assert_eq!(config.effective_backend(), LogBackend::Printf);
        config.kernel = true;
        assert_eq!(config.effective_backend(), LogBackend::Printk);
    }

    #[test]
    fn test_set_feature() {
        let mut config = Config::default();
        config.set_feature(Feature::Calls, false);
        config.set_feature(Feature::Control, true);
        assert!(!config.calls);
        assert!(config.control);
    }

    #[test]
    fn test_path_filters() {
        let mut config = Config::default();
        config.excluded_paths = vec!["**/vendor/**".to_string()];
        assert!(config.is_path_excluded(Path::new("src/vendor/lib.c")));
        assert!(!config.is_path_excluded(Path::new("src/main.c")));
        assert!(config.has_source_extension(Path::new("a/b.C")));
        assert!(config.has_source_extension(Path::new("x.hpp")));
        assert!(!config.has_source_extension(Path::new("x.rs")));
    }
}
