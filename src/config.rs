//! Configuration management for the type graph builder
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (typegraph.toml)
//! - Environment variables (TYPEGRAPH_*)
//!
//! ## Example config file (typegraph.toml):
//! ```toml
//! [loader]
//! root = "./schemas"
//! extensions = ["json"]
//! skip_prefixes = ["target/", ".git/"]
//!
//! [formats]
//! builtin = true
//!
//! [formats.custom]
//! uuid = "uuid::Uuid"
//!
//! [output]
//! format = "pretty"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::format::{DefaultFormatResolver, FormatRegistry, MappedFormatResolver};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeGraphConfig {
    /// Document loading
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Format resolver setup
    #[serde(default)]
    pub formats: FormatConfig,

    /// CLI output
    #[serde(default)]
    pub output: OutputConfig,
}

/// Loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Base directory for documents
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// File extensions treated as schema documents
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Skip paths (relative to root) starting with these prefixes
    #[serde(default = "default_skip_prefixes")]
    pub skip_prefixes: Vec<String>,
}

/// Format resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatConfig {
    /// Register the built-in date/time resolver first
    #[serde(default = "default_true")]
    pub builtin: bool,

    /// Extra format tag -> target type mappings
    #[serde(default)]
    pub custom: HashMap<String, String>,
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

// Default value functions
fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

fn default_extensions() -> Vec<String> {
    vec!["json".to_string()]
}

fn default_skip_prefixes() -> Vec<String> {
    vec![
        "target/".to_string(),
        ".git/".to_string(),
        "node_modules/".to_string(),
    ]
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            extensions: default_extensions(),
            skip_prefixes: default_skip_prefixes(),
        }
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            builtin: true,
            custom: HashMap::new(),
        }
    }
}

impl FormatConfig {
    /// Registry described by this configuration: builtin first, then custom
    pub fn registry(&self) -> FormatRegistry {
        let mut registry = FormatRegistry::empty();
        if self.builtin {
            registry.register(DefaultFormatResolver);
        }
        if !self.custom.is_empty() {
            registry.register(MappedFormatResolver::new(self.custom.clone()));
        }
        registry
    }
}

impl TypeGraphConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["typegraph.toml", ".typegraph.toml", "config/typegraph.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "typegraph") {
            let xdg_config = config_dir.config_dir().join("typegraph.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (TYPEGRAPH_*)
        builder = builder.add_source(
            Environment::with_prefix("TYPEGRAPH")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Loader root, resolved against the current directory
    pub fn loader_root(&self) -> PathBuf {
        if self.loader.root.is_absolute() {
            self.loader.root.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.loader.root)
        }
    }
}
