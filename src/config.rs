//! Configuration management for the extractor
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (yaml-instructor.toml)
//! - Environment variables (YAML_INSTRUCTOR__*)
//!
//! ## Example config file (yaml-instructor.toml):
//! ```toml
//! [strings]
//! alphabet = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 .,-"
//!
//! [layout]
//! indent_width = 2
//!
//! [markers]
//! start = "\n```yaml\n"
//! end = "\n```"
//!
//! [extraction]
//! strip_comments = true
//! validate_documents = true
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Characters allowed unescaped inside generated quoted strings.
pub const DEFAULT_ALPHABET: &str = concat!(
    "abcdefghijklmnopqrstuvwxyz",
    "ABCDEFGHIJKLMNOPQRSTUVWXYZ",
    "0123456789",
    "!@#$%^&*()_+{}|:<>?[];',./`~ ",
);

/// Narrowest indentation that leaves room for a `- ` list item marker
pub const MIN_INDENT_WIDTH: usize = 2;

/// Literal text opening the generated document in the transcript
pub const DEFAULT_START_MARKER: &str = "\n```yaml\n";

/// Literal text closing the generated document in the transcript
pub const DEFAULT_END_MARKER: &str = "\n```";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// String generation settings
    #[serde(default)]
    pub strings: StringConfig,

    /// Indentation settings
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Document delimiters
    #[serde(default)]
    pub markers: MarkerConfig,

    /// Post-generation processing
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

/// String generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StringConfig {
    /// Characters a generated string may contain without escaping.
    /// Quote and backslash are always available in escaped form.
    #[serde(default = "default_alphabet")]
    pub alphabet: String,
}

/// Layout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Spaces per nesting level
    #[serde(default = "default_indent_width")]
    pub indent_width: usize,
}

/// Marker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerConfig {
    #[serde(default = "default_start_marker")]
    pub start: String,

    #[serde(default = "default_end_marker")]
    pub end: String,
}

/// Extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Drop comment-only lines before parsing
    #[serde(default = "default_true")]
    pub strip_comments: bool,

    /// Validate untyped results against the source JSON Schema, when there is one
    #[serde(default = "default_true")]
    pub validate_documents: bool,
}

// Default value functions
fn default_alphabet() -> String {
    DEFAULT_ALPHABET.to_string()
}

fn default_indent_width() -> usize {
    2
}

fn default_start_marker() -> String {
    DEFAULT_START_MARKER.to_string()
}

fn default_end_marker() -> String {
    DEFAULT_END_MARKER.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for StringConfig {
    fn default() -> Self {
        Self {
            alphabet: default_alphabet(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            indent_width: default_indent_width(),
        }
    }
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            start: default_start_marker(),
            end: default_end_marker(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            strip_comments: true,
            validate_documents: true,
        }
    }
}

impl ExtractConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = [
            "yaml-instructor.toml",
            ".yaml-instructor.toml",
            "config/yaml-instructor.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) =
            directories::ProjectDirs::from("dev", "yaml-instructor", "yaml-instructor")
        {
            let xdg_config = config_dir.config_dir().join("yaml-instructor.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (YAML_INSTRUCTOR__SECTION__KEY)
        builder = builder.add_source(
            Environment::with_prefix("YAML_INSTRUCTOR")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no grammar can be laid out with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layout.indent_width < MIN_INDENT_WIDTH {
            return Err(ConfigError::Message(format!(
                "layout.indent_width must be at least {}, got {}",
                MIN_INDENT_WIDTH, self.layout.indent_width
            )));
        }
        Ok(())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ExtractConfig::default();
        assert_eq!(config.layout.indent_width, 2);
        assert_eq!(config.markers.start, "\n```yaml\n");
        assert_eq!(config.markers.end, "\n```");
        assert!(config.extraction.strip_comments);
        assert!(config.strings.alphabet.contains('Z'));
        assert!(!config.strings.alphabet.contains('"'));
        assert!(!config.strings.alphabet.contains('\\'));
    }

    #[test]
    fn test_serialize_config() {
        let config = ExtractConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[strings]"));
        assert!(toml_str.contains("[layout]"));
        assert!(toml_str.contains("[markers]"));
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(file, "[layout]\nindent_width = 4\n\n[strings]\nalphabet = \"abc\"").unwrap();

        let path = file.path().to_string_lossy().to_string();
        let config = ExtractConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.layout.indent_width, 4);
        assert_eq!(config.strings.alphabet, "abc");
        // Untouched sections keep their defaults
        assert_eq!(config.markers.end, DEFAULT_END_MARKER);
    }

    #[test]
    fn test_narrow_indent_rejected() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(file, "[layout]\nindent_width = 1").unwrap();

        let path = file.path().to_string_lossy().to_string();
        match ExtractConfig::load_from(Some(&path)) {
            Err(ConfigError::Message(message)) => assert!(message.contains("indent_width")),
            other => panic!("Expected ConfigError::Message, got {:?}", other),
        }
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let path = path.to_string_lossy().to_string();

        let mut config = ExtractConfig::default();
        config.extraction.validate_documents = false;
        config.save(&path).unwrap();

        let loaded = ExtractConfig::load_from(Some(&path)).unwrap();
        assert!(!loaded.extraction.validate_documents);
        assert_eq!(loaded.markers, config.markers);
    }
}
