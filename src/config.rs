//! Optional configuration file.
//!
//! Everything has a default, so the file (and any field in it) can be left out:
//!
//! ```toml
//! style = "Solarized (light)"
//! document_extensions = ["xhtml", "html", "htm"]
//! stylesheet_name = "highlight.css"
//! ```

use crate::highlight::DEFAULT_STYLE;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Highlighting style (syntect theme name)
    pub style: String,
    /// File-name suffixes of the documents to scan for code blocks
    pub document_extensions: Vec<String>,
    /// Name of the stylesheet created when the book doesn't have one
    pub stylesheet_name: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            style: DEFAULT_STYLE.to_string(),
            document_extensions: vec!["xhtml".to_string(), "html".to_string(), "htm".to_string()],
            stylesheet_name: "highlight.css".to_string(),
        }
    }
}

impl Configuration {
    pub fn load(path: &Path) -> Result<Configuration> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to load {} contents", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML in {}", path.display()))
    }
}
