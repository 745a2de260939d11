use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::pattern::DEFAULT_SUBJECT_BASE;
use crate::parser::DEFAULT_VARIABLE_BASE;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub version: String,
    #[serde(default)]
    pub identifiers: IdentifierSettings,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub sources: SourceSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreSettings>,
}

/// Bases for synthetic identifiers. Both must be absolute IRIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifierSettings {
    #[serde(default = "default_variable_base")]
    pub variable_base: String,
    #[serde(default = "default_subject_base")]
    pub subject_base: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    #[default]
    Linked,
    Plain,
    Dot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LinkedFormat {
    #[default]
    JsonLd,
    Turtle,
    NTriples,
    RdfXml,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default)]
    pub mode: OutputMode,
    #[serde(default)]
    pub format: LinkedFormat,
    #[serde(default = "default_true")]
    pub pretty: bool,
}

/// Default input locations used when the command line does not name them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_templates: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patterns: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    pub root: PathBuf,
    #[serde(default = "default_answers_index")]
    pub answers_index: String,
    #[serde(default = "default_indexes")]
    pub indexes: Vec<String>,
    #[serde(default = "default_true")]
    pub cache: bool,
}

fn default_variable_base() -> String { DEFAULT_VARIABLE_BASE.to_string() }
fn default_subject_base() -> String { DEFAULT_SUBJECT_BASE.to_string() }
fn default_answers_index() -> String { "analyse".to_string() }
fn default_indexes() -> Vec<String> {
    ["upload", "extract", "annotate", "analyse", "question_template", "triple_template"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_true() -> bool { true }

impl Default for IdentifierSettings {
    fn default() -> Self {
        Self {
            variable_base: default_variable_base(),
            subject_base: default_subject_base(),
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            mode: OutputMode::Linked,
            format: LinkedFormat::JsonLd,
            pretty: true,
        }
    }
}

impl FromStr for LinkedFormat {
    type Err = anyhow::Error;

    /// Accepts format names, common file extensions and media types.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json-ld" | "jsonld" | "application/ld+json" => Ok(LinkedFormat::JsonLd),
            "turtle" | "ttl" | "text/turtle" => Ok(LinkedFormat::Turtle),
            "n-triples" | "ntriples" | "nt" | "application/n-triples" => Ok(LinkedFormat::NTriples),
            "rdf-xml" | "rdfxml" | "xml" | "application/rdf+xml" => Ok(LinkedFormat::RdfXml),
            other => anyhow::bail!(
                "Unsupported linked-data format: {}. Supported: json-ld, turtle, n-triples, rdf-xml",
                other
            ),
        }
    }
}

impl fmt::Display for LinkedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkedFormat::JsonLd => write!(f, "json-ld"),
            LinkedFormat::Turtle => write!(f, "turtle"),
            LinkedFormat::NTriples => write!(f, "n-triples"),
            LinkedFormat::RdfXml => write!(f, "rdf-xml"),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Linked => write!(f, "linked"),
            OutputMode::Plain => write!(f, "plain"),
            OutputMode::Dot => write!(f, "dot"),
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            description: String::new(),
            version: "1.0".to_string(),
            identifiers: IdentifierSettings::default(),
            output: OutputSettings::default(),
            sources: SourceSettings::default(),
            store: None,
        }
    }
}

impl Configuration {
    /// Load configuration from a YAML or JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        };

        Ok(config)
    }

    /// Writes the configuration as JSON for a `.json` path and as YAML otherwise,
    /// the same rule `from_file` reads by. Refuses to write an invalid configuration.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.validate()?;

        let content = if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::to_string_pretty(self).context("Failed to serialize config as JSON")?
        } else {
            serde_yaml::to_string(self).context("Failed to serialize config as YAML")?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        fs::write(path, content).with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Configuration has no name");
        }

        for (field, base) in [
            ("identifiers.variable_base", &self.identifiers.variable_base),
            ("identifiers.subject_base", &self.identifiers.subject_base),
        ] {
            let parsed = url::Url::parse(base)
                .with_context(|| format!("{} is not an absolute IRI: {}", field, base))?;
            if parsed.cannot_be_a_base() && !base.ends_with(':') {
                anyhow::bail!("{} must end with '/', '#' or ':' to mint identifiers: {}", field, base);
            }
        }

        if self.identifiers.variable_base == self.identifiers.subject_base {
            anyhow::bail!("Variable and subject identifier bases must differ");
        }

        if let Some(store) = &self.store {
            if !store.indexes.contains(&store.answers_index) {
                anyhow::bail!(
                    "Answers index '{}' is not one of the store indexes: {}",
                    store.answers_index,
                    store.indexes.join(", ")
                );
            }
        }

        Ok(())
    }

    pub fn example() -> Self {
        Configuration {
            name: "Manufacturing knowledge graph".to_string(),
            description: "Build a knowledge graph from analysed manufacturing documents".to_string(),
            version: "1.0".to_string(),
            identifiers: IdentifierSettings::default(),
            output: OutputSettings {
                mode: OutputMode::Linked,
                format: LinkedFormat::JsonLd,
                pretty: true,
            },
            sources: SourceSettings {
                question_templates: Some(PathBuf::from("files/question_templates.json")),
                patterns: Some(PathBuf::from("files/triple_patterns.txt")),
            },
            store: Some(StoreSettings {
                root: PathBuf::from("database/files"),
                answers_index: default_answers_index(),
                indexes: default_indexes(),
                cache: true,
            }),
        }
    }
}
