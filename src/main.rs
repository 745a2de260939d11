use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use kg_synth::{
    config::{Configuration, LinkedFormat, OutputMode},
    knowledge_graph::GraphAssembler,
    sources::{load_answers, load_patterns, load_templates, Source},
    store::{CachedStore, DocumentStore, JsonFileStore},
    templates::TemplateMatcher,
};

#[derive(Parser)]
#[command(
    name = "kg-synth",
    about = "Synthesize a knowledge graph from analysed answers, question templates and triple patterns",
    long_about = None,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the knowledge graph and serialize it
    Build {
        /// Answer source file
        #[arg(short, long, conflicts_with = "document_id")]
        answers: Option<PathBuf>,

        /// Load the answer source from the document store instead
        #[arg(long)]
        document_id: Option<String>,

        /// Question template file (overrides config)
        #[arg(short, long)]
        templates: Option<PathBuf>,

        /// Triple pattern file (overrides config)
        #[arg(short, long)]
        patterns: Option<PathBuf>,

        /// Output mode (overrides config)
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,

        /// Linked-data format (overrides config)
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,

        /// Write the graph to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Emit compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Compile a pattern file and list what it declares
    CheckPatterns {
        /// Triple pattern file
        #[arg(short, long)]
        patterns: PathBuf,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show how answers and patterns attach to question templates
    Match {
        /// Answer source file
        #[arg(short, long)]
        answers: PathBuf,

        /// Question template file (overrides config)
        #[arg(short, long)]
        templates: Option<PathBuf>,

        /// Triple pattern file (overrides config)
        #[arg(short, long)]
        patterns: Option<PathBuf>,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Put a JSON document into the document store
    Import {
        /// Configuration file with a store section
        #[arg(short, long)]
        config: PathBuf,

        /// Target index
        #[arg(short, long)]
        index: String,

        /// JSON document to import
        #[arg(short, long, required_unless_present = "rebuild")]
        file: Option<PathBuf>,

        /// Document id (defaults to the document's id field or the file name)
        #[arg(long)]
        id: Option<String>,

        /// Replace an existing document with the same id
        #[arg(long)]
        overwrite: bool,

        /// Rebuild the index from the documents in its folder
        #[arg(long)]
        rebuild: bool,
    },

    /// Validate configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Generate example configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long)]
        output: PathBuf,

        /// Configuration format; taken from the file extension when omitted
        #[arg(short, long)]
        format: Option<ConfigFormat>,
    },
}

#[derive(clap::ValueEnum, Clone)]
enum ModeArg {
    Linked,
    Plain,
    Dot,
}

impl From<ModeArg> for OutputMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Linked => Self::Linked,
            ModeArg::Plain => Self::Plain,
            ModeArg::Dot => Self::Dot,
        }
    }
}

#[derive(clap::ValueEnum, Clone)]
enum FormatArg {
    JsonLd,
    Turtle,
    NTriples,
    RdfXml,
}

impl From<FormatArg> for LinkedFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::JsonLd => Self::JsonLd,
            FormatArg::Turtle => Self::Turtle,
            FormatArg::NTriples => Self::NTriples,
            FormatArg::RdfXml => Self::RdfXml,
        }
    }
}

#[derive(clap::ValueEnum, Clone)]
enum ConfigFormat {
    Yaml,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        tracing::Level::DEBUG
    } else if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Build {
            answers,
            document_id,
            templates,
            patterns,
            mode,
            format,
            output,
            config,
            compact,
        } => {
            build_command(answers, document_id, templates, patterns, mode, format, output, config, compact)
                .await
        }
        Commands::CheckPatterns { patterns, config } => check_patterns_command(patterns, config).await,
        Commands::Match { answers, templates, patterns, config } => {
            match_command(answers, templates, patterns, config).await
        }
        Commands::Import { config, index, file, id, overwrite, rebuild } => {
            import_command(config, index, file, id, overwrite, rebuild).await
        }
        Commands::Validate { config } => validate_command(config).await,
        Commands::GenerateConfig { output, format } => generate_config_command(output, format).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<Configuration> {
    let Some(path) = path else {
        return Ok(Configuration::default());
    };
    let config = Configuration::from_file(path)?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration: {}", path.display()))?;
    info!("Using configuration '{}' v{}", config.name, config.version);
    Ok(config)
}

fn input_path(given: Option<PathBuf>, configured: Option<&PathBuf>, what: &str) -> Result<PathBuf> {
    given
        .or_else(|| configured.cloned())
        .with_context(|| format!("No {} given on the command line or in the configuration", what))
}

async fn open_store(config: &Configuration) -> Result<Box<dyn DocumentStore>> {
    let settings = config
        .store
        .as_ref()
        .context("The configuration has no store section")?;
    let store = JsonFileStore::open(&settings.root, &settings.indexes)
        .await
        .with_context(|| format!("Failed to open document store at {}", settings.root.display()))?;

    if settings.cache {
        Ok(Box::new(CachedStore::new(store)))
    } else {
        Ok(Box::new(store))
    }
}

#[allow(clippy::too_many_arguments)]
async fn build_command(
    answers: Option<PathBuf>,
    document_id: Option<String>,
    templates: Option<PathBuf>,
    patterns: Option<PathBuf>,
    mode: Option<ModeArg>,
    format: Option<FormatArg>,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
    compact: bool,
) -> Result<()> {
    let mut config = load_config(config_path.as_deref())?;
    if let Some(mode) = mode {
        config.output.mode = mode.into();
    }
    if let Some(format) = format {
        config.output.format = format.into();
    }
    if compact {
        config.output.pretty = false;
    }

    let answer_source = match (answers, document_id) {
        (Some(path), _) => Source::file(path),
        (None, Some(id)) => {
            let store = open_store(&config).await?;
            let index = config
                .store
                .as_ref()
                .map(|s| s.answers_index.as_str())
                .unwrap_or("analyse");
            let document = store
                .get(index, &id)
                .await?
                .with_context(|| format!("Document '{}' not found in index '{}'", id, index))?;
            Source::value(document)
        }
        (None, None) => anyhow::bail!("Either --answers or --document-id is required"),
    };
    let templates = input_path(templates, config.sources.question_templates.as_ref(), "question templates")?;
    let patterns = input_path(patterns, config.sources.patterns.as_ref(), "pattern file")?;

    let to_file = output.is_some();
    if to_file {
        println!("{}", "Building knowledge graph...".bright_blue().bold());
    }

    let assembler = GraphAssembler::new(config.identifiers.clone());
    let build = assembler
        .assemble(&answer_source, &Source::file(&templates), &Source::file(&patterns))
        .context("Knowledge graph build failed")?;

    if build.graph.is_empty() {
        warn!("The build produced no triples");
    }

    let rendered = build
        .graph
        .render(&config.output)
        .with_context(|| format!("Failed to render graph as {}", config.output.mode))?;

    match output {
        Some(path) => {
            tokio::fs::write(&path, rendered)
                .await
                .with_context(|| format!("Failed to write output file: {}", path.display()))?;
            println!(" Graph written to {}", path.display().to_string().bright_green());
            println!("{}", build.report);
        }
        None => {
            println!("{}", rendered);
            info!("{}", build.report);
        }
    }

    Ok(())
}

async fn check_patterns_command(patterns: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    println!("{}", " Checking pattern file...".bright_blue().bold());

    let config = load_config(config_path.as_deref())?;
    let assembler = GraphAssembler::new(config.identifiers);
    let set = match load_patterns(&Source::file(&patterns), &assembler.parser()) {
        Ok(set) => set,
        Err(e) => {
            error!(" Pattern file is invalid: {}", e);
            return Err(e.into());
        }
    };

    println!(" Pattern file is valid: {}", patterns.display().to_string().bright_green());

    println!("{}", " Namespaces:".bright_yellow().bold());
    for (prefix, root) in set.namespaces().iter() {
        println!("  {} <{}>", prefix.bright_cyan(), root);
    }

    println!("{}", " Variables:".bright_yellow().bold());
    for (name, iri) in set.variables().iter() {
        println!("  <{}> -> {}", name.bright_cyan(), iri);
    }

    println!("{}", " Blocks:".bright_yellow().bold());
    for block in set.blocks() {
        println!(
            "  line {:>4}  {:?} {}  ({} triples)",
            block.line,
            block.condition,
            block.keys.join(", ").bright_cyan(),
            set.pattern(block.pattern).len()
        );
    }

    Ok(())
}

async fn match_command(
    answers: PathBuf,
    templates: Option<PathBuf>,
    patterns: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    println!("{}", " Matching answers against question templates...".bright_blue().bold());

    let config = load_config(config_path.as_deref())?;
    let templates = input_path(templates, config.sources.question_templates.as_ref(), "question templates")?;
    let patterns = input_path(patterns, config.sources.patterns.as_ref(), "pattern file")?;

    let assembler = GraphAssembler::new(config.identifiers.clone());
    let set = load_patterns(&Source::file(&patterns), &assembler.parser())?;
    let answers = load_answers(&Source::file(&answers))?;
    let templates = load_templates(&Source::file(&templates))?;

    let matching = TemplateMatcher::link(&set, templates, answers.resolve());

    for bound in &matching.templates {
        let status = if bound.has_final_answer {
            "answered".bright_green()
        } else {
            "open".bright_red()
        };
        println!(
            "  {} [{}] {} patterns, {} answers",
            bound.template.identity().bright_cyan(),
            status,
            bound.patterns.len(),
            bound.answers.len()
        );
    }

    let unmatched: Vec<_> = matching.unmatched_answers().collect();
    if !unmatched.is_empty() {
        println!("{}", " Answers without a template:".bright_yellow().bold());
        for linked in unmatched {
            println!("  {}", linked.answer.question_template.join(", "));
        }
    }

    Ok(())
}

async fn import_command(
    config_path: PathBuf,
    index: String,
    file: Option<PathBuf>,
    id: Option<String>,
    overwrite: bool,
    rebuild: bool,
) -> Result<()> {
    let config = load_config(Some(config_path.as_path()))?;
    let settings = config
        .store
        .as_ref()
        .context("The configuration has no store section")?;
    let store = JsonFileStore::open(&settings.root, &settings.indexes).await?;

    if let Some(file) = file {
        println!("{}", " Importing document...".bright_blue().bold());

        let content = tokio::fs::read_to_string(&file)
            .await
            .with_context(|| format!("Failed to read document: {}", file.display()))?;
        let document: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("Document is not valid JSON: {}", file.display()))?;

        let id = match id {
            Some(id) => id,
            None => match document.get("id") {
                Some(serde_json::Value::String(id)) => id.clone(),
                Some(serde_json::Value::Number(id)) => id.to_string(),
                _ => file
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
                    .context("Cannot derive a document id from the file name")?,
            },
        };

        if store.put(&index, &id, &document, overwrite).await? {
            println!(" Stored {} in index {}", id.bright_green(), index.bright_cyan());
        } else {
            println!(
                " Document {} already exists in index {} (use --overwrite to replace it)",
                id.bright_yellow(),
                index.bright_cyan()
            );
        }
    }

    if rebuild {
        let count = store.rebuild_index(&index).await?;
        println!(" Rebuilt index {} with {} documents", index.bright_cyan(), count);
    }

    Ok(())
}

async fn validate_command(config_path: PathBuf) -> Result<()> {
    println!("{}", " Validating configuration...".bright_blue().bold());

    match Configuration::from_file(&config_path) {
        Ok(config) => match config.validate() {
            Ok(()) => {
                println!(" Configuration is valid!");
                println!(" Name: {}", config.name.bright_green());
                println!(" Version: {}", config.version);
                println!(" Output: {} ({})", config.output.mode, config.output.format);
                println!(" Subject base: {}", config.identifiers.subject_base);
                println!(" Variable base: {}", config.identifiers.variable_base);
                if let Some(store) = &config.store {
                    println!(" Store: {} ({} indexes)", store.root.display(), store.indexes.len());
                }
                Ok(())
            }
            Err(e) => {
                error!(" Configuration validation failed: {}", e);
                Err(e)
            }
        },
        Err(e) => {
            error!(" Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

async fn generate_config_command(output_path: PathBuf, format: Option<ConfigFormat>) -> Result<()> {
    println!("{}", " Writing example kg-synth configuration...".bright_blue().bold());

    let output_path = config_path_for(output_path, format)?;
    let config = Configuration::example();
    config.to_file(&output_path)?;

    println!(" Configuration: {}", output_path.display().to_string().bright_green());
    println!(" Output: {:?} as {}, pretty: {}", config.output.mode, config.output.format, config.output.pretty);
    println!(" Subjects: {}", config.identifiers.subject_base);
    println!(" Variables: {}", config.identifiers.variable_base);
    if let Some(store) = &config.store {
        println!(" Store: {} (answers in '{}')", store.root.display(), store.answers_index);
    }

    Ok(())
}

/// `Configuration::to_file` picks the format from the extension, so an explicit
/// `--format` supplies a missing extension and must agree with an existing one.
fn config_path_for(path: PathBuf, format: Option<ConfigFormat>) -> Result<PathBuf> {
    let Some(format) = format else {
        return Ok(path);
    };
    let wanted = match format {
        ConfigFormat::Yaml => "yaml",
        ConfigFormat::Json => "json",
    };
    match path.extension().and_then(|e| e.to_str()) {
        None => Ok(path.with_extension(wanted)),
        Some("json") if wanted == "json" => Ok(path),
        Some(ext) if ext != "json" && wanted == "yaml" => Ok(path),
        Some(ext) => anyhow::bail!("--format {} does not match the .{} extension of {}", wanted, ext, path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_for_format() {
        assert_eq!(config_path_for(PathBuf::from("kg"), Some(ConfigFormat::Json)).unwrap(), PathBuf::from("kg.json"));
        assert_eq!(config_path_for(PathBuf::from("kg.yml"), Some(ConfigFormat::Yaml)).unwrap(), PathBuf::from("kg.yml"));
        assert_eq!(config_path_for(PathBuf::from("kg.json"), None).unwrap(), PathBuf::from("kg.json"));
        assert!(config_path_for(PathBuf::from("kg.yaml"), Some(ConfigFormat::Json)).is_err());
        assert!(config_path_for(PathBuf::from("kg.json"), Some(ConfigFormat::Yaml)).is_err());
    }
}
